pub mod build_info;
pub mod cart;
pub mod cli;
pub mod commands;
pub mod config;
pub mod export_service;
pub mod logging;
pub mod model;
pub mod source_client;
