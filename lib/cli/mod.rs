use crate::build_info;
use crate::commands::{
    CartAddCameraArgs, CartAddOccurrenceArgs, CartClearArgs, CartListArgs, CartRemoveArgs,
    ExportArgs,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fieldcart",
    about = "Export cart for field-survey data",
    version = build_info::VERSION_WITH_COMMIT,
    long_version = build_info::VERSION_WITH_COMMIT
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage saved queries in the export cart
    #[command(subcommand)]
    Cart(CartCommand),
    /// Replay cart entries against the live sources and write the results
    Export(ExportArgs),
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
    /// Commit a camera-trap query to the cart
    AddCamera(CartAddCameraArgs),
    /// Commit an occurrence query to the cart
    AddOccurrence(CartAddOccurrenceArgs),
    /// Show the cart's entries and totals
    List(CartListArgs),
    /// Remove one entry by snapshot id (unique prefixes work)
    Remove(CartRemoveArgs),
    /// Remove every entry
    Clear(CartClearArgs),
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
