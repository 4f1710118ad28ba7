use std::env;
use std::path::PathBuf;

pub const DEFAULT_GATEWAY_URL: &str = "https://data.fieldcart.dev";

/// Process-level configuration resolved from the environment.
///
/// CLI flags take precedence over these values; see `commands`.
pub struct Config {
    /// Base URL of the field-data gateway.
    pub gateway_url: String,
    /// Explicit cart file location. When unset, the platform data dir is used.
    pub cart_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let gateway_url = env::var("FIELDCART_GATEWAY_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let cart_path = env::var_os("FIELDCART_CART_PATH").map(PathBuf::from);
        Self {
            gateway_url,
            cart_path,
        }
    }
}
