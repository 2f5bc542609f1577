// src/utils/env.rs
use log::{debug, info};

/// Loads variables from `.env` (or the given file) without overriding the
/// process environment. A missing file is not an error.
pub fn load_env() {
    load_env_from(None);
}

pub fn load_env_from(path: Option<&str>) {
    let result = match path {
        Some(p) => dotenv::from_filename(p),
        None => dotenv::dotenv(),
    };
    match result {
        Ok(loaded) => info!("Loaded environment from {}", loaded.display()),
        Err(e) => debug!("No env file loaded ({}); using process environment", e),
    }
}

/// Reads an env var and parses it, falling back to `default` when unset or malformed.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
