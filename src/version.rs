// Package identity baked in at compile time

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// "name vX.Y.Z", used in the startup log line and on `GET /`.
pub fn banner() -> String {
    format!("{} v{}", NAME, VERSION)
}
