// Public API - protocol engine, data types and output helpers
pub mod config;
pub mod error;
pub mod export;
pub mod ping;
pub mod prefs;
pub mod probe;
pub mod state;

// In-memory transport and clocks for tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Argument definitions are shared with the binary
pub mod cli;

pub use error::PingError;

/// Program name and version, e.g. "rping 0.1.0"
pub const VERSION_INFO: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

pub fn version_info() -> &'static str {
    VERSION_INFO
}
