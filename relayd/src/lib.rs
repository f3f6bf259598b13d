//! Streaming relay for remote audio: forwards GET/HEAD range requests to
//! allow-listed media hosts and pipes the answer back to the browser.

pub mod body;
pub mod config;
pub mod error;
pub mod relay;
pub mod tls;
pub mod webserver;

pub use config::RelayConfig;
pub use error::Error;
pub use relay::Relay;
