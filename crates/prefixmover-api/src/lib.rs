// prefixmover-api: Async Rust client for the Tailscale device directory API

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::DirectoryClient;
pub use error::Error;
pub use transport::TransportConfig;
