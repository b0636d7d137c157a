//! The dns module implements the wire protocol, the per-role resolution
//! engine and the UDP server roles of the hierarchy simulation.

use derive_more::{Display, From};

pub mod authority;
pub mod buffer;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod log;
pub mod protocol;
pub mod resolve;
pub mod server;

#[derive(Debug, Display, From)]
pub enum DnsError {
    Io(std::io::Error),
    Decode(crate::dns::buffer::DecodeError),
    Serialization(serde_json::Error),
    #[display(fmt = "transaction id mismatch: expected {}, got {}", "expected", "got")]
    #[from(ignore)]
    IdMismatch { expected: u16, got: u16 },
    #[display(fmt = "upstream replied with rcode {}", "_0")]
    #[from(ignore)]
    UpstreamFailure(u8),
    #[display(fmt = "bad zone record: {}", "_0")]
    #[from(ignore)]
    BadRecord(String),
}

impl std::error::Error for DnsError {}

pub type Result<T> = std::result::Result<T, DnsError>;
