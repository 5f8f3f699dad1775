use std::net::SocketAddr;

/// Every failure mode the spec names, collapsed into one matchable enum so
/// call sites can log and drop without propagating past a single handler.
#[derive(thiserror::Error, Debug)]
pub enum SeederError {
    #[error("malformed frame from {addr}: {reason}")]
    MalformedFrame { addr: SocketAddr, reason: String },

    #[error("unknown request type {tag} from {addr}")]
    UnknownRequestType { addr: SocketAddr, tag: u8 },

    #[error("mutation targeting unknown peer {address:?}")]
    UnknownPeer { address: String },

    #[error("hello for already-registered peer {address:?}")]
    DuplicateRegistration { address: String },

    #[error("failed to send reply to {addr}: {source:#}")]
    SendFailure {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind UDP socket on port {port}: {source:#}")]
    BindFailure {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = core::result::Result<T, SeederError>;
