use thiserror::Error;

/// Reasons a packet failed to parse. Per-packet, never fatal — the caller
/// logs and drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("packet truncated before expected field end")]
    Truncated,
    #[error("compression pointer referenced an invalid offset")]
    BadPointer,
    #[error("compression pointer chain did not terminate")]
    PointerCycle,
    #[error("label exceeds 63 bytes or name exceeds 255 bytes")]
    LabelTooLong,
    #[error("RDATA did not match its declared type/length")]
    BadRdata,
}

/// Reasons a packet failed to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerateErrorKind {
    #[error("label exceeds 63 bytes or name exceeds 255 bytes")]
    LabelTooLong,
    #[error("TXT key was empty or contained '='")]
    TxtKeyInvalid,
}

/// When things go awry.
#[derive(Debug, Error)]
pub enum MdnsError {
    /// `start()` was given no multicast groups to bind.
    #[error("no multicast groups configured")]
    NoGroups,
    /// `start()` was asked to bind a wildcard address but the interface
    /// collaborator returned no usable interfaces.
    #[error("wildcard bind requested but no network interfaces were found")]
    WildcardNoInterfaces,
    /// A socket failed to bind at start; any sockets opened so far during
    /// this `start()` call have been torn down.
    #[error("failed to bind socket: {0}")]
    BindFailed(String),
    /// An operating-time method was invoked outside `[start, stop)`.
    #[error("operation requires a running node")]
    NotRunning,
    /// The node (or its cache) was used after `destroy()`.
    #[error("node has been destroyed")]
    Destroyed,
    /// The cache was used after it was torn down.
    #[error("cache has been destroyed")]
    CacheDestroyed,
    /// A packet failed to parse; carries the offending reason.
    #[error("failed to parse packet: {0}")]
    Parse(#[from] ParseErrorKind),
    /// A packet failed to generate.
    #[error("failed to generate packet: {0}")]
    Generate(#[from] GenerateErrorKind),
    /// A send on a socket failed; logged, non-fatal unless the socket also
    /// reports [`MdnsError::SocketClosed`].
    #[error("failed to send on socket: {0}")]
    SendFailed(String),
    /// A socket's underlying handle reported a hard close; the binding is
    /// removed from the socket fabric.
    #[error("socket closed: {0}")]
    SocketClosed(String),
    /// Failed to send a command across an internal tokio channel.
    #[error("internal channel closed: {0}")]
    ChannelClosed(String),
    /// Surfaced from an external collaborator (hostname resolution,
    /// interface enumeration).
    #[error("external collaborator failed: {0}")]
    Collaborator(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}

pub type Result<T> = std::result::Result<T, MdnsError>;
