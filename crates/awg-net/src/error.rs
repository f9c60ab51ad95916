use std::io;

use thiserror::Error;

/// Failures on the queued or direct wire. All of them drop the connection;
/// none are reported back to the peer (§7: no acknowledgement bytes).
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unknown opcode {0:#04x}")]
    BadOpcode(u8),
    #[error("payload length out of range")]
    BadLength,
    #[error("invalid list id {0}")]
    InvalidListId(u8),
    #[error("frame word count {0} exceeds MAX_WORDS_PER_FRAME")]
    Overlength(u16),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the connection")]
    PeerClosed,
}

#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
