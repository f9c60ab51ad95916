//! TCP-facing wire protocols: the queued control channel, the status
//! notifier, and the stateless direct passthrough. All three share one
//! [`awg_core::Engine`].

mod error;
mod queued;

pub mod direct;
pub mod notifier;

pub use error::{NotifierError, ProtocolError};
pub use queued::{Command, DEFAULT_TIMEOUT as QUEUED_DEFAULT_TIMEOUT, serve as serve_queued};

pub use direct::DEFAULT_TIMEOUT as DIRECT_DEFAULT_TIMEOUT;
