//! Host-side client for the Atom module, a serial-attached wireless modem.
//!
//! The `atom_link` crate drives the module over a half-duplex byte stream:
//! a checksummed, length-prefixed frame codec carries a request/response
//! transaction protocol, and a small command layer built on top of that
//! exposes device control (identify, baud, connect, sleep) and named data
//! channels (create, send).
//!
//! Only the blocking transport is enabled by default. Enable the `async`
//! feature to drive the module from a `tokio` runtime instead.
//!
//! # Example
//! This example opens a serial connection to the module and checks whether
//! it is currently attached to the network.
//!
//! ```no_run
//! # fn example() -> std::io::Result<()> {
//! use atom_link::SessionBuilder;
//!
//! let mut session = SessionBuilder::new().with_serial("/dev/ttyUSB0").build()?;
//! match session.connected() {
//!     Ok(()) => println!("connected"),
//!     Err(atom_link::Error::NotConnected) => println!("not connected"),
//!     Err(e) => println!("communication error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
use thiserror::Error;

pub mod builder;
pub(crate) mod channel;
pub(crate) mod commands;
pub mod consts;
pub(crate) mod engine;
pub mod frame;
pub mod port;
pub mod schema;
pub mod session;

#[cfg(feature = "async")]
pub(crate) mod channel_async;
#[cfg(feature = "async")]
pub(crate) mod commands_async;

pub use builder::SessionBuilder;
pub use commands::ConnectResponse;
pub use engine::EngineStatus;
pub use schema::{Connection, Info};
pub use session::SessionContext;

#[cfg(feature = "async")]
pub use builder::SessionBuilderAsync;
#[cfg(feature = "async")]
pub use session::SessionContextAsync;

/// Outcome taxonomy shared by every command and channel operation.
///
/// `connect` is the one exception: it deliberately exposes the raw
/// [`engine::EngineStatus`] instead of this taxonomy (see its doc comment).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Any transport fault: timeout, checksum, overflow, port I/O error, or
    /// schema encode/decode failure. The whole command may be retried.
    #[error("communication failure")]
    Communication,
    /// The module reports the radio is not attached.
    #[error("module is not connected")]
    NotConnected,
    /// The module accepted the transaction but failed to deliver it.
    #[error("module dropped the transmission")]
    Dropped,
    /// The module refused to sleep right now.
    #[error("module refused to sleep")]
    KeepAwake,
    /// The polling window was exhausted without data.
    #[error("timed out waiting for a response")]
    Timeout,
    /// The channel id is unknown to the module.
    #[error("channel not found")]
    NotFound,
    /// The module rejected a channel create request.
    #[error("channel create failed")]
    Failed,
}

/// Convenience alias for results returned from command and channel operations.
pub type Result<T> = std::result::Result<T, Error>;
