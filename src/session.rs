//! The session context (§3): one per physical link, owning the serial port
//! handle, the scratch buffer and transaction record, and the sequence
//! counter. Command and channel methods are thin dispatchers onto
//! [`crate::commands`] and [`crate::channel`]; the session itself holds no
//! protocol logic.

use crate::commands::{self, ConnectResponse, PollOutcome};
use crate::consts::{HELIUM_POLL_RETRIES_60S, MAX_FRAME_PAYLOAD};
use crate::engine::EngineStatus;
use crate::port::SerialPort;
use crate::schema::{Connection, Info, Transaction};
use crate::{channel, Result};

/// One session per physical link to the Atom module (§3). Not `Clone`: the
/// scratch buffer and transaction record are exclusive to the in-flight
/// call, and the type has no safe way to be shared across threads without
/// external synchronization the core does not provide.
pub struct SessionContext<P: SerialPort> {
    pub(crate) port: P,
    pub(crate) scratch: Vec<u8>,
    pub(crate) seq: u16,
    pub(crate) txn: Transaction,
}

impl<P: SerialPort> SessionContext<P> {
    pub(crate) fn new(port: P) -> Self {
        Self {
            port,
            scratch: Vec::with_capacity(MAX_FRAME_PAYLOAD),
            seq: 0,
            txn: Transaction::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(port: P) -> Self {
        Self::new(port)
    }

    /// The modem's sticky reset signal, as reported by the last decoded
    /// response. Not cleared by the core (§4.4).
    pub fn needs_reset(&self) -> bool {
        self.txn.needs_reset
    }

    /// Sets the module's serial baud rate. Unrecognized rates default to
    /// 9600 (§4.5).
    pub fn baud(&mut self, rate: u32) -> Result<()> {
        commands::baud(self, rate)
    }

    /// Projects `mac`, `uptime`, `time`, `fw_version`, and `radio_count`
    /// from the module's info response.
    pub fn info(&mut self) -> Result<Info> {
        commands::info(self)
    }

    /// `Ok(())` iff the module reports the radio is attached.
    pub fn connected(&mut self) -> Result<()> {
        commands::connected(self)
    }

    /// Issues a cold connect, or a quick reconnect when `connection` is
    /// supplied. Deliberately returns the raw [`EngineStatus`] rather than
    /// the shared [`crate::Error`] taxonomy (see [`commands::connect`]).
    pub fn connect(&mut self, connection: Option<&Connection>) -> (EngineStatus, ConnectResponse) {
        commands::connect(self, connection)
    }

    /// Requests the module sleep. On success, if `connection` is supplied
    /// it is filled with the module's current reconnection descriptor for
    /// a later quick resume.
    pub fn sleep(&mut self, connection: Option<&mut Connection>) -> Result<()> {
        commands::sleep(self, connection)
    }

    /// Creates a named channel, returning its module-assigned id.
    pub fn channel_create(&mut self, name: &str) -> Result<u8> {
        channel::create(self, name)
    }

    /// Sends `data` over a previously created channel, returning the
    /// module's one-byte send result.
    pub fn channel_send(&mut self, channel_id: u8, data: &[u8]) -> Result<u8> {
        channel::send(self, channel_id, data)
    }

    pub(crate) fn send(&mut self, data: &[u8]) -> Result<()> {
        commands::send(self, data)
    }

    pub(crate) fn poll(&mut self, buffer: &mut [u8], retries: u32) -> Result<PollOutcome> {
        commands::poll(self, buffer, retries)
    }

    pub(crate) fn poll_60s(&mut self, buffer: &mut [u8]) -> Result<PollOutcome> {
        self.poll(buffer, HELIUM_POLL_RETRIES_60S)
    }
}

#[cfg(feature = "async")]
pub use self::r#async::SessionContextAsync;

#[cfg(feature = "async")]
mod r#async {
    use super::*;
    use crate::commands_async;
    use crate::port::AsyncSerialPort;

    /// Async counterpart to [`SessionContext`], driven by an
    /// [`AsyncSerialPort`] under a `tokio` runtime. The single-outstanding-
    /// transaction invariant is unchanged: callers must not run two
    /// transactions concurrently on the same session (§5).
    pub struct SessionContextAsync<P: AsyncSerialPort> {
        pub(crate) port: P,
        pub(crate) scratch: Vec<u8>,
        pub(crate) seq: u16,
        pub(crate) txn: Transaction,
    }

    impl<P: AsyncSerialPort> SessionContextAsync<P> {
        pub(crate) fn new(port: P) -> Self {
            Self {
                port,
                scratch: Vec::with_capacity(MAX_FRAME_PAYLOAD),
                seq: 0,
                txn: Transaction::new(),
            }
        }

        pub fn needs_reset(&self) -> bool {
            self.txn.needs_reset
        }

        pub async fn baud(&mut self, rate: u32) -> Result<()> {
            commands_async::baud(self, rate).await
        }

        pub async fn info(&mut self) -> Result<Info> {
            commands_async::info(self).await
        }

        pub async fn connected(&mut self) -> Result<()> {
            commands_async::connected(self).await
        }

        pub async fn connect(
            &mut self,
            connection: Option<&Connection>,
        ) -> (EngineStatus, ConnectResponse) {
            commands_async::connect(self, connection).await
        }

        pub async fn sleep(&mut self, connection: Option<&mut Connection>) -> Result<()> {
            commands_async::sleep(self, connection).await
        }

        pub async fn channel_create(&mut self, name: &str) -> Result<u8> {
            crate::channel_async::create(self, name).await
        }

        pub async fn channel_send(&mut self, channel_id: u8, data: &[u8]) -> Result<u8> {
            crate::channel_async::send(self, channel_id, data).await
        }

        pub(crate) async fn send(&mut self, data: &[u8]) -> Result<()> {
            commands_async::send(self, data).await
        }

        pub(crate) async fn poll(&mut self, buffer: &mut [u8], retries: u32) -> Result<PollOutcome> {
            commands_async::poll(self, buffer, retries).await
        }

        pub(crate) async fn poll_60s(&mut self, buffer: &mut [u8]) -> Result<PollOutcome> {
            self.poll(buffer, HELIUM_POLL_RETRIES_60S).await
        }
    }
}
