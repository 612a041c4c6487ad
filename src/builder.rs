//! Type-state session builder (§4.9), mirroring the teacher crate's
//! `BaseContextBuilder`. The builder owns no protocol behavior beyond
//! parameter collection and handing the opened port to the session
//! constructor.

use crate::port::Serial2Port;
use crate::session::SessionContext;
use std::marker::PhantomData;

#[cfg(feature = "async")]
use crate::port::Serial2PortAsync;
#[cfg(feature = "async")]
use crate::session::SessionContextAsync;

const DEFAULT_BAUD: u32 = 115_200;

/// Type-state builder states.
pub struct Init;
pub struct Serial;
#[cfg(feature = "async")]
pub struct SerialAsync;

/// Type-state builder for [`SessionContext`], selecting the transport at
/// compile time.
pub struct SessionBuilder<T> {
    com_port: Option<String>,
    baud_rate: u32,
    _marker: PhantomData<T>,
}

impl Default for SessionBuilder<Init> {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder<Init> {
    /// Starts the type-state builder.
    pub fn new() -> Self {
        Self {
            com_port: None,
            baud_rate: DEFAULT_BAUD,
            _marker: PhantomData,
        }
    }

    /// Continues toward a blocking session over `com_port`.
    pub fn with_serial(self, com_port: &str) -> SessionBuilder<Serial> {
        SessionBuilder {
            com_port: Some(com_port.into()),
            baud_rate: self.baud_rate,
            _marker: PhantomData,
        }
    }

    /// Continues toward an async session over `com_port`, driven by `tokio`.
    #[cfg(feature = "async")]
    pub fn with_serial_async(self, com_port: &str) -> SessionBuilder<SerialAsync> {
        SessionBuilder {
            com_port: Some(com_port.into()),
            baud_rate: self.baud_rate,
            _marker: PhantomData,
        }
    }
}

impl SessionBuilder<Serial> {
    /// Overrides the default baud rate used to open the port (unrelated to
    /// the `baud` command, which reconfigures the module's own UART).
    pub fn baud(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Opens the serial device and returns a blocking [`SessionContext`].
    pub fn build(self) -> std::io::Result<SessionContext<Serial2Port>> {
        let port = Serial2Port::open(
            self.com_port
                .as_deref()
                .expect("com_port required to reach the serial build method"),
            self.baud_rate,
        )?;
        Ok(SessionContext::new(port))
    }
}

#[cfg(feature = "async")]
pub use self::r#async::SessionBuilderAsync;

#[cfg(feature = "async")]
mod r#async {
    use super::*;

    /// Type-state builder for [`SessionContextAsync`].
    pub struct SessionBuilderAsync {
        com_port: String,
        baud_rate: u32,
    }

    impl SessionBuilder<SerialAsync> {
        /// Overrides the default baud rate used to open the port.
        pub fn baud(self, rate: u32) -> SessionBuilderAsync {
            SessionBuilderAsync {
                com_port: self.com_port.expect("com_port set by with_serial_async"),
                baud_rate: rate,
            }
        }

        /// Opens the serial device and returns an async [`SessionContextAsync`].
        pub fn build(self) -> std::io::Result<SessionContextAsync<Serial2PortAsync>> {
            SessionBuilderAsync {
                com_port: self.com_port.expect("com_port set by with_serial_async"),
                baud_rate: self.baud_rate,
            }
            .build()
        }
    }

    impl SessionBuilderAsync {
        /// Opens the serial device and returns an async [`SessionContextAsync`].
        pub fn build(self) -> std::io::Result<SessionContextAsync<Serial2PortAsync>> {
            let port = Serial2PortAsync::open(&self.com_port, self.baud_rate)?;
            Ok(SessionContextAsync::new(port))
        }
    }
}
