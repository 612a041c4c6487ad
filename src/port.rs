//! The serial port contract and its concrete adapters.
//!
//! The core never assumes a particular serial backend: it only needs the
//! four primitives below. [`sync`] feature users get a blocking adapter
//! over [`serial2::SerialPort`]; [`async` feature] users get a
//! `tokio`-driven adapter over [`serial2_tokio::SerialPort`].

use crate::consts::BYTE_POLL_TICK_US;

/// Blocking serial port contract required by the transport layer.
///
/// Implementations never block indefinitely on a single byte: callers poll
/// [`SerialPort::readable`] and sleep between checks via
/// [`SerialPort::wait_us`].
pub trait SerialPort {
    /// True iff at least one byte can be read without blocking.
    fn readable(&mut self) -> bool;
    /// Consume one byte. `None` on a hard I/O error.
    fn getc(&mut self) -> Option<u8>;
    /// Transmit one byte. `false` on a hard I/O error.
    fn putc(&mut self, byte: u8) -> bool;
    /// Block the caller for approximately `micros` microseconds.
    fn wait_us(&mut self, micros: u64);
}

/// Spin on [`SerialPort::readable`], sleeping [`BYTE_POLL_TICK_US`] between
/// checks, until a byte is available or `timeout_ticks` elapses.
pub(crate) fn wait_for_byte<P: SerialPort + ?Sized>(port: &mut P, timeout_ticks: u32) -> bool {
    let mut ticks = timeout_ticks;
    while ticks > 0 {
        if port.readable() {
            return true;
        }
        port.wait_us(BYTE_POLL_TICK_US);
        ticks -= 1;
    }
    false
}

/// Async serial port contract, mirroring [`SerialPort`] one-for-one for use
/// under a cooperative-concurrency runtime.
#[cfg(feature = "async")]
pub trait AsyncSerialPort {
    /// True iff at least one byte can be read without blocking.
    fn readable(&mut self) -> impl std::future::Future<Output = bool> + Send;
    /// Consume one byte. `None` on a hard I/O error.
    fn getc(&mut self) -> impl std::future::Future<Output = Option<u8>> + Send;
    /// Transmit one byte. `false` on a hard I/O error.
    fn putc(&mut self, byte: u8) -> impl std::future::Future<Output = bool> + Send;
    /// Suspend the task for approximately `micros` microseconds.
    fn wait_us(&mut self, micros: u64) -> impl std::future::Future<Output = ()> + Send;
}

#[cfg(feature = "async")]
pub(crate) async fn wait_for_byte_async<P: AsyncSerialPort + ?Sized>(
    port: &mut P,
    timeout_ticks: u32,
) -> bool {
    let mut ticks = timeout_ticks;
    while ticks > 0 {
        if port.readable().await {
            return true;
        }
        port.wait_us(BYTE_POLL_TICK_US).await;
        ticks -= 1;
    }
    false
}

/// Blocking adapter over a real serial device.
#[cfg(feature = "sync")]
pub struct Serial2Port {
    inner: serial2::SerialPort,
}

#[cfg(feature = "sync")]
impl Serial2Port {
    pub fn open(path: &str, baud: u32) -> std::io::Result<Self> {
        Ok(Self {
            inner: serial2::SerialPort::open(path, baud)?,
        })
    }
}

#[cfg(feature = "sync")]
impl SerialPort for Serial2Port {
    fn readable(&mut self) -> bool {
        // serial2 has no direct "bytes available" probe; a zero-timeout
        // read tells us whether a byte is already buffered without
        // blocking the caller.
        use std::io::Read;
        self.inner
            .set_read_timeout(std::time::Duration::from_micros(0))
            .ok();
        let mut probe = [0u8; 1];
        matches!(self.inner.read(&mut probe), Ok(1))
    }

    fn getc(&mut self) -> Option<u8> {
        use std::io::Read;
        let mut byte = [0u8; 1];
        self.inner
            .set_read_timeout(std::time::Duration::from_millis(10))
            .ok();
        match self.inner.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn putc(&mut self, byte: u8) -> bool {
        use std::io::Write;
        self.inner.write_all(&[byte]).is_ok()
    }

    fn wait_us(&mut self, micros: u64) {
        std::thread::sleep(std::time::Duration::from_micros(micros));
    }
}

/// Async adapter over a real serial device, driven by `tokio`.
#[cfg(feature = "async")]
pub struct Serial2PortAsync {
    inner: serial2_tokio::SerialPort,
}

#[cfg(feature = "async")]
impl Serial2PortAsync {
    pub fn open(path: &str, baud: u32) -> std::io::Result<Self> {
        Ok(Self {
            inner: serial2_tokio::SerialPort::open(path, baud)?,
        })
    }
}

#[cfg(feature = "async")]
impl AsyncSerialPort for Serial2PortAsync {
    async fn readable(&mut self) -> bool {
        tokio::time::timeout(std::time::Duration::from_micros(0), self.inner.readable())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    async fn getc(&mut self) -> Option<u8> {
        use tokio::io::AsyncReadExt;
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte).await {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    async fn putc(&mut self, byte: u8) -> bool {
        use tokio::io::AsyncWriteExt;
        self.inner.write_all(&[byte]).await.is_ok()
    }

    async fn wait_us(&mut self, micros: u64) {
        tokio::time::sleep(std::time::Duration::from_micros(micros)).await;
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::SerialPort;
    use std::collections::VecDeque;

    /// Deterministic in-memory port for unit tests: `inbound` is drained by
    /// `getc`, writes accumulate in `outbound`. No simulated latency, so
    /// `wait_us` is a no-op tick counted for assertions on call count.
    #[derive(Default)]
    pub(crate) struct MockPort {
        pub inbound: VecDeque<u8>,
        pub outbound: Vec<u8>,
        pub wait_calls: usize,
        pub hard_io_error: bool,
    }

    impl MockPort {
        pub(crate) fn with_inbound(bytes: &[u8]) -> Self {
            Self {
                inbound: bytes.iter().copied().collect(),
                ..Default::default()
            }
        }

        pub(crate) fn push_inbound(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes.iter().copied());
        }
    }

    impl SerialPort for MockPort {
        fn readable(&mut self) -> bool {
            !self.inbound.is_empty()
        }

        fn getc(&mut self) -> Option<u8> {
            if self.hard_io_error {
                return None;
            }
            self.inbound.pop_front()
        }

        fn putc(&mut self, byte: u8) -> bool {
            if self.hard_io_error {
                return false;
            }
            self.outbound.push(byte);
            true
        }

        fn wait_us(&mut self, _micros: u64) {
            self.wait_calls += 1;
        }
    }
}
