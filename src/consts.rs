//! Compile-time tunables.
//!
//! These encode wire-protocol timing and sizing that must match the Atom
//! module's firmware; they are constants, not runtime configuration.

use std::time::Duration;

/// Start-of-frame marker.
pub const SOF: u8 = 0x7E;

/// Largest payload the frame codec will accept on read.
pub const MAX_FRAME_PAYLOAD: usize = 256;

/// Polling tick used while waiting for the next byte of a frame.
pub const BYTE_POLL_TICK_US: u64 = 500;

/// Number of `BYTE_POLL_TICK_US` ticks to wait for a byte before timing out
/// (~1 second).
pub const SERIAL_WAIT_TIMEOUT_TICKS: u32 = 2000;

/// Application-level retry budget for `send`, covering transient NACK /
/// channel-access rejections. The module itself already retries at the
/// radio level; this covers host-observable rejections on top of that.
pub const SEND_RETRIES: u8 = 3;

/// Sleep between `poll` attempts.
pub const HELIUM_POLL_WAIT_US: u64 = 500_000;

pub fn poll_wait() -> Duration {
    Duration::from_micros(HELIUM_POLL_WAIT_US)
}

/// Number of `poll` attempts covering a 60 second window.
pub const HELIUM_POLL_RETRIES_60S: u32 = ((1_000_000 / HELIUM_POLL_WAIT_US) * 60) as u32;

/// Largest channel name accepted by `channel_create`.
pub const HELIUM_MAX_CHANNEL_NAME_SIZE: usize = 16;

/// Largest data payload accepted by `channel_send`.
pub const HELIUM_MAX_DATA_SIZE: usize = 192;

/// Largest byte vector the `send` command will upload in one transaction.
pub const VECTOR_MAX_LEN_FRAME_APP: usize = 200;

/// Size in bytes of the opaque, modem-issued reconnection descriptor.
pub const CONNECTION_DESCRIPTOR_SIZE: usize = 24;

/// Size in bytes of the firmware version string embedded in `info` responses.
pub const FW_VERSION_SIZE: usize = 16;
