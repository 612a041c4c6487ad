//! Transaction engine: sequence assignment, frame write, frame read, schema
//! decode (§4.4). This is the one layer that talks to both the frame codec
//! and the wire schema; everything above it only ever sees [`EngineStatus`]
//! or the command-layer [`crate::Error`] taxonomy.

use crate::consts::{MAX_FRAME_PAYLOAD, SERIAL_WAIT_TIMEOUT_TICKS};
use crate::frame::{self, DecodeOutcome, FrameDecoder};
use crate::port::{SerialPort, wait_for_byte};
use crate::schema::{self, Transaction};
use derive_more::Display;
use tracing::{debug, error, trace, warn};

#[cfg(feature = "async")]
use crate::port::{AsyncSerialPort, wait_for_byte_async};

/// Outcome of one `send_command` round trip.
///
/// `connect` is the one command that returns this directly instead of
/// folding it into [`crate::Error`] (see [`crate::commands::connect`]).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    #[display("ok")]
    Ok,
    /// The schema encoder rejected the outgoing transaction.
    #[display("schema encode failure")]
    Encode,
    /// A frame write/read fault: timeout, checksum, overflow, or port I/O.
    #[display("communication failure")]
    Communication,
    /// The schema decoder rejected the incoming payload.
    #[display("schema decode failure")]
    Decode,
}

impl EngineStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, EngineStatus::Ok)
    }
}

/// Run one full request/response exchange over `port`, using and updating
/// `seq`, `txn`, and `scratch` in place (§4.4).
pub(crate) fn send_command<P: SerialPort + ?Sized>(
    port: &mut P,
    seq: &mut u16,
    txn: &mut Transaction,
    scratch: &mut Vec<u8>,
) -> EngineStatus {
    txn.seq = *seq;
    *seq = seq.wrapping_add(1);
    trace!(seq = txn.seq, "assigned transaction sequence");

    if schema::encode(txn, scratch).is_err() {
        error!(seq = txn.seq, "schema encode failed");
        return EngineStatus::Encode;
    }

    let frame = frame::encode(scratch);
    for &byte in &frame {
        if !port.putc(byte) {
            warn!(seq = txn.seq, "port write failed mid-frame");
            return EngineStatus::Communication;
        }
    }
    debug!(seq = txn.seq, len = frame.len(), "wrote frame");

    let payload = match read_frame(port) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(seq = txn.seq, error = %e, "frame read failed");
            return EngineStatus::Communication;
        }
    };

    match schema::decode(&payload) {
        Ok(decoded) => {
            debug!(seq = decoded.seq, "decoded response");
            *txn = decoded;
            EngineStatus::Ok
        }
        Err(e) => {
            error!(seq = txn.seq, error = %e, "schema decode failed");
            EngineStatus::Decode
        }
    }
}

fn read_frame<P: SerialPort + ?Sized>(port: &mut P) -> Result<Vec<u8>, frame::FrameError> {
    let mut decoder = FrameDecoder::new(MAX_FRAME_PAYLOAD);
    let mut payload = Vec::new();
    loop {
        if !wait_for_byte(port, SERIAL_WAIT_TIMEOUT_TICKS) {
            return Err(frame::FrameError::Timeout);
        }
        let byte = port.getc().ok_or(frame::FrameError::Io)?;
        match decoder.feed(byte, &mut payload)? {
            DecodeOutcome::Pending => continue,
            DecodeOutcome::Done => return Ok(payload),
        }
    }
}

#[cfg(feature = "async")]
pub(crate) async fn send_command_async<P: AsyncSerialPort + ?Sized>(
    port: &mut P,
    seq: &mut u16,
    txn: &mut Transaction,
    scratch: &mut Vec<u8>,
) -> EngineStatus {
    txn.seq = *seq;
    *seq = seq.wrapping_add(1);
    trace!(seq = txn.seq, "assigned transaction sequence");

    if schema::encode(txn, scratch).is_err() {
        error!(seq = txn.seq, "schema encode failed");
        return EngineStatus::Encode;
    }

    let frame = frame::encode(scratch);
    for &byte in &frame {
        if !port.putc(byte).await {
            warn!(seq = txn.seq, "port write failed mid-frame");
            return EngineStatus::Communication;
        }
    }
    debug!(seq = txn.seq, len = frame.len(), "wrote frame");

    let payload = match read_frame_async(port).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(seq = txn.seq, error = %e, "frame read failed");
            return EngineStatus::Communication;
        }
    };

    match schema::decode(&payload) {
        Ok(decoded) => {
            debug!(seq = decoded.seq, "decoded response");
            *txn = decoded;
            EngineStatus::Ok
        }
        Err(e) => {
            error!(seq = txn.seq, error = %e, "schema decode failed");
            EngineStatus::Decode
        }
    }
}

#[cfg(feature = "async")]
async fn read_frame_async<P: AsyncSerialPort + ?Sized>(
    port: &mut P,
) -> Result<Vec<u8>, frame::FrameError> {
    let mut decoder = FrameDecoder::new(MAX_FRAME_PAYLOAD);
    let mut payload = Vec::new();
    loop {
        if !wait_for_byte_async(port, SERIAL_WAIT_TIMEOUT_TICKS).await {
            return Err(frame::FrameError::Timeout);
        }
        let byte = port.getc().await.ok_or(frame::FrameError::Io)?;
        match decoder.feed(byte, &mut payload)? {
            DecodeOutcome::Pending => continue,
            DecodeOutcome::Done => return Ok(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::schema::{Baud, BaudReqBody, BaudResBody, Command};

    fn baud_txn() -> Transaction {
        Transaction {
            seq: 0,
            needs_reset: false,
            cmd: Command::Baud(Baud::Req(BaudReqBody { rate: 115_200 })),
        }
    }

    #[test]
    fn sequence_increments_once_per_call() {
        let mut seq = 10u16;
        let mut scratch = Vec::new();
        for expected in 10..13u16 {
            let mut txn = baud_txn();
            let mut response = Transaction {
                seq: expected,
                needs_reset: false,
                cmd: Command::Baud(Baud::Res(BaudResBody { ok: true })),
            };
            schema::encode(&response, &mut scratch).unwrap();
            let framed = frame::encode(&scratch);
            let mut port = MockPort::with_inbound(&framed);

            let status = send_command(&mut port, &mut seq, &mut txn, &mut scratch);
            assert_eq!(status, EngineStatus::Ok);
            assert_eq!(txn.seq, expected);
            let _ = &mut response;
        }
        assert_eq!(seq, 13);
    }

    #[test]
    fn hard_io_error_is_communication() {
        let mut seq = 0u16;
        let mut scratch = Vec::new();
        let mut txn = baud_txn();
        let mut port = MockPort::default();
        port.hard_io_error = true;
        let status = send_command(&mut port, &mut seq, &mut txn, &mut scratch);
        assert_eq!(status, EngineStatus::Communication);
    }

    #[test]
    fn timeout_when_no_bytes_arrive() {
        let mut seq = 0u16;
        let mut scratch = Vec::new();
        let mut txn = baud_txn();
        let mut port = MockPort::default();
        let status = send_command(&mut port, &mut seq, &mut txn, &mut scratch);
        assert_eq!(status, EngineStatus::Communication);
    }
}
