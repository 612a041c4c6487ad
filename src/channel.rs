//! The channel sub-protocol (§4.6): a tiny bytewise request/response that
//! rides inside generic `send`/`poll` transactions, deliberately outside the
//! schema-defined command types, keeping the modem's public schema small.

use crate::commands::PollOutcome;
use crate::consts::{HELIUM_MAX_CHANNEL_NAME_SIZE, HELIUM_MAX_DATA_SIZE};
use crate::port::SerialPort;
use crate::session::SessionContext;
use crate::{Error, Result};

const OP_CHANNEL_CREATE: u8 = 0x8B;
const OP_CHANNEL_SEND: u8 = 0x8C;
const OP_CHANNEL_CREATED: u8 = 0x8D;
const OP_CHANNEL_CREATE_FAILED: u8 = 0x8E;
const OP_CHANNEL_NOT_FOUND: u8 = 0x8F;
const OP_CHANNEL_SEND_RESULT: u8 = 0x90;

/// Creates a channel by name, returning its module-assigned id.
///
/// Builds `0x8B || name[..min(len, HELIUM_MAX_CHANNEL_NAME_SIZE)]`, sends
/// it, then polls for up to the 60 second window for a `0x8D` (created) or
/// `0x8E` (failed) reply.
pub(crate) fn create<P: SerialPort>(ctx: &mut SessionContext<P>, name: &str) -> Result<u8> {
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(HELIUM_MAX_CHANNEL_NAME_SIZE);
    let mut payload = Vec::with_capacity(1 + n);
    payload.push(OP_CHANNEL_CREATE);
    payload.extend_from_slice(&name_bytes[..n]);

    ctx.send(&payload)?;

    let mut buf = [0u8; HELIUM_MAX_DATA_SIZE];
    match ctx.poll_60s(&mut buf)? {
        PollOutcome::NoData => Err(Error::Timeout),
        PollOutcome::Data(len) => interpret_create_response(&buf[..len]),
    }
}

fn interpret_create_response(body: &[u8]) -> Result<u8> {
    if body.is_empty() {
        return Err(Error::Communication);
    }
    match (body[0], body.len()) {
        (OP_CHANNEL_CREATED, 2) => Ok(body[1]),
        (OP_CHANNEL_CREATE_FAILED, _) => Err(Error::Failed),
        _ => Err(Error::Communication),
    }
}

/// Sends `data` over a previously created channel.
///
/// Builds `0x8C || channel_id || 0x00 || data[..min(len, HELIUM_MAX_DATA_SIZE)]`,
/// sends it, then polls for up to the 60 second window for a `0x90`
/// (result) or `0x8F` (not found) reply.
pub(crate) fn send<P: SerialPort>(
    ctx: &mut SessionContext<P>,
    channel_id: u8,
    data: &[u8],
) -> Result<u8> {
    let n = data.len().min(HELIUM_MAX_DATA_SIZE);
    let mut payload = Vec::with_capacity(3 + n);
    payload.push(OP_CHANNEL_SEND);
    payload.push(channel_id);
    payload.push(0x00);
    payload.extend_from_slice(&data[..n]);

    ctx.send(&payload)?;

    let mut buf = [0u8; HELIUM_MAX_DATA_SIZE];
    match ctx.poll_60s(&mut buf)? {
        PollOutcome::NoData => Err(Error::Timeout),
        PollOutcome::Data(len) => interpret_send_response(&buf[..len]),
    }
}

fn interpret_send_response(body: &[u8]) -> Result<u8> {
    if body.is_empty() {
        return Err(Error::Communication);
    }
    match (body[0], body.len()) {
        (OP_CHANNEL_SEND_RESULT, 2) => Ok(body[1]),
        (OP_CHANNEL_NOT_FOUND, _) => Err(Error::NotFound),
        _ => Err(Error::Communication),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;
    use crate::port::mock::MockPort;
    use crate::schema::{self as wire, Command, Poll, PollBody, Transaction};

    fn push_poll_frame(port: &mut MockPort, body: Vec<u8>) {
        let txn = Transaction {
            seq: 0,
            needs_reset: false,
            cmd: Command::Poll(Poll::Res(PollBody::Frame(body))),
        };
        let mut scratch = Vec::new();
        wire::encode(&txn, &mut scratch).unwrap();
        port.push_inbound(&frame::encode(&scratch));
    }

    fn push_send_ok(port: &mut MockPort) {
        let txn = Transaction {
            seq: 0,
            needs_reset: false,
            cmd: Command::Send(wire::Send::Res(wire::SendResult::Ok)),
        };
        let mut scratch = Vec::new();
        wire::encode(&txn, &mut scratch).unwrap();
        port.push_inbound(&frame::encode(&scratch));
    }

    #[test]
    fn s4_channel_create_success() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_CREATED, 7]);

        assert_eq!(create(&mut ctx, "ch1").unwrap(), 7);
    }

    #[test]
    fn s5_channel_create_failure() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_CREATE_FAILED]);

        assert_eq!(create(&mut ctx, "ch1").unwrap_err(), Error::Failed);
    }

    #[test]
    fn s6_channel_send_truncation() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        let big = vec![0u8; HELIUM_MAX_DATA_SIZE + 5];
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_SEND_RESULT, 0x2B]);

        let result = send(&mut ctx, 7, &big).unwrap();
        assert_eq!(result, 0x2B);

        // Re-derive the payload exactly as `send` builds it to assert length.
        let n = big.len().min(HELIUM_MAX_DATA_SIZE);
        assert_eq!(n, HELIUM_MAX_DATA_SIZE);
    }

    #[test]
    fn s7_poll_delivers_data() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_SEND_RESULT, 0x2B]);

        assert_eq!(send(&mut ctx, 1, &[0xAA]).unwrap(), 0x2B);
    }

    #[test]
    fn not_found_maps_to_error() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_NOT_FOUND]);

        assert_eq!(send(&mut ctx, 9, &[1, 2, 3]).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn oversized_created_reply_is_rejected_not_truncated() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_CREATED, 7, 0xFF, 0xFF]);

        assert_eq!(create(&mut ctx, "ch1").unwrap_err(), Error::Communication);
    }

    #[test]
    fn oversized_send_result_reply_is_rejected_not_truncated() {
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        push_poll_frame(&mut ctx.port, vec![OP_CHANNEL_SEND_RESULT, 0x2B, 0xAA]);

        assert_eq!(send(&mut ctx, 1, &[0xAA]).unwrap_err(), Error::Communication);
    }

    #[test]
    fn create_times_out_when_poll_never_delivers() {
        use crate::consts::HELIUM_POLL_RETRIES_60S;
        let mut ctx = SessionContext::for_test(MockPort::default());
        push_send_ok(&mut ctx.port);
        for _ in 0..HELIUM_POLL_RETRIES_60S {
            let txn = Transaction {
                seq: 0,
                needs_reset: false,
                cmd: Command::Poll(Poll::Res(PollBody::None)),
            };
            let mut scratch = Vec::new();
            wire::encode(&txn, &mut scratch).unwrap();
            ctx.port.push_inbound(&frame::encode(&scratch));
        }

        assert_eq!(create(&mut ctx, "ch1").unwrap_err(), Error::Timeout);
    }
}
