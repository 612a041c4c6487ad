//! One function per device-control command (§4.5). Each function sets up
//! the scratch transaction, drives the [`crate::engine`], and maps the
//! response onto the shared [`crate::Error`] taxonomy -- except [`connect`],
//! which deliberately returns the raw [`EngineStatus`] (see its doc comment).

use crate::consts::{HELIUM_POLL_WAIT_US, SEND_RETRIES, VECTOR_MAX_LEN_FRAME_APP};
use crate::engine::{self, EngineStatus};
use crate::port::SerialPort;
use crate::schema::{
    self, Baud, BaudReqBody, Connect, ConnectOutcome, ConnectReqBody, ConnectResBody, Connected,
    ConnectedOutcome, ConnectedReqBody, Info, InfoCmd, InfoReqBody, Poll, PollBody, PollReqBody,
    Send as SchemaSend, SendReqBody, SendResult, Sleep, SleepOutcome, SleepReqBody,
};
use crate::session::SessionContext;
use crate::{Error, Result};
use tracing::warn;

const SUPPORTED_BAUD_RATES: [u32; 6] = [9600, 14400, 19200, 38400, 57600, 115200];
const DEFAULT_BAUD_RATE: u32 = 9600;

fn normalize_baud(rate: u32) -> u32 {
    if SUPPORTED_BAUD_RATES.contains(&rate) {
        rate
    } else {
        DEFAULT_BAUD_RATE
    }
}

pub(crate) fn baud<P: SerialPort>(ctx: &mut SessionContext<P>, rate: u32) -> Result<()> {
    let rate = normalize_baud(rate);
    ctx.txn.cmd = schema::Command::Baud(Baud::Req(BaudReqBody { rate }));
    match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
        EngineStatus::Ok => match &ctx.txn.cmd {
            schema::Command::Baud(Baud::Res(res)) if res.ok => Ok(()),
            _ => Err(Error::Communication),
        },
        _ => Err(Error::Communication),
    }
}

pub(crate) fn info<P: SerialPort>(ctx: &mut SessionContext<P>) -> Result<Info> {
    ctx.txn.cmd = schema::Command::Info(InfoCmd::Req(InfoReqBody));
    match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
        EngineStatus::Ok => match &ctx.txn.cmd {
            schema::Command::Info(InfoCmd::Res(res)) => Ok(Info {
                mac: res.mac,
                uptime: res.uptime,
                time: res.time,
                fw_version: res.fw_version.clone(),
                radio_count: res.radio_count,
            }),
            _ => Err(Error::Communication),
        },
        _ => Err(Error::Communication),
    }
}

pub(crate) fn connected<P: SerialPort>(ctx: &mut SessionContext<P>) -> Result<()> {
    ctx.txn.cmd = schema::Command::Connected(Connected::Req(ConnectedReqBody));
    match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
        EngineStatus::Ok => match &ctx.txn.cmd {
            schema::Command::Connected(Connected::Res(ConnectedOutcome::Connected)) => Ok(()),
            schema::Command::Connected(Connected::Res(ConnectedOutcome::NotConnected)) => {
                Err(Error::NotConnected)
            }
            _ => Err(Error::Communication),
        },
        _ => Err(Error::Communication),
    }
}

/// Interpreted response to a [`connect`] call, copied out of the scratch
/// transaction record before it is invalidated by the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectResponse {
    pub connected: bool,
    pub dropped: bool,
    pub connection: Option<crate::schema::Connection>,
}

impl From<&ConnectResBody> for ConnectResponse {
    fn from(res: &ConnectResBody) -> Self {
        match res.outcome {
            ConnectOutcome::Connected => Self {
                connected: true,
                dropped: false,
                connection: Some(res.connection),
            },
            ConnectOutcome::NotConnected => Self {
                connected: false,
                dropped: false,
                connection: None,
            },
            ConnectOutcome::Dropped => Self {
                connected: false,
                dropped: true,
                connection: None,
            },
        }
    }
}

/// Issues a "quick" reconnect when `connection` is supplied, otherwise a
/// cold connect. Deliberately returns the raw [`EngineStatus`] instead of
/// the shared [`Error`] taxonomy (preserved from the distilled spec, see
/// SPEC_FULL.md Open Questions / DESIGN.md): callers that want the shared
/// taxonomy should match on `(status, response)` themselves.
pub(crate) fn connect<P: SerialPort>(
    ctx: &mut SessionContext<P>,
    connection: Option<&crate::schema::Connection>,
) -> (EngineStatus, ConnectResponse) {
    let req = match connection {
        Some(c) => ConnectReqBody::Quick(*c),
        None => ConnectReqBody::Cold,
    };
    ctx.txn.cmd = schema::Command::Connect(Connect::Req(req));
    let status = engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch);
    let response = match (&status, &ctx.txn.cmd) {
        (EngineStatus::Ok, schema::Command::Connect(Connect::Res(res))) => res.into(),
        _ => ConnectResponse::default(),
    };
    (status, response)
}

pub(crate) fn sleep<P: SerialPort>(
    ctx: &mut SessionContext<P>,
    mut connection: Option<&mut crate::schema::Connection>,
) -> Result<()> {
    ctx.txn.cmd = schema::Command::Sleep(Sleep::Req(SleepReqBody));
    match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
        EngineStatus::Ok => match &ctx.txn.cmd {
            schema::Command::Sleep(Sleep::Res(res)) => match res.outcome {
                SleepOutcome::Ok => {
                    if let Some(slot) = connection.as_deref_mut() {
                        *slot = res.connection;
                    }
                    Ok(())
                }
                SleepOutcome::NotConnected => Err(Error::NotConnected),
                SleepOutcome::KeepAwake => Err(Error::KeepAwake),
            },
            _ => Err(Error::Communication),
        },
        _ => Err(Error::Communication),
    }
}

/// Uploads up to `VECTOR_MAX_LEN_FRAME_APP` bytes of `data`; bytes beyond
/// that are silently truncated. Retries transient NACK / channel-access
/// rejections up to [`SEND_RETRIES`] total attempts with no added delay
/// (§4.5); exhausting the retry budget degrades to [`Error::Communication`].
pub(crate) fn send<P: SerialPort>(ctx: &mut SessionContext<P>, data: &[u8]) -> Result<()> {
    let n = data.len().min(VECTOR_MAX_LEN_FRAME_APP);
    let data = data[..n].to_vec();

    for attempt in 1..=SEND_RETRIES {
        ctx.txn.cmd = schema::Command::Send(SchemaSend::Req(SendReqBody { data: data.clone() }));
        match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
            EngineStatus::Ok => match &ctx.txn.cmd {
                schema::Command::Send(SchemaSend::Res(result)) => match result {
                    SendResult::Ok => return Ok(()),
                    SendResult::NotConnected => return Err(Error::NotConnected),
                    SendResult::Dropped => return Err(Error::Dropped),
                    SendResult::Nack | SendResult::ChannelAccess => {
                        warn!(attempt, "transient send rejection, retrying");
                        continue;
                    }
                },
                _ => return Err(Error::Communication),
            },
            _ => return Err(Error::Communication),
        }
    }
    Err(Error::Communication)
}

/// Outcome of one [`poll`] call.
pub(crate) enum PollOutcome {
    /// A frame was delivered; `usize` is the number of bytes copied into
    /// the caller's buffer (truncated if the frame was larger).
    Data(usize),
    /// The polling budget was exhausted without data.
    NoData,
}

/// Polls up to `retries` times, sleeping [`HELIUM_POLL_WAIT_US`] between
/// attempts (never after the last) until a `frame` response arrives or the
/// budget is exhausted (§4.5).
pub(crate) fn poll<P: SerialPort>(
    ctx: &mut SessionContext<P>,
    buffer: &mut [u8],
    retries: u32,
) -> Result<PollOutcome> {
    for attempt in 0..retries {
        ctx.txn.cmd = schema::Command::Poll(Poll::Req(PollReqBody));
        match engine::send_command(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch) {
            EngineStatus::Ok => match &ctx.txn.cmd {
                schema::Command::Poll(Poll::Res(PollBody::None)) => {}
                schema::Command::Poll(Poll::Res(PollBody::Frame(data))) => {
                    let n = data.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&data[..n]);
                    return Ok(PollOutcome::Data(n));
                }
                _ => return Err(Error::Communication),
            },
            _ => return Err(Error::Communication),
        }
        if attempt + 1 < retries {
            ctx.port.wait_us(HELIUM_POLL_WAIT_US);
        }
    }
    Ok(PollOutcome::NoData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::schema::{self as wire, Transaction};
    use crate::session::SessionContext;

    fn session_with_response(txn: &Transaction) -> SessionContext<MockPort> {
        let mut scratch = Vec::new();
        wire::encode(txn, &mut scratch).unwrap();
        let framed = crate::frame::encode(&scratch);
        SessionContext::for_test(MockPort::with_inbound(&framed))
    }

    fn push_response(port: &mut MockPort, txn: &Transaction) {
        let mut scratch = Vec::new();
        wire::encode(txn, &mut scratch).unwrap();
        let framed = crate::frame::encode(&scratch);
        port.push_inbound(&framed);
    }

    #[test]
    fn send_retries_on_nack_then_fails() {
        let mut ctx = session_with_response(&Transaction {
            seq: 0,
            needs_reset: false,
            cmd: wire::Command::Send(wire::Send::Res(SendResult::Nack)),
        });
        for _ in 0..SEND_RETRIES - 1 {
            push_response(
                &mut ctx.port,
                &Transaction {
                    seq: 0,
                    needs_reset: false,
                    cmd: wire::Command::Send(wire::Send::Res(SendResult::Nack)),
                },
            );
        }
        let result = send(&mut ctx, &[1, 2, 3]);
        assert_eq!(result, Err(Error::Communication));
        assert_eq!(ctx.seq, SEND_RETRIES as u16);
    }

    #[test]
    fn send_stops_after_single_dropped() {
        let mut ctx = session_with_response(&Transaction {
            seq: 0,
            needs_reset: false,
            cmd: wire::Command::Send(wire::Send::Res(SendResult::Dropped)),
        });
        let result = send(&mut ctx, &[1, 2, 3]);
        assert_eq!(result, Err(Error::Dropped));
        assert_eq!(ctx.seq, 1);
    }

    #[test]
    fn poll_exhausts_budget_without_sleeping_after_last() {
        let mut ctx = session_with_response(&Transaction {
            seq: 0,
            needs_reset: false,
            cmd: wire::Command::Poll(wire::Poll::Res(PollBody::None)),
        });
        for _ in 0..4 {
            push_response(
                &mut ctx.port,
                &Transaction {
                    seq: 0,
                    needs_reset: false,
                    cmd: wire::Command::Poll(wire::Poll::Res(PollBody::None)),
                },
            );
        }
        let mut buf = [0u8; 8];
        let outcome = poll(&mut ctx, &mut buf, 5).unwrap();
        assert!(matches!(outcome, PollOutcome::NoData));
        // 5 attempts, 4 inter-attempt sleeps (none after the last).
        assert_eq!(ctx.port.wait_calls, 4);
    }

    #[test]
    fn poll_truncates_oversized_frame() {
        let mut ctx = session_with_response(&Transaction {
            seq: 0,
            needs_reset: false,
            cmd: wire::Command::Poll(wire::Poll::Res(PollBody::Frame(vec![0xAB; 8]))),
        });
        let mut buf = [0u8; 4];
        let outcome = poll(&mut ctx, &mut buf, 3).unwrap();
        match outcome {
            PollOutcome::Data(n) => assert_eq!(n, 4),
            PollOutcome::NoData => panic!("expected data"),
        }
    }
}
