//! Hand-written Cauterize-style wire schema for the transaction record.
//!
//! The Atom module's real schema is generated from an external description
//! and is opaque to this crate; this module fixes a concrete, self-consistent
//! binary layout standing in for it so the rest of the crate builds and is
//! testable end to end (see SPEC_FULL.md §4.3). Encoding follows the same
//! tag-byte-then-payload shape used throughout the generated schema: a
//! header (`seq`, `needs_reset`, `cmd_tag`) followed by a command variant
//! that itself carries a one-byte request/response direction tag.

use crate::consts::{CONNECTION_DESCRIPTOR_SIZE, FW_VERSION_SIZE, VECTOR_MAX_LEN_FRAME_APP};
use bytes::{Buf, BufMut};
use derive_more::Display;

/// Failures distinguishable at the schema layer. Fold into
/// [`crate::Error::Communication`] at the command boundary, same as
/// [`crate::frame::FrameError`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    /// Fewer bytes were available than the tag in question requires.
    #[display("transaction payload truncated")]
    Truncated,
    /// A tag byte did not match any known variant.
    #[display("unrecognized schema tag {_0:#04x}")]
    UnknownTag(u8),
    /// A length-prefixed string was not valid UTF-8.
    #[display("invalid utf-8 in schema field")]
    InvalidUtf8,
}

/// Opaque, modem-issued reconnection descriptor. Round-tripped by the host
/// without interpretation; only `connect` and `sleep` produce or consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub bytes: [u8; CONNECTION_DESCRIPTOR_SIZE],
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            bytes: [0u8; CONNECTION_DESCRIPTOR_SIZE],
        }
    }
}

impl Connection {
    fn read(buf: &mut impl Buf) -> Result<Self, SchemaError> {
        if buf.remaining() < CONNECTION_DESCRIPTOR_SIZE {
            return Err(SchemaError::Truncated);
        }
        let mut bytes = [0u8; CONNECTION_DESCRIPTOR_SIZE];
        buf.copy_to_slice(&mut bytes);
        Ok(Self { bytes })
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.bytes);
    }
}

/// Projected fields of an `info` response (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub mac: [u8; 6],
    pub uptime: u32,
    pub time: u32,
    pub fw_version: String,
    pub radio_count: u8,
}

// --- Baud -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BaudReqBody {
    pub(crate) rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BaudResBody {
    pub(crate) ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Baud {
    Req(BaudReqBody),
    Res(BaudResBody),
}

// --- Info ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InfoReqBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InfoResBody {
    pub(crate) mac: [u8; 6],
    pub(crate) uptime: u32,
    pub(crate) time: u32,
    pub(crate) fw_version: String,
    pub(crate) radio_count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InfoCmd {
    Req(InfoReqBody),
    Res(InfoResBody),
}

// --- Connected ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectedReqBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectedOutcome {
    Connected,
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connected {
    Req(ConnectedReqBody),
    Res(ConnectedOutcome),
}

// --- Connect ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectReqBody {
    Cold,
    Quick(Connection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectOutcome {
    Connected,
    NotConnected,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectResBody {
    pub(crate) outcome: ConnectOutcome,
    pub(crate) connection: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Connect {
    Req(ConnectReqBody),
    Res(ConnectResBody),
}

// --- Sleep --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SleepReqBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SleepOutcome {
    Ok,
    NotConnected,
    KeepAwake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SleepResBody {
    pub(crate) outcome: SleepOutcome,
    pub(crate) connection: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sleep {
    Req(SleepReqBody),
    Res(SleepResBody),
}

// --- Send ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SendReqBody {
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendResult {
    Ok,
    NotConnected,
    Dropped,
    Nack,
    ChannelAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Send {
    Req(SendReqBody),
    Res(SendResult),
}

// --- Poll ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollReqBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollBody {
    None,
    Frame(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Poll {
    Req(PollReqBody),
    Res(PollBody),
}

// --- Command / Transaction -------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Baud(Baud),
    Info(InfoCmd),
    Connected(Connected),
    Connect(Connect),
    Sleep(Sleep),
    Send(Send),
    Poll(Poll),
}

/// The scratch transaction record shared by request and response of one
/// exchange (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transaction {
    pub(crate) seq: u16,
    pub(crate) needs_reset: bool,
    pub(crate) cmd: Command,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self {
            seq: 0,
            needs_reset: false,
            cmd: Command::Info(InfoCmd::Req(InfoReqBody)),
        }
    }
}

const TAG_BAUD: u8 = 0;
const TAG_INFO: u8 = 1;
const TAG_CONNECTED: u8 = 2;
const TAG_CONNECT: u8 = 3;
const TAG_SLEEP: u8 = 4;
const TAG_SEND: u8 = 5;
const TAG_POLL: u8 = 6;

const DIR_REQ: u8 = 0;
const DIR_RES: u8 = 1;

fn read_string(buf: &mut impl Buf, max_len: usize) -> Result<String, SchemaError> {
    if buf.remaining() < 1 {
        return Err(SchemaError::Truncated);
    }
    let len = buf.get_u8() as usize;
    if len > max_len || buf.remaining() < len {
        return Err(SchemaError::Truncated);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| SchemaError::InvalidUtf8)
}

fn write_string(buf: &mut impl BufMut, s: &str, max_len: usize) {
    let bytes = &s.as_bytes()[..s.len().min(max_len)];
    buf.put_u8(bytes.len() as u8);
    buf.put_slice(bytes);
}

fn read_vec(buf: &mut impl Buf, max_len: usize) -> Result<Vec<u8>, SchemaError> {
    if buf.remaining() < 2 {
        return Err(SchemaError::Truncated);
    }
    let len = buf.get_u16() as usize;
    if len > max_len || buf.remaining() < len {
        return Err(SchemaError::Truncated);
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn write_vec(buf: &mut impl BufMut, data: &[u8], max_len: usize) {
    let data = &data[..data.len().min(max_len)];
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

/// Encode `txn` into `out`, appending the encoded bytes (`out` is cleared
/// first). Mirrors the generated-schema encoder the distilled spec treats
/// opaquely.
pub(crate) fn encode(txn: &Transaction, out: &mut Vec<u8>) -> Result<(), SchemaError> {
    out.clear();
    out.put_u16(txn.seq);
    out.put_u8(txn.needs_reset as u8);

    match &txn.cmd {
        Command::Baud(body) => {
            out.put_u8(TAG_BAUD);
            match body {
                Baud::Req(r) => {
                    out.put_u8(DIR_REQ);
                    out.put_u32(r.rate);
                }
                Baud::Res(r) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(r.ok as u8);
                }
            }
        }
        Command::Info(body) => {
            out.put_u8(TAG_INFO);
            match body {
                InfoCmd::Req(_) => out.put_u8(DIR_REQ),
                InfoCmd::Res(r) => {
                    out.put_u8(DIR_RES);
                    out.put_slice(&r.mac);
                    out.put_u32(r.uptime);
                    out.put_u32(r.time);
                    write_string(out, &r.fw_version, FW_VERSION_SIZE);
                    out.put_u8(r.radio_count);
                }
            }
        }
        Command::Connected(body) => {
            out.put_u8(TAG_CONNECTED);
            match body {
                Connected::Req(_) => out.put_u8(DIR_REQ),
                Connected::Res(outcome) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(match outcome {
                        ConnectedOutcome::Connected => 0,
                        ConnectedOutcome::NotConnected => 1,
                    });
                }
            }
        }
        Command::Connect(body) => {
            out.put_u8(TAG_CONNECT);
            match body {
                Connect::Req(r) => {
                    out.put_u8(DIR_REQ);
                    match r {
                        ConnectReqBody::Cold => {
                            out.put_u8(0);
                            Connection::default().write(out);
                        }
                        ConnectReqBody::Quick(c) => {
                            out.put_u8(1);
                            c.write(out);
                        }
                    }
                }
                Connect::Res(r) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(match r.outcome {
                        ConnectOutcome::Connected => 0,
                        ConnectOutcome::NotConnected => 1,
                        ConnectOutcome::Dropped => 2,
                    });
                    r.connection.write(out);
                }
            }
        }
        Command::Sleep(body) => {
            out.put_u8(TAG_SLEEP);
            match body {
                Sleep::Req(_) => out.put_u8(DIR_REQ),
                Sleep::Res(r) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(match r.outcome {
                        SleepOutcome::Ok => 0,
                        SleepOutcome::NotConnected => 1,
                        SleepOutcome::KeepAwake => 2,
                    });
                    r.connection.write(out);
                }
            }
        }
        Command::Send(body) => {
            out.put_u8(TAG_SEND);
            match body {
                Send::Req(r) => {
                    out.put_u8(DIR_REQ);
                    write_vec(out, &r.data, VECTOR_MAX_LEN_FRAME_APP);
                }
                Send::Res(result) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(match result {
                        SendResult::Ok => 0,
                        SendResult::NotConnected => 1,
                        SendResult::Dropped => 2,
                        SendResult::Nack => 3,
                        SendResult::ChannelAccess => 4,
                    });
                }
            }
        }
        Command::Poll(body) => {
            out.put_u8(TAG_POLL);
            match body {
                Poll::Req(_) => out.put_u8(DIR_REQ),
                Poll::Res(PollBody::None) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(0);
                }
                Poll::Res(PollBody::Frame(data)) => {
                    out.put_u8(DIR_RES);
                    out.put_u8(1);
                    write_vec(out, data, u16::MAX as usize);
                }
            }
        }
    }
    Ok(())
}

/// Decode a received payload into a fresh [`Transaction`].
pub(crate) fn decode(bytes: &[u8]) -> Result<Transaction, SchemaError> {
    let mut buf = bytes;
    if buf.remaining() < 4 {
        return Err(SchemaError::Truncated);
    }
    let seq = buf.get_u16();
    let needs_reset = buf.get_u8() != 0;
    let cmd_tag = buf.get_u8();

    if buf.remaining() < 1 {
        return Err(SchemaError::Truncated);
    }
    let dir = buf.get_u8();

    let cmd = match cmd_tag {
        TAG_BAUD => match dir {
            DIR_REQ => {
                if buf.remaining() < 4 {
                    return Err(SchemaError::Truncated);
                }
                Command::Baud(Baud::Req(BaudReqBody {
                    rate: buf.get_u32(),
                }))
            }
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                Command::Baud(Baud::Res(BaudResBody {
                    ok: buf.get_u8() != 0,
                }))
            }
        },
        TAG_INFO => match dir {
            DIR_REQ => Command::Info(InfoCmd::Req(InfoReqBody)),
            _ => {
                if buf.remaining() < 6 + 4 + 4 {
                    return Err(SchemaError::Truncated);
                }
                let mut mac = [0u8; 6];
                buf.copy_to_slice(&mut mac);
                let uptime = buf.get_u32();
                let time = buf.get_u32();
                let fw_version = read_string(&mut buf, FW_VERSION_SIZE)?;
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let radio_count = buf.get_u8();
                Command::Info(InfoCmd::Res(InfoResBody {
                    mac,
                    uptime,
                    time,
                    fw_version,
                    radio_count,
                }))
            }
        },
        TAG_CONNECTED => match dir {
            DIR_REQ => Command::Connected(Connected::Req(ConnectedReqBody)),
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let outcome = match buf.get_u8() {
                    0 => ConnectedOutcome::Connected,
                    _ => ConnectedOutcome::NotConnected,
                };
                Command::Connected(Connected::Res(outcome))
            }
        },
        TAG_CONNECT => match dir {
            DIR_REQ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let body = match buf.get_u8() {
                    1 => ConnectReqBody::Quick(Connection::read(&mut buf)?),
                    _ => {
                        Connection::read(&mut buf)?;
                        ConnectReqBody::Cold
                    }
                };
                Command::Connect(Connect::Req(body))
            }
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let outcome = match buf.get_u8() {
                    0 => ConnectOutcome::Connected,
                    1 => ConnectOutcome::NotConnected,
                    _ => ConnectOutcome::Dropped,
                };
                let connection = Connection::read(&mut buf)?;
                Command::Connect(Connect::Res(ConnectResBody {
                    outcome,
                    connection,
                }))
            }
        },
        TAG_SLEEP => match dir {
            DIR_REQ => Command::Sleep(Sleep::Req(SleepReqBody)),
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let outcome = match buf.get_u8() {
                    0 => SleepOutcome::Ok,
                    1 => SleepOutcome::NotConnected,
                    _ => SleepOutcome::KeepAwake,
                };
                let connection = Connection::read(&mut buf)?;
                Command::Sleep(Sleep::Res(SleepResBody {
                    outcome,
                    connection,
                }))
            }
        },
        TAG_SEND => match dir {
            DIR_REQ => {
                let data = read_vec(&mut buf, VECTOR_MAX_LEN_FRAME_APP)?;
                Command::Send(Send::Req(SendReqBody { data }))
            }
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let result = match buf.get_u8() {
                    0 => SendResult::Ok,
                    1 => SendResult::NotConnected,
                    2 => SendResult::Dropped,
                    3 => SendResult::Nack,
                    _ => SendResult::ChannelAccess,
                };
                Command::Send(Send::Res(result))
            }
        },
        TAG_POLL => match dir {
            DIR_REQ => Command::Poll(Poll::Req(PollReqBody)),
            _ => {
                if buf.remaining() < 1 {
                    return Err(SchemaError::Truncated);
                }
                let body = match buf.get_u8() {
                    1 => PollBody::Frame(read_vec(&mut buf, u16::MAX as usize)?),
                    _ => PollBody::None,
                };
                Command::Poll(Poll::Res(body))
            }
        },
        other => return Err(SchemaError::UnknownTag(other)),
    };

    Ok(Transaction {
        seq,
        needs_reset,
        cmd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_round_trip() {
        let txn = Transaction {
            seq: 42,
            needs_reset: false,
            cmd: Command::Baud(Baud::Req(BaudReqBody { rate: 115_200 })),
        };
        let mut out = Vec::new();
        encode(&txn, &mut out).unwrap();
        let decoded = decode(&out).unwrap();
        assert_eq!(decoded, txn);
    }

    #[test]
    fn info_response_round_trip() {
        let txn = Transaction {
            seq: 7,
            needs_reset: true,
            cmd: Command::Info(InfoCmd::Res(InfoResBody {
                mac: [1, 2, 3, 4, 5, 6],
                uptime: 1000,
                time: 2000,
                fw_version: "1.2.3".to_string(),
                radio_count: 2,
            })),
        };
        let mut out = Vec::new();
        encode(&txn, &mut out).unwrap();
        let decoded = decode(&out).unwrap();
        assert_eq!(decoded, txn);
    }

    #[test]
    fn truncated_header_fails() {
        assert_eq!(decode(&[0, 1]).unwrap_err(), SchemaError::Truncated);
    }

    #[test]
    fn unknown_command_tag_fails() {
        let bytes = [0, 0, 0, 0xFF, 0];
        assert_eq!(decode(&bytes).unwrap_err(), SchemaError::UnknownTag(0xFF));
    }

    #[test]
    fn send_request_truncates_oversized_vector() {
        let data = vec![0xAB; VECTOR_MAX_LEN_FRAME_APP + 10];
        let txn = Transaction {
            seq: 1,
            needs_reset: false,
            cmd: Command::Send(Send::Req(SendReqBody { data: data.clone() })),
        };
        let mut out = Vec::new();
        encode(&txn, &mut out).unwrap();
        let decoded = decode(&out).unwrap();
        match decoded.cmd {
            Command::Send(Send::Req(body)) => {
                assert_eq!(body.data.len(), VECTOR_MAX_LEN_FRAME_APP)
            }
            _ => panic!("wrong variant"),
        }
    }
}
