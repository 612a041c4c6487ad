//! Async counterpart to [`crate::channel`], identical wire behavior; see
//! [`crate::commands_async`] for why this is a parallel module rather than
//! a shared generic implementation.

use crate::commands::PollOutcome;
use crate::consts::{HELIUM_MAX_CHANNEL_NAME_SIZE, HELIUM_MAX_DATA_SIZE};
use crate::port::AsyncSerialPort;
use crate::session::SessionContextAsync;
use crate::{Error, Result};

const OP_CHANNEL_CREATE: u8 = 0x8B;
const OP_CHANNEL_SEND: u8 = 0x8C;
const OP_CHANNEL_CREATED: u8 = 0x8D;
const OP_CHANNEL_CREATE_FAILED: u8 = 0x8E;
const OP_CHANNEL_NOT_FOUND: u8 = 0x8F;
const OP_CHANNEL_SEND_RESULT: u8 = 0x90;

pub(crate) async fn create<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    name: &str,
) -> Result<u8> {
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(HELIUM_MAX_CHANNEL_NAME_SIZE);
    let mut payload = Vec::with_capacity(1 + n);
    payload.push(OP_CHANNEL_CREATE);
    payload.extend_from_slice(&name_bytes[..n]);

    ctx.send(&payload).await?;

    let mut buf = [0u8; HELIUM_MAX_DATA_SIZE];
    match ctx.poll_60s(&mut buf).await? {
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

pub(crate) async fn send<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    channel_id: u8,
    data: &[u8],
) -> Result<u8> {
    let n = data.len().min(HELIUM_MAX_DATA_SIZE);
    let mut payload = Vec::with_capacity(3 + n);
    payload.push(OP_CHANNEL_SEND);
    payload.push(channel_id);
    payload.push(0x00);
    payload.extend_from_slice(&data[..n]);

    ctx.send(&payload).await?;

    let mut buf = [0u8; HELIUM_MAX_DATA_SIZE];
    match ctx.poll_60s(&mut buf).await? {
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
