//! Async counterpart to [`crate::commands`], identical in shape and
//! semantics; only the port trait and the `.await` points differ (§4.9,
//! §5). Kept as a parallel module rather than unified via a shared trait
//! because `AsyncSerialPort`'s methods return `impl Future`, which cannot be
//! abstracted over together with the blocking `SerialPort` contract without
//! an async-trait shim the teacher crate does not use.

use crate::consts::{HELIUM_POLL_WAIT_US, SEND_RETRIES, VECTOR_MAX_LEN_FRAME_APP};
use crate::engine::{self, EngineStatus};
use crate::port::AsyncSerialPort;
use crate::schema::{
    self, Baud, BaudReqBody, Connect, ConnectReqBody, Connected, ConnectedOutcome,
    ConnectedReqBody, Info, InfoCmd, InfoReqBody, Poll, PollBody, PollReqBody,
    Send as SchemaSend, SendReqBody, SendResult, Sleep, SleepOutcome, SleepReqBody,
};
use crate::commands::{ConnectResponse, PollOutcome};
use crate::session::SessionContextAsync;
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

pub(crate) async fn baud<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    rate: u32,
) -> Result<()> {
    let rate = normalize_baud(rate);
    ctx.txn.cmd = schema::Command::Baud(Baud::Req(BaudReqBody { rate }));
    let status =
        engine::send_command_async(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch)
            .await;
    match status {
        EngineStatus::Ok => match &ctx.txn.cmd {
            schema::Command::Baud(Baud::Res(res)) if res.ok => Ok(()),
            _ => Err(Error::Communication),
        },
        _ => Err(Error::Communication),
    }
}

pub(crate) async fn info<P: AsyncSerialPort>(ctx: &mut SessionContextAsync<P>) -> Result<Info> {
    ctx.txn.cmd = schema::Command::Info(InfoCmd::Req(InfoReqBody));
    let status =
        engine::send_command_async(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch)
            .await;
    match status {
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

pub(crate) async fn connected<P: AsyncSerialPort>(ctx: &mut SessionContextAsync<P>) -> Result<()> {
    ctx.txn.cmd = schema::Command::Connected(Connected::Req(ConnectedReqBody));
    let status =
        engine::send_command_async(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch)
            .await;
    match status {
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

pub(crate) async fn connect<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    connection: Option<&crate::schema::Connection>,
) -> (EngineStatus, ConnectResponse) {
    let req = match connection {
        Some(c) => ConnectReqBody::Quick(*c),
        None => ConnectReqBody::Cold,
    };
    ctx.txn.cmd = schema::Command::Connect(Connect::Req(req));
    let status =
        engine::send_command_async(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch)
            .await;
    let response = match (&status, &ctx.txn.cmd) {
        (EngineStatus::Ok, schema::Command::Connect(Connect::Res(res))) => res.into(),
        _ => ConnectResponse::default(),
    };
    (status, response)
}

pub(crate) async fn sleep<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    mut connection: Option<&mut crate::schema::Connection>,
) -> Result<()> {
    ctx.txn.cmd = schema::Command::Sleep(Sleep::Req(SleepReqBody));
    let status =
        engine::send_command_async(&mut ctx.port, &mut ctx.seq, &mut ctx.txn, &mut ctx.scratch)
            .await;
    match status {
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

pub(crate) async fn send<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    data: &[u8],
) -> Result<()> {
    let n = data.len().min(VECTOR_MAX_LEN_FRAME_APP);
    let data = data[..n].to_vec();

    for attempt in 1..=SEND_RETRIES {
        ctx.txn.cmd = schema::Command::Send(SchemaSend::Req(SendReqBody { data: data.clone() }));
        let status = engine::send_command_async(
            &mut ctx.port,
            &mut ctx.seq,
            &mut ctx.txn,
            &mut ctx.scratch,
        )
        .await;
        match status {
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

pub(crate) async fn poll<P: AsyncSerialPort>(
    ctx: &mut SessionContextAsync<P>,
    buffer: &mut [u8],
    retries: u32,
) -> Result<PollOutcome> {
    for attempt in 0..retries {
        ctx.txn.cmd = schema::Command::Poll(Poll::Req(PollReqBody));
        let status = engine::send_command_async(
            &mut ctx.port,
            &mut ctx.seq,
            &mut ctx.txn,
            &mut ctx.scratch,
        )
        .await;
        match status {
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
            ctx.port.wait_us(HELIUM_POLL_WAIT_US).await;
        }
    }
    Ok(PollOutcome::NoData)
}
