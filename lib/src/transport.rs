// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transport abstraction and TCP transport for the speculos simulator
//!

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use ledger_acre_apdu::StatusWord;

use crate::Error;

/// Raw APDU exchange, implemented by device transports
///
/// Transports return the full response including the trailing status word,
/// status handling is left to the caller.
#[async_trait]
pub trait Exchange {
    /// Send an encoded APDU and return the raw response
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, Error>;
}

#[async_trait]
impl<T: Exchange + Send + ?Sized> Exchange for Box<T> {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        (**self).exchange(command).await
    }
}

/// Status words accepted from the device, all others are failures
pub const ALLOWED_STATUS: [StatusWord; 2] = [StatusWord::Ok, StatusWord::InterruptedExecution];

/// Send a frame, splitting the response into status word and body
///
/// Responses with a status outside [ALLOWED_STATUS] are returned as
/// [Error::Status].
pub async fn send<T: Exchange + Send + ?Sized>(
    t: &mut T,
    frame: &[u8],
) -> Result<(StatusWord, Vec<u8>), Error> {
    trace!("=> {}", hex::encode(frame));

    let mut resp = t.exchange(frame).await?;

    trace!("<= {}", hex::encode(&resp));

    if resp.len() < 2 {
        return Err(Error::InvalidLength);
    }

    let n = resp.len() - 2;
    let sw = u16::from_be_bytes([resp[n], resp[n + 1]]);
    resp.truncate(n);

    match StatusWord::try_from(sw) {
        Ok(s) if ALLOWED_STATUS.contains(&s) => Ok((s, resp)),
        _ => Err(Error::Status(sw)),
    }
}

/// Maximum response body length accepted from the simulator socket
/// (extended length APDU response, excluding status word)
pub const MAX_RESPONSE_LEN: usize = 65536;

/// TCP transport options
#[derive(Clone, PartialEq, Debug, clap::Parser)]
pub struct TcpOptions {
    /// Simulator APDU socket address
    #[clap(long, default_value = "127.0.0.1", env = "SPECULOS_ADDR")]
    pub addr: IpAddr,

    /// Simulator APDU socket port
    #[clap(long, default_value = "9999", env = "SPECULOS_APDU_PORT")]
    pub port: u16,

    /// Per-exchange response timeout
    #[clap(long, default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9999,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Parse durations of the form `500ms`, `30s` or plain seconds
fn parse_duration(s: &str) -> Result<Duration, std::num::ParseIntError> {
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse().map(Duration::from_millis);
    }

    s.strip_suffix('s')
        .unwrap_or(s)
        .parse()
        .map(Duration::from_secs)
}

/// TCP transport for the speculos APDU socket
///
/// Commands are sent as `LEN (u32 BE) | APDU`, responses arrive as
/// `LEN (u32 BE) | DATA | SW` where `LEN` excludes the status word.
pub struct TcpTransport {
    s: TcpStream,
    timeout: Duration,
}

impl TcpTransport {
    /// Connect to a simulator APDU socket
    pub async fn new(opts: TcpOptions) -> Result<Self, Error> {
        let addr = SocketAddr::new(opts.addr, opts.port);

        debug!("Connecting to {}", addr);

        let s = tokio::time::timeout(opts.timeout, TcpStream::connect(addr)).await??;

        Ok(Self {
            s,
            timeout: opts.timeout,
        })
    }

    async fn exchange_inner(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        let mut req = Vec::with_capacity(4 + command.len());
        req.extend_from_slice(&(command.len() as u32).to_be_bytes());
        req.extend_from_slice(command);

        self.s.write_all(&req).await?;

        let n = self.s.read_u32().await? as usize;
        if n > MAX_RESPONSE_LEN {
            return Err(Error::InvalidLength);
        }

        let mut resp = vec![0u8; n + 2];
        self.s.read_exact(&mut resp).await?;

        Ok(resp)
    }
}

#[async_trait]
impl Exchange for TcpTransport {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.exchange_inner(command)).await?
    }
}
