// Copyright (c) 2022-2023 The MobileCoin Foundation

use ledger_acre_apdu::{ApduError, StatusWord};
use tokio::time::error::Elapsed;

use crate::interpreter::InterpreterError;

/// Ledger Acre API Error Type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Derivation path exceeds the supported depth
    #[error("Derivation path too long ({0} elements, max 6)")]
    PathTooLong(usize),

    /// Change flag must be 0 or 1
    #[error("Invalid change flag {0} (expected 0 or 1)")]
    InvalidChange(u8),

    /// Wallet HMAC must be 32 bytes
    #[error("Invalid HMAC length {0} (expected 32)")]
    InvalidHmacLength(usize),

    /// Withdrawal payload could not be laid out
    #[error("Invalid withdrawal: {0}")]
    InvalidWithdrawal(String),

    /// Wallet policy could not be serialized
    #[error("Invalid wallet policy: {0}")]
    InvalidPolicy(String),

    /// PSBT could not be parsed
    #[error("Invalid PSBT: {0}")]
    InvalidPsbt(String),

    /// Client command handling failed
    #[error("Client command failed: {0}")]
    Interpreter(#[from] InterpreterError),

    /// Device suspended a command that takes no client commands
    #[error("Unexpected interrupted execution")]
    UnexpectedInterrupt,

    /// Device returned a status other than success or interrupted
    #[error("Device returned status 0x{0:04x} ({})", status_name(.0))]
    Status(u16),

    /// APDU encode / decode error
    #[error("APDU error: {0}")]
    Apdu(#[from] ApduError),

    /// Transport IO error
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Response too short to contain a status word
    #[error("Invalid response length")]
    InvalidLength,

    /// Unexpected APDU response
    #[error("Unexpected APDU response")]
    UnexpectedResponse,
}

impl Error {
    /// Status word for application errors, if known
    pub fn status(&self) -> Option<StatusWord> {
        match self {
            Error::Status(sw) => StatusWord::try_from(*sw).ok(),
            _ => None,
        }
    }
}

fn status_name(sw: &u16) -> String {
    match StatusWord::try_from(*sw) {
        Ok(s) => s.to_string(),
        Err(_) => "unknown".to_string(),
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Error::RequestTimeout
    }
}
