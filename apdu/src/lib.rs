// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Protocol / APDU definitions for Acre Bitcoin app communication
//!
//! This module provides the wire encodings for communication with the Acre
//! Bitcoin application, both for host requests and for the _client commands_
//! the device issues while a request is suspended.
//!
//! The device cannot hold transactions, wallet policies or messages in memory,
//! so the host sends Merkle commitments (see [merkle]) and the device interrupts
//! execution (with [StatusWord::InterruptedExecution]) to pull whatever it needs
//! using [ClientCommand][client_command::ClientCommand]s, answered by the host in
//! [ContinueReq][framework::ContinueReq] frames.
//!
//! Multi-byte integer fields are big-endian unless otherwise noted, lengths and
//! counts use Bitcoin compact-size [varint]s.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use encdec::Encode;
use num_enum::TryFromPrimitive;
use strum::Display;

pub mod client_command;
pub mod fingerprint;
pub mod framework;
mod helpers;
pub mod merkle;
pub mod message;
pub mod path;
pub mod prelude;
pub mod psbt;
pub mod pubkey;
pub mod varint;
pub mod wallet;

/// Bitcoin (Acre) application APDU class
pub const BTC_APDU_CLA: u8 = 0xe1;

/// Framework APDU class, used to resume interrupted commands
pub const FRAMEWORK_APDU_CLA: u8 = 0xf8;

/// Maximum APDU payload length (short APDU `Lc`)
pub const MAX_APDU_PAYLOAD: usize = 255;

/// APDU header length (CLA, INS, P1, P2, Lc)
pub const APDU_HEADER_LEN: usize = 5;

/// Application instruction codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum Instruction {
    /// Derive an extended public key
    GetExtendedPubkey = 0x00,

    /// Register a wallet policy, returning an authentication tag
    RegisterWallet = 0x02,

    /// Fetch a receive / change address for a wallet policy
    GetWalletAddress = 0x03,

    /// Sign a merkleized PSBT
    SignPsbt = 0x04,

    /// Fetch the master key fingerprint
    GetMasterFingerprint = 0x05,

    /// Sign an arbitrary message
    SignMessage = 0x10,

    /// Sign a withdrawal authorisation
    SignWithdraw = 0x11,

    /// Sign an ERC-4361 (sign-in) message
    SignErc4361Message = 0x12,
}

/// Framework instruction codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum FrameworkInstruction {
    /// Resume execution with the answer to a client command
    ContinueInterrupted = 0x01,
}

/// Status words returned by the application
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, TryFromPrimitive)]
#[repr(u16)]
pub enum StatusWord {
    /// Command complete
    Ok = 0x9000,
    /// Execution suspended, response body is a client command
    InterruptedExecution = 0xe000,
    /// Operation rejected by the user
    Deny = 0x6985,
    IncorrectData = 0x6a80,
    NotSupported = 0x6a82,
    WrongP1P2 = 0x6a86,
    WrongDataLength = 0x6a87,
    InsNotSupported = 0x6d00,
    ClaNotSupported = 0x6e00,
    WrongResponseLength = 0xb000,
    BadState = 0xb007,
    SignatureFail = 0xb008,
}

/// APDU encode / decode errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum ApduError {
    /// Buffer too short or unexpected trailing data
    #[cfg_attr(feature = "thiserror", error("invalid length"))]
    InvalidLength,

    /// Field value could not be decoded
    #[cfg_attr(feature = "thiserror", error("invalid encoding"))]
    InvalidEncoding,

    /// Client command code not recognised
    #[cfg_attr(feature = "thiserror", error("unknown client command 0x{0:02x}"))]
    UnknownCommand(u8),

    /// Encoded payload does not fit a single APDU
    #[cfg_attr(
        feature = "thiserror",
        error("payload of {0} bytes exceeds maximum APDU payload")
    )]
    PayloadTooLong(usize),
}

impl From<encdec::Error> for ApduError {
    fn from(_: encdec::Error) -> Self {
        ApduError::InvalidLength
    }
}

/// APDU command header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl ApduHeader {
    /// Create a header with zeroed parameters (all Acre commands use P1 = P2 = 0)
    pub const fn new(cla: u8, ins: u8) -> Self {
        Self {
            cla,
            ins,
            p1: 0,
            p2: 0,
        }
    }
}

/// Request APDU, an encodable payload with a fixed header
pub trait ApduReq: Encode<Error = ApduError> {
    /// Fetch the header for this request
    fn header(&self) -> ApduHeader;
}

/// Encode a request into a complete APDU frame (header, `Lc`, payload)
pub fn encode_apdu<R: ApduReq>(req: &R) -> Result<Vec<u8>, ApduError> {
    let n = req.encode_len()?;
    if n > MAX_APDU_PAYLOAD {
        return Err(ApduError::PayloadTooLong(n));
    }

    let h = req.header();
    let mut buff = vec![0u8; APDU_HEADER_LEN + n];
    buff[..APDU_HEADER_LEN].copy_from_slice(&[h.cla, h.ins, h.p1, h.p2, n as u8]);

    let m = req.encode(&mut buff[APDU_HEADER_LEN..])?;
    buff.truncate(APDU_HEADER_LEN + m);

    Ok(buff)
}

/// Helper to check output buffer length prior to encoding
pub(crate) fn check_len(buff: &[u8], n: usize) -> Result<(), ApduError> {
    if buff.len() < n {
        return Err(ApduError::InvalidLength);
    }
    Ok(())
}
