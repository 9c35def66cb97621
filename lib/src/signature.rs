// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Compact message signatures

use base64::prelude::{Engine as _, BASE64_STANDARD};

use crate::Error;

/// Compact signature length (header, r, s)
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Header offset for compressed key recoverable signatures
const COMPRESSED_HEADER_BASE: u8 = 27 + 4;

/// Decoded message signature
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MessageSignature {
    /// Recovery id
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl MessageSignature {
    /// Decode a 65 byte compact signature
    pub fn from_bytes(b: &[u8]) -> Result<Self, Error> {
        if b.len() != COMPACT_SIGNATURE_LEN {
            return Err(Error::InvalidLength);
        }

        let v = b[0]
            .checked_sub(COMPRESSED_HEADER_BASE)
            .ok_or(Error::UnexpectedResponse)?;

        let mut r = [0u8; 32];
        r.copy_from_slice(&b[1..33]);

        let mut s = [0u8; 32];
        s.copy_from_slice(&b[33..65]);

        Ok(Self { v, r, s })
    }

    /// Decode a base64 compact signature as returned by message signing
    pub fn from_base64(s: &str) -> Result<Self, Error> {
        let b = BASE64_STANDARD
            .decode(s)
            .map_err(|_| Error::UnexpectedResponse)?;
        Self::from_bytes(&b)
    }
}
