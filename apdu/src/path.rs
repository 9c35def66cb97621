// Copyright (c) 2022-2023 The MobileCoin Foundation

//! BIP-32 derivation paths
//!
//! Paths are encoded as a single element count followed by each element as a
//! big-endian `u32`, the device accepts at most [MAX_PATH_LEN] elements.

use alloc::vec::Vec;
use core::{fmt, str::FromStr};

use byteorder::{BigEndian, ByteOrder};

use crate::{check_len, ApduError};

/// Maximum number of derivation path elements accepted by the device
pub const MAX_PATH_LEN: usize = 6;

/// Hardened derivation flag
pub const HARDENED: u32 = 0x8000_0000;

/// BIP-32 derivation path
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

/// Derivation path parsing errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
pub enum PathError {
    /// Path element is not a valid index
    #[cfg_attr(feature = "thiserror", error("invalid path element"))]
    InvalidElement,

    /// Path element exceeds the non-hardened index range
    #[cfg_attr(feature = "thiserror", error("path element out of range"))]
    OutOfRange,
}

impl DerivationPath {
    /// Create a path from raw elements
    pub fn new(elements: impl Into<Vec<u32>>) -> Self {
        Self(elements.into())
    }

    /// Fetch raw path elements
    pub fn elements(&self) -> &[u32] {
        &self.0
    }

    /// Fetch the number of path elements
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether this is the master (empty) path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl From<&[u32]> for DerivationPath {
    fn from(p: &[u32]) -> Self {
        Self(p.to_vec())
    }
}

/// Parse paths in the form `m/44'/0'/0'/0/0` (`'` or `h` for hardened elements)
impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix("m/")
            .or_else(|| s.strip_prefix('m'))
            .unwrap_or(s);

        let mut elements = Vec::new();
        for e in s.split('/').filter(|e| !e.is_empty()) {
            let (n, hardened) = match e.strip_suffix(&['\'', 'h', 'H'][..]) {
                Some(n) => (n, true),
                None => (e, false),
            };

            let i = n.parse::<u32>().map_err(|_| PathError::InvalidElement)?;
            if i >= HARDENED {
                return Err(PathError::OutOfRange);
            }

            elements.push(if hardened { i | HARDENED } else { i });
        }

        Ok(Self(elements))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for e in &self.0 {
            match e & HARDENED != 0 {
                true => write!(f, "/{}'", e & !HARDENED)?,
                false => write!(f, "/{e}")?,
            }
        }
        Ok(())
    }
}

/// Compute encoded path length
pub const fn encode_len(path: &[u32]) -> usize {
    1 + path.len() * 4
}

/// Encode a path into the provided buffer
pub fn encode(path: &[u32], buff: &mut [u8]) -> Result<usize, ApduError> {
    if path.len() > u8::MAX as usize {
        return Err(ApduError::InvalidLength);
    }
    check_len(buff, encode_len(path))?;

    buff[0] = path.len() as u8;
    for (i, e) in path.iter().enumerate() {
        BigEndian::write_u32(&mut buff[1 + i * 4..], *e);
    }

    Ok(encode_len(path))
}
