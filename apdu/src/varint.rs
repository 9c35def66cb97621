// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bitcoin compact-size variable length integers
//!
//! ```text
//! value < 0xfd          -> [value]
//! value <= 0xffff       -> [0xfd, u16 LE]
//! value <= 0xffff_ffff  -> [0xfe, u32 LE]
//! otherwise             -> [0xff, u64 LE]
//! ```

use alloc::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};
use encdec::{DecodeOwned, Encode};

use crate::{check_len, ApduError};

/// Compact-size variable length integer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Encode into a newly allocated buffer
    pub fn to_vec(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(self.len());
        append(self.0, &mut b);
        b
    }

    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        encode_len(self.0)
    }

    /// A varint is never zero-length
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        Self(v as u64)
    }
}

/// Compute the encoded length of a varint
pub const fn encode_len(v: u64) -> usize {
    match v {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Encode a varint into the provided buffer, returning the encoded length
pub fn encode(v: u64, buff: &mut [u8]) -> Result<usize, ApduError> {
    let n = encode_len(v);
    check_len(buff, n)?;

    match n {
        1 => buff[0] = v as u8,
        3 => {
            buff[0] = 0xfd;
            LittleEndian::write_u16(&mut buff[1..], v as u16);
        }
        5 => {
            buff[0] = 0xfe;
            LittleEndian::write_u32(&mut buff[1..], v as u32);
        }
        _ => {
            buff[0] = 0xff;
            LittleEndian::write_u64(&mut buff[1..], v);
        }
    }

    Ok(n)
}

/// Append a varint to a growable buffer
pub fn append(v: u64, buff: &mut Vec<u8>) {
    match encode_len(v) {
        1 => buff.push(v as u8),
        3 => {
            buff.push(0xfd);
            buff.extend_from_slice(&(v as u16).to_le_bytes());
        }
        5 => {
            buff.push(0xfe);
            buff.extend_from_slice(&(v as u32).to_le_bytes());
        }
        _ => {
            buff.push(0xff);
            buff.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// Decode a varint from the provided buffer, returning the value and consumed length
pub fn decode(buff: &[u8]) -> Result<(u64, usize), ApduError> {
    check_len(buff, 1)?;

    let (v, n) = match buff[0] {
        0xfd => {
            check_len(buff, 3)?;
            (LittleEndian::read_u16(&buff[1..]) as u64, 3)
        }
        0xfe => {
            check_len(buff, 5)?;
            (LittleEndian::read_u32(&buff[1..]) as u64, 5)
        }
        0xff => {
            check_len(buff, 9)?;
            (LittleEndian::read_u64(&buff[1..]), 9)
        }
        b => (b as u64, 1),
    };

    Ok((v, n))
}

impl Encode for VarInt {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(encode_len(self.0))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        encode(self.0, buff)
    }
}

impl DecodeOwned for VarInt {
    type Output = Self;

    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        decode(buff).map(|(v, n)| (Self(v), n))
    }
}
