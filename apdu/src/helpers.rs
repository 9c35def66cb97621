// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Field encoding helpers for derived APDU objects

/// Fixed length byte array fields (hashes, fingerprints, tags)
pub(crate) mod arr {
    use crate::{check_len, ApduError};

    pub fn enc<const N: usize>(d: &[u8; N], buff: &mut [u8]) -> Result<usize, ApduError> {
        check_len(buff, N)?;
        buff[..N].copy_from_slice(&d[..]);
        Ok(N)
    }

    pub fn enc_len<const N: usize>(_d: &[u8; N]) -> Result<usize, ApduError> {
        Ok(N)
    }

    pub fn dec<const N: usize>(buff: &[u8]) -> Result<([u8; N], usize), ApduError> {
        check_len(buff, N)?;

        let mut d = [0u8; N];
        d.copy_from_slice(&buff[..N]);

        Ok((d, N))
    }
}
