// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Extended public key APDUs

use encdec::Encode;

use crate::{check_len, path, ApduError, ApduHeader, ApduReq, Instruction, BTC_APDU_CLA};

/// Fetch extended public key request
///
/// The response body is the ASCII base58 encoded extended public key.
///
/// ## Encoding
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    DISPLAY    |   PATH_LEN    |     PATH[0] (u32 BE) ...      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GetExtendedPubkeyReq<'a> {
    /// Show the key on the device for confirmation
    pub display: bool,

    /// BIP32 derivation path
    pub path: &'a [u32],
}

impl<'a> GetExtendedPubkeyReq<'a> {
    pub fn new(path: &'a [u32], display: bool) -> Self {
        Self { display, path }
    }
}

impl<'a> ApduReq for GetExtendedPubkeyReq<'a> {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, Instruction::GetExtendedPubkey as u8)
    }
}

impl<'a> Encode for GetExtendedPubkeyReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + path::encode_len(self.path))
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        buff[0] = self.display as u8;
        let n = path::encode(self.path, &mut buff[1..])?;

        Ok(1 + n)
    }
}
