// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Master key fingerprint APDUs

use encdec::{Decode, Encode};

use crate::{helpers::arr, ApduError, ApduHeader, ApduReq, Instruction, BTC_APDU_CLA};

/// Fetch master key fingerprint request, contains no payload
#[derive(Copy, Clone, PartialEq, Debug, Default, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct MasterFingerprintReq {}

impl ApduReq for MasterFingerprintReq {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, Instruction::GetMasterFingerprint as u8)
    }
}

/// Master key fingerprint response, the first four bytes of
/// `HASH160(master public key)`
#[derive(Copy, Clone, PartialEq, Eq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct MasterFingerprintResp {
    #[encdec(with = "arr")]
    pub fingerprint: [u8; 4],
}

impl MasterFingerprintResp {
    /// Fingerprint as a big-endian integer
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.fingerprint)
    }
}
