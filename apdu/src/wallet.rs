// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Wallet policy APDUs
//!
//! Wallet policies are identified by `SHA256(serialized policy)`, registration
//! returns an HMAC the host must present with later requests to use the policy
//! without re-confirmation.

use byteorder::{BigEndian, ByteOrder};
use encdec::{Decode, Encode};

use crate::{
    check_len,
    helpers::arr,
    merkle::{Hash, HASH_LEN},
    varint, ApduError, ApduHeader, ApduReq, Instruction, BTC_APDU_CLA,
};

/// Register a wallet policy
///
/// ## Encoding
///
/// ```text
/// VARINT(POLICY_LEN) | SERIALIZED_POLICY...
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RegisterWalletReq<'a> {
    /// Serialized wallet policy
    pub policy: &'a [u8],
}

impl<'a> RegisterWalletReq<'a> {
    pub fn new(policy: &'a [u8]) -> Self {
        Self { policy }
    }
}

impl<'a> ApduReq for RegisterWalletReq<'a> {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, Instruction::RegisterWallet as u8)
    }
}

impl<'a> Encode for RegisterWalletReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        let n = self.policy.len();
        Ok(varint::encode_len(n as u64) + n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        let n = varint::encode(self.policy.len() as u64, buff)?;
        buff[n..][..self.policy.len()].copy_from_slice(self.policy);

        Ok(n + self.policy.len())
    }
}

/// Register wallet response
///
/// ## Encoding
///
/// ```text
/// WALLET_ID[32] | HMAC[32]
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug, Encode, Decode)]
#[encdec(error = "ApduError")]
pub struct RegisterWalletResp {
    #[encdec(with = "arr")]
    pub wallet_id: Hash,
    #[encdec(with = "arr")]
    pub hmac: Hash,
}

/// Fetch a wallet address
///
/// Policies without a registration HMAC (default / standard policies) send
/// 32 zero bytes in its place.
///
/// ## Encoding
///
/// ```text
/// DISPLAY | WALLET_ID[32] | HMAC[32] | CHANGE | ADDRESS_INDEX (u32 BE)
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct GetWalletAddressReq {
    pub display: bool,
    pub wallet_id: Hash,
    pub hmac: Hash,
    pub change: bool,
    pub address_index: u32,
}

impl ApduReq for GetWalletAddressReq {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, Instruction::GetWalletAddress as u8)
    }
}

impl Encode for GetWalletAddressReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(1 + 2 * HASH_LEN + 1 + 4)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        buff[0] = self.display as u8;
        buff[1..][..HASH_LEN].copy_from_slice(&self.wallet_id);
        buff[1 + HASH_LEN..][..HASH_LEN].copy_from_slice(&self.hmac);
        buff[1 + 2 * HASH_LEN] = self.change as u8;
        BigEndian::write_u32(&mut buff[2 + 2 * HASH_LEN..], self.address_index);

        Ok(2 + 2 * HASH_LEN + 4)
    }
}
