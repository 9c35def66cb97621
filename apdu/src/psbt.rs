// Copyright (c) 2022-2023 The MobileCoin Foundation

//! PSBT signing APDUs
//!
//! PSBTs are sent as commitments, each key/value map is committed to as a
//! [MapCommitment] and the per-input / per-output commitments are in turn
//! placed in Merkle trees. The device fetches whatever it needs via client
//! commands and yields one signature per signed input.

use alloc::vec::Vec;

use encdec::{DecodeOwned, Encode};

use crate::{
    check_len,
    merkle::{Hash, HASH_LEN},
    varint, ApduError, ApduHeader, ApduReq, Instruction, BTC_APDU_CLA,
};

/// Commitment to a key / value map
///
/// ## Encoding
///
/// ```text
/// VARINT(SIZE) | KEYS_ROOT[32] | VALUES_ROOT[32]
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MapCommitment {
    /// Number of entries in the map
    pub size: u64,
    /// Root of the tree over sorted keys
    pub keys_root: Hash,
    /// Root of the tree over values, in key order
    pub values_root: Hash,
}

impl MapCommitment {
    /// Encode into a newly allocated buffer
    pub fn to_vec(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(varint::encode_len(self.size) + 2 * HASH_LEN);
        varint::append(self.size, &mut b);
        b.extend_from_slice(&self.keys_root);
        b.extend_from_slice(&self.values_root);
        b
    }
}

impl Encode for MapCommitment {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(varint::encode_len(self.size) + 2 * HASH_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        let n = varint::encode(self.size, buff)?;
        buff[n..][..HASH_LEN].copy_from_slice(&self.keys_root);
        buff[n + HASH_LEN..][..HASH_LEN].copy_from_slice(&self.values_root);

        Ok(n + 2 * HASH_LEN)
    }
}

impl DecodeOwned for MapCommitment {
    type Output = Self;
    type Error = ApduError;

    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let (size, n) = varint::decode(buff)?;
        check_len(&buff[n..], 2 * HASH_LEN)?;

        let mut keys_root = [0u8; HASH_LEN];
        keys_root.copy_from_slice(&buff[n..][..HASH_LEN]);

        let mut values_root = [0u8; HASH_LEN];
        values_root.copy_from_slice(&buff[n + HASH_LEN..][..HASH_LEN]);

        Ok((
            Self {
                size,
                keys_root,
                values_root,
            },
            n + 2 * HASH_LEN,
        ))
    }
}

/// Sign PSBT request
///
/// ## Encoding
///
/// ```text
/// GLOBAL_MAP_COMMITMENT
/// VARINT(INPUT_COUNT) | INPUTS_ROOT[32]
/// VARINT(OUTPUT_COUNT) | OUTPUTS_ROOT[32]
/// WALLET_ID[32] | HMAC[32]
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SignPsbtReq {
    pub global: MapCommitment,
    pub input_count: u64,
    pub inputs_root: Hash,
    pub output_count: u64,
    pub outputs_root: Hash,
    pub wallet_id: Hash,
    /// Registration HMAC, zeroed for default policies
    pub hmac: Hash,
}

impl ApduReq for SignPsbtReq {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, Instruction::SignPsbt as u8)
    }
}

impl Encode for SignPsbtReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        let mut n = self.global.encode_len()?;
        n += varint::encode_len(self.input_count) + HASH_LEN;
        n += varint::encode_len(self.output_count) + HASH_LEN;
        n += 2 * HASH_LEN;
        Ok(n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        let mut index = self.global.encode(buff)?;

        index += varint::encode(self.input_count, &mut buff[index..])?;
        buff[index..][..HASH_LEN].copy_from_slice(&self.inputs_root);
        index += HASH_LEN;

        index += varint::encode(self.output_count, &mut buff[index..])?;
        buff[index..][..HASH_LEN].copy_from_slice(&self.outputs_root);
        index += HASH_LEN;

        buff[index..][..HASH_LEN].copy_from_slice(&self.wallet_id);
        index += HASH_LEN;

        buff[index..][..HASH_LEN].copy_from_slice(&self.hmac);
        index += HASH_LEN;

        Ok(index)
    }
}
