// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Client commands, issued by the device while a request is suspended
//!
//! When the device needs data it does not hold it responds with
//! [StatusWord::InterruptedExecution][crate::StatusWord::InterruptedExecution]
//! and a client command as the response body, the host answers in a
//! [ContinueReq][crate::framework::ContinueReq].
//!
//! ## Encodings
//!
//! ```text
//! YIELD                   0x10 | FRAGMENT...
//! GET_PREIMAGE            0x40 | 0x00 | HASH[32]
//! GET_MERKLE_LEAF_PROOF   0x41 | ROOT[32] | VARINT(TREE_SIZE) | VARINT(LEAF_INDEX)
//! GET_MERKLE_LEAF_INDEX   0x42 | ROOT[32] | LEAF_HASH[32]
//! GET_MORE_ELEMENTS       0xa0
//! ```

use encdec::{Decode, Encode};
use num_enum::TryFromPrimitive;
use strum::Display;

use crate::{
    check_len,
    merkle::{Hash, HASH_LEN},
    varint, ApduError,
};

/// Client command codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum ClientCommandCode {
    Yield = 0x10,
    GetPreimage = 0x40,
    GetMerkleLeafProof = 0x41,
    GetMerkleLeafIndex = 0x42,
    GetMoreElements = 0xa0,
}

/// Client command issued by the device
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand<'a> {
    /// Partial result emitted mid-command
    Yield(&'a [u8]),

    /// Request the preimage of a SHA-256 hash
    GetPreimage { hash: Hash },

    /// Request the leaf hash and inclusion proof for a committed tree
    GetMerkleLeafProof {
        root: Hash,
        tree_size: u64,
        leaf_index: u64,
    },

    /// Request the index of a leaf in a committed tree
    GetMerkleLeafIndex { root: Hash, leaf_hash: Hash },

    /// Request queued elements left over from a prior answer
    GetMoreElements,
}

impl<'a> ClientCommand<'a> {
    /// Fetch the command code
    pub fn code(&self) -> ClientCommandCode {
        match self {
            ClientCommand::Yield(_) => ClientCommandCode::Yield,
            ClientCommand::GetPreimage { .. } => ClientCommandCode::GetPreimage,
            ClientCommand::GetMerkleLeafProof { .. } => ClientCommandCode::GetMerkleLeafProof,
            ClientCommand::GetMerkleLeafIndex { .. } => ClientCommandCode::GetMerkleLeafIndex,
            ClientCommand::GetMoreElements => ClientCommandCode::GetMoreElements,
        }
    }
}

fn read_hash(buff: &[u8]) -> Result<Hash, ApduError> {
    check_len(buff, HASH_LEN)?;

    let mut h = [0u8; HASH_LEN];
    h.copy_from_slice(&buff[..HASH_LEN]);
    Ok(h)
}

impl<'a> Encode for ClientCommand<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        let n = match self {
            ClientCommand::Yield(d) => d.len(),
            ClientCommand::GetPreimage { .. } => 1 + HASH_LEN,
            ClientCommand::GetMerkleLeafProof {
                tree_size,
                leaf_index,
                ..
            } => HASH_LEN + varint::encode_len(*tree_size) + varint::encode_len(*leaf_index),
            ClientCommand::GetMerkleLeafIndex { .. } => 2 * HASH_LEN,
            ClientCommand::GetMoreElements => 0,
        };

        Ok(1 + n)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        buff[0] = self.code() as u8;
        let mut index = 1;

        match self {
            ClientCommand::Yield(d) => {
                buff[index..][..d.len()].copy_from_slice(d);
                index += d.len();
            }
            ClientCommand::GetPreimage { hash } => {
                // Reserved byte, must be zero
                buff[index] = 0;
                buff[index + 1..][..HASH_LEN].copy_from_slice(hash);
                index += 1 + HASH_LEN;
            }
            ClientCommand::GetMerkleLeafProof {
                root,
                tree_size,
                leaf_index,
            } => {
                buff[index..][..HASH_LEN].copy_from_slice(root);
                index += HASH_LEN;
                index += varint::encode(*tree_size, &mut buff[index..])?;
                index += varint::encode(*leaf_index, &mut buff[index..])?;
            }
            ClientCommand::GetMerkleLeafIndex { root, leaf_hash } => {
                buff[index..][..HASH_LEN].copy_from_slice(root);
                buff[index + HASH_LEN..][..HASH_LEN].copy_from_slice(leaf_hash);
                index += 2 * HASH_LEN;
            }
            ClientCommand::GetMoreElements => (),
        }

        Ok(index)
    }
}

impl<'a> Decode<'a> for ClientCommand<'a> {
    type Output = Self;
    type Error = ApduError;

    /// Decode a client command, rejecting truncated or trailing data
    fn decode(buff: &'a [u8]) -> Result<(Self::Output, usize), Self::Error> {
        check_len(buff, 1)?;

        let code = ClientCommandCode::try_from(buff[0])
            .map_err(|_| ApduError::UnknownCommand(buff[0]))?;
        let body = &buff[1..];

        let cmd = match code {
            ClientCommandCode::Yield => ClientCommand::Yield(body),
            ClientCommandCode::GetPreimage => {
                if body.len() != 1 + HASH_LEN {
                    return Err(ApduError::InvalidLength);
                }
                if body[0] != 0 {
                    return Err(ApduError::InvalidEncoding);
                }

                ClientCommand::GetPreimage {
                    hash: read_hash(&body[1..])?,
                }
            }
            ClientCommandCode::GetMerkleLeafProof => {
                let root = read_hash(body)?;
                let (tree_size, n) = varint::decode(&body[HASH_LEN..])?;
                let (leaf_index, m) = varint::decode(&body[HASH_LEN + n..])?;

                if HASH_LEN + n + m != body.len() {
                    return Err(ApduError::InvalidLength);
                }

                ClientCommand::GetMerkleLeafProof {
                    root,
                    tree_size,
                    leaf_index,
                }
            }
            ClientCommandCode::GetMerkleLeafIndex => {
                if body.len() != 2 * HASH_LEN {
                    return Err(ApduError::InvalidLength);
                }

                ClientCommand::GetMerkleLeafIndex {
                    root: read_hash(body)?,
                    leaf_hash: read_hash(&body[HASH_LEN..])?,
                }
            }
            ClientCommandCode::GetMoreElements => {
                if !body.is_empty() {
                    return Err(ApduError::InvalidLength);
                }
                ClientCommand::GetMoreElements
            }
        };

        Ok((cmd, buff.len()))
    }
}
