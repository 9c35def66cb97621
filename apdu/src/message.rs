// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Message signing APDUs
//!
//! Messages (plain, ERC-4361 and withdrawal data) are split into chunks and
//! committed to as a Merkle tree, the request carries only the total length
//! and root. The device fetches chunks via client commands and responds with
//! a 65 byte compact signature.

use encdec::Encode;
use strum::Display;

use crate::{
    check_len,
    merkle::{Hash, HASH_LEN},
    path, varint, ApduError, ApduHeader, ApduReq, Instruction, BTC_APDU_CLA,
};

/// Message chunk size for plain and ERC-4361 messages
pub const MESSAGE_CHUNK_LEN: usize = 64;

/// Message signing variants, sharing a request encoding
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum MessageKind {
    /// Bitcoin signed message
    Message,
    /// Withdrawal authorisation
    Withdrawal,
    /// ERC-4361 sign-in message
    Erc4361,
}

impl MessageKind {
    /// Instruction used to sign this kind of message
    pub fn instruction(&self) -> Instruction {
        match self {
            MessageKind::Message => Instruction::SignMessage,
            MessageKind::Withdrawal => Instruction::SignWithdraw,
            MessageKind::Erc4361 => Instruction::SignErc4361Message,
        }
    }
}

/// Sign message request
///
/// ## Encoding
///
/// ```text
/// PATH_LEN | PATH[n] (u32 BE) | VARINT(MESSAGE_LEN) | CHUNKS_ROOT[32]
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SignMessageReq<'a> {
    pub kind: MessageKind,
    /// BIP32 derivation path of the signing key
    pub path: &'a [u32],
    /// Total message length in bytes
    pub len: u64,
    /// Root of the tree over message chunks
    pub root: Hash,
}

impl<'a> ApduReq for SignMessageReq<'a> {
    fn header(&self) -> ApduHeader {
        ApduHeader::new(BTC_APDU_CLA, self.kind.instruction() as u8)
    }
}

impl<'a> Encode for SignMessageReq<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        Ok(path::encode_len(self.path) + varint::encode_len(self.len) + HASH_LEN)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        check_len(buff, self.encode_len()?)?;

        let mut index = path::encode(self.path, buff)?;
        index += varint::encode(self.len, &mut buff[index..])?;
        buff[index..][..HASH_LEN].copy_from_slice(&self.root);
        index += HASH_LEN;

        Ok(index)
    }
}
