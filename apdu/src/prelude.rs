// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Prelude to simplify downstream use of APDU objects
//!

pub use crate::{
    client_command::{ClientCommand, ClientCommandCode},
    encode_apdu,
    fingerprint::{MasterFingerprintReq, MasterFingerprintResp},
    framework::ContinueReq,
    merkle::{hash_leaf, hash_node, Hash, MerkleTree, EMPTY_ROOT, HASH_LEN},
    message::{MessageKind, SignMessageReq, MESSAGE_CHUNK_LEN},
    path::{DerivationPath, PathError, HARDENED, MAX_PATH_LEN},
    psbt::{MapCommitment, SignPsbtReq},
    pubkey::GetExtendedPubkeyReq,
    varint::VarInt,
    wallet::{GetWalletAddressReq, RegisterWalletReq, RegisterWalletResp},
    ApduError, ApduHeader, ApduReq, FrameworkInstruction, Instruction, StatusWord,
    BTC_APDU_CLA, FRAMEWORK_APDU_CLA, MAX_APDU_PAYLOAD,
};
