// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Wallet policies
//!
//! A wallet policy is a descriptor template (`wpkh(@0/**)` etc.) with a list
//! of key expressions, registered with the device under an optional name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ledger_acre_apdu::{
    merkle::{Hash, MerkleTree},
    varint::VarInt,
};

use crate::{interpreter::ClientCommandInterpreter, Error};

/// Wallet policy serialization version
pub const WALLET_POLICY_VERSION: u8 = 0x01;

/// Wallet policy
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct WalletPolicy {
    /// Policy name, empty for default policies
    #[serde(default)]
    pub name: String,

    /// Descriptor template
    pub template: String,

    /// Key expressions, referenced from the template by index
    pub keys: Vec<String>,
}

impl WalletPolicy {
    pub fn new(name: impl Into<String>, template: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            keys,
        }
    }

    /// Root of the tree over key expressions
    pub fn keys_root(&self) -> Hash {
        *MerkleTree::from_elements(self.keys.iter().map(|k| k.as_bytes())).root()
    }

    /// Serialize the policy
    ///
    /// ```text
    /// VERSION | NAME_LEN | NAME | VARINT(TEMPLATE_LEN) | TEMPLATE
    ///     | VARINT(NUM_KEYS) | KEYS_ROOT[32]
    /// ```
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        if self.name.len() > u8::MAX as usize {
            return Err(Error::InvalidPolicy(format!(
                "name length {} exceeds {}",
                self.name.len(),
                u8::MAX
            )));
        }

        let mut b = vec![WALLET_POLICY_VERSION, self.name.len() as u8];
        b.extend_from_slice(self.name.as_bytes());
        b.extend_from_slice(&VarInt::from(self.template.len()).to_vec());
        b.extend_from_slice(self.template.as_bytes());
        b.extend_from_slice(&VarInt::from(self.keys.len()).to_vec());
        b.extend_from_slice(&self.keys_root());

        Ok(b)
    }

    /// Policy identifier, `SHA256(serialized policy)`
    pub fn id(&self) -> Result<Hash, Error> {
        Ok(Sha256::digest(self.serialize()?).into())
    }

    /// Register the key list and serialized policy with an interpreter
    pub fn register(&self, i: &mut ClientCommandInterpreter) -> Result<(), Error> {
        let keys: Vec<&[u8]> = self.keys.iter().map(|k| k.as_bytes()).collect();
        i.add_known_list(&keys);
        i.add_known_preimage(&self.serialize()?);
        Ok(())
    }
}
