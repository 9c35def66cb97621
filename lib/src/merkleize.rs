// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Merkleization of request payloads
//!
//! Key / value maps are committed to as a pair of trees (sorted keys and
//! their values), PSBTs add a second level committing to the list of
//! per-input and per-output map commitments. Flat payloads such as messages
//! are committed to as a single list of chunks.

use std::collections::BTreeMap;

use ledger_acre_apdu::{
    merkle::{Hash, MerkleTree},
    message::MESSAGE_CHUNK_LEN,
    psbt::MapCommitment,
};

use crate::{interpreter::ClientCommandInterpreter, psbt::Psbt};

/// Key / value map with strictly increasing keys
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MerkleMap {
    keys: Vec<Vec<u8>>,
    values: Vec<Vec<u8>>,
}

/// Attempted to insert a key already present in a [MerkleMap]
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Duplicate map key {}", hex::encode(.0))]
pub struct DuplicateKey(pub Vec<u8>);

impl MerkleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping keys sorted
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), DuplicateKey> {
        match self.keys.binary_search(&key) {
            Ok(_) => Err(DuplicateKey(key)),
            Err(i) => {
                self.keys.insert(i, key);
                self.values.insert(i, value);
                Ok(())
            }
        }
    }

    /// Sorted keys
    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Values, in key order
    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    /// Fetch the value for a key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.keys
            .binary_search_by(|k| k.as_slice().cmp(key))
            .ok()
            .map(|i| self.values[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compute the map commitment `VARINT(n) | KEYS_ROOT | VALUES_ROOT`
    pub fn commitment(&self) -> MapCommitment {
        MapCommitment {
            size: self.keys.len() as u64,
            keys_root: *MerkleTree::from_elements(&self.keys).root(),
            values_root: *MerkleTree::from_elements(&self.values).root(),
        }
    }
}

impl From<BTreeMap<Vec<u8>, Vec<u8>>> for MerkleMap {
    fn from(m: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        let (keys, values) = m.into_iter().unzip();
        Self { keys, values }
    }
}

/// PSBT with each map merkleized
#[derive(Clone, Debug, PartialEq)]
pub struct MerkleizedPsbt {
    pub global: MerkleMap,
    pub inputs: Vec<MerkleMap>,
    pub outputs: Vec<MerkleMap>,
    input_commitments: Vec<Vec<u8>>,
    output_commitments: Vec<Vec<u8>>,
}

impl MerkleizedPsbt {
    /// Merkleize global, input and output maps
    pub fn new(global: MerkleMap, inputs: Vec<MerkleMap>, outputs: Vec<MerkleMap>) -> Self {
        let input_commitments = inputs.iter().map(|m| m.commitment().to_vec()).collect();
        let output_commitments = outputs.iter().map(|m| m.commitment().to_vec()).collect();

        Self {
            global,
            inputs,
            outputs,
            input_commitments,
            output_commitments,
        }
    }

    /// Global map commitment, sent verbatim in the sign request
    pub fn global_commitment(&self) -> MapCommitment {
        self.global.commitment()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Encoded per-input map commitments
    pub fn input_commitments(&self) -> &[Vec<u8>] {
        &self.input_commitments
    }

    /// Encoded per-output map commitments
    pub fn output_commitments(&self) -> &[Vec<u8>] {
        &self.output_commitments
    }

    /// Root of the tree over input map commitments
    pub fn inputs_root(&self) -> Hash {
        *MerkleTree::from_elements(&self.input_commitments).root()
    }

    /// Root of the tree over output map commitments
    pub fn outputs_root(&self) -> Hash {
        *MerkleTree::from_elements(&self.output_commitments).root()
    }

    /// Register every map and both commitment lists with an interpreter
    pub fn register(&self, i: &mut ClientCommandInterpreter) {
        i.add_known_mapping(&self.global);
        for m in self.inputs.iter().chain(self.outputs.iter()) {
            i.add_known_mapping(m);
        }

        i.add_known_list(&self.input_commitments);
        i.add_known_list(&self.output_commitments);
    }
}

impl From<&Psbt> for MerkleizedPsbt {
    fn from(p: &Psbt) -> Self {
        Self::new(
            MerkleMap::from(p.global.clone()),
            p.inputs.iter().cloned().map(MerkleMap::from).collect(),
            p.outputs.iter().cloned().map(MerkleMap::from).collect(),
        )
    }
}

/// Split a message into signing chunks, the last may be shorter
pub fn message_chunks(message: &[u8]) -> Vec<&[u8]> {
    message.chunks(MESSAGE_CHUNK_LEN).collect()
}

#[cfg(test)]
mod test {
    use ledger_acre_apdu::merkle::{hash_leaf, EMPTY_ROOT};

    use super::*;

    #[test]
    fn map_keys_sorted() {
        let mut m = MerkleMap::new();
        m.insert(vec![0x03], vec![0x33]).unwrap();
        m.insert(vec![0x01, 0xff], vec![0x11]).unwrap();
        m.insert(vec![0x02], vec![0x22]).unwrap();

        assert_eq!(m.keys(), &[vec![0x01u8, 0xff], vec![0x02u8], vec![0x03u8]]);
        assert_eq!(m.values(), &[vec![0x11u8], vec![0x22u8], vec![0x33u8]]);
        assert_eq!(m.get(&[0x02]), Some(&[0x22u8][..]));
        assert_eq!(m.get(&[0x04]), None);

        assert_eq!(
            m.insert(vec![0x02], vec![0x00]),
            Err(DuplicateKey(vec![0x02]))
        );
    }

    #[test]
    fn map_commitment() {
        let mut a = MerkleMap::new();
        a.insert(b"k1".to_vec(), b"v1".to_vec()).unwrap();
        a.insert(b"k2".to_vec(), b"v2".to_vec()).unwrap();

        let c = a.commitment();
        assert_eq!(c.size, 2);
        assert_eq!(
            c.keys_root,
            *MerkleTree::new(vec![hash_leaf(b"k1"), hash_leaf(b"k2")]).root()
        );

        // Insertion order does not affect the commitment
        let mut b = MerkleMap::new();
        b.insert(b"k2".to_vec(), b"v2".to_vec()).unwrap();
        b.insert(b"k1".to_vec(), b"v1".to_vec()).unwrap();
        assert_eq!(b.commitment(), c);

        // Values are committed to
        let mut d = MerkleMap::new();
        d.insert(b"k1".to_vec(), b"v1".to_vec()).unwrap();
        d.insert(b"k2".to_vec(), b"v3".to_vec()).unwrap();
        assert_ne!(d.commitment(), c);

        let e = MerkleMap::new().commitment();
        assert_eq!(e.keys_root, EMPTY_ROOT);
        assert_eq!(e.to_vec().len(), 65);
    }

    #[test]
    fn psbt_two_level_commitment() {
        let mk = |v: u8| {
            let mut m = MerkleMap::new();
            m.insert(vec![0x01], vec![v]).unwrap();
            m
        };

        let p = MerkleizedPsbt::new(mk(0), vec![mk(1), mk(2)], vec![mk(3)]);

        assert_eq!(p.input_count(), 2);
        assert_eq!(p.output_count(), 1);
        assert_eq!(p.input_commitments()[1], mk(2).commitment().to_vec());

        let expected = MerkleTree::new(vec![
            hash_leaf(&mk(1).commitment().to_vec()),
            hash_leaf(&mk(2).commitment().to_vec()),
        ]);
        assert_eq!(p.inputs_root(), *expected.root());
        assert_eq!(
            p.outputs_root(),
            hash_leaf(&mk(3).commitment().to_vec())
        );
    }

    #[test]
    fn chunk_messages() {
        assert_eq!(message_chunks(b"test"), vec![&b"test"[..]]);

        let m = [0x5au8; 130];
        let c = message_chunks(&m);
        assert_eq!(c.len(), 3);
        assert_eq!(c[0].len(), 64);
        assert_eq!(c[2].len(), 2);

        assert!(message_chunks(&[]).is_empty());
    }
}
