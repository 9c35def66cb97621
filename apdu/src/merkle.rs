// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Domain separated binary Merkle trees
//!
//! Leaves are hashed as `SHA256(0x00 || data)` and internal nodes as
//! `SHA256(0x01 || left || right)`, so a leaf hash can never be confused with
//! a node hash.
//!
//! A tree over `n > 1` leaves splits at the largest power of two strictly
//! less than `n`, so unpaired subtrees are promoted unchanged rather than
//! duplicated. This matches the device verifier bit-for-bit. An empty tree
//! has an all-zero root.

use alloc::vec::Vec;

use sha2::{Digest, Sha256};

/// Length of tree hashes
pub const HASH_LEN: usize = 32;

/// Tree hash type
pub type Hash = [u8; HASH_LEN];

/// Leaf hash domain separation prefix
pub const LEAF_PREFIX: u8 = 0x00;

/// Internal node hash domain separation prefix
pub const NODE_PREFIX: u8 = 0x01;

/// Root of an empty tree
pub const EMPTY_ROOT: Hash = [0u8; HASH_LEN];

/// Hash a raw leaf element
pub fn hash_leaf(data: &[u8]) -> Hash {
    Sha256::new()
        .chain_update([LEAF_PREFIX])
        .chain_update(data)
        .finalize()
        .into()
}

/// Hash a pair of child nodes
pub fn hash_node(left: &Hash, right: &Hash) -> Hash {
    Sha256::new()
        .chain_update([NODE_PREFIX])
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// Immutable Merkle tree over an ordered set of leaf hashes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    leaves: Vec<Hash>,
    root: Hash,
}

impl MerkleTree {
    /// Build a tree over pre-hashed leaves
    pub fn new(leaves: Vec<Hash>) -> Self {
        let root = subtree_root(&leaves);
        Self { leaves, root }
    }

    /// Build a tree over raw elements, hashing each with [hash_leaf]
    pub fn from_elements<I, B>(elements: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::new(elements.into_iter().map(|e| hash_leaf(e.as_ref())).collect())
    }

    /// Fetch the tree root
    pub fn root(&self) -> &Hash {
        &self.root
    }

    /// Fetch the number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check whether the tree has no leaves
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Fetch leaf hashes
    pub fn leaves(&self) -> &[Hash] {
        &self.leaves
    }

    /// Fetch the hash of the leaf at `index`
    pub fn leaf(&self, index: usize) -> Option<&Hash> {
        self.leaves.get(index)
    }

    /// Find the index of the first leaf matching `leaf_hash`
    pub fn index_of(&self, leaf_hash: &Hash) -> Option<usize> {
        self.leaves.iter().position(|l| l == leaf_hash)
    }

    /// Build the inclusion proof for the leaf at `index`.
    ///
    /// Sibling hashes are ordered from the leaf up to the root.
    pub fn proof(&self, index: usize) -> Option<Vec<Hash>> {
        if index >= self.leaves.len() {
            return None;
        }

        let mut proof = Vec::new();
        subtree_proof(&self.leaves, index, &mut proof);
        Some(proof)
    }
}

/// Recompute a tree root from a leaf hash and its inclusion proof
pub fn root_from_proof(leaf: &Hash, index: usize, size: usize, proof: &[Hash]) -> Option<Hash> {
    if index >= size {
        return None;
    }

    if size == 1 {
        return match proof.is_empty() {
            true => Some(*leaf),
            false => None,
        };
    }

    // The top-most sibling is the last proof element
    let (sibling, rest) = proof.split_last()?;
    let k = split_point(size);

    match index < k {
        true => root_from_proof(leaf, index, k, rest).map(|l| hash_node(&l, sibling)),
        false => root_from_proof(leaf, index - k, size - k, rest).map(|r| hash_node(sibling, &r)),
    }
}

/// Largest power of two strictly less than `n` (for `n > 1`)
fn split_point(n: usize) -> usize {
    debug_assert!(n > 1);

    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

fn subtree_root(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        0 => EMPTY_ROOT,
        1 => leaves[0],
        n => {
            let k = split_point(n);
            hash_node(&subtree_root(&leaves[..k]), &subtree_root(&leaves[k..]))
        }
    }
}

fn subtree_proof(leaves: &[Hash], index: usize, proof: &mut Vec<Hash>) {
    let n = leaves.len();
    if n <= 1 {
        return;
    }

    let k = split_point(n);
    if index < k {
        subtree_proof(&leaves[..k], index, proof);
        proof.push(subtree_root(&leaves[k..]));
    } else {
        subtree_proof(&leaves[k..], index - k, proof);
        proof.push(subtree_root(&leaves[..k]));
    }
}
