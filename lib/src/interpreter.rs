// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Client command interpreter
//!
//! Answers the [ClientCommand]s a device issues while a request is suspended,
//! using preimages and Merkle trees registered before the request is sent.
//! An interpreter is created per operation and dropped with it.

use std::collections::{HashMap, VecDeque};

use encdec::Decode;
use log::{debug, trace, warn};

use ledger_acre_apdu::{
    client_command::ClientCommand,
    merkle::{hash_leaf, Hash, MerkleTree, HASH_LEN},
    varint::{self, VarInt},
    ApduError, MAX_APDU_PAYLOAD,
};
use sha2::{Digest, Sha256};

use crate::merkleize::MerkleMap;

/// Maximum number of proof hashes returned with a leaf proof answer
const MAX_PROOF_ELEMENTS: usize = (MAX_APDU_PAYLOAD - HASH_LEN - 2) / HASH_LEN;

/// Maximum combined element payload of a GET_MORE_ELEMENTS answer
const MAX_ELEMENTS_PAYLOAD: usize = MAX_APDU_PAYLOAD - 2;

/// Client command failures, each is fatal for the running operation
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    /// Malformed or unrecognised client command
    #[error("Invalid client command: {0}")]
    Command(#[from] ApduError),

    /// Device requested a preimage that was never registered
    #[error("Unknown preimage for hash {}", hex::encode(.0))]
    UnknownPreimage(Hash),

    /// Device referenced a tree that was never registered
    #[error("Unknown Merkle root {}", hex::encode(.0))]
    UnknownRoot(Hash),

    /// Requested tree size does not match the registered tree
    #[error("Tree size mismatch (requested: {requested}, actual: {actual})")]
    TreeSizeMismatch { requested: u64, actual: usize },

    /// Requested leaf is outside the tree
    #[error("Leaf index {index} out of range for tree of size {size}")]
    LeafIndexOutOfRange { index: u64, size: u64 },

    /// Data was requested while queued elements are outstanding
    #[error("Element queue not empty")]
    QueueNotEmpty,

    /// More elements requested with nothing queued
    #[error("No queued elements")]
    QueueEmpty,

    /// Queued elements are not all the same length
    #[error("Queued elements have mixed lengths")]
    MixedElementLengths,
}

/// Progress callback, invoked once per client command
pub type ProgressCallback = Box<dyn FnMut() + Send>;

/// Client command interpreter
#[derive(Default)]
pub struct ClientCommandInterpreter {
    /// Known preimages by SHA-256 hash
    preimages: HashMap<Hash, Vec<u8>>,
    /// Known trees by root
    trees: HashMap<Hash, MerkleTree>,
    /// Elements left over from previous answers
    queue: VecDeque<Vec<u8>>,
    /// Fragments yielded by the device, in arrival order
    yielded: Vec<Vec<u8>>,
    /// Optional progress callback
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ClientCommandInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCommandInterpreter")
            .field("preimages", &self.preimages.len())
            .field("trees", &self.trees.len())
            .field("queue", &self.queue.len())
            .field("yielded", &self.yielded.len())
            .finish()
    }
}

impl ClientCommandInterpreter {
    /// Create an empty interpreter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an interpreter invoking `progress` on each client command
    pub fn with_progress(progress: impl FnMut() + Send + 'static) -> Self {
        Self {
            progress: Some(Box::new(progress)),
            ..Default::default()
        }
    }

    /// Register a preimage, returning its SHA-256 hash
    pub fn add_known_preimage(&mut self, data: &[u8]) -> Hash {
        let h: Hash = Sha256::digest(data).into();
        self.preimages.insert(h, data.to_vec());
        h
    }

    /// Register an ordered list, returning the root of the tree over it
    ///
    /// Each element is addressable by its leaf hash, the preimage
    /// `0x00 || element` is registered alongside the tree.
    pub fn add_known_list<B: AsRef<[u8]>>(&mut self, elements: &[B]) -> Hash {
        let mut leaves = Vec::with_capacity(elements.len());

        for e in elements {
            let e = e.as_ref();

            let mut preimage = Vec::with_capacity(1 + e.len());
            preimage.push(0x00);
            preimage.extend_from_slice(e);
            self.add_known_preimage(&preimage);

            leaves.push(hash_leaf(e));
        }

        let tree = MerkleTree::new(leaves);
        let root = *tree.root();
        self.trees.insert(root, tree);

        root
    }

    /// Register a key / value mapping as separate key and value lists
    pub fn add_known_mapping(&mut self, map: &MerkleMap) {
        self.add_known_list(map.keys());
        self.add_known_list(map.values());
    }

    /// Fragments yielded by the device so far, in arrival order
    pub fn yielded(&self) -> &[Vec<u8>] {
        &self.yielded
    }

    /// Consume the interpreter, returning yielded fragments
    pub fn into_yielded(self) -> Vec<Vec<u8>> {
        self.yielded
    }

    /// Answer a single client command
    pub fn execute(&mut self, request: &[u8]) -> Result<Vec<u8>, InterpreterError> {
        if let Some(p) = self.progress.as_mut() {
            (p)();
        }

        let (cmd, _) = ClientCommand::decode(request)?;

        trace!("Client command: {:02x?}", cmd);

        match cmd {
            ClientCommand::Yield(fragment) => {
                debug!("Device yielded {} bytes", fragment.len());
                self.yielded.push(fragment.to_vec());
                Ok(vec![])
            }
            ClientCommand::GetPreimage { hash } => self.get_preimage(&hash),
            ClientCommand::GetMerkleLeafProof {
                root,
                tree_size,
                leaf_index,
            } => self.get_merkle_leaf_proof(&root, tree_size, leaf_index),
            ClientCommand::GetMerkleLeafIndex { root, leaf_hash } => {
                self.get_merkle_leaf_index(&root, &leaf_hash)
            }
            ClientCommand::GetMoreElements => self.get_more_elements(),
        }
    }

    fn get_preimage(&mut self, hash: &Hash) -> Result<Vec<u8>, InterpreterError> {
        if !self.queue.is_empty() {
            return Err(InterpreterError::QueueNotEmpty);
        }

        let preimage = self
            .preimages
            .get(hash)
            .ok_or(InterpreterError::UnknownPreimage(*hash))?;

        let len = VarInt::from(preimage.len());

        // Bytes that do not fit are queued for GET_MORE_ELEMENTS
        let n = preimage.len().min(MAX_APDU_PAYLOAD - len.len() - 1);
        self.queue.extend(preimage[n..].iter().map(|b| vec![*b]));

        let mut resp = Vec::with_capacity(len.len() + 1 + n);
        resp.extend_from_slice(&len.to_vec());
        resp.push(n as u8);
        resp.extend_from_slice(&preimage[..n]);

        Ok(resp)
    }

    fn get_merkle_leaf_proof(
        &mut self,
        root: &Hash,
        tree_size: u64,
        leaf_index: u64,
    ) -> Result<Vec<u8>, InterpreterError> {
        if !self.queue.is_empty() {
            return Err(InterpreterError::QueueNotEmpty);
        }

        let tree = self
            .trees
            .get(root)
            .ok_or(InterpreterError::UnknownRoot(*root))?;

        if leaf_index >= tree_size {
            return Err(InterpreterError::LeafIndexOutOfRange {
                index: leaf_index,
                size: tree_size,
            });
        }
        if tree.len() as u64 != tree_size {
            return Err(InterpreterError::TreeSizeMismatch {
                requested: tree_size,
                actual: tree.len(),
            });
        }

        // Index is bounded by the tree size check above
        let index = leaf_index as usize;
        let (leaf, proof) = match (tree.leaf(index), tree.proof(index)) {
            (Some(l), Some(p)) => (l, p),
            _ => {
                return Err(InterpreterError::LeafIndexOutOfRange {
                    index: leaf_index,
                    size: tree_size,
                })
            }
        };

        let n = proof.len().min(MAX_PROOF_ELEMENTS);
        self.queue.extend(proof[n..].iter().map(|h| h.to_vec()));

        let mut resp = Vec::with_capacity(HASH_LEN + 2 + n * HASH_LEN);
        resp.extend_from_slice(leaf);
        resp.push(proof.len() as u8);
        resp.push(n as u8);
        for h in &proof[..n] {
            resp.extend_from_slice(h);
        }

        Ok(resp)
    }

    fn get_merkle_leaf_index(
        &self,
        root: &Hash,
        leaf_hash: &Hash,
    ) -> Result<Vec<u8>, InterpreterError> {
        let tree = self
            .trees
            .get(root)
            .ok_or(InterpreterError::UnknownRoot(*root))?;

        // Absent leaves are reported rather than failed, the device uses
        // this to probe for optional keys
        let (found, index) = match tree.index_of(leaf_hash) {
            Some(i) => (1u8, i as u64),
            None => {
                warn!("Leaf {} not found in tree", hex::encode(leaf_hash));
                (0u8, 0)
            }
        };

        let mut resp = vec![0u8; 1 + varint::encode_len(index)];
        resp[0] = found;
        varint::encode(index, &mut resp[1..])?;

        Ok(resp)
    }

    fn get_more_elements(&mut self) -> Result<Vec<u8>, InterpreterError> {
        let elem_len = match self.queue.front() {
            Some(e) => e.len(),
            None => return Err(InterpreterError::QueueEmpty),
        };

        if elem_len == 0 || self.queue.iter().any(|e| e.len() != elem_len) {
            return Err(InterpreterError::MixedElementLengths);
        }

        let n = self.queue.len().min(MAX_ELEMENTS_PAYLOAD / elem_len);

        let mut resp = Vec::with_capacity(2 + n * elem_len);
        resp.push(n as u8);
        resp.push(elem_len as u8);
        for e in self.queue.drain(..n) {
            resp.extend_from_slice(&e);
        }

        Ok(resp)
    }
}
