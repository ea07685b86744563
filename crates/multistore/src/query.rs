//! The ABCI-compatible query wire: request/response types, path parsing,
//! and the composed (sub-store root -> app hash) proof.

use crate::error::{Result, StoreError};
use crate::merkle::{self, PathStep};
use sha2::{Digest, Sha256};
use store_errors::codes;

/// `{path, data, height, prove}`.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub height: i64,
    pub prove: bool,
}

/// `{code, value, proof, height}`.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub code: u32,
    pub value: Vec<u8>,
    pub proof: Option<Proof>,
    pub height: i64,
}

impl QueryResponse {
    pub fn ok(value: Vec<u8>, height: i64, proof: Option<Proof>) -> Self {
        Self {
            code: codes::OK,
            value,
            proof,
            height,
        }
    }

    pub fn error(err: &StoreError, height: i64) -> Self {
        Self {
            code: err.code(),
            value: Vec::new(),
            proof: None,
            height,
        }
    }
}

/// A proof path to a key inside a store's tree (`store_path`), concatenated
/// with the path from that tree's root to the app hash (`commit_path`), per
/// the proof-composition design note: both must be returned together.
#[derive(Debug, Clone)]
pub struct Proof {
    pub store_path: Vec<PathStep>,
    pub commit_path: Vec<PathStep>,
}

impl Proof {
    /// Verify this proof carries `leaf` up through the store root to
    /// exactly `app_hash`.
    pub fn verify(&self, leaf: [u8; 32], app_hash: &[u8]) -> bool {
        let store_root = merkle::verify_path(leaf, &self.store_path);
        let recomputed = merkle::verify_path(store_root, &self.commit_path);
        recomputed.as_slice() == app_hash
    }

    pub fn is_empty(&self) -> bool {
        self.store_path.is_empty() && self.commit_path.is_empty()
    }
}

/// Hash a (key, value) pair exactly as `sc::MemCommitmentEngine` does, so
/// callers verifying a `Proof` can recompute the same leaf.
pub fn leaf_hash(key: &[u8], value: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((key.len() as u32).to_be_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize().into()
}

/// Split `/<storeName>[/<subPath>]` into `(storeName, subPath)`. `subPath`
/// retains its leading `/`, or is empty if there was none.
pub fn parse_path(path: &str) -> Result<(String, String)> {
    if !path.starts_with('/') {
        return Err(StoreError::UnknownRequest(format!(
            "path must start with '/': {path}"
        )));
    }
    let rest = &path[1..];
    if rest.is_empty() {
        return Err(StoreError::UnknownRequest("empty path".to_string()));
    }
    match rest.find('/') {
        Some(idx) => {
            let store = &rest[..idx];
            if store.is_empty() {
                return Err(StoreError::UnknownRequest(format!(
                    "missing store name in path: {path}"
                )));
            }
            Ok((store.to_string(), rest[idx..].to_string()))
        }
        None => Ok((rest.to_string(), String::new())),
    }
}
