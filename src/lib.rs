//! Append-only Merkle commitment over ballot records.
//!
//! [`CommitmentStore`] keeps the leaf digests of every committed record in insertion order
//! and maintains the binary hash tree above them. Any holder of a leaf digest, its [`Proof`]
//! and a root can check inclusion with [`verify_proof`] without access to the store.

pub mod ballot;
pub mod digest;
mod error;
pub mod hashtree;
pub mod store;

pub use digest::{Blake3, Digest, Hasher, Sha256};
pub use error::{Error, Result};
pub use hashtree::{HashTree, Proof, ProofStep, verify_proof};
pub use store::{Commitment, CommitmentStore};

/// SplitMix64 mixing step, used to derive well-spread synthetic records from a counter.
pub fn splitmix64(x: u64) -> u64 {
  let mut z = x.wrapping_add(0x9e3779b97f4a7c15);
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
  z ^ (z >> 31)
}
