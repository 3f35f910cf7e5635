use std::sync::RwLock;

use tracing::{debug, info};

use crate::Result;
use crate::digest::{Blake3, Digest, Hasher};
use crate::hashtree::binary::LayeredHashTree;
use crate::hashtree::{HashTree, Proof};

/// Result of [`CommitmentStore::commit`]: everything a receipt needs, taken from one
/// consistent state of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
  pub index: u64,
  pub leaf: Digest,
  pub root: Digest,
  pub proof: Proof,
}

/// Append-only commitment log over a [`LayeredHashTree`].
///
/// The leaves and every derived layer sit behind a single lock. Writers hold it for the
/// whole append or reset, so readers always see a tree that a full rebuild from the current
/// leaves would produce. Leaves take their index in the order writers acquire the lock,
/// not the order callers issued the request.
#[derive(Debug, Default)]
pub struct CommitmentStore<H: Hasher = Blake3> {
  tree: RwLock<LayeredHashTree<H>>,
}

impl<H: Hasher> CommitmentStore<H> {
  pub fn new() -> Self {
    CommitmentStore { tree: RwLock::new(LayeredHashTree::new()) }
  }

  pub fn from_tree(tree: LayeredHashTree<H>) -> Self {
    CommitmentStore { tree: RwLock::new(tree) }
  }

  /// Commit `record` as the next leaf and return its digest.
  pub fn append_leaf(&self, record: &[u8]) -> Result<Digest> {
    let mut tree = self.tree.write()?;
    let (index, leaf) = tree.append(record);
    debug!(hash = H::NAME, index, leaf = %leaf, root = %tree.root_hash(), "leaf appended");
    Ok(leaf)
  }

  /// Commit `record` and produce its inclusion proof against the resulting root without
  /// letting another writer in between.
  pub fn commit(&self, record: &[u8]) -> Result<Commitment> {
    let mut tree = self.tree.write()?;
    let (index, leaf) = tree.append(record);
    let root = tree.root_hash();
    let proof = tree.generate_proof(index)?;
    debug!(hash = H::NAME, index, leaf = %leaf, root = %root, "leaf committed");
    Ok(Commitment { index, leaf, root, proof })
  }

  pub fn root(&self) -> Result<Digest> {
    Ok(self.tree.read()?.root_hash())
  }

  pub fn proof(&self, index: u64) -> Result<Proof> {
    self.tree.read()?.generate_proof(index)
  }

  pub fn leaf(&self, index: u64) -> Result<Option<Digest>> {
    Ok(self.tree.read()?.leaf(index))
  }

  pub fn size(&self) -> Result<u64> {
    Ok(self.tree.read()?.size())
  }

  /// Copy of the current tree, for consumers that want to walk its layers.
  pub fn snapshot(&self) -> Result<LayeredHashTree<H>> {
    Ok(self.tree.read()?.clone())
  }

  /// Drop every leaf and return to the empty root.
  pub fn reset(&self) -> Result<()> {
    let mut tree = self.tree.write()?;
    let discarded = tree.size();
    tree.clear();
    info!(hash = H::NAME, discarded, "commitment store reset");
    Ok(())
  }
}
