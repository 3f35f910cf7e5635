use std::marker::PhantomData;

use crate::digest::{Blake3, Digest, Hasher};
use crate::hashtree::{HashTree, Proof, ProofStep, depth};
use crate::{Error, Result};

/// Binary hash tree kept as a stack of layers in memory.
///
/// `layers[0]` holds the leaf digests in insertion order and every `layers[k + 1]` pairs
/// adjacent entries of `layers[k]`. When a layer has an odd length its last entry is
/// paired with itself:
///
/// ```text
///            root = h(h(A,B), h(C,C))
///           /                        \
///       h(A,B)                      h(C,C)
///      /      \                    /
///     A        B                  C
/// ```
///
/// The top layer always has exactly one entry once the tree is non-empty. With no leaves
/// there are no layers at all and the root is [`Digest::EMPTY`].
#[derive(Debug, Clone)]
pub struct LayeredHashTree<H: Hasher = Blake3> {
  layers: Vec<Vec<Digest>>,
  _hasher: PhantomData<H>,
}

impl<H: Hasher> Default for LayeredHashTree<H> {
  fn default() -> Self {
    Self::new()
  }
}

impl<H: Hasher> LayeredHashTree<H> {
  pub fn new() -> Self {
    LayeredHashTree { layers: Vec::new(), _hasher: PhantomData }
  }

  /// Build the whole tree from already-hashed leaves.
  pub fn from_leaves(leaves: Vec<Digest>) -> Self {
    let mut layers = Vec::with_capacity(depth(leaves.len() as u64) + 1);
    if !leaves.is_empty() {
      layers.push(leaves);
    }
    while let Some(current) = layers.last().filter(|layer| layer.len() > 1) {
      let next = current.chunks(2).map(Self::parent).collect::<Vec<_>>();
      layers.push(next);
    }
    LayeredHashTree { layers, _hasher: PhantomData }
  }

  pub fn from_records<I, R>(records: I) -> Self
  where
    I: IntoIterator<Item = R>,
    R: AsRef<[u8]>,
  {
    Self::from_leaves(records.into_iter().map(|r| H::hash(r.as_ref())).collect())
  }

  /// Number of layers including the leaves and the root; zero for an empty tree.
  pub fn height(&self) -> usize {
    self.layers.len()
  }

  pub fn layer(&self, level: usize) -> Option<&[Digest]> {
    self.layers.get(level).map(Vec::as_slice)
  }

  pub fn leaves(&self) -> &[Digest] {
    self.layer(0).unwrap_or(&[])
  }

  /// Hash of a chunk of one or two siblings; a lone node is paired with itself.
  fn parent(pair: &[Digest]) -> Digest {
    match pair {
      [left, right] => H::hash_pair(left, right),
      [single] => H::hash_pair(single, single),
      _ => unreachable!("chunks(2) yields one or two nodes"),
    }
  }

  /// Push `leaf` and recompute only the right spine.
  ///
  /// The new leaf is the last entry of layer 0, so the only nodes whose inputs change are
  /// the last entry of each layer above it. Every other node keeps the same children.
  fn push_leaf(&mut self, leaf: Digest) {
    if self.layers.is_empty() {
      self.layers.push(Vec::new());
    }
    self.layers[0].push(leaf);

    let mut level = 0;
    while self.layers[level].len() > 1 {
      let len = self.layers[level].len();
      let start = (len - 1) & !1;
      let node = Self::parent(&self.layers[level][start..]);
      let position = start / 2;
      if level + 1 == self.layers.len() {
        self.layers.push(Vec::new());
      }
      let upper = &mut self.layers[level + 1];
      if position < upper.len() {
        upper[position] = node;
      } else {
        debug_assert_eq!(position, upper.len());
        upper.push(node);
      }
      level += 1;
    }
    debug_assert_eq!(level + 1, self.layers.len());
  }
}

impl<H: Hasher> HashTree for LayeredHashTree<H> {
  fn size(&self) -> u64 {
    self.leaves().len() as u64
  }

  fn leaf(&self, index: u64) -> Option<Digest> {
    usize::try_from(index).ok().and_then(|i| self.leaves().get(i)).copied()
  }

  fn append(&mut self, record: &[u8]) -> (u64, Digest) {
    let index = self.size();
    let leaf = H::hash(record);
    self.push_leaf(leaf);
    (index, leaf)
  }

  fn root_hash(&self) -> Digest {
    match self.layers.last() {
      Some(top) => {
        debug_assert_eq!(1, top.len());
        top[0]
      }
      None => Digest::EMPTY,
    }
  }

  fn generate_proof(&self, index: u64) -> Result<Proof> {
    let size = self.size();
    if index >= size {
      return Err(Error::IndexOutOfRange { index, size });
    }
    let mut steps = Vec::with_capacity(self.height().saturating_sub(1));
    let mut i = index as usize;
    for layer in self.layers.iter().take(self.height() - 1) {
      let step = if i % 2 == 1 {
        ProofStep { sibling: layer[i - 1], sibling_is_right: false }
      } else {
        // self-paired nodes sit left of their own copy
        let sibling = layer.get(i + 1).unwrap_or(&layer[i]);
        ProofStep { sibling: *sibling, sibling_is_right: true }
      };
      steps.push(step);
      i /= 2;
    }
    debug_assert_eq!(depth(size), steps.len());
    Ok(Proof { index, size, steps })
  }

  fn clear(&mut self) {
    self.layers.clear();
  }
}

#[cfg(test)]
mod test;
