use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::digest::{DIGEST_SIZE, Digest, Hasher};
use crate::{Error, Result};

pub mod binary;

/// Core hash tree abstraction
pub trait HashTree {
  /// Get the current size (number of leaf nodes)
  fn size(&self) -> u64;

  /// Retrieve a leaf digest by index
  fn leaf(&self, index: u64) -> Option<Digest>;

  /// Append a new record to the tree, returning its permanent index and leaf digest
  fn append(&mut self, record: &[u8]) -> (u64, Digest);

  /// Get the root hash, [`Digest::EMPTY`] while the tree has no leaves
  fn root_hash(&self) -> Digest;

  /// Generate proof path for given index
  fn generate_proof(&self, index: u64) -> Result<Proof>;

  /// Discard every leaf
  fn clear(&mut self);
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
  pub sibling: Digest,
  /// `true` when the sibling is hashed as the right operand, i.e. `hash_pair(current, sibling)`.
  pub sibling_is_right: bool,
}

/// Inclusion proof of the leaf at `index` in a tree of `size` leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
  pub index: u64,
  pub size: u64,
  pub steps: Vec<ProofStep>,
}

/// Number of layers above the leaves in a tree of `size` leaves: `ceil(log2(max(size, 1)))`.
#[inline]
pub fn depth(size: u64) -> usize {
  if size <= 1 { 0 } else { (u64::BITS - (size - 1).leading_zeros()) as usize }
}

/// Recompute the root from `leaf` along `proof` and compare it to `root`.
///
/// Needs nothing but its arguments, so any third party can run it. `Ok(false)` means the
/// proof is well formed but leads elsewhere: the leaf is not committed under `root`.
/// A proof whose shape cannot belong to any tree of the stated size is an error.
pub fn verify_proof<H: Hasher>(leaf: &Digest, proof: &Proof, root: &Digest) -> Result<bool> {
  proof.check_shape()?;
  let computed = proof.steps.iter().fold(*leaf, |current, step| {
    if step.sibling_is_right { H::hash_pair(&current, &step.sibling) } else { H::hash_pair(&step.sibling, &current) }
  });
  Ok(computed == *root)
}

impl Proof {
  fn check_shape(&self) -> Result<()> {
    if self.index >= self.size {
      return Err(Error::MalformedProof(format!("leaf index {} outside a tree of {} leaves", self.index, self.size)));
    }
    let expected = depth(self.size);
    if self.steps.len() != expected {
      return Err(Error::MalformedProof(format!(
        "{} steps for a tree of {} leaves, expected {expected}",
        self.steps.len(),
        self.size
      )));
    }
    Ok(())
  }

  /// Serialize as `index:u64 size:u64 count:u8 (flag:u8 sibling:[u8; 32])*`, little-endian.
  pub fn write<W: Write>(&self, w: &mut W) -> Result<usize> {
    w.write_u64::<LittleEndian>(self.index)?;
    w.write_u64::<LittleEndian>(self.size)?;
    let count = u8::try_from(self.steps.len())
      .map_err(|_| Error::MalformedProof(format!("{} steps cannot be encoded", self.steps.len())))?;
    w.write_u8(count)?;
    for step in self.steps.iter() {
      w.write_u8(if step.sibling_is_right { 1 } else { 0 })?;
      w.write_all(step.sibling.as_bytes())?;
    }
    Ok(8 + 8 + 1 + self.steps.len() * (1 + DIGEST_SIZE))
  }

  pub fn read<R: Read>(r: &mut R) -> Result<Self> {
    let truncated = |e: std::io::Error| Error::MalformedProof(format!("truncated proof: {e}"));
    let index = r.read_u64::<LittleEndian>().map_err(truncated)?;
    let size = r.read_u64::<LittleEndian>().map_err(truncated)?;
    let count = r.read_u8().map_err(truncated)?;
    let mut steps = Vec::with_capacity(count as usize);
    for _ in 0..count {
      let sibling_is_right = match r.read_u8().map_err(truncated)? {
        0 => false,
        1 => true,
        flag => return Err(Error::MalformedProof(format!("invalid side flag: {flag}"))),
      };
      let mut sibling = [0u8; DIGEST_SIZE];
      r.read_exact(&mut sibling).map_err(truncated)?;
      steps.push(ProofStep { sibling: Digest::from_bytes(sibling), sibling_is_right });
    }
    let proof = Proof { index, size, steps };
    proof.check_shape()?;
    Ok(proof)
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(8 + 8 + 1 + self.steps.len() * (1 + DIGEST_SIZE));
    self.write(&mut buffer)?;
    Ok(buffer)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    let mut cursor = Cursor::new(bytes);
    let proof = Self::read(&mut cursor)?;
    if cursor.position() != bytes.len() as u64 {
      return Err(Error::MalformedProof(format!("{} trailing bytes", bytes.len() as u64 - cursor.position())));
    }
    Ok(proof)
  }

  pub fn to_hex(&self) -> Result<String> {
    Ok(hex::encode(self.to_bytes()?))
  }

  pub fn from_hex(s: &str) -> Result<Self> {
    Self::from_bytes(&hex::decode(s.trim_start_matches("0x"))?)
  }
}
