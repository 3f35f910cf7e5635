use std::fmt::{Debug, Display};
use std::str::FromStr;

use sha2::Digest as _;

use crate::{Error, Result};

pub const DIGEST_SIZE: usize = 32;

/// Fixed-size output of a [`Hasher`]. Only equality is meaningful.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
  /// Root of a tree with no leaves. It is a fixed constant rather than the hash of
  /// anything, so no record set can ever produce it through the pairing rule.
  pub const EMPTY: Digest = Digest([0u8; DIGEST_SIZE]);

  pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
    Digest(bytes)
  }

  pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
    &self.0
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }

  pub fn from_hex(s: &str) -> Result<Self> {
    let mut bytes = [0u8; DIGEST_SIZE];
    hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
    Ok(Digest(bytes))
  }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
  fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
    Digest(bytes)
  }
}

impl AsRef<[u8]> for Digest {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl Debug for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // short form is enough to tell nodes apart in test output
    write!(f, "Digest({}..)", &self.to_hex()[..12])
  }
}

impl FromStr for Digest {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Digest::from_hex(s)
  }
}

/// The digest primitive the tree is built over.
///
/// `hash_pair` must be order-sensitive: a proof step records which side the sibling is
/// on, and that information is lost if `hash_pair(a, b) == hash_pair(b, a)`.
pub trait Hasher: Debug + Clone + Default + Send + Sync + 'static {
  /// Short name used in logs and reports.
  const NAME: &'static str;

  /// Digest of one committed record (a leaf).
  fn hash(data: &[u8]) -> Digest;

  /// `hash(left ++ right)`
  fn hash_pair(left: &Digest, right: &Digest) -> Digest;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3;

impl Hasher for Blake3 {
  const NAME: &'static str = "blake3";

  fn hash(data: &[u8]) -> Digest {
    Digest(*blake3::hash(data).as_bytes())
  }

  fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest(*hasher.finalize().as_bytes())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

impl Hasher for Sha256 {
  const NAME: &'static str = "sha256";

  fn hash(data: &[u8]) -> Digest {
    Digest(sha2::Sha256::digest(data).into())
  }

  fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = sha2::Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest(hasher.finalize().into())
  }
}
