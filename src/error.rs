use std::sync::PoisonError;

use crate::ballot::{Address, TxId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("leaf index {index} is out of range for a tree of {size} leaves")]
  IndexOutOfRange { index: u64, size: u64 },

  /// The proof is structurally invalid. This is distinct from a well-formed proof that
  /// simply does not lead to the claimed root.
  #[error("malformed proof: {0}")]
  MalformedProof(String),

  #[error("voter {0} has already cast a ballot")]
  DoubleVote(Address),

  #[error("unknown candidate: #{0}")]
  UnknownCandidate(u32),

  #[error("no receipt has been issued for transaction {0}")]
  UnknownReceipt(TxId),

  #[error("the commitment lock was poisoned by a panicking writer")]
  Poisoned,

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("invalid hex: {0}")]
  Hex(#[from] hex::FromHexError),
}

impl<T> From<PoisonError<T>> for Error {
  fn from(_: PoisonError<T>) -> Self {
    Error::Poisoned
  }
}
