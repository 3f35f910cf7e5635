//! Ballot intake on top of the commitment store.
//!
//! Each accepted ballot is encoded into one record and committed as one leaf. The tally
//! and voter registry live beside the tree and are *not* covered by it, which is what
//! [`BallotBox::tamper`] and [`BallotBox::audit`] are about.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::digest::{Blake3, Digest, Hasher};
use crate::hashtree::binary::LayeredHashTree;
use crate::hashtree::{HashTree, Proof, verify_proof};
use crate::store::CommitmentStore;
use crate::{Error, Result};

pub const ADDRESS_SIZE: usize = 20;
pub const TX_ID_SIZE: usize = 16;

/// Voter account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
  pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
    Address(bytes)
  }

  pub fn random() -> Self {
    Address(rand::random())
  }

  pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
    &self.0
  }
}

impl Display for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl Debug for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl FromStr for Address {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let mut bytes = [0u8; ADDRESS_SIZE];
    hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
    Ok(Address(bytes))
  }
}

/// Opaque receipt handle. It is never interpreted, only used as a lookup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; TX_ID_SIZE]);

impl TxId {
  pub fn random() -> Self {
    TxId(rand::random())
  }
}

impl Display for TxId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "0x{}", hex::encode(self.0))
  }
}

impl Debug for TxId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl FromStr for TxId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let mut bytes = [0u8; TX_ID_SIZE];
    hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
    Ok(TxId(bytes))
  }
}

/// One vote as committed to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
  pub voter: Address,
  pub candidate: u32,
  /// Milliseconds since the Unix epoch when the ballot was accepted.
  pub timestamp: i64,
  /// Position in the acceptance sequence; keeps two records distinct even within one millisecond.
  pub sequence: u64,
}

impl Ballot {
  pub const ENCODED_SIZE: usize = ADDRESS_SIZE + 4 + 8 + 8;

  /// `voter:[u8; 20] candidate:u32 timestamp:i64 sequence:u64`, little-endian.
  pub fn encode(&self) -> [u8; Self::ENCODED_SIZE] {
    let mut buffer = [0u8; Self::ENCODED_SIZE];
    let (voter, rest) = buffer.split_at_mut(ADDRESS_SIZE);
    voter.copy_from_slice(self.voter.as_bytes());
    LittleEndian::write_u32(&mut rest[..4], self.candidate);
    LittleEndian::write_i64(&mut rest[4..12], self.timestamp);
    LittleEndian::write_u64(&mut rest[12..], self.sequence);
    buffer
  }

  pub fn leaf<H: Hasher>(&self) -> Digest {
    H::hash(&self.encode())
  }
}

/// What a voter keeps after casting: enough to prove inclusion to anyone who knows the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
  pub tx_id: TxId,
  pub ballot: Ballot,
  pub leaf: Digest,
  /// Root right after this ballot was committed.
  pub root: Digest,
  pub proof: Proof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
  pub candidate: u32,
  /// Count shown by the tally.
  pub reported: u64,
  /// Count recomputed from committed ballots.
  pub committed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
  /// Root the auditor recorded earlier.
  pub recorded_root: Digest,
  /// Root currently held by the store.
  pub current_root: Digest,
  /// Root of a tree rebuilt from the ballots in the ledger.
  pub rebuilt_root: Digest,
  pub discrepancies: Vec<Discrepancy>,
}

impl AuditReport {
  pub fn root_matches(&self) -> bool {
    self.recorded_root == self.current_root
  }

  pub fn ledger_matches_tree(&self) -> bool {
    self.rebuilt_root == self.current_root
  }

  pub fn is_clean(&self) -> bool {
    self.root_matches() && self.ledger_matches_tree() && self.discrepancies.is_empty()
  }
}

#[derive(Debug, Default)]
struct Ledger {
  voters: HashSet<Address>,
  tally: BTreeMap<u32, u64>,
  ballots: Vec<Ballot>,
  receipts: HashMap<TxId, Receipt>,
}

/// Accepts ballots for candidates `1..=candidates` and commits each one to a shared
/// [`CommitmentStore`].
///
/// Ballots are accepted one at a time: the ledger lock is held across the commit, so the
/// ledger order and the leaf order are the same.
#[derive(Debug)]
pub struct BallotBox<H: Hasher = Blake3> {
  store: Arc<CommitmentStore<H>>,
  candidates: u32,
  ledger: Mutex<Ledger>,
}

impl<H: Hasher> BallotBox<H> {
  pub fn new(candidates: u32, store: Arc<CommitmentStore<H>>) -> Self {
    let ledger = Ledger { tally: (1..=candidates).map(|c| (c, 0)).collect(), ..Default::default() };
    BallotBox { store, candidates, ledger: Mutex::new(ledger) }
  }

  pub fn store(&self) -> &Arc<CommitmentStore<H>> {
    &self.store
  }

  pub fn candidates(&self) -> u32 {
    self.candidates
  }

  pub fn cast(&self, voter: Address, candidate: u32) -> Result<Receipt> {
    let mut ledger = self.ledger.lock()?;
    if ledger.voters.contains(&voter) {
      warn!(%voter, "double vote rejected");
      return Err(Error::DoubleVote(voter));
    }
    if candidate == 0 || candidate > self.candidates {
      return Err(Error::UnknownCandidate(candidate));
    }

    let sequence = ledger.ballots.len() as u64;
    let ballot = Ballot { voter, candidate, timestamp: Utc::now().timestamp_millis(), sequence };
    let commitment = self.store.commit(&ballot.encode())?;
    let receipt = Receipt {
      tx_id: TxId::random(),
      ballot,
      leaf: commitment.leaf,
      root: commitment.root,
      proof: commitment.proof,
    };

    ledger.voters.insert(voter);
    *ledger.tally.entry(candidate).or_default() += 1;
    ledger.ballots.push(ballot);
    ledger.receipts.insert(receipt.tx_id, receipt.clone());
    debug!(%voter, candidate, tx = %receipt.tx_id, index = commitment.index, "ballot accepted");
    Ok(receipt)
  }

  pub fn has_voted(&self, voter: &Address) -> Result<bool> {
    Ok(self.ledger.lock()?.voters.contains(voter))
  }

  pub fn tally(&self) -> Result<BTreeMap<u32, u64>> {
    Ok(self.ledger.lock()?.tally.clone())
  }

  pub fn receipt(&self, tx_id: &TxId) -> Result<Receipt> {
    self.ledger.lock()?.receipts.get(tx_id).cloned().ok_or(Error::UnknownReceipt(*tx_id))
  }

  pub fn root(&self) -> Result<Digest> {
    self.store.root()
  }

  /// Check `receipt` against the current root.
  ///
  /// A receipt issued before later ballots were accepted carries a stale proof; fetch a
  /// fresh one with [`Self::refresh`] before verifying against a newer root.
  pub fn verify_receipt(&self, receipt: &Receipt) -> Result<bool> {
    if receipt.ballot.leaf::<H>() != receipt.leaf {
      return Ok(false);
    }
    verify_proof::<H>(&receipt.leaf, &receipt.proof, &self.store.root()?)
  }

  /// Reissue the proof of a receipt against the current tree.
  pub fn refresh(&self, tx_id: &TxId) -> Result<Receipt> {
    let mut receipt = self.receipt(tx_id)?;
    receipt.proof = self.store.proof(receipt.proof.index)?;
    receipt.root = self.store.root()?;
    Ok(receipt)
  }

  /// Add `extra_votes` to the tally behind the tree's back, as a compromised database would.
  pub fn tamper(&self, candidate: u32, extra_votes: u64) -> Result<()> {
    let mut ledger = self.ledger.lock()?;
    *ledger.tally.entry(candidate).or_default() += extra_votes;
    warn!(candidate, extra_votes, "tally modified outside the commitment");
    Ok(())
  }

  /// Compare the tally with the committed ballots and the store's root with `recorded_root`.
  pub fn audit(&self, recorded_root: &Digest) -> Result<AuditReport> {
    let ledger = self.ledger.lock()?;
    let mut committed = (1..=self.candidates).map(|c| (c, 0u64)).collect::<BTreeMap<_, _>>();
    for ballot in ledger.ballots.iter() {
      *committed.entry(ballot.candidate).or_default() += 1;
    }
    let discrepancies = ledger
      .tally
      .iter()
      .map(|(candidate, reported)| (*candidate, *reported, committed.get(candidate).copied().unwrap_or(0)))
      .filter(|(_, reported, committed)| reported != committed)
      .map(|(candidate, reported, committed)| Discrepancy { candidate, reported, committed })
      .collect::<Vec<_>>();

    let rebuilt_root = LayeredHashTree::<H>::from_records(ledger.ballots.iter().map(Ballot::encode)).root_hash();
    let report =
      AuditReport { recorded_root: *recorded_root, current_root: self.store.root()?, rebuilt_root, discrepancies };
    if report.is_clean() {
      info!(root = %report.current_root, ballots = ledger.ballots.len(), "audit passed");
    } else {
      warn!(
        root_matches = report.root_matches(),
        ledger_matches_tree = report.ledger_matches_tree(),
        discrepancies = report.discrepancies.len(),
        "audit detected tampering"
      );
    }
    Ok(report)
  }

  /// Forget every ballot and empty the store.
  pub fn reset(&self) -> Result<()> {
    let mut ledger = self.ledger.lock()?;
    *ledger = Ledger { tally: (1..=self.candidates).map(|c| (c, 0)).collect(), ..Default::default() };
    self.store.reset()?;
    info!(candidates = self.candidates, "election reset");
    Ok(())
  }
}
