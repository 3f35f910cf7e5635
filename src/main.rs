use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use ballot_merkle::ballot::{Address, BallotBox};
use ballot_merkle::{Blake3, CommitmentStore, Digest, Hasher, Proof, Result, Sha256, splitmix64, verify_proof};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod stat;

#[derive(Parser)]
#[command(name = "ballot-merkle")]
#[command(author, version, about = "Merkle commitment over ballots: simulate, benchmark and verify inclusion proofs")]
struct Args {
  /// Digest primitive the tree is built with
  #[arg(long, value_enum, global = true, default_value_t = HashKind::Blake3)]
  hash: HashKind,

  #[command(subcommand)]
  command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum HashKind {
  Blake3,
  Sha256,
}

#[derive(Subcommand)]
enum Command {
  /// Run a simulated election with parallel voters, then tamper with the tally and audit it
  Demo {
    #[arg(short, long, default_value_t = 64)]
    voters: usize,

    #[arg(short, long, default_value_t = 3)]
    candidates: u32,

    #[arg(short, long, default_value_t = 4)]
    threads: usize,
  },

  /// Measure append, proof and verification time relative to the number of leaves
  Bench {
    #[arg(short = 'n', long, default_value_t = 1024 * 1024)]
    max_n: u64,

    #[arg(short, long, default_value_t = 10)]
    division: usize,

    #[arg(short, long, default_value_t = 5)]
    trials: usize,

    /// Directory the CSV reports are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    #[arg(short, long, default_value_t = Local::now().format("%Y%m%d%H%M%S").to_string())]
    session: String,
  },

  /// Check an inclusion proof as a third party; exits with 1 on root mismatch
  Verify {
    /// Leaf digest in hex
    #[arg(long)]
    leaf: String,

    /// Encoded proof in hex
    #[arg(long)]
    proof: String,

    /// Root the leaf is claimed to be committed under, in hex
    #[arg(long)]
    root: String,
  },
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(false)
    .init();
}

fn main() -> Result<ExitCode> {
  init_tracing();
  let args = Args::parse();
  match args.hash {
    HashKind::Blake3 => run::<Blake3>(args.command),
    HashKind::Sha256 => run::<Sha256>(args.command),
  }
}

fn run<H: Hasher>(command: Command) -> Result<ExitCode> {
  match command {
    Command::Demo { voters, candidates, threads } => {
      demo::<H>(voters, candidates.max(1), threads.max(1))?;
      Ok(ExitCode::SUCCESS)
    }
    Command::Bench { max_n, division, trials, output, session } => {
      bench::<H>(max_n, division.max(2), trials.max(1), &output, &session)?;
      Ok(ExitCode::SUCCESS)
    }
    Command::Verify { leaf, proof, root } => {
      let leaf = Digest::from_hex(&leaf)?;
      let proof = Proof::from_hex(&proof)?;
      let root = Digest::from_hex(&root)?;
      if verify_proof::<H>(&leaf, &proof, &root)? {
        println!("VALID: leaf #{} of {} is committed under {root}", proof.index, proof.size);
        Ok(ExitCode::SUCCESS)
      } else {
        println!("ROOT MISMATCH: tampering detected, leaf is not committed under {root}");
        Ok(ExitCode::FAILURE)
      }
    }
  }
}

fn demo<H: Hasher>(voters: usize, candidates: u32, threads: usize) -> Result<()> {
  let store = Arc::new(CommitmentStore::<H>::new());
  let ballots = BallotBox::new(candidates, store.clone());
  info!(hash = H::NAME, voters, candidates, threads, "election opened");

  let receipts = Mutex::new(Vec::with_capacity(voters));
  thread::scope(|s| -> Result<()> {
    let handles = (0..threads)
      .map(|t| {
        let (ballots, receipts) = (&ballots, &receipts);
        s.spawn(move || -> Result<()> {
          let mut rng = rand::rng();
          for _ in (t..voters).step_by(threads) {
            let receipt = ballots.cast(Address::random(), rng.random_range(1..=candidates))?;
            receipts.lock()?.push(receipt);
          }
          Ok(())
        })
      })
      .collect::<Vec<_>>();
    for handle in handles {
      handle.join().expect("voter thread panicked")?;
    }
    Ok(())
  })?;
  let receipts = receipts.into_inner()?;

  let root = ballots.root()?;
  println!("[election]");
  println!("  ballots: {}", store.size()?);
  println!("  root: {root}");
  for (candidate, votes) in ballots.tally()? {
    println!("  candidate #{candidate}: {votes}");
  }

  println!("[receipts]");
  let mut valid = 0;
  for receipt in receipts.iter() {
    let current = ballots.refresh(&receipt.tx_id)?;
    if ballots.verify_receipt(&current)? {
      valid += 1;
    }
  }
  println!("  {valid}/{} receipts verified against {root}", receipts.len());
  if let Some(first) = receipts.first() {
    if let Err(e) = ballots.cast(first.ballot.voter, 1) {
      println!("  second ballot from {}: {e}", first.ballot.voter);
    }

    let receipt = ballots.refresh(&first.tx_id)?;
    println!("  tx {} => leaf #{} proof {}", receipt.tx_id, receipt.proof.index, receipt.proof.to_hex()?);
  }
  if let Some(leaf) = store.leaf(1)? {
    // leaf #1 is a right child, so its first sibling is a distinct node on its left
    let mut forged = store.proof(1)?;
    forged.steps[0].sibling_is_right = true;
    let verdict = verify_proof::<H>(&leaf, &forged, &root)?;
    println!("  proof of leaf #1 with its first side flipped: {}", if verdict { "VALID" } else { "ROOT MISMATCH" });
  }

  println!("[tamper]");
  ballots.tamper(1, 100)?;
  println!("  +100 votes for candidate #1 written to the tally only");
  let after = ballots.root()?;
  println!("  root after tampering: {after} ({})", if after == root { "unchanged" } else { "changed" });
  let report = ballots.audit(&root)?;
  for d in report.discrepancies.iter() {
    println!("  candidate #{}: tally says {}, committed ballots say {}", d.candidate, d.reported, d.committed);
  }
  println!("  audit: {}", if report.is_clean() { "clean" } else { "TAMPERING DETECTED" });
  Ok(())
}

fn bench<H: Hasher>(max_n: u64, division: usize, trials: usize, output: &Path, session: &str) -> Result<()> {
  create_dir_all(output)?;
  let mut append = stat::Report::new();
  let mut prove = stat::Report::new();
  let mut verify = stat::Report::new();
  let mut rng = rand::rng();

  println!("[{session}-{}]", H::NAME);
  for n in linspace(1, max_n.max(1), division) {
    for _ in 0..trials {
      let store = CommitmentStore::<H>::new();
      let start = Instant::now();
      for i in 1..=n {
        store.append_leaf(&splitmix64(i).to_le_bytes())?;
      }
      append.add(n, start.elapsed());

      let index = rng.random_range(0..n);
      let start = Instant::now();
      let proof = store.proof(index)?;
      prove.add(n, start.elapsed());

      let leaf = H::hash(&splitmix64(index + 1).to_le_bytes());
      let root = store.root()?;
      let start = Instant::now();
      let valid = verify_proof::<H>(&leaf, &proof, &root)?;
      verify.add(n, start.elapsed());
      assert!(valid, "proof for leaf #{index} of {n} did not verify");
    }
    println!("  n={n}: append {}; prove {}; verify {}", append.single(n), prove.single(n), verify.single(n));
  }

  for (name, report) in [("append", &append), ("prove", &prove), ("verify", &verify)] {
    let path = output.join(format!("{session}-{}-{name}.csv", H::NAME));
    report.save_to_csv(&path)?;
    println!("==> {}", path.to_string_lossy());
  }
  Ok(())
}

fn linspace(min: u64, max: u64, n: usize) -> Vec<u64> {
  assert!(n > 1);
  let step = (max - min) as f64 / (n - 1) as f64;
  let mut values = (0..n).map(|i| (min as f64 + step * i as f64).round() as u64).collect::<Vec<_>>();
  values.dedup();
  values
}
