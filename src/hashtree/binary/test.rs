use super::*;
use crate::digest::Sha256;
use crate::hashtree::verify_proof;
use crate::splitmix64;

fn records(n: u64) -> Vec<Vec<u8>> {
  (1..=n).map(|i| splitmix64(i).to_le_bytes().to_vec()).collect()
}

fn h(data: &[u8]) -> Digest {
  Blake3::hash(data)
}

fn hp(left: &Digest, right: &Digest) -> Digest {
  Blake3::hash_pair(left, right)
}

#[test]
fn test_empty_tree() {
  let tree = LayeredHashTree::<Blake3>::new();
  assert_eq!(0, tree.size());
  assert_eq!(0, tree.height());
  assert_eq!(Digest::EMPTY, tree.root_hash());
  assert_eq!(None, tree.leaf(0));
  assert!(matches!(tree.generate_proof(0), Err(Error::IndexOutOfRange { index: 0, size: 0 })));
  assert_eq!(Digest::EMPTY, LayeredHashTree::<Blake3>::from_leaves(vec![]).root_hash());
}

#[test]
fn test_single_leaf() {
  let mut tree = LayeredHashTree::<Blake3>::new();
  let (index, leaf) = tree.append(b"only");
  assert_eq!(0, index);
  assert_eq!(h(b"only"), leaf);
  assert_eq!(leaf, tree.root_hash());
  assert_ne!(Digest::EMPTY, tree.root_hash());

  let proof = tree.generate_proof(0).unwrap();
  assert!(proof.steps.is_empty());
  assert!(verify_proof::<Blake3>(&leaf, &proof, &tree.root_hash()).unwrap());
}

#[test]
fn test_empty_record_is_a_valid_leaf() {
  let mut tree = LayeredHashTree::<Blake3>::new();
  let (_, leaf) = tree.append(&[]);
  assert_eq!(h(&[]), leaf);
  assert_ne!(Digest::EMPTY, tree.root_hash());
}

#[test]
fn test_odd_count_duplicates_last() {
  let tree = LayeredHashTree::<Blake3>::from_records([b"A", b"B", b"C"]);
  let (a, b, c) = (h(b"A"), h(b"B"), h(b"C"));

  assert_eq!(3, tree.height());
  assert_eq!(&[a, b, c], tree.layer(0).unwrap());
  assert_eq!(&[hp(&a, &b), hp(&c, &c)], tree.layer(1).unwrap());
  assert_eq!(hp(&hp(&a, &b), &hp(&c, &c)), tree.root_hash());

  // C pairs with its own copy, then with h(A,B) on its left
  let proof = tree.generate_proof(2).unwrap();
  assert_eq!(
    vec![ProofStep { sibling: c, sibling_is_right: true }, ProofStep { sibling: hp(&a, &b), sibling_is_right: false }],
    proof.steps
  );
  assert!(verify_proof::<Blake3>(&c, &proof, &tree.root_hash()).unwrap());
}

#[test]
fn test_proof_sides() {
  let tree = LayeredHashTree::<Blake3>::from_records([b"A", b"B", b"C", b"D"]);
  let (a, b, c, d) = (h(b"A"), h(b"B"), h(b"C"), h(b"D"));

  let proof = tree.generate_proof(1).unwrap();
  assert_eq!(
    vec![ProofStep { sibling: a, sibling_is_right: false }, ProofStep { sibling: hp(&c, &d), sibling_is_right: true }],
    proof.steps
  );
  let proof = tree.generate_proof(2).unwrap();
  assert_eq!(
    vec![ProofStep { sibling: d, sibling_is_right: true }, ProofStep { sibling: hp(&a, &b), sibling_is_right: false }],
    proof.steps
  );
}

#[test]
fn test_layer_lengths() {
  for n in 1..=70u64 {
    let tree = LayeredHashTree::<Blake3>::from_records(records(n));
    assert_eq!(n as usize, tree.layer(0).unwrap().len());
    for level in 0..tree.height() - 1 {
      let len = tree.layer(level).unwrap().len();
      assert_eq!(len.div_ceil(2), tree.layer(level + 1).unwrap().len(), "n={n}, level={level}");
    }
    assert_eq!(1, tree.layer(tree.height() - 1).unwrap().len());
    assert_eq!(depth(n) + 1, tree.height(), "n={n}");
  }
}

#[test]
fn test_append_matches_full_rebuild() {
  let records = records(130);
  let mut tree = LayeredHashTree::<Blake3>::new();
  for (k, record) in records.iter().enumerate() {
    let (index, _) = tree.append(record);
    assert_eq!(k as u64, index);
    let rebuilt = LayeredHashTree::<Blake3>::from_records(&records[..=k]);
    assert_eq!(rebuilt.layers, tree.layers, "n={}", k + 1);
  }
}

#[test]
fn test_append_changes_root_and_keeps_indices() {
  let mut tree = LayeredHashTree::<Sha256>::new();
  let mut roots = vec![tree.root_hash()];
  let mut leaves = Vec::new();
  for record in records(33) {
    let (_, leaf) = tree.append(&record);
    leaves.push(leaf);
    let root = tree.root_hash();
    assert!(!roots.contains(&root));
    roots.push(root);
    for (i, leaf) in leaves.iter().enumerate() {
      assert_eq!(Some(*leaf), tree.leaf(i as u64));
    }
  }
}

#[test]
fn test_every_proof_verifies() {
  for n in 1..=40u64 {
    let tree = LayeredHashTree::<Blake3>::from_records(records(n));
    let root = tree.root_hash();
    for i in 0..n {
      let proof = tree.generate_proof(i).unwrap();
      assert_eq!(depth(n), proof.steps.len());
      let leaf = tree.leaf(i).unwrap();
      assert!(verify_proof::<Blake3>(&leaf, &proof, &root).unwrap(), "n={n}, i={i}");

      // a different leaf must not verify along the same path
      let other = tree.leaf((i + 1) % n).unwrap();
      if other != leaf {
        assert!(!verify_proof::<Blake3>(&other, &proof, &root).unwrap(), "n={n}, i={i}");
      }
    }
    assert!(matches!(tree.generate_proof(n), Err(Error::IndexOutOfRange { .. })));
  }
}

#[test]
fn test_swapped_side_fails() {
  let tree = LayeredHashTree::<Blake3>::from_records(records(11));
  let root = tree.root_hash();
  for i in 0..tree.size() {
    let leaf = tree.leaf(i).unwrap();
    let proof = tree.generate_proof(i).unwrap();
    for k in 0..proof.steps.len() {
      let mut swapped = proof.clone();
      swapped.steps[k].sibling_is_right = !swapped.steps[k].sibling_is_right;

      // flipping a self-paired step hashes the same two inputs
      let current = proof.steps[..k].iter().fold(leaf, |cur, s| {
        if s.sibling_is_right { hp(&cur, &s.sibling) } else { hp(&s.sibling, &cur) }
      });
      let expected = current == proof.steps[k].sibling;
      assert_eq!(expected, verify_proof::<Blake3>(&leaf, &swapped, &root).unwrap(), "i={i}, k={k}");
    }
  }
}

#[test]
fn test_stale_proof_after_growth() {
  let mut tree = LayeredHashTree::<Blake3>::from_records(records(5));
  let old_root = tree.root_hash();
  let leaf = tree.leaf(3).unwrap();
  let old_proof = tree.generate_proof(3).unwrap();

  tree.append(b"late ballot");
  assert!(verify_proof::<Blake3>(&leaf, &old_proof, &old_root).unwrap());
  assert!(!verify_proof::<Blake3>(&leaf, &old_proof, &tree.root_hash()).unwrap());
  assert!(verify_proof::<Blake3>(&leaf, &tree.generate_proof(3).unwrap(), &tree.root_hash()).unwrap());
}

#[test]
fn test_clear() {
  let mut tree = LayeredHashTree::<Blake3>::from_records(records(9));
  tree.clear();
  assert_eq!(0, tree.size());
  assert_eq!(Digest::EMPTY, tree.root_hash());
  assert!(matches!(tree.generate_proof(0), Err(Error::IndexOutOfRange { index: 0, size: 0 })));

  let (index, leaf) = tree.append(b"again");
  assert_eq!(0, index);
  assert_eq!(leaf, tree.root_hash());
}

#[test]
fn test_hashers_disagree() {
  let blake = LayeredHashTree::<Blake3>::from_records(records(6));
  let sha = LayeredHashTree::<Sha256>::from_records(records(6));
  assert_ne!(blake.root_hash(), sha.root_hash());

  let proof = sha.generate_proof(4).unwrap();
  let leaf = sha.leaf(4).unwrap();
  assert!(verify_proof::<Sha256>(&leaf, &proof, &sha.root_hash()).unwrap());
  assert!(!verify_proof::<Blake3>(&leaf, &proof, &sha.root_hash()).unwrap());
}
