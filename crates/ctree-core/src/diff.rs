// ctree - current tree reconciliation for data archives
// Copyright (C) 2026 ctree Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Snapshot classification
//!
//! Compares the published snapshot (`old`) with the one extracted from the
//! metadata store (`new`) and sorts every difference into one of four kinds:
//!
//! - **new**: path only in `new`, content not found elsewhere
//! - **withdrawn**: path only in `old`, content not found elsewhere
//! - **moved**: same content, different path
//! - **replaced**: same path, different content
//!
//! # Move pairing
//!
//! A path that exists on one side only is a move candidate when another path
//! on the other side carries the same hash. With several files sharing one
//! hash the pairing is a heuristic, selected by [`MoveDetection`]:
//!
//! - `Positional` pairs the paths carrying that hash in `new` with those in
//!   `old`, both in lexicographic order, and accepts each pair whose two
//!   members are still unmatched.
//! - `Unique` only pairs a hash that has exactly one unmatched path on each
//!   side; anything else stays new + withdrawn.

use crate::changeset::{ChangeSet, Replacement};
use crate::snapshot::Snapshot;
use ctree_config::MoveDetection;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Paths per hash, each list in lexicographic order
fn index_by_hash(snapshot: &Snapshot) -> HashMap<&str, Vec<&str>> {
    let mut index: HashMap<&str, Vec<&str>> = HashMap::new();
    for (path, md5) in snapshot.iter() {
        index.entry(md5).or_default().push(path);
    }
    index
}

/// Classify the differences between `old` and `new`
pub fn classify(old: &Snapshot, new: &Snapshot, policy: MoveDetection) -> ChangeSet {
    let mut only_new: BTreeSet<&str> = new.paths().filter(|p| !old.contains(p)).collect();
    let mut only_old: BTreeSet<&str> = old.paths().filter(|p| !new.contains(p)).collect();

    let moved = match policy {
        MoveDetection::Positional => pair_positional(old, new, &mut only_old, &mut only_new),
        MoveDetection::Unique => pair_unique(old, new, &mut only_old, &mut only_new),
    };

    let replaced: BTreeMap<String, Replacement> = new
        .iter()
        .filter_map(|(path, new_md5)| {
            let old_md5 = old.get(path)?;
            (old_md5 != new_md5).then(|| {
                (
                    path.to_string(),
                    Replacement {
                        new_md5: new_md5.to_string(),
                        old_md5: old_md5.to_string(),
                    },
                )
            })
        })
        .collect();

    let changes = ChangeSet::new(
        only_new.into_iter().map(str::to_string).collect(),
        only_old.into_iter().map(str::to_string).collect(),
        moved,
        replaced,
    );
    debug!(policy = ?policy, counts = %changes.counts(), "Classified snapshots");
    changes
}

fn pair_positional<'a>(
    old: &'a Snapshot,
    new: &'a Snapshot,
    only_old: &mut BTreeSet<&'a str>,
    only_new: &mut BTreeSet<&'a str>,
) -> BTreeMap<String, String> {
    let old_index = index_by_hash(old);
    let new_index = index_by_hash(new);
    let mut moved = BTreeMap::new();
    // Sets only shrink, so a hash that was paired once pairs nothing more.
    let mut seen: HashSet<&str> = HashSet::new();

    let candidates: Vec<&str> = only_new.iter().copied().collect();
    for path in candidates {
        let Some(md5) = new.get(path) else { continue };
        if !seen.insert(md5) {
            continue;
        }
        let (Some(in_new), Some(in_old)) = (new_index.get(md5), old_index.get(md5)) else {
            continue;
        };
        for (new_path, old_path) in in_new.iter().zip(in_old.iter()) {
            if only_old.contains(old_path) && only_new.contains(new_path) {
                only_old.remove(old_path);
                only_new.remove(new_path);
                moved.insert(old_path.to_string(), new_path.to_string());
            }
        }
    }
    moved
}

fn pair_unique<'a>(
    old: &'a Snapshot,
    new: &'a Snapshot,
    only_old: &mut BTreeSet<&'a str>,
    only_new: &mut BTreeSet<&'a str>,
) -> BTreeMap<String, String> {
    let mut unmatched_old: HashMap<&str, Vec<&str>> = HashMap::new();
    for path in only_old.iter() {
        if let Some(md5) = old.get(path) {
            unmatched_old.entry(md5).or_default().push(*path);
        }
    }
    let mut unmatched_new: HashMap<&str, Vec<&str>> = HashMap::new();
    for path in only_new.iter() {
        if let Some(md5) = new.get(path) {
            unmatched_new.entry(md5).or_default().push(*path);
        }
    }

    let mut moved = BTreeMap::new();
    for (md5, new_paths) in &unmatched_new {
        let Some(old_paths) = unmatched_old.get(md5) else { continue };
        if let ([new_path], [old_path]) = (new_paths.as_slice(), old_paths.as_slice()) {
            only_old.remove(old_path);
            only_new.remove(new_path);
            moved.insert(old_path.to_string(), new_path.to_string());
        }
    }
    moved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snap(entries: &[(&str, &str)]) -> Snapshot {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_identity() {
        let s = snap(&[("ftp/a", "h1"), ("ftp/b", "h1"), ("ftp/c", "h2")]);
        assert!(classify(&s, &s, MoveDetection::Positional).is_empty());
        assert!(classify(&s, &s, MoveDetection::Unique).is_empty());
    }

    #[test]
    fn test_move() {
        let changes = classify(
            &snap(&[("a/x.txt", "H1")]),
            &snap(&[("b/x.txt", "H1")]),
            MoveDetection::Positional,
        );
        assert_eq!(changes.moved.get("a/x.txt").map(String::as_str), Some("b/x.txt"));
        assert!(changes.new.is_empty());
        assert!(changes.withdrawn.is_empty());
        assert_eq!(changes.size(), 1);
    }

    #[test]
    fn test_replace() {
        let changes = classify(
            &snap(&[("a/x.txt", "H1")]),
            &snap(&[("a/x.txt", "H2")]),
            MoveDetection::Positional,
        );
        assert_eq!(
            changes.replaced.get("a/x.txt"),
            Some(&Replacement {
                new_md5: "H2".to_string(),
                old_md5: "H1".to_string()
            })
        );
        assert_eq!(changes.size(), 1);
    }

    #[test]
    fn test_add_and_remove() {
        let added = classify(&snap(&[]), &snap(&[("a/x.txt", "H1")]), MoveDetection::Positional);
        assert_eq!(added.new.iter().collect::<Vec<_>>(), vec!["a/x.txt"]);

        let removed = classify(&snap(&[("a/x.txt", "H1")]), &snap(&[]), MoveDetection::Positional);
        assert_eq!(removed.withdrawn.iter().collect::<Vec<_>>(), vec!["a/x.txt"]);
    }

    #[test]
    fn test_positional_pairs_in_path_order() {
        // Two copies of one content moved to two new places.
        let old = snap(&[("old/1", "H"), ("old/2", "H")]);
        let new = snap(&[("new/b", "H"), ("new/a", "H")]);
        let changes = classify(&old, &new, MoveDetection::Positional);

        assert_eq!(changes.moved.get("old/1").map(String::as_str), Some("new/a"));
        assert_eq!(changes.moved.get("old/2").map(String::as_str), Some("new/b"));
        assert!(changes.new.is_empty() && changes.withdrawn.is_empty());
    }

    #[test]
    fn test_positional_skips_pairs_with_shared_paths() {
        // "keep" carries the hash on both sides, so it lines up against
        // "gone" and that pair is rejected.
        let old = snap(&[("gone", "H"), ("keep", "H")]);
        let new = snap(&[("keep", "H"), ("made", "H")]);
        let changes = classify(&old, &new, MoveDetection::Positional);

        assert!(changes.moved.is_empty());
        assert_eq!(changes.new.iter().collect::<Vec<_>>(), vec!["made"]);
        assert_eq!(changes.withdrawn.iter().collect::<Vec<_>>(), vec!["gone"]);
        changes.validate().unwrap();
    }

    #[test]
    fn test_unique_refuses_ambiguous_hashes() {
        let old = snap(&[("old/1", "H"), ("old/2", "H"), ("solo/old", "S")]);
        let new = snap(&[("new/a", "H"), ("solo/new", "S")]);
        let changes = classify(&old, &new, MoveDetection::Unique);

        assert_eq!(changes.moved.len(), 1);
        assert_eq!(changes.moved.get("solo/old").map(String::as_str), Some("solo/new"));
        assert_eq!(changes.new.len(), 1);
        assert_eq!(changes.withdrawn.len(), 2);
    }

    #[test]
    fn test_unique_ignores_matched_paths() {
        // "keep" is unchanged, so "gone" -> "made" is the only unmatched pair.
        let old = snap(&[("gone", "H"), ("keep", "H")]);
        let new = snap(&[("keep", "H"), ("made", "H")]);
        let changes = classify(&old, &new, MoveDetection::Unique);
        assert_eq!(changes.moved.get("gone").map(String::as_str), Some("made"));
    }

    #[test]
    fn test_mixed() {
        let old = snap(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        let new = snap(&[("a", "1"), ("b", "9"), ("e", "3"), ("f", "5")]);
        let changes = classify(&old, &new, MoveDetection::Positional);

        assert_eq!(changes.counts().to_string(), "new: 1, withdrawn: 1, moved: 1, replaced: 1");
        assert!(changes.new.contains("f"));
        assert!(changes.withdrawn.contains("d"));
        assert!(changes.replaced.contains_key("b"));
        assert_eq!(changes.moved.get("c").map(String::as_str), Some("e"));
    }
}
