//! Guess which numeric token in a batch of filenames is the episode number.
//!
//! Every maximal run of digits in a file stem is a token, reduced to its last two digits.
//! A candidate column picks the same token position from every file,
//! counted either from the start or from the end of the token list.
//! The column that uniquely resolves the most files wins.

use std::path::PathBuf;

use crate::episode_map::{EpisodeMap, Keyed};

/// Numeric tokens of a file stem, left to right, each taken modulo 100.
#[must_use]
pub fn numeric_tokens(name: &str) -> Vec<u32> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| {
            let tail = &run[run.len().saturating_sub(2)..];
            tail.bytes().fold(0, |acc, digit| acc * 10 + u32::from(digit - b'0'))
        })
        .collect()
}

/// Assign an episode number to every filename.
///
/// Returns one entry per input in input order. Files whose token is missing
/// in the winning column, or collides with an earlier file, are unresolved.
#[must_use]
pub fn infer(filenames: Vec<PathBuf>) -> Vec<(PathBuf, Option<u32>)> {
    if filenames.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<Vec<u32>> = filenames
        .iter()
        .map(|path| numeric_tokens(&crate::path_to_file_stem_string(path)))
        .collect();

    let max_len = tokens.iter().map(Vec::len).max().unwrap_or_default();

    let front = (0..max_len).map(|i| column(&tokens, |list| list.get(i).copied()));
    let back = (0..max_len).map(|i| {
        column(&tokens, |list| {
            list.len().checked_sub(i + 1).and_then(|index| list.get(index).copied())
        })
    });

    let mut best: Option<(usize, Vec<Option<u32>>)> = None;
    for assignment in front.chain(back) {
        let resolved = resolve_collisions(&assignment);
        let score = resolved.iter().filter(|key| key.is_some()).count();
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, resolved));
        }
    }

    let keys = best.map_or_else(|| vec![None; filenames.len()], |(_, keys)| keys);
    filenames.into_iter().zip(keys).collect()
}

/// Pick one token per file using the given column selector.
fn column<F>(tokens: &[Vec<u32>], select: F) -> Vec<Option<u32>>
where
    F: Fn(&[u32]) -> Option<u32>,
{
    tokens.iter().map(|list| select(list)).collect()
}

/// Run an assignment through collision-safe insertion: later duplicates become unresolved.
fn resolve_collisions(assignment: &[Option<u32>]) -> Vec<Option<u32>> {
    let map: EpisodeMap<Slot> = assignment
        .iter()
        .enumerate()
        .map(|(index, key)| Slot { index, key: *key })
        .collect();

    let mut resolved = vec![None; assignment.len()];
    for slot in map.matches().values() {
        resolved[slot.index] = slot.key;
    }
    resolved
}

/// Position of a file in the input list together with its candidate key.
#[derive(Debug)]
struct Slot {
    index: usize,
    key: Option<u32>,
}

impl Keyed for Slot {
    fn key(&self) -> Option<u32> {
        self.key
    }

    fn set_key(&mut self, key: Option<u32>) {
        self.key = key;
    }
}
