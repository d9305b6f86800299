//! Aggregate group status and duplicate detection for single-file groups.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::{FolderGroup, MatchType, RenameCandidate};

/// Aggregate status of a season folder or a movie group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupStatus {
    /// Every candidate is ready to be renamed.
    Ok,
    /// Some files or some canonical episodes have no counterpart.
    UnbalancedFiles,
    /// The metadata provider had no data for this group.
    SeasonNotFound,
}

/// Canonical identity of a movie used for duplicate detection.
#[derive(Debug, Clone, Default)]
pub struct MovieIdentity {
    pub title: String,
    pub year: Option<u32>,
    /// Disc or part number for multi-file releases.
    pub part: Option<u32>,
    pub genre: Option<String>,
}

/// Duplicate tracking over a list of single-file items.
///
/// Two items are duplicates when both exist on disk and resolve to the same [`MovieIdentity`].
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    identity: Option<MovieIdentity>,
    exists: bool,
    duplicates: BTreeSet<usize>,
}

/// Classify a group from its canonical data and candidates.
#[must_use]
pub fn classify(group: &FolderGroup) -> GroupStatus {
    if group.destination().is_empty() {
        GroupStatus::SeasonNotFound
    } else {
        classify_candidates(group.candidates())
    }
}

/// Status from the candidate list alone: `Ok` only if every candidate is ready.
#[must_use]
pub fn classify_candidates(candidates: &[RenameCandidate]) -> GroupStatus {
    if candidates
        .iter()
        .all(|candidate| candidate.match_type() == MatchType::Ready)
    {
        GroupStatus::Ok
    } else {
        GroupStatus::UnbalancedFiles
    }
}

impl GroupStatus {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::UnbalancedFiles => write!(f, "Unbalanced files"),
            Self::SeasonNotFound => write!(f, "Season not found"),
        }
    }
}

impl MovieIdentity {
    #[must_use]
    pub fn new(title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            title: title.into(),
            year,
            part: None,
            genre: None,
        }
    }

    #[must_use]
    pub const fn with_part(mut self, part: Option<u32>) -> Self {
        self.part = part;
        self
    }

    #[must_use]
    pub fn with_genre(mut self, genre: Option<String>) -> Self {
        self.genre = genre;
        self
    }

    /// Same canonical movie: title and genre compare case-insensitively.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.year == other.year
            && self.part == other.part
            && self.title.trim().to_lowercase() == other.title.trim().to_lowercase()
            && self.genre.as_deref().map(str::to_lowercase) == other.genre.as_deref().map(str::to_lowercase)
    }
}

impl DuplicateIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item and return its index. Duplicates are not computed until [`Self::rescan`] or [`Self::update`].
    pub fn push(&mut self, identity: Option<MovieIdentity>, exists: bool) -> usize {
        self.entries.push(Entry {
            identity,
            exists,
            duplicates: BTreeSet::new(),
        });
        self.entries.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute all pairwise duplicates.
    pub fn rescan(&mut self) {
        for entry in &mut self.entries {
            entry.duplicates.clear();
        }
        for a in 0..self.entries.len() {
            for b in (a + 1)..self.entries.len() {
                if self.pair_is_duplicate(a, b) {
                    self.entries[a].duplicates.insert(b);
                    self.entries[b].duplicates.insert(a);
                }
            }
        }
    }

    /// Change the resolved identity of one item.
    ///
    /// Only the item itself, the items that were its duplicates,
    /// and the items that become its duplicates are touched.
    pub fn update(&mut self, index: usize, identity: Option<MovieIdentity>, exists: bool) {
        if index >= self.entries.len() {
            return;
        }

        let previous = std::mem::take(&mut self.entries[index].duplicates);
        for other in previous {
            self.entries[other].duplicates.remove(&index);
        }

        self.entries[index].identity = identity;
        self.entries[index].exists = exists;

        for other in 0..self.entries.len() {
            if other != index && self.pair_is_duplicate(index, other) {
                self.entries[index].duplicates.insert(other);
                self.entries[other].duplicates.insert(index);
            }
        }
    }

    #[must_use]
    pub fn is_duplicate(&self, index: usize) -> bool {
        self.entries
            .get(index)
            .is_some_and(|entry| !entry.duplicates.is_empty())
    }

    /// Indices of the items that duplicate the given item, ascending.
    #[must_use]
    pub fn duplicates_of(&self, index: usize) -> Vec<usize> {
        self.entries
            .get(index)
            .map(|entry| entry.duplicates.iter().copied().collect())
            .unwrap_or_default()
    }

    fn pair_is_duplicate(&self, a: usize, b: usize) -> bool {
        let (first, second) = (&self.entries[a], &self.entries[b]);
        if !first.exists || !second.exists {
            return false;
        }
        match (&first.identity, &second.identity) {
            (Some(x), Some(y)) => x.same_as(y),
            _ => false,
        }
    }
}

#[cfg(test)]
mod status_tests {
    use super::*;

    use std::path::{Path, PathBuf};

    use crate::episode_map::EpisodeMap;
    use crate::types::{DestinationEpisode, SourceEpisode};

    fn group(sources: &[(Option<u32>, &str)], destinations: &[(Option<u32>, &str)]) -> FolderGroup {
        let source: EpisodeMap<SourceEpisode> = sources
            .iter()
            .map(|(key, name)| SourceEpisode::new(*key, PathBuf::from(name), 1))
            .collect();
        let destination: EpisodeMap<DestinationEpisode> = destinations
            .iter()
            .map(|(key, name)| DestinationEpisode::new(*key, *name))
            .collect();
        FolderGroup::new(PathBuf::from("/tv/Show"), "Show", Some(1), source, destination)
    }

    #[test]
    fn season_not_found_without_metadata() {
        let group = group(&[(Some(1), "a.mkv")], &[]);
        assert_eq!(classify(&group), GroupStatus::SeasonNotFound);
    }

    #[test]
    fn ok_when_every_candidate_is_ready() {
        let group = group(&[(Some(1), "a.mkv"), (Some(2), "b.mkv")], &[(Some(1), "A"), (Some(2), "B")]);
        assert_eq!(classify(&group), GroupStatus::Ok);
    }

    #[test]
    fn unbalanced_when_something_is_missing() {
        let group = group(&[(Some(1), "a.mkv")], &[(Some(1), "A"), (Some(2), "B")]);
        assert_eq!(classify(&group), GroupStatus::UnbalancedFiles);
    }

    #[test]
    fn status_follows_key_changes() {
        let mut group = group(&[(Some(1), "a.mkv"), (Some(3), "b.mkv")], &[(Some(1), "A"), (Some(2), "B")]);
        assert_eq!(classify(&group), GroupStatus::UnbalancedFiles);

        group.reassign_source_key(Some(2), Path::new("b.mkv"));
        assert_eq!(classify(&group), GroupStatus::Ok);

        group.reassign_source_key(Some(2), Path::new("a.mkv"));
        assert_eq!(classify(&group), GroupStatus::UnbalancedFiles);
    }

    #[test]
    fn rescan_finds_duplicates() {
        let mut index = DuplicateIndex::new();
        let a = index.push(Some(MovieIdentity::new("Alien", Some(1979))), true);
        let b = index.push(Some(MovieIdentity::new("alien", Some(1979))), true);
        let c = index.push(Some(MovieIdentity::new("Aliens", Some(1986))), true);
        let d = index.push(Some(MovieIdentity::new("Alien", Some(1979))), false);
        index.rescan();

        assert_eq!(index.duplicates_of(a), vec![b]);
        assert_eq!(index.duplicates_of(b), vec![a]);
        assert!(!index.is_duplicate(c));
        assert!(!index.is_duplicate(d), "missing files are never duplicates");
    }

    #[test]
    fn parts_are_not_duplicates() {
        let mut index = DuplicateIndex::new();
        index.push(Some(MovieIdentity::new("Film", Some(2000)).with_part(Some(1))), true);
        index.push(Some(MovieIdentity::new("Film", Some(2000)).with_part(Some(2))), true);
        index.rescan();
        assert!(!index.is_duplicate(0));
        assert!(!index.is_duplicate(1));
    }

    #[test]
    fn update_cascades_to_previous_and_new_duplicates() {
        let mut index = DuplicateIndex::new();
        let a = index.push(Some(MovieIdentity::new("One", Some(2001))), true);
        let b = index.push(Some(MovieIdentity::new("One", Some(2001))), true);
        let c = index.push(Some(MovieIdentity::new("Two", Some(2002))), true);
        index.rescan();
        assert!(index.is_duplicate(a));
        assert!(index.is_duplicate(b));

        index.update(b, Some(MovieIdentity::new("Two", Some(2002))), true);
        assert!(!index.is_duplicate(a));
        assert_eq!(index.duplicates_of(b), vec![c]);
        assert_eq!(index.duplicates_of(c), vec![b]);

        index.update(b, None, true);
        assert!(!index.is_duplicate(b));
        assert!(!index.is_duplicate(c));
    }

    #[test]
    fn update_matches_full_rescan() {
        let mut incremental = DuplicateIndex::new();
        for title in ["A", "B", "A", "C", "B"] {
            incremental.push(Some(MovieIdentity::new(title, None)), true);
        }
        incremental.rescan();
        incremental.update(3, Some(MovieIdentity::new("A", None)), true);

        let mut full = incremental.clone();
        full.rescan();

        for i in 0..incremental.len() {
            assert_eq!(incremental.duplicates_of(i), full.duplicates_of(i));
        }
    }
}
