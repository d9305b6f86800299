//! Join a source map and a destination map into an ordered list of rename candidates.

use crate::episode_map::EpisodeMap;
use crate::types::{DestinationEpisode, RenameCandidate, SourceEpisode};

/// Pair every source file with its canonical episode.
///
/// Pure and deterministic: the result only depends on the two maps,
/// so it is rebuilt from scratch after every change to either map.
/// Candidates are ordered by episode number, unresolved pairs last.
#[must_use]
pub fn reconcile(
    source: &EpisodeMap<SourceEpisode>,
    destination: &EpisodeMap<DestinationEpisode>,
) -> Vec<RenameCandidate> {
    let mut candidates = Vec::with_capacity(source.len() + destination.len());

    for (key, item) in source.matches() {
        let pair = destination.get(*key).cloned();
        candidates.push(RenameCandidate::new(Some(item.clone()), pair));
    }

    candidates.extend(
        destination
            .matches()
            .iter()
            .filter(|(key, _)| !source.contains_key(**key))
            .map(|(_, item)| RenameCandidate::new(None, Some(item.clone()))),
    );

    candidates.extend(
        source
            .overflow()
            .iter()
            .map(|item| RenameCandidate::new(Some(item.clone()), None)),
    );

    candidates.extend(
        destination
            .overflow()
            .iter()
            .map(|item| RenameCandidate::new(None, Some(item.clone()))),
    );

    // Stable sort keeps the construction order for equal and unresolved keys
    candidates.sort_by_key(|candidate| (candidate.sort_key().is_none(), candidate.sort_key()));
    candidates
}
