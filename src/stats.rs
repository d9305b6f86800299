use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::time::Duration;

use colored::Colorize;

use crate::types::{ActionResult, MatchType, RenameCandidate};

/// Statistics for a rename run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    results: BTreeMap<ActionResult, usize>,
    planned: BTreeMap<MatchType, usize>,
    pub total_duration: Duration,
    /// The run was stopped before every job was processed.
    pub interrupted: bool,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: ActionResult, duration: Duration) {
        *self.results.entry(result).or_default() += 1;
        self.total_duration += duration;
    }

    /// Count the planned candidates per match type.
    pub fn add_candidates(&mut self, candidates: &[RenameCandidate]) {
        for candidate in candidates {
            *self.planned.entry(candidate.match_type()).or_default() += 1;
        }
    }

    #[must_use]
    pub fn count(&self, result: ActionResult) -> usize {
        self.results.get(&result).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn planned(&self, match_type: MatchType) -> usize {
        self.planned.get(&match_type).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_attempted(&self) -> usize {
        self.results.values().sum()
    }

    #[must_use]
    pub fn total_succeeded(&self) -> usize {
        self.count(ActionResult::Success)
    }

    /// Every attempted file that did not end in success.
    #[must_use]
    pub fn total_unsuccessful(&self) -> usize {
        self.total_attempted() - self.total_succeeded()
    }

    #[must_use]
    pub fn total_planned(&self) -> usize {
        self.planned.values().sum()
    }

    pub fn print_summary(&self) {
        println!("{}", "\n--- Rename Summary ---".bold().magenta());
        if self.total_planned() > 0 {
            println!("Candidates:             {}", self.total_planned());
            println!("  - Ready:              {}", self.planned(MatchType::Ready));
            println!("  - Missing metadata:   {}", self.planned(MatchType::MissingDestination));
            println!("  - Missing file:       {}", self.planned(MatchType::MissingSource));
        }
        println!("Files renamed:          {}", self.total_succeeded());
        println!(
            "Files not renamed:      {}",
            if self.total_unsuccessful() > 0 {
                self.total_unsuccessful().to_string().red()
            } else {
                "0".normal()
            }
        );
        if self.total_unsuccessful() > 0 {
            println!("  - Source missing:     {}", self.count(ActionResult::SourceMissing));
            println!("  - Invalid name:       {}", self.count(ActionResult::InvalidDestinationName));
            println!(
                "  - Destination exists: {}",
                self.count(ActionResult::DestinationExistsNoOverwrite)
            );
            println!("  - Failed:             {}", self.count(ActionResult::Failed));
        }
        if self.interrupted {
            println!("{}", "Interrupted before all files were processed".yellow());
        }
        println!();
        println!("Total time:             {}", crate::format_duration(self.total_duration));
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        for (result, count) in other.results {
            *self.results.entry(result).or_default() += count;
        }
        for (match_type, count) in other.planned {
            *self.planned.entry(match_type).or_default() += count;
        }
        self.total_duration += other.total_duration;
        self.interrupted |= other.interrupted;
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;

    use std::path::PathBuf;

    use crate::types::{DestinationEpisode, SourceEpisode};

    #[test]
    fn counts_results() {
        let mut stats = RunStats::new();
        stats.add_result(ActionResult::Success, Duration::from_secs(1));
        stats.add_result(ActionResult::Success, Duration::from_secs(2));
        stats.add_result(ActionResult::DestinationExistsNoOverwrite, Duration::ZERO);
        stats.add_result(ActionResult::Failed, Duration::ZERO);

        assert_eq!(stats.total_attempted(), 4);
        assert_eq!(stats.total_succeeded(), 2);
        assert_eq!(stats.total_unsuccessful(), 2);
        assert_eq!(stats.count(ActionResult::SourceMissing), 0);
        assert_eq!(stats.total_duration, Duration::from_secs(3));
    }

    #[test]
    fn counts_planned_candidates() {
        let source = SourceEpisode::new(Some(1), PathBuf::from("a.mkv"), 1);
        let candidates = vec![
            RenameCandidate::new(Some(source.clone()), Some(DestinationEpisode::new(Some(1), "One"))),
            RenameCandidate::new(None, Some(DestinationEpisode::new(Some(2), "Two"))),
            RenameCandidate::new(Some(source), None),
        ];
        let mut stats = RunStats::new();
        stats.add_candidates(&candidates);

        assert_eq!(stats.total_planned(), 3);
        assert_eq!(stats.planned(MatchType::Ready), 1);
        assert_eq!(stats.planned(MatchType::MissingSource), 1);
        assert_eq!(stats.planned(MatchType::MissingDestination), 1);
    }

    #[test]
    fn merge_stats() {
        let mut first = RunStats::new();
        first.add_result(ActionResult::Success, Duration::from_secs(1));
        let mut second = RunStats::new();
        second.add_result(ActionResult::Success, Duration::from_secs(1));
        second.add_result(ActionResult::Failed, Duration::ZERO);
        second.interrupted = true;

        first += second;
        assert_eq!(first.total_succeeded(), 2);
        assert_eq!(first.count(ActionResult::Failed), 1);
        assert!(first.interrupted);
    }
}
