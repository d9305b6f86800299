//! Core data types shared by the scan, reconcile and action phases.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::episode_map::{EpisodeMap, FileBacked, Keyed};
use crate::naming::NamingTemplate;
use crate::reconcile::reconcile;

/// A media file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEpisode {
    /// Episode number, `None` when unresolved.
    pub episode_number: Option<u32>,
    pub filename: PathBuf,
    pub size_bytes: u64,
    /// Lowercase extension without the leading dot.
    pub extension: String,
}

/// A canonical episode (or movie) entry from the metadata provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationEpisode {
    /// Episode number, `None` when unresolved.
    pub episode_number: Option<u32>,
    pub name: String,
}

/// Classification of a rename candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchType {
    /// Source and destination share the same episode number.
    Ready,
    /// A file on disk without canonical metadata.
    MissingDestination,
    /// Canonical metadata without a file on disk.
    MissingSource,
}

/// A proposed pairing of one source file with one destination episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCandidate {
    /// `None` is the synthetic unresolved source.
    pub source: Option<SourceEpisode>,
    /// `None` is the synthetic unresolved destination.
    pub destination: Option<DestinationEpisode>,
    perform_move: bool,
}

/// Outcome of one attempted file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionResult {
    SourceMissing,
    InvalidDestinationName,
    DestinationExistsNoOverwrite,
    Success,
    Failed,
}

/// A single source file paired with its destination path, ready for the action phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionJob {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// One season folder (or one movie file) with its source files, canonical metadata and candidates.
#[derive(Debug, Clone)]
pub struct FolderGroup {
    pub folder: PathBuf,
    pub show_name: String,
    pub season_number: Option<u32>,
    source: EpisodeMap<SourceEpisode>,
    destination: EpisodeMap<DestinationEpisode>,
    candidates: Vec<RenameCandidate>,
}

/// An entry in the work list.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A whole folder: every selected candidate is acted on.
    Folder(FolderGroup),
    /// A single candidate renamed in place using the destination name as the new file stem.
    Candidate(RenameCandidate),
}

impl SourceEpisode {
    /// Create a source episode from a path, extracting the lowercase extension.
    #[must_use]
    pub fn new(episode_number: Option<u32>, filename: PathBuf, size_bytes: u64) -> Self {
        let extension = crate::path_to_file_extension_string(&filename);
        Self {
            episode_number,
            filename,
            size_bytes,
            extension,
        }
    }
}

impl DestinationEpisode {
    #[must_use]
    pub fn new(episode_number: Option<u32>, name: impl Into<String>) -> Self {
        Self {
            episode_number,
            name: name.into(),
        }
    }
}

impl Keyed for SourceEpisode {
    fn key(&self) -> Option<u32> {
        self.episode_number
    }

    fn set_key(&mut self, key: Option<u32>) {
        self.episode_number = key;
    }
}

impl FileBacked for SourceEpisode {
    fn path(&self) -> &Path {
        &self.filename
    }
}

impl Keyed for DestinationEpisode {
    fn key(&self) -> Option<u32> {
        self.episode_number
    }

    fn set_key(&mut self, key: Option<u32>) {
        self.episode_number = key;
    }
}

impl RenameCandidate {
    /// Pair a source with a destination. The move selection defaults to [`Self::can_move`].
    #[must_use]
    pub fn new(source: Option<SourceEpisode>, destination: Option<DestinationEpisode>) -> Self {
        let mut candidate = Self {
            source,
            destination,
            perform_move: false,
        };
        candidate.perform_move = candidate.can_move();
        candidate
    }

    #[must_use]
    pub const fn match_type(&self) -> MatchType {
        match (&self.source, &self.destination) {
            (None, _) => MatchType::MissingSource,
            (Some(source), Some(destination)) => match (source.episode_number, destination.episode_number) {
                (Some(a), Some(b)) if a == b => MatchType::Ready,
                _ => MatchType::MissingDestination,
            },
            (Some(_), None) => MatchType::MissingDestination,
        }
    }

    #[must_use]
    pub const fn can_move(&self) -> bool {
        matches!(self.match_type(), MatchType::Ready)
    }

    #[must_use]
    pub const fn can_edit(&self) -> bool {
        matches!(self.match_type(), MatchType::Ready | MatchType::MissingDestination)
    }

    #[must_use]
    pub const fn perform_move(&self) -> bool {
        self.perform_move
    }

    /// Select or deselect this candidate. Candidates that cannot be moved stay deselected.
    pub const fn set_perform_move(&mut self, perform_move: bool) {
        self.perform_move = perform_move && self.can_move();
    }

    /// Episode number used for ordering: the source key, else the destination key.
    #[must_use]
    pub fn sort_key(&self) -> Option<u32> {
        self.source
            .as_ref()
            .and_then(|s| s.episode_number)
            .or_else(|| self.destination.as_ref().and_then(|d| d.episode_number))
    }

    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.filename.as_path())
    }

    /// Destination path when renaming this candidate in place with the destination name as file stem.
    #[must_use]
    pub fn in_place_destination(&self) -> Option<PathBuf> {
        let source = self.source.as_ref()?;
        let destination = self.destination.as_ref()?;
        let parent = source.filename.parent().unwrap_or_else(|| Path::new(""));
        let stem = crate::naming::sanitize_filename(&destination.name);
        Some(parent.join(crate::naming::with_extension(&stem, &source.extension)))
    }
}

impl FolderGroup {
    /// Create a group and compute its candidates.
    #[must_use]
    pub fn new(
        folder: PathBuf,
        show_name: impl Into<String>,
        season_number: Option<u32>,
        source: EpisodeMap<SourceEpisode>,
        destination: EpisodeMap<DestinationEpisode>,
    ) -> Self {
        let candidates = reconcile(&source, &destination);
        Self {
            folder,
            show_name: show_name.into(),
            season_number,
            source,
            destination,
            candidates,
        }
    }

    #[must_use]
    pub const fn source(&self) -> &EpisodeMap<SourceEpisode> {
        &self.source
    }

    #[must_use]
    pub const fn destination(&self) -> &EpisodeMap<DestinationEpisode> {
        &self.destination
    }

    #[must_use]
    pub fn candidates(&self) -> &[RenameCandidate] {
        &self.candidates
    }

    /// Mutable access for toggling the move selection. The candidate list itself cannot be reshaped.
    pub fn candidates_mut(&mut self) -> &mut [RenameCandidate] {
        &mut self.candidates
    }

    /// Replace the source files and rebuild the candidates.
    pub fn set_source(&mut self, source: EpisodeMap<SourceEpisode>) {
        self.source = source;
        self.rebuild();
    }

    /// Replace the canonical metadata and rebuild the candidates.
    pub fn set_destination(&mut self, destination: EpisodeMap<DestinationEpisode>) {
        self.destination = destination;
        self.rebuild();
    }

    /// Assign a different episode number to one source file and rebuild the candidates.
    pub fn reassign_source_key(&mut self, new_key: Option<u32>, filename: &Path) {
        self.source.reassign_key(new_key, filename);
        self.rebuild();
    }

    /// Drop one source file from the group and rebuild the candidates.
    pub fn remove_source(&mut self, filename: &Path) {
        self.source.remove_by_filename(filename);
        self.rebuild();
    }

    /// Destination path for a candidate, rendered with the naming template.
    #[must_use]
    pub fn destination_path(&self, candidate: &RenameCandidate, template: &NamingTemplate) -> Option<PathBuf> {
        let source = candidate.source.as_ref()?;
        let destination = candidate.destination.as_ref()?;
        let stem = template.render(
            &self.show_name,
            self.season_number,
            destination.episode_number,
            &destination.name,
        );
        let parent = source.filename.parent().unwrap_or(&self.folder);
        Some(parent.join(crate::naming::with_extension(&stem, &source.extension)))
    }

    /// Jobs for every candidate selected for moving, in candidate order.
    #[must_use]
    pub fn action_jobs(&self, template: &NamingTemplate) -> Vec<ActionJob> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.perform_move())
            .filter_map(|candidate| {
                let source = candidate.source_path()?.to_path_buf();
                let dest = self.destination_path(candidate, template)?;
                Some(ActionJob { source, dest })
            })
            .collect()
    }

    fn rebuild(&mut self) {
        self.candidates = reconcile(&self.source, &self.destination);
    }
}

impl WorkItem {
    /// Expand this item into action jobs.
    #[must_use]
    pub fn action_jobs(&self, template: &NamingTemplate) -> Vec<ActionJob> {
        match self {
            Self::Folder(group) => group.action_jobs(template),
            Self::Candidate(candidate) => {
                if !candidate.perform_move() {
                    return Vec::new();
                }
                match (candidate.source_path(), candidate.in_place_destination()) {
                    (Some(source), Some(dest)) => vec![ActionJob {
                        source: source.to_path_buf(),
                        dest,
                    }],
                    _ => Vec::new(),
                }
            }
        }
    }
}

impl ActionJob {
    #[must_use]
    pub const fn new(source: PathBuf, dest: PathBuf) -> Self {
        Self { source, dest }
    }
}

impl ActionResult {
    /// All variants in display order.
    pub const ALL: [Self; 5] = [
        Self::Success,
        Self::SourceMissing,
        Self::InvalidDestinationName,
        Self::DestinationExistsNoOverwrite,
        Self::Failed,
    ];

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short uppercase label for log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SourceMissing => "MISSING",
            Self::InvalidDestinationName => "INVALID",
            Self::DestinationExistsNoOverwrite => "EXISTS",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing => write!(f, "Source file missing"),
            Self::InvalidDestinationName => write!(f, "Invalid destination name"),
            Self::DestinationExistsNoOverwrite => write!(f, "Destination exists"),
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::MissingDestination => write!(f, "Missing metadata"),
            Self::MissingSource => write!(f, "Missing file"),
        }
    }
}
