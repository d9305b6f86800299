//! Folder scanning: media file filter, show and season detection, movie name parsing.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::episode_map::EpisodeMap;
use crate::types::SourceEpisode;
use crate::worker::StopFlag;

/// Default media file extensions.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "mpg", "ts", "webm"];

/// Folder name that is only a season marker, like `Season 2`, `S02`, `Series 2` or `Staffel 2`
static RE_SEASON_FOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:season|series|staffel|s)[\s._-]*(\d{1,3})$").expect("Invalid season folder regex")
});

/// Show name followed by a season marker, like `Show Name S02` or `Show.Name.Season.2`
static RE_TRAILING_SEASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)[\s._-]+(?:season|series|staffel|s)[\s._-]*(\d{1,3})$")
        .expect("Invalid trailing season regex")
});

static RE_MOVIE_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)[\s(\[]*((?:19|20)\d{2})(?:[\s)\]]|$)").expect("Invalid movie year regex")
});

static RE_QUALITY_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s(2160p|1080p|720p|576p|480p|4K|UHD|HDR|BluRay|BDRip|WEB|WEBRip|HDTV|DVDRip|BRRip|x264|x265|HEVC)\b")
        .expect("Invalid quality boundary regex")
});

static RE_MOVIE_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cd|disc|disk|part|pt)[\s._-]*(\d{1,2})\b").expect("Invalid movie part regex")
});

static RE_MULTI_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid spaces regex"));

/// Which directory entries count as media files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    pub min_size_bytes: u64,
}

/// Title, year and part parsed from a movie file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieQuery {
    pub title: String,
    pub year: Option<u32>,
    pub part: Option<u32>,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MEDIA_EXTENSIONS.iter().map(ToString::to_string).collect(),
            min_size_bytes: 0,
        }
    }
}

impl ScanFilter {
    #[must_use]
    pub fn new(extensions: Vec<String>, min_size_bytes: u64) -> Self {
        Self {
            extensions: extensions.into_iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            min_size_bytes,
        }
    }

    /// Check extension and size of a file.
    #[must_use]
    pub fn accepts(&self, path: &Path, size_bytes: u64) -> bool {
        if size_bytes < self.min_size_bytes {
            return false;
        }
        let extension = crate::path_to_file_extension_string(path);
        !extension.is_empty() && self.extensions.contains(&extension)
    }
}

/// Show name and season number from a folder path.
///
/// A season-only folder name takes the show from its parent folder.
/// Without a season marker the whole folder name is the show.
#[must_use]
pub fn detect_show_and_season(folder: &Path) -> (String, Option<u32>) {
    let name = crate::path_to_filename_string(folder);

    if let Some(caps) = RE_SEASON_FOLDER.captures(name.trim()) {
        let season = caps[1].parse().ok();
        let show = folder
            .parent()
            .map(|parent| clean_name(&crate::path_to_filename_string(parent)))
            .unwrap_or_default();
        return (show, season);
    }

    if let Some(caps) = RE_TRAILING_SEASON.captures(name.trim()) {
        return (clean_name(&caps[1]), caps[2].parse().ok());
    }

    (clean_name(&name), None)
}

/// Parse title, year and part from a movie file stem like `The.Matrix.1999.1080p.BluRay`.
#[must_use]
pub fn parse_movie_name(stem: &str) -> MovieQuery {
    let cleaned = clean_name(stem);
    let part = RE_MOVIE_PART.captures(&cleaned).and_then(|caps| caps[1].parse().ok());

    if let Some(caps) = RE_MOVIE_YEAR.captures(&cleaned) {
        return MovieQuery {
            title: trim_title(&caps[1]),
            year: caps[2].parse().ok(),
            part,
        };
    }

    let title = RE_QUALITY_BOUNDARY
        .find(&cleaned)
        .map_or(cleaned.as_str(), |boundary| &cleaned[..boundary.start()]);
    let title = RE_MOVIE_PART
        .find(title)
        .map_or(title, |marker| &title[..marker.start()]);

    MovieQuery {
        title: trim_title(title),
        year: None,
        part,
    }
}

/// List media files in a single folder and infer their episode numbers.
///
/// Hidden files and sub-folders are skipped. The stop flag is checked after every entry,
/// and files listed before a stop are still returned.
pub fn scan_folder(folder: &Path, filter: &ScanFilter, stop: &StopFlag) -> Result<EpisodeMap<SourceEpisode>> {
    let files = list_media_files(folder, filter, stop)?;
    let sizes: Vec<u64> = files.iter().map(|(_, size)| *size).collect();
    let names: Vec<PathBuf> = files.into_iter().map(|(path, _)| path).collect();

    Ok(crate::inference::infer(names)
        .into_iter()
        .zip(sizes)
        .map(|((path, key), size)| SourceEpisode::new(key, path, size))
        .collect())
}

/// List accepted media files with their sizes, sorted by name.
pub fn list_media_files(folder: &Path, filter: &ScanFilter, stop: &StopFlag) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", folder.display()))?;
        if stop.is_stopped() {
            break;
        }
        if !entry.file_type().is_file() || crate::is_hidden(&entry) {
            continue;
        }
        let size = entry
            .metadata()
            .with_context(|| format!("Failed to read metadata: {}", entry.path().display()))?
            .len();
        if filter.accepts(entry.path(), size) {
            files.push((entry.into_path(), size));
        }
    }
    Ok(files)
}

/// The root folder and, when recursing, every non-hidden sub-folder in sorted order.
#[must_use]
pub fn collect_folders(root: &Path, recurse: bool) -> Vec<PathBuf> {
    let mut folders = vec![root.to_path_buf()];
    if recurse {
        folders.extend(
            WalkDir::new(root)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !crate::is_hidden(entry))
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_dir())
                .map(walkdir::DirEntry::into_path),
        );
    }
    folders
}

/// Dots and underscores as spaces, single spaces, trimmed.
fn clean_name(name: &str) -> String {
    let spaced = name.replace(['.', '_'], " ");
    RE_MULTI_SPACES.replace_all(&spaced, " ").trim().to_string()
}

fn trim_title(title: &str) -> String {
    title
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '(' | '[' | ','))
        .to_string()
}
