//! Canonical episode and movie lists and the providers that supply them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Deserialize;

use crate::episode_map::EpisodeMap;
use crate::types::DestinationEpisode;

/// Source of canonical metadata.
pub trait MetadataProvider {
    /// Episode list for one season of a show.
    fn season(&self, show: &str, season: u32) -> Option<CanonicalList>;

    /// Single-entry list for a movie.
    fn movie(&self, title: &str, year: Option<u32>) -> Option<CanonicalList>;
}

/// Canonical show season or movie: display name and ordered (number, title) pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalList {
    pub name: String,
    pub season_number: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub entries: Vec<(u32, String)>,
}

/// Memoised provider lookups, owned by the caller.
///
/// Misses are cached too, so a show that is not found is only requested once.
pub struct MetadataCache<P> {
    provider: P,
    seasons: HashMap<(String, u32), Option<CanonicalList>>,
    movies: HashMap<(String, Option<u32>), Option<CanonicalList>>,
}

/// Provider backed by a user-maintained TOML or JSON library file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalLibrary {
    #[serde(default)]
    shows: Vec<ShowEntry>,
    #[serde(default)]
    movies: Vec<MovieEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ShowEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SeasonEntry {
    number: u32,
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct EpisodeEntry {
    number: u32,
    title: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MovieEntry {
    title: String,
    year: Option<u32>,
    genre: Option<String>,
}

/// Normalize a title for lookups: lowercase, dots and underscores as spaces, single spaces.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .replace(['.', '_'], " ")
        .split_whitespace()
        .join(" ")
        .to_lowercase()
}

impl CanonicalList {
    #[must_use]
    pub fn new(name: impl Into<String>, season_number: Option<u32>, entries: Vec<(u32, String)>) -> Self {
        Self {
            name: name.into(),
            season_number,
            year: None,
            genre: None,
            entries,
        }
    }

    /// Movie list with the display name `Title (Year)` as its only entry.
    #[must_use]
    pub fn movie(title: &str, year: Option<u32>, genre: Option<String>) -> Self {
        let name = year.map_or_else(|| title.to_string(), |year| format!("{title} ({year})"));
        Self {
            entries: vec![(1, name.clone())],
            name,
            season_number: None,
            year,
            genre,
        }
    }

    /// Build the destination map with collision-safe insertion.
    #[must_use]
    pub fn destination_map(&self) -> EpisodeMap<DestinationEpisode> {
        self.entries
            .iter()
            .map(|(number, title)| DestinationEpisode::new(Some(*number), title.as_str()))
            .collect()
    }
}

impl<P: MetadataProvider> MetadataCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            seasons: HashMap::new(),
            movies: HashMap::new(),
        }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub fn lookup_season(&mut self, show: &str, season: u32) -> Option<CanonicalList> {
        let key = (normalize_title(show), season);
        self.seasons
            .entry(key)
            .or_insert_with(|| self.provider.season(show, season))
            .clone()
    }

    pub fn lookup_movie(&mut self, title: &str, year: Option<u32>) -> Option<CanonicalList> {
        let key = (normalize_title(title), year);
        self.movies
            .entry(key)
            .or_insert_with(|| self.provider.movie(title, year))
            .clone()
    }

    /// Number of cached queries, hits and misses.
    pub fn len(&self) -> usize {
        self.seasons.len() + self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.seasons.clear();
        self.movies.clear();
    }
}

impl LocalLibrary {
    /// Read a library file. Files ending in `.json` are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read library file: {}", path.display()))?;
        if crate::path_to_file_extension_string(path) == "json" {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .with_context(|| format!("Failed to parse library file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    #[must_use]
    pub fn show_count(&self) -> usize {
        self.shows.len()
    }

    #[must_use]
    pub fn movie_count(&self) -> usize {
        self.movies.len()
    }

    fn find_show(&self, show: &str) -> Option<&ShowEntry> {
        let wanted = normalize_title(show);
        self.shows.iter().find(|entry| {
            normalize_title(&entry.name) == wanted || entry.aliases.iter().any(|alias| normalize_title(alias) == wanted)
        })
    }
}

impl MetadataProvider for LocalLibrary {
    fn season(&self, show: &str, season: u32) -> Option<CanonicalList> {
        let entry = self.find_show(show)?;
        let season_entry = entry.seasons.iter().find(|s| s.number == season)?;
        let entries = season_entry
            .episodes
            .iter()
            .map(|episode| (episode.number, episode.title.clone()))
            .collect();
        Some(CanonicalList::new(entry.name.clone(), Some(season), entries))
    }

    fn movie(&self, title: &str, year: Option<u32>) -> Option<CanonicalList> {
        let wanted = normalize_title(title);
        self.movies
            .iter()
            .filter(|movie| normalize_title(&movie.title) == wanted)
            .find(|movie| year.is_none() || movie.year == year)
            .map(|movie| CanonicalList::movie(&movie.title, movie.year, movie.genre.clone()))
    }
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for &P {
    fn season(&self, show: &str, season: u32) -> Option<CanonicalList> {
        (**self).season(show, season)
    }

    fn movie(&self, title: &str, year: Option<u32>) -> Option<CanonicalList> {
        (**self).movie(title, year)
    }
}
