//! Configuration for `eprename`.
//!
//! Handles reading configuration from CLI arguments and the user config file.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use itertools::Itertools;
use serde::Deserialize;

use episode_rename::actioner::{ActionOptions, DEFAULT_CHUNKED_THRESHOLD, DEFAULT_COMPANION_EXTENSIONS};
use episode_rename::colorize_bool;
use episode_rename::naming::{DEFAULT_EPISODE_TEMPLATE, DEFAULT_MOVIE_TEMPLATE, NamingTemplate};
use episode_rename::scan::{DEFAULT_MEDIA_EXTENSIONS, ScanFilter};

use crate::Args;

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct RenameConfig {
    #[serde(default)]
    auto: bool,
    #[serde(default)]
    companion_extensions: Vec<String>,
    #[serde(default)]
    copy: bool,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    dryrun: bool,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    library: Option<PathBuf>,
    #[serde(default)]
    log: bool,
    #[serde(default)]
    min_size_kb: Option<u64>,
    #[serde(default)]
    movie_template: Option<String>,
    #[serde(default)]
    overwrite: bool,
    #[serde(default)]
    recurse: bool,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    verbose: bool,
}

/// Wrapper needed for parsing the config file section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    episode_rename: RenameConfig,
}

/// Final config created from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) auto: bool,
    pub(crate) companion_extensions: Vec<String>,
    pub(crate) copy: bool,
    pub(crate) debug: bool,
    pub(crate) dryrun: bool,
    pub(crate) extensions: Vec<String>,
    pub(crate) library: Option<PathBuf>,
    pub(crate) log: bool,
    pub(crate) min_size_bytes: u64,
    pub(crate) movie_template: NamingTemplate,
    pub(crate) movies: bool,
    pub(crate) overwrite: bool,
    pub(crate) path: PathBuf,
    pub(crate) recurse: bool,
    pub(crate) template: NamingTemplate,
    pub(crate) verbose: bool,
}

impl RenameConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub(crate) fn get_user_config() -> Result<Self> {
        let Some(path) = episode_rename::config::CONFIG_PATH.as_deref() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.episode_rename)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {e}"))
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    pub fn from_args(args: Args) -> Result<Self> {
        let user_config = RenameConfig::get_user_config()?;
        Self::from_args_and_user_config(args, user_config)
    }

    /// Merge command line args with the user config. CLI values take priority.
    pub(crate) fn from_args_and_user_config(args: Args, user_config: RenameConfig) -> Result<Self> {
        let path = episode_rename::resolve_input_path(args.path.as_deref())?;

        let mut extensions = Self::normalize_extensions(args.extension.into_iter().chain(user_config.extensions));
        if extensions.is_empty() {
            extensions = Self::normalize_extensions(DEFAULT_MEDIA_EXTENSIONS.iter().copied());
        }

        let mut companion_extensions = Self::normalize_extensions(user_config.companion_extensions);
        if companion_extensions.is_empty() {
            companion_extensions = Self::normalize_extensions(DEFAULT_COMPANION_EXTENSIONS.iter().copied());
        }

        let template = args
            .template
            .or(user_config.template)
            .unwrap_or_else(|| DEFAULT_EPISODE_TEMPLATE.to_string());
        let movie_template = user_config
            .movie_template
            .unwrap_or_else(|| DEFAULT_MOVIE_TEMPLATE.to_string());

        let min_size_kb = args.min_size.or(user_config.min_size_kb).unwrap_or(0);

        Ok(Self {
            auto: args.auto || user_config.auto,
            companion_extensions,
            copy: args.copy || user_config.copy,
            debug: args.debug || user_config.debug,
            dryrun: args.print || user_config.dryrun,
            extensions,
            library: args.library.or(user_config.library),
            log: args.log || user_config.log,
            min_size_bytes: min_size_kb.saturating_mul(1024),
            movie_template: NamingTemplate::new(movie_template),
            movies: args.movies,
            overwrite: args.force || user_config.overwrite,
            path,
            recurse: args.recurse || user_config.recurse,
            template: NamingTemplate::new(template),
            verbose: args.verbose || user_config.verbose,
        })
    }

    /// Options for the file actioner.
    pub(crate) fn action_options(&self) -> ActionOptions {
        ActionOptions {
            overwrite: self.overwrite,
            keep_source: self.copy,
            companion_extensions: self.companion_extensions.clone(),
            chunked_threshold: DEFAULT_CHUNKED_THRESHOLD,
            same_volume_fast_path: true,
        }
    }

    /// Filter for the folder scanner.
    pub(crate) fn scan_filter(&self) -> ScanFilter {
        ScanFilter::new(self.extensions.clone(), self.min_size_bytes)
    }

    /// The naming template for the current mode.
    pub(crate) const fn active_template(&self) -> &NamingTemplate {
        if self.movies { &self.movie_template } else { &self.template }
    }

    /// Key-value pairs for the log file header.
    pub(crate) fn log_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", if self.movies { "movies" } else { "episodes" }.to_string()),
            ("template", self.active_template().pattern().to_string()),
            ("copy", self.copy.to_string()),
            ("overwrite", self.overwrite.to_string()),
            ("recurse", self.recurse.to_string()),
            ("dryrun", self.dryrun.to_string()),
            ("extensions", format!("{:?}", self.extensions)),
            ("companion_extensions", format!("{:?}", self.companion_extensions)),
            ("min_size_bytes", self.min_size_bytes.to_string()),
            (
                "library",
                self.library
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |path| path.display().to_string()),
            ),
        ]
    }

    /// Lowercase, strip leading dots and remove duplicates while keeping order.
    fn normalize_extensions<S: AsRef<str>>(extensions: impl IntoIterator<Item = S>) -> Vec<String> {
        extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .unique()
            .collect()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config:")?;
        writeln!(f, "  path:       {}", self.path.display())?;
        writeln!(f, "  auto:       {}", colorize_bool(self.auto))?;
        writeln!(f, "  copy:       {}", colorize_bool(self.copy))?;
        writeln!(f, "  debug:      {}", colorize_bool(self.debug))?;
        writeln!(f, "  dryrun:     {}", colorize_bool(self.dryrun))?;
        writeln!(f, "  log:        {}", colorize_bool(self.log))?;
        writeln!(f, "  movies:     {}", colorize_bool(self.movies))?;
        writeln!(f, "  overwrite:  {}", colorize_bool(self.overwrite))?;
        writeln!(f, "  recurse:    {}", colorize_bool(self.recurse))?;
        writeln!(f, "  verbose:    {}", colorize_bool(self.verbose))?;
        writeln!(f, "  template:   \"{}\"", self.active_template().pattern())?;
        writeln!(f, "  min size:   {}", episode_rename::format_size(self.min_size_bytes))?;
        writeln!(f, "  extensions: [{}]", self.extensions.join(", "))?;
        writeln!(f, "  companions: [{}]", self.companion_extensions.join(", "))?;
        writeln!(
            f,
            "  library:    {}",
            self.library
                .as_ref()
                .map_or_else(|| "none".to_string(), |path| path.display().to_string())
        )
    }
}

#[cfg(test)]
mod rename_config_tests {
    use super::*;

    use clap::Parser;
    use tempfile::tempdir;

    fn args(extra: &[&str]) -> (tempfile::TempDir, Args) {
        let dir = tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        let mut argv = vec!["test", path.as_str()];
        argv.extend_from_slice(extra);
        let args = Args::try_parse_from(argv).expect("should parse");
        (dir, args)
    }

    #[test]
    fn from_toml_str_parses_empty_config() {
        let config = RenameConfig::from_toml_str("").expect("should parse empty config");
        assert!(!config.auto);
        assert!(!config.copy);
        assert!(!config.overwrite);
        assert!(config.extensions.is_empty());
        assert!(config.template.is_none());
        assert!(config.library.is_none());
    }

    #[test]
    fn from_toml_str_parses_section() {
        let toml = r#"
[episode_rename]
auto = true
copy = true
overwrite = true
recurse = true
log = true
extensions = ["mkv", "mp4"]
companion_extensions = ["srt"]
min_size_kb = 100
template = "{show} {season}x{episode:02} {title}"
movie_template = "{title} [movie]"
library = "/media/library.toml"
"#;
        let config = RenameConfig::from_toml_str(toml).expect("should parse config");
        assert!(config.auto);
        assert!(config.copy);
        assert!(config.overwrite);
        assert!(config.recurse);
        assert!(config.log);
        assert_eq!(config.extensions, vec!["mkv", "mp4"]);
        assert_eq!(config.companion_extensions, vec!["srt"]);
        assert_eq!(config.min_size_kb, Some(100));
        assert_eq!(config.template.as_deref(), Some("{show} {season}x{episode:02} {title}"));
        assert_eq!(config.movie_template.as_deref(), Some("{title} [movie]"));
        assert_eq!(config.library, Some(PathBuf::from("/media/library.toml")));
    }

    #[test]
    fn from_toml_str_ignores_other_sections() {
        let toml = r"
[dots]
recurse = true
";
        let config = RenameConfig::from_toml_str(toml).expect("should parse config");
        assert!(!config.recurse);
    }

    #[test]
    fn from_toml_str_invalid_toml_returns_error() {
        assert!(RenameConfig::from_toml_str("this is not valid toml {{{").is_err());
    }

    #[test]
    fn defaults_without_user_config() {
        let (_dir, args) = args(&[]);
        let config = Config::from_args_and_user_config(args, RenameConfig::default()).expect("should create config");
        assert_eq!(config.extensions.len(), DEFAULT_MEDIA_EXTENSIONS.len());
        assert_eq!(config.companion_extensions.len(), DEFAULT_COMPANION_EXTENSIONS.len());
        assert_eq!(config.template.pattern(), DEFAULT_EPISODE_TEMPLATE);
        assert_eq!(config.movie_template.pattern(), DEFAULT_MOVIE_TEMPLATE);
        assert_eq!(config.min_size_bytes, 0);
        assert!(!config.dryrun);
    }

    #[test]
    fn cli_and_user_config_are_merged() {
        let (_dir, args) = args(&["-e", ".MKV", "-e", "avi", "-p", "-s", "2"]);
        let user_config = RenameConfig::from_toml_str(
            r#"
[episode_rename]
extensions = ["mkv", "webm"]
overwrite = true
min_size_kb = 100
template = "{title}"
"#,
        )
        .unwrap();
        let config = Config::from_args_and_user_config(args, user_config).expect("should create config");

        assert_eq!(config.extensions, vec!["mkv", "avi", "webm"]);
        assert!(config.dryrun);
        assert!(config.overwrite);
        assert_eq!(config.min_size_bytes, 2048);
        assert_eq!(config.template.pattern(), "{title}");
    }

    #[test]
    fn cli_template_overrides_user_config() {
        let (_dir, args) = args(&["-t", "{show} {episode}"]);
        let user_config = RenameConfig::from_toml_str("[episode_rename]\ntemplate = \"{title}\"").unwrap();
        let config = Config::from_args_and_user_config(args, user_config).expect("should create config");
        assert_eq!(config.template.pattern(), "{show} {episode}");
    }

    #[test]
    fn movie_mode_uses_movie_template() {
        let (_dir, args) = args(&["--movies"]);
        let config = Config::from_args_and_user_config(args, RenameConfig::default()).expect("should create config");
        assert_eq!(config.active_template().pattern(), DEFAULT_MOVIE_TEMPLATE);
    }

    #[test]
    fn action_options_follow_flags() {
        let (_dir, args) = args(&["-c", "-f"]);
        let config = Config::from_args_and_user_config(args, RenameConfig::default()).expect("should create config");
        let options = config.action_options();
        assert!(options.keep_source);
        assert!(options.overwrite);
        assert!(options.companion_extensions.contains(&"srt".to_string()));
    }

    #[test]
    fn missing_path_is_an_error() {
        let args = Args::try_parse_from(["test", "/definitely/not/here"]).expect("should parse");
        assert!(Config::from_args_and_user_config(args, RenameConfig::default()).is_err());
    }
}
