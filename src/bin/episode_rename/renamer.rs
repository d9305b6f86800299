use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use episode_rename::logger::FileLogger;
use episode_rename::metadata::{LocalLibrary, MetadataCache};
use episode_rename::stats::RunStats;
use episode_rename::status::{self, DuplicateIndex, GroupStatus, MovieIdentity};
use episode_rename::types::{ActionJob, ActionResult, FolderGroup, MatchType};
use episode_rename::worker::{self, PhaseEvents, PhaseWorker, WorkArea};
use episode_rename::{print_bold, print_error, print_warning, scan};

use crate::Args;
use crate::config::Config;

const PROGRESS_BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:80.magenta/blue} {pos}/{len} {percent}%";
const PROGRESS_BAR_CHARS: &str = "=>-";

pub struct Renamer {
    config: Config,
}

/// Progress bar and optional log file fed from the worker thread.
struct BarEvents {
    bar: ProgressBar,
    logger: Option<Arc<Mutex<FileLogger>>>,
    verbose: bool,
}

impl BarEvents {
    fn new(length: usize, logger: Option<Arc<Mutex<FileLogger>>>, verbose: bool) -> Self {
        let bar = ProgressBar::new(length as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_BAR_TEMPLATE)
                .expect("Failed to set progress bar template")
                .progress_chars(PROGRESS_BAR_CHARS),
        );
        Self { bar, logger, verbose }
    }
}

impl PhaseEvents for BarEvents {
    fn on_progress(&self, percent: u8) {
        let length = self.bar.length().unwrap_or_default();
        self.bar.set_position(length * u64::from(percent) / 100);
    }

    fn on_result(&self, result: ActionResult, source: &Path, dest: &Path) {
        if let Some(logger) = &self.logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_result(result, source, dest);
        }
        if !result.is_success() {
            self.bar.suspend(|| {
                print_error!("{result}: {}", source.display());
            });
        } else if self.verbose {
            self.bar.println(format!("{}", dest.display()));
        }
    }

    fn on_phase_finished(&self) {
        self.bar.finish_and_clear();
    }
}

impl Renamer {
    pub fn new(args: Args) -> Result<Self> {
        Ok(Self {
            config: Config::from_args(args)?,
        })
    }

    pub fn run(&self) -> Result<()> {
        if self.config.debug {
            println!("{}", self.config);
        }

        let root = &self.config.path;
        if !root.is_dir() {
            anyhow::bail!("Input path is not a directory: {}", root.display());
        }

        let library = self.load_library()?;
        let logger = self.create_logger()?;
        let folders = scan::collect_folders(root, self.config.recurse);

        let groups = if self.config.movies {
            self.scan_movies(folders, library, logger.as_ref())?
        } else {
            self.scan_episodes(folders, library, logger.as_ref())?
        };

        if groups.is_empty() {
            println!("No media files found");
            return Ok(());
        }

        let jobs: Vec<ActionJob> = groups
            .iter()
            .flat_map(|group| group.action_jobs(self.config.active_template()))
            .collect();

        let mut stats = RunStats::new();
        for group in &groups {
            stats.add_candidates(group.candidates());
        }

        if jobs.is_empty() {
            println!("{}", "Nothing to rename".green());
            return Ok(());
        }
        if self.config.dryrun {
            print_bold!("Dryrun: {} files would be renamed", jobs.len());
            return Ok(());
        }
        if !self.confirm(jobs.len())? {
            return Ok(());
        }

        let run_stats = Self::run_actions(jobs, &self.config, logger.clone())?;
        stats += run_stats;

        stats.print_summary();
        if let Some(logger) = &logger
            && let Ok(mut logger) = logger.lock()
        {
            logger.log_stats(&stats);
            if self.config.verbose {
                println!("Log file: {}", logger.path().display());
            }
        }
        Ok(())
    }

    fn load_library(&self) -> Result<LocalLibrary> {
        match &self.config.library {
            Some(path) => {
                let library = LocalLibrary::load(path)?;
                if self.config.verbose {
                    println!(
                        "Loaded library with {} shows and {} movies",
                        library.show_count(),
                        library.movie_count()
                    );
                }
                Ok(library)
            }
            None => {
                print_warning!("No metadata library given, files can not be matched");
                Ok(LocalLibrary::default())
            }
        }
    }

    fn create_logger(&self) -> Result<Option<Arc<Mutex<FileLogger>>>> {
        if !self.config.log {
            return Ok(None);
        }
        let mut logger = FileLogger::new()?;
        logger.log_init(&self.config.path, &self.config.log_settings());
        Ok(Some(Arc::new(Mutex::new(logger))))
    }

    fn scan_episodes(
        &self,
        folders: Vec<PathBuf>,
        library: LocalLibrary,
        logger: Option<&Arc<Mutex<FileLogger>>>,
    ) -> Result<Vec<FolderGroup>> {
        let mut area = WorkArea::new();
        let events = Arc::new(BarEvents::new(folders.len(), None, false));
        let filter = self.config.scan_filter();

        area.scan.start(events, move |stop, events| {
            let mut cache = MetadataCache::new(library);
            worker::run_scan_phase(&folders, &filter, &mut cache, stop, events)
        });
        let groups = area.scan.join().context("Scan phase failed")?;

        for group in &groups {
            let group_status = status::classify(group);
            self.print_group(group, group_status, false);
            log_folder(logger, &group.folder, group_status);
        }
        Ok(groups)
    }

    fn scan_movies(
        &self,
        folders: Vec<PathBuf>,
        library: LocalLibrary,
        logger: Option<&Arc<Mutex<FileLogger>>>,
    ) -> Result<Vec<FolderGroup>> {
        let mut scan_worker: PhaseWorker<Vec<(FolderGroup, Option<MovieIdentity>)>> = PhaseWorker::new();
        let events = Arc::new(BarEvents::new(folders.len(), None, false));
        let filter = self.config.scan_filter();

        scan_worker.start(events, move |stop, events| {
            let mut cache = MetadataCache::new(library);
            worker::run_movie_scan_phase(&folders, &filter, &mut cache, stop, events)
        });
        let scanned = scan_worker.join().context("Scan phase failed")?;

        let mut duplicates = DuplicateIndex::new();
        for (group, identity) in &scanned {
            let exists = group.source().iter().all(|source| source.filename.exists());
            duplicates.push(identity.clone(), exists);
        }
        duplicates.rescan();

        let mut groups = Vec::with_capacity(scanned.len());
        for (index, (mut group, _)) in scanned.into_iter().enumerate() {
            let is_duplicate = duplicates.is_duplicate(index);
            if is_duplicate {
                for candidate in group.candidates_mut() {
                    candidate.set_perform_move(false);
                }
            }
            let group_status = status::classify(&group);
            self.print_group(&group, group_status, is_duplicate);
            log_folder(logger, &group.folder, group_status);
            groups.push(group);
        }
        Ok(groups)
    }

    fn print_group(&self, group: &FolderGroup, group_status: GroupStatus, is_duplicate: bool) {
        let template = self.config.active_template();
        let folder = episode_rename::get_relative_path_or_filename(&group.folder, &self.config.path);
        let header = group.season_number.map_or_else(
            || group.show_name.clone(),
            |season| format!("{} - Season {season}", group.show_name),
        );

        let status_text = if group_status.is_ok() {
            group_status.to_string().green()
        } else {
            group_status.to_string().yellow()
        };
        if !self.config.movies || !group_status.is_ok() || self.config.verbose {
            println!("{} ({folder}): {status_text}", header.bold().magenta());
        }
        if is_duplicate {
            print_warning!("Duplicate movie, skipping: {}", group.show_name);
        }

        for candidate in group.candidates() {
            match candidate.match_type() {
                MatchType::Ready => {
                    let (Some(source), Some(dest)) = (candidate.source_path(), group.destination_path(candidate, template))
                    else {
                        continue;
                    };
                    let old_name = episode_rename::path_to_filename_string(source);
                    let new_name = episode_rename::path_to_filename_string(&dest);
                    if old_name == new_name {
                        if self.config.verbose {
                            println!("{}", old_name.green());
                        }
                    } else if candidate.perform_move() {
                        episode_rename::show_diff(&old_name, &new_name);
                    }
                }
                MatchType::MissingDestination => {
                    if let Some(source) = candidate.source_path() {
                        println!(
                            "{}: {}",
                            MatchType::MissingDestination.to_string().yellow(),
                            episode_rename::path_to_filename_string(source)
                        );
                    }
                }
                MatchType::MissingSource => {
                    if self.config.verbose
                        && let Some(destination) = &candidate.destination
                    {
                        println!("{}: {}", MatchType::MissingSource.to_string().yellow(), destination.name);
                    }
                }
            }
        }
    }

    fn confirm(&self, count: usize) -> Result<bool> {
        if self.config.auto {
            return Ok(true);
        }
        let verb = if self.config.copy { "Copy" } else { "Rename" };
        print!("{}", format!("{verb} {count} files? (y/n): ").magenta());
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    }

    fn run_actions(jobs: Vec<ActionJob>, config: &Config, logger: Option<Arc<Mutex<FileLogger>>>) -> Result<RunStats> {
        let mut action_worker: PhaseWorker<RunStats> = PhaseWorker::new();
        let stop = action_worker.stop_flag();

        ctrlc::set_handler(move || {
            if stop.is_stopped() {
                // Second Ctrl+C - force exit
                std::process::exit(130);
            }
            println!("\n{}", "Received Ctrl+C, finishing current file...".yellow().bold());
            stop.stop();
        })
        .expect("Failed to set Ctrl+C handler");

        let events = Arc::new(BarEvents::new(jobs.len(), logger, config.verbose));
        let options = config.action_options();
        action_worker.start(events, move |stop, events| {
            worker::run_action_phase(&jobs, &options, stop, events)
        });

        let stats = action_worker.join().context("Action phase failed")?;
        if stats.interrupted {
            print_warning!("Interrupted, remaining files were not renamed");
        }
        Ok(stats)
    }
}

fn log_folder(logger: Option<&Arc<Mutex<FileLogger>>>, folder: &Path, group_status: GroupStatus) {
    if let Some(logger) = logger
        && let Ok(mut logger) = logger.lock()
    {
        logger.log_folder(folder, group_status);
    }
}

#[cfg(test)]
mod renamer_tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn bar_events_track_progress_and_log_results() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let logger = Arc::new(Mutex::new(FileLogger::with_path(&log_path).unwrap()));

        let events = BarEvents::new(4, Some(logger.clone()), false);
        events.on_result(ActionResult::Success, Path::new("/tv/a.mkv"), Path::new("/tv/b.mkv"));
        events.on_progress(50);
        assert_eq!(events.bar.position(), 2);
        events.on_phase_finished();

        log_folder(Some(&logger), Path::new("/tv/Show"), GroupStatus::UnbalancedFiles);

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("SUCCESS \"/tv/a.mkv\" -> \"/tv/b.mkv\""));
        assert!(content.contains("FOLDER  \"/tv/Show\" | Unbalanced files"));
    }

    #[test]
    fn log_folder_without_logger_is_a_no_op() {
        log_folder(None, Path::new("/tv/Show"), GroupStatus::Ok);
    }
}
