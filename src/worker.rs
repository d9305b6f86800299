//! Background phases: one thread per scan or action run, cooperative cancellation and progress callbacks.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::actioner::{self, ActionOptions};
use crate::episode_map::EpisodeMap;
use crate::metadata::{CanonicalList, MetadataCache, MetadataProvider};
use crate::print_warning;
use crate::scan::{self, MovieQuery, ScanFilter};
use crate::stats::RunStats;
use crate::status::MovieIdentity;
use crate::types::{ActionJob, ActionResult, DestinationEpisode, FolderGroup, SourceEpisode};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
}

/// Callbacks from a running phase. Called from the worker thread.
pub trait PhaseEvents: Send + Sync {
    /// Overall phase progress after a unit of work.
    fn on_progress(&self, _percent: u8) {}

    /// Progress within the file currently being copied.
    fn on_file_progress(&self, _percent: u8) {}

    /// Outcome of one action job.
    fn on_result(&self, _result: ActionResult, _source: &Path, _dest: &Path) {}

    /// Called exactly once when a started phase ends, also after a panic.
    fn on_phase_finished(&self) {}
}

/// Owner of at most one running phase thread.
pub struct PhaseWorker<T> {
    stop: StopFlag,
    handle: Option<JoinHandle<T>>,
}

/// The two independent phases of one work area.
pub struct WorkArea {
    pub scan: PhaseWorker<Vec<FolderGroup>>,
    pub action: PhaseWorker<RunStats>,
}

/// Events implementation that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl PhaseEvents for NoEvents {}

/// Fires the terminal callback when the phase closure returns or unwinds.
struct FinishGuard(Arc<dyn PhaseEvents>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.on_phase_finished();
    }
}

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

impl<T: Send + 'static> Default for PhaseWorker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> PhaseWorker<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stop: StopFlag::new(),
            handle: None,
        }
    }

    /// Handle to the flag observed by the running phase.
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start a phase on a new thread.
    ///
    /// Returns false without doing anything if a phase is already running.
    /// The result of a previous finished phase that was never joined is discarded.
    pub fn start<F>(&mut self, events: Arc<dyn PhaseEvents>, job: F) -> bool
    where
        F: FnOnce(&StopFlag, &dyn PhaseEvents) -> T + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let _ = self.join();
        self.stop.reset();

        let stop = self.stop.clone();
        self.handle = Some(thread::spawn(move || {
            let guard = FinishGuard(events);
            job(&stop, guard.0.as_ref())
        }));
        true
    }

    /// Wait for the phase to end and take its result. `None` if nothing was started or the phase panicked.
    pub fn join(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                print_warning!("Worker thread panicked");
                None
            }
        }
    }

    /// Request cancellation and wait for the phase to observe it.
    pub fn stop(&mut self) -> Option<T> {
        self.stop.stop();
        self.join()
    }
}

impl<T> Drop for PhaseWorker<T> {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for WorkArea {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkArea {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scan: PhaseWorker::new(),
            action: PhaseWorker::new(),
        }
    }

    /// Stop both phases and wait for them.
    pub fn shutdown(&mut self) {
        let _ = self.scan.stop();
        let _ = self.action.stop();
    }
}

/// Integer progress after finishing unit `completed` (zero-based) of `total`, clamped to 100.
#[must_use]
pub const fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed + 1) * 100 / total;
    if percent > 100 { 100 } else { percent as u8 }
}

/// Run action jobs strictly in order.
///
/// The stop flag is checked before each job and after each copied block.
/// Jobs that already finished stay in place when the run is stopped.
pub fn run_action_phase(
    jobs: &[ActionJob],
    options: &ActionOptions,
    stop: &StopFlag,
    events: &dyn PhaseEvents,
) -> RunStats {
    let mut stats = RunStats::new();
    let total = jobs.len();

    for (index, job) in jobs.iter().enumerate() {
        if stop.is_stopped() {
            break;
        }

        let start = Instant::now();
        let mut on_block = |percent: u8| {
            events.on_file_progress(percent);
            if stop.is_stopped() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let result = actioner::apply(&job.source, &job.dest, options, Some(&mut on_block));

        stats.add_result(result, start.elapsed());
        events.on_result(result, &job.source, &job.dest);
        events.on_progress(progress_percent(index, total));
    }

    stats.interrupted = stop.is_stopped();
    stats
}

/// Scan folders into groups: list and infer source files, then look up the canonical season.
///
/// A folder with media files always becomes a group, a folder without a season marker is looked up as season 1.
/// An empty folder only becomes a group when its name carries a season the provider knows,
/// so every episode shows up as missing. Unreadable folders are reported and skipped.
/// A folder whose listing was cut short by the stop flag is dropped.
pub fn run_scan_phase<P: MetadataProvider>(
    folders: &[PathBuf],
    filter: &ScanFilter,
    metadata: &mut MetadataCache<P>,
    stop: &StopFlag,
    events: &dyn PhaseEvents,
) -> Vec<FolderGroup> {
    let mut groups = Vec::new();
    let total = folders.len();

    for (index, folder) in folders.iter().enumerate() {
        if stop.is_stopped() {
            break;
        }

        match scan::scan_folder(folder, filter, stop) {
            Ok(_) if stop.is_stopped() => break,
            Ok(source) => {
                if let Some(group) = season_group(folder, source, metadata) {
                    groups.push(group);
                }
            }
            Err(error) => print_warning!("{error:#}"),
        }

        events.on_progress(progress_percent(index, total));
    }

    groups
}

fn season_group<P: MetadataProvider>(
    folder: &Path,
    source: EpisodeMap<SourceEpisode>,
    metadata: &mut MetadataCache<P>,
) -> Option<FolderGroup> {
    let (show, marked_season) = scan::detect_show_and_season(folder);
    if source.is_empty() && marked_season.is_none() {
        return None;
    }
    let season = marked_season.unwrap_or(1);
    let canonical = metadata.lookup_season(&show, season);
    if source.is_empty() && canonical.is_none() {
        return None;
    }
    let (show_name, destination) = canonical.map_or_else(
        || (show, EpisodeMap::new()),
        |list| (list.name.clone(), list.destination_map()),
    );
    Some(FolderGroup::new(folder.to_path_buf(), show_name, Some(season), source, destination))
}

/// Scan folders in movie mode: every media file becomes its own single-entry group.
///
/// The identity is `None` for files the provider does not know, those groups have no destination.
pub fn run_movie_scan_phase<P: MetadataProvider>(
    folders: &[PathBuf],
    filter: &ScanFilter,
    metadata: &mut MetadataCache<P>,
    stop: &StopFlag,
    events: &dyn PhaseEvents,
) -> Vec<(FolderGroup, Option<MovieIdentity>)> {
    let mut groups = Vec::new();
    let total = folders.len();

    for (index, folder) in folders.iter().enumerate() {
        if stop.is_stopped() {
            break;
        }

        match scan::list_media_files(folder, filter, stop) {
            Ok(_) if stop.is_stopped() => break,
            Ok(files) => {
                for (path, size) in files {
                    let query = scan::parse_movie_name(&crate::path_to_file_stem_string(&path));
                    let canonical = metadata.lookup_movie(&query.title, query.year);
                    let source = SourceEpisode::new(Some(1), path, size);
                    groups.push(movie_group(folder, source, &query, canonical));
                }
            }
            Err(error) => print_warning!("{error:#}"),
        }

        events.on_progress(progress_percent(index, total));
    }

    groups
}

fn movie_group(
    folder: &Path,
    source: SourceEpisode,
    query: &MovieQuery,
    canonical: Option<CanonicalList>,
) -> (FolderGroup, Option<MovieIdentity>) {
    let source: EpisodeMap<SourceEpisode> = std::iter::once(source).collect();
    let Some(list) = canonical else {
        let group = FolderGroup::new(folder.to_path_buf(), query.title.as_str(), None, source, EpisodeMap::new());
        return (group, None);
    };

    let name = query
        .part
        .map_or_else(|| list.name.clone(), |part| format!("{} - Part {part}", list.name));
    let destination: EpisodeMap<DestinationEpisode> = std::iter::once(DestinationEpisode::new(Some(1), name)).collect();
    let identity = MovieIdentity::new(list.name.as_str(), list.year)
        .with_part(query.part)
        .with_genre(list.genre.clone());

    let group = FolderGroup::new(folder.to_path_buf(), list.name, None, source, destination);
    (group, Some(identity))
}

#[cfg(test)]
mod worker_tests {
    use super::*;

    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tempfile::tempdir;

    use crate::status::{self, GroupStatus};
    use crate::types::MatchType;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<u8>>,
        results: Mutex<Vec<ActionResult>>,
        finished: AtomicUsize,
    }

    impl PhaseEvents for Recorder {
        fn on_progress(&self, percent: u8) {
            self.progress.lock().unwrap().push(percent);
        }

        fn on_result(&self, result: ActionResult, _source: &Path, _dest: &Path) {
            self.results.lock().unwrap().push(result);
        }

        fn on_phase_finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OneSeason;

    impl MetadataProvider for OneSeason {
        fn season(&self, show: &str, season: u32) -> Option<CanonicalList> {
            (show == "Show" && season == 1).then(|| {
                CanonicalList::new(
                    "Show",
                    Some(1),
                    vec![(1, "Pilot".to_string()), (2, "Second".to_string())],
                )
            })
        }

        fn movie(&self, title: &str, year: Option<u32>) -> Option<CanonicalList> {
            (title == "The Matrix" && year == Some(1999))
                .then(|| CanonicalList::movie("The Matrix", Some(1999), Some("Action".to_string())))
        }
    }

    /// Raises the stop flag from the first callback it sees.
    struct StopOnEvent {
        stop: StopFlag,
    }

    impl PhaseEvents for StopOnEvent {
        fn on_progress(&self, _percent: u8) {
            self.stop.stop();
        }

        fn on_file_progress(&self, _percent: u8) {
            self.stop.stop();
        }
    }

    #[test]
    fn progress_percent_formula() {
        assert_eq!(progress_percent(0, 4), 25);
        assert_eq!(progress_percent(3, 4), 100);
        assert_eq!(progress_percent(0, 3), 33);
        assert_eq!(progress_percent(10, 4), 100);
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        clone.stop();
        assert!(flag.is_stopped());
        flag.reset();
        assert!(!clone.is_stopped());
    }

    #[test]
    fn action_phase_processes_jobs_in_order() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        let b = dir.path().join("b.mkv");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        fs::write(dir.path().join("taken.mkv"), b"x").unwrap();

        let jobs = vec![
            ActionJob::new(a, dir.path().join("A.mkv")),
            ActionJob::new(dir.path().join("missing.mkv"), dir.path().join("M.mkv")),
            ActionJob::new(b, dir.path().join("taken.mkv")),
        ];
        let recorder = Recorder::default();
        let stats = run_action_phase(&jobs, &ActionOptions::default(), &StopFlag::new(), &recorder);

        assert_eq!(
            *recorder.results.lock().unwrap(),
            vec![
                ActionResult::Success,
                ActionResult::SourceMissing,
                ActionResult::DestinationExistsNoOverwrite,
            ]
        );
        assert_eq!(*recorder.progress.lock().unwrap(), vec![33, 66, 100]);
        assert_eq!(stats.total_attempted(), 3);
        assert!(!stats.interrupted);
    }

    #[test]
    fn stopped_action_phase_does_nothing() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mkv");
        fs::write(&a, b"a").unwrap();

        let stop = StopFlag::new();
        stop.stop();
        let stats = run_action_phase(
            &[ActionJob::new(a.clone(), dir.path().join("b.mkv"))],
            &ActionOptions::default(),
            &stop,
            &NoEvents,
        );
        assert_eq!(stats.total_attempted(), 0);
        assert!(stats.interrupted);
        assert!(a.exists());
    }

    #[test]
    fn scan_phase_builds_groups() {
        let dir = tempdir().unwrap();
        let season = dir.path().join("Show").join("Season 1");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("show.s01e01.mkv"), b"1").unwrap();
        fs::write(season.join("show.s01e02.mkv"), b"2").unwrap();
        let unknown = dir.path().join("Other").join("Season 3");
        fs::create_dir_all(&unknown).unwrap();
        fs::write(unknown.join("other 01.mkv"), b"1").unwrap();

        let folders = scan::collect_folders(dir.path(), true);
        let mut cache = MetadataCache::new(OneSeason);
        let recorder = Recorder::default();
        let groups = run_scan_phase(&folders, &ScanFilter::default(), &mut cache, &StopFlag::new(), &recorder);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].show_name, "Other");
        assert_eq!(status::classify(&groups[0]), GroupStatus::SeasonNotFound);
        assert_eq!(groups[1].show_name, "Show");
        assert_eq!(groups[1].season_number, Some(1));
        assert_eq!(status::classify(&groups[1]), GroupStatus::Ok);
        assert_eq!(recorder.progress.lock().unwrap().last(), Some(&100));
    }

    #[test]
    fn empty_season_folder_with_known_season_becomes_group() {
        let dir = tempdir().unwrap();
        let season = dir.path().join("Show").join("Season 1");
        fs::create_dir_all(&season).unwrap();
        let unknown = dir.path().join("Other").join("Season 3");
        fs::create_dir_all(&unknown).unwrap();

        let folders = scan::collect_folders(dir.path(), true);
        let mut cache = MetadataCache::new(OneSeason);
        let groups = run_scan_phase(&folders, &ScanFilter::default(), &mut cache, &StopFlag::new(), &NoEvents);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.folder, season);
        assert_eq!(group.show_name, "Show");
        assert!(group.source().is_empty());
        assert_eq!(group.candidates().len(), 2);
        assert!(
            group
                .candidates()
                .iter()
                .all(|candidate| candidate.match_type() == MatchType::MissingSource)
        );
        assert_eq!(status::classify(group), GroupStatus::UnbalancedFiles);
    }

    #[test]
    fn stopped_scan_keeps_only_finished_folders() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("Show").join("Season 1");
        let second = dir.path().join("Show").join("Season 2");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("show.s01e01.mkv"), b"1").unwrap();
        fs::write(second.join("show.s02e01.mkv"), b"1").unwrap();

        let stop = StopFlag::new();
        let events = StopOnEvent { stop: stop.clone() };
        let mut cache = MetadataCache::new(OneSeason);
        let groups = run_scan_phase(&[first.clone(), second], &ScanFilter::default(), &mut cache, &stop, &events);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].folder, first);

        let stopped = StopFlag::new();
        stopped.stop();
        let groups = run_scan_phase(&[first], &ScanFilter::default(), &mut cache, &stopped, &NoEvents);
        assert!(groups.is_empty());
    }

    #[test]
    fn stop_during_chunked_copy_fails_job_and_removes_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mkv");
        let dest = dir.path().join("b.mkv");
        fs::write(&source, vec![7_u8; actioner::CHUNK_SIZE * 6]).unwrap();

        let options = ActionOptions {
            chunked_threshold: 0,
            same_volume_fast_path: false,
            ..ActionOptions::default()
        };
        let stop = StopFlag::new();
        let events = StopOnEvent { stop: stop.clone() };
        let jobs = [
            ActionJob::new(source.clone(), dest.clone()),
            ActionJob::new(dir.path().join("c.mkv"), dir.path().join("d.mkv")),
        ];
        let stats = run_action_phase(&jobs, &options, &stop, &events);

        assert_eq!(stats.count(ActionResult::Failed), 1);
        assert_eq!(stats.total_attempted(), 1);
        assert!(stats.interrupted);
        assert!(source.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn movie_scan_phase_builds_one_group_per_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("The.Matrix.1999.CD1.mkv"), b"1").unwrap();
        fs::write(dir.path().join("The.Matrix.1999.CD2.mkv"), b"2").unwrap();
        fs::write(dir.path().join("Unknown.Film.mkv"), b"3").unwrap();

        let folders = scan::collect_folders(dir.path(), false);
        let mut cache = MetadataCache::new(OneSeason);
        let groups = run_movie_scan_phase(&folders, &ScanFilter::default(), &mut cache, &StopFlag::new(), &NoEvents);

        assert_eq!(groups.len(), 3);
        let (first, identity) = &groups[0];
        assert_eq!(status::classify(first), GroupStatus::Ok);
        assert_eq!(identity.as_ref().and_then(|identity| identity.part), Some(1));
        let jobs = first.action_jobs(&crate::naming::NamingTemplate::movie());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].dest, dir.path().join("The Matrix (1999) - Part 1.mkv"));

        let (unknown, identity) = &groups[2];
        assert!(identity.is_none());
        assert_eq!(unknown.show_name, "Unknown Film");
        assert_eq!(status::classify(unknown), GroupStatus::SeasonNotFound);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn worker_runs_once_and_reports_finish() {
        let recorder = Arc::new(Recorder::default());
        let mut worker: PhaseWorker<u32> = PhaseWorker::new();

        let started = worker.start(recorder.clone(), |stop, _| {
            while !stop.is_stopped() {
                thread::sleep(Duration::from_millis(5));
            }
            7
        });
        assert!(started);
        assert!(worker.is_running());
        assert!(!worker.start(recorder.clone(), |_, _| 0), "second start is a no-op");

        assert_eq!(worker.stop(), Some(7));
        assert!(!worker.is_running());
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);

        assert!(worker.start(recorder.clone(), |_, events| {
            events.on_progress(100);
            1
        }));
        assert_eq!(worker.join(), Some(1));
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 2);
        assert_eq!(*recorder.progress.lock().unwrap(), vec![100]);
    }

    #[test]
    fn finish_fires_after_panic() {
        let recorder = Arc::new(Recorder::default());
        let mut worker: PhaseWorker<()> = PhaseWorker::new();
        assert!(worker.start(recorder.clone(), |_, _| panic!("boom")));
        assert_eq!(worker.join(), None);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn work_area_phases_are_independent() {
        let mut area = WorkArea::new();
        let events: Arc<dyn PhaseEvents> = Arc::new(NoEvents);
        assert!(area.scan.start(events.clone(), |stop, _| {
            while !stop.is_stopped() {
                thread::sleep(Duration::from_millis(5));
            }
            Vec::new()
        }));
        assert!(area.action.start(events, |_, _| RunStats::new()));
        assert_eq!(area.action.join().map(|stats| stats.total_attempted()), Some(0));
        assert!(area.scan.is_running());
        area.shutdown();
        assert!(!area.scan.is_running());
    }
}
