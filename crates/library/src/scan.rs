use std::path::{Path, PathBuf};

use common::{absolute_path, Track};
use metadata::{extract_with, ExtractError, ExtractOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::LibraryError;

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "m4a", "aac", "wav", "aiff", "aif", "alac", "ogg", "opus",
];

#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub extensions: Vec<String>,
    pub follow_links: bool,
    pub include_hidden: bool,
    pub extract: ExtractOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            follow_links: false,
            include_hidden: false,
            extract: ExtractOptions::default(),
        }
    }
}

impl ScanOptions {
    pub fn is_audio_file(&self, path: &Path) -> bool {
        let ext = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => return false,
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub discovered: usize,
    pub processed: usize,
    pub failed: usize,
    pub current: Option<PathBuf>,
    pub finished: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanFailure {
    Unsupported(PathBuf),
    Extract(ExtractError),
}

impl ScanFailure {
    pub fn path(&self) -> &Path {
        match self {
            ScanFailure::Unsupported(path) => path,
            ScanFailure::Extract(ExtractError::FileNotFound(path)) => path,
        }
    }
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanFailure::Unsupported(path) => {
                write!(f, "unsupported file type: {}", path.display())
            }
            ScanFailure::Extract(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanReport {
    pub root: Option<PathBuf>,
    pub tracks: Vec<Track>,
    pub failures: Vec<ScanFailure>,
}

/// Supported audio files under `root`, sorted by name within each directory.
pub fn collect_audio_files(root: &Path, options: &ScanOptions) -> Vec<PathBuf> {
    let include_hidden = options.include_hidden;
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| include_hidden || entry.depth() == 0 || !is_hidden(entry))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Skipping unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };
        if entry.file_type().is_file() && options.is_audio_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files
}

/// Walks `root` and extracts every supported file. Blocking.
pub fn scan_directory(
    root: &Path,
    options: &ScanOptions,
    mut on_progress: impl FnMut(&ScanProgress),
) -> ScanReport {
    let root = absolute_path(root);
    let files = collect_audio_files(&root, options);
    info!("Found {} audio files under {:?}", files.len(), root);
    let mut report = extract_all(files, options, &mut on_progress);
    report.root = Some(root);
    report
}

/// Extracts an explicit list of files. Unsupported extensions are rejected.
pub fn import_files(
    paths: Vec<PathBuf>,
    options: &ScanOptions,
    mut on_progress: impl FnMut(&ScanProgress),
) -> ScanReport {
    let mut accepted = Vec::with_capacity(paths.len());
    let mut rejected = Vec::new();
    for path in paths {
        let path = absolute_path(&path);
        if options.is_audio_file(&path) {
            accepted.push(path);
        } else {
            debug!("Rejecting unsupported file {:?}", path);
            rejected.push(ScanFailure::Unsupported(path));
        }
    }
    let mut report = extract_all(accepted, options, &mut on_progress);
    let mut failures = rejected;
    failures.append(&mut report.failures);
    report.failures = failures;
    report
}

fn extract_all(
    files: Vec<PathBuf>,
    options: &ScanOptions,
    on_progress: &mut impl FnMut(&ScanProgress),
) -> ScanReport {
    let mut progress = ScanProgress {
        discovered: files.len(),
        ..ScanProgress::default()
    };
    on_progress(&progress);

    let mut report = ScanReport::default();
    for path in files {
        match extract_with(&path, &options.extract) {
            Ok(track) => report.tracks.push(track),
            Err(err) => {
                warn!("Failed to import {:?}: {}", path, err);
                progress.failed += 1;
                report.failures.push(ScanFailure::Extract(err));
            }
        }
        progress.processed += 1;
        progress.current = Some(path);
        on_progress(&progress);
    }

    progress.finished = true;
    progress.current = None;
    on_progress(&progress);
    report
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// A scan or import running on the blocking pool.
pub struct ScanHandle {
    progress: watch::Receiver<ScanProgress>,
    task: JoinHandle<ScanReport>,
}

impl ScanHandle {
    pub fn progress(&self) -> ScanProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanProgress> {
        self.progress.clone()
    }

    pub async fn wait(self) -> Result<ScanReport, LibraryError> {
        self.task.await.map_err(|err| LibraryError::ScanJoin(err.to_string()))
    }
}

/// Runs [`scan_directory`] on a blocking worker. Requires a tokio runtime.
pub fn spawn_scan(root: PathBuf, options: ScanOptions) -> ScanHandle {
    spawn_with_progress(move |on_progress| scan_directory(&root, &options, on_progress))
}

/// Runs [`import_files`] on a blocking worker. Requires a tokio runtime.
pub fn spawn_import(paths: Vec<PathBuf>, options: ScanOptions) -> ScanHandle {
    spawn_with_progress(move |on_progress| import_files(paths, &options, on_progress))
}

fn spawn_with_progress<F>(job: F) -> ScanHandle
where
    F: FnOnce(&mut dyn FnMut(&ScanProgress)) -> ScanReport + Send + 'static,
{
    let (tx, rx) = watch::channel(ScanProgress::default());
    let task = tokio::task::spawn_blocking(move || {
        let mut publish = |progress: &ScanProgress| {
            let _ = tx.send(progress.clone());
        };
        job(&mut publish)
    });
    ScanHandle { progress: rx, task }
}
