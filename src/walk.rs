use crossbeam_channel::{Receiver, Sender, bounded};
use ignore::{DirEntry, WalkBuilder, WalkState, overrides::OverrideBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::config::Config;
use crate::lang::Lang;

pub type Batch = Vec<PathBuf>;

/// What the walk turned away while collecting candidates. The aggregator
/// folds these into the report's diagnostic counters.
#[derive(Debug, Default)]
pub struct WalkStats {
    non_source: AtomicUsize,
    oversized: AtomicUsize,
}

impl WalkStats {
    pub fn skipped_non_source(&self) -> usize {
        self.non_source.load(Ordering::Relaxed)
    }

    pub fn skipped_oversized(&self) -> usize {
        self.oversized.load(Ordering::Relaxed)
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped_non_source() + self.skipped_oversized()
    }
}

/// Per-walker-thread collector: keeps only files the analyzer has a grammar
/// for, counts everything else, and ships full batches downstream.
struct CandidateBatcher {
    tx: Sender<Batch>,
    batch: Batch,
    capacity: usize,
    max_bytes: u64,
    stats: Arc<WalkStats>,
}

impl CandidateBatcher {
    fn offer(&mut self, entry: DirEntry) {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            return;
        }
        if Lang::from_path(entry.path()).is_none() {
            self.stats.non_source.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if self.max_bytes > 0
            && entry
                .metadata()
                .map(|m| m.len() > self.max_bytes)
                .unwrap_or(false)
        {
            tracing::debug!("file too large, skipping: {}", entry.path().display());
            self.stats.oversized.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.batch.push(entry.into_path());
        if self.batch.len() >= self.capacity {
            self.ship();
        }
    }

    fn ship(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let full = std::mem::replace(&mut self.batch, Vec::with_capacity(self.capacity));
        if self.tx.send(full).is_err() {
            tracing::debug!("walk receiver dropped, discarding batch");
        }
    }
}

impl Drop for CandidateBatcher {
    fn drop(&mut self) {
        self.ship();
    }
}

fn build_overrides(root: &Path, cfg: &Config) -> ignore::overrides::Override {
    let mut ob = OverrideBuilder::new(root);

    for ext in &cfg.scanner.excluded_extensions {
        if let Err(e) = ob.add(&format!("!*.{ext}")) {
            tracing::warn!("invalid exclude-extension pattern '{ext}': {e}");
        }
    }
    for dir in &cfg.scanner.excluded_directories {
        if let Err(e) = ob.add(&format!("!**/{dir}/**")) {
            tracing::warn!("invalid exclude-dir pattern '{dir}': {e}");
        }
    }
    for file in &cfg.scanner.excluded_files {
        if let Err(e) = ob.add(&format!("!**/{file}")) {
            tracing::warn!("invalid exclude-file pattern '{file}': {e}");
        }
    }

    ob.build().unwrap_or_else(|e| {
        tracing::error!("failed to build ignore overrides: {e}");
        ignore::overrides::Override::empty()
    })
}

// ---------------------------------------------------------------------------
/// Walk `root` on a background thread, sending batches of analyzable source
/// paths through the returned channel. Non-source and oversized files are
/// tallied in the returned `WalkStats`; the channel closes when the walk
/// finishes.
pub fn spawn_file_walker(root: &Path, cfg: &Config) -> (Receiver<Batch>, Arc<WalkStats>) {
    let threads = cfg
        .performance
        .worker_threads
        .unwrap_or_else(num_cpus::get)
        .max(1);
    let (tx, rx) = bounded::<Batch>(threads * cfg.performance.channel_multiplier);
    let stats = Arc::new(WalkStats::default());

    let walker = {
        let mut wb = WalkBuilder::new(root);
        wb.hidden(!cfg.scanner.scan_hidden_files)
            .follow_links(cfg.scanner.follow_symlinks)
            .git_ignore(cfg.scanner.read_vcsignore)
            .require_git(cfg.scanner.require_git_to_read_vcsignore)
            .threads(threads)
            .overrides(build_overrides(root, cfg));
        wb.build_parallel()
    };

    let root = root.to_path_buf();
    let max_bytes = cfg.scanner.max_file_size_mb.unwrap_or(0) * 1_048_576;
    let capacity = cfg.performance.batch_size;
    let walk_stats = Arc::clone(&stats);

    thread::spawn(move || {
        tracing::info!(root = ?root, threads, capacity, "walking source tree");
        walker.run(|| {
            let mut batcher = CandidateBatcher {
                tx: tx.clone(),
                batch: Vec::with_capacity(capacity),
                capacity,
                max_bytes,
                stats: Arc::clone(&walk_stats),
            };
            Box::new(move |entry| {
                if let Ok(e) = entry {
                    batcher.offer(e);
                }
                WalkState::Continue
            })
        });
        tracing::info!(
            non_source = walk_stats.skipped_non_source(),
            oversized = walk_stats.skipped_oversized(),
            "walk finished"
        );
    });

    (rx, stats)
}

#[test]
fn walker_yields_only_analyzable_sources() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("app.js"), "function f() {}").unwrap();
    std::fs::write(tmp.path().join("types.d.ts"), "export type T = number;").unwrap();
    std::fs::write(tmp.path().join("readme.md"), "# docs").unwrap();

    let mut cfg = Config::default();
    cfg.performance.worker_threads = Some(1);
    cfg.performance.channel_multiplier = 1;
    cfg.performance.batch_size = 2;

    let (rx, stats) = spawn_file_walker(tmp.path(), &cfg);
    let all: Vec<_> = rx.into_iter().flatten().collect();

    assert!(all.iter().any(|p| p.ends_with("app.js")));
    assert!(all.iter().any(|p| p.ends_with("types.d.ts")));
    assert!(all.iter().all(|p| !p.ends_with("readme.md")));
    assert_eq!(stats.skipped_non_source(), 1);
    assert_eq!(stats.skipped_oversized(), 0);
}

#[test]
fn oversized_files_are_counted_not_sent() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("small.js"), "function f() {}").unwrap();
    let big = "// padding\n".repeat(110_000); // just over 1 MiB
    std::fs::write(tmp.path().join("bundle.js"), big).unwrap();

    let mut cfg = Config::default();
    cfg.scanner.max_file_size_mb = Some(1);
    cfg.performance.worker_threads = Some(1);
    cfg.performance.channel_multiplier = 1;
    cfg.performance.batch_size = 2;

    let (rx, stats) = spawn_file_walker(tmp.path(), &cfg);
    let all: Vec<_> = rx.into_iter().flatten().collect();

    assert!(all.iter().any(|p| p.ends_with("small.js")));
    assert!(all.iter().all(|p| !p.ends_with("bundle.js")));
    assert_eq!(stats.skipped_oversized(), 1);
}

#[test]
fn walker_skips_excluded_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let nm = tmp.path().join("node_modules").join("dep");
    std::fs::create_dir_all(&nm).unwrap();
    std::fs::write(nm.join("index.js"), "module.exports = 1;").unwrap();
    std::fs::write(tmp.path().join("app.js"), "function f() {}").unwrap();

    let mut cfg = Config::default();
    cfg.performance.worker_threads = Some(1);
    cfg.performance.channel_multiplier = 1;
    cfg.performance.batch_size = 8;

    let (rx, stats) = spawn_file_walker(tmp.path(), &cfg);
    let all: Vec<_> = rx.into_iter().flatten().collect();

    assert!(all.iter().any(|p| p.ends_with("app.js")));
    assert!(all.iter().all(|p| !p.to_string_lossy().contains("node_modules")));
    // override-excluded paths never reach the batcher, so they are not
    // counted as skipped
    assert_eq!(stats.skipped_total(), 0);
}
