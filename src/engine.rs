use crate::analyze::{AnalysisRequest, analyze_file, apply_request};
use crate::cache::{Cache, CachePool};
use crate::config::Config;
use crate::errors::{ArgusError, ArgusResult};
use crate::report::{FileAnalysis, Report, ReportBuilder};
use crate::walk::spawn_file_walker;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Read-only cancellation signal shared across the pool.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Findings cache shared by the pool; each worker draws its own pooled
/// connection.
pub struct CacheHandle {
    pub pool: CachePool,
    pub project: String,
    /// Ignore stored results and re-analyze everything.
    pub refresh: bool,
}

pub struct AnalysisOutput {
    pub report: Report,
    pub cancelled: bool,
}

enum WorkerMsg {
    File(crate::report::FileReport),
    Skipped(PathBuf, String),
}

/// Walk `root` and run the analysis over a bounded worker pool. Workers own
/// their parser instances; only filtered per-file results cross the channel
/// back to the single-threaded aggregator.
pub fn analyze_tree(
    root: &Path,
    config: &Config,
    req: &AnalysisRequest,
    cancel: &CancelToken,
    cache: Option<&CacheHandle>,
) -> ArgusResult<AnalysisOutput> {
    req.validate()?;

    let (rx_paths, walk_stats) = spawn_file_walker(root, config);
    let workers = config.performance.worker_threads.unwrap_or(4).max(1);
    let (tx_out, rx_out) = bounded::<WorkerMsg>(workers * config.performance.channel_multiplier);

    let mut builder = ReportBuilder::new(req.low_threshold, req.medium_threshold);
    thread::scope(|s| {
        for _ in 0..workers {
            let rx = rx_paths.clone();
            let tx = tx_out.clone();
            s.spawn(move || worker_loop(rx, tx, req, cancel, cache));
        }
        drop(tx_out);

        // single-threaded aggregation; ends when every worker is done
        for msg in rx_out.iter() {
            match msg {
                WorkerMsg::File(file) => builder.add_file(file),
                WorkerMsg::Skipped(path, reason) => builder.add_skipped(path, reason),
            }
        }
    });

    builder.add_walk_skips(walk_stats.skipped_total());

    let cancelled = cancel.is_cancelled();
    if !cancelled && builder.total_files() == 0 {
        return Err(ArgusError::FileNotFound(root.display().to_string()));
    }
    Ok(AnalysisOutput {
        report: builder.finish(req.sort_by),
        cancelled,
    })
}

fn worker_loop(
    rx: Receiver<crate::walk::Batch>,
    tx: Sender<WorkerMsg>,
    req: &AnalysisRequest,
    cancel: &CancelToken,
    cache: Option<&CacheHandle>,
) {
    let mut cache_conn = cache.and_then(|h| match Cache::from_pool(&h.project, &h.pool) {
        Ok(conn) => Some(conn),
        Err(e) => {
            tracing::warn!("worker could not open cache connection: {e}");
            None
        }
    });
    let refresh = cache.map(|h| h.refresh).unwrap_or(false);

    for batch in rx.iter() {
        for path in batch {
            if cancel.is_cancelled() {
                return;
            }
            match process_file(&path, cancel, cache_conn.as_mut(), refresh) {
                Ok(Some(raw)) => {
                    let _ = tx.send(WorkerMsg::File(apply_request(&raw, req)));
                }
                Ok(None) => {}
                Err(ArgusError::Cancelled) => return,
                Err(e) => {
                    let _ = tx.send(WorkerMsg::Skipped(path, e.to_string()));
                }
            }
        }
    }
}

fn process_file(
    path: &Path,
    cancel: &CancelToken,
    cache: Option<&mut Cache>,
    refresh: bool,
) -> ArgusResult<Option<FileAnalysis>> {
    let Some(cache) = cache else {
        return analyze_file(path, cancel);
    };

    if !refresh
        && !cache.should_analyze(path).unwrap_or(true)
        && let Ok(Some(stored)) = cache.load_analysis(path)
    {
        tracing::debug!("cache hit: {}", path.display());
        return Ok(Some(stored));
    }

    let raw = analyze_file(path, cancel)?;
    if let Some(raw) = &raw
        && let Err(e) = cache.store_analysis(raw)
    {
        tracing::warn!("failed to cache results for {}: {e}", path.display());
    }
    Ok(raw)
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut cfg = Config::default();
        cfg.performance.worker_threads = Some(2);
        cfg.performance.channel_multiplier = 2;
        cfg.performance.batch_size = 4;
        cfg
    }

    #[test]
    fn analyzes_a_small_tree_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("clean.js"),
            "function a() { return 1; }\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("dead.ts"),
            "function b(): number { return 1; const x = 2; }\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not source").unwrap();

        let out = analyze_tree(
            tmp.path(),
            &test_config(),
            &AnalysisRequest::default(),
            &CancelToken::new(),
            None,
        )
        .unwrap();
        assert!(!out.cancelled);
        let s = &out.report.summary;
        assert_eq!(s.analyzed_files, 2);
        assert_eq!(s.total_functions, 2);
        assert_eq!(s.dead_code.warning, 1);
        assert_eq!(s.health_score, 99);
        // notes.txt was turned away by the walk
        assert_eq!(s.skipped_files, 1);
        // dead.ts has the only findings
        assert_eq!(out.report.files.len(), 2); // both carry a complexity finding
    }

    #[test]
    fn empty_tree_is_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("readme.md"), "# nothing to analyze").unwrap();
        let out = analyze_tree(
            tmp.path(),
            &test_config(),
            &AnalysisRequest::default(),
            &CancelToken::new(),
            None,
        );
        assert!(matches!(out, Err(ArgusError::FileNotFound(_))));
    }

    #[test]
    fn cancelled_run_returns_a_partial_report() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.js"), "function a() {}").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = analyze_tree(
            tmp.path(),
            &test_config(),
            &AnalysisRequest::default(),
            &cancel,
            None,
        )
        .unwrap();
        assert!(out.cancelled);
    }

    #[test]
    fn parse_failures_become_diagnostics() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ok.js"), "function a() { return 1; }").unwrap();
        std::fs::write(tmp.path().join("broken.js"), "function ( {{{{ ]").unwrap();
        let out = analyze_tree(
            tmp.path(),
            &test_config(),
            &AnalysisRequest::default(),
            &CancelToken::new(),
            None,
        )
        .unwrap();
        assert_eq!(out.report.summary.total_files, 2);
        assert_eq!(out.report.summary.analyzed_files, 1);
        assert_eq!(out.report.diagnostics.len(), 1);
        assert!(out.report.diagnostics[0].path.ends_with("broken.js"));
    }

    #[test]
    fn identical_runs_produce_identical_reports() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("a.js"),
            "function f(x) { if (x) { return 1; } const dead = 2; return 3; }",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("b.js"),
            "function g() { const unused = 1; return 2; }",
        )
        .unwrap();

        let run = || {
            let out = analyze_tree(
                tmp.path(),
                &test_config(),
                &AnalysisRequest::default(),
                &CancelToken::new(),
                None,
            )
            .unwrap();
            let mut report = out.report;
            report.generated_at = String::new();
            crate::report::render_json(&report).unwrap()
        };
        assert_eq!(run(), run());
    }
}
