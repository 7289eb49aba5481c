use crate::analyze::AnalysisRequest;
use crate::cache::{self, Cache};
use crate::cli::Format;
use crate::config::Config;
use crate::engine::{self, CacheHandle, CancelToken};
use crate::errors::{ArgusError, ArgusResult};
use crate::report::{gate_exit_code, print_text, render_json};
use console::style;
use std::path::Path;

pub struct RunOptions<'a> {
    pub path: &'a str,
    pub format: Option<Format>,
    pub no_cache: bool,
    pub rebuild_cache: bool,
}

/// Shared driver behind `analyze`, `complexity` and `dead-code`: resolve the
/// cache, run the engine, render, and turn the report into an exit code.
pub fn handle(
    opts: RunOptions,
    req: AnalysisRequest,
    database_dir: &Path,
    config: &Config,
) -> ArgusResult<i32> {
    let scan_path = Path::new(opts.path).canonicalize()?;
    let data_dir = if config.cache.path.is_empty() {
        database_dir.to_path_buf()
    } else {
        Path::new(&config.cache.path).to_path_buf()
    };

    let cache_handle = if config.cache.enabled && !opts.no_cache {
        let loc = cache::locate(&scan_path, &data_dir);
        let pool = Cache::init(&loc.db_path)?;
        Some(CacheHandle {
            pool,
            project: loc.project,
            refresh: opts.rebuild_cache,
        })
    } else {
        None
    };

    let format = resolve_format(opts.format, config);
    if format == Format::Console {
        println!(
            "{} {}...\n",
            style("Analyzing").green().bold(),
            style(scan_path.display()).white().bold()
        );
    }

    let cancel = CancelToken::new();
    let mut out = engine::analyze_tree(&scan_path, config, &req, &cancel, cache_handle.as_ref())?;

    if let Some(max) = config.output.max_results {
        out.report.files.truncate(max as usize);
    }

    match format {
        Format::Json => println!("{}", render_json(&out.report)?),
        Format::Console => print_text(&out.report, config.output.quiet),
    }

    if out.cancelled {
        return Err(ArgusError::Cancelled);
    }
    Ok(gate_exit_code(&out.report))
}

fn resolve_format(flag: Option<Format>, config: &Config) -> Format {
    flag.unwrap_or_else(|| {
        if config.output.default_format.eq_ignore_ascii_case("json") {
            Format::Json
        } else {
            Format::Console
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Passes;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.cache.enabled = false;
        config.output.quiet = true;
        config.performance.worker_threads = Some(1);
        config
    }

    #[test]
    fn clean_tree_exits_zero() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.js"), "function a() { return 1; }").unwrap();
        let code = handle(
            RunOptions {
                path: tmp.path().to_str().unwrap(),
                format: Some(Format::Json),
                no_cache: true,
                rebuild_cache: false,
            },
            AnalysisRequest::default(),
            tmp.path(),
            &quiet_config(),
        )
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn empty_tree_maps_to_exit_three() {
        let tmp = tempfile::tempdir().unwrap();
        let err = handle(
            RunOptions {
                path: tmp.path().to_str().unwrap(),
                format: Some(Format::Json),
                no_cache: true,
                rebuild_cache: false,
            },
            AnalysisRequest::default(),
            tmp.path(),
            &quiet_config(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn invalid_thresholds_map_to_exit_two() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.js"), "function a() {}").unwrap();
        let req = AnalysisRequest {
            low_threshold: 10,
            medium_threshold: 10,
            passes: Passes::all(),
            ..AnalysisRequest::default()
        };
        let err = handle(
            RunOptions {
                path: tmp.path().to_str().unwrap(),
                format: Some(Format::Json),
                no_cache: true,
                rebuild_cache: false,
            },
            req,
            tmp.path(),
            &quiet_config(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn cached_and_fresh_runs_agree() {
        let tmp = tempfile::tempdir().unwrap();
        let proj = tmp.path().join("proj");
        std::fs::create_dir(&proj).unwrap();
        std::fs::write(
            proj.join("a.js"),
            "function f(x) { if (x) { return 1; } const dead = 2; return 3; }",
        )
        .unwrap();

        let mut config = quiet_config();
        config.cache.enabled = true;

        // first run populates the cache, second reads from it
        for _ in 0..2 {
            let code = handle(
                RunOptions {
                    path: proj.to_str().unwrap(),
                    format: Some(Format::Json),
                    no_cache: false,
                    rebuild_cache: false,
                },
                AnalysisRequest::default(),
                tmp.path(),
                &config,
            )
            .unwrap();
            assert_eq!(code, 0);
        }
    }
}
