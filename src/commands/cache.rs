use crate::analyze::AnalysisRequest;
use crate::cache::{self, Cache};
use crate::cli::CacheAction;
use crate::config::Config;
use crate::engine::{self, CacheHandle, CancelToken};
use crate::errors::ArgusResult;
use bytesize::ByteSize;
use chrono::{DateTime, Local};
use console::style;
use std::path::Path;
use std::{env, fs};

pub fn handle(action: CacheAction, database_dir: &Path, config: &Config) -> ArgusResult<i32> {
    let data_dir = if config.cache.path.is_empty() {
        database_dir.to_path_buf()
    } else {
        Path::new(&config.cache.path).to_path_buf()
    };

    match action {
        CacheAction::Build { path, force } => {
            let build_path = Path::new(&path).canonicalize()?;
            let loc = cache::locate(&build_path, &data_dir);

            if !force && loc.db_path.exists() {
                println!(
                    "{} {}",
                    style("↩ Cache already exists").yellow(),
                    style("(use --force to rebuild)").dim()
                );
                return Ok(0);
            }

            tracing::debug!("Building cache for: {}", loc.project);
            let pool = Cache::init(&loc.db_path)?;
            if force {
                Cache::from_pool(&loc.project, &pool)?.clear()?;
            }
            let handle = CacheHandle {
                pool,
                project: loc.project,
                refresh: force,
            };
            engine::analyze_tree(
                &build_path,
                config,
                &AnalysisRequest::default(),
                &CancelToken::new(),
                Some(&handle),
            )?;
            Cache::from_pool(&handle.project, &handle.pool)?.vacuum()?;

            println!(
                "✔ {} {}",
                style("Cache built:").green(),
                style(loc.db_path.display()).white().bold()
            );
            Ok(0)
        }

        CacheAction::Status { path } => {
            let status_path = Path::new(&path).canonicalize()?;
            let loc = cache::locate(&status_path, &data_dir);

            println!("{}", style("Cache status").blue().bold().underlined());
            println!(
                "  {:14} {}",
                style("Project"),
                style(&loc.project).white().bold()
            );
            println!(
                "  {:14} {}",
                style("Cache path"),
                style(loc.db_path.display()).underlined()
            );
            println!(
                "  {:14} {}",
                style("Exists"),
                style(loc.db_path.exists()).bold()
            );

            if loc.db_path.exists() {
                let meta = fs::metadata(&loc.db_path)?;
                let size = ByteSize::b(meta.len());
                let mtime: DateTime<Local> = meta.modified()?.into();
                println!("  {:14} {}", style("Size"), size);
                println!(
                    "  {:14} {}",
                    style("Modified"),
                    mtime.format("%Y-%m-%d %H:%M:%S")
                );

                let pool = Cache::init(&loc.db_path)?;
                let conn = Cache::from_pool(&loc.project, &pool)?;
                println!(
                    "  {:14} {}",
                    style("Cached files"),
                    style(conn.get_files()?.len()).bold()
                );
            }
            Ok(0)
        }

        CacheAction::Clean { project, all } => {
            if all {
                println!("{}", style("Cleaning all caches...").cyan().bold());
                if data_dir.exists() {
                    for entry in fs::read_dir(&data_dir)? {
                        let path = entry?.path();
                        if path.extension().and_then(|s| s.to_str()) == Some("sqlite") {
                            fs::remove_file(&path)?;
                        }
                    }
                }
                println!("{}", style("✔ All caches cleaned").green().bold());
            } else if let Some(proj_name) = project {
                // the db name carries a path digest, so match by slug prefix
                let prefix = format!("{}-", cache::slug(&proj_name));
                let mut removed = 0usize;
                if data_dir.exists() {
                    for entry in fs::read_dir(&data_dir)? {
                        let path = entry?.path();
                        let matches = path
                            .file_name()
                            .and_then(|s| s.to_str())
                            .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".sqlite"));
                        if matches {
                            fs::remove_file(&path)?;
                            removed += 1;
                        }
                    }
                }
                if removed > 0 {
                    println!(
                        "{} {}",
                        style("✔ Cleaned cache for").green(),
                        style(&proj_name).white().bold()
                    );
                } else {
                    println!(
                        "{} {}",
                        style("✖ No cache found for").red(),
                        style(&proj_name).white().bold()
                    );
                }
            } else {
                let current_dir = env::current_dir()?;
                let loc = cache::locate(&current_dir, &data_dir);

                if loc.db_path.exists() {
                    fs::remove_file(&loc.db_path)?;
                    println!(
                        "{} {}",
                        style("✔ Cleaned cache for").green(),
                        style(&loc.project).white().bold()
                    );
                } else {
                    println!(
                        "{} {}",
                        style("✖ No cache found for current project").red(),
                        style(&loc.project).white().bold()
                    );
                }
            }
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.output.quiet = true;
        config.performance.worker_threads = Some(1);
        config
    }

    #[test]
    fn build_creates_db_and_registers_files() {
        let td = tempfile::tempdir().unwrap();
        let project_dir = td.path().join("proj");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("app.js"), "function f() { return 1; }").unwrap();
        let data_dir = td.path().join("data");
        fs::create_dir(&data_dir).unwrap();

        let mut config = test_config();
        config.cache.path = data_dir.to_string_lossy().into_owned();

        let code = handle(
            CacheAction::Build {
                path: project_dir.to_string_lossy().into_owned(),
                force: true,
            },
            td.path(),
            &config,
        )
        .unwrap();
        assert_eq!(code, 0);

        let loc = cache::locate(&project_dir.canonicalize().unwrap(), &data_dir);
        assert!(loc.db_path.is_file(), "SQLite file must exist");

        let pool = Cache::init(&loc.db_path).unwrap();
        let conn = Cache::from_pool(&loc.project, &pool).unwrap();
        assert_eq!(conn.get_files().unwrap().len(), 1);
    }

    #[test]
    fn clean_matches_databases_by_slug_prefix() {
        let td = tempfile::tempdir().unwrap();
        let data_dir = td.path().join("data");
        fs::create_dir(&data_dir).unwrap();
        fs::write(data_dir.join("proj-0123abcd.sqlite"), b"stub").unwrap();
        fs::write(data_dir.join("proj-89ef4567.sqlite"), b"stub").unwrap();
        fs::write(data_dir.join("other-00000000.sqlite"), b"stub").unwrap();

        let mut config = test_config();
        config.cache.path = data_dir.to_string_lossy().into_owned();

        handle(
            CacheAction::Clean {
                project: Some("proj".into()),
                all: false,
            },
            td.path(),
            &config,
        )
        .unwrap();
        assert!(!data_dir.join("proj-0123abcd.sqlite").exists());
        assert!(!data_dir.join("proj-89ef4567.sqlite").exists());
        assert!(data_dir.join("other-00000000.sqlite").exists());
    }
}
