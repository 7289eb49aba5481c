pub mod analyze;
pub mod cache;

use crate::analyze::AnalysisRequest;
use crate::cli::Commands;
use crate::config::Config;
use crate::detect::Passes;
use crate::errors::ArgusResult;
use crate::report::SortBy;
use std::path::Path;

fn base_request(config: &Config) -> AnalysisRequest {
    let mut passes = Passes::empty();
    if config.analysis.enable_complexity {
        passes |= Passes::COMPLEXITY;
    }
    if config.analysis.enable_dead_code {
        passes |= Passes::DEAD_CODE;
    }
    AnalysisRequest {
        min_complexity: config.analysis.min_complexity,
        max_complexity: config.analysis.max_complexity,
        low_threshold: config.analysis.low_threshold,
        medium_threshold: config.analysis.medium_threshold,
        min_severity: config.analysis.min_severity,
        passes,
        sort_by: config.analysis.sort_by.unwrap_or(SortBy::Complexity),
    }
}

pub fn handle_command(
    command: Commands,
    database_dir: &Path,
    config: &mut Config,
) -> ArgusResult<i32> {
    match command {
        Commands::Analyze {
            path,
            format,
            min_severity,
            low_threshold,
            medium_threshold,
            sort_by,
            no_cache,
            rebuild_cache,
        } => {
            let mut req = base_request(config);
            if let Some(sev) = min_severity {
                req.min_severity = sev;
            }
            if let Some(low) = low_threshold {
                req.low_threshold = low;
            }
            if let Some(medium) = medium_threshold {
                req.medium_threshold = medium;
            }
            if let Some(sort) = sort_by {
                req.sort_by = sort;
            }
            analyze::handle(
                analyze::RunOptions {
                    path: &path,
                    format,
                    no_cache,
                    rebuild_cache,
                },
                req,
                database_dir,
                config,
            )
        }

        Commands::Complexity {
            path,
            min,
            max,
            low_threshold,
            medium_threshold,
            format,
            sort_by,
            no_cache,
            rebuild_cache,
        } => {
            let mut req = base_request(config);
            req.passes = Passes::COMPLEXITY;
            if min > 0 {
                req.min_complexity = min;
            }
            if max > 0 {
                req.max_complexity = max;
            }
            if let Some(low) = low_threshold {
                req.low_threshold = low;
            }
            if let Some(medium) = medium_threshold {
                req.medium_threshold = medium;
            }
            req.sort_by = sort_by
                .or(config.analysis.sort_by)
                .unwrap_or(SortBy::Complexity);
            analyze::handle(
                analyze::RunOptions {
                    path: &path,
                    format,
                    no_cache,
                    rebuild_cache,
                },
                req,
                database_dir,
                config,
            )
        }

        Commands::DeadCode {
            path,
            min_severity,
            format,
            sort_by,
            no_cache,
            rebuild_cache,
        } => {
            let mut req = base_request(config);
            req.passes = Passes::DEAD_CODE;
            req.min_severity = min_severity.unwrap_or(config.analysis.min_severity);
            req.sort_by = sort_by
                .or(config.analysis.sort_by)
                .unwrap_or(SortBy::Severity);
            analyze::handle(
                analyze::RunOptions {
                    path: &path,
                    format,
                    no_cache,
                    rebuild_cache,
                },
                req,
                database_dir,
                config,
            )
        }

        Commands::Cache { action } => cache::handle(action, database_dir, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Severity;

    #[test]
    fn base_request_tracks_config_toggles() {
        let mut config = Config::default();
        config.analysis.enable_dead_code = false;
        config.analysis.min_severity = Severity::Warning;
        let req = base_request(&config);
        assert_eq!(req.passes, Passes::COMPLEXITY);
        assert_eq!(req.min_severity, Severity::Warning);
        assert_eq!(req.low_threshold, 9);
        assert_eq!(req.medium_threshold, 19);
    }
}
