use crate::detect::Severity;
use crate::report::SortBy;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Console,
    Json,
}

#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "A static analyzer reporting complexity and dead code for JavaScript/TypeScript")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run complexity and dead-code analysis with a health summary
    Analyze {
        /// Path to analyze (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Minimum severity to report
        #[arg(long, value_enum)]
        min_severity: Option<Severity>,

        /// Low complexity threshold
        #[arg(long)]
        low_threshold: Option<u32>,

        /// Medium complexity threshold
        #[arg(long)]
        medium_threshold: Option<u32>,

        /// Sort order for the listing
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,

        /// Skip the findings cache, analyze everything directly
        #[arg(long)]
        no_cache: bool,

        /// Re-analyze every file and refresh the cache
        #[arg(long)]
        rebuild_cache: bool,
    },

    /// Report cyclomatic complexity per function
    Complexity {
        /// Path to analyze (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Only list functions at or above this complexity (0 = no bound)
        #[arg(long, default_value_t = 0)]
        min: u32,

        /// Only list functions at or below this complexity (0 = no bound)
        #[arg(long, default_value_t = 0)]
        max: u32,

        /// Low complexity threshold
        #[arg(long)]
        low_threshold: Option<u32>,

        /// Medium complexity threshold
        #[arg(long)]
        medium_threshold: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Sort order for the listing
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,

        /// Skip the findings cache, analyze everything directly
        #[arg(long)]
        no_cache: bool,

        /// Re-analyze every file and refresh the cache
        #[arg(long)]
        rebuild_cache: bool,
    },

    /// Report dead code per function
    DeadCode {
        /// Path to analyze (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Minimum severity to report
        #[arg(long, value_enum)]
        min_severity: Option<Severity>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Sort order for the listing
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,

        /// Skip the findings cache, analyze everything directly
        #[arg(long)]
        no_cache: bool,

        /// Re-analyze every file and refresh the cache
        #[arg(long)]
        rebuild_cache: bool,
    },

    /// Manage the per-project findings caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Build or refresh the cache for a project
    Build {
        /// Path to the project (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Force a full rebuild
        #[arg(short, long)]
        force: bool,
    },

    /// Show cache status and statistics
    Status {
        /// Project path to check
        #[arg(default_value = ".")]
        path: String,
    },

    /// Remove a project's cache
    Clean {
        /// Project name or path to clean
        project: Option<String>,

        /// Clean all projects
        #[arg(long)]
        all: bool,
    },
}
