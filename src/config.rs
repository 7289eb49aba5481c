use crate::detect::Severity;
use crate::errors::ArgusResult;
use crate::report::SortBy;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static DEFAULT_CONFIG_TOML: &str = include_str!("../default-argus.conf");

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Complexity at or below this is the low bucket.
    pub low_threshold: u32,

    /// Complexity at or below this is the medium bucket; above it, high.
    pub medium_threshold: u32,

    /// The minimum severity level to report.
    pub min_severity: Severity,

    /// Only report functions at or above this complexity (0 = no filter).
    pub min_complexity: u32,

    /// Only report functions at or below this complexity (0 = no filter).
    pub max_complexity: u32,

    /// Whether the complexity pass runs.
    pub enable_complexity: bool,

    /// Whether the dead-code pass runs.
    pub enable_dead_code: bool,

    /// Listing order; `None` keeps each command's own default.
    pub sort_by: Option<SortBy>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            low_threshold: 9,
            medium_threshold: 19,
            min_severity: Severity::Info,
            min_complexity: 0,
            max_complexity: 0,
            enable_complexity: true,
            enable_dead_code: true,
            sort_by: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// The maximum file size to analyze, in megabytes.
    pub max_file_size_mb: Option<u64>,

    /// File extensions to exclude from the walk.
    pub excluded_extensions: Vec<String>,

    /// Directories to exclude from the walk.
    pub excluded_directories: Vec<String>,

    /// Excluded file patterns.
    pub excluded_files: Vec<String>,

    /// Whether to respect VCS ignore files (`.gitignore`, ..) or not.
    pub read_vcsignore: bool,

    /// Whether to require a `.git` directory to respect gitignore files.
    pub require_git_to_read_vcsignore: bool,

    /// Whether to follow symlinks or not.
    pub follow_symlinks: bool,

    /// Whether to scan hidden files or not.
    pub scan_hidden_files: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: None,
            excluded_extensions: vec![
                "min.js", "map", "jpg", "png", "gif", "mp4", "zip", "tar", "gz", "wasm",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            excluded_directories: vec![
                "node_modules",
                ".git",
                "dist",
                "build",
                "coverage",
                ".next",
                ".vscode",
                ".idea",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            excluded_files: Vec::new(),
            read_vcsignore: true,
            require_git_to_read_vcsignore: true,
            follow_symlinks: false,
            scan_hidden_files: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Custom directory for cache databases ("" = platform data dir).
    pub path: String,

    /// Whether analyze runs consult the findings cache by default.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// The default output format: "console" or "json".
    pub default_format: String,

    /// Whether to suppress the summary footer.
    pub quiet: bool,

    /// The maximum number of files to list.
    pub max_results: Option<u32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "console".into(),
            quiet: false,
            max_results: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Width of the analysis worker pool; `None` uses the default of 4.
    pub worker_threads: Option<usize>,

    /// The maximum number of paths sent through the channel in one batch.
    pub batch_size: usize,

    /// channel capacity = threads × this
    pub channel_multiplier: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            batch_size: 100usize,
            channel_multiplier: 4usize,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub scanner: ScannerConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> ArgusResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("argus.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("argus.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            println!(
                "{}: Loaded user config from: {}\n",
                style("note").green().bold(),
                style(user_config_path.display())
                    .underlined()
                    .white()
                    .bold()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> ArgusResult<()> {
    let example_path = config_dir.join("argus.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into default config, preserving defaults where the user
/// didn't supply new exclusions and overriding everything else.
fn merge_configs(mut default: Config, user: Config) -> Config {
    // --- AnalysisConfig ---
    default.analysis = user.analysis;

    // --- ScannerConfig ---
    default.scanner.max_file_size_mb = user.scanner.max_file_size_mb;
    default.scanner.read_vcsignore = user.scanner.read_vcsignore;
    default.scanner.require_git_to_read_vcsignore = user.scanner.require_git_to_read_vcsignore;
    default.scanner.follow_symlinks = user.scanner.follow_symlinks;
    default.scanner.scan_hidden_files = user.scanner.scan_hidden_files;

    // Merge exclusion lists (default ⊔ user), then sort & dedupe
    default
        .scanner
        .excluded_extensions
        .extend(user.scanner.excluded_extensions);
    default
        .scanner
        .excluded_directories
        .extend(user.scanner.excluded_directories);
    default
        .scanner
        .excluded_files
        .extend(user.scanner.excluded_files);
    default.scanner.excluded_extensions.sort_unstable();
    default.scanner.excluded_extensions.dedup();
    default.scanner.excluded_directories.sort_unstable();
    default.scanner.excluded_directories.dedup();
    default.scanner.excluded_files.sort_unstable();
    default.scanner.excluded_files.dedup();

    // --- CacheConfig ---
    default.cache = user.cache;

    // --- OutputConfig ---
    default.output = user.output;

    // --- PerformanceConfig ---
    default.performance = user.performance;

    default
}

#[test]
fn merge_configs_dedupes_and_keeps_order() {
    let mut default_cfg = Config::default();
    default_cfg.scanner.excluded_extensions = vec!["map".into(), "zip".into()];

    let mut user_cfg = Config::default();
    user_cfg.scanner.excluded_extensions = vec!["jpg".into(), "map".into()];

    let merged = merge_configs(default_cfg, user_cfg);

    assert!(merged.scanner.excluded_extensions.contains(&"jpg".to_string()));
    let maps = merged
        .scanner
        .excluded_extensions
        .iter()
        .filter(|e| *e == "map")
        .count();
    assert_eq!(maps, 1);
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [analysis]
        low_threshold = 5
        medium_threshold = 12
        min_severity = "warning"

        [output]
        quiet = true
    "#;
    fs::write(cfg_path.join("argus.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("argus.conf").is_file());

    assert_eq!(cfg.analysis.low_threshold, 5);
    assert_eq!(cfg.analysis.medium_threshold, 12);
    assert_eq!(cfg.analysis.min_severity, Severity::Warning);
    assert!(cfg.output.quiet);

    assert!(!cfg.scanner.follow_symlinks);
}
