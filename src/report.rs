use crate::detect::{Finding, Severity, SeverityCounts};
use console::style;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Complexity,
    Name,
    File,
    Severity,
}

/// Per-function result. Produced unfiltered by the analyzer, then trimmed
/// by the request filters before aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionFindings {
    pub name: String,
    pub line: usize,
    pub col: usize,
    pub complexity: u32,
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
}

/// Raw per-file analysis: every function, every finding, no filters. This
/// is what the findings cache stores.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub functions: Vec<FunctionFindings>,
}

/// A file after request filtering: the retained functions plus the
/// complexity of every analyzed function, which keeps contributing to the
/// aggregate even when all of its findings were filtered away.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub functions: Vec<FunctionFindings>,
    pub complexities: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFindings {
    pub path: String,
    pub functions: Vec<FunctionFindings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_files: usize,
    pub analyzed_files: usize,
    /// Files the walk turned away (not source, or over the size limit).
    pub skipped_files: usize,
    pub total_functions: usize,
    pub average_complexity: f64,
    pub low_complexity: usize,
    pub medium_complexity: usize,
    pub high_complexity: usize,
    pub dead_code: SeverityCounts,
    pub health_score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub files: Vec<FileFindings>,
    pub diagnostics: Vec<Diagnostic>,
    pub generated_at: String,
    pub version: String,
}

/// Single-threaded aggregator fed by the worker pool.
pub struct ReportBuilder {
    low_threshold: u32,
    medium_threshold: u32,
    total_files: usize,
    analyzed_files: usize,
    skipped_files: usize,
    complexity_sum: u64,
    total_functions: usize,
    low: usize,
    medium: usize,
    high: usize,
    dead_code: SeverityCounts,
    files: Vec<(PathBuf, Vec<FunctionFindings>)>,
    diagnostics: Vec<Diagnostic>,
}

impl ReportBuilder {
    pub fn new(low_threshold: u32, medium_threshold: u32) -> Self {
        ReportBuilder {
            low_threshold,
            medium_threshold,
            total_files: 0,
            analyzed_files: 0,
            skipped_files: 0,
            complexity_sum: 0,
            total_functions: 0,
            low: 0,
            medium: 0,
            high: 0,
            dead_code: SeverityCounts::default(),
            files: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn add_file(&mut self, file: FileReport) {
        self.total_files += 1;
        self.analyzed_files += 1;
        for &complexity in &file.complexities {
            self.total_functions += 1;
            self.complexity_sum += u64::from(complexity);
            match crate::detect::complexity::bucket(
                complexity,
                self.low_threshold,
                self.medium_threshold,
            ) {
                crate::detect::complexity::Bucket::Low => self.low += 1,
                crate::detect::complexity::Bucket::Medium => self.medium += 1,
                crate::detect::complexity::Bucket::High => self.high += 1,
            }
        }
        for func in &file.functions {
            let dead: Vec<&Finding> = func
                .findings
                .iter()
                .filter(|f| f.category.is_dead_code())
                .collect();
            for f in dead {
                match f.severity {
                    Severity::Critical => self.dead_code.critical += 1,
                    Severity::Warning => self.dead_code.warning += 1,
                    Severity::Info => self.dead_code.info += 1,
                }
            }
        }
        if !file.functions.is_empty() {
            self.files.push((file.path, file.functions));
        }
    }

    pub fn add_skipped(&mut self, path: PathBuf, reason: String) {
        self.total_files += 1;
        self.diagnostics.push(Diagnostic {
            path: path.to_string_lossy().into_owned(),
            reason,
        });
    }

    /// Files the walk filtered out before analysis ever saw them.
    pub fn add_walk_skips(&mut self, count: usize) {
        self.skipped_files += count;
    }

    pub fn finish(mut self, sort_by: SortBy) -> Report {
        let average = if self.total_functions == 0 {
            0.0
        } else {
            let mean = self.complexity_sum as f64 / self.total_functions as f64;
            (mean * 10.0).round() / 10.0
        };
        let health_score = health_score(
            self.high,
            self.medium,
            self.dead_code.critical,
            self.dead_code.warning,
        );

        // files always sort by path so parallel workers cannot perturb the
        // output; the requested ordering applies to the function listing
        self.files.sort_by(|a, b| a.0.cmp(&b.0));
        self.diagnostics.sort_by(|a, b| a.path.cmp(&b.path));
        let files = self
            .files
            .into_iter()
            .map(|(path, mut functions)| {
                sort_functions(&mut functions, sort_by);
                FileFindings {
                    path: path.to_string_lossy().into_owned(),
                    functions,
                }
            })
            .collect();

        Report {
            summary: Summary {
                total_files: self.total_files,
                analyzed_files: self.analyzed_files,
                skipped_files: self.skipped_files,
                total_functions: self.total_functions,
                average_complexity: average,
                low_complexity: self.low,
                medium_complexity: self.medium,
                high_complexity: self.high,
                dead_code: self.dead_code,
                health_score,
            },
            files,
            diagnostics: self.diagnostics,
            generated_at: chrono::Utc::now().to_rfc3339(),
            version: VERSION.to_owned(),
        }
    }
}

fn sort_functions(functions: &mut [FunctionFindings], sort_by: SortBy) {
    match sort_by {
        SortBy::Complexity => {
            functions.sort_by(|a, b| {
                b.complexity
                    .cmp(&a.complexity)
                    .then_with(|| (a.line, a.col).cmp(&(b.line, b.col)))
            });
        }
        SortBy::Name => functions.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| (a.line, a.col).cmp(&(b.line, b.col)))
        }),
        // file ordering is already fixed; keep source order inside
        SortBy::File => functions.sort_by_key(|f| (f.line, f.col)),
        SortBy::Severity => functions.sort_by(|a, b| {
            (b.counts.critical, b.counts.warning, b.counts.info)
                .cmp(&(a.counts.critical, a.counts.warning, a.counts.info))
                .then_with(|| (a.line, a.col).cmp(&(b.line, b.col)))
        }),
    }
}

/// 0..=100, penalizing heavy functions and dead code.
pub fn health_score(high: usize, medium: usize, critical_dead: usize, warning_dead: usize) -> u32 {
    let score = 100i64 - 2 * high as i64 - medium as i64 - 3 * critical_dead as i64
        - warning_dead as i64;
    score.clamp(0, 100) as u32
}

/// Quality-gate verdict: non-zero when anything critical (or any high
/// complexity bucket entry) survived the filters.
pub fn gate_exit_code(report: &Report) -> i32 {
    let any_critical = report
        .files
        .iter()
        .flat_map(|f| &f.functions)
        .any(|f| f.counts.critical > 0);
    if any_critical || report.summary.high_complexity > 0 {
        1
    } else {
        0
    }
}

// -------------------------------------------------------------------------
// Rendering
// -------------------------------------------------------------------------

pub fn render_json(report: &Report) -> crate::errors::ArgusResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn print_text(report: &Report, quiet: bool) {
    for diag in &report.diagnostics {
        println!(
            "{} {}: {}",
            style("skipped:").yellow().bold(),
            style(&diag.path).underlined(),
            diag.reason
        );
    }
    if !report.diagnostics.is_empty() {
        println!();
    }

    for file in &report.files {
        println!("{}", style(&file.path).blue().underlined());
        for func in &file.functions {
            for finding in &func.findings {
                println!(
                    "  {:>4}:{:<4} [{}]  {} {}",
                    finding.loc.line,
                    finding.loc.col,
                    finding.severity,
                    finding.message,
                    style(format!("({})", func.name)).dim()
                );
            }
        }
        println!();
    }

    if quiet {
        return;
    }

    let s = &report.summary;
    println!("{}", style("Summary").blue().bold().underlined());
    println!(
        "  {:<22} {} analyzed / {} total",
        "files",
        style(s.analyzed_files).bold(),
        s.total_files
    );
    if s.skipped_files > 0 {
        println!("  {:<22} {}", "skipped by the walk", s.skipped_files);
    }
    println!("  {:<22} {}", "functions", style(s.total_functions).bold());
    println!(
        "  {:<22} {}",
        "average complexity",
        style(format!("{:.1}", s.average_complexity)).bold()
    );
    println!(
        "  {:<22} {} low / {} medium / {} high",
        "complexity buckets", s.low_complexity, s.medium_complexity, s.high_complexity
    );
    println!(
        "  {:<22} {} critical / {} warning / {} info",
        "dead code", s.dead_code.critical, s.dead_code.warning, s.dead_code.info
    );
    let health = if s.health_score >= 80 {
        style(s.health_score).green().bold()
    } else if s.health_score >= 50 {
        style(s.health_score).yellow().bold()
    } else {
        style(s.health_score).red().bold()
    };
    println!("  {:<22} {}/100", "health score", health);
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Location;
    use crate::detect::Category;

    fn finding(category: Category, severity: Severity, line: usize) -> Finding {
        Finding {
            category,
            function: "f".into(),
            loc: Location {
                line,
                col: 0,
                end_line: line,
                end_col: 1,
            },
            severity,
            message: String::new(),
        }
    }

    fn file_report(path: &str, complexity: u32, findings: Vec<Finding>) -> FileReport {
        let counts = SeverityCounts::tally(&findings);
        FileReport {
            path: PathBuf::from(path),
            functions: if findings.is_empty() {
                Vec::new()
            } else {
                vec![FunctionFindings {
                    name: "f".into(),
                    line: 1,
                    col: 0,
                    complexity,
                    counts,
                    findings,
                }]
            },
            complexities: vec![complexity],
        }
    }

    #[test]
    fn health_score_is_clamped_to_bounds() {
        assert_eq!(health_score(0, 0, 0, 0), 100);
        assert_eq!(health_score(100, 0, 0, 0), 0);
        assert_eq!(health_score(1, 1, 1, 1), 93);
    }

    #[test]
    fn clean_report_scores_one_hundred() {
        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report("a.js", 1, vec![]));
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(report.summary.health_score, 100);
        assert_eq!(report.summary.total_functions, 1);
        assert!(report.files.is_empty());
        assert_eq!(gate_exit_code(&report), 0);
    }

    #[test]
    fn average_complexity_rounds_to_one_decimal() {
        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report("a.js", 1, vec![]));
        builder.add_file(file_report("b.js", 2, vec![]));
        builder.add_file(file_report("c.js", 2, vec![]));
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(report.summary.average_complexity, 1.7);
    }

    #[test]
    fn files_sort_by_path_regardless_of_arrival_order() {
        let mut builder = ReportBuilder::new(9, 19);
        let f = vec![finding(Category::EmptyBlock, Severity::Info, 1)];
        builder.add_file(file_report("z.js", 1, f.clone()));
        builder.add_file(file_report("a.js", 1, f));
        let report = builder.finish(SortBy::Complexity);
        let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.js", "z.js"]);
    }

    #[test]
    fn parse_failures_count_in_total_but_not_analyzed() {
        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report("a.js", 1, vec![]));
        builder.add_skipped(PathBuf::from("bad.js"), "failed to parse".into());
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(report.summary.total_files, 2);
        assert_eq!(report.summary.analyzed_files, 1);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn gate_trips_on_high_complexity_or_critical_findings() {
        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report("a.js", 25, vec![]));
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(report.summary.high_complexity, 1);
        assert_eq!(gate_exit_code(&report), 1);

        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report(
            "a.js",
            1,
            vec![finding(Category::Complexity, Severity::Critical, 1)],
        ));
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(gate_exit_code(&report), 1);
    }

    #[test]
    fn dead_code_totals_ignore_complexity_findings() {
        let mut builder = ReportBuilder::new(9, 19);
        builder.add_file(file_report(
            "a.js",
            3,
            vec![
                finding(Category::Complexity, Severity::Info, 1),
                finding(Category::UnusedVariable, Severity::Info, 2),
                finding(Category::UnreachableCode, Severity::Warning, 3),
            ],
        ));
        let report = builder.finish(SortBy::Complexity);
        assert_eq!(
            report.summary.dead_code,
            SeverityCounts {
                critical: 0,
                warning: 1,
                info: 1
            }
        );
        // 100 - 1 warning
        assert_eq!(report.summary.health_score, 99);
    }

    #[test]
    fn sort_by_complexity_is_descending() {
        let mut functions = vec![
            FunctionFindings {
                name: "a".into(),
                line: 1,
                col: 0,
                complexity: 2,
                counts: SeverityCounts::default(),
                findings: vec![],
            },
            FunctionFindings {
                name: "b".into(),
                line: 2,
                col: 0,
                complexity: 7,
                counts: SeverityCounts::default(),
                findings: vec![],
            },
        ];
        sort_functions(&mut functions, SortBy::Complexity);
        assert_eq!(functions[0].name, "b");
    }

    #[test]
    fn json_reports_are_deterministic_after_timestamp_normalization() {
        let build = || {
            let mut builder = ReportBuilder::new(9, 19);
            builder.add_file(file_report(
                "a.js",
                2,
                vec![finding(Category::UnusedVariable, Severity::Info, 4)],
            ));
            let mut report = builder.finish(SortBy::Complexity);
            report.generated_at = String::new();
            render_json(&report).unwrap()
        };
        assert_eq!(build(), build());
    }
}
