pub mod complexity;
pub mod dead_code;

use crate::ast::Location;
use bitflags::bitflags;
use console::style;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Detector passes enabled for a run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Passes: u8 {
        const COMPLEXITY = 0b0000_0001;
        const DEAD_CODE  = 0b0000_0010;
    }
}

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Severity::Critical => style("CRITICAL").red().bold().to_string(),
            Severity::Warning => style("WARNING").yellow().bold().to_string(),
            Severity::Info => style("INFO").cyan().bold().to_string(),
        };
        f.write_str(&s)
    }
}

impl Severity {
    /// Textual value stored in SQLite.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            _ => Ok(Severity::Info),
        }
    }
}

/// Finding category: the complexity signal, or one of the dead-code reasons.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Complexity,
    UnreachableAfterReturn,
    UnreachableAfterThrow,
    UnreachableAfterBreak,
    UnreachableAfterContinue,
    UnreachableBranch,
    UnusedVariable,
    EmptyBlock,
    UnreachableCode,
}

impl Category {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Category::Complexity => "complexity",
            Category::UnreachableAfterReturn => "unreachable_after_return",
            Category::UnreachableAfterThrow => "unreachable_after_throw",
            Category::UnreachableAfterBreak => "unreachable_after_break",
            Category::UnreachableAfterContinue => "unreachable_after_continue",
            Category::UnreachableBranch => "unreachable_branch",
            Category::UnusedVariable => "unused_variable",
            Category::EmptyBlock => "empty_block",
            Category::UnreachableCode => "unreachable_code",
        }
    }

    pub fn is_dead_code(self) -> bool {
        !matches!(self, Category::Complexity)
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "complexity" => Ok(Category::Complexity),
            "unreachable_after_return" => Ok(Category::UnreachableAfterReturn),
            "unreachable_after_throw" => Ok(Category::UnreachableAfterThrow),
            "unreachable_after_break" => Ok(Category::UnreachableAfterBreak),
            "unreachable_after_continue" => Ok(Category::UnreachableAfterContinue),
            "unreachable_branch" => Ok(Category::UnreachableBranch),
            "unused_variable" => Ok(Category::UnusedVariable),
            "empty_block" => Ok(Category::EmptyBlock),
            "unreachable_code" => Ok(Category::UnreachableCode),
            _ => Err(()),
        }
    }
}

/// One reported signal, detached from the AST so the tree can be dropped
/// once its file finishes.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub category: Category,
    pub function: String,
    #[serde(flatten)]
    pub loc: Location,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = SeverityCounts::default();
        for f in findings {
            match f.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }
}

/// Drop findings below the requested severity floor.
pub fn filter_by_severity(findings: &mut Vec<Finding>, min: Severity) {
    findings.retain(|f| f.severity >= min);
}

#[test]
fn severity_orders_info_below_warning_below_critical() {
    assert!(Severity::Info < Severity::Warning);
    assert!(Severity::Warning < Severity::Critical);
}

#[test]
fn severity_filter_is_idempotent() {
    let mk = |sev| Finding {
        category: Category::EmptyBlock,
        function: "f".into(),
        loc: Location {
            line: 1,
            col: 0,
            end_line: 1,
            end_col: 1,
        },
        severity: sev,
        message: String::new(),
    };
    let mut findings = vec![mk(Severity::Info), mk(Severity::Warning), mk(Severity::Critical)];
    filter_by_severity(&mut findings, Severity::Warning);
    assert_eq!(findings.len(), 2);
    let snapshot: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
    filter_by_severity(&mut findings, Severity::Warning);
    let again: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
    assert_eq!(snapshot, again);
}

#[test]
fn category_round_trips_through_db_string() {
    for cat in [
        Category::Complexity,
        Category::UnreachableAfterReturn,
        Category::UnreachableAfterThrow,
        Category::UnreachableAfterBreak,
        Category::UnreachableAfterContinue,
        Category::UnreachableBranch,
        Category::UnusedVariable,
        Category::EmptyBlock,
        Category::UnreachableCode,
    ] {
        assert_eq!(cat.as_db_str().parse::<Category>().unwrap(), cat);
    }
}
