use crate::ast::{Node, Tag, lower_tree};
use crate::cfg::build_cfg;
use crate::detect::{Passes, Severity, SeverityCounts, complexity, dead_code, filter_by_severity};
use crate::engine::CancelToken;
use crate::errors::{ArgusError, ArgusResult};
use crate::lang::Lang;
use crate::report::{FileAnalysis, FileReport, FunctionFindings, SortBy};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

thread_local! {
    static PARSER: RefCell<tree_sitter::Parser> = RefCell::new(tree_sitter::Parser::new());
}

/// Everything a run needs to know about thresholds and filters.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Functions below this complexity are not listed (0 = no filter).
    pub min_complexity: u32,
    /// Functions above this complexity are not listed (0 = no filter).
    pub max_complexity: u32,
    pub low_threshold: u32,
    pub medium_threshold: u32,
    pub min_severity: Severity,
    pub passes: Passes,
    pub sort_by: SortBy,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        AnalysisRequest {
            min_complexity: 0,
            max_complexity: 0,
            low_threshold: 9,
            medium_threshold: 19,
            min_severity: Severity::Info,
            passes: Passes::all(),
            sort_by: SortBy::Complexity,
        }
    }
}

impl AnalysisRequest {
    pub fn validate(&self) -> ArgusResult<()> {
        if self.medium_threshold <= self.low_threshold {
            return Err(ArgusError::InvalidInput(format!(
                "medium threshold ({}) must exceed low threshold ({})",
                self.medium_threshold, self.low_threshold
            )));
        }
        Ok(())
    }
}

/// One function-like node discovered in a file.
struct FnRecord<'a> {
    name: String,
    node: &'a Node,
}

fn synthesized_name(node: &Node) -> String {
    format!("<anonymous>@{}:{}", node.loc.line, node.loc.col)
}

fn discover_into<'a>(n: &'a Node, class: Option<&str>, out: &mut Vec<FnRecord<'a>>) {
    let name = match n.tag() {
        Tag::FunctionDecl | Tag::FunctionExpr | Tag::Arrow => {
            Some(n.name.clone().unwrap_or_else(|| synthesized_name(n)))
        }
        Tag::Method => {
            let method = n.name.clone().unwrap_or_else(|| synthesized_name(n));
            Some(match class {
                Some(c) => format!("{c}.{method}"),
                None => method,
            })
        }
        _ => None,
    };
    if let Some(name) = name {
        out.push(FnRecord { name, node: n });
    }

    let class = match n.tag() {
        Tag::Class => n.name.as_deref(),
        _ => class,
    };
    for child in n.children() {
        discover_into(child, class, out);
    }
}

/// Single traversal; collisions within the file get `@line:col` appended.
fn discover_functions(root: &Node) -> Vec<FnRecord<'_>> {
    let mut records = Vec::new();
    discover_into(root, None, &mut records);
    records.sort_by_key(|r| r.node.loc.key());

    let mut tally: HashMap<&str, usize> = HashMap::new();
    for r in &records {
        *tally.entry(r.name.as_str()).or_default() += 1;
    }
    let duplicated: Vec<String> = tally
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name.to_owned())
        .collect();
    for r in &mut records {
        if duplicated.contains(&r.name) {
            let loc = r.node.loc;
            r.name = format!("{}@{}:{}", r.name, loc.line, loc.col);
        }
    }
    records
}

/// Analyze one file's bytes into raw, unfiltered findings. `Ok(None)` means
/// the file is not an analyzable source (unknown extension, binary blob).
pub fn analyze_source(
    path: &Path,
    bytes: &[u8],
    cancel: &CancelToken,
) -> ArgusResult<Option<FileAnalysis>> {
    let Some(lang) = Lang::from_path(path) else {
        return Ok(None);
    };

    // Fast binary-file guard (skip if >1% NULs)
    if bytes.iter().filter(|b| **b == 0).count() * 100 / bytes.len().max(1) > 1 {
        return Ok(None);
    }

    tracing::debug!("analyzing {} as {}", path.display(), lang.slug());
    let tree = PARSER.with(|cell| -> ArgusResult<tree_sitter::Tree> {
        let mut parser = cell.borrow_mut();
        parser.set_language(&lang.grammar())?;
        parser
            .parse(bytes, None)
            .ok_or_else(|| ArgusError::ParseFailed(path.to_path_buf()))
    })?;
    if tree.root_node().has_error() {
        return Err(ArgusError::ParseFailed(path.to_path_buf()));
    }
    if cancel.is_cancelled() {
        return Err(ArgusError::Cancelled);
    }

    let ast = lower_tree(&tree, bytes, lang);
    let mut functions = Vec::new();
    for record in discover_functions(&ast) {
        let cfg = build_cfg(record.node);
        if !cfg.is_well_formed() {
            return Err(ArgusError::AnalysisFailed(format!(
                "malformed control-flow graph for {} in {}",
                record.name,
                path.display()
            )));
        }

        let (complexity_value, complexity_finding) = complexity::detect(
            &record.name,
            record.node.loc,
            &cfg,
            AnalysisRequest::default().low_threshold,
            AnalysisRequest::default().medium_threshold,
        );
        let mut findings = vec![complexity_finding];
        if let Some(body) = record.node.function_body() {
            findings.extend(dead_code::detect(&record.name, body, &cfg));
        }

        functions.push(FunctionFindings {
            name: record.name,
            line: record.node.loc.line,
            col: record.node.loc.col,
            complexity: complexity_value,
            counts: SeverityCounts::tally(&findings),
            findings,
        });
        if cancel.is_cancelled() {
            return Err(ArgusError::Cancelled);
        }
    }

    Ok(Some(FileAnalysis {
        path: path.to_path_buf(),
        functions,
    }))
}

pub fn analyze_file(
    path: &Path,
    cancel: &CancelToken,
) -> ArgusResult<Option<FileAnalysis>> {
    let bytes = std::fs::read(path)?;
    analyze_source(path, &bytes, cancel)
}

/// Apply the request's pass set, thresholds and severity floor to a raw
/// analysis. Filters run at this stage (and again on cache loads) so cached
/// and fresh runs agree byte for byte.
pub fn apply_request(raw: &FileAnalysis, req: &AnalysisRequest) -> FileReport {
    let complexity_on = req.passes.contains(Passes::COMPLEXITY);
    let dead_code_on = req.passes.contains(Passes::DEAD_CODE);

    let mut complexities = Vec::new();
    let mut functions = Vec::new();
    for func in &raw.functions {
        if complexity_on {
            complexities.push(func.complexity);
        }

        let mut findings: Vec<_> = func
            .findings
            .iter()
            .filter(|f| {
                if f.category.is_dead_code() {
                    dead_code_on
                } else {
                    complexity_on
                        && (req.min_complexity == 0 || func.complexity >= req.min_complexity)
                        && (req.max_complexity == 0 || func.complexity <= req.max_complexity)
                }
            })
            .cloned()
            .collect();
        // re-derive severity from the run's thresholds, not the defaults
        // the raw analysis was produced with
        for finding in &mut findings {
            if finding.category == crate::detect::Category::Complexity {
                let bucket =
                    complexity::bucket(func.complexity, req.low_threshold, req.medium_threshold);
                finding.severity = match bucket {
                    complexity::Bucket::Low => Severity::Info,
                    complexity::Bucket::Medium => Severity::Warning,
                    complexity::Bucket::High => Severity::Critical,
                };
            }
        }
        filter_by_severity(&mut findings, req.min_severity);
        if !findings.is_empty() {
            let counts = SeverityCounts::tally(&findings);
            functions.push(FunctionFindings {
                name: func.name.clone(),
                line: func.line,
                col: func.col,
                complexity: if complexity_on { func.complexity } else { 0 },
                counts,
                findings,
            });
        }
    }

    FileReport {
        path: raw.path.clone(),
        functions,
        complexities,
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Category;

    fn analyze(src: &str) -> FileAnalysis {
        analyze_source(Path::new("test.js"), src.as_bytes(), &CancelToken::new())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn linear_function_is_clean() {
        let raw = analyze("function a() { return 1; }");
        assert_eq!(raw.functions.len(), 1);
        assert_eq!(raw.functions[0].name, "a");
        assert_eq!(raw.functions[0].complexity, 1);
        // only the complexity finding itself
        assert_eq!(raw.functions[0].findings.len(), 1);
        assert_eq!(raw.functions[0].findings[0].category, Category::Complexity);
    }

    #[test]
    fn methods_are_named_class_dot_method() {
        let raw = analyze("class Box { get() { return this.v; } }");
        assert_eq!(raw.functions[0].name, "Box.get");
    }

    #[test]
    fn anonymous_forms_synthesize_a_name() {
        let raw = analyze("const f = (x) => x + 1;\nconst g = function () { return 2; };");
        let names: Vec<&str> = raw.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names[0].starts_with("<anonymous>@1:"));
        assert!(names[1].starts_with("<anonymous>@2:"));
    }

    #[test]
    fn colliding_names_get_position_suffixes() {
        let raw = analyze("function f() { return 1; }\nfunction f() { return 2; }");
        let names: Vec<&str> = raw.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["f@1:0", "f@2:0"]);
    }

    #[test]
    fn unknown_extension_is_skipped() {
        let out =
            analyze_source(Path::new("notes.txt"), b"just text", &CancelToken::new()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn binary_content_is_skipped() {
        let mut bytes = vec![0u8; 2048];
        for i in (0..bytes.len()).step_by(3) {
            bytes[i] = b'a';
        }
        let out = analyze_source(Path::new("junk.js"), &bytes, &CancelToken::new()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn garbage_source_is_a_parse_failure() {
        let out = analyze_source(
            Path::new("broken.js"),
            b"function ( {{{{ ]",
            &CancelToken::new(),
        );
        assert!(matches!(out, Err(ArgusError::ParseFailed(_))));
    }

    #[test]
    fn cancellation_short_circuits() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = analyze_source(
            Path::new("a.js"),
            b"function a() { return 1; }",
            &cancel,
        );
        assert!(matches!(out, Err(ArgusError::Cancelled)));
    }

    #[test]
    fn severity_floor_drops_info_findings() {
        let raw = analyze("function d() { const x = 1; return 2; }");
        let req = AnalysisRequest {
            min_severity: Severity::Warning,
            ..AnalysisRequest::default()
        };
        let filtered = apply_request(&raw, &req);
        assert!(filtered.functions.is_empty());
        // the function still counts toward aggregation
        assert_eq!(filtered.complexities.len(), 1);
    }

    #[test]
    fn disabled_complexity_zeroes_its_contribution() {
        let raw = analyze("function d() { const x = 1; return 2; }");
        let req = AnalysisRequest {
            passes: Passes::DEAD_CODE,
            ..AnalysisRequest::default()
        };
        let filtered = apply_request(&raw, &req);
        assert!(filtered.complexities.is_empty());
        assert_eq!(filtered.functions.len(), 1);
        assert!(filtered.functions[0]
            .findings
            .iter()
            .all(|f| f.category.is_dead_code()));
    }

    #[test]
    fn threshold_validation_rejects_inverted_ranges() {
        let req = AnalysisRequest {
            low_threshold: 20,
            medium_threshold: 10,
            ..AnalysisRequest::default()
        };
        assert!(matches!(
            req.validate(),
            Err(ArgusError::InvalidInput(_))
        ));
    }

    #[test]
    fn try_finally_keeps_finalizer_reachable() {
        let raw =
            analyze("function e() { try { return 1; } catch (_) {} finally { cleanup(); } }");
        let func = &raw.functions[0];
        assert_eq!(func.complexity, 2);
        let cats: Vec<Category> = func.findings.iter().map(|f| f.category).collect();
        assert_eq!(cats, vec![Category::Complexity, Category::EmptyBlock]);
    }
}
