use crate::ast::{DeclKind, Lit, Location, Node, NodeKind, Tag};
use crate::cfg::{Cfg, TerminatorKind};
use crate::detect::{Category, Finding, Severity};
use std::collections::HashSet;

/// Run the five dead-code passes over one function. Findings come out in
/// pass order, each pass sorted by (line, col).
pub fn detect(function: &str, body: &Node, cfg: &Cfg) -> Vec<Finding> {
    let dead_spans = dead_statement_spans(cfg);
    let mut findings = Vec::new();

    push_sorted(&mut findings, pass_after_terminator(function, cfg));
    push_sorted(&mut findings, pass_unreachable_blocks(function, cfg));
    push_sorted(&mut findings, pass_constant_branches(function, body));
    push_sorted(&mut findings, pass_unused_variables(function, body, &dead_spans));
    push_sorted(&mut findings, pass_empty_blocks(function, body));
    findings
}

fn push_sorted(out: &mut Vec<Finding>, mut pass: Vec<Finding>) {
    pass.sort_by_key(|f| (f.loc.line, f.loc.col));
    out.append(&mut pass);
}

/// Pre-order walk of the function's own statements; nested functions run
/// their own detectors.
fn walk_own<'a>(n: &'a Node, parent: Option<Tag>, f: &mut impl FnMut(&'a Node, Option<Tag>)) {
    f(n, parent);
    let tag = n.tag();
    for child in n.children() {
        if !child.is_function() {
            walk_own(child, Some(tag), f);
        }
    }
}

/// Span covering an ordered statement run.
fn span_of(stmts: &[&Node]) -> Location {
    let first = stmts.first().expect("empty statement run");
    let last = stmts.last().expect("empty statement run");
    Location {
        line: first.loc.line,
        col: first.loc.col,
        end_line: last.loc.end_line,
        end_col: last.loc.end_col,
    }
}

fn contains(outer: Location, inner: Location) -> bool {
    (outer.line, outer.col) <= (inner.line, inner.col)
        && (inner.end_line, inner.end_col) <= (outer.end_line, outer.end_col)
}

/// Spans of everything the CFG knows to be unreachable; declarations in
/// there are not re-reported as unused.
fn dead_statement_spans(cfg: &Cfg) -> Vec<Location> {
    let block_spans = cfg
        .unreachable
        .iter()
        .flat_map(|&id| cfg.graph[id].stmts.iter().map(|s| s.loc));
    let run_spans = cfg
        .orphan_runs
        .iter()
        .map(|run| span_of(&run.stmts));
    block_spans.chain(run_spans).collect()
}

// ---- pass 1: unreachable after terminator --------------------------------

fn pass_after_terminator(function: &str, cfg: &Cfg) -> Vec<Finding> {
    cfg.orphan_runs
        .iter()
        .map(|run| {
            let (category, what) = match run.kind {
                TerminatorKind::Return => (Category::UnreachableAfterReturn, "return"),
                TerminatorKind::Throw => (Category::UnreachableAfterThrow, "throw"),
                TerminatorKind::Break => (Category::UnreachableAfterBreak, "break"),
                TerminatorKind::Continue => (Category::UnreachableAfterContinue, "continue"),
            };
            Finding {
                category,
                function: function.to_owned(),
                loc: span_of(&run.stmts),
                severity: Severity::Warning,
                message: format!("unreachable code after {what}"),
            }
        })
        .collect()
}

// ---- pass 2: unreachable blocks ------------------------------------------

fn pass_unreachable_blocks(function: &str, cfg: &Cfg) -> Vec<Finding> {
    let mut out: Vec<Finding> = cfg
        .unreachable
        .iter()
        .filter_map(|&id| {
            let block = &cfg.graph[id];
            if block.suppressed {
                return None;
            }
            Some(Finding {
                category: Category::UnreachableCode,
                function: function.to_owned(),
                loc: span_of(&block.stmts),
                severity: Severity::Warning,
                message: "unreachable code".to_owned(),
            })
        })
        .collect();
    for stmt in &cfg.invalid_jumps {
        out.push(Finding {
            category: Category::UnreachableCode,
            function: function.to_owned(),
            loc: stmt.loc,
            severity: Severity::Warning,
            message: "label does not resolve to an enclosing statement".to_owned(),
        });
    }
    out
}

// ---- pass 3: constant branches -------------------------------------------

fn truthiness(value: &Lit) -> Option<bool> {
    match value {
        Lit::Bool(b) => Some(*b),
        Lit::Number(n) => Some(*n != 0.0),
        Lit::Str(s) => Some(!s.is_empty()),
        Lit::Null | Lit::Undefined => Some(false),
        Lit::Other => None,
    }
}

/// Statically decide a branch test: a literal, or a comparison of two
/// same-typed literals. No constant propagation beyond that.
fn const_truth(test: &Node) -> Option<bool> {
    match &test.kind {
        NodeKind::Literal { value, .. } => truthiness(value),
        NodeKind::Binary { op, left, right } => {
            let (NodeKind::Literal { value: lhs, .. }, NodeKind::Literal { value: rhs, .. }) =
                (&left.kind, &right.kind)
            else {
                return None;
            };
            match (lhs, rhs) {
                (Lit::Number(a), Lit::Number(b)) => compare(op, a.partial_cmp(b)?),
                (Lit::Str(a), Lit::Str(b)) => compare(op, a.cmp(b)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn compare(op: &str, ord: std::cmp::Ordering) -> Option<bool> {
    use std::cmp::Ordering::*;
    Some(match op {
        "==" | "===" => ord == Equal,
        "!=" | "!==" => ord != Equal,
        "<" => ord == Less,
        ">" => ord == Greater,
        "<=" => ord != Greater,
        ">=" => ord != Less,
        _ => return None,
    })
}

fn pass_constant_branches(function: &str, body: &Node) -> Vec<Finding> {
    let mut out = Vec::new();
    walk_own(body, None, &mut |n, _| {
        let NodeKind::If {
            test,
            consequent,
            alternate,
        } = &n.kind
        else {
            return;
        };
        let Some(verdict) = const_truth(test) else {
            return;
        };
        let (dead, always) = if verdict {
            let Some(alt) = alternate else { return };
            // point at the clause body, not the `else` keyword
            let dead = match &alt.kind {
                NodeKind::ElseClause { body } => &**body,
                _ => &**alt,
            };
            (dead, "true")
        } else {
            (&**consequent, "false")
        };
        out.push(Finding {
            category: Category::UnreachableBranch,
            function: function.to_owned(),
            loc: dead.loc,
            severity: Severity::Warning,
            message: format!("branch is never taken (condition is always {always})"),
        });
    });
    out
}

// ---- pass 4: unused variables --------------------------------------------

fn collect_pattern_bindings<'a>(pattern: &'a Node, out: &mut Vec<(&'a str, Location)>) {
    if let NodeKind::Identifier = &pattern.kind
        && let Some(name) = &pattern.name
    {
        out.push((name.as_str(), pattern.loc));
    }
    for child in pattern.children() {
        collect_pattern_bindings(child, out);
    }
}

/// Identifier references, skipping the binding positions of declarators.
fn collect_uses<'a>(n: &'a Node, uses: &mut HashSet<&'a str>) {
    match &n.kind {
        NodeKind::Declarator { init, .. } => {
            if let Some(init) = init {
                collect_uses(init, uses);
            }
        }
        NodeKind::Identifier => {
            if let Some(name) = &n.name {
                uses.insert(name);
            }
        }
        _ => {
            for child in n.children() {
                collect_uses(child, uses);
            }
        }
    }
}

fn pass_unused_variables(function: &str, body: &Node, dead_spans: &[Location]) -> Vec<Finding> {
    let mut bindings: Vec<(&str, Location)> = Vec::new();
    walk_own(body, None, &mut |n, _| {
        let NodeKind::VarDecl {
            decl_kind,
            declarators,
        } = &n.kind
        else {
            return;
        };
        if !matches!(decl_kind, DeclKind::Let | DeclKind::Const) {
            return;
        }
        for d in declarators {
            let NodeKind::Declarator { pattern, .. } = &d.kind else {
                continue;
            };
            if let Some(name) = &d.name {
                bindings.push((name.as_str(), d.loc));
            } else if let Some(pattern) = pattern {
                collect_pattern_bindings(pattern, &mut bindings);
            }
        }
    });

    let mut uses = HashSet::new();
    collect_uses(body, &mut uses);

    bindings
        .into_iter()
        .filter(|(name, loc)| {
            !name.starts_with('_')
                && !uses.contains(name)
                && !dead_spans.iter().any(|span| contains(*span, *loc))
        })
        .map(|(name, loc)| Finding {
            category: Category::UnusedVariable,
            function: function.to_owned(),
            loc,
            severity: Severity::Info,
            message: format!("unused variable '{name}'"),
        })
        .collect()
}

// ---- pass 5: empty blocks ------------------------------------------------

fn pass_empty_blocks(function: &str, body: &Node) -> Vec<Finding> {
    const OWNERS: &[Tag] = &[
        Tag::If,
        Tag::ElseClause,
        Tag::While,
        Tag::DoWhile,
        Tag::For,
        Tag::ForIn,
        Tag::ForOf,
        Tag::Catch,
    ];
    let mut out = Vec::new();
    let mut report = |n: &Node| {
        out.push(Finding {
            category: Category::EmptyBlock,
            function: function.to_owned(),
            loc: n.loc,
            severity: Severity::Info,
            message: "empty block".to_owned(),
        });
    };
    // the function's own body counts
    if let NodeKind::StatementBlock { body: stmts } = &body.kind
        && stmts.is_empty()
    {
        report(body);
    }
    walk_own(body, None, &mut |n, parent| {
        let NodeKind::StatementBlock { body: stmts } = &n.kind else {
            return;
        };
        if stmts.is_empty()
            && parent.is_some_and(|p| OWNERS.contains(&p))
        {
            report(n);
        }
    });
    out
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_snippet;
    use crate::cfg::build_cfg;
    use crate::lang::Lang;

    fn findings_for(src: &str) -> Vec<Finding> {
        let root = parse_snippet(src, Lang::Js);
        let func = root
            .preorder()
            .map(|(n, _)| n)
            .find(|n| n.is_function())
            .expect("no function in snippet");
        let cfg = build_cfg(func);
        detect("f", func.function_body().unwrap(), &cfg)
    }

    #[test]
    fn code_after_return_is_one_warning_and_not_unused() {
        let findings = findings_for("function b() { return 1; const x = 2; }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::UnreachableAfterReturn);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].loc.line, 1);
    }

    #[test]
    fn code_after_throw_break_continue_gets_the_matching_reason() {
        let after_throw = findings_for("function f() { throw new Error('x'); g(); }");
        assert_eq!(after_throw[0].category, Category::UnreachableAfterThrow);

        let after_break =
            findings_for("function f() { while (g()) { break; h(); } }");
        assert_eq!(after_break[0].category, Category::UnreachableAfterBreak);

        let after_continue =
            findings_for("function f() { while (g()) { continue; h(); } }");
        assert_eq!(after_continue[0].category, Category::UnreachableAfterContinue);
    }

    #[test]
    fn constant_false_branch_is_reported_on_the_consequent() {
        let findings = findings_for("function c() { if (false) { doA(); } else { doB(); } }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::UnreachableBranch);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].message.contains("always false"));
    }

    #[test]
    fn constant_true_condition_kills_the_else_branch() {
        let findings = findings_for("function c() { if (1 < 2) { doA(); } else { doB(); } }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::UnreachableBranch);
        assert!(findings[0].message.contains("always true"));
    }

    #[test]
    fn non_constant_tests_are_left_alone() {
        let findings = findings_for("function c(x) { if (x === 1) { doA(); } }");
        assert!(findings.is_empty());
    }

    #[test]
    fn unused_const_is_info_and_underscore_exempt() {
        let findings = findings_for("function d() { const x = 1; const _y = 2; return 2; }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::UnusedVariable);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].message.contains("'x'"));
    }

    #[test]
    fn var_declarations_are_not_reported() {
        let findings = findings_for("function d() { var x = 1; return 2; }");
        assert!(findings.is_empty());
    }

    #[test]
    fn destructuring_reports_each_unused_binding() {
        let findings =
            findings_for("function d(o) { const { a, b } = o; return a; }");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("'b'"));
    }

    #[test]
    fn closure_capture_counts_as_a_use() {
        let findings =
            findings_for("function d() { const x = 1; return function () { return x; }; }");
        assert!(findings.is_empty());
    }

    #[test]
    fn empty_catch_body_is_reported() {
        let findings =
            findings_for("function e() { try { return 1; } catch (_) {} finally { cleanup(); } }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::EmptyBlock);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn empty_if_and_loop_bodies_are_reported() {
        let findings = findings_for("function f(x) { if (x) {} else {} while (x) {} }");
        let empties = findings
            .iter()
            .filter(|f| f.category == Category::EmptyBlock)
            .count();
        assert_eq!(empties, 3);
    }

    #[test]
    fn passes_emit_in_order_then_by_location() {
        let findings = findings_for(
            "function f(x) { const dead = 1; if (false) { doA(); } return 1; g(); }",
        );
        let cats: Vec<Category> = findings.iter().map(|f| f.category).collect();
        assert_eq!(
            cats,
            vec![
                Category::UnreachableAfterReturn,
                Category::UnreachableBranch,
                Category::UnusedVariable,
            ]
        );
    }

    #[test]
    fn both_arms_returning_make_the_join_unreachable_code() {
        let findings =
            findings_for("function f(x) { if (x) { return 1; } else { return 2; } g(); }");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::UnreachableCode);
    }
}
