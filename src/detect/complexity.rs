use crate::ast::Location;
use crate::cfg::Cfg;
use crate::detect::{Category, Finding, Severity};

/// Complexity bucket relative to the request thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Low,
    Medium,
    High,
}

pub fn bucket(complexity: u32, low: u32, medium: u32) -> Bucket {
    if complexity <= low {
        Bucket::Low
    } else if complexity <= medium {
        Bucket::Medium
    } else {
        Bucket::High
    }
}

fn severity_for(bucket: Bucket) -> Severity {
    match bucket {
        Bucket::Low => Severity::Info,
        Bucket::Medium => Severity::Warning,
        Bucket::High => Severity::Critical,
    }
}

/// One finding per function; severity derives from the thresholds.
pub fn detect(function: &str, loc: Location, cfg: &Cfg, low: u32, medium: u32) -> (u32, Finding) {
    let complexity = cfg.cyclomatic();
    let finding = Finding {
        category: Category::Complexity,
        function: function.to_owned(),
        loc,
        severity: severity_for(bucket(complexity, low, medium)),
        message: format!("cyclomatic complexity is {complexity}"),
    };
    (complexity, finding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_snippet;
    use crate::cfg::build_cfg;
    use crate::lang::Lang;

    fn complexity_of(src: &str) -> u32 {
        let root = parse_snippet(src, Lang::Js);
        let func = root
            .preorder()
            .map(|(n, _)| n)
            .find(|n| n.is_function())
            .unwrap();
        let cfg = build_cfg(func);
        let (c, _) = detect("f", func.loc, &cfg, 9, 19);
        c
    }

    #[test]
    fn inserting_an_if_increases_complexity_by_one() {
        let base = complexity_of("function f(x) { g(); return x; }");
        let with_if = complexity_of("function f(x) { if (x) {} g(); return x; }");
        assert_eq!(with_if, base + 1);
    }

    #[test]
    fn inserting_a_logical_and_increases_complexity_by_one() {
        let base = complexity_of("function f(a, b) { if (a) { g(); } }");
        let with_and = complexity_of("function f(a, b) { if (a && b) { g(); } }");
        assert_eq!(with_and, base + 1);
    }

    #[test]
    fn severity_follows_the_thresholds() {
        assert_eq!(bucket(1, 9, 19), Bucket::Low);
        assert_eq!(bucket(9, 9, 19), Bucket::Low);
        assert_eq!(bucket(10, 9, 19), Bucket::Medium);
        assert_eq!(bucket(19, 9, 19), Bucket::Medium);
        assert_eq!(bucket(20, 9, 19), Bucket::High);
        assert_eq!(severity_for(bucket(20, 9, 19)), Severity::Critical);
    }

    #[test]
    fn finding_message_reports_the_value() {
        let root = parse_snippet("function f() { return 1; }", Lang::Js);
        let func = root
            .preorder()
            .map(|(n, _)| n)
            .find(|n| n.is_function())
            .unwrap();
        let cfg = build_cfg(func);
        let (c, finding) = detect("f", func.loc, &cfg, 9, 19);
        assert_eq!(c, 1);
        assert_eq!(finding.message, "cyclomatic complexity is 1");
        assert_eq!(finding.severity, Severity::Info);
    }
}
