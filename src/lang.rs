use std::path::Path;
use tree_sitter::Language;

/// Language mode selected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Js,
    Jsx,
    Ts,
    Tsx,
}

impl Lang {
    pub fn from_path(path: &Path) -> Option<Lang> {
        path.extension().and_then(|s| match s.to_str()? {
            "js" | "mjs" | "cjs" => Some(Lang::Js),
            "jsx" => Some(Lang::Jsx),
            "ts" | "mts" | "cts" => Some(Lang::Ts),
            "tsx" => Some(Lang::Tsx),
            _ => None,
        })
    }

    /// The tree-sitter grammar for this mode. The JS grammar accepts JSX,
    /// so `.jsx` shares it; `.tsx` needs the dedicated TSX grammar.
    pub fn grammar(self) -> Language {
        match self {
            Lang::Js | Lang::Jsx => Language::from(tree_sitter_javascript::LANGUAGE),
            Lang::Ts => Language::from(tree_sitter_typescript::LANGUAGE_TYPESCRIPT),
            Lang::Tsx => Language::from(tree_sitter_typescript::LANGUAGE_TSX),
        }
    }

    pub fn is_typescript(self) -> bool {
        matches!(self, Lang::Ts | Lang::Tsx)
    }

    pub fn slug(self) -> &'static str {
        match self {
            Lang::Js => "js",
            Lang::Jsx => "jsx",
            Lang::Ts => "ts",
            Lang::Tsx => "tsx",
        }
    }
}

#[test]
fn extension_selects_language_mode() {
    assert_eq!(Lang::from_path(Path::new("a.js")), Some(Lang::Js));
    assert_eq!(Lang::from_path(Path::new("a.mjs")), Some(Lang::Js));
    assert_eq!(Lang::from_path(Path::new("a.cjs")), Some(Lang::Js));
    assert_eq!(Lang::from_path(Path::new("a.jsx")), Some(Lang::Jsx));
    assert_eq!(Lang::from_path(Path::new("a.ts")), Some(Lang::Ts));
    assert_eq!(Lang::from_path(Path::new("a.mts")), Some(Lang::Ts));
    assert_eq!(Lang::from_path(Path::new("a.tsx")), Some(Lang::Tsx));
    assert_eq!(Lang::from_path(Path::new("a.rs")), None);
    assert_eq!(Lang::from_path(Path::new("noext")), None);
}

#[test]
fn typescript_modes_are_flagged() {
    assert!(Lang::Ts.is_typescript());
    assert!(Lang::Tsx.is_typescript());
    assert!(!Lang::Js.is_typescript());
    assert!(!Lang::Jsx.is_typescript());
}
