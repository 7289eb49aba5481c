use crate::lang::Lang;
use phf::{Map, phf_map};

/// Discriminant for every AST node kind. Closed set; concrete-syntax kinds
/// with no entry in the tables below lower to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Program,
    FunctionDecl,
    FunctionExpr,
    Arrow,
    Method,
    Class,
    VarDecl,
    Declarator,
    If,
    ElseClause,
    Switch,
    SwitchCase,
    For,
    ForIn,
    ForOf,
    While,
    DoWhile,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    StatementBlock,
    Labeled,
    ExprStmt,
    Empty,
    Call,
    New,
    Member,
    Binary,
    Logical,
    Unary,
    Update,
    Conditional,
    Assignment,
    Identifier,
    Literal,
    Import,
    Export,
    Jsx,
    TsInterface,
    TsTypeAlias,
    TsEnum,
    TsTypeAnnotation,
    Unknown,
}

/// Kinds shared by the JavaScript, TSX and TypeScript grammars.
static BASE_KINDS: Map<&'static str, Tag> = phf_map! {
    // structure
    "program"                        => Tag::Program,
    "statement_block"                => Tag::StatementBlock,
    "class_declaration"              => Tag::Class,
    "class"                          => Tag::Class,

    // callables
    "function_declaration"           => Tag::FunctionDecl,
    "generator_function_declaration" => Tag::FunctionDecl,
    "function_expression"            => Tag::FunctionExpr,
    "generator_function"             => Tag::FunctionExpr,
    "arrow_function"                 => Tag::Arrow,
    "method_definition"              => Tag::Method,

    // declarations
    "variable_declaration"           => Tag::VarDecl,
    "lexical_declaration"            => Tag::VarDecl,
    "variable_declarator"            => Tag::Declarator,

    // control flow
    "if_statement"                   => Tag::If,
    "else_clause"                    => Tag::ElseClause,
    "switch_statement"               => Tag::Switch,
    "switch_case"                    => Tag::SwitchCase,
    "switch_default"                 => Tag::SwitchCase,
    "for_statement"                  => Tag::For,
    "for_in_statement"               => Tag::ForIn,
    "while_statement"                => Tag::While,
    "do_statement"                   => Tag::DoWhile,
    "break_statement"                => Tag::Break,
    "continue_statement"             => Tag::Continue,
    "return_statement"               => Tag::Return,
    "throw_statement"                => Tag::Throw,
    "try_statement"                  => Tag::Try,
    "catch_clause"                   => Tag::Catch,
    "labeled_statement"              => Tag::Labeled,
    "expression_statement"           => Tag::ExprStmt,
    "empty_statement"                => Tag::Empty,

    // expressions
    "call_expression"                => Tag::Call,
    "new_expression"                 => Tag::New,
    "member_expression"              => Tag::Member,
    "subscript_expression"           => Tag::Member,
    "binary_expression"              => Tag::Binary,
    "unary_expression"               => Tag::Unary,
    "update_expression"              => Tag::Update,
    "ternary_expression"             => Tag::Conditional,
    "assignment_expression"          => Tag::Assignment,
    "augmented_assignment_expression" => Tag::Assignment,

    // atoms
    "identifier"                     => Tag::Identifier,
    "property_identifier"            => Tag::Identifier,
    "shorthand_property_identifier"  => Tag::Identifier,
    "shorthand_property_identifier_pattern" => Tag::Identifier,
    "statement_identifier"           => Tag::Identifier,
    "private_property_identifier"    => Tag::Identifier,
    "number"                         => Tag::Literal,
    "string"                         => Tag::Literal,
    "template_string"                => Tag::Literal,
    "true"                           => Tag::Literal,
    "false"                          => Tag::Literal,
    "null"                           => Tag::Literal,
    "undefined"                      => Tag::Literal,
    "regex"                          => Tag::Literal,

    // modules
    "import_statement"               => Tag::Import,
    "export_statement"               => Tag::Export,

    // jsx
    "jsx_element"                    => Tag::Jsx,
    "jsx_self_closing_element"       => Tag::Jsx,
    "jsx_fragment"                   => Tag::Jsx,
    "jsx_expression"                 => Tag::Jsx,
};

/// TypeScript-only kinds, consulted before the base table in TS modes.
static TS_KINDS: Map<&'static str, Tag> = phf_map! {
    "interface_declaration"  => Tag::TsInterface,
    "type_alias_declaration" => Tag::TsTypeAlias,
    "enum_declaration"       => Tag::TsEnum,
    "type_annotation"        => Tag::TsTypeAnnotation,
};

#[inline(always)]
pub fn lookup(lang: Lang, raw: &str) -> Tag {
    if lang.is_typescript()
        && let Some(tag) = TS_KINDS.get(raw)
    {
        return *tag;
    }
    BASE_KINDS.get(raw).copied().unwrap_or(Tag::Unknown)
}

#[test]
fn ts_kinds_only_resolve_in_typescript_mode() {
    assert_eq!(lookup(Lang::Ts, "interface_declaration"), Tag::TsInterface);
    assert_eq!(lookup(Lang::Js, "interface_declaration"), Tag::Unknown);
    assert_eq!(lookup(Lang::Tsx, "enum_declaration"), Tag::TsEnum);
}

#[test]
fn shared_kinds_resolve_in_every_mode() {
    for lang in [Lang::Js, Lang::Jsx, Lang::Ts, Lang::Tsx] {
        assert_eq!(lookup(lang, "if_statement"), Tag::If);
        assert_eq!(lookup(lang, "arrow_function"), Tag::Arrow);
        assert_eq!(lookup(lang, "no_such_kind"), Tag::Unknown);
    }
}
