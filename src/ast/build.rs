use crate::ast::{DeclKind, Lit, Location, LogicalOp, Node, NodeKind, Tag, lookup};
use crate::lang::Lang;
use tree_sitter::{Node as CstNode, Tree};

/// Lower a parsed tree-sitter tree into the AST model. Never fails on
/// unrecognized constructs; those become `Unknown` nodes with children.
pub fn lower_tree(tree: &Tree, src: &[u8], lang: Lang) -> Node {
    lower(tree.root_node(), src, lang).unwrap_or_else(|| Node {
        loc: loc_of(tree.root_node()),
        name: None,
        kind: NodeKind::Program { body: Vec::new() },
    })
}

fn loc_of(n: CstNode) -> Location {
    let sp = n.start_position();
    let ep = n.end_position();
    Location {
        line: sp.row + 1,
        col: sp.column,
        end_line: ep.row + 1,
        end_col: ep.column,
    }
}

fn text(n: CstNode, src: &[u8]) -> String {
    n.utf8_text(src).unwrap_or_default().to_owned()
}

fn named_children<'t>(n: CstNode<'t>) -> Vec<CstNode<'t>> {
    let mut cursor = n.walk();
    n.named_children(&mut cursor).collect()
}

/// True when `n` carries an (anonymous) token child with this kind.
fn has_token(n: CstNode, token: &str) -> bool {
    let mut cursor = n.walk();
    n.children(&mut cursor).any(|c| c.kind() == token)
}

fn lower_all(nodes: Vec<CstNode>, src: &[u8], lang: Lang) -> Vec<Node> {
    nodes.into_iter().filter_map(|c| lower(c, src, lang)).collect()
}

fn lower_box(n: Option<CstNode>, src: &[u8], lang: Lang) -> Option<Box<Node>> {
    n.and_then(|c| lower(c, src, lang)).map(Box::new)
}

/// Lower the body of a callable; missing bodies become an empty block so the
/// `Body` edge is always present.
fn lower_body(n: CstNode, src: &[u8], lang: Lang) -> Box<Node> {
    lower_box(n.child_by_field_name("body"), src, lang).unwrap_or_else(|| {
        Box::new(Node {
            loc: loc_of(n),
            name: None,
            kind: NodeKind::StatementBlock { body: Vec::new() },
        })
    })
}

fn lower_params(n: CstNode, src: &[u8], lang: Lang) -> Vec<Node> {
    if let Some(params) = n.child_by_field_name("parameters") {
        lower_all(named_children(params), src, lang)
    } else if let Some(param) = n.child_by_field_name("parameter") {
        // concise arrow: `x => ...`
        lower(param, src, lang).into_iter().collect()
    } else {
        Vec::new()
    }
}

/// The `condition` slot of for/if/while is wrapped by the grammar
/// (parenthesized_expression, or expression_statement inside `for(;;)`);
/// peel down to the expression itself.
fn unwrap_condition<'t>(n: CstNode<'t>) -> Option<CstNode<'t>> {
    match n.kind() {
        "parenthesized_expression" | "expression_statement" => {
            named_children(n).into_iter().next().and_then(unwrap_condition)
        }
        "empty_statement" => None,
        _ => Some(n),
    }
}

fn lower_condition(n: Option<CstNode>, src: &[u8], lang: Lang) -> Option<Box<Node>> {
    lower_box(n.and_then(unwrap_condition), src, lang)
}

fn decode_literal(n: CstNode, src: &[u8]) -> (String, Lit) {
    let raw = text(n, src);
    let value = match n.kind() {
        "number" => raw.parse::<f64>().map(Lit::Number).unwrap_or(Lit::Other),
        "string" => {
            // strip the surrounding quotes; escapes stay raw
            let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { "" };
            Lit::Str(inner.to_owned())
        }
        "true" => Lit::Bool(true),
        "false" => Lit::Bool(false),
        "null" => Lit::Null,
        "undefined" => Lit::Undefined,
        _ => Lit::Other,
    };
    (raw, value)
}

/// Specifier names come only from the import/export clause; the rest of the
/// statement (declarations, sources) is full of unrelated identifiers.
fn clause_specifiers(n: CstNode, src: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = n.walk();
    for c in n.children(&mut cursor) {
        if matches!(c.kind(), "import_clause" | "export_clause") {
            collect_specifier_names(c, src, &mut out);
        }
    }
    out
}

fn collect_specifier_names(n: CstNode, src: &[u8], out: &mut Vec<String>) {
    match n.kind() {
        "import_specifier" | "export_specifier" | "namespace_import" => {
            let name = n
                .child_by_field_name("alias")
                .or_else(|| n.child_by_field_name("name"))
                .map(|c| text(c, src));
            if let Some(name) = name {
                out.push(name);
            } else if let Some(id) = named_children(n).into_iter().next() {
                out.push(text(id, src));
            }
        }
        // default import binding sits directly under the clause
        "identifier" => out.push(text(n, src)),
        _ => {
            for c in named_children(n) {
                collect_specifier_names(c, src, out);
            }
        }
    }
}

fn lower(n: CstNode, src: &[u8], lang: Lang) -> Option<Node> {
    if n.kind() == "comment" {
        return None;
    }
    // transparent wrappers
    if n.kind() == "parenthesized_expression" {
        return named_children(n).into_iter().next().and_then(|c| lower(c, src, lang));
    }

    let loc = loc_of(n);
    let mut name = None;

    let kind = match lookup(lang, n.kind()) {
        Tag::Program => NodeKind::Program {
            body: lower_all(named_children(n), src, lang),
        },
        Tag::FunctionDecl | Tag::FunctionExpr => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            let payload_is_decl = lookup(lang, n.kind()) == Tag::FunctionDecl;
            let is_async = has_token(n, "async");
            let is_generator = n.kind().contains("generator") || has_token(n, "*");
            let params = lower_params(n, src, lang);
            let body = lower_body(n, src, lang);
            if payload_is_decl {
                NodeKind::FunctionDecl {
                    is_async,
                    is_generator,
                    params,
                    body,
                }
            } else {
                NodeKind::FunctionExpr {
                    is_async,
                    is_generator,
                    params,
                    body,
                }
            }
        }
        Tag::Arrow => NodeKind::Arrow {
            is_async: has_token(n, "async"),
            params: lower_params(n, src, lang),
            body: lower_body(n, src, lang),
        },
        Tag::Method => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            NodeKind::Method {
                is_async: has_token(n, "async"),
                is_generator: has_token(n, "*"),
                params: lower_params(n, src, lang),
                body: lower_body(n, src, lang),
            }
        }
        Tag::Class => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            let body = n
                .child_by_field_name("body")
                .map(|b| lower_all(named_children(b), src, lang))
                .unwrap_or_default();
            NodeKind::Class { body }
        }
        Tag::VarDecl => {
            let decl_kind = if n.kind() == "variable_declaration" {
                DeclKind::Var
            } else if has_token(n, "const") {
                DeclKind::Const
            } else {
                DeclKind::Let
            };
            NodeKind::VarDecl {
                decl_kind,
                declarators: lower_all(named_children(n), src, lang),
            }
        }
        Tag::Declarator => {
            let id = n.child_by_field_name("name");
            let pattern = match id {
                Some(c) if c.kind() == "identifier" => {
                    name = Some(text(c, src));
                    None
                }
                other => lower_box(other, src, lang),
            };
            NodeKind::Declarator {
                pattern,
                init: lower_box(n.child_by_field_name("value"), src, lang),
            }
        }
        Tag::If => NodeKind::If {
            test: lower_condition(n.child_by_field_name("condition"), src, lang)?,
            consequent: lower_box(n.child_by_field_name("consequence"), src, lang)?,
            alternate: lower_box(n.child_by_field_name("alternative"), src, lang),
        },
        Tag::ElseClause => NodeKind::ElseClause {
            body: lower_box(named_children(n).into_iter().next(), src, lang)?,
        },
        Tag::Switch => NodeKind::Switch {
            discriminant: lower_condition(n.child_by_field_name("value"), src, lang)?,
            cases: n
                .child_by_field_name("body")
                .map(|b| lower_all(named_children(b), src, lang))
                .unwrap_or_default(),
        },
        Tag::SwitchCase => {
            let test_cst = n.child_by_field_name("value");
            let test_id = test_cst.map(|c| c.id());
            let body = named_children(n)
                .into_iter()
                .filter(|c| Some(c.id()) != test_id)
                .filter_map(|c| lower(c, src, lang))
                .collect();
            NodeKind::SwitchCase {
                test: lower_box(test_cst, src, lang),
                body,
            }
        }
        Tag::For => {
            let init = n
                .child_by_field_name("initializer")
                .filter(|c| c.kind() != "empty_statement")
                .map(|c| match c.kind() {
                    "expression_statement" => named_children(c).into_iter().next().unwrap_or(c),
                    _ => c,
                });
            NodeKind::For {
                init: lower_box(init, src, lang),
                test: lower_condition(n.child_by_field_name("condition"), src, lang),
                update: lower_box(n.child_by_field_name("increment"), src, lang),
                body: lower_box(n.child_by_field_name("body"), src, lang)?,
            }
        }
        Tag::ForIn => {
            let left = lower_box(n.child_by_field_name("left"), src, lang)?;
            let right = lower_box(n.child_by_field_name("right"), src, lang)?;
            let body = lower_box(n.child_by_field_name("body"), src, lang)?;
            let is_of = n
                .child_by_field_name("operator")
                .map(|op| op.kind() == "of")
                .unwrap_or_else(|| has_token(n, "of"));
            if is_of {
                NodeKind::ForOf { left, right, body }
            } else {
                NodeKind::ForIn { left, right, body }
            }
        }
        Tag::While => NodeKind::While {
            test: lower_condition(n.child_by_field_name("condition"), src, lang)?,
            body: lower_box(n.child_by_field_name("body"), src, lang)?,
        },
        Tag::DoWhile => NodeKind::DoWhile {
            body: lower_box(n.child_by_field_name("body"), src, lang)?,
            test: lower_condition(n.child_by_field_name("condition"), src, lang)?,
        },
        Tag::Break => {
            name = n.child_by_field_name("label").map(|c| text(c, src));
            NodeKind::Break
        }
        Tag::Continue => {
            name = n.child_by_field_name("label").map(|c| text(c, src));
            NodeKind::Continue
        }
        Tag::Return => NodeKind::Return {
            argument: lower_box(named_children(n).into_iter().next(), src, lang),
        },
        Tag::Throw => NodeKind::Throw {
            argument: lower_box(named_children(n).into_iter().next(), src, lang)?,
        },
        Tag::Try => NodeKind::Try {
            block: lower_box(n.child_by_field_name("body"), src, lang)?,
            handler: lower_box(n.child_by_field_name("handler"), src, lang),
            finalizer: n
                .child_by_field_name("finalizer")
                .and_then(|f| f.child_by_field_name("body").or(Some(f)))
                .and_then(|c| lower(c, src, lang))
                .map(Box::new),
        },
        Tag::Catch => NodeKind::Catch {
            param: lower_box(n.child_by_field_name("parameter"), src, lang),
            body: lower_box(n.child_by_field_name("body"), src, lang)?,
        },
        Tag::StatementBlock => NodeKind::StatementBlock {
            body: lower_all(named_children(n), src, lang),
        },
        Tag::Labeled => {
            name = n.child_by_field_name("label").map(|c| text(c, src));
            NodeKind::Labeled {
                body: lower_box(n.child_by_field_name("body"), src, lang)?,
            }
        }
        Tag::ExprStmt => NodeKind::ExprStmt {
            expr: lower_box(named_children(n).into_iter().next(), src, lang)?,
        },
        Tag::Empty => NodeKind::Empty,
        Tag::Call => NodeKind::Call {
            callee: lower_box(n.child_by_field_name("function"), src, lang)?,
            arguments: n
                .child_by_field_name("arguments")
                .map(|a| lower_all(named_children(a), src, lang))
                .unwrap_or_default(),
            optional: has_token(n, "optional_chain"),
        },
        Tag::New => NodeKind::New {
            callee: lower_box(n.child_by_field_name("constructor"), src, lang)?,
            arguments: n
                .child_by_field_name("arguments")
                .map(|a| lower_all(named_children(a), src, lang))
                .unwrap_or_default(),
        },
        Tag::Member => NodeKind::Member {
            object: lower_box(n.child_by_field_name("object"), src, lang)?,
            property: lower_box(
                n.child_by_field_name("property")
                    .or_else(|| n.child_by_field_name("index")),
                src,
                lang,
            ),
            optional: has_token(n, "optional_chain"),
        },
        Tag::Binary => {
            let op = n
                .child_by_field_name("operator")
                .map(|c| c.kind().to_owned())
                .unwrap_or_default();
            let left = lower_box(n.child_by_field_name("left"), src, lang)?;
            let right = lower_box(n.child_by_field_name("right"), src, lang)?;
            match op.as_str() {
                "&&" => NodeKind::Logical {
                    op: LogicalOp::And,
                    left,
                    right,
                },
                "||" => NodeKind::Logical {
                    op: LogicalOp::Or,
                    left,
                    right,
                },
                "??" => NodeKind::Logical {
                    op: LogicalOp::Nullish,
                    left,
                    right,
                },
                _ => NodeKind::Binary { op, left, right },
            }
        }
        Tag::Unary => NodeKind::Unary {
            op: n
                .child_by_field_name("operator")
                .map(|c| c.kind().to_owned())
                .unwrap_or_default(),
            argument: lower_box(n.child_by_field_name("argument"), src, lang)?,
        },
        Tag::Update => NodeKind::Update {
            op: n
                .child_by_field_name("operator")
                .map(|c| c.kind().to_owned())
                .unwrap_or_default(),
            argument: lower_box(n.child_by_field_name("argument"), src, lang)?,
        },
        Tag::Conditional => NodeKind::Conditional {
            test: lower_box(n.child_by_field_name("condition"), src, lang)?,
            consequent: lower_box(n.child_by_field_name("consequence"), src, lang)?,
            alternate: lower_box(n.child_by_field_name("alternative"), src, lang)?,
        },
        Tag::Assignment => NodeKind::Assignment {
            op: n
                .child_by_field_name("operator")
                .map(|c| c.kind().to_owned())
                .unwrap_or_else(|| "=".to_owned()),
            left: lower_box(n.child_by_field_name("left"), src, lang)?,
            right: lower_box(n.child_by_field_name("right"), src, lang)?,
        },
        Tag::Identifier => {
            name = Some(text(n, src));
            NodeKind::Identifier
        }
        Tag::Literal => {
            let (raw, value) = decode_literal(n, src);
            NodeKind::Literal { raw, value }
        }
        Tag::Import => NodeKind::Import {
            source: n.child_by_field_name("source").map(|c| {
                let (_, v) = decode_literal(c, src);
                match v {
                    Lit::Str(s) => s,
                    _ => text(c, src),
                }
            }),
            specifiers: clause_specifiers(n, src),
            type_only: has_token(n, "type"),
        },
        Tag::Export => NodeKind::Export {
            source: n.child_by_field_name("source").map(|c| {
                let (_, v) = decode_literal(c, src);
                match v {
                    Lit::Str(s) => s,
                    _ => text(c, src),
                }
            }),
            specifiers: clause_specifiers(n, src),
            type_only: has_token(n, "type"),
            declaration: lower_box(n.child_by_field_name("declaration"), src, lang),
        },
        Tag::Jsx => NodeKind::Jsx {
            children: lower_all(named_children(n), src, lang),
        },
        Tag::TsInterface => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            NodeKind::TsInterface {
                members: n
                    .child_by_field_name("body")
                    .map(|b| lower_all(named_children(b), src, lang))
                    .unwrap_or_default(),
            }
        }
        Tag::TsTypeAlias => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            NodeKind::TsTypeAlias {
                children: lower_all(named_children(n), src, lang),
            }
        }
        Tag::TsEnum => {
            name = n.child_by_field_name("name").map(|c| text(c, src));
            NodeKind::TsEnum {
                members: n
                    .child_by_field_name("body")
                    .map(|b| lower_all(named_children(b), src, lang))
                    .unwrap_or_default(),
            }
        }
        Tag::TsTypeAnnotation => NodeKind::TsTypeAnnotation {
            children: lower_all(named_children(n), src, lang),
        },
        // ForOf and Logical are produced by the ForIn/Binary arms above and
        // never come out of `lookup` directly.
        Tag::ForOf | Tag::Logical | Tag::Unknown => NodeKind::Unknown {
            children: lower_all(named_children(n), src, lang),
        },
    };

    Some(Node { loc, name, kind })
}

// -------------------------------------------------------------------------
// Tests drive the real grammars end to end.
// -------------------------------------------------------------------------

#[cfg(test)]
pub fn parse_snippet(src: &str, lang: Lang) -> Node {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&lang.grammar()).unwrap();
    let tree = parser.parse(src, None).unwrap();
    lower_tree(&tree, src.as_bytes(), lang)
}

#[test]
fn lowers_function_declaration_with_semantic_edges() {
    let root = parse_snippet("function add(a, b) { return a + b; }", Lang::Js);
    let f = &root.children()[0];
    assert_eq!(f.tag(), Tag::FunctionDecl);
    assert_eq!(f.name.as_deref(), Some("add"));
    assert_eq!(f.param_count(), 2);
    let body = f.function_body().unwrap();
    assert_eq!(body.tag(), Tag::StatementBlock);
    assert_eq!(body.children()[0].tag(), Tag::Return);
}

#[test]
fn if_else_wires_test_consequent_alternate() {
    let root = parse_snippet("if (x) { a(); } else { b(); }", Lang::Js);
    let NodeKind::If {
        test,
        consequent,
        alternate,
    } = &root.children()[0].kind
    else {
        panic!("expected if");
    };
    assert_eq!(test.tag(), Tag::Identifier);
    assert_eq!(consequent.tag(), Tag::StatementBlock);
    assert_eq!(alternate.as_ref().unwrap().tag(), Tag::ElseClause);
}

#[test]
fn lexical_kinds_are_preserved() {
    let root = parse_snippet("var a = 1; let b = 2; const c = 3;", Lang::Js);
    let kinds: Vec<DeclKind> = root
        .children()
        .iter()
        .filter_map(|n| match &n.kind {
            NodeKind::VarDecl { decl_kind, .. } => Some(*decl_kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![DeclKind::Var, DeclKind::Let, DeclKind::Const]);
}

#[test]
fn logical_operators_become_logical_nodes() {
    let root = parse_snippet("const ok = (a && b) || (c ?? d);", Lang::Js);
    let logical: Vec<LogicalOp> = root
        .preorder()
        .filter_map(|(n, _)| match &n.kind {
            NodeKind::Logical { op, .. } => Some(*op),
            _ => None,
        })
        .collect();
    assert_eq!(logical.len(), 3);
    assert!(logical.contains(&LogicalOp::And));
    assert!(logical.contains(&LogicalOp::Or));
    assert!(logical.contains(&LogicalOp::Nullish));
}

#[test]
fn for_of_distinguished_from_for_in() {
    let root = parse_snippet("for (const x of xs) {} for (const k in o) {}", Lang::Js);
    let tags: Vec<Tag> = root.children().iter().map(|n| n.tag()).collect();
    assert_eq!(tags, vec![Tag::ForOf, Tag::ForIn]);
}

#[test]
fn typescript_interface_lowers_with_name() {
    let root = parse_snippet("interface Shape { area(): number; }", Lang::Ts);
    let first = &root.children()[0];
    assert_eq!(first.tag(), Tag::TsInterface);
    assert_eq!(first.name.as_deref(), Some("Shape"));
}

#[test]
fn unknown_constructs_keep_children() {
    // `with` is not in the tag tables; traversal must still descend into it
    let root = parse_snippet("with (o) { f(); }", Lang::Js);
    let first = &root.children()[0];
    assert_eq!(first.tag(), Tag::Unknown);
    assert!(!first.children().is_empty());
}

#[test]
fn locations_are_one_based_lines_zero_based_cols() {
    let root = parse_snippet("function f() {\n  return 1;\n}", Lang::Js);
    let f = &root.children()[0];
    assert_eq!(f.loc.line, 1);
    assert_eq!(f.loc.col, 0);
    assert_eq!(f.loc.end_line, 3);
}
