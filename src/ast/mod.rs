mod build;
mod kinds;

pub use build::lower_tree;
#[cfg(test)]
pub use build::parse_snippet;
pub use kinds::{Tag, lookup};

use serde::Serialize;

/// Source span of a node. 1-based lines, 0-based columns, end-line inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Location {
    pub fn key(&self) -> (usize, usize) {
        (self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,     // &&
    Or,      // ||
    Nullish, // ??
}

/// Literal value, decoded far enough for constant-branch evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Other,
}

/// One AST node: a shared header plus a tag-specific payload. Tag-specific
/// edges live inside each `NodeKind` variant so invalid combinations are
/// unrepresentable.
#[derive(Debug, Clone)]
pub struct Node {
    pub loc: Location,
    /// Declared identifier, or the label for break/continue/labeled statements.
    pub name: Option<String>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Program {
        body: Vec<Node>,
    },
    FunctionDecl {
        is_async: bool,
        is_generator: bool,
        params: Vec<Node>,
        body: Box<Node>,
    },
    FunctionExpr {
        is_async: bool,
        is_generator: bool,
        params: Vec<Node>,
        body: Box<Node>,
    },
    Arrow {
        is_async: bool,
        params: Vec<Node>,
        /// Statement block, or a bare expression for concise arrows.
        body: Box<Node>,
    },
    Method {
        is_async: bool,
        is_generator: bool,
        params: Vec<Node>,
        body: Box<Node>,
    },
    Class {
        body: Vec<Node>,
    },
    VarDecl {
        decl_kind: DeclKind,
        declarators: Vec<Node>,
    },
    /// `name` in the header for plain bindings; `pattern` for destructuring.
    Declarator {
        pattern: Option<Box<Node>>,
        init: Option<Box<Node>>,
    },
    If {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Option<Box<Node>>,
    },
    ElseClause {
        body: Box<Node>,
    },
    Switch {
        discriminant: Box<Node>,
        cases: Vec<Node>,
    },
    /// `test: None` is the default case.
    SwitchCase {
        test: Option<Box<Node>>,
        body: Vec<Node>,
    },
    For {
        init: Option<Box<Node>>,
        test: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Box<Node>,
    },
    ForIn {
        left: Box<Node>,
        right: Box<Node>,
        body: Box<Node>,
    },
    ForOf {
        left: Box<Node>,
        right: Box<Node>,
        body: Box<Node>,
    },
    While {
        test: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        test: Box<Node>,
    },
    Break,
    Continue,
    Return {
        argument: Option<Box<Node>>,
    },
    Throw {
        argument: Box<Node>,
    },
    Try {
        block: Box<Node>,
        handler: Option<Box<Node>>,
        finalizer: Option<Box<Node>>,
    },
    Catch {
        param: Option<Box<Node>>,
        body: Box<Node>,
    },
    StatementBlock {
        body: Vec<Node>,
    },
    Labeled {
        body: Box<Node>,
    },
    ExprStmt {
        expr: Box<Node>,
    },
    Empty,
    Call {
        callee: Box<Node>,
        arguments: Vec<Node>,
        optional: bool,
    },
    New {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    Member {
        object: Box<Node>,
        property: Option<Box<Node>>,
        optional: bool,
    },
    Binary {
        op: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: String,
        argument: Box<Node>,
    },
    Update {
        op: String,
        argument: Box<Node>,
    },
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    Assignment {
        op: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    Identifier,
    Literal {
        raw: String,
        value: Lit,
    },
    Import {
        source: Option<String>,
        specifiers: Vec<String>,
        type_only: bool,
    },
    Export {
        source: Option<String>,
        specifiers: Vec<String>,
        type_only: bool,
        declaration: Option<Box<Node>>,
    },
    Jsx {
        children: Vec<Node>,
    },
    TsInterface {
        members: Vec<Node>,
    },
    TsTypeAlias {
        children: Vec<Node>,
    },
    TsEnum {
        members: Vec<Node>,
    },
    TsTypeAnnotation {
        children: Vec<Node>,
    },
    /// Unrecognized construct; traversal never fails on these.
    Unknown {
        children: Vec<Node>,
    },
}

impl Node {
    pub fn tag(&self) -> Tag {
        match &self.kind {
            NodeKind::Program { .. } => Tag::Program,
            NodeKind::FunctionDecl { .. } => Tag::FunctionDecl,
            NodeKind::FunctionExpr { .. } => Tag::FunctionExpr,
            NodeKind::Arrow { .. } => Tag::Arrow,
            NodeKind::Method { .. } => Tag::Method,
            NodeKind::Class { .. } => Tag::Class,
            NodeKind::VarDecl { .. } => Tag::VarDecl,
            NodeKind::Declarator { .. } => Tag::Declarator,
            NodeKind::If { .. } => Tag::If,
            NodeKind::ElseClause { .. } => Tag::ElseClause,
            NodeKind::Switch { .. } => Tag::Switch,
            NodeKind::SwitchCase { .. } => Tag::SwitchCase,
            NodeKind::For { .. } => Tag::For,
            NodeKind::ForIn { .. } => Tag::ForIn,
            NodeKind::ForOf { .. } => Tag::ForOf,
            NodeKind::While { .. } => Tag::While,
            NodeKind::DoWhile { .. } => Tag::DoWhile,
            NodeKind::Break => Tag::Break,
            NodeKind::Continue => Tag::Continue,
            NodeKind::Return { .. } => Tag::Return,
            NodeKind::Throw { .. } => Tag::Throw,
            NodeKind::Try { .. } => Tag::Try,
            NodeKind::Catch { .. } => Tag::Catch,
            NodeKind::StatementBlock { .. } => Tag::StatementBlock,
            NodeKind::Labeled { .. } => Tag::Labeled,
            NodeKind::ExprStmt { .. } => Tag::ExprStmt,
            NodeKind::Empty => Tag::Empty,
            NodeKind::Call { .. } => Tag::Call,
            NodeKind::New { .. } => Tag::New,
            NodeKind::Member { .. } => Tag::Member,
            NodeKind::Binary { .. } => Tag::Binary,
            NodeKind::Logical { .. } => Tag::Logical,
            NodeKind::Unary { .. } => Tag::Unary,
            NodeKind::Update { .. } => Tag::Update,
            NodeKind::Conditional { .. } => Tag::Conditional,
            NodeKind::Assignment { .. } => Tag::Assignment,
            NodeKind::Identifier => Tag::Identifier,
            NodeKind::Literal { .. } => Tag::Literal,
            NodeKind::Import { .. } => Tag::Import,
            NodeKind::Export { .. } => Tag::Export,
            NodeKind::Jsx { .. } => Tag::Jsx,
            NodeKind::TsInterface { .. } => Tag::TsInterface,
            NodeKind::TsTypeAlias { .. } => Tag::TsTypeAlias,
            NodeKind::TsEnum { .. } => Tag::TsEnum,
            NodeKind::TsTypeAnnotation { .. } => Tag::TsTypeAnnotation,
            NodeKind::Unknown { .. } => Tag::Unknown,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self.tag(),
            Tag::FunctionDecl | Tag::FunctionExpr | Tag::Arrow | Tag::Method
        )
    }

    pub fn function_body(&self) -> Option<&Node> {
        match &self.kind {
            NodeKind::FunctionDecl { body, .. }
            | NodeKind::FunctionExpr { body, .. }
            | NodeKind::Arrow { body, .. }
            | NodeKind::Method { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn param_count(&self) -> usize {
        match &self.kind {
            NodeKind::FunctionDecl { params, .. }
            | NodeKind::FunctionExpr { params, .. }
            | NodeKind::Arrow { params, .. }
            | NodeKind::Method { params, .. } => params.len(),
            _ => 0,
        }
    }

    /// Children in semantic order, for the pre-order traversal.
    pub fn children(&self) -> Vec<&Node> {
        fn opt(n: &Option<Box<Node>>) -> Option<&Node> {
            n.as_deref()
        }
        match &self.kind {
            NodeKind::Program { body }
            | NodeKind::StatementBlock { body }
            | NodeKind::Class { body } => body.iter().collect(),
            NodeKind::FunctionDecl { params, body, .. }
            | NodeKind::FunctionExpr { params, body, .. }
            | NodeKind::Arrow { params, body, .. }
            | NodeKind::Method { params, body, .. } => {
                params.iter().chain(std::iter::once(&**body)).collect()
            }
            NodeKind::VarDecl { declarators, .. } => declarators.iter().collect(),
            NodeKind::Declarator { pattern, init } => {
                opt(pattern).into_iter().chain(opt(init)).collect()
            }
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => std::iter::once(&**test)
                .chain(std::iter::once(&**consequent))
                .chain(opt(alternate))
                .collect(),
            NodeKind::ElseClause { body } | NodeKind::Labeled { body } => vec![&**body],
            NodeKind::Switch {
                discriminant,
                cases,
            } => std::iter::once(&**discriminant).chain(cases.iter()).collect(),
            NodeKind::SwitchCase { test, body } => {
                opt(test).into_iter().chain(body.iter()).collect()
            }
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => opt(init)
                .into_iter()
                .chain(opt(test))
                .chain(opt(update))
                .chain(std::iter::once(&**body))
                .collect(),
            NodeKind::ForIn { left, right, body } | NodeKind::ForOf { left, right, body } => {
                vec![&**left, &**right, &**body]
            }
            NodeKind::While { test, body } => vec![&**test, &**body],
            NodeKind::DoWhile { body, test } => vec![&**body, &**test],
            NodeKind::Break | NodeKind::Continue | NodeKind::Empty => Vec::new(),
            NodeKind::Return { argument } => opt(argument).into_iter().collect(),
            NodeKind::Throw { argument } => vec![&**argument],
            NodeKind::Try {
                block,
                handler,
                finalizer,
            } => std::iter::once(&**block)
                .chain(opt(handler))
                .chain(opt(finalizer))
                .collect(),
            NodeKind::Catch { param, body } => {
                opt(param).into_iter().chain(std::iter::once(&**body)).collect()
            }
            NodeKind::ExprStmt { expr } => vec![&**expr],
            NodeKind::Call {
                callee, arguments, ..
            }
            | NodeKind::New { callee, arguments } => {
                std::iter::once(&**callee).chain(arguments.iter()).collect()
            }
            NodeKind::Member {
                object, property, ..
            } => std::iter::once(&**object).chain(opt(property)).collect(),
            NodeKind::Binary { left, right, .. }
            | NodeKind::Logical { left, right, .. }
            | NodeKind::Assignment { left, right, .. } => vec![&**left, &**right],
            NodeKind::Unary { argument, .. } | NodeKind::Update { argument, .. } => {
                vec![&**argument]
            }
            NodeKind::Conditional {
                test,
                consequent,
                alternate,
            } => vec![&**test, &**consequent, &**alternate],
            NodeKind::Identifier | NodeKind::Literal { .. } => Vec::new(),
            NodeKind::Import { .. } => Vec::new(),
            NodeKind::Export { declaration, .. } => opt(declaration).into_iter().collect(),
            NodeKind::Jsx { children }
            | NodeKind::TsInterface { members: children }
            | NodeKind::TsTypeAlias { children }
            | NodeKind::TsEnum { members: children }
            | NodeKind::TsTypeAnnotation { children }
            | NodeKind::Unknown { children } => children.iter().collect(),
        }
    }

    /// Depth-first pre-order iterator yielding each node with its parent's tag.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            stack: vec![(self, None)],
        }
    }
}

pub struct Preorder<'a> {
    stack: Vec<(&'a Node, Option<Tag>)>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (&'a Node, Option<Tag>);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, parent) = self.stack.pop()?;
        let tag = node.tag();
        let children = node.children();
        for child in children.into_iter().rev() {
            self.stack.push((child, Some(tag)));
        }
        Some((node, parent))
    }
}

#[cfg(test)]
fn leaf(kind: NodeKind) -> Node {
    Node {
        loc: Location {
            line: 1,
            col: 0,
            end_line: 1,
            end_col: 0,
        },
        name: None,
        kind,
    }
}

#[test]
fn preorder_visits_if_edges_in_semantic_order() {
    let if_node = leaf(NodeKind::If {
        test: Box::new(leaf(NodeKind::Identifier)),
        consequent: Box::new(leaf(NodeKind::StatementBlock { body: vec![] })),
        alternate: Some(Box::new(leaf(NodeKind::StatementBlock { body: vec![] }))),
    });
    let root = leaf(NodeKind::Program {
        body: vec![if_node],
    });

    let tags: Vec<(Tag, Option<Tag>)> = root.preorder().map(|(n, p)| (n.tag(), p)).collect();
    assert_eq!(
        tags,
        vec![
            (Tag::Program, None),
            (Tag::If, Some(Tag::Program)),
            (Tag::Identifier, Some(Tag::If)),
            (Tag::StatementBlock, Some(Tag::If)),
            (Tag::StatementBlock, Some(Tag::If)),
        ]
    );
}

#[test]
fn function_helpers_expose_params_and_body() {
    let f = leaf(NodeKind::FunctionDecl {
        is_async: false,
        is_generator: true,
        params: vec![leaf(NodeKind::Identifier), leaf(NodeKind::Identifier)],
        body: Box::new(leaf(NodeKind::StatementBlock { body: vec![] })),
    });
    assert!(f.is_function());
    assert_eq!(f.param_count(), 2);
    assert_eq!(f.function_body().unwrap().tag(), Tag::StatementBlock);
}
