use crate::ast::{Node, NodeKind, Tag};
use crate::cfg::{BlockId, Cfg, EdgeKind, OrphanRun, TerminatorKind};
use tracing::debug;

/// Loop or labelled-block context: where `break`/`continue` resolve to.
struct LoopCtx {
    labels: Vec<String>,
    break_target: BlockId,
    /// None for switch and labelled blocks, which accept only `break`.
    continue_target: Option<BlockId>,
    saw_break: bool,
}

struct FinCtx {
    entry: BlockId,
    /// A return routed through this finalizer; its tail must reach exit.
    return_pending: bool,
}

struct Builder<'a> {
    cfg: Cfg<'a>,
    current: BlockId,
    terminated: Option<TerminatorKind>,
    loops: Vec<LoopCtx>,
    /// Innermost implicit exception target (catch entry, or finalizer
    /// entry for a catch-less try).
    exceptions: Vec<BlockId>,
    finalizers: Vec<FinCtx>,
    pending_labels: Vec<String>,
    /// Inside an already-reported unreachable run; new blocks are
    /// suppressed so the detectors don't report the region twice.
    in_dead_region: bool,
}

/// Build the control-flow graph for one function-like AST node. Blocks
/// partition the body at every control-flow boundary; statements after a
/// terminator land in orphan blocks the pruning pass hands to the
/// dead-code detector.
pub fn build_cfg<'a>(func: &'a Node) -> Cfg<'a> {
    let cfg = Cfg::new();
    let entry = cfg.entry;
    let mut b = Builder {
        cfg,
        current: entry,
        terminated: None,
        loops: Vec::new(),
        exceptions: Vec::new(),
        finalizers: Vec::new(),
        pending_labels: Vec::new(),
        in_dead_region: false,
    };

    match func.function_body() {
        Some(body) if body.tag() == Tag::StatementBlock => {
            if let NodeKind::StatementBlock { body: stmts } = &body.kind {
                b.lower_stmts(stmts);
            }
        }
        // concise arrow: the expression is an implicit return
        Some(expr) => {
            b.append(expr);
            let exit = b.cfg.exit;
            b.cfg.add_edge(b.current, exit, EdgeKind::Return);
            b.terminated = Some(TerminatorKind::Return);
        }
        None => {}
    }

    if b.terminated.is_none() {
        let (cur, exit) = (b.current, b.cfg.exit);
        b.cfg.add_edge(cur, exit, EdgeKind::Normal);
    }

    let mut cfg = b.cfg;
    cfg.prune();
    if cfg!(debug_assertions) {
        cfg.dump();
        debug_assert!(cfg.is_well_formed());
    }
    debug!(
        target: "cfg",
        "CFG built for {} — blocks: {}, edges: {}",
        func.name.as_deref().unwrap_or("<anonymous>"),
        cfg.block_count(),
        cfg.edge_count()
    );
    cfg
}

/// `&&` / `||` / `??` under `n`, not descending into nested functions.
fn count_short_circuits(n: &Node) -> u32 {
    let mut count = matches!(n.kind, NodeKind::Logical { .. }) as u32;
    for child in n.children() {
        if !child.is_function() {
            count += count_short_circuits(child);
        }
    }
    count
}

impl<'a> Builder<'a> {
    fn new_block(&mut self) -> BlockId {
        let b = self.cfg.add_block();
        self.cfg.graph[b].suppressed = self.in_dead_region;
        b
    }

    fn append(&mut self, node: &'a Node) {
        let sc = if node.is_function() {
            0
        } else {
            count_short_circuits(node)
        };
        let block = &mut self.cfg.graph[self.current];
        block.stmts.push(node);
        block.short_circuits += sc;
    }

    fn append_to(&mut self, block: BlockId, node: &'a Node) {
        let sc = if node.is_function() {
            0
        } else {
            count_short_circuits(node)
        };
        let b = &mut self.cfg.graph[block];
        b.stmts.push(node);
        b.short_circuits += sc;
    }

    /// Lower a statement run. Once a terminator fires, the rest of the
    /// lexical block is one contiguous unreachable run: recorded once for
    /// the detector, then still lowered into suppressed blocks so its
    /// decision edges keep counting toward complexity.
    fn lower_stmts(&mut self, stmts: &'a [Node]) {
        for (i, stmt) in stmts.iter().enumerate() {
            if let Some(kind) = self.terminated {
                let rest = &stmts[i..];
                if self.in_dead_region {
                    let b = self.new_block();
                    self.current = b;
                    self.terminated = None;
                    self.lower_stmts(rest);
                    self.terminated = Some(kind);
                    return;
                }
                self.cfg.orphan_runs.push(OrphanRun {
                    kind,
                    stmts: rest.iter().collect(),
                });
                self.in_dead_region = true;
                let b = self.new_block();
                self.current = b;
                self.terminated = None;
                self.lower_stmts(rest);
                self.in_dead_region = false;
                self.terminated = Some(kind);
                return;
            }
            self.lower_stmt(stmt);
        }
    }

    /// A branch arm or loop body: a block's statements inline, a bare
    /// statement lowers directly, an else clause unwraps.
    fn lower_arm(&mut self, n: &'a Node) {
        match &n.kind {
            NodeKind::StatementBlock { body } => self.lower_stmts(body),
            NodeKind::ElseClause { body } => self.lower_arm(body),
            _ => self.lower_stmt(n),
        }
    }

    fn lower_stmt(&mut self, stmt: &'a Node) {
        match &stmt.kind {
            NodeKind::If { .. } => self.lower_if(stmt),
            NodeKind::Switch { .. } => self.lower_switch(stmt),
            NodeKind::While { .. } => self.lower_while(stmt),
            NodeKind::DoWhile { .. } => self.lower_do_while(stmt),
            NodeKind::For { .. } => self.lower_for(stmt),
            NodeKind::ForIn { right, body, .. } | NodeKind::ForOf { right, body, .. } => {
                self.lower_iteration(right, body)
            }
            NodeKind::Try { .. } => self.lower_try(stmt),
            NodeKind::Labeled { .. } => self.lower_labeled(stmt),
            NodeKind::StatementBlock { body } => self.lower_stmts(body),
            NodeKind::Return { .. } => {
                self.append(stmt);
                let cur = self.current;
                match self.finalizers.last_mut() {
                    Some(fin) => {
                        fin.return_pending = true;
                        let entry = fin.entry;
                        self.cfg.add_edge(cur, entry, EdgeKind::Return);
                    }
                    None => {
                        let exit = self.cfg.exit;
                        self.cfg.add_edge(cur, exit, EdgeKind::Return);
                    }
                }
                self.terminated = Some(TerminatorKind::Return);
            }
            NodeKind::Throw { .. } => {
                self.append(stmt);
                let cur = self.current;
                let target = self.exceptions.last().copied().unwrap_or(self.cfg.exit);
                self.cfg.add_edge(cur, target, EdgeKind::Exception);
                self.terminated = Some(TerminatorKind::Throw);
            }
            NodeKind::Break => {
                self.append(stmt);
                let label = stmt.name.as_deref();
                let idx = self.loops.iter().rposition(|c| match label {
                    Some(l) => c.labels.iter().any(|cl| cl == l),
                    None => true,
                });
                match idx {
                    Some(i) => {
                        self.loops[i].saw_break = true;
                        let target = self.loops[i].break_target;
                        let cur = self.current;
                        self.cfg.add_edge(cur, target, EdgeKind::Break);
                        self.terminated = Some(TerminatorKind::Break);
                    }
                    None => self.cfg.invalid_jumps.push(stmt),
                }
            }
            NodeKind::Continue => {
                self.append(stmt);
                let label = stmt.name.as_deref();
                let idx = self.loops.iter().rposition(|c| {
                    c.continue_target.is_some()
                        && match label {
                            Some(l) => c.labels.iter().any(|cl| cl == l),
                            None => true,
                        }
                });
                match idx {
                    Some(i) => {
                        let target = self.loops[i].continue_target.unwrap();
                        let cur = self.current;
                        self.cfg.add_edge(cur, target, EdgeKind::Continue);
                        self.terminated = Some(TerminatorKind::Continue);
                    }
                    None => self.cfg.invalid_jumps.push(stmt),
                }
            }
            // everything else is linear: append to the current block
            _ => self.append(stmt),
        }
    }

    fn lower_if(&mut self, stmt: &'a Node) {
        let NodeKind::If {
            test,
            consequent,
            alternate,
        } = &stmt.kind
        else {
            unreachable!()
        };
        self.append(test);
        let cond = self.current;
        let join = self.new_block();

        let cons_entry = self.new_block();
        self.cfg.add_edge(cond, cons_entry, EdgeKind::True);
        self.current = cons_entry;
        self.terminated = None;
        self.lower_arm(consequent);
        if self.terminated.is_none() {
            let cur = self.current;
            self.cfg.add_edge(cur, join, EdgeKind::Normal);
        }

        match alternate {
            Some(alt) => {
                let alt_entry = self.new_block();
                self.cfg.add_edge(cond, alt_entry, EdgeKind::False);
                self.current = alt_entry;
                self.terminated = None;
                self.lower_arm(alt);
                if self.terminated.is_none() {
                    let cur = self.current;
                    self.cfg.add_edge(cur, join, EdgeKind::Normal);
                }
            }
            None => self.cfg.add_edge(cond, join, EdgeKind::False),
        }

        self.current = join;
        self.terminated = None;
    }

    fn lower_switch(&mut self, stmt: &'a Node) {
        let NodeKind::Switch {
            discriminant,
            cases,
        } = &stmt.kind
        else {
            unreachable!()
        };
        self.append(discriminant);
        let join = self.new_block();
        let entries: Vec<BlockId> = cases.iter().map(|_| self.new_block()).collect();

        // dispatch chain: each guard tests against the discriminant, True
        // into its case body, False onward to the next guard
        let mut guard = self.current;
        let mut first = true;
        let mut default_entry: Option<BlockId> = None;
        for (case, &entry) in cases.iter().zip(&entries) {
            let NodeKind::SwitchCase { test, .. } = &case.kind else {
                continue;
            };
            match test {
                Some(t) => {
                    if !first {
                        let g = self.new_block();
                        self.cfg.add_edge(guard, g, EdgeKind::False);
                        guard = g;
                    }
                    self.append_to(guard, t);
                    self.cfg.add_edge(guard, entry, EdgeKind::True);
                    first = false;
                }
                None => default_entry = Some(entry),
            }
        }
        // terminal False: the default body, or straight to the join
        let fallback = default_entry.unwrap_or(join);
        self.cfg.add_edge(guard, fallback, EdgeKind::False);

        self.loops.push(LoopCtx {
            labels: std::mem::take(&mut self.pending_labels),
            break_target: join,
            continue_target: None,
            saw_break: false,
        });
        for (i, (case, &entry)) in cases.iter().zip(&entries).enumerate() {
            let NodeKind::SwitchCase { body, .. } = &case.kind else {
                continue;
            };
            self.current = entry;
            self.terminated = None;
            self.lower_stmts(body);
            if self.terminated.is_none() {
                // no break: fall through into the next case body
                let cur = self.current;
                match entries.get(i + 1) {
                    Some(&next) => self.cfg.add_edge(cur, next, EdgeKind::Normal),
                    None => self.cfg.add_edge(cur, join, EdgeKind::Normal),
                }
            }
        }
        self.loops.pop();
        self.current = join;
        self.terminated = None;
    }

    fn lower_while(&mut self, stmt: &'a Node) {
        let NodeKind::While { test, body } = &stmt.kind else {
            unreachable!()
        };
        let header = self.new_block();
        let cur = self.current;
        self.cfg.add_edge(cur, header, EdgeKind::Normal);
        self.current = header;
        self.append(test);

        let body_entry = self.new_block();
        let join = self.new_block();
        self.cfg.add_edge(header, body_entry, EdgeKind::True);
        self.cfg.add_edge(header, join, EdgeKind::False);

        self.loops.push(LoopCtx {
            labels: std::mem::take(&mut self.pending_labels),
            break_target: join,
            continue_target: Some(header),
            saw_break: false,
        });
        self.current = body_entry;
        self.terminated = None;
        self.lower_arm(body);
        if self.terminated.is_none() {
            let cur = self.current;
            self.cfg.add_edge(cur, header, EdgeKind::Loop);
        }
        self.loops.pop();
        self.current = join;
        self.terminated = None;
    }

    fn lower_do_while(&mut self, stmt: &'a Node) {
        let NodeKind::DoWhile { body, test } = &stmt.kind else {
            unreachable!()
        };
        let body_entry = self.new_block();
        let header = self.new_block();
        let join = self.new_block();
        let cur = self.current;
        self.cfg.add_edge(cur, body_entry, EdgeKind::Normal);

        self.loops.push(LoopCtx {
            labels: std::mem::take(&mut self.pending_labels),
            break_target: join,
            continue_target: Some(header),
            saw_break: false,
        });
        self.current = body_entry;
        self.terminated = None;
        self.lower_arm(body);
        if self.terminated.is_none() {
            let cur = self.current;
            self.cfg.add_edge(cur, header, EdgeKind::Normal);
        }
        self.loops.pop();

        // the test runs after the body
        self.current = header;
        self.append(test);
        self.cfg.add_edge(header, body_entry, EdgeKind::True);
        self.cfg.add_edge(header, join, EdgeKind::False);
        self.current = join;
        self.terminated = None;
    }

    fn lower_for(&mut self, stmt: &'a Node) {
        let NodeKind::For {
            init,
            test,
            update,
            body,
        } = &stmt.kind
        else {
            unreachable!()
        };
        if let Some(init) = init {
            self.append(init);
        }
        let header = self.new_block();
        let cur = self.current;
        self.cfg.add_edge(cur, header, EdgeKind::Normal);
        self.current = header;
        if let Some(test) = test {
            self.append(test);
        }

        let body_entry = self.new_block();
        let join = self.new_block();
        self.cfg.add_edge(header, body_entry, EdgeKind::True);
        if test.is_some() {
            self.cfg.add_edge(header, join, EdgeKind::False);
        }

        let update_block = update.as_ref().map(|_| self.new_block());
        self.loops.push(LoopCtx {
            labels: std::mem::take(&mut self.pending_labels),
            break_target: join,
            continue_target: Some(update_block.unwrap_or(header)),
            saw_break: false,
        });
        self.current = body_entry;
        self.terminated = None;
        self.lower_arm(body);
        if self.terminated.is_none() {
            let cur = self.current;
            match update_block {
                Some(u) => self.cfg.add_edge(cur, u, EdgeKind::Normal),
                None => self.cfg.add_edge(cur, header, EdgeKind::Loop),
            }
        }
        let ctx = self.loops.pop().unwrap();
        if let (Some(u), Some(update)) = (update_block, update.as_ref()) {
            self.current = u;
            self.append(update);
            self.cfg.add_edge(u, header, EdgeKind::Loop);
        }
        // `for(;;)` gets a way out only when something actually breaks
        if test.is_none() && ctx.saw_break {
            self.cfg.add_edge(header, join, EdgeKind::False);
        }
        self.current = join;
        self.terminated = None;
    }

    /// for-in / for-of share a shape: the header tests the iterator.
    fn lower_iteration(&mut self, right: &'a Node, body: &'a Node) {
        let header = self.new_block();
        let cur = self.current;
        self.cfg.add_edge(cur, header, EdgeKind::Normal);
        self.current = header;
        self.append(right);

        let body_entry = self.new_block();
        let join = self.new_block();
        self.cfg.add_edge(header, body_entry, EdgeKind::True);
        self.cfg.add_edge(header, join, EdgeKind::False);

        self.loops.push(LoopCtx {
            labels: std::mem::take(&mut self.pending_labels),
            break_target: join,
            continue_target: Some(header),
            saw_break: false,
        });
        self.current = body_entry;
        self.terminated = None;
        self.lower_arm(body);
        if self.terminated.is_none() {
            let cur = self.current;
            self.cfg.add_edge(cur, header, EdgeKind::Loop);
        }
        self.loops.pop();
        self.current = join;
        self.terminated = None;
    }

    fn lower_try(&mut self, stmt: &'a Node) {
        let NodeKind::Try {
            block,
            handler,
            finalizer,
        } = &stmt.kind
        else {
            unreachable!()
        };
        let join = self.new_block();
        let catch_entry = handler.as_ref().map(|_| {
            let b = self.new_block();
            self.cfg.graph[b].is_handler = true;
            b
        });
        let fin_entry = finalizer.as_ref().map(|_| self.new_block());
        let exception_target = catch_entry.or(fin_entry);

        let body_entry = self.new_block();
        let cur = self.current;
        self.cfg.add_edge(cur, body_entry, EdgeKind::Normal);
        if let Some(target) = exception_target {
            // anything in the body may raise
            self.cfg.add_edge(body_entry, target, EdgeKind::Exception);
            self.exceptions.push(target);
        }
        if let Some(entry) = fin_entry {
            self.finalizers.push(FinCtx {
                entry,
                return_pending: false,
            });
        }

        let after = fin_entry.unwrap_or(join);
        self.current = body_entry;
        self.terminated = None;
        self.lower_arm(block);
        if self.terminated.is_none() {
            let cur = self.current;
            self.cfg.add_edge(cur, after, EdgeKind::Normal);
        }
        if exception_target.is_some() {
            // throws inside the handler or finalizer unwind outward
            self.exceptions.pop();
        }

        if let (Some(h), Some(entry)) = (handler.as_ref(), catch_entry) {
            if let NodeKind::Catch { body, .. } = &h.kind {
                self.current = entry;
                self.terminated = None;
                self.lower_arm(body);
                if self.terminated.is_none() {
                    let cur = self.current;
                    self.cfg.add_edge(cur, after, EdgeKind::Normal);
                }
            }
        }

        let fin_ctx = fin_entry.map(|_| self.finalizers.pop().unwrap());
        if let (Some(fin_node), Some(ctx)) = (finalizer.as_ref(), fin_ctx) {
            self.current = ctx.entry;
            self.terminated = None;
            self.lower_arm(fin_node);
            if self.terminated.is_none() {
                let cur = self.current;
                self.cfg.add_edge(cur, join, EdgeKind::Normal);
                if ctx.return_pending {
                    // the routed return resumes: next finalizer out, or exit
                    match self.finalizers.last_mut() {
                        Some(outer) => {
                            outer.return_pending = true;
                            let entry = outer.entry;
                            self.cfg.add_edge(cur, entry, EdgeKind::Return);
                        }
                        None => {
                            let exit = self.cfg.exit;
                            self.cfg.add_edge(cur, exit, EdgeKind::Return);
                        }
                    }
                }
            }
        }

        self.current = join;
        self.terminated = None;
    }

    fn lower_labeled(&mut self, stmt: &'a Node) {
        let NodeKind::Labeled { body } = &stmt.kind else {
            unreachable!()
        };
        if let Some(label) = stmt.name.clone() {
            self.pending_labels.push(label);
        }
        match body.tag() {
            Tag::While | Tag::DoWhile | Tag::For | Tag::ForIn | Tag::ForOf | Tag::Switch
            | Tag::Labeled => self.lower_stmt(body),
            _ => {
                // labelled block: `break label` jumps past it
                let join = self.new_block();
                self.loops.push(LoopCtx {
                    labels: std::mem::take(&mut self.pending_labels),
                    break_target: join,
                    continue_target: None,
                    saw_break: false,
                });
                self.lower_stmt(body);
                if self.terminated.is_none() {
                    let cur = self.current;
                    self.cfg.add_edge(cur, join, EdgeKind::Normal);
                }
                self.loops.pop();
                self.current = join;
                self.terminated = None;
            }
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_snippet;
    use crate::lang::Lang;
    use petgraph::visit::EdgeRef;

    fn cfg_of(src: &str) -> crate::ast::Node {
        parse_snippet(src, Lang::Js)
    }

    fn first_function(root: &crate::ast::Node) -> &crate::ast::Node {
        root.preorder()
            .map(|(n, _)| n)
            .find(|n| n.is_function())
            .expect("no function in snippet")
    }

    #[test]
    fn linear_function_has_complexity_one() {
        let root = cfg_of("function a() { return 1; }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 1);
        assert!(cfg.is_well_formed());
        assert!(cfg.unreachable.is_empty());
    }

    #[test]
    fn if_adds_one_decision() {
        let root = cfg_of("function f(x) { if (x) { g(); } return x; }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 2);
    }

    #[test]
    fn short_circuit_operators_add_decisions() {
        let root = cfg_of("function f(a, b) { if (a && b) { g(); } }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 3);
    }

    #[test]
    fn dead_return_does_not_change_complexity() {
        let base = {
            let root = cfg_of("function f(x) { if (x) { g(); } }");
            build_cfg(first_function(&root)).cyclomatic()
        };
        let with_dead = {
            let root = cfg_of("function f(x) { return 0; if (x) { g(); } }");
            build_cfg(first_function(&root)).cyclomatic()
        };
        // dead statements are still lowered; their decision edges count
        assert_eq!(with_dead, base);
    }

    #[test]
    fn switch_counts_one_decision_per_guarded_case() {
        let root = cfg_of(
            "function f(x) { switch (x) { case 1: case 2: return 1; default: return 0; } }",
        );
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 3);
        assert!(cfg.unreachable.is_empty());
    }

    #[test]
    fn try_catch_counts_the_handler_edge() {
        let root = cfg_of(
            "function e() { try { return 1; } catch (_) {} finally { cleanup(); } }",
        );
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 2);
        // the finalizer runs on the return path, so every block with a
        // statement must be reachable
        assert!(cfg.unreachable.is_empty());
    }

    #[test]
    fn statements_after_return_form_an_orphan_run() {
        let root = cfg_of("function b() { return 1; const x = 2; }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 1);
        assert_eq!(cfg.orphan_runs.len(), 1);
        assert_eq!(cfg.orphan_runs[0].kind, TerminatorKind::Return);
        assert_eq!(cfg.orphan_runs[0].stmts.len(), 1);
        // the dead statement still lives in a (suppressed) unreachable block
        assert_eq!(cfg.unreachable.len(), 1);
        assert!(cfg.graph[cfg.unreachable[0]].suppressed);
    }

    #[test]
    fn join_after_fully_terminating_if_is_unreachable_code() {
        let root = cfg_of(
            "function f(x) { if (x) { return 1; } else { return 2; } g(); }",
        );
        let cfg = build_cfg(first_function(&root));
        // no terminator orphaned g(); the join block simply lost its
        // predecessors
        assert!(cfg.orphan_runs.is_empty());
        assert_eq!(cfg.unreachable.len(), 1);
        assert!(!cfg.graph[cfg.unreachable[0]].suppressed);
    }

    #[test]
    fn while_loop_has_backedge_and_one_decision() {
        let root = cfg_of("function f(n) { while (n > 0) { n--; } return n; }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.cyclomatic(), 2);
        let back_edges = cfg
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::Loop)
            .count();
        assert_eq!(back_edges, 1);
    }

    #[test]
    fn for_loop_continue_targets_the_update_block() {
        let root = cfg_of(
            "function f() { for (let i = 0; i < 9; i++) { if (i % 2) { continue; } g(i); } }",
        );
        let cfg = build_cfg(first_function(&root));
        let continues = cfg
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::Continue)
            .count();
        assert_eq!(continues, 1);
        assert!(cfg.unreachable.is_empty());
    }

    #[test]
    fn infinite_for_without_break_leaves_exit_unreached() {
        let root = cfg_of("function f() { for (;;) { g(); } }");
        let cfg = build_cfg(first_function(&root));
        // unconditional loop: one True edge only
        assert_eq!(cfg.cyclomatic(), 2);
        let false_edges = cfg
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::False)
            .count();
        assert_eq!(false_edges, 0);
    }

    #[test]
    fn infinite_for_with_break_synthesizes_the_false_edge() {
        let root = cfg_of("function f() { for (;;) { if (g()) { break; } } return 1; }");
        let cfg = build_cfg(first_function(&root));
        let false_edges = cfg
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::False)
            .count();
        // one from the if, one synthesized on the loop header
        assert_eq!(false_edges, 2);
        assert!(cfg.unreachable.is_empty());
    }

    #[test]
    fn labelled_break_resolves_across_nesting() {
        let root = cfg_of(
            "function f() { outer: for (const a of xs) { for (const b of ys) { if (a === b) { break outer; } } } }",
        );
        let cfg = build_cfg(first_function(&root));
        assert!(cfg.invalid_jumps.is_empty());
        let breaks = cfg
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::Break)
            .count();
        assert_eq!(breaks, 1);
    }

    #[test]
    fn unresolved_label_is_recorded_not_wired() {
        let root = cfg_of("function f() { while (g()) { break missing; } }");
        let cfg = build_cfg(first_function(&root));
        assert_eq!(cfg.invalid_jumps.len(), 1);
    }

    #[test]
    fn concise_arrow_body_is_an_implicit_return() {
        let root = parse_snippet("const f = (a, b) => a && b;", Lang::Js);
        let arrow = root
            .preorder()
            .map(|(n, _)| n)
            .find(|n| n.tag() == Tag::Arrow)
            .unwrap();
        let cfg = build_cfg(arrow);
        assert_eq!(cfg.cyclomatic(), 2); // the && counts
        assert!(cfg.is_well_formed());
    }
}
