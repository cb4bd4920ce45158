//! Graph builder
//!
//! Turns a Python snippet into the line-level control-flow-adjacency graph.
//! Two passes over the parsed module:
//!
//! 1. Category pass: depth-first walk of every statement and expression,
//!    tagging each hosting line with its highest-priority category.
//! 2. Sequencing pass: threads the immediate child statements of compound
//!    constructs (def, if, for, while) into source-order chains, plus one
//!    back-edge per loop from the last body line to the loop header.
//!
//! The module body itself threads from a synthetic parent "line 0"; no node
//! exists for line 0, so the edge guard drops the synthetic root edge and it
//! never reaches the client.

use ruff_python_ast::statement_visitor::{walk_stmt as walk_nested_stmts, StatementVisitor};
use ruff_python_ast::visitor::{walk_expr, walk_stmt, Visitor};
use ruff_python_ast::{Expr, ModModule, Stmt};
use ruff_text_size::Ranged;
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::source::LineRegistry;

use super::category::{categorize_expr, categorize_stmt};
use super::types::{CodeGraph, GraphNode};

/// Parse `source` and build its graph.
///
/// Parse failures abort graph construction entirely and surface as
/// [`Error::Parse`] with the offending line resolved.
pub fn build(source: &str) -> Result<CodeGraph> {
    let parsed = ruff_python_parser::parse_module(source)
        .map_err(|e| Error::from_parse_error(&e, source))?;
    let module = parsed.into_syntax();
    Ok(build_from_module(&module, source))
}

/// Build the graph for an already-parsed module.
pub fn build_from_module(module: &ModModule, source: &str) -> CodeGraph {
    let registry = LineRegistry::new(source);

    // One node per physical line, eagerly, so every line is representable
    // even when it hosts no recognized construct.
    let mut graph = CodeGraph {
        nodes: registry
            .iter()
            .map(|(id, text)| GraphNode {
                id,
                code: text.trim().to_string(),
                category: None,
            })
            .collect(),
        edges: Vec::new(),
    };

    let mut categories = CategoryPass {
        graph: &mut graph,
        registry: &registry,
    };
    for stmt in &module.body {
        categories.visit_stmt(stmt);
    }

    let mut sequencer = SequencePass {
        graph: &mut graph,
        registry: &registry,
    };
    for stmt in &module.body {
        sequencer.visit_stmt(stmt);
    }
    // Top-level statements thread from a synthetic parent line 0.
    sequencer.thread_body(&module.body, 0);

    debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Built code graph"
    );
    graph
}

// =============================================================================
// CATEGORY PASS
// =============================================================================

struct CategoryPass<'a> {
    graph: &'a mut CodeGraph,
    registry: &'a LineRegistry,
}

impl CategoryPass<'_> {
    fn line_of(&self, ranged: &impl Ranged) -> u32 {
        self.registry.line_of(ranged.range().start().to_usize())
    }
}

impl<'a> Visitor<'a> for CategoryPass<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if let Some(category) = categorize_stmt(stmt) {
            self.graph.apply_category(self.line_of(stmt), category);
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if let Some(category) = categorize_expr(expr) {
            self.graph.apply_category(self.line_of(expr), category);
        }
        walk_expr(self, expr);
    }
}

// =============================================================================
// SEQUENCING PASS
// =============================================================================

struct SequencePass<'a> {
    graph: &'a mut CodeGraph,
    registry: &'a LineRegistry,
}

impl SequencePass<'_> {
    fn line_of(&self, ranged: &impl Ranged) -> u32 {
        self.registry.line_of(ranged.range().start().to_usize())
    }

    /// Thread `body`'s immediate statements into a chain starting at
    /// `parent_line`. Returns the line of the last threaded statement (or
    /// `parent_line` for an empty body), which loops use as the back-edge
    /// source.
    fn thread_body(&mut self, body: &[Stmt], parent_line: u32) -> u32 {
        let mut prev = parent_line;
        for stmt in body {
            let line = self.line_of(stmt);
            self.graph.add_edge(prev, line);
            prev = line;
        }
        prev
    }
}

impl<'a> StatementVisitor<'a> for SequencePass<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::FunctionDef(def) => {
                let line = self.line_of(def);
                self.thread_body(&def.body, line);
            }
            Stmt::For(stmt_for) => {
                let line = self.line_of(stmt_for);
                let last = self.thread_body(&stmt_for.body, line);
                // Iteration re-entry: end of body falls back to the header.
                // add_edge skips the degenerate case where last == line.
                self.graph.add_edge(last, line);
            }
            Stmt::While(stmt_while) => {
                let line = self.line_of(stmt_while);
                let last = self.thread_body(&stmt_while.body, line);
                self.graph.add_edge(last, line);
            }
            Stmt::If(stmt_if) => {
                let line = self.line_of(stmt_if);
                self.thread_body(&stmt_if.body, line);
                // elif clauses chain like nested if-statements: each threads
                // from the previous branch's line; a final else threads from
                // the last elif (or the if itself when there is none).
                let mut anchor = line;
                for clause in &stmt_if.elif_else_clauses {
                    if clause.test.is_some() {
                        let clause_line = self.registry.line_of(clause.range.start().to_usize());
                        self.graph.add_edge(anchor, clause_line);
                        self.thread_body(&clause.body, clause_line);
                        anchor = clause_line;
                    } else {
                        self.thread_body(&clause.body, anchor);
                    }
                }
            }
            _ => {}
        }
        // Descend into every nested statement list so compounds inside
        // class bodies, try blocks, with blocks etc. are still threaded.
        walk_nested_stmts(self, stmt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Category, Edge};

    fn edges(graph: &CodeGraph) -> Vec<(u32, u32)> {
        graph.edges.iter().map(|e| (e.source, e.target)).collect()
    }

    fn category_of(graph: &CodeGraph, line: u32) -> Option<Category> {
        graph.node(line).unwrap().category
    }

    #[test]
    fn test_one_node_per_physical_line() {
        let graph = build("x = 1\n\n# comment\ny = 2\n").unwrap();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.node(2).unwrap().code, "");
        assert_eq!(graph.node(3).unwrap().code, "# comment");
        assert_eq!(category_of(&graph, 2), None);
        assert_eq!(category_of(&graph, 3), None);
    }

    #[test]
    fn test_assignment_then_call() {
        // Scenario: two top-level statements chain into one edge.
        let graph = build("x = 1\nprint(x)\n").unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(category_of(&graph, 1), Some(Category::DataChange));
        assert_eq!(category_of(&graph, 2), Some(Category::FunctionCall));
        assert_eq!(edges(&graph), vec![(1, 2)]);
    }

    #[test]
    fn test_for_loop_back_edge() {
        let graph = build("for i in range(3):\n    print(i)\n").unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::ControlFlow));
        assert_eq!(category_of(&graph, 2), Some(Category::FunctionCall));
        assert_eq!(edges(&graph), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_while_loop_back_edge_from_last_body_line() {
        let graph = build("while x:\n    a = 1\n    b = 2\n").unwrap();
        assert_eq!(edges(&graph), vec![(1, 2), (2, 3), (3, 1)]);
    }

    #[test]
    fn test_loop_back_edge_added_exactly_once() {
        let graph = build("for i in range(3):\n    x = i\n    y = i\n").unwrap();
        let back_edges = graph
            .edges
            .iter()
            .filter(|e| **e == Edge { source: 3, target: 1 })
            .count();
        assert_eq!(back_edges, 1);
    }

    #[test]
    fn test_function_body_threading() {
        let src = "def f():\n    a = 1\n    b = 2\n\nf()\n";
        let graph = build(src).unwrap();
        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(category_of(&graph, 1), Some(Category::Definition));
        // def body chain plus the module-level chain from the def to the call
        assert_eq!(edges(&graph), vec![(1, 2), (2, 3), (1, 5)]);
    }

    #[test]
    fn test_if_elif_else_threading() {
        let src = "if a:\n    b = 1\nelif c:\n    d = 1\nelse:\n    e = 1\n";
        let graph = build(src).unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::ControlFlow));
        let got = edges(&graph);
        assert!(got.contains(&(1, 2)), "if body: {got:?}");
        assert!(got.contains(&(1, 3)), "if -> elif: {got:?}");
        assert!(got.contains(&(3, 4)), "elif body: {got:?}");
        assert!(got.contains(&(3, 6)), "elif -> else body: {got:?}");
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn test_method_bodies_inside_classes_are_threaded() {
        let src = "class C:\n    def m(self):\n        a = 1\n        b = 2\n";
        let graph = build(src).unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::Definition));
        assert_eq!(edges(&graph), vec![(2, 3), (3, 4)]);
    }

    #[test]
    fn test_priority_wins_regardless_of_construct_order() {
        // Line 1 hosts an assignment (data_change), a call (function_call)
        // and a literal; the call outranks both.
        let graph = build("x = f(1)\n").unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::FunctionCall));

        // Same categories, reversed source order of the constructs.
        let graph = build("f(x == 1)\n").unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::FunctionCall));
    }

    #[test]
    fn test_control_flow_outranks_call_on_same_line() {
        let graph = build("if f(x):\n    pass\n").unwrap();
        assert_eq!(category_of(&graph, 1), Some(Category::ControlFlow));
    }

    #[test]
    fn test_no_synthetic_root_edge_is_emitted() {
        let graph = build("x = 1\ny = 2\n").unwrap();
        assert!(graph.edges.iter().all(|e| e.source != 0 && e.target != 0));
        assert_eq!(edges(&graph), vec![(1, 2)]);
    }

    #[test]
    fn test_parse_error_carries_line_and_text() {
        let err = build("x = 1\ndef f(:\n").unwrap_err();
        match err {
            Error::Parse { line, text, .. } => {
                assert_eq!(line, 2);
                assert_eq!(text, "def f(:");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_source_builds_empty_graph() {
        let graph = build("").unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let src = "def f(n):\n    total = 0\n    for i in range(n):\n        total += i\n    return total\n\nprint(f(5))\n";
        let a = build(src).unwrap();
        let b = build(src).unwrap();
        let cats = |g: &CodeGraph| {
            g.nodes
                .iter()
                .map(|n| (n.id, n.category))
                .collect::<Vec<_>>()
        };
        assert_eq!(cats(&a), cats(&b));
        assert_eq!(edges(&a), edges(&b));
    }

    #[test]
    fn test_nested_loop_inside_try_is_threaded() {
        let src = "try:\n    for i in x:\n        y = i\nexcept Exception:\n    pass\n";
        let graph = build(src).unwrap();
        // Try bodies are not threaded, but the loop inside still is.
        assert_eq!(edges(&graph), vec![(2, 3), (3, 2)]);
    }
}
