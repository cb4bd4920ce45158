//! Graph model
//!
//! One node per physical source line, directed edges for control-flow
//! adjacency. The graph is built once per request and never mutated after
//! construction.

use serde::Serialize;

// =============================================================================
// CATEGORY
// =============================================================================

/// Semantic category of a source line, derived from the highest-priority
/// construct the line hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Definition,
    ControlFlow,
    FunctionCall,
    DataChange,
    Operation,
    Literal,
}

impl Category {
    /// Priority rank, highest wins. A line touched by constructs of several
    /// categories keeps the highest-ranked one.
    pub fn priority(self) -> u8 {
        match self {
            Category::Definition => 6,
            Category::ControlFlow => 5,
            Category::FunctionCall => 4,
            Category::Operation => 3,
            Category::DataChange => 2,
            Category::Literal => 1,
        }
    }

    /// Wire name used by the visualization front end.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Definition => "definition",
            Category::ControlFlow => "control_flow",
            Category::FunctionCall => "function_call",
            Category::DataChange => "data_change",
            Category::Operation => "operation",
            Category::Literal => "literal",
        }
    }
}

// =============================================================================
// NODES AND EDGES
// =============================================================================

/// A graph node: one per physical source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// 1-based line number.
    pub id: u32,
    /// Trimmed line text, for display.
    pub code: String,
    /// Set only for lines hosting a recognized construct.
    pub category: Option<Category>,
}

/// Directed control-flow-adjacency edge between two line nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: u32,
    pub target: u32,
}

// =============================================================================
// GRAPH
// =============================================================================

/// Line-level control-flow-adjacency graph of a source snippet.
///
/// Node ids are the contiguous range `1..=nodes.len()`, so lookups index
/// directly. Edges keep insertion order and are not deduplicated.
#[derive(Debug, Default)]
pub struct CodeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

impl CodeGraph {
    /// Whether a node exists for the given line number.
    pub fn has_node(&self, id: u32) -> bool {
        id >= 1 && (id as usize) <= self.nodes.len()
    }

    /// Borrow the node for a line number, if present.
    pub fn node(&self, id: u32) -> Option<&GraphNode> {
        if self.has_node(id) {
            self.nodes.get(id as usize - 1)
        } else {
            None
        }
    }

    /// Apply a category to a line, keeping the highest-priority one seen.
    /// Lines without a node (e.g. line 0) are ignored.
    pub fn apply_category(&mut self, id: u32, category: Category) {
        if !self.has_node(id) {
            return;
        }
        let node = &mut self.nodes[id as usize - 1];
        match node.category {
            Some(current) if current.priority() >= category.priority() => {}
            _ => node.category = Some(category),
        }
    }

    /// Add a directed edge. Skipped when the endpoints coincide or when
    /// either endpoint has no node; duplicates are kept.
    pub fn add_edge(&mut self, source: u32, target: u32) {
        if source == target || !self.has_node(source) || !self.has_node(target) {
            return;
        }
        self.edges.push(Edge { source, target });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_lines(n: u32) -> CodeGraph {
        CodeGraph {
            nodes: (1..=n)
                .map(|id| GraphNode {
                    id,
                    code: String::new(),
                    category: None,
                })
                .collect(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn test_priority_order() {
        use Category::*;
        let descending = [Definition, ControlFlow, FunctionCall, Operation, DataChange, Literal];
        for pair in descending.windows(2) {
            assert!(pair[0].priority() > pair[1].priority());
        }
    }

    #[test]
    fn test_apply_category_keeps_highest() {
        let mut g = graph_with_lines(1);
        g.apply_category(1, Category::Literal);
        g.apply_category(1, Category::DataChange);
        assert_eq!(g.node(1).unwrap().category, Some(Category::DataChange));
        // Lower priority never overwrites
        g.apply_category(1, Category::Literal);
        assert_eq!(g.node(1).unwrap().category, Some(Category::DataChange));
    }

    #[test]
    fn test_apply_category_order_independent() {
        let mut a = graph_with_lines(1);
        a.apply_category(1, Category::ControlFlow);
        a.apply_category(1, Category::FunctionCall);

        let mut b = graph_with_lines(1);
        b.apply_category(1, Category::FunctionCall);
        b.apply_category(1, Category::ControlFlow);

        assert_eq!(a.node(1).unwrap().category, Some(Category::ControlFlow));
        assert_eq!(b.node(1).unwrap().category, Some(Category::ControlFlow));
    }

    #[test]
    fn test_add_edge_guards() {
        let mut g = graph_with_lines(2);
        g.add_edge(1, 1); // self loop skipped
        g.add_edge(0, 1); // synthetic root has no node
        g.add_edge(1, 3); // missing target
        assert!(g.edges.is_empty());

        g.add_edge(1, 2);
        g.add_edge(1, 2); // duplicates are legal
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Category::ControlFlow.as_str(), "control_flow");
        assert_eq!(
            serde_json::to_string(&Category::DataChange).unwrap(),
            "\"data_change\""
        );
    }
}
