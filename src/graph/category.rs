//! Node categorizer
//!
//! Maps AST node kinds to the six semantic categories the visualization
//! understands. Pure closed matches over the ruff node-kind enums; anything
//! unrecognized yields `None` and leaves existing categories untouched.

use ruff_python_ast::{Expr, Stmt};

use super::types::Category;

/// Categorize a statement node, if its kind is one the taxonomy covers.
pub fn categorize_stmt(stmt: &Stmt) -> Option<Category> {
    match stmt {
        Stmt::FunctionDef(_) | Stmt::ClassDef(_) | Stmt::Import(_) | Stmt::ImportFrom(_) => {
            Some(Category::Definition)
        }
        Stmt::If(_)
        | Stmt::For(_)
        | Stmt::While(_)
        | Stmt::Try(_)
        | Stmt::Return(_)
        | Stmt::Break(_)
        | Stmt::Continue(_) => Some(Category::ControlFlow),
        Stmt::Assign(_) | Stmt::AugAssign(_) => Some(Category::DataChange),
        _ => None,
    }
}

/// Categorize an expression node, if its kind is one the taxonomy covers.
pub fn categorize_expr(expr: &Expr) -> Option<Category> {
    match expr {
        Expr::Call(_) => Some(Category::FunctionCall),
        Expr::List(_) | Expr::Dict(_) | Expr::Tuple(_) | Expr::Set(_) => {
            Some(Category::DataChange)
        }
        Expr::BinOp(_) | Expr::Compare(_) | Expr::BoolOp(_) | Expr::UnaryOp(_) => {
            Some(Category::Operation)
        }
        Expr::NumberLiteral(_)
        | Expr::StringLiteral(_)
        | Expr::BytesLiteral(_)
        | Expr::BooleanLiteral(_)
        | Expr::NoneLiteral(_)
        | Expr::EllipsisLiteral(_) => Some(Category::Literal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruff_python_parser::parse_module;

    fn first_stmt(source: &str) -> Stmt {
        let module = parse_module(source).expect("valid Python").into_syntax();
        module.body.into_iter().next().expect("one statement")
    }

    fn first_expr(source: &str) -> Expr {
        match first_stmt(source) {
            Stmt::Expr(e) => *e.value,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_definition_kinds() {
        assert_eq!(
            categorize_stmt(&first_stmt("def f(): pass")),
            Some(Category::Definition)
        );
        assert_eq!(
            categorize_stmt(&first_stmt("class C: pass")),
            Some(Category::Definition)
        );
        assert_eq!(
            categorize_stmt(&first_stmt("import os")),
            Some(Category::Definition)
        );
        assert_eq!(
            categorize_stmt(&first_stmt("from os import path")),
            Some(Category::Definition)
        );
    }

    #[test]
    fn test_control_flow_kinds() {
        for src in [
            "if x: pass",
            "for i in y: pass",
            "while x: pass",
            "try:\n    pass\nexcept Exception:\n    pass",
            "return",
            "break",
            "continue",
        ] {
            assert_eq!(
                categorize_stmt(&first_stmt(src)),
                Some(Category::ControlFlow),
                "source: {src}"
            );
        }
    }

    #[test]
    fn test_data_change_kinds() {
        assert_eq!(
            categorize_stmt(&first_stmt("x = 1")),
            Some(Category::DataChange)
        );
        assert_eq!(
            categorize_stmt(&first_stmt("x += 1")),
            Some(Category::DataChange)
        );
        for src in ["[1, 2]", "{'a': 1}", "(1, 2)", "{1, 2}"] {
            assert_eq!(
                categorize_expr(&first_expr(src)),
                Some(Category::DataChange),
                "source: {src}"
            );
        }
    }

    #[test]
    fn test_operation_and_literal_kinds() {
        assert_eq!(
            categorize_expr(&first_expr("a + b")),
            Some(Category::Operation)
        );
        assert_eq!(
            categorize_expr(&first_expr("a < b")),
            Some(Category::Operation)
        );
        assert_eq!(
            categorize_expr(&first_expr("a and b")),
            Some(Category::Operation)
        );
        assert_eq!(
            categorize_expr(&first_expr("not a")),
            Some(Category::Operation)
        );
        for src in ["1", "1.5", "'s'", "True", "None"] {
            assert_eq!(
                categorize_expr(&first_expr(src)),
                Some(Category::Literal),
                "source: {src}"
            );
        }
    }

    #[test]
    fn test_uncovered_kinds_yield_none() {
        assert_eq!(categorize_stmt(&first_stmt("pass")), None);
        assert_eq!(categorize_stmt(&first_stmt("x")), None); // Expr statement itself
        assert_eq!(categorize_expr(&first_expr("x")), None); // bare name
    }

    #[test]
    fn test_call_is_function_call() {
        assert_eq!(
            categorize_expr(&first_expr("f(1)")),
            Some(Category::FunctionCall)
        );
    }
}
