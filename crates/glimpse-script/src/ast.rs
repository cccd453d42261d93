//! Abstract syntax tree for Glimpse script.

use std::sync::Arc;

/// A statement at the top level of a snippet or inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `use core.text;`
    Use { path: Vec<String>, line: usize },
    /// `let x = expr;`
    Let { name: String, value: Expr, line: usize },
    /// `fn f(a) = expr;` or `fn f(a) { ... }`
    Fn(Arc<FunctionDecl>),
    /// `x = expr;` or `x.Prop = expr;`
    Assign { target: AssignTarget, value: Expr },
    /// Expression used as a statement. Produces a value.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Property { name: String, property: String },
}

/// A script function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    List(Vec<Expr>),
    Ident(String),
    Field {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `new ns.Type(args)`
    New {
        path: Vec<String>,
        args: Vec<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
}

impl Expr {
    /// Flatten `a.b.c` into its segments, if the expression is a plain
    /// dotted path.
    pub fn as_path(&self) -> Option<Vec<String>> {
        match self {
            Expr::Ident(name) => Some(vec![name.clone()]),
            Expr::Field { object, name } => {
                let mut path = object.as_path()?;
                path.push(name.clone());
                Some(path)
            }
            _ => None,
        }
    }
}
