//! Syntax tree for update block bodies
//!
//! Bodies arrive already parsed (the JSON shape mirrors the host language's
//! own syntax tree, one `type` tag per node). The tree is deliberately wider
//! than what the translator accepts: loops, calls and slices are
//! representable so they can be rejected by name.

use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMult,
    Shl,
    Shr,
    BitOr,
    BitAnd,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

// Source spellings, used in diagnostics.

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::MatMult => "@",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
            UnaryOp::UAdd => "+",
            UnaryOp::USub => "-",
        };
        f.write_str(s)
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Name { id: String },
    Attribute { value: Box<Expr>, attr: String },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Num { value: i64 },
    BinOp { left: Box<Expr>, op: BinOp, right: Box<Expr> },
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    BoolOp { op: BoolOp, values: Vec<Expr> },
    Compare { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr> },
    IfExp { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    Call {
        func: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Slice {
        #[serde(default)]
        lower: Option<Box<Expr>>,
        #[serde(default)]
        upper: Option<Box<Expr>>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stmt {
    Assign { targets: Vec<Expr>, value: Expr },
    AugAssign { target: Expr, op: BinOp, value: Expr },
    If {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    For { target: Expr, iter: Expr, body: Vec<Stmt> },
    While { test: Expr, body: Vec<Stmt> },
    Expr { value: Expr },
    Pass,
    #[serde(other)]
    Unknown,
}

impl Expr {
    pub fn name(id: &str) -> Self {
        Expr::Name { id: id.to_string() }
    }

    pub fn num(value: i64) -> Self {
        Expr::Num { value }
    }

    pub fn attr(value: Expr, attr: &str) -> Self {
        Expr::Attribute { value: Box::new(value), attr: attr.to_string() }
    }

    /// Build an access chain from dotted source text, e.g. `s.out[2].next`
    pub fn path(text: &str) -> Self {
        let mut expr: Option<Expr> = None;
        for segment in text.split('.') {
            let mut parts = segment.split('[');
            let head = parts.next().unwrap_or_default();
            expr = Some(match expr {
                None => Expr::name(head),
                Some(base) => Expr::attr(base, head),
            });
            for index in parts {
                let index = index.trim_end_matches(']');
                let index = index.parse().map(Expr::num).unwrap_or_else(|_| Expr::name(index));
                expr = expr.map(|base| Expr::Subscript { value: Box::new(base), index: Box::new(index) });
            }
        }
        expr.unwrap_or(Expr::Unknown)
    }

    pub fn binop(left: Expr, op: BinOp, right: Expr) -> Self {
        Expr::BinOp { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::UnaryOp { op, operand: Box::new(operand) }
    }

    pub fn boolop(op: BoolOp, values: Vec<Expr>) -> Self {
        Expr::BoolOp { op, values }
    }

    pub fn compare(left: Expr, op: CmpOp, right: Expr) -> Self {
        Expr::Compare { left: Box::new(left), ops: vec![op], comparators: vec![right] }
    }

    pub fn ifexp(test: Expr, body: Expr, orelse: Expr) -> Self {
        Expr::IfExp { test: Box::new(test), body: Box::new(body), orelse: Box::new(orelse) }
    }

    /// Node kind as it appears in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Name { .. } => "name",
            Expr::Attribute { .. } => "attribute",
            Expr::Subscript { .. } => "subscript",
            Expr::Num { .. } => "number",
            Expr::BinOp { .. } => "binary operation",
            Expr::UnaryOp { .. } => "unary operation",
            Expr::BoolOp { .. } => "boolean operation",
            Expr::Compare { .. } => "comparison",
            Expr::IfExp { .. } => "conditional expression",
            Expr::Call { .. } => "function call",
            Expr::Slice { .. } => "slice",
            Expr::Unknown => "unknown expression",
        }
    }
}

impl Stmt {
    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign { targets: vec![target], value }
    }

    pub fn aug_assign(target: Expr, op: BinOp, value: Expr) -> Self {
        Stmt::AugAssign { target, op, value }
    }

    pub fn if_(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        Stmt::If { test, body, orelse }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::Assign { .. } => "assignment",
            Stmt::AugAssign { .. } => "augmented assignment",
            Stmt::If { .. } => "if statement",
            Stmt::For { .. } => "for loop",
            Stmt::While { .. } => "while loop",
            Stmt::Expr { .. } => "expression statement",
            Stmt::Pass => "pass",
            Stmt::Unknown => "unknown statement",
        }
    }
}
