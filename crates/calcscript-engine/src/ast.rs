use std::sync::Arc;

/// The reserved root identifier through which the standard library is reached.
pub const STD_ROOT: &str = "std";

/// Names that must never become property keys or binding names.
pub const BANNED_NAMES: [&str; 3] = ["__proto__", "prototype", "constructor"];

pub fn is_banned_name(name: &str) -> bool {
    BANNED_NAMES.contains(&name)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Equals,
    NotEquals,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    And,
    Or,
    Nullish,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "**",
            BinaryOp::Concat => "&",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectEntry {
    Property { key: String, value: Expr },
    Spread(Expr),
}

/// One `sourceKey: boundName` pair of an object-destructuring parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestructureField {
    pub source_key: String,
    pub bound_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrowParam {
    Name(String),
    Destructure(Vec<DestructureField>),
}

impl ArrowParam {
    /// Names this parameter introduces into the arrow body's scope.
    pub fn bound_names(&self) -> Vec<&str> {
        match self {
            ArrowParam::Name(name) => vec![name.as_str()],
            ArrowParam::Destructure(fields) => {
                fields.iter().map(|f| f.bound_name.as_str()).collect()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// `let { a = 1, b = a + 1 } in body`. Bindings are sequential.
    Let {
        bindings: Vec<(String, Expr)>,
        body: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Object(Vec<ObjectEntry>),
    /// The body is shared so closures can capture it without copying the subtree.
    Arrow {
        params: Vec<ArrowParam>,
        body: Arc<Expr>,
    },
}

impl Expr {
    pub fn number(n: f64) -> Self {
        Expr::Literal(Literal::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    /// The dotted path of a member chain rooted at an identifier, e.g. `std.math.round`.
    pub fn member_path(&self) -> Option<Vec<&str>> {
        match self {
            Expr::Identifier(name) => Some(vec![name.as_str()]),
            Expr::Member { object, property } => {
                let mut path = object.member_path()?;
                path.push(property.as_str());
                Some(path)
            }
            _ => None,
        }
    }

    /// Whether this expression is a member chain rooted at [`STD_ROOT`].
    pub fn is_std_path(&self) -> bool {
        self.member_path()
            .is_some_and(|path| path.first() == Some(&STD_ROOT))
    }
}
