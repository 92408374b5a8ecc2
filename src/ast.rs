use crate::scope::{Scope, ScopeTable};
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// An ordered block of statements: the program root or a block body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instructions {
    pub statements: Vec<Stmt>,
    pub line: u32,
}

impl Instructions {
    pub fn new(statements: Vec<Stmt>, line: u32) -> Self {
        Self { statements, line }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The statements from `start` on, as their own block.
    pub fn tail(&self, start: usize) -> Instructions {
        let statements = self.statements.get(start..).unwrap_or_default().to_vec();
        let line = statements.first().map_or(self.line, Stmt::line);
        Instructions::new(statements, line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign(Assign),
    Print {
        expressions: Vec<Expr>,
        line: u32,
    },
    Puts {
        expressions: Vec<Expr>,
        line: u32,
    },
    If(If),
    While {
        condition: Expr,
        body: Instructions,
        line: u32,
    },
    FunctionDefinition {
        location: Location,
        function: Rc<FunctionDef>,
        line: u32,
    },
    Gets {
        line: u32,
    },
    Expression(Expr),
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Assign(assign) => assign.line,
            Stmt::Print { line, .. } => *line,
            Stmt::Puts { line, .. } => *line,
            Stmt::If(node) => node.line,
            Stmt::While { line, .. } => *line,
            Stmt::FunctionDefinition { line, .. } => *line,
            Stmt::Gets { line } => *line,
            Stmt::Expression(expr) => expr.line(),
        }
    }
}

/// A single `target = value` store. Multi-target assignments are lowered to
/// one `Assign` per target.
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub location: Location,
    pub expression: Expr,
    pub line: u32,
}

/// `if`/`elif` node. Each `elif` is itself an `If` with no branches of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Expr,
    pub then_branch: Instructions,
    pub elifs: Vec<If>,
    pub else_branch: Option<Instructions>,
    pub line: u32,
}

/// A storage destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub var: Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub line: u32,
}

/// A leading `$` selects the global environment.
pub fn is_global_name(name: &str) -> bool {
    name.starts_with('$')
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Instructions,
    /// The function's own scope, captured when the definition was parsed.
    pub scope: Scope,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Immediate {
        value: Value,
        line: u32,
    },
    /// A name reference; calls the function when the binding holds one.
    Call {
        name: String,
        args: Vec<Expr>,
        line: u32,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        line: u32,
    },
    Not {
        operator: NotOp,
        operand: Box<Expr>,
        line: u32,
    },
    Condition {
        left: Box<Expr>,
        operator: RelationalOp,
        right: Box<Expr>,
        line: u32,
    },
    Gets {
        line: u32,
    },
    /// Assignment used in expression position, e.g. `(x = 3) + 1`.
    Assign {
        assignments: Vec<Assign>,
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Immediate { line, .. } => *line,
            Expr::Call { line, .. } => *line,
            Expr::Binary { line, .. } => *line,
            Expr::Not { line, .. } => *line,
            Expr::Condition { line, .. } => *line,
            Expr::Gets { line } => *line,
            Expr::Assign { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Power,
    Divide,
    Modulo,
    And,
    Or,
    AndAnd,
    OrOr,
}

impl BinaryOp {
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::And | BinaryOp::Or | BinaryOp::AndAnd | BinaryOp::OrOr
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Power => "**",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::AndAnd => "&&",
            BinaryOp::OrOr => "||",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOp {
    Is,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl fmt::Display for RelationalOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            RelationalOp::Is => "is",
            RelationalOp::Equal => "==",
            RelationalOp::NotEqual => "!=",
            RelationalOp::Greater => ">",
            RelationalOp::Less => "<",
            RelationalOp::GreaterEqual => ">=",
            RelationalOp::LessEqual => "<=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotOp {
    /// `!`, the high-precedence form.
    Bang,
    /// `not`, the low-precedence form.
    Not,
}

impl fmt::Display for NotOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotOp::Bang => write!(f, "!"),
            NotOp::Not => write!(f, "not"),
        }
    }
}

/// The result of one parse: the root block and the scopes it declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub instructions: Instructions,
    pub scopes: ScopeTable,
}
