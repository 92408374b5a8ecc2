// Sprig Language Interpreter Library
//
// Lexer, recursive-descent parser, static scope table and tree-walking
// evaluator for the sprig scripting language, plus the runner, session and
// REPL built on top of them.

// Public modules
pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod scope;
pub mod session;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, Instructions, Program, Stmt};
pub use environment::Environment;
pub use error::{ErrorKind, SprigError};
pub use evaluator::Evaluator;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use scope::{Scope, ScopeTable};
pub use session::Session;
pub use value::{Tag, Value};

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::{parse_source, run};
