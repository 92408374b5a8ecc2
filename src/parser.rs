use crate::ast::{
    is_global_name, Assign, BinaryOp, Expr, FunctionDef, If, Instructions, Location, NotOp,
    Program, RelationalOp, Stmt, Var,
};
use crate::error::SprigError;
use crate::lexer::{Token, TokenKind};
use crate::scope::ScopeTable;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// `Ok(None)` means the production did not match and the cursor is back
/// where it was on entry. `Err` is a hard failure.
type ParseResult<T> = Result<Option<T>, SprigError>;

/// Cursor into the logical lines: which line, and which token on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub index: usize,
}

/// Recursive-descent parser over logical lines of tokens.
///
/// Builds the AST and the scope table in one pass. Productions that share a
/// leading token (an assignment and a boolean expression both start with an
/// identifier) are tried in turn; a production that does not match restores
/// the cursor snapshot it took on entry.
///
/// The expression productions that every tier falls back on are memoized
/// per position, so backtracking over nested parentheses or call arguments
/// stays polynomial.
pub struct Parser {
    lines: Vec<Vec<Token>>,
    position: Position,
    scopes: ScopeTable,
    memo: HashMap<(Rule, Position), Option<(Expr, Position)>>,
}

/// Productions whose results are memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Rule {
    Value,
    HighBoolean,
    NumberExpression,
    Call,
}

impl Parser {
    pub fn new(lines: Vec<Vec<Token>>) -> Self {
        Self {
            lines,
            position: Position::default(),
            scopes: ScopeTable::new(),
            memo: HashMap::new(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, SprigError> {
        self.position = Position::default();
        self.scopes = ScopeTable::new();
        self.memo.clear();

        let instructions = self.instructions()?;
        self.memo.clear();

        if self.position.line < self.lines.len() {
            self.position.index = 0;
            if let Some(token) = self.peek() {
                let line = token.line;
                return Err(if token.kind.is_keyword() {
                    SprigError::parse_error_with_help(
                        line,
                        format!("Misplaced keyword '{}' on line {}", token.lexeme, line),
                        "'end', 'else' and 'elif' may only close a block opened by 'if', 'while' or 'def'."
                            .to_string(),
                    )
                } else {
                    SprigError::parse_error(
                        line,
                        format!("Undefined symbol '{}' on line {}", token.lexeme, line),
                    )
                });
            }
        }

        debug!(
            statements = instructions.len(),
            globals = self.scopes.global().names().len(),
            locals = self.scopes.program().names().len(),
            "parsed program"
        );

        Ok(Program {
            instructions,
            scopes: std::mem::take(&mut self.scopes),
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parses whole lines until one does not start a statement (end of
    /// input, or a block terminator such as `end`, `else` or `elif`).
    fn instructions(&mut self) -> Result<Instructions, SprigError> {
        let line = self.line_number();
        let mut statements = Vec::new();

        while self.position.line < self.lines.len() {
            self.position.index = 0;
            match self.instruction()? {
                Some(produced) => {
                    self.expect_line_end()?;
                    statements.extend(produced);
                    self.position.line += 1;
                }
                None => break,
            }
        }

        self.position.index = 0;
        Ok(Instructions::new(statements, line))
    }

    fn instruction(&mut self) -> ParseResult<Vec<Stmt>> {
        if let Some(assignments) = self.assign()? {
            return Ok(Some(assignments.into_iter().map(Stmt::Assign).collect()));
        }
        if let Some(stmt) = self.print_statement()? {
            return Ok(Some(vec![stmt]));
        }
        if let Some(stmt) = self.puts_statement()? {
            return Ok(Some(vec![stmt]));
        }
        if let Some(node) = self.if_statement(TokenKind::If)? {
            return Ok(Some(vec![Stmt::If(node)]));
        }
        if let Some(stmt) = self.while_statement()? {
            return Ok(Some(vec![stmt]));
        }
        if let Some(stmt) = self.function_definition()? {
            return Ok(Some(vec![stmt]));
        }
        if let Some(stmt) = self.gets_statement()? {
            return Ok(Some(vec![stmt]));
        }
        if let Some(expr) = self.value()? {
            return Ok(Some(vec![Stmt::Expression(expr)]));
        }
        Ok(None)
    }

    /// `a, b, c = 1, 2` produces one `Assign` per target. Missing values become
    /// `nil`; surplus values are dropped.
    fn assign(&mut self) -> ParseResult<Vec<Assign>> {
        let start = self.snapshot();
        let line = self.line_number();

        let Some(targets) = self.left_values()? else {
            self.restore(start);
            return Ok(None);
        };
        if !self.match_kind(TokenKind::Equal) {
            self.restore(start);
            return Ok(None);
        }

        let mut values = self.right_values()?.into_iter();
        let assignments = targets
            .into_iter()
            .map(|location| {
                let expression = values.next().unwrap_or(Expr::Immediate {
                    value: Value::Nil,
                    line,
                });
                Assign {
                    line: location.var.line,
                    location,
                    expression,
                }
            })
            .collect();

        Ok(Some(assignments))
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Print) {
            return Ok(None);
        }
        let line = self.line_number();
        self.advance();
        let expressions = self.right_values()?;
        Ok(Some(Stmt::Print { expressions, line }))
    }

    fn puts_statement(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Puts) {
            return Ok(None);
        }
        let line = self.line_number();
        self.advance();
        let expressions = self.right_values()?;
        Ok(Some(Stmt::Puts { expressions, line }))
    }

    /// Parses `if` (with its `elif`s, `else` and `end`) or, when `keyword` is
    /// `Elif`, a single `elif` arm.
    fn if_statement(&mut self, keyword: TokenKind) -> ParseResult<If> {
        if !self.check(keyword) {
            return Ok(None);
        }
        let line = self.line_number();
        let name = self.advance().map(|token| token.lexeme).unwrap_or_default();

        let Some(condition) = self.low_boolean_expression()? else {
            return Err(SprigError::parse_error(
                line,
                format!(
                    "The '{}' on line {} is not followed by a boolean expression",
                    name, line
                ),
            ));
        };
        self.expect_line_end()?;
        self.position.line += 1;
        let then_branch = self.instructions()?;

        let mut elifs = Vec::new();
        let mut else_branch = None;

        if keyword == TokenKind::If {
            while let Some(elif) = self.if_statement(TokenKind::Elif)? {
                elifs.push(elif);
            }

            if self.match_kind(TokenKind::Else) {
                self.expect_line_end()?;
                self.position.line += 1;
                else_branch = Some(self.instructions()?);
            }

            if !self.match_kind(TokenKind::End) {
                return Err(self.unterminated("if", line));
            }
        }

        Ok(Some(If {
            condition,
            then_branch,
            elifs,
            else_branch,
            line,
        }))
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::While) {
            return Ok(None);
        }
        let line = self.line_number();
        self.advance();

        let Some(condition) = self.low_boolean_expression()? else {
            return Err(SprigError::parse_error(
                line,
                format!("The 'while' on line {} is not followed by a condition", line),
            ));
        };
        self.expect_line_end()?;
        self.position.line += 1;
        let body = self.instructions()?;

        if !self.match_kind(TokenKind::End) {
            return Err(self.unterminated("while", line));
        }

        Ok(Some(Stmt::While {
            condition,
            body,
            line,
        }))
    }

    fn function_definition(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Def) {
            return Ok(None);
        }
        let line = self.line_number();
        self.advance();

        if !self.check(TokenKind::Identifier) {
            return Err(SprigError::parse_error_with_help(
                line,
                format!("The 'def' on line {} is not followed by a function name", line),
                "Function definitions look like: def name(a, b)".to_string(),
            ));
        }
        let name = self.advance().map(|token| token.lexeme).unwrap_or_default();

        self.declare(&name);
        self.scopes.push_scope(&name);

        let mut parameters = Vec::new();
        if self.match_kind(TokenKind::LeftParen) {
            if let Some(vars) = self.var_list()? {
                parameters = vars.into_iter().map(|var| var.name).collect();
            }
            if !self.match_kind(TokenKind::RightParen) {
                return Err(SprigError::parse_error(
                    line,
                    format!(
                        "The parameter list of '{}' on line {} is not closed by a ')'",
                        name, line
                    ),
                ));
            }
        }
        self.expect_line_end()?;
        self.position.line += 1;
        let body = self.instructions()?;

        if !self.match_kind(TokenKind::End) {
            return Err(self.unterminated("def", line));
        }

        let scope = self.scopes.pop_scope().ok_or_else(|| {
            SprigError::parse_error(line, format!("Scope of '{}' was lost", name))
        })?;

        let function = FunctionDef {
            name: name.clone(),
            parameters,
            body,
            scope,
            line,
        };

        Ok(Some(Stmt::FunctionDefinition {
            location: Location {
                var: Var { name, line },
            },
            function: Rc::new(function),
            line,
        }))
    }

    /// A `gets` standing alone on its line. Anywhere else `gets` is a value.
    fn gets_statement(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Gets) || self.peek_next_kind().is_some() {
            return Ok(None);
        }
        let line = self.line_number();
        self.advance();
        Ok(Some(Stmt::Gets { line }))
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Comma-separated designators. Never fails hard: until the `=` is seen
    /// this may still turn out to be an expression list.
    fn left_values(&mut self) -> ParseResult<Vec<Location>> {
        let Some(first) = self.designator()? else {
            return Ok(None);
        };
        let mut locations = vec![first];

        while self.match_kind(TokenKind::Comma) {
            match self.designator()? {
                Some(location) => locations.push(location),
                None => return Ok(None),
            }
        }

        Ok(Some(locations))
    }

    fn right_values(&mut self) -> Result<Vec<Expr>, SprigError> {
        Ok(self.value_list()?.unwrap_or_default())
    }

    fn value_list(&mut self) -> ParseResult<Vec<Expr>> {
        let Some(first) = self.value()? else {
            return Ok(None);
        };
        let mut values = vec![first];

        while self.match_kind(TokenKind::Comma) {
            let line = self.line_number();
            match self.value()? {
                Some(value) => values.push(value),
                None => {
                    return Err(SprigError::parse_error(
                        line,
                        format!("The ',' on line {} is not followed by a value", line),
                    ));
                }
            }
        }

        Ok(Some(values))
    }

    fn var_list(&mut self) -> ParseResult<Vec<Var>> {
        let Some(first) = self.variable()? else {
            return Ok(None);
        };
        let mut vars = vec![first];

        while self.match_kind(TokenKind::Comma) {
            let line = self.line_number();
            match self.variable()? {
                Some(var) => vars.push(var),
                None => {
                    return Err(SprigError::parse_error(
                        line,
                        format!("The ',' on line {} is not followed by a variable", line),
                    ));
                }
            }
        }

        Ok(Some(vars))
    }

    // ------------------------------------------------------------------
    // Expressions, lowest precedence first
    // ------------------------------------------------------------------

    fn value(&mut self) -> ParseResult<Expr> {
        self.memoized(Rule::Value, Self::parse_value)
    }

    fn parse_value(&mut self) -> ParseResult<Expr> {
        if let Some(expr) = self.low_boolean_expression()? {
            return Ok(Some(expr));
        }
        if let Some(expr) = self.number_expression()? {
            return Ok(Some(expr));
        }
        if let Some(expr) = self.string()? {
            return Ok(Some(expr));
        }
        self.gets_value()
    }

    fn low_boolean_expression(&mut self) -> ParseResult<Expr> {
        let Some(mut left) = self.low_boolean_term()? else {
            return Ok(None);
        };

        while self.check(TokenKind::Or) {
            let line = self.line_number();
            self.advance();
            let Some(right) = self.low_boolean_term()? else {
                return Err(self.missing_operand("or", "term", line));
            };
            left = binary(left, BinaryOp::Or, right, line);
        }

        Ok(Some(left))
    }

    fn low_boolean_term(&mut self) -> ParseResult<Expr> {
        let Some(mut left) = self.low_boolean_factor()? else {
            return Ok(None);
        };

        while self.check(TokenKind::And) {
            let line = self.line_number();
            self.advance();
            let Some(right) = self.low_boolean_factor()? else {
                return Err(self.missing_operand("and", "factor", line));
            };
            left = binary(left, BinaryOp::And, right, line);
        }

        Ok(Some(left))
    }

    fn low_boolean_factor(&mut self) -> ParseResult<Expr> {
        let start = self.snapshot();
        let line = self.line_number();
        let negated = self.match_kind(TokenKind::Not);

        let factor = if let Some(condition) = self.condition()? {
            Some(condition)
        } else if let Some(assignments) = self.assign()? {
            Some(Expr::Assign { assignments, line })
        } else {
            self.high_boolean_expression()?
        };

        match factor {
            Some(expr) if negated => Ok(Some(Expr::Not {
                operator: NotOp::Not,
                operand: Box::new(expr),
                line,
            })),
            Some(expr) => Ok(Some(expr)),
            None if negated => Err(self.missing_operand("not", "factor", line)),
            None => {
                self.restore(start);
                Ok(None)
            }
        }
    }

    fn high_boolean_expression(&mut self) -> ParseResult<Expr> {
        self.memoized(Rule::HighBoolean, Self::parse_high_boolean_expression)
    }

    fn parse_high_boolean_expression(&mut self) -> ParseResult<Expr> {
        let Some(mut left) = self.high_boolean_term()? else {
            return Ok(None);
        };

        while self.check(TokenKind::OrOr) {
            let line = self.line_number();
            self.advance();
            let Some(right) = self.high_boolean_term()? else {
                return Err(self.missing_operand("||", "term", line));
            };
            left = binary(left, BinaryOp::OrOr, right, line);
        }

        Ok(Some(left))
    }

    fn high_boolean_term(&mut self) -> ParseResult<Expr> {
        let Some(mut left) = self.high_boolean_factor()? else {
            return Ok(None);
        };

        while self.check(TokenKind::AndAnd) {
            let line = self.line_number();
            self.advance();
            let Some(right) = self.high_boolean_factor()? else {
                return Err(self.missing_operand("&&", "factor", line));
            };
            left = binary(left, BinaryOp::AndAnd, right, line);
        }

        Ok(Some(left))
    }

    /// `!`-prefixed or bare `true`/`false`/`nil`, a name reference, or a
    /// parenthesized boolean expression. A factor directly followed by an
    /// arithmetic operator belongs to a number expression instead.
    fn high_boolean_factor(&mut self) -> ParseResult<Expr> {
        if self.peek().is_none() {
            return Ok(None);
        }
        let start = self.snapshot();
        let line = self.line_number();
        let negated = self.match_kind(TokenKind::Bang);

        let factor = if let Some(expr) = self.boolean()? {
            Some(expr)
        } else if let Some(expr) = self.nil_value()? {
            Some(expr)
        } else if let Some(expr) = self.call()? {
            Some(expr)
        } else if self.match_kind(TokenKind::LeftParen) {
            match self.low_boolean_expression()? {
                Some(inner) if self.match_kind(TokenKind::RightParen) => Some(inner),
                _ => {
                    self.restore(start);
                    return Ok(None);
                }
            }
        } else if negated {
            return Err(self.missing_operand("!", "factor", line));
        } else {
            None
        };

        let Some(expr) = factor else {
            self.restore(start);
            return Ok(None);
        };

        if self.peek_kind().is_some_and(TokenKind::is_number_operator) {
            self.restore(start);
            return Ok(None);
        }

        if negated {
            Ok(Some(Expr::Not {
                operator: NotOp::Bang,
                operand: Box::new(expr),
                line,
            }))
        } else {
            Ok(Some(expr))
        }
    }

    fn condition(&mut self) -> ParseResult<Expr> {
        if let Some(expr) = self.value_condition()? {
            return Ok(Some(expr));
        }
        self.number_condition()
    }

    /// `is`, `==` and `!=` accept any kind of operand.
    fn value_condition(&mut self) -> ParseResult<Expr> {
        let start = self.snapshot();
        let Some(left) = self.condition_value()? else {
            return Ok(None);
        };

        let operator = match self.peek_kind() {
            Some(TokenKind::Is) => RelationalOp::Is,
            Some(TokenKind::EqualEqual) => RelationalOp::Equal,
            Some(TokenKind::BangEqual) => RelationalOp::NotEqual,
            _ => {
                self.restore(start);
                return Ok(None);
            }
        };
        let line = self.line_number();
        self.advance();

        let Some(right) = self.condition_value()? else {
            return Err(SprigError::parse_error(
                line,
                format!(
                    "The '{}' on line {} is not followed by an expression",
                    operator, line
                ),
            ));
        };

        Ok(Some(Expr::Condition {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            line,
        }))
    }

    /// `>`, `<`, `>=` and `<=` between number expressions. String operands
    /// parse too and fail when evaluated.
    fn number_condition(&mut self) -> ParseResult<Expr> {
        let start = self.snapshot();
        let Some(left) = self.ordering_operand()? else {
            return Ok(None);
        };

        let operator = match self.peek_kind() {
            Some(TokenKind::Greater) => RelationalOp::Greater,
            Some(TokenKind::Less) => RelationalOp::Less,
            Some(TokenKind::GreaterEqual) => RelationalOp::GreaterEqual,
            Some(TokenKind::LessEqual) => RelationalOp::LessEqual,
            _ => {
                self.restore(start);
                return Ok(None);
            }
        };
        let line = self.line_number();
        self.advance();

        let Some(right) = self.ordering_operand()? else {
            return Err(SprigError::parse_error(
                line,
                format!(
                    "The '{}' on line {} is not followed by a number expression",
                    operator, line
                ),
            ));
        };

        Ok(Some(Expr::Condition {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            line,
        }))
    }

    fn ordering_operand(&mut self) -> ParseResult<Expr> {
        if let Some(expr) = self.number_expression()? {
            return Ok(Some(expr));
        }
        self.string()
    }

    fn condition_value(&mut self) -> ParseResult<Expr> {
        if let Some(expr) = self.number_expression()? {
            return Ok(Some(expr));
        }
        if let Some(expr) = self.high_boolean_expression()? {
            return Ok(Some(expr));
        }
        if let Some(expr) = self.string()? {
            return Ok(Some(expr));
        }
        self.gets_value()
    }

    fn number_expression(&mut self) -> ParseResult<Expr> {
        self.memoized(Rule::NumberExpression, Self::parse_number_expression)
    }

    /// Terms joined by `+`/`-`. A leading `-` is parsed as `0 - term`.
    fn parse_number_expression(&mut self) -> ParseResult<Expr> {
        if self.peek().is_none() {
            return Ok(None);
        }
        let start = self.snapshot();

        let mut left = if self.check(TokenKind::Minus) {
            let line = self.line_number();
            self.advance();
            let Some(term) = self.number_term()? else {
                return Err(self.missing_operand("-", "term", line));
            };
            binary(integer(0, line), BinaryOp::Subtract, term, line)
        } else {
            match self.number_term()? {
                Some(term) => term,
                None => {
                    self.restore(start);
                    return Ok(None);
                }
            }
        };

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            let line = self.line_number();
            self.advance();
            let Some(right) = self.number_term()? else {
                return Err(self.missing_operand(&operator.to_string(), "term", line));
            };
            left = binary(left, operator, right, line);
        }

        Ok(Some(left))
    }

    /// Factors joined by `*`, `**`, `/` and `%`, all at the same precedence.
    fn number_term(&mut self) -> ParseResult<Expr> {
        let Some(mut left) = self.number_factor()? else {
            return Ok(None);
        };

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Multiply,
                Some(TokenKind::StarStar) => BinaryOp::Power,
                Some(TokenKind::Slash) => BinaryOp::Divide,
                Some(TokenKind::Percent) => BinaryOp::Modulo,
                _ => break,
            };
            let line = self.line_number();
            self.advance();
            let Some(right) = self.number_factor()? else {
                return Err(self.missing_operand(&operator.to_string(), "factor", line));
            };
            left = binary(left, operator, right, line);
        }

        Ok(Some(left))
    }

    fn number_factor(&mut self) -> ParseResult<Expr> {
        if let Some(expr) = self.number()? {
            return Ok(Some(expr));
        }
        if let Some(expr) = self.call()? {
            return Ok(Some(expr));
        }

        if self.check(TokenKind::Minus) {
            let line = self.line_number();
            self.advance();
            let Some(factor) = self.number_factor()? else {
                return Err(self.missing_operand("-", "factor", line));
            };
            return Ok(Some(binary(
                integer(0, line),
                BinaryOp::Subtract,
                factor,
                line,
            )));
        }

        if self.check(TokenKind::LeftParen) {
            let start = self.snapshot();
            let line = self.line_number();
            self.advance();

            let inner = if let Some(assignments) = self.assign()? {
                Some(Expr::Assign { assignments, line })
            } else {
                self.number_expression()?
            };

            return match inner {
                Some(expr) if self.match_kind(TokenKind::RightParen) => Ok(Some(expr)),
                _ => {
                    // Might still be a parenthesized boolean expression.
                    self.restore(start);
                    Ok(None)
                }
            };
        }

        Ok(None)
    }

    fn call(&mut self) -> ParseResult<Expr> {
        self.memoized(Rule::Call, Self::parse_call)
    }

    /// A name reference, optionally with a parenthesized argument list.
    fn parse_call(&mut self) -> ParseResult<Expr> {
        if !self.check(TokenKind::Identifier) {
            return Ok(None);
        }
        let line = self.line_number();
        let name = self.advance().map(|token| token.lexeme).unwrap_or_default();

        let mut args = Vec::new();
        if self.match_kind(TokenKind::LeftParen) {
            if let Some(values) = self.value_list()? {
                args = values;
            }
            if !self.match_kind(TokenKind::RightParen) {
                return Err(SprigError::parse_error_with_help(
                    line,
                    format!(
                        "The argument list of '{}' on line {} is not closed by a ')'",
                        name, line
                    ),
                    "Function calls look like: name(arg1, arg2)".to_string(),
                ));
            }
        }

        Ok(Some(Expr::Call { name, args, line }))
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    fn designator(&mut self) -> ParseResult<Location> {
        Ok(self.variable()?.map(|var| Location { var }))
    }

    /// Every variable parsed is declared as a side effect, even when the
    /// production around it later backtracks.
    fn variable(&mut self) -> ParseResult<Var> {
        if !self.check(TokenKind::Identifier) {
            return Ok(None);
        }
        let Some(token) = self.advance() else {
            return Ok(None);
        };
        self.declare(&token.lexeme);
        Ok(Some(Var {
            name: token.lexeme,
            line: token.line,
        }))
    }

    fn number(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek().cloned() else {
            return Ok(None);
        };
        let value = match token.kind {
            TokenKind::Integer => Value::Integer(token.lexeme.parse().map_err(|_| {
                SprigError::parse_error(
                    token.line,
                    format!("Invalid integer '{}' on line {}", token.lexeme, token.line),
                )
            })?),
            TokenKind::Float => Value::Float(token.lexeme.parse().map_err(|_| {
                SprigError::parse_error(
                    token.line,
                    format!("Invalid float '{}' on line {}", token.lexeme, token.line),
                )
            })?),
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(Expr::Immediate {
            value,
            line: token.line,
        }))
    }

    fn string(&mut self) -> ParseResult<Expr> {
        if !self.check(TokenKind::String) {
            return Ok(None);
        }
        Ok(self.advance().map(|token| Expr::Immediate {
            value: Value::String(token.lexeme),
            line: token.line,
        }))
    }

    fn boolean(&mut self) -> ParseResult<Expr> {
        let value = match self.peek_kind() {
            Some(TokenKind::True) => true,
            Some(TokenKind::False) => false,
            _ => return Ok(None),
        };
        Ok(self.advance().map(|token| Expr::Immediate {
            value: Value::Boolean(value),
            line: token.line,
        }))
    }

    fn nil_value(&mut self) -> ParseResult<Expr> {
        if !self.check(TokenKind::Nil) {
            return Ok(None);
        }
        Ok(self.advance().map(|token| Expr::Immediate {
            value: Value::Nil,
            line: token.line,
        }))
    }

    fn gets_value(&mut self) -> ParseResult<Expr> {
        if !self.check(TokenKind::Gets) {
            return Ok(None);
        }
        Ok(self.advance().map(|token| Expr::Gets { line: token.line }))
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    /// Runs `parse` at the current position once and replays its outcome on
    /// later attempts there. Names the first attempt declared stay declared.
    /// Hard errors end the parse, so they are never stored.
    fn memoized(
        &mut self,
        rule: Rule,
        parse: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let start = self.snapshot();
        if let Some(entry) = self.memo.get(&(rule, start)) {
            return Ok(match entry.clone() {
                Some((expr, end)) => {
                    self.restore(end);
                    Some(expr)
                }
                None => None,
            });
        }

        let result = parse(self)?;
        if result.is_none() {
            self.restore(start);
        }
        let entry = result.clone().map(|expr| (expr, self.snapshot()));
        self.memo.insert((rule, start), entry);
        Ok(result)
    }

    fn declare(&mut self, name: &str) {
        if is_global_name(name) {
            self.scopes.declare_global(name);
        } else {
            self.scopes.declare(name);
        }
    }

    fn snapshot(&self) -> Position {
        self.position
    }

    fn restore(&mut self, position: Position) {
        self.position = position;
    }

    fn peek(&self) -> Option<&Token> {
        self.lines
            .get(self.position.line)
            .and_then(|line| line.get(self.position.index))
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn peek_next_kind(&self) -> Option<TokenKind> {
        self.lines
            .get(self.position.line)
            .and_then(|line| line.get(self.position.index + 1))
            .map(|token| token.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.position.index += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the current token. Never moves past the end of the line.
    fn advance(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.position.index += 1;
        }
        token
    }

    /// Line of the current token, falling back to the end of the current
    /// line and then to the last line of input.
    fn line_number(&self) -> u32 {
        if let Some(token) = self.peek() {
            return token.line;
        }
        self.lines
            .get(self.position.line)
            .or_else(|| self.lines.last())
            .and_then(|line| line.last())
            .map_or(1, |token| token.line)
    }

    fn expect_line_end(&self) -> Result<(), SprigError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(SprigError::parse_error_with_help(
                token.line,
                format!("Unexpected token '{}' on line {}", token.lexeme, token.line),
                "Each statement must be on its own line.".to_string(),
            )),
        }
    }

    fn missing_operand(&self, operator: &str, what: &str, line: u32) -> SprigError {
        SprigError::parse_error(
            line,
            format!(
                "The '{}' on line {} is not followed by a {}",
                operator, line, what
            ),
        )
    }

    fn unterminated(&self, keyword: &str, line: u32) -> SprigError {
        SprigError::parse_error_with_help(
            line,
            format!(
                "The '{}' on line {} is not terminated by an 'end'",
                keyword, line
            ),
            format!("Close the '{}' block with 'end' on its own line.", keyword),
        )
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr, line: u32) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        operator,
        right: Box::new(right),
        line,
    }
}

fn integer(value: i64, line: u32) -> Expr {
    Expr::Immediate {
        value: Value::Integer(value),
        line,
    }
}
