use crate::ast::{
    is_global_name, Assign, BinaryOp, Expr, FunctionDef, If, Instructions, RelationalOp, Stmt,
    Var,
};
use crate::environment::Environment;
use crate::error::SprigError;
use crate::scope::ScopeTable;
use crate::value::Value;
use std::cmp::Ordering;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tracing::{debug, trace};

/// Deepest call nesting allowed before a call fails with a runtime error.
pub const MAX_CALL_DEPTH: usize = 256;

/// Tree-walking evaluator.
///
/// Holds one global environment and a stack of frames. The bottom frame
/// belongs to the top-level program; each call pushes one more. A name is
/// looked up in the globals when it starts with `$` and in the top frame
/// otherwise, never anywhere else.
pub struct Evaluator<W = io::Stdout, R = io::StdinLock<'static>> {
    globals: Environment,
    frames: Vec<Environment>,
    last_value: Value,
    has_run: bool,
    output: W,
    input: R,
}

impl Evaluator {
    /// An evaluator writing to stdout and reading `gets` from stdin.
    pub fn new() -> Self {
        Self::with_io(io::stdout(), io::stdin().lock())
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write, R: BufRead> Evaluator<W, R> {
    pub fn with_io(output: W, input: R) -> Self {
        Self {
            globals: Environment::default(),
            frames: Vec::new(),
            last_value: Value::Nil,
            has_run: false,
            output,
            input,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// The reader `gets` consumes. The REPL reads its own lines from it too,
    /// so both see one buffered stream.
    pub fn input_mut(&mut self) -> &mut R {
        &mut self.input
    }

    /// The value of the most recently evaluated expression.
    pub fn last_value(&self) -> &Value {
        &self.last_value
    }

    /// Current binding of `name`, resolved the same way the program would.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.resolve(name).and_then(|env| env.get(name))
    }

    /// Number of frames on the stack, the program frame included.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Runs `instructions` against fresh environments built from `scopes`.
    pub fn run(&mut self, scopes: &ScopeTable, instructions: &Instructions) -> Result<(), SprigError> {
        self.globals = Environment::from_scope(scopes.global());
        self.frames = vec![Environment::from_scope(scopes.program())];
        self.last_value = Value::Nil;
        self.has_run = true;
        self.execute_block(instructions)
    }

    /// Like [`run`](Self::run), but first carries over every global and
    /// program binding whose name is still declared in `scopes`.
    pub fn migrate_and_run(
        &mut self,
        scopes: &ScopeTable,
        instructions: &Instructions,
    ) -> Result<(), SprigError> {
        if !self.has_run {
            return self.run(scopes, instructions);
        }

        let mut globals = Environment::from_scope(scopes.global());
        let mut program = Environment::from_scope(scopes.program());
        let carried_globals = globals.migrate_from(&self.globals);
        let carried_locals = self
            .frames
            .first()
            .map_or(0, |previous| program.migrate_from(previous));

        debug!(
            globals = globals.len(),
            carried_globals,
            locals = program.len(),
            carried_locals,
            "migrated environments"
        );

        self.globals = globals;
        self.frames = vec![program];
        self.last_value = Value::Nil;
        self.execute_block(instructions)
    }

    fn execute_block(&mut self, instructions: &Instructions) -> Result<(), SprigError> {
        for statement in &instructions.statements {
            self.execute_statement(statement)?;
        }
        Ok(())
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<(), SprigError> {
        match stmt {
            Stmt::Assign(assign) => {
                self.execute_assign(assign)?;
                Ok(())
            }
            Stmt::Print { expressions, line } => {
                let rendered = self.render_all(expressions)?;
                self.write(&rendered.join(" "), *line)
            }
            Stmt::Puts { expressions, line } => {
                if expressions.is_empty() {
                    return self.write("\n", *line);
                }
                let rendered = self.render_all(expressions)?;
                let mut text = String::new();
                for value in rendered {
                    text.push_str(&value);
                    text.push('\n');
                }
                self.write(&text, *line)
            }
            Stmt::If(node) => {
                self.execute_if(node)?;
                Ok(())
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute_block(body)?;
                }
                Ok(())
            }
            Stmt::FunctionDefinition {
                location, function, ..
            } => self.store(&location.var, Value::Function(Rc::clone(function))),
            Stmt::Gets { line } => {
                self.read_line(*line)?;
                Ok(())
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
        }
    }

    /// Runs the first branch whose condition holds. Returns whether any
    /// branch ran.
    fn execute_if(&mut self, node: &If) -> Result<bool, SprigError> {
        if self.evaluate(&node.condition)?.is_truthy() {
            self.execute_block(&node.then_branch)?;
            return Ok(true);
        }

        for elif in &node.elifs {
            if self.execute_if(elif)? {
                return Ok(true);
            }
        }

        if let Some(else_branch) = &node.else_branch {
            self.execute_block(else_branch)?;
            return Ok(true);
        }

        Ok(false)
    }

    fn execute_assign(&mut self, assign: &Assign) -> Result<Value, SprigError> {
        let value = self.evaluate(&assign.expression)?;
        self.store(&assign.location.var, value.clone())?;
        Ok(value)
    }

    fn render_all(&mut self, expressions: &[Expr]) -> Result<Vec<String>, SprigError> {
        let mut rendered = Vec::with_capacity(expressions.len());
        for expr in expressions {
            rendered.push(self.evaluate(expr)?.to_string());
        }
        Ok(rendered)
    }

    fn write(&mut self, text: &str, line: u32) -> Result<(), SprigError> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|error| {
                SprigError::runtime_error(
                    line,
                    format!("Could not write output on line {}: {}", line, error),
                )
            })
    }

    /// Reads one line of input, without its line terminator. Nil at end of
    /// input.
    fn read_line(&mut self, line: u32) -> Result<Value, SprigError> {
        let mut buffer = String::new();
        let read = self.input.read_line(&mut buffer).map_err(|error| {
            SprigError::runtime_error(
                line,
                format!("Could not read input on line {}: {}", line, error),
            )
        })?;

        let value = if read == 0 {
            Value::Nil
        } else {
            Value::String(buffer.trim_end_matches(['\n', '\r']).to_string())
        };
        self.last_value = value.clone();
        Ok(value)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, SprigError> {
        let value = match expr {
            Expr::Immediate { value, .. } => value.clone(),
            Expr::Call { name, args, line } => self.evaluate_call(name, args, *line)?,
            Expr::Binary {
                left,
                operator,
                right,
                line,
            } => {
                // Both sides are always evaluated, boolean operators included.
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(left, *operator, right, *line)?
            }
            Expr::Not {
                operator,
                operand,
                line,
            } => {
                let operand = self.evaluate(operand)?;
                if !operand.tag().is_boolean() {
                    return Err(SprigError::runtime_error(
                        *line,
                        format!(
                            "The expression after the '{}' on line {} is not a boolean value",
                            operator, line
                        ),
                    ));
                }
                Value::Boolean(!operand.is_truthy())
            }
            Expr::Condition {
                left,
                operator,
                right,
                line,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Value::Boolean(compare(&left, *operator, &right, *line)?)
            }
            Expr::Gets { line } => self.read_line(*line)?,
            Expr::Assign { assignments, .. } => {
                let mut value = Value::Nil;
                for assign in assignments {
                    value = self.execute_assign(assign)?;
                }
                value
            }
        };

        self.last_value = value.clone();
        Ok(value)
    }

    /// A name reference. Functions are called; any other binding is
    /// returned as is and the arguments are left unevaluated.
    fn evaluate_call(&mut self, name: &str, args: &[Expr], line: u32) -> Result<Value, SprigError> {
        let callee = self
            .variable(name)
            .cloned()
            .ok_or_else(|| undefined_variable(name, line))?;

        let Value::Function(function) = callee else {
            return Ok(callee);
        };

        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            arguments.push(self.evaluate(arg)?);
        }

        self.call_function(&function, arguments, line)
    }

    fn call_function(
        &mut self,
        function: &FunctionDef,
        arguments: Vec<Value>,
        line: u32,
    ) -> Result<Value, SprigError> {
        if self.frames.len() > MAX_CALL_DEPTH {
            return Err(SprigError::runtime_error_with_help(
                line,
                format!(
                    "Stack level too deep calling '{}' on line {}",
                    function.name, line
                ),
                format!("Calls may nest at most {} deep.", MAX_CALL_DEPTH),
            ));
        }

        debug!(
            function = %function.name,
            arguments = arguments.len(),
            depth = self.frames.len(),
            "call"
        );

        self.last_value = Value::Nil;
        self.frames.push(Environment::from_scope(&function.scope));
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            if let Some(env) = self.resolve_mut(parameter) {
                env.set(parameter, argument);
            }
        }

        let result = self.execute_block(&function.body);
        self.frames.pop();
        result?;

        trace!(function = %function.name, value = %self.last_value, "return");
        Ok(self.last_value.clone())
    }

    fn store(&mut self, var: &Var, value: Value) -> Result<(), SprigError> {
        let stored = self
            .resolve_mut(&var.name)
            .is_some_and(|env| env.set(&var.name, value));
        if stored {
            Ok(())
        } else {
            Err(undefined_variable(&var.name, var.line))
        }
    }

    fn resolve(&self, name: &str) -> Option<&Environment> {
        if is_global_name(name) {
            Some(&self.globals)
        } else {
            self.frames.last()
        }
    }

    fn resolve_mut(&mut self, name: &str) -> Option<&mut Environment> {
        if is_global_name(name) {
            Some(&mut self.globals)
        } else {
            self.frames.last_mut()
        }
    }
}

fn undefined_variable(name: &str, line: u32) -> SprigError {
    SprigError::runtime_error_with_help(
        line,
        format!("Undefined variable '{}' on line {}", name, line),
        "Only globals ('$' names) and names assigned in the same function are visible."
            .to_string(),
    )
}

fn operand_error(side: &str, operator: impl std::fmt::Display, line: u32, what: &str) -> SprigError {
    SprigError::runtime_error(
        line,
        format!(
            "The expression to the {} of the '{}' on line {} is not {}",
            side, operator, line, what
        ),
    )
}

fn compare(left: &Value, operator: RelationalOp, right: &Value, line: u32) -> Result<bool, SprigError> {
    let ordering = || -> Result<Option<Ordering>, SprigError> {
        let l = left
            .as_f64()
            .ok_or_else(|| operand_error("left", operator, line, "a number"))?;
        let r = right
            .as_f64()
            .ok_or_else(|| operand_error("right", operator, line, "a number"))?;
        Ok(match (left, right) {
            (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
            _ => l.partial_cmp(&r),
        })
    };

    Ok(match operator {
        RelationalOp::Is | RelationalOp::Equal => left.structurally_equal(right),
        RelationalOp::NotEqual => !left.structurally_equal(right),
        RelationalOp::Greater => ordering()? == Some(Ordering::Greater),
        RelationalOp::Less => ordering()? == Some(Ordering::Less),
        RelationalOp::GreaterEqual => {
            matches!(ordering()?, Some(Ordering::Greater | Ordering::Equal))
        }
        RelationalOp::LessEqual => matches!(ordering()?, Some(Ordering::Less | Ordering::Equal)),
    })
}

fn binary(left: Value, operator: BinaryOp, right: Value, line: u32) -> Result<Value, SprigError> {
    if operator.is_boolean() {
        if !left.tag().is_boolean() {
            return Err(operand_error("left", operator, line, "a boolean value"));
        }
        if !right.tag().is_boolean() {
            return Err(operand_error("right", operator, line, "a boolean value"));
        }
        let keep_left = match operator {
            BinaryOp::And | BinaryOp::AndAnd => !left.is_truthy(),
            _ => left.is_truthy(),
        };
        return Ok(if keep_left { left } else { right });
    }

    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => integer_arithmetic(*l, operator, *r, line),
        _ => {
            let l = left
                .as_f64()
                .ok_or_else(|| operand_error("left", operator, line, "a number"))?;
            let r = right
                .as_f64()
                .ok_or_else(|| operand_error("right", operator, line, "a number"))?;
            Ok(Value::from_float_result(float_arithmetic(l, operator, r)))
        }
    }
}

fn integer_arithmetic(l: i64, operator: BinaryOp, r: i64, line: u32) -> Result<Value, SprigError> {
    let overflow = || {
        SprigError::runtime_error(
            line,
            format!("Integer overflow in '{}' on line {}", operator, line),
        )
    };
    let division_by_zero = || {
        SprigError::runtime_error(line, format!("Division by zero on line {}", line))
    };

    let result = match operator {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Subtract => l.checked_sub(r),
        BinaryOp::Multiply => l.checked_mul(r),
        BinaryOp::Power => match u32::try_from(r) {
            Ok(exponent) => l.checked_pow(exponent),
            Err(_) if r < 0 => {
                return Ok(Value::from_float_result((l as f64).powf(r as f64)));
            }
            // Exponents past u32 only fit for these bases.
            Err(_) => match l {
                0 | 1 => Some(l),
                -1 => Some(if r % 2 == 0 { 1 } else { -1 }),
                _ => None,
            },
        },
        // Integer division and remainder round toward negative infinity.
        BinaryOp::Divide => {
            if r == 0 {
                return Err(division_by_zero());
            }
            l.checked_div(r).map(|quotient| {
                if l % r != 0 && (l < 0) != (r < 0) {
                    quotient - 1
                } else {
                    quotient
                }
            })
        }
        BinaryOp::Modulo => {
            if r == 0 {
                return Err(division_by_zero());
            }
            // Only i64::MIN % -1 wraps, and its remainder is 0.
            let remainder = l.wrapping_rem(r);
            if remainder != 0 && (remainder < 0) != (r < 0) {
                Some(remainder + r)
            } else {
                Some(remainder)
            }
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::AndAnd | BinaryOp::OrOr => {
            return Err(operand_error("left", operator, line, "a boolean value"));
        }
    };

    result.map(Value::Integer).ok_or_else(overflow)
}

fn float_arithmetic(l: f64, operator: BinaryOp, r: f64) -> f64 {
    match operator {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Power => l.powf(r),
        BinaryOp::Divide => l / r,
        BinaryOp::Modulo => {
            let remainder = l % r;
            if remainder != 0.0 && (remainder < 0.0) != (r < 0.0) {
                remainder + r
            } else {
                remainder
            }
        }
        // Boolean operators never reach arithmetic.
        BinaryOp::And | BinaryOp::Or | BinaryOp::AndAnd | BinaryOp::OrOr => f64::NAN,
    }
}
