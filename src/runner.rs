use crate::ast::Program;
use crate::error::SprigError;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Lexes and parses a whole source text.
pub fn parse_source(source: &str) -> Result<Program, SprigError> {
    let lines = Lexer::new(source).scan_lines()?;
    Parser::new(lines).parse()
}

/// Runs a script once against stdout/stdin. Any error is reported on stderr
/// against `source`; the return value says whether the script succeeded.
pub fn run(source: &str, filename: Option<&str>) -> bool {
    let result = parse_source(source).and_then(|program| {
        let mut evaluator = Evaluator::new();
        evaluator.run(&program.scopes, &program.instructions)
    });

    match result {
        Ok(()) => true,
        Err(error) => {
            error.report(source, filename);
            false
        }
    }
}
