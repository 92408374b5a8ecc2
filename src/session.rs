use crate::error::SprigError;
use crate::evaluator::Evaluator;
use crate::runner::parse_source;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Incremental execution of a growing program.
///
/// Every submitted chunk is appended to the source accepted so far and the
/// whole text is parsed again, so a name declared in an earlier chunk keeps
/// its binding. Only the top-level statements that were not executed before
/// are run.
pub struct Session<W = io::Stdout, R = io::StdinLock<'static>> {
    source: String,
    attempt: String,
    executed: usize,
    evaluator: Evaluator<W, R>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::new())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write, R: BufRead> Session<W, R> {
    pub fn with_evaluator(evaluator: Evaluator<W, R>) -> Self {
        Self {
            source: String::new(),
            attempt: String::new(),
            executed: 0,
            evaluator,
        }
    }

    /// All source accepted so far.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The text of the last submission, accepted or not. Error line numbers
    /// refer to this text.
    pub fn attempted_source(&self) -> &str {
        &self.attempt
    }

    pub fn evaluator(&self) -> &Evaluator<W, R> {
        &self.evaluator
    }

    pub fn into_evaluator(self) -> Evaluator<W, R> {
        self.evaluator
    }

    /// Reads one line from the same input `gets` uses.
    pub fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        self.evaluator.input_mut().read_line(line)
    }

    /// Parses the accepted source plus `chunk` and runs the new top-level
    /// statements.
    ///
    /// A chunk that does not lex or parse is dropped and leaves the session
    /// untouched. Once a chunk parses it is kept, even when running it fails.
    pub fn submit(&mut self, chunk: &str) -> Result<(), SprigError> {
        let mut candidate = self.source.clone();
        if !candidate.is_empty() && !candidate.ends_with('\n') {
            candidate.push('\n');
        }
        candidate.push_str(chunk);
        if !candidate.ends_with('\n') {
            candidate.push('\n');
        }
        self.attempt = candidate.clone();

        let program = parse_source(&candidate)?;
        let fresh = program.instructions.tail(self.executed);

        debug!(
            total = program.instructions.len(),
            fresh = fresh.len(),
            "session submission"
        );

        self.source = candidate;
        self.executed = program.instructions.len();
        self.evaluator.migrate_and_run(&program.scopes, &fresh)
    }
}
