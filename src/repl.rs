use crate::lexer::is_incomplete;
use crate::session::Session;
use std::io::{self, Write};

/// Interactive loop over one `Session`, so variables and functions survive
/// from one input to the next.
pub fn start() {
    println!("Sprig {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    let mut session = Session::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "> " } else { "... " };
        print!("{}", prompt);
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match session.read_line(&mut line) {
            Ok(0) => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                if buffer.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    if command == "exit" || command == "quit" {
                        println!("Goodbye!");
                        break;
                    }
                }

                buffer.push_str(&line);
                if is_incomplete(&buffer) {
                    continue;
                }

                let chunk = std::mem::take(&mut buffer);
                if let Err(error) = session.submit(&chunk) {
                    error.report(session.attempted_source(), None);
                }
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}
