//! Interactive shell implementation

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::cli::{dispatch, Args, SubCommand};
use crate::error::{ResenError, Result};
use crate::manager::BucketManager;
use crate::output::{format_output, OutputFormat};
use crate::runtime::ContainerRuntime;

/// Read subcommands line by line and run them against `manager`.
pub fn run_repl<R: ContainerRuntime>(manager: &mut BucketManager<R>, format: &OutputFormat) -> Result<()> {
    let mut rl = DefaultEditor::new().map_err(|e| ResenError::Validation(e.to_string()))?;

    println!("Resen v{} - Interactive Mode", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for commands, 'exit' to quit\n");

    loop {
        match rl.readline("resen> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.to_lowercase().as_str() {
                    "exit" | "quit" | "q" => {
                        println!("Goodbye!");
                        break;
                    }
                    "clear" | "cls" => {
                        print!("\x1B[2J\x1B[1;1H");
                        continue;
                    }
                    _ => {}
                }
                let _ = rl.add_history_entry(line);

                let words = match split_line(line) {
                    Ok(words) => words,
                    Err(e) => {
                        eprintln!("Parse error: {}\n", e);
                        continue;
                    }
                };
                let args = match Args::try_parse_from(std::iter::once("resen".to_string()).chain(words)) {
                    Ok(args) => args,
                    // Covers `help` and `--help` as well as real mistakes.
                    Err(e) => {
                        let _ = e.print();
                        continue;
                    }
                };
                if matches!(args.command, SubCommand::Shell) {
                    println!("Already in interactive mode\n");
                    continue;
                }
                let format = if args.json { &OutputFormat::Json } else { format };
                match dispatch(manager, args.command) {
                    Ok(report) => {
                        let output = format_output(&report, format);
                        if !output.is_empty() {
                            println!("{}\n", output);
                        }
                    }
                    Err(e) => eprintln!("Error: {}\n", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Split a line into words, honouring single and double quotes.
fn split_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
