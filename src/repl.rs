//! The read-compile-run loop described at the interface level in §1 and
//! specified in full in §6.3: load a program once, then repeatedly compile
//! a line as a query, run it, and restore the program's bytecode/constant-pool
//! state so query-local growth never accumulates (§5).

use std::io::{self, Write};
use std::path::Path;

use rustyline::error::ReadlineError;
use rustyline::Editor;

use crate::error::FrontendError;
use crate::frontend::compiler::{compile_program, compile_query};
use crate::interpreter::answer::{format_bindings, QueryRun};
use crate::program::Program;

/// Load `path` as a program, then drive the REPL of §6.3 against stdin/stdout
/// until `halt` or end-of-file. Returns an error for anything that should
/// abort the process before or outside the REPL's own per-query recovery:
/// file I/O failure or a compile error in the program itself (§7).
pub fn run(path: &Path) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read {}: {e}", path.display()))?;

    let mut program = Program::new();
    compile_program(&mut program, &source)?;

    let mut rl = Editor::<()>::new()?;

    loop {
        match rl.readline("?- ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "halt" {
                    break;
                }
                let _ = rl.add_history_entry(line);
                run_one_query(&mut program, &mut rl, line);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Compile and run a single query line, restoring the program's memento
/// afterward regardless of how the query ended (§5, §7).
fn run_one_query(program: &mut Program, rl: &mut Editor<()>, line: &str) {
    let memento = program.create_memento();

    match compile_query(program, line) {
        Err(err) => print_frontend_error(&err),
        Ok((addr, vars)) => {
            let mut run = QueryRun::new(program, addr, vars);
            drive_to_completion(&mut run, rl);
        }
    }

    program.set_memento(memento);
}

fn print_frontend_error(err: &FrontendError) {
    println!("{err}");
}

/// Print successive answers per §4.11/§6.3 until the user stops asking for
/// more, or backtracking is exhausted.
fn drive_to_completion(run: &mut QueryRun<'_>, rl: &mut Editor<()>) {
    let mut answer = run.next_answer();
    loop {
        match answer {
            None => {
                println!("no");
                return;
            }
            Some(bindings) => {
                print!("{}", format_bindings(&bindings));
                if bindings.is_empty() {
                    println!("yes");
                    return;
                }
                io::stdout().flush().ok();
                match rl.readline("") {
                    Ok(ref l) if l.trim() == ";" => {
                        answer = run.next_answer();
                    }
                    _ => {
                        println!("yes");
                        return;
                    }
                }
            }
        }
    }
}
