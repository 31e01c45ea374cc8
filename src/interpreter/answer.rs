//! Driving a query to successive answers, and printing the bindings of its
//! variables (§4.11). Pulls one answer at a time; the caller (the REPL, or
//! a test) decides whether to ask for another by calling
//! [`QueryRun::next_answer`] again, which backtracks once before resuming.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::Write as _;

use crate::pool::{ConstantPool, Symbol};
use crate::program::Program;
use crate::word::{self, Tag};

use super::backtrack::backtrack;
use super::dispatch::{step, StepOutcome};
use super::Machine;

/// Maps a query's local-stack variable offsets (relative to its frame base,
/// which is always the first frame pushed by `reset`) to the source names
/// the query compiler assigned them, in the order they first occurred.
#[derive(Debug, Clone, Default)]
pub struct QueryVars {
    pub offsets: Vec<(u32, String)>,
}

/// One binding in a printed answer: the query variable's name and its term,
/// rendered per §4.11.
pub type Bindings = Vec<(String, String)>;

/// Drives one compiled query to successive answers against a shared
/// [`Program`]. Construction runs no instructions; the first call to
/// [`next_answer`](Self::next_answer) runs the machine from `query_addr`.
pub struct QueryRun<'p> {
    program: &'p mut Program,
    machine: Machine,
    vars: QueryVars,
    started: bool,
}

/// Construct a [`QueryRun`] over a compiled query, ready for
/// [`QueryRun::next_answer`]. A thin free function so callers outside this
/// module (the REPL, integration tests) don't need to name `QueryRun` itself.
pub fn run_query<'p>(program: &'p mut Program, query_addr: usize, vars: QueryVars) -> QueryRun<'p> {
    QueryRun::new(program, query_addr, vars)
}

impl<'p> QueryRun<'p> {
    pub fn new(program: &'p mut Program, query_addr: usize, vars: QueryVars) -> Self {
        let mut machine = Machine::new();
        machine.reset(query_addr);
        Self {
            program,
            machine,
            vars,
            started: false,
        }
    }

    /// Run to the next answer, or `None` once backtracking is exhausted.
    pub fn next_answer(&mut self) -> Option<Bindings> {
        if self.started {
            match backtrack(&mut self.machine, &mut self.program.memory, &self.program.pool) {
                Ok(addr) => self.machine.addr = addr,
                Err(_) => return None,
            }
        }
        self.started = true;

        loop {
            match step(&mut self.machine, self.program) {
                StepOutcome::Continue => continue,
                StepOutcome::Answer => return Some(self.walk_bindings()),
                StepOutcome::Fail => {
                    match backtrack(&mut self.machine, &mut self.program.memory, &self.program.pool)
                    {
                        Ok(addr) => self.machine.addr = addr,
                        Err(_) => return None,
                    }
                }
            }
        }
    }

    fn walk_bindings(&self) -> Bindings {
        let base = crate::consts::LOCAL_START;
        let mut namer = FreshVarNamer::default();
        self.vars
            .offsets
            .iter()
            .map(|(offset, name)| {
                let addr = base + *offset as usize;
                let term = walk_term(&self.program.memory, &self.program.pool, addr, &mut namer);
                (name.clone(), term)
            })
            .collect()
    }
}

/// Generates stable `?0`, `?1`, … names for unbound variables within one
/// answer, so the same cell prints identically wherever it recurs.
#[derive(Default)]
struct FreshVarNamer {
    seen: HashMap<usize, String>,
    next: u32,
}

impl FreshVarNamer {
    fn name_for(&mut self, addr: usize) -> String {
        if let Some(existing) = self.seen.get(&addr) {
            return existing.clone();
        }
        let name = format!("?{}", self.next);
        self.next += 1;
        self.seen.insert(addr, name.clone());
        name
    }
}

/// Render the term rooted at `addr`: REF -> a fresh per-answer name, CONS ->
/// the bare atom name, FUNC/STR -> `name(arg1, ..., argN)` (§4.11).
fn walk_term(
    memory: &crate::memory::Memory,
    pool: &ConstantPool,
    addr: usize,
    namer: &mut FreshVarNamer,
) -> String {
    let target = super::unify::deref(memory, addr);
    let w = memory.read(target);
    match Tag::try_from(word::tag_byte(w)) {
        Ok(Tag::Ref) => namer.name_for(target),
        Ok(Tag::Cons) => pool.symbol(word::value(w)).name().to_string(),
        Ok(Tag::Str) => {
            let func_addr = word::value(w) as usize;
            let func_word = memory.read(func_addr);
            let func_index = word::value(func_word);
            let symbol = pool.symbol(func_index);
            let arity = symbol.arity();
            let name = symbol.name().to_string();
            let mut out = String::new();
            write!(out, "{name}(").unwrap();
            for i in 1..=arity as usize {
                if i > 1 {
                    out.push_str(", ");
                }
                out.push_str(&walk_term(memory, pool, func_addr + i, namer));
            }
            out.push(')');
            out
        }
        Ok(Tag::Lis) => {
            let pair = word::value(w) as usize;
            let head = walk_term(memory, pool, pair, namer);
            let tail = walk_term(memory, pool, pair + 1, namer);
            format!("[{head}|{tail}]")
        }
        Ok(Tag::Func) => panic!("FUNC cell reached directly by the answer walker"),
        Err(other) => panic!("malformed cell tag {other} at address {target}"),
    }
}

/// Render the insertion-order bindings of §4.11 as one logical REPL line,
/// without the trailing `yes`/`no` (the caller appends that per §6.3).
pub fn format_bindings(bindings: &Bindings) -> String {
    let mut out = String::new();
    for (name, term) in bindings {
        write!(out, "{name} = {term} ").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{opcode, GLOBAL_START, LOCAL_START};
    use crate::word::Tag;

    #[test]
    fn ground_fact_with_no_variables_reports_empty_bindings() {
        let mut program = Program::new();
        let at = program.write_ins2(opcode::ENTER, 0);
        program.write_ins1(opcode::EXIT);
        let mut run = QueryRun::new(&mut program, at, QueryVars::default());
        let answer = run.next_answer().expect("one answer");
        assert!(answer.is_empty());
        assert!(run.next_answer().is_none());
    }

    #[test]
    fn compound_of_atoms_prints_bare_functor_and_args() {
        let mut program = Program::new();
        let foo = program.pool.get_or_insert_functor("point", 2);
        let a = program.pool.get_or_insert_functor("a", 0);
        let b = program.pool.get_or_insert_functor("b", 0);
        // Build point(a, b) directly on the global stack, as if copied by COPY mode.
        program.memory.write(GLOBAL_START, word::pack(Tag::Func as u8, foo));
        program
            .memory
            .write(GLOBAL_START + 1, word::pack(Tag::Cons as u8, a));
        program
            .memory
            .write(GLOBAL_START + 2, word::pack(Tag::Cons as u8, b));
        program.memory.write(
            LOCAL_START,
            word::pack(Tag::Str as u8, GLOBAL_START as u32),
        );

        let mut namer = FreshVarNamer::default();
        let rendered = walk_term(&program.memory, &program.pool, LOCAL_START, &mut namer);
        assert_eq!(rendered, "point(a, b)");
    }
}
