//! Symbol resolution and bytecode emission (§6.2). The spec's three-pass
//! pipeline is folded into two: one pass over a clause assigns each
//! distinct variable name a frame offset and tracks first occurrence as it
//! emits; a final fix-up patches `ENTER`'s frame-size operand once the
//! clause's full variable count is known (it may include variables that
//! first occur in the body, discovered only after the head is compiled).
//!
//! Offset assignment is not plain first-occurrence order: the `arity`
//! top-level head arguments own offsets `0..arity` positionally, one slot
//! per argument, because those are exactly the cells the caller fills in
//! before `CALL`. A head argument that is itself a bare variable gets the
//! offset matching its own position, so its `FIRSTVAR` writes that slot back
//! onto itself; every other variable — one nested inside a compound head
//! argument, or first seen in the body — is numbered from `arity` upward.
//! Reversing this (numbering by first occurrence regardless of position)
//! lets a variable nested in an early head argument claim the offset that
//! rightfully belongs to a later, not-yet-matched sibling argument, so its
//! `FIRSTVAR` overwrites that sibling's cell before MATCH mode ever reads it.
//!
//! Predicate symbols referenced by a body goal are resolved (and, if not
//! yet seen, created empty) at the call site; whether they end up with at
//! least one clause is checked only once the whole program has compiled,
//! since clause order and forward/mutual reference among predicates is
//! unconstrained (§7 "No clauses defined for predicate name/arity").

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::consts::opcode;
use crate::error::FrontendError;
use crate::frontend::ast::Term;
use crate::frontend::parser::Parser;
use crate::interpreter::answer::QueryVars;
use crate::pool::{ClauseRecord, Symbol};
use crate::program::Program;

/// Per-clause variable environment: assigns each distinct name exactly one
/// frame offset, and records whether an occurrence is the first (emits
/// `FIRSTVAR`) or a repeat (emits `VAR`).
struct VarTable {
    offsets: HashMap<String, u32>,
    seen: HashSet<String>,
    next_offset: u32,
}

impl VarTable {
    fn new() -> Self {
        Self {
            offsets: HashMap::new(),
            seen: HashSet::new(),
            next_offset: 0,
        }
    }

    /// Reserve frame offsets `0..head_args.len()` for a clause head's
    /// top-level positional arguments before compiling anything: a head
    /// argument that is itself a bare variable claims the offset matching
    /// its own position (first position wins if the same name appears
    /// twice, e.g. `p(X,X)`); argument positions occupied by a non-variable
    /// term simply reserve their slot unnamed. Every later-assigned offset
    /// (a variable nested in a compound head argument, or first seen in the
    /// body) then starts from `head_args.len()`, so it can never collide
    /// with a not-yet-matched sibling argument's cell.
    fn reserve_positional_params(&mut self, head_args: &[Term]) {
        for (position, arg) in head_args.iter().enumerate() {
            if let Term::Var(name) = arg {
                self.offsets.entry(name.clone()).or_insert(position as u32);
            }
        }
        self.next_offset = head_args.len() as u32;
    }

    fn offset_of(&mut self, name: &str) -> u32 {
        if let Some(&o) = self.offsets.get(name) {
            return o;
        }
        let o = self.next_offset;
        self.next_offset += 1;
        self.offsets.insert(name.to_string(), o);
        o
    }

    fn is_first_occurrence(&mut self, name: &str) -> bool {
        self.seen.insert(name.to_string())
    }
}

/// Compile one term's instructions. The opcodes emitted here are identical
/// whether the term is a head argument or a body-goal argument — the mode
/// (MATCH vs ARG/COPY) that gives them meaning comes from the machine at
/// run time, not from the compiler (§4.10). `on_firstvar` is invoked with
/// each `FIRSTVAR`'s (offset, name) — the query compiler uses it to build
/// the variable-name table of §4.11; clause compilation passes a no-op.
fn compile_term(
    program: &mut Program,
    vars: &mut VarTable,
    term: &Term,
    on_firstvar: &mut dyn FnMut(u32, &str),
) {
    match term {
        Term::Var(name) => {
            let offset = vars.offset_of(name);
            if vars.is_first_occurrence(name) {
                program.write_ins2(opcode::FIRSTVAR, offset);
                on_firstvar(offset, name);
            } else {
                program.write_ins2(opcode::VAR, offset);
            }
        }
        Term::Atom(name) => {
            let idx = program.pool.get_or_insert_functor(name, 0);
            program.write_ins2(opcode::CONSTANT, idx);
        }
        Term::Compound(name, args) => {
            let idx = program.pool.get_or_insert_functor(name, args.len() as u32);
            program.write_ins2(opcode::FUNCTOR, idx);
            for arg in args {
                compile_term(program, vars, arg, on_firstvar);
            }
            program.write_ins1(opcode::POP);
        }
    }
}

fn goal_parts(goal: &Term) -> (&str, &[Term]) {
    match goal {
        Term::Compound(name, args) => (name.as_str(), args.as_slice()),
        Term::Atom(name) => (name.as_str(), &[]),
        Term::Var(_) => panic!("the parser never produces a bare-variable goal"),
    }
}

fn predicate_has_clauses(program: &Program, name: &str, arity: u32) -> bool {
    program
        .pool
        .find_predicate(name, arity)
        .map(|idx| match program.pool.symbol(idx) {
            Symbol::Predicate { clauses, .. } => !clauses.is_empty(),
            _ => false,
        })
        .unwrap_or(false)
}

/// Compile one clause: head-argument instructions in source order, then
/// `ENTER`, then each body goal's argument instructions followed by its
/// `CALL`, then `EXIT` (the layout resolved in SPEC_FULL.md for §6.2).
fn compile_clause(
    program: &mut Program,
    clause: &crate::frontend::ast::Clause,
    called: &mut Vec<(String, u32)>,
) {
    let mut vars = VarTable::new();
    let clause_start = program.codeptr();

    let (head_name, head_args) = goal_parts(&clause.head);
    let head_name = head_name.to_string();
    let head_arity = head_args.len() as u32;
    vars.reserve_positional_params(head_args);
    for arg in head_args {
        compile_term(program, &mut vars, arg, &mut |_, _| {});
    }

    let enter_at = program.write_ins2(opcode::ENTER, 0);

    for goal in &clause.body {
        let (name, args) = goal_parts(goal);
        let (name, arity) = (name.to_string(), args.len() as u32);
        for arg in args {
            compile_term(program, &mut vars, arg, &mut |_, _| {});
        }
        let pred_idx = program.pool.get_or_insert_predicate(&name, arity);
        called.push((name, arity));
        program.write_ins2(opcode::CALL, pred_idx);
    }
    program.write_ins1(opcode::EXIT);

    // size = the head_arity positional slots plus every variable numbered
    // from head_arity upward (nested in the head, or first seen in the body).
    program.patch_operand(enter_at + 1, vars.next_offset);

    let head_pred = program.pool.get_or_insert_predicate(&head_name, head_arity);
    let locals = vars.next_offset - head_arity;
    debug_assert_eq!(
        head_arity + locals,
        vars.next_offset,
        "ClauseRecord params+locals must match the patched ENTER frame size"
    );
    // `params`/`locals` are descriptive only — the interpreter sizes every
    // frame from the patched ENTER operand above, never from this record.
    program.pool.add_clause(
        head_pred,
        ClauseRecord {
            params: head_arity,
            locals,
            code_ptr: clause_start,
        },
    );
}

/// Compile every clause of a program's source text into the shared
/// `Program`'s code area and constant pool.
pub fn compile_program(program: &mut Program, source: &str) -> Result<(), FrontendError> {
    let mut parser = Parser::new(source)?;
    let clauses = parser.parse_program()?;

    let mut called = Vec::new();
    for clause in &clauses {
        compile_clause(program, clause, &mut called);
    }

    for (name, arity) in called.into_iter().unique() {
        if !predicate_has_clauses(program, &name, arity) {
            return Err(FrontendError::UndefinedPredicate { name, arity });
        }
    }

    Ok(())
}

/// Compile a query against an already-loaded program. Returns the code
/// address to run it from and the table mapping its variables' frame
/// offsets to their source names, for the answer walker (§4.11).
pub fn compile_query(program: &mut Program, source: &str) -> Result<(usize, QueryVars), FrontendError> {
    let mut parser = Parser::new(source)?;
    let goals = parser.parse_query()?;

    let mut vars = VarTable::new();
    let mut query_vars = QueryVars::default();
    let start = program.codeptr();
    let enter_at = program.write_ins2(opcode::ENTER, 0);

    for goal in &goals {
        let (name, args) = goal_parts(goal);
        let (name, arity) = (name.to_string(), args.len() as u32);
        if !predicate_has_clauses(program, &name, arity) {
            return Err(FrontendError::UndefinedPredicate { name, arity });
        }
        for arg in args {
            compile_term(program, &mut vars, arg, &mut |offset, var_name| {
                query_vars.offsets.push((offset, var_name.to_string()));
            });
        }
        let pred_idx = program
            .pool
            .find_predicate(&name, arity)
            .expect("checked above to be defined");
        program.write_ins2(opcode::CALL, pred_idx);
    }
    program.write_ins1(opcode::EXIT);
    program.patch_operand(enter_at + 1, vars.next_offset);

    Ok((start, query_vars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_fact_compiles_and_runs_to_one_answer() {
        let mut program = Program::new();
        compile_program(&mut program, "father(zeus, ares).").unwrap();
        let (addr, vars) = compile_query(&mut program, "father(zeus, ares).").unwrap();
        assert!(vars.offsets.is_empty());
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        assert!(run.next_answer().is_some());
        assert!(run.next_answer().is_none());
    }

    #[test]
    fn ground_fact_fails_on_mismatched_query() {
        let mut program = Program::new();
        compile_program(&mut program, "father(zeus, ares).").unwrap();
        let (addr, vars) = compile_query(&mut program, "father(ares, zeus).").unwrap();
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        assert!(run.next_answer().is_none());
    }

    #[test]
    fn single_variable_binds_to_the_fact_argument() {
        let mut program = Program::new();
        compile_program(&mut program, "mother(hera, ares).").unwrap();
        let (addr, vars) = compile_query(&mut program, "mother(hera, X).").unwrap();
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        let answer = run.next_answer().unwrap();
        assert_eq!(answer, vec![("X".to_string(), "ares".to_string())]);
    }

    #[test]
    fn multiple_facts_enumerate_in_order_on_backtrack() {
        let mut program = Program::new();
        compile_program(&mut program, "father(zeus,ares). father(zeus,dionisius).").unwrap();
        let (addr, vars) = compile_query(&mut program, "father(zeus, Y).").unwrap();
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        assert_eq!(
            run.next_answer().unwrap(),
            vec![("Y".to_string(), "ares".to_string())]
        );
        assert_eq!(
            run.next_answer().unwrap(),
            vec![("Y".to_string(), "dionisius".to_string())]
        );
        assert!(run.next_answer().is_none());
    }

    #[test]
    fn rule_chaining_through_two_predicates_succeeds() {
        let mut program = Program::new();
        compile_program(
            &mut program,
            "parent(X,Y) :- father(X,Y). \
             father(zeus,ares). father(ares,harmonia). \
             grandparent(X,Y) :- parent(X,Z), parent(Z,Y).",
        )
        .unwrap();
        let (addr, vars) = compile_query(&mut program, "grandparent(zeus, harmonia).").unwrap();
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        assert!(run.next_answer().is_some());
    }

    #[test]
    fn recursive_append_builds_the_expected_compound() {
        let mut program = Program::new();
        compile_program(
            &mut program,
            "append([],YS,YS). \
             append(cons(X,XS),YS,cons(X,ZS)) :- append(XS,YS,ZS).",
        )
        .unwrap();
        let (addr, vars) =
            compile_query(&mut program, "append(cons(a,[]), cons(b,[]), X).").unwrap();
        let mut run = crate::interpreter::answer::QueryRun::new(&mut program, addr, vars);
        let answer = run.next_answer().unwrap();
        assert_eq!(answer.len(), 1);
        assert_eq!(answer[0].0, "X");
        assert_eq!(answer[0].1, "cons(a, cons(b, []))");
    }

    #[test]
    fn calling_an_undefined_predicate_is_a_semantic_error() {
        let mut program = Program::new();
        let err = compile_program(&mut program, "p :- q.").unwrap_err();
        assert_eq!(
            err,
            FrontendError::UndefinedPredicate {
                name: "q".to_string(),
                arity: 0
            }
        );
    }
}
