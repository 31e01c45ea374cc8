//! Fetch/decode/execute: the mode-dependent instruction dispatch of §4.10.
//!
//! The bytecode stream carries opcodes alone; the current processor mode is
//! OR-ed in at fetch time to form the dispatched operator (§4.4). Variable
//! offsets are resolved through [`super::operand::resolve_var_address`],
//! which already implements the MATCH/ARG/COPY frame selection of §4.7 — the
//! table in §4.10 names the resolved frame loosely as "L"; the authoritative
//! rule is §4.7, which this dispatcher defers to uniformly.

use std::convert::TryFrom;

use crate::consts::opcode;
use crate::memory::{Area, Memory};
use crate::pool::{ConstantPool, Symbol};
use crate::program::Program;
use crate::word::{self, Tag};

use super::frame::BacktrackClause;
use super::operand::resolve_var_address;
use super::unify::{bind, deref, trail, unifiable};
use super::{Machine, Mode};

/// The result of one dispatch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Execution continues at the machine's now-updated PC/addr/mode.
    Continue,
    /// The current unification attempt failed; the caller must backtrack.
    Fail,
    /// The query's outermost frame reached EXIT: an answer is ready.
    Answer,
}

/// Allocate a compound's cells on the global stack: a FUNC cell followed by
/// `arity` fresh unbound REF cells. Returns the STR word naming it.
fn alloc_compound(memory: &mut Memory, machine: &mut Machine, func_index: u32, arity: u32) -> u32 {
    let func_addr = machine.g0;
    memory.write_in(
        Area::Global,
        func_addr,
        word::pack(Tag::Func as u8, func_index),
    );
    for i in 1..=arity as usize {
        let cell_addr = func_addr + i;
        memory.write_in(Area::Global, cell_addr, word::unbound_at(cell_addr as u32));
    }
    machine.g0 = func_addr + arity as usize + 1;
    word::pack(Tag::Str as u8, func_addr as u32)
}

fn functor_arity(pool: &ConstantPool, func_index: u32) -> u32 {
    pool.symbol(func_index).arity()
}

/// Execute one instruction at the machine's current PC, advancing PC first.
pub fn step(machine: &mut Machine, program: &mut Program) -> StepOutcome {
    let (ins, next_pc) = program.fetch(machine.pc);
    machine.pc = next_pc;
    let Program { memory, pool, .. } = program;
    execute(machine, memory, &*pool, ins)
}

fn execute(
    machine: &mut Machine,
    memory: &mut Memory,
    pool: &ConstantPool,
    ins: crate::program::Instruction,
) -> StepOutcome {
    match ins.opcode {
        opcode::FUNCTOR => op_functor(machine, memory, pool, ins.operand),
        opcode::CONSTANT => op_constant(machine, memory, ins.operand),
        opcode::FIRSTVAR => op_firstvar(machine, memory, ins.operand),
        opcode::VAR => op_var(machine, memory, pool, ins.operand),
        opcode::ENTER => op_enter(machine, ins.operand),
        opcode::POP => op_pop(machine),
        opcode::CALL => op_call(machine, pool, ins.operand),
        opcode::EXIT => op_exit(machine),
        other => panic!("illegal opcode {other} in mode {:?}", machine.pm),
    }
}

fn op_functor(
    machine: &mut Machine,
    memory: &mut Memory,
    pool: &ConstantPool,
    func_index: u32,
) -> StepOutcome {
    let arity = functor_arity(pool, func_index);
    match machine.pm {
        Mode::Match => {
            let target = deref(memory, machine.addr);
            let w = memory.read(target);
            match Tag::try_from(word::tag_byte(w)) {
                Ok(Tag::Ref) => {
                    let str_word = alloc_compound(memory, machine, func_index, arity);
                    memory.write(target, str_word);
                    trail(machine, memory, target);
                    machine.scratchpad.push((machine.addr + 1, Mode::Match));
                    machine.pm = Mode::Copy;
                    machine.addr = word::value(str_word) as usize + 1;
                    StepOutcome::Continue
                }
                Ok(Tag::Str) => {
                    let str_addr = word::value(w) as usize;
                    let func_word = memory.read(str_addr);
                    if word::value(func_word) == func_index {
                        machine.scratchpad.push((machine.addr + 1, Mode::Match));
                        machine.addr = str_addr + 1;
                        StepOutcome::Continue
                    } else {
                        StepOutcome::Fail
                    }
                }
                _ => StepOutcome::Fail,
            }
        }
        Mode::Arg | Mode::Copy => {
            let mode = machine.pm;
            let str_word = alloc_compound(memory, machine, func_index, arity);
            memory.write(machine.addr, str_word);
            machine.scratchpad.push((machine.addr + 1, mode));
            machine.pm = Mode::Copy;
            machine.addr = word::value(str_word) as usize + 1;
            StepOutcome::Continue
        }
    }
}

fn op_constant(machine: &mut Machine, memory: &mut Memory, pool_index: u32) -> StepOutcome {
    let cons_word = word::pack(Tag::Cons as u8, pool_index);
    match machine.pm {
        Mode::Match => {
            let target = deref(memory, machine.addr);
            let w = memory.read(target);
            match Tag::try_from(word::tag_byte(w)) {
                Ok(Tag::Ref) => {
                    memory.write(target, cons_word);
                    trail(machine, memory, target);
                    machine.addr += 1;
                    StepOutcome::Continue
                }
                Ok(Tag::Cons) if word::value(w) == pool_index => {
                    machine.addr += 1;
                    StepOutcome::Continue
                }
                _ => StepOutcome::Fail,
            }
        }
        Mode::Arg | Mode::Copy => {
            memory.write(machine.addr, cons_word);
            machine.addr += 1;
            StepOutcome::Continue
        }
    }
}

fn op_firstvar(machine: &mut Machine, memory: &mut Memory, offset: u32) -> StepOutcome {
    let var_addr = resolve_var_address(machine, offset);
    match machine.pm {
        Mode::Match | Mode::Copy => {
            let w = memory.read(machine.addr);
            memory.write(var_addr, w);
        }
        Mode::Arg => {
            let fresh = word::unbound_at(var_addr as u32);
            memory.write(var_addr, fresh);
            memory.write(machine.addr, fresh);
        }
    }
    machine.addr += 1;
    StepOutcome::Continue
}

fn op_var(
    machine: &mut Machine,
    memory: &mut Memory,
    pool: &ConstantPool,
    offset: u32,
) -> StepOutcome {
    let var_addr = resolve_var_address(machine, offset);
    match machine.pm {
        Mode::Match => match unifiable(machine, memory, pool, var_addr, machine.addr) {
            Ok(_) => {
                machine.addr += 1;
                StepOutcome::Continue
            }
            Err(()) => StepOutcome::Fail,
        },
        Mode::Copy => {
            bind(machine, memory, var_addr, machine.addr);
            machine.addr += 1;
            StepOutcome::Continue
        }
        Mode::Arg => {
            let w = memory.read(var_addr);
            memory.write(machine.addr, w);
            machine.addr += 1;
            StepOutcome::Continue
        }
    }
}

fn op_enter(machine: &mut Machine, size: u32) -> StepOutcome {
    machine.push_source_frame(size);
    machine.pm = Mode::Arg;
    let new_l = machine.push_target_frame();
    machine.addr = new_l;
    StepOutcome::Continue
}

fn op_pop(machine: &mut Machine) -> StepOutcome {
    let (addr, mode) = machine
        .scratchpad
        .pop()
        .expect("POP with empty scratchpad");
    machine.addr = addr;
    machine.pm = mode;
    StepOutcome::Continue
}

fn op_call(machine: &mut Machine, pool: &ConstantPool, predicate: u32) -> StepOutcome {
    let clauses = match pool.symbol(predicate) {
        Symbol::Predicate { clauses, .. } => clauses,
        other => panic!("CALL names a non-predicate symbol {other:?}"),
    };
    assert!(
        !clauses.is_empty(),
        "CALL to predicate with no clauses should have been rejected at compile time"
    );
    let first = clauses[0];
    if clauses.len() > 1 {
        machine.push_choice_point(BacktrackClause {
            predicate,
            clause_index: 1,
        });
    }
    machine.pm = Mode::Match;
    let l = machine.l.expect("CALL with no target frame");
    machine.frames.meta_mut(l).cp = machine.pc;
    machine.pc = first.code_ptr;
    machine.addr = l;
    StepOutcome::Continue
}

fn op_exit(machine: &mut Machine) -> StepOutcome {
    if machine.pop_source_frame() {
        StepOutcome::Answer
    } else {
        let new_l = machine.push_target_frame();
        machine.addr = new_l;
        StepOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{opcode, GLOBAL_START};
    use crate::program::Program;

    /// `p.` with a zero-arity fact compiled by hand: ENTER 0, EXIT.
    #[test]
    fn exit_at_query_frame_signals_answer() {
        let mut program = Program::new();
        let at = program.write_ins2(opcode::ENTER, 0);
        program.write_ins1(opcode::EXIT);
        let mut machine = Machine::new();
        machine.reset(at);

        assert_eq!(step(&mut machine, &mut program), StepOutcome::Continue);
        assert_eq!(step(&mut machine, &mut program), StepOutcome::Answer);
    }

    #[test]
    fn constant_mismatch_in_match_mode_fails() {
        let mut program = Program::new();
        let mut machine = Machine::new();
        machine.reset(0);
        program.memory.write(GLOBAL_START, word::pack(Tag::Cons as u8, 9));
        machine.addr = GLOBAL_START;
        machine.pm = Mode::Match;
        let outcome = op_constant(&mut machine, &mut program.memory, 3);
        assert_eq!(outcome, StepOutcome::Fail);
    }

    #[test]
    fn constant_binds_unbound_variable_in_match_mode() {
        let mut program = Program::new();
        let mut machine = Machine::new();
        machine.reset(0);
        program
            .memory
            .write(GLOBAL_START, word::unbound_at(GLOBAL_START as u32));
        machine.addr = GLOBAL_START;
        machine.pm = Mode::Match;
        let outcome = op_constant(&mut machine, &mut program.memory, 4);
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(
            program.memory.read(GLOBAL_START),
            word::pack(Tag::Cons as u8, 4)
        );
    }
}
