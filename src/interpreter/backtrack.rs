//! Backtracking: undo the most recent choice point's current alternative, or
//! report that none remain (§4.9).

use crate::memory::{Area, Memory};
use crate::pool::{ConstantPool, Symbol};
use crate::word::unbound_at;

use super::frame::BacktrackClause;
use super::{Machine, Mode};

/// The query has no further answers. Not an error — the normal "no" outcome (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoMoreAnswers;

/// Undo bindings back to the most recent choice point and select its next
/// alternative, or report that the choice-point chain is empty.
pub fn backtrack(
    machine: &mut Machine,
    memory: &mut Memory,
    pool: &ConstantPool,
) -> Result<usize, NoMoreAnswers> {
    let bl = machine.bl.ok_or(NoMoreAnswers)?;
    let bl_meta = *machine.frames.meta(bl);
    let clause = bl_meta.bp.expect("choice point frame is missing BP");

    machine.pm = Mode::Match;
    machine.pc = clause_code_ptr(pool, clause);

    if let Some(prev_cl) = bl_meta.cl {
        machine.cl = Some(prev_cl);
        machine.l = Some(bl);
    }

    for idx in bl_meta.bt..machine.tr0 {
        let addr = memory.read_in(Area::Trail, idx) as usize;
        memory.write(addr, unbound_at(addr as u32));
    }

    machine.g0 = bl_meta.bg;
    machine.tr0 = bl_meta.bt;

    let next_clause_index = clause.clause_index + 1;
    if has_clause(pool, clause.predicate, next_clause_index) {
        machine.frames.meta_mut(bl).bp = Some(BacktrackClause {
            predicate: clause.predicate,
            clause_index: next_clause_index,
        });
    } else {
        machine.bl = bl_meta.bl;
    }

    machine.addr = machine.l.expect("backtrack landed with no target frame");
    tracing::trace!(frame = bl, clause = clause.clause_index, "backtrack");
    Ok(machine.addr)
}

fn clause_code_ptr(pool: &ConstantPool, clause: BacktrackClause) -> usize {
    match pool.symbol(clause.predicate) {
        Symbol::Predicate { clauses, .. } => clauses[clause.clause_index as usize].code_ptr,
        other => panic!("backtrack clause pointer names a non-predicate symbol {other:?}"),
    }
}

fn has_clause(pool: &ConstantPool, predicate: u32, index: u32) -> bool {
    match pool.symbol(predicate) {
        Symbol::Predicate { clauses, .. } => (index as usize) < clauses.len(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{GLOBAL_START, TRAIL_START};
    use crate::pool::ClauseRecord;
    use crate::word::unbound_at;

    #[test]
    fn no_choice_point_reports_exhaustion() {
        let mut machine = Machine::new();
        let mut memory = Memory::new();
        let pool = ConstantPool::new();
        assert_eq!(
            backtrack(&mut machine, &mut memory, &pool),
            Err(NoMoreAnswers)
        );
    }

    #[test]
    fn backtrack_unwinds_trail_to_unbound() {
        let mut machine = Machine::new();
        let mut memory = Memory::new();
        let mut pool = ConstantPool::new();
        let p = pool.get_or_insert_predicate("p", 0);
        pool.add_clause(
            p,
            ClauseRecord {
                params: 0,
                locals: 0,
                code_ptr: 100,
            },
        );
        pool.add_clause(
            p,
            ClauseRecord {
                params: 0,
                locals: 0,
                code_ptr: 110,
            },
        );

        let l = machine.l.unwrap();
        machine.push_choice_point(BacktrackClause {
            predicate: p,
            clause_index: 0,
        });

        let bound_addr = 42usize;
        memory.write(bound_addr, crate::word::pack(crate::word::Tag::Cons as u8, 7));
        machine.tr0 = TRAIL_START;
        memory.write_in(crate::memory::Area::Trail, machine.tr0, bound_addr as u32);
        machine.tr0 += 1;

        machine.g0 = GLOBAL_START + 5;

        let landed = backtrack(&mut machine, &mut memory, &pool).unwrap();
        assert_eq!(landed, l);
        assert_eq!(memory.read(bound_addr), unbound_at(bound_addr as u32));
        assert_eq!(machine.pc, 100);
        assert_eq!(machine.g0, GLOBAL_START);
        assert_eq!(machine.tr0, TRAIL_START);
        assert!(machine.bl.is_some(), "a second clause remains");

        let landed_again = backtrack(&mut machine, &mut memory, &pool).unwrap();
        assert_eq!(landed_again, l);
        assert_eq!(machine.pc, 110);
        assert!(machine.bl.is_none(), "no clauses remain");

        let exhausted = backtrack(&mut machine, &mut memory, &pool);
        assert_eq!(exhausted, Err(NoMoreAnswers));
    }
}
