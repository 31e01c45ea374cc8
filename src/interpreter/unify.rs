//! Dereferencing, binding, trailing and iterative unification (§4.8).

use std::convert::TryFrom;

use crate::consts::GLOBAL_START;
use crate::memory::{Area, Memory};
use crate::pool::ConstantPool;
use crate::word::{self, Tag};

use super::Machine;

/// Follow a REF chain to a non-REF cell or a self-referential (unbound) REF.
/// Terminates: `bind` never introduces a cycle.
pub fn deref(memory: &Memory, addr: usize) -> usize {
    let mut current = addr;
    loop {
        let w = memory.read(current);
        if word::tag_byte(w) == Tag::Ref as u8 {
            let next = word::value(w) as usize;
            if next == current {
                return current;
            }
            current = next;
        } else {
            return current;
        }
    }
}

/// Read the word at the dereferenced cell.
pub fn get_word_at(memory: &Memory, addr: usize) -> u32 {
    memory.read(deref(memory, addr))
}

/// Whether `addr` must be trailed: it predates the current choice point's
/// global-stack top, or it lies in the local stack (§4.8; the local-stack
/// condition has no further qualifier — a local cell may still be unbound by
/// a choice point created *after* the binding, within the same clause).
fn must_trail(machine: &Machine, addr: usize) -> bool {
    if crate::memory::Area::Local.contains(addr) {
        return true;
    }
    let bg = machine
        .bl
        .map(|bl| machine.frames.meta(bl).bg)
        .unwrap_or(GLOBAL_START);
    addr < bg
}

/// Push `addr` onto the trail iff it needs restoring at the next backtrack.
pub fn trail(machine: &mut Machine, memory: &mut Memory, addr: usize) {
    if must_trail(machine, addr) {
        memory.write_in(Area::Trail, machine.tr0, addr as u32);
        machine.tr0 += 1;
    }
}

/// Bind two cells, at least one of which must dereference to an unbound
/// variable. Prefers binding the younger (higher-address) variable to the
/// older, keeping dereference chains short. Returns the address actually
/// bound.
pub fn bind(machine: &mut Machine, memory: &mut Memory, a1: usize, a2: usize) -> usize {
    let d1 = deref(memory, a1);
    let d2 = deref(memory, a2);
    let w1 = memory.read(d1);
    let w2 = memory.read(d2);
    let t1 = word::tag_byte(w1);
    let t2 = word::tag_byte(w2);
    let ref_tag = Tag::Ref as u8;

    if t1 == ref_tag && (t2 != ref_tag || d2 < d1) {
        memory.write(d1, w2);
        trail(machine, memory, d1);
        d1
    } else if t2 == ref_tag {
        memory.write(d2, w1);
        trail(machine, memory, d2);
        d2
    } else {
        panic!("bind: neither {d1} nor {d2} is an unbound variable");
    }
}

/// Iterative unification over the PDL working stack. Returns the addresses
/// bound on success, or `Err(())` on failure (leaving no observable state
/// change to the PDL — it is always cleared before returning).
pub fn unifiable(
    machine: &mut Machine,
    memory: &mut Memory,
    pool: &ConstantPool,
    a1: usize,
    a2: usize,
) -> Result<Vec<usize>, ()> {
    machine.pdl.clear();
    machine.pdl.push((a1, a2));
    let mut bound = Vec::new();

    while let Some((x1, x2)) = machine.pdl.pop() {
        let d1 = deref(memory, x1);
        let d2 = deref(memory, x2);
        if d1 == d2 {
            continue;
        }
        let w1 = memory.read(d1);
        let w2 = memory.read(d2);
        let t1 = Tag::try_from(word::tag_byte(w1));
        let t2 = Tag::try_from(word::tag_byte(w2));

        match (t1, t2) {
            (Ok(Tag::Ref), _) | (_, Ok(Tag::Ref)) => {
                bound.push(bind(machine, memory, d1, d2));
            }
            (Ok(Tag::Cons), Ok(Tag::Cons)) => {
                if w1 != w2 {
                    machine.pdl.clear();
                    return Err(());
                }
            }
            (Ok(Tag::Lis), Ok(Tag::Lis)) => {
                let p1 = word::value(w1) as usize;
                let p2 = word::value(w2) as usize;
                machine.pdl.push((p1, p2));
                machine.pdl.push((p1 + 1, p2 + 1));
            }
            (Ok(Tag::Str), Ok(Tag::Str)) => {
                let s1 = word::value(w1) as usize;
                let s2 = word::value(w2) as usize;
                let func1 = memory.read(s1);
                let func2 = memory.read(s2);
                if func1 != func2 {
                    machine.pdl.clear();
                    return Err(());
                }
                let arity = pool.symbol(word::value(func1)).arity();
                for i in 1..=arity as usize {
                    machine.pdl.push((s1 + i, s2 + i));
                }
            }
            _ => {
                machine.pdl.clear();
                return Err(());
            }
        }
    }

    tracing::trace!(bound = bound.len(), "unification succeeded");
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{pack, unbound_at};

    #[test]
    fn deref_terminates_on_unbound_variable() {
        let mut mem = Memory::new();
        mem.write(10, unbound_at(10));
        assert_eq!(deref(&mem, 10), 10);
    }

    #[test]
    fn deref_follows_chain_to_bound_cell() {
        let mut mem = Memory::new();
        mem.write(10, pack(Tag::Cons as u8, 5));
        mem.write(11, pack(Tag::Ref as u8, 10));
        mem.write(12, pack(Tag::Ref as u8, 11));
        assert_eq!(deref(&mem, 12), 10);
    }

    #[test]
    fn bind_unifies_dereference_targets() {
        let mut machine = Machine::new();
        let mut mem = Memory::new();
        mem.write(10, unbound_at(10));
        mem.write(11, unbound_at(11));
        bind(&mut machine, &mut mem, 10, 11);
        assert_eq!(deref(&mem, 10), deref(&mem, 11));
    }

    #[test]
    fn bind_prefers_younger_to_older() {
        let mut machine = Machine::new();
        let mut mem = Memory::new();
        mem.write(10, unbound_at(10));
        mem.write(20, unbound_at(20));
        let bound_addr = bind(&mut machine, &mut mem, 10, 20);
        assert_eq!(bound_addr, 20);
        assert_eq!(deref(&mem, 20), 10);
    }

    #[test]
    fn local_addresses_are_always_trailed() {
        let mut machine = Machine::new();
        let mut mem = Memory::new();
        let local_addr = crate::consts::LOCAL_START + 5;
        mem.write(local_addr, unbound_at(local_addr as u32));
        mem.write(11, unbound_at(11));
        bind(&mut machine, &mut mem, local_addr, 11);
        assert_eq!(machine.tr0, crate::consts::TRAIL_START + 1);
    }

    #[test]
    fn cons_atoms_unify_iff_equal() {
        let mut machine = Machine::new();
        let mut mem = Memory::new();
        let pool = ConstantPool::new();
        mem.write(10, pack(Tag::Cons as u8, 1));
        mem.write(11, pack(Tag::Cons as u8, 1));
        mem.write(12, pack(Tag::Cons as u8, 2));
        assert!(unifiable(&mut machine, &mut mem, &pool, 10, 11).is_ok());
        assert!(unifiable(&mut machine, &mut mem, &pool, 10, 12).is_err());
    }
}
