//! Resolving a VAR/FIRSTVAR operand (a frame-relative offset) to an absolute
//! local-stack address, given the current processor mode (§4.7).

use super::{Machine, Mode};

/// Resolve a frame-relative `offset` to an absolute local-stack address.
///
/// - MATCH resolves against the target frame `L`.
/// - ARG resolves against the source frame `CL`.
/// - COPY climbs the scratchpad past nested COPY entries to the nearest
///   non-COPY ancestor mode, then resolves against that mode's frame. COPY
///   nests: an inner compound copied while already copying an outer one
///   still ultimately belongs to whichever MATCH/ARG frame started the walk.
pub fn resolve_var_address(machine: &Machine, offset: u32) -> usize {
    match machine.pm {
        Mode::Match => machine.l.expect("MATCH with no target frame") + offset as usize,
        Mode::Arg => machine.cl.expect("ARG with no source frame") + offset as usize,
        Mode::Copy => match ancestor_mode(machine) {
            Mode::Match => machine.l.expect("COPY/MATCH with no target frame") + offset as usize,
            Mode::Arg => machine.cl.expect("COPY/ARG with no source frame") + offset as usize,
            Mode::Copy => unreachable!("ancestor_mode never returns Copy"),
        },
    }
}

/// Walk the scratchpad from the top, skipping entries whose saved mode is
/// itself COPY, until the nearest non-COPY ancestor mode is found.
fn ancestor_mode(machine: &Machine) -> Mode {
    machine
        .scratchpad
        .iter()
        .rev()
        .map(|&(_, mode)| mode)
        .find(|&mode| mode != Mode::Copy)
        .expect("scratchpad has no non-COPY ancestor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_resolves_against_target_frame() {
        let mut m = Machine::new();
        m.l = Some(8_000_000);
        m.pm = Mode::Match;
        assert_eq!(resolve_var_address(&m, 3), 8_000_003);
    }

    #[test]
    fn arg_resolves_against_source_frame() {
        let mut m = Machine::new();
        m.cl = Some(8_000_000);
        m.pm = Mode::Arg;
        assert_eq!(resolve_var_address(&m, 2), 8_000_002);
    }

    #[test]
    fn copy_climbs_past_nested_copy_entries() {
        let mut m = Machine::new();
        m.l = Some(8_000_000);
        m.cl = Some(9_000_000);
        m.pm = Mode::Copy;
        m.scratchpad.push((0, Mode::Arg));
        m.scratchpad.push((1, Mode::Copy));
        m.scratchpad.push((2, Mode::Copy));
        assert_eq!(resolve_var_address(&m, 5), 9_000_005);
    }
}
