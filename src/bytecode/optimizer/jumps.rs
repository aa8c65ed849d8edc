//! Jump rules: constant conditions, jumps to the next instruction, inverted
//! conditional pairs and jump threading.
//!
//! Count-down jumps (`DEC_ZERO`) modify the value they test and are left
//! alone by every rule here except threading.

use smallvec::SmallVec;

use crate::bytecode::opcodes::{Instruction, JumpFlags, JumpTarget, LabelId};

use super::helpers::{known_value, label_in_run, skip_labels, Scan};
use super::types::RewriteAction;

/// `Push lit; Jump(cond)` resolved at compile time
///
/// | taken | pops | replacement |
/// |-------|------|-------------|
/// | yes   | yes  | `Jump` |
/// | yes   | no   | `Push lit; Jump` |
/// | no    | yes  | (remove both) |
/// | no    | no   | `Push lit` |
pub fn fold_jump(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Push(operand), Instruction::Jump(flags, target)) = scan.pair(pos)? else {
        return None;
    };
    if flags.contains(JumpFlags::DEC_ZERO) {
        return None;
    }
    let truth = known_value(scan.proc, *operand)?.truth();
    let pops = flags.contains(JumpFlags::POP_ALWAYS);
    let always = Instruction::Jump(JumpFlags::ALWAYS, *target);
    Some(match (flags.fires_on(truth), pops) {
        (true, true) => RewriteAction::replace(pos, pos + 2, [always]),
        (true, false) if flags.is_unconditional() => return None,
        (true, false) => RewriteAction::replace(pos + 1, pos + 2, [always]),
        (false, true) => RewriteAction::remove(pos, pos + 2),
        (false, false) => RewriteAction::remove(pos + 1, pos + 2),
    })
}

/// A jump whose target label immediately follows it
pub fn jump_to_next(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let Instruction::Jump(flags, JumpTarget::Symbolic(label)) = scan.at(pos)? else {
        return None;
    };
    if flags.contains(JumpFlags::DEC_ZERO) || !label_in_run(scan.code(), pos + 1, *label) {
        return None;
    }
    Some(if flags.contains(JumpFlags::POP_ALWAYS) {
        RewriteAction::replace(pos, pos + 1, [Instruction::drop(1)])
    } else {
        RewriteAction::remove(pos, pos + 1)
    })
}

/// Two adjacent jumps testing the same value
///
/// When the first jump only peeks, the second sees the same value but only
/// in the classes the first did not take. A second mask that is disjoint
/// from those classes never fires; one that covers them always fires.
///
/// `Jump c A; Jump B; A:` becomes `Jump !c B; A:`.
pub fn invert_jumps(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Jump(first, first_target), Instruction::Jump(second, second_target)) =
        scan.pair(pos)?
    else {
        return None;
    };
    if first.contains(JumpFlags::DEC_ZERO)
        || second.contains(JumpFlags::DEC_ZERO)
        || !first.is_conditional()
    {
        return None;
    }
    let second_pop = *second & JumpFlags::POP_ALWAYS;

    if !first.contains(JumpFlags::POP_ALWAYS) {
        let remaining = JumpFlags::ALWAYS - first.condition();
        let tested = second.condition();
        if (tested & remaining).is_empty() {
            return Some(if second_pop.is_empty() {
                RewriteAction::remove(pos + 1, pos + 2)
            } else {
                RewriteAction::replace(pos + 1, pos + 2, [Instruction::drop(1)])
            });
        }
        if tested.contains(remaining) && tested != JumpFlags::ALWAYS {
            return Some(RewriteAction::replace(
                pos + 1,
                pos + 2,
                [Instruction::Jump(JumpFlags::ALWAYS | second_pop, *second_target)],
            ));
        }
    }

    let JumpTarget::Symbolic(skipped) = first_target else {
        return None;
    };
    if !second.is_unconditional() || !label_in_run(scan.code(), pos + 2, *skipped) {
        return None;
    }
    let inverted = (JumpFlags::ALWAYS - first.condition()) | (*first & JumpFlags::POP_ALWAYS);
    Some(RewriteAction::replace(
        pos,
        pos + 2,
        [Instruction::Jump(inverted, *second_target)],
    ))
}

/// Final destination of a chain of unconditional jumps starting at `label`
///
/// Chains that loop back on themselves resolve to the lowest label of the
/// cycle, so every jump into the cycle agrees on a target.
fn resolve(scan: &Scan<'_>, label: LabelId) -> LabelId {
    let code = scan.code();
    let mut chain: SmallVec<[LabelId; 8]> = SmallVec::new();
    chain.push(label);
    let mut current = label;
    loop {
        let Some(pos) = scan.usage.position(current) else {
            return current;
        };
        let next = match code.get(skip_labels(code, pos)) {
            Some(Instruction::Jump(flags, JumpTarget::Symbolic(next)))
                if flags.is_unconditional() && scan.usage.is_valid(*next) =>
            {
                *next
            }
            _ => return current,
        };
        if let Some(start) = chain.iter().position(|&l| l == next) {
            return chain[start..].iter().copied().min().unwrap_or(next);
        }
        chain.push(next);
        current = next;
    }
}

/// Retarget a jump that lands on an unconditional jump
pub fn thread_jumps(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let Instruction::Jump(flags, JumpTarget::Symbolic(label)) = scan.at(pos)? else {
        return None;
    };
    let destination = resolve(scan, *label);
    (destination != *label).then(|| {
        RewriteAction::replace(pos, pos + 1, [Instruction::jump(*flags, destination)])
    })
}
