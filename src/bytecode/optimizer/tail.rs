//! Tail merging.
//!
//! ```text
//!     X1 .. Xk               (removed)
//!     Jump L                 Jump L
//!     ...                    ...
//!     Y1 .. Yk           L:  Y1 .. Yk
//! L:  ...                    ...
//! ```
//!
//! When the instructions just before an unconditional jump equal the
//! instructions just before the jump's target, the jump's copy is removed and
//! the label is moved up so both paths share one copy. The label must be
//! referenced by this jump only; otherwise other jumps would start executing
//! the shared tail.

use crate::bytecode::opcodes::{Instruction, JumpTarget};

use super::helpers::Scan;
use super::types::RewriteAction;

/// Length of the common tail ending before `jump` and before `label`
fn common_tail(scan: &Scan<'_>, jump: usize, label: usize) -> usize {
    let code = scan.code();
    let shareable = |insn: &Instruction| insn.defined_label().is_none() && !scan.usage.is_opaque(insn);
    (1..=jump.min(label))
        .take_while(|&d| {
            let disjoint = if jump < label {
                jump + d < label
            } else {
                label + d < jump
            };
            let (x, y) = (&code[jump - d], &code[label - d]);
            disjoint && x == y && shareable(x)
        })
        .count()
}

/// Share the identical tails of an unconditional jump and its target
pub fn tail_merge(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let Instruction::Jump(flags, JumpTarget::Symbolic(label)) = scan.at(pos)? else {
        return None;
    };
    if !flags.is_unconditional() || scan.usage.reference_count(*label) != 1 {
        return None;
    }
    let target = scan.usage.position(*label)?;
    let k = common_tail(scan, pos, target);
    if k == 0 {
        return None;
    }
    let code = scan.code();
    let shared = std::iter::once(Instruction::Label(*label))
        .chain(code[target - k..target].iter().copied());
    Some(RewriteAction::replace(target - k, target + 1, shared).and_replace(
        pos - k,
        pos,
        std::iter::empty(),
    ))
}
