//! Dead stores to locals.
//!
//! A store to a local slot is dead when every path from it reaches the end
//! of the procedure, or another store to the same slot, without reading the
//! slot. Only straight-line code and unconditional jumps are followed; any
//! instruction that might observe locals indirectly stops the search.

use std::collections::HashSet;

use crate::bytecode::opcodes::{
    Instruction, JumpFlags, JumpTarget, Operand, SpecialOp, Variable,
};

use super::helpers::Scan;
use super::types::RewriteAction;

/// How a walk forward from a store ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    /// The stored value can never be read
    Dead,
    /// The value might be read, or the walk could not tell
    Live,
}

/// Whether an operand can observe `slot`
fn observes(operand: Operand, slot: Variable) -> bool {
    match operand {
        Operand::Variable(var) => var == slot || !var.is_local(),
        _ => false,
    }
}

/// Walk forward from `pos` looking for a read of `slot`
fn fate_after(scan: &Scan<'_>, pos: usize, slot: Variable) -> Fate {
    let code = scan.code();
    let mut followed = HashSet::new();
    let mut pos = pos;

    loop {
        let Some(insn) = code.get(pos) else {
            return Fate::Dead;
        };
        if scan.usage.is_opaque(insn) {
            return Fate::Live;
        }
        match insn {
            Instruction::Label(_)
            | Instruction::Stack(..)
            | Instruction::Unary(_)
            | Instruction::Binary(_)
            | Instruction::Special(SpecialOp::Print, _) => pos += 1,
            Instruction::Push(operand) | Instruction::FusedBinary(operand, _) => {
                if observes(*operand, slot) {
                    return Fate::Live;
                }
                pos += 1;
            }
            Instruction::Pop(var) | Instruction::Store(var) => {
                if *var == slot {
                    return Fate::Dead;
                }
                if !var.is_local() {
                    return Fate::Live;
                }
                pos += 1;
            }
            Instruction::Jump(flags, JumpTarget::Symbolic(label))
                if flags.condition() == JumpFlags::ALWAYS
                    && !flags.contains(JumpFlags::DEC_ZERO) =>
            {
                if !followed.insert(pos) {
                    return Fate::Live;
                }
                let Some(target) = scan.usage.position(*label) else {
                    return Fate::Live;
                };
                pos = target;
            }
            Instruction::Special(op, _) if op.is_terminator() => return Fate::Dead,
            Instruction::Jump(..) | Instruction::Memref(..) | Instruction::Special(..) => {
                return Fate::Live;
            }
        }
    }
}

/// `Pop loc` → `Drop 1` and `Store loc` → (remove) when the slot is never
/// read again
pub fn dead_store_at_exit(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (slot, is_pop) = match scan.at(pos)? {
        Instruction::Pop(var) if var.is_local() => (*var, true),
        Instruction::Store(var) if var.is_local() => (*var, false),
        _ => return None,
    };
    if fate_after(scan, pos + 1, slot) != Fate::Dead {
        return None;
    }
    Some(if is_pop {
        RewriteAction::replace(pos, pos + 1, [Instruction::drop(1)])
    } else {
        RewriteAction::remove(pos, pos + 1)
    })
}
