//! Dead code elimination.
//!
//! When every jump in a procedure resolves to a valid label, reachability is
//! computed over the whole instruction vector:
//! 1. Start from position 0
//! 2. Follow fall-through edges unless the instruction ends the flow
//! 3. Follow the target edge of every jump
//! 4. Remove every maximal run of unmarked positions
//!
//! Otherwise an opaque jump might land anywhere, and only the straight-line
//! code after an unconditional transfer, up to the next referenced label or
//! opaque instruction, is removed.

use std::collections::VecDeque;

use crate::bytecode::opcodes::Instruction;

use super::helpers::Scan;
use super::types::RewriteAction;

/// Delete a label definition that no jump references
pub fn erase_unused_labels(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let Instruction::Label(label) = scan.at(pos)? else {
        return None;
    };
    (scan.usage.reference_count(*label) == 0).then(|| RewriteAction::remove(pos, pos + 1))
}

/// Delete all unreachable instructions in one rewrite
pub fn remove_dead_code(scan: &Scan<'_>) -> Option<RewriteAction> {
    let regions = if scan.usage.has_opaque() {
        sweep_after_transfers(scan)
    } else {
        unreachable_regions(scan)
    };
    let mut regions = regions.into_iter();
    let (start, end) = regions.next()?;
    Some(regions.fold(RewriteAction::remove(start, end), |action, (start, end)| {
        action.and_replace(start, end, std::iter::empty())
    }))
}

/// Mark positions reachable from the entry point
fn mark_reachable(scan: &Scan<'_>) -> Vec<bool> {
    let code = scan.code();
    let mut reachable = vec![false; code.len()];
    let mut worklist = VecDeque::new();
    worklist.push_back(0);

    while let Some(pos) = worklist.pop_front() {
        if pos >= code.len() || reachable[pos] {
            continue;
        }
        reachable[pos] = true;

        let insn = &code[pos];
        if let Some(target) = insn.referenced_label().and_then(|l| scan.usage.position(l)) {
            worklist.push_back(target);
        }
        if !insn.ends_flow() {
            worklist.push_back(pos + 1);
        }
    }

    reachable
}

/// Maximal runs of unreachable positions, as `(start, end)` pairs
fn unreachable_regions(scan: &Scan<'_>) -> Vec<(usize, usize)> {
    let reachable = mark_reachable(scan);
    let mut regions = Vec::new();
    let mut pos = 0;
    while pos < reachable.len() {
        if reachable[pos] {
            pos += 1;
            continue;
        }
        let start = pos;
        while pos < reachable.len() && !reachable[pos] {
            pos += 1;
        }
        regions.push((start, pos));
    }
    regions
}

/// Whether a sweep must stop before this instruction
fn may_be_entered(scan: &Scan<'_>, insn: &Instruction) -> bool {
    match insn {
        Instruction::Label(label) => {
            scan.usage.is_opaque(insn) || scan.usage.reference_count(*label) > 0
        }
        _ => scan.usage.is_opaque(insn),
    }
}

/// Straight-line regions after unconditional transfers
fn sweep_after_transfers(scan: &Scan<'_>) -> Vec<(usize, usize)> {
    let code = scan.code();
    let mut regions = Vec::new();
    let mut pos = 0;
    while pos < code.len() {
        let ends = scan.at(pos).is_some_and(Instruction::ends_flow);
        pos += 1;
        if !ends {
            continue;
        }
        let start = pos;
        while pos < code.len() && !may_be_entered(scan, &code[pos]) {
            pos += 1;
        }
        if pos > start {
            regions.push((start, pos));
        }
    }
    regions
}
