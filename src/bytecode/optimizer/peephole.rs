//! Local pattern rules.
//!
//! Each rule looks at a short window starting at one position and proposes a
//! rewrite of that window. Rules never look across a label definition unless
//! stated otherwise, and never touch an opaque instruction.
//!
//! # Optimization Patterns
//!
//! | Pattern | Replacement | Rationale |
//! |---------|-------------|-----------|
//! | `Drop 0`, `Swap 0` | (remove) | No effect on the stack |
//! | `Drop a; Drop b` | `Drop a+b` | One stack adjustment |
//! | `Store x; Drop 1` | `Pop x` | Store then discard is a pop |
//! | `Store x; Drop n` | `Pop x; Drop n-1` | Same, with leftover |
//! | `Push <pure>; Drop 1` | (remove) | Dead push |
//! | `Push <pure>; Drop n` | `Drop n-1` | Dead push |
//! | `Pop loc; Push loc` | `Store loc` | Keep the value instead of reloading |
//! | `Push lit; Unary` | `Push result` | Constant fold |
//! | `Push 0; Add` | `Pos` | Identity modulo type check |
//! | `Push 1; Add` | `Inc` | Cheaper form |
//! | `Push -1; Mult` | `Neg` | Cheaper form |
//! | `Unary a; Unary b` | composite or (remove) | Logic/sign algebra |
//! | `Compare; Not` | inverse compare | Three-valued inversion |
//! | `Compare; Bool` | `Compare` | Result is already boolean |
//! | `BitOp; Pos` | `BitOp` | Result is already integer |
//! | `<bool>; Push 0; CompareEq` | `<bool>; Not` | Boolean tested against zero |
//! | `Push lit; CompareNC` | `Push lit; Compare` | Literal has no case |
//! | `Unary; Jump(pop)` | `Jump(mask')` | Test the operand directly |

use crate::bytecode::opcodes::{
    BinaryOp, Instruction, JumpFlags, MemrefOp, Operand, StackOp, UnaryOp,
};
use crate::bytecode::value::Value;

use super::helpers::{known_value, materialize, produces_boolean, redundant_check, Scan};
use super::logic::{self, Merged};
use super::types::RewriteAction;

/// `Drop 0` and `Swap 0`
pub fn remove_no_ops(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    match scan.at(pos)? {
        Instruction::Stack(StackOp::Drop | StackOp::Swap, 0) => {
            Some(RewriteAction::remove(pos, pos + 1))
        }
        _ => None,
    }
}

/// `Drop a; Drop b` → `Drop a+b`
pub fn merge_drops(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    match scan.pair(pos)? {
        (Instruction::Stack(StackOp::Drop, a), Instruction::Stack(StackOp::Drop, b)) => {
            let total = a.checked_add(*b)?;
            Some(RewriteAction::replace(pos, pos + 2, [Instruction::drop(total)]))
        }
        _ => None,
    }
}

/// Store followed by a drop becomes a pop
pub fn store_drop(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (store, Instruction::Stack(StackOp::Drop, n)) = scan.pair(pos)? else {
        return None;
    };
    let pop = match store {
        Instruction::Store(var) => Instruction::Pop(*var),
        Instruction::Memref(MemrefOp::Store, name) => Instruction::Memref(MemrefOp::Pop, *name),
        _ => return None,
    };
    Some(match *n {
        0 => RewriteAction::remove(pos + 1, pos + 2),
        1 => RewriteAction::replace(pos, pos + 2, [pop]),
        n => RewriteAction::replace(pos, pos + 2, [pop, Instruction::drop(n - 1)]),
    })
}

/// A push that cannot fail or have side effects
fn is_pure_push(scan: &Scan<'_>, operand: Operand) -> bool {
    match operand {
        Operand::Variable(var) => var.is_local() && (var.index as usize) < scan.proc.local_count(),
        Operand::Literal(idx) => scan.proc.literal(idx).is_some(),
        Operand::Integer(_) | Operand::Boolean(_) => true,
    }
}

/// `Push <pure>; Drop n` → `Drop n-1`
pub fn push_drop(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    match scan.pair(pos)? {
        (Instruction::Push(operand), Instruction::Stack(StackOp::Drop, n))
            if *n >= 1 && is_pure_push(scan, *operand) =>
        {
            Some(if *n == 1 {
                RewriteAction::remove(pos, pos + 2)
            } else {
                RewriteAction::replace(pos, pos + 2, [Instruction::drop(n - 1)])
            })
        }
        _ => None,
    }
}

/// `Pop loc; Push loc` → `Store loc`
pub fn pop_push(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    match scan.pair(pos)? {
        (Instruction::Pop(var), Instruction::Push(Operand::Variable(read)))
            if var.is_local() && var == read =>
        {
            Some(RewriteAction::replace(pos, pos + 2, [Instruction::Store(*var)]))
        }
        _ => None,
    }
}

/// `Push lit; Unary` → `Push result`
///
/// Folding is skipped when evaluation fails or the result has no encoding
/// that fits an immediate or an existing literal.
pub fn fold_unary(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Push(operand), Instruction::Unary(op)) = scan.pair(pos)? else {
        return None;
    };
    let value = known_value(scan.proc, *operand)?;
    let result = value.apply_unary(*op).ok()?;
    let folded = materialize(scan.proc, &result)?;
    Some(RewriteAction::replace(pos, pos + 2, [Instruction::Push(folded)]))
}

/// Unary equivalent of a binary op with a constant right operand
fn identity_constant(op: BinaryOp, k: i16) -> Option<UnaryOp> {
    Some(match (op, k) {
        (BinaryOp::Add | BinaryOp::Sub, 0) => UnaryOp::Pos,
        (BinaryOp::Add, 1) | (BinaryOp::Sub, -1) => UnaryOp::Inc,
        (BinaryOp::Add, -1) | (BinaryOp::Sub, 1) => UnaryOp::Dec,
        (BinaryOp::Mult | BinaryOp::Divide | BinaryOp::Pow, 1) => UnaryOp::Pos,
        (BinaryOp::Mult | BinaryOp::Divide, -1) => UnaryOp::Neg,
        _ => return None,
    })
}

/// `Push k; Binary` → `Unary` for identity-like constants
pub fn fold_binary_int(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Push(Operand::Integer(k)), Instruction::Binary(op)) = scan.pair(pos)? else {
        return None;
    };
    let unary = identity_constant(*op, *k)?;
    Some(RewriteAction::replace(pos, pos + 2, [Instruction::Unary(unary)]))
}

/// `Unary a; Unary b` → composite
pub fn merge_negation(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Unary(first), Instruction::Unary(second)) = scan.pair(pos)? else {
        return None;
    };
    Some(match logic::merge(*first, *second)? {
        Merged::Identity => RewriteAction::remove(pos, pos + 2),
        Merged::Single(op) => RewriteAction::replace(pos, pos + 2, [Instruction::Unary(op)]),
    })
}

/// `Compare; Not` → inverse comparison
pub fn invert_comparison(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Binary(op), Instruction::Unary(UnaryOp::Not)) = scan.pair(pos)? else {
        return None;
    };
    let inverse = op.inverse_comparison()?;
    Some(RewriteAction::replace(pos, pos + 2, [Instruction::Binary(inverse)]))
}

/// Drop a type check the preceding binary op already guarantees
pub fn strip_type_check(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (producer, Instruction::Unary(check)) = scan.pair(pos)? else {
        return None;
    };
    (redundant_check(producer)? == *check).then(|| RewriteAction::remove(pos + 1, pos + 2))
}

/// `<bool>; Push 0; CompareEq` → `<bool>; Not`
pub fn int_compare(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    if !produces_boolean(scan.at(pos)?) {
        return None;
    }
    let (Instruction::Push(Operand::Integer(0)), Instruction::Binary(op)) = scan.pair(pos + 1)?
    else {
        return None;
    };
    let unary = match op {
        BinaryOp::CompareEq | BinaryOp::CompareEqNC => UnaryOp::Not,
        BinaryOp::CompareNe | BinaryOp::CompareNeNC => UnaryOp::Bool,
        _ => return None,
    };
    Some(RewriteAction::replace(pos + 1, pos + 3, [Instruction::Unary(unary)]))
}

/// Characters that sort between the upper and lower case ASCII letters
const BETWEEN_CASES: std::ops::RangeInclusive<char> = '['..='`';

/// Whether folding case can change the result of `op` against `literal`
fn case_matters(op: BinaryOp, literal: &Value) -> bool {
    let Value::Str(s) = literal else {
        return false;
    };
    s.chars().any(|c| {
        c.is_ascii_alphabetic() || (op.is_ordering() && BETWEEN_CASES.contains(&c))
    })
}

/// `Push lit; CompareNC` → `Push lit; Compare` when the literal has no case
pub fn compare_nc(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Push(operand), Instruction::Binary(op)) = scan.pair(pos)? else {
        return None;
    };
    if !op.is_case_insensitive() {
        return None;
    }
    let literal = known_value(scan.proc, *operand)?;
    if case_matters(*op, &literal) {
        return None;
    }
    Some(RewriteAction::replace(
        pos,
        pos + 2,
        [Instruction::Push(*operand), Instruction::Binary(op.case_sensitive())],
    ))
}

/// `Unary; Jump(pop)` → `Jump` with a transposed mask
///
/// A mask that no longer fires for any class degrades to `Drop 1`.
pub fn unary_condition(scan: &Scan<'_>, pos: usize) -> Option<RewriteAction> {
    let (Instruction::Unary(op), Instruction::Jump(flags, target)) = scan.pair(pos)? else {
        return None;
    };
    if !flags.contains(JumpFlags::POP_ALWAYS) || flags.contains(JumpFlags::DEC_ZERO) {
        return None;
    }
    let table = logic::truth_table(*op)?;
    let mask = logic::transpose_condition(&table, flags.condition());
    Some(if mask.is_empty() {
        RewriteAction::replace(pos, pos + 2, [Instruction::drop(1)])
    } else {
        RewriteAction::replace(
            pos,
            pos + 2,
            [Instruction::Jump(mask | JumpFlags::POP_ALWAYS, *target)],
        )
    })
}
