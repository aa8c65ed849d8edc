//! Three-valued logic tables
//!
//! Each logical unary operation is described by a table indexed by the truth
//! class of its input. An entry either yields the canonical value of a class
//! (`true`, `false`, empty) or passes the input through unchanged. Merging two
//! operations and fusing an operation into a jump mask are then table lookups
//! plus one generic composition function.
//!
//! A pair only merges when the composite is a single operation or the
//! identity. Pairs that could be rewritten as two cheaper operations in a
//! different order are left as they are.
//!
//! | Op        | true  | false | empty |
//! |-----------|-------|-------|-------|
//! | `Bool`    | true  | false | empty |
//! | `Not`     | false | true  | empty |
//! | `Not2`    | false | true  | true  |
//! | `IsEmpty` | false | false | true  |
//! | `Zap`     | keep  | empty | empty |

use crate::bytecode::opcodes::{JumpFlags, UnaryOp};
use crate::bytecode::value::Truth;

/// Table entry: what an operation yields for inputs of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The canonical value of this class
    Const(Truth),
    /// The input value, unchanged
    Keep,
}

/// Outcome per input class, indexed by [`Truth::index`]
pub type TruthTable = [Outcome; 3];

use Outcome::{Const, Keep};

const BOOL: TruthTable = [Const(Truth::True), Const(Truth::False), Const(Truth::Empty)];
const NOT: TruthTable = [Const(Truth::False), Const(Truth::True), Const(Truth::Empty)];
const NOT2: TruthTable = [Const(Truth::False), Const(Truth::True), Const(Truth::True)];
const IS_EMPTY: TruthTable = [Const(Truth::False), Const(Truth::False), Const(Truth::True)];
const ZAP: TruthTable = [Keep, Const(Truth::Empty), Const(Truth::Empty)];

/// The identity (an empty input is already canonical)
pub const IDENTITY: TruthTable = [Keep, Keep, Const(Truth::Empty)];

/// Logical operations, in the order merge candidates are tried
const LOGICAL_OPS: [UnaryOp; 5] = [
    UnaryOp::Bool,
    UnaryOp::Not,
    UnaryOp::Not2,
    UnaryOp::IsEmpty,
    UnaryOp::Zap,
];

/// Table of a logical operation; `None` for operations that are not total
/// functions of the truth class
pub fn truth_table(op: UnaryOp) -> Option<TruthTable> {
    match op {
        UnaryOp::Bool => Some(BOOL),
        UnaryOp::Not => Some(NOT),
        UnaryOp::Not2 => Some(NOT2),
        UnaryOp::IsEmpty => Some(IS_EMPTY),
        UnaryOp::Zap => Some(ZAP),
        _ => None,
    }
}

/// Truth class of the output for an input of class `input`
#[inline]
pub fn output_class(table: &TruthTable, input: Truth) -> Truth {
    match table[input.index()] {
        Const(t) => t,
        Keep => input,
    }
}

/// Table of `second` applied after `first`
pub fn compose(first: &TruthTable, second: &TruthTable) -> TruthTable {
    let mut result = IDENTITY;
    for t in Truth::ALL {
        result[t.index()] = match first[t.index()] {
            Const(c) => Const(output_class(second, c)),
            Keep => second[t.index()],
        };
    }
    result
}

/// Result of merging two operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merged {
    /// Both operations cancel out
    Identity,
    /// Equivalent to a single operation
    Single(UnaryOp),
}

/// Find the single operation (or none) with the given table
pub fn equivalent(table: &TruthTable) -> Option<Merged> {
    if *table == IDENTITY {
        return Some(Merged::Identity);
    }
    LOGICAL_OPS
        .iter()
        .copied()
        .find(|&op| truth_table(op).as_ref() == Some(table))
        .map(Merged::Single)
}

/// Sign of a numeric sign operation
#[inline]
pub fn sign(op: UnaryOp) -> Option<i8> {
    match op {
        UnaryOp::Pos => Some(1),
        UnaryOp::Neg => Some(-1),
        _ => None,
    }
}

/// Merge `first; second` if the pair reduces
pub fn merge(first: UnaryOp, second: UnaryOp) -> Option<Merged> {
    if let (Some(a), Some(b)) = (sign(first), sign(second)) {
        return Some(Merged::Single(if a * b > 0 {
            UnaryOp::Pos
        } else {
            UnaryOp::Neg
        }));
    }
    let composite = compose(&truth_table(first)?, &truth_table(second)?);
    equivalent(&composite)
}

/// Transpose a table into a jump mask
///
/// Returns the condition bits of a jump that fires on the original input
/// exactly when `condition` fires on the operation's output.
pub fn transpose_condition(table: &TruthTable, condition: JumpFlags) -> JumpFlags {
    Truth::ALL
        .iter()
        .filter(|&&t| condition.fires_on(output_class(table, t)))
        .fold(JumpFlags::empty(), |acc, t| acc | t.flag())
}
