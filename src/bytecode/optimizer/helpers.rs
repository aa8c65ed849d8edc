//! Helper functions for bytecode optimization.

use crate::bytecode::opcodes::{Instruction, LabelId, Operand, ResultKind, UnaryOp};
use crate::bytecode::procedure::Procedure;
use crate::bytecode::value::Value;

use super::labels::LabelUsage;

/// Read-only view a rule matches against
pub struct Scan<'a> {
    pub proc: &'a Procedure,
    pub usage: &'a LabelUsage,
}

impl<'a> Scan<'a> {
    pub fn new(proc: &'a Procedure, usage: &'a LabelUsage) -> Self {
        Self { proc, usage }
    }

    #[inline]
    pub fn code(&self) -> &'a [Instruction] {
        self.proc.code()
    }

    /// Instruction at `pos`, unless it is opaque
    #[inline]
    pub fn at(&self, pos: usize) -> Option<&'a Instruction> {
        self.code()
            .get(pos)
            .filter(|insn| !self.usage.is_opaque(insn))
    }

    /// Instructions at `pos` and `pos + 1`, neither opaque
    #[inline]
    pub fn pair(&self, pos: usize) -> Option<(&'a Instruction, &'a Instruction)> {
        Some((self.at(pos)?, self.at(pos + 1)?))
    }
}

/// First position at or after `pos` that is not a label definition
pub fn skip_labels(code: &[Instruction], pos: usize) -> usize {
    code[pos.min(code.len())..]
        .iter()
        .position(|insn| insn.defined_label().is_none())
        .map_or(code.len(), |offset| pos + offset)
}

/// Whether `label` is defined in the run of labels starting at `pos`
pub fn label_in_run(code: &[Instruction], pos: usize, label: LabelId) -> bool {
    code.get(pos..)
        .unwrap_or(&[])
        .iter()
        .map_while(Instruction::defined_label)
        .any(|l| l == label)
}

/// Compile-time value of a push operand, if known
pub fn known_value(proc: &Procedure, operand: Operand) -> Option<Value> {
    match operand {
        Operand::Integer(i) => Some(Value::Int(i as i32)),
        Operand::Boolean(t) => Some(t.to_value()),
        Operand::Literal(idx) => proc.literal(idx).cloned(),
        Operand::Variable(_) => None,
    }
}

/// Encode a value as a push operand without growing the literal pool
pub fn materialize(proc: &Procedure, value: &Value) -> Option<Operand> {
    match value {
        Value::Int(i) => i16::try_from(*i)
            .ok()
            .map(Operand::Integer)
            .or_else(|| proc.find_literal(value).map(Operand::Literal)),
        Value::Bool(_) | Value::Empty => Some(Operand::Boolean(value.truth())),
        Value::Float(_) | Value::Str(_) => proc.find_literal(value).map(Operand::Literal),
    }
}

/// Whether the instruction always leaves a boolean (or empty) on the stack
pub fn produces_boolean(insn: &Instruction) -> bool {
    match insn {
        Instruction::Unary(op) => op.produces_boolean(),
        Instruction::Binary(op) => op.result_kind() == ResultKind::Boolean,
        Instruction::Push(Operand::Boolean(_)) => true,
        _ => false,
    }
}

/// Unary op that is a no-op on a value of the binary op's guaranteed type
pub fn redundant_check(insn: &Instruction) -> Option<UnaryOp> {
    match insn {
        Instruction::Binary(op) => match op.result_kind() {
            ResultKind::Boolean => Some(UnaryOp::Bool),
            ResultKind::Integer => Some(UnaryOp::Pos),
            ResultKind::Any => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::value::Truth;

    #[test]
    fn test_skip_labels() {
        let code = [
            Instruction::Label(LabelId(0)),
            Instruction::Label(LabelId(1)),
            Instruction::ret(0),
        ];
        assert_eq!(skip_labels(&code, 0), 2);
        assert_eq!(skip_labels(&code, 2), 2);
        assert_eq!(skip_labels(&code[..2], 0), 2);
        assert!(label_in_run(&code, 0, LabelId(1)));
        assert!(!label_in_run(&code, 2, LabelId(1)));
    }

    #[test]
    fn test_materialize() {
        let mut b = Procedure::builder("p");
        b.add_literal(Value::Str("hi".into()));
        b.add_literal(Value::Int(100_000));
        let proc = b.build();
        assert_eq!(materialize(&proc, &Value::Int(-5)), Some(Operand::Integer(-5)));
        assert_eq!(materialize(&proc, &Value::Int(100_000)), Some(Operand::Literal(1)));
        assert_eq!(materialize(&proc, &Value::Int(40_000)), None);
        assert_eq!(materialize(&proc, &Value::Empty), Some(Operand::Boolean(Truth::Empty)));
        assert_eq!(materialize(&proc, &Value::Str("hi".into())), Some(Operand::Literal(0)));
        assert_eq!(materialize(&proc, &Value::Str("ho".into())), None);
    }
}
