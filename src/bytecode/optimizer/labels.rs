//! Label usage analysis
//!
//! Reference counts and label positions are a derived view of the
//! instruction vector. They are never patched incrementally: the driver
//! rescans after every rewrite.
//!
//! The same scan classifies instructions the optimizer must not touch:
//! raw jumps, and symbolic references to labels that are out of range or not
//! defined exactly once.

use crate::bytecode::opcodes::{Instruction, JumpTarget, LabelId};
use crate::bytecode::procedure::Procedure;

/// Derived label information for one procedure
#[derive(Debug, Clone, Default)]
pub struct LabelUsage {
    /// Jumps referencing each label
    refs: Vec<u32>,
    /// Definitions of each label
    defs: Vec<u32>,
    /// Position of the (last seen) definition of each label
    positions: Vec<Option<usize>>,
    /// Number of jumps with raw targets
    raw_jumps: usize,
    /// Number of instructions classified as opaque
    opaque: usize,
}

impl LabelUsage {
    /// Scan a procedure
    pub fn scan(proc: &Procedure) -> Self {
        Self::scan_code(proc.code(), proc.num_labels())
    }

    /// Scan an instruction vector with a label table of `num_labels` entries
    pub fn scan_code(code: &[Instruction], num_labels: u16) -> Self {
        let n = num_labels as usize;
        let mut usage = Self {
            refs: vec![0; n],
            defs: vec![0; n],
            positions: vec![None; n],
            raw_jumps: 0,
            opaque: 0,
        };

        for (pos, insn) in code.iter().enumerate() {
            match insn {
                Instruction::Label(label) => {
                    if let Some(slot) = usage.defs.get_mut(label.0 as usize) {
                        *slot += 1;
                        usage.positions[label.0 as usize] = Some(pos);
                    }
                }
                Instruction::Jump(_, JumpTarget::Symbolic(label)) => {
                    if let Some(slot) = usage.refs.get_mut(label.0 as usize) {
                        *slot += 1;
                    }
                }
                Instruction::Jump(_, JumpTarget::Raw(_)) => usage.raw_jumps += 1,
                _ => {}
            }
        }

        usage.opaque = code.iter().filter(|insn| usage.is_opaque(insn)).count();
        usage
    }

    /// Number of jumps referencing `label`
    #[inline]
    pub fn reference_count(&self, label: LabelId) -> u32 {
        self.refs.get(label.0 as usize).copied().unwrap_or(0)
    }

    /// A label is valid when it is in range and defined exactly once
    #[inline]
    pub fn is_valid(&self, label: LabelId) -> bool {
        self.defs.get(label.0 as usize) == Some(&1)
    }

    /// Position of a valid label's definition
    #[inline]
    pub fn position(&self, label: LabelId) -> Option<usize> {
        if self.is_valid(label) {
            self.positions[label.0 as usize]
        } else {
            None
        }
    }

    /// Whether the procedure contains jumps with raw offsets
    #[inline]
    pub fn has_raw_jumps(&self) -> bool {
        self.raw_jumps > 0
    }

    /// Whether any instruction is opaque
    #[inline]
    pub fn has_opaque(&self) -> bool {
        self.opaque > 0
    }

    /// An opaque instruction is never modified, removed or matched
    pub fn is_opaque(&self, insn: &Instruction) -> bool {
        match insn {
            Instruction::Jump(_, JumpTarget::Raw(_)) => true,
            Instruction::Jump(_, JumpTarget::Symbolic(label)) | Instruction::Label(label) => {
                !self.is_valid(*label)
            }
            _ => false,
        }
    }

    /// Symbolic target of a non-opaque jump
    #[inline]
    pub fn valid_target(&self, insn: &Instruction) -> Option<LabelId> {
        insn.referenced_label().filter(|&label| self.is_valid(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::opcodes::JumpFlags;

    #[test]
    fn test_counts_and_positions() {
        let code = [
            Instruction::jump(JumpFlags::ALWAYS, LabelId(1)),
            Instruction::Label(LabelId(0)),
            Instruction::jump(JumpFlags::IF_TRUE, LabelId(1)),
            Instruction::Label(LabelId(1)),
        ];
        let usage = LabelUsage::scan_code(&code, 2);
        assert_eq!(usage.reference_count(LabelId(0)), 0);
        assert_eq!(usage.reference_count(LabelId(1)), 2);
        assert_eq!(usage.position(LabelId(1)), Some(3));
        assert!(!usage.has_opaque());
    }

    #[test]
    fn test_opaque_classification() {
        let code = [
            Instruction::jump(JumpFlags::ALWAYS, LabelId(7)),
            Instruction::Label(LabelId(0)),
            Instruction::Label(LabelId(0)),
            Instruction::Jump(JumpFlags::ALWAYS, JumpTarget::Raw(0)),
            Instruction::Label(LabelId(1)),
        ];
        let usage = LabelUsage::scan_code(&code, 2);
        assert!(usage.is_opaque(&code[0]), "out of range");
        assert!(usage.is_opaque(&code[1]), "defined twice");
        assert!(usage.is_opaque(&code[3]), "raw");
        assert!(!usage.is_opaque(&code[4]));
        assert!(usage.has_raw_jumps());
        assert_eq!(usage.position(LabelId(0)), None);
        assert_eq!(usage.position(LabelId(1)), Some(4));
    }

    #[test]
    fn test_undefined_label_is_invalid() {
        let code = [Instruction::jump(JumpFlags::IF_FALSE, LabelId(0))];
        let usage = LabelUsage::scan_code(&code, 1);
        assert!(!usage.is_valid(LabelId(0)));
        assert!(usage.is_opaque(&code[0]));
        assert_eq!(usage.valid_target(&code[0]), None);
    }
}
