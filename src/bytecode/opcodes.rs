//! Instruction model for the stack machine
//!
//! An instruction is a tagged value whose variant selects the major category
//! (push, pop, store, stack manipulation, unary, binary, jump, memory
//! reference, fused binary, special) and whose payload carries the minor
//! opcode and the 16-bit argument. Label definitions are pseudo instructions
//! of the jump category.
//!
//! Jump targets are either symbolic (a [`LabelId`] resolved through the label
//! table) or raw offsets. Only symbolic targets are ever rewritten.

use std::fmt;

use bitflags::bitflags;

use super::value::Truth;

/// Symbolic label identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(pub u16);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Destination of a jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpTarget {
    /// Refers to a label; may be retargeted
    Symbolic(LabelId),
    /// Literal instruction offset; never rewritten
    Raw(u16),
}

impl JumpTarget {
    /// The label, if this target is symbolic
    #[inline]
    pub fn label(self) -> Option<LabelId> {
        match self {
            JumpTarget::Symbolic(label) => Some(label),
            JumpTarget::Raw(_) => None,
        }
    }
}

bitflags! {
    /// Jump condition mask
    ///
    /// The three `IF_*` bits select the truth classes for which the jump is
    /// taken. Without `POP_ALWAYS` the tested value stays on the stack on
    /// both paths; with it the value is consumed on both paths.
    pub struct JumpFlags: u8 {
        const IF_TRUE = 0x01;
        const IF_FALSE = 0x02;
        const IF_EMPTY = 0x04;
        const ALWAYS = Self::IF_TRUE.bits | Self::IF_FALSE.bits | Self::IF_EMPTY.bits;
        const POP_ALWAYS = 0x08;
        const DEC_ZERO = 0x10;
    }
}

impl JumpFlags {
    /// Only the truth-class bits
    #[inline]
    pub fn condition(self) -> JumpFlags {
        self & JumpFlags::ALWAYS
    }

    /// Taken for every truth class, does not pop, does not count down
    #[inline]
    pub fn is_unconditional(self) -> bool {
        self == JumpFlags::ALWAYS
    }

    /// Taken for some but not all truth classes
    #[inline]
    pub fn is_conditional(self) -> bool {
        let cond = self.condition();
        !cond.is_empty() && cond != JumpFlags::ALWAYS
    }

    /// Whether the jump fires for a value of the given class
    #[inline]
    pub fn fires_on(self, truth: Truth) -> bool {
        self.contains(truth.flag())
    }
}

/// Storage scope of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Procedure-local slot; no conversion on access
    Local,
    /// Shared variable looked up by name; access implies a visibility check
    Named,
}

/// A variable reference: scope plus slot or name index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    pub scope: Scope,
    pub index: u16,
}

impl Variable {
    #[inline]
    pub fn local(index: u16) -> Self {
        Self { scope: Scope::Local, index }
    }

    #[inline]
    pub fn named(index: u16) -> Self {
        Self { scope: Scope::Named, index }
    }

    #[inline]
    pub fn is_local(self) -> bool {
        self.scope == Scope::Local
    }
}

/// Source operand of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Variable(Variable),
    /// Small integer immediate
    Integer(i16),
    /// Boolean immediate (true, false or empty)
    Boolean(Truth),
    /// Index into the procedure's literal pool
    Literal(u16),
}

impl Operand {
    /// Reading this operand cannot fail or have side effects
    #[inline]
    pub fn is_pure(self) -> bool {
        match self {
            Operand::Variable(var) => var.is_local(),
            Operand::Integer(_) | Operand::Boolean(_) | Operand::Literal(_) => true,
        }
    }

    /// Whether this operand reads the given variable
    #[inline]
    pub fn reads(self, var: Variable) -> bool {
        matches!(self, Operand::Variable(v) if v == var)
    }
}

/// Stack manipulation minor opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackOp {
    /// Push a copy of the n-th element (0 = top)
    Dup,
    /// Remove n elements
    Drop,
    /// Exchange the top with the n-th element below it
    Swap,
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Bool,
    Neg,
    Pos,
    Zap,
    IsEmpty,
    Not2,
    Inc,
    Dec,
    Abs,
    BitNot,
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Bool => "bool",
            Self::Neg => "neg",
            Self::Pos => "pos",
            Self::Zap => "zap",
            Self::IsEmpty => "isempty",
            Self::Not2 => "not2",
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::Abs => "abs",
            Self::BitNot => "bitnot",
        }
    }

    /// Result is always a boolean or empty
    #[inline]
    pub fn produces_boolean(self) -> bool {
        matches!(self, Self::Not | Self::Bool | Self::Not2 | Self::IsEmpty)
    }
}

/// Binary operations; `...NC` variants compare case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Divide,
    IntegerDivide,
    Remainder,
    Pow,
    Concat,
    CompareEq,
    CompareEqNC,
    CompareNe,
    CompareNeNC,
    CompareLt,
    CompareLtNC,
    CompareLe,
    CompareLeNC,
    CompareGt,
    CompareGtNC,
    CompareGe,
    CompareGeNC,
    Min,
    MinNC,
    Max,
    MaxNC,
    FindStr,
    FindStrNC,
    And,
    Or,
    Xor,
    BitAnd,
    BitOr,
    BitXor,
}

/// Statically known result type of a binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Boolean or empty
    Boolean,
    /// Integer or empty
    Integer,
    Any,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mult => "mul",
            Self::Divide => "div",
            Self::IntegerDivide => "idiv",
            Self::Remainder => "rem",
            Self::Pow => "pow",
            Self::Concat => "concat",
            Self::CompareEq => "cmpeq",
            Self::CompareEqNC => "cmpeq_nc",
            Self::CompareNe => "cmpne",
            Self::CompareNeNC => "cmpne_nc",
            Self::CompareLt => "cmplt",
            Self::CompareLtNC => "cmplt_nc",
            Self::CompareLe => "cmple",
            Self::CompareLeNC => "cmple_nc",
            Self::CompareGt => "cmpgt",
            Self::CompareGtNC => "cmpgt_nc",
            Self::CompareGe => "cmpge",
            Self::CompareGeNC => "cmpge_nc",
            Self::Min => "min",
            Self::MinNC => "min_nc",
            Self::Max => "max",
            Self::MaxNC => "max_nc",
            Self::FindStr => "findstr",
            Self::FindStrNC => "findstr_nc",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::BitAnd => "bitand",
            Self::BitOr => "bitor",
            Self::BitXor => "bitxor",
        }
    }

    /// Whether this is a case-insensitive variant
    pub fn is_case_insensitive(self) -> bool {
        self.case_sensitive() != self
    }

    /// Case-sensitive counterpart (identity for ops without a variant)
    pub fn case_sensitive(self) -> BinaryOp {
        match self {
            Self::CompareEqNC => Self::CompareEq,
            Self::CompareNeNC => Self::CompareNe,
            Self::CompareLtNC => Self::CompareLt,
            Self::CompareLeNC => Self::CompareLe,
            Self::CompareGtNC => Self::CompareGt,
            Self::CompareGeNC => Self::CompareGe,
            Self::MinNC => Self::Min,
            Self::MaxNC => Self::Max,
            Self::FindStrNC => Self::FindStr,
            other => other,
        }
    }

    /// Whether the operation depends on the relative order of characters
    /// (as opposed to only their identity)
    pub fn is_ordering(self) -> bool {
        matches!(
            self.case_sensitive(),
            Self::CompareLt | Self::CompareLe | Self::CompareGt | Self::CompareGe | Self::Min | Self::Max
        )
    }

    /// Comparison whose result is a boolean (or empty)
    pub fn is_comparison(self) -> bool {
        matches!(
            self.case_sensitive(),
            Self::CompareEq
                | Self::CompareNe
                | Self::CompareLt
                | Self::CompareLe
                | Self::CompareGt
                | Self::CompareGe
        )
    }

    /// Logical negation of a comparison: `!(a < b)` is `a >= b`
    pub fn inverse_comparison(self) -> Option<BinaryOp> {
        Some(match self {
            Self::CompareEq => Self::CompareNe,
            Self::CompareNe => Self::CompareEq,
            Self::CompareLt => Self::CompareGe,
            Self::CompareGe => Self::CompareLt,
            Self::CompareLe => Self::CompareGt,
            Self::CompareGt => Self::CompareLe,
            Self::CompareEqNC => Self::CompareNeNC,
            Self::CompareNeNC => Self::CompareEqNC,
            Self::CompareLtNC => Self::CompareGeNC,
            Self::CompareGeNC => Self::CompareLtNC,
            Self::CompareLeNC => Self::CompareGtNC,
            Self::CompareGtNC => Self::CompareLeNC,
            _ => return None,
        })
    }

    /// Statically guaranteed result type
    pub fn result_kind(self) -> ResultKind {
        if self.is_comparison() || matches!(self, Self::And | Self::Or | Self::Xor) {
            ResultKind::Boolean
        } else if matches!(
            self,
            Self::BitAnd | Self::BitOr | Self::BitXor | Self::FindStr | Self::FindStrNC
        ) {
            ResultKind::Integer
        } else {
            ResultKind::Any
        }
    }
}

/// Memory-reference minor opcodes; the object is on top of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemrefOp {
    /// `[obj] -> [obj.name]`
    Load,
    /// `[value, obj] -> [value]`, assigning `obj.name`
    Store,
    /// `[value, obj] -> []`, assigning `obj.name`
    Pop,
    /// `[obj] -> []`, invoking method `name`
    Call,
}

/// Special instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialOp {
    /// Leave the procedure; argument is the number of results (0 or 1)
    Return,
    /// Pop a value and throw it
    Throw,
    /// Stop execution of the whole process
    Terminate,
    /// Pop a value and write it to the output
    Print,
    /// Pop a string and execute it as a statement in the current frame
    EvalStatement,
}

impl SpecialOp {
    /// Control never continues with the next instruction
    #[inline]
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Return | Self::Throw | Self::Terminate)
    }
}

/// Major opcode category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Major {
    Push,
    Pop,
    Store,
    Stack,
    Unary,
    Binary,
    Jump,
    Memref,
    FusedBinary,
    Special,
}

/// A single instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Push(Operand),
    /// Store the top of stack and remove it
    Pop(Variable),
    /// Store the top of stack, leaving it in place
    Store(Variable),
    Stack(StackOp, u16),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Jump(JumpFlags, JumpTarget),
    /// Label definition
    Label(LabelId),
    Memref(MemrefOp, u16),
    /// Push operand, then apply binary operation
    FusedBinary(Operand, BinaryOp),
    Special(SpecialOp, u16),
}

impl Instruction {
    /// Major category of this instruction
    pub fn major(&self) -> Major {
        match self {
            Self::Push(_) => Major::Push,
            Self::Pop(_) => Major::Pop,
            Self::Store(_) => Major::Store,
            Self::Stack(..) => Major::Stack,
            Self::Unary(_) => Major::Unary,
            Self::Binary(_) => Major::Binary,
            Self::Jump(..) | Self::Label(_) => Major::Jump,
            Self::Memref(..) => Major::Memref,
            Self::FusedBinary(..) => Major::FusedBinary,
            Self::Special(..) => Major::Special,
        }
    }

    // Convenience constructors, mostly for builders and tests

    pub fn push_int(value: i16) -> Self {
        Self::Push(Operand::Integer(value))
    }

    pub fn push_bool(value: Truth) -> Self {
        Self::Push(Operand::Boolean(value))
    }

    pub fn push_literal(index: u16) -> Self {
        Self::Push(Operand::Literal(index))
    }

    pub fn push_local(slot: u16) -> Self {
        Self::Push(Operand::Variable(Variable::local(slot)))
    }

    pub fn push_named(index: u16) -> Self {
        Self::Push(Operand::Variable(Variable::named(index)))
    }

    pub fn drop(count: u16) -> Self {
        Self::Stack(StackOp::Drop, count)
    }

    pub fn dup(index: u16) -> Self {
        Self::Stack(StackOp::Dup, index)
    }

    pub fn swap(index: u16) -> Self {
        Self::Stack(StackOp::Swap, index)
    }

    pub fn jump(flags: JumpFlags, label: LabelId) -> Self {
        Self::Jump(flags, JumpTarget::Symbolic(label))
    }

    pub fn ret(results: u16) -> Self {
        Self::Special(SpecialOp::Return, results)
    }

    /// Label this instruction defines, if any
    #[inline]
    pub fn defined_label(&self) -> Option<LabelId> {
        match self {
            Self::Label(label) => Some(*label),
            _ => None,
        }
    }

    /// Symbolic label this instruction references, if any
    #[inline]
    pub fn referenced_label(&self) -> Option<LabelId> {
        match self {
            Self::Jump(_, target) => target.label(),
            _ => None,
        }
    }

    /// Execution never falls through to the next instruction
    pub fn ends_flow(&self) -> bool {
        match self {
            Self::Jump(flags, _) => {
                flags.condition() == JumpFlags::ALWAYS && !flags.contains(JumpFlags::DEC_ZERO)
            }
            Self::Special(op, _) => op.is_terminator(),
            _ => false,
        }
    }

    /// Instruction mnemonic
    pub fn mnemonic(&self) -> String {
        match self {
            Self::Push(operand) => format!("push{}", operand_suffix(*operand)),
            Self::Pop(var) => format!("pop{}", scope_suffix(var.scope)),
            Self::Store(var) => format!("store{}", scope_suffix(var.scope)),
            Self::Stack(op, _) => match op {
                StackOp::Dup => "dup",
                StackOp::Drop => "drop",
                StackOp::Swap => "swap",
            }
            .to_string(),
            Self::Unary(op) => format!("u{}", op.mnemonic()),
            Self::Binary(op) => format!("b{}", op.mnemonic()),
            Self::Jump(flags, _) => jump_mnemonic(*flags),
            Self::Label(_) => "label".to_string(),
            Self::Memref(op, _) => match op {
                MemrefOp::Load => "pushmem",
                MemrefOp::Store => "storemem",
                MemrefOp::Pop => "popmem",
                MemrefOp::Call => "callmem",
            }
            .to_string(),
            Self::FusedBinary(operand, op) => {
                format!("f{}{}", op.mnemonic(), operand_suffix(*operand))
            }
            Self::Special(op, _) => match op {
                SpecialOp::Return => "sreturn",
                SpecialOp::Throw => "sthrow",
                SpecialOp::Terminate => "sterminate",
                SpecialOp::Print => "sprint",
                SpecialOp::EvalStatement => "sevals",
            }
            .to_string(),
        }
    }
}

fn scope_suffix(scope: Scope) -> &'static str {
    match scope {
        Scope::Local => "loc",
        Scope::Named => "var",
    }
}

fn operand_suffix(operand: Operand) -> &'static str {
    match operand {
        Operand::Variable(var) => scope_suffix(var.scope),
        Operand::Integer(_) => "int",
        Operand::Boolean(_) => "bool",
        Operand::Literal(_) => "lit",
    }
}

fn jump_mnemonic(flags: JumpFlags) -> String {
    let mut name = String::from("j");
    if flags.contains(JumpFlags::DEC_ZERO) {
        name.push_str("dz");
    }
    if flags.condition() != JumpFlags::ALWAYS {
        if flags.contains(JumpFlags::IF_TRUE) {
            name.push('t');
        }
        if flags.contains(JumpFlags::IF_FALSE) {
            name.push('f');
        }
        if flags.contains(JumpFlags::IF_EMPTY) {
            name.push('e');
        }
    }
    if flags.contains(JumpFlags::POP_ALWAYS) {
        name.push('p');
    }
    name
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match self {
            Self::Push(operand) | Self::FusedBinary(operand, _) => match operand {
                Operand::Variable(var) => write!(f, "{} {}", mnemonic, var.index),
                Operand::Integer(i) => write!(f, "{} {}", mnemonic, i),
                Operand::Boolean(t) => write!(f, "{} {}", mnemonic, t.to_i16()),
                Operand::Literal(idx) => write!(f, "{} #{}", mnemonic, idx),
            },
            Self::Pop(var) | Self::Store(var) => write!(f, "{} {}", mnemonic, var.index),
            Self::Stack(_, n) | Self::Memref(_, n) | Self::Special(_, n) => {
                write!(f, "{} {}", mnemonic, n)
            }
            Self::Unary(_) | Self::Binary(_) => write!(f, "{}", mnemonic),
            Self::Jump(_, JumpTarget::Symbolic(label)) => write!(f, "{} {}", mnemonic, label),
            Self::Jump(_, JumpTarget::Raw(offset)) => write!(f, "{} @{}", mnemonic, offset),
            Self::Label(label) => write!(f, "{}:", label),
        }
    }
}
