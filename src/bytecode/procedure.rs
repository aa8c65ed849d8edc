//! Procedure representation
//!
//! A Procedure is one compiled unit of bytecode: the instruction vector
//! (with label definitions as pseudo instructions), the literal pool, the
//! local-variable and shared-variable name tables, and the size of the label
//! table. The optimizer mutates the instruction vector in place; everything
//! else is fixed once the procedure has been built.

use itertools::Itertools;

use super::opcodes::{Instruction, JumpFlags, LabelId, Operand, Scope, Variable};
use super::value::Value;

/// A compiled procedure
#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    /// Name of this procedure (for debugging)
    name: String,
    /// The instructions, including label definitions
    pub(crate) code: Vec<Instruction>,
    /// Size of the label table
    num_labels: u16,
    /// Literal pool for values that can't be encoded inline
    literals: Vec<Value>,
    /// Names of local slots
    local_names: Vec<String>,
    /// Names of shared variables
    names: Vec<String>,
    /// Number of arguments (the first local slots)
    num_args: u16,
}

impl Procedure {
    /// Create a new empty procedure
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: Vec::new(),
            num_labels: 0,
            literals: Vec::new(),
            local_names: Vec::new(),
            names: Vec::new(),
            num_args: 0,
        }
    }

    /// Create a builder for constructing a procedure
    pub fn builder(name: impl Into<String>) -> ProcedureBuilder {
        ProcedureBuilder::new(name)
    }

    /// Get the procedure name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the instructions
    #[inline]
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Number of entries in the instruction vector, labels included
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Number of real instructions (label definitions excluded)
    pub fn instruction_count(&self) -> usize {
        self.code
            .iter()
            .filter(|insn| insn.defined_label().is_none())
            .count()
    }

    /// Size of the label table
    #[inline]
    pub fn num_labels(&self) -> u16 {
        self.num_labels
    }

    /// Get a literal from the pool
    #[inline]
    pub fn literal(&self, index: u16) -> Option<&Value> {
        self.literals.get(index as usize)
    }

    /// Get all literals
    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    /// Find a literal identical to `value`
    pub fn find_literal(&self, value: &Value) -> Option<u16> {
        self.literals
            .iter()
            .position(|lit| lit.is_identical(value))
            .and_then(|idx| u16::try_from(idx).ok())
    }

    /// Number of local slots
    #[inline]
    pub fn local_count(&self) -> usize {
        self.local_names.len()
    }

    pub fn local_names(&self) -> &[String] {
        &self.local_names
    }

    /// Shared variable names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn num_args(&self) -> u16 {
        self.num_args
    }

    /// Display name of a variable reference
    pub fn variable_name(&self, var: Variable) -> Option<&str> {
        let table = match var.scope {
            Scope::Local => &self.local_names,
            Scope::Named => &self.names,
        };
        table.get(var.index as usize).map(String::as_str)
    }

    /// Disassemble the procedure to a string
    pub fn disassemble(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("=== {} ===\n", self.name));
        output.push_str(&format!(
            "args: {}, locals: {}, labels: {}\n",
            self.num_args,
            self.local_names.len(),
            self.num_labels
        ));
        if !self.literals.is_empty() {
            output.push_str(&format!(
                "literals: [{}]\n",
                self.literals.iter().map(|lit| format!("{:?}", lit)).join(", ")
            ));
        }

        for (pos, insn) in self.code.iter().enumerate() {
            if let Instruction::Label(label) = insn {
                output.push_str(&format!("{:04}       {}:\n", pos, label));
                continue;
            }
            let comment = self.annotation(insn).map_or(String::new(), |c| format!("  ; {}", c));
            output.push_str(&format!("{:04}    {}{}\n", pos, insn, comment));
        }

        output
    }

    fn annotation(&self, insn: &Instruction) -> Option<String> {
        match insn {
            Instruction::Push(operand) | Instruction::FusedBinary(operand, _) => match operand {
                Operand::Variable(var) => self.variable_name(*var).map(str::to_string),
                Operand::Literal(idx) => self.literal(*idx).map(|lit| format!("{:?}", lit)),
                Operand::Integer(_) | Operand::Boolean(_) => None,
            },
            Instruction::Pop(var) | Instruction::Store(var) => {
                self.variable_name(*var).map(str::to_string)
            }
            Instruction::Memref(_, idx) => self.names.get(*idx as usize).cloned(),
            _ => None,
        }
    }
}

/// Builder for constructing Procedures
#[derive(Debug, Clone)]
pub struct ProcedureBuilder {
    procedure: Procedure,
}

impl ProcedureBuilder {
    /// Create a new procedure builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            procedure: Procedure::new(name),
        }
    }

    /// Allocate a fresh label
    pub fn make_label(&mut self) -> LabelId {
        let label = LabelId(self.procedure.num_labels);
        self.procedure.num_labels += 1;
        label
    }

    /// Grow the label table without handing out ids
    pub fn reserve_labels(&mut self, count: u16) {
        self.procedure.num_labels = self.procedure.num_labels.saturating_add(count);
    }

    /// Emit a single instruction
    pub fn emit(&mut self, insn: Instruction) -> &mut Self {
        self.procedure.code.push(insn);
        self
    }

    /// Emit a sequence of instructions
    pub fn emit_all(&mut self, insns: impl IntoIterator<Item = Instruction>) -> &mut Self {
        self.procedure.code.extend(insns);
        self
    }

    /// Emit a symbolic jump
    pub fn emit_jump(&mut self, flags: JumpFlags, label: LabelId) -> &mut Self {
        self.emit(Instruction::jump(flags, label))
    }

    /// Place a label definition at the current position
    pub fn define_label(&mut self, label: LabelId) -> &mut Self {
        self.emit(Instruction::Label(label))
    }

    /// Add a literal to the pool, returns its index
    pub fn add_literal(&mut self, value: Value) -> u16 {
        if let Some(index) = self.procedure.find_literal(&value) {
            return index;
        }

        let index = self.procedure.literals.len();
        if index > u16::MAX as usize {
            panic!("Too many literals in procedure (max {})", u16::MAX);
        }
        self.procedure.literals.push(value);
        index as u16
    }

    /// Add a local variable, returns its slot
    pub fn add_local(&mut self, name: impl Into<String>) -> u16 {
        let index = self.procedure.local_names.len();
        if index > u16::MAX as usize {
            panic!("Too many locals in procedure (max {})", u16::MAX);
        }
        self.procedure.local_names.push(name.into());
        index as u16
    }

    /// Add an argument; arguments occupy the first local slots
    pub fn add_argument(&mut self, name: impl Into<String>) -> u16 {
        let slot = self.add_local(name);
        self.procedure.num_args += 1;
        slot
    }

    /// Add a shared name, returns its index
    pub fn add_name(&mut self, name: impl Into<String>) -> u16 {
        let name = name.into();
        if let Some(index) = self.procedure.names.iter().position(|n| *n == name) {
            return index as u16;
        }
        let index = self.procedure.names.len();
        if index > u16::MAX as usize {
            panic!("Too many names in procedure (max {})", u16::MAX);
        }
        self.procedure.names.push(name);
        index as u16
    }

    /// Current instruction position
    #[inline]
    pub fn current_position(&self) -> usize {
        self.procedure.code.len()
    }

    /// Finish building
    pub fn build(&self) -> Procedure {
        self.procedure.clone()
    }
}
