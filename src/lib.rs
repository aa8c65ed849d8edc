//! stackopt - Bytecode Optimizer for Stack-Machine Procedures
//!
//! This library rewrites the compiled bytecode of a single procedure into a
//! smaller, faster, observably equivalent instruction sequence. It runs after
//! code generation and before execution.
//!
//! # Architecture
//!
//! The optimizer consists of three layers:
//!
//! 1. **Instruction Model** (`bytecode::opcodes`, `bytecode::procedure`)
//!    - Tagged instructions with symbolic or raw jump targets
//!    - Label definitions as pseudo instructions
//!    - Literal pool and variable name tables per procedure
//!
//! 2. **Reference Semantics** (`bytecode::value`)
//!    - Three-valued truth classes (true, false, empty)
//!    - Evaluation of unary and binary operations on literals
//!
//! 3. **Rewriting Engine** (`bytecode::optimizer`)
//!    - Label usage analysis and opaque instruction detection
//!    - Local pattern rules, jump rules, dead code and dead store removal
//!    - Tail merging at higher levels
//!    - Fixpoint driver with an iteration cap
//!
//! # Example
//!
//! ```rust
//! use stackopt::{optimize, Instruction, OptimizerContext, Procedure};
//!
//! let mut builder = Procedure::builder("demo");
//! builder.emit_all([
//!     Instruction::drop(1),
//!     Instruction::drop(1),
//!     Instruction::drop(1),
//! ]);
//! let mut proc = builder.build();
//!
//! let stats = optimize(&OptimizerContext::default(), &mut proc, 1);
//! assert_eq!(proc.code(), &[Instruction::drop(3)]);
//! assert_eq!(stats.instructions_removed(), 2);
//! ```
//!
//! # Optimization Levels
//!
//! - **0**: No changes
//! - **1**: Local patterns, jump rules, dead code, dead stores
//! - **2**: Everything at level 1 plus tail merging
//!
//! The gates are configurable through [`OptimizerConfig`], which can also be
//! loaded from TOML.

pub mod bytecode;

pub use bytecode::{
    optimize, optimize_all, ConfigError, Instruction, JumpFlags, JumpTarget, LabelId,
    OptimizationStats, OptimizerConfig, OptimizerContext, Pass, Procedure, ProcedureBuilder,
    Truth, Value, Variable,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_empty_procedure() {
        let mut proc = Procedure::new("empty");
        let stats = optimize(&OptimizerContext::default(), &mut proc, 2);
        assert!(proc.is_empty());
        assert_eq!(stats.total_rewrites(), 0);
        assert_eq!(stats.iterations, 1);
    }

    #[test]
    fn test_config_from_toml() {
        let config = OptimizerConfig::parse_toml("tail_merge_level = 1").unwrap();
        assert!(config.is_enabled(Pass::TailMerge, 1));
    }
}
