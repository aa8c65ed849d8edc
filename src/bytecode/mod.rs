//! Bytecode Module
//!
//! This module holds the stack-machine procedure representation and the
//! optimizer that rewrites it before execution.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Script Compiler (upstream)                     │
//! │             Source → Procedure (ProcedureBuilder)                 │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Optimizer                                      │
//! │                                                                   │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐                │
//! │  │ Label Usage │  │ Logic       │  │ Pass Driver │                │
//! │  │ Analyzer    │  │ Tables      │  │ (fixpoint)  │                │
//! │  └─────────────┘  └─────────────┘  └─────────────┘                │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────┐      │
//! │  │ Rewrite passes: peephole, jumps, dce, exit, tail merge  │      │
//! │  └─────────────────────────────────────────────────────────┘      │
//! └───────────────────────────────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Runtime (downstream)                           │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`opcodes`]: Instruction model, jump masks and labels
//! - [`value`]: Literal values and their compile-time semantics
//! - [`procedure`]: Procedure structure with literal pool and name tables
//! - [`optimizer`]: The rewriting engine
//!
//! # Example
//!
//! ```
//! use stackopt::bytecode::{optimize, Instruction, OptimizerContext, Procedure, Variable};
//!
//! let mut builder = Procedure::builder("example");
//! let a = builder.add_name("A");
//! builder.emit(Instruction::Store(Variable::named(a)));
//! builder.emit(Instruction::drop(1));
//! let mut proc = builder.build();
//!
//! optimize(&OptimizerContext::default(), &mut proc, 1);
//! assert_eq!(proc.code(), &[Instruction::Pop(Variable::named(a))]);
//! ```

pub mod opcodes;
pub mod optimizer;
pub mod procedure;
pub mod value;

pub use opcodes::{
    BinaryOp, Instruction, JumpFlags, JumpTarget, LabelId, Major, MemrefOp, Operand, ResultKind,
    Scope, SpecialOp, StackOp, UnaryOp, Variable,
};
pub use optimizer::{
    optimize, optimize_all, ConfigError, OptimizationStats, OptimizerConfig, OptimizerContext,
    Pass,
};
pub use procedure::{Procedure, ProcedureBuilder};
pub use value::{EvalError, EvalResult, Truth, Value};
