//! Bytecode Peephole Optimizer
//!
//! This module rewrites a procedure's instruction vector in place. Local
//! pattern rules, jump rules, dead code elimination and tail merging are run
//! by a fixpoint driver until nothing changes.
//!
//! # Optimization Patterns
//!
//! | Pattern | Replacement | Rationale |
//! |---------|-------------|-----------|
//! | `Store x; Drop 1` | `Pop x` | Store then discard is a pop |
//! | `Drop a; Drop b` | `Drop a+b` | One stack adjustment |
//! | `Push 1; Add` | `Inc` | Cheaper form |
//! | `Not; Not` | `Bool` | Three-valued double negation |
//! | `Compare; Not` | inverse compare | Three-valued inversion |
//! | `Not; Jump(pop, c)` | `Jump(pop, c')` | Test the operand directly |
//! | `Push lit; Jump(c)` | `Jump` or nothing | Constant condition |
//! | `Jump L1; ... L1: Jump L2` | `Jump L2` | Jump threading |
//! | `Jump c A; Jump B; A:` | `Jump !c B; A:` | Inverted conditional |
//! | code after `Return` | (remove) | Unreachable |
//! | `Pop loc; Return` | `Drop 1; Return` | Dead store |
//!
//! See the individual rule modules for the complete tables.
//!
//! # Levels
//!
//! Level 0 does nothing. The local pattern set (everything except tail
//! merging) runs from `peephole_level` upward, tail merging from
//! `tail_merge_level` upward. Both gates are configurable, see
//! [`OptimizerConfig`].
//!
//! # Opaque Instructions
//!
//! Raw jump offsets cannot be retargeted, so a procedure containing any is
//! left untouched. Jumps to labels that are undefined, defined twice or out of
//! range, and the definitions of such labels, are never modified, moved or
//! removed; the rest of the procedure is still optimized.
//!
//! # Example
//!
//! ```ignore
//! // Before optimization:
//! // pushint 1
//! // badd
//! // drop 1
//! // drop 1
//!
//! // After optimization:
//! // uinc
//! // drop 2
//! ```

mod config;
mod dce;
mod driver;
mod exit;
mod helpers;
mod jumps;
mod labels;
mod logic;
mod peephole;
mod tail;
mod types;


#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bytecode::procedure::Procedure;

// Re-export public types
pub use config::{ConfigError, ConfigResult, OptimizerConfig, OptimizerContext, DEFAULT_MAX_ITERATIONS};
pub use driver::Optimizer;
pub use labels::LabelUsage;
pub use types::{Edit, OptimizationStats, Pass, RewriteAction};

/// Optimize one procedure in place at the given level
pub fn optimize(ctx: &OptimizerContext, proc: &mut Procedure, level: u8) -> OptimizationStats {
    let mut optimizer = Optimizer::new(ctx, level);
    optimizer.run(proc);
    optimizer.into_stats()
}

/// Optimize a batch of independent procedures
///
/// Procedures share nothing, so with the `parallel` feature they are
/// optimized on the rayon thread pool. The combined statistics are the sum
/// of the per-procedure statistics.
pub fn optimize_all(ctx: &OptimizerContext, procs: &mut [Procedure], level: u8) -> OptimizationStats {
    #[cfg(feature = "parallel")]
    {
        procs
            .par_iter_mut()
            .map(|proc| optimize(ctx, proc, level))
            .reduce(OptimizationStats::new, |mut total, stats| {
                total.merge(&stats);
                total
            })
    }

    #[cfg(not(feature = "parallel"))]
    {
        procs
            .iter_mut()
            .map(|proc| optimize(ctx, proc, level))
            .fold(OptimizationStats::new(), |mut total, stats| {
                total.merge(&stats);
                total
            })
    }
}
