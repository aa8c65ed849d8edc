//! Pass driver.
//!
//! Runs every enabled pass over the procedure, round after round, until a
//! whole round changes nothing or the iteration cap is reached. Within a
//! pass, positions are scanned front to back; after a rewrite the label
//! usage is rescanned and the same position is tried again.
//!
//! Every proposed rewrite goes through [`apply`], which refuses edits that
//! are out of range, overlap, would not change anything, or would touch an
//! opaque instruction.

use tracing::{debug, trace, warn};

use crate::bytecode::procedure::Procedure;

use super::config::{OptimizerConfig, OptimizerContext};
use super::helpers::Scan;
use super::labels::LabelUsage;
use super::types::{OptimizationStats, Pass, RewriteAction};
use super::{dce, exit, jumps, peephole, tail};

/// How a pass matches
#[derive(Clone, Copy)]
enum Rule {
    /// Tried at every position
    Local(fn(&Scan<'_>, usize) -> Option<RewriteAction>),
    /// Tried once per pass over the whole procedure
    Global(fn(&Scan<'_>) -> Option<RewriteAction>),
}

fn rule_for(pass: Pass) -> Rule {
    match pass {
        Pass::EraseUnusedLabels => Rule::Local(dce::erase_unused_labels),
        Pass::RemoveNoOps => Rule::Local(peephole::remove_no_ops),
        Pass::MergeDrops => Rule::Local(peephole::merge_drops),
        Pass::StoreDrop => Rule::Local(peephole::store_drop),
        Pass::PushDrop => Rule::Local(peephole::push_drop),
        Pass::PopPush => Rule::Local(peephole::pop_push),
        Pass::FoldUnary => Rule::Local(peephole::fold_unary),
        Pass::FoldBinaryInt => Rule::Local(peephole::fold_binary_int),
        Pass::MergeNegation => Rule::Local(peephole::merge_negation),
        Pass::InvertComparison => Rule::Local(peephole::invert_comparison),
        Pass::StripTypeCheck => Rule::Local(peephole::strip_type_check),
        Pass::IntCompare => Rule::Local(peephole::int_compare),
        Pass::CompareNC => Rule::Local(peephole::compare_nc),
        Pass::UnaryCondition => Rule::Local(peephole::unary_condition),
        Pass::FoldJump => Rule::Local(jumps::fold_jump),
        Pass::InvertJumps => Rule::Local(jumps::invert_jumps),
        Pass::ThreadJumps => Rule::Local(jumps::thread_jumps),
        Pass::JumpToNext => Rule::Local(jumps::jump_to_next),
        Pass::RemoveDeadCode => Rule::Global(dce::remove_dead_code),
        Pass::DeadStoreAtExit => Rule::Local(exit::dead_store_at_exit),
        Pass::TailMerge => Rule::Local(tail::tail_merge),
    }
}

/// Optimizer for a single procedure at a fixed level
pub struct Optimizer<'a> {
    config: &'a OptimizerConfig,
    level: u8,
    /// Statistics about optimizations performed
    stats: OptimizationStats,
}

impl<'a> Optimizer<'a> {
    /// Create an optimizer for the given context and level
    pub fn new(ctx: &'a OptimizerContext, level: u8) -> Self {
        Self {
            config: ctx.config(),
            level,
            stats: OptimizationStats::new(),
        }
    }

    /// Get optimization statistics
    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    pub fn into_stats(self) -> OptimizationStats {
        self.stats
    }

    /// Optimize a procedure in place
    pub fn run(&mut self, proc: &mut Procedure) {
        let before = proc.len();
        self.stats.instructions_before += before;

        let passes = self.config.passes_for_level(self.level);
        if passes.is_empty() {
            self.stats.instructions_after += before;
            return;
        }

        if LabelUsage::scan(proc).has_raw_jumps() {
            warn!(
                target: "stackopt::optimizer",
                procedure = proc.name(),
                "procedure contains raw jump offsets, skipping"
            );
            self.stats.skipped_raw_jumps = true;
            self.stats.instructions_after += before;
            return;
        }

        debug!(
            target: "stackopt::optimizer",
            procedure = proc.name(),
            level = self.level,
            instructions = before,
            "optimizing"
        );

        let mut rounds = 0;
        loop {
            if rounds == self.config.max_iterations {
                warn!(
                    target: "stackopt::optimizer",
                    procedure = proc.name(),
                    max_iterations = self.config.max_iterations,
                    "iteration cap reached before a fixpoint"
                );
                self.stats.iteration_cap_hit = true;
                break;
            }
            rounds += 1;

            let mut changed = false;
            for &pass in &passes {
                changed |= self.run_pass(pass, proc);
            }
            if !changed {
                break;
            }
        }
        self.stats.iterations += rounds;
        self.stats.instructions_after += proc.len();

        debug!(
            target: "stackopt::optimizer",
            procedure = proc.name(),
            rounds,
            rewrites = self.stats.total_rewrites(),
            before,
            after = proc.len(),
            "optimized"
        );
    }

    /// Run one pass to completion; returns whether anything changed
    fn run_pass(&mut self, pass: Pass, proc: &mut Procedure) -> bool {
        let mut usage = LabelUsage::scan(proc);
        match rule_for(pass) {
            Rule::Global(rule) => {
                let Some(action) = rule(&Scan::new(proc, &usage)) else {
                    return false;
                };
                let applied = apply(proc, &usage, &action);
                if applied {
                    self.record(pass, proc, &action);
                }
                applied
            }
            Rule::Local(rule) => {
                let mut changed = false;
                let mut pos = 0;
                while pos < proc.len() {
                    let action = rule(&Scan::new(proc, &usage), pos);
                    match action {
                        Some(action) if apply(proc, &usage, &action) => {
                            self.record(pass, proc, &action);
                            usage = LabelUsage::scan(proc);
                            changed = true;
                        }
                        _ => pos += 1,
                    }
                }
                changed
            }
        }
    }

    fn record(&mut self, pass: Pass, proc: &Procedure, action: &RewriteAction) {
        self.stats.record(pass);
        trace_rewrite(pass, proc.name(), action);
    }
}

/// Apply a rewrite if it is well-formed and changes something
///
/// Returns `false` and leaves the code untouched otherwise.
pub(crate) fn apply(proc: &mut Procedure, usage: &LabelUsage, action: &RewriteAction) -> bool {
    let code = &proc.code;
    let mut edits: Vec<_> = action.edits.iter().collect();
    edits.sort_by_key(|edit| edit.start);

    let in_range = edits
        .iter()
        .all(|edit| edit.start <= edit.end && edit.end <= code.len());
    let disjoint = edits.windows(2).all(|pair| pair[0].end <= pair[1].start);
    if !in_range || !disjoint {
        return false;
    }
    let touches_opaque = edits
        .iter()
        .any(|edit| code[edit.start..edit.end].iter().any(|insn| usage.is_opaque(insn)));
    if touches_opaque {
        return false;
    }
    let unchanged = edits
        .iter()
        .all(|edit| code[edit.start..edit.end] == edit.with[..]);
    if unchanged {
        return false;
    }

    for edit in edits.into_iter().rev() {
        proc.code
            .splice(edit.start..edit.end, edit.with.iter().copied());
    }
    true
}

fn trace_rewrite(pass: Pass, procedure: &str, action: &RewriteAction) {
    let pos = action.first_position();
    let name = pass.name();
    match pass {
        Pass::FoldJump | Pass::InvertJumps | Pass::ThreadJumps | Pass::JumpToNext => {
            trace!(target: "stackopt::optimizer::jumps", procedure, pass = name, pos, "rewrite")
        }
        Pass::EraseUnusedLabels | Pass::RemoveDeadCode => {
            trace!(target: "stackopt::optimizer::dce", procedure, pass = name, pos, "rewrite")
        }
        Pass::DeadStoreAtExit => {
            trace!(target: "stackopt::optimizer::exit", procedure, pass = name, pos, "rewrite")
        }
        Pass::TailMerge => {
            trace!(target: "stackopt::optimizer::tail", procedure, pass = name, pos, "rewrite")
        }
        _ => {
            trace!(target: "stackopt::optimizer::peephole", procedure, pass = name, pos, "rewrite")
        }
    }
}
