//! Types and statistics for bytecode optimization.

use serde::Deserialize;
use smallvec::SmallVec;

use crate::bytecode::opcodes::Instruction;

/// An individual rewrite pass
///
/// Passes run in declaration order within each round of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Delete label definitions that no jump references
    EraseUnusedLabels,
    /// `Drop 0`, `Swap 0` → (remove)
    RemoveNoOps,
    /// `Drop a; Drop b` → `Drop a+b`
    MergeDrops,
    /// `Store x; Drop n` → `Pop x; Drop n-1`
    StoreDrop,
    /// `Push <pure>; Drop n` → `Drop n-1`
    PushDrop,
    /// `Pop loc; Push loc` → `Store loc`
    PopPush,
    /// `Push lit; Unary` → `Push result`
    FoldUnary,
    /// `Push k; Binary` → `Unary` for identity constants
    FoldBinaryInt,
    /// `Unary a; Unary b` → composite
    MergeNegation,
    /// `Compare; Not` → inverse comparison
    InvertComparison,
    /// `Compare; Bool` → `Compare`, `BitOp; Pos` → `BitOp`
    StripTypeCheck,
    /// `<bool>; Push 0; CompareEq` → `<bool>; Not`
    IntCompare,
    /// `Push lit; CompareNC` → `Push lit; Compare`
    #[serde(rename = "compare_nc")]
    CompareNC,
    /// `Unary; Jump(pop)` → `Jump(transposed mask)`
    UnaryCondition,
    /// `Push lit; Jump(cond)` resolved at compile time
    FoldJump,
    /// `Jump c A; Jump B; A:` → `Jump !c B`
    InvertJumps,
    /// Retarget jumps that land on unconditional jumps
    ThreadJumps,
    /// Jump to the immediately following label
    JumpToNext,
    /// Delete unreachable code
    RemoveDeadCode,
    /// Drop stores to locals that are never read again
    DeadStoreAtExit,
    /// Share identical tails of a jump and its target
    TailMerge,
}

impl Pass {
    /// Number of passes
    pub const COUNT: usize = 21;

    /// All passes, in execution order
    pub const ALL: [Pass; Pass::COUNT] = [
        Pass::EraseUnusedLabels,
        Pass::RemoveNoOps,
        Pass::MergeDrops,
        Pass::StoreDrop,
        Pass::PushDrop,
        Pass::PopPush,
        Pass::FoldUnary,
        Pass::FoldBinaryInt,
        Pass::MergeNegation,
        Pass::InvertComparison,
        Pass::StripTypeCheck,
        Pass::IntCompare,
        Pass::CompareNC,
        Pass::UnaryCondition,
        Pass::FoldJump,
        Pass::InvertJumps,
        Pass::ThreadJumps,
        Pass::JumpToNext,
        Pass::RemoveDeadCode,
        Pass::DeadStoreAtExit,
        Pass::TailMerge,
    ];

    /// Index into per-pass tables
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in logs and configuration
    pub fn name(self) -> &'static str {
        match self {
            Pass::EraseUnusedLabels => "erase_unused_labels",
            Pass::RemoveNoOps => "remove_no_ops",
            Pass::MergeDrops => "merge_drops",
            Pass::StoreDrop => "store_drop",
            Pass::PushDrop => "push_drop",
            Pass::PopPush => "pop_push",
            Pass::FoldUnary => "fold_unary",
            Pass::FoldBinaryInt => "fold_binary_int",
            Pass::MergeNegation => "merge_negation",
            Pass::InvertComparison => "invert_comparison",
            Pass::StripTypeCheck => "strip_type_check",
            Pass::IntCompare => "int_compare",
            Pass::CompareNC => "compare_nc",
            Pass::UnaryCondition => "unary_condition",
            Pass::FoldJump => "fold_jump",
            Pass::JumpToNext => "jump_to_next",
            Pass::InvertJumps => "invert_jumps",
            Pass::ThreadJumps => "thread_jumps",
            Pass::RemoveDeadCode => "remove_dead_code",
            Pass::DeadStoreAtExit => "dead_store_at_exit",
            Pass::TailMerge => "tail_merge",
        }
    }

    /// Whether this pass belongs to the cross-branch set
    #[inline]
    pub fn is_tail_merge(self) -> bool {
        self == Pass::TailMerge
    }
}

/// One contiguous replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// First position replaced
    pub start: usize,
    /// One past the last position replaced
    pub end: usize,
    /// Instructions inserted in place of `start..end`
    pub with: SmallVec<[Instruction; 2]>,
}

/// Result of a pattern match at a given position
///
/// A rewrite consists of one or more non-overlapping edits that are applied
/// together. Most rewrites are a single edit; tail merging needs two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteAction {
    pub edits: SmallVec<[Edit; 2]>,
}

impl RewriteAction {
    /// Remove positions `start..end`
    pub fn remove(start: usize, end: usize) -> Self {
        Self::replace(start, end, std::iter::empty())
    }

    /// Replace positions `start..end` with `with`
    pub fn replace(start: usize, end: usize, with: impl IntoIterator<Item = Instruction>) -> Self {
        let mut edits = SmallVec::new();
        edits.push(Edit {
            start,
            end,
            with: with.into_iter().collect(),
        });
        Self { edits }
    }

    /// Add another edit to this rewrite
    pub fn and_replace(
        mut self,
        start: usize,
        end: usize,
        with: impl IntoIterator<Item = Instruction>,
    ) -> Self {
        self.edits.push(Edit {
            start,
            end,
            with: with.into_iter().collect(),
        });
        self
    }

    /// Lowest position touched
    pub fn first_position(&self) -> usize {
        self.edits.iter().map(|e| e.start).min().unwrap_or(0)
    }
}

/// Statistics about optimizations performed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationStats {
    /// Rewrites applied, per pass
    rewrites: [usize; Pass::COUNT],
    /// Number of driver rounds executed
    pub iterations: usize,
    /// Instruction vector length before optimization (labels included)
    pub instructions_before: usize,
    /// Instruction vector length after optimization (labels included)
    pub instructions_after: usize,
    /// The driver stopped because it reached the iteration cap
    pub iteration_cap_hit: bool,
    /// The procedure was left untouched because it contains raw jumps
    pub skipped_raw_jumps: bool,
}

impl OptimizationStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rewrites applied by `pass`
    #[inline]
    pub fn count(&self, pass: Pass) -> usize {
        self.rewrites[pass.index()]
    }

    pub(crate) fn record(&mut self, pass: Pass) {
        self.rewrites[pass.index()] += 1;
    }

    /// Get total rewrites performed
    pub fn total_rewrites(&self) -> usize {
        self.rewrites.iter().sum()
    }

    /// Net number of instructions removed
    pub fn instructions_removed(&self) -> usize {
        self.instructions_before.saturating_sub(self.instructions_after)
    }

    /// Accumulate another run's statistics into this one
    pub fn merge(&mut self, other: &OptimizationStats) {
        for (total, n) in self.rewrites.iter_mut().zip(other.rewrites.iter()) {
            *total += n;
        }
        self.iterations += other.iterations;
        self.instructions_before += other.instructions_before;
        self.instructions_after += other.instructions_after;
        self.iteration_cap_hit |= other.iteration_cap_hit;
        self.skipped_raw_jumps |= other.skipped_raw_jumps;
    }
}
