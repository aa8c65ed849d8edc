// Optimizer throughput benchmarks
//
// Procedures are shaped like naive code generator output: assignments
// lowered as store/drop pairs, negated conditions, trampolines and
// duplicated branch tails.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stackopt::bytecode::{
    optimize, optimize_all, BinaryOp, Instruction, JumpFlags, OptimizerContext, Procedure,
    SpecialOp, UnaryOp, Variable,
};

/// One `if` statement per block, each with a redundant lowering
fn generated_procedure(blocks: usize) -> Procedure {
    let mut b = Procedure::builder(format!("bench_{}", blocks));
    b.add_local("x");
    b.add_local("y");
    b.add_name("G");
    let x = Variable::local(0);
    let y = Variable::local(1);

    for i in 0..blocks {
        let else_label = b.make_label();
        let then_label = b.make_label();
        let end_label = b.make_label();
        b.emit_all([
            Instruction::push_local(0),
            Instruction::push_int((i % 7) as i16),
            Instruction::Binary(BinaryOp::CompareLt),
            Instruction::Unary(UnaryOp::Not),
        ])
        .emit_jump(JumpFlags::IF_TRUE | JumpFlags::POP_ALWAYS, then_label)
        .emit_jump(JumpFlags::ALWAYS, else_label)
        .define_label(then_label)
        .emit_all([
            Instruction::push_local(1),
            Instruction::push_int(1),
            Instruction::Binary(BinaryOp::Add),
            Instruction::Store(y),
            Instruction::drop(1),
            Instruction::push_local(1),
            Instruction::Special(SpecialOp::Print, 1),
        ])
        .emit_jump(JumpFlags::ALWAYS, end_label)
        .define_label(else_label)
        .emit_all([
            Instruction::push_int(0),
            Instruction::Store(x),
            Instruction::drop(1),
            Instruction::drop(0),
            Instruction::push_local(1),
            Instruction::Special(SpecialOp::Print, 1),
        ])
        .define_label(end_label);
    }
    b.emit_all([
        Instruction::push_local(0),
        Instruction::Pop(x),
        Instruction::ret(0),
    ]);
    b.build()
}

fn bench_optimize_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize");
    let ctx = OptimizerContext::default();

    for &blocks in &[10usize, 100, 1000] {
        let proc = generated_procedure(blocks);
        for level in 1..=2u8 {
            group.bench_with_input(
                BenchmarkId::new(format!("level{}", level), blocks),
                &proc,
                |bench, proc| {
                    bench.iter(|| {
                        let mut proc = proc.clone();
                        black_box(optimize(&ctx, &mut proc, level));
                        proc
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_optimize_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_all");
    let ctx = OptimizerContext::default();

    for &count in &[16usize, 256] {
        let procs: Vec<Procedure> = (0..count).map(|i| generated_procedure(8 + i % 32)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &procs, |bench, procs| {
            bench.iter(|| {
                let mut procs = procs.clone();
                black_box(optimize_all(&ctx, &mut procs, 2));
                procs
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize_levels, bench_optimize_all);
criterion_main!(benches);
