//! Test utilities for optimizer integration tests
//!
//! This module provides:
//! - A reference interpreter for procedures, used to compare observable
//!   behavior before and after optimization
//! - A small structured language with a naive code generator, so random
//!   programs come out in the shapes a real compiler emits
//! - proptest strategies for that language

#![allow(dead_code)]

use std::collections::BTreeMap;

use proptest::collection::vec;
use proptest::prelude::*;

use stackopt::bytecode::{
    BinaryOp, Instruction, JumpFlags, JumpTarget, LabelId, MemrefOp, Operand, Procedure,
    ProcedureBuilder, Scope, SpecialOp, StackOp, Truth, UnaryOp, Value, Variable,
};

/// Maximum number of executed instructions before giving up
pub const STEP_LIMIT: usize = 10_000;

pub const NUM_LOCALS: u16 = 3;
pub const NUM_GLOBALS: u16 = 2;

/// Literal pool shared by every generated procedure
pub fn literals() -> Vec<Value> {
    vec![
        Value::Str("abc".into()),
        Value::Str("ABC".into()),
        Value::Str("12".into()),
        Value::Str("_".into()),
        Value::Str(String::new()),
        Value::Float(2.5),
        Value::Int(100_000),
        Value::Float(0.0),
        Value::Float(-0.0),
    ]
}

// ============================================================================
// Reference interpreter
// ============================================================================

/// Something the outside world can observe
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Rendered text, as the output device sees it
    Print(String),
    Call { object: i32, name: u16 },
    /// Executed a dynamic statement; it can see every local
    Eval(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Returned(Option<Value>),
    Thrown(Value),
    Terminated,
    Error,
    StepLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub termination: Termination,
    pub effects: Vec<Effect>,
    pub globals: BTreeMap<u16, Value>,
    pub props: BTreeMap<(i32, u16), Value>,
    pub steps: usize,
}

impl Outcome {
    /// Same termination, same side effects in the same order, same shared state
    pub fn equivalent(&self, other: &Outcome) -> bool {
        self.termination == other.termination
            && self.effects == other.effects
            && self.globals == other.globals
            && self.props == other.props
    }
}

struct Machine<'a> {
    proc: &'a Procedure,
    labels: BTreeMap<LabelId, usize>,
    stack: Vec<Value>,
    locals: Vec<Value>,
    globals: BTreeMap<u16, Value>,
    props: BTreeMap<(i32, u16), Value>,
    effects: Vec<Effect>,
}

/// Why a single step stopped the machine
enum Stop {
    Done(Termination),
}

type Step = Result<Option<usize>, Stop>;

fn fail<T>() -> Result<T, Stop> {
    Err(Stop::Done(Termination::Error))
}

impl<'a> Machine<'a> {
    fn new(proc: &'a Procedure) -> Self {
        let mut labels = BTreeMap::new();
        for (pos, insn) in proc.code().iter().enumerate() {
            if let Instruction::Label(label) = insn {
                labels.entry(*label).or_insert(pos);
            }
        }
        let mut globals = BTreeMap::new();
        globals.insert(0, Value::Int(3));
        globals.insert(1, Value::Str("Hi".into()));
        Self {
            proc,
            labels,
            stack: Vec::new(),
            locals: vec![Value::Empty; proc.local_count()],
            globals,
            props: BTreeMap::new(),
            effects: Vec::new(),
        }
    }

    fn pop(&mut self) -> Result<Value, Stop> {
        match self.stack.pop() {
            Some(v) => Ok(v),
            None => fail(),
        }
    }

    fn top(&self) -> Result<&Value, Stop> {
        match self.stack.last() {
            Some(v) => Ok(v),
            None => fail(),
        }
    }

    fn read(&self, operand: Operand) -> Result<Value, Stop> {
        let value = match operand {
            Operand::Integer(i) => Some(Value::Int(i as i32)),
            Operand::Boolean(t) => Some(t.to_value()),
            Operand::Literal(idx) => self.proc.literal(idx).cloned(),
            Operand::Variable(var) => match var.scope {
                Scope::Local => self.locals.get(var.index as usize).cloned(),
                Scope::Named => self.globals.get(&var.index).cloned(),
            },
        };
        match value {
            Some(v) => Ok(v),
            None => fail(),
        }
    }

    fn write(&mut self, var: Variable, value: Value) -> Result<(), Stop> {
        match var.scope {
            Scope::Local => match self.locals.get_mut(var.index as usize) {
                Some(slot) => *slot = value,
                None => return fail(),
            },
            Scope::Named => {
                self.globals.insert(var.index, value);
            }
        }
        Ok(())
    }

    fn object(&mut self) -> Result<i32, Stop> {
        match self.pop()? {
            Value::Int(id) => Ok(id),
            _ => fail(),
        }
    }

    fn binary(&mut self, op: BinaryOp, rhs: Value) -> Result<(), Stop> {
        let lhs = self.pop()?;
        match lhs.apply_binary(op, &rhs) {
            Ok(v) => self.stack.push(v),
            Err(_) => return fail(),
        }
        Ok(())
    }

    fn target(&self, target: JumpTarget) -> Result<usize, Stop> {
        match target {
            JumpTarget::Symbolic(label) => match self.labels.get(&label) {
                Some(pos) => Ok(*pos),
                None => fail(),
            },
            JumpTarget::Raw(offset) => Ok(offset as usize),
        }
    }

    /// Execute the instruction at `pc`; returns the jump destination, if any
    fn step(&mut self, pc: usize) -> Step {
        match self.proc.code()[pc] {
            Instruction::Label(_) => {}
            Instruction::Push(operand) => {
                let v = self.read(operand)?;
                self.stack.push(v);
            }
            Instruction::Pop(var) => {
                let v = self.pop()?;
                self.write(var, v)?;
            }
            Instruction::Store(var) => {
                let v = self.top()?.clone();
                self.write(var, v)?;
            }
            Instruction::Stack(op, n) => {
                let n = n as usize;
                let len = self.stack.len();
                match op {
                    StackOp::Drop if n <= len => self.stack.truncate(len - n),
                    StackOp::Dup if n < len => self.stack.push(self.stack[len - 1 - n].clone()),
                    StackOp::Swap if n == 0 => {}
                    StackOp::Swap if n < len => self.stack.swap(len - 1, len - 1 - n),
                    _ => return fail(),
                }
            }
            Instruction::Unary(op) => {
                let v = self.pop()?;
                match v.apply_unary(op) {
                    Ok(r) => self.stack.push(r),
                    Err(_) => return fail(),
                }
            }
            Instruction::Binary(op) => {
                let rhs = self.pop()?;
                self.binary(op, rhs)?;
            }
            Instruction::FusedBinary(operand, op) => {
                let rhs = self.read(operand)?;
                self.binary(op, rhs)?;
            }
            Instruction::Jump(flags, target) => {
                if flags.contains(JumpFlags::DEC_ZERO) {
                    let Some(Value::Int(counter)) = self.stack.last_mut() else {
                        return fail();
                    };
                    *counter = counter.wrapping_sub(1);
                    if *counter == 0 {
                        return Ok(Some(self.target(target)?));
                    }
                    return Ok(None);
                }
                let pops = flags.contains(JumpFlags::POP_ALWAYS);
                let taken = if flags.condition() == JumpFlags::ALWAYS && !pops {
                    true
                } else {
                    let truth = self.top()?.truth();
                    if pops {
                        self.stack.pop();
                    }
                    flags.fires_on(truth)
                };
                if taken {
                    return Ok(Some(self.target(target)?));
                }
            }
            Instruction::Memref(op, name) => {
                let object = self.object()?;
                match op {
                    MemrefOp::Load => {
                        let v = self.props.get(&(object, name)).cloned().unwrap_or(Value::Empty);
                        self.stack.push(v);
                    }
                    MemrefOp::Store => {
                        let v = self.top()?.clone();
                        self.props.insert((object, name), v);
                    }
                    MemrefOp::Pop => {
                        let v = self.pop()?;
                        self.props.insert((object, name), v);
                    }
                    MemrefOp::Call => {
                        self.effects.push(Effect::Call { object, name });
                        self.stack.push(Value::Empty);
                    }
                }
            }
            Instruction::Special(op, n) => match op {
                SpecialOp::Return => {
                    let result = if n > 0 { Some(self.pop()?) } else { None };
                    return Err(Stop::Done(Termination::Returned(result)));
                }
                SpecialOp::Throw => {
                    let v = self.pop()?;
                    return Err(Stop::Done(Termination::Thrown(v)));
                }
                SpecialOp::Terminate => return Err(Stop::Done(Termination::Terminated)),
                SpecialOp::Print => {
                    let v = self.pop()?;
                    self.effects.push(Effect::Print(v.to_string()));
                }
                SpecialOp::EvalStatement => {
                    self.pop()?;
                    self.effects.push(Effect::Eval(self.locals.clone()));
                }
            },
        }
        Ok(None)
    }

    fn run(mut self) -> Outcome {
        let mut pc = 0;
        let mut steps = 0;
        let termination = loop {
            if pc >= self.proc.len() {
                break Termination::Returned(None);
            }
            if steps == STEP_LIMIT {
                break Termination::StepLimit;
            }
            if !matches!(self.proc.code()[pc], Instruction::Label(_)) {
                steps += 1;
            }
            match self.step(pc) {
                Ok(Some(target)) => pc = target,
                Ok(None) => pc += 1,
                Err(Stop::Done(t)) => break t,
            }
        };
        Outcome {
            termination,
            effects: self.effects,
            globals: self.globals,
            props: self.props,
            steps,
        }
    }
}

/// Execute a procedure with all locals empty
pub fn execute(proc: &Procedure) -> Outcome {
    Machine::new(proc).run()
}

// ============================================================================
// Structured programs
// ============================================================================

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i16),
    Bool(Truth),
    Lit(u16),
    Local(u16),
    Global(u16),
    Prop(i16, u16),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// How a conditional is lowered
#[derive(Debug, Clone, Copy)]
pub enum Branch {
    /// `Jump(!true, pop) else`
    Direct,
    /// `Not; Jump(true, pop) else`
    Negated,
    /// `Jump(true, pop) then; Jump else; then:`
    Trampoline,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `x := e`, lowered as `Store; Drop` or as `Pop`
    Assign { slot: u16, value: Expr, pop: bool },
    SetGlobal(u16, Expr),
    SetProp { object: i16, name: u16, value: Expr },
    Call { object: i16, name: u16 },
    Print(Expr),
    Discard(Expr),
    Eval,
    Return(Option<Expr>),
    Throw(Expr),
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>, branch: Branch },
    /// Run the body `count` times using a count-down jump
    Repeat { count: u8, body: Vec<Stmt> },
}

struct Codegen {
    b: ProcedureBuilder,
}

impl Codegen {
    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Int(i) => {
                self.b.emit(Instruction::push_int(*i));
            }
            Expr::Bool(t) => {
                self.b.emit(Instruction::push_bool(*t));
            }
            Expr::Lit(idx) => {
                self.b.emit(Instruction::push_literal(*idx));
            }
            Expr::Local(slot) => {
                self.b.emit(Instruction::push_local(*slot));
            }
            Expr::Global(idx) => {
                self.b.emit(Instruction::push_named(*idx));
            }
            Expr::Prop(object, name) => {
                self.b
                    .emit(Instruction::push_int(*object))
                    .emit(Instruction::Memref(MemrefOp::Load, *name));
            }
            Expr::Unary(op, inner) => {
                self.expr(inner);
                self.b.emit(Instruction::Unary(*op));
            }
            Expr::Binary(op, lhs, rhs) => {
                self.expr(lhs);
                if let Expr::Local(slot) = **rhs {
                    self.b.emit(Instruction::FusedBinary(
                        Operand::Variable(Variable::local(slot)),
                        *op,
                    ));
                } else {
                    self.expr(rhs);
                    self.b.emit(Instruction::Binary(*op));
                }
            }
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { slot, value, pop } => {
                self.expr(value);
                let var = Variable::local(*slot);
                if *pop {
                    self.b.emit(Instruction::Pop(var));
                } else {
                    self.b.emit(Instruction::Store(var)).emit(Instruction::drop(1));
                }
            }
            Stmt::SetGlobal(idx, value) => {
                self.expr(value);
                self.b
                    .emit(Instruction::Store(Variable::named(*idx)))
                    .emit(Instruction::drop(1));
            }
            Stmt::SetProp { object, name, value } => {
                self.expr(value);
                self.b
                    .emit(Instruction::push_int(*object))
                    .emit(Instruction::Memref(MemrefOp::Store, *name))
                    .emit(Instruction::drop(1));
            }
            Stmt::Call { object, name } => {
                self.b
                    .emit(Instruction::push_int(*object))
                    .emit(Instruction::Memref(MemrefOp::Call, *name))
                    .emit(Instruction::drop(1));
            }
            Stmt::Print(value) => {
                self.expr(value);
                self.b.emit(Instruction::Special(SpecialOp::Print, 1));
            }
            Stmt::Discard(value) => {
                self.expr(value);
                self.b.emit(Instruction::drop(1));
            }
            Stmt::Eval => {
                self.b
                    .emit(Instruction::push_literal(0))
                    .emit(Instruction::Special(SpecialOp::EvalStatement, 0));
            }
            Stmt::Return(value) => match value {
                Some(value) => {
                    self.expr(value);
                    self.b.emit(Instruction::ret(1));
                }
                None => {
                    self.b.emit(Instruction::ret(0));
                }
            },
            Stmt::Throw(value) => {
                self.expr(value);
                self.b.emit(Instruction::Special(SpecialOp::Throw, 0));
            }
            Stmt::If { cond, then, otherwise, branch } => {
                let else_label = self.b.make_label();
                let end_label = self.b.make_label();
                self.expr(cond);
                match branch {
                    Branch::Direct => {
                        self.b.emit_jump(
                            JumpFlags::IF_FALSE | JumpFlags::IF_EMPTY | JumpFlags::POP_ALWAYS,
                            else_label,
                        );
                    }
                    Branch::Negated => {
                        self.b
                            .emit(Instruction::Unary(UnaryOp::Not))
                            .emit_jump(JumpFlags::IF_TRUE | JumpFlags::POP_ALWAYS, else_label);
                    }
                    Branch::Trampoline => {
                        let then_label = self.b.make_label();
                        self.b
                            .emit_jump(JumpFlags::IF_TRUE | JumpFlags::POP_ALWAYS, then_label)
                            .emit_jump(JumpFlags::ALWAYS, else_label)
                            .define_label(then_label);
                    }
                }
                self.block(then);
                self.b
                    .emit_jump(JumpFlags::ALWAYS, end_label)
                    .define_label(else_label);
                self.block(otherwise);
                self.b.define_label(end_label);
            }
            Stmt::Repeat { count, body } => {
                let top = self.b.make_label();
                let exit = self.b.make_label();
                self.b
                    .emit(Instruction::push_int(*count as i16 + 1))
                    .define_label(top)
                    .emit_jump(JumpFlags::DEC_ZERO, exit);
                self.block(body);
                self.b
                    .emit_jump(JumpFlags::ALWAYS, top)
                    .define_label(exit)
                    .emit(Instruction::drop(1));
            }
        }
    }
}

/// Lower a program to a procedure
pub fn compile(stmts: &[Stmt]) -> Procedure {
    let mut b = Procedure::builder("generated");
    for literal in literals() {
        b.add_literal(literal);
    }
    for i in 0..NUM_LOCALS {
        b.add_local(format!("l{}", i));
    }
    for i in 0..NUM_GLOBALS {
        b.add_name(format!("G{}", i));
    }
    let mut gen = Codegen { b };
    gen.block(stmts);
    gen.b.build()
}

// ============================================================================
// Strategies
// ============================================================================

const UNARY_OPS: [UnaryOp; 11] = [
    UnaryOp::Not,
    UnaryOp::Bool,
    UnaryOp::Neg,
    UnaryOp::Pos,
    UnaryOp::Zap,
    UnaryOp::IsEmpty,
    UnaryOp::Not2,
    UnaryOp::Inc,
    UnaryOp::Dec,
    UnaryOp::Abs,
    UnaryOp::BitNot,
];

const BINARY_OPS: [BinaryOp; 20] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mult,
    BinaryOp::Divide,
    BinaryOp::IntegerDivide,
    BinaryOp::Remainder,
    BinaryOp::Pow,
    BinaryOp::Concat,
    BinaryOp::CompareEq,
    BinaryOp::CompareEqNC,
    BinaryOp::CompareNe,
    BinaryOp::CompareLt,
    BinaryOp::CompareLtNC,
    BinaryOp::CompareGe,
    BinaryOp::MaxNC,
    BinaryOp::FindStrNC,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::BitAnd,
    BinaryOp::BitXor,
];

fn arb_truth() -> impl Strategy<Value = Truth> {
    prop_oneof![Just(Truth::True), Just(Truth::False), Just(Truth::Empty)]
}

pub fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        3 => (-2i16..=2).prop_map(Expr::Int),
        2 => arb_truth().prop_map(Expr::Bool),
        2 => (0..literals().len() as u16).prop_map(Expr::Lit),
        3 => (0..NUM_LOCALS).prop_map(Expr::Local),
        1 => (0..NUM_GLOBALS).prop_map(Expr::Global),
        1 => (0i16..2, 0u16..2).prop_map(|(o, n)| Expr::Prop(o, n)),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            (prop::sample::select(UNARY_OPS.to_vec()), inner.clone())
                .prop_map(|(op, e)| Expr::Unary(op, Box::new(e))),
            (prop::sample::select(BINARY_OPS.to_vec()), inner.clone(), inner)
                .prop_map(|(op, a, b)| Expr::Binary(op, Box::new(a), Box::new(b))),
        ]
    })
}

fn arb_branch() -> impl Strategy<Value = Branch> {
    prop_oneof![
        Just(Branch::Direct),
        Just(Branch::Negated),
        Just(Branch::Trampoline)
    ]
}

fn arb_simple_stmt() -> impl Strategy<Value = Stmt> {
    prop_oneof![
        4 => (0..NUM_LOCALS, arb_expr(), any::<bool>())
            .prop_map(|(slot, value, pop)| Stmt::Assign { slot, value, pop }),
        1 => (0..NUM_GLOBALS, arb_expr()).prop_map(|(idx, e)| Stmt::SetGlobal(idx, e)),
        1 => (0i16..2, 0u16..2, arb_expr())
            .prop_map(|(object, name, value)| Stmt::SetProp { object, name, value }),
        1 => (0i16..2, 0u16..2).prop_map(|(object, name)| Stmt::Call { object, name }),
        3 => arb_expr().prop_map(Stmt::Print),
        1 => arb_expr().prop_map(Stmt::Discard),
        1 => Just(Stmt::Eval),
        1 => proptest::option::of(arb_expr()).prop_map(Stmt::Return),
        1 => arb_expr().prop_map(Stmt::Throw),
    ]
}

pub fn arb_stmt() -> impl Strategy<Value = Stmt> {
    arb_simple_stmt().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            (arb_expr(), vec(inner.clone(), 0..4), vec(inner.clone(), 0..4), arb_branch())
                .prop_map(|(cond, then, otherwise, branch)| Stmt::If {
                    cond,
                    then,
                    otherwise,
                    branch
                }),
            (0u8..4, vec(inner, 0..4)).prop_map(|(count, body)| Stmt::Repeat { count, body }),
        ]
    })
}

/// Random program, already lowered
pub fn arb_procedure() -> impl Strategy<Value = Procedure> {
    vec(arb_stmt(), 0..8).prop_map(|stmts| compile(&stmts))
}

/// Every jump targets a label defined exactly once, and no label is defined
/// twice
pub fn labels_consistent(proc: &Procedure) -> bool {
    let mut defs: BTreeMap<LabelId, usize> = BTreeMap::new();
    for insn in proc.code() {
        if let Some(label) = insn.defined_label() {
            *defs.entry(label).or_default() += 1;
        }
    }
    defs.values().all(|&n| n == 1)
        && proc
            .code()
            .iter()
            .filter_map(Instruction::referenced_label)
            .all(|label| defs.contains_key(&label))
}
