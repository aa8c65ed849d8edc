//! Literal values and their compile-time semantics
//!
//! This module defines the value domain that literal operands live in, the
//! three-valued truth classification used by conditional jumps, and the
//! evaluation of unary and binary operations on known values. Literal folding
//! relies on these functions; they are the reference semantics that every
//! rewrite in the optimizer has to preserve.

use std::cmp::Ordering;
use std::fmt;

use super::opcodes::{BinaryOp, JumpFlags, UnaryOp};

/// Three-valued truth class of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truth {
    True,
    False,
    Empty,
}

impl Truth {
    /// All truth classes, in table order
    pub const ALL: [Truth; 3] = [Truth::True, Truth::False, Truth::Empty];

    /// Index into per-class lookup tables
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Truth::True => 0,
            Truth::False => 1,
            Truth::Empty => 2,
        }
    }

    /// Jump condition bit that fires for this class
    #[inline]
    pub fn flag(self) -> JumpFlags {
        match self {
            Truth::True => JumpFlags::IF_TRUE,
            Truth::False => JumpFlags::IF_FALSE,
            Truth::Empty => JumpFlags::IF_EMPTY,
        }
    }

    /// Canonical value of this class (`true`, `false` or empty)
    pub fn to_value(self) -> Value {
        match self {
            Truth::True => Value::Bool(true),
            Truth::False => Value::Bool(false),
            Truth::Empty => Value::Empty,
        }
    }

    /// Encoding used by boolean immediates: 1, 0, -1
    pub fn to_i16(self) -> i16 {
        match self {
            Truth::True => 1,
            Truth::False => 0,
            Truth::Empty => -1,
        }
    }
}

/// Evaluation error for literal operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Operand has the wrong type for the operation
    TypeError { op: &'static str },
    /// Division or remainder by zero
    DivisionByZero,
    /// Result is not a finite number
    DomainError { op: &'static str },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeError { op } => write!(f, "Type error in {}", op),
            Self::DivisionByZero => write!(f, "Division by zero"),
            Self::DomainError { op } => write!(f, "Result of {} is not a finite number", op),
        }
    }
}

impl std::error::Error for EvalError {}

/// Result type for literal evaluation
pub type EvalResult = Result<Value, EvalError>;

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Bool(bool),
    Int(i32),
    Float(f64),
    Str(String),
}

/// Numeric view of a value
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i32),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl Value {
    /// Three-valued truth class
    pub fn truth(&self) -> Truth {
        let truthy = match self {
            Value::Empty => return Truth::Empty,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        };
        if truthy {
            Truth::True
        } else {
            Truth::False
        }
    }

    /// Same literal, bit for bit; unlike `==`, `0.0` and `-0.0` differ
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Check for the empty value
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric coercion; `Ok(None)` for empty, bools count as integers
    fn numeric(&self, op: &'static str) -> Result<Option<Num>, EvalError> {
        match self {
            Value::Empty => Ok(None),
            Value::Bool(b) => Ok(Some(Num::Int(*b as i32))),
            Value::Int(i) => Ok(Some(Num::Int(*i))),
            Value::Float(f) => Ok(Some(Num::Float(*f))),
            Value::Str(_) => Err(EvalError::TypeError { op }),
        }
    }

    /// Integer coercion; floats and strings are type errors
    fn integer(&self, op: &'static str) -> Result<Option<i32>, EvalError> {
        match self.numeric(op)? {
            None => Ok(None),
            Some(Num::Int(i)) => Ok(Some(i)),
            Some(Num::Float(_)) => Err(EvalError::TypeError { op }),
        }
    }

    /// Apply a unary operation
    pub fn apply_unary(&self, op: UnaryOp) -> EvalResult {
        let name = op.mnemonic();
        match op {
            UnaryOp::Not => Ok(match self.truth() {
                Truth::Empty => Value::Empty,
                t => Value::Bool(t == Truth::False),
            }),
            UnaryOp::Bool => Ok(match self.truth() {
                Truth::Empty => Value::Empty,
                t => Value::Bool(t == Truth::True),
            }),
            UnaryOp::Not2 => Ok(Value::Bool(self.truth() != Truth::True)),
            UnaryOp::Zap => Ok(if self.truth() == Truth::True {
                self.clone()
            } else {
                Value::Empty
            }),
            UnaryOp::IsEmpty => Ok(Value::Bool(self.is_empty())),
            UnaryOp::Neg => match self.numeric(name)? {
                None => Ok(Value::Empty),
                Some(Num::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                Some(Num::Float(f)) => finite(-f, name),
            },
            UnaryOp::Pos => match self.numeric(name)? {
                None => Ok(Value::Empty),
                Some(Num::Int(i)) => Ok(Value::Int(i)),
                Some(Num::Float(f)) => finite(f, name),
            },
            UnaryOp::Inc => self.offset(1, name),
            UnaryOp::Dec => self.offset(-1, name),
            UnaryOp::Abs => match self.numeric(name)? {
                None => Ok(Value::Empty),
                Some(Num::Int(i)) => Ok(Value::Int(i.wrapping_abs())),
                Some(Num::Float(f)) => finite(f.abs(), name),
            },
            UnaryOp::BitNot => Ok(match self.integer(name)? {
                None => Value::Empty,
                Some(i) => Value::Int(!i),
            }),
        }
    }

    fn offset(&self, delta: i32, op: &'static str) -> EvalResult {
        match self.numeric(op)? {
            None => Ok(Value::Empty),
            Some(Num::Int(i)) => Ok(Value::Int(i.wrapping_add(delta))),
            Some(Num::Float(f)) => finite(f + delta as f64, op),
        }
    }

    /// Apply a binary operation; `self` is the left operand
    pub fn apply_binary(&self, op: BinaryOp, rhs: &Value) -> EvalResult {
        let name = op.mnemonic();
        match op {
            BinaryOp::And => Ok(match (self.truth(), rhs.truth()) {
                (Truth::False, _) | (_, Truth::False) => Value::Bool(false),
                (Truth::Empty, _) | (_, Truth::Empty) => Value::Empty,
                _ => Value::Bool(true),
            }),
            BinaryOp::Or => Ok(match (self.truth(), rhs.truth()) {
                (Truth::True, _) | (_, Truth::True) => Value::Bool(true),
                (Truth::Empty, _) | (_, Truth::Empty) => Value::Empty,
                _ => Value::Bool(false),
            }),
            BinaryOp::Xor => Ok(match (self.truth(), rhs.truth()) {
                (Truth::Empty, _) | (_, Truth::Empty) => Value::Empty,
                (a, b) => Value::Bool(a != b),
            }),
            _ if self.is_empty() || rhs.is_empty() => Ok(Value::Empty),
            BinaryOp::Add => match (self, rhs) {
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
                _ => arith(self, rhs, name, i32::wrapping_add, |a, b| a + b),
            },
            BinaryOp::Sub => arith(self, rhs, name, i32::wrapping_sub, |a, b| a - b),
            BinaryOp::Mult => arith(self, rhs, name, i32::wrapping_mul, |a, b| a * b),
            BinaryOp::Divide => divide(self, rhs, name),
            BinaryOp::IntegerDivide | BinaryOp::Remainder => {
                let (Some(a), Some(b)) = (self.integer(name)?, rhs.integer(name)?) else {
                    return Ok(Value::Empty);
                };
                if b == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Value::Int(if op == BinaryOp::Remainder {
                    a.wrapping_rem(b)
                } else {
                    a.wrapping_div(b)
                }))
            }
            BinaryOp::Pow => power(self, rhs, name),
            BinaryOp::Concat => Ok(Value::Str(format!("{}{}", self, rhs))),
            BinaryOp::CompareEq
            | BinaryOp::CompareEqNC
            | BinaryOp::CompareNe
            | BinaryOp::CompareNeNC
            | BinaryOp::CompareLt
            | BinaryOp::CompareLtNC
            | BinaryOp::CompareLe
            | BinaryOp::CompareLeNC
            | BinaryOp::CompareGt
            | BinaryOp::CompareGtNC
            | BinaryOp::CompareGe
            | BinaryOp::CompareGeNC => {
                let ord = compare(self, rhs, op.is_case_insensitive(), name)?;
                let result = match op.case_sensitive() {
                    BinaryOp::CompareEq => ord == Ordering::Equal,
                    BinaryOp::CompareNe => ord != Ordering::Equal,
                    BinaryOp::CompareLt => ord == Ordering::Less,
                    BinaryOp::CompareLe => ord != Ordering::Greater,
                    BinaryOp::CompareGt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Min | BinaryOp::MinNC => {
                let ord = compare(self, rhs, op.is_case_insensitive(), name)?;
                Ok(if ord == Ordering::Greater { rhs.clone() } else { self.clone() })
            }
            BinaryOp::Max | BinaryOp::MaxNC => {
                let ord = compare(self, rhs, op.is_case_insensitive(), name)?;
                Ok(if ord == Ordering::Less { rhs.clone() } else { self.clone() })
            }
            BinaryOp::FindStr | BinaryOp::FindStrNC => match (self, rhs) {
                (Value::Str(hay), Value::Str(needle)) => {
                    let found = if op.is_case_insensitive() {
                        hay.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
                    } else {
                        hay.find(needle.as_str())
                    };
                    Ok(Value::Int(found.map_or(0, |p| p as i32 + 1)))
                }
                _ => Err(EvalError::TypeError { op: name }),
            },
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                let (Some(a), Some(b)) = (self.integer(name)?, rhs.integer(name)?) else {
                    return Ok(Value::Empty);
                };
                Ok(Value::Int(match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                }))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Bool(true) => write!(f, "YES"),
            Value::Bool(false) => write!(f, "NO"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Float result of an operation; negative zero is normalized to zero
fn finite(value: f64, op: &'static str) -> EvalResult {
    if value == 0.0 {
        Ok(Value::Float(0.0))
    } else if value.is_finite() {
        Ok(Value::Float(value))
    } else {
        Err(EvalError::DomainError { op })
    }
}

fn arith(
    lhs: &Value,
    rhs: &Value,
    op: &'static str,
    int_op: fn(i32, i32) -> i32,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    let (Some(a), Some(b)) = (lhs.numeric(op)?, rhs.numeric(op)?) else {
        return Ok(Value::Empty);
    };
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(int_op(x, y))),
        _ => finite(float_op(a.as_f64(), b.as_f64()), op),
    }
}

fn divide(lhs: &Value, rhs: &Value, op: &'static str) -> EvalResult {
    let (Some(a), Some(b)) = (lhs.numeric(op)?, rhs.numeric(op)?) else {
        return Ok(Value::Empty);
    };
    if b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        if x.wrapping_rem(y) == 0 {
            return Ok(Value::Int(x.wrapping_div(y)));
        }
    }
    finite(a.as_f64() / b.as_f64(), op)
}

fn power(lhs: &Value, rhs: &Value, op: &'static str) -> EvalResult {
    let (Some(a), Some(b)) = (lhs.numeric(op)?, rhs.numeric(op)?) else {
        return Ok(Value::Empty);
    };
    match (a, b) {
        (Num::Int(x), Num::Int(y)) if y >= 0 => Ok(Value::Int(x.wrapping_pow(y as u32))),
        (_, Num::Int(y)) => finite(a.as_f64().powi(y), op),
        _ => finite(a.as_f64().powf(b.as_f64()), op),
    }
}

/// Compare two non-empty values
fn compare(lhs: &Value, rhs: &Value, fold_case: bool, op: &'static str) -> Result<Ordering, EvalError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(if fold_case {
            a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
        } else {
            a.cmp(b)
        }),
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(EvalError::TypeError { op }),
        _ => {
            let (Some(a), Some(b)) = (lhs.numeric(op)?, rhs.numeric(op)?) else {
                return Err(EvalError::TypeError { op });
            };
            match (a, b) {
                (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
                _ => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .ok_or(EvalError::DomainError { op }),
            }
        }
    }
}
