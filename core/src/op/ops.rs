use std::fmt::{self, Display};

use crate::error::RuntimeError;
use crate::val::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Len,
}

impl UnaryOp {
    pub fn eval(self, val: &Value) -> Result<Value, RuntimeError> {
        match self {
            UnaryOp::Neg => Ok(Value::Number(-val.to_number()?)),
            UnaryOp::Not => Ok(Value::from_bool(!val.truthy())),
            UnaryOp::BitNot => Ok(Value::Number(f64::from(!val.to_i32()?))),
            UnaryOp::Len => val.len().map(|n| Value::Number(n as f64)),
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
            UnaryOp::BitNot => write!(f, "~"),
            UnaryOp::Len => write!(f, "#"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Concat,
    MapConcat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// Operators whose result the optimizer may compute ahead of time.
    /// Map concatenation always allocates a fresh map and is never folded.
    pub fn is_foldable(self) -> bool {
        !matches!(self, BinOp::MapConcat)
    }

    /// Evaluate a comparison straight to a Rust bool (used by fused compare-jumps).
    pub fn test(self, l: &Value, r: &Value) -> Result<bool, RuntimeError> {
        match self {
            BinOp::Eq => Ok(l == r),
            BinOp::Ne => Ok(l != r),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => self.order(l, r),
            _ => Ok(self.eval(l, r)?.truthy()),
        }
    }

    pub fn eval(self, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
        match self {
            BinOp::Add => Ok(Value::Number(l.to_number()? + r.to_number()?)),
            BinOp::Sub => Ok(Value::Number(l.to_number()? - r.to_number()?)),
            BinOp::Mul => Ok(Value::Number(l.to_number()? * r.to_number()?)),
            BinOp::Div => Ok(Value::Number(l.to_number()? / r.to_number()?)),
            BinOp::Mod => Ok(Value::Number(l.to_number()? % r.to_number()?)),
            BinOp::BitAnd => int_op(l, r, |a, b| a & b),
            BinOp::BitOr => int_op(l, r, |a, b| a | b),
            BinOp::BitXor => int_op(l, r, |a, b| a ^ b),
            BinOp::Shl => int_op(l, r, |a, b| a.wrapping_shl(b as u32 & 31)),
            BinOp::Shr => int_op(l, r, |a, b| a.wrapping_shr(b as u32 & 31)),
            BinOp::UShr => int_op(l, r, |a, b| ((a as u32) >> (b as u32 & 31)) as i32),
            BinOp::Concat => Ok(Value::concat_strings(l, r)),
            BinOp::MapConcat => Value::concat_maps(l, r),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                Ok(Value::from_bool(self.test(l, r)?))
            }
        }
    }

    fn order(self, l: &Value, r: &Value) -> Result<bool, RuntimeError> {
        // IEEE semantics: every ordering against NaN is false
        if let (Value::Number(a), Value::Number(b)) = (l, r) {
            return Ok(match self {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                _ => a >= b,
            });
        }
        let ord = l.compare(r)?;
        Ok(match self {
            BinOp::Lt => ord.is_lt(),
            BinOp::Le => ord.is_le(),
            BinOp::Gt => ord.is_gt(),
            _ => ord.is_ge(),
        })
    }
}

#[inline]
fn int_op(l: &Value, r: &Value, op: impl FnOnce(i32, i32) -> i32) -> Result<Value, RuntimeError> {
    Ok(Value::Number(f64::from(op(l.to_i32()?, r.to_i32()?))))
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::UShr => ">>>",
            BinOp::Concat => "..",
            BinOp::MapConcat => "++",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        };
        f.write_str(s)
    }
}
