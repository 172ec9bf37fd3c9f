//! # Symbolic Expression Simplification Module
//!
//! Light simplification used to keep derivatives readable:
//!
//! 1. **Constant Folding**: evaluates operations on numerical constants
//! 2. **Algebraic Identities**: `x + 0 = x`, `x * 1 = x`, `0 * x = 0`, `x^1 = x`, `x^0 = 1`
//! 3. **Negation**: `-(-(a)) = a`, `-(c) = -c` for constants
//!
//! Folding never produces a non-finite constant; such nodes are kept as they are.

use crate::symbolic::symbolic_engine::{BinOp, Expr, Func, UnOp};

fn fold(value: f64) -> Option<Expr> {
    if value.is_finite() {
        Some(Expr::Const(value))
    } else {
        None
    }
}

impl Expr {
    /// Simplifies the expression bottom-up until no rule applies at the root.
    pub fn simplify_(&self) -> Expr {
        match self {
            Expr::Const(_) | Expr::Var | Expr::Param(_) => self.clone(),
            Expr::Binary(op, lhs, rhs) => {
                simplify_binary(*op, lhs.simplify_(), rhs.simplify_())
            }
            Expr::Unary(UnOp::Neg, arg) => match arg.simplify_() {
                Expr::Const(c) => Expr::Const(-c),
                Expr::Unary(UnOp::Neg, inner) => *inner,
                other => -other,
            },
            Expr::Call(func, arg) => {
                let arg = arg.simplify_();
                if let Expr::Const(c) = arg {
                    if let Some(folded) = func.apply(c).ok().and_then(fold) {
                        return folded;
                    }
                }
                Expr::call(*func, arg)
            }
        }
    }
}

fn simplify_binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    if let (Expr::Const(a), Expr::Const(b)) = (&lhs, &rhs) {
        if let Some(folded) = fold(op.apply(*a, *b)) {
            return folded;
        }
    }
    match op {
        BinOp::Add if lhs.is_zero() => rhs,
        BinOp::Add if rhs.is_zero() => lhs,
        BinOp::Sub if rhs.is_zero() => lhs,
        BinOp::Sub if lhs.is_zero() => (-rhs).simplify_(),
        BinOp::Sub if lhs == rhs => Expr::Const(0.0),
        BinOp::Mul if lhs.is_zero() || rhs.is_zero() => Expr::Const(0.0),
        BinOp::Mul if lhs.is_one() => rhs,
        BinOp::Mul if rhs.is_one() => lhs,
        BinOp::Mul if matches!(lhs, Expr::Const(c) if c == -1.0) => (-rhs).simplify_(),
        BinOp::Mul if matches!(rhs, Expr::Const(c) if c == -1.0) => (-lhs).simplify_(),
        BinOp::Div if lhs.is_zero() && !rhs.is_zero() => Expr::Const(0.0),
        BinOp::Div if rhs.is_one() => lhs,
        BinOp::Pow if rhs.is_zero() => Expr::Const(1.0),
        BinOp::Pow if rhs.is_one() => lhs,
        BinOp::Pow if lhs.is_one() => Expr::Const(1.0),
        // exp(a)^b = exp(a*b) keeps repeated derivatives of exponentials flat
        BinOp::Pow => match lhs {
            Expr::Call(Func::Exp, arg) => Expr::call(Func::Exp, simplify_binary(BinOp::Mul, *arg, rhs)),
            _ => lhs.pow(rhs),
        },
        _ => Expr::Binary(op, lhs.boxed(), rhs.boxed()),
    }
}
