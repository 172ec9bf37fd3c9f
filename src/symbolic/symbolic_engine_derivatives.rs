//! # Symbolic Engine Derivatives Module
//!
//! Analytical differentiation of formula expressions with respect to the independent
//! variable `x` or to a named parameter. The latter is what the model fitter uses to build
//! the Jacobian of the least-squares problem.
//!
//! ## Key Methods
//! - `diff_x()` / `diff_param(key)` - first derivative
//! - `n_th_derivative_x(n)` - repeated differentiation with simplification after each step
//!
//! The factorial has no derivative; differentiating it with respect to a variable its
//! argument depends on fails with [`DiffError::NonDifferentiable`].

use crate::symbolic::symbolic_engine::{BinOp, Expr, Func, UnOp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiffError {
    #[error("factorial of an expression depending on `{0}` cannot be differentiated")]
    NonDifferentiable(String),
}

/// What to differentiate with respect to
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DiffVar<'a> {
    X,
    Param(&'a str),
}

impl DiffVar<'_> {
    fn name(&self) -> String {
        match self {
            DiffVar::X => "x".to_string(),
            DiffVar::Param(key) => key.to_string(),
        }
    }
}

impl Expr {
    fn depends_on(&self, var: DiffVar) -> bool {
        match var {
            DiffVar::X => self.depends_on_x(),
            DiffVar::Param(key) => self.depends_on_param(key),
        }
    }

    /// DIFFERENTIATION

    /// Computes the analytical derivative of the expression.
    ///
    /// Implements the standard rules:
    /// - Power rule: d/dx(u^n) = n*u^(n-1)*u' for n independent of the variable,
    ///   d/dx(u^v) = u^v*(v'*ln(u) + v*u'/u) otherwise
    /// - Product rule: d/dx(f*g) = f'*g + f*g'
    /// - Quotient rule: d/dx(f/g) = (f'*g - f*g')/g^2
    /// - Chain rule for exp, sin, cos, ln
    pub fn diff(&self, var: DiffVar) -> Result<Expr, DiffError> {
        if !self.depends_on(var) {
            return Ok(Expr::Const(0.0));
        }
        let derivative = match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Var => Expr::Const(1.0),
            Expr::Param(_) => Expr::Const(1.0),
            Expr::Binary(op, lhs, rhs) => {
                let (u, v) = (lhs.as_ref().clone(), rhs.as_ref().clone());
                match op {
                    BinOp::Add => u.diff(var)? + v.diff(var)?,
                    BinOp::Sub => u.diff(var)? - v.diff(var)?,
                    BinOp::Mul => u.diff(var)? * v.clone() + u * v.diff(var)?,
                    BinOp::Div => {
                        (u.diff(var)? * v.clone() - u * v.diff(var)?) / v.pow(Expr::Const(2.0))
                    }
                    BinOp::Pow if !v.depends_on(var) => {
                        v.clone() * u.clone().pow(v - Expr::Const(1.0)) * u.diff(var)?
                    }
                    BinOp::Pow if !u.depends_on(var) => self.clone() * u.ln() * v.diff(var)?,
                    BinOp::Pow => {
                        self.clone()
                            * (v.diff(var)? * u.clone().ln() + v * u.diff(var)? / u)
                    }
                }
            }
            Expr::Unary(UnOp::Neg, arg) => -arg.diff(var)?,
            Expr::Call(func, arg) => {
                let u = arg.as_ref().clone();
                match func {
                    Func::Exp => u.clone().exp() * u.diff(var)?,
                    Func::Sin => Expr::call(Func::Cos, u.clone()) * u.diff(var)?,
                    Func::Cos => -Expr::call(Func::Sin, u.clone()) * u.diff(var)?,
                    Func::Ln => u.diff(var)? / u,
                    Func::Fac => return Err(DiffError::NonDifferentiable(var.name())),
                }
            }
        };
        Ok(derivative)
    }

    /// derivative with respect to `x`, simplified
    pub fn diff_x(&self) -> Result<Expr, DiffError> {
        Ok(self.diff(DiffVar::X)?.simplify_())
    }

    /// partial derivative with respect to parameter `key`, simplified
    pub fn diff_param(&self, key: &str) -> Result<Expr, DiffError> {
        Ok(self.diff(DiffVar::Param(key))?.simplify_())
    }

    /// n-th derivative with respect to `x`; order 0 returns the expression itself
    pub fn n_th_derivative_x(&self, order: usize) -> Result<Expr, DiffError> {
        let mut derivative = self.clone();
        for _ in 0..order {
            derivative = derivative.diff_x()?;
        }
        Ok(derivative)
    }
}
