//! # Symbolic Engine Module
//!
//! Symbolic representation of model formulas. A formula is a function of the single
//! independent variable `x` and of named parameters `p["key"]`; it is stored as a closed
//! expression tree and every consumer (numeric evaluation, rendering, parameter binding)
//! walks the tree through the [`ExprVisitor`] trait.
//!
//! ## Main Structures
//!
//! ### `Expr` Enum
//! - **Constants**: `Const(f64)`
//! - **Independent variable**: `Var` - the `x` of a formula
//! - **Parameters**: `Param(String)` - the `p[key]` of a formula
//! - **Operations**: `Binary(BinOp, ..)`, `Unary(UnOp, ..)` - arithmetic
//! - **Functions**: `Call(Func, ..)` - factorial, exponential, sine and the cosine/logarithm
//!   nodes produced by differentiation
//!
//! ### Visitors
//! - `Evaluator` - numeric value at a given `x` and parameter map
//! - `Renderer` - plain text or LaTeX rendering, collects the referenced parameters
//!
//! ## Interesting Code Features
//!
//! 1. **Closed node set**: a formula tree cannot hold anything but arithmetic over `x`,
//!    parameters and whitelisted functions, so evaluating it can never reach I/O
//!
//! 2. **Operator Overloading**: `std::ops` traits are implemented for `Expr`, so derivative
//!    rules are written as `u.clone() * v.diff_x()?`
//!
//! 3. **Post-order dispatch**: `Expr::accept` evaluates children first and hands their results
//!    to the visitor, so visitors never recurse by themselves

#![allow(non_camel_case_types)]

use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// Parameter values keyed by name. Ordered, so positional parameter vectors built from it are
/// lexicographic.
pub type ParamMap = BTreeMap<String, f64>;

/// Binary arithmetic operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
            BinOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
}

/// Functions of one argument.
///
/// Formulas may only call `fac`, `exp` and `sin`; `cos` and `ln` appear in derivatives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Func {
    Fac,
    Exp,
    Sin,
    Cos,
    Ln,
}

impl Func {
    /// functions callable from a formula string
    pub fn from_formula_name(name: &str) -> Option<Func> {
        match name {
            "fac" => Some(Func::Fac),
            "exp" => Some(Func::Exp),
            "sin" => Some(Func::Sin),
            _ => None,
        }
    }

    pub fn apply(self, arg: f64) -> Result<f64, EvalError> {
        match self {
            Func::Fac => factorial(arg),
            Func::Exp => Ok(arg.exp()),
            Func::Sin => Ok(arg.sin()),
            Func::Cos => Ok(arg.cos()),
            Func::Ln => Ok(arg.ln()),
        }
    }
}

/// largest n whose factorial is finite in f64
const MAX_FINITE_FACTORIAL: f64 = 170.0;

/// factorial of a non-negative integer stored in a float
pub fn factorial(n: f64) -> Result<f64, EvalError> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return Err(EvalError::FactorialDomain(n));
    }
    if n > MAX_FINITE_FACTORIAL {
        return Ok(f64::INFINITY);
    }
    Ok((1..=n as u64).map(|k| k as f64).product())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("parameter `{0}` has no value")]
    MissingParameter(String),
    #[error("factorial is defined for non-negative integers only, got {0}")]
    FactorialDomain(f64),
}

/// Core symbolic expression enum of a model formula.
///
/// # Examples
/// ```rust, ignore
/// use RustedSITforC::symbolic::symbolic_engine::Expr;
/// // p["k"] * x + 2
/// let expr = Expr::param("k") * Expr::Var + Expr::Const(2.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Numerical constant value
    Const(f64),
    /// The independent variable `x`
    Var,
    /// Named parameter `p[key]`
    Param(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Call(Func, Box<Expr>),
}

/// Output notation of the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Notation {
    /// `(a + b)`, `a · b`, `a/b`, `(a)^b`, `e^a`, `sin(a)`, `a!`
    #[default]
    Plain,
    /// LaTeX math mode, wrapped in `$...$`
    Latex,
}

/// Operations applied by [`Expr::accept`] to every node, children first.
pub trait ExprVisitor {
    type Output;
    type Error;

    fn constant(&mut self, value: f64) -> Result<Self::Output, Self::Error>;
    fn variable(&mut self) -> Result<Self::Output, Self::Error>;
    fn parameter(&mut self, key: &str) -> Result<Self::Output, Self::Error>;
    fn binary(
        &mut self,
        op: BinOp,
        lhs: Self::Output,
        rhs: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    fn unary(&mut self, op: UnOp, arg: Self::Output) -> Result<Self::Output, Self::Error>;
    fn call(&mut self, func: Func, arg: Self::Output) -> Result<Self::Output, Self::Error>;
}

/// Numeric evaluation at a point `x` with the given parameter values
pub struct Evaluator<'a> {
    pub x: f64,
    pub params: &'a ParamMap,
}

impl ExprVisitor for Evaluator<'_> {
    type Output = f64;
    type Error = EvalError;

    fn constant(&mut self, value: f64) -> Result<f64, EvalError> {
        Ok(value)
    }
    fn variable(&mut self) -> Result<f64, EvalError> {
        Ok(self.x)
    }
    fn parameter(&mut self, key: &str) -> Result<f64, EvalError> {
        self.params
            .get(key)
            .copied()
            .ok_or_else(|| EvalError::MissingParameter(key.to_string()))
    }
    fn binary(&mut self, op: BinOp, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        Ok(op.apply(lhs, rhs))
    }
    fn unary(&mut self, op: UnOp, arg: f64) -> Result<f64, EvalError> {
        match op {
            UnOp::Neg => Ok(-arg),
        }
    }
    fn call(&mut self, func: Func, arg: f64) -> Result<f64, EvalError> {
        func.apply(arg)
    }
}

/// Typesetting pass. Every distinct parameter key is recorded once, in order of first
/// appearance.
pub struct Renderer {
    pub notation: Notation,
    pub params: Vec<String>,
}

impl Renderer {
    pub fn new(notation: Notation) -> Self {
        Renderer {
            notation,
            params: Vec::new(),
        }
    }
}

impl ExprVisitor for Renderer {
    type Output = String;
    type Error = std::convert::Infallible;

    fn constant(&mut self, value: f64) -> Result<String, Self::Error> {
        Ok(format!("{}", value))
    }
    fn variable(&mut self) -> Result<String, Self::Error> {
        Ok("x".to_string())
    }
    fn parameter(&mut self, key: &str) -> Result<String, Self::Error> {
        if !self.params.iter().any(|p| p == key) {
            self.params.push(key.to_string());
        }
        Ok(key.to_string())
    }
    fn binary(&mut self, op: BinOp, a: String, b: String) -> Result<String, Self::Error> {
        let s = match (self.notation, op) {
            (_, BinOp::Add) => format!("({} + {})", a, b),
            (_, BinOp::Sub) => format!("({} - {})", a, b),
            (Notation::Plain, BinOp::Mul) => format!("{} · {}", a, b),
            (Notation::Latex, BinOp::Mul) => format!("{} \\cdot {}", a, b),
            (Notation::Plain, BinOp::Div) => format!("{}/{}", a, b),
            (Notation::Latex, BinOp::Div) => format!("\\frac{{{}}}{{{}}}", a, b),
            (Notation::Plain, BinOp::Pow) => format!("({})^{}", a, b),
            (Notation::Latex, BinOp::Pow) => format!("({})^{{{}}}", a, b),
        };
        Ok(s)
    }
    fn unary(&mut self, op: UnOp, a: String) -> Result<String, Self::Error> {
        match op {
            UnOp::Neg => Ok(format!("-({})", a)),
        }
    }
    fn call(&mut self, func: Func, a: String) -> Result<String, Self::Error> {
        let s = match (self.notation, func) {
            (Notation::Plain, Func::Fac) => format!("{}!", a),
            (Notation::Latex, Func::Fac) => format!("{}\\mathrm{{!}}", a),
            (Notation::Plain, Func::Exp) => format!("e^{}", a),
            (Notation::Latex, Func::Exp) => format!("\\mathrm{{e}}^{{{}}}", a),
            (Notation::Plain, f) => format!("{}({})", f, a),
            (Notation::Latex, f) => format!("\\{}{{{}}}", f, a),
        };
        Ok(s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(Notation::Plain))
    }
}

impl std::ops::Add for Expr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Expr::Binary(BinOp::Add, self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for Expr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Expr::Binary(BinOp::Sub, self.boxed(), rhs.boxed())
    }
}

impl std::ops::Mul for Expr {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Expr::Binary(BinOp::Mul, self.boxed(), rhs.boxed())
    }
}

impl std::ops::Div for Expr {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Expr::Binary(BinOp::Div, self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Expr::Unary(UnOp::Neg, self.boxed())
    }
}

impl Expr {
    /// BASIC FEATURES

    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub fn param(key: &str) -> Expr {
        Expr::Param(key.to_string())
    }

    pub fn pow(self, rhs: Expr) -> Expr {
        Expr::Binary(BinOp::Pow, self.boxed(), rhs.boxed())
    }

    pub fn call(func: Func, arg: Expr) -> Expr {
        Expr::Call(func, arg.boxed())
    }

    pub fn exp(self) -> Expr {
        Expr::call(Func::Exp, self)
    }

    pub fn ln(self) -> Expr {
        Expr::call(Func::Ln, self)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 1.0)
    }

    /// Walks the tree children first and combines the results with the visitor.
    pub fn accept<V: ExprVisitor>(&self, visitor: &mut V) -> Result<V::Output, V::Error> {
        match self {
            Expr::Const(value) => visitor.constant(*value),
            Expr::Var => visitor.variable(),
            Expr::Param(key) => visitor.parameter(key),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.accept(visitor)?;
                let rhs = rhs.accept(visitor)?;
                visitor.binary(*op, lhs, rhs)
            }
            Expr::Unary(op, arg) => {
                let arg = arg.accept(visitor)?;
                visitor.unary(*op, arg)
            }
            Expr::Call(func, arg) => {
                let arg = arg.accept(visitor)?;
                visitor.call(*func, arg)
            }
        }
    }

    /// Numeric value at `x` with parameter values taken from `params`
    pub fn eval(&self, x: f64, params: &ParamMap) -> Result<f64, EvalError> {
        self.accept(&mut Evaluator { x, params })
    }

    /// Values at every point of `x`
    pub fn eval_vec(&self, x: &[f64], params: &ParamMap) -> Result<Vec<f64>, EvalError> {
        x.iter().map(|&xi| self.eval(xi, params)).collect()
    }

    /// turn the expression into a closure of x
    pub fn lambdify<'a>(
        &'a self,
        params: &'a ParamMap,
    ) -> Box<dyn Fn(f64) -> Result<f64, EvalError> + 'a> {
        Box::new(move |x| self.eval(x, params))
    }

    /// Rendered text in the requested notation. LaTeX output is wrapped in `$...$`.
    pub fn render(&self, notation: Notation) -> String {
        let (text, _) = self.render_with_params(notation);
        text
    }

    /// Rendered text together with the parameters the expression references
    pub fn render_with_params(&self, notation: Notation) -> (String, Vec<String>) {
        let mut renderer = Renderer::new(notation);
        let text = match self.accept(&mut renderer) {
            Ok(text) => text,
            Err(never) => match never {},
        };
        let text = match notation {
            Notation::Plain => text,
            Notation::Latex => format!("${}$", text),
        };
        (text, renderer.params)
    }

    /// Parameter keys in order of first appearance
    pub fn params(&self) -> Vec<String> {
        self.render_with_params(Notation::Plain).1
    }

    pub fn depends_on_x(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) => false,
            Expr::Var => true,
            Expr::Binary(_, lhs, rhs) => lhs.depends_on_x() || rhs.depends_on_x(),
            Expr::Unary(_, arg) | Expr::Call(_, arg) => arg.depends_on_x(),
        }
    }

    pub fn depends_on_param(&self, key: &str) -> bool {
        match self {
            Expr::Const(_) | Expr::Var => false,
            Expr::Param(name) => name == key,
            Expr::Binary(_, lhs, rhs) => lhs.depends_on_param(key) || rhs.depends_on_param(key),
            Expr::Unary(_, arg) | Expr::Call(_, arg) => arg.depends_on_param(key),
        }
    }

    /// Substitutes parameters with constant values. Every referenced parameter must be present.
    pub fn bind_params(&self, params: &ParamMap) -> Result<Expr, EvalError> {
        let bound = match self {
            Expr::Param(key) => match params.get(key) {
                Some(value) => Expr::Const(*value),
                None => return Err(EvalError::MissingParameter(key.clone())),
            },
            Expr::Const(_) | Expr::Var => self.clone(),
            Expr::Binary(op, lhs, rhs) => Expr::Binary(
                *op,
                lhs.bind_params(params)?.boxed(),
                rhs.bind_params(params)?.boxed(),
            ),
            Expr::Unary(op, arg) => Expr::Unary(*op, arg.bind_params(params)?.boxed()),
            Expr::Call(func, arg) => Expr::Call(*func, arg.bind_params(params)?.boxed()),
        };
        Ok(bound)
    }
}
