#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// a module turns a formula string into a symbolic expression
///
///# Example
/// ```
/// use RustedSITforC::symbolic::parse_expr::parse_formula;
/// let formula = parse_formula("2 ** 3 + exp(x)").unwrap();
/// println!("rendering {}", formula.rendering()); // ((2)^3 + e^x)
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// a module
/// 1) holds the closed expression tree of a formula
/// 2) evaluates it numerically and turns it into a closure
/// 3) renders it as plain text or LaTeX and collects the parameters it references
///# Example#
/// ```
/// use RustedSITforC::symbolic::symbolic_engine::{Expr, ParamMap};
/// let expr = Expr::parse_expression(r#"p["k"] * x"#).unwrap();
/// let params = ParamMap::from([("k".to_string(), 3.0)]);
/// assert_eq!(expr.eval(2.0, &params).unwrap(), 6.0);
/// let df_dx = expr.diff_x().unwrap();
/// println!("df_dx = {}", df_dx);
/// ```
/// ________________________________________________________________________________________________________________________________________________
pub mod symbolic_engine;
pub mod symbolic_engine_derivatives;
/// constant folding and 0/1 identities
pub mod symbolic_simplify;
mod symbolic_engine_tests;
