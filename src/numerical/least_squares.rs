//! Curve fitting problem for the `levenberg_marquardt` solver.
//!
//! Residuals are `f(x_i, p) - y_i` for a symbolic model `f`; the solver varies the named
//! parameters in `names`, all other parameters stay fixed. Jacobian columns come from the
//! symbolic partial derivatives of the model, or from forward differences for parameters
//! whose partial cannot be formed (e.g. inside a factorial).

use crate::symbolic::symbolic_engine::{Expr, ParamMap};
use log::debug;
use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Matrix, Vector, storage::Owned};

pub struct CurveFitProblem<'a> {
    x: &'a [f64],
    y: &'a [f64],
    model: &'a Expr,
    /// names of the varied parameters, in solver order
    names: Vec<String>,
    /// fixed parameters plus the current values of the varied ones
    values: ParamMap,
    partials: Vec<Option<Expr>>,
    params: DVector<f64>,
}

impl<'a> CurveFitProblem<'a> {
    pub fn new(
        x: &'a [f64],
        y: &'a [f64],
        model: &'a Expr,
        names: Vec<String>,
        initial: &ParamMap,
    ) -> Self {
        let partials = names
            .iter()
            .map(|name| match model.diff_param(name) {
                Ok(partial) => Some(partial),
                Err(e) => {
                    debug!("{}, using finite differences for `{}`", e, name);
                    None
                }
            })
            .collect();
        let params = DVector::from_iterator(
            names.len(),
            names.iter().map(|name| initial.get(name).copied().unwrap_or(0.0)),
        );
        let mut problem = CurveFitProblem {
            x,
            y,
            model,
            names,
            values: initial.clone(),
            partials,
            params: DVector::zeros(0),
        };
        problem.set_params(&params);
        problem
    }

    /// all parameters with the current values of the varied ones
    pub fn values(&self) -> &ParamMap {
        &self.values
    }

    fn model_values(&self, values: &ParamMap) -> Option<Vec<f64>> {
        let f = self.model.eval_vec(self.x, values).ok()?;
        if f.iter().all(|v| v.is_finite()) {
            Some(f)
        } else {
            None
        }
    }

    fn finite_difference_column(&self, j: usize) -> Option<Vec<f64>> {
        let name = &self.names[j];
        let p = self.params[j];
        let h = f64::EPSILON.sqrt() * p.abs().max(1.0);
        let mut shifted = self.values.clone();
        shifted.insert(name.clone(), p + h);
        let base = self.model_values(&self.values)?;
        let ahead = self.model_values(&shifted)?;
        Some(
            ahead
                .iter()
                .zip(base.iter())
                .map(|(a, b)| (a - b) / h)
                .collect(),
        )
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CurveFitProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, p: &Vector<f64, Dyn, Self::ParameterStorage>) {
        self.params.clone_from(p);
        for (name, value) in self.names.iter().zip(p.iter()) {
            self.values.insert(name.clone(), *value);
        }
    }

    fn params(&self) -> Vector<f64, Dyn, Self::ParameterStorage> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<Vector<f64, Dyn, Self::ResidualStorage>> {
        let f = self.model_values(&self.values)?;
        Some(DVector::from_iterator(
            self.y.len(),
            f.iter().zip(self.y.iter()).map(|(f, y)| f - y),
        ))
    }

    fn jacobian(&self) -> Option<Matrix<f64, Dyn, Dyn, Self::JacobianStorage>> {
        let mut jacobian = DMatrix::zeros(self.x.len(), self.names.len());
        for (j, partial) in self.partials.iter().enumerate() {
            let column = match partial {
                Some(partial) => {
                    let column = partial.eval_vec(self.x, &self.values).ok()?;
                    if column.iter().any(|v| !v.is_finite()) {
                        return None;
                    }
                    column
                }
                None => self.finite_difference_column(j)?,
            };
            for (i, value) in column.into_iter().enumerate() {
                jacobian[(i, j)] = value;
            }
        }
        Some(jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_residuals_and_jacobian() {
        let model = Expr::parse_expression(r#"p["a"] * x + p["b"]"#).unwrap();
        let x = [0.0, 1.0, 2.0];
        let y = [1.0, 3.0, 5.0];
        let initial: ParamMap = [("a".to_string(), 1.0), ("b".to_string(), 0.0)].into();
        let problem =
            CurveFitProblem::new(&x, &y, &model, vec!["a".to_string(), "b".to_string()], &initial);
        let r = problem.residuals().unwrap();
        assert_eq!(r.as_slice(), &[-1.0, -2.0, -3.0]);
        let j = problem.jacobian().unwrap();
        assert_eq!(j.column(0).iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);
        assert_eq!(j.column(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_finite_difference_fallback() {
        // the factorial blocks the symbolic partial of `n`
        let model = Expr::parse_expression(r#"p["a"] * x + fac(p["n"])"#).unwrap();
        let x = [0.0, 1.0];
        let y = [0.0, 0.0];
        let initial: ParamMap = [("a".to_string(), 1.0), ("n".to_string(), 3.0)].into();
        let problem = CurveFitProblem::new(&x, &y, &model, vec!["a".to_string()], &initial);
        assert!(problem.partials[0].is_some());
        let problem = CurveFitProblem::new(&x, &y, &model, vec!["n".to_string()], &initial);
        assert!(problem.partials[0].is_none());
        // a factorial is only defined on integers, so the shifted evaluation fails
        assert!(problem.jacobian().is_none());
        let initial: ParamMap = [("a".to_string(), 2.0), ("n".to_string(), 3.0)].into();
        let problem = CurveFitProblem::new(&x, &y, &model, vec!["a".to_string()], &initial);
        assert_relative_eq!(problem.residuals().unwrap()[1], 8.0);
    }
}
