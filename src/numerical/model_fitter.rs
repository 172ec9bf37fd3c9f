//! Nonlinear least-squares fit of a catalog model, with symbolic derivatives of the fitted
//! curve.
//!
//! The model's parameters start from its defaults overridden by the caller; the parameters
//! the formula references are varied by Levenberg-Marquardt in lexicographic order. Order 0
//! of the cache is the formula with the fitted values substituted.
//!
//! # Example
//! ```
//! use RustedSITforC::identification::models::Model;
//! use RustedSITforC::numerical::fitting::Fitter;
//! use RustedSITforC::numerical::model_fitter::ModelFitter;
//! use RustedSITforC::symbolic::symbolic_engine::ParamMap;
//! let model = Model::new("line", r#"p["a"] * x + p["b"]"#,
//!     ParamMap::from([("a".to_string(), 1.0), ("b".to_string(), 0.0)]), None).unwrap();
//! let x = vec![0.0, 1.0, 2.0, 3.0];
//! let y = vec![1.0, 3.0, 5.0, 7.0];
//! let mut fitter = ModelFitter::new(&x, &y, &model, &ParamMap::new()).unwrap();
//! assert!((fitter.params()["a"] - 2.0).abs() < 1e-8);
//! let derivative = fitter.text(1).unwrap().to_string();
//! println!("derivative of the fit: {}", derivative);
//! ```

use crate::identification::models::Model;
use crate::numerical::fitting::{
    CacheEntry, DerivativeCache, FitError, Fitter, check_samples, r_squared,
};
use crate::numerical::least_squares::CurveFitProblem;
use crate::symbolic::symbolic_engine::{Expr, ParamMap};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::{info, warn};

/// Solver settings of the Levenberg-Marquardt run
#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub stepbound: f64,
    /// evaluation budget, multiplied by the number of parameters plus one
    pub patience: usize,
    pub scale_diag: bool,
}

impl Default for FitSettings {
    fn default() -> Self {
        FitSettings {
            ftol: f64::EPSILON.sqrt(),
            xtol: f64::EPSILON.sqrt(),
            gtol: f64::EPSILON,
            stepbound: 100.0,
            patience: 100,
            scale_diag: true,
        }
    }
}

impl FitSettings {
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }
    pub fn with_stepbound(mut self, stepbound: f64) -> Self {
        self.stepbound = stepbound;
        self
    }
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }
    pub fn with_scale_diag(mut self, scale_diag: bool) -> Self {
        self.scale_diag = scale_diag;
        self
    }

    fn solver(&self) -> LevenbergMarquardt<f64> {
        LevenbergMarquardt::new()
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .with_gtol(self.gtol)
            .with_stepbound(self.stepbound)
            .with_patience(self.patience)
            .with_scale_diag(self.scale_diag)
    }
}

#[derive(Debug, Clone)]
pub struct ModelFitter {
    x: Vec<f64>,
    y: Vec<f64>,
    model_name: String,
    params: ParamMap,
    varied: Vec<String>,
    objective: f64,
    evaluations: usize,
    r_squared: f64,
    cache: DerivativeCache<Expr>,
}

impl ModelFitter {
    /// Fits `model` with default solver settings.
    pub fn new(
        x: &[f64],
        y: &[f64],
        model: &Model,
        overrides: &ParamMap,
    ) -> Result<Self, FitError> {
        Self::with_settings(x, y, model, overrides, &FitSettings::default())
    }

    pub fn with_settings(
        x: &[f64],
        y: &[f64],
        model: &Model,
        overrides: &ParamMap,
        settings: &FitSettings,
    ) -> Result<Self, FitError> {
        let expr = model.formula().expr();
        let mut varied: Vec<String> = model.formula().params().to_vec();
        varied.sort();
        check_samples(x, y, varied.len().max(1))?;
        let initial = model.params_with(overrides);
        expr.bind_params(&initial)?;

        let (params, objective, evaluations) = if varied.is_empty() {
            (initial, 0.0, 0)
        } else {
            let problem = CurveFitProblem::new(x, y, expr, varied.clone(), &initial);
            let (problem, report) = settings.solver().minimize(problem);
            let accepted = report.termination.was_successful()
                || matches!(report.termination, TerminationReason::NoImprovementPossible(_));
            if !accepted {
                return Err(FitError::NotConverged(format!(
                    "{:?} (objective {:.3e})",
                    report.termination, report.objective_function
                )));
            }
            if !report.termination.was_successful() {
                warn!(
                    "fit of `{}` stopped early: {:?}",
                    model.name(),
                    report.termination
                );
            }
            if problem.params().iter().any(|p| !p.is_finite()) {
                return Err(FitError::NonFiniteParameters);
            }
            (
                problem.values().clone(),
                report.objective_function,
                report.number_of_evaluations,
            )
        };

        let bound = expr.bind_params(&params)?.simplify_();
        let values = bound.eval_vec(x, &ParamMap::new())?;
        let r2 = r_squared(y, &values);
        info!(
            "fitted model `{}` in {} evaluations, R^2 = {:.6}",
            model.name(),
            evaluations,
            r2
        );
        let base = CacheEntry {
            text: bound.to_string(),
            values,
            repr: bound,
        };
        Ok(ModelFitter {
            x: x.to_vec(),
            y: y.to_vec(),
            model_name: model.name().to_string(),
            params,
            varied,
            objective,
            evaluations,
            r_squared: r2,
            cache: DerivativeCache::new(base),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// all parameter values after the fit
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// names of the varied parameters, sorted
    pub fn varied_params(&self) -> &[String] {
        &self.varied
    }

    /// half the sum of squared residuals at the solution
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }
}

impl Fitter for ModelFitter {
    type Repr = Expr;

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }

    fn cache(&self) -> &DerivativeCache<Expr> {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut DerivativeCache<Expr> {
        &mut self.cache
    }

    fn derive_from(&self, base: &Expr, steps: usize) -> Result<(Expr, String), FitError> {
        let derivative = base.n_th_derivative_x(steps)?;
        let text = derivative.to_string();
        Ok((derivative, text))
    }

    fn evaluate(&self, repr: &Expr) -> Result<Vec<f64>, FitError> {
        Ok(repr.eval_vec(&self.x, &ParamMap::new())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(pairs: &[(&str, f64)]) -> ParamMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn pt1() -> Model {
        Model::new(
            "pt1",
            r#"p["k"] * (1 - exp(-x / p["t"]))"#,
            params(&[("k", 1.0), ("t", 1.0)]),
            None,
        )
        .unwrap()
    }

    fn samples(model: &Model, overrides: &ParamMap) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..60).map(|i| i as f64 * 0.1).collect();
        let y = x
            .iter()
            .map(|&x| model.evaluate_with(x, overrides).unwrap())
            .collect();
        (x, y)
    }

    #[test]
    fn test_recovers_parameters() {
        let model = pt1();
        let (x, y) = samples(&model, &params(&[("k", 2.5), ("t", 0.8)]));
        let fitter = ModelFitter::new(&x, &y, &model, &ParamMap::new()).unwrap();
        assert_relative_eq!(fitter.params()["k"], 2.5, epsilon = 1e-6);
        assert_relative_eq!(fitter.params()["t"], 0.8, epsilon = 1e-6);
        assert_eq!(fitter.varied_params(), &["k".to_string(), "t".to_string()]);
        assert!(fitter.r_squared() > 0.999999);
    }

    #[test]
    fn test_overrides_seed_the_fit_and_extra_params_are_kept() {
        let model = pt1();
        let (x, y) = samples(&model, &params(&[("k", 3.0), ("t", 2.0)]));
        let fitter =
            ModelFitter::new(&x, &y, &model, &params(&[("k", 2.0), ("unused", 7.0)])).unwrap();
        assert_relative_eq!(fitter.params()["k"], 3.0, epsilon = 1e-6);
        assert_eq!(fitter.params()["unused"], 7.0);
    }

    #[test]
    fn test_symbolic_derivatives_of_fitted_curve() {
        let model = pt1();
        let (x, y) = samples(&model, &params(&[("k", 2.0), ("t", 0.5)]));
        let mut fitter = ModelFitter::new(&x, &y, &model, &ParamMap::new()).unwrap();
        assert!(fitter.representation(0).unwrap().params().is_empty());
        // d/dx k(1 - e^(-x/t)) = k/t e^(-x/t)
        let d1 = fitter.values(1).unwrap().to_vec();
        for (xi, d) in x.iter().zip(d1.iter()) {
            assert_relative_eq!(*d, 4.0 * (-xi / 0.5).exp(), epsilon = 1e-5);
        }
        let d2 = fitter.values(2).unwrap().to_vec();
        for (xi, d) in x.iter().zip(d2.iter()) {
            assert_relative_eq!(*d, -8.0 * (-xi / 0.5).exp(), epsilon = 1e-4);
        }
        assert!(!fitter.text(2).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_data() {
        let model = pt1();
        assert_eq!(
            ModelFitter::new(&[], &[], &model, &ParamMap::new()).unwrap_err(),
            FitError::EmptyData
        );
        assert_eq!(
            ModelFitter::new(&[1.0, 2.0], &[1.0], &model, &ParamMap::new()).unwrap_err(),
            FitError::LengthMismatch { x: 2, y: 1 }
        );
    }

    #[test]
    fn test_constant_model_needs_no_solver() {
        let model = Model::new("m1", "2 + 3", ParamMap::new(), None).unwrap();
        let mut fitter = ModelFitter::new(&[0.0, 1.0], &[5.0, 5.0], &model, &ParamMap::new()).unwrap();
        assert_eq!(fitter.values(0).unwrap(), &[5.0, 5.0]);
        assert_eq!(fitter.text(0).unwrap(), "5");
        assert_eq!(fitter.values(1).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_non_differentiable_model_fails_on_derivative() {
        let model = Model::new("f", "fac(x) * p[\"a\"]", params(&[("a", 1.0)]), None).unwrap();
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [2.0, 2.0, 4.0, 12.0];
        let mut fitter = ModelFitter::new(&x, &y, &model, &ParamMap::new()).unwrap();
        assert_relative_eq!(fitter.params()["a"], 2.0, epsilon = 1e-8);
        assert!(matches!(
            fitter.values(1),
            Err(FitError::Differentiation(_))
        ));
    }
}
