//! Identification by nonlinear regression of a catalog model.

use crate::identification::models::Model;
use crate::identification::{IdentificationError, shift_data};
use crate::numerical::fitting::{FitError, Fitter};
use crate::numerical::model_fitter::{FitSettings, ModelFitter};
use crate::symbolic::symbolic_engine::ParamMap;
use log::info;

/// Outcome of a regression run
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionResult {
    pub model_name: String,
    pub params: ParamMap,
    /// fitted formula with the parameter values substituted
    pub fitted_formula: String,
    /// x of the fitted samples, after the shift
    pub x: Vec<f64>,
    /// fitted curve at `x`
    pub curve: Vec<f64>,
    pub r_squared: f64,
    pub shift: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionIdentifier {
    fitter: ModelFitter,
    shift: f64,
}

impl RegressionIdentifier {
    pub fn new(x: &[f64], y: &[f64], model: &Model, shift: f64) -> Result<Self, IdentificationError> {
        Self::with_settings(x, y, model, &ParamMap::new(), shift, &FitSettings::default())
    }

    /// Shifts the data by `shift`, then fits `model` starting from its defaults overridden
    /// by `overrides`.
    pub fn with_settings(
        x: &[f64],
        y: &[f64],
        model: &Model,
        overrides: &ParamMap,
        shift: f64,
        settings: &FitSettings,
    ) -> Result<Self, IdentificationError> {
        let (x, y) = shift_data(x, y, shift);
        let fitter = ModelFitter::with_settings(&x, &y, model, overrides, settings)?;
        info!(
            "regression with `{}` on {} samples (shift {}) done",
            model.name(),
            x.len(),
            shift
        );
        Ok(RegressionIdentifier { fitter, shift })
    }

    pub fn fitter(&self) -> &ModelFitter {
        &self.fitter
    }

    /// access to derivatives of the fitted curve
    pub fn fitter_mut(&mut self) -> &mut ModelFitter {
        &mut self.fitter
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    pub fn result(&self) -> Result<RegressionResult, IdentificationError> {
        let fitted = self.fitter.cache().get(0).ok_or(FitError::MissingOrder(0))?;
        Ok(RegressionResult {
            model_name: self.fitter.model_name().to_string(),
            params: self.fitter.params().clone(),
            fitted_formula: fitted.text.clone(),
            x: self.fitter.x().to_vec(),
            curve: fitted.values.clone(),
            r_squared: self.fitter.r_squared(),
            shift: self.shift,
        })
    }
}

/// Fits `model` to the data after removing a dead time of `shift`.
pub fn identify_by_regression(
    x: &[f64],
    y: &[f64],
    model: &Model,
    shift: f64,
) -> Result<RegressionResult, IdentificationError> {
    RegressionIdentifier::new(x, y, model, shift)?.result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identification::model_catalog::ModelCatalog;
    use approx::assert_relative_eq;

    fn step_response(model: &Model, params: &ParamMap, delay: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..=200).map(|i| i as f64 * 0.05).collect();
        let y = x
            .iter()
            .map(|&x| {
                if x <= delay {
                    0.0
                } else {
                    model.evaluate_with(x - delay, params).unwrap()
                }
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_pt2_regression() {
        let catalog = ModelCatalog::builtin().unwrap();
        let pt2 = catalog.get("pt2").unwrap();
        let truth: ParamMap = [
            ("k".to_string(), 2.0),
            ("t1".to_string(), 1.5),
            ("t2".to_string(), 0.5),
        ]
        .into();
        let (x, y) = step_response(pt2, &truth, 0.0);
        let result = identify_by_regression(&x, &y, pt2, 0.0).unwrap();
        assert_eq!(result.model_name, "pt2");
        assert_relative_eq!(result.params["k"], 2.0, epsilon = 1e-6);
        // t1 and t2 enter symmetrically, only the pair is identifiable
        let mut taus = [result.params["t1"], result.params["t2"]];
        taus.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(taus[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(taus[1], 1.5, epsilon = 1e-5);
        assert!(result.r_squared > 0.999999);
        assert_eq!(result.curve.len(), x.len());
    }

    #[test]
    fn test_shift_removes_dead_time() {
        let catalog = ModelCatalog::builtin().unwrap();
        let pt1 = catalog.get("pt1").unwrap();
        let truth: ParamMap = [("k".to_string(), 1.5), ("t".to_string(), 0.7)].into();
        let (x, y) = step_response(pt1, &truth, 2.0);
        let result = identify_by_regression(&x, &y, pt1, 2.0).unwrap();
        assert_relative_eq!(result.params["k"], 1.5, epsilon = 1e-6);
        assert_relative_eq!(result.params["t"], 0.7, epsilon = 1e-6);
        assert_eq!(result.shift, 2.0);
        assert!(result.x.iter().all(|&x| x > 0.0));
        assert!(result.x.len() >= 160);
    }

    #[test]
    fn test_derivatives_through_identifier() {
        let catalog = ModelCatalog::builtin().unwrap();
        let pt1 = catalog.get("pt1").unwrap();
        let truth: ParamMap = [("k".to_string(), 1.0), ("t".to_string(), 1.0)].into();
        let (x, y) = step_response(pt1, &truth, 0.0);
        let mut identifier = RegressionIdentifier::new(&x, &y, pt1, 0.0).unwrap();
        let slope_at_zero = identifier.fitter_mut().values(1).unwrap()[0];
        assert_relative_eq!(slope_at_zero, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shift_beyond_data_is_an_error() {
        let catalog = ModelCatalog::builtin().unwrap();
        let pt1 = catalog.get("pt1").unwrap();
        let err = identify_by_regression(&[0.0, 1.0], &[0.0, 1.0], pt1, 10.0).unwrap_err();
        assert_eq!(err, IdentificationError::Fit(FitError::EmptyData));
    }
}
