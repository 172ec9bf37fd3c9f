//! System identification of step responses
//!
//! Two methods work on sampled (x, y) data, optionally shifted to remove a known dead time:
//! regression of a catalog model, and the inflectional tangent method giving the delay time
//! Tu and the balancing time Tg.
/// Example#1
/// ```
/// use RustedSITforC::identification::model_catalog::ModelCatalog;
/// use RustedSITforC::identification::regression::identify_by_regression;
/// let catalog = ModelCatalog::builtin().unwrap();
/// let pt1 = catalog.get("pt1").unwrap();
/// let x: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
/// // first order lag with gain 3 and time constant 2, delayed by 1
/// let y: Vec<f64> = x
///     .iter()
///     .map(|&x| if x <= 1.0 { 0.0 } else { 3.0 * (1.0 - (-(x - 1.0) / 2.0).exp()) })
///     .collect();
/// let result = identify_by_regression(&x, &y, pt1, 1.0).unwrap();
/// assert!((result.params["k"] - 3.0).abs() < 1e-6);
/// assert!((result.params["t"] - 2.0).abs() < 1e-6);
/// ```
pub mod regression;
/// Example#1
/// ```
/// use RustedSITforC::identification::model_catalog::ModelCatalog;
/// use RustedSITforC::identification::tangent_method::identify_by_tangent_method;
/// let catalog = ModelCatalog::builtin().unwrap();
/// let pt2 = catalog.get("pt2").unwrap();
/// let x: Vec<f64> = (0..=240).map(|i| i as f64 * 0.05).collect();
/// let y: Vec<f64> = x.iter().map(|&x| pt2.evaluate(x).unwrap()).collect();
/// let result = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap();
/// println!("Tu = {}, Tg = {}, Tu/Tg = {}", result.tu, result.tg, result.tu_tg_ratio());
/// ```
pub mod tangent_method;
/// catalog of named models with file persistence
pub mod model_catalog;
pub mod models;

use crate::numerical::fitting::FitError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdentificationError {
    #[error("the fitted polynomial has no inflection point inside the data")]
    NoInflectionPoint,
    #[error("inflection point {index} requested, but only {count} found")]
    InflectionIndexOutOfRange { index: usize, count: usize },
    #[error("the tangent at the inflection point is horizontal")]
    DegenerateTangent,
    #[error("the tangent at inflection point {index} has slope {slope} against the step")]
    TangentAgainstStep { index: usize, slope: f64 },
    #[error("no inflection point has a tangent along the step at its steepest slope")]
    NoRisingInflectionPoint,
    #[error("the tangent gives Tu = {tu}, Tg = {tg}")]
    InvalidTimes { tu: f64, tg: f64 },
    #[error("no sample after the inflection point leaves the tangent")]
    NoSplitPoint,
    #[error("model `{0}` is not in the catalog")]
    MissingModel(String),
    #[error("asymptote model `{0}` has no height parameter `c`")]
    NoAsymptoteHeight(String),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Removes a dead time of `width` from the samples.
///
/// Samples with x <= width are dropped and width is subtracted from the remaining x.
/// A width <= 0 returns the data unchanged.
pub fn shift_data(x: &[f64], y: &[f64], width: f64) -> (Vec<f64>, Vec<f64>) {
    if width <= 0.0 {
        return (x.to_vec(), y.to_vec());
    }
    x.iter()
        .zip(y.iter())
        .filter(|(xi, _)| **xi > width)
        .map(|(xi, yi)| (xi - width, *yi))
        .unzip()
}
