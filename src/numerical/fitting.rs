//! # Fitter framework
//!
//! A fitter owns the sample data it was built from and a cache of the fitted curve and its
//! derivatives, keyed by derivative order. Order 0 (the fitted curve itself) is filled on
//! construction, higher orders on first request.
//!
//! A missing order `n` is derived from the largest cached order `m < n` by differentiating
//! that entry `n - m` times; only order `n` is stored afterwards. Stored orders are never
//! recomputed or replaced, so repeated requests return the very same values.

use crate::symbolic::symbolic_engine::EvalError;
use crate::symbolic::symbolic_engine_derivatives::DiffError;
use log::debug;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("no samples to fit")]
    EmptyData,
    #[error("x has {x} samples but y has {y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("samples must be finite numbers")]
    NonFiniteData,
    #[error("at least {needed} samples are needed, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("least squares system could not be solved: {0}")]
    Singular(String),
    #[error("fit did not converge: {0}")]
    NotConverged(String),
    #[error("fitted parameters are not finite")]
    NonFiniteParameters,
    #[error("derivative of order {0} is not available")]
    MissingOrder(usize),
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    #[error(transparent)]
    Differentiation(#[from] DiffError),
}

/// Checks that x and y are usable fitting data with at least `needed` samples.
pub fn check_samples(x: &[f64], y: &[f64], needed: usize) -> Result<(), FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.is_empty() {
        return Err(FitError::EmptyData);
    }
    if x.len() < needed {
        return Err(FitError::InsufficientData {
            needed,
            got: x.len(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteData);
    }
    Ok(())
}

/// coefficient of determination of a fit
pub fn r_squared(y_data: &[f64], y_fit: &[f64]) -> f64 {
    let n = y_data.len() as f64;
    let mean = y_data.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_data.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_data
        .iter()
        .zip(y_fit.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// One cached derivative: the object it was computed from, its values at x and its text.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<R> {
    pub repr: R,
    pub values: Vec<f64>,
    pub text: String,
}

/// Append-only map from derivative order to cache entry
#[derive(Debug, Clone)]
pub struct DerivativeCache<R> {
    entries: BTreeMap<usize, CacheEntry<R>>,
}

impl<R> DerivativeCache<R> {
    /// cache holding the fitted curve as order 0
    pub fn new(base: CacheEntry<R>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(0, base);
        DerivativeCache { entries }
    }

    pub fn get(&self, order: usize) -> Option<&CacheEntry<R>> {
        self.entries.get(&order)
    }

    pub fn contains(&self, order: usize) -> bool {
        self.entries.contains_key(&order)
    }

    /// largest cached order strictly below `order`
    pub fn nearest_below(&self, order: usize) -> Option<(usize, &CacheEntry<R>)> {
        self.entries
            .range(..order)
            .next_back()
            .map(|(&m, entry)| (m, entry))
    }

    /// Stores an entry unless the order is already present. Returns whether it was stored.
    pub fn insert(&mut self, order: usize, entry: CacheEntry<R>) -> bool {
        if self.entries.contains_key(&order) {
            return false;
        }
        self.entries.insert(order, entry);
        true
    }

    pub fn orders(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }
}

/// Common behaviour of polynomial and model fitters
pub trait Fitter {
    /// what a derivative is computed from: polynomial coefficients, symbolic expression...
    type Repr: Clone;

    fn x(&self) -> &[f64];
    fn y(&self) -> &[f64];
    fn cache(&self) -> &DerivativeCache<Self::Repr>;
    fn cache_mut(&mut self) -> &mut DerivativeCache<Self::Repr>;

    /// `steps`-th derivative of `base` and its text
    fn derive_from(&self, base: &Self::Repr, steps: usize)
    -> Result<(Self::Repr, String), FitError>;

    /// values of a representation at every x
    fn evaluate(&self, repr: &Self::Repr) -> Result<Vec<f64>, FitError>;

    /// Fills the cache entry of `order` from the nearest lower cached order.
    fn derive(&mut self, order: usize) -> Result<(), FitError> {
        if self.cache().contains(order) {
            return Ok(());
        }
        let (m, base) = self
            .cache()
            .nearest_below(order)
            .ok_or(FitError::MissingOrder(order))?;
        let base = base.repr.clone();
        debug!("deriving order {} from cached order {}", order, m);
        let (repr, text) = self.derive_from(&base, order - m)?;
        let values = self.evaluate(&repr)?;
        self.cache_mut()
            .insert(order, CacheEntry { repr, values, text });
        Ok(())
    }

    fn entry(&mut self, order: usize) -> Result<&CacheEntry<Self::Repr>, FitError> {
        self.derive(order)?;
        self.cache().get(order).ok_or(FitError::MissingOrder(order))
    }

    /// values of the `order`-th derivative at x
    fn values(&mut self, order: usize) -> Result<&[f64], FitError> {
        Ok(&self.entry(order)?.values)
    }

    /// text of the `order`-th derivative
    fn text(&mut self, order: usize) -> Result<&str, FitError> {
        Ok(&self.entry(order)?.text)
    }

    fn representation(&mut self, order: usize) -> Result<&Self::Repr, FitError> {
        Ok(&self.entry(order)?.repr)
    }
}
