//! Polynomial fitter: least-squares polynomial of the data, its closed-form derivatives and
//! its inflection points.

use crate::numerical::fitting::{CacheEntry, DerivativeCache, FitError, Fitter};
use crate::numerical::polynomial::Polynomial;
use log::{debug, info};

/// third derivative values smaller than this share of its largest magnitude over the data
/// are treated as zero
const THIRD_DERIVATIVE_TOLERANCE: f64 = 1e-6;
const SCAN_INTERVALS_PER_SAMPLE: usize = 4;
const MIN_SCAN_SAMPLES: usize = 256;

/// Point where the curvature of the fitted polynomial changes sign
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InflectionPoint {
    pub x: f64,
    pub y: f64,
    /// first derivative at the point
    pub slope: f64,
}

#[derive(Debug, Clone)]
pub struct PolyFitter {
    x: Vec<f64>,
    y: Vec<f64>,
    degree: usize,
    cache: DerivativeCache<Polynomial>,
}

impl PolyFitter {
    /// Fits a polynomial of `degree` to the samples.
    pub fn new(x: &[f64], y: &[f64], degree: usize) -> Result<Self, FitError> {
        let polynomial = Polynomial::fit(x, y, degree)?;
        info!("fitted polynomial of degree {} to {} samples", degree, x.len());
        let base = CacheEntry {
            values: polynomial.eval_vec(x),
            text: polynomial.to_string(),
            repr: polynomial,
        };
        Ok(PolyFitter {
            x: x.to_vec(),
            y: y.to_vec(),
            degree,
            cache: DerivativeCache::new(base),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn polynomial(&self) -> Result<&Polynomial, FitError> {
        self.cache
            .get(0)
            .map(|entry| &entry.repr)
            .ok_or(FitError::MissingOrder(0))
    }

    /// Inflection points inside the sampled x range, ascending by x.
    ///
    /// Candidates are the sign changes of the second derivative, bracketed on a grid finer
    /// than the samples and bisected; a root is kept only if the third derivative does not
    /// vanish there.
    pub fn inflection_points(&mut self) -> Result<Vec<InflectionPoint>, FitError> {
        for order in 1..=3 {
            self.derive(order)?;
        }
        let (x_min, x_max) = self
            .x
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let p3_scale = self
            .values(3)?
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        let p0 = self.representation(0)?.clone();
        let p1 = self.representation(1)?.clone();
        let p2 = self.representation(2)?.clone();
        let p3 = self.representation(3)?.clone();

        let mut points = Vec::new();
        let intervals = SCAN_INTERVALS_PER_SAMPLE * self.x.len().max(MIN_SCAN_SAMPLES);
        for root in p2.sign_change_roots(x_min, x_max, intervals) {
            if p3.eval(root).abs() <= THIRD_DERIVATIVE_TOLERANCE * p3_scale {
                debug!("root {} of the second derivative is not an inflection", root);
                continue;
            }
            points.push(InflectionPoint {
                x: root,
                y: p0.eval(root),
                slope: p1.eval(root),
            });
        }
        info!("found {} inflection point(s)", points.len());
        Ok(points)
    }
}

impl Fitter for PolyFitter {
    type Repr = Polynomial;

    fn x(&self) -> &[f64] {
        &self.x
    }

    fn y(&self) -> &[f64] {
        &self.y
    }

    fn cache(&self) -> &DerivativeCache<Polynomial> {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut DerivativeCache<Polynomial> {
        &mut self.cache
    }

    fn derive_from(
        &self,
        base: &Polynomial,
        steps: usize,
    ) -> Result<(Polynomial, String), FitError> {
        let derivative = base.nth_derivative(steps);
        let text = derivative.to_string();
        Ok((derivative, text))
    }

    fn evaluate(&self, repr: &Polynomial) -> Result<Vec<f64>, FitError> {
        Ok(repr.eval_vec(&self.x))
    }
}
