//! Inflectional tangent method.
//!
//! A polynomial is fitted to the step response and the tangent is laid through one of its
//! inflection points. The tangent crosses zero at the delay time Tu; the asymptote height
//! comes from an exponential-approach model fitted to the samples where the curve has left
//! the tangent (the split point). The tangent reaches that height at the end time, and
//! Tg = end time - Tu.

use crate::identification::model_catalog::ModelCatalog;
use crate::identification::models::Model;
use crate::identification::{IdentificationError, shift_data};
use crate::numerical::fitting::Fitter;
use crate::numerical::model_fitter::{FitSettings, ModelFitter};
use crate::numerical::poly_fitter::{InflectionPoint, PolyFitter};
use crate::symbolic::symbolic_engine::ParamMap;
use log::{debug, info};

/// parameter of the asymptote model holding the height
const HEIGHT_PARAM: &str = "c";
/// slopes below this share of the largest |f'| over the data count as horizontal
const FLAT_SLOPE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TangentMethodSettings {
    /// degree of the fitted polynomial
    pub degree: usize,
    /// first-derivative distance from the tangent slope that marks the split point
    pub slope_tolerance: f64,
    /// `None` takes the first inflection point where the curve is steepest along the step
    pub inflection_index: Option<usize>,
    /// catalog name of the model fitted beyond the split point
    pub asymptote_model: String,
    pub fit: FitSettings,
}

impl Default for TangentMethodSettings {
    fn default() -> Self {
        TangentMethodSettings {
            degree: 11,
            slope_tolerance: 0.1,
            inflection_index: None,
            asymptote_model: "exp_approach".to_string(),
            fit: FitSettings::default(),
        }
    }
}

impl TangentMethodSettings {
    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }
    pub fn with_slope_tolerance(mut self, tolerance: f64) -> Self {
        self.slope_tolerance = tolerance;
        self
    }
    pub fn with_inflection_index(mut self, index: usize) -> Self {
        self.inflection_index = Some(index);
        self
    }
    pub fn with_asymptote_model(mut self, name: &str) -> Self {
        self.asymptote_model = name.to_string();
        self
    }
    pub fn with_fit_settings(mut self, fit: FitSettings) -> Self {
        self.fit = fit;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TangentMethodResult {
    /// delay time, where the tangent crosses zero
    pub tu: f64,
    /// balancing time, from Tu to where the tangent reaches the asymptote
    pub tg: f64,
    pub slope: f64,
    pub intercept: f64,
    /// asymptote of the step response
    pub height: f64,
    pub inflection_index: usize,
    pub inflection: InflectionPoint,
    pub split_point: f64,
    pub end_time: f64,
    pub asymptote_params: ParamMap,
    pub shift: f64,
}

impl TangentMethodResult {
    pub fn tu_tg_ratio(&self) -> f64 {
        self.tu / self.tg
    }

    pub fn tg_tu_ratio(&self) -> f64 {
        self.tg / self.tu
    }

    /// tangent value at x
    pub fn tangent(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Tangent sampled every `step` from Tu to the end time, end point included.
    pub fn tangent_curve(&self, step: f64) -> (Vec<f64>, Vec<f64>) {
        let mut x = Vec::new();
        if step > 0.0 && step.is_finite() {
            let count = ((self.end_time - self.tu) / step).ceil().max(0.0) as usize;
            x.extend(
                (0..count)
                    .map(|i| self.tu + step * i as f64)
                    .filter(|&xi| xi < self.end_time),
            );
        } else {
            x.push(self.tu);
        }
        x.push(self.end_time);
        let y = x.iter().map(|&xi| self.tangent(xi)).collect();
        (x, y)
    }
}

#[derive(Debug)]
pub struct TangentMethodIdentifier {
    x: Vec<f64>,
    y: Vec<f64>,
    shift: f64,
    settings: TangentMethodSettings,
    fitter: PolyFitter,
    points: Vec<InflectionPoint>,
    asymptote_model: Model,
    asymptote_fitter: ModelFitter,
    result: TangentMethodResult,
}

impl TangentMethodIdentifier {
    /// Default settings with the given polynomial degree.
    pub fn new(
        x: &[f64],
        y: &[f64],
        degree: usize,
        shift: f64,
        catalog: &ModelCatalog,
    ) -> Result<Self, IdentificationError> {
        let settings = TangentMethodSettings::default().with_degree(degree);
        Self::with_settings(x, y, shift, catalog, settings)
    }

    pub fn with_settings(
        x: &[f64],
        y: &[f64],
        shift: f64,
        catalog: &ModelCatalog,
        settings: TangentMethodSettings,
    ) -> Result<Self, IdentificationError> {
        let asymptote_model = catalog
            .get(&settings.asymptote_model)
            .cloned()
            .ok_or_else(|| IdentificationError::MissingModel(settings.asymptote_model.clone()))?;
        let (x, y) = shift_data(x, y, shift);
        let mut fitter = PolyFitter::new(&x, &y, settings.degree)?;
        let points = fitter.inflection_points()?;
        if points.is_empty() {
            return Err(IdentificationError::NoInflectionPoint);
        }
        let index = match settings.inflection_index {
            Some(index) => index,
            None => first_rising_inflection(&y, &mut fitter, &points)?,
        };
        let (result, asymptote_fitter) = solve(
            &x,
            &y,
            &mut fitter,
            &points,
            &asymptote_model,
            &settings,
            index,
            shift,
        )?;
        Ok(TangentMethodIdentifier {
            x,
            y,
            shift,
            settings,
            fitter,
            points,
            asymptote_model,
            asymptote_fitter,
            result,
        })
    }

    /// Recomputes the tangent and asymptote for another inflection point, reusing the
    /// fitted polynomial. On error the previous result stays in place.
    pub fn select_inflection_point(
        &mut self,
        index: usize,
    ) -> Result<&TangentMethodResult, IdentificationError> {
        let (result, asymptote_fitter) = solve(
            &self.x,
            &self.y,
            &mut self.fitter,
            &self.points,
            &self.asymptote_model,
            &self.settings,
            index,
            self.shift,
        )?;
        self.result = result;
        self.asymptote_fitter = asymptote_fitter;
        Ok(&self.result)
    }

    pub fn result(&self) -> &TangentMethodResult {
        &self.result
    }

    /// inflection points of the fitted polynomial, ascending by x
    pub fn inflection_points(&self) -> &[InflectionPoint] {
        &self.points
    }

    pub fn fitter(&self) -> &PolyFitter {
        &self.fitter
    }

    pub fn fitter_mut(&mut self) -> &mut PolyFitter {
        &mut self.fitter
    }

    /// fit of the asymptote model beyond the split point
    pub fn asymptote_fitter(&self) -> &ModelFitter {
        &self.asymptote_fitter
    }

    /// samples after the shift
    pub fn data(&self) -> (&[f64], &[f64]) {
        (&self.x, &self.y)
    }

    pub fn settings(&self) -> &TangentMethodSettings {
        &self.settings
    }
}

/// +1 for a rising response, -1 for a falling one
fn step_direction(y: &[f64]) -> f64 {
    match (y.first(), y.last()) {
        (Some(first), Some(last)) if last < first => -1.0,
        _ => 1.0,
    }
}

/// Index of the first inflection point whose slope points along the step and is a maximum
/// of the slope there.
fn first_rising_inflection(
    y: &[f64],
    fitter: &mut PolyFitter,
    points: &[InflectionPoint],
) -> Result<usize, IdentificationError> {
    let direction = step_direction(y);
    let slope_scale = fitter
        .values(1)?
        .iter()
        .fold(0.0_f64, |m, d| m.max(d.abs()));
    let third = fitter.representation(3)?.clone();
    let index = points
        .iter()
        .position(|p| {
            p.slope * direction > FLAT_SLOPE_TOLERANCE * slope_scale
                && third.eval(p.x) * direction < 0.0
        })
        .ok_or(IdentificationError::NoRisingInflectionPoint)?;
    if index > 0 {
        debug!("skipped {} inflection point(s) against the step", index);
    }
    Ok(index)
}

/// Tu, end time and Tg of the tangent `slope * x + intercept` and the asymptote `height`.
fn tangent_times(
    slope: f64,
    intercept: f64,
    height: f64,
) -> Result<(f64, f64, f64), IdentificationError> {
    let tu = -intercept / slope;
    let end_time = (height - intercept) / slope;
    let tg = end_time - tu;
    if !tu.is_finite() || !tg.is_finite() || tg <= 0.0 {
        return Err(IdentificationError::InvalidTimes { tu, tg });
    }
    Ok((tu, end_time, tg))
}

/// Tangent, split point and asymptote for inflection point `index`.
#[allow(clippy::too_many_arguments)]
fn solve(
    x: &[f64],
    y: &[f64],
    fitter: &mut PolyFitter,
    points: &[InflectionPoint],
    asymptote_model: &Model,
    settings: &TangentMethodSettings,
    index: usize,
    shift: f64,
) -> Result<(TangentMethodResult, ModelFitter), IdentificationError> {
    let inflection = *points
        .get(index)
        .ok_or(IdentificationError::InflectionIndexOutOfRange {
            index,
            count: points.len(),
        })?;
    let slope = inflection.slope;
    let first_derivative = fitter.values(1)?;
    let slope_scale = first_derivative.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
    if !slope.is_finite() || slope.abs() <= FLAT_SLOPE_TOLERANCE * slope_scale {
        return Err(IdentificationError::DegenerateTangent);
    }
    if slope * step_direction(y) < 0.0 {
        return Err(IdentificationError::TangentAgainstStep { index, slope });
    }
    // y = slope * x + intercept
    let intercept = inflection.y - slope * inflection.x;

    let split_point = x
        .iter()
        .zip(first_derivative.iter())
        .find(|(xi, d)| **xi > inflection.x && (**d - slope).abs() > settings.slope_tolerance)
        .map(|(xi, _)| *xi)
        .ok_or(IdentificationError::NoSplitPoint)?;
    debug!("tangent leaves the curve at x = {}", split_point);

    let (tail_x, tail_y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(xi, _)| **xi > split_point)
        .map(|(xi, yi)| (*xi, *yi))
        .unzip();
    let seeds = asymptote_seeds(&tail_x, &tail_y, split_point);
    let asymptote_fitter =
        ModelFitter::with_settings(&tail_x, &tail_y, asymptote_model, &seeds, &settings.fit)?;
    let height = *asymptote_fitter
        .params()
        .get(HEIGHT_PARAM)
        .ok_or_else(|| IdentificationError::NoAsymptoteHeight(asymptote_model.name().to_string()))?;
    let (tu, end_time, tg) = tangent_times(slope, intercept, height)?;
    info!(
        "inflection {} at x = {:.4}: Tu = {:.4}, Tg = {:.4}, height = {:.4}",
        index, inflection.x, tu, tg, height
    );
    let result = TangentMethodResult {
        tu,
        tg,
        slope,
        intercept,
        height,
        inflection_index: index,
        inflection,
        split_point,
        end_time,
        asymptote_params: asymptote_fitter.params().clone(),
        shift,
    };
    Ok((result, asymptote_fitter))
}

/// Starting values for `c * (1 - exp(-(x - d) / t))` read off the tail: the height is the
/// last sample, the time constant a third of the tail length, and `d` puts the first sample
/// on the curve.
fn asymptote_seeds(x: &[f64], y: &[f64], split_point: f64) -> ParamMap {
    let mut seeds = ParamMap::new();
    let (Some(&x0), Some(&y0), Some(&x_last), Some(&y_last)) =
        (x.first(), y.first(), x.last(), y.last())
    else {
        return seeds;
    };
    let t = (x_last - split_point) / 3.0;
    let t = if t > 0.0 { t } else { 1.0 };
    let ratio = y0 / y_last;
    let d = if y_last != 0.0 && ratio > 0.0 && ratio < 1.0 {
        x0 + t * (1.0 - ratio).ln()
    } else {
        x0
    };
    seeds.insert("c".to_string(), y_last);
    seeds.insert("t".to_string(), t);
    seeds.insert("d".to_string(), d);
    seeds
}

/// Runs the inflectional tangent method with default settings and the given degree.
pub fn identify_by_tangent_method(
    x: &[f64],
    y: &[f64],
    degree: usize,
    shift: f64,
    catalog: &ModelCatalog,
) -> Result<TangentMethodResult, IdentificationError> {
    Ok(TangentMethodIdentifier::new(x, y, degree, shift, catalog)?
        .result()
        .clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::fitting::FitError;
    use approx::assert_relative_eq;

    /// step response of two lags with time constants 2 and 1:
    /// inflection at 2 ln 2 with y = 1/4 and slope 1/4, so Tu = 2 ln 2 - 1 and Tg = 4
    fn pt2_response() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..=240).map(|i| i as f64 * 0.05).collect();
        let y = x
            .iter()
            .map(|&t| 1.0 - 2.0 * (-t / 2.0).exp() + (-t).exp())
            .collect();
        (x, y)
    }

    #[test]
    fn test_tangent_method_on_second_order_lag() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = pt2_response();
        let result = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap();
        let tu = 2.0 * 2.0_f64.ln() - 1.0;
        assert_relative_eq!(result.inflection.x, 2.0 * 2.0_f64.ln(), epsilon = 1e-2);
        assert_relative_eq!(result.slope, 0.25, epsilon = 1e-3);
        assert_relative_eq!(result.tu, tu, epsilon = 0.02);
        assert_relative_eq!(result.tg, 4.0, max_relative = 0.05);
        assert_relative_eq!(result.height, 1.0, max_relative = 0.05);
        // the first derivative drops to 0.15 at x = -2 ln((1 - sqrt(0.4)) / 2)
        let split = -2.0 * ((1.0 - 0.4_f64.sqrt()) / 2.0).ln();
        assert_relative_eq!(result.split_point, split, epsilon = 0.1);
        assert_eq!(result.inflection_index, 0);
        assert_relative_eq!(result.tu_tg_ratio() * result.tg_tu_ratio(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_method_with_shift() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = pt2_response();
        // the same response delayed by 1
        let delayed_x: Vec<f64> = x.iter().map(|x| x + 1.0).collect();
        let mut x_all = vec![0.0, 0.25, 0.5, 0.75];
        let mut y_all = vec![0.0; 4];
        x_all.extend(delayed_x);
        y_all.extend(y);
        let direct = identify_by_tangent_method(&x, &pt2_response().1, 11, 0.0, &catalog).unwrap();
        let shifted = identify_by_tangent_method(&x_all, &y_all, 11, 1.0, &catalog).unwrap();
        assert_eq!(shifted.shift, 1.0);
        // only x = 1 itself is lost by the shift
        assert_relative_eq!(shifted.tu, direct.tu, epsilon = 0.02);
        assert_relative_eq!(shifted.tg, direct.tg, max_relative = 0.02);
    }

    #[test]
    fn test_tangent_curve() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = pt2_response();
        let result = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap();
        let (tx, ty) = result.tangent_curve(0.1);
        assert_relative_eq!(tx[0], result.tu);
        assert_relative_eq!(ty[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(*tx.last().unwrap(), result.end_time);
        assert_relative_eq!(*ty.last().unwrap(), result.height, epsilon = 1e-12);
        assert!(tx.windows(2).all(|w| w[0] < w[1]));
        let (tx, _) = result.tangent_curve(0.0);
        assert_eq!(tx, vec![result.tu, result.end_time]);
    }

    #[test]
    fn test_select_inflection_point_reuses_polynomial() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = pt2_response();
        let mut identifier = TangentMethodIdentifier::new(&x, &y, 11, 0.0, &catalog).unwrap();
        let before = identifier.result().clone();
        let polynomial = identifier.fitter().polynomial().unwrap().clone();
        let count = identifier.inflection_points().len();
        assert!(count >= 1);

        let err = identifier.select_inflection_point(count).unwrap_err();
        assert_eq!(
            err,
            IdentificationError::InflectionIndexOutOfRange { index: count, count }
        );
        assert_eq!(identifier.result(), &before);

        let again = identifier.select_inflection_point(0).unwrap().clone();
        assert_eq!(again.tu, before.tu);
        assert_eq!(again.tg, before.tg);
        assert_eq!(identifier.fitter().polynomial().unwrap(), &polynomial);
    }

    #[test]
    fn test_no_inflection_point() {
        let catalog = ModelCatalog::builtin().unwrap();
        // a parabola has constant curvature
        let x: Vec<f64> = (0..=100).map(|i| i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().map(|&t| 1.0 - (-t).exp()).collect();
        let err = identify_by_tangent_method(&x, &y, 2, 0.0, &catalog).unwrap_err();
        assert_eq!(err, IdentificationError::NoInflectionPoint);
    }

    #[test]
    fn test_no_split_point() {
        let catalog = ModelCatalog::builtin().unwrap();
        // (x - 1)^3 + 2x: up to x = 3 the slope stays within 12 of its value 2 at x = 1
        let x: Vec<f64> = (0..=40).map(|i| -1.0 + i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|x| (x - 1.0).powi(3) + 2.0 * x).collect();
        let settings = TangentMethodSettings::default()
            .with_degree(3)
            .with_slope_tolerance(20.0);
        // the slope has its minimum at the inflection point
        let err = TangentMethodIdentifier::with_settings(&x, &y, 0.0, &catalog, settings.clone())
            .err()
            .unwrap();
        assert_eq!(err, IdentificationError::NoRisingInflectionPoint);
        let err = TangentMethodIdentifier::with_settings(
            &x,
            &y,
            0.0,
            &catalog,
            settings.with_inflection_index(0),
        )
        .err()
        .unwrap();
        assert_eq!(err, IdentificationError::NoSplitPoint);
    }

    #[test]
    fn test_degenerate_tangent() {
        let catalog = ModelCatalog::builtin().unwrap();
        // (x - 1)^3 has a horizontal tangent at its inflection point
        let x: Vec<f64> = (0..=40).map(|i| -1.0 + i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|x| (x - 1.0).powi(3)).collect();
        let settings = TangentMethodSettings::default()
            .with_degree(3)
            .with_inflection_index(0);
        let err = TangentMethodIdentifier::with_settings(&x, &y, 0.0, &catalog, settings)
            .err()
            .unwrap();
        assert_eq!(err, IdentificationError::DegenerateTangent);
        let err = identify_by_tangent_method(&x, &y, 3, 0.0, &catalog).unwrap_err();
        assert_eq!(err, IdentificationError::NoRisingInflectionPoint);
    }

    /// `height (1 - exp(-(t - dead_time) / tau))` after the dead time, 0 before,
    /// on [0, 15] every 0.025
    fn delayed_first_order(height: f64, dead_time: f64, tau: f64) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..=600).map(|i| i as f64 * 0.025).collect();
        let y = x
            .iter()
            .map(|&t| {
                if t >= dead_time {
                    height * (1.0 - (-(t - dead_time) / tau).exp())
                } else {
                    0.0
                }
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_tangent_method_on_delayed_first_order_lag() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = delayed_first_order(2.0, 2.0, 3.0);
        let mut identifier = TangentMethodIdentifier::new(&x, &y, 11, 0.0, &catalog).unwrap();
        // the polynomial rounds the corner at the dead time: Tu comes out short, Tg long
        let result = identifier.result().clone();
        assert_eq!(result.inflection_index, 1);
        assert_relative_eq!(result.tu, 2.0, max_relative = 0.1);
        assert!(result.tu < 2.0);
        assert_relative_eq!(result.tg, 3.0, max_relative = 0.4);
        assert!(result.tg > 3.0);
        assert_relative_eq!(result.height, 2.0, max_relative = 1e-6);
        assert_relative_eq!(result.tg, result.height / result.slope, max_relative = 1e-9);

        // the first inflection point is a wiggle of the flat part with a falling tangent
        assert!(identifier.inflection_points()[0].slope < 0.0);
        let err = identifier.select_inflection_point(0).unwrap_err();
        assert!(matches!(
            err,
            IdentificationError::TangentAgainstStep { index: 0, slope } if slope < 0.0
        ));
        assert_eq!(identifier.result(), &result);

        let (x, y) = delayed_first_order(1.0, 1.0, 2.0);
        let result = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap();
        assert_relative_eq!(result.tu, 1.0, max_relative = 0.15);
        assert_relative_eq!(result.tg, 2.0, max_relative = 0.5);
    }

    #[test]
    fn test_tangent_method_on_falling_response() {
        let catalog = ModelCatalog::builtin().unwrap();
        let (x, y) = pt2_response();
        let negated: Vec<f64> = y.iter().map(|y| -y).collect();
        let rising = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap();
        let falling = identify_by_tangent_method(&x, &negated, 11, 0.0, &catalog).unwrap();
        assert!(falling.slope < 0.0);
        assert_relative_eq!(falling.height, -rising.height, max_relative = 1e-6);
        assert_relative_eq!(falling.tu, rising.tu, max_relative = 1e-6);
        assert_relative_eq!(falling.tg, rising.tg, max_relative = 1e-6);
    }

    #[test]
    fn test_tangent_times() {
        let (tu, end_time, tg) = tangent_times(0.5, -0.25, 1.0).unwrap();
        assert_eq!((tu, end_time, tg), (0.5, 2.5, 2.0));
        // an asymptote below the start of a rising tangent
        assert!(matches!(
            tangent_times(0.5, -0.25, -1.0),
            Err(IdentificationError::InvalidTimes { .. })
        ));
        assert!(matches!(
            tangent_times(0.0, -0.25, 1.0),
            Err(IdentificationError::InvalidTimes { .. })
        ));
    }

    #[test]
    fn test_missing_asymptote_model_and_bad_data() {
        let catalog = ModelCatalog::new();
        let (x, y) = pt2_response();
        let err = identify_by_tangent_method(&x, &y, 11, 0.0, &catalog).unwrap_err();
        assert_eq!(
            err,
            IdentificationError::MissingModel("exp_approach".to_string())
        );
        let catalog = ModelCatalog::builtin().unwrap();
        let err = identify_by_tangent_method(&x[..5], &y[..5], 11, 0.0, &catalog).unwrap_err();
        assert_eq!(
            err,
            IdentificationError::Fit(FitError::InsufficientData { needed: 12, got: 5 })
        );
    }

    #[test]
    fn test_asymptote_seeds() {
        let x = [4.0, 5.0, 10.0];
        let y = [0.5, 0.7, 1.0];
        let seeds = asymptote_seeds(&x, &y, 1.0);
        assert_eq!(seeds["c"], 1.0);
        assert_eq!(seeds["t"], 3.0);
        assert_relative_eq!(seeds["d"], 4.0 + 3.0 * 0.5_f64.ln());
        assert!(asymptote_seeds(&[], &[], 0.0).is_empty());
    }
}
