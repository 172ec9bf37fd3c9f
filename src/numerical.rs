/// Common machinery of the fitters: error type, derivative cache and the `Fitter` trait
/// with lazily computed derivative orders.
///  Example#1
/// ```
/// use RustedSITforC::numerical::fitting::Fitter;
/// use RustedSITforC::numerical::poly_fitter::PolyFitter;
/// let x: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
/// let y: Vec<f64> = x.iter().map(|x| x * x * x).collect();
/// let mut fitter = PolyFitter::new(&x, &y, 3).unwrap();
/// // order 2 is derived once and cached afterwards
/// let second = fitter.values(2).unwrap().to_vec();
/// println!("second derivative: {}", fitter.text(2).unwrap());
/// assert!((second[10] - 6.0).abs() < 1e-6);
/// ```
pub mod fitting;
/// Levenberg-Marquardt problem of a symbolic model with symbolic Jacobian
pub mod least_squares;
/// Nonlinear regression of a catalog model
/// Example#1
/// ```
/// use RustedSITforC::identification::model_catalog::ModelCatalog;
/// use RustedSITforC::numerical::model_fitter::{FitSettings, ModelFitter};
/// use RustedSITforC::symbolic::symbolic_engine::ParamMap;
/// let catalog = ModelCatalog::builtin().unwrap();
/// let pt1 = catalog.get("pt1").unwrap();
/// let x: Vec<f64> = (0..80).map(|i| i as f64 * 0.1).collect();
/// let y: Vec<f64> = x.iter().map(|x| 2.0 * (1.0 - (-x / 1.5).exp())).collect();
/// let settings = FitSettings::default().with_patience(200);
/// let fitter = ModelFitter::with_settings(&x, &y, pt1, &ParamMap::new(), &settings).unwrap();
/// println!("parameters: {:?}, R^2 = {}", fitter.params(), fitter.r_squared());
/// ```
pub mod model_fitter;
/// Polynomial regression with closed-form derivatives and inflection points
pub mod poly_fitter;
pub mod polynomial;
