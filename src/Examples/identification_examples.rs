#![allow(non_snake_case)]
use crate::Utils::data_loader::{DataError, load_csv};
use crate::Utils::logger::save_curves_to_csv;
use crate::Utils::plots::{plot_regression, plot_tangent_method};
use crate::Utils::report::{regression_report, tangent_method_report};
use crate::identification::IdentificationError;
use crate::identification::model_catalog::ModelCatalog;
use crate::identification::models::Model;
use crate::identification::regression::{RegressionResult, identify_by_regression};
use crate::identification::tangent_method::{TangentMethodResult, identify_by_tangent_method};
use crate::numerical::fitting::Fitter;
use crate::numerical::poly_fitter::PolyFitter;
use crate::symbolic::parse_expr::parse_formula;
use crate::symbolic::symbolic_engine::{EvalError, ParamMap};
use log::{error, info, warn};
use rand::Rng;
use rayon::prelude::*;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// polynomial degree used by the demo and the batch driver
pub const DEFAULT_DEGREE: usize = 11;

/// Samples `model` at its defaults on `size` equidistant points of `range` and adds uniform
/// noise from `[-noise, noise]`.
pub fn generate_rand_data(
    model: &Model,
    range: (f64, f64),
    size: usize,
    noise: f64,
) -> Result<(Vec<f64>, Vec<f64>), EvalError> {
    let (start, end) = range;
    let step = if size > 1 {
        (end - start) / (size - 1) as f64
    } else {
        0.0
    };
    let x: Vec<f64> = (0..size).map(|i| start + i as f64 * step).collect();
    let mut y = model.formula().expr().eval_vec(&x, model.default_params())?;
    if noise > 0.0 {
        let mut rng = rand::rng();
        for yi in y.iter_mut() {
            *yi += rng.random_range(-noise..=noise);
        }
    }
    Ok((x, y))
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Identification(#[from] IdentificationError),
}

/// Results of both methods on one data file
#[derive(Debug, Clone)]
pub struct FileIdentification {
    pub file: PathBuf,
    pub regression: RegressionResult,
    pub tangent_method: TangentMethodResult,
}

/// Loads one file and runs regression of `model_name` and the tangent method on it.
pub fn identify_file(
    path: &Path,
    model_name: &str,
    shift: f64,
    catalog: &ModelCatalog,
) -> Result<FileIdentification, BatchError> {
    let model = catalog
        .get(model_name)
        .ok_or_else(|| IdentificationError::MissingModel(model_name.to_string()))?;
    let (x, y) = load_csv(path)?;
    let regression = identify_by_regression(&x, &y, model, shift)?;
    let tangent_method = identify_by_tangent_method(&x, &y, DEFAULT_DEGREE, shift, catalog)?;
    Ok(FileIdentification {
        file: path.to_path_buf(),
        regression,
        tangent_method,
    })
}

/// `.csv` files of a directory, sorted by name
pub fn csv_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Identifies every `.csv` file of `dir` in parallel. A failing file does not stop the others.
pub fn identify_directory(
    dir: &Path,
    model_name: &str,
    shift: f64,
    catalog: &ModelCatalog,
) -> io::Result<Vec<(PathBuf, Result<FileIdentification, BatchError>)>> {
    let files = csv_files(dir)?;
    info!("identifying {} files in {}", files.len(), dir.display());
    let results: Vec<(PathBuf, Result<FileIdentification, BatchError>)> = files
        .par_iter()
        .map(|path| (path.clone(), identify_file(path, model_name, shift, catalog)))
        .collect();
    for (path, result) in results.iter() {
        if let Err(e) = result {
            warn!("{}: {}", path.display(), e);
        }
    }
    Ok(results)
}

/// Prints both reports of one data set and writes the curves and plots into `output_dir`.
pub fn report_and_save(
    name: &str,
    x: &[f64],
    y: &[f64],
    model_name: &str,
    shift: f64,
    catalog: &ModelCatalog,
    output_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let model = catalog
        .get(model_name)
        .ok_or_else(|| IdentificationError::MissingModel(model_name.to_string()))?;
    let regression = identify_by_regression(x, y, model, shift)?;
    println!("{}", regression_report(&regression));
    let fitted_x: Vec<f64> = regression.x.iter().map(|xi| xi + shift.max(0.0)).collect();
    save_curves_to_csv(
        output_dir.join(format!("{}_regression.csv", name)),
        &["x", "fitted"],
        &[&fitted_x, &regression.curve],
    )?;
    plot_regression(
        &output_dir.join(format!("{}_regression.png", name)),
        x,
        y,
        &regression,
    )?;

    let tangent = identify_by_tangent_method(x, y, DEFAULT_DEGREE, shift, catalog)?;
    println!("{}", tangent_method_report(&tangent));
    let (tx, ty) = tangent.tangent_curve(0.1);
    let tx: Vec<f64> = tx.iter().map(|xi| xi + shift.max(0.0)).collect();
    save_curves_to_csv(
        output_dir.join(format!("{}_tangent.csv", name)),
        &["x", "tangent"],
        &[&tx, &ty],
    )?;
    plot_tangent_method(
        &output_dir.join(format!("{}_tangent.png", name)),
        x,
        y,
        &tangent,
    )?;
    Ok(())
}

/// Noisy pt2 step response identified by both methods.
pub fn run_demo(output_dir: &Path) -> Result<(), Box<dyn Error>> {
    let catalog = ModelCatalog::builtin()?;
    let pt2 = catalog
        .get("pt2")
        .ok_or_else(|| IdentificationError::MissingModel("pt2".to_string()))?;
    let (x, y) = generate_rand_data(pt2, (0.0, 12.0), 241, 0.005)?;
    report_and_save("demo", &x, &y, "pt2", 0.0, &catalog, output_dir)
}

pub fn identification_examples(example: usize) {
    match example {
        0 => {
            // formula text to expression, rendering and parameters
            let formula = match parse_formula("p[\"k\"] * (1 - exp(-x / p[\"t\"]))") {
                Ok(formula) => formula,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            println!("rendering: {}", formula.rendering());
            println!("latex: {}", formula.latex());
            println!("params: {:?}", formula.params());
            let params: ParamMap = [("k".to_string(), 2.0), ("t".to_string(), 0.5)].into();
            println!("f(1) = {:?}", formula.eval(1.0, &params));
            let derivative = formula
                .expr()
                .n_th_derivative_x(2)
                .map(|d| d.simplify_());
            match derivative {
                Ok(d) => println!("f''(x) = {}", d),
                Err(e) => error!("{}", e),
            }
        }
        1 => {
            // polynomial fit with its derivatives and inflection points
            let x: Vec<f64> = (0..=100).map(|i| -2.0 + i as f64 * 0.04).collect();
            let y: Vec<f64> = x.iter().map(|x| x.powi(3) - x).collect();
            match PolyFitter::new(&x, &y, 3) {
                Ok(mut fitter) => {
                    println!("{}", fitter.text(0).unwrap_or_default());
                    println!("{}", fitter.text(1).unwrap_or_default());
                    println!("inflection points: {:?}", fitter.inflection_points());
                }
                Err(e) => error!("{}", e),
            }
        }
        2 => {
            if let Err(e) = run_demo(Path::new(".")) {
                error!("demo failed: {}", e);
            }
        }
        3 => {
            // the model catalog as a text file
            match ModelCatalog::builtin() {
                Ok(mut catalog) => {
                    let added = catalog.new_model(
                        "ramp",
                        "p[\"a\"] * x + p[\"b\"]",
                        [("a".to_string(), 1.0), ("b".to_string(), 0.0)].into(),
                        Some("straight line".to_string()),
                    );
                    println!("ramp added: {:?}", added);
                    println!("{}", catalog);
                    println!("{}", catalog.to_catalog_string());
                }
                Err(e) => error!("{}", e),
            }
        }
        _ => {
            println!("no example {}", example);
        }
    }
}
