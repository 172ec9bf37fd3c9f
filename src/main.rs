#![allow(non_snake_case)]
use RustedSITforC::Examples::identification_examples::{
    identification_examples, identify_directory, report_and_save, run_demo,
};
use RustedSITforC::Utils::data_loader::load_csv;
use RustedSITforC::Utils::logger::init_logger;
use RustedSITforC::Utils::report::{regression_report, tangent_method_report};
use RustedSITforC::identification::model_catalog::ModelCatalog;
use log::error;
use std::env;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

const USAGE: &str = "usage:
  sitforc                          identify a generated pt2 step response
  sitforc <data.csv> [model] [shift]
  sitforc --batch <dir> [model] [shift]
  sitforc --example <n>            0 formulas, 1 polynomial fit, 2 demo, 3 catalog
environment: SITFORC_LOG=trace|debug|info|warn|error|off, SITFORC_CATALOG=<catalog file>";

fn parse_shift(arg: Option<&String>) -> Result<f64, Box<dyn Error>> {
    match arg {
        None => Ok(0.0),
        Some(text) => Ok(text.parse::<f64>()?),
    }
}

fn catalog() -> Result<ModelCatalog, Box<dyn Error>> {
    let catalog = match env::var("SITFORC_CATALOG") {
        Ok(path) => ModelCatalog::load(path)?,
        Err(_) => ModelCatalog::builtin()?,
    };
    Ok(catalog)
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    match args.first().map(|a| a.as_str()) {
        None => run_demo(Path::new(".")),
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some("--example") => {
            let example = args.get(1).ok_or(USAGE)?.parse::<usize>()?;
            identification_examples(example);
            Ok(())
        }
        Some("--batch") => {
            let dir = args.get(1).ok_or(USAGE)?;
            let model = args.get(2).map(|m| m.as_str()).unwrap_or("pt2");
            let shift = parse_shift(args.get(3))?;
            let catalog = catalog()?;
            let results = identify_directory(Path::new(dir), model, shift, &catalog)?;
            for (path, result) in results {
                println!("== {}", path.display());
                match result {
                    Ok(identified) => {
                        println!("{}", regression_report(&identified.regression));
                        println!("{}", tangent_method_report(&identified.tangent_method));
                    }
                    Err(e) => println!("failed: {}", e),
                }
            }
            Ok(())
        }
        Some(file) => {
            let model = args.get(1).map(|m| m.as_str()).unwrap_or("pt2");
            let shift = parse_shift(args.get(2))?;
            let catalog = catalog()?;
            let (x, y) = load_csv(file)?;
            let name = Path::new(file)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "data".to_string());
            report_and_save(&name, &x, &y, model, shift, &catalog, Path::new("."))
        }
    }
}

fn main() -> ExitCode {
    let loglevel = env::var("SITFORC_LOG").ok();
    if let Err(e) = init_logger(loglevel.as_deref(), false) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
