//! Named parametric models: a formula over `x` and `p[key]` with default parameter values.

use crate::symbolic::parse_expr::{ParseError, ParsedFormula, parse_formula};
use crate::symbolic::symbolic_engine::{EvalError, ParamMap};
use itertools::Itertools;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("formula of model `{name}` is invalid: {source}")]
    Parse { name: String, source: ParseError },
    #[error("model `{name}` cannot be evaluated at its defaults: {source}")]
    Defaults { name: String, source: EvalError },
}

/// A regression model.
///
/// Every parameter the formula references has a default value, so the model can always be
/// evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    formula: ParsedFormula,
    default_params: ParamMap,
    comment: Option<String>,
}

impl Model {
    /// Parses the formula; every parameter it references needs a default, and the defaults
    /// must evaluate at x = 1.
    pub fn new(
        name: &str,
        func: &str,
        default_params: ParamMap,
        comment: Option<String>,
    ) -> Result<Self, ModelError> {
        let formula = parse_formula(func).map_err(|source| ModelError::Parse {
            name: name.to_string(),
            source,
        })?;
        if let Some(missing) = formula
            .params()
            .iter()
            .find(|key| !default_params.contains_key(key.as_str()))
        {
            return Err(ModelError::Defaults {
                name: name.to_string(),
                source: EvalError::MissingParameter(missing.clone()),
            });
        }
        match formula.eval(1.0, &default_params) {
            Err(source @ EvalError::MissingParameter(_)) => {
                return Err(ModelError::Defaults {
                    name: name.to_string(),
                    source,
                });
            }
            // a domain error at x = 1 says nothing about the definition itself
            Err(EvalError::FactorialDomain(_)) | Ok(_) => {}
        }
        Ok(Model {
            name: name.to_string(),
            formula,
            default_params,
            comment,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn formula(&self) -> &ParsedFormula {
        &self.formula
    }

    /// formula text as written in the catalog
    pub fn func(&self) -> &str {
        self.formula.source()
    }

    pub fn rendering(&self) -> &str {
        self.formula.rendering()
    }

    pub fn default_params(&self) -> &ParamMap {
        &self.default_params
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Defaults merged with `overrides`; overrides win.
    pub fn params_with(&self, overrides: &ParamMap) -> ParamMap {
        let mut params = self.default_params.clone();
        params.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        params
    }

    /// Replaces the given defaults, keeping the others.
    pub fn set_default_params(&mut self, params: &ParamMap) {
        self.default_params
            .extend(params.iter().map(|(k, v)| (k.clone(), *v)));
    }

    /// value at `x` with the default parameters
    pub fn evaluate(&self, x: f64) -> Result<f64, EvalError> {
        self.formula.eval(x, &self.default_params)
    }

    /// value at `x` with defaults overridden by `overrides`
    pub fn evaluate_with(&self, x: f64, overrides: &ParamMap) -> Result<f64, EvalError> {
        self.formula.eval(x, &self.params_with(overrides))
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "** Regression model **")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Formula: {}", self.formula.rendering())?;
        let defaults = self
            .default_params
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .join(", ");
        write!(f, "Default parameters: {}", defaults)?;
        if let Some(comment) = &self.comment {
            write!(f, "\nComment: {}", comment)?;
        }
        Ok(())
    }
}
