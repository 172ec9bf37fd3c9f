//! Model catalog: named models read from and written to a section-per-model text file.
//!
//! Problems with a single entry (missing `func`, a formula that does not parse, a
//! non-numeric default, a duplicate name) skip that entry with a [`CatalogWarning`]; only a
//! file whose structure cannot be read is a [`CatalogError`].

use crate::Utils::catalog_parser::{CatalogSyntaxError, RawSection, format_section, parse_catalog};
use crate::identification::models::{Model, ModelError};
use crate::symbolic::symbolic_engine::ParamMap;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// catalog shipped with the crate
pub const BUILTIN_CATALOG: &str = include_str!("../../models/modellib.sfm");

const FUNC_KEY: &str = "func";
const COMMENT_KEY: &str = "comment";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogWarning {
    #[error("model `{name}` (line {line}) has no `func` entry, skipped")]
    MissingFunc { name: String, line: usize },
    #[error("parameter `{key}` of model `{name}` (line {line}) is not a number: `{value}`")]
    InvalidValue {
        name: String,
        key: String,
        value: String,
        line: usize,
    },
    #[error("{source} (line {line}), skipped")]
    InvalidModel { line: usize, source: ModelError },
    #[error("model `{name}` already exists, the new definition is ignored")]
    Duplicate { name: String },
    #[error("catalog `{}` does not exist, no models loaded", .0.display())]
    MissingFile(PathBuf),
    #[error("catalog contains no models")]
    Empty,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Syntax(#[from] CatalogSyntaxError),
    #[error("cannot access catalog `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("catalog has no file to reload from or save to")]
    NoSource,
}

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, Model>,
    source: Option<PathBuf>,
    warnings: Vec<CatalogWarning>,
}

impl ModelCatalog {
    /// empty catalog without a file
    pub fn new() -> Self {
        Self::default()
    }

    /// the models shipped with the crate (`pt1`, `pt2`, `pt3`, `exp_approach`, `gaussian`)
    pub fn builtin() -> Result<Self, CatalogError> {
        BUILTIN_CATALOG.parse()
    }

    /// Reads a catalog file. A missing file gives an empty catalog and a warning; the path is
    /// kept for `reset` and `save` either way.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let mut catalog = ModelCatalog::new();
        catalog.read_from(path)?;
        catalog.source = Some(path.to_path_buf());
        Ok(catalog)
    }

    /// Drops all models and reloads them from the last loaded or saved file.
    pub fn reset(&mut self) -> Result<(), CatalogError> {
        let path = self.source.clone().ok_or(CatalogError::NoSource)?;
        self.read_from(&path)
    }

    /// Writes the catalog to the last loaded or saved file.
    pub fn save(&self) -> Result<(), CatalogError> {
        let path = self.source.as_ref().ok_or(CatalogError::NoSource)?;
        self.write_to(path)
    }

    /// Writes the catalog to `path`, which becomes the file for later `save` and `reset`.
    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        self.write_to(path)?;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Adds a model unless one with the same name exists; returns whether it was added.
    pub fn add_model(&mut self, model: Model) -> bool {
        if self.models.contains_key(model.name()) {
            self.warn(CatalogWarning::Duplicate {
                name: model.name().to_string(),
            });
            return false;
        }
        info!("model `{}` added to the catalog", model.name());
        self.models.insert(model.name().to_string(), model);
        true
    }

    /// Builds a model from its parts and adds it.
    pub fn new_model(
        &mut self,
        name: &str,
        func: &str,
        default_params: ParamMap,
        comment: Option<String>,
    ) -> Result<bool, ModelError> {
        let model = Model::new(name, func, default_params, comment)?;
        Ok(self.add_model(model))
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Model> {
        self.models.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// model names in ascending order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// models in name order
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// warnings of the last load or reset, followed by those of later `add_model` calls
    pub fn warnings(&self) -> &[CatalogWarning] {
        &self.warnings
    }

    /// Catalog in file format.
    pub fn to_catalog_string(&self) -> String {
        self.models
            .values()
            .map(|model| {
                let mut entries = vec![(FUNC_KEY, model.func().to_string())];
                entries.extend(
                    model
                        .default_params()
                        .iter()
                        .map(|(key, value)| (key.as_str(), value.to_string())),
                );
                if let Some(comment) = model.comment() {
                    entries.push((COMMENT_KEY, comment.to_string()));
                }
                format_section(model.name(), entries)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn warn(&mut self, warning: CatalogWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn read_from(&mut self, path: &Path) -> Result<(), CatalogError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.models.clear();
                self.warnings.clear();
                self.warn(CatalogWarning::MissingFile(path.to_path_buf()));
                return Ok(());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        self.fill_from_str(&text)?;
        info!("loaded {} model(s) from {}", self.len(), path.display());
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), CatalogError> {
        fs::write(path, self.to_catalog_string()).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved {} model(s) to {}", self.len(), path.display());
        Ok(())
    }

    /// Replaces the models with those of `text`. On a structural error the catalog is left
    /// unchanged.
    fn fill_from_str(&mut self, text: &str) -> Result<(), CatalogError> {
        let sections = parse_catalog(text)?;
        self.models.clear();
        self.warnings.clear();
        for section in &sections {
            match model_from_section(section) {
                Ok(model) => {
                    self.add_model(model);
                }
                Err(warning) => self.warn(warning),
            }
        }
        if self.models.is_empty() {
            self.warn(CatalogWarning::Empty);
        }
        Ok(())
    }
}

fn model_from_section(section: &RawSection) -> Result<Model, CatalogWarning> {
    let func = section
        .get(FUNC_KEY)
        .ok_or_else(|| CatalogWarning::MissingFunc {
            name: section.name.clone(),
            line: section.line,
        })?;
    let mut defaults = ParamMap::new();
    for entry in &section.entries {
        if entry.key == FUNC_KEY || entry.key == COMMENT_KEY {
            continue;
        }
        let value = entry
            .value
            .parse::<f64>()
            .map_err(|_| CatalogWarning::InvalidValue {
                name: section.name.clone(),
                key: entry.key.clone(),
                value: entry.value.clone(),
                line: entry.line,
            })?;
        defaults.insert(entry.key.clone(), value);
    }
    let comment = section
        .get(COMMENT_KEY)
        .map(|entry| entry.value.clone())
        .filter(|comment| !comment.is_empty());
    Model::new(&section.name, &func.value, defaults, comment).map_err(|source| {
        CatalogWarning::InvalidModel {
            line: section.line,
            source,
        }
    })
}

impl FromStr for ModelCatalog {
    type Err = CatalogError;

    /// catalog without a file, from text in catalog format
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut catalog = ModelCatalog::new();
        catalog.fill_from_str(text)?;
        Ok(catalog)
    }
}

impl fmt::Display for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, model) in self.models.values().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write!(f, "{}", model)?;
        }
        Ok(())
    }
}
