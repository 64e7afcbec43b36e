//! Per-stage configuration entities.
//!
//! Each entity is built from a loosely typed `*Settings` value through
//! `TryFrom`. Fields are private, so a constructed entity is always valid and
//! never changes afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL {value:?} ({reason})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("{field}: must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: String },
    #[error("{field}: must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
    #[error("{field}: dimension {index} must be greater than zero, got {value}")]
    InvalidDimension {
        field: &'static str,
        index: usize,
        value: i64,
    },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidUrl { field, .. }
            | ValidationError::NotPositive { field, .. }
            | ValidationError::BelowMinimum { field, .. }
            | ValidationError::Empty { field }
            | ValidationError::InvalidDimension { field, .. } => field,
        }
    }
}

fn require_path(field: &'static str, path: PathBuf) -> Result<PathBuf, ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(path)
}

fn require_url(field: &'static str, value: String) -> Result<String, ValidationError> {
    let parsed = Url::parse(&value).map_err(|e| ValidationError::InvalidUrl {
        field,
        value: value.clone(),
        reason: e.to_string(),
    })?;
    if !parsed.has_host() {
        return Err(ValidationError::InvalidUrl {
            field,
            value,
            reason: "missing host".to_string(),
        });
    }
    Ok(value)
}

fn require_positive_float(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn require_positive_int(field: &'static str, value: i64) -> Result<usize, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NotPositive {
            field,
            value: value.to_string(),
        });
    }
    Ok(value as usize)
}

fn require_image_size(field: &'static str, dims: Vec<i64>) -> Result<Vec<u32>, ValidationError> {
    if dims.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    dims.into_iter()
        .enumerate()
        .map(|(index, value)| {
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ValidationError::InvalidDimension { field, index, value })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionSettings {
    pub root_dir: PathBuf,
    #[serde(rename = "source_URL")]
    pub source_url: String,
    pub local_data_file: String,
    pub unzip_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataIngestionConfig {
    root_dir: PathBuf,
    #[serde(rename = "source_URL")]
    source_url: String,
    local_data_file: String,
    unzip_dir: PathBuf,
}

impl TryFrom<DataIngestionSettings> for DataIngestionConfig {
    type Error = ValidationError;

    fn try_from(s: DataIngestionSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            root_dir: require_path("root_dir", s.root_dir)?,
            source_url: require_url("source_URL", s.source_url)?,
            local_data_file: s.local_data_file,
            unzip_dir: require_path("unzip_dir", s.unzip_dir)?,
        })
    }
}

impl DataIngestionConfig {
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn local_data_file(&self) -> &str {
        &self.local_data_file
    }

    pub fn unzip_dir(&self) -> &Path {
        &self.unzip_dir
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareBaseModelSettings {
    pub root_dir: PathBuf,
    pub base_model_path: PathBuf,
    pub update_base_model_path: PathBuf,
    pub params_image_size: Vec<i64>,
    pub params_learning_rate: f64,
    pub params_include_top: bool,
    pub params_weights: String,
    pub params_classes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareBaseModelConfig {
    root_dir: PathBuf,
    base_model_path: PathBuf,
    update_base_model_path: PathBuf,
    params_image_size: Vec<u32>,
    params_learning_rate: f64,
    params_include_top: bool,
    params_weights: String,
    params_classes: usize,
}

impl TryFrom<PrepareBaseModelSettings> for PrepareBaseModelConfig {
    type Error = ValidationError;

    fn try_from(s: PrepareBaseModelSettings) -> Result<Self, Self::Error> {
        if s.params_classes < 1 {
            return Err(ValidationError::BelowMinimum {
                field: "params_classes",
                min: 1,
                value: s.params_classes,
            });
        }
        Ok(Self {
            root_dir: require_path("root_dir", s.root_dir)?,
            base_model_path: require_path("base_model_path", s.base_model_path)?,
            update_base_model_path: require_path(
                "update_base_model_path",
                s.update_base_model_path,
            )?,
            params_image_size: require_image_size("params_image_size", s.params_image_size)?,
            params_learning_rate: require_positive_float(
                "params_learning_rate",
                s.params_learning_rate,
            )?,
            params_include_top: s.params_include_top,
            params_weights: s.params_weights,
            params_classes: s.params_classes as usize,
        })
    }
}

impl PrepareBaseModelConfig {
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn base_model_path(&self) -> &Path {
        &self.base_model_path
    }

    pub fn update_base_model_path(&self) -> &Path {
        &self.update_base_model_path
    }

    pub fn params_image_size(&self) -> &[u32] {
        &self.params_image_size
    }

    pub fn params_learning_rate(&self) -> f64 {
        self.params_learning_rate
    }

    pub fn params_include_top(&self) -> bool {
        self.params_include_top
    }

    pub fn params_weights(&self) -> &str {
        &self.params_weights
    }

    pub fn params_classes(&self) -> usize {
        self.params_classes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub root_dir: PathBuf,
    pub trained_model_path: PathBuf,
    pub update_base_model_path: PathBuf,
    pub training_data: PathBuf,
    pub params_image_size: Vec<i64>,
    pub params_is_augmentation: bool,
    pub params_batch_size: i64,
    pub params_epochs: i64,
    pub params_learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    root_dir: PathBuf,
    trained_model_path: PathBuf,
    update_base_model_path: PathBuf,
    training_data: PathBuf,
    params_image_size: Vec<u32>,
    params_is_augmentation: bool,
    params_batch_size: usize,
    params_epochs: usize,
    params_learning_rate: f64,
}

impl TryFrom<TrainingSettings> for TrainingConfig {
    type Error = ValidationError;

    fn try_from(s: TrainingSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            root_dir: require_path("root_dir", s.root_dir)?,
            trained_model_path: require_path("trained_model_path", s.trained_model_path)?,
            update_base_model_path: require_path(
                "update_base_model_path",
                s.update_base_model_path,
            )?,
            training_data: require_path("training_data", s.training_data)?,
            params_image_size: require_image_size("params_image_size", s.params_image_size)?,
            params_is_augmentation: s.params_is_augmentation,
            params_batch_size: require_positive_int("params_batch_size", s.params_batch_size)?,
            params_epochs: require_positive_int("params_epochs", s.params_epochs)?,
            params_learning_rate: require_positive_float(
                "params_learning_rate",
                s.params_learning_rate,
            )?,
        })
    }
}

impl TrainingConfig {
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn trained_model_path(&self) -> &Path {
        &self.trained_model_path
    }

    pub fn update_base_model_path(&self) -> &Path {
        &self.update_base_model_path
    }

    pub fn training_data(&self) -> &Path {
        &self.training_data
    }

    pub fn params_image_size(&self) -> &[u32] {
        &self.params_image_size
    }

    pub fn params_is_augmentation(&self) -> bool {
        self.params_is_augmentation
    }

    pub fn params_batch_size(&self) -> usize {
        self.params_batch_size
    }

    pub fn params_epochs(&self) -> usize {
        self.params_epochs
    }

    pub fn params_learning_rate(&self) -> f64 {
        self.params_learning_rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub path_of_model: PathBuf,
    pub training_data: PathBuf,
    pub all_params: BTreeMap<String, serde_yaml::Value>,
    pub mlflow_uri: String,
    pub params_image_size: Vec<i64>,
    pub params_batch_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationConfig {
    path_of_model: PathBuf,
    training_data: PathBuf,
    all_params: BTreeMap<String, serde_yaml::Value>,
    mlflow_uri: String,
    params_image_size: Vec<u32>,
    params_batch_size: usize,
}

impl TryFrom<EvaluationSettings> for EvaluationConfig {
    type Error = ValidationError;

    fn try_from(s: EvaluationSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            path_of_model: require_path("path_of_model", s.path_of_model)?,
            training_data: require_path("training_data", s.training_data)?,
            all_params: s.all_params,
            mlflow_uri: s.mlflow_uri,
            params_image_size: require_image_size("params_image_size", s.params_image_size)?,
            params_batch_size: require_positive_int("params_batch_size", s.params_batch_size)?,
        })
    }
}

impl EvaluationConfig {
    pub fn path_of_model(&self) -> &Path {
        &self.path_of_model
    }

    pub fn training_data(&self) -> &Path {
        &self.training_data
    }

    pub fn all_params(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.all_params
    }

    pub fn mlflow_uri(&self) -> &str {
        &self.mlflow_uri
    }

    pub fn params_image_size(&self) -> &[u32] {
        &self.params_image_size
    }

    pub fn params_batch_size(&self) -> usize {
        self.params_batch_size
    }
}
