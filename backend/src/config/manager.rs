use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::entity::{
    DataIngestionConfig, DataIngestionSettings, EvaluationConfig, EvaluationSettings,
    PrepareBaseModelConfig, PrepareBaseModelSettings, TrainingConfig, TrainingSettings,
    ValidationError,
};
use crate::utils::common::{FileError, create_directories, read_yaml};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] FileError),
    #[error("Invalid parameters in {path}: {source}")]
    Params {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error("Invalid environment variable {name}: {reason}")]
    Env { name: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
struct PipelineFile {
    artifacts_root: PathBuf,
    data_ingestion: DataIngestionSettings,
    prepare_base_model: PrepareBaseModelSection,
    training: TrainingSection,
    evaluation: EvaluationSection,
}

#[derive(Debug, Deserialize)]
struct PrepareBaseModelSection {
    root_dir: PathBuf,
    base_model_path: PathBuf,
    updated_base_model_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TrainingSection {
    root_dir: PathBuf,
    trained_model_path: PathBuf,
    training_data: PathBuf,
}

#[derive(Debug, Deserialize)]
struct EvaluationSection {
    mlflow_uri: String,
}

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(rename = "AUGMENTATION")]
    augmentation: bool,
    #[serde(rename = "IMAGE_SIZE")]
    image_size: Vec<i64>,
    #[serde(rename = "BATCH_SIZE")]
    batch_size: i64,
    #[serde(rename = "INCLUDE_TOP")]
    include_top: bool,
    #[serde(rename = "EPOCHS")]
    epochs: i64,
    #[serde(rename = "CLASSES")]
    classes: i64,
    #[serde(rename = "WEIGHTS")]
    weights: String,
    #[serde(rename = "LEARNING_RATE")]
    learning_rate: f64,
}

/// Reads the pipeline YAML files once and hands out one validated entity per
/// stage. Every getter creates the stage's working directory.
pub struct ConfigurationManager {
    config: PipelineFile,
    params: Params,
    all_params: BTreeMap<String, serde_yaml::Value>,
}

impl ConfigurationManager {
    pub fn new(config_path: &Path, params_path: &Path) -> Result<Self, ConfigError> {
        let config: PipelineFile = read_yaml(config_path)?;
        let all_params: BTreeMap<String, serde_yaml::Value> = read_yaml(params_path)?;
        let params = serde_yaml::to_value(&all_params)
            .and_then(serde_yaml::from_value::<Params>)
            .map_err(|source| ConfigError::Params {
                path: params_path.to_path_buf(),
                source,
            })?;

        create_directories(&[&config.artifacts_root])?;

        Ok(Self {
            config,
            params,
            all_params,
        })
    }

    pub fn get_data_ingestion_config(&self) -> Result<DataIngestionConfig, ConfigError> {
        let config = DataIngestionConfig::try_from(self.config.data_ingestion.clone())?;
        create_directories(&[config.root_dir()])?;
        Ok(config)
    }

    pub fn get_prepare_base_model_config(&self) -> Result<PrepareBaseModelConfig, ConfigError> {
        let section = &self.config.prepare_base_model;
        let config = PrepareBaseModelConfig::try_from(PrepareBaseModelSettings {
            root_dir: section.root_dir.clone(),
            base_model_path: section.base_model_path.clone(),
            update_base_model_path: section.updated_base_model_path.clone(),
            params_image_size: self.params.image_size.clone(),
            params_learning_rate: self.params.learning_rate,
            params_include_top: self.params.include_top,
            params_weights: self.params.weights.clone(),
            params_classes: self.params.classes,
        })?;
        create_directories(&[config.root_dir()])?;
        Ok(config)
    }

    pub fn get_training_config(&self) -> Result<TrainingConfig, ConfigError> {
        let section = &self.config.training;
        let config = TrainingConfig::try_from(TrainingSettings {
            root_dir: section.root_dir.clone(),
            trained_model_path: section.trained_model_path.clone(),
            update_base_model_path: self.config.prepare_base_model.updated_base_model_path.clone(),
            training_data: section.training_data.clone(),
            params_image_size: self.params.image_size.clone(),
            params_is_augmentation: self.params.augmentation,
            params_batch_size: self.params.batch_size,
            params_epochs: self.params.epochs,
            params_learning_rate: self.params.learning_rate,
        })?;
        create_directories(&[config.root_dir()])?;
        Ok(config)
    }

    pub fn get_evaluation_config(&self) -> Result<EvaluationConfig, ConfigError> {
        let config = EvaluationConfig::try_from(EvaluationSettings {
            path_of_model: self.config.training.trained_model_path.clone(),
            training_data: self.config.training.training_data.clone(),
            all_params: self.all_params.clone(),
            mlflow_uri: self.config.evaluation.mlflow_uri.clone(),
            params_image_size: self.params.image_size.clone(),
            params_batch_size: self.params.batch_size,
        })?;
        Ok(config)
    }
}
