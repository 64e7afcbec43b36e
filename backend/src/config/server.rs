use std::env;
use std::path::PathBuf;

use super::entity::TrainingConfig;
use super::manager::ConfigError;

pub const DEFAULT_MODEL_PATH: &str = "artifacts/training/model.pt";
pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (224, 224);

/// Process-level settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_path: Option<PathBuf>,
    pub image_size: Option<(u32, u32)>,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub train_command: String,
    pub config_file: PathBuf,
    pub params_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: None,
            image_size: None,
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("uploads"),
            train_command: "python main.py".to_string(),
            config_file: PathBuf::from("config/config.yaml"),
            params_file: PathBuf::from("params.yaml"),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Env {
                name: "PORT",
                reason: format!("{:?} is not a valid port", raw),
            })?,
            None => defaults.port,
        };
        let image_size = lookup("IMAGE_SIZE")
            .map(|raw| parse_image_size(&raw))
            .transpose()?;

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            model_path: lookup("MODEL_PATH").map(PathBuf::from),
            image_size,
            template_dir: lookup("TEMPLATE_DIR").map_or(defaults.template_dir, PathBuf::from),
            static_dir: lookup("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
            upload_dir: lookup("UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
            train_command: lookup("TRAIN_COMMAND").unwrap_or(defaults.train_command),
            config_file: lookup("CONFIG_FILE").map_or(defaults.config_file, PathBuf::from),
            params_file: lookup("PARAMS_FILE").map_or(defaults.params_file, PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Model artifact and input size for the prediction pipeline. Explicit
    /// environment values win over the training stage configuration.
    pub fn resolve_model(&self, training: Option<&TrainingConfig>) -> (PathBuf, (u32, u32)) {
        let model_path = self
            .model_path
            .clone()
            .or_else(|| training.map(|t| t.trained_model_path().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
        let image_size = self
            .image_size
            .or_else(|| {
                training.and_then(|t| match t.params_image_size() {
                    [height, width, ..] => Some((*height, *width)),
                    _ => None,
                })
            })
            .unwrap_or(DEFAULT_IMAGE_SIZE);
        (model_path, image_size)
    }
}

fn parse_image_size(raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::Env {
        name: "IMAGE_SIZE",
        reason: format!("expected HEIGHT,WIDTH, got {:?}", raw),
    };
    let (height, width) = raw.split_once(',').ok_or_else(invalid)?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    if height == 0 || width == 0 {
        return Err(invalid());
    }
    Ok((height, width))
}
