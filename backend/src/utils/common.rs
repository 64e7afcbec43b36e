use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML file is empty: {0}")]
    EmptyYaml(PathBuf),
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FileError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        FileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let content = fs::read_to_string(path).map_err(|e| FileError::io(path, e))?;
    if content.trim().is_empty() {
        return Err(FileError::EmptyYaml(path.to_path_buf()));
    }
    let value = serde_yaml::from_str(&content).map_err(|source| FileError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("yaml file: {} loaded successfully", path.display());
    Ok(value)
}

pub fn create_directories<P: AsRef<Path>>(paths: &[P]) -> Result<(), FileError> {
    for path in paths {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| FileError::io(path, e))?;
        log::info!("created directory at: {}", path.display());
    }
    Ok(())
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), FileError> {
    let body = serde_json::to_string_pretty(data).map_err(|source| FileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, body).map_err(|e| FileError::io(path, e))?;
    log::info!("json file saved at: {}", path.display());
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let content = fs::read_to_string(path).map_err(|e| FileError::io(path, e))?;
    let value = serde_json::from_str(&content).map_err(|source| FileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("json file loaded successfully from: {}", path.display());
    Ok(value)
}

/// Size of a file in whole kilobytes, formatted as `~ N KB`.
pub fn get_size(path: &Path) -> Result<String, FileError> {
    let bytes = fs::metadata(path).map_err(|e| FileError::io(path, e))?.len();
    let kb = (bytes as f64 / 1024.0).round() as u64;
    Ok(format!("~ {} KB", kb))
}
