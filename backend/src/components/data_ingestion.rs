use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::entity::DataIngestionConfig;
use crate::utils::common::get_size;

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Download from {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Archive entry escapes the target directory: {0}")]
    UnsafeEntry(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> IngestionError + '_ {
    move |source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        Self { config }
    }

    /// Fetches the dataset archive unless it is already on disk.
    pub async fn download_file(&self) -> Result<PathBuf, IngestionError> {
        let target = PathBuf::from(self.config.local_data_file());
        if target.exists() {
            let size = get_size(&target).unwrap_or_default();
            log::info!("File already exists: {} ({})", target.display(), size);
            return Ok(target);
        }

        let url = self.config.source_url();
        log::info!("Downloading {} into {}", url, target.display());
        let download_err = |source| IngestionError::Download {
            url: url.to_string(),
            source,
        };
        let bytes = reqwest::get(url)
            .await
            .and_then(|response| response.error_for_status())
            .map_err(download_err)?
            .bytes()
            .await
            .map_err(download_err)?;

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&target, &bytes).map_err(io_err(&target))?;
        log::info!("Downloaded {} bytes to {}", bytes.len(), target.display());
        Ok(target)
    }

    /// Unpacks the downloaded archive into `unzip_dir`.
    pub fn extract_zip_file(&self) -> Result<usize, IngestionError> {
        let archive_path = Path::new(self.config.local_data_file());
        let unzip_dir = self.config.unzip_dir();
        fs::create_dir_all(unzip_dir).map_err(io_err(unzip_dir))?;

        let file = File::open(archive_path).map_err(io_err(archive_path))?;
        let archive_err = |source| IngestionError::Archive {
            path: archive_path.to_path_buf(),
            source,
        };
        let mut archive = zip::ZipArchive::new(file).map_err(archive_err)?;

        let mut extracted = 0;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(archive_err)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| IngestionError::UnsafeEntry(entry.name().to_string()))?;
            let out_path = unzip_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(io_err(&out_path))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            let mut out = File::create(&out_path).map_err(io_err(&out_path))?;
            io::copy(&mut entry, &mut out).map_err(io_err(&out_path))?;
            extracted += 1;
        }

        log::info!(
            "Extracted {} files from {} into {}",
            extracted,
            archive_path.display(),
            unzip_dir.display()
        );
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::entity::DataIngestionSettings;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn ingestion(dir: &Path) -> DataIngestion {
        let config = DataIngestionConfig::try_from(DataIngestionSettings {
            root_dir: dir.to_path_buf(),
            source_url: "https://example.invalid/data.zip".to_string(),
            local_data_file: dir.join("data.zip").display().to_string(),
            unzip_dir: dir.join("unzipped"),
        })
        .unwrap();
        DataIngestion::new(config)
    }

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_nested_files() {
        let dir = TempDir::new().unwrap();
        let stage = ingestion(dir.path());
        write_archive(
            &dir.path().join("data.zip"),
            &[
                ("Chest-CT-Scan-data/normal/a.png", &b"a"[..]),
                ("Chest-CT-Scan-data/adenocarcinoma/b.png", &b"bb"[..]),
            ],
        );

        assert_eq!(stage.extract_zip_file().unwrap(), 2);
        let out = dir.path().join("unzipped/Chest-CT-Scan-data");
        assert_eq!(fs::read(out.join("normal/a.png")).unwrap(), b"a");
        assert_eq!(fs::read(out.join("adenocarcinoma/b.png")).unwrap(), b"bb");
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let stage = ingestion(dir.path());
        write_archive(&dir.path().join("data.zip"), &[("../escape.txt", &b"x"[..])]);

        assert!(matches!(
            stage.extract_zip_file().unwrap_err(),
            IngestionError::UnsafeEntry(_)
        ));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn not_a_zip() {
        let dir = TempDir::new().unwrap();
        let stage = ingestion(dir.path());
        fs::write(dir.path().join("data.zip"), b"plain text").unwrap();
        assert!(matches!(
            stage.extract_zip_file().unwrap_err(),
            IngestionError::Archive { .. }
        ));
    }

    #[actix_web::test]
    async fn existing_download_is_reused() {
        let dir = TempDir::new().unwrap();
        let stage = ingestion(dir.path());
        fs::write(dir.path().join("data.zip"), b"cached").unwrap();

        let path = stage.download_file().await.unwrap();
        assert_eq!(fs::read(path).unwrap(), b"cached");
    }
}
