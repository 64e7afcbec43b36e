use shared::{Label, Prediction};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use super::PredictionError;
use super::preprocess::load_image_tensor;
use super::runtime::{ClassifierRuntime, ModelLoader};

struct LoadedModel {
    modified: Option<SystemTime>,
    runtime: Box<dyn ClassifierRuntime>,
}

/// Classifies single images with the trained model artifact.
///
/// The model is loaded lazily and kept in memory; it is reloaded whenever the
/// artifact's modification time changes, so a finished training run is picked
/// up by the next prediction.
pub struct PredictionPipeline {
    model_path: PathBuf,
    input_size: (u32, u32),
    loader: Box<dyn ModelLoader>,
    model: Mutex<Option<LoadedModel>>,
}

impl PredictionPipeline {
    pub fn new(model_path: PathBuf, input_size: (u32, u32), loader: Box<dyn ModelLoader>) -> Self {
        Self {
            model_path,
            input_size,
            loader,
            model: Mutex::new(None),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn predict(&self, filename: &Path) -> Result<Vec<Prediction>, PredictionError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| PredictionError::Inference("model lock poisoned".into()))?;
        let model = self.ensure_loaded(&mut guard)?;

        let input = load_image_tensor(filename, self.input_size)?;
        let scores = model.runtime.forward(&input)?;
        let index = argmax(&scores)?;
        let label = Label::from_class_index(index);
        log::debug!("scores {:?} -> class {} ({})", scores, index, label);

        Ok(vec![Prediction { image: label }])
    }

    fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<LoadedModel>,
    ) -> Result<&'a mut LoadedModel, PredictionError> {
        let metadata = fs::metadata(&self.model_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PredictionError::ModelNotFound(self.model_path.clone()),
            _ => PredictionError::ModelLoad(format!("{}: {}", self.model_path.display(), e)),
        })?;
        let modified = metadata.modified().ok();

        let stale = match slot.as_ref() {
            Some(loaded) => modified.is_none() || loaded.modified != modified,
            None => true,
        };
        if stale {
            log::info!("Loading model artifact {}", self.model_path.display());
            let runtime = self.loader.load(&self.model_path)?;
            *slot = Some(LoadedModel { modified, runtime });
        }

        slot.as_mut()
            .ok_or_else(|| PredictionError::ModelLoad("model slot empty after load".into()))
    }
}

/// Index of the highest score; the first one wins a tie.
fn argmax(scores: &[f32]) -> Result<usize, PredictionError> {
    scores
        .iter()
        .enumerate()
        .reduce(|best, next| if next.1.total_cmp(best.1).is_gt() { next } else { best })
        .map(|(index, _)| index)
        .ok_or_else(|| PredictionError::Inference("model returned no scores".into()))
}
