use ndarray::Array4;
use std::path::Path;

use super::PredictionError;

/// A loaded classifier. Given a `1x3xHxW` input it returns one score per class.
pub trait ClassifierRuntime: Send {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError>;
}

pub trait ModelLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Box<dyn ClassifierRuntime>, PredictionError>;
}

#[cfg(feature = "torch")]
pub use torch::TorchScriptLoader as DefaultLoader;

#[cfg(not(feature = "torch"))]
pub use unavailable::UnavailableLoader as DefaultLoader;

#[cfg(feature = "torch")]
mod torch {
    use super::*;
    use tch::{CModule, Device, Kind, Tensor};

    pub struct TorchScriptLoader {
        device: Device,
    }

    impl Default for TorchScriptLoader {
        fn default() -> Self {
            Self {
                device: Device::cuda_if_available(),
            }
        }
    }

    impl ModelLoader for TorchScriptLoader {
        fn load(&self, model_path: &Path) -> Result<Box<dyn ClassifierRuntime>, PredictionError> {
            let module = CModule::load_on_device(model_path, self.device)
                .map_err(|e| PredictionError::ModelLoad(e.to_string()))?;
            log::info!(
                "Loaded TorchScript model {} on {:?}",
                model_path.display(),
                self.device
            );
            Ok(Box::new(TorchScriptModel {
                module,
                device: self.device,
            }))
        }
    }

    struct TorchScriptModel {
        module: CModule,
        device: Device,
    }

    impl ClassifierRuntime for TorchScriptModel {
        fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, PredictionError> {
            let (n, c, h, w) = input.dim();
            let contiguous = input.as_standard_layout();
            let data = contiguous
                .as_slice()
                .ok_or_else(|| PredictionError::Inference("input is not contiguous".into()))?;
            let tensor = Tensor::from_slice(data)
                .view([n as i64, c as i64, h as i64, w as i64])
                .to_device(self.device);

            let output = tch::no_grad(|| self.module.forward_ts(&[tensor]))
                .map_err(|e| PredictionError::Inference(e.to_string()))?;
            let output_flat = output.softmax(-1, Kind::Float).to_kind(Kind::Float).view([-1]);
            let num_elements = output_flat.size()[0] as usize;
            let mut scores = vec![0.0f32; num_elements];
            output_flat.copy_data(&mut scores, num_elements);
            Ok(scores)
        }
    }
}

#[cfg(not(feature = "torch"))]
mod unavailable {
    use super::*;

    /// Used when the binary is built without libtorch; every load fails.
    #[derive(Default)]
    pub struct UnavailableLoader;

    impl ModelLoader for UnavailableLoader {
        fn load(&self, _model_path: &Path) -> Result<Box<dyn ClassifierRuntime>, PredictionError> {
            Err(PredictionError::BackendUnavailable)
        }
    }
}
