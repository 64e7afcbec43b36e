use image::ImageReader;
use image::imageops::FilterType;
use ndarray::Array4;
use std::io::ErrorKind;
use std::path::Path;

use super::PredictionError;

/// Loads an image file as a `1x3xHxW` float array with values in `[0, 1]`.
pub fn load_image_tensor(path: &Path, (height, width): (u32, u32)) -> Result<Array4<f32>, PredictionError> {
    let reader = ImageReader::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PredictionError::ImageNotFound(path.to_path_buf()),
        _ => PredictionError::ImageDecode(image::ImageError::IoError(e)),
    })?;
    let decoded = reader
        .with_guessed_format()
        .map_err(|e| PredictionError::ImageDecode(image::ImageError::IoError(e)))?
        .decode()?;

    let rgb = decoded
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let tensor = Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| rgb.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
    );
    Ok(tensor)
}
