//! Conversions between image files and model tensors.

use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::{backend::Backend, DType, Tensor, TensorData};
use image::{
    buffer::ConvertBuffer, imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer,
    Luma,
};
use unet_psa::DOWNSAMPLE_FACTOR;

/// Rounds `size` down to the nearest multiple the network accepts (at least one).
pub fn fit_to_network(size: u32) -> u32 {
    let factor = DOWNSAMPLE_FACTOR as u32;
    (size / factor).max(1) * factor
}

/// Loads an image as a `[1, 3, height, width]` tensor with values in `[0, 1]`.
///
/// The image is resized to `size x size` when given, otherwise each side is rounded
/// down to a multiple of the network's downsampling factor.
///
/// # Returns
/// The tensor and the original `(width, height)` of the image.
pub fn load_image<B: Backend, P: AsRef<Path>>(
    path: P,
    size: Option<u32>,
    device: &B::Device,
) -> Result<(Tensor<B, 4>, (u32, u32))> {
    let img = image::open(&path)
        .with_context(|| format!("Failed to open image at {}", path.as_ref().display()))?;
    let original = img.dimensions();

    let (width, height) = match size {
        Some(size) => (fit_to_network(size), fit_to_network(size)),
        None => (fit_to_network(original.0), fit_to_network(original.1)),
    };
    let img = if (width, height) == original {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    Ok((dynamic_image_to_tensor(img, device), original))
}

/// Converts a `DynamicImage` into a `[1, 3, height, width]` tensor.
pub fn dynamic_image_to_tensor<B: Backend>(img: DynamicImage, device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = img.dimensions();
    let buf = img.into_rgb32f().into_raw();

    let data = TensorData::new(buf, [height as usize, width as usize, 3])
        .convert::<B::FloatElem>();
    let tensor = Tensor::<B, 3>::from_data(data, device);

    tensor.permute([2, 0, 1]).unsqueeze::<4>()
}

/// Converts a `[1, 1, height, width]` tensor with values in `[0, 1]` to a grayscale image.
pub fn tensor_to_mask_image<B: Backend>(tensor: Tensor<B, 4>) -> Result<DynamicImage> {
    let [batch, channels, height, width] = tensor.dims();
    if batch != 1 || channels != 1 {
        anyhow::bail!(
            "Expected a [1, 1, H, W] mask, got [{batch}, {channels}, {height}, {width}]"
        );
    }

    let data = tensor
        .into_data()
        .convert_dtype(DType::F32)
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to convert tensor to f32: {e:?}"))?;

    let f32_buffer = ImageBuffer::<Luma<f32>, _>::from_raw(width as u32, height as u32, data)
        .context("Failed to create grayscale f32 image buffer")?;
    let u8_buffer: ImageBuffer<Luma<u8>, Vec<u8>> = f32_buffer.convert();

    Ok(DynamicImage::ImageLuma8(u8_buffer))
}

/// Binarizes a probability map: values above `threshold` become 1, others 0.
pub fn apply_threshold<B: Backend>(mask: Tensor<B, 4>, threshold: f32) -> Tensor<B, 4> {
    mask.greater_elem(threshold).float()
}

/// Renders a feature map `[1, C, H, W]` as its min-max normalized channel mean.
pub fn feature_map_to_image<B: Backend>(features: Tensor<B, 4>) -> Result<DynamicImage> {
    let mean = features.mean_dim(1);
    let min = mean.clone().min();
    let range = mean.clone().max() - min.clone();

    let [batch, _, height, width] = mean.dims();
    let normalized = (mean - min.reshape([1, 1, 1, 1]))
        .div(range.clamp_min(1e-6).reshape([1, 1, 1, 1]));

    tensor_to_mask_image(normalized.reshape([batch, 1, height, width]))
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        tensor::{Distribution, Tensor},
    };
    use image::RgbImage;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn fit_to_network_rounds_down_to_multiples_of_sixteen() {
        assert_eq!(fit_to_network(1024), 1024);
        assert_eq!(fit_to_network(1000), 992);
        assert_eq!(fit_to_network(7), 16);
    }

    #[test]
    fn image_tensor_has_batch_and_channel_axes() {
        let device = Default::default();
        let img = DynamicImage::ImageRgb8(RgbImage::new(48, 32));

        let tensor = dynamic_image_to_tensor::<TestBackend>(img, &device);
        assert_eq!(tensor.dims(), [1, 3, 32, 48]);
    }

    #[test]
    fn mask_image_keeps_resolution() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 4>::random(
            [1, 1, 16, 32],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let img = tensor_to_mask_image(mask).unwrap();
        assert_eq!(img.dimensions(), (32, 16));
    }

    #[test]
    fn mask_image_rejects_multichannel_tensors() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        assert!(tensor_to_mask_image(tensor).is_err());
    }

    #[test]
    fn threshold_produces_binary_mask() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 4>::random(
            [1, 1, 8, 8],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let binary = apply_threshold(mask, 0.5);
        let values = binary.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn feature_map_image_is_single_channel() {
        let device = Default::default();
        let features = Tensor::<TestBackend, 4>::random(
            [1, 32, 16, 16],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let img = feature_map_to_image(features).unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        assert!(matches!(img, DynamicImage::ImageLuma8(_)));
    }
}
