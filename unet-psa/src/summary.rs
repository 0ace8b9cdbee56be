//! Layer-by-layer summary of a `UNetPsa` model.
//!
//! Output shapes are derived from the channel schedule and the pooling depth, so
//! no forward pass is needed. Memory figures assume 32-bit floats.

use core::fmt;

use burn::prelude::*;

use crate::{error::UNetPsaResult, models::unet::UNetPsa};

const BYTES_PER_VALUE: usize = 4;
const MIB: f64 = 1024.0 * 1024.0;

/// One row of a [`ModelSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    /// Stage name, e.g. `encoder1`, `pool2` or `upconv3`.
    pub name: String,
    /// Output shape `[channels, height, width]` for one batch item.
    pub output_shape: [usize; 3],
    /// Number of parameters owned by the stage.
    pub params: usize,
}

impl LayerSummary {
    fn new(name: &str, output_shape: [usize; 3], params: usize) -> Self {
        Self {
            name: name.to_owned(),
            output_shape,
            params,
        }
    }

    /// Number of values in the stage output for one batch item.
    pub fn output_len(&self) -> usize {
        self.output_shape.iter().product()
    }
}

/// Summary of a model for a given input resolution.
#[derive(Debug, Clone)]
pub struct ModelSummary {
    /// Input shape `[channels, height, width]`.
    pub input_shape: [usize; 3],
    /// Stages in execution order.
    pub layers: Vec<LayerSummary>,
    /// Total number of parameters.
    pub total_params: usize,
}

impl ModelSummary {
    /// Summarizes `model` for inputs of shape `[channels, height, width]`.
    ///
    /// # Errors
    ///
    /// Returns `UNetPsaError::InvalidTensorShape` if the model cannot process
    /// inputs of this shape.
    pub fn new<B: Backend>(model: &UNetPsa<B>, input_shape: [usize; 3]) -> UNetPsaResult<Self> {
        let [channels, height, width] = input_shape;
        model.check_input([1, channels, height, width])?;

        let f = model.init_features();
        let at = |features: usize, level: usize| [features, height >> level, width >> level];

        let layers = vec![
            LayerSummary::new("encoder1", at(f, 0), model.encoder1.num_params()),
            LayerSummary::new("pool1", at(f, 1), 0),
            LayerSummary::new("encoder2", at(f * 2, 1), model.encoder2.num_params()),
            LayerSummary::new("pool2", at(f * 2, 2), 0),
            LayerSummary::new("encoder3", at(f * 4, 2), model.encoder3.num_params()),
            LayerSummary::new("pool3", at(f * 4, 3), 0),
            LayerSummary::new("encoder4", at(f * 8, 3), model.encoder4.num_params()),
            LayerSummary::new("pool4", at(f * 8, 4), 0),
            LayerSummary::new("bottleneck", at(f * 16, 4), model.bottleneck.num_params()),
            LayerSummary::new("upconv4", at(f * 8, 3), model.upconv4.num_params()),
            LayerSummary::new("decoder4", at(f * 8, 3), model.decoder4.num_params()),
            LayerSummary::new("upconv3", at(f * 4, 2), model.upconv3.num_params()),
            LayerSummary::new("decoder3", at(f * 4, 2), model.decoder3.num_params()),
            LayerSummary::new("upconv2", at(f * 2, 1), model.upconv2.num_params()),
            LayerSummary::new("decoder2", at(f * 2, 1), model.decoder2.num_params()),
            LayerSummary::new("upconv1", at(f, 0), model.upconv1.num_params()),
            LayerSummary::new("decoder1", at(f, 0), model.decoder1.num_params()),
            LayerSummary::new("head", at(model.out_channels(), 0), model.head.num_params()),
        ];

        Ok(Self {
            input_shape,
            layers,
            total_params: model.num_params(),
        })
    }

    /// Size of one input item in MiB.
    pub fn input_size_mb(&self) -> f64 {
        (self.input_shape.iter().product::<usize>() * BYTES_PER_VALUE) as f64 / MIB
    }

    /// Stage outputs of one batch item plus their gradients, in MiB.
    pub fn forward_backward_size_mb(&self) -> f64 {
        let values: usize = self.layers.iter().map(LayerSummary::output_len).sum();
        (2 * values * BYTES_PER_VALUE) as f64 / MIB
    }

    /// Parameter storage in MiB.
    pub fn params_size_mb(&self) -> f64 {
        (self.total_params * BYTES_PER_VALUE) as f64 / MIB
    }

    /// Sum of input, activation and parameter estimates in MiB.
    pub fn estimated_total_mb(&self) -> f64 {
        self.input_size_mb() + self.forward_backward_size_mb() + self.params_size_mb()
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(64);
        writeln!(f, "{rule}")?;
        writeln!(f, "{:>20}  {:>25}  {:>15}", "Layer", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(64))?;
        for layer in &self.layers {
            let [c, h, w] = layer.output_shape;
            writeln!(
                f,
                "{:>20}  {:>25}  {:>15}",
                layer.name,
                format!("[-1, {c}, {h}, {w}]"),
                layer.params
            )?;
        }
        writeln!(f, "{}", "=".repeat(64))?;
        writeln!(f, "Total params: {}", self.total_params)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Input size (MB): {:.2}", self.input_size_mb())?;
        writeln!(
            f,
            "Forward/backward pass size (MB): {:.2}",
            self.forward_backward_size_mb()
        )?;
        writeln!(f, "Params size (MB): {:.2}", self.params_size_mb())?;
        writeln!(f, "Estimated Total Size (MB): {:.2}", self.estimated_total_mb())?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::UNetPsaConfig, error::UNetPsaError, tests::TestBackend};

    #[test]
    fn summary_rows_follow_the_channel_schedule() {
        let device = Default::default();
        let model = UNetPsaConfig::new().init::<TestBackend>(&device).unwrap();
        let summary = ModelSummary::new(&model, [3, 64, 32]).unwrap();

        assert_eq!(summary.layers.len(), 18);
        assert_eq!(summary.layers[0].output_shape, [32, 64, 32]);
        assert_eq!(summary.layers[8].name, "bottleneck");
        assert_eq!(summary.layers[8].output_shape, [512, 4, 2]);
        assert_eq!(summary.layers[12].name, "decoder3");
        assert_eq!(summary.layers[12].output_shape, [128, 16, 8]);
        assert_eq!(summary.layers[17].output_shape, [1, 64, 32]);
    }

    #[test]
    fn summary_params_add_up_to_model_total() {
        let device = Default::default();
        let model = UNetPsaConfig::new().init::<TestBackend>(&device).unwrap();
        let summary = ModelSummary::new(&model, [3, 16, 16]).unwrap();

        let rows: usize = summary.layers.iter().map(|layer| layer.params).sum();
        assert_eq!(rows, summary.total_params);
        assert!(summary
            .layers
            .iter()
            .filter(|layer| layer.name.starts_with("pool"))
            .all(|layer| layer.params == 0));

        // Transposed convolution 64 -> 32 with a 2x2 kernel and bias.
        let upconv1 = summary.layers.iter().find(|l| l.name == "upconv1").unwrap();
        assert_eq!(upconv1.params, 64 * 32 * 4 + 32);
    }

    #[test]
    fn summary_renders_a_table() {
        let device = Default::default();
        let model = UNetPsaConfig::new().init::<TestBackend>(&device).unwrap();
        let rendered = ModelSummary::new(&model, [3, 16, 16]).unwrap().to_string();

        assert!(rendered.contains("encoder1"));
        assert!(rendered.contains("[-1, 512, 1, 1]"));
        assert!(rendered.contains("Total params:"));
    }

    #[test]
    fn summary_rejects_unsupported_resolution() {
        let device = Default::default();
        let model = UNetPsaConfig::new().init::<TestBackend>(&device).unwrap();

        assert!(matches!(
            ModelSummary::new(&model, [3, 20, 16]),
            Err(UNetPsaError::InvalidTensorShape { .. })
        ));
    }
}
