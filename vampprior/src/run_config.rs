use clap::ValueEnum;
use vamp_candle::candle_core::Device;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ModelName {
    Vae,
    Vamp,
}

impl ModelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::Vae => "vae",
            ModelName::Vamp => "vamp",
        }
    }
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

impl ComputeDevice {
    /// Fails right away if the requested accelerator is not there
    pub fn to_device(&self) -> anyhow::Result<Device> {
        Ok(match self {
            ComputeDevice::Metal => Device::new_metal(0)?,
            ComputeDevice::Cuda => Device::new_cuda(0)?,
            ComputeDevice::Cpu => Device::Cpu,
        })
    }
}

/// Everything one training run needs, fixed before it starts
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model_name: ModelName,
    pub num_pseudo_inputs: usize,
    pub dim_latent: usize,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub num_samples: usize,
    pub learning_rate: f32,
    pub encoder_layers: Vec<usize>,
    pub decoder_layers: Vec<usize>,
    pub data_dir: Box<str>,
    pub max_train: Option<usize>,
    pub img_dir: Box<str>,
    /// write the per-epoch trace here if set
    pub trace_dir: Option<Box<str>>,
    pub show_in_terminal: bool,
    pub seed: u64,
    pub device: ComputeDevice,
    pub verbose: bool,
}

impl RunConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dim_latent == 0 {
            anyhow::bail!("latent dimension D should be positive");
        }
        if self.num_samples == 0 {
            anyhow::bail!("need at least one Monte-Carlo sample (L >= 1)");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch size should be positive");
        }
        if self.model_name == ModelName::Vamp && self.num_pseudo_inputs == 0 {
            anyhow::bail!("VampPrior needs at least one pseudo-input");
        }
        if self.learning_rate <= 0. || !self.learning_rate.is_finite() {
            anyhow::bail!("invalid learning rate {}", self.learning_rate);
        }
        Ok(())
    }
}
