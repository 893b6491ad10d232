mod fit_vae;
mod run_config;
mod visualize;

use clap::Parser;
use log::info;
use run_config::*;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
///
/// Train a variational autoencoder on binarized MNIST digits with
/// either the standard normal prior (`vae`) or the variational
/// mixture of posteriors prior (`vamp`), then write reconstructions
/// of test digits and fresh generations.
///
struct VampArgs {
    /// Model name: `vae` (standard normal prior) or `vamp` (VampPrior)
    #[arg(long, short = 'm', value_enum, default_value = "vae")]
    model_name: ModelName,

    /// Number of pseudo-inputs with the VampPrior
    #[arg(long = "pseudo-inputs", short = 'C', default_value_t = 300)]
    pseudo_inputs: usize,

    /// Number of stochastic hidden units, i.e., the size of z
    #[arg(short = 'D', long = "latent-dim", default_value_t = 40)]
    latent_dim: usize,

    /// Number of epochs
    #[arg(long, short = 'e', default_value_t = 1)]
    epochs: usize,

    /// Size of training minibatch
    #[arg(long, short = 'b', default_value_t = 100)]
    batch_size: usize,

    /// Number of Monte-Carlo samples per input
    #[arg(short = 'L', long = "mc-samples", default_value_t = 1)]
    mc_samples: usize,

    /// Learning rate
    #[arg(long, short = 'l', default_value_t = 1e-3)]
    learning_rate: f32,

    /// Encoder layers
    #[arg(long, value_delimiter(','), default_values_t = vec![300, 300])]
    encoder_layers: Vec<usize>,

    /// Decoder layers
    #[arg(long, value_delimiter(','), default_values_t = vec![300, 300])]
    decoder_layers: Vec<usize>,

    /// Directory with `train-images-idx3-ubyte` and
    /// `t10k-images-idx3-ubyte` (optionally `.gz`)
    #[arg(long, default_value = "data")]
    data_dir: Box<str>,

    /// Use only the first `N` training images
    #[arg(long)]
    max_train: Option<usize>,

    /// Directory for reconstruction and generation images
    #[arg(long, default_value = "img")]
    img_dir: Box<str>,

    /// Save the per-epoch training trace under `--log-dir`
    #[arg(long = "tensorboard", short = 't')]
    tb: bool,

    /// Directory for the training trace
    #[arg(long, default_value = ".")]
    log_dir: Box<str>,

    /// Show images in the terminal instead of saving them
    #[arg(long, short = 'd')]
    debug: bool,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Candle device
    #[arg(long, value_enum, default_value = "cpu")]
    device: ComputeDevice,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

impl VampArgs {
    fn to_run_config(&self) -> anyhow::Result<RunConfig> {
        let config = RunConfig {
            model_name: self.model_name.clone(),
            num_pseudo_inputs: self.pseudo_inputs,
            dim_latent: self.latent_dim,
            num_epochs: self.epochs,
            batch_size: self.batch_size,
            num_samples: self.mc_samples,
            learning_rate: self.learning_rate,
            encoder_layers: self.encoder_layers.clone(),
            decoder_layers: self.decoder_layers.clone(),
            data_dir: self.data_dir.clone(),
            max_train: self.max_train,
            img_dir: self.img_dir.clone(),
            trace_dir: self.tb.then(|| self.log_dir.clone()),
            show_in_terminal: self.debug,
            seed: self.seed,
            device: self.device.clone(),
            verbose: self.verbose,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = VampArgs::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = args.to_run_config()?;
    info!("{:?}", config);

    fit_vae::run(&config)?;

    info!("Done");
    Ok(())
}
