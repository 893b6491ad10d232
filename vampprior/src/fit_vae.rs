use crate::run_config::*;
use crate::visualize;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use vamp_candle::candle_core::{DType, Device};
use vamp_candle::candle_data_loader::{DataLoader, InMemoryData};
use vamp_candle::candle_decoder_bernoulli::BernoulliImageDecoder;
use vamp_candle::candle_encoder_gaussian::GaussianImageEncoder;
use vamp_candle::candle_inference::TrainConfig;
use vamp_candle::candle_model_traits::VaeModelT;
use vamp_candle::candle_nn::{VarBuilder, VarMap};
use vamp_candle::candle_prior::{StandardNormalPrior, VampPrior};
use vamp_candle::candle_vae_inference::{TrainScores, VaeTrainer};
use vamp_candle::candle_vae_model::Vae;
use vamp_data::common_io::{mkdir, write_types};
use vamp_data::mnist_io::load_mnist;

/// Load MNIST, build the model named in `config`, train it and
/// visualize reconstructions and generations
pub fn run(config: &RunConfig) -> anyhow::Result<()> {
    let device = config.device.to_device()?;
    info!("Using device: {:?}", device);

    let mut rng = StdRng::seed_from_u64(config.seed);

    let (mut train_data, test_data, (rows, cols)) = load_binary_mnist(config)?;

    let parameters = VarMap::new();
    let param_builder = VarBuilder::from_varmap(&parameters, DType::F32, &device);

    let dd = config.dim_latent;
    info!("Encoder layers: {:?}", config.encoder_layers);
    let enc = GaussianImageEncoder::new((rows, cols), dd, &config.encoder_layers, param_builder.clone())?;
    info!("Decoder layers: {:?}", config.decoder_layers);
    let dec = BernoulliImageDecoder::new((rows, cols), dd, &config.decoder_layers, param_builder.clone())?;

    match config.model_name {
        ModelName::Vae => {
            let prior = StandardNormalPrior::new(dd, &device);
            let vae = Vae::build(enc, dec, prior, config.num_samples)?;
            train_test_vae(&vae, &parameters, &mut train_data, &test_data, &device, config, &mut rng)
        }
        ModelName::Vamp => {
            info!("VampPrior with {} pseudo-inputs", config.num_pseudo_inputs);
            let prior = VampPrior::new(config.num_pseudo_inputs, (rows, cols), dd, param_builder.clone())?;
            let vae = Vae::build(enc, dec, prior, config.num_samples)?;
            train_test_vae(&vae, &parameters, &mut train_data, &test_data, &device, config, &mut rng)
        }
    }
}

/// Binarized train and test loaders, keeping the first `max_train`
/// training images if set, and the image size
fn load_binary_mnist(config: &RunConfig) -> anyhow::Result<(InMemoryData, InMemoryData, (usize, usize))> {
    let mnist = load_mnist(&config.data_dir)?;
    let train = match config.max_train {
        Some(n) => mnist.train.take(n),
        None => mnist.train,
    };
    let test = mnist.test;
    let (_, rows, cols) = train.shape();

    // each pixel becomes either 0 or 1
    let train_data = InMemoryData::from_pixels(train.binarize(), train.shape())?;
    let test_data = InMemoryData::from_pixels(test.binarize(), test.shape())?;
    info!(
        "{} training and {} test images of {}x{}",
        train_data.num_data(),
        test_data.num_data(),
        rows,
        cols
    );
    Ok((train_data, test_data, (rows, cols)))
}

fn train_test_vae<M>(
    model: &M,
    parameters: &VarMap,
    train_data: &mut InMemoryData,
    test_data: &InMemoryData,
    device: &Device,
    config: &RunConfig,
    rng: &mut StdRng,
) -> anyhow::Result<()>
where
    M: VaeModelT,
{
    let train_config = TrainConfig {
        learning_rate: config.learning_rate,
        batch_size: config.batch_size,
        num_epochs: config.num_epochs,
        device: device.clone(),
        verbose: config.verbose,
        show_progress: true,
    };
    let name = config.model_name.as_str();

    info!(
        "Start training {} (D = {}, L = {}) for {} epoch(s)...",
        name,
        model.dim_latent(),
        model.num_samples(),
        config.num_epochs
    );
    let mut trainer = VaeTrainer::build(model, parameters);
    let scores = trainer.train(train_data, &train_config, rng)?;

    if let (Some(recon), Some(reg)) = (scores.recon.last(), scores.regularization.last()) {
        info!("last epoch: reconstruction {}, regularization {}", recon, reg);
    }

    if let Some(dir) = config.trace_dir.as_ref() {
        write_trace(&scores, dir, name)?;
    }

    let test_scores = trainer.evaluate(test_data, &train_config, rng)?;
    info!(
        "test: reconstruction {}, regularization {}",
        test_scores.recon, test_scores.regularization
    );

    info!("Now testing reconstruction");
    let x_test = test_data.minibatch_ordered(0, visualize::NUM_SHOW, &train_config.device)?;
    let recon = model.forward_t(&x_test, rng)?.recon_logits;
    visualize::reconstructions(&x_test, &recon, config)?;

    info!("Now testing generation");
    let generated = model.generate(visualize::NUM_SHOW, rng)?;
    visualize::generations(&generated, config)?;

    Ok(())
}

/// `{dir}/{name}-train.tsv` with one line per epoch
fn write_trace(scores: &TrainScores, dir: &str, name: &str) -> anyhow::Result<()> {
    mkdir(dir)?;
    let mut lines = vec!["epoch\treconstruction\tregularization\ttotal".to_string()];
    for (e, total) in scores.total().iter().enumerate() {
        lines.push(format!(
            "{}\t{}\t{}\t{}",
            e + 1,
            scores.recon[e],
            scores.regularization[e],
            total
        ));
    }
    let file = Path::new(dir).join(format!("{}-train.tsv", name));
    let file = file
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid trace path"))?;
    write_types(&lines, file)?;
    info!("Saved the training trace to {}", file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vamp_data::mnist_io::{write_idx_images, IdxImages, TEST_IMAGES, TRAIN_IMAGES};

    const SIDE: usize = 6;

    fn write_toy_mnist(dir: &str, ntrain: usize, ntest: usize) -> anyhow::Result<()> {
        mkdir(dir)?;
        for (stem, count) in [(TRAIN_IMAGES, ntrain), (TEST_IMAGES, ntest)] {
            let images = IdxImages {
                count,
                rows: SIDE,
                cols: SIDE,
                pixels: (0..count * SIDE * SIDE)
                    .map(|i| if (i * 13 + i / SIDE) % 3 == 0 { 255 } else { 0 })
                    .collect(),
            };
            write_idx_images(&images, &format!("{}/{}.gz", dir, stem))?;
        }
        Ok(())
    }

    fn toy_config(model_name: ModelName, root: &str) -> RunConfig {
        RunConfig {
            model_name,
            num_pseudo_inputs: 3,
            dim_latent: 2,
            num_epochs: 2,
            batch_size: 4,
            num_samples: 2,
            learning_rate: 1e-3,
            encoder_layers: vec![8],
            decoder_layers: vec![8],
            data_dir: format!("{}/data", root).into(),
            max_train: Some(10),
            img_dir: format!("{}/img", root).into(),
            trace_dir: Some(format!("{}/log", root).into()),
            show_in_terminal: false,
            seed: 42,
            device: ComputeDevice::Cpu,
            verbose: false,
        }
    }

    #[test]
    fn run_writes_images_and_trace() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_str().unwrap();
        write_toy_mnist(&format!("{}/data", root), 12, 7)?;

        // 5 panels per row, each SIDE * 4 pixels plus a one-pixel gap
        let cell = SIDE * 4 + 1;

        for model_name in [ModelName::Vae, ModelName::Vamp] {
            let config = toy_config(model_name.clone(), root);
            config.validate()?;
            run(&config)?;

            let name = model_name.as_str();
            let recon = image::open(format!("{}/img/{}-reconstructions.png", root, name))?.to_luma8();
            assert_eq!(recon.width() as usize, 5 * cell + 1);
            assert_eq!(recon.height() as usize, 2 * cell + 1);

            let generated = image::open(format!("{}/img/{}-generations.png", root, name))?.to_luma8();
            assert_eq!(generated.width() as usize, 5 * cell + 1);
            assert_eq!(generated.height() as usize, cell + 1);

            let trace = std::fs::read_to_string(format!("{}/log/{}-train.tsv", root, name))?;
            let lines: Vec<&str> = trace.lines().collect();
            assert_eq!(lines.len(), 1 + config.num_epochs);
            assert!(lines[0].starts_with("epoch\t"));
            assert!(lines[2].starts_with("2\t"));
        }
        Ok(())
    }

    #[test]
    fn max_train_limits_training_set() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_str().unwrap();
        write_toy_mnist(&format!("{}/data", root), 12, 5)?;

        let mut config = toy_config(ModelName::Vae, root);
        config.max_train = Some(3);
        config.trace_dir = None;

        let (train_data, test_data, image_shape) = load_binary_mnist(&config)?;
        assert_eq!(train_data.num_data(), 3);
        assert_eq!(test_data.num_data(), 5);
        assert_eq!(image_shape, (SIDE, SIDE));

        // a training set smaller than one minibatch still runs
        run(&config)?;

        assert!(std::path::Path::new(&format!("{}/img/vae-generations.png", root)).is_file());
        assert!(!std::path::Path::new(&format!("{}/log", root)).exists());
        Ok(())
    }

    #[test]
    fn terminal_mode_writes_no_images() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_str().unwrap();
        write_toy_mnist(&format!("{}/data", root), 8, 5)?;

        let mut config = toy_config(ModelName::Vamp, root);
        config.show_in_terminal = true;
        config.trace_dir = None;
        run(&config)?;

        assert!(!std::path::Path::new(&format!("{}/img", root)).exists());
        Ok(())
    }

    #[test]
    fn missing_data_is_an_error() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_str().unwrap();
        assert!(run(&toy_config(ModelName::Vae, root)).is_err());
        Ok(())
    }
}
