use crate::candle_data_loader::*;
use crate::candle_inference::TrainConfig;
use crate::candle_loss_functions::sigmoid_cross_entropy_with_logits;
use crate::candle_model_traits::*;

use candle_core::{Result, Tensor};
use candle_nn::AdamW;
use candle_nn::Optimizer;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use rand::Rng;

/// Per-epoch averages of the two loss terms, each minibatch weighted
/// by its number of images
#[derive(Clone, Debug, Default)]
pub struct TrainScores {
    pub recon: Vec<f32>,
    pub regularization: Vec<f32>,
}

impl TrainScores {
    pub fn total(&self) -> Vec<f32> {
        self.recon
            .iter()
            .zip(self.regularization.iter())
            .map(|(r, k)| r + k)
            .collect()
    }

    pub fn num_epochs(&self) -> usize {
        self.recon.len()
    }
}

/// Loss terms of one pass over data without updates
#[derive(Clone, Copy, Debug)]
pub struct EvalScores {
    pub recon: f32,
    pub regularization: f32,
}

/// Reconstruction term as compiled for training: pixel-wise cross
/// entropy on logits, averaged over every pixel of the minibatch
pub fn reconstruction_loss(x_nmm: &Tensor, recon_logits_nmm: &Tensor) -> Result<Tensor> {
    sigmoid_cross_entropy_with_logits(x_nmm, recon_logits_nmm)?.mean_all()
}

pub struct VaeTrainer<'a, M>
where
    M: VaeModelT,
{
    pub model: &'a M,
    pub variable_map: &'a candle_nn::VarMap,
}

impl<'a, M> VaeTrainer<'a, M>
where
    M: VaeModelT,
{
    /// Build a trainer
    /// * `model` - VAE model whose parameters live in `variable_map`
    /// * `variable_map` - all trainable variables
    pub fn build(model: &'a M, variable_map: &'a candle_nn::VarMap) -> Self {
        Self {
            model,
            variable_map,
        }
    }

    /// Train the VAE model
    /// * `data` - data loader, reshuffled every epoch
    /// * `train_config` - training configuration
    /// * `rng` - random source for shuffling and sampling
    pub fn train<DataL, R>(
        &mut self,
        data: &mut DataL,
        train_config: &TrainConfig,
        rng: &mut R,
    ) -> anyhow::Result<TrainScores>
    where
        DataL: DataLoader,
        R: Rng,
    {
        let device = &train_config.device;
        let mut adam = AdamW::new_lr(
            self.variable_map.all_vars(),
            train_config.learning_rate.into(),
        )?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut scores = TrainScores::default();

        for epoch in 0..train_config.num_epochs {
            data.shuffle_minibatch(train_config.batch_size, rng)?;
            let num_minibatches = data.num_minibatch();

            let mut recon_tot = 0f32;
            let mut reg_tot = 0f32;
            let mut ntot = 0usize;

            for b in 0..num_minibatches {
                let x_nmm = data.minibatch_shuffled(b, device)?;
                let nb = x_nmm.dim(0)?;

                let out = self.model.forward_t(&x_nmm, rng)?;
                let recon = reconstruction_loss(&x_nmm, &out.recon_logits)?;
                let loss = recon.add(&out.regularization)?;
                adam.backward_step(&loss)?;

                recon_tot += recon.to_scalar::<f32>()? * nb as f32;
                reg_tot += out.regularization.to_scalar::<f32>()? * nb as f32;
                ntot += nb;
            }

            let denom = ntot.max(1) as f32;
            scores.recon.push(recon_tot / denom);
            scores.regularization.push(reg_tot / denom);
            pb.inc(1);

            if train_config.verbose {
                info!(
                    "[{}] reconstruction: {}, regularization: {}",
                    epoch + 1,
                    recon_tot / denom,
                    reg_tot / denom,
                );
            }
        } // each epoch

        pb.finish_and_clear();
        Ok(scores)
    }

    /// Evaluate both loss terms on `data` in its original order,
    /// averaged over images
    pub fn evaluate<DataL, R>(
        &self,
        data: &DataL,
        train_config: &TrainConfig,
        rng: &mut R,
    ) -> anyhow::Result<EvalScores>
    where
        DataL: DataLoader,
        R: Rng,
    {
        let device = &train_config.device;
        let batch_size = train_config.batch_size;
        if batch_size == 0 {
            anyhow::bail!("batch size should be positive");
        }
        let num_minibatches = data.num_data().div_ceil(batch_size);

        let mut recon_tot = 0f32;
        let mut reg_tot = 0f32;
        let mut ntot = 0usize;

        for b in 0..num_minibatches {
            let x_nmm = data.minibatch_ordered(b, batch_size, device)?;
            let nb = x_nmm.dim(0)?;
            let out = self.model.forward_t(&x_nmm, rng)?;
            let recon = reconstruction_loss(&x_nmm, &out.recon_logits)?.to_scalar::<f32>()?;
            recon_tot += recon * nb as f32;
            reg_tot += out.regularization.to_scalar::<f32>()? * nb as f32;
            ntot += nb;
        }

        let denom = ntot.max(1) as f32;
        Ok(EvalScores {
            recon: recon_tot / denom,
            regularization: reg_tot / denom,
        })
    }
}
