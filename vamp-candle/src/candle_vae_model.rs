use crate::candle_loss_functions::log_normal_diag;
use crate::candle_mean_reducer::mean_reduce;
use crate::candle_model_traits::*;
use crate::candle_prior::{StandardNormalPrior, VampPrior};
use crate::candle_sampling::GaussianSampler;

use candle_core::{Result, Tensor};
use rand::Rng;

/// encoder -> reparameterized sampling -> decoder, with a prior `P`
/// defining the regularization term
pub struct Vae<Enc, Dec, P>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
    P: PriorModuleT,
{
    pub encoder: Enc,
    pub decoder: Dec,
    pub prior: P,
    sampler: GaussianSampler,
}

/// VAE with the standard normal prior
pub type StandardVae<Enc, Dec> = Vae<Enc, Dec, StandardNormalPrior>;

/// VAE with the variational mixture of posteriors prior
pub type VampVae<Enc, Dec> = Vae<Enc, Dec, VampPrior>;

impl<Enc, Dec, P> Vae<Enc, Dec, P>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
    P: PriorModuleT,
{
    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    /// * `prior` - prior module
    /// * `num_samples` - Monte-Carlo samples L per input
    pub fn build(encoder: Enc, decoder: Dec, prior: P, num_samples: usize) -> Result<Self> {
        if encoder.dim_latent() != decoder.dim_latent() || encoder.dim_latent() != prior.dim_latent() {
            candle_core::bail!(
                "latent dims disagree: encoder {}, decoder {}, prior {}",
                encoder.dim_latent(),
                decoder.dim_latent(),
                prior.dim_latent()
            );
        }
        if encoder.image_shape() != decoder.image_shape() {
            candle_core::bail!(
                "image shapes disagree: encoder {:?}, decoder {:?}",
                encoder.image_shape(),
                decoder.image_shape()
            );
        }
        let sampler = GaussianSampler::new(encoder.dim_latent(), num_samples)?;
        Ok(Self {
            encoder,
            decoder,
            prior,
            sampler,
        })
    }

    /// mean(log q(z|x)) - mean(log p(z)) over all (n, l) samples
    ///
    /// * `z_nld` - latent samples (n x l x d)
    /// * `z_mean_nd`, `z_lnvar_nd` - posterior parameters (n x d)
    pub fn regularization(&self, z_nld: &Tensor, z_mean_nd: &Tensor, z_lnvar_nd: &Tensor) -> Result<Tensor> {
        let log_q_nl = log_normal_diag(z_nld, &z_mean_nd.unsqueeze(1)?, &z_lnvar_nd.unsqueeze(1)?, 2)?;
        let log_p_nl = self.prior.log_prob(z_nld, &self.encoder)?;
        log_q_nl.mean_all()?.sub(&log_p_nl.mean_all()?)
    }
}

impl<Enc, Dec, P> VaeModelT for Vae<Enc, Dec, P>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
    P: PriorModuleT,
{
    fn forward_t<R: Rng>(&self, x_nmm: &Tensor, rng: &mut R) -> Result<VaeOutput> {
        let (z_mean, z_lnvar) = self.encoder.latent_gaussian_params(x_nmm)?;
        let z_nld = self.sampler.sample(&z_mean, &z_lnvar, rng)?;

        let regularization = self.regularization(&z_nld, &z_mean, &z_lnvar)?;

        let recon_nlmm = self.decoder.forward(&z_nld)?;
        let recon_logits = mean_reduce(&recon_nlmm)?;

        Ok(VaeOutput {
            recon_logits,
            regularization,
            z_nld,
            z_mean,
            z_lnvar,
        })
    }

    fn generate<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Tensor> {
        let z_n1d = self.prior.sample(n, &self.encoder, rng)?;
        // (n x 1 x m x m), so the reducer only drops the sample axis
        mean_reduce(&self.decoder.forward(&z_n1d)?)
    }

    fn dim_latent(&self) -> usize {
        self.sampler.dim_latent()
    }

    fn num_samples(&self) -> usize {
        self.sampler.num_samples()
    }

    fn image_shape(&self) -> (usize, usize) {
        self.encoder.image_shape()
    }
}
