use candle_core::{Result, Tensor};
use rand::Rng;

pub trait EncoderModuleT {
    /// Evaluate latent Gaussian parameters of q(z|x)
    ///
    /// # Arguments
    /// * `x_nmm` - input images (n x m x m)
    ///
    /// # Returns `(z_mean_nd, z_lnvar_nd)`
    /// * `z_mean_nd` - posterior mean (n x d)
    /// * `z_lnvar_nd` - posterior log variance (n x d)
    fn latent_gaussian_params(&self, x_nmm: &Tensor) -> Result<(Tensor, Tensor)>;

    fn image_shape(&self) -> (usize, usize);

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out reconstruction logits
    ///
    /// * `z` - latent states (n x d) or (n x l x d)
    ///
    /// # Returns logits (n x m x m) or (n x l x m x m)
    fn forward(&self, z: &Tensor) -> Result<Tensor>;

    fn image_shape(&self) -> (usize, usize);

    fn dim_latent(&self) -> usize;
}

pub trait PriorModuleT {
    /// log p(z) for each sample
    ///
    /// * `z_nld` - latent samples (n x l x d)
    /// * `encoder` - the model's encoder (a prior may be defined through it)
    ///
    /// # Returns `log_p_nl` (n x l)
    fn log_prob<Enc>(&self, z_nld: &Tensor, encoder: &Enc) -> Result<Tensor>
    where
        Enc: EncoderModuleT;

    /// Draw `n` latent vectors from the prior as (n x 1 x d)
    fn sample<Enc, R>(&self, n: usize, encoder: &Enc, rng: &mut R) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
        R: Rng;

    fn dim_latent(&self) -> usize;
}

/// Output of a VAE forward pass
pub struct VaeOutput {
    /// mean-reduced reconstruction logits (n x m x m)
    pub recon_logits: Tensor,
    /// mean(log q(z|x)) - mean(log p(z)), a scalar
    pub regularization: Tensor,
    /// latent samples (n x l x d)
    pub z_nld: Tensor,
    pub z_mean: Tensor,
    pub z_lnvar: Tensor,
}

pub trait VaeModelT {
    /// Encode, sample `L` latents per input, decode and estimate the
    /// regularization term of the ELBO
    ///
    /// * `x_nmm` - binary images (n x m x m)
    /// * `rng` - random source for the reparameterization noise
    fn forward_t<R: Rng>(&self, x_nmm: &Tensor, rng: &mut R) -> Result<VaeOutput>;

    /// Decode `n` draws from the prior into logits (n x m x m)
    fn generate<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Tensor>;

    fn dim_latent(&self) -> usize;

    fn num_samples(&self) -> usize;

    fn image_shape(&self) -> (usize, usize);
}
