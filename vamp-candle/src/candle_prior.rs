use crate::candle_loss_functions::*;
use crate::candle_model_traits::*;
use crate::candle_sampling::{reparameterize, standard_normal};
use candle_core::{Device, Result, Tensor};
use candle_nn::VarBuilder;
use rand::Rng;

///////////////////////////
// Standard normal prior //
///////////////////////////

/// p(z) = N(0, I), evaluated as log(eps + p(z))
#[derive(Clone, Debug)]
pub struct StandardNormalPrior {
    n_latent: usize,
    eps: f64,
    device: Device,
}

impl StandardNormalPrior {
    pub fn new(n_latent: usize, device: &Device) -> Self {
        Self::with_eps(n_latent, PRIOR_PROB_EPSILON, device)
    }

    pub fn with_eps(n_latent: usize, eps: f64, device: &Device) -> Self {
        Self {
            n_latent,
            eps,
            device: device.clone(),
        }
    }
}

impl PriorModuleT for StandardNormalPrior {
    fn log_prob<Enc>(&self, z_nld: &Tensor, _encoder: &Enc) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
    {
        standard_normal_log_prob(z_nld, 2, self.eps)
    }

    fn sample<Enc, R>(&self, n: usize, _encoder: &Enc, rng: &mut R) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
        R: Rng,
    {
        standard_normal((n, 1, self.n_latent), rng, &self.device)
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

////////////////////////////////////////
// Variational mixture of posteriors //
////////////////////////////////////////

/// p(z) = (1/C) sum_c q(z | u_c) over learned pseudo-inputs u_c
pub struct VampPrior {
    n_latent: usize,
    n_components: usize,
    raw_inputs_cmm: Tensor,
}

impl VampPrior {
    /// Will create `prior.pseudo_inputs` (c x m x m), initialized
    /// around 0.05 as in sparse binary images
    ///
    /// * `n_components` - number of pseudo-inputs C
    /// * `image_shape` - (rows, cols) of each pseudo-input
    /// * `n_latent` - latent dimension D
    /// * `vs` - variable builder
    pub fn new(
        n_components: usize,
        image_shape: (usize, usize),
        n_latent: usize,
        vs: VarBuilder,
    ) -> Result<Self> {
        if n_components < 1 {
            candle_core::bail!("VampPrior needs at least one pseudo-input");
        }
        let (rr, cc) = image_shape;
        let init = candle_nn::Init::Randn {
            mean: 0.05,
            stdev: 0.01,
        };
        let raw_inputs_cmm =
            vs.get_with_hints((n_components, rr, cc), "prior.pseudo_inputs", init)?;

        Ok(Self {
            n_latent,
            n_components,
            raw_inputs_cmm,
        })
    }

    /// Pseudo-inputs after hard-tanh onto [0, 1] (c x m x m)
    pub fn pseudo_inputs(&self) -> Result<Tensor> {
        self.raw_inputs_cmm.clamp(0.0, 1.0)
    }

    pub fn num_components(&self) -> usize {
        self.n_components
    }

    /// Per-component log q(z | u_c) (n x l x c)
    pub fn component_log_prob<Enc>(&self, z_nld: &Tensor, encoder: &Enc) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
    {
        let (mu_cd, lnvar_cd) = encoder.latent_gaussian_params(&self.pseudo_inputs()?)?;
        let mu_11cd = mu_cd.unsqueeze(0)?.unsqueeze(0)?;
        let lnvar_11cd = lnvar_cd.unsqueeze(0)?.unsqueeze(0)?;
        log_normal_diag(&z_nld.unsqueeze(2)?, &mu_11cd, &lnvar_11cd, 3)
    }
}

impl PriorModuleT for VampPrior {
    /// log (1/C) sum_c q(z|u_c), in log space
    fn log_prob<Enc>(&self, z_nld: &Tensor, encoder: &Enc) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
    {
        let log_q_nlc = self.component_log_prob(z_nld, encoder)?;
        let log_c = (self.n_components as f64).ln();
        log_sum_exp(&log_q_nlc, 2)?.affine(1., -log_c)
    }

    /// pick a pseudo-input uniformly and draw from its posterior
    fn sample<Enc, R>(&self, n: usize, encoder: &Enc, rng: &mut R) -> Result<Tensor>
    where
        Enc: EncoderModuleT,
        R: Rng,
    {
        let device = self.raw_inputs_cmm.device();
        let picked: Vec<u32> = (0..n)
            .map(|_| rng.random_range(0..self.n_components) as u32)
            .collect();
        let picked = Tensor::from_vec(picked, n, device)?;

        let u_nmm = self.pseudo_inputs()?.index_select(&picked, 0)?;
        let (mu_nd, lnvar_nd) = encoder.latent_gaussian_params(&u_nmm)?;
        let eps_n1d = standard_normal((n, 1, self.n_latent), rng, device)?.to_dtype(mu_nd.dtype())?;
        reparameterize(&mu_nd, &lnvar_nd, &eps_n1d)
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
