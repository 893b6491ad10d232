use candle_core::{Device, Result, Shape, Tensor};
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw i.i.d. N(0, 1) noise of `shape` from the given random source
pub fn standard_normal<S, R>(shape: S, rng: &mut R, device: &Device) -> Result<Tensor>
where
    S: Into<Shape>,
    R: Rng,
{
    let shape: Shape = shape.into();
    let noise: Vec<f32> = (0..shape.elem_count())
        .map(|_| rng.sample(StandardNormal))
        .collect();
    Tensor::from_vec(noise, shape, device)
}

///
/// z = mu + sigma * eps
/// where eps ~ N(0, 1)
///
/// # Arguments
/// * `z_mean_nd` - mean of Gaussian distribution (n x d)
/// * `z_lnvar_nd` - log variance of Gaussian distribution (n x d)
/// * `eps_nld` - standard normal noise (n x l x d)
///
/// # Returns `z_nld` (n x l x d)
pub fn reparameterize(z_mean_nd: &Tensor, z_lnvar_nd: &Tensor, eps_nld: &Tensor) -> Result<Tensor> {
    let sigma_n1d = (z_lnvar_nd * 0.5)?.exp()?.unsqueeze(1)?;
    z_mean_nd
        .unsqueeze(1)?
        .broadcast_add(&eps_nld.broadcast_mul(&sigma_n1d)?)
}

/// Reparameterized sampling layer: `num_samples` draws per input
#[derive(Clone, Copy, Debug)]
pub struct GaussianSampler {
    dim_latent: usize,
    num_samples: usize,
}

impl GaussianSampler {
    pub fn new(dim_latent: usize, num_samples: usize) -> Result<Self> {
        if num_samples < 1 {
            candle_core::bail!("need at least one Monte-Carlo sample");
        }
        Ok(Self {
            dim_latent,
            num_samples,
        })
    }

    /// Draw `z_nld` with fresh noise from `rng`
    ///
    /// * `z_mean_nd` - posterior mean (n x d)
    /// * `z_lnvar_nd` - posterior log variance (n x d)
    pub fn sample<R: Rng>(&self, z_mean_nd: &Tensor, z_lnvar_nd: &Tensor, rng: &mut R) -> Result<Tensor> {
        let (nn, dd) = z_mean_nd.dims2()?;
        if dd != self.dim_latent {
            candle_core::bail!("expected latent dim {}, got {}", self.dim_latent, dd);
        }
        let eps_nld = standard_normal((nn, self.num_samples, dd), rng, z_mean_nd.device())?
            .to_dtype(z_mean_nd.dtype())?;
        reparameterize(z_mean_nd, z_lnvar_nd, &eps_nld)
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn dim_latent(&self) -> usize {
        self.dim_latent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_noise_returns_mean() -> Result<()> {
        let dev = Device::Cpu;
        let mu = Tensor::new(&[[0.5f32, -1.5, 2.0], [3.0, 0.0, -0.25]], &dev)?;
        let lv = Tensor::new(&[[0.3f32, -2.0, 1.0], [0.0, 4.0, -1.0]], &dev)?;
        let eps = Tensor::zeros((2, 4, 3), candle_core::DType::F32, &dev)?;
        let z = reparameterize(&mu, &lv, &eps)?;
        assert_eq!(z.dims(), &[2, 4, 3]);

        let expected = mu.unsqueeze(1)?.broadcast_as((2, 4, 3))?.contiguous()?;
        assert_eq!(z.to_vec3::<f32>()?, expected.to_vec3::<f32>()?);
        Ok(())
    }

    #[test]
    fn sample_moments_converge() -> Result<()> {
        let dev = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(7);
        let mu = Tensor::new(&[[1.0f32, -2.0]], &dev)?;
        let lv = Tensor::new(&[[0.0f32, 4f32.ln()]], &dev)?;

        let sampler = GaussianSampler::new(2, 20_000)?;
        let z = sampler.sample(&mu, &lv, &mut rng)?.squeeze(0)?;

        let mean = z.mean(0)?.to_vec1::<f32>()?;
        let var = z
            .broadcast_sub(&z.mean_keepdim(0)?)?
            .sqr()?
            .mean(0)?
            .to_vec1::<f32>()?;

        approx::assert_abs_diff_eq!(mean[0], 1.0, epsilon = 0.05);
        approx::assert_abs_diff_eq!(mean[1], -2.0, epsilon = 0.1);
        approx::assert_abs_diff_eq!(var[0], 1.0, epsilon = 0.05);
        approx::assert_abs_diff_eq!(var[1], 4.0, epsilon = 0.2);
        Ok(())
    }

    #[test]
    fn same_seed_same_draws() -> Result<()> {
        let dev = Device::Cpu;
        let a = standard_normal((3, 5), &mut StdRng::seed_from_u64(11), &dev)?;
        let b = standard_normal((3, 5), &mut StdRng::seed_from_u64(11), &dev)?;
        assert_eq!(a.to_vec2::<f32>()?, b.to_vec2::<f32>()?);
        Ok(())
    }

    #[test]
    fn fresh_noise_per_call() -> Result<()> {
        let dev = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(3);
        let mu = Tensor::zeros((2, 3), candle_core::DType::F32, &dev)?;
        let sampler = GaussianSampler::new(3, 1)?;
        let z1 = sampler.sample(&mu, &mu, &mut rng)?.to_vec3::<f32>()?;
        let z2 = sampler.sample(&mu, &mu, &mut rng)?.to_vec3::<f32>()?;
        assert_ne!(z1, z2);
        Ok(())
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(GaussianSampler::new(4, 0).is_err());
    }
}
