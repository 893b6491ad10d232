use core::f64;

use candle_core::{Result, Tensor, D};

/// Added to the standard normal prior probability before taking the log
pub const PRIOR_PROB_EPSILON: f64 = 1e-18;

/// Log-density of a diagonal Gaussian, summed over `reduce_dim`
///
/// log N(x | mu, diag(exp(logvar)))
///   = sum_d -0.5 * (log(2 pi) + logvar(d) + (x(d) - mu(d))^2 / exp(logvar(d)))
///
/// * `x` - sample points, e.g. (n x l x d)
/// * `mu` - mean, broadcastable against `x`, e.g. (n x 1 x d)
/// * `logvar` - log variance, same shape as `mu`
/// * `reduce_dim` - the latent axis to sum over
///
pub fn log_normal_diag(x: &Tensor, mu: &Tensor, logvar: &Tensor, reduce_dim: usize) -> Result<Tensor> {
    let half_ln_2pi = 0.5 * (2. * f64::consts::PI).ln();
    let sq_dev = x.broadcast_sub(mu)?.sqr()?;
    sq_dev
        .broadcast_div(&logvar.exp()?)?
        .broadcast_add(logvar)?
        .affine(-0.5, -half_ln_2pi)?
        .sum(reduce_dim)
}

/// Log-density of the standard normal N(0, I), evaluated through the
/// probability so that a small `eps` keeps `log(0)` away
///
/// log( eps + N(z | 0, I) )
///
/// * `z` - samples, e.g. (n x l x d)
/// * `reduce_dim` - the latent axis to sum over
/// * `eps` - additive constant on the probability scale
///
pub fn standard_normal_log_prob(z: &Tensor, reduce_dim: usize, eps: f64) -> Result<Tensor> {
    let zero = z.zeros_like()?;
    let log_prob = log_normal_diag(z, &zero, &zero, reduce_dim)?;
    (log_prob.exp()? + eps)?.log()
}

/// log sum_i exp(x_i) along `dim`, shifted by the max
pub fn log_sum_exp(x: &Tensor, dim: usize) -> Result<Tensor> {
    let max_x = x.max_keepdim(dim)?;
    let sum_exp = x.broadcast_sub(&max_x)?.exp()?.sum_keepdim(dim)?;
    sum_exp.log()?.add(&max_x)?.squeeze(dim)
}

/// Elementwise binary cross entropy on logits
///
/// max(l, 0) - l * t + log(1 + exp(-|l|))
///
/// * `target` - observed binary data
/// * `logits` - reconstruction logits (same shape)
///
pub fn sigmoid_cross_entropy_with_logits(target: &Tensor, logits: &Tensor) -> Result<Tensor> {
    let softplus_neg_abs = (logits.abs()?.neg()?.exp()? + 1.)?.log()?;
    logits
        .relu()?
        .sub(&logits.mul(target)?)?
        .add(&softplus_neg_abs)
}

/// Bernoulli log-likelihood of binary images
///
/// llik(i) = sum_{r,c} x(i,r,c) * log p(i,r,c) + (1 - x(i,r,c)) * log(1 - p(i,r,c))
///
/// where p = sigmoid(logits)
///
/// * `x_nmm` - data tensor (n x m x m)
/// * `logits_nmm` - reconstruction logits (n x m x m)
///
pub fn bernoulli_logit_likelihood(x_nmm: &Tensor, logits_nmm: &Tensor) -> Result<Tensor> {
    sigmoid_cross_entropy_with_logits(x_nmm, logits_nmm)?
        .neg()?
        .flatten_from(1)?
        .sum(D::Minus1)
}

/// KL divergence between a diagonal Gaussian and N(0, I)
///
/// 0.5 * sum_d (exp(logvar) - 1 + mu^2 - logvar)
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_lnvar` - log variance of Gaussian distribution
///
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.sqr()? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    const LN_2PI: f64 = 1.8378770664093453;

    fn manual_log_normal(x: &[f64], mu: &[f64], lv: &[f64]) -> f64 {
        x.iter()
            .zip(mu)
            .zip(lv)
            .map(|((x, m), v)| -0.5 * (LN_2PI + v + (x - m).powi(2) / v.exp()))
            .sum()
    }

    fn check_log_normal(x: &[f64], mu: &[f64], lv: &[f64], expected: f64) -> Result<()> {
        let dev = Device::Cpu;
        let d = x.len();
        let xt = Tensor::from_slice(x, (1, d), &dev)?;
        let mt = Tensor::from_slice(mu, (1, d), &dev)?;
        let vt = Tensor::from_slice(lv, (1, d), &dev)?;
        let actual = log_normal_diag(&xt, &mt, &vt, 1)?.to_vec1::<f64>()?[0];
        approx::assert_abs_diff_eq!(actual, expected, epsilon = 1e-10);
        approx::assert_abs_diff_eq!(actual, manual_log_normal(x, mu, lv), epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn log_normal_one_dim() -> Result<()> {
        // -0.5 * (ln 2pi + 0 + 1) for a unit deviation under N(0, 1)
        check_log_normal(&[1.0], &[0.0], &[0.0], -0.5 * (LN_2PI + 1.0))
    }

    #[test]
    fn log_normal_two_dim() -> Result<()> {
        // d1: x=2, mu=1, var=e  => -0.5 (ln 2pi + 1 + 1/e)
        // d2: x=0, mu=0, var=1  => -0.5 ln 2pi
        let e = 1f64.exp();
        let expected = -0.5 * (LN_2PI + 1.0 + 1.0 / e) - 0.5 * LN_2PI;
        check_log_normal(&[2.0, 0.0], &[1.0, 0.0], &[1.0, 0.0], expected)
    }

    #[test]
    fn log_normal_five_dim() -> Result<()> {
        let x = [0.5, -1.0, 2.0, 0.0, 3.0];
        let mu = [0.0, -1.0, 1.0, 1.0, 0.0];
        let lv = [0.0, 2.0_f64.ln(), -1.0, 0.5, 1.0];
        let expected = -0.5 * (LN_2PI + 0.25)
            - 0.5 * (LN_2PI + 2.0_f64.ln())
            - 0.5 * (LN_2PI - 1.0 + 1.0 / (-1.0f64).exp())
            - 0.5 * (LN_2PI + 0.5 + 1.0 / 0.5f64.exp())
            - 0.5 * (LN_2PI + 1.0 + 9.0 / 1.0f64.exp());
        check_log_normal(&x, &mu, &lv, expected)
    }

    #[test]
    fn log_normal_at_mean() -> Result<()> {
        let dev = Device::Cpu;
        let mu = Tensor::new(&[[0.3f64, -2.0, 7.5, 1.0]], &dev)?;
        let lv = Tensor::new(&[[0.1f64, -0.7, 1.3, 0.0]], &dev)?;
        let actual = log_normal_diag(&mu, &mu, &lv, 1)?.to_vec1::<f64>()?[0];
        let expected = -0.5 * 4.0 * LN_2PI - 0.5 * (0.1 - 0.7 + 1.3 + 0.0);
        approx::assert_abs_diff_eq!(actual, expected, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn log_normal_broadcast_over_samples() -> Result<()> {
        let dev = Device::Cpu;
        let z = Tensor::new(&[[[0f32, 0.], [1., 1.], [2., -1.]]], &dev)?;
        let mu = Tensor::new(&[[0f32, 0.]], &dev)?.unsqueeze(1)?;
        let lv = Tensor::new(&[[0f32, 0.]], &dev)?.unsqueeze(1)?;
        let lp = log_normal_diag(&z, &mu, &lv, 2)?;
        assert_eq!(lp.dims(), &[1, 3]);
        let lp = lp.to_vec2::<f32>()?;
        approx::assert_abs_diff_eq!(lp[0][0] as f64, -LN_2PI, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(lp[0][1] as f64, -LN_2PI - 1.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(lp[0][2] as f64, -LN_2PI - 2.5, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn standard_normal_epsilon_floor() -> Result<()> {
        let dev = Device::Cpu;
        // far in the tail the probability underflows and eps takes over
        let z = Tensor::new(&[[100f64, 100.]], &dev)?;
        let lp = standard_normal_log_prob(&z, 1, PRIOR_PROB_EPSILON)?.to_vec1::<f64>()?[0];
        approx::assert_abs_diff_eq!(lp, PRIOR_PROB_EPSILON.ln(), epsilon = 1e-6);

        // near the mode eps is negligible
        let z = Tensor::new(&[[0.5f64, -0.5]], &dev)?;
        let lp = standard_normal_log_prob(&z, 1, PRIOR_PROB_EPSILON)?.to_vec1::<f64>()?[0];
        approx::assert_abs_diff_eq!(lp, -LN_2PI - 0.25, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn log_sum_exp_stable() -> Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::new(&[[1000f64, 1000.], [0., 3f64.ln()]], &dev)?;
        let out = log_sum_exp(&x, 1)?.to_vec1::<f64>()?;
        approx::assert_abs_diff_eq!(out[0], 1000. + 2f64.ln(), epsilon = 1e-9);
        approx::assert_abs_diff_eq!(out[1], 4f64.ln(), epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn cross_entropy_matches_naive() -> Result<()> {
        let dev = Device::Cpu;
        let logits = [-3.0f64, -0.5, 0.0, 0.5, 3.0];
        let target = [0.0f64, 1.0, 1.0, 0.0, 1.0];
        let ce = sigmoid_cross_entropy_with_logits(
            &Tensor::new(&target, &dev)?,
            &Tensor::new(&logits, &dev)?,
        )?
        .to_vec1::<f64>()?;
        for ((l, t), c) in logits.iter().zip(target.iter()).zip(ce.iter()) {
            let p = 1. / (1. + (-l).exp());
            let naive = -(t * p.ln() + (1. - t) * (1. - p).ln());
            approx::assert_abs_diff_eq!(*c, naive, epsilon = 1e-10);
        }
        Ok(())
    }

    #[test]
    fn bernoulli_llik_per_image() -> Result<()> {
        let dev = Device::Cpu;
        let x = Tensor::new(&[[[1f64, 0.], [0., 1.]]], &dev)?;
        let logits = Tensor::zeros((1, 2, 2), candle_core::DType::F64, &dev)?;
        let llik = bernoulli_logit_likelihood(&x, &logits)?.to_vec1::<f64>()?;
        assert_eq!(llik.len(), 1);
        approx::assert_abs_diff_eq!(llik[0], 4. * 0.5f64.ln(), epsilon = 1e-10);
        Ok(())
    }

    #[test]
    fn kl_zero_at_prior() -> Result<()> {
        let dev = Device::Cpu;
        let mu = Tensor::zeros((3, 4), candle_core::DType::F64, &dev)?;
        let kl = gaussian_kl_loss(&mu, &mu)?.to_vec1::<f64>()?;
        assert!(kl.iter().all(|k| k.abs() < 1e-12));
        Ok(())
    }
}
