use candle_core::{Result, Tensor};

/// Average reconstructions over the Monte-Carlo axis
///
/// (n x l x m x m) -> (n x m x m)
pub fn mean_reduce(recon_nlmm: &Tensor) -> Result<Tensor> {
    if recon_nlmm.rank() != 4 {
        candle_core::bail!(
            "expected (n, l, m, m) reconstructions, got {:?}",
            recon_nlmm.dims()
        );
    }
    recon_nlmm.mean(1)
}
