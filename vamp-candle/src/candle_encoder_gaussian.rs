use crate::candle_aux_layers::StackLayers;
use crate::candle_model_traits::EncoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

/// Dense encoder of binary images into a diagonal Gaussian q(z|x)
pub struct GaussianImageEncoder {
    n_rows: usize,
    n_cols: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    z_mean: Linear,
    z_lnvar: Linear,
}

impl EncoderModuleT for GaussianImageEncoder {
    fn latent_gaussian_params(&self, x_nmm: &Tensor) -> Result<(Tensor, Tensor)> {
        let (_, rr, cc) = x_nmm.dims3()?;
        if (rr, cc) != (self.n_rows, self.n_cols) {
            candle_core::bail!(
                "encoder expects {}x{} images, got {}x{}",
                self.n_rows,
                self.n_cols,
                rr,
                cc
            );
        }
        let h_nl = self.fc.forward(&x_nmm.flatten_from(1)?)?;
        let z_mean_nd = self.z_mean.forward(&h_nl)?;
        let z_lnvar_nd = self.z_lnvar.forward(&h_nl)?;
        Ok((z_mean_nd, z_lnvar_nd))
    }

    fn image_shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl GaussianImageEncoder {
    /// Will create a new encoder module with these variables:
    ///
    /// * `enc.fc.{}.weight` where {} is the layer index
    /// * `enc.z.mean.weight`
    /// * `enc.z.lnvar.weight`
    ///
    /// # Arguments
    /// * `image_shape` - (rows, cols) of each image
    /// * `n_latent` - latent dimension D
    /// * `layers` - fully connected layers, each with the dim
    /// * `vs` - variable builder
    pub fn new(
        image_shape: (usize, usize),
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        let (n_rows, n_cols) = image_shape;

        // (1) pixels -> fc
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_rows * n_cols;
        for (j, &next_dim) in layers.iter().enumerate() {
            let _name = format!("enc.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, next_dim, vs.pp(_name))?,
                Activation::Relu,
            );
            prev_dim = next_dim;
        }

        // (2) fc -> D
        let z_mean = candle_nn::linear(prev_dim, n_latent, vs.pp("enc.z.mean"))?;
        let z_lnvar = candle_nn::linear(prev_dim, n_latent, vs.pp("enc.z.lnvar"))?;

        Ok(Self {
            n_rows,
            n_cols,
            n_latent,
            fc,
            z_mean,
            z_lnvar,
        })
    }
}
