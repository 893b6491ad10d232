use crate::candle_aux_layers::StackLayers;
use crate::candle_model_traits::DecoderModuleT;
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

/////////////////////////////////////
// Bernoulli (logit) image decoder //
/////////////////////////////////////

pub struct BernoulliImageDecoder {
    n_rows: usize,
    n_cols: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    logits: Linear,
}

impl BernoulliImageDecoder {
    /// Will create a new decoder with the following parameters:
    /// * `dec.fc.{}.weight` where {} is the layer index
    /// * `dec.logits.weight`
    pub fn new(
        image_shape: (usize, usize),
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        let (n_rows, n_cols) = image_shape;
        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = n_latent;
        for (j, &next_dim) in layers.iter().enumerate() {
            let _name = format!("dec.fc.{}", j);
            fc.push_with_act(
                candle_nn::linear(prev_dim, next_dim, vs.pp(_name))?,
                Activation::Relu,
            );
            prev_dim = next_dim;
        }
        let logits = candle_nn::linear(prev_dim, n_rows * n_cols, vs.pp("dec.logits"))?;
        Ok(Self {
            n_rows,
            n_cols,
            n_latent,
            fc,
            logits,
        })
    }
}

impl DecoderModuleT for BernoulliImageDecoder {
    /// Flattens all leading axes of `z` into one batch and restores
    /// them on the way out: (.. x d) -> (.. x m x m)
    fn forward(&self, z: &Tensor) -> Result<Tensor> {
        let dims = z.dims();
        let rank = dims.len();
        if rank < 2 || dims[rank - 1] != self.n_latent {
            candle_core::bail!(
                "decoder expects (.., {}) latent input, got {:?}",
                self.n_latent,
                dims
            );
        }
        let lead = &dims[..rank - 1];
        let z_bd = z.reshape((lead.iter().product::<usize>(), self.n_latent))?;
        let logits_bp = self.logits.forward(&self.fc.forward(&z_bd)?)?;

        let mut out_shape = lead.to_vec();
        out_shape.push(self.n_rows);
        out_shape.push(self.n_cols);
        logits_bp.reshape(out_shape)
    }

    fn image_shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
