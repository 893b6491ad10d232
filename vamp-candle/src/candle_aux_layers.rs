use candle_core::{Result, Tensor};
use candle_nn::{Activation, Module};

/// build a stack of alternating `M` and `A` layers
pub struct StackLayers<M>
where
    M: Module,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Activation>,
}

impl<M> Module for StackLayers<M>
where
    M: Module,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = activation.forward(&module.forward(&x)?)?;
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: Module,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(activation);
    }
}

impl<M> Default for StackLayers<M>
where
    M: Module,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{Linear, VarBuilder, VarMap};

    #[test]
    fn relu_stack_shapes_and_sign() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vs = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let mut fc = StackLayers::<Linear>::new();
        let mut prev_dim = 6;
        for (j, &next_dim) in [5, 3].iter().enumerate() {
            fc.push_with_act(
                candle_nn::linear(prev_dim, next_dim, vs.pp(format!("fc.{}", j)))?,
                Activation::Relu,
            );
            prev_dim = next_dim;
        }

        let x = Tensor::randn(0f32, 1., (4, 6), &dev)?;
        let h = fc.forward(&x)?;
        assert_eq!(h.dims(), &[4, 3]);
        assert!(h.flatten_all()?.to_vec1::<f32>()?.iter().all(|&v| v >= 0.));

        // an empty stack passes the input through
        let empty = StackLayers::<Linear>::default();
        assert_eq!(empty.forward(&x)?.to_vec2::<f32>()?, x.to_vec2::<f32>()?);
        Ok(())
    }
}
