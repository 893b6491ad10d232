use candle_core::{Device, Tensor};
use rand::prelude::SliceRandom;
use rand::Rng;

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    /// Images of the `batch_idx`-th shuffled minibatch (b x m x m)
    fn minibatch_shuffled(&self, batch_idx: usize, target_device: &Device) -> anyhow::Result<Tensor>;

    /// Images of the `batch_idx`-th minibatch in the original order
    fn minibatch_ordered(
        &self,
        batch_idx: usize,
        batch_size: usize,
        target_device: &Device,
    ) -> anyhow::Result<Tensor>;

    fn num_minibatch(&self) -> usize;

    fn num_data(&self) -> usize;

    fn shuffle_minibatch<R: Rng>(&mut self, batch_size: usize, rng: &mut R) -> anyhow::Result<()>;
}

///
/// A simple data loader for an in-memory stack of images. The first
/// axis indexes samples.
///
pub struct InMemoryData {
    images: Tensor,
    minibatches: Minibatches,
}

struct Minibatches {
    samples: Vec<u32>,
    chunks: Vec<Vec<u32>>,
}

impl InMemoryData {
    ///
    /// Create a data loader from `images` (n x m x m), kept on CPU
    ///
    pub fn new(images: Tensor) -> anyhow::Result<Self> {
        if images.rank() != 3 {
            return Err(anyhow::anyhow!(
                "expected (n, m, m) images, got {:?}",
                images.dims()
            ));
        }
        let images = images.to_device(&Device::Cpu)?;
        let nn = images.dim(0)?;

        Ok(InMemoryData {
            images,
            minibatches: Minibatches {
                samples: (0..nn as u32).collect(),
                chunks: vec![],
            },
        })
    }

    ///
    /// Create a data loader from row-major pixel values
    ///
    /// * `pixels` - `n * rows * cols` values
    /// * `shape` - `(n, rows, cols)`
    ///
    pub fn from_pixels(pixels: Vec<f32>, shape: (usize, usize, usize)) -> anyhow::Result<Self> {
        Self::new(Tensor::from_vec(pixels, shape, &Device::Cpu)?)
    }

    fn select(&self, rows: &[u32], target_device: &Device) -> anyhow::Result<Tensor> {
        let idx = Tensor::from_slice(rows, rows.len(), &Device::Cpu)?;
        Ok(self.images.index_select(&idx, 0)?.to_device(target_device)?)
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_shuffled(&self, batch_idx: usize, target_device: &Device) -> anyhow::Result<Tensor> {
        let rows = self.minibatches.chunks.get(batch_idx).ok_or_else(|| {
            anyhow::anyhow!(
                "minibatch #{} out of {}; call shuffle_minibatch first",
                batch_idx,
                self.minibatches.chunks.len()
            )
        })?;
        self.select(rows, target_device)
    }

    fn minibatch_ordered(
        &self,
        batch_idx: usize,
        batch_size: usize,
        target_device: &Device,
    ) -> anyhow::Result<Tensor> {
        let nn = self.num_data();
        let lb = batch_idx * batch_size;
        let ub = ((batch_idx + 1) * batch_size).min(nn);
        if batch_size == 0 || lb >= nn {
            return Err(anyhow::anyhow!("empty minibatch #{}", batch_idx));
        }
        Ok(self.images.narrow(0, lb, ub - lb)?.to_device(target_device)?)
    }

    fn num_minibatch(&self) -> usize {
        self.minibatches.chunks.len()
    }

    fn num_data(&self) -> usize {
        self.minibatches.samples.len()
    }

    fn shuffle_minibatch<R: Rng>(&mut self, batch_size: usize, rng: &mut R) -> anyhow::Result<()> {
        if batch_size == 0 {
            return Err(anyhow::anyhow!("batch size should be positive"));
        }
        self.minibatches.samples.shuffle(rng);
        self.minibatches.chunks = self
            .minibatches
            .samples
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect();
        Ok(())
    }
}
