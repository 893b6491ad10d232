use crate::common_io::open_buf_reader;
use log::info;
use rayon::prelude::*;
use std::io::{Read, Write};
use std::path::Path;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";

/// magic number of an IDX file holding unsigned bytes in 3 dims
const IDX3_UBYTE_MAGIC: u32 = 0x0000_0803;

/// A stack of 8-bit grayscale images in row-major order
#[derive(Clone, Debug)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

/// train and test splits
pub struct MnistData {
    pub train: IdxImages,
    pub test: IdxImages,
}

fn read_be_u32<R: Read>(reader: &mut R) -> anyhow::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

///
/// Read an IDX image file (`idx3-ubyte`), gzipped or not
///
/// The header holds four big-endian `u32`: magic, count, rows, cols.
///
pub fn read_idx_images(file: &str) -> anyhow::Result<IdxImages> {
    let mut reader = open_buf_reader(file)?;

    let magic = read_be_u32(&mut reader)?;
    if magic != IDX3_UBYTE_MAGIC {
        anyhow::bail!("{}: not an idx3-ubyte file (magic {:#010x})", file, magic);
    }
    let count = read_be_u32(&mut reader)? as usize;
    let rows = read_be_u32(&mut reader)? as usize;
    let cols = read_be_u32(&mut reader)? as usize;

    let ntot = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| anyhow::anyhow!("{}: bad header {} x {} x {}", file, count, rows, cols))?;

    // grow with the payload rather than trusting the header
    let mut pixels = Vec::new();
    reader.take(ntot as u64).read_to_end(&mut pixels)?;
    if pixels.len() != ntot {
        anyhow::bail!(
            "{}: truncated image payload: {} of {} bytes",
            file,
            pixels.len(),
            ntot
        );
    }

    Ok(IdxImages {
        count,
        rows,
        cols,
        pixels,
    })
}

///
/// Write images in the `idx3-ubyte` layout (gzipped if `.gz`)
///
pub fn write_idx_images(images: &IdxImages, file: &str) -> anyhow::Result<()> {
    if images.pixels.len() != images.count * images.rows * images.cols {
        anyhow::bail!("pixel buffer does not match {} x {} x {}", images.count, images.rows, images.cols);
    }
    let mut writer = crate::common_io::open_buf_writer(file)?;
    for v in [
        IDX3_UBYTE_MAGIC,
        images.count as u32,
        images.rows as u32,
        images.cols as u32,
    ] {
        writer.write_all(&v.to_be_bytes())?;
    }
    writer.write_all(&images.pixels)?;
    writer.flush()?;
    Ok(())
}

/// `value / 255 > 0.5` as {0.0, 1.0}
pub fn binarize_pixels(pixels: &[u8]) -> Vec<f32> {
    pixels
        .par_iter()
        .map(|&v| if (v as f32) / 255. > 0.5 { 1.0 } else { 0.0 })
        .collect()
}

impl IdxImages {
    pub fn num_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// keep the first `n` images
    pub fn take(mut self, n: usize) -> Self {
        let n = n.min(self.count);
        self.pixels.truncate(n * self.num_pixels());
        self.count = n;
        self
    }

    /// binary pixel values of all images, row-major
    pub fn binarize(&self) -> Vec<f32> {
        binarize_pixels(&self.pixels)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.count, self.rows, self.cols)
    }
}

/// `{dir}/{stem}` or, failing that, `{dir}/{stem}.gz`
pub fn find_idx_file(dir: &str, stem: &str) -> anyhow::Result<String> {
    let plain = Path::new(dir).join(stem);
    let gz = Path::new(dir).join(format!("{}.gz", stem));
    let found = if plain.is_file() {
        plain
    } else if gz.is_file() {
        gz
    } else {
        anyhow::bail!("neither {} nor {} exists", plain.display(), gz.display());
    };
    found
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("invalid path under {}", dir))
}

///
/// Load MNIST train/test images from `dir`
///
pub fn load_mnist(dir: &str) -> anyhow::Result<MnistData> {
    let train_file = find_idx_file(dir, TRAIN_IMAGES)?;
    let test_file = find_idx_file(dir, TEST_IMAGES)?;

    let train = read_idx_images(&train_file)?;
    info!("Read {} training images of {}x{}", train.count, train.rows, train.cols);
    let test = read_idx_images(&test_file)?;
    info!("Read {} test images of {}x{}", test.count, test.rows, test.cols);

    if (train.rows, train.cols) != (test.rows, test.cols) {
        anyhow::bail!("train and test images differ in size");
    }

    Ok(MnistData { train, test })
}
