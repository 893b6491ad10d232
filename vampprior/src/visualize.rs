use crate::run_config::RunConfig;
use log::info;
use std::path::Path;
use vamp_candle::candle_core::Tensor;
use vamp_candle::candle_nn::ops;
use vamp_data::common_io::mkdir;
use vamp_data::image_grid::ImageGrid;

/// how many test digits and generations to show
pub const NUM_SHOW: usize = 5;

/// pixels per image value in saved files
const PNG_SCALE: usize = 4;

fn push_images(grid: &mut ImageGrid, images_nmm: &Tensor) -> anyhow::Result<()> {
    for img in images_nmm.to_vec3::<f32>()? {
        grid.push(img.concat())?;
    }
    Ok(())
}

/// Print to the terminal or save under `img_dir`
fn show_or_save(grid: &ImageGrid, title: &str, file_name: &str, config: &RunConfig) -> anyhow::Result<()> {
    if config.show_in_terminal {
        println!("{}\n\n{}", title, grid.to_ascii());
        return Ok(());
    }
    mkdir(&config.img_dir)?;
    let path = Path::new(config.img_dir.as_ref()).join(file_name);
    let path = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid image path"))?;
    grid.save(path, PNG_SCALE)?;
    info!("Saved {}", path);
    Ok(())
}

///
/// Originals on the top row, sigmoid(recon) right below
///
/// * `x_nmm` - test images (n x m x m)
/// * `recon_logits_nmm` - their reconstructions as logits
///
pub fn reconstructions(x_nmm: &Tensor, recon_logits_nmm: &Tensor, config: &RunConfig) -> anyhow::Result<()> {
    let (nn, rows, cols) = x_nmm.dims3()?;
    let mut grid = ImageGrid::new(rows, cols, nn);
    push_images(&mut grid, x_nmm)?;
    push_images(&mut grid, &ops::sigmoid(recon_logits_nmm)?)?;

    let name = config.model_name.as_str();
    show_or_save(
        &grid,
        &format!("Reconstruction for {}", name),
        &format!("{}-reconstructions.png", name),
        config,
    )
}

/// One row of generated digits, shown as sigmoid(logits)
pub fn generations(logits_nmm: &Tensor, config: &RunConfig) -> anyhow::Result<()> {
    let (nn, rows, cols) = logits_nmm.dims3()?;
    let mut grid = ImageGrid::new(rows, cols, nn);
    push_images(&mut grid, &ops::sigmoid(logits_nmm)?)?;

    let name = config.model_name.as_str();
    show_or_save(
        &grid,
        &format!("Generations for {}", name),
        &format!("{}-generations.png", name),
        config,
    )
}
