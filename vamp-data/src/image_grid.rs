use image::{GrayImage, Luma};

/// gray levels from blank to full ink
const ASCII_RAMP: &[u8] = b" .:-=+*#%@";

/// Square panels of intensities in [0, 1], laid out row by row
pub struct ImageGrid {
    height: usize,
    width: usize,
    ncol: usize,
    panels: Vec<Vec<f32>>,
}

impl ImageGrid {
    /// * `height`, `width` - size of every panel
    /// * `ncol` - panels per grid row
    pub fn new(height: usize, width: usize, ncol: usize) -> Self {
        Self {
            height,
            width,
            ncol: ncol.max(1),
            panels: vec![],
        }
    }

    /// Append a panel of `height * width` row-major intensities
    pub fn push(&mut self, panel: Vec<f32>) -> anyhow::Result<()> {
        if panel.len() != self.height * self.width {
            anyhow::bail!(
                "panel has {} values, expected {}x{}",
                panel.len(),
                self.height,
                self.width
            );
        }
        self.panels.push(panel);
        Ok(())
    }

    pub fn nrow(&self) -> usize {
        self.panels.len().div_ceil(self.ncol)
    }

    /// Rasterize with `scale` pixels per value and a one-pixel gap
    pub fn to_gray_image(&self, scale: usize) -> GrayImage {
        let scale = scale.max(1);
        let cell_h = self.height * scale + 1;
        let cell_w = self.width * scale + 1;
        let total_w = (self.ncol.min(self.panels.len().max(1)) * cell_w + 1) as u32;
        let total_h = (self.nrow().max(1) * cell_h + 1) as u32;

        let mut img = GrayImage::from_pixel(total_w, total_h, Luma([128u8]));

        for (k, panel) in self.panels.iter().enumerate() {
            let y0 = (k / self.ncol) * cell_h + 1;
            let x0 = (k % self.ncol) * cell_w + 1;
            for (i, row) in panel.chunks(self.width).enumerate() {
                for (j, &v) in row.iter().enumerate() {
                    let level = Luma([to_gray_level(v)]);
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let x = (x0 + j * scale + dx) as u32;
                            let y = (y0 + i * scale + dy) as u32;
                            img.put_pixel(x, y, level);
                        }
                    }
                }
            }
        }
        img
    }

    /// Save as an image file; the format follows the extension
    pub fn save(&self, file: &str, scale: usize) -> anyhow::Result<()> {
        self.to_gray_image(scale)
            .save(file)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", file, e))
    }

    /// Panels side by side as text, one grid row after another
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        for grid_row in self.panels.chunks(self.ncol) {
            for i in 0..self.height {
                let line: Vec<String> = grid_row
                    .iter()
                    .map(|panel| {
                        panel[i * self.width..(i + 1) * self.width]
                            .iter()
                            .map(|&v| ascii_level(v))
                            .collect::<String>()
                    })
                    .collect();
                out.push_str(&line.join(" | "));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

fn to_gray_level(v: f32) -> u8 {
    // ink is dark on a light background
    let v = if v.is_finite() { v.clamp(0., 1.) } else { 0. };
    (255. * (1. - v)).round() as u8
}

fn ascii_level(v: f32) -> char {
    let v = if v.is_finite() { v.clamp(0., 1.) } else { 0. };
    let k = (v * (ASCII_RAMP.len() - 1) as f32).round() as usize;
    ASCII_RAMP[k] as char
}
