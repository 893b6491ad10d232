pub mod common_io;
pub mod image_grid;
pub mod mnist_io;
