pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub device: candle_core::Device,
    pub verbose: bool,
    pub show_progress: bool,
}

impl TrainConfig {
    pub fn new(device: candle_core::Device) -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 100,
            num_epochs: 1,
            device,
            verbose: false,
            show_progress: true,
        }
    }
}
