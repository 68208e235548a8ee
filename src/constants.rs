// Default convolution settings, matching the usual ConvGRU formulation
pub const DEFAULT_STRIDE: usize = 1;
pub const DEFAULT_PADDING: usize = 0;
pub const DEFAULT_RECURRENT_KERNEL_SIZE: usize = 3;

// Number of gate blocks (update, reset, candidate) stacked on the channel axis
pub const GATE_COUNT: usize = 3;

// Initializer gains
pub const XAVIER_GAIN: f64 = 1.0;
pub const ORTHOGONAL_GAIN: f64 = 1.0;

// Training defaults
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_TRAINING_ITERATIONS: usize = 1000;
pub const DEFAULT_LOG_INTERVAL: usize = 100;

// Checkpoint paths
pub const CHECKPOINT_DIR: &str = "checkpoints";
pub const EXPERIMENT_DIR: &str = "experiments";
pub const MODEL_FILE_NAME: &str = "convgru_model";
