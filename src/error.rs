use thiserror::Error;

/// Errors raised while building or running a ConvGRU.
///
/// Configuration problems are reported when a cell is built. Shape and
/// device problems are reported by the step that would have consumed the
/// mismatched tensor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvGruError {
    #[error("invalid configuration: `{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: usize },

    #[error(
        "recurrent kernel size must be odd to preserve spatial size, got {size} on axis {axis}"
    )]
    EvenRecurrentKernel { axis: usize, size: usize },

    #[error("input has {actual} channels but the cell expects {expected}")]
    InputChannelMismatch { expected: usize, actual: usize },

    #[error(
        "input size {size} on axis {axis} is smaller than kernel {kernel} with padding {padding}"
    )]
    InputTooSmall {
        axis: usize,
        size: usize,
        kernel: usize,
        padding: usize,
    },

    #[error("hidden state shape mismatch: expected {expected:?}, got {actual:?}")]
    HiddenShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("weight shape mismatch: expected {expected:?}, got {actual:?}")]
    WeightShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch { expected: String, actual: String },

    #[error("sequence has no time steps")]
    EmptySequence,

    #[error("parameter initialization failed: {0}")]
    Initialization(String),
}
