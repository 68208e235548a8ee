/// # ConvGRU Implementation Module
///
/// Convolutional Gated Recurrent Units for sequences of spatially structured
/// frames: 1-D frames shaped [batch, channels, length] and 2-D frames shaped
/// [batch, channels, height, width].
///
/// ## Module Structure:
///
/// 1. **step_1_shape_inference**: Output-size formula and configuration / hidden-state checks
/// 2. **step_2_convgru_cell**: The gated single-step update, shared by the 1-D and 2-D cells
/// 3. **step_3_convgru_sequence**: Time-step scan over a whole sequence
/// 4. **step_4_train_model**: Adam training loop and MSE evaluation
/// 5. **step_5_model_serialization**: Checkpoint saving and loading
///
pub mod step_1_shape_inference;
pub mod step_2_convgru_cell;
pub mod step_3_convgru_sequence;
pub mod step_4_train_model;
pub mod step_5_model_serialization;

pub use step_2_convgru_cell::{
    ConvGru1dCell, ConvGru1dCellConfig, ConvGru2dCell, ConvGru2dCellConfig, RecurrentCell,
};
pub use step_3_convgru_sequence::{
    ConvGru1d, ConvGru1dConfig, ConvGru2d, ConvGru2dConfig, SequenceModel,
};
