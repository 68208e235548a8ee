pub mod constants;
pub mod convgru;
pub mod error;
pub mod util {
    pub mod initializers;
    pub mod model_logger;
}

/// Build-time information generated by `build.rs`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use convgru::{
    ConvGru1d, ConvGru1dCell, ConvGru1dCellConfig, ConvGru1dConfig, ConvGru2d, ConvGru2dCell,
    ConvGru2dCellConfig, ConvGru2dConfig, RecurrentCell, SequenceModel,
};
pub use error::ConvGruError;
