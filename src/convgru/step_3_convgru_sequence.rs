// External imports
use burn::config::Config;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use log::{debug, trace};

// Internal imports
use super::step_2_convgru_cell::{
    ConvGru1dCell, ConvGru1dCellConfig, ConvGru2dCell, ConvGru2dCellConfig, RecurrentCell,
};
use crate::error::ConvGruError;

/// Applies `cell` to every frame of a sequence, carrying the hidden state
/// forward.
///
/// `D` is the rank of one frame and `DT = D + 1` the rank of the sequence.
/// Time-major sequences are shaped [time, batch, channels, spatial...];
/// with `batch_first` the layout is [batch, channels, time, spatial...] and
/// the output comes back in that same layout.
///
/// # Returns
///
/// The stacked hidden states (one per time step) and the final hidden state.
/// The first failing step aborts the scan and its error is returned.
pub fn scan<B, C, const D: usize, const DT: usize>(
    cell: &C,
    sequence: Tensor<B, DT>,
    initial_hidden: Option<Tensor<B, D>>,
    batch_first: bool,
) -> Result<(Tensor<B, DT>, Tensor<B, D>), ConvGruError>
where
    B: Backend,
    C: RecurrentCell<B, D>,
{
    debug_assert_eq!(DT, D + 1, "sequence rank must be frame rank + 1");

    let sequence = if batch_first {
        to_time_major(sequence)
    } else {
        sequence
    };

    let time_steps = sequence.dims()[0];
    if time_steps == 0 {
        return Err(ConvGruError::EmptySequence);
    }
    debug!(
        "scanning {} time steps over sequence {:?}",
        time_steps,
        sequence.dims()
    );

    let mut hidden = initial_hidden;
    let mut outputs = Vec::with_capacity(time_steps);
    for t in 0..time_steps {
        let frame = sequence.clone().narrow(0, t, 1).squeeze::<D>(0);
        let next = cell.step(frame, hidden)?;
        trace!("step {} produced hidden state {:?}", t, next.dims());
        outputs.push(next.clone());
        hidden = Some(next);
    }

    let output = Tensor::stack::<DT>(outputs, 0);
    let output = if batch_first {
        to_batch_first(output)
    } else {
        output
    };

    // time_steps > 0, so the loop assigned at least one hidden state
    let final_hidden = hidden.ok_or(ConvGruError::EmptySequence)?;
    Ok((output, final_hidden))
}

/// [batch, channels, time, ...] -> [time, batch, channels, ...]
fn to_time_major<B: Backend, const DT: usize>(sequence: Tensor<B, DT>) -> Tensor<B, DT> {
    sequence.swap_dims(1, 2).swap_dims(0, 1)
}

/// [time, batch, channels, ...] -> [batch, channels, time, ...]
fn to_batch_first<B: Backend, const DT: usize>(sequence: Tensor<B, DT>) -> Tensor<B, DT> {
    sequence.swap_dims(0, 1).swap_dims(1, 2)
}

/// A recurrent layer that maps a whole input sequence to its sequence of
/// hidden states.
pub trait SequenceModel<B: Backend, const DT: usize> {
    /// Output sequence only, starting from a zero hidden state.
    fn forward(&self, sequence: Tensor<B, DT>) -> Result<Tensor<B, DT>, ConvGruError>;
}

/// Configuration of a [`ConvGru1d`] layer.
#[derive(Config, Debug)]
pub struct ConvGru1dConfig {
    pub cell: ConvGru1dCellConfig,
    /// Sequences are laid out [batch, channels, time, length] instead of
    /// [time, batch, channels, length].
    #[config(default = false)]
    pub batch_first: bool,
}

impl ConvGru1dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvGru1d<B>, ConvGruError> {
        Ok(ConvGru1d {
            cell: self.cell.init(device)?,
            batch_first: self.batch_first,
        })
    }
}

/// # ConvGRU Layer (1-D)
///
/// Scans a single [`ConvGru1dCell`] over the time axis of a rank-4
/// sequence. The same cell, and therefore the same parameters, is used at
/// every time step.
#[derive(Module, Debug)]
pub struct ConvGru1d<B: Backend> {
    cell: ConvGru1dCell<B>,
    batch_first: bool,
}

impl<B: Backend> ConvGru1d<B> {
    /// Runs the layer over a sequence.
    ///
    /// # Arguments
    ///
    /// * `sequence` - [time, batch, channels, length], or
    ///   [batch, channels, time, length] when `batch_first` is set
    /// * `initial_hidden` - Hidden state before the first frame, zeros if `None`
    ///
    /// # Returns
    ///
    /// `(output_sequence, final_hidden)`, where `output_sequence` holds the
    /// hidden state of every step in the input's layout
    pub fn run(
        &self,
        sequence: Tensor<B, 4>,
        initial_hidden: Option<Tensor<B, 3>>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 3>), ConvGruError> {
        scan(&self.cell, sequence, initial_hidden, self.batch_first)
    }

    pub fn cell(&self) -> &ConvGru1dCell<B> {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut ConvGru1dCell<B> {
        &mut self.cell
    }

    pub fn batch_first(&self) -> bool {
        self.batch_first
    }
}

impl<B: Backend> SequenceModel<B, 4> for ConvGru1d<B> {
    fn forward(&self, sequence: Tensor<B, 4>) -> Result<Tensor<B, 4>, ConvGruError> {
        self.run(sequence, None).map(|(output, _)| output)
    }
}

/// Configuration of a [`ConvGru2d`] layer.
#[derive(Config, Debug)]
pub struct ConvGru2dConfig {
    pub cell: ConvGru2dCellConfig,
    /// Sequences are laid out [batch, channels, time, height, width].
    #[config(default = false)]
    pub batch_first: bool,
}

impl ConvGru2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvGru2d<B>, ConvGruError> {
        Ok(ConvGru2d {
            cell: self.cell.init(device)?,
            batch_first: self.batch_first,
        })
    }
}

/// ConvGRU layer over rank-5 sequences of 2-D frames.
#[derive(Module, Debug)]
pub struct ConvGru2d<B: Backend> {
    cell: ConvGru2dCell<B>,
    batch_first: bool,
}

impl<B: Backend> ConvGru2d<B> {
    /// Same contract as [`ConvGru1d::run`] with frames shaped
    /// [batch, channels, height, width].
    pub fn run(
        &self,
        sequence: Tensor<B, 5>,
        initial_hidden: Option<Tensor<B, 4>>,
    ) -> Result<(Tensor<B, 5>, Tensor<B, 4>), ConvGruError> {
        scan(&self.cell, sequence, initial_hidden, self.batch_first)
    }

    pub fn cell(&self) -> &ConvGru2dCell<B> {
        &self.cell
    }

    pub fn cell_mut(&mut self) -> &mut ConvGru2dCell<B> {
        &mut self.cell
    }

    pub fn batch_first(&self) -> bool {
        self.batch_first
    }
}

impl<B: Backend> SequenceModel<B, 5> for ConvGru2d<B> {
    fn forward(&self, sequence: Tensor<B, 5>) -> Result<Tensor<B, 5>, ConvGruError> {
        self.run(sequence, None).map(|(output, _)| output)
    }
}
