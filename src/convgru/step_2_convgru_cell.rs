// External imports
use burn::config::Config;
use burn::module::{Ignored, Module, Param};
use burn::nn::conv::{Conv1d, Conv1dConfig, Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig1d, PaddingConfig2d};
use burn::tensor::{activation, backend::Backend, Tensor};

// Internal imports
use super::step_1_shape_inference::{
    conv_output_dims, recurrent_padding, validate_device, validate_hidden_state,
    validate_input_channels, validate_positive, validate_positive_axes, validate_recurrent_kernel,
};
use crate::constants::{
    DEFAULT_PADDING, DEFAULT_RECURRENT_KERNEL_SIZE, DEFAULT_STRIDE, GATE_COUNT, ORTHOGONAL_GAIN,
    XAVIER_GAIN,
};
use crate::error::ConvGruError;
use crate::util::initializers::{assign, init_orthogonal, init_xavier_uniform, init_zeros};

/// # Convolutional GRU Cell
///
/// A GRU whose input-to-hidden and hidden-to-hidden transforms are
/// convolutions, so the hidden state keeps a spatial layout.
///
/// ## Mathematical Representation
///
/// For input frame x_t and previous hidden state h_(t-1), with `*` a
/// convolution and W, U the input-to-hidden and hidden-to-hidden kernels:
///
/// 1. Update gate: z_t = σ(W_z * x_t + U_z * h_(t-1))
/// 2. Reset gate: r_t = σ(W_r * x_t + U_r * h_(t-1))
/// 3. Candidate state: n_t = tanh(W_n * x_t + r_t ∘ (U_n * h_(t-1)))
/// 4. New hidden state: h_t = (1 - z_t) ∘ n_t + z_t ∘ h_(t-1)
///
/// Both convolutions emit `3 * hidden_channels` channels laid out as the
/// z, r and n blocks, in that order. The hidden-to-hidden convolution has
/// stride 1 and `k / 2` padding so it never changes the spatial size.
///
/// The trait is implemented once per spatial rank; `D` is the tensor rank
/// of a frame (3 for 1-D cells, 4 for 2-D cells). Only the shape inference
/// and the convolutions differ between ranks, the gated update is shared.
pub trait RecurrentCell<B: Backend, const D: usize> {
    /// Number of channels in the hidden state.
    fn hidden_channels(&self) -> usize;

    /// Device holding the cell's parameters.
    fn param_device(&self) -> B::Device;

    /// Shape of the hidden state produced for `input`:
    /// `[batch, hidden_channels, output spatial...]`.
    fn hidden_dims(&self, input: &Tensor<B, D>) -> Result<[usize; D], ConvGruError>;

    /// Runs the input-to-hidden and hidden-to-hidden convolutions.
    fn convolve(&self, input: Tensor<B, D>, hidden: Tensor<B, D>) -> (Tensor<B, D>, Tensor<B, D>);

    /// Orthogonal hidden-to-hidden weight, Xavier-uniform input-to-hidden
    /// weight, zero biases. Replaces the current values in place.
    fn reset_parameters(&mut self) -> Result<(), ConvGruError>;

    /// Advances the recurrence by one frame.
    ///
    /// # Arguments
    ///
    /// * `input` - Frame of shape [batch, input_channels, spatial...]
    /// * `hidden` - Previous hidden state, or `None` to start from zeros
    ///
    /// # Returns
    ///
    /// The next hidden state, shaped [batch, hidden_channels, output spatial...]
    /// and placed on the input's device
    fn step(
        &self,
        input: Tensor<B, D>,
        hidden: Option<Tensor<B, D>>,
    ) -> Result<Tensor<B, D>, ConvGruError> {
        let device = input.device();
        validate_device::<B>(&self.param_device(), &device)?;
        let hidden_dims = self.hidden_dims(&input)?;

        let hidden = match hidden {
            Some(hidden) => {
                validate_hidden_state(&hidden, hidden_dims, &device)?;
                hidden
            }
            None => Tensor::zeros(hidden_dims, &device),
        };

        let (input_gates, hidden_gates) = self.convolve(input, hidden.clone());
        Ok(gated_update(
            input_gates,
            hidden_gates,
            hidden,
            self.hidden_channels(),
        ))
    }
}

/// Fuses the two convolution outputs into the next hidden state.
///
/// `input_gates` and `hidden_gates` both carry `3 * hidden_channels`
/// channels and the same spatial size as `hidden`.
pub fn gated_update<B: Backend, const D: usize>(
    input_gates: Tensor<B, D>,
    hidden_gates: Tensor<B, D>,
    hidden: Tensor<B, D>,
    hidden_channels: usize,
) -> Tensor<B, D> {
    let [z_input, r_input, n_input] = split_gates(input_gates, hidden_channels);
    let [z_hidden, r_hidden, n_hidden] = split_gates(hidden_gates, hidden_channels);

    let z = activation::sigmoid(z_input + z_hidden); // update gate
    let r = activation::sigmoid(r_input + r_hidden); // reset gate
    let n = activation::tanh(n_input + r * n_hidden); // candidate state

    (Tensor::ones_like(&z) - z.clone()) * n + z * hidden
}

fn split_gates<B: Backend, const D: usize>(
    gates: Tensor<B, D>,
    hidden_channels: usize,
) -> [Tensor<B, D>; GATE_COUNT] {
    [
        gates.clone().narrow(1, 0, hidden_channels),
        gates.clone().narrow(1, hidden_channels, hidden_channels),
        gates.narrow(1, 2 * hidden_channels, hidden_channels),
    ]
}

fn reset_gate_convolutions<B: Backend, const D: usize>(
    input_weight: &mut Param<Tensor<B, D>>,
    input_bias: Option<&mut Param<Tensor<B, 1>>>,
    recurrent_weight: &mut Param<Tensor<B, D>>,
    recurrent_bias: Option<&mut Param<Tensor<B, 1>>>,
) -> Result<(), ConvGruError> {
    init_orthogonal(recurrent_weight, ORTHOGONAL_GAIN)?;
    init_xavier_uniform(input_weight, XAVIER_GAIN);
    for bias in [input_bias, recurrent_bias].into_iter().flatten() {
        init_zeros(bias);
    }
    Ok(())
}

/// Configuration of a [`ConvGru1dCell`].
#[derive(Config, Debug)]
pub struct ConvGru1dCellConfig {
    /// Channels of each input frame.
    pub input_channels: usize,
    /// Channels of the hidden state.
    pub hidden_channels: usize,
    /// Input-to-hidden kernel size.
    pub kernel_size: usize,
    /// Input-to-hidden stride.
    #[config(default = "DEFAULT_STRIDE")]
    pub stride: usize,
    /// Input-to-hidden padding, applied on both sides.
    #[config(default = "DEFAULT_PADDING")]
    pub padding: usize,
    /// Hidden-to-hidden kernel size, must be odd.
    #[config(default = "DEFAULT_RECURRENT_KERNEL_SIZE")]
    pub recurrent_kernel_size: usize,
}

impl ConvGru1dCellConfig {
    /// Builds the cell and applies the initialization policy.
    ///
    /// # Errors
    ///
    /// Zero channels, kernel sizes or strides, and even recurrent kernels.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvGru1dCell<B>, ConvGruError> {
        validate_positive("input_channels", self.input_channels)?;
        validate_positive("hidden_channels", self.hidden_channels)?;
        validate_positive("kernel_size", self.kernel_size)?;
        validate_positive("stride", self.stride)?;
        validate_recurrent_kernel([self.recurrent_kernel_size])?;

        let gate_channels = GATE_COUNT * self.hidden_channels;
        let conv_ih = Conv1dConfig::new(self.input_channels, gate_channels, self.kernel_size)
            .with_stride(self.stride)
            .with_padding(PaddingConfig1d::Explicit(self.padding))
            .init(device);

        let [hh_padding] = recurrent_padding([self.recurrent_kernel_size]);
        let conv_hh = Conv1dConfig::new(
            self.hidden_channels,
            gate_channels,
            self.recurrent_kernel_size,
        )
        .with_stride(1)
        .with_padding(PaddingConfig1d::Explicit(hh_padding))
        .init(device);

        let mut cell = ConvGru1dCell {
            conv_ih,
            conv_hh,
            input_channels: self.input_channels,
            hidden_channels: self.hidden_channels,
            kernel_size: self.kernel_size,
            stride: self.stride,
            padding: self.padding,
        };
        cell.reset_parameters()?;
        Ok(cell)
    }
}

/// ConvGRU cell over frames shaped [batch, channels, length].
#[derive(Module, Debug)]
pub struct ConvGru1dCell<B: Backend> {
    conv_ih: Conv1d<B>,
    conv_hh: Conv1d<B>,
    input_channels: usize,
    hidden_channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl<B: Backend> ConvGru1dCell<B> {
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    /// Input-to-hidden weight, shaped [3 * hidden, input, kernel].
    pub fn input_weight(&self) -> Tensor<B, 3> {
        self.conv_ih.weight.val()
    }

    /// Hidden-to-hidden weight, shaped [3 * hidden, hidden, recurrent_kernel].
    pub fn recurrent_weight(&self) -> Tensor<B, 3> {
        self.conv_hh.weight.val()
    }

    pub fn input_bias(&self) -> Option<Tensor<B, 1>> {
        self.conv_ih.bias.as_ref().map(|bias| bias.val())
    }

    pub fn recurrent_bias(&self) -> Option<Tensor<B, 1>> {
        self.conv_hh.bias.as_ref().map(|bias| bias.val())
    }

    /// Overwrites the input-to-hidden weight. The shape must not change.
    pub fn set_input_weight(&mut self, weight: Tensor<B, 3>) -> Result<(), ConvGruError> {
        assign(&mut self.conv_ih.weight, weight)
    }

    /// Overwrites the hidden-to-hidden weight. The shape must not change.
    pub fn set_recurrent_weight(&mut self, weight: Tensor<B, 3>) -> Result<(), ConvGruError> {
        assign(&mut self.conv_hh.weight, weight)
    }
}

impl<B: Backend> RecurrentCell<B, 3> for ConvGru1dCell<B> {
    fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    fn param_device(&self) -> B::Device {
        self.conv_ih.weight.device()
    }

    fn hidden_dims(&self, input: &Tensor<B, 3>) -> Result<[usize; 3], ConvGruError> {
        let [batch, channels, length] = input.dims();
        validate_input_channels(self.input_channels, channels)?;
        let [out_length] = conv_output_dims(
            [length],
            [self.kernel_size],
            [self.stride],
            [self.padding],
        )?;
        Ok([batch, self.hidden_channels, out_length])
    }

    fn convolve(&self, input: Tensor<B, 3>, hidden: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 3>) {
        (self.conv_ih.forward(input), self.conv_hh.forward(hidden))
    }

    fn reset_parameters(&mut self) -> Result<(), ConvGruError> {
        reset_gate_convolutions(
            &mut self.conv_ih.weight,
            self.conv_ih.bias.as_mut(),
            &mut self.conv_hh.weight,
            self.conv_hh.bias.as_mut(),
        )
    }
}

/// Configuration of a [`ConvGru2dCell`]. Sizes are given per axis as
/// `[height, width]`.
#[derive(Config, Debug)]
pub struct ConvGru2dCellConfig {
    pub input_channels: usize,
    pub hidden_channels: usize,
    pub kernel_size: [usize; 2],
    #[config(default = "[DEFAULT_STRIDE; 2]")]
    pub stride: [usize; 2],
    #[config(default = "[DEFAULT_PADDING; 2]")]
    pub padding: [usize; 2],
    /// Must be odd on both axes.
    #[config(default = "[DEFAULT_RECURRENT_KERNEL_SIZE; 2]")]
    pub recurrent_kernel_size: [usize; 2],
}

impl ConvGru2dCellConfig {
    /// Builds the cell and applies the initialization policy.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ConvGru2dCell<B>, ConvGruError> {
        validate_positive("input_channels", self.input_channels)?;
        validate_positive("hidden_channels", self.hidden_channels)?;
        validate_positive_axes("kernel_size", self.kernel_size)?;
        validate_positive_axes("stride", self.stride)?;
        validate_recurrent_kernel(self.recurrent_kernel_size)?;

        let gate_channels = GATE_COUNT * self.hidden_channels;
        let [pad_h, pad_w] = self.padding;
        let conv_ih = Conv2dConfig::new([self.input_channels, gate_channels], self.kernel_size)
            .with_stride(self.stride)
            .with_padding(PaddingConfig2d::Explicit(pad_h, pad_w))
            .init(device);

        let [hh_pad_h, hh_pad_w] = recurrent_padding(self.recurrent_kernel_size);
        let conv_hh = Conv2dConfig::new(
            [self.hidden_channels, gate_channels],
            self.recurrent_kernel_size,
        )
        .with_stride([1, 1])
        .with_padding(PaddingConfig2d::Explicit(hh_pad_h, hh_pad_w))
        .init(device);

        let mut cell = ConvGru2dCell {
            conv_ih,
            conv_hh,
            input_channels: self.input_channels,
            hidden_channels: self.hidden_channels,
            kernel_size: Ignored(self.kernel_size),
            stride: Ignored(self.stride),
            padding: Ignored(self.padding),
        };
        cell.reset_parameters()?;
        Ok(cell)
    }
}

/// ConvGRU cell over frames shaped [batch, channels, height, width].
#[derive(Module, Debug)]
pub struct ConvGru2dCell<B: Backend> {
    conv_ih: Conv2d<B>,
    conv_hh: Conv2d<B>,
    input_channels: usize,
    hidden_channels: usize,
    kernel_size: Ignored<[usize; 2]>,
    stride: Ignored<[usize; 2]>,
    padding: Ignored<[usize; 2]>,
}

impl<B: Backend> ConvGru2dCell<B> {
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    /// Input-to-hidden weight, shaped [3 * hidden, input, kh, kw].
    pub fn input_weight(&self) -> Tensor<B, 4> {
        self.conv_ih.weight.val()
    }

    /// Hidden-to-hidden weight, shaped [3 * hidden, hidden, rkh, rkw].
    pub fn recurrent_weight(&self) -> Tensor<B, 4> {
        self.conv_hh.weight.val()
    }

    pub fn input_bias(&self) -> Option<Tensor<B, 1>> {
        self.conv_ih.bias.as_ref().map(|bias| bias.val())
    }

    pub fn recurrent_bias(&self) -> Option<Tensor<B, 1>> {
        self.conv_hh.bias.as_ref().map(|bias| bias.val())
    }

    pub fn set_input_weight(&mut self, weight: Tensor<B, 4>) -> Result<(), ConvGruError> {
        assign(&mut self.conv_ih.weight, weight)
    }

    pub fn set_recurrent_weight(&mut self, weight: Tensor<B, 4>) -> Result<(), ConvGruError> {
        assign(&mut self.conv_hh.weight, weight)
    }
}

impl<B: Backend> RecurrentCell<B, 4> for ConvGru2dCell<B> {
    fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    fn param_device(&self) -> B::Device {
        self.conv_ih.weight.device()
    }

    fn hidden_dims(&self, input: &Tensor<B, 4>) -> Result<[usize; 4], ConvGruError> {
        let [batch, channels, height, width] = input.dims();
        validate_input_channels(self.input_channels, channels)?;
        let [out_height, out_width] =
            conv_output_dims([height, width], self.kernel_size.0, self.stride.0, self.padding.0)?;
        Ok([batch, self.hidden_channels, out_height, out_width])
    }

    fn convolve(&self, input: Tensor<B, 4>, hidden: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        (self.conv_ih.forward(input), self.conv_hh.forward(hidden))
    }

    fn reset_parameters(&mut self) -> Result<(), ConvGruError> {
        reset_gate_convolutions(
            &mut self.conv_ih.weight,
            self.conv_ih.bias.as_mut(),
            &mut self.conv_hh.weight,
            self.conv_hh.bias.as_mut(),
        )
    }
}
