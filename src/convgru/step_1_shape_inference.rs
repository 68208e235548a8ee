// External imports
use burn::tensor::{backend::Backend, Tensor};

// Internal imports
use crate::error::ConvGruError;

/// Output size of a convolution along one axis:
/// `floor((size - kernel + 2 * padding) / stride) + 1`.
///
/// # Errors
///
/// [`ConvGruError::InputTooSmall`] when the padded input is shorter than the
/// kernel, in which case the convolution has no valid window.
pub fn conv_output_size(
    size: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> Result<usize, ConvGruError> {
    conv_output_axis(0, size, kernel, stride, padding)
}

fn conv_output_axis(
    axis: usize,
    size: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> Result<usize, ConvGruError> {
    let padded = size + 2 * padding;
    if padded < kernel {
        return Err(ConvGruError::InputTooSmall {
            axis,
            size,
            kernel,
            padding,
        });
    }
    Ok((padded - kernel) / stride + 1)
}

/// Applies [`conv_output_size`] to every spatial axis.
pub fn conv_output_dims<const N: usize>(
    size: [usize; N],
    kernel: [usize; N],
    stride: [usize; N],
    padding: [usize; N],
) -> Result<[usize; N], ConvGruError> {
    let mut out = [0; N];
    for axis in 0..N {
        out[axis] = conv_output_axis(axis, size[axis], kernel[axis], stride[axis], padding[axis])?;
    }
    Ok(out)
}

/// Padding that keeps a stride-1 convolution shape-preserving.
pub fn recurrent_padding<const N: usize>(kernel: [usize; N]) -> [usize; N] {
    kernel.map(|k| k / 2)
}

/// Rejects zero-sized configuration values.
pub fn validate_positive(field: &'static str, value: usize) -> Result<(), ConvGruError> {
    if value == 0 {
        return Err(ConvGruError::NonPositive { field, value });
    }
    Ok(())
}

/// Rejects zero-sized values on any axis.
pub fn validate_positive_axes<const N: usize>(
    field: &'static str,
    values: [usize; N],
) -> Result<(), ConvGruError> {
    values
        .iter()
        .try_for_each(|&value| validate_positive(field, value))
}

/// Recurrent kernels must be odd on every axis: with an even kernel the
/// `k / 2` padding shifts the output by one position and the hidden state
/// would no longer line up with itself across steps.
pub fn validate_recurrent_kernel<const N: usize>(kernel: [usize; N]) -> Result<(), ConvGruError> {
    validate_positive_axes("recurrent_kernel_size", kernel)?;
    for (axis, &size) in kernel.iter().enumerate() {
        if size % 2 == 0 {
            return Err(ConvGruError::EvenRecurrentKernel { axis, size });
        }
    }
    Ok(())
}

/// Checks that an input frame carries the channel count the cell was built for.
pub fn validate_input_channels(expected: usize, actual: usize) -> Result<(), ConvGruError> {
    if expected != actual {
        return Err(ConvGruError::InputChannelMismatch { expected, actual });
    }
    Ok(())
}

/// Checks that a tensor lives on the expected device.
pub fn validate_device<B: Backend>(
    expected: &B::Device,
    actual: &B::Device,
) -> Result<(), ConvGruError> {
    if expected != actual {
        return Err(ConvGruError::DeviceMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        });
    }
    Ok(())
}

/// Checks a caller-supplied hidden state against the shape the step will
/// produce and against the input's device.
pub fn validate_hidden_state<B: Backend, const D: usize>(
    hidden: &Tensor<B, D>,
    expected_dims: [usize; D],
    device: &B::Device,
) -> Result<(), ConvGruError> {
    let actual_dims = hidden.dims();
    if actual_dims != expected_dims {
        return Err(ConvGruError::HiddenShapeMismatch {
            expected: expected_dims.to_vec(),
            actual: actual_dims.to_vec(),
        });
    }
    validate_device::<B>(device, &hidden.device())
}
