// External imports
use burn::module::Param;
use burn::tensor::{backend::Backend, Distribution, Tensor, TensorData};
use log::debug;
use ndarray::{Array1, Array2};

// Internal imports
use crate::error::ConvGruError;

const ORTHOGONAL_EPS: f64 = 1e-10;

/// Fan-in and fan-out of a weight tensor shaped `[out, in, kernel...]`.
fn fans<const D: usize>(shape: [usize; D]) -> (usize, usize) {
    let receptive: usize = shape[2..].iter().product();
    (shape[1] * receptive, shape[0] * receptive)
}

/// Xavier/Glorot uniform sample: `U(-a, a)` with
/// `a = gain * sqrt(6 / (fan_in + fan_out))`.
pub fn xavier_uniform<B: Backend, const D: usize>(
    shape: [usize; D],
    gain: f64,
    device: &B::Device,
) -> Tensor<B, D> {
    let (fan_in, fan_out) = fans(shape);
    let bound = gain * (6.0 / (fan_in + fan_out) as f64).sqrt();
    Tensor::random(shape, Distribution::Uniform(-bound, bound), device)
}

/// Orthogonal sample: the weight is viewed as a `[out, in * kernel...]`
/// matrix whose rows (or columns, whichever are fewer) are orthonormal,
/// then scaled by `gain`.
///
/// A Gaussian matrix is orthonormalised with modified Gram-Schmidt, which
/// yields the Q factor of a QR decomposition with a positive diagonal in R.
pub fn orthogonal<B: Backend, const D: usize>(
    shape: [usize; D],
    gain: f64,
    device: &B::Device,
) -> Result<Tensor<B, D>, ConvGruError> {
    let rows = shape[0];
    let cols: usize = shape[1..].iter().product();

    let gaussian = Tensor::<B, 2>::random([rows, cols], Distribution::Normal(0.0, 1.0), device)
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| ConvGruError::Initialization(format!("{:?}", e)))?;
    let matrix = Array2::from_shape_vec((rows, cols), gaussian)
        .map_err(|e| ConvGruError::Initialization(e.to_string()))?;

    // Orthonormalise along the longer axis so that the shorter one ends up orthonormal
    let transposed = rows < cols;
    let tall = if transposed {
        matrix.t().to_owned()
    } else {
        matrix
    };
    let q = gram_schmidt(&tall)?;
    let q = if transposed { q.t().to_owned() } else { q };

    let values: Vec<f64> = q.iter().map(|v| v * gain).collect();
    let data = TensorData::new(values, shape).convert::<B::FloatElem>();
    Ok(Tensor::from_data(data, device))
}

/// Modified Gram-Schmidt over the columns of a tall matrix.
fn gram_schmidt(matrix: &Array2<f64>) -> Result<Array2<f64>, ConvGruError> {
    let (rows, cols) = matrix.dim();
    let mut q = Array2::<f64>::zeros((rows, cols));
    for j in 0..cols {
        let mut v: Array1<f64> = matrix.column(j).to_owned();
        for i in 0..j {
            let basis = q.column(i);
            let projection = basis.dot(&v);
            v.scaled_add(-projection, &basis);
        }
        let norm = v.dot(&v).sqrt();
        if norm < ORTHOGONAL_EPS {
            return Err(ConvGruError::Initialization(format!(
                "column {} is linearly dependent on the previous ones",
                j
            )));
        }
        q.column_mut(j).assign(&(v / norm));
    }
    Ok(q)
}

/// Replaces a parameter's value, keeping its id so optimizer state and
/// records still line up with it.
fn replace<B: Backend, const D: usize>(param: &mut Param<Tensor<B, D>>, value: Tensor<B, D>) {
    *param = Param::initialized(param.id.clone(), value.require_grad());
}

/// Re-initializes a weight in place with [`xavier_uniform`].
pub fn init_xavier_uniform<B: Backend, const D: usize>(param: &mut Param<Tensor<B, D>>, gain: f64) {
    let shape = param.dims();
    let device = param.device();
    debug!("xavier uniform init for weight {:?}", shape);
    replace(param, xavier_uniform::<B, D>(shape, gain, &device));
}

/// Re-initializes a weight in place with [`orthogonal`].
pub fn init_orthogonal<B: Backend, const D: usize>(
    param: &mut Param<Tensor<B, D>>,
    gain: f64,
) -> Result<(), ConvGruError> {
    let shape = param.dims();
    let device = param.device();
    debug!("orthogonal init for weight {:?}", shape);
    replace(param, orthogonal::<B, D>(shape, gain, &device)?);
    Ok(())
}

/// Zero-fills a parameter in place.
pub fn init_zeros<B: Backend, const D: usize>(param: &mut Param<Tensor<B, D>>) {
    let shape = param.dims();
    let device = param.device();
    replace(param, Tensor::zeros(shape, &device));
}

/// Overwrites a parameter with an explicit value of the same shape.
pub fn assign<B: Backend, const D: usize>(
    param: &mut Param<Tensor<B, D>>,
    value: Tensor<B, D>,
) -> Result<(), ConvGruError> {
    let expected = param.dims();
    let actual = value.dims();
    if expected != actual {
        return Err(ConvGruError::WeightShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    let value = value.to_device(&param.device());
    replace(param, value);
    Ok(())
}
