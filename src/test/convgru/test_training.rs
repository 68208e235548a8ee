// External imports
use burn::module::AutodiffModule;
use burn::tensor::activation;

// Internal imports
use crate::convgru::step_2_convgru_cell::{ConvGru1dCellConfig, ConvGru2dCellConfig};
use crate::convgru::step_3_convgru_sequence::{ConvGru1dConfig, ConvGru2dConfig};
use crate::convgru::step_4_train_model::{
    evaluate_sequence_model, mse_loss, train_sequence_model, TrainingConfig,
};
use crate::test::test_utils::{max_abs_diff, shifted_normal, TestAutodiffBackend, TestBackend};

#[test]
fn test_mse_loss() {
    let device = Default::default();
    let a = burn::tensor::Tensor::<TestBackend, 2>::zeros([2, 2], &device);
    let b = burn::tensor::Tensor::<TestBackend, 2>::full([2, 2], 3.0, &device);
    let loss: f32 = mse_loss(a, b).into_scalar();
    assert!((loss - 9.0).abs() < 1e-6);
}

#[test]
fn test_convgru1d_is_trainable() {
    let device = Default::default();
    let channels = 4;
    let config = ConvGru1dConfig::new(ConvGru1dCellConfig::new(channels, channels, 3).with_padding(1));
    let model = config.init::<TestAutodiffBackend>(&device).unwrap();
    let input_weight = model.cell().input_weight().inner();
    let recurrent_weight = model.cell().recurrent_weight().inner();

    let inputs = shifted_normal::<TestAutodiffBackend, 4>([6, 2, channels, 16], 1.0, &device);
    let targets = activation::tanh(inputs.clone());

    let training = TrainingConfig {
        iterations: 1000,
        log_interval: 250,
        ..TrainingConfig::default()
    };
    let (trained, report) =
        train_sequence_model(model, inputs.clone(), targets.clone(), &training).unwrap();
    assert_eq!(report.iterations_run, 1000);
    assert!(!report.stopped_early);

    let trained = trained.valid();
    assert!(max_abs_diff(input_weight, trained.cell().input_weight()) > 0.0);
    assert!(max_abs_diff(recurrent_weight, trained.cell().recurrent_weight()) > 0.0);

    let mse = evaluate_sequence_model(&trained, inputs.inner(), targets.inner()).unwrap();
    assert!(mse <= 2e-3, "train MSE {} above 2e-3", mse);
}

#[test]
fn test_convgru2d_loss_decreases() {
    let device = Default::default();
    let config = ConvGru2dConfig::new(ConvGru2dCellConfig::new(2, 2, [3, 3]).with_padding([1, 1]));
    let model = config.init::<TestAutodiffBackend>(&device).unwrap();

    let inputs = shifted_normal::<TestAutodiffBackend, 5>([3, 2, 2, 6, 6], 1.0, &device);
    let targets = activation::tanh(inputs.clone());

    let training = TrainingConfig {
        iterations: 40,
        ..TrainingConfig::default()
    };
    let (_, report) = train_sequence_model(model, inputs, targets, &training).unwrap();
    let first = report.loss_history[0];
    let last = report.final_loss().unwrap();
    assert!(last < first, "loss went from {} to {}", first, last);
}

#[test]
fn test_training_stops_at_target_loss() {
    let device = Default::default();
    let config = ConvGru1dConfig::new(ConvGru1dCellConfig::new(2, 2, 3).with_padding(1));
    let model = config.init::<TestAutodiffBackend>(&device).unwrap();
    let inputs = shifted_normal::<TestAutodiffBackend, 4>([2, 1, 2, 8], 1.0, &device);
    let targets = activation::tanh(inputs.clone());

    // Any finite loss is below infinity, so the first iteration stops
    let training = TrainingConfig {
        iterations: 50,
        target_loss: Some(f64::INFINITY),
        ..TrainingConfig::default()
    };
    let (_, report) = train_sequence_model(model, inputs, targets, &training).unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.iterations_run, 1);
}

#[test]
fn test_training_rejects_mismatched_targets() {
    let device = Default::default();
    let config = ConvGru1dConfig::new(ConvGru1dCellConfig::new(2, 3, 3));
    let model = config.init::<TestAutodiffBackend>(&device).unwrap();
    let inputs = shifted_normal::<TestAutodiffBackend, 4>([2, 1, 2, 8], 1.0, &device);
    // Hidden has 3 channels and length 6, targets do not
    let targets = inputs.clone();

    let training = TrainingConfig {
        iterations: 5,
        ..TrainingConfig::default()
    };
    assert!(train_sequence_model(model, inputs, targets, &training).is_err());
}
