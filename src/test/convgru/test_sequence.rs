// External imports
use burn::module::Module;
use burn::tensor::Tensor;

// Internal imports
use crate::convgru::step_2_convgru_cell::{ConvGru1dCellConfig, ConvGru2dCellConfig, RecurrentCell};
use crate::convgru::step_3_convgru_sequence::{
    scan, ConvGru1dConfig, ConvGru2dConfig, SequenceModel,
};
use crate::error::ConvGruError;
use crate::test::test_utils::{max_abs_diff, shifted_normal, TestBackend};

fn layer_1d(batch_first: bool) -> ConvGru1dConfig {
    ConvGru1dConfig::new(ConvGru1dCellConfig::new(3, 5, 3).with_padding(1))
        .with_batch_first(batch_first)
}

#[test]
fn test_sequence_matches_manual_steps() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let sequence = shifted_normal::<TestBackend, 4>([6, 2, 3, 11], 0.5, &device);
    let initial = shifted_normal::<TestBackend, 3>([2, 5, 11], 0.0, &device);

    let (output, final_hidden) = model.run(sequence.clone(), Some(initial.clone())).unwrap();
    assert_eq!(output.dims(), [6, 2, 5, 11]);
    assert_eq!(final_hidden.dims(), [2, 5, 11]);

    let mut hidden = initial;
    for t in 0..6 {
        let frame = sequence.clone().narrow(0, t, 1).squeeze::<3>(0);
        hidden = model.cell().step(frame, Some(hidden)).unwrap();
        let produced = output.clone().narrow(0, t, 1).squeeze::<3>(0);
        assert!(max_abs_diff(produced, hidden.clone()) < 1e-6, "step {}", t);
    }
    assert!(max_abs_diff(final_hidden, hidden) < 1e-6);
}

#[test]
fn test_final_hidden_is_last_output() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let sequence = shifted_normal::<TestBackend, 4>([4, 3, 3, 9], 1.0, &device);

    let (output, final_hidden) = model.run(sequence, None).unwrap();
    let last = output.narrow(0, 3, 1).squeeze::<3>(0);
    assert_eq!(max_abs_diff(last, final_hidden), 0.0);
}

#[test]
fn test_single_step_sequence_equals_cell_step() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let frame = shifted_normal::<TestBackend, 3>([2, 3, 7], 1.0, &device);

    let (output, _) = model.run(frame.clone().unsqueeze_dim(0), None).unwrap();
    let expected = model.cell().step(frame, None).unwrap();
    assert_eq!(output.dims(), [1, 2, 5, 7]);
    assert!(max_abs_diff(output.squeeze::<3>(0), expected) < 1e-6);
}

#[test]
fn test_batch_first_layout() {
    let device = Default::default();
    let time_major = layer_1d(false).init::<TestBackend>(&device).unwrap();
    // Same parameters, other layout
    let batch_first = layer_1d(true)
        .init::<TestBackend>(&device)
        .unwrap()
        .load_record(time_major.clone().into_record());
    assert!(batch_first.batch_first());

    let sequence = shifted_normal::<TestBackend, 4>([5, 2, 3, 8], 1.0, &device);
    // [time, batch, channels, length] -> [batch, channels, time, length]
    let permuted = sequence.clone().swap_dims(0, 1).swap_dims(1, 2);

    let (expected, expected_hidden) = time_major.run(sequence, None).unwrap();
    let (output, hidden) = batch_first.run(permuted, None).unwrap();
    assert_eq!(output.dims(), [2, 5, 5, 8]);

    let expected = expected.swap_dims(0, 1).swap_dims(1, 2);
    assert!(max_abs_diff(expected, output) < 1e-6);
    assert!(max_abs_diff(expected_hidden, hidden) < 1e-6);
}

#[test]
fn test_empty_sequence_is_rejected() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let sequence = Tensor::<TestBackend, 4>::zeros([0, 2, 3, 8], &device);
    assert_eq!(model.run(sequence, None).unwrap_err(), ConvGruError::EmptySequence);
}

#[test]
fn test_bad_initial_hidden_aborts_scan() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let sequence = shifted_normal::<TestBackend, 4>([3, 2, 3, 8], 1.0, &device);

    let err = model
        .run(sequence.clone(), Some(Tensor::zeros([2, 4, 8], &device)))
        .unwrap_err();
    assert!(matches!(err, ConvGruError::HiddenShapeMismatch { .. }));

    let bad_frames = Tensor::<TestBackend, 4>::zeros([3, 2, 4, 8], &device);
    let err = model.run(bad_frames, None).unwrap_err();
    assert_eq!(
        err,
        ConvGruError::InputChannelMismatch {
            expected: 3,
            actual: 4
        }
    );
}

#[test]
fn test_forward_returns_run_output() {
    let device = Default::default();
    let model = layer_1d(false).init::<TestBackend>(&device).unwrap();
    let sequence = shifted_normal::<TestBackend, 4>([3, 2, 3, 8], 1.0, &device);

    let forwarded = model.forward(sequence.clone()).unwrap();
    let (output, _) = model.run(sequence, None).unwrap();
    assert_eq!(max_abs_diff(forwarded, output), 0.0);
}

#[test]
fn test_convgru2d_sequence() {
    let device = Default::default();
    let config = ConvGru2dConfig::new(
        ConvGru2dCellConfig::new(2, 4, [3, 3])
            .with_stride([2, 2])
            .with_padding([1, 1]),
    );
    let model = config.init::<TestBackend>(&device).unwrap();
    let sequence = shifted_normal::<TestBackend, 5>([4, 2, 2, 10, 7], 1.0, &device);

    let (output, final_hidden) = model.run(sequence.clone(), None).unwrap();
    // floor((10 - 3 + 2) / 2) + 1 = 5, floor((7 - 3 + 2) / 2) + 1 = 4
    assert_eq!(output.dims(), [4, 2, 4, 5, 4]);
    assert_eq!(final_hidden.dims(), [2, 4, 5, 4]);

    let (scanned, scanned_hidden) = scan(model.cell(), sequence, None, false).unwrap();
    assert_eq!(max_abs_diff(scanned, output), 0.0);
    assert_eq!(max_abs_diff(scanned_hidden, final_hidden), 0.0);
}

#[test]
fn test_convgru2d_batch_first_shape() {
    let device = Default::default();
    let model = ConvGru2dConfig::new(ConvGru2dCellConfig::new(2, 3, [3, 3]))
        .with_batch_first(true)
        .init::<TestBackend>(&device)
        .unwrap();
    // [batch, channels, time, height, width]
    let sequence = shifted_normal::<TestBackend, 5>([2, 2, 6, 8, 8], 0.0, &device);

    let output = model.forward(sequence).unwrap();
    assert_eq!(output.dims(), [2, 3, 6, 6, 6]);
}
