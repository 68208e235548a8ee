// External crates
use anyhow::{anyhow, Context, Result};
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::tensor::{activation, Distribution, Tensor};
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use log::info;
use std::env;
use std::path::{Path, PathBuf};

// Local crate
use convgru::constants::{CHECKPOINT_DIR, DEFAULT_TRAINING_ITERATIONS, MODEL_FILE_NAME};
use convgru::convgru::step_4_train_model::{
    evaluate_sequence_model, train_sequence_model, TrainingConfig,
};
use convgru::convgru::step_5_model_serialization::{
    save_checkpoint, CheckpointMetadata, ModelKind,
};
use convgru::util::model_logger::{create_experiment_dir, TrainingRun};
use convgru::{ConvGru1dCellConfig, ConvGru1dConfig, ConvGru2dCellConfig, ConvGru2dConfig, SequenceModel};

type InnerBackend = NdArray<f32>;
type BurnBackend = Autodiff<InnerBackend>;

// Synthetic task: learn h_t = tanh(x_t) with x ~ 1 + N(0, 1)
const CHANNELS: usize = 4;
const TIME_STEPS: usize = 8;
const BATCH_SIZE: usize = 4;
const LENGTH: usize = 32;
const SIDE: usize = 8;
const TARGET_LOSS: f64 = 2e-3;

fn synthetic_pair<B: burn::tensor::backend::Backend, const DT: usize>(
    shape: [usize; DT],
    device: &B::Device,
) -> (Tensor<B, DT>, Tensor<B, DT>) {
    let inputs = Tensor::<B, DT>::random(shape, Distribution::Normal(0.0, 1.0), device) + 1.0;
    let targets = activation::tanh(inputs.clone());
    (inputs, targets)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Accept variant, iteration count and output directory as command-line arguments
    let args: Vec<String> = env::args().collect();
    let variant = args.get(1).map(|s| s.as_str()).unwrap_or("1d");
    let iterations = args
        .get(2)
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("iterations must be a positive integer")?
        .unwrap_or(DEFAULT_TRAINING_ITERATIONS);
    let output_dir = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    info!(
        "Using variant: {} | iterations: {} | output: {}",
        variant,
        iterations,
        output_dir.display()
    );

    let training = TrainingConfig {
        iterations,
        target_loss: Some(TARGET_LOSS),
        ..TrainingConfig::default()
    };
    let device = Default::default();

    match variant {
        "1d" => {
            let config = ConvGru1dConfig::new(
                ConvGru1dCellConfig::new(CHANNELS, CHANNELS, 3).with_padding(1),
            );
            let model = config.init::<BurnBackend>(&device)?;
            train_and_save(
                ModelKind::ConvGru1d,
                model,
                &config,
                [TIME_STEPS, BATCH_SIZE, CHANNELS, LENGTH],
                &training,
                &output_dir,
            )
        }
        "2d" => {
            let config = ConvGru2dConfig::new(
                ConvGru2dCellConfig::new(CHANNELS, CHANNELS, [3, 3]).with_padding([1, 1]),
            );
            let model = config.init::<BurnBackend>(&device)?;
            train_and_save(
                ModelKind::ConvGru2d,
                model,
                &config,
                [TIME_STEPS, BATCH_SIZE, CHANNELS, SIDE, SIDE],
                &training,
                &output_dir,
            )
        }
        other => Err(anyhow!("unknown variant `{}`, expected `1d` or `2d`", other)),
    }
}

fn train_and_save<M, C, const DT: usize>(
    kind: ModelKind,
    model: M,
    config: &C,
    shape: [usize; DT],
    training: &TrainingConfig,
    output_dir: &Path,
) -> Result<()>
where
    M: AutodiffModule<BurnBackend> + SequenceModel<BurnBackend, DT>,
    M::InnerModule: SequenceModel<InnerBackend, DT>,
    C: Config,
{
    let device = Default::default();
    let model_type = match kind {
        ModelKind::ConvGru1d => "convgru1d",
        ModelKind::ConvGru2d => "convgru2d",
    };
    let mut run = TrainingRun::new(
        model_type,
        CHANNELS,
        CHANNELS,
        shape[0],
        shape[1],
        training.learning_rate,
    );

    let (inputs, targets) = synthetic_pair::<BurnBackend, DT>(shape, &device);
    let (trained, report) = train_sequence_model(model, inputs, targets, training)?;
    run.record_training(&report);

    // Evaluate without autodiff tracking on a fresh sequence
    let trained = trained.valid();
    let (test_inputs, test_targets) = synthetic_pair::<InnerBackend, DT>(shape, &device);
    let test_mse = evaluate_sequence_model(&trained, test_inputs, test_targets)?;
    run.set_test_mse(test_mse);
    info!(
        "Final train MSE: {:.6} | test MSE: {:.6}",
        report.final_loss().unwrap_or(f64::NAN),
        test_mse
    );

    let metadata = CheckpointMetadata::new(kind, "ConvGRU trained on a synthetic tanh target");
    let checkpoint_path = output_dir
        .join(CHECKPOINT_DIR)
        .join(format!("{}_{}", model_type, MODEL_FILE_NAME));
    let saved = save_checkpoint::<InnerBackend, _, _>(&trained, config, &metadata, &checkpoint_path)?;
    run.set_checkpoint(&saved);

    let experiment_dir = create_experiment_dir(output_dir)?;
    let run_path = run.save(&experiment_dir)?;
    info!("Training run recorded at {}", run_path.display());
    Ok(())
}
