// External imports
use anyhow::{anyhow, Result};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Internal imports
use super::step_3_convgru_sequence::SequenceModel;
use crate::constants::{DEFAULT_LEARNING_RATE, DEFAULT_LOG_INTERVAL, DEFAULT_TRAINING_ITERATIONS};

/// Configuration for fitting a sequence model
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub iterations: usize,
    /// Log the loss every `log_interval` iterations
    pub log_interval: usize,
    /// Stop as soon as the loss drops below this value
    pub target_loss: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            iterations: DEFAULT_TRAINING_ITERATIONS,
            log_interval: DEFAULT_LOG_INTERVAL,
            target_loss: None,
        }
    }
}

/// Summary of a training run
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrainingReport {
    /// Loss observed at every iteration, before the optimizer step
    pub loss_history: Vec<f64>,
    pub iterations_run: usize,
    pub stopped_early: bool,
    pub training_time_seconds: f64,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// Mean squared error, the loss used throughout training and evaluation
pub fn mse_loss<B: Backend, const D: usize>(
    predictions: Tensor<B, D>,
    targets: Tensor<B, D>,
) -> Tensor<B, 1> {
    let diff = predictions - targets;
    (diff.clone() * diff).mean()
}

fn check_target_shape<B: Backend, const D: usize>(
    predictions: &Tensor<B, D>,
    targets: &Tensor<B, D>,
) -> Result<()> {
    if predictions.dims() != targets.dims() {
        return Err(anyhow!(
            "target shape {:?} does not match model output shape {:?}",
            targets.dims(),
            predictions.dims()
        ));
    }
    Ok(())
}

/// Fit a sequence model to `targets` with Adam and an MSE loss
///
/// # Arguments
///
/// * `model` - Model to train, consumed and returned updated
/// * `inputs` - Input sequence in the layout the model expects
/// * `targets` - Expected output sequence, same shape as the model's output
/// * `config` - Optimizer and loop settings
///
/// # Returns
///
/// The trained model and a report of the run
pub fn train_sequence_model<B, M, const DT: usize>(
    mut model: M,
    inputs: Tensor<B, DT>,
    targets: Tensor<B, DT>,
    config: &TrainingConfig,
) -> Result<(M, TrainingReport)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + SequenceModel<B, DT>,
{
    info!(
        "Starting training: {} iterations, learning rate {}",
        config.iterations, config.learning_rate
    );
    let started = Instant::now();
    let mut optimizer = AdamConfig::new().init::<B, M>();
    let mut loss_history = Vec::with_capacity(config.iterations);
    let mut stopped_early = false;

    for iteration in 0..config.iterations {
        let predictions = model.forward(inputs.clone())?;
        check_target_shape(&predictions, &targets)?;

        let loss = mse_loss(predictions, targets.clone());
        let loss_value = loss.clone().into_scalar().elem::<f64>();
        loss_history.push(loss_value);

        if config.log_interval > 0 && iteration % config.log_interval == 0 {
            info!(
                "Step {} / {} - MSE is {:.6}",
                iteration, config.iterations, loss_value
            );
        }

        if config.target_loss.is_some_and(|target| loss_value < target) {
            info!(
                "Target loss reached at step {} (MSE = {:.6})",
                iteration, loss_value
            );
            stopped_early = true;
            break;
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optimizer.step(config.learning_rate, model, grads);
    }

    let report = TrainingReport {
        iterations_run: loss_history.len(),
        loss_history,
        stopped_early,
        training_time_seconds: started.elapsed().as_secs_f64(),
    };
    debug!(
        "Training finished after {} iterations in {:.2}s",
        report.iterations_run, report.training_time_seconds
    );
    Ok((model, report))
}

/// Evaluate a model on held-out data, returning the MSE
pub fn evaluate_sequence_model<B, M, const DT: usize>(
    model: &M,
    inputs: Tensor<B, DT>,
    targets: Tensor<B, DT>,
) -> Result<f64>
where
    B: Backend,
    M: SequenceModel<B, DT>,
{
    let predictions = model.forward(inputs)?;
    check_target_shape(&predictions, &targets)?;
    Ok(mse_loss(predictions, targets).into_scalar().elem::<f64>())
}
