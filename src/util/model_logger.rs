use std::fs;
use std::path::{Path, PathBuf};
use chrono::Local;
use serde::{Serialize, Deserialize};
use anyhow::Result;

use crate::constants::EXPERIMENT_DIR;
use crate::convgru::step_4_train_model::TrainingReport;

/// JSON record of one training run, kept next to other runs for comparison
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrainingRun {
    pub timestamp: String,
    pub model_type: String,
    pub input_channels: usize,
    pub hidden_channels: usize,
    pub time_steps: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub iterations_run: usize,
    pub train_mse: Option<f64>,
    pub test_mse: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub checkpoint: Option<PathBuf>,
    pub notes: String,
}

impl TrainingRun {
    pub fn new(
        model_type: &str,
        input_channels: usize,
        hidden_channels: usize,
        time_steps: usize,
        batch_size: usize,
        learning_rate: f64,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            model_type: model_type.to_string(),
            input_channels,
            hidden_channels,
            time_steps,
            batch_size,
            learning_rate,
            iterations_run: 0,
            train_mse: None,
            test_mse: None,
            training_time_seconds: None,
            checkpoint: None,
            notes: "".to_string(),
        }
    }

    /// Copies the outcome of a finished training loop into the record
    pub fn record_training(&mut self, report: &TrainingReport) {
        self.iterations_run = report.iterations_run;
        self.train_mse = report.final_loss();
        self.training_time_seconds = Some(report.training_time_seconds);
        if report.stopped_early {
            self.add_note("stopped early after reaching the target loss");
        }
    }

    pub fn set_test_mse(&mut self, mse: f64) {
        self.test_mse = Some(mse);
    }

    pub fn set_checkpoint(&mut self, path: &Path) {
        self.checkpoint = Some(path.to_path_buf());
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    pub fn save(&self, experiment_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(experiment_dir)?;

        let filename = format!(
            "{}_c{}_h{}_t{}_run.json",
            self.model_type, self.input_channels, self.hidden_channels, self.time_steps,
        );
        let file_path = experiment_dir.join(filename);

        let json = serde_json::to_string_pretty(&self)?;
        fs::write(&file_path, json)?;

        Ok(file_path)
    }
}

/// Creates a timestamped directory for this run under `root`
pub fn create_experiment_dir(root: &Path) -> Result<PathBuf> {
    let dir = root
        .join(EXPERIMENT_DIR)
        .join(Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
