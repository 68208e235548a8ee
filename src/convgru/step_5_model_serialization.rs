// External imports
use anyhow::{anyhow, Context, Result};
use burn::config::Config;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Internal imports
use super::step_3_convgru_sequence::{ConvGru1d, ConvGru1dConfig, ConvGru2d, ConvGru2dConfig};
use crate::built_info;
use crate::error::ConvGruError;

type Recorder = BinFileRecorder<FullPrecisionSettings>;

/// Which layer a checkpoint holds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    ConvGru1d,
    ConvGru2d,
}

/// # Checkpoint Metadata
///
/// Saved next to the binary record so a checkpoint can be identified
/// without loading it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CheckpointMetadata {
    pub kind: ModelKind,

    /// Version of this crate that wrote the checkpoint
    pub crate_version: String,

    /// Compiler that built the writer
    pub rustc_version: String,

    /// Unix timestamp when the checkpoint was saved
    pub timestamp: u64,

    /// Human-readable description of the model
    pub description: String,
}

impl CheckpointMetadata {
    pub fn new(kind: ModelKind, description: &str) -> Self {
        Self {
            kind,
            crate_version: built_info::PKG_VERSION.to_string(),
            rustc_version: built_info::RUSTC_VERSION.to_string(),
            timestamp: Utc::now().timestamp().max(0) as u64,
            description: description.to_string(),
        }
    }
}

/// File layout of a checkpoint: `{stem}.bin`, `{stem}_config.json`,
/// `{stem}_meta.json`, all in the same directory.
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    /// Record path without extension, as the burn recorder expects it
    pub record: PathBuf,
    pub config: PathBuf,
    pub metadata: PathBuf,
}

impl CheckpointPaths {
    /// Accepts either the stem or the `.bin` file path.
    pub fn new(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context(format!("Invalid checkpoint path: {}", path.display()))?;
        let stem = if path.extension().is_some_and(|ext| ext == "bin") {
            stem.to_string()
        } else {
            path.file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(stem)
                .to_string()
        };
        let parent = path.parent().unwrap_or_else(|| Path::new(""));

        Ok(Self {
            record: parent.join(&stem),
            config: parent.join(format!("{}_config.json", stem)),
            metadata: parent.join(format!("{}_meta.json", stem)),
        })
    }

    pub fn record_file(&self) -> PathBuf {
        self.record.with_extension("bin")
    }
}

/// Save a model, its configuration and metadata
///
/// # Returns
///
/// The path of the binary record
pub fn save_checkpoint<B, M, C>(
    model: &M,
    config: &C,
    metadata: &CheckpointMetadata,
    path: &Path,
) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
    C: Config,
{
    let paths = CheckpointPaths::new(path)?;
    if let Some(parent) = paths.record.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create checkpoint directory")?;
        }
    }

    model
        .clone()
        .save_file::<Recorder, _>(paths.record.clone(), &Default::default())
        .context(format!(
            "Failed to save model record to {}",
            paths.record_file().display()
        ))?;

    config.save(&paths.config).context(format!(
        "Failed to save model config to {}",
        paths.config.display()
    ))?;

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    fs::write(&paths.metadata, metadata_json).context(format!(
        "Failed to save checkpoint metadata to {}",
        paths.metadata.display()
    ))?;

    info!(
        "Saved {:?} checkpoint to {} with metadata at {}",
        metadata.kind,
        paths.record_file().display(),
        paths.metadata.display()
    );
    Ok(paths.record_file())
}

/// Read checkpoint metadata, if present
pub fn load_metadata(path: &Path) -> Result<Option<CheckpointMetadata>> {
    let paths = CheckpointPaths::new(path)?;
    if !paths.metadata.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&paths.metadata)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn load_checkpoint<B, M, C, F>(
    path: &Path,
    kind: ModelKind,
    device: &B::Device,
    build: F,
) -> Result<(M, Option<CheckpointMetadata>)>
where
    B: Backend,
    M: Module<B>,
    C: Config,
    F: FnOnce(&C, &B::Device) -> Result<M, ConvGruError>,
{
    let paths = CheckpointPaths::new(path)?;
    if !paths.record_file().exists() {
        return Err(anyhow!(
            "Model file not found: {}",
            paths.record_file().display()
        ));
    }

    let metadata = load_metadata(path)?;
    match &metadata {
        Some(meta) if meta.kind != kind => {
            return Err(anyhow!(
                "Checkpoint {} holds a {:?}, not a {:?}",
                paths.record_file().display(),
                meta.kind,
                kind
            ));
        }
        Some(_) => {}
        None => warn!(
            "No metadata found for {}, relying on the saved config",
            paths.record_file().display()
        ),
    }

    let config = C::load(&paths.config)
        .map_err(|e| anyhow!("Failed to read config {}: {:?}", paths.config.display(), e))?;
    let model = build(&config, device)?
        .load_file(paths.record.clone(), &Recorder::new(), device)
        .context(format!(
            "Failed to load model record from {}",
            paths.record_file().display()
        ))?;

    info!("Loaded {:?} from {}", kind, paths.record_file().display());
    Ok((model, metadata))
}

/// Load a [`ConvGru1d`] checkpoint onto `device`
pub fn load_convgru1d<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(ConvGru1d<B>, Option<CheckpointMetadata>)> {
    load_checkpoint(path, ModelKind::ConvGru1d, device, |config: &ConvGru1dConfig, device| {
        config.init(device)
    })
}

/// Load a [`ConvGru2d`] checkpoint onto `device`
pub fn load_convgru2d<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(ConvGru2d<B>, Option<CheckpointMetadata>)> {
    load_checkpoint(path, ModelKind::ConvGru2d, device, |config: &ConvGru2dConfig, device| {
        config.init(device)
    })
}
