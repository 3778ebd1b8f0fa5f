// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights with Burn's recorders.
//
// A checkpoint is TWO files with the same stem:
//   <stem>.ckpt   — binary record of every model parameter
//   <stem>.json   — CheckpointMeta: epoch, monitored score and
//                   the model hyper-parameters
//
// The sidecar is what makes a checkpoint self-describing: the
// loader rebuilds the exact architecture from it, then loads
// the weights into that model.
//
// Run directory layout:
//   runs/<name>/
//     epoch=07-val_macro_f1=0.641.ckpt / .json  ← current best
//     best_checkpoint.json                       ← pointer to it
//     encoder.json + encoder.bin                 ← best encoder alone
//     tokenizer.json                             ← tokenizer used
//     run_config.json                            ← resolved FitConfig
//     metrics.csv                                ← per-epoch metrics
//
// encoder.json/encoder.bin + tokenizer.json is exactly what a
// pretrained directory needs, so a finished run can seed the
// next one.
//
// `fit` claims its run directory with create_fresh, which
// refuses a directory that already holds files.
//
// Files are written to <path>.tmp and renamed into place so a
// crash mid-write never leaves a truncated checkpoint behind.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::fit_use_case::FitConfig;
use crate::ml::backbone::{TextEncoder, TextEncoderConfig};
use crate::ml::model::{StanceClassifier, StanceClassifierConfig};

const BEST_POINTER: &str = "best_checkpoint.json";
const RUN_CONFIG:   &str = "run_config.json";
const ENCODER_CFG:  &str = "encoder.json";
const ENCODER_BIN:  &str = "encoder.bin";

type ModelRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// Everything needed to rebuild a model before loading its weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch:            usize,
    pub monitor:          String,
    pub score:            f64,
    pub hyper_parameters: StanceClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub path:  PathBuf,
    pub epoch: usize,
    pub score: f64,
}

#[derive(Debug)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Like `new`, but refuses a directory that already has entries.
    /// Every `fit` starts from an empty run directory.
    pub fn create_fresh(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() {
            let mut entries = fs::read_dir(&dir)
                .with_context(|| format!("Cannot read run directory '{}'", dir.display()))?;
            if entries.next().is_some() {
                bail!(
                    "Run directory '{}' is not empty; pass a new --run-dir or remove the old run",
                    dir.display()
                );
            }
        }
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<stem>.ckpt` and `<stem>.json`. Returns the .ckpt path.
    pub fn save<B: Backend>(
        &self,
        stem:  &str,
        model: &StanceClassifier<B>,
        meta:  &CheckpointMeta,
    ) -> Result<PathBuf> {
        let ckpt_path = self.dir.join(format!("{stem}.ckpt"));
        let meta_path = self.dir.join(format!("{stem}.json"));

        let bytes = ModelRecorder::default()
            .record(model.clone().into_record(), ())
            .with_context(|| format!("Failed to serialise checkpoint '{}'", ckpt_path.display()))?;
        persist(&ckpt_path, &bytes)?;
        persist(&meta_path, serde_json::to_string_pretty(meta)?.as_bytes())?;

        tracing::debug!("Saved checkpoint '{}'", ckpt_path.display());
        Ok(ckpt_path)
    }

    /// Rebuild the model described by the sidecar next to `ckpt_path`
    /// and load the weights into it.
    pub fn load<B: Backend>(
        ckpt_path: &Path,
        device:    &B::Device,
    ) -> Result<(StanceClassifier<B>, CheckpointMeta)> {
        let meta = Self::load_meta(ckpt_path)?;

        let bytes = fs::read(ckpt_path)
            .with_context(|| format!("Cannot read checkpoint '{}'", ckpt_path.display()))?;
        let record = ModelRecorder::default()
            .load(bytes, device)
            .with_context(|| format!(
                "Checkpoint '{}' does not match its hyper-parameters", ckpt_path.display()
            ))?;

        let model = meta.hyper_parameters.init::<B>(device).load_record(record);
        tracing::info!("Loaded checkpoint '{}' (epoch {})", ckpt_path.display(), meta.epoch);
        Ok((model, meta))
    }

    pub fn load_meta(ckpt_path: &Path) -> Result<CheckpointMeta> {
        let meta_path = ckpt_path.with_extension("json");
        let json = fs::read_to_string(&meta_path)
            .with_context(|| format!(
                "Cannot read checkpoint metadata '{}'. Is '{}' a checkpoint written by `fit`?",
                meta_path.display(), ckpt_path.display()
            ))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Delete a checkpoint and its sidecar.
    pub fn remove(ckpt_path: &Path) -> Result<()> {
        for path in [ckpt_path.to_path_buf(), ckpt_path.with_extension("json")] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove '{}'", path.display()))?;
            }
        }
        Ok(())
    }

    pub fn set_best(&self, best: &BestCheckpoint) -> Result<()> {
        persist(&self.dir.join(BEST_POINTER), serde_json::to_string_pretty(best)?.as_bytes())
    }

    /// None until the first checkpoint of a run has been saved.
    pub fn best(&self) -> Result<Option<BestCheckpoint>> {
        let path = self.dir.join(BEST_POINTER);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    // ── Encoder export (pretrained directory format) ────────────────────────

    pub fn save_encoder<B: Backend>(&self, encoder: &TextEncoder<B>, cfg: &TextEncoderConfig) -> Result<()> {
        let bytes = ModelRecorder::default()
            .record(encoder.clone().into_record(), ())
            .context("Failed to serialise encoder")?;
        persist(&self.dir.join(ENCODER_BIN), &bytes)?;
        persist(&self.dir.join(ENCODER_CFG), serde_json::to_string_pretty(cfg)?.as_bytes())?;
        tracing::info!("Exported encoder to '{}'", self.dir.display());
        Ok(())
    }

    /// Load `encoder.json` + `encoder.bin` from a pretrained directory.
    /// Ok(None) when the directory holds no encoder weights.
    pub fn load_encoder<B: Backend>(
        dir:    &Path,
        device: &B::Device,
    ) -> Result<Option<(TextEncoder<B>, TextEncoderConfig)>> {
        let cfg_path = dir.join(ENCODER_CFG);
        let bin_path = dir.join(ENCODER_BIN);
        if !cfg_path.exists() || !bin_path.exists() {
            return Ok(None);
        }

        let cfg: TextEncoderConfig = serde_json::from_str(
            &fs::read_to_string(&cfg_path)
                .with_context(|| format!("Cannot read '{}'", cfg_path.display()))?,
        )?;
        let bytes = fs::read(&bin_path)
            .with_context(|| format!("Cannot read '{}'", bin_path.display()))?;
        let record = ModelRecorder::default()
            .load(bytes, device)
            .with_context(|| format!("'{}' does not match '{}'", bin_path.display(), cfg_path.display()))?;

        Ok(Some((cfg.init::<B>(device).load_record(record), cfg)))
    }

    // ── Run configuration ───────────────────────────────────────────────────

    pub fn save_run_config(&self, cfg: &FitConfig) -> Result<()> {
        let path = self.dir.join(RUN_CONFIG);
        persist(&path, serde_json::to_string_pretty(cfg)?.as_bytes())?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_run_config(dir: &Path) -> Result<FitConfig> {
        let path = dir.join(RUN_CONFIG);
        let json = fs::read_to_string(&path)
            .with_context(|| format!(
                "Cannot read run config '{}'. Pass --run-dir pointing at a `fit` output directory.",
                path.display()
            ))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Write via a temporary file and rename into place.
fn persist(path: &Path, payload: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, payload)
        .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}
