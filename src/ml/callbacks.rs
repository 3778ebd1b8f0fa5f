// ============================================================
// Layer 5 — Training Callbacks
// ============================================================
// Epoch-end callbacks driven by a monitored validation metric.
//
//   EarlyStopping   — halts training once the metric stops
//                     improving for `patience` epochs
//   ModelCheckpoint — keeps exactly one checkpoint on disk,
//                     the best one seen so far

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use burn::prelude::Backend;

use crate::infra::checkpoint::{BestCheckpoint, CheckpointManager, CheckpointMeta};
use crate::ml::model::{StanceClassifier, StanceClassifierConfig};

/// The metric every callback watches unless told otherwise.
pub const STOPPING_METRIC: &str = "val_macro_f1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    Min,
    Max,
}

impl MonitorMode {
    /// Strict improvement. NaN never improves on anything.
    pub fn is_better(self, candidate: f64, best: Option<f64>) -> bool {
        if candidate.is_nan() {
            return false;
        }
        match (self, best) {
            (_, None)                 => true,
            (MonitorMode::Max, Some(b)) => candidate > b,
            (MonitorMode::Min, Some(b)) => candidate < b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Stop,
}

// ─── EarlyStopping ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor:  String,
    mode:     MonitorMode,
    patience: usize,
    best:     Option<f64>,
    wait:     usize,
}

impl EarlyStopping {
    pub fn new(monitor: impl Into<String>, patience: usize, mode: MonitorMode) -> Self {
        Self { monitor: monitor.into(), mode, patience, best: None, wait: 0 }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn on_epoch_end(&mut self, score: f64) -> CallbackAction {
        if self.mode.is_better(score, self.best) {
            self.best = Some(score);
            self.wait = 0;
            return CallbackAction::Continue;
        }

        self.wait += 1;
        if self.wait >= self.patience {
            tracing::info!(
                "Early stopping: {} did not improve for {} epochs (best {:.4})",
                self.monitor, self.patience, self.best.unwrap_or(f64::NAN)
            );
            CallbackAction::Stop
        } else {
            CallbackAction::Continue
        }
    }
}

// ─── ModelCheckpoint ─────────────────────────────────────────────────────────
pub struct ModelCheckpoint {
    manager: CheckpointManager,
    monitor: String,
    mode:    MonitorMode,
    best:    Option<BestCheckpoint>,
}

impl ModelCheckpoint {
    pub fn new(manager: CheckpointManager, monitor: impl Into<String>, mode: MonitorMode) -> Self {
        Self { manager, monitor: monitor.into(), mode, best: None }
    }

    pub fn manager(&self) -> &CheckpointManager {
        &self.manager
    }

    pub fn best(&self) -> Option<&BestCheckpoint> {
        self.best.as_ref()
    }

    /// e.g. `epoch=07-val_macro_f1=0.641`
    pub fn filename(&self, epoch: usize, score: f64) -> String {
        format!("epoch={:02}-{}={:.3}", epoch, self.monitor, score)
    }

    /// Save the model if `score` beats the best so far, replacing the
    /// previous best. Returns the new path when a save happened.
    pub fn on_validation_end<B: Backend>(
        &mut self,
        epoch: usize,
        score: f64,
        model: &StanceClassifier<B>,
        hyper_parameters: &StanceClassifierConfig,
    ) -> Result<Option<PathBuf>> {
        if !self.mode.is_better(score, self.best.as_ref().map(|b| b.score)) {
            return Ok(None);
        }

        let meta = CheckpointMeta {
            epoch,
            monitor: self.monitor.clone(),
            score,
            hyper_parameters: hyper_parameters.clone(),
        };
        let path = self.manager.save(&self.filename(epoch, score), model, &meta)?;

        if let Some(previous) = self.best.take() {
            if previous.path != path {
                CheckpointManager::remove(&previous.path)?;
            }
        }

        let best = BestCheckpoint { path: path.clone(), epoch, score };
        self.manager.set_best(&best)?;
        tracing::info!("New best {}={:.4} at epoch {} → '{}'", self.monitor, score, epoch, path.display());
        self.best = Some(best);
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::backbone::TextEncoderConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_mode_comparisons() {
        assert!(MonitorMode::Max.is_better(0.5, None));
        assert!(MonitorMode::Max.is_better(0.6, Some(0.5)));
        assert!(!MonitorMode::Max.is_better(0.5, Some(0.5)));
        assert!(MonitorMode::Min.is_better(0.4, Some(0.5)));
        assert!(!MonitorMode::Max.is_better(f64::NAN, None));
    }

    #[test]
    fn test_early_stopping_patience() {
        let mut es = EarlyStopping::new(STOPPING_METRIC, 3, MonitorMode::Max);
        assert_eq!(es.on_epoch_end(0.40), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(0.50), CallbackAction::Continue);
        // Three epochs without strict improvement
        assert_eq!(es.on_epoch_end(0.50), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(0.45), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(0.49), CallbackAction::Stop);
        assert_eq!(es.best(), Some(0.50));
    }

    #[test]
    fn test_early_stopping_resets_on_improvement() {
        let mut es = EarlyStopping::new(STOPPING_METRIC, 2, MonitorMode::Max);
        es.on_epoch_end(0.1);
        es.on_epoch_end(0.1);
        assert_eq!(es.on_epoch_end(0.2), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(0.2), CallbackAction::Continue);
        assert_eq!(es.on_epoch_end(f64::NAN), CallbackAction::Stop);
    }

    #[test]
    fn test_checkpoint_keeps_only_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = ModelCheckpoint::new(
            CheckpointManager::new(dir.path()).unwrap(), STOPPING_METRIC, MonitorMode::Max,
        );
        let enc = TextEncoderConfig::new(8)
            .with_max_seq_len(4).with_d_model(4).with_num_heads(1)
            .with_num_layers(1).with_d_ff(8);
        let cfg   = StanceClassifierConfig::for_stance(enc);
        let model = cfg.init::<NdArray>(&Default::default());

        let first = cb.on_validation_end(1, 0.30, &model, &cfg).unwrap().unwrap();
        assert!(first.ends_with("epoch=01-val_macro_f1=0.300.ckpt"));

        assert!(cb.on_validation_end(2, 0.25, &model, &cfg).unwrap().is_none());
        assert!(first.exists());

        let second = cb.on_validation_end(3, 0.42, &model, &cfg).unwrap().unwrap();
        assert!(second.exists());
        assert!(!first.exists());
        assert_eq!(cb.manager().best().unwrap().unwrap().epoch, 3);
    }
}
