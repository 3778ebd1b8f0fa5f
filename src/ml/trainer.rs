// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop on top of Burn's DataLoader and Adam.
//
// Per epoch:
//   1. train pass     — weighted CE loss, backward, then TWO
//                       optimiser steps: encoder params at the
//                       encoder lr, head params at the head lr
//   2. validation     — model.valid() (inner backend, dropout off)
//                       → val_loss, val_accuracy, val_macro_f1
//   3. bookkeeping    — stdout line, metrics.csv row
//   4. callbacks      — ModelCheckpoint then EarlyStopping, both
//                       watching val_macro_f1 in max mode
//
// Generic over the autodiff backend so the same loop runs on
// Wgpu in production and NdArray in tests. Seeding the backend
// is the caller's job: it has to happen before the model is
// initialised.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::data_module::{StanceDataLoader, StanceDataModule};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::callbacks::{CallbackAction, EarlyStopping, ModelCheckpoint, MonitorMode, STOPPING_METRIC};
use crate::ml::metrics::ConfusionMatrix;
use crate::ml::model::{ParamGroups, StanceClassifier, StanceClassifierConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub max_epochs:   usize,
    pub patience:     usize,
    pub param_groups: ParamGroups,
    pub weight_decay: f32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_epochs:   1000,
            patience:     10,
            param_groups: ParamGroups::default(),
            weight_decay: 5e-5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub epochs_run:      usize,
    pub stopped_early:   bool,
    pub best_checkpoint: Option<PathBuf>,
    pub best_score:      Option<f64>,
}

/// Loss and confusion matrix of one pass over a dataloader.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub loss:      f64,
    pub confusion: ConfusionMatrix,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 { self.confusion.accuracy() }
    pub fn macro_f1(&self) -> f64 { self.confusion.macro_f1() }
}

fn to_usize_vec<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let v = t
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor: {e:?}"))?;
    Ok(v.into_iter().map(|x| x as usize).collect())
}

/// Run every batch of `loader` through `model` without gradients.
pub fn evaluate<B: Backend>(
    model:       &StanceClassifier<B>,
    loader:      &StanceDataLoader<B>,
    num_classes: usize,
) -> Result<Evaluation> {
    let mut loss_sum  = 0.0f64;
    let mut seen      = 0usize;
    let mut confusion = ConfusionMatrix::new(num_classes);

    for batch in loader.iter() {
        let batch_size = batch.labels.dims()[0];
        let out = model.forward_classification(batch);

        loss_sum += out.loss.into_scalar().elem::<f64>() * batch_size as f64;
        seen     += batch_size;

        // argmax(1) returns [batch, 1]; flatten to [batch]
        let predictions = to_usize_vec(out.logits.argmax(1).flatten::<1>(0, 1))?;
        let targets     = to_usize_vec(out.labels)?;
        confusion.update(&predictions, &targets);
    }

    let loss = if seen > 0 { loss_sum / seen as f64 } else { f64::NAN };
    Ok(Evaluation { loss, confusion })
}

pub fn fit<B: AutodiffBackend>(
    cfg:        &TrainerConfig,
    model_cfg:  &StanceClassifierConfig,
    mut model:  StanceClassifier<B>,
    data:       &StanceDataModule,
    checkpoint: &mut ModelCheckpoint,
    logger:     &MetricsLogger,
    device:     &B::Device,
) -> Result<FitReport> {
    let optim_cfg = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay)));
    let mut optim = optim_cfg.init::<B, StanceClassifier<B>>();
    let groups    = cfg.param_groups;

    let train_loader = data.train_dataloader::<B>(device)?;
    let val_loader   = data.val_dataloader::<B::InnerBackend>(device)?;

    let mut early_stopping = EarlyStopping::new(STOPPING_METRIC, cfg.patience, MonitorMode::Max);
    let mut epochs_run     = 0usize;
    let mut stopped_early  = false;

    for epoch in 1..=cfg.max_epochs {
        epochs_run = epoch;

        // ── Training phase ───────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let out = model.forward_classification(batch);
            train_loss_sum += out.loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            // One backward pass, two parameter groups
            let mut grads    = out.loss.backward();
            let encoder_grad = GradientsParams::from_module(&mut grads, &model.encoder);
            let head_grad    = GradientsParams::from_module(&mut grads, &model.classifier);
            model = optim.step(groups.encoder_lr, model, encoder_grad);
            model = optim.step(groups.classifier_lr, model, head_grad);
        }

        let train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ─────────────────────────────────────────────────
        let val = evaluate(&model.valid(), &val_loader, model_cfg.num_classes)?;

        let metrics = EpochMetrics::new(epoch, train_loss, val.loss, val.accuracy(), val.macro_f1());
        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}% | {}={:.4}",
            epoch, cfg.max_epochs, train_loss, val.loss,
            val.accuracy() * 100.0, STOPPING_METRIC, metrics.val_macro_f1,
        );
        logger.log(&metrics)?;

        // ── Callbacks ────────────────────────────────────────────────────────
        checkpoint.on_validation_end(epoch, metrics.val_macro_f1, &model, model_cfg)?;
        if early_stopping.on_epoch_end(metrics.val_macro_f1) == CallbackAction::Stop {
            stopped_early = true;
            break;
        }
    }

    let best = checkpoint.best();
    tracing::info!(
        "Training finished after {} epochs (best {}={})",
        epochs_run,
        STOPPING_METRIC,
        best.map(|b| format!("{:.4}", b.score)).unwrap_or_else(|| "n/a".into()),
    );

    Ok(FitReport {
        epochs_run,
        stopped_early,
        best_checkpoint: best.map(|b| b.path.clone()),
        best_score:      best.map(|b| b.score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::EncodedSample;
    use crate::domain::corpus::{CorpusType, DataRatio, SplitCorpus, StanceCorpus};
    use crate::domain::sample::StanceSample;
    use crate::domain::traits::SampleEncoder;
    use crate::infra::checkpoint::CheckpointManager;
    use crate::ml::backbone::TextEncoderConfig;
    use burn::backend::{Autodiff, NdArray};
    use std::io::Write;

    type TestBackend = Autodiff<NdArray>;

    /// Token id 1 for favor contexts, 2 for against: trivially separable.
    struct KeywordEncoder;

    impl SampleEncoder for KeywordEncoder {
        fn encode(&self, s: &StanceSample) -> anyhow::Result<EncodedSample> {
            let id = if s.context.contains("love") { 1 } else { 2 };
            Ok(EncodedSample { input_ids: vec![id, 3], label: s.stance.map(|x| x.id()), weight: 1.0 })
        }
        fn pad_id(&self) -> u32 { 0 }
    }

    fn tiny_model_cfg() -> StanceClassifierConfig {
        let enc = TextEncoderConfig::new(4)
            .with_max_seq_len(4).with_d_model(8).with_num_heads(2)
            .with_num_layers(1).with_d_ff(16).with_dropout(0.0);
        StanceClassifierConfig::for_stance(enc).with_classifier_dropout(0.0)
    }

    fn toy_data(dir: &tempfile::TempDir) -> StanceDataModule {
        let path = dir.path().join("toy.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for _ in 0..12 {
            writeln!(f, r#"{{"context":"i love it","target":"x","stance":"favor"}}"#).unwrap();
            writeln!(f, r#"{{"context":"i hate it","target":"x","stance":"against"}}"#).unwrap();
        }
        let corpus = SplitCorpus::new(
            StanceCorpus::new(path, CorpusType::Jsonl),
            DataRatio::new(0.5, 0.5, 0.0).unwrap(),
        );
        let mut dm = StanceDataModule::new(vec![corpus], 4, 1);
        dm.setup(&KeywordEncoder).unwrap();
        dm
    }

    #[test]
    fn test_fit_writes_best_checkpoint_and_metrics() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let data   = toy_data(&dir);

        let model_cfg = tiny_model_cfg();
        let model     = model_cfg.init::<TestBackend>(&device);
        let run_dir   = dir.path().join("run");
        let mut ckpt  = ModelCheckpoint::new(
            CheckpointManager::new(&run_dir).unwrap(), STOPPING_METRIC, MonitorMode::Max,
        );
        let logger = MetricsLogger::new(&run_dir).unwrap();

        let cfg = TrainerConfig {
            max_epochs: 3,
            patience: 10,
            param_groups: ParamGroups { encoder_lr: 1e-2, classifier_lr: 1e-2 },
            ..Default::default()
        };
        let report = fit(&cfg, &model_cfg, model, &data, &mut ckpt, &logger, &device).unwrap();

        assert_eq!(report.epochs_run, 3);
        assert!(!report.stopped_early);
        let best = report.best_checkpoint.unwrap();
        assert!(best.exists());

        let rows = std::fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(rows.lines().count(), 1 + 3);
    }

    fn values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_each_param_group_uses_its_own_learning_rate() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let data   = toy_data(&dir);

        let model_cfg = tiny_model_cfg();
        let model     = model_cfg.init::<TestBackend>(&device);
        let encoder_before = values(model.encoder.token_embedding.weight.val());
        let head_before    = values(model.classifier.output.weight.val());

        let run_dir  = dir.path().join("run");
        let mut ckpt = ModelCheckpoint::new(
            CheckpointManager::new(&run_dir).unwrap(), STOPPING_METRIC, MonitorMode::Max,
        );
        let logger = MetricsLogger::new(&run_dir).unwrap();

        // Frozen encoder, moving head
        let cfg = TrainerConfig {
            max_epochs: 1,
            param_groups: ParamGroups { encoder_lr: 0.0, classifier_lr: 1e-2 },
            ..Default::default()
        };
        let report = fit(&cfg, &model_cfg, model, &data, &mut ckpt, &logger, &device).unwrap();
        let (trained, _) = CheckpointManager::load::<NdArray>(&report.best_checkpoint.unwrap(), &device).unwrap();

        assert_eq!(values(trained.encoder.token_embedding.weight.val()), encoder_before);
        assert_ne!(values(trained.classifier.output.weight.val()), head_before);
    }

    #[test]
    fn test_patience_stops_training() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let data   = toy_data(&dir);

        let model_cfg = tiny_model_cfg();
        let model     = model_cfg.init::<TestBackend>(&device);
        let run_dir   = dir.path().join("run");
        let mut ckpt  = ModelCheckpoint::new(
            CheckpointManager::new(&run_dir).unwrap(), STOPPING_METRIC, MonitorMode::Max,
        );
        let logger = MetricsLogger::new(&run_dir).unwrap();

        // Zero learning rates: the score never moves, so patience runs out
        let cfg = TrainerConfig {
            max_epochs: 50,
            patience: 2,
            param_groups: ParamGroups { encoder_lr: 0.0, classifier_lr: 0.0 },
            weight_decay: 0.0,
            ..Default::default()
        };
        let report = fit(&cfg, &model_cfg, model, &data, &mut ckpt, &logger, &device).unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.epochs_run, 3);
    }

    #[test]
    fn test_evaluate_counts_every_sample() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let data   = toy_data(&dir);
        let model  = tiny_model_cfg().init::<NdArray>(&device);

        let loader = data.val_dataloader::<NdArray>(&device).unwrap();
        let eval   = evaluate(&model, &loader, 3).unwrap();
        assert_eq!(eval.confusion.total(), 12);
        assert!(eval.loss.is_finite());
    }
}
