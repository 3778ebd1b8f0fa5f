// ============================================================
// Layer 2 — FitUseCase
// ============================================================
// Orchestrates a full training run:
//
//   Step 1: Claim an empty run dir, seed backend  (Layer 5/6)
//   Step 2: Load pretrained encoder, if any       (Layer 6 - infra)
//   Step 3: Parse and split corpora               (Layer 4 - data)
//   Step 4: Resolve tokenizer into the run dir    (Layer 6 - infra)
//   Step 5: Encode the splits                     (Layer 4 - data)
//   Step 6: Build the classifier                  (Layer 5 - ml)
//   Step 7: Save run_config.json                  (Layer 6 - infra)
//   Step 8: Train with checkpoint + early stop    (Layer 5 - ml)
//   Step 9: Reload best checkpoint, export its
//           encoder, evaluate on the test split   (Layer 5/6)
//
// A fallback vocabulary only sees the train split.

use anyhow::{bail, Result};
use burn::{module::Module, prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::{Accelerator, CpuTrainBackend, GpuTrainBackend};
use crate::data::{
    data_module::{StanceDataModule, DEFAULT_BATCH_SIZE},
    encoder::SimpleEncoder,
};
use crate::domain::corpus::SplitCorpus;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    backbone::TextEncoderConfig,
    callbacks::{ModelCheckpoint, MonitorMode, STOPPING_METRIC},
    model::StanceClassifierConfig,
    trainer::{evaluate, fit, Evaluation, FitReport, TrainerConfig},
};

// ─── Configuration ───────────────────────────────────────────────────────────
/// Architecture used when no pretrained encoder is supplied. The
/// classifier head settings always apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub max_seq_len:             usize,
    pub d_model:                 usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub d_ff:                    usize,
    pub dropout:                 f64,
    pub classifier_hidden_units: Option<usize>,
    pub classifier_dropout:      f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            max_seq_len:             128,
            d_model:                 256,
            num_heads:               8,
            num_layers:              4,
            d_ff:                    1024,
            dropout:                 0.1,
            classifier_hidden_units: None,
            classifier_dropout:      0.1,
        }
    }
}

impl ModelSettings {
    pub fn encoder_config(&self, vocab_size: usize) -> TextEncoderConfig {
        TextEncoderConfig::new(vocab_size)
            .with_max_seq_len(self.max_seq_len)
            .with_d_model(self.d_model)
            .with_num_heads(self.num_heads)
            .with_num_layers(self.num_layers)
            .with_d_ff(self.d_ff)
            .with_dropout(self.dropout)
    }
}

/// Everything a `fit` run needs. Saved as run_config.json and
/// accepted back through `--config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub corpora:     Vec<SplitCorpus>,
    pub run_dir:     PathBuf,
    /// Directory with tokenizer.json and optionally encoder.json + encoder.bin
    pub pretrained:  Option<PathBuf>,
    pub batch_size:  usize,
    pub num_workers: usize,
    pub seed:        u64,
    /// Vocabulary size of the word-level fallback tokenizer
    pub vocab_size:  usize,
    pub model:       ModelSettings,
    pub trainer:     TrainerConfig,
    pub accelerator: Accelerator,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            corpora:     Vec::new(),
            run_dir:     PathBuf::from("runs/stance"),
            pretrained:  None,
            batch_size:  DEFAULT_BATCH_SIZE,
            num_workers: 1,
            seed:        42,
            vocab_size:  30_000,
            model:       ModelSettings::default(),
            trainer:     TrainerConfig::default(),
            accelerator: Accelerator::default(),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.corpora.is_empty() {
            bail!("No corpora given; pass at least one --corpus TYPE:PATH");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.trainer.max_epochs == 0 {
            bail!("max_epochs must be positive");
        }
        let m = &self.model;
        if m.num_heads == 0 || m.d_model % m.num_heads != 0 {
            bail!("d_model ({}) must be divisible by num_heads ({})", m.d_model, m.num_heads);
        }
        if m.max_seq_len < 3 {
            bail!("max_seq_len must leave room for the special tokens");
        }
        Ok(())
    }
}

// ─── FitUseCase ──────────────────────────────────────────────────────────────
#[derive(Debug)]
pub struct FitOutcome {
    pub report: FitReport,
    /// None when every corpus has a zero test ratio.
    pub test:   Option<Evaluation>,
}

pub struct FitUseCase {
    config: FitConfig,
}

impl FitUseCase {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FitOutcome> {
        self.config.validate()?;
        tracing::info!("Training on {} ({})", self.config.accelerator, self.config.run_dir.display());
        match self.config.accelerator {
            Accelerator::Gpu => self.run::<GpuTrainBackend>(),
            Accelerator::Cpu => self.run::<CpuTrainBackend>(),
        }
    }

    pub(crate) fn run<B: AutodiffBackend>(&self) -> Result<FitOutcome> {
        let cfg    = &self.config;
        let device = B::Device::default();

        // ── Step 1: Run dir + seed ────────────────────────────────────────────
        let manager = CheckpointManager::create_fresh(&cfg.run_dir)?;
        B::seed(cfg.seed);

        // ── Step 2: Pretrained encoder ────────────────────────────────────────
        let pretrained_encoder = match &cfg.pretrained {
            Some(dir) => CheckpointManager::load_encoder::<B>(dir, &device)?,
            None      => None,
        };
        let max_seq_len = pretrained_encoder
            .as_ref()
            .map(|(_, enc_cfg)| enc_cfg.max_seq_len)
            .unwrap_or(cfg.model.max_seq_len);

        // ── Step 3: Parse + split ─────────────────────────────────────────────
        let mut data = StanceDataModule::new(cfg.corpora.clone(), cfg.batch_size, cfg.seed)
            .with_num_workers(cfg.num_workers);
        data.prepare()?;

        // ── Step 4: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.run_dir).resolve(
            cfg.pretrained.as_deref(),
            || data.train_texts(),
            cfg.vocab_size,
        )?;
        let encoder = SimpleEncoder::new(tokenizer, max_seq_len)?;

        // ── Step 5: Encode ────────────────────────────────────────────────────
        data.setup(&encoder)?;
        if data.train_dataset()?.sample_count() == 0 {
            bail!("The training split is empty; check the corpora and their data ratios");
        }

        // ── Step 6: Model ─────────────────────────────────────────────────────
        let (model_cfg, model) = match pretrained_encoder {
            Some((text_encoder, enc_cfg)) => {
                if encoder.vocab_size() > enc_cfg.vocab_size {
                    bail!(
                        "Tokenizer has {} ids but the pretrained encoder only embeds {}",
                        encoder.vocab_size(), enc_cfg.vocab_size
                    );
                }
                tracing::info!("Initialising from pretrained encoder (d_model={})", enc_cfg.d_model);
                let model_cfg = self.classifier_config(enc_cfg);
                let model     = model_cfg.init_with_encoder::<B>(text_encoder, &device);
                (model_cfg, model)
            }
            None => {
                if cfg.pretrained.is_some() {
                    tracing::warn!("No encoder weights in the pretrained directory; encoder starts from random init");
                }
                let model_cfg = self.classifier_config(cfg.model.encoder_config(encoder.vocab_size()));
                let model     = model_cfg.init::<B>(&device);
                (model_cfg, model)
            }
        };
        tracing::info!("Model has {} parameters", model.num_params());

        // ── Step 7: Run config ────────────────────────────────────────────────
        manager.save_run_config(cfg)?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let logger         = MetricsLogger::new(&cfg.run_dir)?;
        let mut checkpoint = ModelCheckpoint::new(manager, STOPPING_METRIC, MonitorMode::Max);
        let report = fit(&cfg.trainer, &model_cfg, model, &data, &mut checkpoint, &logger, &device)?;

        // ── Step 9: Best checkpoint → encoder export + test ───────────────────
        let Some(best_path) = report.best_checkpoint.clone() else {
            tracing::warn!("No checkpoint was saved; {} never produced a score", STOPPING_METRIC);
            return Ok(FitOutcome { report, test: None });
        };
        let (best, _) = CheckpointManager::load::<B::InnerBackend>(&best_path, &device)?;
        checkpoint.manager().save_encoder(&best.encoder, &model_cfg.encoder)?;

        if data.test_dataset()?.sample_count() == 0 {
            tracing::info!("Test split is empty, skipping test");
            return Ok(FitOutcome { report, test: None });
        }
        let loader = data.test_dataloader::<B::InnerBackend>(&device)?;
        let test   = evaluate(&best, &loader, model_cfg.num_classes)?;
        Ok(FitOutcome { report, test: Some(test) })
    }

    fn classifier_config(&self, encoder: TextEncoderConfig) -> StanceClassifierConfig {
        StanceClassifierConfig::for_stance(encoder)
            .with_classifier_hidden_units(self.config.model.classifier_hidden_units)
            .with_classifier_dropout(self.config.model.classifier_dropout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_use_case::TestUseCase;
    use crate::domain::corpus::{CorpusType, DataRatio, StanceCorpus};
    use crate::infra::metrics::METRICS_FILE;
    use crate::infra::tokenizer_store::TOKENIZER_FILE;
    use crate::ml::model::ParamGroups;
    use std::io::Write;

    fn toy_corpus(dir: &std::path::Path) -> SplitCorpus {
        let path = dir.join("toy.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for i in 0..10 {
            writeln!(f, r#"{{"context":"i love solar power {i}","target":"solar","stance":"favor"}}"#).unwrap();
            writeln!(f, r#"{{"context":"solar farms are a scam {i}","target":"solar","stance":"against"}}"#).unwrap();
            writeln!(f, r#"{{"context":"the report covers solar {i}","target":"solar","stance":"none"}}"#).unwrap();
        }
        SplitCorpus::new(StanceCorpus::new(path, CorpusType::Jsonl), DataRatio::new(0.6, 0.2, 0.2).unwrap())
    }

    /// 30 samples, each context carrying its own word `{tag}{i}`.
    fn tagged_corpus(dir: &std::path::Path, name: &str, tag: &str) -> SplitCorpus {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        let stances = ["favor", "against", "none"];
        for i in 0..30 {
            writeln!(f, r#"{{"context":"solar is here {tag}{i}","target":"solar","stance":"{}"}}"#, stances[i % 3]).unwrap();
        }
        SplitCorpus::new(StanceCorpus::new(path, CorpusType::Jsonl), DataRatio::new(0.6, 0.2, 0.2).unwrap())
    }

    fn tiny_config(dir: &std::path::Path) -> FitConfig {
        FitConfig {
            corpora:     vec![toy_corpus(dir)],
            run_dir:     dir.join("run"),
            batch_size:  8,
            vocab_size:  100,
            model: ModelSettings {
                max_seq_len: 16, d_model: 8, num_heads: 2, num_layers: 1, d_ff: 16,
                dropout: 0.0, classifier_hidden_units: Some(4), classifier_dropout: 0.0,
            },
            trainer: TrainerConfig {
                max_epochs: 2,
                param_groups: ParamGroups { encoder_lr: 1e-3, classifier_lr: 1e-2 },
                ..Default::default()
            },
            accelerator: Accelerator::Cpu,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_json_round_trip_with_defaults() {
        let cfg: FitConfig = serde_json::from_str(
            r#"{"corpora":[{"path":"a.tsv","corpus_type":"semeval2016"}],"trainer":{"patience":3}}"#,
        ).unwrap();
        assert_eq!(cfg.corpora[0].data_ratio, DataRatio::default());
        assert_eq!(cfg.trainer.patience, 3);
        assert_eq!(cfg.trainer.max_epochs, 1000);
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);

        let back: FitConfig = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back.corpora, cfg.corpora);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(FitConfig::default().validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        assert!(cfg.validate().is_ok());
        cfg.model.num_heads = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_vocabulary_sees_only_the_train_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        cfg.corpora = vec![tagged_corpus(dir.path(), "a.jsonl", "alpha")];
        cfg.trainer.max_epochs = 1;
        FitUseCase::new(cfg.clone()).run::<CpuTrainBackend>().unwrap();

        let tok = TokenizerStore::new(&cfg.run_dir).load().unwrap();
        let tagged = tok.get_vocab(false).keys().filter(|w| w.starts_with("alpha")).count();
        // 30 samples at 0.6/0.2/0.2 → 18 in the train split
        assert_eq!(tagged, 18);
    }

    #[test]
    fn test_second_fit_into_same_run_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        cfg.corpora = vec![tagged_corpus(dir.path(), "a.jsonl", "alpha")];
        cfg.trainer.max_epochs = 1;
        FitUseCase::new(cfg.clone()).run::<CpuTrainBackend>().unwrap();

        let mut again = cfg.clone();
        again.corpora = vec![tagged_corpus(dir.path(), "b.jsonl", "beta")];
        let err = FitUseCase::new(again).run::<CpuTrainBackend>().unwrap_err();
        assert!(err.to_string().contains("not empty"), "{err}");

        // The first run is left as it was
        let tok = TokenizerStore::new(&cfg.run_dir).load().unwrap();
        assert!(tok.get_vocab(false).keys().all(|w| !w.starts_with("beta")));
        let rows = std::fs::read_to_string(cfg.run_dir.join(METRICS_FILE)).unwrap();
        assert_eq!(rows.lines().count(), 1 + 1);
    }

    #[test]
    fn test_fit_end_to_end_on_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let outcome = FitUseCase::new(cfg.clone()).run::<CpuTrainBackend>().unwrap();

        assert_eq!(outcome.report.epochs_run, 2);
        let best = outcome.report.best_checkpoint.unwrap();
        assert!(best.exists());

        let run = &cfg.run_dir;
        for file in [TOKENIZER_FILE, METRICS_FILE, "run_config.json", "best_checkpoint.json", "encoder.json", "encoder.bin"] {
            assert!(run.join(file).exists(), "missing {file}");
        }

        // 30 samples at 0.6/0.2/0.2 → 6 in the test split
        let test = outcome.test.unwrap();
        assert_eq!(test.confusion.total(), 6);

        // `test` rebuilds the same held-out split from run_config.json
        let again = TestUseCase::new(best.clone(), None, Accelerator::Cpu)
            .run::<crate::application::CpuBackend>()
            .unwrap();
        assert_eq!(again.confusion, test.confusion);

        // The run directory works as a pretrained directory
        let mut second = tiny_config(dir.path());
        second.run_dir    = dir.path().join("run2");
        second.pretrained = Some(run.clone());
        second.model.d_model = 16;
        let outcome = FitUseCase::new(second).run::<CpuTrainBackend>().unwrap();
        let (model, meta) = CheckpointManager::load::<crate::application::CpuBackend>(
            &outcome.report.best_checkpoint.unwrap(), &Default::default(),
        ).unwrap();
        // Architecture came from encoder.json, not from the settings
        assert_eq!(meta.hyper_parameters.encoder.d_model, 8);
        assert_eq!(model.feature_size(), 8);
    }
}
