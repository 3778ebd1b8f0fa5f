// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Evaluates a saved checkpoint on the test split of the run it
// came from. The run config supplies the corpora, ratios and
// seed, so the split is exactly the one `fit` held out; the
// run's tokenizer.json guarantees identical token ids.

use anyhow::{bail, Result};
use burn::prelude::*;
use std::path::PathBuf;

use crate::application::{run_dir_of, Accelerator, CpuBackend, GpuBackend};
use crate::data::{data_module::StanceDataModule, encoder::SimpleEncoder};
use crate::domain::stance::Stance;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::trainer::{evaluate, Evaluation};

pub struct TestUseCase {
    ckpt:        PathBuf,
    run_dir:     PathBuf,
    accelerator: Accelerator,
}

impl TestUseCase {
    pub fn new(ckpt: PathBuf, run_dir: Option<PathBuf>, accelerator: Accelerator) -> Self {
        let run_dir = run_dir_of(&ckpt, run_dir);
        Self { ckpt, run_dir, accelerator }
    }

    pub fn execute(&self) -> Result<Evaluation> {
        match self.accelerator {
            Accelerator::Gpu => self.run::<GpuBackend>(),
            Accelerator::Cpu => self.run::<CpuBackend>(),
        }
    }

    pub(crate) fn run<B: Backend>(&self) -> Result<Evaluation> {
        let device = B::Device::default();

        let run_cfg     = CheckpointManager::load_run_config(&self.run_dir)?;
        let (model, meta) = CheckpointManager::load::<B>(&self.ckpt, &device)?;

        let tokenizer = TokenizerStore::new(&self.run_dir).load()?;
        let encoder   = SimpleEncoder::new(tokenizer, meta.hyper_parameters.encoder.max_seq_len)?;

        let mut data = StanceDataModule::new(run_cfg.corpora, run_cfg.batch_size, run_cfg.seed);
        data.setup(&encoder)?;
        if data.test_dataset()?.sample_count() == 0 {
            bail!("The test split of '{}' is empty", self.run_dir.display());
        }

        let loader = data.test_dataloader::<B>(&device)?;
        evaluate(&model, &loader, meta.hyper_parameters.num_classes)
    }
}

/// Human-readable summary: loss, accuracy, macro F1 and per-class scores.
pub fn format_report(eval: &Evaluation) -> String {
    let cm = &eval.confusion;
    let mut out = format!(
        "test_loss={:.4} | test_accuracy={:.1}% | test_macro_f1={:.4}\n",
        eval.loss, eval.accuracy() * 100.0, eval.macro_f1()
    );
    out.push_str(&format!("{:<10} {:>9} {:>9} {:>9}\n", "class", "precision", "recall", "f1"));
    for class in 0..cm.num_classes() {
        let name = Stance::from_id(class).map(|s| s.label().to_string()).unwrap_or_else(|| class.to_string());
        out.push_str(&format!(
            "{:<10} {:>9.4} {:>9.4} {:>9.4}\n",
            name, cm.precision(class), cm.recall(class), cm.f1(class)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::ConfusionMatrix;

    #[test]
    fn test_report_lists_every_class() {
        let mut confusion = ConfusionMatrix::new(3);
        confusion.update(&[0, 1, 2], &[0, 1, 1]);
        let report = format_report(&Evaluation { loss: 0.5, confusion });

        assert!(report.starts_with("test_loss=0.5000"));
        for label in ["against", "favor", "neutral"] {
            assert!(report.contains(label));
        }
    }

    #[test]
    fn test_missing_run_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let uc  = TestUseCase::new(dir.path().join("x.ckpt"), None, Accelerator::Cpu);
        let err = uc.run::<CpuBackend>().unwrap_err();
        assert!(err.to_string().contains("run config"));
    }
}
