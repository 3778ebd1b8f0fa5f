// ============================================================
// Layer 2 — EmbedUseCase
// ============================================================
// Checkpoint + one corpus → pooled encoder features → .npy
//
// Row i of the output belongs to the i-th sample the parser
// kept from the corpus file (rows with an empty context are
// skipped by the parser). Unlabelled corpora are fine here.

use anyhow::Result;
use burn::prelude::*;
use std::path::PathBuf;

use crate::application::{run_dir_of, Accelerator, CpuBackend, GpuBackend};
use crate::data::{data_module::VizDataModule, encoder::SimpleEncoder};
use crate::domain::corpus::StanceCorpus;
use crate::infra::{checkpoint::CheckpointManager, npy, tokenizer_store::TokenizerStore};
use crate::ml::embedder::embed_all;

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub ckpt:        PathBuf,
    pub corpus:      StanceCorpus,
    pub output:      PathBuf,
    pub batch_size:  usize,
    /// Where tokenizer.json lives; defaults to the checkpoint's directory
    pub run_dir:     Option<PathBuf>,
    pub accelerator: Accelerator,
}

/// Shape of the written array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedSummary {
    pub rows: usize,
    pub dim:  usize,
}

pub struct EmbedUseCase {
    request: EmbedRequest,
}

impl EmbedUseCase {
    pub fn new(request: EmbedRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<EmbedSummary> {
        match self.request.accelerator {
            Accelerator::Gpu => self.run::<GpuBackend>(),
            Accelerator::Cpu => self.run::<CpuBackend>(),
        }
    }

    pub(crate) fn run<B: Backend>(&self) -> Result<EmbedSummary> {
        let req    = &self.request;
        let device = B::Device::default();

        let (model, meta) = CheckpointManager::load::<B>(&req.ckpt, &device)?;
        let run_dir   = run_dir_of(&req.ckpt, req.run_dir.clone());
        let tokenizer = TokenizerStore::new(run_dir).load()?;
        let encoder   = SimpleEncoder::new(tokenizer, meta.hyper_parameters.encoder.max_seq_len)?;

        let mut viz = VizDataModule::new(req.corpus.clone(), req.batch_size.max(1));
        viz.setup(&encoder)?;

        let loader     = viz.predict_dataloader::<B>(&device)?;
        let embeddings = embed_all(&model, &loader)?;
        let summary    = EmbedSummary { rows: embeddings.rows(), dim: embeddings.dim };

        npy::write_embeddings(&req.output, embeddings.values, embeddings.dim)?;
        Ok(summary)
    }
}
