// ============================================================
// Layer 5 — Embedder
// ============================================================
// Runs the encoder of a trained classifier over a dataloader
// and collects the pooled feature vector of every sample, in
// loader order. Rows line up with the corpus rows because the
// predict loader never shuffles.

use anyhow::Result;
use burn::prelude::*;

use crate::data::data_module::StanceDataLoader;
use crate::ml::model::StanceClassifier;

/// Row-major [rows, dim] feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub values: Vec<f32>,
    pub dim:    usize,
}

impl Embeddings {
    pub fn rows(&self) -> usize {
        if self.dim == 0 { 0 } else { self.values.len() / self.dim }
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }
}

pub fn embed_all<B: Backend>(
    model:  &StanceClassifier<B>,
    loader: &StanceDataLoader<B>,
) -> Result<Embeddings> {
    let dim = model.feature_size();
    let mut values = Vec::new();

    for (i, batch) in loader.iter().enumerate() {
        let features = model.embed(batch.input_ids, batch.padding_mask);
        let chunk = features
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read embeddings of batch {i}: {e:?}"))?;
        values.extend(chunk);
    }

    tracing::debug!("Embedded {} samples (dim={})", values.len() / dim.max(1), dim);
    Ok(Embeddings { values, dim })
}
