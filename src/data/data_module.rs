// ============================================================
// Layer 4 — Data Modules
// ============================================================
// A data module owns the path from corpus descriptors to
// dataloaders:
//
//   SplitCorpus ──parse──▶ StanceSample ──encode──▶ EncodedSample
//        │                                             │
//        └──────────── random_split by data_ratio ◀────┘
//                              │
//            concat train / val / test across corpora
//                              │
//                 train / val / test dataloaders
//
// StanceDataModule is used for fit/test, VizDataModule for
// embedding export (one corpus, no split, file order kept).
//
// StanceDataModule works in two idempotent phases. prepare()
// parses and splits; setup() encodes. The fit flow builds its
// vocabulary from the train split in between, so held-out text
// never reaches the tokenizer.

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::sync::Arc;

use crate::data::batcher::{StanceBatch, StanceBatcher};
use crate::data::dataset::{EncodedSample, StanceDataset};
use crate::data::splitter::random_split;
use crate::domain::corpus::{SplitCorpus, StanceCorpus};
use crate::domain::sample::StanceSample;
use crate::domain::traits::{SampleEncoder, SampleSource};

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub type StanceDataLoader<B> = Arc<dyn DataLoader<StanceBatch<B>>>;

/// Parse and encode every sample of one corpus, in file order.
fn encode_corpus<E: SampleEncoder>(corpus: &StanceCorpus, encoder: &E) -> Result<Vec<EncodedSample>> {
    tracing::info!("Parsing {}", corpus.describe());
    let samples = corpus.load_samples()?;
    let encoded = encode_all(&samples, encoder)?;
    tracing::info!("Encoded {} samples from {}", encoded.len(), corpus.describe());
    Ok(encoded)
}

fn encode_all<E: SampleEncoder>(samples: &[StanceSample], encoder: &E) -> Result<Vec<EncodedSample>> {
    samples.iter().map(|s| encoder.encode(s)).collect()
}

// ─── StanceDataModule ────────────────────────────────────────────────────────
/// One corpus after splitting, before encoding.
struct SampleSplit {
    train: Vec<StanceSample>,
    val:   Vec<StanceSample>,
    test:  Vec<StanceSample>,
}

struct Splits {
    train: StanceDataset,
    val:   StanceDataset,
    test:  StanceDataset,
}

pub struct StanceDataModule {
    corpora:     Vec<SplitCorpus>,
    batch_size:  usize,
    seed:        u64,
    num_workers: usize,
    pad_id:      u32,
    samples:     Option<Vec<SampleSplit>>,
    splits:      Option<Splits>,
}

impl StanceDataModule {
    pub fn new(corpora: Vec<SplitCorpus>, batch_size: usize, seed: u64) -> Self {
        Self {
            corpora,
            batch_size,
            seed,
            num_workers: 1,
            pad_id: 0,
            samples: None,
            splits: None,
        }
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn is_setup(&self) -> bool {
        self.splits.is_some()
    }

    /// Parse and split all corpora without encoding them.
    /// A second call is a no-op.
    pub fn prepare(&mut self) -> Result<()> {
        if self.samples.is_some() {
            return Ok(());
        }
        if self.corpora.is_empty() {
            bail!("No corpora configured");
        }

        let mut parts = Vec::with_capacity(self.corpora.len());
        for (i, split_corpus) in self.corpora.iter().enumerate() {
            let corpus = &split_corpus.corpus;
            tracing::info!("Parsing {}", corpus.describe());
            let samples = corpus.load_samples()?;

            let before = samples.len();
            let labelled: Vec<StanceSample> = samples.into_iter().filter(|s| s.stance.is_some()).collect();
            if labelled.len() < before {
                tracing::warn!(
                    "Dropping {} unlabelled samples from {}",
                    before - labelled.len(), corpus.describe()
                );
            }

            // Offset the seed per corpus so identical files still shuffle differently
            let seed = self.seed.wrapping_add(i as u64);
            let (train, val, test) = random_split(labelled, &split_corpus.data_ratio, seed);
            tracing::info!(
                "{}: {} train, {} val, {} test",
                corpus.describe(), train.len(), val.len(), test.len()
            );
            parts.push(SampleSplit { train, val, test });
        }

        self.samples = Some(parts);
        Ok(())
    }

    /// Contexts and targets of the training split, for building a
    /// vocabulary. Requires `prepare()`.
    pub fn train_texts(&self) -> Result<Vec<String>> {
        let Some(parts) = &self.samples else {
            bail!("StanceDataModule::prepare() must run before reading training texts");
        };
        Ok(parts
            .iter()
            .flat_map(|p| p.train.iter())
            .flat_map(|s| [s.context.clone(), s.target.clone()])
            .collect())
    }

    /// Prepare, then encode and concatenate the splits of all corpora.
    /// A second call is a no-op.
    pub fn setup<E: SampleEncoder>(&mut self, encoder: &E) -> Result<()> {
        if self.splits.is_some() {
            return Ok(());
        }
        self.prepare()?;
        let parts = self.samples.as_deref().unwrap_or_default();

        let mut train_parts = Vec::with_capacity(parts.len());
        let mut val_parts   = Vec::with_capacity(parts.len());
        let mut test_parts  = Vec::with_capacity(parts.len());
        for part in parts {
            train_parts.push(StanceDataset::new(encode_all(&part.train, encoder)?));
            val_parts.push(StanceDataset::new(encode_all(&part.val, encoder)?));
            test_parts.push(StanceDataset::new(encode_all(&part.test, encoder)?));
        }

        let splits = Splits {
            train: StanceDataset::concat(train_parts),
            val:   StanceDataset::concat(val_parts),
            test:  StanceDataset::concat(test_parts),
        };
        tracing::info!(
            "Combined: {} train, {} val, {} test",
            splits.train.sample_count(), splits.val.sample_count(), splits.test.sample_count()
        );

        self.pad_id = encoder.pad_id();
        self.splits = Some(splits);
        Ok(())
    }

    fn splits(&self) -> Result<&Splits> {
        match &self.splits {
            Some(s) => Ok(s),
            None    => bail!("StanceDataModule::setup() must run before requesting a dataloader"),
        }
    }

    pub fn train_dataset(&self) -> Result<&StanceDataset> { Ok(&self.splits()?.train) }
    pub fn val_dataset(&self)   -> Result<&StanceDataset> { Ok(&self.splits()?.val) }
    pub fn test_dataset(&self)  -> Result<&StanceDataset> { Ok(&self.splits()?.test) }

    pub fn train_dataloader<B: Backend>(&self, device: &B::Device) -> Result<StanceDataLoader<B>> {
        let batcher = StanceBatcher::<B>::new(device.clone(), self.pad_id);
        Ok(DataLoaderBuilder::new(batcher)
            .batch_size(self.batch_size)
            .shuffle(self.seed)
            .num_workers(self.num_workers)
            .build(self.splits()?.train.clone()))
    }

    pub fn val_dataloader<B: Backend>(&self, device: &B::Device) -> Result<StanceDataLoader<B>> {
        self.eval_loader(device, self.splits()?.val.clone())
    }

    pub fn test_dataloader<B: Backend>(&self, device: &B::Device) -> Result<StanceDataLoader<B>> {
        self.eval_loader(device, self.splits()?.test.clone())
    }

    fn eval_loader<B: Backend>(&self, device: &B::Device, ds: StanceDataset) -> Result<StanceDataLoader<B>> {
        let batcher = StanceBatcher::<B>::new(device.clone(), self.pad_id);
        Ok(DataLoaderBuilder::new(batcher)
            .batch_size(self.batch_size)
            .num_workers(self.num_workers)
            .build(ds))
    }
}

// ─── VizDataModule ───────────────────────────────────────────────────────────
/// One corpus, encoded as-is, for batched prediction.
pub struct VizDataModule {
    corpus:     StanceCorpus,
    batch_size: usize,
    pad_id:     u32,
    ds:         Option<StanceDataset>,
}

impl VizDataModule {
    pub fn new(corpus: StanceCorpus, batch_size: usize) -> Self {
        Self { corpus, batch_size, pad_id: 0, ds: None }
    }

    pub fn setup<E: SampleEncoder>(&mut self, encoder: &E) -> Result<()> {
        if self.ds.is_some() {
            return Ok(());
        }
        let encoded = encode_corpus(&self.corpus, encoder)?;
        self.pad_id = encoder.pad_id();
        self.ds = Some(StanceDataset::new(encoded));
        Ok(())
    }

    pub fn dataset(&self) -> Result<&StanceDataset> {
        match &self.ds {
            Some(ds) => Ok(ds),
            None     => bail!("VizDataModule::setup() must run before requesting a dataloader"),
        }
    }

    /// Batches in file order; a single worker keeps that order intact.
    pub fn predict_dataloader<B: Backend>(&self, device: &B::Device) -> Result<StanceDataLoader<B>> {
        let batcher = StanceBatcher::<B>::new(device.clone(), self.pad_id);
        Ok(DataLoaderBuilder::new(batcher)
            .batch_size(self.batch_size)
            .build(self.dataset()?.clone()))
    }
}
