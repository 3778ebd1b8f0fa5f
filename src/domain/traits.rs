// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams of the data pipeline:
//
//   SampleSource  → where labelled samples come from
//                   (StanceCorpus implements it in data::parsers)
//   SampleEncoder → how a sample becomes token ids
//                   (SimpleEncoder implements it in data::encoder)
//
// The data modules only see these traits, so a new corpus
// format or a different tokenisation scheme plugs in without
// touching the split/concat/batch logic.

use anyhow::Result;

use crate::data::dataset::EncodedSample;
use crate::domain::sample::StanceSample;

// ─── SampleSource ────────────────────────────────────────────────────────────
pub trait SampleSource {
    /// Parse every sample, in file order.
    fn load_samples(&self) -> Result<Vec<StanceSample>>;

    /// Human readable origin, used in log lines.
    fn describe(&self) -> String;
}

// ─── SampleEncoder ───────────────────────────────────────────────────────────
pub trait SampleEncoder {
    /// Turn one parsed sample into model input.
    fn encode(&self, sample: &StanceSample) -> Result<EncodedSample>;

    /// Token id used to pad batches to a common length.
    fn pad_id(&self) -> u32;
}
