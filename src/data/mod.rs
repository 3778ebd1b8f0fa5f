// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a corpus file on disk and a tensor batch.
//
//   corpus file (tsv / csv / jsonl)
//       │
//       ▼
//   parsers        → per-format parse fn, picked by CorpusType
//       │            (text cleaned by the Preprocessor)
//       ▼
//   encoder        → tokenizer pair encoding (context, target)
//       │
//       ▼
//   splitter       → seeded train / val / test split per corpus
//       │
//       ▼
//   dataset        → Burn Dataset over encoded samples
//       │
//       ▼
//   batcher        → dynamic padding into StanceBatch tensors
//       │
//       ▼
//   data_module    → wires the above into dataloaders
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Cleans and normalises raw corpus text
pub mod preprocessor;

/// Registered per-format corpus parsers
pub mod parsers;

/// Tokenizer-backed sample encoder
pub mod encoder;

/// Burn Dataset over encoded samples
pub mod dataset;

/// Burn Batcher: dynamic padding and label/weight tensors
pub mod batcher;

/// Seeded train/val/test splitting
pub mod splitter;

/// StanceDataModule and VizDataModule
pub mod data_module;
