// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the run directory on disk:
//
//   checkpoint.rs      — model checkpoints, best pointer,
//                        encoder export, run_config.json
//   tokenizer_store.rs — tokenizer.json resolution and fallback
//                        vocabulary building
//   metrics.rs         — per-epoch metrics.csv
//   npy.rs             — embeddings as .npy

pub mod checkpoint;
pub mod tokenizer_store;
pub mod metrics;
pub mod npy;
