// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model code lives here.
//
//   backbone.rs  — transformer text encoder + masked mean pooling
//   model.rs     — StanceClassifier: encoder + classification head,
//                  weighted cross-entropy, per-group learning rates
//   metrics.rs   — confusion matrix, accuracy, macro F1
//   callbacks.rs — EarlyStopping and ModelCheckpoint
//   trainer.rs   — fit / evaluate loops
//   embedder.rs  — pooled features for every sample of a corpus
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

pub mod backbone;
pub mod model;
pub mod metrics;
pub mod callbacks;
pub mod trainer;
pub mod embedder;
