// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing the stance
// task. No burn types, no file I/O.
//
//   stance.rs  — the label set and its id mapping
//   sample.rs  — one parsed (context, target, stance) example
//   corpus.rs  — corpus descriptors: path, format, ratio, weight
//   traits.rs  — SampleSource / SampleEncoder seams

pub mod stance;

pub mod sample;

pub mod corpus;

pub mod traits;
