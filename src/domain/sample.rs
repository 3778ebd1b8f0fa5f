// ============================================================
// Layer 3 — StanceSample Domain Type
// ============================================================
// One labelled example as it comes out of a corpus parser:
//   - context: the text written by the author (tweet, post...)
//   - target:  what the author takes a position on
//   - stance:  the gold label, absent for unlabelled data
//   - weight:  per-sample loss weight; None means "use the
//              corpus default" and is filled in by StanceCorpus

use serde::{Deserialize, Serialize};

use crate::domain::stance::Stance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceSample {
    pub context: String,
    pub target:  String,
    #[serde(default)]
    pub stance:  Option<Stance>,
    #[serde(default)]
    pub weight:  Option<f32>,
}

impl StanceSample {
    pub fn new(
        context: impl Into<String>,
        target:  impl Into<String>,
        stance:  Option<Stance>,
    ) -> Self {
        Self {
            context: context.into(),
            target:  target.into(),
            stance,
            weight:  None,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = Some(weight);
        self
    }
}
