// ============================================================
// Layer 3 — Stance Label Domain Type
// ============================================================
// The closed set of classes the classifier predicts.
//
// Class ids are fixed so that a checkpoint trained today maps
// its logits back to the same labels tomorrow:
//   0 → against
//   1 → favor
//   2 → neutral
//
// Corpora disagree on spelling ("FAVOR", "pro", "NONE", "2"...),
// so from_label() accepts every variant we have seen and funnels
// them into these three.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Against,
    Favor,
    Neutral,
}

impl Stance {
    /// All classes in class-id order.
    pub const ALL: [Stance; 3] = [Stance::Against, Stance::Favor, Stance::Neutral];

    pub const NUM_CLASSES: usize = Self::ALL.len();

    pub fn id(self) -> usize {
        match self {
            Stance::Against => 0,
            Stance::Favor   => 1,
            Stance::Neutral => 2,
        }
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Stance::Against => "against",
            Stance::Favor   => "favor",
            Stance::Neutral => "neutral",
        }
    }

    pub fn id2label() -> BTreeMap<usize, String> {
        Self::ALL.iter().map(|s| (s.id(), s.label().to_string())).collect()
    }

    pub fn label2id() -> BTreeMap<String, usize> {
        Self::ALL.iter().map(|s| (s.label().to_string(), s.id())).collect()
    }

    /// Parse a corpus label. Case-insensitive; numeric ids are accepted too.
    pub fn from_label(raw: &str) -> Result<Self> {
        let label = raw.trim().to_ascii_lowercase();
        let stance = match label.as_str() {
            "against" | "con"              => Stance::Against,
            "favor" | "favour" | "pro"     => Stance::Favor,
            "neutral" | "none" | "neither" => Stance::Neutral,
            other => match other.parse::<usize>().ok().and_then(Self::from_id) {
                Some(s) => s,
                None => bail!("Unknown stance label '{}'", raw),
            },
        };
        Ok(stance)
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable() {
        for (i, s) in Stance::ALL.iter().enumerate() {
            assert_eq!(s.id(), i);
            assert_eq!(Stance::from_id(i), Some(*s));
        }
        assert_eq!(Stance::from_id(3), None);
    }

    #[test]
    fn test_from_label_variants() {
        assert_eq!(Stance::from_label("FAVOR").unwrap(),   Stance::Favor);
        assert_eq!(Stance::from_label(" pro ").unwrap(),   Stance::Favor);
        assert_eq!(Stance::from_label("AGAINST").unwrap(), Stance::Against);
        assert_eq!(Stance::from_label("NONE").unwrap(),    Stance::Neutral);
        assert_eq!(Stance::from_label("2").unwrap(),       Stance::Neutral);
    }

    #[test]
    fn test_unknown_label_is_error() {
        assert!(Stance::from_label("maybe").is_err());
        assert!(Stance::from_label("7").is_err());
    }

    #[test]
    fn test_label_maps_are_inverse() {
        let id2label = Stance::id2label();
        let label2id = Stance::label2id();
        for (id, label) in &id2label {
            assert_eq!(label2id[label], *id);
        }
    }
}
