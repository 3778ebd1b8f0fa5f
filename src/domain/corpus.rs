// ============================================================
// Layer 3 — Corpus Descriptors
// ============================================================
// Configuration records describing WHERE a corpus lives and
// HOW to treat it. Nothing here touches the filesystem; the
// data layer (data::parsers) reads the files.
//
//   StanceCorpus  → path + format + default sample weight
//   SplitCorpus   → StanceCorpus + train/val/test ratio
//
// Both are serde types so a whole run (several corpora with
// different ratios and weights) can be written as JSON.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

// ─── CorpusType ──────────────────────────────────────────────────────────────
/// The registered corpus formats. Each one has a parser in
/// data::parsers::parser_for().
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusType {
    /// SemEval-2016 Task 6 (tab separated)
    Semeval2016,
    /// P-Stance (CSV)
    Pstance,
    /// EZ-Stance (CSV)
    Ezstance,
    /// VAST zero-shot stance (CSV)
    Vast,
    /// One JSON object per line
    Jsonl,
}

impl CorpusType {
    pub const ALL: [CorpusType; 5] = [
        CorpusType::Semeval2016,
        CorpusType::Pstance,
        CorpusType::Ezstance,
        CorpusType::Vast,
        CorpusType::Jsonl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CorpusType::Semeval2016 => "semeval2016",
            CorpusType::Pstance     => "pstance",
            CorpusType::Ezstance    => "ezstance",
            CorpusType::Vast        => "vast",
            CorpusType::Jsonl       => "jsonl",
        }
    }
}

impl fmt::Display for CorpusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorpusType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|t| t.name()).collect();
                anyhow!("Invalid corpus_type '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

// ─── DataRatio ───────────────────────────────────────────────────────────────
/// Train / validation / test fractions of one corpus.
/// Serialised as a 3-element array, e.g. [0.7, 0.15, 0.15].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct DataRatio {
    pub train: f64,
    pub val:   f64,
    pub test:  f64,
}

impl DataRatio {
    const TOLERANCE: f64 = 1e-6;

    pub fn new(train: f64, val: f64, test: f64) -> Result<Self> {
        for (name, v) in [("train", train), ("val", val), ("test", test)] {
            if !(0.0..=1.0).contains(&v) {
                bail!("{} fraction {} is outside [0, 1]", name, v);
            }
        }
        let total = train + val + test;
        if (total - 1.0).abs() > Self::TOLERANCE {
            bail!("Data ratio {},{},{} sums to {} instead of 1", train, val, test, total);
        }
        Ok(Self { train, val, test })
    }

    pub fn fractions(&self) -> [f64; 3] {
        [self.train, self.val, self.test]
    }
}

impl Default for DataRatio {
    fn default() -> Self {
        Self { train: 0.7, val: 0.15, test: 0.15 }
    }
}

impl TryFrom<[f64; 3]> for DataRatio {
    type Error = anyhow::Error;

    fn try_from([train, val, test]: [f64; 3]) -> Result<Self> {
        Self::new(train, val, test)
    }
}

impl From<DataRatio> for [f64; 3] {
    fn from(r: DataRatio) -> Self {
        r.fractions()
    }
}

impl FromStr for DataRatio {
    type Err = anyhow::Error;

    /// Parses "0.7,0.15,0.15".
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Cannot parse data ratio '{}'", s))?;
        match parts.as_slice() {
            [train, val, test] => Self::new(*train, *val, *test),
            _ => bail!("Data ratio '{}' must have exactly three comma-separated values", s),
        }
    }
}

// ─── StanceCorpus ────────────────────────────────────────────────────────────
fn default_sample_weight() -> f32 {
    1.0
}

/// A corpus file and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceCorpus {
    pub path:          PathBuf,
    pub corpus_type:   CorpusType,
    /// Applied to every parsed sample that does not carry its own weight.
    #[serde(default = "default_sample_weight")]
    pub sample_weight: f32,
}

impl StanceCorpus {
    pub fn new(path: impl Into<PathBuf>, corpus_type: CorpusType) -> Self {
        Self {
            path: path.into(),
            corpus_type,
            sample_weight: default_sample_weight(),
        }
    }

    pub fn with_sample_weight(mut self, sample_weight: f32) -> Self {
        self.sample_weight = sample_weight;
        self
    }
}

// ─── SplitCorpus ─────────────────────────────────────────────────────────────
/// A corpus that is partitioned into train/val/test subsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCorpus {
    #[serde(flatten)]
    pub corpus:     StanceCorpus,
    #[serde(default)]
    pub data_ratio: DataRatio,
}

impl SplitCorpus {
    pub fn new(corpus: StanceCorpus, data_ratio: DataRatio) -> Self {
        Self { corpus, data_ratio }
    }
}

impl FromStr for SplitCorpus {
    type Err = anyhow::Error;

    /// Parses `TYPE:PATH[:TRAIN,VAL,TEST[:WEIGHT]]`, e.g.
    /// `semeval2016:data/semeval/train.tsv:0.8,0.1,0.1:2.0`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let corpus_type: CorpusType = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("Corpus spec '{}' is missing a type", s))?
            .parse()?;
        let path = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("Corpus spec '{}' is missing a path", s))?;
        let data_ratio = match parts.next() {
            Some(r) => r.parse()?,
            None    => DataRatio::default(),
        };
        let mut corpus = StanceCorpus::new(path, corpus_type);
        if let Some(w) = parts.next() {
            corpus.sample_weight = w
                .parse()
                .with_context(|| format!("Cannot parse sample weight '{}' in '{}'", w, s))?;
        }
        if parts.next().is_some() {
            bail!("Corpus spec '{}' has too many ':'-separated fields", s);
        }
        Ok(Self { corpus, data_ratio })
    }
}
