// ============================================================
// Layer 4 — Corpus Parsers
// ============================================================
// One parse function per registered CorpusType. The registry
// is a plain match in parser_for(): adding a format means
// adding an enum variant and an arm here, and the compiler
// points at every place that needs to know about it.
//
// Formats:
//   semeval2016 — TSV  ID | Target | Tweet | Stance
//   pstance     — CSV  Tweet, Target, Stance
//   ezstance    — CSV  Text, Target 1, Stance 1
//   vast        — CSV  post, topic_str (or new_topic), label
//   jsonl       — {"context", "target", "stance"?, "weight"?}
//
// Every text field goes through the Preprocessor. Rows with
// an empty context are skipped; rows with an unreadable label
// fail the whole parse so bad data never trains silently.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::data::preprocessor::Preprocessor;
use crate::domain::corpus::{CorpusType, StanceCorpus};
use crate::domain::sample::StanceSample;
use crate::domain::stance::Stance;
use crate::domain::traits::SampleSource;

/// Signature shared by every registered parser.
pub type ParseFn = fn(&Path) -> Result<Vec<StanceSample>>;

/// Look up the parser registered for a corpus format.
pub fn parser_for(corpus_type: CorpusType) -> ParseFn {
    match corpus_type {
        CorpusType::Semeval2016 => parse_semeval2016,
        CorpusType::Pstance     => parse_pstance,
        CorpusType::Ezstance    => parse_ezstance,
        CorpusType::Vast        => parse_vast,
        CorpusType::Jsonl       => parse_jsonl,
    }
}

impl SampleSource for StanceCorpus {
    fn load_samples(&self) -> Result<Vec<StanceSample>> {
        let parse = parser_for(self.corpus_type);
        let mut samples = parse(&self.path)
            .with_context(|| format!("Failed to parse {} corpus '{}'", self.corpus_type, self.path.display()))?;

        // Per-sample weights from the file win over the corpus default
        for sample in &mut samples {
            if sample.weight.is_none() {
                sample.weight = Some(self.sample_weight);
            }
        }
        Ok(samples)
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.path.display(), self.corpus_type)
    }
}

// ─── Tabular formats ─────────────────────────────────────────────────────────
/// Header names to look for, first match wins.
struct TableLayout {
    delimiter: u8,
    quoting:   bool,
    context:   &'static [&'static str],
    target:    &'static [&'static str],
    stance:    &'static [&'static str],
}

fn parse_semeval2016(path: &Path) -> Result<Vec<StanceSample>> {
    parse_table(path, &TableLayout {
        delimiter: b'\t',
        // Tweets contain bare quote characters; the TSV is not quoted
        quoting:   false,
        context:   &["Tweet"],
        target:    &["Target"],
        stance:    &["Stance"],
    })
}

fn parse_pstance(path: &Path) -> Result<Vec<StanceSample>> {
    parse_table(path, &TableLayout {
        delimiter: b',',
        quoting:   true,
        context:   &["Tweet"],
        target:    &["Target"],
        stance:    &["Stance"],
    })
}

fn parse_ezstance(path: &Path) -> Result<Vec<StanceSample>> {
    parse_table(path, &TableLayout {
        delimiter: b',',
        quoting:   true,
        context:   &["Text"],
        target:    &["Target 1"],
        stance:    &["Stance 1"],
    })
}

fn parse_vast(path: &Path) -> Result<Vec<StanceSample>> {
    // label: 0 = con, 1 = pro, 2 = neutral, which lines up with Stance ids
    parse_table(path, &TableLayout {
        delimiter: b',',
        quoting:   true,
        context:   &["post"],
        target:    &["topic_str", "new_topic"],
        stance:    &["label"],
    })
}

fn parse_table(path: &Path, layout: &TableLayout) -> Result<Vec<StanceSample>> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    // Older corpus dumps are not valid UTF-8 everywhere
    let text = String::from_utf8_lossy(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .quoting(layout.quoting)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let find = |names: &[&str]| -> Result<usize> {
        names
            .iter()
            .find_map(|n| headers.iter().position(|h| h.trim() == *n))
            .ok_or_else(|| anyhow!(
                "'{}' has no {} column (headers: {:?})",
                path.display(), names.join(" / "), headers.iter().collect::<Vec<_>>()
            ))
    };
    let context_col = find(layout.context)?;
    let target_col  = find(layout.target)?;
    let stance_col  = find(layout.stance)?;

    let prep = Preprocessor::new();
    let mut samples = Vec::new();

    for record in reader.records() {
        let record = record?;
        let line   = record.position().map(|p| p.line()).unwrap_or(0);

        let context = prep.clean(record.get(context_col).unwrap_or(""));
        if context.is_empty() {
            tracing::debug!("{}:{}: empty context, skipping", path.display(), line);
            continue;
        }
        let target = prep.clean(record.get(target_col).unwrap_or(""));

        let raw_stance = record.get(stance_col).unwrap_or("").trim();
        let stance = if raw_stance.is_empty() {
            None
        } else {
            Some(Stance::from_label(raw_stance)
                .with_context(|| format!("{}:{}", path.display(), line))?)
        };

        samples.push(StanceSample::new(context, target, stance));
    }

    tracing::debug!("Parsed {} samples from '{}'", samples.len(), path.display());
    Ok(samples)
}

// ─── JSON lines ──────────────────────────────────────────────────────────────
#[derive(Deserialize)]
struct JsonlRow {
    context: String,
    #[serde(default)]
    target:  String,
    #[serde(default)]
    stance:  Option<String>,
    #[serde(default)]
    weight:  Option<f32>,
}

fn parse_jsonl(path: &Path) -> Result<Vec<StanceSample>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let prep = Preprocessor::new();
    let mut samples = Vec::new();

    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: JsonlRow = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid JSON", path.display(), i + 1))?;

        let context = prep.clean(&row.context);
        if context.is_empty() {
            tracing::debug!("{}:{}: empty context, skipping", path.display(), i + 1);
            continue;
        }
        let stance = match row.stance.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(label) => Some(Stance::from_label(label)
                .with_context(|| format!("{}:{}", path.display(), i + 1))?),
        };

        let mut sample = StanceSample::new(context, prep.clean(&row.target), stance);
        sample.weight = row.weight;
        samples.push(sample);
    }

    Ok(samples)
}
