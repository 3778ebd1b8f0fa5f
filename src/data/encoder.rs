// ============================================================
// Layer 4 — Sample Encoder
// ============================================================
// Turns a StanceSample into token ids with a Hugging Face
// tokenizer. The sample is encoded as a sentence PAIR:
//
//   <special> context <special> target <special>
//
// The exact special tokens come from the tokenizer's own
// post-processor, so a pretrained tokenizer.json (BART, BERT,
// RoBERTa...) and our word-level fallback both work unchanged.
//
// Truncation is longest-first: the context (almost always the
// longer side) loses tokens before the target does.

use anyhow::{anyhow, Result};
use tokenizers::{Tokenizer, TruncationParams};

use crate::data::dataset::EncodedSample;
use crate::domain::sample::StanceSample;
use crate::domain::traits::SampleEncoder;

/// Pad token spellings, checked in order.
const PAD_TOKENS: [&str; 2] = ["<pad>", "[PAD]"];

#[derive(Clone)]
pub struct SimpleEncoder {
    tokenizer:   Tokenizer,
    pad_id:      u32,
    max_seq_len: usize,
}

impl SimpleEncoder {
    pub fn new(mut tokenizer: Tokenizer, max_seq_len: usize) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Cannot configure truncation: {e}"))?;
        // Padding is the batcher's job
        tokenizer.with_padding(None);

        let pad_id = PAD_TOKENS
            .iter()
            .find_map(|t| tokenizer.token_to_id(t))
            .unwrap_or(0);

        Ok(Self { tokenizer, pad_id, max_seq_len })
    }

    /// Number of embedding rows needed: largest token id + 1.
    /// Vocabularies may have gaps, so this is not the entry count.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer
            .get_vocab(true)
            .values()
            .max()
            .map(|&id| id as usize + 1)
            .unwrap_or(0)
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl SampleEncoder for SimpleEncoder {
    fn encode(&self, sample: &StanceSample) -> Result<EncodedSample> {
        let enc = self
            .tokenizer
            .encode((sample.context.as_str(), sample.target.as_str()), true)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        Ok(EncodedSample {
            input_ids: enc.get_ids().to_vec(),
            label:     sample.stance.map(|s| s.id()),
            weight:    sample.weight.unwrap_or(1.0),
        })
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stance::Stance;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn encoder(max_seq_len: usize) -> (tempfile::TempDir, SimpleEncoder) {
        let dir   = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let texts = vec![
            "we must ban fracking now".to_string(),
            "fracking creates jobs".to_string(),
        ];
        let tok = store.build_and_save(&texts, 100).unwrap();
        (dir, SimpleEncoder::new(tok, max_seq_len).unwrap())
    }

    #[test]
    fn test_pair_encoding_has_specials_and_label() {
        let (_dir, enc) = encoder(64);
        let sample = StanceSample::new("we must ban fracking", "fracking", Some(Stance::Against))
            .with_weight(2.0);
        let out = enc.encode(&sample).unwrap();

        let cls = enc.tokenizer().token_to_id("[CLS]").unwrap();
        let sep = enc.tokenizer().token_to_id("[SEP]").unwrap();
        // [CLS] we must ban fracking [SEP] fracking [SEP]
        assert_eq!(out.input_ids.len(), 8);
        assert_eq!(out.input_ids[0], cls);
        assert_eq!(out.input_ids.iter().filter(|&&id| id == sep).count(), 2);
        assert_eq!(out.label, Some(Stance::Against.id()));
        assert_eq!(out.weight, 2.0);
    }

    #[test]
    fn test_truncates_to_max_len() {
        let (_dir, enc) = encoder(6);
        let sample = StanceSample::new("we must ban fracking now we must", "fracking", None);
        let out = enc.encode(&sample).unwrap();
        assert_eq!(out.input_ids.len(), 6);
        assert_eq!(out.label, None);
        assert_eq!(out.weight, 1.0);
    }

    #[test]
    fn test_pad_id_and_vocab_size() {
        let (_dir, enc) = encoder(16);
        assert_eq!(enc.pad_id(), 0);
        let max_id = enc.tokenizer().get_vocab(true).into_values().max().unwrap();
        assert_eq!(enc.vocab_size(), max_id as usize + 1);
    }
}
