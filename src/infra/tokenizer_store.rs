// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Finds the tokenizer a run should use and keeps a copy of it
// in the run directory, so `test` and `embed` tokenise exactly
// like `fit` did.
//
// Resolution order:
//   1. <pretrained>/tokenizer.json   (copied into the run dir)
//   2. word-level tokenizer built from the training texts
//
// The fallback is written as Hugging Face tokenizer JSON and
// loaded back through Tokenizer::from_file, which sidesteps the
// Trainer/ModelWrapper type mismatch of train_from_files in
// tokenizers 0.15. Vocabulary words are counted with the same
// BertNormalizer + Whitespace pair the JSON names, so every
// entry is reachable at encode time. It carries a
// TemplateProcessing post-processor so pairs come out as
//
//   [CLS] context [SEP] target [SEP]

use anyhow::{Context, Result};
use serde_json::json;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tokenizers::{
    normalizers::bert::BertNormalizer,
    pre_tokenizers::whitespace::Whitespace,
    Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer,
};

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Special tokens and their fixed ids.
const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]",  0),
    ("[UNK]",  1),
    ("[CLS]",  2),
    ("[SEP]",  3),
    ("[MASK]", 4),
];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Pick the tokenizer for a training run. `texts` is only
    /// called when a new vocabulary has to be built.
    pub fn resolve<F>(
        &self,
        pretrained: Option<&Path>,
        texts:      F,
        vocab_size: usize,
    ) -> Result<Tokenizer>
    where
        F: FnOnce() -> Result<Vec<String>>,
    {
        if let Some(src) = pretrained.map(|p| p.join(TOKENIZER_FILE)).filter(|p| p.exists()) {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
            if src != self.path() {
                fs::copy(&src, self.path())
                    .with_context(|| format!("Cannot copy tokenizer '{}'", src.display()))?;
            }
            tracing::info!("Using pretrained tokenizer '{}'", src.display());
            return self.load();
        }

        tracing::info!("Building word-level tokenizer (vocab_size={})", vocab_size);
        self.build_and_save(&texts()?, vocab_size)
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Build a word-level vocabulary of at most `vocab_size` entries
    /// (specials included) from `texts` and save it.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: word frequencies ──────────────────────────────────────────
        let pipeline = WordPipeline::default();
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in pipeline.words(text)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties alphabetical so builds are reproducible
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: vocab ─────────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), json!(id));
        }
        let mut next_id = SPECIAL_TOKENS.len() as u32;
        for (word, _) in words {
            if !vocab.contains_key(&word) {
                vocab.insert(word, json!(next_id));
                next_id += 1;
            }
        }

        // ── Step 3: tokenizer JSON ────────────────────────────────────────────
        let added_tokens: Vec<_> = SPECIAL_TOKENS
            .iter()
            .map(|(content, id)| json!({
                "id": id, "content": content, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let special = |name: &str, type_id: u32| json!({ "SpecialToken": { "id": name, "type_id": type_id } });
        let sequence = |name: &str, type_id: u32| json!({ "Sequence": { "id": name, "type_id": type_id } });
        let special_entry = |name: &str, id: u32| json!({ "id": name, "ids": [id], "tokens": [name] });

        let tokenizer_json = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": serde_json::to_value(&pipeline.normalizer)?,
            "pre_tokenizer": serde_json::to_value(&pipeline.pre_tokenizer)?,
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0)],
                "pair": [
                    special("[CLS]", 0), sequence("A", 0), special("[SEP]", 0),
                    sequence("B", 1), special("[SEP]", 1)
                ],
                "special_tokens": {
                    "[CLS]": special_entry("[CLS]", 2),
                    "[SEP]": special_entry("[SEP]", 3)
                }
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer '{}'", path.display()))?;
        tracing::info!("Tokenizer built with {} entries, saved to '{}'", next_id, path.display());

        self.load()
    }
}

/// Normalizer and pre-tokenizer of the fallback tokenizer.
struct WordPipeline {
    normalizer:    BertNormalizer,
    pre_tokenizer: Whitespace,
}

impl Default for WordPipeline {
    fn default() -> Self {
        Self {
            // clean text, split CJK chars, strip accents (follows lowercase), lowercase
            normalizer:    BertNormalizer::new(true, true, None, true),
            pre_tokenizer: Whitespace::default(),
        }
    }
}

impl WordPipeline {
    /// The words the tokenizer will look up for `text`.
    fn words(&self, text: &str) -> Result<Vec<String>> {
        let mut pretok = PreTokenizedString::from(text);
        pretok
            .normalize(|s| self.normalizer.normalize(s))
            .map_err(|e| anyhow::anyhow!("Cannot normalise text: {}", e))?;
        self.pre_tokenizer
            .pre_tokenize(&mut pretok)
            .map_err(|e| anyhow::anyhow!("Cannot pre-tokenise text: {}", e))?;
        Ok(pretok
            .get_splits(OffsetReferential::Normalized, OffsetType::Byte)
            .into_iter()
            .map(|(word, _, _)| word.to_string())
            .collect())
    }
}
