// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `fit`, `test`, `embed`.
//
// `fit` builds its FitConfig in two layers: the JSON file given
// by --config (or the defaults), then every flag that was
// actually passed on top of it. --print-config shows the result
// without training, which makes a handy starting config file:
//
//   stance-gator fit --corpus semeval2016:data/train.tsv --print-config > run.json
//   stance-gator fit --config run.json --max-epochs 20
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::{fs, path::PathBuf};

use crate::application::{
    embed_use_case::{EmbedRequest, DEFAULT_EMBED_BATCH_SIZE},
    fit_use_case::FitConfig,
    Accelerator,
};
use crate::domain::corpus::{CorpusType, SplitCorpus, StanceCorpus};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a stance classifier, keep the best checkpoint and test it
    Fit(FitArgs),

    /// Evaluate a checkpoint on the test split of its run
    Test(TestArgs),

    /// Write pooled encoder features of a corpus to a .npy file
    Embed(EmbedArgs),
}

#[derive(Args, Debug)]
pub struct FitArgs {
    /// JSON run config; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the resolved run config as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// TYPE:PATH[:TRAIN,VAL,TEST[:WEIGHT]], repeatable.
    /// TYPE is one of semeval2016, pstance, ezstance, vast, jsonl
    #[arg(long = "corpus", value_name = "CORPUS")]
    pub corpora: Vec<SplitCorpus>,

    /// Output directory for checkpoints, tokenizer and metrics
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Directory with tokenizer.json and optionally encoder.json + encoder.bin
    #[arg(long)]
    pub pretrained: Option<PathBuf>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seed for the data split, shuffling and weight init
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub num_workers: Option<usize>,

    /// Vocabulary size when a tokenizer has to be built
    #[arg(long)]
    pub vocab_size: Option<usize>,

    #[arg(long)]
    pub max_epochs: Option<usize>,

    /// Epochs without val_macro_f1 improvement before stopping
    #[arg(long)]
    pub patience: Option<usize>,

    #[arg(long)]
    pub encoder_lr: Option<f64>,

    #[arg(long)]
    pub classifier_lr: Option<f64>,

    #[arg(long)]
    pub weight_decay: Option<f32>,

    /// Hidden layer size of the classification head (none by default)
    #[arg(long)]
    pub classifier_hidden_units: Option<usize>,

    #[arg(long)]
    pub max_seq_len: Option<usize>,

    #[arg(long)]
    pub d_model: Option<usize>,

    #[arg(long)]
    pub num_heads: Option<usize>,

    #[arg(long)]
    pub num_layers: Option<usize>,

    #[arg(long)]
    pub d_ff: Option<usize>,

    #[arg(long)]
    pub dropout: Option<f64>,
}

/// Assign `$field = value` for every flag that was passed.
macro_rules! override_with {
    ($($field:expr => $value:expr),* $(,)?) => {
        $(if let Some(v) = $value { $field = v; })*
    };
}

impl FitArgs {
    /// The --config file (or defaults) with all passed flags applied.
    pub fn into_config(self, device: Option<Accelerator>) -> Result<FitConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Cannot read config '{}'", path.display()))?;
                serde_json::from_str::<FitConfig>(&json)
                    .with_context(|| format!("Invalid config '{}'", path.display()))?
            }
            None => FitConfig::default(),
        };

        if !self.corpora.is_empty() {
            cfg.corpora = self.corpora;
        }
        if self.pretrained.is_some() {
            cfg.pretrained = self.pretrained;
        }
        if self.classifier_hidden_units.is_some() {
            cfg.model.classifier_hidden_units = self.classifier_hidden_units;
        }

        override_with! {
            cfg.run_dir                         => self.run_dir,
            cfg.batch_size                      => self.batch_size,
            cfg.seed                            => self.seed,
            cfg.num_workers                     => self.num_workers,
            cfg.vocab_size                      => self.vocab_size,
            cfg.accelerator                     => device,
            cfg.trainer.max_epochs              => self.max_epochs,
            cfg.trainer.patience                => self.patience,
            cfg.trainer.param_groups.encoder_lr => self.encoder_lr,
            cfg.trainer.param_groups.classifier_lr => self.classifier_lr,
            cfg.trainer.weight_decay            => self.weight_decay,
            cfg.model.max_seq_len               => self.max_seq_len,
            cfg.model.d_model                   => self.d_model,
            cfg.model.num_heads                 => self.num_heads,
            cfg.model.num_layers                => self.num_layers,
            cfg.model.d_ff                      => self.d_ff,
            cfg.model.dropout                   => self.dropout,
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Checkpoint (.ckpt) written by `fit`
    #[arg(long)]
    pub ckpt: PathBuf,

    /// Run directory holding run_config.json and tokenizer.json
    /// (defaults to the checkpoint's directory)
    #[arg(long)]
    pub run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Checkpoint (.ckpt) written by `fit`
    #[arg(long)]
    pub ckpt: PathBuf,

    #[arg(long)]
    pub corpus_type: CorpusType,

    /// Corpus file to embed
    #[arg(long)]
    pub corpus: PathBuf,

    #[arg(short, long, default_value = "embeddings.npy")]
    pub output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_EMBED_BATCH_SIZE)]
    pub batch_size: usize,

    /// Directory holding tokenizer.json (defaults to the checkpoint's directory)
    #[arg(long)]
    pub run_dir: Option<PathBuf>,
}

impl EmbedArgs {
    pub fn into_request(self, accelerator: Accelerator) -> EmbedRequest {
        EmbedRequest {
            ckpt:       self.ckpt,
            corpus:     StanceCorpus::new(self.corpus, self.corpus_type),
            output:     self.output,
            batch_size: self.batch_size,
            run_dir:    self.run_dir,
            accelerator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn fit_args(argv: &[&str]) -> (FitArgs, Option<Accelerator>) {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Fit(args) => (args, cli.device),
            other => panic!("expected fit, got {other:?}"),
        }
    }

    #[test]
    fn test_flags_build_config() {
        let (args, device) = fit_args(&[
            "stance-gator", "--device", "cpu", "fit",
            "--corpus", "semeval2016:a.tsv",
            "--corpus", "jsonl:b.jsonl:0.8,0.1,0.1:2.5",
            "--max-epochs", "7", "--classifier-hidden-units", "64",
        ]);
        let cfg = args.into_config(device).unwrap();

        assert_eq!(cfg.corpora.len(), 2);
        assert_eq!(cfg.corpora[1].corpus.sample_weight, 2.5);
        assert_eq!(cfg.trainer.max_epochs, 7);
        assert_eq!(cfg.trainer.patience, 10);
        assert_eq!(cfg.model.classifier_hidden_units, Some(64));
        assert_eq!(cfg.accelerator, Accelerator::Cpu);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{"corpora":[{"path":"x.csv","corpus_type":"pstance"}],"batch_size":8,"seed":1}"#).unwrap();

        let (args, device) = fit_args(&[
            "stance-gator", "fit", "--config", path.to_str().unwrap(), "--seed", "9",
        ]);
        let cfg = args.into_config(device).unwrap();
        assert_eq!(cfg.corpora[0].corpus.corpus_type, CorpusType::Pstance);
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.accelerator, Accelerator::Gpu);
    }

    #[test]
    fn test_bad_corpus_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["stance-gator", "fit", "--corpus", "tweets:a.csv"]).is_err());
    }

    #[test]
    fn test_embed_defaults() {
        let cli = Cli::try_parse_from([
            "stance-gator", "embed", "--ckpt", "runs/a/best.ckpt",
            "--corpus-type", "vast", "--corpus", "vast.csv",
        ]).unwrap();
        let Commands::Embed(args) = cli.command else { panic!("expected embed") };
        let req = args.into_request(Accelerator::Cpu);
        assert_eq!(req.batch_size, 64);
        assert_eq!(req.output, PathBuf::from("embeddings.npy"));
        assert_eq!(req.corpus.corpus_type, CorpusType::Vast);
    }
}
