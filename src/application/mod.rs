// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers; no model math and no clap
// types in here.
//
//   fit_use_case.rs   — train, keep the best checkpoint, test it
//   test_use_case.rs  — evaluate a checkpoint on its test split
//   embed_use_case.rs — pooled features of one corpus → .npy
//
// The backend is picked once, at the top of each use case, from
// an Accelerator value. Everything below is generic over it.

pub mod fit_use_case;
pub mod test_use_case;
pub mod embed_use_case;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Autodiff backend used for training on the GPU.
pub type GpuTrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
/// Autodiff backend used for training on the CPU.
pub type CpuTrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
pub type GpuBackend = burn::backend::Wgpu;
pub type CpuBackend = burn::backend::NdArray;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    #[default]
    Gpu,
    Cpu,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Accelerator::Gpu => "gpu",
            Accelerator::Cpu => "cpu",
        })
    }
}

impl FromStr for Accelerator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" | "wgpu" => Ok(Accelerator::Gpu),
            "cpu" | "ndarray" => Ok(Accelerator::Cpu),
            other => bail!("Unknown device '{other}', expected gpu or cpu"),
        }
    }
}

/// Directory a checkpoint lives in; `test` and `embed` read the
/// tokenizer and run config from there unless told otherwise.
pub fn run_dir_of(ckpt: &Path, run_dir: Option<PathBuf>) -> PathBuf {
    run_dir.unwrap_or_else(|| {
        ckpt.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accelerator_parsing() {
        assert_eq!("GPU".parse::<Accelerator>().unwrap(), Accelerator::Gpu);
        assert_eq!("ndarray".parse::<Accelerator>().unwrap(), Accelerator::Cpu);
        assert!("tpu".parse::<Accelerator>().is_err());
        assert_eq!(serde_json::to_string(&Accelerator::Cpu).unwrap(), "\"cpu\"");
    }

    #[test]
    fn test_run_dir_defaults_to_checkpoint_parent() {
        let ckpt = Path::new("runs/a/epoch=01-val_macro_f1=0.500.ckpt");
        assert_eq!(run_dir_of(ckpt, None), PathBuf::from("runs/a"));
        assert_eq!(run_dir_of(Path::new("x.ckpt"), None), PathBuf::from("."));
        assert_eq!(run_dir_of(ckpt, Some("other".into())), PathBuf::from("other"));
    }
}
