// ============================================================
// Layer 6 — NumPy Export
// ============================================================
// Writes embeddings as a plain float32 .npy array of shape
// [num_samples, feature_size]. No pickled objects, so
// `np.load(path)` works with allow_pickle=False.

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::{fs, path::Path};

pub fn write_embeddings(path: &Path, values: Vec<f32>, dim: usize) -> Result<()> {
    if dim == 0 {
        bail!("Embedding dimension must be positive");
    }
    if values.len() % dim != 0 {
        bail!("{} values do not form rows of width {}", values.len(), dim);
    }
    let rows = values.len() / dim;
    let array = Array2::from_shape_vec((rows, dim), values)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    ndarray_npy::write_npy(path, &array)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;

    tracing::info!("Wrote {}×{} embeddings to '{}'", rows, dim, path.display());
    Ok(())
}

pub fn read_embeddings(path: &Path) -> Result<Array2<f32>> {
    ndarray_npy::read_npy(path).with_context(|| format!("Cannot read '{}'", path.display()))
}
