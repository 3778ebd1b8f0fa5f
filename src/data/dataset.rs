use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised sample. Sequences are NOT padded here; the
/// batcher pads each batch to its own longest sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSample {
    pub input_ids: Vec<u32>,
    /// Class id, None for unlabelled samples (prediction only)
    pub label:     Option<usize>,
    pub weight:    f32,
}

impl EncodedSample {
    pub fn seq_len(&self) -> usize {
        self.input_ids.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StanceDataset {
    samples: Vec<EncodedSample>,
}

impl StanceDataset {
    pub fn new(samples: Vec<EncodedSample>) -> Self { Self { samples } }

    /// Concatenate datasets in order, like chaining their indices.
    pub fn concat(parts: Vec<StanceDataset>) -> Self {
        let samples = parts.into_iter().flat_map(|p| p.samples).collect();
        Self { samples }
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn samples(&self) -> &[EncodedSample] { &self.samples }
}

impl Dataset<EncodedSample> for StanceDataset {
    fn get(&self, index: usize) -> Option<EncodedSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u32) -> EncodedSample {
        EncodedSample { input_ids: vec![id], label: Some(0), weight: 1.0 }
    }

    #[test]
    fn test_concat_keeps_order() {
        let a = StanceDataset::new(vec![sample(1), sample(2)]);
        let b = StanceDataset::new(vec![]);
        let c = StanceDataset::new(vec![sample(3)]);
        let all = StanceDataset::concat(vec![a, b, c]);
        assert_eq!(all.len(), 3);
        let ids: Vec<u32> = (0..3).map(|i| all.get(i).unwrap().input_ids[0]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(all.get(3).is_none());
    }
}
