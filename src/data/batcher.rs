// ============================================================
// Layer 4 — Stance Batcher (collation)
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<EncodedSample>
// into tensors for one forward pass.
//
// Samples arrive unpadded, so each batch is padded to ITS OWN
// longest sequence rather than to a global max_seq_len. Tweets
// are short; this keeps most batches far below the limit.
//
//   input_ids    [batch, seq]  Int   padded with pad_id
//   padding_mask [batch, seq]  Bool  true where padded
//   labels       [batch]       Int   class ids
//   weights      [batch]       Float per-sample loss weights

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::EncodedSample;
use crate::domain::stance::Stance;

#[derive(Debug, Clone)]
pub struct StanceBatch<B: Backend> {
    pub input_ids:    Tensor<B, 2, Int>,
    pub padding_mask: Tensor<B, 2, Bool>,
    pub labels:       Tensor<B, 1, Int>,
    pub weights:      Tensor<B, 1>,
}

#[derive(Clone, Debug)]
pub struct StanceBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: u32,
}

impl<B: Backend> StanceBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }
}

impl<B: Backend> Batcher<EncodedSample, StanceBatch<B>> for StanceBatcher<B> {
    fn batch(&self, items: Vec<EncodedSample>) -> StanceBatch<B> {
        let batch_size = items.len();
        // Never build a zero-width tensor, even for an all-empty batch
        let seq_len = items.iter().map(|s| s.seq_len()).max().unwrap_or(0).max(1);

        let mut ids_flat  = Vec::with_capacity(batch_size * seq_len);
        let mut real_flat = Vec::with_capacity(batch_size * seq_len);

        for s in &items {
            let n = s.input_ids.len();
            ids_flat.extend(s.input_ids.iter().map(|&x| x as i32));
            ids_flat.extend(std::iter::repeat(self.pad_id as i32).take(seq_len - n));
            real_flat.extend(std::iter::repeat(1i32).take(n));
            real_flat.extend(std::iter::repeat(0i32).take(seq_len - n));
        }

        let labels: Vec<i32> = items
            .iter()
            .map(|s| s.label.unwrap_or(Stance::Neutral.id()) as i32)
            .collect();
        let weights: Vec<f32> = items.iter().map(|s| s.weight).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(ids_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        // Mask comes from lengths, not from comparing ids to pad_id:
        // a real token may share the pad id in some vocabularies.
        let padding_mask = Tensor::<B, 1, Int>::from_ints(real_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
            .equal_elem(0);

        let labels  = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);
        let weights = Tensor::<B, 1>::from_floats(weights.as_slice(), &self.device);

        StanceBatch { input_ids, padding_mask, labels, weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(ids: &[u32], label: Option<usize>, weight: f32) -> EncodedSample {
        EncodedSample { input_ids: ids.to_vec(), label, weight }
    }

    #[test]
    fn test_pads_to_longest_in_batch() {
        let batcher = StanceBatcher::<TestBackend>::new(Default::default(), 9);
        let batch = batcher.batch(vec![
            sample(&[5, 6, 7], Some(1), 1.0),
            sample(&[8],       Some(0), 0.5),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 3]);
        let ids = batch.input_ids.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(ids, vec![5, 6, 7, 8, 9, 9]);

        let mask = batch.padding_mask.into_data().to_vec::<bool>().unwrap();
        assert_eq!(mask, vec![false, false, false, false, true, true]);

        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![1, 0]);

        let weights = batch.weights.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(weights, vec![1.0, 0.5]);
    }

    #[test]
    fn test_unlabelled_samples_get_placeholder_label() {
        let batcher = StanceBatcher::<TestBackend>::new(Default::default(), 0);
        let batch = batcher.batch(vec![sample(&[1, 2], None, 1.0)]);
        let labels = batch.labels.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![Stance::Neutral.id() as i64]);
    }
}
