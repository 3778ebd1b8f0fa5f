// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Randomly partitions one corpus into three subsets:
//   - Training set:   used to update model weights
//   - Validation set: drives checkpointing and early stopping
//   - Test set:       only touched once, after training
//
// Subset sizes follow the usual fractional-split rule:
//   1. size_i = floor(n * fraction_i)
//   2. the leftover (n - Σ size_i) is handed out one sample
//      at a time, round-robin, starting with the train subset
// so the three sizes always add up to n.
//
// The shuffle uses a seeded StdRng: the same seed and the same
// corpus always give the same split, which is what lets the
// `test` command rebuild the exact held-out set of a past run.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::corpus::DataRatio;

/// Subset sizes for `total` items under `ratio`.
pub fn split_lengths(total: usize, ratio: &DataRatio) -> [usize; 3] {
    let fractions = ratio.fractions();
    let mut lengths = fractions.map(|f| ((total as f64) * f).floor() as usize);

    let assigned: usize = lengths.iter().sum();
    let remainder = total.saturating_sub(assigned);
    for i in 0..remainder {
        lengths[i % lengths.len()] += 1;
    }
    lengths
}

/// Shuffle `samples` with `seed` and split them into (train, val, test).
pub fn random_split<T>(
    mut samples: Vec<T>,
    ratio:       &DataRatio,
    seed:        u64,
) -> (Vec<T>, Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let [n_train, n_val, _] = split_lengths(total, ratio);

    // split_off(n) keeps [..n] in place and returns [n..]
    let mut rest = samples.split_off(n_train);
    let test     = rest.split_off(n_val);
    let val      = rest;

    tracing::debug!(
        "Dataset split: {} train, {} val, {} test",
        samples.len(), val.len(), test.len()
    );

    (samples, val, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(a: f64, b: f64, c: f64) -> DataRatio {
        DataRatio::new(a, b, c).unwrap()
    }

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val, test) = random_split(items, &ratio(0.8, 0.1, 0.1), 7);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   10);
        assert_eq!(test.len(),  10);
    }

    #[test]
    fn test_remainder_goes_round_robin() {
        // 10 * 0.7 = 7, 10 * 0.15 = 1.5 → 1, 1.5 → 1; 1 leftover → train
        assert_eq!(split_lengths(10, &ratio(0.7, 0.15, 0.15)), [8, 1, 1]);
        // 3 items, thirds: floor gives 0 each, all 3 handed out in turn
        assert_eq!(split_lengths(3, &ratio(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)), [1, 1, 1]);
        assert_eq!(split_lengths(2, &ratio(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)), [1, 1, 0]);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..53).collect();
        let (train, val, test) = random_split(items, &ratio(0.6, 0.3, 0.1), 1);
        let mut all: Vec<usize> = train.into_iter().chain(val).chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..53).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = random_split((0..40).collect::<Vec<usize>>(), &ratio(0.5, 0.25, 0.25), 42);
        let b = random_split((0..40).collect::<Vec<usize>>(), &ratio(0.5, 0.25, 0.25), 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, val, test) = random_split(Vec::<usize>::new(), &DataRatio::default(), 0);
        assert!(train.is_empty() && val.is_empty() && test.is_empty());
    }

    #[test]
    fn test_full_training_split() {
        let (train, val, test) = random_split((0..10).collect::<Vec<usize>>(), &ratio(1.0, 0.0, 0.0), 3);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
        assert!(test.is_empty());
    }
}
