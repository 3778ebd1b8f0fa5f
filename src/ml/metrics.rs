// ============================================================
// Layer 5 — Classification Metrics
// ============================================================
// Confusion matrix over class ids with the scores the stance
// literature reports. The stopping metric is macro F1: the
// unweighted mean of per-class F1, so the rare "favor" class
// counts as much as the dominant "against" class.
//
// Classes that appear in neither the targets nor the
// predictions are left out of the macro average instead of
// contributing an F1 of 0.

#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    /// counts[target][prediction]
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes, counts: vec![vec![0; num_classes]; num_classes] }
    }

    /// Ids outside 0..num_classes are ignored.
    pub fn update(&mut self, predictions: &[usize], targets: &[usize]) {
        for (&p, &t) in predictions.iter().zip(targets) {
            if p < self.num_classes && t < self.num_classes {
                self.counts[t][p] += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &ConfusionMatrix) {
        for (row, other_row) in self.counts.iter_mut().zip(&other.counts) {
            for (c, o) in row.iter_mut().zip(other_row) {
                *c += o;
            }
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: u64 = (0..self.num_classes).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    fn true_positives(&self, class: usize) -> u64 {
        self.counts[class][class]
    }

    fn predicted(&self, class: usize) -> u64 {
        self.counts.iter().map(|row| row[class]).sum()
    }

    fn support(&self, class: usize) -> u64 {
        self.counts[class].iter().sum()
    }

    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.true_positives(class), self.predicted(class))
    }

    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.true_positives(class), self.support(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn macro_f1(&self) -> f64 {
        let present: Vec<usize> = (0..self.num_classes)
            .filter(|&c| self.support(c) > 0 || self.predicted(c) > 0)
            .collect();
        if present.is_empty() {
            return 0.0;
        }
        present.iter().map(|&c| self.f1(c)).sum::<f64>() / present.len() as f64
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
