use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{log_softmax, tanh},
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::StanceBatch;
use crate::domain::stance::Stance;
use crate::ml::backbone::{TextEncoder, TextEncoderConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct StanceClassifierConfig {
    pub encoder: TextEncoderConfig,
    #[config(default = 3)]
    pub num_classes: usize,
    /// None → a single linear layer on top of the pooled features
    pub classifier_hidden_units: Option<usize>,
    /// Applied after the hidden layer only
    #[config(default = 0.1)]
    pub classifier_dropout: f64,
}

impl StanceClassifierConfig {
    pub fn for_stance(encoder: TextEncoderConfig) -> Self {
        Self::new(encoder).with_num_classes(Stance::NUM_CLASSES)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StanceClassifier<B> {
        let encoder = self.encoder.init(device);
        let classifier = self.init_head(device);
        StanceClassifier { encoder, classifier }
    }

    /// Build the classifier around an already initialised (pretrained) encoder.
    pub fn init_with_encoder<B: Backend>(&self, encoder: TextEncoder<B>, device: &B::Device) -> StanceClassifier<B> {
        let classifier = self.init_head(device);
        StanceClassifier { encoder, classifier }
    }

    fn init_head<B: Backend>(&self, device: &B::Device) -> ClassificationHead<B> {
        let d_model = self.encoder.d_model;
        let (hidden, out_in) = match self.classifier_hidden_units {
            Some(h) => (Some(LinearConfig::new(d_model, h).init(device)), h),
            None    => (None, d_model),
        };
        ClassificationHead {
            hidden,
            dropout: DropoutConfig::new(self.classifier_dropout).init(),
            output:  LinearConfig::new(out_in, self.num_classes).init(device),
        }
    }
}

/// Learning rate per parameter group. The pretrained encoder moves
/// slowly; the freshly initialised head moves fast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamGroups {
    pub encoder_lr:    f64,
    pub classifier_lr: f64,
}

impl Default for ParamGroups {
    fn default() -> Self {
        Self { encoder_lr: 2e-5, classifier_lr: 1e-3 }
    }
}

#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pub hidden:  Option<Linear<B>>,
    pub dropout: Dropout,
    pub output:  Linear<B>,
}

impl<B: Backend> ClassificationHead<B> {
    /// features: [batch, d_model] → logits [batch, num_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = match &self.hidden {
            Some(hidden) => self.dropout.forward(tanh(hidden.forward(features))),
            None         => features,
        };
        self.output.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct StanceClassifier<B: Backend> {
    pub encoder:    TextEncoder<B>,
    pub classifier: ClassificationHead<B>,
}

pub struct ClassificationOutput<B: Backend> {
    pub loss:   Tensor<B, 1>,
    pub logits: Tensor<B, 2>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> StanceClassifier<B> {
    pub fn feature_size(&self) -> usize {
        self.encoder.feature_size()
    }

    /// Pooled encoder features, the vectors written by `embed`.
    pub fn embed(&self, input_ids: Tensor<B, 2, Int>, padding_mask: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
        self.encoder.pooled(input_ids, padding_mask)
    }

    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, padding_mask: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
        self.classifier.forward(self.embed(input_ids, padding_mask))
    }

    pub fn forward_classification(&self, batch: StanceBatch<B>) -> ClassificationOutput<B> {
        let logits = self.forward(batch.input_ids, batch.padding_mask);
        let loss   = weighted_cross_entropy(logits.clone(), batch.labels.clone(), batch.weights);
        ClassificationOutput { loss, logits, labels: batch.labels }
    }
}

/// Σ wᵢ·CEᵢ / Σ wᵢ over the batch. Returns a [1] tensor.
pub fn weighted_cross_entropy<B: Backend>(
    logits:  Tensor<B, 2>,
    labels:  Tensor<B, 1, Int>,
    weights: Tensor<B, 1>,
) -> Tensor<B, 1> {
    let [batch_size, _] = logits.dims();
    let log_probs = log_softmax(logits, 1);
    let nll = log_probs
        .gather(1, labels.unsqueeze_dim::<2>(1))
        .reshape([batch_size])
        .neg();

    let total_weight = weights.clone().sum().clamp_min(1e-12);
    (nll * weights).sum() / total_weight
}
