// ============================================================
// Layer 5 — Text Encoder Backbone
// ============================================================
// The pretrained part of the classifier. Architecture:
//
//   token embedding + learned position embedding
//       → dropout
//       → Burn TransformerEncoder (pre-norm, N layers)
//       → final LayerNorm
//
// All attention math lives in burn::nn::transformer; this file
// only wires embeddings and pooling around it.
//
// Pooling for the classifier and for embedding export is the
// mean over NON-PAD positions, so a short tweet padded to the
// batch max is not diluted by padding vectors.

use burn::{
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
    },
    prelude::*,
};

#[derive(Config, Debug)]
pub struct TextEncoderConfig {
    pub vocab_size:  usize,
    #[config(default = 128)]
    pub max_seq_len: usize,
    #[config(default = 256)]
    pub d_model:     usize,
    #[config(default = 8)]
    pub num_heads:   usize,
    #[config(default = 4)]
    pub num_layers:  usize,
    #[config(default = 1024)]
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl TextEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let transformer = TransformerEncoderConfig::new(self.d_model, self.d_ff, self.num_heads, self.num_layers)
            .with_dropout(self.dropout)
            .with_norm_first(true)
            .init(device);
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();

        TextEncoder {
            token_embedding,
            position_embedding,
            transformer,
            final_norm,
            dropout,
            d_model:     self.d_model,
            max_seq_len: self.max_seq_len,
        }
    }
}

#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub transformer:        TransformerEncoder<B>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub d_model:            usize,
    pub max_seq_len:        usize,
}

impl<B: Backend> TextEncoder<B> {
    pub fn feature_size(&self) -> usize {
        self.d_model
    }

    /// input_ids, padding_mask: [batch, seq_len] → hidden states [batch, seq_len, d_model].
    /// seq_len must not exceed max_seq_len; the sample encoder truncates to it.
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, padding_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb = self.token_embedding.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let x = self.dropout.forward(tok_emb + pos_emb);
        let x = self.transformer.forward(TransformerEncoderInput::new(x).mask_pad(padding_mask));
        self.final_norm.forward(x)
    }

    /// Mean of the hidden states over non-pad positions → [batch, d_model].
    pub fn pooled(&self, input_ids: Tensor<B, 2, Int>, padding_mask: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
        let [batch_size, _] = input_ids.dims();
        let hidden = self.forward(input_ids, padding_mask.clone());

        let keep   = padding_mask.bool_not().float().unsqueeze_dim::<3>(2); // [b, s, 1]
        let summed = (hidden * keep.clone()).sum_dim(1);                    // [b, 1, d]
        let count  = keep.sum_dim(1).clamp_min(1.0);                        // [b, 1, 1]

        (summed / count).reshape([batch_size, self.d_model])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> TextEncoderConfig {
        TextEncoderConfig::new(20)
            .with_max_seq_len(8)
            .with_d_model(16)
            .with_num_heads(2)
            .with_num_layers(1)
            .with_d_ff(32)
            .with_dropout(0.0)
    }

    #[test]
    fn test_pooled_shape() {
        let device = Default::default();
        let encoder = tiny().init::<TestBackend>(&device);
        let ids  = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 3], [4, 0, 0]], &device);
        let mask = ids.clone().equal_elem(0);
        let out  = encoder.pooled(ids, mask);
        assert_eq!(out.dims(), [2, 16]);
        assert_eq!(encoder.feature_size(), 16);
    }

    #[test]
    fn test_padding_does_not_change_pooled_features() {
        let device = Default::default();
        let encoder = tiny().init::<TestBackend>(&device);

        let short      = Tensor::<TestBackend, 2, Int>::from_ints([[5, 6]], &device);
        let short_mask = Tensor::<TestBackend, 2, Int>::from_ints([[0, 0]], &device).equal_elem(1);
        let padded      = Tensor::<TestBackend, 2, Int>::from_ints([[5, 6, 0, 0]], &device);
        let padded_mask = Tensor::<TestBackend, 2, Int>::from_ints([[0, 0, 1, 1]], &device).equal_elem(1);

        let a = encoder.pooled(short, short_mask).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let b = encoder.pooled(padded, padded_mask).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }
}
