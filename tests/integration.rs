//! Integration tests for the NextItNet recommender

use approx::assert_relative_eq;
use ndarray::{array, s, Array2};
use nextitnet_rec::prelude::*;
use nextitnet_rec::scoring::{last_position, score_labels};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn small_config(variant: BlockVariant) -> ModelConfig {
    ModelConfig {
        embedding_size: 8,
        block_num: 1,
        dilations: vec![1, 2],
        kernel_size: 3,
        vocab_size: 100,
        output_dim: 5,
        use_mixing: true,
        pad_token: 100,
        block_variant: variant,
        seed: Some(2024),
        ..Default::default()
    }
}

fn item_seq() -> Array2<usize> {
    array![[3, 14, 15, 92, 65, 35], [8, 97, 93, 23, 84, 62]]
}

#[test]
fn test_full_model_every_variant() {
    for variant in BlockVariant::ALL {
        for use_mixing in [false, true] {
            let model = NextItNet::new(ModelConfig {
                use_mixing,
                ..small_config(variant)
            })
            .unwrap();

            let logits = model.forward(&item_seq()).unwrap();
            assert_eq!(logits.dim(), (2, 6, 5), "variant {}", variant);
            assert!(logits.iter().all(|v| v.is_finite()), "variant {}", variant);
        }
    }
}

#[test]
fn test_model_is_causal() {
    for variant in BlockVariant::ALL {
        let model = NextItNet::new(small_config(variant)).unwrap();
        let base = model.forward(&item_seq()).unwrap();

        let mut changed = item_seq();
        changed[[0, 4]] = 1;
        changed[[1, 5]] = 2;
        let output = model.forward(&changed).unwrap();

        assert_eq!(output.slice(s![0, ..4, ..]), base.slice(s![0, ..4, ..]));
        assert_eq!(output.slice(s![1, ..5, ..]), base.slice(s![1, ..5, ..]));
        assert_ne!(output.slice(s![0, 4, ..]), base.slice(s![0, 4, ..]));
    }
}

#[test]
fn test_sequences_are_independent() {
    let model = NextItNet::new(small_config(BlockVariant::ParallelMix)).unwrap();
    let batch = model.forward(&item_seq()).unwrap();
    let single = model.forward(&item_seq().slice(s![1..2, ..]).to_owned()).unwrap();
    for (a, b) in batch.slice(s![1, .., ..]).iter().zip(single.slice(s![0, .., ..]).iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_pad_row_stays_zero() {
    let model = NextItNet::new(small_config(BlockVariant::SerialMix)).unwrap();
    let padded = array![[100, 100, 100, 7, 8, 9]];
    model.forward(&padded).unwrap();

    let pad_row = model.item_embedding.weights.row(100);
    assert!(pad_row.iter().all(|&v| v == 0.0));

    let encoded = model.item_embedding.forward(&padded).unwrap();
    assert!(encoded.slice(s![0, ..3, ..]).iter().all(|&v| v == 0.0));
}

#[test]
fn test_init_weights_then_forward() {
    let mut model = NextItNet::new(small_config(BlockVariant::MixedSerial)).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    model.init_weights(&mut rng).unwrap();

    assert!(model.item_embedding.weights.row(100).iter().all(|&v| v == 0.0));
    let logits = model.forward(&item_seq()).unwrap();
    assert!(logits.iter().all(|v| v.is_finite()));
}

#[test]
fn test_invalid_configuration() {
    let base = small_config(BlockVariant::ParallelMix);
    assert!(NextItNet::new(ModelConfig { kernel_size: 1, ..base.clone() })
        .unwrap_err()
        .is_config_error());
    assert!(NextItNet::new(ModelConfig { dilations: vec![0], ..base.clone() })
        .unwrap_err()
        .is_config_error());
    assert!(NextItNet::new(ModelConfig { dilations: vec![1 << 62], ..base.clone() })
        .unwrap_err()
        .is_config_error());
    assert!(NextItNet::new(ModelConfig { dilations: vec![usize::MAX / 2 + 1], ..base.clone() })
        .unwrap_err()
        .is_config_error());
    assert!(NextItNet::new(ModelConfig { embedding_size: 2, ..base })
        .unwrap_err()
        .is_config_error());
}

#[test]
fn test_item_id_out_of_range() {
    let model = NextItNet::new(small_config(BlockVariant::Bottleneck)).unwrap();
    let err = model.forward(&array![[1, 2, 101]]).unwrap_err();
    assert!(matches!(err, ModelError::ItemOutOfRange { id: 101, vocab_size: 100 }));
    assert!(err.is_shape_error());
}

#[test]
fn test_scoring_on_model_output() {
    let model = NextItNet::new(small_config(BlockVariant::ParallelMix)).unwrap();
    let logits = model.forward(&item_seq()).unwrap();

    let targets = array![[1, 2, 3, 4, 0, 1], [2, 3, 4, 0, 1, 2]];
    let ce = CrossEntropyLoss::default().loss(&logits, &targets).unwrap();
    assert!(ce.is_finite() && ce > 0.0);

    let negatives = array![[0, 0, 0, 0, 1, 0], [0, 0, 0, 1, 0, 0]];
    let bpr = BprLoss::default().loss(&logits, &targets, &negatives).unwrap();
    assert!(bpr.is_finite() && bpr > 0.0);

    let scores = score_labels(&logits, &targets).unwrap();
    assert_eq!(scores.dim(), (2, 6));
    assert_eq!(scores[[1, 5]], logits[[1, 5, 2]]);

    let top = TopKRanker::new(3).rank(&logits).unwrap();
    let last = last_position(&logits).unwrap();
    assert_eq!(top.len(), 2);
    for (row, labels) in last.outer_iter().zip(&top) {
        assert_eq!(labels.len(), 3);
        assert!(labels.windows(2).all(|w| row[w[0]] >= row[w[1]]));
    }
}

#[test]
fn test_config_file_roundtrip() {
    let path = std::env::temp_dir().join(format!("nextitnet_it_{}.toml", std::process::id()));
    let config = Config {
        model: small_config(BlockVariant::SerialMix),
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, config);

    let a = NextItNet::new(loaded.model).unwrap();
    let b = NextItNet::new(config.model).unwrap();
    assert_eq!(a.forward(&item_seq()).unwrap(), b.forward(&item_seq()).unwrap());
}

#[test]
fn test_model_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NextItNet>();
    assert_send_sync::<ResidualBlock>();
}
