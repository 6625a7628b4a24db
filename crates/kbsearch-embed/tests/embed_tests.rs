use kbsearch_core::traits::Embedder;
use kbsearch_embed::{get_default_embedder, HashEmbedder, BGE_M3_DIM};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading large model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder().expect("embedder");
    assert_eq!(embedder.dim(), BGE_M3_DIM);
    let texts = vec!["教室コピーの方法".to_string(), "教室コピーの方法".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);
    assert_eq!(v1.len(), BGE_M3_DIM);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_embedder_puts_overlapping_text_closer() {
    let e = HashEmbedder::new(256);
    let q = e.embed("教室コピー").expect("embed");
    let near = e.embed("教室コピー機能の使い方").expect("embed");
    let far = e.embed("請求書の発行").expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_batch_is_empty() {
    let e = HashEmbedder::new(8);
    assert!(e.embed_batch(&[]).expect("embed").is_empty());
}
