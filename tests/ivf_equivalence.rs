//! IVF behavior against exhaustive ground truth.

use embervec::cancel::CancelToken;
use embervec::ivf::{IvfConfig, IvfIndex};
use embervec::metric::Similarity;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_vectors(n: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen_range(-10.0f32..10.0)).collect())
        .collect()
}

fn trained(corpus: &[Vec<f32>], n_centroids: usize) -> IvfIndex {
    let config = IvfConfig {
        similarity: Similarity::Euclidean,
        ..IvfConfig::new(n_centroids)
    };
    let mut index = IvfIndex::new(config, corpus[0].len(), None);
    index.train(corpus, &CancelToken::new()).unwrap();
    for (i, v) in corpus.iter().enumerate() {
        index.add(&format!("v{i}"), v).unwrap();
    }
    index
}

/// With n_probe = n_centroids, IVF search equals exhaustive search.
#[test]
fn full_probe_equals_exhaustive() {
    let corpus = random_vectors(250, 24, 13);
    let index = trained(&corpus, 10);

    let queries = random_vectors(10, 24, 99);
    for query in &queries {
        let k = 12;
        let hits = index.search_probes(query, k, 10).unwrap();

        let mut truth: Vec<(usize, f32)> = corpus
            .iter()
            .enumerate()
            .map(|(i, v)| (i, Similarity::Euclidean.distance(query, v)))
            .collect();
        truth.sort_by(|a, b| a.1.total_cmp(&b.1));
        let truth_ids: Vec<String> = truth
            .into_iter()
            .take(k)
            .map(|(i, _)| format!("v{i}"))
            .collect();

        let hit_ids: Vec<String> = hits.into_iter().map(|n| n.id).collect();
        assert_eq!(hit_ids, truth_ids);
    }
}

/// Recall improves (weakly) as n_probe grows.
#[test]
fn recall_grows_with_probes() {
    let corpus = random_vectors(400, 16, 21);
    let index = trained(&corpus, 16);
    let query = &corpus[123];
    let k = 20;

    let truth: std::collections::HashSet<String> = index
        .search_probes(query, k, 16)
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();

    let mut last_recall = 0.0f64;
    for probes in [1usize, 4, 8, 16] {
        let hits = index.search_probes(query, k, probes).unwrap();
        let found = hits.iter().filter(|h| truth.contains(&h.id)).count();
        let recall = found as f64 / truth.len() as f64;
        assert!(
            recall + 1e-9 >= last_recall,
            "recall dropped from {last_recall} to {recall} at {probes} probes"
        );
        last_recall = recall;
    }
    assert!((last_recall - 1.0).abs() < 1e-9);
}
