//! End-to-end engine scenarios.

use embervec::{
    CancelToken, DiversifyStrategy, Embedding, FilterMode, SearchRequest, StoreError, VectorStore,
};

fn unit(x: f32, y: f32, z: f32) -> Vec<f32> {
    vec![x, y, z]
}

/// Exact recall on a small orthogonal set (cosine).
#[test]
fn exact_recall_on_small_set() {
    let store = VectorStore::in_memory(3).unwrap();
    store.upsert(Embedding::new("A", unit(1.0, 0.0, 0.0))).unwrap();
    store.upsert(Embedding::new("B", unit(0.0, 1.0, 0.0))).unwrap();
    store.upsert(Embedding::new("C", unit(0.0, 0.0, 1.0))).unwrap();

    let hits = store
        .search(&SearchRequest::new(unit(1.0, 0.0, 0.0), 3))
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].embedding.id, "A");
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    // B and C are both orthogonal: either order is a valid tie.
    let tail: Vec<&str> = hits[1..].iter().map(|h| h.embedding.id.as_str()).collect();
    assert!(tail == ["B", "C"] || tail == ["C", "B"]);
    for h in &hits[1..] {
        assert!(h.score.abs() < 1e-5);
    }
}

/// A pre-filter restricts the result set in SQL.
#[test]
fn pre_filter_selects_matching_rows() {
    let store = VectorStore::in_memory(2).unwrap();
    store
        .upsert(Embedding::new("doc-item", vec![1.0, 0.0]).with_metadata("type", "doc"))
        .unwrap();
    store
        .upsert(Embedding::new("img-item", vec![0.9, 0.1]).with_metadata("type", "img"))
        .unwrap();

    let expr = embervec::filter::parse("type = 'doc'").unwrap();
    let req = SearchRequest::new(vec![1.0, 0.0], 10).with_pre_filter(expr);
    let hits = store.search(&req).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].embedding.id, "doc-item");
}

/// Post-filters apply the same predicate in memory after index retrieval.
#[test]
fn post_filter_matches_pre_filter_semantics() {
    let store = VectorStore::in_memory(2).unwrap();
    for i in 0..20 {
        let kind = if i % 2 == 0 { "even" } else { "odd" };
        store
            .upsert(
                Embedding::new(format!("v{i}"), vec![1.0, i as f32 * 0.01])
                    .with_metadata("kind", kind),
            )
            .unwrap();
    }

    let expr = embervec::filter::parse("kind = 'even'").unwrap();
    let post = SearchRequest::new(vec![1.0, 0.0], 20).with_post_filter(expr.clone());
    let pre = SearchRequest::new(vec![1.0, 0.0], 20).with_pre_filter(expr);

    let mut post_ids: Vec<String> = store
        .search(&post)
        .unwrap()
        .into_iter()
        .map(|h| h.embedding.id)
        .collect();
    let mut pre_ids: Vec<String> = store
        .search(&pre)
        .unwrap()
        .into_iter()
        .map(|h| h.embedding.id)
        .collect();
    post_ids.sort();
    pre_ids.sort();
    assert_eq!(post_ids, pre_ids);
    assert_eq!(post_ids.len(), 10);
}

/// Pre- and post-filters agree on malformed numeric metadata: `"42abc"` is
/// not a number under either path, even though SQLite's bare CAST would call
/// it 42.0.
#[test]
fn numeric_filters_agree_on_malformed_metadata() {
    let store = VectorStore::in_memory(2).unwrap();
    for (id, count) in [("clean", "42"), ("junk", "42abc"), ("other", "7")] {
        store
            .upsert(Embedding::new(id, vec![1.0, 0.0]).with_metadata("count", count))
            .unwrap();
    }

    for filter in ["count = 42", "count > 5", "count BETWEEN 40 AND 45", "count != 42"] {
        let expr = embervec::filter::parse(filter).unwrap();
        let mut pre_ids: Vec<String> = store
            .search(&SearchRequest::new(vec![1.0, 0.0], 10).with_pre_filter(expr.clone()))
            .unwrap()
            .into_iter()
            .map(|h| h.embedding.id)
            .collect();
        let mut post_ids: Vec<String> = store
            .search(&SearchRequest::new(vec![1.0, 0.0], 10).with_post_filter(expr))
            .unwrap()
            .into_iter()
            .map(|h| h.embedding.id)
            .collect();
        pre_ids.sort();
        post_ids.sort();
        assert_eq!(pre_ids, post_ids, "paths diverged on {filter:?}");
        assert!(
            filter == "count != 42" || !pre_ids.contains(&"junk".to_string()),
            "{filter:?} admitted the malformed value"
        );
    }
}

/// Pre-filtered results are a subset of unfiltered results.
#[test]
fn pre_filter_is_a_subset_of_unfiltered() {
    let store = VectorStore::in_memory(2).unwrap();
    for i in 0..30 {
        store
            .upsert(
                Embedding::new(format!("v{i}"), vec![(i as f32).cos(), (i as f32).sin()])
                    .with_metadata("bucket", if i < 10 { "a" } else { "b" }),
            )
            .unwrap();
    }

    let unfiltered: std::collections::HashSet<String> = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 30))
        .unwrap()
        .into_iter()
        .map(|h| h.embedding.id)
        .collect();

    let expr = embervec::filter::parse("bucket = 'a'").unwrap();
    let filtered = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 30).with_pre_filter(expr))
        .unwrap();
    for hit in filtered {
        assert!(unfiltered.contains(&hit.embedding.id));
    }
}

/// Hybrid RRF: an item ranked well by both legs beats single-leg items.
#[test]
fn hybrid_rrf_prefers_agreement() {
    let store = VectorStore::in_memory(3).unwrap();
    store
        .upsert(
            Embedding::new("e1", vec![0.9, 0.1, 0.0])
                .with_content("machine learning tutorial"),
        )
        .unwrap();
    store
        .upsert(
            Embedding::new("e2", vec![0.0, 1.0, 0.0]).with_content("deep learning networks"),
        )
        .unwrap();
    store
        .upsert(
            Embedding::new("e3", vec![1.0, 0.0, 0.0])
                .with_content("machine learning algorithms"),
        )
        .unwrap();

    let req =
        SearchRequest::new(vec![1.0, 0.0, 0.0], 3).with_text("machine learning", 0.0);
    let hits = store.hybrid_search(&req).unwrap();
    assert!(!hits.is_empty());
    // Both e1 and e3 rank in both legs; one of them must fuse to the top.
    assert!(hits[0].embedding.id == "e1" || hits[0].embedding.id == "e3");
}

/// ACL: public rows plus rows sharing a caller tag are visible.
#[test]
fn acl_filters_to_public_and_held_tags() {
    let store = VectorStore::in_memory(2).unwrap();
    store.upsert(Embedding::new("public", vec![1.0, 0.0])).unwrap();
    store
        .upsert(Embedding::new("alice", vec![0.9, 0.1]).with_acl(vec!["user:alice".into()]))
        .unwrap();
    store
        .upsert(Embedding::new("admin", vec![0.8, 0.2]).with_acl(vec!["group:admin".into()]))
        .unwrap();

    let req =
        SearchRequest::new(vec![1.0, 0.0], 10).with_acl(vec!["user:alice".to_string()]);
    let hits = store.search(&req).unwrap();
    let mut ids: Vec<&str> = hits.iter().map(|h| h.embedding.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["alice", "public"]);
}

/// MMR diversity: the near-duplicate loses to the diverse item.
#[test]
fn mmr_diversity_beats_near_duplicate() {
    let store = VectorStore::in_memory(3).unwrap();
    store.upsert(Embedding::new("top", vec![1.0, 0.0, 0.0])).unwrap();
    store.upsert(Embedding::new("dup", vec![0.95, 0.05, 0.0])).unwrap();
    store.upsert(Embedding::new("other", vec![0.0, 1.0, 0.0])).unwrap();

    let req = SearchRequest::new(vec![1.0, 0.0, 0.0], 2);
    let hits = store
        .search_diversified(&req, DiversifyStrategy::Mmr { lambda: 0.5 })
        .unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.embedding.id.as_str()).collect();
    assert_eq!(ids, vec!["top", "other"]);
}

/// After a batch delete, none of the deleted ids surface again.
#[test]
fn deleted_ids_never_reappear() {
    let store = VectorStore::in_memory(2).unwrap();
    for i in 0..20 {
        store
            .upsert(Embedding::new(
                format!("v{i}"),
                vec![(i as f32 * 0.3).cos(), (i as f32 * 0.3).sin()],
            ))
            .unwrap();
    }

    let doomed: Vec<String> = (0..10).map(|i| format!("v{i}")).collect();
    let removed = store.delete_batch(&doomed, &CancelToken::new()).unwrap();
    assert_eq!(removed, 10);

    for probe in 0..10 {
        let q = vec![(probe as f32 * 0.3).cos(), (probe as f32 * 0.3).sin()];
        let hits = store.search(&SearchRequest::new(q, 20)).unwrap();
        for h in &hits {
            assert!(!doomed.contains(&h.embedding.id), "{} reappeared", h.embedding.id);
        }
    }
    assert_eq!(store.count().unwrap(), 10);
}

/// Insert-then-query-self returns the item first with a perfect score.
#[test]
fn self_query_is_top_hit() {
    let store = VectorStore::in_memory(4).unwrap();
    for i in 0..25 {
        let f = i as f32;
        let mut v = vec![f.sin(), f.cos(), (f * 0.5).sin(), (f * 0.5).cos()];
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        store.upsert(Embedding::new(format!("v{i}"), v)).unwrap();
    }

    let probe = store.get("v7").unwrap();
    let hits = store
        .search(&SearchRequest::new(probe.vector.clone(), 1))
        .unwrap();
    assert_eq!(hits[0].embedding.id, "v7");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
}

/// Delete-by-filter removes exactly the matching rows, everywhere.
#[test]
fn delete_by_filter_purges_matches() {
    let store = VectorStore::in_memory(2).unwrap();
    for i in 0..10 {
        store
            .upsert(
                Embedding::new(format!("v{i}"), vec![1.0, i as f32 * 0.1])
                    .with_metadata("parity", if i % 2 == 0 { "even" } else { "odd" }),
            )
            .unwrap();
    }

    let expr = embervec::filter::parse("parity = 'odd'").unwrap();
    let removed = store.delete_by_filter(&expr, &CancelToken::new()).unwrap();
    assert_eq!(removed, 5);
    assert_eq!(store.count().unwrap(), 5);

    let hits = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 10))
        .unwrap();
    assert_eq!(hits.len(), 5);
    for h in hits {
        assert_eq!(h.embedding.metadata["parity"], "even");
    }
}

/// Document deletion cascades to embeddings and indexes.
#[test]
fn document_cascade_purges_everywhere() {
    let store = VectorStore::in_memory(2).unwrap();
    store
        .put_document(&embervec::Document {
            id: "doc1".into(),
            title: Some("guide".into()),
            ..embervec::Document::default()
        })
        .unwrap();
    store
        .upsert(Embedding::new("owned", vec![1.0, 0.0]).with_doc_id("doc1"))
        .unwrap();
    store.upsert(Embedding::new("free", vec![0.0, 1.0])).unwrap();

    let cascaded = store.delete_document("doc1").unwrap();
    assert_eq!(cascaded, vec!["owned".to_string()]);

    let hits = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 10))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].embedding.id, "free");
}

/// Range search returns everything within the radius, unbounded by k.
#[test]
fn range_search_is_radius_bounded() {
    let store = VectorStore::in_memory(2).unwrap();
    // Points along the x axis at increasing angles from the query.
    for i in 0..12 {
        let theta = i as f32 * 0.2;
        store
            .upsert(Embedding::new(
                format!("v{i}"),
                vec![theta.cos(), theta.sin()],
            ))
            .unwrap();
    }

    // Cosine distance radius 0.05 ~= angles under ~0.32 rad (v0, v1).
    let req = SearchRequest::new(vec![1.0, 0.0], 1);
    let hits = store.range_search(&req, 0.05).unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.embedding.id.as_str()).collect();
    assert_eq!(ids, vec!["v0", "v1"]);
}

/// Negative examples push matching candidates down.
#[test]
fn negative_search_penalizes_negative_neighborhood() {
    let store = VectorStore::in_memory(2).unwrap();
    store.upsert(Embedding::new("good", vec![1.0, 0.0])).unwrap();
    store.upsert(Embedding::new("bad", vec![0.0, 1.0])).unwrap();
    store.upsert(Embedding::new("both", vec![0.7, 0.7])).unwrap();

    let hits = store
        .negative_search(&embervec::NegativeRequest {
            positives: vec![vec![1.0, 0.0]],
            negatives: vec![vec![0.0, 1.0]],
            negative_weight: 1.0,
            k: 3,
            collection: None,
            acl: None,
            cancel: CancelToken::new(),
        })
        .unwrap();
    assert_eq!(hits[0].embedding.id, "good");
    assert_eq!(hits.last().unwrap().embedding.id, "bad");
}

/// The isolated point is the most anomalous.
#[test]
fn anomaly_search_surfaces_outlier() {
    let store = VectorStore::in_memory(2).unwrap();
    for i in 0..8 {
        let jitter = i as f32 * 0.01;
        store
            .upsert(Embedding::new(
                format!("cluster{i}"),
                vec![1.0 + jitter, jitter],
            ))
            .unwrap();
    }
    store
        .upsert(Embedding::new("outlier", vec![-5.0, 7.0]))
        .unwrap();

    let hits = store
        .anomaly_search(&embervec::AnomalyRequest {
            k: 1,
            neighbors: 3,
            collection: None,
            acl: None,
            cancel: CancelToken::new(),
        })
        .unwrap();
    assert_eq!(hits[0].embedding.id, "outlier");
}

/// A cancelled request surfaces `Cancelled` instead of results.
#[test]
fn cancelled_search_errors() {
    let store = VectorStore::in_memory(2).unwrap();
    store.upsert(Embedding::new("a", vec![1.0, 0.0])).unwrap();

    let mut req = SearchRequest::new(vec![1.0, 0.0], 5);
    req.cancel.cancel();
    assert!(matches!(store.search(&req), Err(StoreError::Cancelled)));
}

/// Threshold drops weak candidates; default k applies when k = 0.
#[test]
fn threshold_and_default_k() {
    let store = VectorStore::in_memory(2).unwrap();
    store.upsert(Embedding::new("close", vec![1.0, 0.0])).unwrap();
    store.upsert(Embedding::new("far", vec![-1.0, 0.0])).unwrap();

    let req = SearchRequest::new(vec![1.0, 0.0], 10).with_threshold(0.5);
    let hits = store.search(&req).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].embedding.id, "close");

    for i in 0..15 {
        store
            .upsert(Embedding::new(
                format!("v{i}"),
                vec![(i as f32 * 0.1).cos(), (i as f32 * 0.1).sin()],
            ))
            .unwrap();
    }
    let hits = store
        .search(&SearchRequest::new(vec![1.0, 0.0], 0))
        .unwrap();
    assert_eq!(hits.len(), 10, "k = 0 defaults to 10");
}

/// Filter mode helpers behave.
#[test]
fn filter_mode_default_is_none() {
    assert!(FilterMode::default().is_none());
}
