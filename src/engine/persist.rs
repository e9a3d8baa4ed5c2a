//! Index persistence: snapshot save on close, restore-or-rebuild on open.
//!
//! Restore is best-effort by design. A missing, version-incompatible, or
//! corrupt snapshot is never fatal: the affected index is rebuilt from the
//! backing rows (HNSW) or left untrained pending an explicit retrain (IVF),
//! and the bad blob is cleared so the next open does not retry it. A valid
//! HNSW snapshot that lags the backing rows (e.g. after a crash between
//! insert and close) is topped up with the missing rows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::hnsw::HnswIndex;
use crate::ivf::IvfIndex;
use crate::quant::Quantizer;
use crate::snapshot::{self, SnapshotKind};
use crate::types::Embedding;

use super::{map_ivf_cancel, Inner};

/// Snapshot-on-close budget, independent of any caller context, so shutdown
/// makes progress under load.
const CLOSE_DEADLINE: Duration = Duration::from_secs(5);

/// Creates fresh, empty indexes for the locked dimension. The index configs
/// inherit the store-level similarity so every layer navigates under the
/// same distance.
pub(crate) fn build_indexes(inner: &mut Inner) {
    let quantizer = inner.quantizer.clone();
    if let Some(cfg) = &inner.config.hnsw {
        let mut cfg = cfg.clone();
        cfg.similarity = inner.config.similarity;
        inner.hnsw = Some(RwLock::new(HnswIndex::new(
            cfg,
            inner.dims,
            quantizer.clone(),
        )));
    }
    if let Some(cfg) = &inner.config.ivf {
        let mut cfg = cfg.clone();
        cfg.similarity = inner.config.similarity;
        inner.ivf = Some(RwLock::new(IvfIndex::new(cfg, inner.dims, quantizer)));
    }
}

/// Open path: restore indexes from snapshots where possible, rebuild from
/// the backing rows otherwise.
pub(crate) fn restore_or_rebuild(inner: &mut Inner) -> Result<()> {
    // Quantizer first: index snapshots written on encoded vectors need it.
    if let Some(blob) = inner.store.load_snapshot(SnapshotKind::Quantizer)? {
        match snapshot::open(&blob).and_then(Quantizer::from_bytes) {
            Ok(q) if q.dims() == inner.dims => {
                inner.quantizer = Some(Arc::new(q));
            }
            Ok(q) => {
                log::warn!(
                    "discarding quantizer snapshot: dimension {} != {}",
                    q.dims(),
                    inner.dims
                );
                inner.store.clear_snapshot(SnapshotKind::Quantizer)?;
            }
            Err(e) => {
                log::warn!("discarding undecodable quantizer snapshot: {e}");
                inner.store.clear_snapshot(SnapshotKind::Quantizer)?;
            }
        }
    }

    build_indexes(inner);

    let mut rebuild_hnsw = false;
    if inner.hnsw.is_some() {
        match inner.store.load_snapshot(SnapshotKind::Hnsw)? {
            Some(blob) => {
                match snapshot::open(&blob)
                    .and_then(|payload| HnswIndex::from_bytes(payload, inner.quantizer.clone()))
                {
                    Ok(index) if index.dims() == inner.dims => {
                        log::debug!("restored HNSW snapshot with {} nodes", index.len());
                        *inner.hnsw.as_ref().expect("built above").write() = index;
                    }
                    Ok(_) => {
                        log::warn!("discarding HNSW snapshot with stale dimensions");
                        inner.store.clear_snapshot(SnapshotKind::Hnsw)?;
                        rebuild_hnsw = true;
                    }
                    Err(e) => {
                        log::warn!("HNSW snapshot unusable, rebuilding from rows: {e}");
                        inner.store.clear_snapshot(SnapshotKind::Hnsw)?;
                        rebuild_hnsw = true;
                    }
                }
            }
            None => rebuild_hnsw = true,
        }
    }

    if inner.ivf.is_some() {
        match inner.store.load_snapshot(SnapshotKind::Ivf)? {
            Some(blob) => {
                match snapshot::open(&blob)
                    .and_then(|payload| IvfIndex::from_bytes(payload, inner.quantizer.clone()))
                {
                    Ok(index) if index.dims() == inner.dims => {
                        log::debug!("restored IVF snapshot with {} entries", index.len());
                        *inner.ivf.as_ref().expect("built above").write() = index;
                    }
                    Ok(_) => {
                        log::warn!("discarding IVF snapshot with stale dimensions");
                        inner.store.clear_snapshot(SnapshotKind::Ivf)?;
                    }
                    Err(e) => {
                        // A fresh untrained index stands in; searches route
                        // elsewhere until an explicit retrain.
                        log::warn!("IVF snapshot unusable, awaiting retrain: {e}");
                        inner.store.clear_snapshot(SnapshotKind::Ivf)?;
                    }
                }
            }
            None => {}
        }
    }

    if inner.hnsw.is_some() {
        let rows = if rebuild_hnsw {
            inner.store.all_embeddings()?
        } else {
            // Top-up: a valid snapshot may still lag the backing rows.
            let guard = inner.hnsw.as_ref().expect("built above").read();
            let missing: Vec<String> = inner
                .store
                .all_ids()?
                .into_iter()
                .filter(|id| !guard.contains(id))
                .collect();
            drop(guard);
            if missing.is_empty() {
                Vec::new()
            } else {
                log::info!("HNSW snapshot lags store by {} rows, topping up", missing.len());
                let mut rows = Vec::with_capacity(missing.len());
                for id in &missing {
                    if let Some(row) = inner.store.get_embedding(id)? {
                        rows.push(row);
                    }
                }
                rows
            }
        };

        if !rows.is_empty() {
            let slot = inner.hnsw.as_ref().expect("built above");
            let mut guard = slot.write();
            let mut failures = 0usize;
            for row in &rows {
                if let Err(e) = guard.insert(&row.id, &row.vector) {
                    failures += 1;
                    log::warn!("rebuild skipped {}: {e}", row.id);
                }
            }
            log::info!(
                "HNSW rebuilt from backing store: {} nodes, {} skipped",
                guard.len(),
                failures
            );
        }
    }

    Ok(())
}

/// Rebuilds both indexes from the given rows (used after quantizer training
/// flips storage to encoded vectors). Builds into fresh local indexes and
/// swaps them in whole, so a cancellation mid-build leaves no partial state.
pub(crate) fn rebuild_indexes(
    inner: &mut Inner,
    rows: &[Embedding],
    cancel: &CancelToken,
) -> Result<()> {
    let quantizer = inner.quantizer.clone();

    if let (Some(slot), Some(cfg)) = (&inner.hnsw, &inner.config.hnsw) {
        let mut cfg = cfg.clone();
        cfg.similarity = inner.config.similarity;
        let mut fresh = HnswIndex::new(cfg, inner.dims, quantizer.clone());
        for (i, row) in rows.iter().enumerate() {
            if i % 100 == 0 {
                cancel.check()?;
            }
            if row.vector.len() != inner.dims {
                continue;
            }
            if let Err(e) = fresh.insert(&row.id, &row.vector) {
                log::warn!("rebuild skipped {}: {e}", row.id);
            }
        }
        *slot.write() = fresh;
    }

    if let (Some(slot), Some(cfg)) = (&inner.ivf, &inner.config.ivf) {
        let was_trained = slot.read().is_trained();
        let mut cfg = cfg.clone();
        cfg.similarity = inner.config.similarity;
        let mut fresh = IvfIndex::new(cfg, inner.dims, quantizer);
        if was_trained {
            let corpus: Vec<Vec<f32>> = rows
                .iter()
                .filter(|r| r.vector.len() == inner.dims)
                .map(|r| r.vector.clone())
                .collect();
            fresh.train(&corpus, cancel).map_err(map_ivf_cancel)?;
            for row in rows {
                if row.vector.len() != inner.dims {
                    continue;
                }
                if let Err(e) = fresh.add(&row.id, &row.vector) {
                    log::warn!("ivf rebuild skipped {}: {e}", row.id);
                }
            }
        }
        *slot.write() = fresh;
    }

    Ok(())
}

/// Close path: persist quantizer, HNSW, and IVF snapshots under the
/// 5-second deadline. Failures are logged and never block close.
pub(crate) fn save_snapshots(inner: &Inner) {
    let deadline = Instant::now() + CLOSE_DEADLINE;

    if let Some(quantizer) = &inner.quantizer {
        let blob = snapshot::seal(quantizer.to_bytes());
        if let Err(e) = inner.store.save_snapshot(SnapshotKind::Quantizer, &blob) {
            log::warn!("quantizer snapshot failed on close: {e}");
        }
    }

    if Instant::now() >= deadline {
        log::warn!("snapshot deadline elapsed before index snapshots; skipping");
        return;
    }
    if let Some(hnsw) = &inner.hnsw {
        let blob = snapshot::seal(hnsw.read().to_bytes());
        if let Err(e) = inner.store.save_snapshot(SnapshotKind::Hnsw, &blob) {
            log::warn!("HNSW snapshot failed on close: {e}");
        }
    }

    if Instant::now() >= deadline {
        log::warn!("snapshot deadline elapsed before IVF snapshot; skipping");
        return;
    }
    if let Some(ivf) = &inner.ivf {
        let blob = snapshot::seal(ivf.read().to_bytes());
        if let Err(e) = inner.store.save_snapshot(SnapshotKind::Ivf, &blob) {
            log::warn!("IVF snapshot failed on close: {e}");
        }
    }
}
