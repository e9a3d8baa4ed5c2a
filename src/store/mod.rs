//! SQLite backing store and candidate fetcher.
//!
//! The store owns the durable representation: embedding rows, collections,
//! documents, the FTS5 keyword index, and the snapshot blobs. The engine
//! treats it as the system of record; every in-memory index is rebuildable
//! from it.
//!
//! Concurrency: a single `Mutex<Connection>` serializes statements. The
//! engine's readers-writer locking happens a level above; the store only
//! guarantees statement-level atomicity (plus SQLite's own transactional
//! semantics for multi-row operations).

mod schema;

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::filter::{lower, FilterExpr, SqlParam};
use crate::snapshot::SnapshotKind;
use crate::types::{blob_to_vector, vector_to_blob, Embedding};

/// A document row. Embedding rows referencing it are cascade-deleted with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Optional title.
    pub title: Option<String>,
    /// Optional source URL.
    pub source_url: Option<String>,
    /// Optional version marker.
    pub version: Option<String>,
    /// Optional author.
    pub author: Option<String>,
}

/// Candidate selection pushed down to SQL.
#[derive(Clone, Debug, Default)]
pub struct CandidateQuery<'a> {
    /// Restrict to these ids (materializing index hits).
    pub ids: Option<&'a [String]>,
    /// Restrict to a collection by name (joined in SQL).
    pub collection: Option<&'a str>,
    /// Caller ACL tags: rows are visible when public (`acl IS NULL`) or when
    /// any row tag is among these.
    pub acl: Option<&'a [String]>,
    /// Metadata pre-filter, lowered to predicate SQL.
    pub pre_filter: Option<&'a FilterExpr>,
    /// Row cap; `None` materializes every match.
    pub limit: Option<usize>,
}

/// The SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) a store at `path`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on any SQLite failure.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory store (dropped on close; used by tests and
    /// ephemeral workloads).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on any SQLite failure.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // INSERT OR REPLACE must fire the FTS delete trigger for the row it
        // displaces, or the keyword index accumulates ghost entries.
        conn.pragma_update(None, "recursive_triggers", "ON")?;
        register_numeric_parse(&conn)?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Ensures a collection row exists and returns `(id, dimensions)`.
    ///
    /// An existing collection keeps its recorded dimensions; the caller is
    /// responsible for comparing them against its own configuration.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<(i64, usize)> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions) VALUES (?1, ?2)",
            params![name, dimensions as i64],
        )?;
        let (id, dims): (i64, i64) = conn.query_row(
            "SELECT id, dimensions FROM collections WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((id, dims as usize))
    }

    /// Records the dimensions of a collection (used when the store locks its
    /// dimension on first insert).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn set_collection_dimensions(&self, name: &str, dimensions: usize) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE collections
             SET dimensions = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE name = ?1",
            params![name, dimensions as i64],
        )?;
        Ok(())
    }

    /// Inserts or wholesale-replaces an embedding row.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure; [`StoreError::Metadata`]
    /// if metadata or ACL fail to serialize.
    pub fn put_embedding(&self, embedding: &Embedding, collection: &str) -> Result<()> {
        let (collection_id, _) = self.ensure_collection(collection, embedding.vector.len())?;
        let metadata = serde_json::to_string(&embedding.metadata)?;
        let acl = embedding
            .acl
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO embeddings
                 (id, collection_id, vector, content, doc_id, metadata, acl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                embedding.id,
                collection_id,
                vector_to_blob(&embedding.vector),
                embedding.content,
                embedding.doc_id,
                metadata,
                acl,
            ],
        )?;
        Ok(())
    }

    /// Fetches one embedding by id.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn get_embedding(&self, id: &str) -> Result<Option<Embedding>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT e.id, e.vector, e.content, e.doc_id, e.metadata, e.acl
             FROM embeddings e WHERE e.id = ?1",
            params![id],
            row_to_embedding,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Deletes one embedding row. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn delete_embedding(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let n = conn.execute("DELETE FROM embeddings WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Deletes a batch of embedding rows inside one transaction, returning
    /// the number actually removed. Missing ids are simply not counted.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn delete_embeddings(&self, ids: &[String]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0usize;
        {
            let mut stmt = tx.prepare("DELETE FROM embeddings WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Number of embedding rows.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn count_embeddings(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT count(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// All embedding ids in row order.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn all_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM embeddings ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Materializes every embedding row (rebuilds and training corpora).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn all_embeddings(&self) -> Result<Vec<Embedding>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.vector, e.content, e.doc_id, e.metadata, e.acl
             FROM embeddings e ORDER BY e.rowid",
        )?;
        let rows = stmt.query_map([], row_to_embedding)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Materializes candidates under the pushed-down predicates.
    ///
    /// # Errors
    ///
    /// [`FilterError::Unlowerable`] (wrapped) when the pre-filter has no SQL
    /// form — the caller demotes it to a post-filter and retries;
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn fetch_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<Embedding>> {
        let mut sql = String::from(
            "SELECT e.id, e.vector, e.content, e.doc_id, e.metadata, e.acl FROM embeddings e",
        );
        let mut params_out: Vec<SqliteValue> = Vec::new();
        let mut counter = 1usize;
        let mut clauses: Vec<String> = Vec::new();

        if let Some(collection) = query.collection {
            sql.push_str(" JOIN collections c ON c.id = e.collection_id");
            clauses.push(format!("c.name = ?{counter}"));
            params_out.push(SqliteValue::Text(collection.to_string()));
            counter += 1;
        }

        if let Some(ids) = query.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let mut placeholders = Vec::with_capacity(ids.len());
            for id in ids {
                placeholders.push(format!("?{counter}"));
                params_out.push(SqliteValue::Text(id.clone()));
                counter += 1;
            }
            clauses.push(format!("e.id IN ({})", placeholders.join(", ")));
        }

        if let Some(tags) = query.acl {
            // Public rows pass; otherwise any shared tag grants visibility.
            let mut placeholders = Vec::with_capacity(tags.len());
            for tag in tags {
                placeholders.push(format!("?{counter}"));
                params_out.push(SqliteValue::Text(tag.clone()));
                counter += 1;
            }
            if placeholders.is_empty() {
                clauses.push("e.acl IS NULL".to_string());
            } else {
                clauses.push(format!(
                    "(e.acl IS NULL OR EXISTS (SELECT 1 FROM json_each(e.acl) \
                     WHERE json_each.value IN ({})))",
                    placeholders.join(", ")
                ));
            }
        }

        if let Some(expr) = query.pre_filter {
            let predicate = lower(expr, counter)?;
            counter += predicate.params.len();
            for p in predicate.params {
                params_out.push(match p {
                    SqlParam::Text(s) => SqliteValue::Text(s),
                    SqlParam::Real(x) => SqliteValue::Real(x),
                });
            }
            clauses.push(predicate.clause);
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY e.rowid");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT ?{counter}"));
            params_out.push(SqliteValue::Integer(limit as i64));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params_out), row_to_embedding)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// BM25-ranked keyword search over embedding content.
    ///
    /// Returns `(id, bm25)` pairs best-first. Query text is tokenized on
    /// whitespace and each token quoted, so FTS5 operator characters in user
    /// text cannot break the MATCH expression.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn keyword_search(&self, text: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let match_expr = fts_match_expr(text);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT e.id, bm25(embeddings_fts) AS rank
             FROM embeddings_fts
             JOIN embeddings e ON e.rowid = embeddings_fts.rowid
             WHERE embeddings_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Inserts or replaces a document row.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn put_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO documents (id, title, source_url, version, author)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![doc.id, doc.title, doc.source_url, doc.version, doc.author],
        )?;
        Ok(())
    }

    /// Deletes a document; its embeddings cascade. Returns the ids of the
    /// cascaded embeddings so the caller can evict them from indexes.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn delete_document(&self, id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM embeddings WHERE doc_id = ?1")?;
        let rows = stmt.query_map(params![id], |row| row.get::<_, String>(0))?;
        let mut cascaded = Vec::new();
        for row in rows {
            cascaded.push(row?);
        }
        drop(stmt);
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(cascaded)
    }

    /// Writes (overwriting) a snapshot blob of the given kind.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn save_snapshot(&self, kind: SnapshotKind, data: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO index_snapshots (type, data) VALUES (?1, ?2)",
            params![kind.as_str(), data],
        )?;
        Ok(())
    }

    /// Reads a snapshot blob of the given kind, if present.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn load_snapshot(&self, kind: SnapshotKind) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT data FROM index_snapshots WHERE type = ?1",
            params![kind.as_str()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Drops a snapshot blob (after a failed decode, so the next open does
    /// not retry a known-bad blob).
    ///
    /// # Errors
    ///
    /// [`StoreError::Backing`] on SQLite failure.
    pub fn clear_snapshot(&self, kind: SnapshotKind) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM index_snapshots WHERE type = ?1",
            params![kind.as_str()],
        )?;
        Ok(())
    }
}

/// Registers `embervec_real(x)`: the strict numeric parse used by lowered
/// numeric filter predicates.
///
/// SQLite's bare CAST is lenient (`CAST('42abc' AS REAL)` is `42.0`), which
/// would let a pre-filter match rows the in-memory evaluator rejects. This
/// function applies the same `f64` parse as the evaluator and returns NULL
/// for anything that does not parse in full, so both filter paths agree.
fn register_numeric_parse(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "embervec_real",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let parsed: Option<f64> = match ctx.get_raw(0) {
                ValueRef::Integer(i) => Some(i as f64),
                ValueRef::Real(r) => Some(r),
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.trim().parse::<f64>().ok()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            };
            Ok(parsed)
        },
    )?;
    Ok(())
}

/// Quotes each whitespace token for FTS5 so user text is treated literally.
/// Tokens with no word characters are dropped; an empty phrase is an FTS5
/// syntax error.
fn fts_match_expr(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_to_embedding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Embedding> {
    let id: String = row.get(0)?;
    let blob: Vec<u8> = row.get(1)?;
    let content: Option<String> = row.get(2)?;
    let doc_id: Option<String> = row.get(3)?;
    let metadata_json: Option<String> = row.get(4)?;
    let acl_json: Option<String> = row.get(5)?;

    let vector = blob_to_vector(&blob).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Blob,
            format!("malformed vector blob for embedding {id}").into(),
        )
    })?;

    let metadata: HashMap<String, String> = match metadata_json {
        Some(json) => serde_json::from_str(&json).unwrap_or_default(),
        None => HashMap::new(),
    };
    let acl: Option<Vec<String>> =
        acl_json.and_then(|json| serde_json::from_str(&json).ok());

    Ok(Embedding {
        id,
        vector,
        content,
        doc_id,
        metadata,
        acl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{parse, FilterError};

    fn store_with_rows() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = [
            ("a", vec![1.0, 0.0], Some("machine learning tutorial"), "doc"),
            ("b", vec![0.0, 1.0], Some("deep learning networks"), "img"),
            ("c", vec![0.5, 0.5], Some("machine learning algorithms"), "doc"),
        ];
        for (id, vector, content, kind) in rows {
            let mut e = Embedding::new(id, vector).with_metadata("type", kind);
            if let Some(c) = content {
                e = e.with_content(c);
            }
            store.put_embedding(&e, "default").unwrap();
        }
        store
    }

    #[test]
    fn put_get_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let e = Embedding::new("x", vec![1.5, -2.5])
            .with_content("hello")
            .with_metadata("k", "v")
            .with_acl(vec!["user:alice".into()]);
        store.put_embedding(&e, "default").unwrap();

        let got = store.get_embedding("x").unwrap().unwrap();
        assert_eq!(got, e);
        assert_eq!(store.get_embedding("missing").unwrap(), None);
    }

    #[test]
    fn replace_is_wholesale() {
        let store = SqliteStore::open_in_memory().unwrap();
        let e1 = Embedding::new("x", vec![1.0]).with_metadata("a", "1");
        store.put_embedding(&e1, "default").unwrap();
        let e2 = Embedding::new("x", vec![2.0]);
        store.put_embedding(&e2, "default").unwrap();

        let got = store.get_embedding("x").unwrap().unwrap();
        assert_eq!(got.vector, vec![2.0]);
        assert!(got.metadata.is_empty());
        assert_eq!(store.count_embeddings().unwrap(), 1);
    }

    #[test]
    fn delete_batch_counts_only_real_rows() {
        let store = store_with_rows();
        let removed = store
            .delete_embeddings(&["a".into(), "ghost".into(), "b".into()])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.count_embeddings().unwrap(), 1);
    }

    #[test]
    fn fetch_candidates_with_pre_filter() {
        let store = store_with_rows();
        let expr = parse("type = 'doc'").unwrap();
        let hits = store
            .fetch_candidates(&CandidateQuery {
                pre_filter: Some(&expr),
                ..CandidateQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn fetch_candidates_by_ids_and_collection() {
        let store = store_with_rows();
        let ids = vec!["a".to_string(), "b".to_string()];
        let hits = store
            .fetch_candidates(&CandidateQuery {
                ids: Some(&ids),
                collection: Some("default"),
                ..CandidateQuery::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 2);

        let none = store
            .fetch_candidates(&CandidateQuery {
                ids: Some(&ids),
                collection: Some("other"),
                ..CandidateQuery::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn acl_clause_admits_public_and_matching() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_embedding(&Embedding::new("pub", vec![0.0]), "default")
            .unwrap();
        store
            .put_embedding(
                &Embedding::new("alice", vec![0.0]).with_acl(vec!["user:alice".into()]),
                "default",
            )
            .unwrap();
        store
            .put_embedding(
                &Embedding::new("admin", vec![0.0]).with_acl(vec!["group:admin".into()]),
                "default",
            )
            .unwrap();

        let caller = vec!["user:alice".to_string()];
        let hits = store
            .fetch_candidates(&CandidateQuery {
                acl: Some(&caller),
                ..CandidateQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["pub", "alice"]);
    }

    #[test]
    fn numeric_pre_filter_uses_strict_parse() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (id, count) in [("clean", "42"), ("junk", "42abc"), ("word", "many")] {
            store
                .put_embedding(
                    &Embedding::new(id, vec![0.0]).with_metadata("count", count),
                    "default",
                )
                .unwrap();
        }

        // A lenient CAST would admit "42abc" here; the strict parse must not.
        let eq = parse("count = 42").unwrap();
        let hits = store
            .fetch_candidates(&CandidateQuery {
                pre_filter: Some(&eq),
                ..CandidateQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["clean"]);

        let gt = parse("count > 5").unwrap();
        let hits = store
            .fetch_candidates(&CandidateQuery {
                pre_filter: Some(&gt),
                ..CandidateQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["clean"]);

        // != treats unparseable values as not-equal, like the evaluator.
        let ne = parse("count != 42").unwrap();
        let hits = store
            .fetch_candidates(&CandidateQuery {
                pre_filter: Some(&ne),
                ..CandidateQuery::default()
            })
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["junk", "word"]);
    }

    #[test]
    fn unlowerable_filter_surfaces_as_error() {
        let store = store_with_rows();
        let expr = parse("type REGEX 'd.c'").unwrap();
        let err = store
            .fetch_candidates(&CandidateQuery {
                pre_filter: Some(&expr),
                ..CandidateQuery::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Filter(FilterError::Unlowerable(_))
        ));
    }

    #[test]
    fn keyword_search_ranks_by_bm25() {
        let store = store_with_rows();
        let hits = store.keyword_search("machine learning", 10).unwrap();
        assert_eq!(hits.len(), 2);
        for (id, _) in &hits {
            assert!(id == "a" || id == "c");
        }
        // Replaced rows stay searchable through the trigger chain.
        let e = Embedding::new("a", vec![1.0, 0.0]).with_content("completely different");
        store.put_embedding(&e, "default").unwrap();
        let hits = store.keyword_search("machine learning", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "c");
    }

    #[test]
    fn keyword_search_survives_operator_characters() {
        let store = store_with_rows();
        // Unbalanced quote and FTS operators must not panic the MATCH.
        assert!(store.keyword_search("machine AND \"", 10).is_ok());
        assert!(store.keyword_search("", 10).unwrap().is_empty());
    }

    #[test]
    fn document_cascade_removes_embeddings() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_document(&Document {
                id: "doc1".into(),
                title: Some("t".into()),
                ..Document::default()
            })
            .unwrap();
        store
            .put_embedding(
                &Embedding::new("e1", vec![0.0]).with_doc_id("doc1"),
                "default",
            )
            .unwrap();
        store
            .put_embedding(&Embedding::new("e2", vec![0.0]), "default")
            .unwrap();

        let cascaded = store.delete_document("doc1").unwrap();
        assert_eq!(cascaded, vec!["e1".to_string()]);
        assert_eq!(store.get_embedding("e1").unwrap(), None);
        assert!(store.get_embedding("e2").unwrap().is_some());
    }

    #[test]
    fn snapshot_blob_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.load_snapshot(SnapshotKind::Hnsw).unwrap(), None);
        store.save_snapshot(SnapshotKind::Hnsw, &[1, 2, 3]).unwrap();
        store.save_snapshot(SnapshotKind::Hnsw, &[4, 5]).unwrap();
        assert_eq!(
            store.load_snapshot(SnapshotKind::Hnsw).unwrap(),
            Some(vec![4, 5])
        );
        store.clear_snapshot(SnapshotKind::Hnsw).unwrap();
        assert_eq!(store.load_snapshot(SnapshotKind::Hnsw).unwrap(), None);
    }

    #[test]
    fn ensure_collection_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (id1, dims1) = store.ensure_collection("default", 128).unwrap();
        let (id2, dims2) = store.ensure_collection("default", 64).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(dims1, 128);
        // Existing row keeps its dimensions.
        assert_eq!(dims2, 128);
    }
}
