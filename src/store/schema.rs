//! Relational schema for the backing store.
//!
//! The embeddings table is the system of record; the in-memory indexes are
//! always rebuildable from it. `embeddings_fts` is an external-content FTS5
//! table kept in sync by triggers and queried with BM25 ranking for the
//! keyword half of hybrid search. Foreign keys cascade so deleting a document
//! removes its embeddings.

/// Schema DDL, executed as one batch at open. Idempotent.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    dimensions  INTEGER NOT NULL,
    metadata    TEXT,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    title       TEXT,
    source_url  TEXT,
    version     TEXT,
    author      TEXT,
    metadata    TEXT,
    acl         TEXT,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS embeddings (
    id             TEXT PRIMARY KEY,
    collection_id  INTEGER REFERENCES collections(id),
    vector         BLOB NOT NULL,
    content        TEXT,
    doc_id         TEXT REFERENCES documents(id) ON DELETE CASCADE,
    metadata       TEXT,
    acl            TEXT,
    created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_embeddings_collection ON embeddings(collection_id);
CREATE INDEX IF NOT EXISTS idx_embeddings_doc ON embeddings(doc_id);

CREATE TABLE IF NOT EXISTS index_snapshots (
    type        TEXT PRIMARY KEY,
    data        BLOB NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE VIRTUAL TABLE IF NOT EXISTS embeddings_fts USING fts5(
    content,
    content='embeddings',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS embeddings_fts_ai AFTER INSERT ON embeddings BEGIN
    INSERT INTO embeddings_fts(rowid, content)
    VALUES (new.rowid, coalesce(new.content, ''));
END;

CREATE TRIGGER IF NOT EXISTS embeddings_fts_ad AFTER DELETE ON embeddings BEGIN
    INSERT INTO embeddings_fts(embeddings_fts, rowid, content)
    VALUES ('delete', old.rowid, coalesce(old.content, ''));
END;

CREATE TRIGGER IF NOT EXISTS embeddings_fts_au AFTER UPDATE ON embeddings BEGIN
    INSERT INTO embeddings_fts(embeddings_fts, rowid, content)
    VALUES ('delete', old.rowid, coalesce(old.content, ''));
    INSERT INTO embeddings_fts(rowid, content)
    VALUES (new.rowid, coalesce(new.content, ''));
END;
"#;
