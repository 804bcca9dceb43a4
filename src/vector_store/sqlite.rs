//! SQLite-backed document store.
//!
//! Metadata filters are pushed down as a parameterized WHERE clause; cosine
//! similarity is computed in Rust over the surviving rows. Case-insensitive
//! predicates compare through `unicode_lower`, since SQLite's own `LOWER` and
//! `LIKE` only fold ASCII. Rows are re-checked with the compiled matcher.

use super::{
    cosine_similarity, rank, ChunkMetadata, DocumentChunk, DocumentStore, ScoredChunk,
    StoredChunk, Vocabulary,
};
use crate::embedding::Embedder;
use crate::error::{Result, SiftError};
use crate::query::FilterExpression;
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    video_id TEXT NOT NULL,
    start_time REAL NOT NULL,
    text TEXT NOT NULL,
    title TEXT NOT NULL,
    show_name TEXT NOT NULL,
    hosts TEXT NOT NULL,
    published_at INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (video_id, start_time)
);

CREATE INDEX IF NOT EXISTS idx_chunks_show_name ON chunks(show_name);
CREATE INDEX IF NOT EXISTS idx_chunks_published_at ON chunks(published_at);
"#;

/// SQLite-backed document store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        register_functions(&conn)?;

        info!("Opened SQLite document store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        register_functions(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SiftError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

/// `unicode_lower(x)`: full Unicode lowercase, NULL stays NULL.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Render a filter tree as a WHERE clause, pushing bind values onto `params`.
pub(crate) fn where_clause(filter: &FilterExpression, params: &mut Vec<SqlValue>) -> String {
    match filter {
        FilterExpression::And(children) => join(children, " AND ", "1=1", params),
        FilterExpression::Or(children) => join(children, " OR ", "0=1", params),
        FilterExpression::In { field, values } => {
            if values.is_empty() {
                return "0=1".to_string();
            }
            params.extend(values.iter().cloned().map(SqlValue::Text));
            let slots = vec!["?"; values.len()].join(", ");
            format!("{} IN ({})", field.as_str(), slots)
        }
        FilterExpression::Like { field, pattern } => {
            params.push(SqlValue::Text(pattern.clone()));
            format!("{} LIKE ? ESCAPE '\\'", field.as_str())
        }
        FilterExpression::ILike { field, pattern } => {
            params.push(SqlValue::Text(pattern.clone()));
            format!("unicode_lower({}) LIKE unicode_lower(?) ESCAPE '\\'", field.as_str())
        }
        FilterExpression::Gte { field, value } => {
            params.push(SqlValue::Integer(*value));
            format!("{} >= ?", field.as_str())
        }
        FilterExpression::Lte { field, value } => {
            params.push(SqlValue::Integer(*value));
            format!("{} <= ?", field.as_str())
        }
    }
}

fn join(
    children: &[FilterExpression],
    separator: &str,
    empty: &str,
    params: &mut Vec<SqlValue>,
) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = children
        .iter()
        .map(|c| where_clause(c, params))
        .collect();
    format!("({})", parts.join(separator))
}

#[async_trait]
impl DocumentStore for SqliteVectorStore {
    #[instrument(skip(self, filter))]
    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: Option<&FilterExpression>,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text).await?;
        let matcher = filter.map(FilterExpression::compile).transpose()?;

        let mut bind = Vec::new();
        let clause = match filter {
            Some(f) => where_clause(f, &mut bind),
            None => "1=1".to_string(),
        };
        let sql = format!(
            "SELECT video_id, start_time, text, title, show_name, hosts, published_at, embedding \
             FROM chunks WHERE {}",
            clause
        );
        debug!("Search SQL: {}", sql);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
            let embedding_bytes: Vec<u8> = row.get(7)?;
            let chunk = DocumentChunk {
                text: row.get(2)?,
                metadata: ChunkMetadata {
                    video_id: row.get(0)?,
                    start_time: row.get(1)?,
                    title: row.get(3)?,
                    show_name: row.get(4)?,
                    hosts: row.get(5)?,
                    published_at: row.get(6)?,
                },
            };
            Ok((chunk, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk, embedding) = row?;
            if matcher.as_ref().map_or(true, |m| m.matches(&chunk)) {
                hits.push(ScoredChunk {
                    score: cosine_similarity(&query_embedding, &embedding),
                    chunk,
                });
            }
        }

        debug!("Found {} matching chunks", hits.len());
        Ok(rank(hits, k))
    }

    #[instrument(skip(self))]
    async fn get_unique_metadata(&self, min_host_videos: usize) -> Result<Vocabulary> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT video_id, show_name, hosts FROM chunks")?;
        let rows = stmt.query_map([], |row| {
            Ok(ChunkMetadata {
                video_id: row.get(0)?,
                show_name: row.get(1)?,
                hosts: row.get(2)?,
                title: String::new(),
                published_at: 0,
                start_time: 0.0,
            })
        })?;

        let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        let vocabulary = Vocabulary::from_metadata(&rows, min_host_videos);
        debug!(
            "Loaded {} shows and {} hosts",
            vocabulary.show_names.len(),
            vocabulary.hosts.len()
        );
        Ok(vocabulary)
    }

    #[instrument(skip(self, chunks))]
    async fn upsert_batch(&self, chunks: &[StoredChunk]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for stored in chunks {
            let meta = &stored.chunk.metadata;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (video_id, start_time, text, title, show_name, hosts, published_at, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    meta.video_id,
                    meta.start_time,
                    stored.chunk.text,
                    meta.title,
                    meta.show_name,
                    meta.hosts,
                    meta.published_at,
                    Self::embedding_to_bytes(&stored.embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{DateConstraint, FilterBuilder, ParsedQuery};
    use crate::testing::{chunk, KeywordEmbedder};

    fn embedder() -> Arc<KeywordEmbedder> {
        Arc::new(KeywordEmbedder::new(&["rocket", "league", "zelda"]))
    }

    async fn seed(store: &SqliteVectorStore, embedder: &KeywordEmbedder) {
        let rows = [
            ("a1", 10.0, 1_609_459_300, "Rocket League is back", "Gamescast", "Greg Miller, Tim Gettys"),
            ("a1", 20.0, 1_609_459_300, "zelda news", "Gamescast", "Greg Miller, Tim Gettys"),
            ("b2", 0.0, 1_577_836_900, "rocket league again", "Gamescast", "Greg Miller"),
            ("c3", 5.0, 1_609_459_300, "ROCKET LEAGUE tournament", "PS I Love You XOXO", "Host_B"),
        ];

        let mut stored = Vec::new();
        for (id, start, published_at, text, show, hosts) in rows {
            let mut c = chunk(id, start, published_at, text);
            c.metadata.show_name = show.to_string();
            c.metadata.hosts = hosts.to_string();
            stored.push(StoredChunk {
                embedding: embedder.embed(text).await.unwrap(),
                chunk: c,
            });
        }
        store.upsert_batch(&stored).await.unwrap();
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let embedder = embedder();
        let store = SqliteVectorStore::in_memory(embedder.clone()).unwrap();
        seed(&store, &embedder).await;
        assert_eq!(store.chunk_count().await.unwrap(), 4);

        let parsed = ParsedQuery {
            shows: ["Gamescast".to_string()].into(),
            hosts: ["Greg Miller".to_string()].into(),
            topics: vec!["rocket league".to_string()],
            date: Some(DateConstraint::Exact(2021)),
        };
        let filter = FilterBuilder::new(2012, 2025).build(&parsed).unwrap();

        let hits = store
            .similarity_search("rocket league", 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.video_id(), "a1");
        assert_eq!(hits[0].chunk.metadata.start_time, 10.0);
    }

    #[tokio::test]
    async fn test_host_like_is_literal() {
        let embedder = embedder();
        let store = SqliteVectorStore::in_memory(embedder.clone()).unwrap();
        seed(&store, &embedder).await;

        let parsed = ParsedQuery {
            hosts: ["Host_B".to_string()].into(),
            ..Default::default()
        };
        let filter = FilterBuilder::new(2012, 2025).build(&parsed).unwrap();
        let hits = store.similarity_search("anything", 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.video_id(), "c3");
    }

    #[test]
    fn test_where_clause() {
        let filter = FilterExpression::And(vec![
            FilterExpression::In {
                field: crate::query::Field::ShowName,
                values: vec!["A".into(), "B".into()],
            },
            FilterExpression::In {
                field: crate::query::Field::ShowName,
                values: vec![],
            },
        ]);
        let mut bind = Vec::new();
        let clause = where_clause(&filter, &mut bind);
        assert_eq!(clause, "(show_name IN (?, ?) AND 0=1)");
        assert_eq!(bind.len(), 2);

        let topics = FilterBuilder::topic_group(&["Zelda".to_string()]).unwrap();
        let mut bind = Vec::new();
        assert_eq!(
            where_clause(&topics, &mut bind),
            "(unicode_lower(text) LIKE unicode_lower(?) ESCAPE '\\' OR unicode_lower(title) LIKE unicode_lower(?) ESCAPE '\\')"
        );
    }

    #[tokio::test]
    async fn test_topic_match_folds_non_ascii_case() {
        let embedder = embedder();
        let store = SqliteVectorStore::in_memory(embedder.clone()).unwrap();
        let text = "ÉLDEN RING and POKÉMON talk";
        store
            .upsert_batch(&[StoredChunk {
                embedding: embedder.embed(text).await.unwrap(),
                chunk: chunk("p1", 0.0, 1_609_459_300, text),
            }])
            .await
            .unwrap();

        let parsed = ParsedQuery {
            topics: vec!["Pokémon".to_string()],
            ..Default::default()
        };
        let filter = FilterBuilder::new(2012, 2025).build(&parsed).unwrap();
        assert!(filter.compile().unwrap().matches(&chunk("p1", 0.0, 1_609_459_300, text)));

        let hits = store.similarity_search("Pokémon", 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.video_id(), "p1");
    }

    #[tokio::test]
    async fn test_vocabulary_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("chunks.db");
        let embedder = embedder();

        {
            let store = SqliteVectorStore::new(&path, embedder.clone()).unwrap();
            seed(&store, &embedder).await;
        }

        let store = SqliteVectorStore::new(&path, embedder).unwrap();
        let vocab = store.get_unique_metadata(2).await.unwrap();
        assert_eq!(vocab.show_names, vec!["Gamescast", "PS I Love You XOXO"]);
        assert_eq!(vocab.hosts, vec!["Greg Miller"]);
    }
}
