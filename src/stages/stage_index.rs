use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::io::ChunkStore;
use crate::llm::EmbeddingBackend;
use crate::models::{Chunk, ChunkExtraction, ChunkRecord};

/// Configuration for chunk indexing
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Embedding calls in flight at once
    pub concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Result of indexing one interview's chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub embedded: usize,
    pub failed: usize,
    pub inserted: usize,
}

/// Embed chunks with a bounded worker pool and persist them as records
///
/// Chunks have no ordering dependency here, so up to `concurrency` embedding
/// calls run at once. A chunk whose embedding fails is logged and left out;
/// the remaining records are inserted once, in chunk order.
pub async fn index_chunks<E: EmbeddingBackend, S: ChunkStore>(
    embedder: &E,
    store: &S,
    interview_id: &str,
    chunks: &[Chunk],
    extractions: &[ChunkExtraction],
    config: &IndexConfig,
) -> Result<IndexReport, StoreError> {
    info!(
        "Indexing {} chunks with {} workers",
        chunks.len(),
        config.concurrency
    );

    let results: Vec<_> = stream::iter(chunks)
        .map(|chunk| async move { (chunk, embedder.embed(&chunk.text).await) })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let created_at = chrono::Utc::now().to_rfc3339();
    let mut records = Vec::with_capacity(results.len());
    let mut failed = 0;

    for (chunk, result) in results {
        match result {
            Ok(embedding) => records.push(ChunkRecord {
                interview_id: interview_id.to_string(),
                chunk_index: chunk.index,
                text: chunk.text.clone(),
                char_start: chunk.char_start,
                char_end: chunk.char_end,
                token_estimate: chunk.token_estimate(),
                key_points: key_points(extractions.iter().find(|e| e.chunk_index == chunk.index)),
                embedding,
                created_at: created_at.clone(),
            }),
            Err(e) => {
                warn!("Chunk {}: embedding failed, not indexed: {}", chunk.index, e);
                failed += 1;
            }
        }
    }
    records.sort_by_key(|r| r.chunk_index);

    let inserted = if records.is_empty() {
        0
    } else {
        store.insert(&records).await?
    };

    info!(
        "Indexed {} chunks ({} embedding failures, {} inserted)",
        records.len(),
        failed,
        inserted
    );

    Ok(IndexReport {
        embedded: records.len(),
        failed,
        inserted,
    })
}

fn key_points(extraction: Option<&ChunkExtraction>) -> Vec<String> {
    let Some(extraction) = extraction else {
        return Vec::new();
    };
    extraction
        .pains
        .iter()
        .map(|p| p.description.clone())
        .chain(extraction.feature_requests.iter().map(|f| f.description.clone()))
        .chain(extraction.needs.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::llm::scripted::ScriptedEmbedder;
    use crate::models::{ExtractionMeta, ExtractionPayload, Pain};

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<ChunkRecord>>,
    }

    impl ChunkStore for MemoryStore {
        async fn insert(&self, records: &[ChunkRecord]) -> Result<usize, StoreError> {
            self.records.lock().unwrap().extend_from_slice(records);
            Ok(records.len())
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            char_start: index * 100,
            char_end: index * 100 + text.chars().count(),
            speaker_stats: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_index_embeds_and_stores_in_order() {
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk(i, &format!("Alice: chunk number {}", i)))
            .collect();
        let extractions = vec![ChunkExtraction::from_payload(
            3,
            ExtractionPayload {
                pains: vec![Pain {
                    id: "slow-sync".to_string(),
                    description: "Sync is slow".to_string(),
                    severity: 4,
                    evidence: vec![],
                }],
                needs: vec!["work offline".to_string()],
                ..Default::default()
            },
            ExtractionMeta::default(),
        )];
        let store = MemoryStore::default();

        let report = index_chunks(
            &ScriptedEmbedder,
            &store,
            "int-1",
            &chunks,
            &extractions,
            &IndexConfig { concurrency: 3 },
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            IndexReport {
                embedded: 10,
                failed: 0,
                inserted: 10
            }
        );
        let records = store.records.lock().unwrap();
        let indices: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert_eq!(records[3].key_points, vec!["Sync is slow", "work offline"]);
        assert!(records[0].key_points.is_empty());
        assert_eq!(records[0].embedding[0], chunks[0].text.chars().count() as f32);
        assert_eq!(records[2].interview_id, "int-1");
    }

    #[tokio::test]
    async fn test_failed_embeddings_are_skipped() {
        let chunks = vec![
            chunk(0, "Alice: fine"),
            chunk(1, "Bob: FAIL here"),
            chunk(2, "Alice: also fine"),
        ];
        let store = MemoryStore::default();

        let report = index_chunks(
            &ScriptedEmbedder,
            &store,
            "int-1",
            &chunks,
            &[],
            &IndexConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.embedded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(store.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_to_insert() {
        let store = MemoryStore::default();

        let report = index_chunks(&ScriptedEmbedder, &store, "int-1", &[], &[], &IndexConfig::default())
            .await
            .unwrap();

        assert_eq!(report.inserted, 0);
    }
}
