//! Concurrent extraction feeding a single assembler.
//!
//! Extraction (the slow, network-bound part) runs on up to `concurrency`
//! tasks. Results travel over a bounded channel to the one consumer that
//! owns the [`GraphAssembler`], which ingests them strictly in submission
//! order. The assembler never sees concurrent writes, and a run over the
//! same documents always produces the same graph.
//!
//! At most `concurrency + queue_depth` units are started but not yet
//! ingested, so a slow unit at the head of the line stalls new extractions
//! instead of growing the reorder buffer.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::assembler::{AssemblyOutput, GraphAssembler};
use super::chunker::{chunk_document, SourceDocument};
use super::response::{ResponseError, ResponseParser, ResponseResult};
use crate::candidate::Extraction;
use crate::config::PipelineConfig;
use crate::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction failed: {0}")]
    Failed(String),
    #[error("No recorded reply for {0}")]
    MissingReply(String),
    #[error("Unusable reply: {0}")]
    Response(#[from] ResponseError),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// The external extraction collaborator: text in, candidates out.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, document: &SourceDocument) -> ExtractionResult<Extraction>;
}

/// Replays stored model replies, keyed by document id.
pub struct RecordedExtractor {
    parser: ResponseParser,
    replies: BTreeMap<String, String>,
}

impl RecordedExtractor {
    pub fn new() -> ResponseResult<Self> {
        Ok(Self {
            parser: ResponseParser::new()?,
            replies: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn with_reply(mut self, document_id: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(document_id.into(), reply.into());
        self
    }

    /// Every regular file in `dir` is one reply; its file stem is the
    /// document id.
    pub fn from_dir(dir: &Path) -> crate::Result<Self> {
        let mut extractor = Self::new()?;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "Skipping reply with a non UTF-8 name");
                continue;
            };
            let reply = std::fs::read_to_string(&path)?;
            extractor.replies.insert(stem.to_string(), reply);
        }

        info!(dir = %dir.display(), replies = extractor.replies.len(), "Loaded recorded replies");
        Ok(extractor)
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// One document per stored reply, in id order. The text is the reply
    /// itself.
    #[must_use]
    pub fn documents(&self) -> Vec<SourceDocument> {
        self.replies
            .iter()
            .map(|(id, reply)| SourceDocument::new(id.clone(), reply.clone()))
            .collect()
    }
}

#[async_trait]
impl Extractor for RecordedExtractor {
    async fn extract(&self, document: &SourceDocument) -> ExtractionResult<Extraction> {
        let reply = self
            .replies
            .get(&document.id)
            .ok_or_else(|| ExtractionError::MissingReply(document.id.clone()))?;
        Ok(self.parser.parse(&document.id, reply)?.extraction)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub documents: usize,
    pub chunks: usize,
    pub extracted: usize,
    pub failed: usize,
}

pub struct IngestPipeline {
    assembler: GraphAssembler,
    extractor: Arc<dyn Extractor>,
    config: PipelineConfig,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(
        assembler: GraphAssembler,
        extractor: impl Extractor + 'static,
        config: PipelineConfig,
    ) -> Self {
        Self {
            assembler,
            extractor: Arc::new(extractor),
            config,
        }
    }

    pub fn assembler(&self) -> &GraphAssembler {
        &self.assembler
    }

    /// Chunks every document and ingests the extraction of each chunk.
    pub async fn run(&mut self, documents: Vec<SourceDocument>) -> PipelineStats {
        let mut units = Vec::new();
        let mut stats = PipelineStats {
            documents: documents.len(),
            ..PipelineStats::default()
        };

        for document in &documents {
            match chunk_document(document, self.config.chunk_size) {
                Ok(chunks) => units.extend(chunks),
                Err(e) => {
                    stats.failed += 1;
                    self.record_failure(&document.id, &e);
                }
            }
        }

        let extracted = self.run_prepared(units).await;
        stats.chunks = extracted.chunks;
        stats.extracted = extracted.extracted;
        stats.failed += extracted.failed;
        stats
    }

    /// Extracts and ingests `units` as given, without chunking.
    pub async fn run_prepared(&mut self, units: Vec<SourceDocument>) -> PipelineStats {
        let total = units.len();
        let ids: Vec<String> = units.iter().map(|u| u.id.clone()).collect();
        let mut stats = PipelineStats {
            documents: total,
            chunks: total,
            ..PipelineStats::default()
        };

        let concurrency = self.config.concurrency.max(1);
        let queue_depth = self.config.queue_depth.max(1);
        let window = Arc::new(Semaphore::new(concurrency + queue_depth));
        let (tx, mut rx) = mpsc::channel(queue_depth);
        let producer = tokio::spawn(extract_all(
            Arc::clone(&self.extractor),
            units,
            concurrency,
            Arc::clone(&window),
            tx,
        ));

        // Reorder buffer: results arrive in completion order and are
        // ingested in submission order.
        let mut pending: HashMap<usize, ExtractionResult<Extraction>> = HashMap::new();
        let mut next = 0;
        while let Some((sequence, result)) = rx.recv().await {
            pending.insert(sequence, result);
            while let Some(result) = pending.remove(&next) {
                self.ingest(&ids[next], result, &mut stats);
                window.add_permits(1);
                next += 1;
            }
        }

        if let Err(e) = producer.await {
            warn!(error = %e, "Extraction producer stopped early");
        }

        // A task that never reported back leaves a gap; ingest what was
        // buffered behind it in order.
        for (sequence, id) in ids.iter().enumerate().skip(next) {
            match pending.remove(&sequence) {
                Some(result) => self.ingest(id, result, &mut stats),
                None => {
                    stats.failed += 1;
                    self.assembler
                        .record_unrecoverable(id, "extraction task did not complete");
                }
            }
        }

        info!(
            chunks = stats.chunks,
            extracted = stats.extracted,
            failed = stats.failed,
            "Pipeline run finished"
        );
        stats
    }

    fn ingest(
        &mut self,
        document_id: &str,
        result: ExtractionResult<Extraction>,
        stats: &mut PipelineStats,
    ) {
        match result {
            Ok(extraction) => {
                stats.extracted += 1;
                self.assembler.ingest_extraction(document_id, extraction);
            }
            Err(e) => {
                stats.failed += 1;
                self.assembler.record_unrecoverable(document_id, &e.to_string());
            }
        }
    }

    fn record_failure(&mut self, document_id: &str, error: &Error) {
        let reason = match error {
            Error::UnrecoverableInput { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        self.assembler.record_unrecoverable(document_id, &reason);
    }

    #[must_use]
    pub fn finish(self) -> AssemblyOutput {
        self.assembler.output()
    }
}

async fn extract_all(
    extractor: Arc<dyn Extractor>,
    units: Vec<SourceDocument>,
    concurrency: usize,
    window: Arc<Semaphore>,
    tx: mpsc::Sender<(usize, ExtractionResult<Extraction>)>,
) {
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for (sequence, unit) in units.into_iter().enumerate() {
        // Returned by the consumer once this unit has been ingested.
        let Ok(slot) = window.acquire().await else {
            break;
        };
        slot.forget();
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let extractor = Arc::clone(&extractor);
        let tx = tx.clone();

        tasks.spawn(async move {
            // Every unit reports back, even one whose extractor panicked.
            let result = tokio::spawn(async move { extractor.extract(&unit).await })
                .await
                .unwrap_or_else(|e| Err(ExtractionError::Failed(format!("extraction task failed: {e}"))));
            // A closed receiver means the consumer is gone; nothing to do.
            let _ = tx.send((sequence, result)).await;
            drop(permit);
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Extraction task failed");
        }
    }
}
