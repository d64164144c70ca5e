//! Ingestion orchestrator
//!
//! Sequences the pipeline: extract, redact, segment, classify, baseline
//! readability, LLM summarization, risk fusion and readability comparison
//! (concurrent), clause persistence, embedding generation, document-level
//! aggregation, final status transition. Stage writes are keyed by
//! deterministic ids so re-running a stage is idempotent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use clauselens_analytics::{AnalyticsEvent, AnalyticsPublisher};
use clauselens_config::constants::risk::EVENT_SCORE_THRESHOLD;
use clauselens_core::{
    ClauseRecord, DocumentRecord, DocumentStatus, Error, ProcessingStatistics,
};
use clauselens_llm::{BatchSummarizer, ClauseInput, ClauseSummary};
use clauselens_persistence::{DocumentPatch, DocumentStore};
use clauselens_rag::EmbeddingIndexer;
use clauselens_text_processing::{
    CategoryClassifier, ClauseCandidate, ClauseSegmenter, PiiRedactor, ReadabilityReport,
    ReadabilityScorer, RedactionOutcome, RiskFuser,
};

use crate::extract::DocumentExtractor;
use crate::PipelineError;

/// Stage names recorded in `stages_completed`, in pipeline order
const STAGE_EXTRACTION: &str = "text_extraction";
const STAGE_PRIVACY: &str = "privacy_masking";
const STAGE_SEGMENTATION: &str = "clause_segmentation";
const STAGE_CLASSIFICATION: &str = "clause_classification";
const STAGE_BASELINE_READABILITY: &str = "baseline_readability";
const STAGE_SUMMARIZATION: &str = "ai_summarization";
const STAGE_RISK: &str = "risk_analysis";
const STAGE_READABILITY: &str = "readability_analysis";
const STAGE_STORAGE: &str = "data_storage";
const STAGE_EMBEDDINGS: &str = "embeddings_generation";
const STAGE_EMBEDDINGS_FAILED: &str = "embeddings_generation_failed";
const STAGE_ANALYTICS: &str = "document_analytics";

/// Orchestrator tuning
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Language recorded on the document record
    pub default_language: String,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub doc_id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub stages_completed: Vec<String>,
    pub errors: Vec<String>,
    pub statistics: Option<ProcessingStatistics>,
}

/// Detailed processing status for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub doc_id: String,
    pub status: DocumentStatus,
    pub filename: String,
    pub page_count: usize,
    pub clause_count: usize,
    pub masked: bool,
    pub pii_summary: Option<clauselens_core::PiiSummary>,
    pub progress: f64,
    pub message: String,
    pub error: Option<String>,
    pub processing_statistics: Option<ProcessingStatistics>,
}

/// The ingestion orchestrator
pub struct IngestionOrchestrator {
    extractor: DocumentExtractor,
    redactor: PiiRedactor,
    segmenter: ClauseSegmenter,
    classifier: CategoryClassifier,
    summarizer: BatchSummarizer,
    risk_fuser: RiskFuser,
    readability: ReadabilityScorer,
    indexer: EmbeddingIndexer,
    store: Arc<dyn DocumentStore>,
    analytics: Option<Arc<AnalyticsPublisher>>,
    config: OrchestratorConfig,
}

impl IngestionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: DocumentExtractor,
        redactor: PiiRedactor,
        segmenter: ClauseSegmenter,
        classifier: CategoryClassifier,
        summarizer: BatchSummarizer,
        indexer: EmbeddingIndexer,
        store: Arc<dyn DocumentStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            extractor,
            redactor,
            segmenter,
            classifier,
            summarizer,
            risk_fuser: RiskFuser::new(),
            readability: ReadabilityScorer::new(),
            indexer,
            store,
            analytics: None,
            config,
        }
    }

    pub fn with_analytics(mut self, analytics: Arc<AnalyticsPublisher>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Create the document record. Called before ingestion is enqueued so
    /// status queries never race an absent record.
    pub async fn create_document(
        &self,
        doc_id: &str,
        filename: &str,
        file_size: usize,
        session_id: Option<String>,
    ) -> Result<DocumentRecord, Error> {
        let record = DocumentRecord::new(doc_id, filename, file_size, session_id);
        self.store
            .create_document(record.clone())
            .await
            .map_err(Error::from)?;
        Ok(record)
    }

    /// Run the complete pipeline for a document already in `processing`.
    ///
    /// On stage failure the document transitions to `failed` with
    /// `failed_at_stage` set to the number of completed stages, and the
    /// error is re-raised.
    pub async fn ingest(
        &self,
        doc_id: &str,
        content: &[u8],
        filename: &str,
        mime_type: &str,
        session_id: Option<String>,
    ) -> Result<IngestionResult, Error> {
        let started = Instant::now();
        let mut stages: Vec<String> = Vec::new();

        tracing::info!(doc_id, filename, "Starting document processing pipeline");

        let outcome = self
            .run_stages(doc_id, content, filename, mime_type, &session_id, &mut stages)
            .await;

        match outcome {
            Ok((statistics, page_count)) => {
                let elapsed = started.elapsed().as_millis() as u64;
                tracing::info!(
                    doc_id,
                    clauses = statistics.total_clauses,
                    elapsed_ms = elapsed,
                    "Document processing completed"
                );

                if let Some(analytics) = &self.analytics {
                    let event = AnalyticsEvent::document_uploaded(
                        doc_id,
                        filename,
                        page_count,
                        self.language(),
                        elapsed,
                        "success",
                        session_id.clone(),
                    );
                    analytics.publish_event(&event);
                }

                Ok(IngestionResult {
                    doc_id: doc_id.to_string(),
                    filename: filename.to_string(),
                    status: DocumentStatus::Completed,
                    stages_completed: stages,
                    errors: Vec::new(),
                    statistics: Some(statistics),
                })
            },
            Err(e) => {
                let failed_at_stage = stages.len();
                tracing::error!(
                    doc_id,
                    failed_at_stage,
                    error = %e,
                    "Document processing failed"
                );

                let patch = DocumentPatch {
                    failed_at_stage: Some(failed_at_stage),
                    error: Some(e.to_string()),
                    stages_completed: Some(stages.clone()),
                    ..Default::default()
                };
                if let Err(update_error) = self
                    .store
                    .update_document_status(doc_id, DocumentStatus::Failed, patch)
                    .await
                {
                    tracing::error!(doc_id, error = %update_error, "Failed to record failure status");
                }

                Err(e)
            },
        }
    }

    async fn run_stages(
        &self,
        doc_id: &str,
        content: &[u8],
        filename: &str,
        mime_type: &str,
        session_id: &Option<String>,
        stages: &mut Vec<String>,
    ) -> Result<(ProcessingStatistics, usize), Error> {
        // Stage 1: text extraction
        let document_data = self
            .extractor
            .extract(content, filename, mime_type)
            .await
            .map_err(Error::from)?;
        stages.push(STAGE_EXTRACTION.to_string());

        self.store
            .update_document_status(
                doc_id,
                DocumentStatus::Processing,
                DocumentPatch {
                    page_count: Some(document_data.page_count),
                    language: Some(self.language().to_string()),
                    stages_completed: Some(stages.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(Error::from)?;

        // Stage 2: PII redaction
        let redaction: RedactionOutcome = self
            .redactor
            .redact(&document_data.text)
            .await
            .map_err(Error::from)?;
        stages.push(STAGE_PRIVACY.to_string());

        self.store
            .update_document_status(
                doc_id,
                DocumentStatus::Processing,
                DocumentPatch {
                    masked: Some(!redaction.matches.is_empty()),
                    pii_summary: Some(redaction.summary.clone()),
                    stages_completed: Some(stages.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(Error::from)?;

        // Stage 3: clause segmentation over the masked text
        let mut masked_document = document_data.clone();
        masked_document.text = redaction.masked_text.clone();
        mask_pages(&mut masked_document, &redaction);

        let mut candidates = self.segmenter.segment(&masked_document);
        if candidates.is_empty() {
            return Err(Error::InvalidInput(
                "no clauses could be extracted from document".to_string(),
            ));
        }
        stages.push(STAGE_SEGMENTATION.to_string());

        // Stage 4: category classification
        self.classifier.classify(&mut candidates).await;
        stages.push(STAGE_CLASSIFICATION.to_string());

        // Stage 5: baseline document readability
        let baseline = self.readability.baseline_map(&redaction.masked_text);
        self.store
            .update_document_status(
                doc_id,
                DocumentStatus::Processing,
                DocumentPatch {
                    baseline_readability: Some(baseline),
                    stages_completed: Some(stages.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(Error::from)?;
        stages.push(STAGE_BASELINE_READABILITY.to_string());

        // Stage 6: LLM summarization (per-batch failures degrade to fallbacks)
        let inputs: Vec<ClauseInput> = candidates
            .iter()
            .map(|c| ClauseInput {
                text: c.text.clone(),
                category: c.category,
            })
            .collect();
        let summaries = self.summarizer.summarize(&inputs).await;
        stages.push(STAGE_SUMMARIZATION.to_string());

        // Stages 7 and 8 run concurrently, joined before assembly; both
        // produce one result per clause in input order.
        let (assessments, readability_reports) = tokio::join!(
            async {
                candidates
                    .iter()
                    .zip(&summaries)
                    .map(|(candidate, summary)| {
                        self.risk_fuser.fuse(
                            &candidate.text,
                            Some(&summary.summary),
                            Some(summary.risk_level),
                            summary.category,
                        )
                    })
                    .collect::<Vec<_>>()
            },
            async {
                candidates
                    .iter()
                    .zip(&summaries)
                    .map(|(candidate, summary)| {
                        self.readability.compare(&candidate.text, &summary.summary)
                    })
                    .collect::<Vec<_>>()
            },
        );
        stages.push(STAGE_RISK.to_string());
        stages.push(STAGE_READABILITY.to_string());

        // Stage 9: assemble and persist clause records (fatal on error)
        let clauses = assemble_clauses(
            doc_id,
            &candidates,
            &summaries,
            &assessments,
            &readability_reports,
        );
        let clause_ids = self
            .store
            .create_clauses(doc_id, clauses.clone())
            .await
            .map_err(Error::from)?;
        stages.push(STAGE_STORAGE.to_string());
        tracing::info!(doc_id, clauses = clause_ids.len(), "Clause records stored");

        // Stage 10: embeddings (non-fatal; Q&A backfills lazily on failure)
        let embeddings_generated = match self.indexer.index(doc_id, &clauses).await {
            Ok(count) => {
                stages.push(STAGE_EMBEDDINGS.to_string());
                count > 0
            },
            Err(e) => {
                tracing::error!(doc_id, error = %e, "Embedding generation failed (non-fatal)");
                stages.push(STAGE_EMBEDDINGS_FAILED.to_string());
                false
            },
        };

        // Stage 11: document-level aggregates and per-clause analytics
        let risk_profile = self.risk_fuser.document_profile(&assessments);
        let readability_aggregate = self.readability.document_aggregate(&readability_reports);
        self.emit_clause_events(&clauses, session_id);
        stages.push(STAGE_ANALYTICS.to_string());

        let statistics = ProcessingStatistics {
            total_clauses: clauses.len(),
            pii_detected: redaction.matches.len(),
            high_risk_clauses: risk_profile["risk_distribution"]["attention"]
                .as_u64()
                .unwrap_or(0) as usize,
            avg_readability_improvement: readability_aggregate
                .get("avg_grade_level_reduction")
                .copied()
                .unwrap_or(0.0),
            embeddings_generated,
        };

        // Stage 12: terminal transition
        self.store
            .update_document_status(
                doc_id,
                DocumentStatus::Completed,
                DocumentPatch {
                    clause_count: Some(clauses.len()),
                    processing_statistics: Some(statistics.clone()),
                    risk_profile: Some(risk_profile),
                    stages_completed: Some(stages.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(Error::from)?;

        Ok((statistics, document_data.page_count))
    }

    /// Detailed status for `GET /status/{doc_id}`
    pub async fn get_processing_status(
        &self,
        doc_id: &str,
    ) -> Result<Option<ProcessingStatus>, Error> {
        let Some(document) = self.store.get_document(doc_id).await.map_err(Error::from)?
        else {
            return Ok(None);
        };

        let clauses = self
            .store
            .get_document_clauses(doc_id)
            .await
            .map_err(Error::from)?;

        let (progress, message) = match document.status {
            DocumentStatus::Processing => (
                (clauses.len() as f64 / 10.0 * 0.8).min(0.9),
                "Document is being processed".to_string(),
            ),
            DocumentStatus::Completed => {
                (1.0, "Document processing completed successfully".to_string())
            },
            DocumentStatus::Failed => (0.0, "Document processing failed".to_string()),
        };

        Ok(Some(ProcessingStatus {
            doc_id: doc_id.to_string(),
            status: document.status,
            filename: document.filename,
            page_count: document.page_count,
            clause_count: clauses.len(),
            masked: document.masked,
            pii_summary: document.pii_summary,
            progress,
            message,
            error: document.error,
            processing_statistics: document.processing_statistics,
        }))
    }

    fn emit_clause_events(&self, clauses: &[ClauseRecord], session_id: &Option<String>) {
        let Some(analytics) = &self.analytics else {
            return;
        };

        for clause in clauses {
            let event = AnalyticsEvent::clause_analyzed(
                &clause.clause_id,
                &clause.doc_id,
                clause.category.as_str(),
                clause.risk_level.as_str(),
                clause.risk_score,
                clause.confidence,
                Some(clause.readability_metrics.delta),
                session_id.clone(),
            );
            analytics.publish_event(&event);

            if clause.risk_score >= EVENT_SCORE_THRESHOLD {
                let event = AnalyticsEvent::risk_detected(
                    &clause.clause_id,
                    &clause.doc_id,
                    clause.risk_level.as_str(),
                    clause.risk_score,
                    clause.risk_factors.clone(),
                    clause.category.as_str(),
                    session_id.clone(),
                );
                analytics.publish_event(&event);
            }
        }
    }

    fn language(&self) -> &str {
        if self.config.default_language.is_empty() {
            "en"
        } else {
            &self.config.default_language
        }
    }
}

/// Apply redaction to page blocks so layout segmentation sees masked text.
///
/// Block text is re-derived by substring replacement; blocks whose raw
/// content no longer appears in the masked text keep their masked form via
/// the token table.
fn mask_pages(document: &mut clauselens_core::ExtractedDocument, redaction: &RedactionOutcome) {
    for page in &mut document.pages {
        for block in page.blocks.iter_mut().chain(page.paragraphs.iter_mut()) {
            for m in &redaction.matches {
                if block.text.contains(&m.original_text) {
                    block.text = block.text.replace(&m.original_text, &m.replacement_token);
                }
            }
        }
        if !page.text.is_empty() {
            for m in &redaction.matches {
                if page.text.contains(&m.original_text) {
                    page.text = page.text.replace(&m.original_text, &m.replacement_token);
                }
            }
        }
    }
}

/// Zip the stage outputs into clause records by index
fn assemble_clauses(
    doc_id: &str,
    candidates: &[ClauseCandidate],
    summaries: &[ClauseSummary],
    assessments: &[clauselens_core::RiskAssessment],
    readability: &[ReadabilityReport],
) -> Vec<ClauseRecord> {
    let now = Utc::now();

    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let summary = &summaries[i];
            let assessment = &assessments[i];
            let report = &readability[i];

            let mut metadata = HashMap::new();
            metadata.insert(
                "readability_improvement".to_string(),
                serde_json::json!(report.overall_improvement_score),
            );
            if let Some(heading) = &candidate.heading {
                metadata.insert("heading".to_string(), serde_json::json!(heading));
            }
            if let Some(page) = candidate.page_number {
                metadata.insert("page_number".to_string(), serde_json::json!(page));
            }

            ClauseRecord {
                clause_id: ClauseRecord::make_id(doc_id, i),
                doc_id: doc_id.to_string(),
                order: i + 1,
                original_text: candidate.text.clone(),
                summary: summary.summary.clone(),
                category: summary.category,
                risk_level: assessment.risk_level,
                risk_score: assessment.risk_score,
                needs_review: assessment.needs_review || summary.needs_review,
                readability_metrics: report.metrics,
                negotiation_tip: summary.negotiation_tip.clone(),
                // Fallback summaries carry their own low confidence
                confidence: if summary.processing_method == "fallback" {
                    summary.confidence
                } else {
                    assessment.confidence
                },
                processing_method: summary.processing_method.clone(),
                embedding: None,
                detected_keywords: assessment.detected_keywords.clone(),
                risk_factors: assessment.risk_factors.clone(),
                created_at: now,
                updated_at: now,
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauselens_core::{ClauseCategory, RiskLevel};
    use clauselens_text_processing::ClauseCandidate;

    fn candidate(order: usize, text: &str) -> ClauseCandidate {
        ClauseCandidate {
            text: text.to_string(),
            start_position: 0,
            end_position: text.len(),
            heading: None,
            confidence: 0.8,
            page_number: Some(1),
            bounding_box: None,
            order,
            category: ClauseCategory::Other,
        }
    }

    fn summary(risk: RiskLevel) -> ClauseSummary {
        ClauseSummary {
            summary: "Plain language version.".to_string(),
            category: ClauseCategory::Payment,
            risk_level: risk,
            negotiation_tip: None,
            confidence: 0.8,
            processing_method: "llm".to_string(),
            needs_review: false,
        }
    }

    #[test]
    fn test_assemble_orders_are_contiguous() {
        let candidates = vec![
            candidate(1, "Payment is due in thirty days."),
            candidate(2, "Late fees apply to overdue invoices."),
        ];
        let summaries = vec![summary(RiskLevel::Low), summary(RiskLevel::Moderate)];
        let fuser = RiskFuser::new();
        let assessments: Vec<_> = candidates
            .iter()
            .zip(&summaries)
            .map(|(c, s)| fuser.fuse(&c.text, Some(&s.summary), Some(s.risk_level), s.category))
            .collect();
        let scorer = ReadabilityScorer::new();
        let reports: Vec<_> = candidates
            .iter()
            .zip(&summaries)
            .map(|(c, s)| scorer.compare(&c.text, &s.summary))
            .collect();

        let clauses = assemble_clauses("d1", &candidates, &summaries, &assessments, &reports);

        assert_eq!(clauses.len(), 2);
        for (i, clause) in clauses.iter().enumerate() {
            assert_eq!(clause.order, i + 1);
            assert_eq!(clause.clause_id, format!("d1_clause_{}", i));
            assert_eq!(clause.risk_level, RiskLevel::from_score(clause.risk_score));
        }
    }

    #[test]
    fn test_assemble_is_deterministic_modulo_timestamps() {
        let candidates = vec![candidate(1, "Indemnify and hold harmless everyone.")];
        let summaries = vec![summary(RiskLevel::Attention)];
        let fuser = RiskFuser::new();
        let assessments: Vec<_> = candidates
            .iter()
            .zip(&summaries)
            .map(|(c, s)| fuser.fuse(&c.text, Some(&s.summary), Some(s.risk_level), s.category))
            .collect();
        let scorer = ReadabilityScorer::new();
        let reports: Vec<_> = candidates
            .iter()
            .zip(&summaries)
            .map(|(c, s)| scorer.compare(&c.text, &s.summary))
            .collect();

        let a = assemble_clauses("d1", &candidates, &summaries, &assessments, &reports);
        let b = assemble_clauses("d1", &candidates, &summaries, &assessments, &reports);

        assert_eq!(a[0].clause_id, b[0].clause_id);
        assert_eq!(a[0].summary, b[0].summary);
        assert_eq!(a[0].risk_score, b[0].risk_score);
        assert_eq!(a[0].order, b[0].order);
    }
}
