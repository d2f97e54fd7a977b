use lens_frontend::{Frontend, FrontendConfig, MemberResolver, SearchPathResolver};
use lens_model::ModelBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::error::{IndexerError, Result};
use crate::scanner::unit_id_for_path;

/// What happened to one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Parsed, built and committed
    Indexed {
        unit_id: String,
        source_lines: usize,
        diagnostics: usize,
    },
    /// Expanded text hash matches the committed model; nothing rebuilt
    Unchanged { unit_id: String },
    /// Fatal-to-unit: recorded as failed, no model committed
    Failed { unit_id: String, reason: String },
}

impl IngestOutcome {
    #[must_use]
    pub fn unit_id(&self) -> &str {
        match self {
            Self::Indexed { unit_id, .. } | Self::Unchanged { unit_id } | Self::Failed { unit_id, .. } => {
                unit_id
            }
        }
    }
}

/// Preprocess → lex → parse → build → index → commit, one unit at a time.
///
/// Every unit reads only the shared configuration and resolver and writes only its own
/// corpus partition, so many units may run through one pipeline concurrently.
pub struct Pipeline {
    config: Arc<FrontendConfig>,
    resolver: Arc<dyn MemberResolver>,
    builder: ModelBuilder,
    corpus: Arc<Corpus>,
}

impl Pipeline {
    /// Pipeline resolving COPY members through the configured search path
    pub fn new(config: FrontendConfig, corpus: Arc<Corpus>) -> Result<Self> {
        let resolver = SearchPathResolver::from_config(&config);
        Self::with_resolver(config, Arc::new(resolver), corpus)
    }

    pub fn with_resolver(
        config: FrontendConfig,
        resolver: Arc<dyn MemberResolver>,
        corpus: Arc<Corpus>,
    ) -> Result<Self> {
        config.validate().map_err(IndexerError::Other)?;
        Ok(Self {
            config: Arc::new(config),
            resolver,
            builder: ModelBuilder::new(),
            corpus,
        })
    }

    #[must_use]
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    #[must_use]
    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    /// Ingest in-memory text as `unit_id`; re-ingestion replaces the unit wholesale
    pub fn ingest_text(&self, unit_id: &str, path: Option<PathBuf>, text: &str) -> Result<IngestOutcome> {
        let frontend = Frontend::new(&self.config, self.resolver.as_ref());

        let expanded = match frontend.preprocess(unit_id, path, text) {
            Ok(expanded) => expanded,
            Err(err) => return self.fail_or_propagate(unit_id, err),
        };

        let snapshot = self.corpus.snapshot();
        let unchanged = snapshot
            .unit(unit_id)
            .is_some_and(|entry| entry.model.content_hash == expanded.unit.content_hash);
        if unchanged {
            log::debug!("{unit_id}: content hash unchanged, skipping");
            return Ok(IngestOutcome::Unchanged {
                unit_id: unit_id.to_string(),
            });
        }

        let output = match frontend.analyze_expanded(expanded) {
            Ok(output) => output,
            Err(err) => return self.fail_or_propagate(unit_id, err),
        };
        let model = self.builder.build(output);
        let outcome = IngestOutcome::Indexed {
            unit_id: unit_id.to_string(),
            source_lines: model.metrics.source_lines as usize,
            diagnostics: model.diagnostics.len(),
        };
        self.corpus.commit(model);
        Ok(outcome)
    }

    /// Ingest a file under its default unit id (upper-cased stem)
    pub fn ingest_file(&self, path: &Path) -> Result<IngestOutcome> {
        let unit_id = unit_id_for_path(path);
        self.ingest_file_as(path, &unit_id)
    }

    pub fn ingest_file_as(&self, path: &Path, unit_id: &str) -> Result<IngestOutcome> {
        let bytes = std::fs::read(path)?;
        // legacy sources are often not UTF-8; keep going with replacement characters
        let text = String::from_utf8_lossy(&bytes);
        self.ingest_text(unit_id, Some(path.to_path_buf()), &text)
    }

    fn fail_or_propagate(&self, unit_id: &str, err: lens_frontend::FrontendError) -> Result<IngestOutcome> {
        if !err.is_fatal_to_unit() {
            return Err(err.into());
        }
        let reason = err.to_string();
        log::warn!("{unit_id}: {reason}");
        self.corpus.mark_failed(unit_id, reason.clone());
        Ok(IngestOutcome::Failed {
            unit_id: unit_id.to_string(),
            reason,
        })
    }
}
