use anyhow::{Context, Result};
use lens_frontend::FrontendConfig;
use lens_indexer::{
    Corpus, IngestStats, Pipeline, ProjectIngestor, UnitScanner, UnitStore, STORE_DIR_NAME,
};
use lens_search::QueryEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Overrides, ProjectConfig};

const SETTINGS_FILE_NAME: &str = "settings.json";

/// A project root with its persisted corpus
pub struct Workspace {
    root: PathBuf,
    pipeline: Arc<Pipeline>,
    store: UnitStore,
    concurrency: Option<usize>,
}

impl Workspace {
    pub fn open(root: &Path, config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Invalid project path {}", root.display()))?;
        let project = ProjectConfig::load(&root, config_file)?;
        let mut config = project.frontend_config(&root, overrides)?;

        // directories holding .cpy members join the search path after configured ones
        for dir in UnitScanner::new(&root).scan().copy_dirs {
            if !config.copy_paths.contains(&dir) {
                config.copy_paths.push(dir);
            }
        }

        let pipeline = Pipeline::new(config, Arc::new(Corpus::new()))?;
        Ok(Self {
            store: UnitStore::for_project_root(&root),
            concurrency: project.concurrency(overrides),
            pipeline: Arc::new(pipeline),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Restore persisted units, unless they were built under different settings
    pub async fn load(&self) -> Result<usize> {
        if self.stored_config()?.as_ref() != Some(self.pipeline.config()) {
            log::info!("Frontend settings changed; ignoring stored units");
            return Ok(0);
        }
        let restored = self.store.restore_into(self.pipeline.corpus()).await?;
        log::debug!("Restored {restored} units from {}", self.store.dir().display());
        Ok(restored)
    }

    /// Re-ingest changed units and persist the result
    pub async fn refresh(&self) -> Result<(IngestStats, usize)> {
        let mut ingestor = ProjectIngestor::new(&self.root, Arc::clone(&self.pipeline))?;
        if let Some(limit) = self.concurrency {
            ingestor = ingestor.with_concurrency(limit);
        }
        let stats = ingestor.ingest_all().await?;

        let written = self.store.sync(&self.pipeline.corpus().snapshot()).await?;
        self.save_config()?;
        Ok((stats, written))
    }

    pub fn engine(&self) -> QueryEngine {
        QueryEngine::from_corpus(self.pipeline.corpus())
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(STORE_DIR_NAME).join(SETTINGS_FILE_NAME)
    }

    fn stored_config(&self) -> Result<Option<FrontendConfig>> {
        let path = self.settings_path();
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str(&raw) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                log::warn!("Ignoring unreadable {}: {err}", path.display());
                Ok(None)
            }
        }
    }

    fn save_config(&self) -> Result<()> {
        let path = self.settings_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self.pipeline.config())?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }
}
