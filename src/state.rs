//! Application state shared by every handler.
//!
//! This module owns:
//!   - the catalog handle (swapped wholesale on reload)
//!   - the generator registry (filled once at startup)
//!   - the progress store
//!   - the engine config

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::catalog::{Catalog, CatalogHandle};
use crate::config::{load_engine_config_from_env, EngineConfig};
use crate::generators::GeneratorRegistry;
use crate::loader::load_catalog;
use crate::store::ProgressStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogHandle,
    pub generators: Arc<GeneratorRegistry>,
    pub store: ProgressStore,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    /// Build state from env: load config, then the content directory it names.
    /// Unusable content leaves the engine running with an empty catalog.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_engine_config_from_env();
        let catalog = match load_catalog(&config.content_dir) {
            Ok(c) => c,
            Err(e) => {
                error!(target: "cours_engine", content_dir = %config.content_dir, error = %e, "Content not loaded; starting with an empty catalog");
                Catalog::new()
            }
        };
        Self::with_parts(config, catalog)
    }

    pub fn with_parts(config: EngineConfig, catalog: Catalog) -> Self {
        let generators = GeneratorRegistry::with_builtins();
        info!(
            target: "cours_engine",
            content_dir = %config.content_dir,
            templates = catalog.template_count(),
            steps = catalog.step_count(),
            generators = ?generators.kinds(),
            "Engine state ready"
        );
        Self {
            catalog: CatalogHandle::new(catalog),
            generators: Arc::new(generators),
            store: ProgressStore::new(),
            config: Arc::new(config),
        }
    }
}
