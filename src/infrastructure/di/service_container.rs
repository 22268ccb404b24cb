//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::{ScoreService, TreeBuildService};
use crate::config::Settings;
use crate::infrastructure::corpus::CorpusLoader;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    pub corpus: CorpusLoader,
    pub build_service: TreeBuildService,
    pub score_service: ScoreService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        let corpus = CorpusLoader::new(Arc::clone(&fs));
        let build_service = TreeBuildService::new(Arc::clone(&settings));

        Self {
            settings,
            fs,
            corpus,
            build_service,
            score_service: ScoreService::new(),
        }
    }
}
