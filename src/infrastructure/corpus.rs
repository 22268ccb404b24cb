//! Corpus loading: item records from JSON files or directories.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::domain::ItemRecord;
use crate::infrastructure::traits::FileSystem;
use crate::infrastructure::{InfraError, InfraResult};

/// Accepted top-level shapes of a corpus file.
#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Items(Vec<ItemRecord>),
    Wrapped {
        #[serde(alias = "items")]
        spells: Vec<ItemRecord>,
    },
}

impl CorpusFile {
    fn into_items(self) -> Vec<ItemRecord> {
        match self {
            CorpusFile::Items(items) => items,
            CorpusFile::Wrapped { spells } => spells,
        }
    }
}

/// Reads item records through the filesystem abstraction.
pub struct CorpusLoader {
    fs: Arc<dyn FileSystem>,
}

impl CorpusLoader {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Load a corpus file, or every `*.json` below a directory in path order.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> InfraResult<Vec<ItemRecord>> {
        if self.fs.is_dir(path) {
            let files = self
                .fs
                .files_with_extension(path, "json")
                .map_err(|e| InfraError::io(format!("scan {}", path.display()), e))?;
            let mut items = Vec::new();
            for file in &files {
                items.extend(self.load_file(file)?);
            }
            info!(files = files.len(), items = items.len(), "loaded corpus directory");
            return Ok(items);
        }
        let items = self.load_file(path)?;
        info!(items = items.len(), "loaded corpus");
        Ok(items)
    }

    fn load_file(&self, path: &Path) -> InfraResult<Vec<ItemRecord>> {
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
        let items = parse_corpus(&content).map_err(|e| InfraError::parse(path, e.to_string()))?;
        debug!(path = %path.display(), items = items.len(), "parsed corpus file");
        Ok(items)
    }
}

/// Parse corpus JSON: an array of items or an object with `spells`/`items`.
pub fn parse_corpus(content: &str) -> Result<Vec<ItemRecord>, serde_json::Error> {
    serde_json::from_str::<CorpusFile>(content).map(CorpusFile::into_items)
}
