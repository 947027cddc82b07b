//! Label lookup by name, and a per-run cache of assembled labels.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use st7_model::{Label, VectorFile};
use tracing::debug;

use crate::error::{Result, SeqError};
use crate::label::assemble;
use crate::program::Cost;

/// Where labels come from: a name lookup plus a reader for vector files.
pub trait LabelSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every file that may hold the label.
    fn candidates(&self, name: &str) -> Vec<PathBuf>;

    /// Read the sequencer records of one vector file.
    fn read(&self, path: &Path) -> std::result::Result<VectorFile, Self::Error>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Labels already looked up and assembled, by name.
#[derive(Debug, Clone)]
pub struct LabelCache {
    labels: HashMap<String, Arc<Label>>,
    hits: usize,
    misses: usize,
}

impl LabelCache {
    pub fn new() -> Self {
        Self {
            labels: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up, read and assemble a label, once per name.
    pub fn label<S: LabelSource>(&mut self, source: &S, name: &str) -> Result<Arc<Label>> {
        if let Some(hit) = self.labels.get(name) {
            self.hits += 1;
            return Ok(Arc::clone(hit));
        }
        self.misses += 1;
        let path = match source.candidates(name).as_slice() {
            [] => {
                return Err(SeqError::MissingLabel {
                    label: name.to_string(),
                })
            }
            [one] => one.clone(),
            many => {
                return Err(SeqError::AmbiguousLabel {
                    label: name.to_string(),
                    candidates: many.to_vec(),
                })
            }
        };
        debug!(label = name, path = %path.display(), "loading label");
        let file = source.read(&path).map_err(|e| SeqError::Source {
            label: name.to_string(),
            source: Box::new(e),
        })?;
        let label = Arc::new(assemble(&file)?);
        self.labels.insert(name.to_string(), Arc::clone(&label));
        Ok(label)
    }

    /// Cost of a MAIN label; bursts cannot be called.
    pub fn main_label_cost<S: LabelSource>(&mut self, source: &S, name: &str) -> Result<Cost> {
        match &*self.label(source, name)? {
            Label::Main(main) => Ok(Cost::from(&main.program)),
            Label::Mpb(_) => Err(SeqError::NotMainLabel {
                label: name.to_string(),
            }),
        }
    }

    /// Return cache usage statistics.
    pub fn statistics(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.labels.len(),
        }
    }
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use st7_parse::{parse_vector_str, ParseError};

    use super::*;

    const FUNC: &str = r#"hp93000,vector,0.1
DMAS SQPG,SM,2,(@)
DMAS PARA,SM,2,(@)
SQLB "func",MAIN,0,1,"wt",(@)
SQPG 0,GENV,12,,,(@)
SQPG 1,STOP,,,,(@)
"#;

    const BURST: &str = r#"hp93000,vector,0.1
DMAS SQPG,SM,2,(pA)
SQLB "burst",MPBU,0,1,"grp",(pA)
SQPG 0,CALL,,"func",,(pA)
SQPG 1,BEND,,,,(pA)
"#;

    struct Memory {
        files: HashMap<PathBuf, &'static str>,
        reads: Cell<usize>,
    }

    impl Memory {
        fn new() -> Self {
            let files = [("v/func.binl", FUNC), ("v/burst.burst", BURST), ("w/func.binl", FUNC)]
                .into_iter()
                .map(|(p, t)| (PathBuf::from(p), t))
                .collect();
            Self {
                files,
                reads: Cell::new(0),
            }
        }
    }

    impl LabelSource for Memory {
        type Error = ParseError;

        fn candidates(&self, name: &str) -> Vec<PathBuf> {
            let mut found: Vec<PathBuf> = self
                .files
                .keys()
                .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(name))
                .cloned()
                .collect();
            found.sort();
            found
        }

        fn read(&self, path: &Path) -> std::result::Result<VectorFile, ParseError> {
            self.reads.set(self.reads.get() + 1);
            let text = self.files.get(path).copied().unwrap_or("");
            parse_vector_str(text, &path.display().to_string())
        }
    }

    #[test]
    fn loads_each_label_once() {
        let mut source = Memory::new();
        source.files.remove(Path::new("w/func.binl"));
        let mut cache = LabelCache::new();
        let first = cache.label(&source, "func").unwrap();
        let second = cache.label(&source, "func").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.get(), 1);
        assert_eq!(
            cache.statistics(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn several_candidates_are_ambiguous() {
        let mut cache = LabelCache::new();
        let err = cache.label(&Memory::new(), "func").unwrap_err();
        match &err {
            SeqError::AmbiguousLabel { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_recoverable());
        assert_eq!(cache.statistics().entries, 0);
    }

    #[test]
    fn unknown_label_is_missing() {
        let err = LabelCache::new().label(&Memory::new(), "nope").unwrap_err();
        assert_eq!(err.to_string(), "label 'nope' not found");
    }

    #[test]
    fn read_failure_wraps_source_error() {
        let mut source = Memory::new();
        source.files.insert(PathBuf::from("v/broken.binl"), "not a vector file");
        let err = LabelCache::new().label(&source, "broken").unwrap_err();
        assert!(matches!(err, SeqError::Source { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn only_main_labels_have_a_call_cost() {
        let mut source = Memory::new();
        source.files.remove(Path::new("w/func.binl"));
        let mut cache = LabelCache::new();
        let cost = cache.main_label_cost(&source, "func").unwrap();
        assert_eq!((cost.vectors, cost.cycles), (12, 12));
        let err = cache.main_label_cost(&source, "burst").unwrap_err();
        assert!(matches!(err, SeqError::NotMainLabel { .. }));
    }
}
