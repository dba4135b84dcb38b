//! External field dictionary (ECS).
//!
//! Fields declared with `external: ecs` take their definition from the
//! Elastic Common Schema version named by the package's build manifest. The
//! dictionary is a directory of `ecs_flat.yml` files, one per git reference:
//! `<dir>/<reference>/ecs_flat.yml` or `<dir>/<reference>.yml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fleetsql_document::parse_file;
use fleetsql_shared::Result;
use tracing::{debug, warn};

/// Definition of a field in the external dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalField {
    pub kind: String,
    pub pattern: String,
    /// Values are expected to be arrays (`normalize: [array]`).
    pub array: bool,
    pub description: String,
}

/// Lookup of external field definitions by schema reference.
pub trait FieldDictionary: Send + Sync {
    /// Called off the async runtime before a package is written, so that
    /// implementations can do blocking I/O for `reference` up front.
    fn prepare(&self, _reference: &str) {}

    /// Whether lookups can resolve anything. When false, a miss says nothing
    /// about the field.
    fn enabled(&self) -> bool {
        true
    }

    fn lookup(&self, reference: &str, name: &str) -> Option<ExternalField>;
}

/// A dictionary that never resolves anything.
pub struct NoDictionary;

impl FieldDictionary for NoDictionary {
    fn enabled(&self) -> bool {
        false
    }

    fn lookup(&self, _reference: &str, _name: &str) -> Option<ExternalField> {
        None
    }
}

type FieldTable = HashMap<String, ExternalField>;

/// Dictionary backed by `ecs_flat.yml` files. Each reference is loaded once.
pub struct EcsDictionary {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Option<Arc<FieldTable>>>>,
}

impl EcsDictionary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self, reference: &str) -> Option<Arc<FieldTable>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = cache.get(reference) {
            return entry.clone();
        }

        let loaded = match self.find(reference) {
            None => {
                warn!(reference, dir = %self.dir.display(), "no ECS dictionary for reference");
                None
            }
            Some(path) => match load_table(&path) {
                Ok(table) => {
                    debug!(reference, count = table.len(), "loaded ECS dictionary");
                    Some(Arc::new(table))
                }
                Err(e) => {
                    warn!(reference, error = %e, "failed to load ECS dictionary");
                    None
                }
            },
        };
        cache.insert(reference.to_string(), loaded.clone());
        loaded
    }

    fn find(&self, reference: &str) -> Option<PathBuf> {
        // A reference must stay inside the dictionary directory.
        if reference.is_empty() || reference.contains("..") || Path::new(reference).is_absolute() {
            return None;
        }
        [
            self.dir.join(reference).join("ecs_flat.yml"),
            self.dir.join(format!("{reference}.yml")),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

impl FieldDictionary for EcsDictionary {
    fn prepare(&self, reference: &str) {
        self.table(reference);
    }

    fn lookup(&self, reference: &str, name: &str) -> Option<ExternalField> {
        self.table(reference)?.get(name).cloned()
    }
}

fn load_table(path: &Path) -> Result<FieldTable> {
    let doc = parse_file(path)?;
    let mut table = HashMap::new();
    for entry in doc.entries()? {
        let def = &entry.value;
        table.insert(
            entry.key.clone(),
            ExternalField {
                kind: def.get_string("type")?,
                pattern: def.get_string("pattern")?,
                array: def.get_strings("normalize")?.iter().any(|n| n == "array"),
                description: def.get_string("description")?,
            },
        );
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT: &str = r#"
host.ip:
  dashed_name: host-ip
  type: ip
  normalize:
    - array
  description: Host ip addresses.
event.kind:
  type: keyword
  pattern: "^[a-z]+$"
  description: Event kind.
"#;

    #[test]
    fn loads_nested_layout() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("v8.11.0")).unwrap();
        std::fs::write(tmp.path().join("v8.11.0/ecs_flat.yml"), FLAT).unwrap();

        let dict = EcsDictionary::new(tmp.path());
        let ip = dict.lookup("v8.11.0", "host.ip").unwrap();
        assert_eq!(ip.kind, "ip");
        assert!(ip.array);
        let kind = dict.lookup("v8.11.0", "event.kind").unwrap();
        assert_eq!(kind.pattern, "^[a-z]+$");
        assert!(!kind.array);
        assert!(dict.lookup("v8.11.0", "missing.field").is_none());
    }

    #[test]
    fn loads_flat_file_layout() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("v8.9.0.yml"), FLAT).unwrap();
        let dict = EcsDictionary::new(tmp.path());
        assert!(dict.lookup("v8.9.0", "host.ip").is_some());
    }

    #[test]
    fn unknown_or_unsafe_reference_is_unresolved() {
        let tmp = tempfile::tempdir().unwrap();
        let dict = EcsDictionary::new(tmp.path());
        assert!(dict.lookup("v1.0.0", "host.ip").is_none());
        assert!(dict.lookup("../etc", "host.ip").is_none());
        assert!(NoDictionary.lookup("v8.11.0", "host.ip").is_none());
        assert!(!NoDictionary.enabled());
        assert!(dict.enabled());
    }

    #[test]
    fn malformed_dictionary_is_unresolved() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.yml"), "- not\n- a mapping\n").unwrap();
        let dict = EcsDictionary::new(tmp.path());
        dict.prepare("bad");
        assert!(dict.lookup("bad", "host.ip").is_none());
    }
}
