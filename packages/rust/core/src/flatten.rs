//! Ingest processor flattening.
//!
//! A pipeline is a list of processors, each of which may carry its own
//! `on_failure` list, recursively. Flattening produces one record per
//! processor with a locator of the form `<prefix>/<index>/<type>`. A
//! processor's handlers are flattened under `<prefix>/<index>/on_failure`
//! and come before the processor that owns them.

use fleetsql_document::Processor;
use fleetsql_shared::{FleetSqlError, Location, Result};
use serde_json::{Map, Value};

/// One processor with its position in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatProcessor {
    pub kind: String,
    /// Processor configuration; includes the immediate `on_failure` summary.
    pub attributes: Map<String, Value>,
    /// Pointer into the pipeline document, e.g. `/processors/0/on_failure/1/set`.
    pub locator: String,
    pub location: Location,
}

impl FlatProcessor {
    /// Attributes as compact JSON, or `None` when there are none.
    pub fn attributes_json(&self) -> Option<String> {
        if self.attributes.is_empty() {
            return None;
        }
        Some(Value::Object(self.attributes.clone()).to_string())
    }
}

/// Flatten `processors` under `prefix` (`/processors` or `/on_failure`).
///
/// Absent entries are skipped but still consume their index, so locators
/// always point at the original list position.
pub fn flatten_processors(processors: &[Option<Processor>], prefix: &str) -> Result<Vec<FlatProcessor>> {
    let mut out = Vec::new();
    flatten_into(processors, prefix, &mut out)?;
    Ok(out)
}

fn flatten_into(processors: &[Option<Processor>], prefix: &str, out: &mut Vec<FlatProcessor>) -> Result<()> {
    for (i, processor) in processors.iter().enumerate() {
        let Some(p) = processor else {
            continue;
        };
        let locator = format!("{prefix}/{i}/{}", p.kind);
        let mut attributes = attributes_of(p, &locator)?;

        if !p.on_failure.is_empty() {
            let branch = format!("{prefix}/{i}/on_failure");
            flatten_into(&p.on_failure, &branch, out)?;

            let mut summary = Vec::with_capacity(p.on_failure.len());
            for (j, handler) in p.on_failure.iter().enumerate() {
                let Some(h) = handler else {
                    continue;
                };
                let handler_locator = format!("{branch}/{j}/{}", h.kind);
                let mut entry = Map::with_capacity(1);
                entry.insert(h.kind.clone(), Value::Object(attributes_of(h, &handler_locator)?));
                summary.push(Value::Object(entry));
            }
            attributes.insert("on_failure".to_string(), Value::Array(summary));
        }

        out.push(FlatProcessor {
            kind: p.kind.clone(),
            attributes,
            locator,
            location: p.location.clone(),
        });
    }
    Ok(())
}

fn attributes_of(p: &Processor, locator: &str) -> Result<Map<String, Value>> {
    match p
        .attributes
        .to_json()
        .map_err(|e| FleetSqlError::flatten(locator, e.to_string()))?
    {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(FleetSqlError::flatten(
            locator,
            format!("attributes must be a mapping, found {other}"),
        )),
    }
}
