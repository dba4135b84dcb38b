//! Located YAML document tree.
//!
//! Package files are parsed with `yaml-rust2`'s event parser so that every
//! node keeps the position of its first token. JSON files go through the same
//! path since JSON is a subset of YAML.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use fleetsql_shared::{FleetSqlError, Location, Result};
use regex::Regex;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// 1-based position of a node's first token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mark {
    pub line: usize,
    pub column: usize,
}

impl Mark {
    fn precedes(self, other: Mark) -> bool {
        (self.line, self.column) < (other.line, other.column)
    }
}

impl From<Marker> for Mark {
    fn from(m: Marker) -> Self {
        // The scanner counts lines from 1 and columns from 0.
        Self {
            line: m.line(),
            column: m.col() + 1,
        }
    }
}

/// Resolved value of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Node>),
    Mapping(Vec<Entry>),
}

/// One key/value pair of a mapping, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub key_mark: Mark,
    pub value: Node,
}

/// A YAML node with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    value: Value,
    mark: Mark,
    /// Source text of a scalar, kept so that `version: 1.0` reads back as "1.0".
    raw: Option<String>,
    source: Arc<Path>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the file at `path`.
pub fn parse_file(path: &Path) -> Result<Node> {
    let text = std::fs::read_to_string(path).map_err(|e| FleetSqlError::io(path, e))?;
    parse_str(path, &text)
}

/// Parse `text`, attributing every node to `source`.
///
/// Only the first document of a multi-document stream is returned. An empty
/// document yields a null node at 1:1.
pub fn parse_str(source: impl Into<PathBuf>, text: &str) -> Result<Node> {
    let source: Arc<Path> = Arc::from(source.into().into_boxed_path());
    let mut builder = TreeBuilder {
        source: source.clone(),
        stack: Vec::new(),
        anchors: HashMap::new(),
        root: None,
    };

    let mut parser = Parser::new_from_str(text);
    parser.load(&mut builder, false).map_err(|e| {
        let mark = Mark::from(*e.marker());
        FleetSqlError::document(source.to_path_buf(), mark.line, mark.column, e.info())
    })?;

    Ok(builder.root.unwrap_or_else(|| Node {
        value: Value::Null,
        mark: Mark { line: 1, column: 1 },
        raw: None,
        source,
    }))
}

struct Frame {
    node: Node,
    anchor: usize,
    pending_key: Option<Node>,
}

struct TreeBuilder {
    source: Arc<Path>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, Node>,
    root: Option<Node>,
}

impl TreeBuilder {
    fn node(&self, value: Value, mark: Marker, raw: Option<String>) -> Node {
        Node {
            value,
            mark: mark.into(),
            raw,
            source: self.source.clone(),
        }
    }

    fn insert(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        let Some(frame) = self.stack.last_mut() else {
            if self.root.is_none() {
                self.root = Some(node);
            }
            return;
        };
        match &mut frame.node.value {
            Value::Sequence(items) => items.push(node),
            Value::Mapping(entries) => match frame.pending_key.take() {
                None => {
                    // Block mappings are reported at the first key's indicator;
                    // the first key itself is the mapping's first token.
                    if entries.is_empty() && node.mark.precedes(frame.node.mark) {
                        frame.node.mark = node.mark;
                    }
                    frame.pending_key = Some(node);
                }
                Some(key) => entries.push(Entry {
                    key: key.as_text().unwrap_or_default().to_string(),
                    key_mark: key.mark,
                    value: node,
                }),
            },
            _ => {}
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        match ev {
            Event::Scalar(text, style, anchor, ..) => {
                let value = if style == TScalarStyle::Plain {
                    resolve_plain(&text)
                } else {
                    Value::String(text.clone())
                };
                let node = self.node(value, mark, Some(text));
                self.insert(node, anchor);
            }
            Event::SequenceStart(anchor, ..) => {
                let node = self.node(Value::Sequence(Vec::new()), mark, None);
                self.stack.push(Frame {
                    node,
                    anchor,
                    pending_key: None,
                });
            }
            Event::MappingStart(anchor, ..) => {
                let node = self.node(Value::Mapping(Vec::new()), mark, None);
                self.stack.push(Frame {
                    node,
                    anchor,
                    pending_key: None,
                });
            }
            Event::SequenceEnd | Event::MappingEnd => {
                if let Some(mut frame) = self.stack.pop() {
                    if let Value::Mapping(entries) = &mut frame.node.value {
                        *entries = merge_keys(std::mem::take(entries));
                    }
                    self.insert(frame.node, frame.anchor);
                }
            }
            Event::Alias(id) => {
                let node = match self.anchors.get(&id) {
                    Some(anchored) => anchored.clone(),
                    None => self.node(Value::Null, mark, None),
                };
                self.insert(node, 0);
            }
            _ => {}
        }
    }
}

/// Expand `<<` merge keys. Keys declared in the mapping itself win over
/// merged ones; with a list of sources, earlier sources win.
fn merge_keys(entries: Vec<Entry>) -> Vec<Entry> {
    if !entries.iter().any(is_merge) {
        return entries;
    }

    let mut seen: HashSet<String> = entries
        .iter()
        .filter(|e| !is_merge(e))
        .map(|e| e.key.clone())
        .collect();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if !is_merge(&entry) {
            out.push(entry);
            continue;
        }
        let sources = match entry.value.value {
            Value::Mapping(merged) => vec![merged],
            Value::Sequence(items) => items
                .into_iter()
                .filter_map(|n| match n.value {
                    Value::Mapping(merged) => Some(merged),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        for merged in sources.into_iter().flatten() {
            if seen.insert(merged.key.clone()) {
                out.push(merged);
            }
        }
    }
    out
}

fn is_merge(e: &Entry) -> bool {
    e.key == "<<" && matches!(e.value.value, Value::Mapping(_) | Value::Sequence(_))
}

// ---------------------------------------------------------------------------
// Plain scalar resolution (YAML 1.2 core schema)
// ---------------------------------------------------------------------------

static INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+$").expect("int regex"));

static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?$").expect("float regex")
});

fn resolve_plain(text: &str) -> Value {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => Value::Null,
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => Value::Float(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Value::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Value::Float(f64::NAN),
        _ => {
            if INT_RE.is_match(text) {
                return text
                    .parse::<i64>()
                    .map(Value::Integer)
                    .unwrap_or_else(|_| Value::String(text.to_string()));
            }
            if let Some(hex) = text.strip_prefix("0x") {
                if let Ok(v) = i64::from_str_radix(hex, 16) {
                    return Value::Integer(v);
                }
            }
            if let Some(oct) = text.strip_prefix("0o") {
                if let Ok(v) = i64::from_str_radix(oct, 8) {
                    return Value::Integer(v);
                }
            }
            if FLOAT_RE.is_match(text) {
                if let Ok(v) = text.parse::<f64>() {
                    return Value::Float(v);
                }
            }
            Value::String(text.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Node {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// File this node was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn location(&self) -> Location {
        Location::new(
            self.source.display().to_string(),
            self.mark.line,
            self.mark.column,
        )
    }

    /// A document error located at this node.
    pub fn error(&self, msg: impl Into<String>) -> FleetSqlError {
        FleetSqlError::document(
            self.source.to_path_buf(),
            self.mark.line,
            self.mark.column,
            msg,
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    /// True for null, an empty string, an empty sequence, or an empty mapping.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(entries) => entries.is_empty(),
            _ => false,
        }
    }

    /// Text of a non-null scalar; `None` for null and collections.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            Value::Bool(_) | Value::Integer(_) | Value::Float(_) => self.raw.as_deref(),
            _ => None,
        }
    }

    /// Mapping entries. Null reads as an empty mapping.
    pub fn entries(&self) -> Result<&[Entry]> {
        match &self.value {
            Value::Mapping(entries) => Ok(entries),
            Value::Null => Ok(&[]),
            _ => Err(self.error("expected a mapping")),
        }
    }

    /// Sequence items. Null reads as an empty sequence.
    pub fn items(&self) -> Result<&[Node]> {
        match &self.value {
            Value::Sequence(items) => Ok(items),
            Value::Null => Ok(&[]),
            _ => Err(self.error("expected a sequence")),
        }
    }

    /// Look up `key` in a mapping. Null values read as absent.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.value {
            Value::Mapping(entries) => entries
                .iter()
                .find(|e| e.key == key)
                .map(|e| &e.value)
                .filter(|v| !v.is_null()),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(node) => node
                .as_text()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| node.error(format!("expected a string for `{key}`"))),
        }
    }

    /// Like [`Node::get_str`] but absent reads as an empty string.
    pub fn get_string(&self, key: &str) -> Result<String> {
        Ok(self.get_str(key)?.unwrap_or_default())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        match &node.value {
            Value::Bool(b) => Ok(Some(*b)),
            Value::String(s) if s == "true" => Ok(Some(true)),
            Value::String(s) if s == "false" => Ok(Some(false)),
            _ => Err(node.error(format!("expected a boolean for `{key}`"))),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        match &node.value {
            Value::Integer(i) => Ok(Some(*i)),
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| node.error(format!("expected an integer for `{key}`"))),
            _ => Err(node.error(format!("expected an integer for `{key}`"))),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        match &node.value {
            Value::Integer(i) => Ok(Some(*i as f64)),
            Value::Float(f) => Ok(Some(*f)),
            _ => Err(node.error(format!("expected a number for `{key}`"))),
        }
    }

    /// Sequence under `key`; absent reads as empty.
    pub fn get_seq(&self, key: &str) -> Result<&[Node]> {
        match self.get(key) {
            None => Ok(&[]),
            Some(node) => node
                .items()
                .map_err(|_| node.error(format!("expected a sequence for `{key}`"))),
        }
    }

    /// Mapping node under `key`, if present.
    pub fn get_map(&self, key: &str) -> Result<Option<&Node>> {
        match self.get(key) {
            None => Ok(None),
            Some(node) if matches!(node.value, Value::Mapping(_)) => Ok(Some(node)),
            Some(node) => Err(node.error(format!("expected a mapping for `{key}`"))),
        }
    }

    /// List of strings under `key`. A lone scalar reads as a one-element list.
    pub fn get_strings(&self, key: &str) -> Result<Vec<String>> {
        let Some(node) = self.get(key) else {
            return Ok(Vec::new());
        };
        if let Some(s) = node.as_text() {
            return Ok(vec![s.to_string()]);
        }
        node.items()?
            .iter()
            .map(|item| {
                item.as_text()
                    .map(str::to_string)
                    .ok_or_else(|| item.error(format!("expected a string in `{key}`")))
            })
            .collect()
    }

    /// Copy of a mapping with `key` removed. Null stays null.
    pub fn without_key(&self, key: &str) -> Result<Node> {
        let entries = match &self.value {
            Value::Null => return Ok(self.clone()),
            Value::Mapping(entries) => entries,
            _ => return Err(self.error("expected a mapping")),
        };
        Ok(Node {
            value: Value::Mapping(entries.iter().filter(|e| e.key != key).cloned().collect()),
            mark: self.mark,
            raw: None,
            source: self.source.clone(),
        })
    }

    /// Free-form sub-tree under `key`, cloned.
    pub fn get_node(&self, key: &str) -> Option<Node> {
        self.get(key).cloned()
    }

    /// Convert to the JSON interchange form.
    ///
    /// Fails on non-finite floats, which JSON cannot represent.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match &self.value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| {
                    FleetSqlError::Mapping(format!(
                        "{}: non-finite number {f} cannot be represented in JSON",
                        self.location()
                    ))
                })?,
            Value::String(s) => Json::String(s.clone()),
            Value::Sequence(items) => Json::Array(
                items
                    .iter()
                    .map(Node::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Mapping(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for entry in entries {
                    map.insert(entry.key.clone(), entry.value.to_json()?);
                }
                Json::Object(map)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Node {
        parse_str("test.yml", text).expect("parse")
    }

    #[test]
    fn scalars_resolve_by_core_schema() {
        let doc = parse(
            "a: 1\nb: 1.5\nc: true\nd: ~\ne: hello\nf: '1'\ng: 8.11.0\nh: .nan\n",
        );
        assert_eq!(doc.get("a").unwrap().value(), &Value::Integer(1));
        assert_eq!(doc.get("b").unwrap().value(), &Value::Float(1.5));
        assert_eq!(doc.get("c").unwrap().value(), &Value::Bool(true));
        assert!(doc.get("d").is_none());
        assert_eq!(doc.get("e").unwrap().value(), &Value::String("hello".into()));
        assert_eq!(doc.get("f").unwrap().value(), &Value::String("1".into()));
        assert_eq!(doc.get("g").unwrap().value(), &Value::String("8.11.0".into()));
        assert!(matches!(doc.get("h").unwrap().value(), Value::Float(f) if f.is_nan()));
    }

    #[test]
    fn numeric_scalars_keep_source_text() {
        let doc = parse("version: 1.0\n");
        assert_eq!(doc.get_str("version").unwrap().as_deref(), Some("1.0"));
    }

    #[test]
    fn nodes_carry_lines() {
        let doc = parse("name: nginx\nvars:\n  - name: hosts\n    type: text\n");
        let vars = doc.get_seq("vars").unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].mark().line, 3);
        assert_eq!(doc.get("name").unwrap().mark().line, 1);
        assert_eq!(vars[0].location().file, "test.yml");
    }

    #[test]
    fn block_mappings_start_at_first_key() {
        let doc = parse("processors:\n  - rename:\n      field: a\nvars:\n  - name: port\n");
        assert_eq!(doc.mark(), Mark { line: 1, column: 1 });
        let processor = &doc.get_seq("processors").unwrap()[0];
        assert_eq!(processor.mark(), Mark { line: 2, column: 5 });
        assert_eq!(processor.get("rename").unwrap().mark(), Mark { line: 3, column: 7 });
        let var = &doc.get_seq("vars").unwrap()[0];
        assert_eq!(var.mark(), Mark { line: 5, column: 5 });
    }

    #[test]
    fn flow_mappings_start_at_brace() {
        let doc = parse("set: {field: a}\n");
        assert_eq!(doc.get("set").unwrap().mark(), Mark { line: 1, column: 6 });
    }

    #[test]
    fn merge_keys_expand_with_local_precedence() {
        let doc = parse(
            "base: &b\n  field: a\n  ignore_missing: true\nremove: {<<: *b, tag: t, field: z}\n",
        );
        let json = doc.get("remove").unwrap().to_json().unwrap();
        assert_eq!(
            json,
            serde_json::json!({"field": "z", "ignore_missing": true, "tag": "t"})
        );
        assert!(!json.as_object().unwrap().contains_key("<<"));
    }

    #[test]
    fn merge_key_lists_prefer_earlier_sources() {
        let doc = parse("a: &a {x: 1}\nb: &b {x: 2, y: 2}\nc:\n  <<: [*a, *b]\n");
        let json = doc.get("c").unwrap().to_json().unwrap();
        assert_eq!(json, serde_json::json!({"x": 1, "y": 2}));
    }

    #[test]
    fn mapping_preserves_order() {
        let doc = parse("z: 1\na: 2\nm: 3\n");
        let keys: Vec<_> = doc.entries().unwrap().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn json_is_parsed_as_yaml() {
        let doc = parse(r#"{"description": "x", "processors": [{"set": {"field": "a", "value": 1}}]}"#);
        assert_eq!(doc.get_str("description").unwrap().as_deref(), Some("x"));
        assert_eq!(doc.get_seq("processors").unwrap().len(), 1);
    }

    #[test]
    fn aliases_resolve_to_anchor() {
        let doc = parse("base: &b\n  field: x\ncopy: *b\n");
        assert_eq!(doc.get("copy").unwrap().get_str("field").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn to_json_converts_tree() {
        let doc = parse("a: [1, two, {b: false}]\n");
        let json = doc.to_json().unwrap();
        assert_eq!(json, serde_json::json!({"a": [1, "two", {"b": false}]}));
    }

    #[test]
    fn to_json_rejects_non_finite() {
        let doc = parse("a: .inf\n");
        assert!(doc.to_json().is_err());
    }

    #[test]
    fn shape_errors_are_located() {
        let doc = parse("name: nginx\ncategories:\n  key: value\n");
        let err = doc.get_seq("categories").unwrap_err();
        assert!(err.to_string().starts_with("test.yml:3:"));
    }

    #[test]
    fn syntax_errors_are_located() {
        let err = parse_str("bad.yml", "a: [1, 2\n").unwrap_err();
        assert!(err.to_string().starts_with("bad.yml:"));
    }

    #[test]
    fn empty_document_is_null() {
        assert!(parse("").is_null());
    }

    #[test]
    fn strings_accepts_scalar_or_list() {
        let doc = parse("a: one\nb: [x, y]\n");
        assert_eq!(doc.get_strings("a").unwrap(), vec!["one"]);
        assert_eq!(doc.get_strings("b").unwrap(), vec!["x", "y"]);
        assert!(doc.get_strings("c").unwrap().is_empty());
    }
}
