//! Typed package model.
//!
//! Every struct decodes from a located [`Node`]. Text attributes read as an
//! empty string when absent, optional flags and numbers stay `None`, and
//! free-form values keep their [`Node`] so provenance survives until they are
//! serialized. Optional sub-documents are `Option<_>`; a sub-document that is
//! present but partial never gains defaults.

use std::path::PathBuf;

use fleetsql_shared::{FleetSqlError, Location, Result};

use crate::node::Node;

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// One package directory, fully read.
#[derive(Debug, Clone)]
pub struct Package {
    /// Package directory.
    pub dir: PathBuf,
    /// Directory base name; unique across the corpus.
    pub dir_name: String,
    pub manifest: Manifest,
    pub build: Option<BuildManifest>,
    pub changelog: Option<Changelog>,
    pub data_streams: Vec<DataStream>,
    pub transforms: Vec<Transform>,
}

/// `manifest.yml` at the package root.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub location: Location,
    pub name: String,
    pub title: String,
    pub version: String,
    pub description: String,
    pub kind: String,
    pub format_version: String,
    pub license: String,
    pub release: String,
    pub policy_templates_behavior: String,
    pub conditions_kibana_version: String,
    pub conditions_elastic_subscription: String,
    pub conditions_elastic_capabilities: Vec<String>,
    pub source_license: String,
    pub owner_github: String,
    pub owner_type: String,
    pub agent_privileges_root: Option<bool>,
    /// `None` when the manifest has no `elasticsearch` section.
    pub elasticsearch_privileges_cluster: Option<Vec<String>>,
    pub categories: Vec<String>,
    pub icons: Vec<Image>,
    pub screenshots: Vec<Image>,
    pub discovery_fields: Vec<String>,
    pub vars: Vec<Var>,
    pub policy_templates: Vec<PolicyTemplate>,
}

impl Manifest {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;

        let conditions = node.get_map("conditions")?;
        let elastic = match conditions {
            Some(c) => c.get_map("elastic")?,
            None => None,
        };
        let kibana = match conditions {
            Some(c) => c.get_map("kibana")?,
            None => None,
        };
        let agent_privileges_root = match node.get_map("agent")? {
            Some(agent) => match agent.get_map("privileges")? {
                Some(p) => p.get_bool("root")?,
                None => None,
            },
            None => None,
        };
        let elasticsearch_privileges_cluster = match node.get_map("elasticsearch")? {
            Some(es) => Some(match es.get_map("privileges")? {
                Some(p) => p.get_strings("cluster")?,
                None => Vec::new(),
            }),
            None => None,
        };
        let discovery_fields = match node.get_map("discovery")? {
            Some(d) => d
                .get_seq("fields")?
                .iter()
                .map(|f| f.get_string("name"))
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            location: node.location(),
            name: node.get_string("name")?,
            title: node.get_string("title")?,
            version: node.get_string("version")?,
            description: node.get_string("description")?,
            kind: node.get_string("type")?,
            format_version: node.get_string("format_version")?,
            license: node.get_string("license")?,
            release: node.get_string("release")?,
            policy_templates_behavior: node.get_string("policy_templates_behavior")?,
            conditions_kibana_version: opt_string(kibana, "version")?,
            conditions_elastic_subscription: opt_string(elastic, "subscription")?,
            conditions_elastic_capabilities: match elastic {
                Some(e) => e.get_strings("capabilities")?,
                None => Vec::new(),
            },
            source_license: opt_string(node.get_map("source")?, "license")?,
            owner_github: opt_string(node.get_map("owner")?, "github")?,
            owner_type: opt_string(node.get_map("owner")?, "type")?,
            agent_privileges_root,
            elasticsearch_privileges_cluster,
            categories: node.get_strings("categories")?,
            icons: decode_seq(node, "icons", Image::from_node)?,
            screenshots: decode_seq(node, "screenshots", Image::from_node)?,
            discovery_fields,
            vars: decode_seq(node, "vars", Var::from_node)?,
            policy_templates: decode_seq(node, "policy_templates", PolicyTemplate::from_node)?,
        })
    }
}

/// Icon or screenshot reference.
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub src: String,
    pub title: String,
    pub size: String,
    pub kind: String,
    pub dark_mode: Option<bool>,
    /// Header data of the referenced file; filled in by the reader.
    pub metadata: Option<ImageMetadata>,
}

/// Dimensions and file size of an image inside the package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u64,
    pub height: u64,
    pub byte_size: u64,
}

impl Image {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            src: node.get_string("src")?,
            title: node.get_string("title")?,
            size: node.get_string("size")?,
            kind: node.get_string("type")?,
            dark_mode: node.get_bool("dark_mode")?,
            metadata: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Var {
    pub location: Location,
    pub name: String,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub multi: Option<bool>,
    pub required: Option<bool>,
    pub secret: Option<bool>,
    pub show_user: Option<bool>,
    pub default: Option<Node>,
    pub hide_in_deployment_modes: Vec<String>,
    pub options: Vec<VarOption>,
}

#[derive(Debug, Clone, Default)]
pub struct VarOption {
    pub value: String,
    pub text: String,
}

impl Var {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        let options = node
            .get_seq("options")?
            .iter()
            .map(|o| {
                Ok(VarOption {
                    value: o.get_string("value")?,
                    text: o.get_string("text")?,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            location: node.location(),
            name: node.get_string("name")?,
            kind: node.get_string("type")?,
            title: node.get_string("title")?,
            description: node.get_string("description")?,
            multi: node.get_bool("multi")?,
            required: node.get_bool("required")?,
            secret: node.get_bool("secret")?,
            show_user: node.get_bool("show_user")?,
            default: node.get_node("default"),
            hide_in_deployment_modes: node.get_strings("hide_in_deployment_modes")?,
            options,
        })
    }
}

// ---------------------------------------------------------------------------
// Policy templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PolicyTemplate {
    pub location: Location,
    pub name: String,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub deployment_modes: Option<DeploymentModes>,
    pub categories: Vec<String>,
    /// Data stream names. Not validated against the package's data streams.
    pub data_streams: Vec<String>,
    pub icons: Vec<Image>,
    pub screenshots: Vec<Image>,
    pub vars: Vec<Var>,
    pub inputs: Vec<PolicyTemplateInput>,
}

impl PolicyTemplate {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            location: node.location(),
            name: node.get_string("name")?,
            title: node.get_string("title")?,
            description: node.get_string("description")?,
            kind: node.get_string("type")?,
            deployment_modes: node
                .get_map("deployment_modes")?
                .map(DeploymentModes::from_node)
                .transpose()?,
            categories: node.get_strings("categories")?,
            data_streams: node.get_strings("data_streams")?,
            icons: decode_seq(node, "icons", Image::from_node)?,
            screenshots: decode_seq(node, "screenshots", Image::from_node)?,
            vars: decode_seq(node, "vars", Var::from_node)?,
            inputs: decode_seq(node, "inputs", PolicyTemplateInput::from_node)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeploymentModes {
    pub default_enabled: Option<bool>,
    pub agentless: Option<Agentless>,
}

#[derive(Debug, Clone, Default)]
pub struct Agentless {
    pub enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub organization: String,
    pub division: String,
    pub team: String,
    pub resources_requests_memory: String,
    pub resources_requests_cpu: String,
}

impl DeploymentModes {
    fn from_node(node: &Node) -> Result<Self> {
        let default_enabled = match node.get_map("default")? {
            Some(d) => d.get_bool("enabled")?,
            None => None,
        };
        let agentless = match node.get_map("agentless")? {
            Some(a) => {
                let requests = match a.get_map("resources")? {
                    Some(r) => r.get_map("requests")?,
                    None => None,
                };
                Some(Agentless {
                    enabled: a.get_bool("enabled")?,
                    is_default: a.get_bool("is_default")?,
                    organization: a.get_string("organization")?,
                    division: a.get_string("division")?,
                    team: a.get_string("team")?,
                    resources_requests_memory: opt_string(requests, "memory")?,
                    resources_requests_cpu: opt_string(requests, "cpu")?,
                })
            }
            None => None,
        };
        Ok(Self {
            default_enabled,
            agentless,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyTemplateInput {
    pub location: Location,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub input_group: String,
    pub template_path: String,
    pub multi: Option<bool>,
    pub vars: Vec<Var>,
}

impl PolicyTemplateInput {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            location: node.location(),
            kind: node.get_string("type")?,
            title: node.get_string("title")?,
            description: node.get_string("description")?,
            input_group: node.get_string("input_group")?,
            template_path: node.get_string("template_path")?,
            multi: node.get_bool("multi")?,
            vars: decode_seq(node, "vars", Var::from_node)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Data streams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DataStream {
    /// Directory base name under `data_stream/`.
    pub name: String,
    pub manifest: DataStreamManifest,
    /// Fields files in file-name order.
    pub fields: Vec<FieldsFile>,
    /// Pipelines in file-name order.
    pub pipelines: Vec<Pipeline>,
    pub sample_event: Option<SampleEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct DataStreamManifest {
    pub location: Location,
    pub title: String,
    pub kind: String,
    pub dataset: String,
    pub dataset_is_prefix: Option<bool>,
    pub ilm_policy: String,
    pub release: String,
    pub elasticsearch: Option<DataStreamElasticsearch>,
    pub streams: Vec<Stream>,
}

impl DataStreamManifest {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            location: node.location(),
            title: node.get_string("title")?,
            kind: node.get_string("type")?,
            dataset: node.get_string("dataset")?,
            dataset_is_prefix: node.get_bool("dataset_is_prefix")?,
            ilm_policy: node.get_string("ilm_policy")?,
            release: node.get_string("release")?,
            elasticsearch: node
                .get_map("elasticsearch")?
                .map(DataStreamElasticsearch::from_node)
                .transpose()?,
            streams: decode_seq(node, "streams", Stream::from_node)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataStreamElasticsearch {
    pub index_mode: String,
    pub source_mode: String,
    pub dynamic_dataset: Option<bool>,
    pub dynamic_namespace: Option<bool>,
    pub privileges_properties: Option<Vec<String>>,
    pub index_template: Option<IndexTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexTemplate {
    pub settings: Option<Node>,
    pub mappings: Option<Node>,
    pub ingest_pipeline_name: String,
    pub data_stream_hidden: Option<bool>,
}

impl DataStreamElasticsearch {
    fn from_node(node: &Node) -> Result<Self> {
        let index_template = match node.get_map("index_template")? {
            Some(t) => Some(IndexTemplate {
                settings: t.get_node("settings"),
                mappings: t.get_node("mappings"),
                ingest_pipeline_name: opt_string(t.get_map("ingest_pipeline")?, "name")?,
                data_stream_hidden: match t.get_map("data_stream")? {
                    Some(ds) => ds.get_bool("hidden")?,
                    None => None,
                },
            }),
            None => None,
        };
        Ok(Self {
            index_mode: node.get_string("index_mode")?,
            source_mode: node.get_string("source_mode")?,
            dynamic_dataset: node.get_bool("dynamic_dataset")?,
            dynamic_namespace: node.get_bool("dynamic_namespace")?,
            privileges_properties: node
                .get_map("privileges")?
                .map(|p| p.get_strings("properties"))
                .transpose()?,
            index_template,
        })
    }
}

/// A stream (input) of a data stream.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub location: Location,
    pub input: String,
    pub title: String,
    pub description: String,
    pub template_path: String,
    pub enabled: Option<bool>,
    pub vars: Vec<Var>,
}

impl Stream {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            location: node.location(),
            input: node.get_string("input")?,
            title: node.get_string("title")?,
            description: node.get_string("description")?,
            template_path: node.get_string("template_path")?,
            enabled: node.get_bool("enabled")?,
            vars: decode_seq(node, "vars", Var::from_node)?,
        })
    }
}

/// `sample_event.json`.
#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub location: Location,
    pub event: Node,
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// One fields file with its top-level definitions.
#[derive(Debug, Clone, Default)]
pub struct FieldsFile {
    /// File base name, e.g. `ecs.yml`.
    pub file_name: String,
    pub fields: Vec<Field>,
}

impl FieldsFile {
    pub fn from_node(file_name: impl Into<String>, node: &Node) -> Result<Self> {
        let fields = node
            .items()?
            .iter()
            .enumerate()
            .map(|(i, n)| Field::from_node(n, format!("/{i}")))
            .collect::<Result<_>>()?;
        Ok(Self {
            file_name: file_name.into(),
            fields,
        })
    }
}

/// A field definition. Nested definitions live in `fields` until flattened.
#[derive(Debug, Clone, Default)]
pub struct Field {
    pub location: Location,
    pub name: String,
    pub kind: String,
    pub description: String,
    pub value: Option<Node>,
    pub example: Option<Node>,
    pub pattern: String,
    pub date_format: String,
    pub analyzer: String,
    pub search_analyzer: String,
    pub ignore_above: Option<i64>,
    pub multi_fields: Option<Node>,
    pub enabled: Option<bool>,
    /// `true`, `false`, `strict` or `runtime`, kept as text.
    pub dynamic: String,
    pub index: Option<bool>,
    pub doc_values: Option<bool>,
    pub copy_to: String,
    pub scaling_factor: Option<i64>,
    pub alias_target_path: String,
    pub normalize: Vec<String>,
    pub normalizer: String,
    pub null_value: Option<Node>,
    pub dimension: Option<bool>,
    pub metric_type: String,
    pub external: String,
    /// Pointer into the declaring file, e.g. `/0/fields/2`.
    pub yaml_path: String,
    /// Base name of the declaring fields file. Set when flattened.
    pub file_name: String,
    pub fields: Vec<Field>,
}

impl Field {
    pub fn from_node(node: &Node, yaml_path: String) -> Result<Self> {
        node.entries()?;
        let fields = node
            .get_seq("fields")?
            .iter()
            .enumerate()
            .map(|(i, n)| Field::from_node(n, format!("{yaml_path}/fields/{i}")))
            .collect::<Result<_>>()?;

        Ok(Self {
            location: node.location(),
            name: node.get_string("name")?,
            kind: node.get_string("type")?,
            description: node.get_string("description")?,
            value: node.get_node("value"),
            example: node.get_node("example"),
            pattern: node.get_string("pattern")?,
            date_format: node.get_string("date_format")?,
            analyzer: node.get_string("analyzer")?,
            search_analyzer: node.get_string("search_analyzer")?,
            ignore_above: node.get_i64("ignore_above")?,
            multi_fields: node.get_node("multi_fields"),
            enabled: node.get_bool("enabled")?,
            dynamic: node.get_string("dynamic")?,
            index: node.get_bool("index")?,
            doc_values: node.get_bool("doc_values")?,
            copy_to: node.get_string("copy_to")?,
            scaling_factor: node.get_i64("scaling_factor")?,
            alias_target_path: node.get_string("path")?,
            normalize: node.get_strings("normalize")?,
            normalizer: node.get_string("normalizer")?,
            null_value: node.get_node("null_value"),
            dimension: node.get_bool("dimension")?,
            metric_type: node.get_string("metric_type")?,
            external: node.get_string("external")?,
            yaml_path,
            file_name: String::new(),
            fields,
        })
    }
}

// ---------------------------------------------------------------------------
// Ingest pipelines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub location: Location,
    /// File base name including extension, e.g. `default.yml`.
    pub name: String,
    pub description: String,
    pub version: Option<i64>,
    pub meta: Option<Node>,
    pub processors: Vec<Option<Processor>>,
    /// Pipeline-global failure branch.
    pub on_failure: Vec<Option<Processor>>,
}

impl Pipeline {
    pub fn from_node(name: impl Into<String>, node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            location: node.location(),
            name: name.into(),
            description: node.get_string("description")?,
            version: node.get_i64("version")?,
            meta: node.get_node("_meta"),
            processors: decode_processors(node, "processors")?,
            on_failure: decode_processors(node, "on_failure")?,
        })
    }
}

/// A processor entry `{type: attributes}` with its failure branch lifted out.
#[derive(Debug, Clone)]
pub struct Processor {
    pub location: Location,
    pub kind: String,
    /// Attribute map without `on_failure`. May be null.
    pub attributes: Node,
    pub on_failure: Vec<Option<Processor>>,
}

impl Processor {
    /// Decode one list entry; a null entry is an absent processor.
    pub fn from_node(node: &Node) -> Result<Option<Self>> {
        if node.is_null() {
            return Ok(None);
        }
        let entries = node
            .entries()
            .map_err(|_| node.error("processor must be a single-key mapping"))?;
        let [entry] = entries else {
            return Err(node.error(format!(
                "processor must have exactly one key, found {}",
                entries.len()
            )));
        };

        let on_failure = decode_processors(&entry.value, "on_failure")?;
        let attributes = entry.value.without_key("on_failure")?;

        Ok(Some(Self {
            location: node.location(),
            kind: entry.key.clone(),
            attributes,
            on_failure,
        }))
    }
}

fn decode_processors(node: &Node, key: &str) -> Result<Vec<Option<Processor>>> {
    node.get_seq(key)?.iter().map(Processor::from_node).collect()
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Transform {
    /// Directory base name under `elasticsearch/transform/`.
    pub name: String,
    /// Location of `transform.yml`.
    pub location: Location,
    pub definition: Option<TransformDefinition>,
    pub manifest: Option<TransformManifest>,
    pub fields: Vec<FieldsFile>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformDefinition {
    pub source: Option<TransformSource>,
    pub dest: Option<TransformDest>,
    pub pivot: Option<TransformPivot>,
    pub latest: Option<TransformLatest>,
    pub description: String,
    pub frequency: String,
    pub settings: Option<TransformSettings>,
    pub meta: Option<Node>,
    pub retention_policy: Option<TimeRetention>,
    pub sync: Option<TimeSync>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformSource {
    /// String or list of strings.
    pub index: Option<Node>,
    pub query: Option<Node>,
    pub runtime_mappings: Option<Node>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformDest {
    pub index: String,
    pub pipeline: String,
    pub aliases: Vec<DestAlias>,
}

#[derive(Debug, Clone, Default)]
pub struct DestAlias {
    pub alias: String,
    pub move_on_creation: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformPivot {
    pub group_by: Option<Node>,
    pub aggregations: Option<Node>,
    pub aggs: Option<Node>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformLatest {
    pub sort: String,
    pub unique_key: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformSettings {
    pub dates_as_epoch_millis: Option<bool>,
    pub docs_per_second: Option<f64>,
    pub align_checkpoints: Option<bool>,
    pub max_page_search_size: Option<i64>,
    pub use_point_in_time: Option<bool>,
    pub deduce_mappings: Option<bool>,
    pub unattended: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct TimeRetention {
    pub field: String,
    pub max_age: String,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSync {
    pub field: String,
    pub delay: String,
}

impl TransformDefinition {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;

        let source = node
            .get_map("source")?
            .map(|s| {
                Ok::<_, FleetSqlError>(TransformSource {
                    index: s.get_node("index"),
                    query: s.get_node("query"),
                    runtime_mappings: s.get_node("runtime_mappings"),
                })
            })
            .transpose()?;

        let dest = node
            .get_map("dest")?
            .map(|d| {
                Ok::<_, FleetSqlError>(TransformDest {
                    index: d.get_string("index")?,
                    pipeline: d.get_string("pipeline")?,
                    aliases: decode_seq(d, "aliases", |a| {
                        Ok(DestAlias {
                            alias: a.get_string("alias")?,
                            move_on_creation: a.get_bool("move_on_creation")?,
                        })
                    })?,
                })
            })
            .transpose()?;

        let pivot = node.get_map("pivot")?.map(|p| TransformPivot {
            group_by: p.get_node("group_by"),
            aggregations: p.get_node("aggregations"),
            aggs: p.get_node("aggs"),
        });

        let latest = node
            .get_map("latest")?
            .map(|l| {
                Ok::<_, FleetSqlError>(TransformLatest {
                    sort: l.get_string("sort")?,
                    unique_key: l.get_strings("unique_key")?,
                })
            })
            .transpose()?;

        let settings = node
            .get_map("settings")?
            .map(|s| {
                Ok::<_, FleetSqlError>(TransformSettings {
                    dates_as_epoch_millis: s.get_bool("dates_as_epoch_millis")?,
                    docs_per_second: s.get_f64("docs_per_second")?,
                    align_checkpoints: s.get_bool("align_checkpoints")?,
                    max_page_search_size: s.get_i64("max_page_search_size")?,
                    use_point_in_time: s.get_bool("use_point_in_time")?,
                    deduce_mappings: s.get_bool("deduce_mappings")?,
                    unattended: s.get_bool("unattended")?,
                })
            })
            .transpose()?;

        let retention_policy = match node.get_map("retention_policy")? {
            Some(r) => r
                .get_map("time")?
                .map(|t| {
                    Ok::<_, FleetSqlError>(TimeRetention {
                        field: t.get_string("field")?,
                        max_age: t.get_string("max_age")?,
                    })
                })
                .transpose()?,
            None => None,
        };

        let sync = match node.get_map("sync")? {
            Some(s) => s
                .get_map("time")?
                .map(|t| {
                    Ok::<_, FleetSqlError>(TimeSync {
                        field: t.get_string("field")?,
                        delay: t.get_string("delay")?,
                    })
                })
                .transpose()?,
            None => None,
        };

        Ok(Self {
            source,
            dest,
            pivot,
            latest,
            description: node.get_string("description")?,
            frequency: node.get_string("frequency")?,
            settings,
            meta: node.get_node("_meta"),
            retention_policy,
            sync,
        })
    }
}

/// Transform `manifest.yml`.
#[derive(Debug, Clone, Default)]
pub struct TransformManifest {
    pub start: Option<bool>,
    pub destination_index_template: Option<DestinationIndexTemplate>,
}

#[derive(Debug, Clone, Default)]
pub struct DestinationIndexTemplate {
    pub mappings: Option<Node>,
    pub settings: Option<Node>,
}

impl TransformManifest {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        Ok(Self {
            start: node.get_bool("start")?,
            destination_index_template: node.get_map("destination_index_template")?.map(|t| {
                DestinationIndexTemplate {
                    mappings: t.get_node("mappings"),
                    settings: t.get_node("settings"),
                }
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Changelog & build manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Changelog {
    pub location: Location,
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Default)]
pub struct Release {
    pub location: Location,
    pub version: String,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default)]
pub struct Change {
    pub location: Location,
    pub description: String,
    pub kind: String,
    pub link: String,
}

impl Changelog {
    pub fn from_node(node: &Node) -> Result<Self> {
        let releases = node
            .items()?
            .iter()
            .map(|r| {
                r.entries()?;
                Ok(Release {
                    location: r.location(),
                    version: r.get_string("version")?,
                    changes: decode_seq(r, "changes", |c| {
                        c.entries()?;
                        Ok(Change {
                            location: c.location(),
                            description: c.get_string("description")?,
                            kind: c.get_string("type")?,
                            link: c.get_string("link")?,
                        })
                    })?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            location: node.location(),
            releases,
        })
    }
}

/// `_dev/build/build.yml`.
#[derive(Debug, Clone, Default)]
pub struct BuildManifest {
    pub location: Location,
    pub ecs_reference: String,
    pub ecs_import_mappings: Option<bool>,
}

impl BuildManifest {
    pub fn from_node(node: &Node) -> Result<Self> {
        node.entries()?;
        let ecs = match node.get_map("dependencies")? {
            Some(d) => d.get_map("ecs")?,
            None => None,
        };
        Ok(Self {
            location: node.location(),
            ecs_reference: opt_string(ecs, "reference")?,
            ecs_import_mappings: match ecs {
                Some(e) => e.get_bool("import_mappings")?,
                None => None,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode_seq<T>(node: &Node, key: &str, f: impl Fn(&Node) -> Result<T>) -> Result<Vec<T>> {
    node.get_seq(key)?.iter().map(f).collect()
}

fn opt_string(node: Option<&Node>, key: &str) -> Result<String> {
    match node {
        Some(n) => n.get_string(key),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_str;

    #[test]
    fn manifest_decodes_nested_sections() {
        let doc = parse_str(
            "pkg/manifest.yml",
            r#"
format_version: 3.0.0
name: nginx
title: Nginx
version: 1.2.0
type: integration
conditions:
  kibana:
    version: "^8.13.0"
  elastic:
    subscription: basic
owner:
  github: elastic/obs
  type: elastic
agent:
  privileges:
    root: true
categories: [web, observability]
vars:
  - name: hosts
    type: text
    multi: true
    default: []
policy_templates:
  - name: nginx
    title: Nginx logs
    data_streams: [access]
    deployment_modes:
      agentless:
        enabled: false
        resources:
          requests:
            cpu: "1"
    inputs:
      - type: logfile
        title: Collect logs
"#,
        )
        .unwrap();

        let m = Manifest::from_node(&doc).unwrap();
        assert_eq!(m.name, "nginx");
        assert_eq!(m.format_version, "3.0.0");
        assert_eq!(m.conditions_kibana_version, "^8.13.0");
        assert_eq!(m.conditions_elastic_subscription, "basic");
        assert_eq!(m.owner_github, "elastic/obs");
        assert_eq!(m.agent_privileges_root, Some(true));
        assert!(m.elasticsearch_privileges_cluster.is_none());
        assert_eq!(m.categories, vec!["web", "observability"]);
        assert_eq!(m.vars.len(), 1);
        assert_eq!(m.vars[0].location.line, 20);
        assert!(m.vars[0].default.as_ref().unwrap().is_empty());

        let pt = &m.policy_templates[0];
        let modes = pt.deployment_modes.as_ref().unwrap();
        assert!(modes.default_enabled.is_none());
        let agentless = modes.agentless.as_ref().unwrap();
        assert_eq!(agentless.enabled, Some(false));
        assert_eq!(agentless.resources_requests_cpu, "1");
        assert_eq!(agentless.resources_requests_memory, "");
        assert_eq!(pt.inputs[0].kind, "logfile");
    }

    #[test]
    fn processor_lifts_on_failure() {
        let doc = parse_str(
            "p.yml",
            r#"
- rename:
    field: a
    target_field: b
    on_failure:
      - set:
          field: error.message
          value: failed
"#,
        )
        .unwrap();
        let p = Processor::from_node(&doc.items().unwrap()[0]).unwrap().unwrap();
        assert_eq!(p.kind, "rename");
        assert!(p.attributes.get("on_failure").is_none());
        assert_eq!(p.attributes.get_str("field").unwrap().as_deref(), Some("a"));
        assert_eq!(p.on_failure.len(), 1);
        assert_eq!(p.on_failure[0].as_ref().unwrap().kind, "set");
    }

    #[test]
    fn null_processor_is_absent() {
        let doc = parse_str("p.yml", "- ~\n- set: {field: a}\n").unwrap();
        let items = doc.items().unwrap();
        assert!(Processor::from_node(&items[0]).unwrap().is_none());
        assert!(Processor::from_node(&items[1]).unwrap().is_some());
    }

    #[test]
    fn processor_with_two_keys_is_rejected() {
        let doc = parse_str("p.yml", "- set: {field: a}\n  rename: {field: b}\n").unwrap();
        let err = Processor::from_node(&doc.items().unwrap()[0]).unwrap_err();
        assert!(err.to_string().contains("exactly one key"));
        assert!(err.to_string().starts_with("p.yml:1:"));
    }

    #[test]
    fn transform_keeps_union_index() {
        let doc = parse_str(
            "transform.yml",
            r#"
source:
  index: ["logs-*", "metrics-*"]
dest:
  index: out
  aliases:
    - alias: latest
      move_on_creation: true
settings:
  docs_per_second: 0
retention_policy:
  time:
    field: "@timestamp"
    max_age: 7d
"#,
        )
        .unwrap();
        let t = TransformDefinition::from_node(&doc).unwrap();
        let source = t.source.unwrap();
        assert_eq!(source.index.unwrap().items().unwrap().len(), 2);
        assert!(source.query.is_none());
        assert_eq!(t.dest.as_ref().unwrap().aliases[0].move_on_creation, Some(true));
        assert_eq!(t.settings.unwrap().docs_per_second, Some(0.0));
        assert_eq!(t.retention_policy.unwrap().max_age, "7d");
        assert!(t.sync.is_none());
        assert!(t.pivot.is_none());
    }

    #[test]
    fn field_paths_follow_nesting() {
        let doc = parse_str(
            "fields.yml",
            "- name: nginx\n  type: group\n  fields:\n    - name: access\n      type: group\n      fields:\n        - name: code\n          type: long\n",
        )
        .unwrap();
        let file = FieldsFile::from_node("fields.yml", &doc).unwrap();
        let code = &file.fields[0].fields[0].fields[0];
        assert_eq!(code.name, "code");
        assert_eq!(code.yaml_path, "/0/fields/0/fields/0");
        assert_eq!(code.location.line, 7);
    }

    #[test]
    fn changelog_releases_are_located() {
        let doc = parse_str(
            "changelog.yml",
            "- version: \"1.1.0\"\n  changes:\n    - description: Fix\n      type: bugfix\n      link: https://example.com/1\n- version: \"1.0.0\"\n  changes: []\n",
        )
        .unwrap();
        let c = Changelog::from_node(&doc).unwrap();
        assert_eq!(c.releases.len(), 2);
        assert_eq!(c.releases[0].changes[0].kind, "bugfix");
        assert_eq!(c.releases[1].location.line, 6);
    }
}
