//! Relational projection of package entities.
//!
//! Rules applied to every column:
//! - empty text and absent values are NULL
//! - present scalars are stored as-is, including `0` and `false`
//! - composite values are compact JSON; null, `[]`, `{}` and `""` are NULL
//!
//! Functions for owned entities take the parent's generated key first.

use fleetsql_document::{
    Change, DataStream, Field, Image, Node, Package, Pipeline, PolicyTemplate, PolicyTemplateInput,
    Release, Stream, Transform, Var,
};
use fleetsql_shared::{Location, Result};
use fleetsql_storage::rows::{
    ChangelogChangeRow, ChangelogReleaseRow, DataStreamRow, FieldRow, IngestPipelineRow,
    IngestProcessorRow, PackageIconRow, PackageRow, PackageScreenshotRow, PolicyTemplateIconRow,
    PolicyTemplateInputRow, PolicyTemplateRow, PolicyTemplateScreenshotRow, StreamRow,
    TransformRow, VarRow,
};

use crate::ecs::ExternalField;
use crate::flatten::FlatProcessor;

// ---------------------------------------------------------------------------
// Value rules
// ---------------------------------------------------------------------------

/// Empty text is NULL.
pub fn text(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Compact JSON of a free-form value; empty values are NULL.
pub fn json_node(node: Option<&Node>) -> Result<Option<String>> {
    match node {
        Some(n) if !n.is_empty() => Ok(Some(n.to_json()?.to_string())),
        _ => Ok(None),
    }
}

/// JSON list of strings; an empty list is NULL.
pub fn json_strings(values: &[String]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    serde_json::to_string(values).ok()
}

fn position(loc: &Location) -> (String, i64, i64) {
    (loc.file.clone(), loc.line as i64, loc.column as i64)
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

pub fn package_row(pkg: &Package) -> PackageRow {
    let m = &pkg.manifest;
    PackageRow {
        name: text(&m.name),
        dir_name: pkg.dir_name.clone(),
        title: text(&m.title),
        version: text(&m.version),
        description: text(&m.description),
        r#type: text(&m.kind),
        format_version: text(&m.format_version),
        license: text(&m.license),
        release: text(&m.release),
        policy_templates_behavior: text(&m.policy_templates_behavior),
        conditions_kibana_version: text(&m.conditions_kibana_version),
        conditions_elastic_subscription: text(&m.conditions_elastic_subscription),
        source_license: text(&m.source_license),
        owner_github: text(&m.owner_github),
        owner_type: text(&m.owner_type),
        agent_privileges_root: m.agent_privileges_root,
        elasticsearch_privileges_cluster: m
            .elasticsearch_privileges_cluster
            .as_deref()
            .and_then(json_strings),
        file_path: m.location.file.clone(),
    }
}

/// Width, height and byte size of an image; zero or unknown is NULL.
fn image_metadata(image: &Image) -> (Option<i64>, Option<i64>, Option<i64>) {
    let nonzero = |v: u64| (v > 0).then(|| v as i64);
    match image.metadata {
        Some(m) => (nonzero(m.width), nonzero(m.height), nonzero(m.byte_size)),
        None => (None, None, None),
    }
}

pub fn icon_row(package_id: i64, image: &Image) -> PackageIconRow {
    let (width, height, byte_size) = image_metadata(image);
    PackageIconRow {
        package_id,
        src: text(&image.src),
        title: text(&image.title),
        size: text(&image.size),
        r#type: text(&image.kind),
        dark_mode: image.dark_mode,
        width,
        height,
        byte_size,
    }
}

pub fn screenshot_row(package_id: i64, image: &Image) -> PackageScreenshotRow {
    let (width, height, byte_size) = image_metadata(image);
    PackageScreenshotRow {
        package_id,
        src: text(&image.src),
        title: text(&image.title),
        size: text(&image.size),
        r#type: text(&image.kind),
        width,
        height,
        byte_size,
    }
}

pub fn policy_template_icon_row(policy_template_id: i64, image: &Image) -> PolicyTemplateIconRow {
    let (width, height, byte_size) = image_metadata(image);
    PolicyTemplateIconRow {
        policy_template_id,
        src: text(&image.src),
        title: text(&image.title),
        size: text(&image.size),
        r#type: text(&image.kind),
        dark_mode: image.dark_mode,
        width,
        height,
        byte_size,
    }
}

pub fn policy_template_screenshot_row(
    policy_template_id: i64,
    image: &Image,
) -> PolicyTemplateScreenshotRow {
    let (width, height, byte_size) = image_metadata(image);
    PolicyTemplateScreenshotRow {
        policy_template_id,
        src: text(&image.src),
        title: text(&image.title),
        size: text(&image.size),
        r#type: text(&image.kind),
        width,
        height,
        byte_size,
    }
}

// ---------------------------------------------------------------------------
// Variables & policy templates
// ---------------------------------------------------------------------------

pub fn var_row(var: &Var) -> Result<VarRow> {
    let (file_path, line_number, col) = position(&var.location);
    Ok(VarRow {
        name: var.name.clone(),
        r#type: text(&var.kind),
        title: text(&var.title),
        description: text(&var.description),
        multi: var.multi,
        required: var.required,
        secret: var.secret,
        show_user: var.show_user,
        default_value: json_node(var.default.as_ref())?,
        hide_in_deployment_modes: json_strings(&var.hide_in_deployment_modes),
        file_path,
        line_number,
        col,
    })
}

pub fn policy_template_row(package_id: i64, pt: &PolicyTemplate) -> PolicyTemplateRow {
    let (file_path, line_number, col) = position(&pt.location);
    let mut row = PolicyTemplateRow {
        package_id,
        name: text(&pt.name),
        title: text(&pt.title),
        description: text(&pt.description),
        r#type: text(&pt.kind),
        file_path,
        line_number,
        col,
        ..Default::default()
    };
    if let Some(modes) = &pt.deployment_modes {
        row.deployment_modes_default_enabled = modes.default_enabled;
        if let Some(a) = &modes.agentless {
            row.deployment_modes_agentless_enabled = a.enabled;
            row.deployment_modes_agentless_is_default = a.is_default;
            row.deployment_modes_agentless_organization = text(&a.organization);
            row.deployment_modes_agentless_division = text(&a.division);
            row.deployment_modes_agentless_team = text(&a.team);
            row.deployment_modes_agentless_resources_requests_memory =
                text(&a.resources_requests_memory);
            row.deployment_modes_agentless_resources_requests_cpu = text(&a.resources_requests_cpu);
        }
    }
    row
}

pub fn policy_template_input_row(policy_template_id: i64, input: &PolicyTemplateInput) -> PolicyTemplateInputRow {
    let (file_path, line_number, col) = position(&input.location);
    PolicyTemplateInputRow {
        policy_template_id,
        r#type: text(&input.kind),
        title: text(&input.title),
        description: text(&input.description),
        input_group: text(&input.input_group),
        template_path: text(&input.template_path),
        multi: input.multi,
        file_path,
        line_number,
        col,
    }
}

// ---------------------------------------------------------------------------
// Data streams
// ---------------------------------------------------------------------------

pub fn data_stream_row(package_id: i64, ds: &DataStream) -> Result<DataStreamRow> {
    let m = &ds.manifest;
    let mut row = DataStreamRow {
        package_id,
        name: text(&ds.name),
        r#type: text(&m.kind),
        title: text(&m.title),
        dataset: text(&m.dataset),
        dataset_is_prefix: m.dataset_is_prefix,
        ilm_policy: text(&m.ilm_policy),
        release: text(&m.release),
        file_path: m.location.file.clone(),
        ..Default::default()
    };
    if let Some(es) = &m.elasticsearch {
        row.elasticsearch_index_mode = text(&es.index_mode);
        row.elasticsearch_source_mode = text(&es.source_mode);
        row.elasticsearch_dynamic_dataset = es.dynamic_dataset;
        row.elasticsearch_dynamic_namespace = es.dynamic_namespace;
        row.elasticsearch_privileges_properties =
            es.privileges_properties.as_deref().and_then(json_strings);
        if let Some(t) = &es.index_template {
            row.elasticsearch_index_template_settings = json_node(t.settings.as_ref())?;
            row.elasticsearch_index_template_mappings = json_node(t.mappings.as_ref())?;
            row.elasticsearch_index_template_ingest_pipeline_name = text(&t.ingest_pipeline_name);
            row.elasticsearch_index_template_data_stream_hidden = t.data_stream_hidden;
        }
    }
    Ok(row)
}

pub fn stream_row(data_stream_id: i64, stream: &Stream) -> StreamRow {
    let (file_path, line_number, col) = position(&stream.location);
    StreamRow {
        data_stream_id,
        input: text(&stream.input),
        title: text(&stream.title),
        description: text(&stream.description),
        template_path: text(&stream.template_path),
        enabled: stream.enabled,
        file_path,
        line_number,
        col,
    }
}

/// Project a flattened field.
///
/// `external` is the dictionary definition for fields declared
/// `external: ecs`; it only fills columns the field leaves empty. When
/// `resolving` is set, an ECS field without a definition is marked
/// `unresolvable`. Without a dictionary the flag stays NULL.
pub fn field_row(
    field: &Field,
    external: Option<&ExternalField>,
    resolving: bool,
) -> Result<FieldRow> {
    let (file_path, line_number, col) = position(&field.location);
    let mut row = FieldRow {
        name: field.name.clone(),
        r#type: text(&field.kind),
        description: text(&field.description),
        value: json_node(field.value.as_ref())?,
        example: json_node(field.example.as_ref())?,
        pattern: text(&field.pattern),
        date_format: text(&field.date_format),
        analyzer: text(&field.analyzer),
        search_analyzer: text(&field.search_analyzer),
        ignore_above: field.ignore_above,
        multi_fields: json_node(field.multi_fields.as_ref())?,
        enabled: field.enabled,
        dynamic: text(&field.dynamic),
        indexed: field.index,
        doc_values: field.doc_values,
        copy_to: text(&field.copy_to),
        scaling_factor: field.scaling_factor,
        alias_target_path: text(&field.alias_target_path),
        normalize: json_strings(&field.normalize),
        normalizer: text(&field.normalizer),
        null_value: json_node(field.null_value.as_ref())?,
        dimension: field.dimension,
        metric_type: text(&field.metric_type),
        external: text(&field.external),
        unresolvable: None,
        yaml_path: text(&field.yaml_path),
        file_path,
        line_number,
        col,
    };

    match external {
        Some(def) => {
            if row.r#type.is_none() {
                row.r#type = text(&def.kind);
            }
            if row.pattern.is_none() {
                row.pattern = text(&def.pattern);
            }
            if row.normalize.is_none() && def.array {
                row.normalize = json_strings(&["array".to_string()]);
            }
            if row.description.is_none() {
                row.description = text(&def.description);
            }
        }
        None if resolving && field.external == "ecs" => row.unresolvable = Some(1),
        None => {}
    }
    Ok(row)
}

pub fn pipeline_row(data_stream_id: i64, pipeline: &Pipeline) -> Result<IngestPipelineRow> {
    Ok(IngestPipelineRow {
        data_stream_id,
        name: text(&pipeline.name),
        description: text(&pipeline.description),
        version: pipeline.version,
        meta: json_node(pipeline.meta.as_ref())?,
        file_path: pipeline.location.file.clone(),
    })
}

pub fn processor_row(ingest_pipeline_id: i64, p: &FlatProcessor) -> IngestProcessorRow {
    let (file_path, line_number, col) = position(&p.location);
    IngestProcessorRow {
        ingest_pipeline_id,
        r#type: p.kind.clone(),
        attributes: p.attributes_json(),
        json_pointer: p.locator.clone(),
        file_path,
        line_number,
        col,
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

pub fn transform_row(package_id: i64, t: &Transform) -> Result<TransformRow> {
    let mut row = TransformRow {
        package_id,
        name: text(&t.name),
        file_path: t.location.file.clone(),
        ..Default::default()
    };

    if let Some(def) = &t.definition {
        if let Some(source) = &def.source {
            row.source_index = source.index.as_ref().and_then(first_index);
            row.source_index_json = json_node(source.index.as_ref())?;
            row.source_query = json_node(source.query.as_ref())?;
            row.source_runtime_mappings = json_node(source.runtime_mappings.as_ref())?;
        }
        if let Some(dest) = &def.dest {
            row.dest_index = text(&dest.index);
            row.dest_pipeline = text(&dest.pipeline);
        }
        if let Some(pivot) = &def.pivot {
            row.pivot_group_by = json_node(pivot.group_by.as_ref())?;
            row.pivot_aggregations = json_node(pivot.aggregations.as_ref())?;
            row.pivot_aggs = json_node(pivot.aggs.as_ref())?;
        }
        if let Some(latest) = &def.latest {
            row.latest_sort = text(&latest.sort);
            row.latest_unique_key = json_strings(&latest.unique_key);
        }
        row.description = text(&def.description);
        row.frequency = text(&def.frequency);
        if let Some(s) = &def.settings {
            row.settings_dates_as_epoch_millis = s.dates_as_epoch_millis;
            row.settings_docs_per_second = s.docs_per_second;
            row.settings_align_checkpoints = s.align_checkpoints;
            row.settings_max_page_search_size = s.max_page_search_size;
            row.settings_use_point_in_time = s.use_point_in_time;
            row.settings_deduce_mappings = s.deduce_mappings;
            row.settings_unattended = s.unattended;
        }
        row.meta = json_node(def.meta.as_ref())?;
        if let Some(r) = &def.retention_policy {
            row.retention_policy_time_field = text(&r.field);
            row.retention_policy_time_max_age = text(&r.max_age);
        }
        if let Some(s) = &def.sync {
            row.sync_time_field = text(&s.field);
            row.sync_time_delay = text(&s.delay);
        }
    }

    if let Some(m) = &t.manifest {
        row.manifest_start = m.start;
        if let Some(dit) = &m.destination_index_template {
            row.manifest_destination_index_template_mappings = json_node(dit.mappings.as_ref())?;
            row.manifest_destination_index_template_settings = json_node(dit.settings.as_ref())?;
        }
    }
    Ok(row)
}

/// `source.index` is a string or a list; the scalar column keeps the first.
fn first_index(index: &Node) -> Option<String> {
    if let Some(s) = index.as_text() {
        return text(s);
    }
    index.items().ok()?.first()?.as_text().and_then(text)
}

// ---------------------------------------------------------------------------
// Changelog
// ---------------------------------------------------------------------------

pub fn release_row(changelog_id: i64, release: &Release) -> ChangelogReleaseRow {
    let (file_path, line_number, col) = position(&release.location);
    ChangelogReleaseRow {
        changelog_id,
        version: text(&release.version),
        file_path,
        line_number,
        col,
    }
}

pub fn change_row(release_id: i64, change: &Change) -> ChangelogChangeRow {
    let (file_path, line_number, col) = position(&change.location);
    ChangelogChangeRow {
        release_id,
        description: text(&change.description),
        r#type: text(&change.kind),
        link: text(&change.link),
        file_path,
        line_number,
        col,
    }
}
