//! Typed rows for every table in [`crate::schema`].
//!
//! Each row struct is declared through [`record!`], which derives its table
//! name, column list and positional values. Field names are column names.

use libsql::Value;

/// A row that can be inserted into its table.
pub trait Record {
    const TABLE: &'static str;

    /// Column names in declaration order.
    fn columns() -> Vec<&'static str>;

    /// Values in the same order as [`Record::columns`].
    fn values(&self) -> Vec<Value>;
}

/// Conversion of a row field into a SQLite value.
pub trait ToSql {
    fn to_value(&self) -> Value;
}

impl ToSql for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToSql for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl ToSql for bool {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl ToSql for f64 {
    fn to_value(&self) -> Value {
        Value::Real(*self)
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

macro_rules! record {
    (
        $(#[$meta:meta])*
        $name:ident => $table:literal {
            $($field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(pub $field: $ty),*
        }

        impl Record for $name {
            const TABLE: &'static str = $table;

            fn columns() -> Vec<&'static str> {
                vec![$(stringify!($field).trim_start_matches("r#")),*]
            }

            fn values(&self) -> Vec<Value> {
                vec![$(ToSql::to_value(&self.$field)),*]
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Packages
// ---------------------------------------------------------------------------

record! {
    PackageRow => "packages" {
        name: Option<String>,
        dir_name: String,
        title: Option<String>,
        version: Option<String>,
        description: Option<String>,
        r#type: Option<String>,
        format_version: Option<String>,
        license: Option<String>,
        release: Option<String>,
        policy_templates_behavior: Option<String>,
        conditions_kibana_version: Option<String>,
        conditions_elastic_subscription: Option<String>,
        source_license: Option<String>,
        owner_github: Option<String>,
        owner_type: Option<String>,
        agent_privileges_root: Option<bool>,
        elasticsearch_privileges_cluster: Option<String>,
        file_path: String,
    }
}

record! {
    PackageCategoryRow => "package_categories" {
        package_id: i64,
        category: Option<String>,
    }
}

record! {
    PackageCapabilityRow => "package_capabilities" {
        package_id: i64,
        capability: Option<String>,
    }
}

record! {
    PackageIconRow => "package_icons" {
        package_id: i64,
        src: Option<String>,
        title: Option<String>,
        size: Option<String>,
        r#type: Option<String>,
        dark_mode: Option<bool>,
        width: Option<i64>,
        height: Option<i64>,
        byte_size: Option<i64>,
    }
}

record! {
    PackageScreenshotRow => "package_screenshots" {
        package_id: i64,
        src: Option<String>,
        title: Option<String>,
        size: Option<String>,
        r#type: Option<String>,
        width: Option<i64>,
        height: Option<i64>,
        byte_size: Option<i64>,
    }
}

record! {
    DiscoveryFieldRow => "discovery_fields" {
        package_id: i64,
        name: Option<String>,
    }
}

record! {
    BuildManifestRow => "build_manifests" {
        package_id: i64,
        dependencies_ecs_reference: Option<String>,
        dependencies_ecs_import_mappings: Option<bool>,
        file_path: String,
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

record! {
    VarRow => "vars" {
        name: String,
        r#type: Option<String>,
        title: Option<String>,
        description: Option<String>,
        multi: Option<bool>,
        required: Option<bool>,
        secret: Option<bool>,
        show_user: Option<bool>,
        default_value: Option<String>,
        hide_in_deployment_modes: Option<String>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    VarOptionRow => "var_options" {
        var_id: i64,
        value: Option<String>,
        text: Option<String>,
    }
}

record! {
    PackageVarRow => "package_vars" {
        package_id: i64,
        var_id: i64,
    }
}

// ---------------------------------------------------------------------------
// Policy templates
// ---------------------------------------------------------------------------

record! {
    PolicyTemplateRow => "policy_templates" {
        package_id: i64,
        name: Option<String>,
        title: Option<String>,
        description: Option<String>,
        r#type: Option<String>,
        deployment_modes_default_enabled: Option<bool>,
        deployment_modes_agentless_enabled: Option<bool>,
        deployment_modes_agentless_is_default: Option<bool>,
        deployment_modes_agentless_organization: Option<String>,
        deployment_modes_agentless_division: Option<String>,
        deployment_modes_agentless_team: Option<String>,
        deployment_modes_agentless_resources_requests_memory: Option<String>,
        deployment_modes_agentless_resources_requests_cpu: Option<String>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    PolicyTemplateCategoryRow => "policy_template_categories" {
        policy_template_id: i64,
        category: Option<String>,
    }
}

record! {
    PolicyTemplateDataStreamRow => "policy_template_data_streams" {
        policy_template_id: i64,
        data_stream_name: Option<String>,
    }
}

record! {
    PolicyTemplateIconRow => "policy_template_icons" {
        policy_template_id: i64,
        src: Option<String>,
        title: Option<String>,
        size: Option<String>,
        r#type: Option<String>,
        dark_mode: Option<bool>,
        width: Option<i64>,
        height: Option<i64>,
        byte_size: Option<i64>,
    }
}

record! {
    PolicyTemplateScreenshotRow => "policy_template_screenshots" {
        policy_template_id: i64,
        src: Option<String>,
        title: Option<String>,
        size: Option<String>,
        r#type: Option<String>,
        width: Option<i64>,
        height: Option<i64>,
        byte_size: Option<i64>,
    }
}

record! {
    PolicyTemplateVarRow => "policy_template_vars" {
        policy_template_id: i64,
        var_id: i64,
    }
}

record! {
    PolicyTemplateInputRow => "policy_template_inputs" {
        policy_template_id: i64,
        r#type: Option<String>,
        title: Option<String>,
        description: Option<String>,
        input_group: Option<String>,
        template_path: Option<String>,
        multi: Option<bool>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    PolicyTemplateInputVarRow => "policy_template_input_vars" {
        policy_template_input_id: i64,
        var_id: i64,
    }
}

// ---------------------------------------------------------------------------
// Data streams
// ---------------------------------------------------------------------------

record! {
    DataStreamRow => "data_streams" {
        package_id: i64,
        name: Option<String>,
        r#type: Option<String>,
        title: Option<String>,
        dataset: Option<String>,
        dataset_is_prefix: Option<bool>,
        ilm_policy: Option<String>,
        release: Option<String>,
        elasticsearch_index_mode: Option<String>,
        elasticsearch_source_mode: Option<String>,
        elasticsearch_dynamic_dataset: Option<bool>,
        elasticsearch_dynamic_namespace: Option<bool>,
        elasticsearch_privileges_properties: Option<String>,
        elasticsearch_index_template_settings: Option<String>,
        elasticsearch_index_template_mappings: Option<String>,
        elasticsearch_index_template_ingest_pipeline_name: Option<String>,
        elasticsearch_index_template_data_stream_hidden: Option<bool>,
        file_path: String,
    }
}

record! {
    StreamRow => "streams" {
        data_stream_id: i64,
        input: Option<String>,
        title: Option<String>,
        description: Option<String>,
        template_path: Option<String>,
        enabled: Option<bool>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    StreamVarRow => "stream_vars" {
        stream_id: i64,
        var_id: i64,
    }
}

record! {
    FieldRow => "fields" {
        name: String,
        r#type: Option<String>,
        description: Option<String>,
        value: Option<String>,
        example: Option<String>,
        pattern: Option<String>,
        date_format: Option<String>,
        analyzer: Option<String>,
        search_analyzer: Option<String>,
        ignore_above: Option<i64>,
        multi_fields: Option<String>,
        enabled: Option<bool>,
        dynamic: Option<String>,
        indexed: Option<bool>,
        doc_values: Option<bool>,
        copy_to: Option<String>,
        scaling_factor: Option<i64>,
        alias_target_path: Option<String>,
        normalize: Option<String>,
        normalizer: Option<String>,
        null_value: Option<String>,
        dimension: Option<bool>,
        metric_type: Option<String>,
        external: Option<String>,
        unresolvable: Option<i64>,
        yaml_path: Option<String>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    DataStreamFieldRow => "data_stream_fields" {
        data_stream_id: i64,
        field_id: i64,
        fields_file_name: Option<String>,
    }
}

record! {
    IngestPipelineRow => "ingest_pipelines" {
        data_stream_id: i64,
        name: Option<String>,
        description: Option<String>,
        version: Option<i64>,
        meta: Option<String>,
        file_path: String,
    }
}

record! {
    IngestProcessorRow => "ingest_processors" {
        ingest_pipeline_id: i64,
        r#type: String,
        attributes: Option<String>,
        json_pointer: String,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    SampleEventRow => "sample_events" {
        data_stream_id: i64,
        event: Option<String>,
        file_path: String,
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

record! {
    TransformRow => "transforms" {
        package_id: i64,
        name: Option<String>,
        source_index: Option<String>,
        source_index_json: Option<String>,
        source_query: Option<String>,
        source_runtime_mappings: Option<String>,
        dest_index: Option<String>,
        dest_pipeline: Option<String>,
        pivot_group_by: Option<String>,
        pivot_aggregations: Option<String>,
        pivot_aggs: Option<String>,
        latest_sort: Option<String>,
        latest_unique_key: Option<String>,
        description: Option<String>,
        frequency: Option<String>,
        settings_dates_as_epoch_millis: Option<bool>,
        settings_docs_per_second: Option<f64>,
        settings_align_checkpoints: Option<bool>,
        settings_max_page_search_size: Option<i64>,
        settings_use_point_in_time: Option<bool>,
        settings_deduce_mappings: Option<bool>,
        settings_unattended: Option<bool>,
        meta: Option<String>,
        retention_policy_time_field: Option<String>,
        retention_policy_time_max_age: Option<String>,
        sync_time_field: Option<String>,
        sync_time_delay: Option<String>,
        manifest_start: Option<bool>,
        manifest_destination_index_template_mappings: Option<String>,
        manifest_destination_index_template_settings: Option<String>,
        file_path: String,
    }
}

record! {
    TransformFieldRow => "transform_fields" {
        transform_id: i64,
        field_id: i64,
        fields_file_name: Option<String>,
    }
}

record! {
    TransformDestAliasRow => "transform_dest_aliases" {
        transform_id: i64,
        alias: Option<String>,
        move_on_creation: Option<bool>,
    }
}

// ---------------------------------------------------------------------------
// Changelog
// ---------------------------------------------------------------------------

record! {
    ChangelogRow => "changelogs" {
        package_id: i64,
        file_path: String,
    }
}

record! {
    ChangelogReleaseRow => "changelog_releases" {
        changelog_id: i64,
        version: Option<String>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

record! {
    ChangelogChangeRow => "changelog_changes" {
        release_id: i64,
        description: Option<String>,
        r#type: Option<String>,
        link: Option<String>,
        file_path: String,
        line_number: i64,
        col: i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_identifiers_become_plain_columns() {
        let cols = IngestProcessorRow::columns();
        assert_eq!(cols[1], "type");
        assert_eq!(IngestProcessorRow::TABLE, "ingest_processors");
    }

    #[test]
    fn values_follow_column_order() {
        let row = VarOptionRow {
            var_id: 7,
            value: Some("tcp".into()),
            text: None,
        };
        assert_eq!(VarOptionRow::columns(), ["var_id", "value", "text"]);
        assert_eq!(
            row.values(),
            vec![Value::Integer(7), Value::Text("tcp".into()), Value::Null]
        );
    }

    #[test]
    fn booleans_are_integers() {
        assert_eq!(Some(true).to_value(), Value::Integer(1));
        assert_eq!(Some(false).to_value(), Value::Integer(0));
        assert_eq!(None::<bool>.to_value(), Value::Null);
    }

    #[test]
    fn columns_exist_in_schema() {
        let schema = crate::schema::table_schemas().join("\n");
        for col in FieldRow::columns()
            .into_iter()
            .chain(TransformRow::columns())
            .chain(PolicyTemplateRow::columns())
        {
            assert!(schema.contains(&format!("    {col} ")), "missing column {col}");
        }
    }
}
