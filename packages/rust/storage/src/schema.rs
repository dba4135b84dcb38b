//! Table definitions for the package store.
//!
//! The store is rebuilt from scratch on every build, so there are no
//! migrations: each statement is idempotent and the whole list runs once per
//! build. Column comments are part of the catalog handed to query clients.
//!
//! Conventions: boolean columns hold 0/1 or NULL, `*_json` and composite
//! columns hold compact JSON text, and every entity with provenance carries
//! `file_path`, `line_number` (1-based) and `col` (1-based).

/// Every `CREATE TABLE` statement, parents before children.
pub fn table_schemas() -> &'static [&'static str] {
    TABLES
}

const TABLES: &[&str] = &[
    // -----------------------------------------------------------------------
    // Packages
    // -----------------------------------------------------------------------
    r#"-- One row per package directory under packages/.
CREATE TABLE IF NOT EXISTS packages (
    id                               INTEGER PRIMARY KEY AUTOINCREMENT,
    name                             TEXT,             -- package name from manifest.yml
    dir_name                         TEXT NOT NULL UNIQUE, -- package directory name
    title                            TEXT,             -- display title
    version                          TEXT,             -- package version (semver)
    description                      TEXT,             -- package description
    type                             TEXT,             -- integration, input or content
    format_version                   TEXT,             -- package-spec format version
    license                          TEXT,             -- deprecated license field
    release                          TEXT,             -- ga, beta or experimental
    policy_templates_behavior        TEXT,             -- all, combined_policy or individual_policies
    conditions_kibana_version        TEXT,             -- Kibana version constraint
    conditions_elastic_subscription  TEXT,             -- required Elastic subscription
    source_license                   TEXT,             -- source license (e.g. Elastic-2.0)
    owner_github                     TEXT,             -- owning GitHub team
    owner_type                       TEXT,             -- elastic, partner or community
    agent_privileges_root            BOOLEAN,          -- agent requires root privileges
    elasticsearch_privileges_cluster TEXT,             -- JSON list of cluster privileges
    file_path                        TEXT NOT NULL     -- path of manifest.yml
);"#,
    r#"-- Package categories.
CREATE TABLE IF NOT EXISTS package_categories (
    package_id INTEGER NOT NULL REFERENCES packages(id), -- owning package
    category   TEXT                                     -- category name
);"#,
    r#"-- Elastic capabilities required by a package (conditions.elastic.capabilities).
CREATE TABLE IF NOT EXISTS package_capabilities (
    package_id INTEGER NOT NULL REFERENCES packages(id), -- owning package
    capability TEXT                                     -- capability name
);"#,
    r#"-- Package icons.
CREATE TABLE IF NOT EXISTS package_icons (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id), -- owning package
    src        TEXT,    -- path of the image inside the package
    title      TEXT,    -- image title
    size       TEXT,    -- dimensions, e.g. 32x32
    type       TEXT,    -- MIME type
    dark_mode  BOOLEAN, -- icon is meant for dark mode
    width      INTEGER, -- width in pixels read from the image file
    height     INTEGER, -- height in pixels read from the image file
    byte_size  INTEGER  -- image file size in bytes
);"#,
    r#"-- Package screenshots.
CREATE TABLE IF NOT EXISTS package_screenshots (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id), -- owning package
    src        TEXT,  -- path of the image inside the package
    title      TEXT,  -- screenshot title
    size       TEXT,    -- dimensions, e.g. 1920x1080
    type       TEXT,    -- MIME type
    width      INTEGER, -- width in pixels read from the image file
    height     INTEGER, -- height in pixels read from the image file
    byte_size  INTEGER  -- image file size in bytes
);"#,
    r#"-- Fields used by Fleet to discover which package applies to existing data.
CREATE TABLE IF NOT EXISTS discovery_fields (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id), -- owning package
    name       TEXT                                     -- field name
);"#,
    r#"-- _dev/build/build.yml of a package.
CREATE TABLE IF NOT EXISTS build_manifests (
    id                               INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id                       INTEGER NOT NULL REFERENCES packages(id), -- owning package
    dependencies_ecs_reference       TEXT,    -- ECS git reference, e.g. git@v8.11.0
    dependencies_ecs_import_mappings BOOLEAN, -- import ECS mappings into the index template
    file_path                        TEXT NOT NULL -- path of build.yml
);"#,
    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------
    r#"-- Configuration variables. Each owning context has its own rows; join through
-- package_vars, policy_template_vars, policy_template_input_vars or stream_vars.
CREATE TABLE IF NOT EXISTS vars (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    name                     TEXT NOT NULL, -- variable name
    type                     TEXT,          -- text, password, bool, integer, yaml, select, ...
    title                    TEXT,          -- display title
    description              TEXT,          -- description
    multi                    BOOLEAN,       -- accepts multiple values
    required                 BOOLEAN,       -- must be set
    secret                   BOOLEAN,       -- stored as a secret
    show_user                BOOLEAN,       -- shown in the UI by default
    default_value            TEXT,          -- JSON default value
    hide_in_deployment_modes TEXT,          -- JSON list of deployment modes
    file_path                TEXT NOT NULL, -- declaring file
    line_number              INTEGER NOT NULL,
    col                      INTEGER NOT NULL
);"#,
    r#"-- Options of select variables.
CREATE TABLE IF NOT EXISTS var_options (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    var_id INTEGER NOT NULL REFERENCES vars(id), -- owning variable
    value  TEXT, -- option value
    text   TEXT  -- option label
);"#,
    r#"-- Package-level variables.
CREATE TABLE IF NOT EXISTS package_vars (
    package_id INTEGER NOT NULL REFERENCES packages(id),
    var_id     INTEGER NOT NULL REFERENCES vars(id)
);"#,
    // -----------------------------------------------------------------------
    // Policy templates
    // -----------------------------------------------------------------------
    r#"-- Policy templates of a package.
CREATE TABLE IF NOT EXISTS policy_templates (
    id                                           INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id                                   INTEGER NOT NULL REFERENCES packages(id), -- owning package
    name                                         TEXT,    -- template name
    title                                        TEXT,    -- display title
    description                                  TEXT,    -- description
    type                                         TEXT,    -- input type for input packages
    deployment_modes_default_enabled             BOOLEAN, -- usable with agent-based deployments
    deployment_modes_agentless_enabled           BOOLEAN, -- usable with agentless deployments
    deployment_modes_agentless_is_default        BOOLEAN, -- agentless is the default mode
    deployment_modes_agentless_organization      TEXT,    -- responsible organization
    deployment_modes_agentless_division          TEXT,    -- responsible division
    deployment_modes_agentless_team              TEXT,    -- responsible team
    deployment_modes_agentless_resources_requests_memory TEXT, -- agentless memory request
    deployment_modes_agentless_resources_requests_cpu    TEXT, -- agentless CPU request
    file_path                                    TEXT NOT NULL,
    line_number                                  INTEGER NOT NULL,
    col                                          INTEGER NOT NULL
);"#,
    r#"-- Policy template categories.
CREATE TABLE IF NOT EXISTS policy_template_categories (
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    category           TEXT
);"#,
    r#"-- Data stream names referenced by a policy template. Soft references, not keys.
CREATE TABLE IF NOT EXISTS policy_template_data_streams (
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    data_stream_name   TEXT -- matches data_streams.name within the same package
);"#,
    r#"-- Policy template icons.
CREATE TABLE IF NOT EXISTS policy_template_icons (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    src                TEXT,
    title              TEXT,
    size               TEXT,
    type               TEXT,
    dark_mode          BOOLEAN,
    width              INTEGER,
    height             INTEGER,
    byte_size          INTEGER
);"#,
    r#"-- Policy template screenshots.
CREATE TABLE IF NOT EXISTS policy_template_screenshots (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    src                TEXT,
    title              TEXT,
    size               TEXT,
    type               TEXT,
    width              INTEGER,
    height             INTEGER,
    byte_size          INTEGER
);"#,
    r#"-- Policy template variables.
CREATE TABLE IF NOT EXISTS policy_template_vars (
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    var_id             INTEGER NOT NULL REFERENCES vars(id)
);"#,
    r#"-- Inputs of a policy template.
CREATE TABLE IF NOT EXISTS policy_template_inputs (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    policy_template_id INTEGER NOT NULL REFERENCES policy_templates(id),
    type               TEXT,    -- input type, e.g. logfile, httpjson, cel
    title              TEXT,    -- display title
    description        TEXT,    -- description
    input_group        TEXT,    -- logs or metrics
    template_path      TEXT,    -- agent config template
    multi              BOOLEAN, -- input may be added more than once
    file_path          TEXT NOT NULL,
    line_number        INTEGER NOT NULL,
    col                INTEGER NOT NULL
);"#,
    r#"-- Policy template input variables.
CREATE TABLE IF NOT EXISTS policy_template_input_vars (
    policy_template_input_id INTEGER NOT NULL REFERENCES policy_template_inputs(id),
    var_id                   INTEGER NOT NULL REFERENCES vars(id)
);"#,
    // -----------------------------------------------------------------------
    // Data streams
    // -----------------------------------------------------------------------
    r#"-- Data streams of a package (data_stream/<name>/manifest.yml).
CREATE TABLE IF NOT EXISTS data_streams (
    id                                               INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id                                       INTEGER NOT NULL REFERENCES packages(id), -- owning package
    name                                             TEXT,    -- data stream directory name
    type                                             TEXT,    -- logs, metrics, traces or synthetics
    title                                            TEXT,    -- display title
    dataset                                          TEXT,    -- dataset name override
    dataset_is_prefix                                BOOLEAN, -- dataset is used as a prefix
    ilm_policy                                       TEXT,    -- ILM policy name
    release                                          TEXT,    -- ga, beta or experimental
    elasticsearch_index_mode                         TEXT,    -- e.g. time_series
    elasticsearch_source_mode                        TEXT,    -- e.g. synthetic
    elasticsearch_dynamic_dataset                    BOOLEAN,
    elasticsearch_dynamic_namespace                  BOOLEAN,
    elasticsearch_privileges_properties              TEXT,    -- JSON list of index privileges
    elasticsearch_index_template_settings            TEXT,    -- JSON index settings
    elasticsearch_index_template_mappings            TEXT,    -- JSON mappings
    elasticsearch_index_template_ingest_pipeline_name TEXT,   -- default ingest pipeline
    elasticsearch_index_template_data_stream_hidden  BOOLEAN,
    file_path                                        TEXT NOT NULL -- path of the data stream manifest.yml
);"#,
    r#"-- Streams (inputs) of a data stream.
CREATE TABLE IF NOT EXISTS streams (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    data_stream_id INTEGER NOT NULL REFERENCES data_streams(id),
    input          TEXT,    -- input type
    title          TEXT,    -- display title
    description    TEXT,    -- description
    template_path  TEXT,    -- agent config template
    enabled        BOOLEAN, -- enabled by default
    file_path      TEXT NOT NULL,
    line_number    INTEGER NOT NULL,
    col            INTEGER NOT NULL
);"#,
    r#"-- Stream variables.
CREATE TABLE IF NOT EXISTS stream_vars (
    stream_id INTEGER NOT NULL REFERENCES streams(id),
    var_id    INTEGER NOT NULL REFERENCES vars(id)
);"#,
    r#"-- Flattened field definitions. Join through data_stream_fields or transform_fields.
CREATE TABLE IF NOT EXISTS fields (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT NOT NULL, -- dotted field name
    type              TEXT,    -- field type; backfilled from ECS for external fields
    description       TEXT,    -- description; backfilled from ECS for external fields
    value             TEXT,    -- JSON constant_keyword value
    example           TEXT,    -- JSON example value
    pattern           TEXT,    -- regex the value must match; backfilled from ECS
    date_format       TEXT,
    analyzer          TEXT,
    search_analyzer   TEXT,
    ignore_above      INTEGER,
    multi_fields      TEXT,    -- JSON list of multi-field definitions
    enabled           BOOLEAN,
    dynamic           TEXT,    -- true, false, strict or runtime
    indexed           BOOLEAN, -- mapping `index` parameter
    doc_values        BOOLEAN,
    copy_to           TEXT,
    scaling_factor    INTEGER,
    alias_target_path TEXT,    -- target of an alias field
    normalize         TEXT,    -- JSON list, e.g. ["array"]; backfilled from ECS
    normalizer        TEXT,
    null_value        TEXT,    -- JSON null_value
    dimension         BOOLEAN, -- TSDB dimension
    metric_type       TEXT,    -- TSDB metric type
    external          TEXT,    -- external source, e.g. ecs
    unresolvable      INTEGER, -- 1 when an external definition could not be found
    yaml_path         TEXT,    -- pointer into the declaring file, e.g. /0/fields/2
    file_path         TEXT NOT NULL,
    line_number       INTEGER NOT NULL,
    col               INTEGER NOT NULL
);"#,
    r#"-- Fields of a data stream.
CREATE TABLE IF NOT EXISTS data_stream_fields (
    data_stream_id   INTEGER NOT NULL REFERENCES data_streams(id),
    field_id         INTEGER NOT NULL REFERENCES fields(id),
    fields_file_name TEXT -- declaring file name, e.g. ecs.yml
);"#,
    r#"-- Ingest pipelines of a data stream.
CREATE TABLE IF NOT EXISTS ingest_pipelines (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    data_stream_id INTEGER NOT NULL REFERENCES data_streams(id),
    name           TEXT,    -- file name including extension, e.g. default.yml
    description    TEXT,
    version        INTEGER,
    meta           TEXT,    -- JSON _meta
    file_path      TEXT NOT NULL
);"#,
    r#"-- Flattened ingest processors. Nested on_failure processors come before their
-- parent, and the parent's attributes embed its immediate on_failure list.
CREATE TABLE IF NOT EXISTS ingest_processors (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    ingest_pipeline_id INTEGER NOT NULL REFERENCES ingest_pipelines(id),
    type               TEXT NOT NULL, -- processor type, e.g. rename
    attributes         TEXT,          -- JSON processor configuration
    json_pointer       TEXT NOT NULL, -- location in the pipeline, e.g. /processors/3/on_failure/0/set
    file_path          TEXT NOT NULL,
    line_number        INTEGER NOT NULL,
    col                INTEGER NOT NULL
);"#,
    r#"-- sample_event.json of a data stream.
CREATE TABLE IF NOT EXISTS sample_events (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    data_stream_id INTEGER NOT NULL REFERENCES data_streams(id),
    event          TEXT, -- JSON sample document
    file_path      TEXT NOT NULL
);"#,
    // -----------------------------------------------------------------------
    // Transforms
    // -----------------------------------------------------------------------
    r#"-- Transforms of a package (elasticsearch/transform/<name>/).
CREATE TABLE IF NOT EXISTS transforms (
    id                                           INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id                                   INTEGER NOT NULL REFERENCES packages(id),
    name                                         TEXT,    -- transform directory name
    source_index                                 TEXT,    -- source index, or the first of a list
    source_index_json                            TEXT,    -- JSON source index as declared
    source_query                                 TEXT,    -- JSON query
    source_runtime_mappings                      TEXT,    -- JSON runtime mappings
    dest_index                                   TEXT,
    dest_pipeline                                TEXT,
    pivot_group_by                               TEXT,    -- JSON
    pivot_aggregations                           TEXT,    -- JSON
    pivot_aggs                                   TEXT,    -- JSON
    latest_sort                                  TEXT,
    latest_unique_key                            TEXT,    -- JSON list
    description                                  TEXT,
    frequency                                    TEXT,
    settings_dates_as_epoch_millis               BOOLEAN,
    settings_docs_per_second                     REAL,
    settings_align_checkpoints                   BOOLEAN,
    settings_max_page_search_size                INTEGER,
    settings_use_point_in_time                   BOOLEAN,
    settings_deduce_mappings                     BOOLEAN,
    settings_unattended                          BOOLEAN,
    meta                                         TEXT,    -- JSON _meta
    retention_policy_time_field                  TEXT,
    retention_policy_time_max_age                TEXT,
    sync_time_field                              TEXT,
    sync_time_delay                              TEXT,
    manifest_start                               BOOLEAN, -- start the transform on install
    manifest_destination_index_template_mappings TEXT,    -- JSON
    manifest_destination_index_template_settings TEXT,    -- JSON
    file_path                                    TEXT NOT NULL -- path of transform.yml
);"#,
    r#"-- Fields of a transform destination.
CREATE TABLE IF NOT EXISTS transform_fields (
    transform_id     INTEGER NOT NULL REFERENCES transforms(id),
    field_id         INTEGER NOT NULL REFERENCES fields(id),
    fields_file_name TEXT
);"#,
    r#"-- Destination aliases of a transform.
CREATE TABLE IF NOT EXISTS transform_dest_aliases (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    transform_id     INTEGER NOT NULL REFERENCES transforms(id),
    alias            TEXT,
    move_on_creation BOOLEAN
);"#,
    // -----------------------------------------------------------------------
    // Changelog
    // -----------------------------------------------------------------------
    r#"-- changelog.yml of a package.
CREATE TABLE IF NOT EXISTS changelogs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id),
    file_path  TEXT NOT NULL
);"#,
    r#"-- Releases listed in a changelog, in file order.
CREATE TABLE IF NOT EXISTS changelog_releases (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    changelog_id INTEGER NOT NULL REFERENCES changelogs(id),
    version      TEXT,
    file_path    TEXT NOT NULL,
    line_number  INTEGER NOT NULL,
    col          INTEGER NOT NULL
);"#,
    r#"-- Changes of a release, in file order.
CREATE TABLE IF NOT EXISTS changelog_changes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    release_id  INTEGER NOT NULL REFERENCES changelog_releases(id),
    description TEXT,
    type        TEXT, -- enhancement, bugfix or breaking-change
    link        TEXT, -- pull request or issue URL
    file_path   TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    col         INTEGER NOT NULL
);"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for stmt in table_schemas() {
            assert!(stmt.contains("CREATE TABLE IF NOT EXISTS"), "{stmt}");
        }
    }

    #[test]
    fn table_names_are_unique() {
        let mut names: Vec<_> = table_schemas()
            .iter()
            .filter_map(|s| s.split("CREATE TABLE IF NOT EXISTS ").nth(1))
            .filter_map(|s| s.split_whitespace().next())
            .collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 32);
    }
}
