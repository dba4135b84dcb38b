//! End-to-end builds over a small fixture corpus.

use std::path::Path;
use std::sync::Arc;

use fleetsql_core::{
    BuildPhase, EcsDictionary, FieldDictionary, NoDictionary, QueryOutcome, QuerySurface,
    SilentProgress, build_store, store_channel, write_package,
};
use fleetsql_document::read_package;
use fleetsql_shared::{BuildConfig, FleetSqlError};
use fleetsql_storage::{JsonRow, ReadOnlyStore, Store};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// PNG signature and IHDR chunk for a `width` x `height` image.
fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

fn nginx(root: &Path) {
    let pkg = root.join("packages/nginx");
    write(
        &pkg,
        "manifest.yml",
        r#"format_version: 3.0.0
name: nginx
title: Nginx
version: "1.20.0"
type: integration
categories: [web, observability]
icons:
  - src: /img/nginx-logo.png
    title: Nginx logo
    type: image/png
conditions:
  kibana:
    version: "^8.13.0"
vars:
  - name: hosts
    type: text
    multi: true
    default: []
policy_templates:
  - name: nginx
    title: Nginx logs
    data_streams: [access]
    icons:
      - src: /img/nginx-logo.svg
        type: image/svg+xml
    inputs:
      - type: logfile
        title: Collect logs
        vars:
          - name: paths
            type: text
            default: [/var/log/nginx/access.log*]
"#,
    );
    write(&pkg, "img/nginx-logo.png", png(48, 32));
    write(&pkg, "img/nginx-logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
    write(&pkg, "_dev/build/build.yml", "dependencies:\n  ecs:\n    reference: git@v8.11.0\n");
    write(
        &pkg,
        "changelog.yml",
        "- version: \"1.20.0\"\n  changes:\n    - description: Add access logs.\n      type: enhancement\n      link: https://github.com/elastic/integrations/pull/1\n",
    );
    write(
        &pkg,
        "data_stream/access/manifest.yml",
        r#"title: Access logs
type: logs
elasticsearch:
  source_mode: synthetic
streams:
  - input: logfile
    title: Access logs
    vars:
      - name: tags
        type: text
        default: [nginx-access]
  - input: httpjson
    title: Remote logs
"#,
    );
    write(
        &pkg,
        "data_stream/access/fields/ecs.yml",
        "- name: host.ip\n  external: ecs\n- name: event.kind\n  external: ecs\n  type: constant_keyword\n- name: source.unknown\n  external: ecs\n",
    );
    write(
        &pkg,
        "data_stream/access/fields/fields.yml",
        "- name: nginx.access\n  type: group\n  fields:\n    - name: code\n      type: long\n",
    );
    write(
        &pkg,
        "data_stream/access/elasticsearch/ingest_pipeline/default.yml",
        r#"description: Pipeline for nginx access logs
processors:
  - rename:
      field: message
      target_field: event.original
      on_failure:
        - set:
            field: error.message
            value: rename failed
  - ~
  - remove:
      field: temp
on_failure:
  - set:
      field: event.kind
      value: pipeline_error
"#,
    );
    write(&pkg, "data_stream/access/sample_event.json", r#"{"message": "GET / 200"}"#);
}

fn apache(root: &Path) {
    write(
        &root.join("packages/apache"),
        "manifest.yml",
        "format_version: 3.0.0\nname: apache\ntitle: Apache\nversion: 1.0.0\ntype: integration\n",
    );
}

fn ecs(root: &Path) {
    write(
        root,
        "ecs/v8.11.0/ecs_flat.yml",
        r#"host.ip:
  type: ip
  normalize: [array]
  description: Host ip addresses.
event.kind:
  type: keyword
  description: Event kind.
"#,
    );
}

fn config(root: &Path) -> BuildConfig {
    BuildConfig {
        integrations_dir: root.to_path_buf(),
        store_path: root.join("fleetpkg.db"),
        ecs_dir: Some(root.join("ecs")),
    }
}

async fn rows(surface: &QuerySurface, sql: &str) -> Vec<JsonRow> {
    match surface.execute(sql).await {
        QueryOutcome::Rows(rows) => rows,
        other => panic!("unexpected outcome for {sql}: {other:?}"),
    }
}

fn column(rows: &[JsonRow], name: &str) -> Vec<Value> {
    rows.iter().map(|r| r[name].clone()).collect()
}

#[tokio::test]
async fn build_publishes_queryable_store() {
    let tmp = tempfile::tempdir().unwrap();
    nginx(tmp.path());
    apache(tmp.path());
    ecs(tmp.path());
    let config = config(tmp.path());

    let (publisher, mut handle) = store_channel();
    let surface = QuerySurface::new(handle.clone());
    assert_eq!(surface.execute("SELECT 1").await, QueryOutcome::NotReady);

    let dict: Arc<dyn FieldDictionary> = Arc::new(EcsDictionary::new(tmp.path().join("ecs")));
    let summary = build_store(&config, dict, &publisher, &SilentProgress).await.unwrap();
    assert_eq!(summary.packages, 2);
    assert_eq!(summary.totals.data_streams, 1);
    assert_eq!(summary.totals.processors, 4);
    assert_eq!(summary.totals.fields, 4);
    assert_eq!(summary.totals.vars, 3);
    assert_eq!(handle.wait_finished().await, BuildPhase::Ready);
    assert!(config.store_path.exists());

    let packages = rows(&surface, "SELECT dir_name, title FROM packages ORDER BY id").await;
    assert_eq!(column(&packages, "dir_name"), [json!("apache"), json!("nginx")]);

    // Failure handlers precede their parent; absent entries keep their index.
    let processors = rows(
        &surface,
        "SELECT type, json_pointer, attributes FROM ingest_processors ORDER BY id",
    )
    .await;
    assert_eq!(
        column(&processors, "json_pointer"),
        [
            json!("/processors/0/on_failure/0/set"),
            json!("/processors/0/rename"),
            json!("/processors/2/remove"),
            json!("/on_failure/0/set"),
        ]
    );
    let rename: Value = serde_json::from_str(processors[1]["attributes"].as_str().unwrap()).unwrap();
    assert_eq!(
        rename["on_failure"],
        json!([{"set": {"field": "error.message", "value": "rename failed"}}])
    );

    // Fields are written once per data stream, not once per stream.
    let fields = rows(
        &surface,
        "SELECT f.name, f.type, f.normalize, f.description, f.unresolvable, dsf.fields_file_name \
         FROM data_stream_fields dsf JOIN fields f ON f.id = dsf.field_id ORDER BY f.id",
    )
    .await;
    assert_eq!(
        column(&fields, "name"),
        [json!("host.ip"), json!("event.kind"), json!("source.unknown"), json!("nginx.access.code")]
    );
    assert_eq!(fields[0]["type"], json!("ip"));
    assert_eq!(fields[0]["normalize"], json!(r#"["array"]"#));
    assert_eq!(fields[1]["type"], json!("constant_keyword"));
    assert_eq!(fields[1]["description"], json!("Event kind."));
    assert_eq!(fields[2]["unresolvable"], json!(1));
    assert_eq!(fields[3]["fields_file_name"], json!("fields.yml"));

    let vars = rows(&surface, "SELECT name, default_value FROM vars ORDER BY id").await;
    assert_eq!(column(&vars, "name"), [json!("hosts"), json!("paths"), json!("tags")]);
    assert_eq!(vars[0]["default_value"], json!(null));
    assert_eq!(vars[1]["default_value"], json!(r#"["/var/log/nginx/access.log*"]"#));

    let ds = rows(&surface, "SELECT elasticsearch_source_mode, elasticsearch_index_mode FROM data_streams").await;
    assert_eq!(ds[0]["elasticsearch_source_mode"], json!("synthetic"));
    assert_eq!(ds[0]["elasticsearch_index_mode"], json!(null));

    // Image dimensions come from the file; formats without a readable header stay NULL.
    let icons = rows(&surface, "SELECT src, width, height, byte_size FROM package_icons").await;
    assert_eq!(icons[0]["src"], json!("/img/nginx-logo.png"));
    assert_eq!((icons[0]["width"].clone(), icons[0]["height"].clone()), (json!(48), json!(32)));
    assert_eq!(icons[0]["byte_size"], json!(png(48, 32).len()));
    let pt_icons = rows(&surface, "SELECT width, byte_size FROM policy_template_icons").await;
    assert_eq!(pt_icons[0]["width"], json!(null));
    assert_eq!(pt_icons[0]["byte_size"], json!(null));

    let changes = rows(&surface, "SELECT type, line_number FROM changelog_changes").await;
    assert_eq!(changes[0]["type"], json!("enhancement"));
    assert_eq!(changes[0]["line_number"], json!(3));

    // Errors come back verbatim and the store stays usable.
    match surface.execute("SELECT * FROM no_such_table").await {
        QueryOutcome::Failed(msg) => assert!(msg.contains("no_such_table"), "{msg}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(rows(&surface, "SELECT COUNT(*) AS n FROM streams").await[0]["n"], json!(2));
}

#[tokio::test]
async fn failed_rebuild_keeps_published_store() {
    let tmp = tempfile::tempdir().unwrap();
    apache(tmp.path());
    let config = config(tmp.path());
    let (publisher, handle) = store_channel();

    build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress)
        .await
        .unwrap();
    let first = handle.current().unwrap();

    write(&tmp.path().join("packages/broken"), "manifest.yml", "name: [unterminated\n");
    let err = build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("manifest.yml"), "{err}");

    let current = handle.current().unwrap();
    assert!(Arc::ptr_eq(&first, &current));
    assert!(matches!(handle.phase(), BuildPhase::Failed(_)));
    assert!(!tmp.path().join("fleetpkg.db.building").exists());

    let rows = current.query("SELECT dir_name FROM packages").await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn empty_corpus_fails() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("packages")).unwrap();
    let (publisher, handle) = store_channel();
    let result = build_store(&config(tmp.path()), Arc::new(NoDictionary), &publisher, &SilentProgress).await;
    assert!(result.is_err());
    assert!(handle.current().is_none());
}

#[tokio::test]
async fn ecs_fields_are_not_flagged_without_dictionary() {
    let tmp = tempfile::tempdir().unwrap();
    nginx(tmp.path());
    let config = BuildConfig {
        ecs_dir: None,
        ..config(tmp.path())
    };
    let (publisher, handle) = store_channel();
    build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress)
        .await
        .unwrap();

    let store = handle.current().unwrap();
    let fields = store
        .query("SELECT name, type, unresolvable FROM fields ORDER BY id")
        .await
        .unwrap();
    assert_eq!(fields.len(), 4);
    assert!(fields.iter().all(|f| f["unresolvable"].is_null()));
    assert_eq!(fields[0]["type"], json!(null));
    assert_eq!(fields[1]["type"], json!("constant_keyword"));
}

#[tokio::test]
async fn rebuild_replaces_store_while_old_handle_answers() {
    let tmp = tempfile::tempdir().unwrap();
    apache(tmp.path());
    let config = config(tmp.path());
    let (publisher, handle) = store_channel();

    build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress)
        .await
        .unwrap();
    let old = handle.current().unwrap();

    nginx(tmp.path());
    let summary = build_store(&config, Arc::new(NoDictionary), &publisher, &SilentProgress)
        .await
        .unwrap();
    assert_eq!(summary.packages, 2);
    assert_eq!(handle.phase(), BuildPhase::Ready);

    let new = handle.current().unwrap();
    assert!(!Arc::ptr_eq(&old, &new));
    let count = "SELECT COUNT(*) AS n FROM packages";
    assert_eq!(new.query(count).await.unwrap()[0]["n"], json!(2));
    // A reader still holding the replaced store keeps getting answers.
    let answered = old.query(count).await.unwrap();
    assert_eq!(answered.len(), 1);
    drop(old);
    assert_eq!(new.query(count).await.unwrap()[0]["n"], json!(2));
}

#[tokio::test]
async fn failed_package_leaves_no_rows() {
    let tmp = tempfile::tempdir().unwrap();
    nginx(tmp.path());
    // Flattening fails after the package, its vars and its data stream were inserted.
    write(
        tmp.path(),
        "packages/nginx/data_stream/access/elasticsearch/ingest_pipeline/default.yml",
        "processors:\n  - script:\n      params:\n        limit: .inf\n",
    );
    let db = tmp.path().join("atomic.db");

    let store = Store::create(&db).await.unwrap();
    store.create_tables().await.unwrap();

    let pkg = read_package(&tmp.path().join("packages/nginx")).unwrap();
    let err = write_package(&store, &pkg, &NoDictionary).await.unwrap_err();
    match &err {
        FleetSqlError::Package { package, .. } => assert_eq!(package, "nginx"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("/processors/0/script"), "{err}");
    drop(store);

    let ro = ReadOnlyStore::open(&db).await.unwrap();
    for table in [
        "packages",
        "package_categories",
        "package_icons",
        "vars",
        "policy_templates",
        "data_streams",
        "fields",
    ] {
        let rows = ro.query(&format!("SELECT COUNT(*) AS n FROM {table}")).await.unwrap();
        assert_eq!(rows[0]["n"], json!(0), "{table}");
    }
}
