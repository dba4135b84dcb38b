//! Package reader.
//!
//! Walks one package directory and decodes every document it recognizes into
//! the typed [`Package`] model. All listings are sorted so that two reads of
//! the same tree produce the same package.

use std::path::{Path, PathBuf};

use fleetsql_shared::{FleetSqlError, Location, Result};
use tracing::{debug, instrument};

use crate::model::{
    BuildManifest, Changelog, DataStream, DataStreamManifest, FieldsFile, Manifest, Package,
    Pipeline, SampleEvent, Transform, TransformDefinition, TransformManifest,
};
use crate::image::probe_manifest_images;
use crate::node::parse_file;

const PIPELINE_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// List `<root>/packages/*` directories in name order.
///
/// An empty listing is an error: a build over nothing is never intended.
pub fn read_corpus_paths(root: &Path) -> Result<Vec<PathBuf>> {
    let packages = root.join("packages");
    if !packages.is_dir() {
        return Err(FleetSqlError::config(format!(
            "{} is not a directory",
            packages.display()
        )));
    }

    let dirs = list_dirs(&packages)?;
    if dirs.is_empty() {
        return Err(FleetSqlError::config(format!(
            "no packages found under {}",
            packages.display()
        )));
    }
    Ok(dirs)
}

/// Read one package directory.
#[instrument(skip_all, fields(package = %dir.display()))]
pub fn read_package(dir: &Path) -> Result<Package> {
    let dir_name = base_name(dir);

    let mut manifest = Manifest::from_node(&parse_file(&dir.join("manifest.yml"))?)?;
    probe_manifest_images(dir, &mut manifest);

    let build_path = dir.join("_dev").join("build").join("build.yml");
    let build = if build_path.is_file() {
        Some(BuildManifest::from_node(&parse_file(&build_path)?)?)
    } else {
        None
    };

    let changelog_path = dir.join("changelog.yml");
    let changelog = if changelog_path.is_file() {
        Some(Changelog::from_node(&parse_file(&changelog_path)?)?)
    } else {
        None
    };

    let mut data_streams = Vec::new();
    for ds_dir in list_dirs(&dir.join("data_stream"))? {
        if ds_dir.join("manifest.yml").is_file() {
            data_streams.push(read_data_stream(&ds_dir)?);
        }
    }

    let mut transforms = Vec::new();
    for t_dir in list_dirs(&dir.join("elasticsearch").join("transform"))? {
        if t_dir.join("transform.yml").is_file() {
            transforms.push(read_transform(&t_dir)?);
        }
    }

    debug!(
        data_streams = data_streams.len(),
        transforms = transforms.len(),
        "read package"
    );

    Ok(Package {
        dir: dir.to_path_buf(),
        dir_name,
        manifest,
        build,
        changelog,
        data_streams,
        transforms,
    })
}

fn read_data_stream(dir: &Path) -> Result<DataStream> {
    let manifest = DataStreamManifest::from_node(&parse_file(&dir.join("manifest.yml"))?)?;
    let fields = read_fields_dir(&dir.join("fields"))?;

    let mut pipelines = Vec::new();
    let pipeline_dir = dir.join("elasticsearch").join("ingest_pipeline");
    for path in list_files(&pipeline_dir, PIPELINE_EXTENSIONS)? {
        pipelines.push(Pipeline::from_node(base_name(&path), &parse_file(&path)?)?);
    }

    let sample_path = dir.join("sample_event.json");
    let sample_event = if sample_path.is_file() {
        let event = parse_file(&sample_path)?;
        Some(SampleEvent {
            location: Location::new(sample_path.display().to_string(), 1, 1),
            event,
        })
    } else {
        None
    };

    Ok(DataStream {
        name: base_name(dir),
        manifest,
        fields,
        pipelines,
        sample_event,
    })
}

fn read_transform(dir: &Path) -> Result<Transform> {
    let transform_path = dir.join("transform.yml");
    let doc = parse_file(&transform_path)?;
    let location = Location::new(transform_path.display().to_string(), 1, 1);
    let definition = if doc.is_null() {
        None
    } else {
        Some(TransformDefinition::from_node(&doc)?)
    };

    let manifest_path = dir.join("manifest.yml");
    let manifest = if manifest_path.is_file() {
        Some(TransformManifest::from_node(&parse_file(&manifest_path)?)?)
    } else {
        None
    };

    Ok(Transform {
        name: base_name(dir),
        location,
        definition,
        manifest,
        fields: read_fields_dir(&dir.join("fields"))?,
    })
}

fn read_fields_dir(dir: &Path) -> Result<Vec<FieldsFile>> {
    list_files(dir, &["yml"])?
        .iter()
        .map(|path| FieldsFile::from_node(base_name(path), &parse_file(path)?))
        .collect()
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    list(dir, |p| p.is_dir())
}

fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    list(dir, |p| {
        p.is_file()
            && p
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e))
    })
}

/// Sorted entries of `dir` matching `keep`. A missing directory is empty.
fn list(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| FleetSqlError::io(dir, e))? {
        let path = entry.map_err(|e| FleetSqlError::io(dir, e))?.path();
        if keep(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn corpus_paths_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "packages/zeek/manifest.yml", "name: zeek\n");
        write(tmp.path(), "packages/apache/manifest.yml", "name: apache\n");
        write(tmp.path(), "packages/README.md", "not a package\n");

        let dirs = read_corpus_paths(tmp.path()).unwrap();
        let names: Vec<_> = dirs.iter().map(|d| base_name(d)).collect();
        assert_eq!(names, ["apache", "zeek"]);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("packages")).unwrap();
        assert!(read_corpus_paths(tmp.path()).is_err());
        assert!(read_corpus_paths(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn reads_full_package_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("nginx");
        write(&pkg, "manifest.yml", "name: nginx\ntitle: Nginx\nversion: 1.0.0\n");
        write(&pkg, "_dev/build/build.yml", "dependencies:\n  ecs:\n    reference: git@v8.11.0\n");
        write(&pkg, "changelog.yml", "- version: 1.0.0\n  changes: []\n");
        write(&pkg, "data_stream/access/manifest.yml", "title: Access logs\ntype: logs\n");
        write(&pkg, "data_stream/access/fields/fields.yml", "- name: nginx.access.code\n  type: long\n");
        write(&pkg, "data_stream/access/fields/base-fields.yml", "- name: '@timestamp'\n  type: date\n");
        write(&pkg, "data_stream/access/elasticsearch/ingest_pipeline/default.yml", "processors:\n  - set: {field: a, value: b}\n");
        write(&pkg, "data_stream/access/elasticsearch/ingest_pipeline/extra.json", r#"{"processors": [{"remove": {"field": "x"}}]}"#);
        write(&pkg, "data_stream/access/elasticsearch/ingest_pipeline/notes.txt", "ignored");
        write(&pkg, "data_stream/access/sample_event.json", r#"{"message": "hello"}"#);
        write(&pkg, "data_stream/empty/README.md", "no manifest, skipped");
        write(&pkg, "elasticsearch/transform/latest/transform.yml", "source:\n  index: logs-*\ndest:\n  index: out\n");
        write(&pkg, "elasticsearch/transform/latest/fields/fields.yml", "- name: host.name\n  type: keyword\n");

        let p = read_package(&pkg).unwrap();
        assert_eq!(p.dir_name, "nginx");
        assert_eq!(p.manifest.name, "nginx");
        assert_eq!(p.build.unwrap().ecs_reference, "git@v8.11.0");
        assert_eq!(p.changelog.unwrap().releases.len(), 1);

        assert_eq!(p.data_streams.len(), 1);
        let ds = &p.data_streams[0];
        assert_eq!(ds.name, "access");
        let files: Vec<_> = ds.fields.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(files, ["base-fields.yml", "fields.yml"]);
        let pipelines: Vec<_> = ds.pipelines.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(pipelines, ["default.yml", "extra.json"]);
        assert!(ds.sample_event.is_some());

        assert_eq!(p.transforms.len(), 1);
        assert_eq!(p.transforms[0].name, "latest");
        assert!(p.transforms[0].manifest.is_none());
        assert_eq!(p.transforms[0].fields[0].fields.len(), 1);
    }

    #[test]
    fn malformed_document_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("broken");
        write(&pkg, "manifest.yml", "name: broken\ncategories:\n  a: b\n");
        let err = read_package(&pkg).unwrap_err();
        assert!(err.to_string().contains("manifest.yml:3:"));
    }
}
