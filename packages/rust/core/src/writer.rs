//! Transactional package writer.
//!
//! One package is written in one transaction: the package row first, then
//! every owned entity parents-first, threading generated keys into children.
//! Any failure rolls the whole package back.

use fleetsql_document::{FieldsFile, Package, Var, flatten_fields};
use fleetsql_shared::{FleetSqlError, PackageStats, Result};
use fleetsql_storage::rows::{
    BuildManifestRow, ChangelogRow, DataStreamFieldRow, DiscoveryFieldRow, PackageCapabilityRow,
    PackageCategoryRow, PackageVarRow, PolicyTemplateCategoryRow, PolicyTemplateDataStreamRow,
    PolicyTemplateInputVarRow, PolicyTemplateVarRow, SampleEventRow, StreamVarRow, TransformDestAliasRow, TransformFieldRow,
    VarOptionRow,
};
use fleetsql_storage::{Store, StoreTx};
use tracing::{debug, instrument, warn};

use crate::ecs::FieldDictionary;
use crate::flatten::flatten_processors;
use crate::projector::{self, text};

/// Write `pkg` in its own transaction.
///
/// Errors are wrapped with the package's directory name.
#[instrument(skip_all, fields(package = %pkg.dir_name))]
pub async fn write_package(
    store: &Store,
    pkg: &Package,
    dictionary: &dyn FieldDictionary,
) -> Result<PackageStats> {
    let tx = store
        .transaction()
        .await
        .map_err(|e| FleetSqlError::package(&pkg.dir_name, e))?;

    match insert_package(&tx, pkg, dictionary).await {
        Ok(stats) => {
            tx.commit()
                .await
                .map_err(|e| FleetSqlError::package(&pkg.dir_name, e))?;
            debug!(?stats, "package committed");
            Ok(stats)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(FleetSqlError::package(&pkg.dir_name, e))
        }
    }
}

/// ECS reference of the package with any `git@` prefix removed.
pub fn ecs_reference(pkg: &Package) -> Option<&str> {
    let reference = &pkg.build.as_ref()?.ecs_reference;
    let reference = reference.strip_prefix("git@").unwrap_or(reference);
    (!reference.is_empty()).then_some(reference)
}

async fn insert_package(
    tx: &StoreTx,
    pkg: &Package,
    dictionary: &dyn FieldDictionary,
) -> Result<PackageStats> {
    let mut stats = PackageStats::default();
    let m = &pkg.manifest;
    let package_id = tx.insert(&projector::package_row(pkg)).await?;

    for category in &m.categories {
        tx.insert(&PackageCategoryRow {
            package_id,
            category: text(category),
        })
        .await?;
    }
    for capability in &m.conditions_elastic_capabilities {
        tx.insert(&PackageCapabilityRow {
            package_id,
            capability: text(capability),
        })
        .await?;
    }
    for icon in &m.icons {
        tx.insert(&projector::icon_row(package_id, icon)).await?;
    }
    for screenshot in &m.screenshots {
        tx.insert(&projector::screenshot_row(package_id, screenshot))
            .await?;
    }
    for name in &m.discovery_fields {
        tx.insert(&DiscoveryFieldRow {
            package_id,
            name: text(name),
        })
        .await?;
    }

    if let Some(build) = &pkg.build {
        tx.insert(&BuildManifestRow {
            package_id,
            dependencies_ecs_reference: text(&build.ecs_reference),
            dependencies_ecs_import_mappings: build.ecs_import_mappings,
            file_path: build.location.file.clone(),
        })
        .await?;
    }

    for var in &m.vars {
        let var_id = insert_var(tx, var).await?;
        tx.insert(&PackageVarRow { package_id, var_id }).await?;
        stats.vars += 1;
    }

    // Policy templates.
    for pt in &m.policy_templates {
        let policy_template_id = tx
            .insert(&projector::policy_template_row(package_id, pt))
            .await?;

        for category in &pt.categories {
            tx.insert(&PolicyTemplateCategoryRow {
                policy_template_id,
                category: text(category),
            })
            .await?;
        }
        for name in &pt.data_streams {
            tx.insert(&PolicyTemplateDataStreamRow {
                policy_template_id,
                data_stream_name: text(name),
            })
            .await?;
        }
        for icon in &pt.icons {
            tx.insert(&projector::policy_template_icon_row(policy_template_id, icon))
                .await?;
        }
        for screenshot in &pt.screenshots {
            tx.insert(&projector::policy_template_screenshot_row(
                policy_template_id,
                screenshot,
            ))
            .await?;
        }
        for var in &pt.vars {
            let var_id = insert_var(tx, var).await?;
            tx.insert(&PolicyTemplateVarRow {
                policy_template_id,
                var_id,
            })
            .await?;
            stats.vars += 1;
        }
        for input in &pt.inputs {
            let policy_template_input_id = tx
                .insert(&projector::policy_template_input_row(policy_template_id, input))
                .await?;
            for var in &input.vars {
                let var_id = insert_var(tx, var).await?;
                tx.insert(&PolicyTemplateInputVarRow {
                    policy_template_input_id,
                    var_id,
                })
                .await?;
                stats.vars += 1;
            }
        }
    }

    let reference = ecs_reference(pkg);

    // Data streams.
    for ds in &pkg.data_streams {
        let data_stream_id = tx.insert(&projector::data_stream_row(package_id, ds)?).await?;
        stats.data_streams += 1;

        for stream in &ds.manifest.streams {
            let stream_id = tx.insert(&projector::stream_row(data_stream_id, stream)).await?;
            for var in &stream.vars {
                let var_id = insert_var(tx, var).await?;
                tx.insert(&StreamVarRow { stream_id, var_id }).await?;
                stats.vars += 1;
            }
        }

        for (field_id, file_name) in insert_fields(tx, &ds.fields, reference, dictionary).await? {
            tx.insert(&DataStreamFieldRow {
                data_stream_id,
                field_id,
                fields_file_name: text(&file_name),
            })
            .await?;
            stats.fields += 1;
        }

        for pipeline in &ds.pipelines {
            let ingest_pipeline_id = tx
                .insert(&projector::pipeline_row(data_stream_id, pipeline)?)
                .await?;
            stats.pipelines += 1;

            let mut flat = flatten_processors(&pipeline.processors, "/processors")?;
            flat.extend(flatten_processors(&pipeline.on_failure, "/on_failure")?);
            for p in &flat {
                tx.insert(&projector::processor_row(ingest_pipeline_id, p))
                    .await?;
            }
            stats.processors += flat.len();
        }

        if let Some(sample) = &ds.sample_event {
            tx.insert(&SampleEventRow {
                data_stream_id,
                event: projector::json_node(Some(&sample.event))?,
                file_path: sample.location.file.clone(),
            })
            .await?;
        }
    }

    // Transforms.
    for t in &pkg.transforms {
        let transform_id = tx.insert(&projector::transform_row(package_id, t)?).await?;
        stats.transforms += 1;

        if let Some(dest) = t.definition.as_ref().and_then(|d| d.dest.as_ref()) {
            for alias in &dest.aliases {
                tx.insert(&TransformDestAliasRow {
                    transform_id,
                    alias: text(&alias.alias),
                    move_on_creation: alias.move_on_creation,
                })
                .await?;
            }
        }

        for (field_id, file_name) in insert_fields(tx, &t.fields, reference, dictionary).await? {
            tx.insert(&TransformFieldRow {
                transform_id,
                field_id,
                fields_file_name: text(&file_name),
            })
            .await?;
            stats.fields += 1;
        }
    }

    // Changelog.
    if let Some(changelog) = &pkg.changelog {
        let changelog_id = tx
            .insert(&ChangelogRow {
                package_id,
                file_path: changelog.location.file.clone(),
            })
            .await?;
        for release in &changelog.releases {
            let release_id = tx.insert(&projector::release_row(changelog_id, release)).await?;
            for change in &release.changes {
                tx.insert(&projector::change_row(release_id, change)).await?;
            }
        }
    }

    Ok(stats)
}

async fn insert_var(tx: &StoreTx, var: &Var) -> Result<i64> {
    let var_id = tx.insert(&projector::var_row(var)?).await?;
    for option in &var.options {
        tx.insert(&VarOptionRow {
            var_id,
            value: text(&option.value),
            text: text(&option.text),
        })
        .await?;
    }
    Ok(var_id)
}

/// Flatten and insert fields. Returns each field's key with its file name.
async fn insert_fields(
    tx: &StoreTx,
    files: &[FieldsFile],
    reference: Option<&str>,
    dictionary: &dyn FieldDictionary,
) -> Result<Vec<(i64, String)>> {
    let mut out = Vec::new();
    for field in flatten_fields(files) {
        let external = match reference {
            Some(r) if field.external == "ecs" => dictionary.lookup(r, &field.name),
            _ => None,
        };
        let field_id = tx
            .insert(&projector::field_row(
                &field,
                external.as_ref(),
                dictionary.enabled(),
            )?)
            .await?;
        out.push((field_id, field.file_name));
    }
    Ok(out)
}
