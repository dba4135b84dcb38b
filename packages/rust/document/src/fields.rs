//! Field flattening.
//!
//! Turns nested field definitions into a flat list with dotted names.

use crate::model::{Field, FieldsFile};

/// Flatten every definition of `files`, in file order.
///
/// `group` fields (and untyped fields with children) only contribute a name
/// prefix. Typed parents such as `object` or `nested` are kept, followed by
/// their children. Each flattened field records its declaring file name.
pub fn flatten_fields(files: &[FieldsFile]) -> Vec<Field> {
    let mut out = Vec::new();
    for file in files {
        for field in &file.fields {
            flatten_into(field, "", &file.file_name, &mut out);
        }
    }
    out
}

fn flatten_into(field: &Field, prefix: &str, file_name: &str, out: &mut Vec<Field>) {
    let name = if prefix.is_empty() {
        field.name.clone()
    } else {
        format!("{prefix}.{}", field.name)
    };

    let is_group = field.kind == "group" || (field.kind.is_empty() && !field.fields.is_empty());
    if !is_group {
        out.push(Field {
            name: name.clone(),
            file_name: file_name.to_string(),
            fields: Vec::new(),
            ..field.clone()
        });
    }

    for child in &field.fields {
        flatten_into(child, &name, file_name, out);
    }
}
