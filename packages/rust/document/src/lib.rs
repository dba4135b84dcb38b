//! Package document provider for fleetsql.
//!
//! Reads package descriptor trees (YAML and JSON) into a typed model whose
//! entities keep their file, line and column of origin.
//!
//! - [`node`]: located YAML tree
//! - [`model`]: typed package entities
//! - [`reader`]: package directory layout
//! - [`fields`]: nested field flattening
//! - [`image`]: icon and screenshot header probing

pub mod fields;
pub mod image;
pub mod model;
pub mod node;
pub mod reader;

pub use fields::flatten_fields;
pub use model::*;
pub use node::{Entry, Mark, Node, Value, parse_file, parse_str};
pub use reader::{read_corpus_paths, read_package};
