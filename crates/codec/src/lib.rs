//! adf codec: the property-bag projector plus expand/flatten pairs for the
//! typed sub-structures (parameters, annotations, folders, dataset
//! locations, compression, secret references) and the diff-suppression
//! comparators.

#![forbid(unsafe_code)]

pub mod compression;
pub mod connstr;
pub mod location;
pub mod projector;
pub mod secret;
pub mod substructure;

pub use compression::{expand_compression, flatten_compression, DatasetCompression};
pub use connstr::connection_strings_equivalent;
pub use location::DatasetLocation;
pub use projector::{merge, project, FieldShape, NamedField, Projection};
pub use secret::{expand_secret, flatten_secret, SecretReference};
pub use substructure::{
    expand_annotations, expand_folder, expand_parameters, flatten_annotations, flatten_folder,
    flatten_parameters,
};
