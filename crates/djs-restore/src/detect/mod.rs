//! Structural signature detectors.
//!
//! Each module recognizes one fragment family the obfuscators emit: the
//! string table, the decrypt function and its proxy chains, the table
//! rotation bootstrap, packer markers, dispatcher objects, scattered
//! object declarations, and self-defending guards. Detectors extract the
//! matched fragments (for the sandbox) and remove them from the tree;
//! a non-match is silent, a partial match produces a diagnostic.

pub mod decrypt;
pub mod dispatcher;
pub mod marker;
pub mod objects;
pub mod rotation;
pub mod self_defending;
pub mod shape;
pub mod string_table;
