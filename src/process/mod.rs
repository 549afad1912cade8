// src/process/mod.rs
pub mod archive;
pub mod dataset;
pub mod decode;
pub mod split;

pub use archive::{resolve, ArchiveHandle};
pub use dataset::{Columns, Dataset};
pub use decode::{decode_bytes, decode_reader, DecodeOptions, Decoded, TextEncoding, TrimPolicy};
pub use split::{derive_table_id, split_archive, Split, TableEntry};
