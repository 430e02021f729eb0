pub mod config;
pub mod error;
pub mod record;
pub mod source_registry;
pub mod type_tree;
