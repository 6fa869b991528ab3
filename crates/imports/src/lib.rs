pub mod handler;
pub mod importer;
pub mod models;
pub mod normalizer;
pub mod reader;
