pub mod download;
pub mod files;
