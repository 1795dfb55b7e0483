pub mod summary;
pub mod types;
