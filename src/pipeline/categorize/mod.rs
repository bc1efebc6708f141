//! Categorization Mapper: schema-restricted attribute mapping per material type.

pub mod mapper;
pub mod schema;

pub use mapper::CategorizationMapper;
pub use schema::{CategorizationSchema, SchemaAttribute};
