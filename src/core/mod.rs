pub mod cast;
pub mod dump;
pub mod etl;
pub mod flow;
pub mod pipeline;
pub mod processors;
pub mod resource_matcher;
pub mod schema_validator;

pub use crate::domain::model::{Package, Row, SourceData, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
