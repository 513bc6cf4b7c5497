pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use config::flow_config::FlowConfig;
pub use core::flow::{DataStream, Flow, FlowStats, Processor};
pub use core::processors::load::{load_csv, load_json, load_rows, Load};
pub use core::processors::set_type::{SetType, Transform};
pub use core::resource_matcher::{ResourceRef, ResourceSelector};
pub use core::schema_validator::{ErrorContext, OnError};
pub use core::{etl::EtlEngine, pipeline::FlowPipeline};
pub use domain::model::{
    Constraints, Field, FieldType, Package, ResourceDescriptor, Row, Schema, TransformResult,
};
pub use utils::error::{EtlError, Result};
