pub use crate::app::pipelines::flow_pipeline::FlowPipeline;
