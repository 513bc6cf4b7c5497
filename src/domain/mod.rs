// Domain layer: tabular data model and ports (storage, pipeline stages).

pub mod model;
pub mod ports;
