pub mod load;
pub mod set_type;

pub use load::{load_csv, load_json, load_rows, load_source, Load};
pub use set_type::{builtin_transform, SetType, Transform};
