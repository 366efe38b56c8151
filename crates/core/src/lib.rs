pub mod bundle;
pub mod concepts;
pub mod error;
pub mod ids;
pub mod model;
pub mod time;
pub mod value;

pub use bundle::{Bundle, BundleItem, BundleModel, ModelType};
pub use error::CoreError;
pub use ids::*;
pub use time::Timestamp;
pub use value::Value;
