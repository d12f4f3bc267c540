pub mod store;
pub mod types;

pub use store::ParamStore;
pub use types::{ParamDef, ParamValue};
