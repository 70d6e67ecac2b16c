pub mod errors;

pub use errors::{FlowError, Result};
