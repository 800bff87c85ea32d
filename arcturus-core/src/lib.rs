pub mod error;
pub mod models;

pub use error::{ArcturusError, Result};
pub use models::*;
