pub mod detected;
pub mod entity;
pub mod pattern;
pub mod similarity;
pub mod text;

mod error;

pub use error::{Error, Result};
