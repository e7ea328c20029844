pub mod dedup;
pub mod etl;
pub mod grid;
pub mod grouper;
pub mod merger;
pub mod scorer;
pub mod stats;

pub use crate::domain::model::{LocationRecord, MergedRecord, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
