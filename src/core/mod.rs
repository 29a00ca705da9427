pub mod etl;
pub mod histogram;
pub mod montage;
pub mod pipeline;
pub mod well;

pub use crate::domain::model::TransformResult;
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
