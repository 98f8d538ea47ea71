pub mod client;
pub mod common;
pub mod error;
pub mod processing;
pub mod session;

pub use client::{ClientCore, ClientMiddleware};
pub use error::{ApiError, IngestError};
pub use processing::ImagePipeline;
pub use session::Session;
