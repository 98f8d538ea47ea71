//! # Image Processing
//!
//! Profile photo ingestion: validation, reading, downsizing and JPEG re-encoding
//! of a user-selected image before it is attached to a request payload.

pub mod capabilities;
pub mod data_uri;
pub mod pipeline;

// Re-export main types for convenience
pub use capabilities::{
    FileReader, FsFileReader, ImageCrateDecoder, ImageDecoder, JpegRasterEncoder, RasterEncoder,
    SelectedFile,
};
pub use data_uri::DataUri;
pub use pipeline::{fit_within, ImageAsset, ImageKind, ImageLimits, ImagePipeline};
