//! Image upload pipeline: format detection, conversion to WebP and sequential storage.

pub mod convert;
pub mod format;
pub mod upload;

pub use convert::{ConversionError, ImageConverter};
pub use format::ImageFormat;
pub use upload::{ImagePipeline, IncomingFile, UploadProgress, UploadStatus};
