pub mod error;
pub mod medium;
pub mod options;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::MkfatError;
pub use medium::{FileMedium, MemoryMedium, OutputMedium};
pub use options::ImageOptions;
pub use source::{ContentSource, FileSource, ReaderSource};
