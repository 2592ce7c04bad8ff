//! Host-side construction errors.
//!
//! Nothing here is raised by the running machine: emulated failures are
//! status bits the guest software reads.

use thiserror::Error;
use wd1772::ImageError;

use crate::config::MAX_EXTERNAL_MB;

#[derive(Debug, Error)]
pub enum SamError {
    #[error("ROM must be {expected} bytes, got {actual}")]
    RomSize { expected: usize, actual: usize },
    #[error("external memory is limited to {MAX_EXTERNAL_MB} MB, got {0}")]
    ExternalMemory(u8),
    #[error("drive {0} is not fitted")]
    NoDrive(u8),
    #[error("disk image: {0}")]
    Image(#[from] ImageError),
}
