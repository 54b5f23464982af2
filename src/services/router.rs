use crate::config::DEFAULT_PRESIGNED_THRESHOLD;
use crate::models::upload::{UploadRoute, ValidFile};

/// Picks direct form upload or presigned transfer by file size.
#[derive(Debug, Clone, Copy)]
pub struct SizeRouter {
    threshold: u64,
}

impl Default for SizeRouter {
    fn default() -> Self {
        Self::new(DEFAULT_PRESIGNED_THRESHOLD)
    }
}

impl SizeRouter {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn route(&self, file: &ValidFile) -> UploadRoute {
        self.route_size(file.byte_size())
    }

    /// Exactly-at-threshold sizes stay on the direct path.
    pub fn route_size(&self, byte_size: u64) -> UploadRoute {
        if byte_size > self.threshold {
            UploadRoute::Presigned
        } else {
            UploadRoute::Direct
        }
    }
}
