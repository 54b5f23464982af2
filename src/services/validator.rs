use garde::Validate;
use std::path::Path;
use tracing::debug;

use crate::config::ValidationPolicy;
use crate::error::ValidationError;
use crate::models::upload::{PayrollFile, UploadPeriod, ValidFile};

/// Name used when sanitizing leaves nothing of the original.
const FALLBACK_STEM: &str = "payroll";

/// Checks a candidate file against type, extension and size rules.
///
/// Pure: nothing here touches the network, so an invalid submission never
/// produces a backend call.
#[derive(Debug, Clone, Default)]
pub struct FileValidator {
    policy: ValidationPolicy,
}

impl FileValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Validate a file and produce its sanitized, transmission-safe form.
    pub fn validate(&self, file: &PayrollFile) -> Result<ValidFile, ValidationError> {
        // ── MIME type ────────────────────────────────────────────────────
        if !file
            .mime_type
            .trim()
            .eq_ignore_ascii_case(&self.policy.accepted_mime_type)
        {
            return Err(ValidationError::UnsupportedType {
                expected: self.policy.accepted_mime_type.clone(),
                actual: file.mime_type.clone(),
            });
        }

        // ── Extension (a missing one is added during sanitizing) ────────
        let extension = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str());
        if let Some(ext) = extension {
            if !ext.eq_ignore_ascii_case(&self.policy.accepted_extension) {
                return Err(ValidationError::WrongExtension {
                    name: file.name.clone(),
                    expected: self.policy.accepted_extension.clone(),
                });
            }
        }

        // ── Size ─────────────────────────────────────────────────────────
        let size = file.byte_size();
        self.check_size(size)?;

        let name = sanitize_file_name(&file.name, &self.policy.accepted_extension);
        debug!(original = %file.name, sanitized = %name, size, "File accepted");

        Ok(ValidFile {
            name,
            mime_type: self.policy.accepted_mime_type.clone(),
            bytes: file.bytes.clone(),
        })
    }

    /// Size rules alone, usable on a file length before its bytes are read.
    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::Empty);
        }
        if size > self.policy.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.policy.max_file_size,
            });
        }
        Ok(())
    }

    /// Range-check the payroll period (year 2000..=2100, month 1..=12).
    pub fn validate_period(&self, period: &UploadPeriod) -> Result<(), ValidationError> {
        period
            .validate()
            .map_err(|report| ValidationError::Period(report.to_string()))
    }
}

/// Replace everything outside `[A-Za-z0-9.-]` with `_` and force the
/// expected extension.
pub fn sanitize_file_name(name: &str, extension: &str) -> String {
    let mut sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        sanitized.push_str(FALLBACK_STEM);
    }

    let suffix = format!(".{}", extension.to_ascii_lowercase());
    if !sanitized.to_ascii_lowercase().ends_with(&suffix) {
        sanitized.push_str(&suffix);
    }
    sanitized
}
