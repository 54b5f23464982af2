//! Payroll batch upload client
//!
//! Validates payroll PDFs, routes small files to a direct multipart upload
//! and large ones through a presigned object-storage URL, launches the
//! backend processing job and polls it to completion with adaptive backoff,
//! stall detection and a global time ceiling.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
