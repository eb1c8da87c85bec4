//! Fixed values forming part of the wire contract with the pipelines service.
//!
//! Changing any of these changes every generated request document, so they
//! live in one place rather than scattered across the builders.

/// Name of the working data disk attached to the pipeline VM.
pub const DATA_DISK_NAME: &str = "pipesub-disk";

/// In-container mount point under which all localized files are placed.
pub const DATA_DISK_MOUNT: &str = "/mnt/data";

/// Interval string accepted by the pipelines API `timeout` fields.
pub const ONE_HOUR: &str = "3600s";
/// Interval string accepted by the pipelines API `timeout` fields.
pub const TWO_HOURS: &str = "7200s";
/// Interval string accepted by the pipelines API `timeout` fields.
pub const ONE_DAY: &str = "86400s";
/// Interval string accepted by the pipelines API `timeout` fields.
pub const SEVEN_DAYS: &str = "604800s";

/// Default size in GB for the working data disk.
pub const DEFAULT_DISK_SIZE_GB: u32 = 200;

/// Default machine type for the pipeline VM.
pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-2";

/// Default OAuth scope for the launched job.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

// Commonly used images are cached by the Cloud fleet, so generic tags load
// faster than specific tags naming potentially uncached versions.

/// Generic image suitable for shell-only user steps.
pub const DEBIAN_IMAGE: &str = "debian:stable-slim";

/// Image carrying `gsutil`, used by the generated copy steps.
pub const CLOUD_SDK_IMAGE: &str = "google/cloud-sdk:slim";
