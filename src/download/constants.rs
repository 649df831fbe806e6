//! Constants for the download module.

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Responses with a status at or above this are failures.
pub const FAILURE_STATUS_THRESHOLD: u16 = 300;

/// Appended to the final path while a transfer is in progress.
pub const TEMP_SUFFIX: &str = ".part";

/// `Accept-Language` sent with media requests.
pub const ACCEPT_LANGUAGE_VALUE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
