//! API constants

/// Route prefix under which the local storage root is served
pub const ASSETS_PATH: &str = "/assets";

/// Allowance on top of the file cap for multipart boundaries, headers and
/// small text fields. The exact cap is enforced on the file bytes.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Default `RUST_LOG` filter
pub const DEFAULT_LOG_FILTER: &str = "tubely=debug,tower_http=debug";
