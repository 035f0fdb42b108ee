//! Timing and configuration constants for moshlink.

use std::time::Duration;

// =============================================================================
// Driver Loop Timing
// =============================================================================

/// Upper bound on the blocking wait while no remote state has arrived yet.
///
/// Keeps the first frame and the `Connected` event prompt even when the
/// transport suggests a long idle wait.
pub const CONNECTING_WAIT_CAP: Duration = Duration::from_millis(250);

/// Wait used when the transport reports a negative wait time.
pub const FALLBACK_WAIT: Duration = Duration::from_millis(250);

/// Pause after a recoverable network failure before the next iteration.
pub const NETWORK_ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// Delay applied to outgoing keystrokes by the transport.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1);

// =============================================================================
// Validation Messages
// =============================================================================

/// Reported when the endpoint address, port or session key is absent.
pub const MSG_MISSING_ENDPOINT: &str = "Missing ip/port/key";

/// Reported when the initial column or row count is not positive.
pub const MSG_INVALID_SIZE: &str = "Invalid cols/rows";

/// Reported when no output callback was supplied.
pub const MSG_MISSING_OUTPUT: &str = "Missing output callback";
