//! Small shared helpers.

use chrono::Utc;

/// Timestamp format used for record `createTime`/`updateTime` columns and the
/// `created` token claim, e.g. `2025-03-14 09:26:53`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time rendered with [`TIMESTAMP_FORMAT`].
pub fn now_stamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
