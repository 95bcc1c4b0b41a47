//! Session ids

use uuid::Uuid;

/// Fresh opaque session id for a new socket
#[must_use]
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}
