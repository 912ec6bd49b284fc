//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [base] Section Defaults
// ============================================================================

pub mod base {
    pub fn title() -> String {
        "Meeting Marketer Pro".into()
    }

    pub fn url() -> String {
        "https://meetingmanagerpro.com".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5277
    }
}

// ============================================================================
// [store] Section Defaults
// ============================================================================

pub mod store {
    use std::path::PathBuf;

    pub fn path() -> PathBuf {
        "leadsite.db".into()
    }

    pub fn load_timeout_ms() -> u64 {
        5000
    }

    pub fn persist_timeout_ms() -> u64 {
        5000
    }
}

// ============================================================================
// [auth] Section Defaults
// ============================================================================

pub mod auth {
    pub fn session_ttl_hours() -> u32 {
        24
    }

    pub fn reset_ttl_minutes() -> u32 {
        60
    }

    pub fn min_password_len() -> usize {
        8
    }
}
