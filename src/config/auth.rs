//! `[auth]` section configuration.

use super::defaults;
use crate::auth::AuthPolicy;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[auth]` section in leadsite.toml - session and password rules.
///
/// # Example
/// ```toml
/// [auth]
/// session_ttl_hours = 8
/// reset_ttl_minutes = 30
/// min_password_len = 12
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default = "defaults::auth::session_ttl_hours")]
    #[educe(Default = defaults::auth::session_ttl_hours())]
    pub session_ttl_hours: u32,

    /// Lifetime of a password reset link.
    #[serde(default = "defaults::auth::reset_ttl_minutes")]
    #[educe(Default = defaults::auth::reset_ttl_minutes())]
    pub reset_ttl_minutes: u32,

    /// Shortest accepted password (at least 8).
    #[serde(default = "defaults::auth::min_password_len")]
    #[educe(Default = defaults::auth::min_password_len())]
    pub min_password_len: usize,
}

impl AuthConfig {
    pub fn policy(&self) -> AuthPolicy {
        AuthPolicy {
            session_ttl: chrono::Duration::hours(i64::from(self.session_ttl_hours)),
            reset_ttl: chrono::Duration::minutes(i64::from(self.reset_ttl_minutes)),
            min_password_len: self.min_password_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_auth_policy() {
        let config = r#"
            [auth]
            session_ttl_hours = 2
            min_password_len = 12
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();
        let policy = config.auth.policy();

        assert_eq!(policy.session_ttl, chrono::Duration::hours(2));
        assert_eq!(policy.reset_ttl, chrono::Duration::minutes(60));
        assert_eq!(policy.min_password_len, 12);
    }
}
