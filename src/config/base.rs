//! `[base]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[base]` section in leadsite.toml - site identity.
///
/// # Example
/// ```toml
/// [base]
/// title = "Meeting Marketer Pro"
/// url = "https://meetingmanagerpro.com"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    /// Site title shown in the header and browser tab.
    #[serde(default = "defaults::base::title")]
    #[educe(Default = defaults::base::title())]
    pub title: String,

    /// Public URL, used to build password reset links.
    #[serde(default = "defaults::base::url")]
    #[educe(Default = defaults::base::url())]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_base_config_full() {
        let config = r#"
            [base]
            title = "Lead Engine"
            url = "https://leads.example.com"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.base.title, "Lead Engine");
        assert_eq!(config.base.url, "https://leads.example.com");
    }

    #[test]
    fn test_base_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.base.title, "Meeting Marketer Pro");
        assert_eq!(config.base.url, "https://meetingmanagerpro.com");
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [base]
            author = "nobody"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }
}
