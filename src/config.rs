//! Compiler configuration.
//!
//! `CompilerConfig` is deserialized from camelCase JSON (the Node binding and
//! the batch driver both pass it that way). Every field has a default so an
//! empty object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{CompilerError, CFG_INVALID_CONFIG};

// ═══════════════════════════════════════════════════════════════════════════════
// API VERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Known API versions, ascending.
pub const KNOWN_API_VERSIONS: &[u32] = &[58, 59, 60, 61, 62, 63, 64, 65];

/// First API version that rejects HTML quirks instead of warning about them.
pub const STRICT_HTML_API_VERSION: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiVersion(u32);

impl ApiVersion {
    pub fn lowest() -> Self {
        ApiVersion(KNOWN_API_VERSIONS[0])
    }

    pub fn highest() -> Self {
        ApiVersion(KNOWN_API_VERSIONS[KNOWN_API_VERSIONS.len() - 1])
    }

    /// Maps a requested version onto a known one.
    ///
    /// Missing or NaN requests get the highest version. Values below the known
    /// range clamp to the lowest, values above clamp to the highest, and
    /// anything in between floors to the nearest known version.
    pub fn from_requested(requested: Option<f64>) -> Self {
        let value = match requested {
            Some(v) if !v.is_nan() => v,
            _ => return Self::highest(),
        };
        let lowest = Self::lowest();
        let highest = Self::highest();
        if value < lowest.0 as f64 {
            return lowest;
        }
        if value >= highest.0 as f64 {
            return highest;
        }
        KNOWN_API_VERSIONS
            .iter()
            .rev()
            .find(|&&known| known as f64 <= value)
            .map(|&known| ApiVersion(known))
            .unwrap_or(lowest)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_strict_html(self) -> bool {
        self.0 >= STRICT_HTML_API_VERSION
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER MODE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Shadow,
    Light,
}

impl RenderMode {
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "shadow" => Some(RenderMode::Shadow),
            "light" => Some(RenderMode::Light),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Shadow => "shadow",
            RenderMode::Light => "light",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    pub namespace: String,
    pub component_name: String,
    /// File name used in error locations. Derived from the component when empty.
    pub file: String,
    pub api_version: Option<f64>,
    pub enable_static_content_optimization: bool,
    pub enable_dynamic_components: bool,
    pub preserve_html_comments: bool,
    pub disable_synthetic_shadow_support: bool,
    pub experimental_dynamic_directive: bool,
    pub legacy_html_quirks: Option<bool>,
    pub collect_all_errors: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            namespace: "x".to_string(),
            component_name: "component".to_string(),
            file: String::new(),
            api_version: None,
            enable_static_content_optimization: true,
            enable_dynamic_components: false,
            preserve_html_comments: false,
            disable_synthetic_shadow_support: false,
            experimental_dynamic_directive: false,
            legacy_html_quirks: None,
            collect_all_errors: false,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(json).map_err(|e| {
            CompilerError::new(
                CFG_INVALID_CONFIG,
                &format!("Invalid compiler configuration: {}", e),
                "<config>",
                e.line() as u32,
                e.column() as u32,
            )
        })
    }

    pub fn api_version(&self) -> ApiVersion {
        ApiVersion::from_requested(self.api_version)
    }

    /// Quirk tolerance: explicit setting wins, otherwise old API versions tolerate quirks.
    pub fn legacy_quirks(&self) -> bool {
        self.legacy_html_quirks
            .unwrap_or_else(|| !self.api_version().is_strict_html())
    }

    pub fn file_name(&self) -> String {
        if self.file.is_empty() {
            format!("{}/{}.html", self.namespace, self.component_name)
        } else {
            self.file.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_clamps_and_floors() {
        assert_eq!(ApiVersion::from_requested(Some(0.0)).get(), 58);
        assert_eq!(ApiVersion::from_requested(Some(-1.0)).get(), 58);
        assert_eq!(
            ApiVersion::from_requested(Some(9007199254740991.0)).get(),
            65
        );
        assert_eq!(ApiVersion::from_requested(Some(58.5)).get(), 58);
        assert_eq!(ApiVersion::from_requested(Some(61.0)).get(), 61);
        assert_eq!(ApiVersion::from_requested(Some(f64::NAN)).get(), 65);
        assert_eq!(ApiVersion::from_requested(None).get(), 65);
        assert_eq!(
            ApiVersion::from_requested(Some(f64::NEG_INFINITY)).get(),
            58
        );
    }

    #[test]
    fn test_legacy_quirks_follow_api_version() {
        let mut config = CompilerConfig {
            api_version: Some(59.0),
            ..Default::default()
        };
        assert!(config.legacy_quirks());
        config.api_version = Some(60.0);
        assert!(!config.legacy_quirks());
        config.legacy_html_quirks = Some(true);
        assert!(config.legacy_quirks());
    }

    #[test]
    fn test_config_from_camel_case_json() {
        let config = CompilerConfig::from_json(
            r#"{"namespace":"c","componentName":"card","apiVersion":62,"enableDynamicComponents":true}"#,
        )
        .unwrap();
        assert_eq!(config.namespace, "c");
        assert_eq!(config.component_name, "card");
        assert_eq!(config.api_version().get(), 62);
        assert!(config.enable_dynamic_components);
        assert!(config.enable_static_content_optimization);
        assert_eq!(config.file_name(), "c/card.html");
    }

    #[test]
    fn test_non_numeric_api_version_is_rejected() {
        let err = CompilerConfig::from_json(r#"{"apiVersion":"latest"}"#).unwrap_err();
        assert_eq!(err.code, CFG_INVALID_CONFIG);
    }
}
