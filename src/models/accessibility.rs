use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

const COLORBLIND_MODES: [&str; 4] = ["none", "protanopia", "deuteranopia", "tritanopia"];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessibilitySettings {
    pub user_id: Uuid,
    pub high_contrast: bool,
    pub reduced_motion: bool,
    pub screen_reader_hints: bool,
    pub caption_voice_chat: bool,
    pub font_scale: f64,
    pub colorblind_mode: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AccessibilitySettings {
    /// Settings for a user who never saved any.
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            high_contrast: false,
            reduced_motion: false,
            screen_reader_hints: false,
            caption_voice_chat: false,
            font_scale: 1.0,
            colorblind_mode: "none".to_string(),
            updated_at: None,
        }
    }
}

pub fn validate_colorblind_mode(mode: &str) -> Result<(), ValidationError> {
    if !COLORBLIND_MODES.contains(&mode) {
        return Err(ValidationError::new("colorblind_mode"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAccessibilityRequest {
    #[serde(default)]
    pub high_contrast: bool,
    #[serde(default)]
    pub reduced_motion: bool,
    #[serde(default)]
    pub screen_reader_hints: bool,
    #[serde(default)]
    pub caption_voice_chat: bool,
    #[serde(default = "default_font_scale")]
    #[validate(range(min = 0.75, max = 2.0))]
    pub font_scale: f64,
    #[serde(default = "default_colorblind_mode")]
    #[validate(custom(function = "validate_colorblind_mode"))]
    pub colorblind_mode: String,
}

fn default_font_scale() -> f64 {
    1.0
}

fn default_colorblind_mode() -> String {
    "none".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let id = Uuid::new_v4();
        let settings = AccessibilitySettings::defaults_for(id);
        assert_eq!(settings.user_id, id);
        assert_eq!(settings.font_scale, 1.0);
        assert_eq!(settings.colorblind_mode, "none");
    }

    #[test]
    fn test_font_scale_bounds() {
        let mut req: UpdateAccessibilityRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_ok());
        req.font_scale = 0.5;
        assert!(req.validate().is_err());
        req.font_scale = 2.0;
        assert!(req.validate().is_ok());
        req.font_scale = 2.01;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_colorblind_modes() {
        let req: UpdateAccessibilityRequest =
            serde_json::from_str(r#"{"colorblind_mode":"tritanopia","high_contrast":true}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.high_contrast);

        let req: UpdateAccessibilityRequest =
            serde_json::from_str(r#"{"colorblind_mode":"sepia"}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
