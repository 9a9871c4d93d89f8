use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the cookie that plays the role of the device-local settings store.
pub const SETTINGS_COOKIE: &str = "user-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Ja,
    Ko,
    Zh,
    Hi,
}

impl Language {
    pub const ALL: [Language; 10] = [
        Self::En, Self::Es, Self::Fr, Self::De, Self::It,
        Self::Pt, Self::Ja, Self::Ko, Self::Zh, Self::Hi,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Ja => "ja",
            Self::Ko => "ko",
            Self::Zh => "zh",
            Self::Hi => "hi",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Ja => "Japanese",
            Self::Ko => "Korean",
            Self::Zh => "Chinese",
            Self::Hi => "Hindi",
        }
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|l| l.code() == s.trim()).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Self::Light, Self::Dark, Self::System];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::System => "System",
        }
    }

    /// Class applied to the document root; `system` is left to the stylesheet's
    /// `prefers-color-scheme` query.
    pub fn root_class(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light | Self::System => "",
        }
    }
}

impl FromStr for Theme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s.trim()).ok_or(())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown stored values fall back to the default instead of failing the whole record.
impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub theme: Theme,
}

impl UserSettings {
    /// Parses the cookie value; anything unreadable yields the defaults.
    pub fn from_cookie_value(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings cookie: {}", e);
            Self::default()
        })
    }

    pub fn to_cookie_value(&self) -> String {
        // Serialising two unit enums cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_row(row: &super::UserSettingsRow) -> Self {
        Self {
            language: row.language.as_deref().and_then(|s| s.parse().ok()).unwrap_or_default(),
            theme: row.theme.as_deref().and_then(|s| s.parse().ok()).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_english_and_system() {
        let settings = UserSettings::default();
        assert_eq!(settings.language, Language::En);
        assert_eq!(settings.theme, Theme::System);
    }

    #[test]
    fn cookie_round_trip_keeps_values() {
        let settings = UserSettings { language: Language::Ja, theme: Theme::Dark };
        let raw = settings.to_cookie_value();
        assert_eq!(raw, r#"{"language":"ja","theme":"dark"}"#);
        assert_eq!(UserSettings::from_cookie_value(&raw), settings);
    }

    #[test]
    fn unknown_values_fall_back_per_field() {
        let parsed = UserSettings::from_cookie_value(r#"{"language":"tlh","theme":"dark"}"#);
        assert_eq!(parsed.language, Language::En);
        assert_eq!(parsed.theme, Theme::Dark);
    }

    #[test]
    fn garbage_cookie_gives_defaults() {
        assert_eq!(UserSettings::from_cookie_value("not json"), UserSettings::default());
        assert_eq!(UserSettings::from_cookie_value("{}"), UserSettings::default());
    }

    #[test]
    fn remote_row_with_nulls_uses_defaults() {
        let row = super::super::UserSettingsRow {
            user_id: uuid::Uuid::new_v4(),
            language: None,
            theme: Some("light".to_string()),
            updated_at: None,
        };
        let settings = UserSettings::from_row(&row);
        assert_eq!(settings.language, Language::En);
        assert_eq!(settings.theme, Theme::Light);
    }

    #[test]
    fn only_dark_sets_the_root_class() {
        assert_eq!(Theme::Dark.root_class(), "dark");
        assert_eq!(Theme::Light.root_class(), "");
        assert_eq!(Theme::System.root_class(), "");
    }
}
