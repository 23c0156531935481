use crate::keypad::Keypad;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub keypad: KeypadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    #[serde(default = "TypingConfig::default_debounce")]
    pub debounce_ms: u64,
}

impl TypingConfig {
    fn default_debounce() -> u64 { 450 }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { debounce_ms: 450 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Marker drawn after the composed text. Empty disables it.
    #[serde(default = "DisplayConfig::default_caret")]
    pub caret: String,
}

impl DisplayConfig {
    fn default_caret() -> String { "|".into() }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { caret: "|".into() }
    }
}

/// Per-key replacements for the built-in table, keyed by key label.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeypadConfig {
    #[serde(flatten)]
    pub overrides: HashMap<String, Vec<char>>,
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("multitap")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "parsing config TOML")
    }

    pub fn load_keypad(&self) -> Result<Keypad> {
        Keypad::with_overrides(&self.keypad.overrides).context("applying [keypad] overrides")
    }
}

pub fn socket_path() -> PathBuf {
    // MULTITAP_SOCK overrides for testing.
    if let Ok(path) = std::env::var("MULTITAP_SOCK") {
        return PathBuf::from(path);
    }
    PathBuf::from("/run/multitap/multitap.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::Key;

    // --- defaults ---

    #[test]
    fn default_debounce_is_450ms() {
        let config = Config::default();
        assert_eq!(config.typing.debounce_ms, 450);
        assert_eq!(config.typing.debounce(), Duration::from_millis(450));
    }

    #[test]
    fn default_caret_is_bar() {
        assert_eq!(Config::default().display.caret, "|");
    }

    #[test]
    fn default_has_no_overrides() {
        let config = Config::default();
        assert!(config.keypad.overrides.is_empty());
        assert_eq!(config.load_keypad().unwrap(), Keypad::builtin());
    }

    // --- TOML parsing ---

    #[test]
    fn parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.typing.debounce_ms, 450);
        assert_eq!(config.display.caret, "|");
        assert!(config.keypad.overrides.is_empty());
    }

    #[test]
    fn parse_custom_debounce() {
        let toml = r#"
[typing]
debounce_ms = 800
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.typing.debounce_ms, 800);
    }

    #[test]
    fn parse_empty_caret() {
        let toml = r#"
[display]
caret = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.display.caret, "");
    }

    #[test]
    fn parse_keypad_overrides() {
        let toml = r#"
[keypad]
"0" = ["0", " "]
"1" = [".", "@", "1"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let keypad = config.load_keypad().unwrap();
        assert_eq!(keypad.candidates_for(Key::Zero), &['0', ' ']);
        assert_eq!(keypad.candidates_for(Key::One), &['.', '@', '1']);
        assert_eq!(keypad.candidates_for(Key::Two), &['a', 'b', 'c', '2']);
    }

    #[test]
    fn multi_char_candidate_is_a_parse_error() {
        let toml = r#"
[keypad]
"2" = ["ab"]
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn bad_override_key_fails_to_load() {
        let toml = r#"
[keypad]
"x" = ["x"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.load_keypad().is_err());
    }

    #[test]
    fn load_from_missing_file_fails() {
        assert!(Config::load_from(Path::new("/nonexistent/multitap/config.toml")).is_err());
    }

    #[test]
    fn socket_path_ends_with_multitap_sock() {
        let path = socket_path();
        assert_eq!(path.file_name().unwrap(), "multitap.sock");
    }
}
