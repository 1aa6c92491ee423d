//! Editing session configuration.
//!
//! Timing windows, history size and per-type editor defaults. Configuration
//! can be loaded from a file, from environment variables, or built in code.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use annotation_model::Rgb;
use serde::Serialize;

/// Default look of newly created editors, per editor type.
///
/// Owned by the UI manager. Changing a parameter while nothing is selected
/// updates these values instead of an editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorDefaults {
    pub free_text_color: Rgb,
    /// Font size in points
    pub free_text_size: f64,
    pub ink_color: Rgb,
    /// Stroke width in points
    pub ink_thickness: f64,
    pub ink_opacity: f64,
    pub highlight_color: Rgb,
    /// Free highlight stroke width in points
    pub highlight_thickness: f64,
    pub highlight_opacity: f64,
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            free_text_color: Rgb::BLACK,
            free_text_size: 10.0,
            ink_color: Rgb::BLACK,
            ink_thickness: 1.0,
            ink_opacity: 1.0,
            highlight_color: Rgb::YELLOW,
            highlight_thickness: 12.0,
            highlight_opacity: 1.0,
        }
    }
}

/// Configuration for an editing session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorConfig {
    /// Maximum number of undo steps kept
    pub history_capacity: usize,
    /// Quiet period after the last nudge before one undo step is recorded
    pub translation_coalesce_ms: u64,
    /// Delay before ink editors are redrawn after a viewport change
    pub ink_redraw_delay_ms: u64,
    /// Smallest editor side reachable by resizing, in screen pixels
    pub min_editor_size_px: f64,
    pub translate_small_px: f64,
    pub translate_big_px: f64,
    pub defaults: EditorDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 128,
            translation_coalesce_ms: 1000,
            ink_redraw_delay_ms: 200,
            min_editor_size_px: 16.0,
            translate_small_px: 1.0,
            translate_big_px: 10.0,
            defaults: EditorDefaults::default(),
        }
    }
}

impl EditorConfig {
    /// Sets the number of undo steps kept.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the translation coalescing window in milliseconds.
    pub fn with_translation_coalesce_ms(mut self, ms: u64) -> Self {
        self.translation_coalesce_ms = ms;
        self
    }

    /// Sets the ink redraw delay in milliseconds.
    pub fn with_ink_redraw_delay_ms(mut self, ms: u64) -> Self {
        self.ink_redraw_delay_ms = ms;
        self
    }

    pub fn with_defaults(mut self, defaults: EditorDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn translation_coalesce(&self) -> Duration {
        Duration::from_millis(self.translation_coalesce_ms)
    }

    pub fn ink_redraw_delay(&self) -> Duration {
        Duration::from_millis(self.ink_redraw_delay_ms)
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_ANNOTATOR_HISTORY_CAPACITY`: undo steps kept (default: 128)
    /// - `PDF_ANNOTATOR_TRANSLATION_COALESCE_MS`: nudge coalescing window (default: 1000)
    /// - `PDF_ANNOTATOR_INK_REDRAW_MS`: ink redraw delay (default: 200)
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PDF_ANNOTATOR_HISTORY_CAPACITY") {
            config.history_capacity = parse_capacity("PDF_ANNOTATOR_HISTORY_CAPACITY", &val)?;
        }

        if let Ok(val) = std::env::var("PDF_ANNOTATOR_TRANSLATION_COALESCE_MS") {
            config.translation_coalesce_ms = val.parse().map_err(|_| {
                ConfigError::InvalidValue("PDF_ANNOTATOR_TRANSLATION_COALESCE_MS".to_string())
            })?;
        }

        if let Ok(val) = std::env::var("PDF_ANNOTATOR_INK_REDRAW_MS") {
            config.ink_redraw_delay_ms = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PDF_ANNOTATOR_INK_REDRAW_MS".to_string()))?;
        }

        Ok(config)
    }

    /// Loads configuration from a TOML-style `key = value` file.
    ///
    /// Expected file format:
    /// ```toml
    /// history_capacity = 128
    /// translation_coalesce_ms = 1000
    /// ink_redraw_delay_ms = 200
    /// ink_color = "#000000"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML-style string. Unknown keys are ignored.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in toml_str.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            let defaults = &mut config.defaults;

            match key {
                "history_capacity" => config.history_capacity = parse_capacity(key, value)?,
                "translation_coalesce_ms" => config.translation_coalesce_ms = parse(key, value)?,
                "ink_redraw_delay_ms" => config.ink_redraw_delay_ms = parse(key, value)?,
                "min_editor_size_px" => config.min_editor_size_px = parse(key, value)?,
                "translate_small_px" => config.translate_small_px = parse(key, value)?,
                "translate_big_px" => config.translate_big_px = parse(key, value)?,
                "free_text_color" => defaults.free_text_color = parse_color(key, value)?,
                "free_text_size" => defaults.free_text_size = parse(key, value)?,
                "ink_color" => defaults.ink_color = parse_color(key, value)?,
                "ink_thickness" => defaults.ink_thickness = parse(key, value)?,
                "ink_opacity" => defaults.ink_opacity = parse(key, value)?,
                "highlight_color" => defaults.highlight_color = parse_color(key, value)?,
                "highlight_thickness" => defaults.highlight_thickness = parse(key, value)?,
                "highlight_opacity" => defaults.highlight_opacity = parse(key, value)?,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Saves configuration to a TOML-style file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml())?;
        Ok(())
    }

    pub fn to_toml(&self) -> String {
        let d = &self.defaults;
        format!(
            "# PDF Annotator configuration\n\
             history_capacity = {}\n\
             translation_coalesce_ms = {}\n\
             ink_redraw_delay_ms = {}\n\
             min_editor_size_px = {}\n\
             translate_small_px = {}\n\
             translate_big_px = {}\n\
             free_text_color = \"{}\"\n\
             free_text_size = {}\n\
             ink_color = \"{}\"\n\
             ink_thickness = {}\n\
             ink_opacity = {}\n\
             highlight_color = \"{}\"\n\
             highlight_thickness = {}\n\
             highlight_opacity = {}\n",
            self.history_capacity,
            self.translation_coalesce_ms,
            self.ink_redraw_delay_ms,
            self.min_editor_size_px,
            self.translate_small_px,
            self.translate_big_px,
            d.free_text_color.to_hex(),
            d.free_text_size,
            d.ink_color.to_hex(),
            d.ink_thickness,
            d.ink_opacity,
            d.highlight_color.to_hex(),
            d.highlight_thickness,
            d.highlight_opacity,
        )
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_capacity(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(capacity) if capacity > 0 => Ok(capacity),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

fn parse_color(key: &str, value: &str) -> Result<Rgb, ConfigError> {
    Rgb::from_hex(value).map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_KEYS: [&str; 3] = [
        "PDF_ANNOTATOR_HISTORY_CAPACITY",
        "PDF_ANNOTATOR_TRANSLATION_COALESCE_MS",
        "PDF_ANNOTATOR_INK_REDRAW_MS",
    ];

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.history_capacity, 128);
        assert_eq!(config.translation_coalesce(), Duration::from_millis(1000));
        assert_eq!(config.ink_redraw_delay(), Duration::from_millis(200));
        assert_eq!(config.defaults.free_text_size, 10.0);
    }

    #[test]
    fn test_builder_methods() {
        let config = EditorConfig::default()
            .with_history_capacity(3)
            .with_translation_coalesce_ms(50)
            .with_ink_redraw_delay_ms(10);

        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.translation_coalesce_ms, 50);
        assert_eq!(config.ink_redraw_delay_ms, 10);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_KEYS);

        env::set_var("PDF_ANNOTATOR_HISTORY_CAPACITY", "16");
        env::set_var("PDF_ANNOTATOR_TRANSLATION_COALESCE_MS", "250");
        env::set_var("PDF_ANNOTATOR_INK_REDRAW_MS", "50");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.history_capacity, 16);
        assert_eq!(config.translation_coalesce_ms, 250);
        assert_eq!(config.ink_redraw_delay_ms, 50);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_capacity() {
        let _guard = EnvGuard::new(&ENV_KEYS);

        env::set_var("PDF_ANNOTATOR_HISTORY_CAPACITY", "0");
        assert!(EditorConfig::from_env().is_err());

        env::set_var("PDF_ANNOTATOR_HISTORY_CAPACITY", "lots");
        assert!(EditorConfig::from_env().is_err());
    }

    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in var_names {
                env::remove_var(name);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = EditorConfig::default().with_history_capacity(64);
        config.defaults.ink_color = Rgb::new(255, 0, 0);
        config.defaults.highlight_thickness = 8.5;

        let parsed = EditorConfig::from_toml(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_toml_ignores_comments_and_unknown_keys() {
        let config = EditorConfig::from_toml(
            "# comment\n\nink_redraw_delay_ms = 75\nunknown = 1\nink_color = \"#00ff00\"\n",
        )
        .unwrap();

        assert_eq!(config.ink_redraw_delay_ms, 75);
        assert_eq!(config.defaults.ink_color, Rgb::new(0, 255, 0));
        assert_eq!(config.history_capacity, 128);
    }

    #[test]
    fn test_from_toml_invalid_value() {
        let err = EditorConfig::from_toml("ink_thickness = thick").unwrap_err();
        assert!(err.to_string().contains("ink_thickness"));
    }

    #[test]
    fn test_file_roundtrip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("annotator.toml");

        let config = EditorConfig::default().with_translation_coalesce_ms(400);
        config.save_to_file(&path).expect("save should succeed");

        assert_eq!(EditorConfig::from_file(&path).unwrap(), config);
    }
}
