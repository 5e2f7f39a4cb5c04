//! User-selectable caption settings: target language and font size.
//!
//! Values are validated against the offered option lists. A rejected value
//! leaves the previous one in place and logs a warning.

use log::{info, warn};

use crate::error::ConfigError;

const DEFAULT_LANGUAGE: &str = "English";
const DEFAULT_FONT_SIZE: u8 = 12;

/// Current selection plus the lists it is chosen from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    languages: Vec<String>,
    font_sizes: Vec<u8>,
    language: String,
    font_size: u8,
}

impl Settings {
    /// Build from option lists. Defaults to English / 12 when offered,
    /// otherwise to the first entry of each list.
    pub fn new(languages: Vec<String>, font_sizes: Vec<u8>) -> Result<Self, ConfigError> {
        let language = languages
            .iter()
            .find(|l| l.as_str() == DEFAULT_LANGUAGE)
            .or_else(|| languages.first())
            .cloned()
            .ok_or(ConfigError::EmptyOptions)?;
        let font_size = font_sizes
            .iter()
            .copied()
            .find(|&f| f == DEFAULT_FONT_SIZE)
            .or_else(|| font_sizes.first().copied())
            .ok_or(ConfigError::EmptyOptions)?;

        Ok(Self {
            languages,
            font_sizes,
            language,
            font_size,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn font_size(&self) -> u8 {
        self.font_size
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn font_sizes(&self) -> &[u8] {
        &self.font_sizes
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), ConfigError> {
        if !self.languages.iter().any(|l| l == language) {
            warn!(target: "input", "Unsupported language: {}", language);
            return Err(ConfigError::UnsupportedLanguage(language.to_string()));
        }
        self.language = language.to_string();
        info!(target: "input", "Language set to: {}", language);
        Ok(())
    }

    pub fn set_font_size(&mut self, size: u8) -> Result<(), ConfigError> {
        if !self.font_sizes.contains(&size) {
            warn!(target: "input", "Unsupported font size: {}", size);
            return Err(ConfigError::UnsupportedFontSize(size));
        }
        self.font_size = size;
        info!(target: "input", "Font size set to: {}", size);
        Ok(())
    }

    /// Replace the language list. If the current language is no longer
    /// offered, fall back to the first entry.
    pub fn set_available_languages(&mut self, languages: Vec<String>) -> Result<(), ConfigError> {
        let first = languages.first().cloned().ok_or(ConfigError::EmptyOptions)?;
        info!(target: "input", "Available languages updated (count: {})", languages.len());
        if !languages.contains(&self.language) {
            warn!(target: "input", "Current language not in list, defaulting to: {}", first);
            self.language = first;
        }
        self.languages = languages;
        Ok(())
    }

    /// Replace the font size list, with the same fallback rule.
    pub fn set_available_font_sizes(&mut self, sizes: Vec<u8>) -> Result<(), ConfigError> {
        let first = *sizes.first().ok_or(ConfigError::EmptyOptions)?;
        info!(target: "input", "Available font sizes updated (count: {})", sizes.len());
        if !sizes.contains(&self.font_size) {
            warn!(target: "input", "Current font size not in list, defaulting to: {}", first);
            self.font_size = first;
        }
        self.font_sizes = sizes;
        Ok(())
    }
}

/// `count` entries of `items` starting at `start`, wrapping around the end.
///
/// Empty when `items` is empty or `count` is zero.
pub fn wrapped_slice<T>(items: &[T], start: usize, count: usize) -> impl Iterator<Item = &T> {
    let n = items.len();
    let start = if n == 0 { 0 } else { start % n };
    let count = if n == 0 { 0 } else { count };
    (0..count).map(move |i| &items[(start + i) % n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::new(langs(&["Spanish", "English"]), vec![8, 12]).unwrap();
        assert_eq!(s.language(), "English");
        assert_eq!(s.font_size(), 12);

        let s = Settings::new(langs(&["Hindi"]), vec![20]).unwrap();
        assert_eq!(s.language(), "Hindi");
        assert_eq!(s.font_size(), 20);
    }

    #[test]
    fn test_rejects_unknown_and_keeps_previous() {
        let mut s = Settings::new(langs(&["English", "French"]), vec![8, 12]).unwrap();
        assert!(s.set_language("French").is_ok());
        assert_eq!(
            s.set_language("Klingon"),
            Err(ConfigError::UnsupportedLanguage("Klingon".into()))
        );
        assert_eq!(s.language(), "French");

        assert_eq!(s.set_font_size(99), Err(ConfigError::UnsupportedFontSize(99)));
        assert_eq!(s.font_size(), 12);
    }

    #[test]
    fn test_available_list_fallback() {
        let mut s = Settings::new(langs(&["English", "French"]), vec![8, 12]).unwrap();
        s.set_available_languages(langs(&["Arabic", "Mandarin"])).unwrap();
        assert_eq!(s.language(), "Arabic");

        s.set_available_font_sizes(vec![12, 24]).unwrap();
        assert_eq!(s.font_size(), 12);

        assert_eq!(s.set_available_font_sizes(Vec::new()), Err(ConfigError::EmptyOptions));
        assert_eq!(s.font_sizes(), &[12, 24]);
    }

    #[test]
    fn test_wrapped_slice() {
        let items = [1, 2, 3];
        let window: Vec<_> = wrapped_slice(&items, 2, 4).copied().collect();
        assert_eq!(window, vec![3, 1, 2, 3]);

        let empty: [u8; 0] = [];
        assert_eq!(wrapped_slice(&empty, 5, 3).count(), 0);
    }
}
