use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Vivid => "vivid",
            ImageStyle::Natural => "natural",
        }
    }

    /// Parse a persisted value, falling back to the default for anything unknown.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "natural" => ImageStyle::Natural,
            _ => ImageStyle::Vivid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Hd,
    Standard,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Hd => "hd",
            ImageQuality::Standard => "standard",
        }
    }

    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => ImageQuality::Standard,
            _ => ImageQuality::Hd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parse_falls_back_to_vivid() {
        assert_eq!(ImageStyle::parse_or_default("natural"), ImageStyle::Natural);
        assert_eq!(ImageStyle::parse_or_default(" Natural "), ImageStyle::Natural);
        assert_eq!(ImageStyle::parse_or_default(""), ImageStyle::Vivid);
        assert_eq!(ImageStyle::parse_or_default("cubist"), ImageStyle::Vivid);
    }

    #[test]
    fn test_quality_parse_falls_back_to_hd() {
        assert_eq!(ImageQuality::parse_or_default("standard"), ImageQuality::Standard);
        assert_eq!(ImageQuality::parse_or_default("ultra"), ImageQuality::Hd);
    }

    #[test]
    fn test_style_serializes_lowercase() {
        let json = serde_json::to_string(&ImageStyle::Natural).unwrap();
        assert_eq!(json, "\"natural\"");
    }
}
