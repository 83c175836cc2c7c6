//! Locale parsing and locale → data source resolution

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::source::{
    Blender, DataSource, EmojiDataSource, EmojibaseSource, ImageVendor, SourceResult,
    EMOJIBASE_LOCALES,
};

/// BCP-47-ish locale: language, optional script, optional region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    pub language: String,
    pub script: Option<String>,
    pub region: Option<String>,
}

impl Locale {
    pub fn english() -> Self {
        Self {
            language: "en".to_string(),
            script: None,
            region: None,
        }
    }

    /// `language[-Script][-REGION]`, e.g. `pt-br` or `zh-hant-tw`
    pub fn identifier(&self) -> String {
        let mut id = self.language.clone();
        if let Some(script) = &self.script {
            id.push('-');
            id.push_str(&script.to_lowercase());
        }
        if let Some(region) = &self.region {
            id.push('-');
            id.push_str(&region.to_lowercase());
        }
        id
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Drop POSIX encoding/modifier suffixes ("de_DE.UTF-8", "sr_RS@latin")
        let base = s.split(|c: char| c == '.' || c == '@').next().unwrap_or_default().trim();
        let mut parts = base.split(|c: char| c == '-' || c == '_').filter(|p| !p.is_empty());

        let language = parts
            .next()
            .filter(|l| l.len() >= 2 && l.len() <= 3 && l.chars().all(|c| c.is_ascii_alphabetic()))
            .ok_or_else(|| format!("invalid locale: {s:?}"))?
            .to_ascii_lowercase();

        let mut script = None;
        let mut region = None;
        for part in parts {
            let alphabetic = part.chars().all(|c| c.is_ascii_alphabetic());
            if script.is_none() && region.is_none() && part.len() == 4 && alphabetic {
                let mut chars = part.chars();
                let first = chars.next().map(|c| c.to_ascii_uppercase());
                script = first.map(|f| f.to_string() + &chars.as_str().to_ascii_lowercase());
            } else if region.is_none()
                && ((part.len() == 2 && alphabetic)
                    || (part.len() == 3 && part.chars().all(|c| c.is_ascii_digit())))
            {
                region = Some(part.to_ascii_uppercase());
            }
        }

        Ok(Self {
            language,
            script,
            region,
        })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(script) = &self.script {
            write!(f, "-{script}")?;
        }
        if let Some(region) = &self.region {
            write!(f, "-{region}")?;
        }
        Ok(())
    }
}

/// Platform the index runs on; decides which glyphs can be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Apple,
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Platform::Apple
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    /// Vendor image set matching the platform's emoji font
    pub fn image_vendor(&self) -> ImageVendor {
        match self {
            Platform::Apple => ImageVendor::Apple,
            Platform::Linux | Platform::Windows | Platform::Other => ImageVendor::Google,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::current()
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apple" | "macos" | "ios" => Ok(Platform::Apple),
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            "other" => Ok(Platform::Other),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Emojibase locale code for `locale`, or `None` when emojibase has no data
pub fn emojibase_locale(locale: &Locale) -> Option<&'static str> {
    let region = locale.region.as_deref();
    let code = match locale.language.as_str() {
        "zh" if locale.script.as_deref() == Some("Hant")
            || matches!(region, Some("TW" | "HK" | "MO")) =>
        {
            "zh-hant"
        }
        "en" if region == Some("GB") => "en-gb",
        "es" if matches!(region, Some("MX" | "419")) => "es-mx",
        "no" | "nn" | "nb" => "nb",
        language => language,
    };
    EMOJIBASE_LOCALES.iter().copied().find(|l| *l == code)
}

/// Resolve the data source for `locale` on `platform`.
///
/// English, or any locale emojibase does not publish, uses the canonical
/// emoji-data feed alone. Other locales blend emojibase names (primary) into
/// the emoji-data order and shortcodes (secondary).
pub fn resolve_source(
    locale: &Locale,
    platform: Platform,
    config: &SourceConfig,
) -> SourceResult<Arc<dyn DataSource>> {
    let base = EmojiDataSource::new(&config.emoji_data_url, platform.image_vendor())?
        .with_timeout(config.request_timeout())
        .with_refresh_interval(config.refresh_interval());

    match emojibase_locale(locale) {
        Some(code) if code != "en" => {
            let localized = EmojibaseSource::new(&config.emojibase_base_url, code)?
                .with_timeout(config.request_timeout())
                .with_refresh_interval(config.refresh_interval());
            Ok(Arc::new(Blender::new(Arc::new(localized), Arc::new(base))))
        }
        _ => Ok(Arc::new(base)),
    }
}
