//! User-agent presets for sites that reject unknown clients.

pub const CHROME: &str = "Mozilla/5.0 (X11; Linux i686) AppleWebKit/535.2 (KHTML, like Gecko) Ubuntu/11.10 Chromium/15.0.874.120 Chrome/15.0.874.120 Safari/535.2";

const PRESETS: &[(&str, &str)] = &[("chrome", CHROME)];

/// Preset by case-insensitive name.
pub fn by_name(name: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name.trim()))
        .map(|(_, agent)| *agent)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|(name, _)| *name)
}
