//! Embedded configs — the compiled-in default plus per-release overlays
//!
//! Overlays are selected by `--config-for-version`; an exact version
//! match is tried first, then the major.minor prefix.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

pub const DEFAULT_CONFIG: &str = include_str!("embedded/default.toml");

static VERSIONED: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("4.15", include_str!("embedded/4.15.toml")),
        ("4.16", include_str!("embedded/4.16.toml")),
        ("4.17", include_str!("embedded/4.17.toml")),
    ])
});

/// The overlay for a release version, if one is shipped.
pub fn for_version(version: &str) -> Option<&'static str> {
    if let Some(text) = VERSIONED.get(version) {
        return Some(text);
    }
    // "4.16.9" selects the "4.16" overlay.
    let major_minor = version.split('.').take(2).collect::<Vec<_>>().join(".");
    VERSIONED.get(major_minor.as_str()).copied()
}

/// Versions with embedded overlays, for diagnostics.
pub fn known_versions() -> Vec<&'static str> {
    VERSIONED.keys().copied().collect()
}
