//! Go binary inspector — buildinfo blob and crypto symbol fingerprints
//!
//! The `.go.buildinfo` payload survives section-header stripping, so it
//! is located by its magic rather than by section name. Symbol
//! fingerprints are searched in the symbol tables and, for stripped
//! binaries, in the raw bytes (function names survive in the pclntab).

use super::elf::ElfInfo;
use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

/// `\xff Go buildinf:` — the 14-byte header magic.
const BUILDINFO_MAGIC: &[u8] = b"\xff Go buildinf:";

static MAGIC_FINDER: Lazy<AhoCorasick> =
    Lazy::new(|| AhoCorasick::new([BUILDINFO_MAGIC]).expect("static pattern"));

/// Inline-strings flag in the buildinfo header (Go 1.18+).
const FLAG_INLINE_STRINGS: u8 = 0x2;

#[derive(Debug, Clone, Default)]
pub struct GoInfo {
    /// Toolchain version string, e.g. `go1.21.9`.
    pub version: Option<String>,
    /// Build settings vector from the embedded module info.
    pub settings: Vec<(String, String)>,
    /// Policy fingerprints found in the symbol tables or raw bytes.
    pub fips_symbols: Vec<String>,
    /// No symbol table names were present.
    pub stripped: bool,
}

impl GoInfo {
    /// Whether the buildinfo record itself proves FIPS mode.
    pub fn fips_mode_from_buildinfo(&self) -> bool {
        self.settings.iter().any(|(k, v)| {
            (k == "GOFIPS" && v == "1")
                || (k == "GOEXPERIMENT"
                    && (v.contains("boringcrypto") || v.contains("systemcrypto")))
                || (k == "CGO_ENABLED" && v == "1" && self.version_is_fips_toolchain())
        })
    }

    fn version_is_fips_toolchain(&self) -> bool {
        self.version
            .as_deref()
            .is_some_and(|v| v.contains("fips") || v.contains("openssl"))
    }

    pub fn links_crypto(&self) -> bool {
        !self.fips_symbols.is_empty()
    }
}

pub fn has_buildinfo(data: &[u8]) -> bool {
    find_magic(data).is_some()
}

fn find_magic(data: &[u8]) -> Option<usize> {
    MAGIC_FINDER.find(data).map(|m| m.start())
}

pub fn inspect(data: &[u8], elf: &ElfInfo, fips_fingerprints: &[String]) -> GoInfo {
    let mut info = parse_buildinfo(data).unwrap_or_default();
    info.stripped = elf.symbols.is_empty();

    if fips_fingerprints.is_empty() {
        return info;
    }
    let ac = match AhoCorasick::new(fips_fingerprints) {
        Ok(ac) => ac,
        Err(e) => {
            tracing::warn!(error = %e, "unusable go fips fingerprint set");
            return info;
        }
    };

    let mut matched: Vec<String> = Vec::new();
    if info.stripped {
        // Fall back to raw bytes; pclntab keeps function names.
        for m in ac.find_iter(data) {
            matched.push(fips_fingerprints[m.pattern().as_usize()].clone());
        }
    } else {
        for symbol in &elf.symbols {
            if let Some(m) = ac.find(symbol.as_str()) {
                matched.push(fips_fingerprints[m.pattern().as_usize()].clone());
            }
        }
    }
    matched.sort();
    matched.dedup();
    info.fips_symbols = matched;
    info
}

// ─── Buildinfo blob ─────────────────────────────────────────────────

fn parse_buildinfo(data: &[u8]) -> Option<GoInfo> {
    let start = find_magic(data)?;
    let header = data.get(start..start + 32)?;
    let flags = header[15];

    if flags & FLAG_INLINE_STRINGS == 0 {
        // Pointer-style record (pre-1.18): version lives behind a
        // virtual address we choose not to chase.
        tracing::debug!("go buildinfo uses pointer-style strings, skipping decode");
        return Some(GoInfo::default());
    }

    let (version, rest) = read_varint_string(data, start + 32)?;
    let (modinfo, _) = read_varint_string(data, rest)?;

    Some(GoInfo {
        version: Some(version),
        settings: parse_modinfo_settings(&modinfo),
        fips_symbols: Vec::new(),
        stripped: false,
    })
}

/// Uvarint length followed by that many bytes.
fn read_varint_string(data: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut len: u64 = 0;
    let mut shift = 0u32;
    let mut pos = offset;
    loop {
        let byte = *data.get(pos)?;
        pos += 1;
        len |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
    let end = pos.checked_add(usize::try_from(len).ok()?)?;
    let raw = data.get(pos..end)?;
    Some((String::from_utf8_lossy(raw).into_owned(), end))
}

fn parse_modinfo_settings(modinfo: &str) -> Vec<(String, String)> {
    // The module string is wrapped in 16-byte sentinels; skip ahead to
    // the real payload rather than trusting byte offsets.
    let body = match modinfo.find("path\t") {
        Some(start) => &modinfo[start..],
        None => modinfo,
    };
    body.lines()
        .filter_map(|line| line.strip_prefix("build\t"))
        .filter_map(|setting| {
            setting
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}
