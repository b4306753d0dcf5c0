//! Java archive inspector — manifest and `java.security` overrides
//!
//! Iterates JAR/WAR/EAR entries without extracting to disk. Nested
//! archives are recursed exactly one level to keep expansion bounded.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Decompressed bytes read from any single nested archive entry.
const MAX_NESTED_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct JavaInfo {
    pub entry_count: usize,
    /// `Main-Class` from the top-level manifest.
    pub main_class: Option<String>,
    /// Policy-disabled algorithms a `java.security` override re-enables.
    pub reenabled_algorithms: Vec<String>,
    pub nested_archives: usize,
}

/// Inspect an archive. `Err` carries a skip reason (not a JAR, broken
/// zip) rather than a scan failure.
pub fn inspect(path: &Path, disabled: &BTreeSet<String>) -> Result<JavaInfo, String> {
    let file = File::open(path).map_err(|e| format!("unreadable archive: {e}"))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("not a zip archive: {e}"))?;

    if !has_manifest(&mut archive) {
        return Err("archive without META-INF/MANIFEST.MF".into());
    }
    let mut info = JavaInfo::default();
    let mut reenabled = BTreeSet::new();
    scan_entries(&mut archive, disabled, &mut info, &mut reenabled, 0);
    info.reenabled_algorithms = reenabled.into_iter().collect();
    Ok(info)
}

fn has_manifest<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> bool {
    archive.by_name("META-INF/MANIFEST.MF").is_ok()
}

fn scan_entries<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    disabled: &BTreeSet<String>,
    info: &mut JavaInfo,
    reenabled: &mut BTreeSet<String>,
    depth: usize,
) {
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(index, error = %e, "unreadable archive entry");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        info.entry_count += 1;
        let name = entry.name().to_string();

        if depth == 0 && name == "META-INF/MANIFEST.MF" {
            let mut text = String::new();
            if entry.read_to_string(&mut text).is_ok() {
                info.main_class = manifest_main_class(&text);
            }
            continue;
        }

        if is_security_override(&name) {
            let mut text = String::new();
            if entry.read_to_string(&mut text).is_ok() {
                reenabled.extend(reenabled_algorithms(&text, disabled));
            }
            continue;
        }

        if depth == 0 && is_nested_archive(&name) {
            if entry.size() > MAX_NESTED_BYTES {
                tracing::warn!(entry = %name, size = entry.size(), "nested archive too large, skipping");
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if entry.read_to_end(&mut bytes).is_err() {
                continue;
            }
            if let Ok(mut nested) = ZipArchive::new(Cursor::new(bytes)) {
                info.nested_archives += 1;
                scan_entries(&mut nested, disabled, info, reenabled, depth + 1);
            }
        }
    }
}

/// Inspect a standalone `java.security` properties file found on the
/// filesystem of a Java image.
pub fn inspect_properties(text: &str, disabled: &BTreeSet<String>) -> JavaInfo {
    JavaInfo {
        reenabled_algorithms: reenabled_algorithms(text, disabled),
        ..Default::default()
    }
}

fn is_nested_archive(name: &str) -> bool {
    [".jar", ".war", ".ear"].iter().any(|ext| name.ends_with(ext))
}

pub(crate) fn is_security_override(name: &str) -> bool {
    let base = name.rsplit('/').next().unwrap_or(name);
    base == "java.security" || name.ends_with("java.security.overrides")
}

// ─── Manifest ───────────────────────────────────────────────────────

/// `Main-Class` attribute, folding 72-byte continuation lines.
fn manifest_main_class(manifest: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in manifest.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some(v) = value.as_mut() {
                v.push_str(rest.trim_end());
                continue;
            }
        }
        if value.is_some() {
            break;
        }
        if let Some(rest) = line.strip_prefix("Main-Class:") {
            value = Some(rest.trim().to_string());
        }
    }
    value.filter(|v| !v.is_empty())
}

// ─── java.security overrides ────────────────────────────────────────

/// Algorithms from the policy-disabled set that the override file
/// re-enables: any `*disabledAlgorithms*` property whose new value no
/// longer lists them.
fn reenabled_algorithms(properties: &str, disabled: &BTreeSet<String>) -> Vec<String> {
    let mut reenabled = BTreeSet::new();
    for line in properties.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if !key.trim().contains("disabledAlgorithms") {
            continue;
        }
        let listed: BTreeSet<&str> = value
            .split(',')
            .filter_map(|item| item.trim().split_whitespace().next())
            .collect();
        for algorithm in disabled {
            if !listed.contains(algorithm.as_str()) {
                reenabled.insert(algorithm.clone());
            }
        }
    }
    reenabled.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn disabled(algorithms: &[&str]) -> BTreeSet<String> {
        algorithms.iter().map(|s| s.to_string()).collect()
    }

    fn build_jar(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = ZipWriter::new(file.reopen().unwrap());
        for (name, content) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    #[test]
    fn test_zip_without_manifest_is_not_a_jar() {
        let file = build_jar(&[("readme.txt", b"hello")]);
        assert!(inspect(file.path(), &disabled(&[])).is_err());
    }

    #[test]
    fn test_manifest_main_class_with_continuation() {
        let manifest = "Manifest-Version: 1.0\r\nMain-Class: com.example.very.long.package.\r\n name.Main\r\n\r\n";
        assert_eq!(
            manifest_main_class(manifest).as_deref(),
            Some("com.example.very.long.package.name.Main")
        );
    }

    #[test]
    fn test_reenabled_algorithm_detection() {
        let overrides = "# relax the shipped policy\njdk.tls.disabledAlgorithms=SHA1, RC4\n";
        let found = reenabled_algorithms(overrides, &disabled(&["MD5", "SHA1"]));
        assert_eq!(found, vec!["MD5".to_string()]);
    }

    #[test]
    fn test_value_constraints_do_not_hide_listed_algorithms() {
        let overrides = "jdk.certpath.disabledAlgorithms=MD5 jdkCA & usage TLSServer, SHA1\n";
        let found = reenabled_algorithms(overrides, &disabled(&["MD5", "SHA1"]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_jar_with_security_override() {
        let file = build_jar(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\nMain-Class: com.example.Main\n".as_slice()),
            ("conf/security/java.security", b"jdk.tls.disabledAlgorithms=SHA1\n".as_slice()),
        ]);
        let info = inspect(file.path(), &disabled(&["MD5", "SHA1"])).unwrap();
        assert_eq!(info.main_class.as_deref(), Some("com.example.Main"));
        assert_eq!(info.reenabled_algorithms, vec!["MD5".to_string()]);
    }

    #[test]
    fn test_nested_archive_is_scanned_one_level() {
        // Inner jar carries the override; it must be found.
        let inner = build_jar(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".as_slice()),
            ("java.security.overrides", b"jdk.tls.disabledAlgorithms=NONE\n".as_slice()),
        ]);
        let inner_bytes = std::fs::read(inner.path()).unwrap();
        let outer = build_jar(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".as_slice()),
            ("lib/inner.jar", inner_bytes.as_slice()),
        ]);
        let info = inspect(outer.path(), &disabled(&["MD5"])).unwrap();
        assert_eq!(info.nested_archives, 1);
        assert_eq!(info.reenabled_algorithms, vec!["MD5".to_string()]);
    }
}
