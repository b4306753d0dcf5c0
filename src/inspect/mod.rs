//! Binary classifier — content sniffing and inspector dispatch
//!
//! Inspects a candidate file and chooses a validation pipeline. MIME
//! detection sniffs the first kilobyte only; the full file is read only
//! once a file has classified as an executable artifact.

pub mod elf;
pub mod golang;
pub mod java;

use crate::results::ErrorKind;
use crate::rules::Rules;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Classifier verdict with the kind-specific inspection payload. The
/// set is closed; the validator switches on the tag.
#[derive(Debug, Clone)]
pub enum Inspection {
    NativeElf(elf::ElfInfo),
    GoElf {
        elf: elf::ElfInfo,
        go: golang::GoInfo,
    },
    JavaArchive(java::JavaInfo),
    Skipped {
        reason: String,
        kind: Option<ErrorKind>,
    },
    /// Inspection-stage errors (unreadable file, malformed ELF).
    Failed { kind: ErrorKind, detail: String },
}

impl Inspection {
    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
            kind: None,
        }
    }

    fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }
}

// ─── Content sniffing ───────────────────────────────────────────────

/// Sniff a MIME-ish label from the first kilobyte of content.
pub fn sniff(head: &[u8]) -> &'static str {
    if head.starts_with(&[0x7f, b'E', b'L', b'F']) {
        return "application/x-executable";
    }
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        return "application/zip";
    }
    if head.starts_with(b"#!") {
        return "text/x-script";
    }
    if head.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if head.starts_with(&[0xff, 0xd8, 0xff]) {
        return "image/jpeg";
    }
    if head.starts_with(b"GIF8") {
        return "image/gif";
    }
    if head.starts_with(b"%PDF") {
        return "application/pdf";
    }
    if head.starts_with(&[0x1f, 0x8b]) {
        return "application/gzip";
    }
    if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        return "application/x-xz";
    }
    if head.starts_with(b"BZh") {
        return "application/x-bzip2";
    }
    if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        return "application/zstd";
    }
    if head.len() > 262 && &head[257..262] == b"ustar" {
        return "application/x-tar";
    }
    if looks_textual(head) {
        return "text/plain";
    }
    "application/octet-stream"
}

fn looks_textual(head: &[u8]) -> bool {
    if head.is_empty() {
        return false;
    }
    let printable = head
        .iter()
        .filter(|&&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..0x7f).contains(&b))
        .count();
    printable * 100 / head.len() >= 95
}

// ─── Classification ─────────────────────────────────────────────────

/// Classify one pre-discovered path and run the matching inspector.
/// Total: every call produces exactly one `Inspection`. In Java-image
/// mode, standalone `java.security` files are inspected even though
/// their sniff is textual.
pub fn classify_and_inspect(path: &Path, rules: &Rules, java: bool) -> Inspection {
    let lstat = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) => return Inspection::failed(ErrorKind::IoError, e.to_string()),
    };

    // Dereference symlinks once; a cycle or dangling target never
    // reaches an inspector.
    let meta = if lstat.file_type().is_symlink() {
        match std::fs::metadata(path) {
            Ok(meta) => meta,
            // ELOOP
            Err(e) if e.raw_os_error() == Some(40) => {
                return Inspection::Skipped {
                    reason: "cyclic symlink".into(),
                    kind: Some(ErrorKind::SymlinkCycle),
                }
            }
            Err(e) => return Inspection::failed(ErrorKind::IoError, e.to_string()),
        }
    } else {
        lstat
    };

    if !meta.is_file() {
        return Inspection::skipped("not a regular file");
    }
    if meta.len() == 0 {
        return Inspection::skipped("empty file");
    }

    let mut head = [0u8; 1024];
    let read = match File::open(path).and_then(|mut f| f.read(&mut head)) {
        Ok(n) => n,
        Err(e) => return Inspection::failed(ErrorKind::IoError, e.to_string()),
    };
    let mime = sniff(&head[..read]);

    if java && java::is_security_override(&path.to_string_lossy()) && mime.starts_with("text/") {
        return match std::fs::read_to_string(path) {
            Ok(text) => Inspection::JavaArchive(java::inspect_properties(
                &text,
                &rules.java_disabled_algorithms,
            )),
            Err(e) => Inspection::failed(ErrorKind::IoError, e.to_string()),
        };
    }

    if rules.mime_ignored(mime) {
        return Inspection::skipped(mime);
    }

    match mime {
        "application/x-executable" => inspect_elf_file(path, rules),
        "application/zip" => java::inspect(path, &rules.java_disabled_algorithms)
            .map(Inspection::JavaArchive)
            .unwrap_or_else(|reason| Inspection::skipped(reason)),
        "text/x-script" => Inspection::skipped("shell or interpreter script"),
        other => Inspection::skipped(other),
    }
}

fn inspect_elf_file(path: &Path, rules: &Rules) -> Inspection {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => return Inspection::failed(ErrorKind::IoError, e.to_string()),
    };
    let info = match elf::inspect(&data) {
        Ok(info) => info,
        Err(detail) => return Inspection::failed(ErrorKind::MalformedElf, detail),
    };
    if golang::has_buildinfo(&data) {
        let go = golang::inspect(&data, &info, &rules.go_fips_symbols);
        Inspection::GoElf { elf: info, go }
    } else {
        Inspection::NativeElf(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_magics() {
        assert_eq!(sniff(&[0x7f, b'E', b'L', b'F', 2, 1]), "application/x-executable");
        assert_eq!(sniff(b"PK\x03\x04rest"), "application/zip");
        assert_eq!(sniff(b"#!/bin/sh\necho hi\n"), "text/x-script");
        assert_eq!(sniff(b"%PDF-1.4"), "application/pdf");
        assert_eq!(sniff(&[0x1f, 0x8b, 0x08]), "application/gzip");
        assert_eq!(sniff(b"plain old prose\n"), "text/plain");
        assert_eq!(sniff(&[0u8, 1, 2, 3]), "application/octet-stream");
    }

    #[test]
    fn test_classify_missing_file_is_io_error() {
        let rules = Rules::default();
        let inspection = classify_and_inspect(Path::new("/no/such/file"), &rules, false);
        assert!(matches!(
            inspection,
            Inspection::Failed {
                kind: ErrorKind::IoError,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_empty_file_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let inspection = classify_and_inspect(&path, &Rules::default(), false);
        assert!(matches!(inspection, Inspection::Skipped { kind: None, .. }));
    }

    #[test]
    fn test_java_mode_inspects_standalone_security_file() {
        use crate::rules::RuleSource;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("java.security");
        std::fs::write(&path, "jdk.tls.disabledAlgorithms=SHA1\n").unwrap();
        let rules = Rules::compile(RuleSource {
            java_disabled_algorithms: vec!["MD5".into(), "SHA1".into()],
            ..Default::default()
        })
        .unwrap();

        // Plain text outside java mode; an override in java mode.
        assert!(matches!(
            classify_and_inspect(&path, &rules, false),
            Inspection::Skipped { .. }
        ));
        match classify_and_inspect(&path, &rules, true) {
            Inspection::JavaArchive(info) => {
                assert_eq!(info.reenabled_algorithms, vec!["MD5".to_string()])
            }
            other => panic!("expected java inspection, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_script_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, b"#!/bin/bash\nexit 0\n").unwrap();
        let inspection = classify_and_inspect(&path, &Rules::default(), false);
        assert!(matches!(inspection, Inspection::Skipped { kind: None, .. }));
    }
}
