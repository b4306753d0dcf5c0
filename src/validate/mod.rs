//! Validator — evaluates the compiled rule set against inspection output
//!
//! Validation is total: every inspection produces exactly one
//! `ScanResult`. The first failing rule determines the verdict; later
//! rules run only when their evidence is cheap. Exception matchers may
//! then downgrade failure→skipped (err/rpm ignores) or failure→warning
//! (payload ignores). Upgrades never occur.

use crate::inspect::{elf::ElfInfo, golang::GoInfo, java::JavaInfo, Inspection};
use crate::results::{ErrorKind, ScanResult, Status, Tag};
use crate::rules::Rules;
use std::path::Path;

/// Validate one classified file and apply the exception pass.
pub fn validate(
    path: &Path,
    tag: &Tag,
    rpm: Option<&str>,
    inspection: &Inspection,
    rules: &Rules,
) -> ScanResult {
    let result = verdict(path, tag, rpm, inspection, rules);
    apply_exceptions(result, rules)
}

fn verdict(
    path: &Path,
    tag: &Tag,
    rpm: Option<&str>,
    inspection: &Inspection,
    rules: &Rules,
) -> ScanResult {
    let result = match inspection {
        Inspection::Skipped { reason, kind } => {
            let mut r = ScanResult::skipped(path, tag.clone(), reason.clone());
            r.error_kind = *kind;
            r
        }
        Inspection::Failed { kind, detail } => {
            ScanResult::failure(path, tag.clone(), *kind, detail.clone())
        }
        Inspection::NativeElf(elf) => native_elf_verdict(path, tag, rpm, elf, rules),
        Inspection::GoElf { elf, go } => go_elf_verdict(path, tag, elf, go, rules),
        Inspection::JavaArchive(java) => java_verdict(path, tag, java, rules),
    };
    result.with_rpm(rpm.map(String::from))
}

// ─── Native ELF ─────────────────────────────────────────────────────

fn native_elf_verdict(
    path: &Path,
    tag: &Tag,
    rpm: Option<&str>,
    elf: &ElfInfo,
    rules: &Rules,
) -> ScanResult {
    if elf.is_static() {
        // A known packaging origin keeps this at warning level; an
        // unowned static binary is a hard failure.
        let detail = "statically linked binary";
        return if rpm.is_some() {
            ScanResult::warning(path, tag.clone(), ErrorKind::StaticBinary, detail)
        } else {
            ScanResult::failure(path, tag.clone(), ErrorKind::StaticBinary, detail)
        };
    }

    let missing: Vec<String> = rules
        .required_libs
        .iter()
        .filter(|lib| !elf.links(lib))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return ScanResult::failure(
            path,
            tag.clone(),
            ErrorKind::MissingRequiredLib,
            format!("missing required libraries: {}", missing.join(", ")),
        )
        .with_evidence(missing);
    }

    if let Some(result) = forbidden_checks(path, tag, elf, rules) {
        return result;
    }

    ScanResult::success(path, tag.clone())
}

/// Forbidden-library then forbidden-symbol checks, shared by native
/// and Go binaries.
fn forbidden_checks(path: &Path, tag: &Tag, elf: &ElfInfo, rules: &Rules) -> Option<ScanResult> {
    let bad_libs: Vec<String> = elf
        .needed
        .iter()
        .filter(|lib| rules.forbidden_libs.contains(lib.as_str()))
        .cloned()
        .collect();
    if !bad_libs.is_empty() {
        return Some(
            ScanResult::failure(
                path,
                tag.clone(),
                ErrorKind::ForbiddenLib,
                format!("links forbidden libraries: {}", bad_libs.join(", ")),
            )
            .with_evidence(bad_libs),
        );
    }

    if rules.forbidden_symbols.is_empty() {
        return None;
    }
    let mut bad_symbols: Vec<String> = elf
        .symbols
        .iter()
        .filter(|symbol| {
            // Versioned symbols compare on the bare name.
            let bare = symbol.split('@').next().unwrap_or(symbol);
            rules.forbidden_symbols.iter().any(|f| f == bare)
        })
        .cloned()
        .collect();
    if !bad_symbols.is_empty() {
        bad_symbols.sort();
        bad_symbols.dedup();
        return Some(
            ScanResult::failure(
                path,
                tag.clone(),
                ErrorKind::ForbiddenSymbol,
                format!("carries forbidden symbols: {}", bad_symbols.join(", ")),
            )
            .with_evidence(bad_symbols),
        );
    }
    None
}

// ─── Go ELF ─────────────────────────────────────────────────────────

/// Go binaries are exempt from the native static-binary and
/// required-library rules; their crypto posture is judged by the
/// buildinfo record and symbol fingerprints instead.
fn go_elf_verdict(
    path: &Path,
    tag: &Tag,
    elf: &ElfInfo,
    go: &GoInfo,
    rules: &Rules,
) -> ScanResult {
    if let Some(result) = forbidden_checks(path, tag, elf, rules) {
        return result;
    }

    if go.stripped && !go.fips_mode_from_buildinfo() {
        return ScanResult::failure(
            path,
            tag.clone(),
            ErrorKind::GoFipsIndeterminate,
            "symbols stripped and buildinfo does not prove FIPS mode",
        );
    }

    if go.links_crypto() {
        let dynamic_crypto = rules
            .go_required_dynamic_libs
            .iter()
            .any(|lib| elf.links(lib));
        if !dynamic_crypto && !go.fips_mode_from_buildinfo() {
            return ScanResult::failure(
                path,
                tag.clone(),
                ErrorKind::NotDynamicCgo,
                format!(
                    "links crypto without any of the required dynamic libraries ({})",
                    rules.go_required_dynamic_libs.join(", ")
                ),
            )
            .with_evidence(go.fips_symbols.clone());
        }
    }

    ScanResult::success(path, tag.clone()).with_evidence(go.fips_symbols.clone())
}

// ─── Java archive ───────────────────────────────────────────────────

fn java_verdict(path: &Path, tag: &Tag, java: &JavaInfo, rules: &Rules) -> ScanResult {
    if let Some(main) = &java.main_class {
        if rules.java_forbidden_main_classes.contains(main) {
            return ScanResult::failure(
                path,
                tag.clone(),
                ErrorKind::JavaForbiddenMain,
                format!("manifest declares forbidden main class {main}"),
            )
            .with_evidence(vec![main.clone()]);
        }
    }

    if !java.reenabled_algorithms.is_empty() {
        return ScanResult::failure(
            path,
            tag.clone(),
            ErrorKind::JavaReenabledAlgorithm,
            format!(
                "java.security override re-enables: {}",
                java.reenabled_algorithms.join(", ")
            ),
        )
        .with_evidence(java.reenabled_algorithms.clone());
    }

    ScanResult::success(path, tag.clone())
}

// ─── Exceptions ─────────────────────────────────────────────────────

/// Downgrade pass. Interruption kinds are recorded, never judged.
pub fn apply_exceptions(mut result: ScanResult, rules: &Rules) -> ScanResult {
    if !matches!(result.status, Status::Failure | Status::Warning) {
        return result;
    }
    if result.error_kind.is_some_and(ErrorKind::is_interruption) {
        result.status = Status::Skipped;
        return result;
    }

    let path = result.path.to_string_lossy();

    if let Some(rpm) = result.rpm.as_deref() {
        if rules.match_rpm(rpm) {
            result.status = Status::Skipped;
            result.suppressed_by = Some(format!("rpm_ignore{{{rpm}}}"));
            return result;
        }
    }

    if let Some(kind) = result.error_kind {
        if let Some(predicate) = rules.match_err(kind, &path, result.rpm.as_deref()) {
            result.status = Status::Skipped;
            result.suppressed_by = Some(predicate.to_string());
            return result;
        }
    }

    if result.status == Status::Failure {
        if let Some(predicate) =
            rules.match_payload(&result.tag.component, &path, &result.tag.image)
        {
            result.status = Status::Warning;
            result.suppressed_by = Some(predicate.to_string());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ErrIgnore, PayloadIgnore, RuleSource};
    use std::path::PathBuf;

    fn tag() -> Tag {
        Tag::new("etcd", "quay.io/openshift/etcd@sha256:abc")
    }

    fn policy() -> Rules {
        Rules::compile(RuleSource {
            required_libs: vec!["libcrypto.so.3".into()],
            forbidden_libs: vec!["libcrypto.so.1.0.0".into()],
            forbidden_symbols: vec!["MD4_Init".into()],
            go_fips_symbols: vec!["crypto/internal/boring".into()],
            go_required_dynamic_libs: vec!["libcrypto.so.3".into()],
            ..Default::default()
        })
        .unwrap()
    }

    fn dynamic_elf(needed: &[&str]) -> ElfInfo {
        ElfInfo {
            needed: needed.iter().map(|s| s.to_string()).collect(),
            has_interp: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_elf_with_required_lib_succeeds() {
        let inspection = Inspection::NativeElf(dynamic_elf(&["libc.so.6", "libcrypto.so.3"]));
        let result = validate(
            &PathBuf::from("/usr/bin/etcd"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.status, Status::Success);
    }

    #[test]
    fn test_elf_missing_required_lib_fails() {
        let inspection = Inspection::NativeElf(dynamic_elf(&["libc.so.6"]));
        let result = validate(
            &PathBuf::from("/usr/bin/etcd"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.status, Status::Failure);
        assert_eq!(result.error_kind, Some(ErrorKind::MissingRequiredLib));
        assert_eq!(result.evidence, vec!["libcrypto.so.3".to_string()]);
    }

    #[test]
    fn test_unowned_static_binary_fails() {
        let inspection = Inspection::NativeElf(ElfInfo::default());
        let result = validate(
            &PathBuf::from("/usr/bin/standalone"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.status, Status::Failure);
        assert_eq!(result.error_kind, Some(ErrorKind::StaticBinary));
    }

    #[test]
    fn test_owned_static_binary_is_warning() {
        let inspection = Inspection::NativeElf(ElfInfo::default());
        let result = validate(
            &PathBuf::from("/usr/bin/standalone"),
            &tag(),
            Some("some-tool"),
            &inspection,
            &policy(),
        );
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn test_static_binary_in_ignored_rpm_is_skipped() {
        let rules = Rules::compile(RuleSource {
            rpm_ignores: vec!["glibc-static".into()],
            ..Default::default()
        })
        .unwrap();
        let inspection = Inspection::NativeElf(ElfInfo::default());
        let result = validate(
            &PathBuf::from("/usr/sbin/ldconfig"),
            &tag(),
            Some("glibc-static"),
            &inspection,
            &rules,
        );
        assert_eq!(result.status, Status::Skipped);
        assert!(result.suppressed_by.is_some());
    }

    #[test]
    fn test_forbidden_lib_fails_with_evidence() {
        let inspection =
            Inspection::NativeElf(dynamic_elf(&["libcrypto.so.3", "libcrypto.so.1.0.0"]));
        let result = validate(
            &PathBuf::from("/usr/bin/legacy"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.error_kind, Some(ErrorKind::ForbiddenLib));
        assert_eq!(result.evidence, vec!["libcrypto.so.1.0.0".to_string()]);
    }

    #[test]
    fn test_forbidden_symbol_matches_versioned_name() {
        let mut elf = dynamic_elf(&["libcrypto.so.3"]);
        elf.symbols = vec!["MD4_Init@OPENSSL_3.0.0".into()];
        let result = validate(
            &PathBuf::from("/usr/bin/md4"),
            &tag(),
            None,
            &Inspection::NativeElf(elf),
            &policy(),
        );
        assert_eq!(result.error_kind, Some(ErrorKind::ForbiddenSymbol));
    }

    #[test]
    fn test_go_fips_by_buildinfo_and_boring_symbols_succeeds() {
        let go = GoInfo {
            version: Some("go1.21.9".into()),
            settings: vec![("GOFIPS".into(), "1".into())],
            fips_symbols: vec!["crypto/internal/boring".into()],
            stripped: false,
        };
        let inspection = Inspection::GoElf {
            elf: ElfInfo::default(),
            go,
        };
        let result = validate(
            &PathBuf::from("/usr/bin/oc"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.status, Status::Success);
    }

    #[test]
    fn test_go_crypto_without_dynamic_lib_or_proof_fails() {
        let go = GoInfo {
            fips_symbols: vec!["crypto/internal/boring".into()],
            ..Default::default()
        };
        let inspection = Inspection::GoElf {
            elf: ElfInfo::default(),
            go,
        };
        let result = validate(
            &PathBuf::from("/usr/bin/oc"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.error_kind, Some(ErrorKind::NotDynamicCgo));
    }

    #[test]
    fn test_go_stripped_without_proof_is_indeterminate() {
        let go = GoInfo {
            stripped: true,
            ..Default::default()
        };
        let inspection = Inspection::GoElf {
            elf: ElfInfo::default(),
            go,
        };
        let result = validate(
            &PathBuf::from("/usr/bin/mystery"),
            &tag(),
            None,
            &inspection,
            &policy(),
        );
        assert_eq!(result.error_kind, Some(ErrorKind::GoFipsIndeterminate));
    }

    #[test]
    fn test_java_reenabled_algorithm_fails_with_evidence() {
        let java = JavaInfo {
            reenabled_algorithms: vec!["MD5".into()],
            ..Default::default()
        };
        let result = validate(
            &PathBuf::from("/deployments/app.jar"),
            &tag(),
            None,
            &Inspection::JavaArchive(java),
            &policy(),
        );
        assert_eq!(result.error_kind, Some(ErrorKind::JavaReenabledAlgorithm));
        assert_eq!(result.evidence, vec!["MD5".to_string()]);
    }

    #[test]
    fn test_err_ignore_downgrades_to_skipped() {
        let rules = Rules::compile(RuleSource {
            err_ignores: vec![ErrIgnore {
                error: ErrorKind::StaticBinary,
                path: Some("/usr/libexec/**".into()),
                rpm: None,
            }],
            ..Default::default()
        })
        .unwrap();
        let result = validate(
            &PathBuf::from("/usr/libexec/helper"),
            &tag(),
            None,
            &Inspection::NativeElf(ElfInfo::default()),
            &rules,
        );
        assert_eq!(result.status, Status::Skipped);
    }

    #[test]
    fn test_payload_ignore_downgrades_to_warning_only() {
        let rules = Rules::compile(RuleSource {
            required_libs: vec!["libcrypto.so.3".into()],
            payload_ignores: vec![PayloadIgnore {
                component: "etcd".into(),
                prefix: Some("/usr/bin/".into()),
                tag: None,
            }],
            ..Default::default()
        })
        .unwrap();
        let result = validate(
            &PathBuf::from("/usr/bin/etcdctl"),
            &tag(),
            None,
            &Inspection::NativeElf(dynamic_elf(&["libc.so.6"])),
            &rules,
        );
        // Downgraded from failure, never upgraded back.
        assert_eq!(result.status, Status::Warning);
        assert!(result.suppressed_by.is_some());
    }

    #[test]
    fn test_cancelled_is_recorded_not_judged() {
        let result = apply_exceptions(
            ScanResult::failure(
                PathBuf::from(""),
                tag(),
                ErrorKind::Cancelled,
                "deadline exceeded",
            ),
            &policy(),
        );
        assert_eq!(result.status, Status::Skipped);
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    }
}
