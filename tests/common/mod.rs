//! Shared fixtures: synthetic ELF images, a fixture RPM querier, and a
//! map-backed image fetcher.

use fipscan::fetch::{ImageFetcher, UnpackedRoot};
use fipscan::rpm::RpmQuerier;
use fipscan::{FipscanError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const BASE_VADDR: u64 = 0x400000;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;

const DT_NULL: u64 = 0;
const DT_NEEDED: u64 = 1;
const DT_STRTAB: u64 = 5;
const DT_STRSZ: u64 = 10;
const DT_RUNPATH: u64 = 29;

/// Build a minimal but well-formed ELF64 little-endian image with the
/// requested dynamic section. `extra` lands at the end of the file,
/// inside the single PT_LOAD segment (used for Go buildinfo blobs and
/// raw symbol strings).
pub fn build_elf(
    needed: &[&str],
    with_interp: bool,
    runpath: Option<&str>,
    extra: &[u8],
) -> Vec<u8> {
    let interp = b"/lib64/ld-linux-x86-64.so.2\0";
    let dynamic_needed = !needed.is_empty() || runpath.is_some();

    let mut phdr_count = 1; // PT_LOAD
    if with_interp {
        phdr_count += 1;
    }
    if dynamic_needed {
        phdr_count += 1;
    }

    let phdrs_end = 64 + 56 * phdr_count;
    let interp_off = phdrs_end;
    let interp_len = if with_interp { interp.len() } else { 0 };

    // Dynamic string table: leading NUL, then each name.
    let mut dynstr = vec![0u8];
    let mut needed_offsets = Vec::new();
    for lib in needed {
        needed_offsets.push(dynstr.len() as u64);
        dynstr.extend_from_slice(lib.as_bytes());
        dynstr.push(0);
    }
    let runpath_offset = runpath.map(|rp| {
        let offset = dynstr.len() as u64;
        dynstr.extend_from_slice(rp.as_bytes());
        dynstr.push(0);
        offset
    });

    let dynstr_off = interp_off + interp_len;
    let mut dyn_off = dynstr_off + dynstr.len();
    dyn_off += (8 - dyn_off % 8) % 8;

    let mut dyn_entries: Vec<(u64, u64)> = Vec::new();
    for offset in &needed_offsets {
        dyn_entries.push((DT_NEEDED, *offset));
    }
    if let Some(offset) = runpath_offset {
        dyn_entries.push((DT_RUNPATH, offset));
    }
    if dynamic_needed {
        dyn_entries.push((DT_STRTAB, BASE_VADDR + dynstr_off as u64));
        dyn_entries.push((DT_STRSZ, dynstr.len() as u64));
        dyn_entries.push((DT_NULL, 0));
    }
    let dyn_len = 16 * dyn_entries.len();
    let file_len = dyn_off + dyn_len + extra.len();

    let mut out = Vec::with_capacity(file_len);

    // ── ELF header ──
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]); // magic, 64-bit, LE, current
    out.extend_from_slice(&[0u8; 8]); // padding
    push_u16(&mut out, 3); // ET_DYN
    push_u16(&mut out, 62); // EM_X86_64
    push_u32(&mut out, 1); // EV_CURRENT
    push_u64(&mut out, BASE_VADDR + 0x1000); // entry
    push_u64(&mut out, 64); // phoff
    push_u64(&mut out, 0); // shoff
    push_u32(&mut out, 0); // flags
    push_u16(&mut out, 64); // ehsize
    push_u16(&mut out, 56); // phentsize
    push_u16(&mut out, phdr_count as u16);
    push_u16(&mut out, 64); // shentsize
    push_u16(&mut out, 0); // shnum
    push_u16(&mut out, 0); // shstrndx
    assert_eq!(out.len(), 64);

    // ── Program headers ──
    push_phdr(
        &mut out,
        PT_LOAD,
        5, // R+X
        0,
        BASE_VADDR,
        file_len as u64,
        0x1000,
    );
    if with_interp {
        push_phdr(
            &mut out,
            PT_INTERP,
            4, // R
            interp_off as u64,
            BASE_VADDR + interp_off as u64,
            interp.len() as u64,
            1,
        );
    }
    if dynamic_needed {
        push_phdr(
            &mut out,
            PT_DYNAMIC,
            6, // RW
            dyn_off as u64,
            BASE_VADDR + dyn_off as u64,
            dyn_len as u64,
            8,
        );
    }
    assert_eq!(out.len(), phdrs_end);

    if with_interp {
        out.extend_from_slice(interp);
    }
    out.extend_from_slice(&dynstr);
    out.resize(dyn_off, 0);
    for (tag, value) in dyn_entries {
        push_u64(&mut out, tag);
        push_u64(&mut out, value);
    }
    out.extend_from_slice(extra);
    assert_eq!(out.len(), file_len);
    out
}

/// Dynamically linked ELF with the given DT_NEEDED list.
pub fn dynamic_elf(needed: &[&str]) -> Vec<u8> {
    build_elf(needed, true, None, &[])
}

/// Statically linked ELF: no interpreter, no dynamic section.
pub fn static_elf() -> Vec<u8> {
    build_elf(&[], false, None, &[])
}

/// Go binary fixture: stripped ELF carrying an inline buildinfo blob
/// plus raw symbol-name bytes.
pub fn go_elf(needed: &[&str], settings: &[(&str, &str)], symbols: &[&str]) -> Vec<u8> {
    let mut modinfo = String::from("path\texample.com/app\nmod\texample.com/app\t(devel)\n");
    for (key, value) in settings {
        modinfo.push_str(&format!("build\t{key}={value}\n"));
    }

    let mut extra = Vec::new();
    extra.extend_from_slice(b"\xff Go buildinf:");
    extra.push(8); // ptr size
    extra.push(0x2); // inline strings
    extra.resize(extra.len() + 16, 0);
    push_varint_string(&mut extra, "go1.21.9");
    push_varint_string(&mut extra, &modinfo);
    for symbol in symbols {
        extra.extend_from_slice(symbol.as_bytes());
        extra.push(0);
    }

    build_elf(needed, !needed.is_empty(), None, &extra)
}

fn push_varint_string(out: &mut Vec<u8>, s: &str) {
    let mut len = s.len();
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
    out.extend_from_slice(s.as_bytes());
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_phdr(
    out: &mut Vec<u8>,
    p_type: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    filesz: u64,
    align: u64,
) {
    push_u32(out, p_type);
    push_u32(out, flags);
    push_u64(out, offset);
    push_u64(out, vaddr);
    push_u64(out, vaddr); // paddr
    push_u64(out, filesz);
    push_u64(out, filesz); // memsz
    push_u64(out, align);
}

// ─── Filesystem helpers ─────────────────────────────────────────────

/// Write `content` at `root/inner`, creating parent directories.
pub fn write_under(root: &Path, inner: &str, content: &[u8]) -> PathBuf {
    let rel = inner.trim_start_matches('/');
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

// ─── Fixture collaborators ──────────────────────────────────────────

/// Map-backed fetcher: references resolve to prepared directories;
/// anything else fails like a registry would.
#[derive(Default)]
pub struct FixtureFetcher {
    pub roots: BTreeMap<String, PathBuf>,
}

impl ImageFetcher for FixtureFetcher {
    fn fetch(&self, reference: &str) -> Result<UnpackedRoot> {
        self.roots
            .get(reference)
            .map(|dir| UnpackedRoot::existing(dir.clone()))
            .ok_or_else(|| FipscanError::Fetch(format!("manifest unknown: {reference}")))
    }
}

/// Fixture package database: package → owned in-root paths.
#[derive(Default)]
pub struct FixtureRpm {
    pub packages: BTreeMap<String, Vec<String>>,
}

impl RpmQuerier for FixtureRpm {
    fn list_packages(&self, _root: &Path) -> Result<Vec<String>> {
        Ok(self.packages.keys().cloned().collect())
    }

    fn list_files(&self, _root: &Path, package: &str) -> Result<Vec<String>> {
        self.packages
            .get(package)
            .cloned()
            .ok_or_else(|| FipscanError::Rpm(format!("package {package} is not installed")))
    }
}
