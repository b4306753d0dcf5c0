//! ELF inspector — dynamic tags, runtime search paths, symbol names
//!
//! Wraps goblin's parser. Malformed headers (class, endianness,
//! version) surface as an error string the validator maps to
//! `malformed_elf`.

use goblin::elf::Elf;

/// Structured metadata extracted from one ELF image.
#[derive(Debug, Clone, Default)]
pub struct ElfInfo {
    /// `DT_NEEDED` dependency basenames, in declaration order.
    pub needed: Vec<String>,
    /// `DT_RUNPATH` plus legacy `DT_RPATH`, split on `:`.
    pub runpaths: Vec<String>,
    pub has_interp: bool,
    /// Names from the symbol tables (dynamic first, then static).
    pub symbols: Vec<String>,
}

impl ElfInfo {
    /// No interpreter and no dynamic dependencies.
    pub fn is_static(&self) -> bool {
        !self.has_interp && self.needed.is_empty()
    }

    pub fn links(&self, library: &str) -> bool {
        self.needed.iter().any(|l| l == library)
    }
}

pub fn inspect(data: &[u8]) -> Result<ElfInfo, String> {
    let elf = Elf::parse(data).map_err(|e| format!("unparseable ELF: {e}"))?;

    let needed: Vec<String> = elf.libraries.iter().map(|s| s.to_string()).collect();

    let mut runpaths = Vec::new();
    for raw in elf.runpaths.iter().chain(elf.rpaths.iter()) {
        runpaths.extend(raw.split(':').filter(|p| !p.is_empty()).map(String::from));
    }

    let mut symbols: Vec<String> = elf
        .dynsyms
        .iter()
        .filter_map(|s| elf.dynstrtab.get_at(s.st_name))
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect();
    symbols.extend(
        elf.syms
            .iter()
            .filter_map(|s| elf.strtab.get_at(s.st_name))
            .filter(|n| !n.is_empty())
            .map(String::from),
    );

    Ok(ElfInfo {
        needed,
        runpaths,
        has_interp: elf.interpreter.is_some(),
        symbols,
    })
}
