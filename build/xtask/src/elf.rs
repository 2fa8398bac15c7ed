// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ELF inspection helpers for built payloads.

use anyhow::Result;
use indexmap::IndexMap;

/// Sections that survive extraction into the flat binary: code, embedded
/// function bodies, and read-only data. Everything else in the ELF is
/// loader metadata the payload cannot use.
pub const PAYLOAD_SECTIONS: &[&str] = &[".text", ".funcs", ".rodata"];

pub fn get_section_by_name<'a>(
    elf: &'a goblin::elf::Elf<'_>,
    name: &str,
) -> Option<&'a goblin::elf::SectionHeader> {
    for section in &elf.section_headers {
        if let Some(section_name) = elf.shdr_strtab.get_at(section.sh_name) {
            if section_name == name {
                return Some(section);
            }
        }
    }
    None
}

/// Sizes of the payload sections present in `data`, in whitelist order.
pub fn payload_section_sizes(data: &[u8]) -> Result<IndexMap<String, u64>> {
    let elf = goblin::elf::Elf::parse(data)?;
    let mut sizes = IndexMap::new();
    for &name in PAYLOAD_SECTIONS {
        if let Some(section) = get_section_by_name(&elf, name) {
            sizes.insert(name.to_string(), section.sh_size);
        }
    }
    Ok(sizes)
}

/// Bytes extraction will keep from the ELF in `data`.
pub fn payload_size(data: &[u8]) -> Result<u64> {
    Ok(payload_section_sizes(data)?.values().sum())
}
