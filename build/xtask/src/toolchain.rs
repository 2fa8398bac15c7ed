// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Selects the compiler and objcopy for one build and composes the flag
//! set. The triple-keyed endianness table lives here as well.
//!
//! Flag policy lives in ordered tables. Within a table the first matching
//! row wins, and the empty pattern matches anything, so defaults sit in
//! the last row.

use crate::config::Config;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Triple prefixes of big-endian architectures. Checked in order, so the
/// little-endian MIPS spellings sit above the bare family prefix.
const ENDIAN_RULES: &[(&str, Endianness)] = &[
    ("mipsel", Endianness::Little),
    ("mips64el", Endianness::Little),
    ("mips", Endianness::Big),
    ("powerpc64le", Endianness::Little),
    ("powerpc", Endianness::Big),
    ("ppc64le", Endianness::Little),
    ("ppc", Endianness::Big),
    ("armeb", Endianness::Big),
    ("aarch64_be", Endianness::Big),
    ("sparc", Endianness::Big),
    ("s390", Endianness::Big),
    ("m68k", Endianness::Big),
];

impl Endianness {
    /// Byte order of the architecture `triple` names, or of the build host
    /// when there is no triple.
    pub fn for_triple(triple: Option<&str>) -> Endianness {
        match triple {
            None => {
                if cfg!(target_endian = "big") {
                    Endianness::Big
                } else {
                    Endianness::Little
                }
            }
            Some(t) => ENDIAN_RULES
                .iter()
                .find(|(prefix, _)| t.starts_with(prefix))
                .map(|(_, endian)| *endian)
                .unwrap_or(Endianness::Little),
        }
    }
}

/// Flags every build gets: freestanding C11, no runtime, a custom entry
/// point, and dead section elimination at link time.
const BASE_CFLAGS: &[&str] = &[
    "-std=gnu11",
    "-Wall",
    "-Wfatal-errors",
    "-ffreestanding",
    "-nostdlib",
    "-nodefaultlibs",
    "-fno-common",
    "-fomit-frame-pointer",
    "-Wl,--gc-sections",
    "-Wl,-eshellcode",
];

/// Roots of the support header tree, relative to the repository root.
const INCLUDE_DIRS: &[&str] = &["include", "include/sysdeps/generic", "include/ports"];

/// Per compiler family. clang spells its size optimization -Oz; anything
/// else is assumed to speak GCC's dialect.
const FAMILY_CFLAGS: &[(&str, &[&str])] = &[
    ("clang", &["-Oz"]),
    ("", &["-Os", "-finline-functions", "-fno-toplevel-reorder"]),
];

/// Per target architecture. MIPS stays position-independent without -fPIC;
/// abicalls assume a GOT the flat binary will not have.
const ARCH_CFLAGS: &[(&str, &[&str])] = &[
    ("mips", &["-mno-abicalls", "-G", "0"]),
    ("", &["-fPIC"]),
];

fn first_match<'a>(table: &'a [(&str, &[&str])], id: &str) -> &'a [&'a str] {
    table
        .iter()
        .find(|(pattern, _)| pattern.is_empty() || id.contains(pattern))
        .map(|(_, flags)| *flags)
        .unwrap_or(&[])
}

/// Everything needed to run the compiler and the extractor for one build.
#[derive(Clone, Debug)]
pub struct Toolchain {
    pub cc: String,
    pub objcopy: String,
    pub flags: Vec<String>,
}

impl Toolchain {
    /// Lays the flag layers down in order: cross target, baseline, include
    /// roots, compiler family, architecture, the user's CFLAGS, then the
    /// per-build toggles. Later layers win where flags conflict.
    pub fn compose(cfg: &Config, no_builtin: bool) -> Toolchain {
        let (cc, target_flags) = cross_compiler(&cfg.cc, cfg.triple.as_deref());

        let mut flags = target_flags;
        flags.extend(BASE_CFLAGS.iter().map(|f| f.to_string()));
        flags.extend(INCLUDE_DIRS.iter().map(|dir| format!("-I{}", dir)));
        flags.extend(
            first_match(FAMILY_CFLAGS, &cfg.cc)
                .iter()
                .map(|f| f.to_string()),
        );
        flags.extend(
            first_match(ARCH_CFLAGS, cfg.triple.as_deref().unwrap_or(""))
                .iter()
                .map(|f| f.to_string()),
        );
        if let Some(cflags) = &cfg.cflags {
            flags.extend(cflags.split_whitespace().map(|f| f.to_string()));
        }
        if no_builtin {
            flags.push("-fno-builtin".to_string());
        }
        if cfg.output_lib {
            flags.push("-shared".to_string());
        }

        Toolchain {
            cc,
            objcopy: objcopy_for(&cfg.cc, cfg.triple.as_deref()),
            flags,
        }
    }
}

/// GCC-style cross compilers are separate `<triple>-cc` binaries; clang is
/// one binary that takes the target as arguments.
fn cross_compiler(cc: &str, triple: Option<&str>) -> (String, Vec<String>) {
    let triple = match triple {
        Some(t) => t,
        None => return (cc.to_string(), Vec::new()),
    };
    if cc.contains("clang") {
        let flags = vec![
            "-target".to_string(),
            triple.to_string(),
            "--sysroot".to_string(),
            format!("/usr/{}", triple),
        ];
        (cc.to_string(), flags)
    } else {
        (format!("{}-{}", triple, cc), Vec::new())
    }
}

fn objcopy_for(cc: &str, triple: Option<&str>) -> String {
    if cc.contains("clang") {
        "llvm-objcopy".to_string()
    } else {
        match triple {
            Some(t) => format!("{}-objcopy", t),
            None => "objcopy".to_string(),
        }
    }
}
