// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives a payload build end to end: resolve the target, bake its
//! parameters into defines, compose the toolchain, compile, and extract
//! the flat binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::config::{self, Config, Env, Target};
use crate::defines;
use crate::error::BuildError;
use crate::toolchain::{Endianness, Toolchain};

/// A flat binary produced by `build`.
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
}

/// Builds every named payload into the output directory.
pub fn run(env: &Env, verbose: bool, targets: &[String]) -> Result<()> {
    let cfg = Config::from_env(env);
    fs::create_dir_all(&cfg.output_dir)
        .context(format!("failed to create {}", cfg.output_dir.display()))?;

    for name in targets {
        let artifact = build(&cfg, env, name, verbose)?;
        println!("{} ({} bytes)", artifact.path.display(), artifact.size);
    }
    Ok(())
}

/// Builds one payload and returns the extracted flat binary.
///
/// Resolution happens in full before any tool runs, so a bad invocation
/// never leaves a half-written artifact behind.
pub fn build(cfg: &Config, env: &Env, name: &str, verbose: bool) -> Result<Artifact> {
    let target = config::resolve_target(name, &cfg.source_dir)?;
    let endian = Endianness::for_triple(cfg.triple.as_deref());
    let defines = defines::resolve(&target, env, endian)?;
    let no_builtin = defines.get("NO_BUILTIN").map(String::as_str) == Some("1");
    let toolchain = Toolchain::compose(cfg, no_builtin);
    log::debug!("{}: flags {:?}", name, toolchain.flags);
    log::debug!("{}: defines {:?}", name, defines);

    println!("building {}", target.source.display());
    let elf = cfg.elf_path(name);
    compile(&toolchain, &target, &defines, &elf, &[], verbose)?;
    if cfg.output_debug {
        let listing = cfg.listing_path(name);
        compile(&toolchain, &target, &defines, &listing, &["-S"], verbose)?;
    }
    extract(&toolchain, &elf, &cfg.bin_path(name), verbose)
}

fn compile(
    toolchain: &Toolchain,
    target: &Target,
    defines: &IndexMap<String, String>,
    out: &Path,
    extra_flags: &[&str],
    verbose: bool,
) -> Result<()> {
    let mut cmd = Command::new(&toolchain.cc);
    cmd.args(&toolchain.flags);
    cmd.args(extra_flags);
    cmd.arg(&target.source);
    cmd.arg("-o").arg(out);
    for (key, value) in defines {
        cmd.arg(format!("-D{}={}", key, value));
    }

    if verbose {
        println!("{:?}", cmd);
    }

    let status = cmd
        .status()
        .context(format!("failed to run compiler ({:?})", cmd))?;
    if !status.success() {
        return Err(BuildError::Compile {
            command: format!("{:?}", cmd),
            status,
        }
        .into());
    }
    Ok(())
}

/// objcopy whitelist copy: keep the payload sections, drop ELF structure.
fn extract(
    toolchain: &Toolchain,
    elf: &Path,
    bin: &Path,
    verbose: bool,
) -> Result<Artifact> {
    let mut cmd = Command::new(&toolchain.objcopy);
    cmd.arg("-O").arg("binary");
    for section in crate::elf::PAYLOAD_SECTIONS {
        cmd.arg("-j").arg(section);
    }
    cmd.arg(elf).arg(bin);

    if verbose {
        println!("{:?}", cmd);
    }

    let status = cmd
        .status()
        .context(format!("failed to run objcopy ({:?})", cmd))?;
    if !status.success() {
        return Err(BuildError::Extract {
            command: format!("{:?}", cmd),
            status,
        }
        .into());
    }

    let size = fs::metadata(bin)
        .context(format!("objcopy produced no output at {}", bin.display()))?
        .len();

    // objcopy pads the output when section load addresses leave gaps, so
    // the flat file can come out larger than the section total.
    let data = fs::read(elf).context(format!("failed to re-read {}", elf.display()))?;
    let section_total = crate::elf::payload_size(&data)?;
    if size != section_total {
        log::debug!(
            "{}: flat binary is {} bytes, whitelisted sections total {}",
            bin.display(),
            size,
            section_total
        );
    }

    Ok(Artifact {
        path: bin.to_path_buf(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn scratch_config(dir: &TempDir) -> Config {
        Config {
            cc: "false".to_string(),
            triple: None,
            cflags: None,
            output_lib: false,
            output_debug: false,
            output_dir: dir.path().join("bins"),
            source_dir: dir.path().join("shellcodes"),
        }
    }

    #[test]
    fn unknown_targets_fail_up_front() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        let err = build(&cfg, &Env::default(), "missing", false).unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::UnknownTarget(name)) => assert_eq!(name, "missing"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_options_fail_before_any_tool_runs() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        // readflag is registered, so it resolves with no source file. If
        // the pipeline reached the compiler we would see Compile here.
        let err = build(&cfg, &Env::default(), "readflag", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingOption("FLAG_PATH"))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn compiler_failures_are_reported_as_such() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        fs::create_dir_all(&cfg.source_dir).unwrap();
        fs::write(
            cfg.source_dir.join("hello.c"),
            "int shellcode(void) { return 0; }\n",
        )
        .unwrap();

        // scratch_config points CC at `false`, which exits nonzero.
        let err = build(&cfg, &Env::default(), "hello", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::Compile { .. })
        ));
    }
}
