// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reports how big built payloads are, section by section, and diffs the
//! numbers against a saved baseline.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use termcolor::{ColorSpec, WriteColor};

use crate::config::{Config, Env};
use crate::elf;

/// Per-payload size report: the whitelisted sections still in the ELF,
/// and the flat binary they were extracted into.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetSizes {
    pub sections: IndexMap<String, u64>,
    pub flat: u64,
}

type SizeMap = IndexMap<String, TargetSizes>;

pub fn run(env: &Env, targets: &[String], save: bool, compare: bool) -> Result<()> {
    let cfg = Config::from_env(env);
    let sizes = collect(&cfg, targets)?;
    let saved_path = cfg.output_dir.join("sizes.json");

    if save {
        println!("writing sizes to {}", saved_path.display());
        fs::write(&saved_path, serde_json::to_string(&sizes)?)?;
        return Ok(());
    }
    if compare {
        let saved = fs::read(&saved_path).context(format!(
            "no saved sizes at {}; run `sizes --save` first",
            saved_path.display()
        ))?;
        let saved: SizeMap = serde_json::from_slice(&saved)?;
        return print_comparison(&sizes, &saved);
    }
    print_report(&sizes)
}

fn collect(cfg: &Config, targets: &[String]) -> Result<SizeMap> {
    let mut sizes = IndexMap::new();
    for name in targets {
        let elf_path = cfg.elf_path(name);
        let buffer = fs::read(&elf_path).context(format!(
            "no ELF at {}; build {} first",
            elf_path.display(),
            name
        ))?;
        let sections = elf::payload_section_sizes(&buffer)?;
        let flat = fs::metadata(cfg.bin_path(name))
            .context(format!("no flat binary for {}", name))?
            .len();
        sizes.insert(name.clone(), TargetSizes { sections, flat });
    }
    Ok(sizes)
}

fn print_report(sizes: &SizeMap) -> Result<()> {
    let color_choice = if atty::is(atty::Stream::Stdout) {
        termcolor::ColorChoice::Auto
    } else {
        termcolor::ColorChoice::Never
    };
    let mut out = termcolor::StandardStream::stdout(color_choice);

    for (i, (name, target)) in sizes.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(out, "{}", name)?;
        out.reset()?;
        for (section, &used) in &target.sections {
            writeln!(out, "  {:<8} {: >6} bytes", format!("{}:", section), used)?;
        }
        writeln!(out, "  {:<8} {: >6} bytes", "flat:", target.flat)?;
    }
    Ok(())
}

fn print_comparison(current: &SizeMap, saved: &SizeMap) -> Result<()> {
    println!("comparing against previously saved sizes");

    for (name, cur) in current {
        match saved.get(name) {
            Some(old) => {
                let mut lines = Vec::new();
                for (section, &bytes) in &cur.sections {
                    let before = old.sections.get(section).copied().unwrap_or(0);
                    diff_line(&mut lines, section, before, bytes);
                }
                diff_line(&mut lines, "flat", old.flat, cur.flat);
                if lines.is_empty() {
                    println!("{}: unchanged", name);
                } else {
                    println!("{}:", name);
                    for line in lines {
                        println!("{}", line);
                    }
                }
            }
            None => println!("{}: no saved sizes for this payload", name),
        }
    }
    for name in saved.keys() {
        if !current.contains_key(name) {
            println!("{}: saved but not in this report", name);
        }
    }
    Ok(())
}

fn diff_line(out: &mut Vec<String>, what: &str, before: u64, after: u64) {
    let diff = after as i64 - before as i64;
    if diff != 0 {
        out.push(format!("\t{}: {:+}", what, diff));
    }
}

#[cfg(test)]
mod tests {
    use object::write::{Object, StandardSection};
    use object::{Architecture, BinaryFormat};
    use tempfile::TempDir;

    use super::*;

    fn write_artifacts(cfg: &Config, name: &str, text: &[u8]) {
        let mut obj = Object::new(
            BinaryFormat::Elf,
            Architecture::X86_64,
            object::Endianness::Little,
        );
        let text_id = obj.section_id(StandardSection::Text);
        obj.append_section_data(text_id, text, 1);
        fs::write(cfg.elf_path(name), obj.write().unwrap()).unwrap();
        fs::write(cfg.bin_path(name), text).unwrap();
    }

    fn scratch_config(dir: &TempDir) -> Config {
        let out = dir.path().join("bins");
        fs::create_dir_all(&out).unwrap();
        Config {
            cc: "gcc".to_string(),
            triple: None,
            cflags: None,
            output_lib: false,
            output_debug: false,
            output_dir: out,
            source_dir: dir.path().join("shellcodes"),
        }
    }

    #[test]
    fn collect_reads_sections_and_flat_size() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        write_artifacts(&cfg, "demo", &[0x90; 5]);

        let sizes = collect(&cfg, &["demo".to_string()]).unwrap();
        let demo = &sizes["demo"];
        assert_eq!(demo.sections.get(".text"), Some(&5));
        assert_eq!(demo.flat, 5);
    }

    #[test]
    fn collect_requires_built_artifacts() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        assert!(collect(&cfg, &["demo".to_string()]).is_err());
    }

    #[test]
    fn saved_sizes_round_trip_through_json() {
        let dir = TempDir::new().unwrap();
        let cfg = scratch_config(&dir);
        write_artifacts(&cfg, "demo", &[0x90; 5]);

        let sizes = collect(&cfg, &["demo".to_string()]).unwrap();
        let json = serde_json::to_string(&sizes).unwrap();
        let back: SizeMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back["demo"].flat, 5);
        assert_eq!(back["demo"].sections.get(".text"), Some(&5));
    }
}
