// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build settings from the ambient environment, and the payload registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// Where payload sources live, one `<name>.c` per payload.
pub const SHELLCODE_DIR: &str = "shellcodes";

const DEFAULT_OUTPUT_DIR: &str = "bins";

/// A snapshot of the key/value environment the build reads its settings
/// from. Everything downstream takes a snapshot rather than touching
/// process globals, so tests can hand-build arbitrary environments.
#[derive(Clone, Debug, Default)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Captures the current process environment.
    pub fn capture() -> Self {
        Env {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Env {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// True when `key` is set to `1`, the convention for on/off keys.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key).map(str::trim) == Some("1")
    }
}

/// Control settings: how to build, as opposed to what gets baked into the
/// payload. `from_env` reads the conventional control keys; tests build
/// this directly to point the pipeline at scratch directories.
#[derive(Clone, Debug)]
pub struct Config {
    pub cc: String,
    pub triple: Option<String>,
    pub cflags: Option<String>,
    pub output_lib: bool,
    pub output_debug: bool,
    pub output_dir: PathBuf,
    pub source_dir: PathBuf,
}

impl Config {
    pub fn from_env(env: &Env) -> Self {
        Config {
            cc: env.get("CC").unwrap_or("gcc").to_string(),
            triple: env
                .get("TRIPLE")
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            cflags: env.get("CFLAGS").map(str::to_string),
            output_lib: env.is_enabled("OUTPUT_LIB"),
            output_debug: env.is_enabled("OUTPUT_DEBUG"),
            output_dir: env.get("OUTPUT_DIR").unwrap_or(DEFAULT_OUTPUT_DIR).into(),
            source_dir: SHELLCODE_DIR.into(),
        }
    }

    pub fn elf_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.elf", name))
    }

    pub fn listing_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.S", name))
    }

    pub fn bin_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.bin", name))
    }
}

/// One buildable payload: where its source lives and which option keys it
/// requires beyond the common set.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    pub source: PathBuf,
    pub required_options: &'static [&'static str],
}

/// Payloads that take parameters beyond the common set. A name not listed
/// here can still build through the fallback rule, as long as a source
/// file for it exists.
const REGISTRY: &[(&str, &[&str])] = &[
    ("readflag", &["FLAG_PATH"]),
    ("execve", &["SET_ARGV0"]),
    ("shellexec", &["COMMAND", "SET_ARGV0"]),
    ("memexec", &["MEMORY"]),
];

/// Looks `name` up in the registry, falling back to any source file at
/// `<source_dir>/<name>.c`. Registered payloads resolve without touching
/// the filesystem.
pub fn resolve_target(name: &str, source_dir: &Path) -> Result<Target, BuildError> {
    let source = source_dir.join(format!("{}.c", name));
    if let Some(required) = REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, required)| *required)
    {
        return Ok(Target {
            name: name.to_string(),
            source,
            required_options: required,
        });
    }
    if source.is_file() {
        return Ok(Target {
            name: name.to_string(),
            source,
            required_options: &[],
        });
    }
    Err(BuildError::UnknownTarget(name.to_string()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::from_env(&Env::default());
        assert_eq!(cfg.cc, "gcc");
        assert_eq!(cfg.triple, None);
        assert_eq!(cfg.output_dir, PathBuf::from("bins"));
        assert!(!cfg.output_lib);
        assert!(!cfg.output_debug);
    }

    #[test]
    fn control_keys() {
        let env = Env::from_pairs([
            ("CC", "clang"),
            ("TRIPLE", "mips-linux-gnu"),
            ("CFLAGS", "-O0"),
            ("OUTPUT_LIB", "1"),
            ("OUTPUT_DEBUG", "0"),
            ("OUTPUT_DIR", "out"),
        ]);
        let cfg = Config::from_env(&env);
        assert_eq!(cfg.cc, "clang");
        assert_eq!(cfg.triple.as_deref(), Some("mips-linux-gnu"));
        assert_eq!(cfg.cflags.as_deref(), Some("-O0"));
        assert!(cfg.output_lib);
        assert!(!cfg.output_debug);
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn empty_triple_means_native() {
        let env = Env::from_pairs([("TRIPLE", "")]);
        assert_eq!(Config::from_env(&env).triple, None);
    }

    #[test]
    fn registered_targets_resolve_without_a_source_check() {
        let target = resolve_target("readflag", Path::new("does-not-exist")).unwrap();
        assert_eq!(target.name, "readflag");
        assert_eq!(target.required_options, &["FLAG_PATH"]);
    }

    #[test]
    fn unregistered_targets_fall_back_to_the_source_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.c"), "int shellcode(void);\n").unwrap();

        let target = resolve_target("hello", dir.path()).unwrap();
        assert!(target.required_options.is_empty());
        assert_eq!(target.source, dir.path().join("hello.c"));

        let err = resolve_target("absent", dir.path()).unwrap_err();
        assert!(matches!(err, BuildError::UnknownTarget(name) if name == "absent"));
    }
}
