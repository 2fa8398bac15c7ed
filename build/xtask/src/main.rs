// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use structopt::StructOpt;

mod config;
mod defines;
mod dist;
mod elf;
mod error;
mod sizes;
mod toolchain;

use config::Env;

#[derive(Debug, StructOpt)]
#[structopt(
    max_term_width = 80,
    about = "builds freestanding C payloads into flat binaries"
)]
enum Xtask {
    /// Compiles one or more payloads and extracts each into a flat,
    /// position-independent binary. Payload parameters (CHANNEL, HOST,
    /// PORT, ...) and toolchain controls (CC, TRIPLE, CFLAGS, ...) are
    /// taken from the environment.
    Build {
        /// Echo the tool command lines being run.
        #[structopt(short)]
        verbose: bool,
        /// Name of payload(s) to build.
        #[structopt(min_values = 1)]
        targets: Vec<String>,
    },

    /// Reports per-section and flat sizes of already built payloads.
    Sizes {
        /// Save sizes as JSON next to the artifacts, for later comparison.
        #[structopt(long)]
        save: bool,
        /// Compare against previously saved sizes.
        #[structopt(long, conflicts_with = "save")]
        compare: bool,
        /// Name of payload(s) to report on.
        #[structopt(min_values = 1)]
        targets: Vec<String>,
    },
}

fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");

    env_logger::init_from_env(env);

    let xtask = Xtask::from_args();
    let build_env = Env::capture();

    match xtask {
        Xtask::Build { verbose, targets } => {
            dist::run(&build_env, verbose, &targets)?;
        }
        Xtask::Sizes {
            save,
            compare,
            targets,
        } => {
            sizes::run(&build_env, &targets, save, compare)?;
        }
    }
    Ok(())
}
