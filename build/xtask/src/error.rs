// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Failure modes of the payload build pipeline, separated so callers can
//! tell a bad invocation from a broken toolchain.

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Not in the registry, and no source file to fall back on.
    #[error("unknown target '{0}': not registered and no source file for it")]
    UnknownTarget(String),

    /// A key the target requires is absent from the environment.
    #[error("missing required option {0}")]
    MissingOption(&'static str),

    /// A recognized key has a value the encoder cannot use.
    #[error("invalid {key} value '{value}': {reason}")]
    InvalidOption {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The compiler ran and exited nonzero.
    #[error("compiler failed with {status}: {command}")]
    Compile { command: String, status: ExitStatus },

    /// The extraction tool ran and exited nonzero.
    #[error("objcopy failed with {status}: {command}")]
    Extract { command: String, status: ExitStatus },
}
