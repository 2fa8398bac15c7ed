// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolves payload parameters from the environment into the preprocessor
//! defines baked into a build.
//!
//! Most values pass through verbatim. HOST and PORT are rewritten into
//! forms the C sources can drop straight into socket calls, which is where
//! the target byte order sneaks in.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use indexmap::IndexMap;

use crate::config::{Env, Target};
use crate::error::BuildError;
use crate::toolchain::Endianness;

/// Keys every payload understands. All of them are optional; the support
/// headers default the ones a given payload cares about.
pub const COMMON_OPTIONS: &[&str] = &[
    "CHANNEL",
    "HOST",
    "PORT",
    "NO_BUILTIN",
    "FORK_ON_ACCEPT",
    "REUSE_ADDR",
];

/// Resolves the define set for `target` from `env`.
///
/// Unrelated environment keys are ignored, so the whole process environment
/// can be passed in. A required key that is absent fails the build before
/// any tool runs.
pub fn resolve(
    target: &Target,
    env: &Env,
    endian: Endianness,
) -> Result<IndexMap<String, String>, BuildError> {
    let mut defines = IndexMap::new();
    for &key in COMMON_OPTIONS.iter().chain(target.required_options) {
        if let Some(raw) = env.get(key) {
            defines.insert(key.to_string(), encode(key, raw, endian)?);
        }
    }
    for &key in target.required_options {
        if !defines.contains_key(key) {
            return Err(BuildError::MissingOption(key));
        }
    }
    Ok(defines)
}

fn encode(key: &'static str, raw: &str, endian: Endianness) -> Result<String, BuildError> {
    match key {
        "PORT" => encode_port(raw, endian),
        "HOST" => encode_host(raw),
        _ => Ok(raw.to_string()),
    }
}

/// A PORT value is stored by the payload as a native 16-bit integer but
/// must hit the wire in network order, so the literal emitted here is the
/// port's big-endian bytes reread in the target's byte order.
fn encode_port(raw: &str, endian: Endianness) -> Result<String, BuildError> {
    let port = raw
        .trim()
        .parse::<u16>()
        .map_err(|_| BuildError::InvalidOption {
            key: "PORT",
            value: raw.to_string(),
            reason: "expected a decimal port in 0..=65535",
        })?;
    let mut wire = [0u8; 2];
    BigEndian::write_u16(&mut wire, port);
    let literal = match endian {
        Endianness::Little => LittleEndian::read_u16(&wire),
        Endianness::Big => BigEndian::read_u16(&wire),
    };
    Ok(literal.to_string())
}

fn encode_host(raw: &str) -> Result<String, BuildError> {
    let addr = raw
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| BuildError::InvalidOption {
            key: "HOST",
            value: raw.to_string(),
            reason: "expected an IPv4 or IPv6 address",
        })?;
    Ok(match addr {
        IpAddr::V4(v4) => ipv4_initializer(v4),
        IpAddr::V6(v6) => ipv6_initializer(v6),
    })
}

/// `10.0.0.1` becomes `{10,0,0,1}`, ready for a `uint8_t[4]`.
fn ipv4_initializer(addr: Ipv4Addr) -> String {
    let octets: Vec<String> = addr.octets().iter().map(|o| o.to_string()).collect();
    format!("{{{}}}", octets.join(","))
}

/// All sixteen bytes in network order, `{0x20,0x01,...}`.
fn ipv6_initializer(addr: Ipv6Addr) -> String {
    let bytes: Vec<String> = addr
        .octets()
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect();
    format!("{{{}}}", bytes.join(","))
}
