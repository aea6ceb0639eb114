//! Configuration envelope consumed by `ChordNode`, grounded on
//! `config/config.go`'s `Config` struct and `validateConfig`. `chordring-cli`
//! builds this with `clap::Parser` and hands the validated result to the
//! core; the core validates independently so library consumers that skip
//! the CLI still get the same guarantees.

use std::net::IpAddr;
use std::path::PathBuf;

use crate::error::ChordError;
use crate::identifier::{mask, Identifier};

/// How this node is entering the ring.
#[derive(Debug, Clone)]
pub enum Mode {
    Create,
    Join { seed_ip: String, seed_port: u16 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ip: String,
    pub port: u16,
    pub mode: Mode,
    pub m: u32,
    pub r: usize,
    pub stabilize_ms: u64,
    pub fix_fingers_ms: u64,
    pub check_predecessor_ms: u64,
    pub identifier_override: Option<Identifier>,
    pub aes_enabled: bool,
    pub aes_key_path: Option<PathBuf>,
    pub tls_enabled: bool,
    pub ca_cert: Option<PathBuf>,
    pub server_cert: Option<PathBuf>,
    pub server_key: Option<PathBuf>,
    pub storage_root: PathBuf,
}

impl Config {
    /// Mirrors `validateConfig`'s range and shape checks.
    pub fn validate(&self) -> Result<(), ChordError> {
        self.ip
            .parse::<IpAddr>()
            .map_err(|e| ChordError::Config(format!("invalid ip {:?}: {e}", self.ip)))?;

        if !(1024..=65535).contains(&self.port) {
            return Err(ChordError::Config(format!(
                "port {} out of range (1024,65535]",
                self.port
            )));
        }

        if !(1..=32).contains(&self.r) {
            return Err(ChordError::Config(format!("r {} out of range [1,32]", self.r)));
        }

        for (name, v) in [
            ("stabilize_ms", self.stabilize_ms),
            ("fix_fingers_ms", self.fix_fingers_ms),
            ("check_predecessor_ms", self.check_predecessor_ms),
        ] {
            if !(1..=60_000).contains(&v) {
                return Err(ChordError::Config(format!("{name} {v} out of range [1,60000]")));
            }
        }

        if self.m == 0 || self.m > crate::identifier::MAX_M {
            return Err(ChordError::Config(format!(
                "m {} out of range [1,{}]",
                self.m,
                crate::identifier::MAX_M
            )));
        }

        if let Mode::Join { seed_ip, seed_port } = &self.mode {
            seed_ip
                .parse::<IpAddr>()
                .map_err(|e| ChordError::Config(format!("invalid seed ip {:?}: {e}", seed_ip)))?;
            if !(1024..=65535).contains(seed_port) {
                return Err(ChordError::Config(format!(
                    "seed port {} out of range (1024,65535]",
                    seed_port
                )));
            }
        }

        if self.aes_enabled && self.aes_key_path.is_none() {
            return Err(ChordError::Config("aes enabled but no key path given".into()));
        }

        if self.tls_enabled && (self.ca_cert.is_none() || self.server_cert.is_none() || self.server_key.is_none()) {
            return Err(ChordError::Config(
                "tls enabled but ca/server cert/server key not fully specified".into(),
            ));
        }

        Ok(())
    }
}

/// Parses a 40-hex-character identifier override, hashing it down the same
/// way `generate_identifier` derives ordinary identifiers (low 8 bytes,
/// masked to `m` bits) so an override is consistent with the rest of the
/// ring regardless of the configured `m`.
pub fn parse_identifier_override(hex_str: &str, m: u32) -> Result<Identifier, ChordError> {
    if hex_str.len() != 40 || !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChordError::Config(format!(
            "identifier override must be 40 hex characters, got {:?}",
            hex_str
        )));
    }
    let bytes = hex::decode(hex_str).map_err(|e| ChordError::Config(e.to_string()))?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[bytes.len() - 8..]);
    Ok(u64::from_be_bytes(buf) & mask(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            ip: "127.0.0.1".into(),
            port: 9000,
            mode: Mode::Create,
            m: 10,
            r: 3,
            stabilize_ms: 1000,
            fix_fingers_ms: 1000,
            check_predecessor_ms: 1000,
            identifier_override: None,
            aes_enabled: false,
            aes_key_path: None,
            tls_enabled: false,
            ca_cert: None,
            server_cert: None,
            server_key: None,
            storage_root: PathBuf::from("/tmp/chordring-test"),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn out_of_range_r_is_rejected() {
        let mut c = base_config();
        c.r = 0;
        assert!(c.validate().is_err());
        c.r = 33;
        assert!(c.validate().is_err());
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut c = base_config();
        c.port = 80;
        assert!(c.validate().is_err());
    }

    #[test]
    fn aes_enabled_without_key_path_is_rejected() {
        let mut c = base_config();
        c.aes_enabled = true;
        assert!(c.validate().is_err());
    }

    #[test]
    fn identifier_override_parses_and_masks() {
        let hex_str = "a".repeat(40);
        let id = parse_identifier_override(&hex_str, 10).unwrap();
        assert!(id < (1u64 << 10));
    }

    #[test]
    fn identifier_override_rejects_wrong_length() {
        assert!(parse_identifier_override("abc", 10).is_err());
    }
}
