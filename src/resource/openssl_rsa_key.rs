//! RSA private key file resource
//!
//! Generates PEM key files. A file that opens as a valid key (with the
//! configured passphrase, if any) is left alone; a file that cannot be
//! opened - missing, corrupt, or encrypted under a different passphrase -
//! is overwritten. `force` regenerates unconditionally.

use std::fs;
use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Constraint, Descriptor, ExecutionError, HandlerSet,
    Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::FileOwnership;
use crate::crypto::{key_length_valid, CryptoProvider};
use crate::fs_writer::{parse_mode, FileSpec, FileWriter};

/// Ciphers accepted for passphrase-protected keys
pub const VALID_CIPHERS: [&str; 4] = ["des3", "aes-128-cbc", "aes-192-cbc", "aes-256-cbc"];

pub fn schema(ownership: &FileOwnership) -> Schema {
    Schema::new()
        .attr(
            "key_length",
            Constraint::integer()
                .one_of([1024_i64, 2048, 4096, 8192])
                .default(2048_i64),
        )
        .attr("key_pass", Constraint::string())
        .attr(
            "key_cipher",
            Constraint::string().one_of(VALID_CIPHERS).default("des3"),
        )
        .attr("owner", Constraint::string().default(ownership.owner.as_str()))
        .attr("group", Constraint::string().default(ownership.group.as_str()))
        .attr("mode", Constraint::string().default(ownership.mode.as_str()))
        .attr("force", Constraint::boolean().default(false))
}

pub fn descriptor(
    path: impl Into<String>,
    action: Action,
    attributes: AttrMap,
    ownership: &FileOwnership,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(path, action, attributes, &schema(ownership))
}

pub fn domain(
    crypto: Arc<dyn CryptoProvider>,
    writer: Arc<dyn FileWriter>,
) -> ResourceDomain {
    ResourceDomain::new(
        "openssl_rsa_key",
        Box::new(KeyProbe {
            crypto: Arc::clone(&crypto),
        }),
        HandlerSet::new().on(Action::Create, CreateKey { crypto, writer }),
    )
}

#[derive(Debug)]
struct KeyProbe {
    crypto: Arc<dyn CryptoProvider>,
}

impl Probe for KeyProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let path = descriptor.name();
        let pem = match fs::read_to_string(path) {
            Ok(pem) => pem,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProbeResult::Absent)
            }
            Err(e) => return Err(ProbeError::io(path, e)),
        };

        if self.crypto.rsa_key_valid(&pem, descriptor.str("key_pass")) {
            Ok(ProbeResult::present())
        } else {
            Ok(ProbeResult::Absent)
        }
    }
}

#[derive(Debug)]
struct CreateKey {
    crypto: Arc<dyn CryptoProvider>,
    writer: Arc<dyn FileWriter>,
}

impl ActionHandler for CreateKey {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let bits = descriptor.int("key_length").unwrap_or(2048);
        if !key_length_valid(bits) {
            return Err(ExecutionError::Crypto(format!(
                "key length must be a power of 2 greater than or equal to 1024, got {bits}"
            )));
        }

        let mut pem = self.crypto.generate_rsa_key(bits as u32)?;
        if let Some(pass) = descriptor.str("key_pass") {
            let cipher = descriptor.str("key_cipher").unwrap_or("des3");
            pem = self.crypto.encrypt_rsa_key(&pem, pass, cipher)?;
        }

        let mut spec = FileSpec::new(descriptor.name()).sensitive();
        if let Some(owner) = descriptor.str("owner") {
            spec = spec.owner(owner);
        }
        if let Some(group) = descriptor.str("group") {
            spec = spec.group(group);
        }
        if let Some(mode) = descriptor.str("mode").and_then(parse_mode) {
            spec = spec.mode(mode);
        }

        self.writer.write(&spec, pem.as_bytes())?;
        Ok(Applied::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::testing::{FakeCrypto, KEY_MARKER};
    use crate::fs_writer::testing::CapturingWriter;
    use convergence::Outcome;

    fn build(path: &std::path::Path, attrs: AttrMap) -> Descriptor {
        descriptor(
            path.to_string_lossy().to_string(),
            Action::Create,
            attrs,
            &FileOwnership::default(),
        )
        .expect("valid descriptor")
    }

    #[test]
    fn cipher_outside_set_fails_validation() {
        let mut attrs = AttrMap::new();
        attrs.insert("key_cipher".into(), "rot13".into());
        let err = descriptor(
            "/tmp/key.pem",
            Action::Create,
            attrs,
            &FileOwnership::default(),
        )
        .unwrap_err();
        assert_eq!(err.attribute, "key_cipher");
    }

    #[test]
    fn generates_key_then_converges() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key.pem");
        let writer = Arc::new(CapturingWriter::new());
        let domain = domain(Arc::new(FakeCrypto), writer.clone());
        let d = build(&path, AttrMap::new());

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert!(fs::read_to_string(&path)
            .expect("key written")
            .starts_with(KEY_MARKER));
        assert!(writer.last_spec().expect("write recorded").sensitive);

        assert!(matches!(domain.converge(&d), Outcome::Unchanged));
    }

    #[test]
    fn passphrase_mismatch_regenerates_the_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key.pem");
        let writer = Arc::new(CapturingWriter::new());
        let domain = domain(Arc::new(FakeCrypto), writer);

        // Key encrypted under the expected passphrase converges
        let mut attrs = AttrMap::new();
        attrs.insert("key_pass".into(), "open sesame".into());
        let d = build(&path, attrs);
        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert!(matches!(domain.converge(&d), Outcome::Unchanged));

        // Same file under a different passphrase does not open: rewrite
        let mut attrs = AttrMap::new();
        attrs.insert("key_pass".into(), "different".into());
        let d = build(&path, attrs);
        assert!(matches!(domain.converge(&d), Outcome::Changed));
    }

    #[test]
    fn force_regenerates_a_valid_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key.pem");
        let writer = Arc::new(CapturingWriter::new());
        let domain = domain(Arc::new(FakeCrypto), writer.clone());

        let d = build(&path, AttrMap::new());
        assert!(matches!(domain.converge(&d), Outcome::Changed));

        let mut attrs = AttrMap::new();
        attrs.insert("force".into(), true.into());
        let forced = build(&path, attrs);
        assert!(matches!(domain.converge(&forced), Outcome::Changed));
        assert_eq!(writer.writes.lock().expect("writes lock").len(), 2);
    }
}
