//! Self-signed X.509 certificate resource
//!
//! Writes a PEM certificate plus its private key. An existing certificate
//! at the target path is left alone regardless of content; regeneration
//! means deleting the file first.

use std::path::Path;
use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, ConfigurationError, Constraint, Descriptor,
    ExecutionError, HandlerSet, Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::config::FileOwnership;
use crate::crypto::{CertificateRequest, CryptoProvider};
use crate::fs_writer::{parse_mode, FileSpec, FileWriter};

pub fn schema(ownership: &FileOwnership) -> Schema {
    Schema::new()
        .attr("org", Constraint::string().required())
        .attr("org_unit", Constraint::string().required())
        .attr("country", Constraint::string().required())
        .attr("common_name", Constraint::string().required())
        .attr("expire", Constraint::integer().default(365_i64))
        .attr("subject_alt_name", Constraint::list().default(Vec::new()))
        .attr("key_file", Constraint::string())
        .attr("key_pass", Constraint::string())
        .attr(
            "key_length",
            Constraint::integer()
                .one_of([1024_i64, 2048, 4096, 8192])
                .default(2048_i64),
        )
        .attr("owner", Constraint::string().default(ownership.owner.as_str()))
        .attr("group", Constraint::string().default(ownership.group.as_str()))
        .attr("mode", Constraint::string().default(ownership.mode.as_str()))
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
        "openssl_x509",
        Box::new(CertProbe),
        HandlerSet::new().on(Action::Create, CreateCert { crypto, writer }),
    )
}

/// Key path: explicit `key_file`, or the cert path with a `.key`
/// extension
fn key_path(descriptor: &Descriptor) -> String {
    descriptor.str("key_file").map_or_else(
        || {
            Path::new(descriptor.name())
                .with_extension("key")
                .to_string_lossy()
                .to_string()
        },
        ToString::to_string,
    )
}

#[derive(Debug)]
struct CertProbe;

impl Probe for CertProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let path = Path::new(descriptor.name());
        match path.try_exists() {
            Ok(true) => Ok(ProbeResult::present()),
            Ok(false) => Ok(ProbeResult::Absent),
            Err(e) => Err(ProbeError::io(descriptor.name(), e)),
        }
    }
}

#[derive(Debug)]
struct CreateCert {
    crypto: Arc<dyn CryptoProvider>,
    writer: Arc<dyn FileWriter>,
}

impl ActionHandler for CreateCert {
    fn preflight(&self, descriptor: &Descriptor) -> Result<(), ConfigurationError> {
        let expire = descriptor.int("expire").unwrap_or(365);
        if expire < 1 {
            return Err(ConfigurationError::new(format!(
                "expire must be at least 1 day, got {expire}"
            )));
        }
        Ok(())
    }

    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let request = CertificateRequest {
            common_name: descriptor.str("common_name").unwrap_or_default().to_string(),
            org: descriptor.str("org").unwrap_or_default().to_string(),
            org_unit: descriptor.str("org_unit").unwrap_or_default().to_string(),
            country: descriptor.str("country").unwrap_or_default().to_string(),
            expire_days: descriptor.int("expire").unwrap_or(365) as u32,
            subject_alt_names: descriptor.list("subject_alt_name").to_vec(),
            key_length: descriptor.int("key_length").unwrap_or(2048) as u32,
        };

        let bundle = self.crypto.self_signed_cert(&request)?;
        let key_pem = match descriptor.str("key_pass") {
            Some(pass) => self.crypto.encrypt_rsa_key(&bundle.key_pem, pass, "des3")?,
            None => bundle.key_pem,
        };

        let spec = |path: String| {
            let mut spec = FileSpec::new(path).sensitive();
            if let Some(owner) = descriptor.str("owner") {
                spec = spec.owner(owner);
            }
            if let Some(group) = descriptor.str("group") {
                spec = spec.group(group);
            }
            if let Some(mode) = descriptor.str("mode").and_then(parse_mode) {
                spec = spec.mode(mode);
            }
            spec
        };

        self.writer
            .write(&spec(descriptor.name().to_string()), bundle.cert_pem.as_bytes())?;
        self.writer
            .write(&spec(key_path(descriptor)), key_pem.as_bytes())?;

        Ok(Applied::Changed)
    }
}
