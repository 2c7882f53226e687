//! Diffie-Hellman parameter file resource
//!
//! Generates dhparam.pem files. A valid file at the target path is left
//! alone; a file that exists but does not contain valid parameters probes
//! Absent and is overwritten.

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

pub fn schema(ownership: &FileOwnership) -> Schema {
    Schema::new()
        .attr(
            "key_length",
            Constraint::integer()
                .one_of([1024_i64, 2048, 4096, 8192])
                .default(2048_i64),
        )
        .attr(
            "generator",
            Constraint::integer().one_of([2_i64, 5]).default(2_i64),
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
        "openssl_dhparam",
        Box::new(DhparamProbe {
            crypto: Arc::clone(&crypto),
        }),
        HandlerSet::new().on(Action::Create, CreateDhparam { crypto, writer }),
    )
}

#[derive(Debug)]
struct DhparamProbe {
    crypto: Arc<dyn CryptoProvider>,
}

impl Probe for DhparamProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let path = descriptor.name();
        let pem = match fs::read_to_string(path) {
            Ok(pem) => pem,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProbeResult::Absent)
            }
            Err(e) => return Err(ProbeError::io(path, e)),
        };

        if self.crypto.dhparam_valid(&pem) {
            Ok(ProbeResult::present())
        } else {
            // Invalid params get regenerated
            Ok(ProbeResult::Absent)
        }
    }
}

#[derive(Debug)]
struct CreateDhparam {
    crypto: Arc<dyn CryptoProvider>,
    writer: Arc<dyn FileWriter>,
}

impl ActionHandler for CreateDhparam {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let bits = descriptor.int("key_length").unwrap_or(2048);
        if !key_length_valid(bits) {
            return Err(ExecutionError::Crypto(format!(
                "key length must be a power of 2 greater than or equal to 1024, got {bits}"
            )));
        }

        let generator = descriptor.int("generator").unwrap_or(2);
        let pem = self.crypto.generate_dhparam(bits as u32, generator as u32)?;

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
