//! Windows printer resource
//!
//! Creates and deletes local printers. The driver must already be
//! installed on the host; this resource only records the printer, keyed
//! by device id, plus the port derived from its IPv4 address.

use std::sync::Arc;

use convergence::{
    Action, ActionHandler, Applied, AttrMap, Constraint, Descriptor, ExecutionError, HandlerSet,
    Probe, ProbeError, ProbeResult, Schema, ValidationError,
};

use super::ResourceDomain;
use crate::registry::RegistryAccessor;

/// Hive-relative key under which installed printers appear
pub const PRINTERS_KEY: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion\Print\Printers";

const IPV4_PATTERN: &str =
    r"^(25[0-5]|2[0-4]\d|[01]?\d?\d)(\.(25[0-5]|2[0-4]\d|[01]?\d?\d)){3}$";

pub fn schema() -> Schema {
    Schema::new()
        .attr("driver_name", Constraint::string().required())
        .attr("ipv4_address", Constraint::string().matches(IPV4_PATTERN))
        .attr("comment", Constraint::string())
        .attr("location", Constraint::string())
        .attr("shared", Constraint::boolean().default(false))
        .attr("share_name", Constraint::string())
        .attr("default", Constraint::boolean().default(false))
}

pub fn descriptor(
    device_id: impl Into<String>,
    action: Action,
    attributes: AttrMap,
) -> Result<Descriptor, ValidationError> {
    Descriptor::build(device_id, action, attributes, &schema())
}

pub fn domain(registry: Arc<dyn RegistryAccessor>) -> ResourceDomain {
    ResourceDomain::new(
        "windows_printer",
        Box::new(PrinterProbe {
            registry: Arc::clone(&registry),
        }),
        HandlerSet::new()
            .on(
                Action::Create,
                CreatePrinter {
                    registry: Arc::clone(&registry),
                },
            )
            .on(Action::Delete, DeletePrinter { registry }),
    )
}

fn printer_key(device_id: &str) -> String {
    format!(r"{PRINTERS_KEY}\{device_id}")
}

/// Port name convention for TCP/IP printer ports
fn port_name(ipv4_address: &str) -> String {
    format!("IP_{ipv4_address}")
}

#[derive(Debug)]
struct PrinterProbe {
    registry: Arc<dyn RegistryAccessor>,
}

impl Probe for PrinterProbe {
    fn probe(&self, descriptor: &Descriptor) -> Result<ProbeResult, ProbeError> {
        let key = printer_key(descriptor.name());
        let exists = self
            .registry
            .key_exists(&key)
            .map_err(|e| ProbeError::io(key.clone(), e))?;
        if exists {
            Ok(ProbeResult::present_with(key))
        } else {
            Ok(ProbeResult::Absent)
        }
    }
}

#[derive(Debug)]
struct CreatePrinter {
    registry: Arc<dyn RegistryAccessor>,
}

fn registry_err(key: &str, source: std::io::Error) -> ExecutionError {
    ExecutionError::Registry {
        key: key.to_string(),
        source,
    }
}

impl ActionHandler for CreatePrinter {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let key = printer_key(descriptor.name());
        let set = |name: &str, value: &str| {
            self.registry
                .set_value(&key, name, value)
                .map_err(|e| registry_err(&key, e))
        };

        set("Name", descriptor.name())?;
        if let Some(driver) = descriptor.str("driver_name") {
            set("Printer Driver", driver)?;
        }
        if let Some(address) = descriptor.str("ipv4_address") {
            set("Port", &port_name(address))?;
        }
        if let Some(comment) = descriptor.str("comment") {
            set("Description", comment)?;
        }
        if let Some(location) = descriptor.str("location") {
            set("Location", location)?;
        }
        if descriptor.bool_or("shared", false) {
            set("Share Name", descriptor.str("share_name").unwrap_or(descriptor.name()))?;
        }
        if descriptor.bool_or("default", false) {
            set("Default", "1")?;
        }

        Ok(Applied::Changed)
    }
}

#[derive(Debug)]
struct DeletePrinter {
    registry: Arc<dyn RegistryAccessor>,
}

impl ActionHandler for DeletePrinter {
    fn execute(&self, descriptor: &Descriptor) -> Result<Applied, ExecutionError> {
        let key = printer_key(descriptor.name());
        let existed = self
            .registry
            .delete_key(&key)
            .map_err(|e| registry_err(&key, e))?;
        Ok(if existed {
            Applied::Changed
        } else {
            Applied::Unchanged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use convergence::Outcome;

    fn printer_attrs() -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("driver_name".into(), "HP Universal Print Driver".into());
        attrs.insert("ipv4_address".into(), "10.4.64.23".into());
        attrs
    }

    #[test]
    fn driver_name_is_required() {
        let err = descriptor("HP LaserJet", Action::Create, AttrMap::new()).unwrap_err();
        assert_eq!(err.attribute, "driver_name");
    }

    #[test]
    fn ipv4_address_must_be_a_dotted_quad() {
        let mut attrs = printer_attrs();
        attrs.insert("ipv4_address".into(), "10.4.64".into());
        assert!(descriptor("HP LaserJet", Action::Create, attrs).is_err());

        let mut attrs = printer_attrs();
        attrs.insert("ipv4_address".into(), "256.1.1.1".into());
        assert!(descriptor("HP LaserJet", Action::Create, attrs).is_err());

        assert!(descriptor("HP LaserJet", Action::Create, printer_attrs()).is_ok());
    }

    #[test]
    fn create_registers_the_printer_once() {
        let registry = Arc::new(MemoryRegistry::new());
        let domain = domain(registry.clone());
        let d = descriptor("HP LaserJet 4th Floor", Action::Create, printer_attrs())
            .expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        let key = printer_key("HP LaserJet 4th Floor");
        assert!(registry.key_exists(&key).expect("registry readable"));
        assert_eq!(
            registry.read_value(&key, "Port").expect("registry readable"),
            Some("IP_10.4.64.23".to_string())
        );

        assert!(matches!(domain.converge(&d), Outcome::Unchanged));
    }

    #[test]
    fn shared_printer_records_a_share_name() {
        let registry = Arc::new(MemoryRegistry::new());
        let domain = domain(registry.clone());

        let mut attrs = printer_attrs();
        attrs.insert("shared".into(), true.into());
        attrs.insert("share_name".into(), "FLOOR4-LJ".into());
        let d = descriptor("HP LaserJet", Action::Create, attrs).expect("valid descriptor");

        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert_eq!(
            registry
                .read_value(&printer_key("HP LaserJet"), "Share Name")
                .expect("registry readable"),
            Some("FLOOR4-LJ".to_string())
        );
    }

    #[test]
    fn delete_removes_an_existing_printer() {
        let registry = Arc::new(MemoryRegistry::new());
        registry.seed_key(&printer_key("Old Printer"));
        let domain = domain(registry.clone());

        let d = descriptor("Old Printer", Action::Delete, printer_attrs())
            .expect("valid descriptor");
        assert!(matches!(domain.converge(&d), Outcome::Changed));
        assert!(!registry
            .key_exists(&printer_key("Old Printer"))
            .expect("registry readable"));

        assert!(matches!(domain.converge(&d), Outcome::Unchanged));
    }
}
