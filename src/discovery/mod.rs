//! Controller address resolution.
//!
//! A controller's address is derived from a naming convention:
//!
//! ```bash
//! # logical name, read from a role-specific variable
//! SERVICE_NAME=sample
//! # derived from the upper-cased name
//! SAMPLE_SERVICE_HOST=10.0.0.5
//! SAMPLE_SERVICE_PORT=9050
//! ```
//!
//! Resolution never fails: every missing or unparsable value is replaced by
//! the locator's default and a warning naming the field is logged.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use tracing::warn;

/// Default host for every controller role.
pub const DEFAULT_HOST: &str = "localhost";
/// Suffix appended to the upper-cased service name for the host variable.
pub const HOST_SUFFIX: &str = "_SERVICE_HOST";
/// Suffix appended to the upper-cased service name for the port variable.
pub const PORT_SUFFIX: &str = "_SERVICE_PORT";

/// Locator for the action/placement controller dispatcher.
pub const ACTION_CONTROLLER: ServiceLocator = ServiceLocator {
    name_var: "SERVICE_NAME",
    default_name: "sample",
    default_port: 9050,
    role: ControllerRole::Action,
};

/// Locator for the intent registration service.
pub const ITS_REGISTRAR: ServiceLocator = ServiceLocator {
    name_var: "ITS",
    default_name: "its",
    default_port: 9040,
    role: ControllerRole::Action,
};

/// The capability a controller exposes to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRole {
    /// Mutates the resource set of an AppContext.
    Action,
    /// Selects target clusters within an AppContext.
    Placement,
}

impl fmt::Display for ControllerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRole::Action => f.write_str("action"),
            ControllerRole::Placement => f.write_str("placement"),
        }
    }
}

/// A resolved controller address. Recomputed on every dispatch, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub role: ControllerRole,
}

impl ControllerEndpoint {
    /// `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URI form for gRPC channels.
    pub fn uri(&self) -> String {
        format!("http://{}", self.address())
    }

    /// Address a server for this endpoint listens on: every interface, on
    /// the resolved port. The resolved host is where clients reach the
    /// service (a Kubernetes ClusterIP, say) and is usually not local.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

/// Naming-convention resolver for one controller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLocator {
    /// Variable holding the logical service name.
    pub name_var: &'static str,
    /// Name used when `name_var` is unset or empty.
    pub default_name: &'static str,
    /// Port used when the derived port variable is unusable.
    pub default_port: u16,
    pub role: ControllerRole,
}

impl ServiceLocator {
    pub const fn new(
        name_var: &'static str,
        default_name: &'static str,
        default_port: u16,
        role: ControllerRole,
    ) -> Self {
        Self {
            name_var,
            default_name,
            default_port,
            role,
        }
    }

    /// Same convention, different role.
    pub const fn with_role(mut self, role: ControllerRole) -> Self {
        self.role = role;
        self
    }

    /// Resolve from the process environment.
    pub fn resolve(&self) -> ControllerEndpoint {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve `(host, port)` from the process environment.
    pub fn host_port(&self) -> (String, u16) {
        let endpoint = self.resolve();
        (endpoint.host, endpoint.port)
    }

    /// Resolve using an arbitrary variable lookup.
    pub fn resolve_with<F>(&self, lookup: F) -> ControllerEndpoint
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name = match lookup(self.name_var).filter(|v| !v.is_empty()) {
            Some(name) => name,
            None => {
                let name = self.default_name.to_string();
                warn!(name = %name, variable = self.name_var, "Using the default name as the service name");
                name
            }
        };

        let prefix = service_name.to_uppercase();
        let host_var = format!("{}{}", prefix, HOST_SUFFIX);
        let port_var = format!("{}{}", prefix, PORT_SUFFIX);

        let host = match lookup(&host_var).filter(|v| !v.is_empty()) {
            Some(host) => host,
            None => {
                warn!(host = DEFAULT_HOST, variable = %host_var, "Using the default host for the gRPC controller");
                DEFAULT_HOST.to_string()
            }
        };

        let port = match lookup(&port_var).and_then(|v| v.trim().parse::<u16>().ok()) {
            Some(port) => port,
            None => {
                warn!(port = self.default_port, variable = %port_var, "Using the default port for the gRPC controller");
                self.default_port
            }
        };

        ControllerEndpoint {
            service_name,
            host,
            port,
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        let endpoint = ACTION_CONTROLLER.resolve_with(env(&[]));
        assert_eq!(endpoint.service_name, "sample");
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 9050);
        assert_eq!(endpoint.role, ControllerRole::Action);
    }

    #[test]
    fn test_port_from_derived_variable() {
        let endpoint = ACTION_CONTROLLER.resolve_with(env(&[
            ("SERVICE_NAME", "sample"),
            ("SAMPLE_SERVICE_PORT", "7000"),
        ]));
        assert_eq!(endpoint.address(), "localhost:7000");
    }

    #[test]
    fn test_name_is_upper_cased_for_derived_variables() {
        let endpoint = ACTION_CONTROLLER.resolve_with(env(&[
            ("SERVICE_NAME", "hpa-plc"),
            ("HPA-PLC_SERVICE_HOST", "plc.emco"),
            ("HPA-PLC_SERVICE_PORT", "9091"),
        ]));
        assert_eq!(endpoint.service_name, "hpa-plc");
        assert_eq!(endpoint.uri(), "http://plc.emco:9091");
    }

    #[test]
    fn test_unparsable_port_falls_back() {
        for bad in ["", "abc", "-1", "70000"] {
            let endpoint = ACTION_CONTROLLER.resolve_with(env(&[("SAMPLE_SERVICE_PORT", bad)]));
            assert_eq!(endpoint.port, 9050, "port value {:?}", bad);
        }
    }

    #[test]
    fn test_empty_host_falls_back() {
        let endpoint = ACTION_CONTROLLER.resolve_with(env(&[("SAMPLE_SERVICE_HOST", "")]));
        assert_eq!(endpoint.host, "localhost");
    }

    #[test]
    fn test_listen_addr_ignores_resolved_host() {
        let endpoint = ACTION_CONTROLLER.resolve_with(env(&[
            ("SAMPLE_SERVICE_HOST", "10.96.12.34"),
            ("SAMPLE_SERVICE_PORT", "9051"),
        ]));
        assert_eq!(endpoint.address(), "10.96.12.34:9051");
        assert_eq!(endpoint.listen_addr().to_string(), "0.0.0.0:9051");
    }

    #[test]
    fn test_its_registrar_defaults() {
        let endpoint = ITS_REGISTRAR.resolve_with(env(&[]));
        assert_eq!(endpoint.service_name, "its");
        assert_eq!(endpoint.port, 9040);
    }

    #[test]
    fn test_its_registrar_reads_its_variable() {
        let endpoint = ITS_REGISTRAR.resolve_with(env(&[
            ("ITS", "istio"),
            ("ISTIO_SERVICE_HOST", "istio-its"),
        ]));
        assert_eq!(endpoint.host, "istio-its");
        assert_eq!(endpoint.port, 9040);
    }

    #[test]
    fn test_with_role_keeps_convention() {
        let locator = ACTION_CONTROLLER.with_role(ControllerRole::Placement);
        let endpoint = locator.resolve_with(env(&[]));
        assert_eq!(endpoint.role, ControllerRole::Placement);
        assert_eq!(endpoint.port, 9050);
    }

    #[test]
    #[serial]
    fn test_resolve_reads_process_environment() {
        let locator = ServiceLocator::new("CTXCTL_TEST_NAME", "envtest", 9001, ControllerRole::Action);
        std::env::set_var("CTXCTL_TEST_NAME", "envtest");
        std::env::set_var("ENVTEST_SERVICE_PORT", "9123");
        let (host, port) = locator.host_port();
        std::env::remove_var("CTXCTL_TEST_NAME");
        std::env::remove_var("ENVTEST_SERVICE_PORT");

        assert_eq!(host, "localhost");
        assert_eq!(port, 9123);
    }
}
