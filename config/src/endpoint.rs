use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use strum::{
    Display,
    EnumString,
};

/// Default SNMP agent port, used when an address does not name one.
pub const SNMP_PORT: u16 = 161;

#[derive(Debug, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    /// Subtree walks over SNMP.
    Snmp,
    /// `cli_show` requests against the Nexus management API.
    NxApi,
}

#[derive(Debug, Default, Clone, Copy, Display, EnumString, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SnmpVersion {
    #[default]
    V2c,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Credential {
    Basic { username: String, password: String },
    Community { community: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::Community { .. } => f.debug_struct("Community").field("community", &"***").finish(),
        }
    }
}

impl Credential {
    /// Parse `user:password`.
    pub fn parse_basic(value: &str) -> Option<Self> {
        let (username, password) = value.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn basic(&self) -> Option<(&str, &str)> {
        match self {
            Credential::Basic { username, password } => Some((username, password)),
            Credential::Community { .. } => None,
        }
    }

    pub fn community(&self) -> Option<&str> {
        match self {
            Credential::Community { community } => Some(community),
            Credential::Basic { .. } => None,
        }
    }
}

/// One device of the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub address: String,
    pub transport: TransportKind,
    #[serde(default)]
    pub snmp_version: SnmpVersion,
    #[serde(flatten)]
    pub credential: Credential,
}

impl Endpoint {
    pub fn snmp(address: impl Into<String>, community: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            transport: TransportKind::Snmp,
            snmp_version: SnmpVersion::V2c,
            credential: Credential::Community {
                community: community.into(),
            },
        }
    }

    pub fn nxapi(address: impl Into<String>, credential: Credential) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            transport: TransportKind::NxApi,
            snmp_version: SnmpVersion::V2c,
            credential,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// `host:port` for UDP transports, filling in the SNMP port when missing.
    pub fn socket_address(&self) -> String {
        let has_port = match self.address.rsplit_once(':') {
            Some((host, port)) => !host.contains(':') && port.parse::<u16>().is_ok(),
            None => false,
        };
        if has_port || self.address.starts_with('[') && self.address.contains("]:") {
            self.address.clone()
        } else if self.address.contains(':') {
            format!("[{}]:{SNMP_PORT}", self.address)
        } else {
            format!("{}:{SNMP_PORT}", self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn socket_addresses() {
        assert_eq!(Endpoint::snmp("192.168.30.1", "public").socket_address(), "192.168.30.1:161");
        assert_eq!(Endpoint::snmp("c2960g:1161", "public").socket_address(), "c2960g:1161");
        assert_eq!(Endpoint::snmp("fe80::1", "public").socket_address(), "[fe80::1]:161");
        assert_eq!(Endpoint::snmp("[fe80::1]:1161", "public").socket_address(), "[fe80::1]:1161");
    }

    #[test]
    fn basic_credentials() {
        let credential = Credential::parse_basic("admin:pa:ss").unwrap();
        assert_eq!(credential.basic(), Some(("admin", "pa:ss")));
        assert!(Credential::parse_basic("admin").is_none());
        assert!(Credential::parse_basic(":secret").is_none());
    }

    #[test]
    fn debug_hides_secrets() {
        let endpoint = Endpoint::nxapi("n9k", Credential::parse_basic("admin:hunter2").unwrap());
        let rendered = format!("{endpoint:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn endpoints_from_yaml() {
        let yaml = r#"
- name: c2960g
  address: 192.168.30.1
  transport: snmp
  community: public
- name: nexus5k-top
  address: 10.93.234.5
  transport: nxapi
  username: admin
  password: secret
"#;
        let endpoints: Vec<Endpoint> = serde_yml::from_str(yaml).unwrap();
        assert_eq!(endpoints[0], Endpoint::snmp("192.168.30.1", "public").with_name("c2960g"));
        assert_eq!(endpoints[1].transport, TransportKind::NxApi);
        assert_eq!(endpoints[1].credential.basic(), Some(("admin", "secret")));
    }

    #[test]
    fn transport_names() {
        assert_eq!(TransportKind::NxApi.to_string(), "nxapi");
        assert_eq!("snmp".parse::<TransportKind>().unwrap(), TransportKind::Snmp);
        assert!("telnet".parse::<TransportKind>().is_err());
    }
}
