use crate::{
    Credential,
    Endpoint,
};
use clap::Parser;
use eyre::{
    bail,
    Result,
};
use std::path::PathBuf;

/// Stickypipe agent: polls switches for interface counters.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Path to a YAML configuration file layered over the built-in defaults.
    #[clap(long, env = "STICKYPIPE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pause between two polling cycles (e.g. "30s", "5m").
    #[clap(long, env = "STICKYPIPE_INTERVAL", value_name = "DURATION")]
    pub interval: Option<String>,

    /// Bound for a single metric query against one device.
    #[clap(long, env = "STICKYPIPE_FETCH_TIMEOUT", value_name = "DURATION")]
    pub fetch_timeout: Option<String>,

    /// Bound for one SNMP request; a walk is several requests. Must stay below the fetch timeout.
    #[clap(long, env = "STICKYPIPE_SNMP_TIMEOUT", value_name = "DURATION")]
    pub snmp_timeout: Option<String>,

    /// Comma separated SNMP devices, e.g. "192.168.30.1,c2960g,nexus5k-top".
    #[clap(long, env = "SWITCHES", value_delimiter = ',', value_name = "HOSTS")]
    pub switches: Vec<String>,

    /// SNMP community used for every device given with `--switches`.
    #[clap(long, env = "COMMUNITY", default_value = "public")]
    pub community: String,

    /// Comma separated NX-API devices.
    #[clap(long, env = "SP_ENDPOINTS", value_delimiter = ',', value_name = "HOSTS")]
    pub endpoints: Vec<String>,

    /// Comma separated `user:password` pairs, one per `--endpoints` entry.
    #[clap(long, env = "SP_ENDPOINT_CREDENTIALS", value_delimiter = ',', value_name = "CREDENTIALS")]
    pub endpoint_credentials: Vec<String>,

    /// Upstream collector URL. Results are printed as JSON lines when unset.
    #[clap(long, env = "STICKYPIPE_URL", value_name = "URL")]
    pub sink_url: Option<String>,

    #[clap(long, env = "CONSUMERID")]
    pub consumer_id: Option<String>,

    #[clap(long, env = "CONSUMERSECRET")]
    pub consumer_secret: Option<String>,

    /// Run a single cycle and exit.
    #[clap(long, action)]
    pub once: bool,

    /// Log at debug level.
    #[clap(short, long, action)]
    pub verbose: bool,
}

impl Args {
    /// Endpoints named on the command line or in the environment.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut endpoints = self
            .switches
            .iter()
            .map(|host| host.trim())
            .filter(|host| !host.is_empty())
            .map(|host| Endpoint::snmp(host, self.community.clone()))
            .collect::<Vec<_>>();

        let hosts = self
            .endpoints
            .iter()
            .map(|host| host.trim())
            .filter(|host| !host.is_empty())
            .collect::<Vec<_>>();
        if hosts.len() != self.endpoint_credentials.len() {
            bail!(
                "each endpoint needs a corresponding credential ({} endpoints, {} credentials)",
                hosts.len(),
                self.endpoint_credentials.len()
            );
        }

        for (host, credential) in hosts.into_iter().zip(&self.endpoint_credentials) {
            let Some(credential) = Credential::parse_basic(credential.trim()) else {
                bail!("credentials for {host} must be of the form user:password");
            };
            endpoints.push(Endpoint::nxapi(host, credential));
        }

        Ok(endpoints)
    }
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
        ValueKind,
    };
    use std::collections::HashMap;

    fn endpoint_value(endpoint: &Endpoint) -> ValueKind {
        let mut table = HashMap::<String, Value>::from_iter([
            ("name".to_string(), endpoint.name.clone().into()),
            ("address".to_string(), endpoint.address.clone().into()),
            ("transport".to_string(), endpoint.transport.to_string().into()),
            ("snmp_version".to_string(), endpoint.snmp_version.to_string().into()),
        ]);
        match &endpoint.credential {
            Credential::Community { community } => {
                table.insert("community".to_string(), community.clone().into());
            }
            Credential::Basic { username, password } => {
                table.insert("username".to_string(), username.clone().into());
                table.insert("password".to_string(), password.clone().into());
            }
        }
        ValueKind::Table(table)
    }

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(interval) = &self.interval {
                cache.insert("interval".to_string(), interval.clone().into());
            }
            if let Some(fetch_timeout) = &self.fetch_timeout {
                cache.insert("fetch_timeout".to_string(), fetch_timeout.clone().into());
            }
            if let Some(snmp_timeout) = &self.snmp_timeout {
                cache.insert("snmp_request_timeout".to_string(), snmp_timeout.clone().into());
            }

            let endpoints = self
                .endpoints()
                .map_err(|err| config::ConfigError::Message(err.to_string()))?;
            if !endpoints.is_empty() {
                cache.insert(
                    "endpoints".to_string(),
                    endpoints.iter().map(endpoint_value).collect::<Vec<_>>().into(),
                );
            }

            if let Some(url) = &self.sink_url {
                cache.insert("sink.url".to_string(), url.clone().into());
            }
            if let Some(consumer_id) = &self.consumer_id {
                cache.insert("sink.consumer_id".to_string(), consumer_id.clone().into());
            }
            if let Some(consumer_secret) = &self.consumer_secret {
                cache.insert("sink.consumer_secret".to_string(), consumer_secret.clone().into());
            }
            if self.once {
                cache.insert("once".to_string(), true.into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
Authors: {author}

Config directory: {config_dir_path}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportKind;
    use pretty_assertions::assert_eq;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(["stickypipe-agent"].iter().chain(extra))
    }

    #[test]
    fn switches_become_snmp_endpoints() {
        let args = args(&["--switches", "192.168.30.1,c2960g, nexus5k-top", "--community", "private"]);
        let endpoints = args.endpoints().unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[2], Endpoint::snmp("nexus5k-top", "private"));
    }

    #[test]
    fn nxapi_endpoints_need_one_credential_each() {
        let ok = args(&["--endpoints", "n9k-a,n9k-b", "--endpoint-credentials", "admin:a,admin:b"]);
        let endpoints = ok.endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|e| e.transport == TransportKind::NxApi));
        assert_eq!(endpoints[1].credential.basic(), Some(("admin", "b")));

        let missing = args(&["--endpoints", "n9k-a,n9k-b", "--endpoint-credentials", "admin:a"]);
        assert!(missing.endpoints().is_err());

        let malformed = args(&["--endpoints", "n9k-a", "--endpoint-credentials", "admin"]);
        assert!(malformed.endpoints().is_err());
    }
}
