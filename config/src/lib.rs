#[macro_use]
extern crate tracing;

mod app_config;
mod args;
pub mod duration;
mod endpoint;
mod query;

pub use app_config::get_config_dir;
pub use args::Args;
pub use endpoint::{
    Credential,
    Endpoint,
    SnmpVersion,
    TransportKind,
    SNMP_PORT,
};
use eyre::{
    bail,
    Context as _,
    Result,
};
pub use query::{
    parse_oid,
    Query,
    QuerySets,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    time::Duration,
};
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Pause between the end of one cycle and the start of the next.
    #[serde(with = "duration")]
    pub interval: Duration,
    #[serde(with = "duration")]
    pub fetch_timeout: Duration,
    /// Bound for a single SNMP request. A silent device fails its first request within this,
    /// well inside `fetch_timeout`, and is reported unreachable.
    #[serde(with = "duration")]
    pub snmp_request_timeout: Duration,
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub queries: QuerySets,
    pub completeness: Completeness,
    #[serde(default)]
    pub sink: SinkConfig,
}

/// Which records are fit to emit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completeness {
    /// Label whose value names the device.
    pub identity_label: String,
    #[serde(default)]
    pub snmp: Vec<String>,
    #[serde(default)]
    pub nxapi: Vec<String>,
}

impl Completeness {
    pub fn mandatory(&self, transport: TransportKind) -> &[String] {
        match transport {
            TransportKind::Snmp => &self.snmp,
            TransportKind::NxApi => &self.nxapi,
        }
    }
}

impl QuerySets {
    pub fn for_transport(&self, transport: TransportKind) -> &[Query] {
        match transport {
            TransportKind::Snmp => &self.snmp,
            TransportKind::NxApi => &self.nxapi,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinkConfig {
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub consumer_id: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
    /// Bound for one delivery, so a stuck upstream cannot hold up the next cycle.
    #[serde(with = "duration", default = "default_sink_timeout")]
    pub timeout: Duration,
}

fn default_sink_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: None,
            consumer_id: None,
            consumer_secret: None,
            timeout: default_sink_timeout(),
        }
    }
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl Config {
    /// Defaults, then the user's config file, then the command line.
    pub fn new(args: &Args) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let (path, required) = match &args.config {
            Some(path) => (path.clone(), true),
            None => (get_config_dir().join("config.yaml"), false),
        };
        debug!(?path, required, "Loading configuration file");
        builder = builder.add_source(
            config::File::from(path.clone())
                .format(config::FileFormat::Yaml)
                .required(required),
        );
        builder = builder.add_source(args.clone());

        let cfg: Self = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .wrap_err_with(|| format!("Failed to load configuration (file {path:?})"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            bail!("interval must be greater than zero");
        }
        if self.fetch_timeout.is_zero() {
            bail!("fetch_timeout must be greater than zero");
        }
        if self.snmp_request_timeout.is_zero() || self.snmp_request_timeout >= self.fetch_timeout {
            bail!(
                "snmp_request_timeout ({:?}) must be greater than zero and below fetch_timeout ({:?})",
                self.snmp_request_timeout,
                self.fetch_timeout
            );
        }
        if self.sink.timeout.is_zero() {
            bail!("sink.timeout must be greater than zero");
        }
        if self.endpoints.is_empty() {
            bail!("no endpoints configured; use --switches, --endpoints or the endpoints list of the config file");
        }
        if self.completeness.identity_label.trim().is_empty() {
            bail!("completeness.identity_label must not be empty");
        }

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            if !names.insert(endpoint.name.as_str()) {
                bail!("endpoint {} is configured twice", endpoint.name);
            }
            match endpoint.transport {
                TransportKind::Snmp if endpoint.credential.community().is_none() => {
                    bail!("SNMP endpoint {} needs a community", endpoint.name)
                }
                TransportKind::NxApi if endpoint.credential.basic().is_none() => {
                    bail!("NX-API endpoint {} needs a username and password", endpoint.name)
                }
                _ => {}
            }
        }

        let transports = self.endpoints.iter().map(|e| e.transport).collect::<HashSet<_>>();
        for transport in transports {
            self.validate_queries(transport)?;
        }
        Ok(())
    }

    fn validate_queries(&self, transport: TransportKind) -> Result<()> {
        let queries = self.queries.for_transport(transport);
        if queries.is_empty() {
            bail!("{transport} endpoints are configured but queries.{transport} is empty");
        }

        let mut labels = HashSet::new();
        for query in queries {
            if !labels.insert(query.label.as_str()) {
                bail!("label {} is populated by more than one {transport} query", query.label);
            }
            match transport {
                TransportKind::Snmp if parse_oid(&query.identifier).is_none() => {
                    bail!("{} is not a numeric OID (label {})", query.identifier, query.label)
                }
                TransportKind::NxApi if query.field.is_none() => {
                    bail!("NX-API query {:?} (label {}) needs a field", query.identifier, query.label)
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn with_file(contents: &str, extra: &[&str]) -> (TempDir, Args) {
        let dir = TempDir::new().unwrap();
        let path = dir.child("config.yaml");
        std::fs::write(&path, contents).unwrap();
        let path = path.to_str().unwrap().to_string();
        let argv = ["stickypipe-agent", "--config", path.as_str()]
            .into_iter()
            .chain(extra.iter().copied())
            .collect::<Vec<_>>();
        (dir, Args::parse_from(argv))
    }

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.snmp_request_timeout, Duration::from_secs(1));
        assert_eq!(config.sink.timeout, Duration::from_secs(10));
        assert_eq!(config.queries.snmp.len(), 7);
        assert_eq!(
            config.completeness.mandatory(TransportKind::Snmp),
            ["name", "ifInOctets", "ifHCInOctets", "ifOutOctets", "ifHCOutOctets", "ifHighSpeed"]
        );
        assert!(config.endpoints.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_and_args_are_layered() {
        let (_dir, args) = with_file(
            r#"
interval: 30s
endpoints:
  - name: c2960g
    address: 192.168.30.1
    transport: snmp
    community: public
"#,
            &["--fetch-timeout", "2s", "--sink-url", "https://collector.example/pipe"],
        );
        let config = Config::new(&args).unwrap();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.endpoints, vec![Endpoint::snmp("192.168.30.1", "public").with_name("c2960g")]);
        assert_eq!(config.queries.snmp.len(), 7);
        assert_eq!(
            config.sink.url.as_ref().map(Url::as_str),
            Some("https://collector.example/pipe")
        );
    }

    #[test]
    fn command_line_endpoints_replace_file_endpoints() {
        let (_dir, args) = with_file(
            r#"
endpoints:
  - name: c2960g
    address: 192.168.30.1
    transport: snmp
    community: public
"#,
            &["--endpoints", "n9k", "--endpoint-credentials", "admin:secret"],
        );
        let config = Config::new(&args).unwrap();
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.endpoints[0].transport, TransportKind::NxApi);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let args = Args::parse_from(["stickypipe-agent", "--config", "/nonexistent/stickypipe.yaml"]);
        assert!(Config::new(&args).is_err());
    }

    #[test]
    fn validation() {
        let mut config = Config::default();
        config.endpoints = vec![Endpoint::snmp("c2960g", "public")];
        config.validate().unwrap();

        let mut duplicate = config.clone();
        duplicate.queries.snmp.push(Query::new(".1.3.6.1.2.1.2.2.1.8", "name"));
        assert!(duplicate.validate().is_err());

        let mut bad_oid = config.clone();
        bad_oid.queries.snmp[0].identifier = "sysName".to_string();
        assert!(bad_oid.validate().is_err());

        let mut wrong_credential = config.clone();
        wrong_credential.endpoints[0].credential = Credential::parse_basic("admin:secret").unwrap();
        assert!(wrong_credential.validate().is_err());

        let mut no_field = Config::default();
        no_field.endpoints = vec![Endpoint::nxapi("n9k", Credential::parse_basic("admin:secret").unwrap())];
        no_field.validate().unwrap();
        no_field.queries.nxapi[0].field = None;
        assert!(no_field.validate().is_err());

        let mut zero = config.clone();
        zero.interval = Duration::ZERO;
        assert!(zero.validate().is_err());

        let mut zero_sink = config.clone();
        zero_sink.sink.timeout = Duration::ZERO;
        assert!(zero_sink.validate().is_err());
    }

    #[test]
    fn snmp_request_timeout_stays_below_fetch_timeout() {
        let mut config = Config::default();
        config.endpoints = vec![Endpoint::snmp("c2960g", "public")];

        config.snmp_request_timeout = config.fetch_timeout;
        assert!(config.validate().is_err());

        config.snmp_request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config.snmp_request_timeout = Duration::from_millis(500);
        config.validate().unwrap();
    }

    #[test]
    fn snmp_timeout_from_the_command_line() {
        let (_dir, args) = with_file(
            "endpoints: []\n",
            &["--switches", "c2960g", "--snmp-timeout", "1500ms", "--fetch-timeout", "1s"],
        );
        let err = Config::new(&args).unwrap_err();
        assert!(err.to_string().contains("snmp_request_timeout"), "{err}");
    }
}
