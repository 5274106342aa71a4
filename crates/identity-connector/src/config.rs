use std::{env, path::PathBuf, str::FromStr, time::Duration};

use ledger_client::Network;
use url::Url;

use crate::{Error, ErrorCode};

pub const DEFAULT_GAS_BUDGET: u64 = 1_000_000_000;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_VAULT_DIRPATH: &str = "./vault";

/// What happens to the vault key of a removed verification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRetention {
    /// Keep the key, signatures made with it can still be reproduced.
    #[default]
    Retain,
    Delete,
}

impl FromStr for KeyRetention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retain" => Ok(KeyRetention::Retain),
            "delete" => Ok(KeyRetention::Delete),
            _ => Err(format!("unknown key retention policy: {s}")),
        }
    }
}

/// Required relation between the subject of presented credentials and the
/// holder of the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubjectHolderRelationship {
    /// Every credential subject must be the holder.
    #[default]
    AlwaysSubject,
    Any,
}

impl FromStr for SubjectHolderRelationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always-subject" => Ok(SubjectHolderRelationship::AlwaysSubject),
            "any" => Ok(SubjectHolderRelationship::Any),
            _ => Err(format!("unknown subject holder relationship: {s}")),
        }
    }
}

/// Connector settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub rpc_url: Option<Url>,
    /// Expected network; detected from the node when absent.
    pub network: Option<Network>,
    pub gas_station_url: Option<Url>,
    pub gas_station_token: Option<String>,
    pub gas_budget: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub vault_dirpath: PathBuf,
    pub vault_master_key: Option<[u8; 32]>,
    pub key_retention: KeyRetention,
    pub subject_holder_relationship: SubjectHolderRelationship,
    /// Amount a wallet transfers to a signer without gas coins.
    pub funding_amount: Option<u64>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            network: None,
            gas_station_url: None,
            gas_station_token: None,
            gas_budget: DEFAULT_GAS_BUDGET,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            vault_dirpath: PathBuf::from(DEFAULT_VAULT_DIRPATH),
            vault_master_key: None,
            key_retention: KeyRetention::default(),
            subject_holder_relationship: SubjectHolderRelationship::default(),
            funding_amount: None,
        }
    }
}

impl ConnectorConfig {
    /// Reads the configuration from environment variables, falling back to
    /// defaults for the absent ones.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            rpc_url: parse(&lookup, "LEDGER_RPC_URL")?,
            network: parse(&lookup, "LEDGER_NETWORK")?,
            gas_station_url: parse(&lookup, "GAS_STATION_URL")?,
            gas_station_token: lookup("GAS_STATION_TOKEN").filter(|token| !token.is_empty()),
            gas_budget: parse(&lookup, "GAS_BUDGET")?.unwrap_or(defaults.gas_budget),
            confirmation_timeout: parse(&lookup, "CONFIRMATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_timeout),
            poll_interval: parse(&lookup, "CONFIRMATION_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            vault_dirpath: lookup("VAULT_DIRPATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.vault_dirpath),
            vault_master_key: lookup("VAULT_MASTER_KEY")
                .map(|hex_key| parse_master_key(&hex_key))
                .transpose()?,
            key_retention: parse(&lookup, "KEY_RETENTION")?.unwrap_or_default(),
            subject_holder_relationship: parse(&lookup, "SUBJECT_HOLDER_RELATIONSHIP")?.unwrap_or_default(),
            funding_amount: parse(&lookup, "FUNDING_AMOUNT")?,
        })
    }

    /// Whether transactions can be sponsored.
    pub fn has_gas_station(&self) -> bool {
        self.gas_station_url.is_some()
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| Error::general(ErrorCode::ConfigurationInvalid, format!("{key}: {err}"))),
    }
}

/// Decodes a 32-byte master key from 64 hex characters.
pub fn parse_master_key(hex_key: &str) -> Result<[u8; 32], Error> {
    let invalid = || Error::general(ErrorCode::ConfigurationInvalid, "VAULT_MASTER_KEY must be 64 hex characters");

    hex::decode(hex_key.trim())
        .map_err(|_| invalid())?
        .try_into()
        .map_err(|_| invalid())
}
