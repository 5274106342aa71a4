//! Command line definitions and their dispatch onto the connector.

use std::{fs, path::PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use did_utils::{didcore::MethodScope, proof::Proof};
use eyre::{eyre, WrapErr};
use identity_connector::{Connector, ConnectorConfig, CredentialRequest, PublishOptions};
use ledger_client::Network;
use serde_json::{json, Value};
use url::Url;

use crate::output::{Output, OutputArgs};

/// Manage ledger-anchored DIDs, verifiable credentials and data integrity proofs.
#[derive(Debug, Parser)]
#[command(name = "ledger-identity", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Name under which the controller's seed and keys are kept in the vault.
    #[arg(long, env = "CONTROLLER", default_value = "default", global = true)]
    pub controller: String,

    /// 32-byte controller seed, hex encoded. Replaces the stored seed.
    #[arg(long, value_name = "HEX", value_parser = parse_seed, global = true)]
    pub seed: Option<[u8; 32]>,

    /// Let the gas station pay for the transaction.
    #[arg(long, global = true)]
    pub sponsored: bool,

    /// Overrides GAS_BUDGET for this transaction.
    #[arg(long, global = true)]
    pub gas_budget: Option<u64>,

    /// Overrides LEDGER_RPC_URL.
    #[arg(long, value_name = "URL", global = true)]
    pub rpc_url: Option<Url>,

    /// Overrides LEDGER_NETWORK.
    #[arg(long, global = true)]
    pub network: Option<Network>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create and publish a new identity.
    IdentityCreate,

    /// Resolve a DID to its current document.
    IdentityResolve {
        #[arg(long)]
        did: String,
    },

    /// Generate a key and publish it as a verification method.
    VerificationMethodAdd {
        #[arg(long)]
        did: String,

        /// Relationship of the method, e.g. authentication or assertionMethod.
        #[arg(long, default_value = "verificationMethod")]
        scope: MethodScope,

        /// Defaults to the JWK thumbprint of the new key.
        #[arg(long)]
        fragment: Option<String>,
    },

    /// Remove a verification method.
    VerificationMethodRemove {
        #[arg(long)]
        did: String,

        #[arg(long)]
        fragment: String,
    },

    /// Add or replace a service.
    ServiceAdd {
        #[arg(long)]
        did: String,

        #[arg(long)]
        fragment: String,

        #[arg(long = "type", value_name = "TYPE", required = true)]
        types: Vec<String>,

        #[arg(long = "endpoint", value_name = "URL", required = true)]
        endpoints: Vec<String>,
    },

    /// Remove a service.
    ServiceRemove {
        #[arg(long)]
        did: String,

        #[arg(long)]
        fragment: String,
    },

    /// Issue a JWT credential.
    VerifiableCredentialCreate(CredentialCreateArgs),

    /// Validate a JWT credential and report its revocation state.
    VerifiableCredentialCheck {
        /// The token, or @FILE to read it from a file.
        #[arg(long)]
        jwt: String,
    },

    /// Revoke credentials by their revocation bitmap index.
    VerifiableCredentialRevoke {
        #[arg(long)]
        did: String,

        #[arg(long = "index", value_name = "INDEX", required = true)]
        indices: Vec<u32>,
    },

    /// Reinstate revoked credentials.
    VerifiableCredentialUnrevoke {
        #[arg(long)]
        did: String,

        #[arg(long = "index", value_name = "INDEX", required = true)]
        indices: Vec<u32>,
    },

    /// Wrap credentials into a JWT presentation.
    VerifiablePresentationCreate {
        #[arg(long)]
        holder: String,

        #[arg(long)]
        fragment: String,

        /// A credential token, or @FILE. Repeatable.
        #[arg(long = "credential", value_name = "JWT", required = true)]
        credentials: Vec<String>,

        /// RFC 3339 timestamp.
        #[arg(long)]
        expiration_date: Option<DateTime<Utc>>,
    },

    /// Validate a JWT presentation and the credentials it holds.
    VerifiablePresentationCheck {
        /// The token, or @FILE to read it from a file.
        #[arg(long)]
        jwt: String,
    },

    /// Sign a JSON document with a data integrity proof.
    ProofCreate {
        #[arg(long)]
        did: String,

        #[arg(long)]
        fragment: String,

        /// JSON document, or @FILE.
        #[arg(long)]
        payload: String,

        #[arg(long = "type", value_enum, default_value_t = ProofSuite::EddsaJcs2022)]
        proof_type: ProofSuite,
    },

    /// Check a data integrity proof over a JSON document.
    ProofVerify {
        /// JSON document, or @FILE.
        #[arg(long)]
        payload: String,

        /// JSON proof, or @FILE.
        #[arg(long)]
        proof: String,
    },
}

#[derive(Debug, Args)]
pub struct CredentialCreateArgs {
    #[arg(long)]
    pub issuer: String,

    /// Fragment of the issuer's signing method.
    #[arg(long)]
    pub fragment: String,

    /// JSON-LD subject, or @FILE.
    #[arg(long)]
    pub subject: String,

    /// Additional credential type. Repeatable.
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,

    /// Additional JSON-LD context. Repeatable.
    #[arg(long = "context", value_name = "URL")]
    pub contexts: Vec<String>,

    /// Identifier of the credential itself.
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub revocation_index: Option<u32>,

    /// RFC 3339 timestamp.
    #[arg(long)]
    pub expiration_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProofSuite {
    #[value(name = "eddsa-jcs-2022")]
    EddsaJcs2022,
    #[value(name = "JcsEd25519Signature2020")]
    JcsEd25519Signature2020,
}

impl From<ProofSuite> for did_utils::proof::ProofType {
    fn from(suite: ProofSuite) -> Self {
        match suite {
            ProofSuite::EddsaJcs2022 => Self::EdDsaJcs2022,
            ProofSuite::JcsEd25519Signature2020 => Self::JcsEd25519Signature2020,
        }
    }
}

fn parse_seed(value: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(value.trim_start_matches("0x")).map_err(|err| format!("seed is not hex: {err}"))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| format!("seed must be 32 bytes, got {}", bytes.len()))
}

/// Reads an argument given inline or as `@path`.
fn read_arg(value: &str) -> eyre::Result<String> {
    match value.strip_prefix('@') {
        Some(path) => fs::read_to_string(PathBuf::from(path))
            .map(|contents| contents.trim().to_string())
            .wrap_err_with(|| format!("could not read {path}")),
        None => Ok(value.to_string()),
    }
}

fn read_json(value: &str) -> eyre::Result<Value> {
    let raw = read_arg(value)?;
    serde_json::from_str(&raw).wrap_err("argument is not valid JSON")
}

impl Cli {
    pub async fn run(self) -> eyre::Result<()> {
        let output = self.command.execute(&self.common).await?;
        output.emit(&self.output)
    }
}

impl CommonArgs {
    fn config(&self) -> eyre::Result<ConnectorConfig> {
        let mut config = ConnectorConfig::from_env()?;
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = Some(rpc_url.clone());
        }
        if let Some(network) = self.network {
            config.network = Some(network);
        }
        Ok(config)
    }

    async fn connector(&self) -> eyre::Result<Connector> {
        let config = self.config()?;
        if config.rpc_url.is_none() {
            return Err(eyre!("LEDGER_RPC_URL or --rpc-url is required"));
        }
        Ok(Connector::from_config(config).await?)
    }

    /// A connector that signs for the controller, storing `--seed` first.
    async fn signing_connector(&self) -> eyre::Result<Connector> {
        let connector = self.connector().await?;
        if let Some(seed) = &self.seed {
            connector.set_controller_seed(&self.controller, seed).await?;
        }
        Ok(connector)
    }

    fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            sponsored: self.sponsored,
            gas_budget: self.gas_budget,
        }
    }
}

impl Command {
    async fn execute(self, common: &CommonArgs) -> eyre::Result<Output> {
        let controller = common.controller.as_str();
        let options = common.publish_options();

        match self {
            Command::IdentityCreate => {
                let connector = common.connector().await?;
                let created = connector.create_identity(controller, common.seed, options).await?;
                let did = created.published.did.clone();

                Ok(Output::new(format!("Created identity {did}"), &created)?
                    .with_variable("DID", did)
                    .with_variable("CONTROLLER", controller)
                    .with_variable("TRANSACTION_DIGEST", created.published.digest.as_str()))
            }
            Command::IdentityResolve { did } => {
                let document = common.connector().await?.resolve_identity(&did).await?;
                Ok(Output::new(format!("Resolved {}", document.id), &document)?.with_variable("DID", document.id))
            }
            Command::VerificationMethodAdd { did, scope, fragment } => {
                let connector = common.signing_connector().await?;
                let added = connector
                    .add_verification_method(controller, &did, scope, fragment.as_deref(), options)
                    .await?;
                let method_id = added.method.id.clone();

                Ok(Output::new(format!("Added {scope} method {method_id}"), &added)?
                    .with_variable("DID", did)
                    .with_variable("VERIFICATION_METHOD_ID", method_id))
            }
            Command::VerificationMethodRemove { did, fragment } => {
                let connector = common.signing_connector().await?;
                let published = connector
                    .remove_verification_method(controller, &did, &fragment, options)
                    .await?;
                Ok(Output::new(format!("Removed method {did}#{fragment}"), &published)?.with_variable("DID", did))
            }
            Command::ServiceAdd {
                did,
                fragment,
                types,
                endpoints,
            } => {
                let connector = common.signing_connector().await?;
                let published = connector
                    .add_service(controller, &did, &fragment, types, endpoints, options)
                    .await?;
                Ok(Output::new(format!("Published service {did}#{fragment}"), &published)?
                    .with_variable("DID", did.as_str())
                    .with_variable("SERVICE_ID", format!("{did}#{fragment}")))
            }
            Command::ServiceRemove { did, fragment } => {
                let connector = common.signing_connector().await?;
                let published = connector.remove_service(controller, &did, &fragment, options).await?;
                Ok(Output::new(format!("Removed service {did}#{fragment}"), &published)?.with_variable("DID", did))
            }
            Command::VerifiableCredentialCreate(args) => {
                let connector = common.signing_connector().await?;
                let request = CredentialRequest {
                    fragment: args.fragment,
                    subject: read_json(&args.subject)?,
                    types: args.types,
                    contexts: args.contexts.into_iter().map(Value::String).collect(),
                    id: args.id,
                    revocation_index: args.revocation_index,
                    expiration_date: args.expiration_date,
                };
                let issued = connector
                    .create_verifiable_credential(controller, &args.issuer, request)
                    .await?;

                let mut output = Output::new("Issued credential", &issued)?.with_variable("CREDENTIAL_JWT", issued.jwt);
                if let Some(index) = args.revocation_index {
                    output = output.with_variable("REVOCATION_INDEX", index.to_string());
                }
                Ok(output)
            }
            Command::VerifiableCredentialCheck { jwt } => {
                let check = common
                    .connector()
                    .await?
                    .check_verifiable_credential(&read_arg(&jwt)?)
                    .await?;
                let message = match check.revoked {
                    true => "Credential is valid but revoked",
                    false => "Credential is valid",
                };
                Ok(Output::new(message, &check)?.with_variable("CREDENTIAL_REVOKED", check.revoked.to_string()))
            }
            Command::VerifiableCredentialRevoke { did, indices } => {
                let connector = common.signing_connector().await?;
                let published = connector
                    .revoke_verifiable_credentials(controller, &did, &indices, options)
                    .await?;
                Ok(Output::new(format!("Revoked {indices:?} on {did}"), &published)?.with_variable("DID", did))
            }
            Command::VerifiableCredentialUnrevoke { did, indices } => {
                let connector = common.signing_connector().await?;
                let published = connector
                    .unrevoke_verifiable_credentials(controller, &did, &indices, options)
                    .await?;
                Ok(Output::new(format!("Unrevoked {indices:?} on {did}"), &published)?.with_variable("DID", did))
            }
            Command::VerifiablePresentationCreate {
                holder,
                fragment,
                credentials,
                expiration_date,
            } => {
                let connector = common.signing_connector().await?;
                let credentials = credentials
                    .iter()
                    .map(|credential| read_arg(credential))
                    .collect::<eyre::Result<Vec<_>>>()?;
                let issued = connector
                    .create_verifiable_presentation(controller, &holder, &fragment, credentials, expiration_date)
                    .await?;
                Ok(Output::new("Created presentation", &issued)?.with_variable("PRESENTATION_JWT", issued.jwt))
            }
            Command::VerifiablePresentationCheck { jwt } => {
                let check = common
                    .connector()
                    .await?
                    .check_verifiable_presentation(&read_arg(&jwt)?)
                    .await?;
                let revoked = check.credentials.iter().filter(|credential| credential.revoked).count();
                Ok(Output::new(
                    format!(
                        "Presentation by {} is valid, {revoked} of {} credentials revoked",
                        check.holder,
                        check.credentials.len()
                    ),
                    &check,
                )?
                .with_variable("HOLDER", check.holder.as_str()))
            }
            Command::ProofCreate {
                did,
                fragment,
                payload,
                proof_type,
            } => {
                let connector = common.signing_connector().await?;
                let payload = read_json(&payload)?;
                let proof = connector
                    .create_proof(controller, &did, &fragment, &payload, proof_type.into())
                    .await?;
                Ok(Output::new("Created proof", &proof)?
                    .with_variable("VERIFICATION_METHOD_ID", proof.verification_method.as_str()))
            }
            Command::ProofVerify { payload, proof } => {
                let payload = read_json(&payload)?;
                let proof: Proof = serde_json::from_value(read_json(&proof)?).wrap_err("argument is not a proof")?;
                let verified = common.connector().await?.verify_proof(&payload, &proof).await?;
                if !verified {
                    return Err(eyre!("proof does not match the payload"));
                }
                Ok(Output::new("Proof is valid", &json!({ "verified": verified }))?.with_variable("PROOF_VALID", "true"))
            }
        }
    }
}
