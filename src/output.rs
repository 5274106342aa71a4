//! Console, JSON and `.env` output of a finished command.

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::WrapErr;
use serde::Serialize;
use serde_json::Value;

/// Where to copy a command's result besides the console.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct OutputArgs {
    /// Write the full result as JSON to this file.
    #[arg(long = "json", value_name = "FILE", global = true)]
    pub json: Option<PathBuf>,

    /// Write the resulting identifiers as KEY=value lines to this file.
    #[arg(long = "env", value_name = "FILE", global = true)]
    pub env: Option<PathBuf>,
}

/// The result of a successful command.
#[derive(Debug)]
pub struct Output {
    pub message: String,
    pub result: Value,
    pub variables: Vec<(&'static str, String)>,
}

impl Output {
    pub fn new(message: impl Into<String>, result: &impl Serialize) -> eyre::Result<Self> {
        Ok(Self {
            message: message.into(),
            result: serde_json::to_value(result).wrap_err("could not serialize the result")?,
            variables: vec![],
        })
    }

    pub fn with_variable(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.variables.push((name, value.into()));
        self
    }

    /// Prints the result then writes the requested files.
    pub fn emit(&self, args: &OutputArgs) -> eyre::Result<()> {
        println!("{}", self.message);
        println!("{}", serde_json::to_string_pretty(&self.result)?);

        if let Some(path) = &args.json {
            let contents = serde_json::to_string_pretty(&self.result)?;
            write_file(path, &contents)?;
            tracing::info!("wrote {}", path.display());
        }
        if let Some(path) = &args.env {
            write_file(path, &self.env_file())?;
            tracing::info!("wrote {}", path.display());
        }
        Ok(())
    }

    fn env_file(&self) -> String {
        self.variables
            .iter()
            .map(|(name, value)| format!("{name}={}\n", quote(value)))
            .collect()
    }
}

fn quote(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || ":#._-/".contains(c)) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

// Written to a sibling temporary file, then renamed over the target.
fn write_file(path: &Path, contents: &str) -> eyre::Result<()> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");

    fs::write(&temporary, contents).wrap_err_with(|| format!("could not write {}", path.display()))?;
    fs::rename(&temporary, path).wrap_err_with(|| format!("could not write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_env_file_quotes_when_needed() {
        let output = Output::new("done", &json!({}))
            .unwrap()
            .with_variable("DID", "did:iota:testnet:0x01")
            .with_variable("KEY_ID", "did:iota:testnet:0x01#key-1")
            .with_variable("NAME", "Alice \"A\" Smith");

        assert_eq!(
            output.env_file(),
            "DID=did:iota:testnet:0x01\nKEY_ID=did:iota:testnet:0x01#key-1\nNAME=\"Alice \\\"A\\\" Smith\"\n"
        );
    }

    #[test]
    fn test_emit_writes_requested_files() {
        let dir = TempDir::new("output").unwrap();
        let args = OutputArgs {
            json: Some(dir.path().join("result.json")),
            env: Some(dir.path().join("result.env")),
        };

        Output::new("done", &json!({"did": "did:iota:0x01"}))
            .unwrap()
            .with_variable("DID", "did:iota:0x01")
            .emit(&args)
            .unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("result.json")).unwrap()).unwrap();
        assert_eq!(written, json!({"did": "did:iota:0x01"}));
        assert_eq!(fs::read_to_string(dir.path().join("result.env")).unwrap(), "DID=did:iota:0x01\n");
        assert!(!dir.path().join("result.json.tmp").exists());
    }

    #[test]
    fn test_console_only() {
        let args = OutputArgs::default();
        assert!(args.json.is_none() && args.env.is_none());
        Output::new("done", &json!(null)).unwrap().emit(&args).unwrap();
    }
}
