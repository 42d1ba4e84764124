//! Bearer token acquisition.

use failure::{Fallible, ResultExt};
use std::{fmt, io, process};

/// Default environment variable holding an access token.
pub(crate) static DEFAULT_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";

/// Where to source the management API token from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum TokenSource {
    /// Read from an environment variable.
    Env(String),
    /// Ask the Azure CLI, using its logged-in context.
    AzureCli,
}

impl TokenSource {
    pub(crate) fn try_from_config(source: &str, env_var: &str) -> Fallible<Self> {
        let env_var = if env_var.is_empty() {
            DEFAULT_TOKEN_ENV
        } else {
            env_var
        };
        let source = match source {
            "" | "env" => TokenSource::Env(env_var.to_string()),
            "azure-cli" | "az" => TokenSource::AzureCli,
            x => bail!("unsupported token source '{}'", x),
        };
        Ok(source)
    }
}

/// Access token for the management API.
#[derive(Clone)]
pub(crate) struct Credential {
    token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credential {
    pub(crate) fn from_token<S: Into<String>>(token: S) -> Fallible<Self> {
        let token = token.into().trim().to_string();
        ensure!(!token.is_empty(), "empty access token");
        Ok(Self { token })
    }

    /// Acquire a token from the configured source.
    pub(crate) fn acquire(source: &TokenSource, resource: &str) -> Fallible<Self> {
        match source {
            TokenSource::Env(name) => {
                trace!("reading access token from ${}", name);
                let token = std::env::var(name).context(format!(
                    "access token not found, set ${} or use the 'azure-cli' token source",
                    name
                ))?;
                Self::from_token(token)
            }
            TokenSource::AzureCli => {
                debug!("requesting access token from Azure CLI");
                let output = process::Command::new("az")
                    .args(&[
                        "account",
                        "get-access-token",
                        "--resource",
                        resource,
                        "--output",
                        "json",
                    ])
                    .output();
                let output = match output {
                    Ok(o) => o,
                    Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                        bail!("Azure CLI ('az') not found in PATH, install it or use the 'env' token source")
                    }
                    Err(e) => return Err(format_err!("failed to run Azure CLI: {}", e)),
                };
                if !output.status.success() {
                    bail!(
                        "Azure CLI failed ({}), try 'az login': {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                parse_cli_token(&output.stdout)
            }
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    expires_on: Option<String>,
}

fn parse_cli_token(raw: &[u8]) -> Fallible<Credential> {
    let parsed: CliToken =
        serde_json::from_slice(raw).context("failed to parse Azure CLI token output")?;
    if let Some(exp) = &parsed.expires_on {
        debug!("Azure CLI token expires on {}", exp);
    }
    Credential::from_token(parsed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_source_from_config() {
        assert_eq!(
            TokenSource::try_from_config("", "").unwrap(),
            TokenSource::Env(DEFAULT_TOKEN_ENV.to_string())
        );
        assert_eq!(
            TokenSource::try_from_config("env", "MY_TOKEN").unwrap(),
            TokenSource::Env("MY_TOKEN".to_string())
        );
        assert_eq!(
            TokenSource::try_from_config("azure-cli", "").unwrap(),
            TokenSource::AzureCli
        );
        assert!(TokenSource::try_from_config("msi", "").is_err());
    }

    #[test]
    fn token_from_env() {
        let var = "DIAGLOG_TEST_TOKEN_FROM_ENV";
        std::env::set_var(var, " secret-token\n");
        let cred = Credential::acquire(&TokenSource::Env(var.to_string()), "").unwrap();
        assert_eq!(cred.token(), "secret-token");
        assert!(!format!("{:?}", cred).contains("secret"));

        let missing = TokenSource::Env("DIAGLOG_TEST_TOKEN_MISSING".to_string());
        assert!(Credential::acquire(&missing, "").is_err());
    }

    #[test]
    fn cli_output() {
        let raw = br#"{"accessToken": "eyJ0", "expiresOn": "2026-10-19 12:00:00.000000", "tokenType": "Bearer"}"#;
        assert_eq!(parse_cli_token(raw).unwrap().token(), "eyJ0");
        assert!(parse_cli_token(br#"{"accessToken": ""}"#).is_err());
        assert!(parse_cli_token(b"not json").is_err());
    }
}
