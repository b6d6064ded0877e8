//! web-bot-auth-keytool: key management and request signing for web-bot-auth agents
//!
//! Generates agent keypairs, prints key identifiers and the JWKS key directory,
//! converts PEM keys and signs (optionally sends) requests.
//!
//! # Environment Variables
//!
//! - `WEB_BOT_AUTH_CONFIG`: path of the signer configuration (TOML)
//! - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: log level filter (default: `info`)

use std::{collections::BTreeSet, path::PathBuf, process::ExitCode};

use clap::Parser;
use reqwest::{Method, Request};
use tracing::{error, info, warn};
use url::Url;
use web_bot_auth::{
    Result, SignerConfig, SignerError,
    keys::{Jwk, Jwks, generate_agent_keypair, import_pem, key_id_from_file, load_keypair},
    signature::{RequestSigningOptions, sign_request},
    transport::SignedClient,
};

use crate::{
    cli::{Cli, Command},
    observability::init_observability,
};

mod cli;
mod observability;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_observability(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SignerConfig::from_file(path)?,
        None => SignerConfig::default(),
    };

    match cli.command {
        Command::Generate { agents, keys_dir } => {
            let keys_dir = keys_dir.unwrap_or_else(|| config.keys_dir.clone());
            for agent in agents {
                let generated = generate_agent_keypair(&keys_dir, &agent)?;
                info!(agent = %agent, key_id = %generated.key_id, "generated keypair");
                print_json(&serde_json::json!({
                    "agent_name": generated.agent_name,
                    "key_id": generated.key_id,
                    "private_key_path": generated.private_key_path,
                    "public_key_path": generated.public_key_path,
                }))?;
            }
        }
        Command::List => {
            if config.agents.is_empty() {
                warn!("no agents configured");
            }
            for (agent, entry) in &config.agents {
                let path = config.resolve_path(&entry.key);
                match key_id_from_file(&path) {
                    Ok(key_id) => println!("{agent}\t{key_id}\t{}", path.display()),
                    Err(SignerError::FileNotFound(_)) => {
                        println!("{agent}\t(keys not found)\t{}", path.display());
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Command::Thumbprint { key } => println!("{}", key_id_from_file(&key)?),
        Command::Jwks { keys } => {
            let paths: Vec<PathBuf> = if keys.is_empty() {
                config.agents.values().map(|entry| config.resolve_path(&entry.key)).collect()
            } else {
                keys
            };
            println!("{}", directory(&paths)?.to_json()?);
        }
        Command::ImportPem { pem, output } => {
            let key_id = import_pem(&pem, &output)?;
            info!(output = %output.display(), "converted PEM key to JWK");
            println!("{key_id}");
        }
        Command::Sign { url, agent, key, signature_agent, components, method, send } => {
            let mut options = match key {
                Some(key) => {
                    let mut options = RequestSigningOptions::new(key)
                        .with_validity(config.validity())
                        .with_preset(config.components);
                    options.signature_agent = config.signature_agent.clone();
                    options.agent_name = agent;
                    options
                }
                None => config.request_options(agent.as_deref())?,
            };
            if signature_agent.is_some() {
                options.signature_agent = signature_agent;
            }
            if !components.is_empty() {
                options.covered_components = Some(components);
            }

            let request = build_request(&method, &url)?;
            if send {
                let response = send_request(options, &config, request)?;
                println!("{}", response.status);
                println!("{}", response.body);
            } else {
                let mut request = request;
                sign_request(&mut request, &options)?;
                for (name, value) in request.headers() {
                    println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
                }
            }
        }
    }
    Ok(())
}

fn directory(paths: &[PathBuf]) -> Result<Jwks> {
    let mut seen = BTreeSet::new();
    let mut keys = Vec::new();
    for path in paths {
        let verifying_key = load_keypair(path)?.verifying_key();
        let jwk = Jwk::for_directory(&verifying_key);
        if seen.insert(jwk.thumbprint()) {
            keys.push(jwk);
        }
    }
    Ok(Jwks::from_keys(keys))
}

fn build_request(method: &str, url: &str) -> Result<Request> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| SignerError::Config(format!("invalid HTTP method '{method}': {e}")))?;
    let url =
        Url::parse(url).map_err(|e| SignerError::Config(format!("invalid URL '{url}': {e}")))?;
    Ok(Request::new(method, url))
}

fn send_request(
    options: RequestSigningOptions,
    config: &SignerConfig,
    request: Request,
) -> Result<web_bot_auth::transport::SignedResponse> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SignerError::Config(format!("cannot start runtime: {e}")))?;
    let client = SignedClient::with_settings(options, &config.http)?;
    runtime.block_on(client.send(request))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SignerError::Config(format!("cannot serialize output: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use ed25519_dalek::SigningKey;
    use web_bot_auth::keys::loader::write_private_jwk;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sign_command() {
        let cli = Cli::parse_from([
            "web-bot-auth-keytool",
            "sign",
            "https://api.example.com/weather",
            "--agent",
            "trip_agent",
            "-c",
            "@authority",
            "-c",
            "@method",
        ]);
        match cli.command {
            Command::Sign { agent, components, method, send, .. } => {
                assert_eq!(agent.as_deref(), Some("trip_agent"));
                assert_eq!(components, ["@authority", "@method"]);
                assert_eq!(method, "GET");
                assert!(!send);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_and_component_flags_are_distinct() {
        let cli = Cli::parse_from([
            "web-bot-auth-keytool",
            "-C",
            "signer.toml",
            "sign",
            "https://api.example.com/",
            "-c",
            "@path",
        ]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("signer.toml")));
        match cli.command {
            Command::Sign { components, .. } => assert_eq!(components, ["@path"]),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["web-bot-auth-keytool", "thumbprint", "key.jwk", "--config", "a.toml"]);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("a.toml")));
    }

    #[test]
    fn test_directory_deduplicates_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let first = dir.path().join("a.jwk");
        let second = dir.path().join("b.jwk");
        write_private_jwk(&first, &key).unwrap();
        write_private_jwk(&second, &key).unwrap();

        let jwks = directory(&[first, second]).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert!(jwks.keys[0].d.is_none());
        assert_eq!(jwks.keys[0].key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_build_request() {
        let request = build_request("post", "https://api.example.com/x").unwrap();
        assert_eq!(request.method(), Method::POST);
        assert!(build_request("GET", "not a url").is_err());
    }
}
