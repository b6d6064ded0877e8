use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::observability::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "web-bot-auth-keytool", about, version)]
pub struct Cli {
    #[arg(
        env = "WEB_BOT_AUTH_CONFIG",
        global = true,
        help = "The path to a signer configuration file",
        long_help = "The path to a signer configuration file (TOML)

Provides the keys directory, the agent registry and signing defaults.
Without it, keys live in ./keys and no agents are registered.",
        long,
        short = 'C'
    )]
    pub config: Option<PathBuf>,

    #[arg(
        env = "LOG_FORMAT",
        global = true,
        help = "Log output format",
        long,
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate Ed25519 keypairs for agents
    Generate {
        #[arg(help = "Agent names to generate keys for", required = true)]
        agents: Vec<String>,

        #[arg(help = "Directory to write key files to (default: configured keys_dir)", long)]
        keys_dir: Option<PathBuf>,
    },

    /// List configured agents with their key identifiers
    List,

    /// Print the key identifier (JWK thumbprint) of a key file
    Thumbprint {
        #[arg(help = "Private key file (JWK or PEM)")]
        key: PathBuf,
    },

    /// Print the JWKS key directory document
    Jwks {
        #[arg(
            help = "Key files to include (default: all configured agents)",
            long_help = "Key files to include

Without key files, the keys of all configured agents are included. The output is
served at /.well-known/http-message-signatures-directory."
        )]
        keys: Vec<PathBuf>,
    },

    /// Convert a PEM private key file into a private JWK file
    ImportPem {
        #[arg(help = "PEM private key file")]
        pem: PathBuf,

        #[arg(help = "Output JWK file")]
        output: PathBuf,
    },

    /// Sign a request and print the signature headers
    Sign {
        #[arg(help = "Target URL")]
        url: String,

        #[arg(help = "Configured agent to sign as (default: default_key)", long, short)]
        agent: Option<String>,

        #[arg(help = "Key file to sign with, overriding the configuration", long, short)]
        key: Option<PathBuf>,

        #[arg(help = "Signature-Agent header value", long)]
        signature_agent: Option<String>,

        #[arg(help = "Covered component, may be repeated", long = "component", short = 'c')]
        components: Vec<String>,

        #[arg(help = "HTTP method", long, short, default_value = "GET")]
        method: String,

        #[arg(help = "Send the signed request and print the response", long)]
        send: bool,
    },
}
