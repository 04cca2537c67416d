use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use credbroker::broker::CredentialBroker;
use credbroker::cache::EncryptedFileCache;
use credbroker::checkout::{CommandIamClient, IamClient};
use credbroker::config::{default_config_path, ResolvedConfig};
use credbroker::credentials::{CredentialRecord, Mode, PassphraseSource};
use credbroker::exec::{
    profile_from_exec_info, CredentialProcessOutput, ExecCredential, ExecCredentialAdapter,
    EXEC_INFO_ENV,
};
use credbroker::kubeconfig::{build_entries, check_kubeconfig_env, KubeConfigMerger, TenantScope};
use secrecy::SecretString;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "credbroker")]
#[command(about = "Cache cloud credentials locally and hand them to kubectl and cloud CLIs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache passphrase (otherwise CREDBROKER_PASSPHRASE or a prompt)
    #[arg(short, long, global = true)]
    passphrase: Option<String>,

    /// Print debug logs and full error chains to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Kubernetes exec credential plugin (invoked by kubectl)
    KubeExec {
        #[arg(short, long)]
        tenant: Option<String>,

        /// Profile path or alias; defaults to the one named in KUBERNETES_EXEC_INFO
        #[arg(long)]
        profile: Option<String>,
    },

    /// Check out credentials for a profile and print them
    Checkout {
        /// Profile path (application/environment/profile) or alias
        profile: String,

        #[arg(short, long)]
        tenant: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Mode::Interactive)]
        mode: Mode,

        #[arg(short, long)]
        justification: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Write kubeconfig entries for every authorized Kubernetes profile
    ConfigureKube {
        #[arg(short, long)]
        tenant: Option<String>,
    },

    /// Manage the local credential cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Delete the tenant's cache file
    Clear {
        #[arg(short, long)]
        tenant: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Raw credential fields
    Json,
    /// AWS CLI credential_process document
    CredentialProcess,
    /// Kubernetes ExecCredential document
    ExecCredential,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries protocol output; logs always go to stderr.
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let globals = Globals::from(&cli);
    match run(cli.command, &globals).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.verbose {
                eprintln!("error: {err:?}");
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

struct Globals {
    config_path: PathBuf,
    passphrase: Option<String>,
}

impl From<&Cli> for Globals {
    fn from(cli: &Cli) -> Self {
        Self {
            config_path: cli.config.clone().unwrap_or_else(default_config_path),
            passphrase: cli.passphrase.clone(),
        }
    }
}

impl Globals {
    fn passphrase(&self, allow_prompt: bool) -> Result<SecretString> {
        Ok(PassphraseSource::new(self.passphrase.clone().map(SecretString::from))
            .allow_prompt(allow_prompt)
            .resolve()?)
    }

    fn broker(
        &self,
        config: &ResolvedConfig,
        tenant: &str,
        allow_prompt: bool,
    ) -> Result<CredentialBroker> {
        let cache = EncryptedFileCache::new(config.cache_path(tenant), self.passphrase(allow_prompt)?)
            .with_work_factor(config.cache.kdf_work_factor);
        let client = CommandIamClient::new(config.checkout.command.clone());
        Ok(CredentialBroker::new(Arc::new(cache), Arc::new(client))
            .with_checkout_timeout(config.checkout.timeout))
    }
}

async fn run(command: Command, globals: &Globals) -> Result<()> {
    let config = ResolvedConfig::load_or_default(&globals.config_path)?;

    match command {
        Command::KubeExec { tenant, profile } => {
            let tenant = config.tenant_alias(tenant.as_deref())?;
            let reference = match profile {
                Some(profile) => profile,
                None => {
                    let raw = std::env::var(EXEC_INFO_ENV).with_context(|| {
                        format!("{EXEC_INFO_ENV} is not set; kube-exec is meant to be run by kubectl")
                    })?;
                    profile_from_exec_info(&raw)?
                }
            };
            let profile = config.resolve_profile(&reference)?;

            let broker = globals.broker(&config, &tenant, false)?;
            let resolved = ExecCredentialAdapter::new(&broker).resolve(&profile).await?;
            println!("{}", resolved.value.to_json()?);
        }

        Command::Checkout {
            profile,
            tenant,
            mode,
            justification,
            format,
        } => {
            let tenant = config.tenant_alias(tenant.as_deref())?;
            let profile = config.resolve_profile(&profile)?;
            let broker = globals.broker(&config, &tenant, !mode.is_unattended())?;

            let output = broker
                .resolve(&profile, mode, justification, |record| match format {
                    OutputFormat::Json => to_pretty(record),
                    OutputFormat::CredentialProcess => {
                        CredentialProcessOutput::from_record(&profile, record)?.to_json()
                    }
                    OutputFormat::ExecCredential => {
                        ExecCredential::from_record(&profile, record)?.to_json()
                    }
                })
                .await?;
            println!("{}", output.value);
        }

        Command::ConfigureKube { tenant } => {
            let tenant = config.tenant_alias(tenant.as_deref())?;
            let scope = TenantScope {
                tenant: tenant.clone(),
                username: config.username()?,
                exec_command: config.kube.exec_command.clone(),
            };

            let client = CommandIamClient::new(config.checkout.command.clone());
            let profiles = client.kube_profiles().await?;
            let entries = build_entries(&scope, &profiles, &config.profile_aliases(true))?;

            let merger = KubeConfigMerger::new(config.kubeconfig_path());
            merger.merge(&entries, &tenant)?;
            println!(
                "Wrote {} cluster(s) for tenant {tenant} to {}",
                entries.clusters.len(),
                merger.path().display()
            );

            if !entries.clusters.is_empty() {
                let env_value = std::env::var("KUBECONFIG").ok();
                if let Some(message) =
                    check_kubeconfig_env(merger.path(), env_value.as_deref()).message()
                {
                    println!("{message}");
                }
            }
        }

        Command::Cache {
            command: CacheCommand::Clear { tenant },
        } => {
            let tenant = config.tenant_alias(tenant.as_deref())?;
            // Deleting needs no key; any passphrase opens the handle.
            let cache = EncryptedFileCache::new(config.cache_path(&tenant), SecretString::from(""));
            if cache.clear()? {
                println!("Removed {}", cache.path().display());
            } else {
                println!("No cache at {}", cache.path().display());
            }
        }

        Command::Config => {
            println!("Config file: {}", globals.config_path.display());
            println!("Cache directory: {}", config.cache_dir.display());
            println!("Kubeconfig: {}", config.kubeconfig_path().display());
            match &config.tenant {
                Some(tenant) => println!("Tenant: {tenant}"),
                None => println!("Tenant: (not set)"),
            }
            println!("Profile aliases: {}", config.profile_aliases.len());
        }
    }

    Ok(())
}

fn to_pretty(record: &CredentialRecord) -> credbroker::Result<String> {
    serde_json::to_string_pretty(record).map_err(|e| credbroker::Error::Serialization {
        what: "credential",
        reason: e.to_string(),
    })
}
