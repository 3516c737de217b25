//! Tokenseal CLI - Passphrase-based token encryption
//!
//! Command-line interface for sealing short texts (API tokens, secrets) into
//! transportable strings using PBKDF2-HMAC-SHA256 key derivation and
//! AES-256-GCM, and for opening them again.

use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tokenseal::error::{ErrorCategory, ErrorKind, Result, TokensealError};
use tokenseal::passphrase::{
    ConstantPassphraseReader, EnvPassphraseReader, PassphraseReader, ReaderPassphraseReader,
    TerminalPassphraseReader,
};
use tokenseal::{manifest, token_ops};

#[derive(Parser)]
#[command(name = "tokenseal")]
#[command(version)]
#[command(about = "Passphrase-based token encryption.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from the command line
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Prompt for the passphrase on the terminal instead of taking it from the command line
    #[arg(long, global = true)]
    passphrase_prompt: bool,

    /// Read passphrase from the named environment variable
    #[arg(
        long,
        global = true,
        value_name = "VAR",
        env = "TOKENSEAL_PASSPHRASE_ENV"
    )]
    passphrase_env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a text and print it in all transport forms
    #[command(alias = "e")]
    Encrypt {
        /// Passphrase (omitted when the passphrase comes from stdin, a prompt or the environment)
        passphrase: Option<String>,

        /// Text to encrypt
        plaintext: Option<String>,
    },

    /// Decrypt a token and print the text
    #[command(alias = "d")]
    Decrypt {
        /// Passphrase (omitted when the passphrase comes from stdin, a prompt or the environment)
        passphrase: Option<String>,

        /// Base64 token, as printed by encrypt
        token: Option<String>,

        /// The token is percent-encoded (the url_encoded form)
        #[arg(short, long)]
        url_decode: bool,
    },

    /// Add secret-management scripts for a project to a package.json
    Init {
        /// Name of the project, used as the chamber service prefix
        project_name: Option<String>,

        /// Path to the manifest to update
        #[arg(short, long, value_name = "FILE", default_value = "package.json")]
        manifest: PathBuf,
    },
}

/// Where the passphrase comes from when it is not a positional argument.
enum PassphraseSource {
    Argument,
    Stdin,
    Prompt,
    Env(String),
}

impl PassphraseSource {
    /// At most one source may be named on the command line. A variable name
    /// taken from `TOKENSEAL_PASSPHRASE_ENV` is only a default, and
    /// `--passphrase-stdin` or `--passphrase-prompt` override it.
    fn from_cli(cli: &Cli, env_on_command_line: bool) -> Result<Self> {
        let mut given = Vec::new();
        if cli.passphrase_stdin {
            given.push("--passphrase-stdin");
        }
        if cli.passphrase_prompt {
            given.push("--passphrase-prompt");
        }
        if env_on_command_line && cli.passphrase_env.is_some() {
            given.push("--passphrase-env");
        }
        if given.len() > 1 {
            return Err(TokensealError::user(
                ErrorKind::ConflictingArguments,
                format!(
                    "conflicting passphrase sources: {}; give at most one",
                    given.join(", ")
                ),
            ));
        }

        let source = if cli.passphrase_stdin {
            PassphraseSource::Stdin
        } else if cli.passphrase_prompt {
            PassphraseSource::Prompt
        } else if let Some(var) = &cli.passphrase_env {
            PassphraseSource::Env(var.clone())
        } else {
            PassphraseSource::Argument
        };
        Ok(source)
    }

    /// Splits the two optional positionals into a passphrase reader and the
    /// text operand. With an external source, the first positional is the text.
    fn resolve(
        self,
        first: Option<String>,
        second: Option<String>,
        operand: &str,
    ) -> Result<(Box<dyn PassphraseReader>, String)> {
        let reader: Box<dyn PassphraseReader> = match self {
            PassphraseSource::Argument => {
                let passphrase = first.ok_or_else(|| missing_argument("passphrase"))?;
                let text = second.ok_or_else(|| missing_argument(operand))?;
                return Ok((
                    Box::new(ConstantPassphraseReader::new(passphrase.into_bytes())),
                    text,
                ));
            }
            PassphraseSource::Stdin => {
                Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
            }
            PassphraseSource::Prompt => Box::new(TerminalPassphraseReader::new()),
            PassphraseSource::Env(var) => Box::new(EnvPassphraseReader::new(var)),
        };
        if second.is_some() {
            return Err(TokensealError::new(
                ErrorCategory::User,
                "unexpected extra argument; the passphrase is not given on the command line",
            ));
        }
        let text = first.ok_or_else(|| missing_argument(operand))?;
        Ok((reader, text))
    }
}

fn missing_argument(what: &str) -> TokensealError {
    TokensealError::user(
        ErrorKind::MissingArgument,
        format!("missing argument: {}", what),
    )
}

fn main() {
    init_logging();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let env_on_command_line =
        matches.value_source("passphrase_env") == Some(ValueSource::CommandLine);

    if let Err(e) = run(cli, env_on_command_line) {
        tracing::debug!(category = ?e.category, kind = ?e.kind, "command failed");
        eprintln!("Error: {}", e.display_chain());
        // User mistakes and environment/internal failures get distinct exit codes.
        let code = if e.category == ErrorCategory::User { 1 } else { 2 };
        process::exit(code);
    }
}

fn run(cli: Cli, env_on_command_line: bool) -> Result<()> {
    let source = PassphraseSource::from_cli(&cli, env_on_command_line)?;

    match cli.command {
        Commands::Encrypt {
            passphrase,
            plaintext,
        } => run_encrypt(source, passphrase, plaintext),
        Commands::Decrypt {
            passphrase,
            token,
            url_decode,
        } => run_decrypt(source, passphrase, token, url_decode),
        Commands::Init {
            project_name,
            manifest,
        } => run_init(project_name, manifest),
    }
}

fn run_encrypt(
    source: PassphraseSource,
    passphrase: Option<String>,
    plaintext: Option<String>,
) -> Result<()> {
    tracing::info!("starting encrypt");
    let (mut reader, plaintext) = source.resolve(passphrase, plaintext, "plaintext")?;
    let sealed = token_ops::seal_token(&mut *reader, &plaintext)?;
    let rendered = serde_json::to_string_pretty(&sealed).map_err(|e| {
        TokensealError::with_source(ErrorCategory::Internal, "failed to render result", e)
    })?;
    println!("{}", rendered);
    tracing::info!("encrypt done");
    Ok(())
}

fn run_decrypt(
    source: PassphraseSource,
    passphrase: Option<String>,
    token: Option<String>,
    url_decode: bool,
) -> Result<()> {
    tracing::info!(url_decode, "starting decrypt");
    let (mut reader, token) = source.resolve(passphrase, token, "token")?;
    let plaintext = token_ops::open_token(&mut *reader, &token, url_decode)?;
    println!("{}", plaintext);
    tracing::info!("decrypt done");
    Ok(())
}

fn run_init(project_name: Option<String>, manifest_path: PathBuf) -> Result<()> {
    let project_name = project_name.ok_or_else(|| missing_argument("project name"))?;
    manifest::init_project(&manifest_path, &project_name)?;
    println!("Project: {} has been initiated.", project_name);
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable. Filter comes from
/// `TOKENSEAL_LOG` (EnvFilter syntax), defaulting to warnings only.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env("TOKENSEAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}
