//! Hydra CLI: the main entry point.
//!
//! Commands:
//! - `init`     : Write a default config file
//! - `serve`    : Start the HTTP gateway
//! - `chat`     : Send one message through the synthesis pipeline
//! - `ingest`   : Add a text document to a user's knowledge base
//! - `persona`  : Add or list personas
//! - `providers`: Show provider availability and synthesis order
//! - `doctor`   : Diagnose configuration and store health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "hydra",
    about = "Hydra — multi-provider LLM response synthesis",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ~/.hydra/config.toml)
    #[arg(short, long, global = true, env = "HYDRA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a single message and print the synthesized reply
    Chat {
        /// The message
        message: String,

        /// User id the conversation is stored under
        #[arg(short, long)]
        user: String,

        /// Persona name (defaults to `default_persona`)
        #[arg(short, long)]
        persona: Option<String>,

        /// Image URL stored with the message
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Chunk, embed and store a text document
    Ingest {
        /// Path to a UTF-8 text file
        file: PathBuf,

        /// Owner of the knowledge
        #[arg(short, long)]
        user: String,

        /// Source name recorded with each chunk (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Manage personas
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },

    /// Show provider key status and synthesis order
    Providers,

    /// Diagnose configuration and store health
    Doctor,
}

#[derive(Subcommand)]
enum PersonaAction {
    /// Create a persona, or update the one with the same name
    Add {
        name: String,

        #[arg(short, long)]
        role: String,

        /// Comma-separated traits
        #[arg(short, long, default_value = "")]
        attributes: String,

        #[arg(short, long, default_value = "")]
        summary: String,
    },

    /// List stored personas
    List,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat {
            message,
            user,
            persona,
            image_url,
        } => commands::chat::run(config_path, &user, message, persona, image_url).await?,
        Commands::Ingest { file, user, name } => {
            commands::ingest::run(config_path, &file, &user, name.as_deref()).await?
        }
        Commands::Persona { action } => match action {
            PersonaAction::Add {
                name,
                role,
                attributes,
                summary,
            } => commands::persona::add(config_path, &name, &role, &attributes, &summary).await?,
            PersonaAction::List => commands::persona::list(config_path).await?,
        },
        Commands::Providers => commands::providers::run(config_path)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_arguments_parse() {
        let cli = Cli::parse_from([
            "hydra", "chat", "status report", "--user", "u1", "--persona", "Janus",
        ]);
        match cli.command {
            Commands::Chat {
                message,
                user,
                persona,
                image_url,
            } => {
                assert_eq!(message, "status report");
                assert_eq!(user, "u1");
                assert_eq!(persona.as_deref(), Some("Janus"));
                assert!(image_url.is_none());
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["hydra", "doctor", "--verbose", "--config", "/tmp/h.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
    }
}
