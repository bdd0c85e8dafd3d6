use clap::Parser;
use deskmate::cli::{Cli, Commands, ConfigCommand};
use deskmate::config::{ConfigManager, CREDENTIAL_KEYS};
use deskmate::dispatcher::{Dispatcher, IncomingRequest, Reply};
use deskmate::server;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TERMINAL_SESSION: &str = "terminal";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { config_command }) => match config_command {
            ConfigCommand::Init => {
                ConfigManager::init_config()?;
            }
            ConfigCommand::Get => {
                let config = ConfigManager::load_config()?;
                let toml_string = toml::to_string_pretty(&config.settings)?;
                println!("Current settings:\n{}", toml_string);
                let missing = config.credentials.missing();
                for key in CREDENTIAL_KEYS {
                    let state = if missing.contains(&key) { "not set" } else { "set" };
                    println!("{}: {}", key, state);
                }
            }
            ConfigCommand::Set { key, value } => {
                ConfigManager::set_config_value(&key, &value)?;
            }
            ConfigCommand::Validate => {
                ConfigManager::validate_config()?;
            }
        },
        Some(Commands::Chat { lat, lon }) => {
            let dispatcher = build_dispatcher(cli.model)?;
            let coordinates = lat.zip(lon);
            start_terminal_chat(&dispatcher, coordinates).await;
        }
        Some(Commands::Serve { bind, frontend }) => {
            run_server(cli.model, bind, frontend).await?;
        }
        None => {
            run_server(cli.model, None, None).await?;
        }
    }

    Ok(())
}

fn build_dispatcher(model: Option<String>) -> Result<Dispatcher, Box<dyn std::error::Error>> {
    let mut config = ConfigManager::load_config()?;
    if let Some(model) = model {
        config.settings.models.chat = model;
    }
    for key in config.credentials.missing() {
        tracing::warn!("{} is not set", key);
    }
    Ok(Dispatcher::from_config(&config)?)
}

async fn run_server(
    model: Option<String>,
    bind: Option<String>,
    frontend: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ConfigManager::load_config()?;
    if let Some(model) = model {
        config.settings.models.chat = model;
    }
    if let Some(bind) = bind {
        config.settings.server.bind = bind;
    }
    if let Some(frontend) = frontend {
        config.settings.server.frontend_dir = frontend;
    }

    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
    server::serve(dispatcher, &config.settings.server).await?;
    Ok(())
}

async fn start_terminal_chat(dispatcher: &Dispatcher, coordinates: Option<(f64, f64)>) {
    println!("🚀 deskmate terminal chat");
    println!("💡 Press Ctrl+C three times to exit");
    println!();

    let mut exit_attempts = 0;

    loop {
        use inquire::Text;

        let user_input = Text::new("💬 You:")
            .with_help_message("Ask for weather, news, a video, or a system task")
            .prompt();

        match user_input {
            Ok(user_message) => {
                exit_attempts = 0;
                let user_message = user_message.trim();

                if user_message.is_empty() {
                    continue;
                }

                let mut request = IncomingRequest::text(user_message);
                if let Some((lat, lon)) = coordinates {
                    request = request.with_coordinates(lat, lon);
                }

                match dispatcher.handle(TERMINAL_SESSION, request).await {
                    Reply::Message { reply, .. } => println!("🤖 {}", reply),
                    Reply::Error { error } => println!("❌ {}", error),
                }
            }
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => {
                exit_attempts += 1;
                if exit_attempts >= 3 {
                    println!("\n👋 Goodbye!");
                    break;
                }
                println!("\n⚠️ Press Ctrl+C {} more time(s) to exit", 3 - exit_attempts);
            }
            Err(e) => {
                println!("❌ Input error: {}", e);
                exit_attempts = 0;
            }
        }
    }
}
