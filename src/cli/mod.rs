use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deskmate")]
#[command(about = "Conversational desktop agent: weather, news, search, video and system commands from plain text")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the chat model from the environment
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Address to listen on, e.g. 127.0.0.1:8080")]
        bind: Option<String>,
        #[arg(long, help = "Directory served as the web front end")]
        frontend: Option<String>,
    },
    #[command(about = "Chat with the agent from the terminal")]
    Chat {
        #[arg(long, help = "Latitude sent with every message")]
        lat: Option<f64>,
        #[arg(long, help = "Longitude sent with every message")]
        lon: Option<f64>,
    },
    #[command(about = "Manage deskmate configuration")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize the settings file with defaults")]
    Init,
    #[command(about = "Display current settings and which API keys are set")]
    Get,
    #[command(about = "Set a settings value")]
    Set {
        #[arg(help = "Settings key (e.g., 'server.bind')")]
        key: String,
        #[arg(help = "Settings value")]
        value: String,
    },
    #[command(about = "Validate current configuration")]
    Validate,
}
