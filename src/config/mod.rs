use crate::command::MAX_TIMEOUT;
use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Keys recognized in the flat environment / `.env` mapping.
pub const CREDENTIAL_KEYS: [&str; 6] = [
    "GROQ_API_KEY",
    "WEATHER_API_KEY",
    "GNEWS_API_KEY",
    "YOUTUBE_API_KEY",
    "GOOGLE_API_KEY",
    "SEARCH_ENGINE_ID",
];
pub const CHAT_MODEL_KEY: &str = "GROQ_CHAT_MODEL";

/// Runtime configuration. Credentials come only from the environment mapping;
/// everything else may be tuned through the TOML settings file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub credentials: Credentials,
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub groq_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub gnews_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub search_engine_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub frontend_dir: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CommandConfig {
    pub timeout_secs: u64,
    pub shell: ShellKind,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// PowerShell on Windows, `sh` everywhere else.
    Auto,
    PowerShell,
    Sh,
}

impl ShellKind {
    pub fn resolve(self) -> ShellKind {
        match self {
            ShellKind::Auto if cfg!(windows) => ShellKind::PowerShell,
            ShellKind::Auto => ShellKind::Sh,
            other => other,
        }
    }
}

impl std::str::FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ShellKind::Auto),
            "powershell" => Ok(ShellKind::PowerShell),
            "sh" => Ok(ShellKind::Sh),
            other => Err(format!("Unknown shell: {}", other)),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub chat: String,
    pub vision: String,
}

/// Upstream base URLs. Overridable so the adapters can be pointed at a local mock.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Endpoints {
    pub groq: String,
    pub weather: String,
    pub geocode: String,
    pub news: String,
    pub youtube: String,
    pub search: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            frontend_dir: "./frontend".to_string(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            shell: ShellKind::Auto,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat: DEFAULT_CHAT_MODEL.to_string(),
            vision: DEFAULT_VISION_MODEL.to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            groq: "https://api.groq.com/openai/v1".to_string(),
            weather: "https://api.openweathermap.org/data/2.5".to_string(),
            geocode: "https://nominatim.openstreetmap.org".to_string(),
            news: "https://gnews.io/api/v4".to_string(),
            youtube: "https://www.googleapis.com/youtube/v3".to_string(),
            search: "https://www.googleapis.com/customsearch/v1".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

impl Credentials {
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            groq_api_key: get("GROQ_API_KEY"),
            weather_api_key: get("WEATHER_API_KEY"),
            gnews_api_key: get("GNEWS_API_KEY"),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            google_api_key: get("GOOGLE_API_KEY"),
            search_engine_id: get("SEARCH_ENGINE_ID"),
        }
    }

    /// Names of the recognized credential keys that are not set.
    pub fn missing(&self) -> Vec<&'static str> {
        let values = [
            &self.groq_api_key,
            &self.weather_api_key,
            &self.gnews_api_key,
            &self.youtube_api_key,
            &self.google_api_key,
            &self.search_engine_id,
        ];
        CREDENTIAL_KEYS
            .iter()
            .zip(values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect()
    }
}

impl Config {
    /// Build a config from the flat string mapping on top of the given settings.
    pub fn from_map(vars: &HashMap<String, String>, mut settings: Settings) -> Self {
        if let Some(model) = vars.get(CHAT_MODEL_KEY).filter(|m| !m.trim().is_empty()) {
            settings.models.chat = model.trim().to_string();
        }
        Self {
            credentials: Credentials::from_map(vars),
            settings,
        }
    }
}

pub struct ConfigManager;

impl ConfigManager {
    pub fn config_path() -> AgentResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AgentError::Config("Could not find config directory".to_string()))?
            .join("deskmate");

        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.toml"))
    }

    /// Process environment first, then the `.env` file on top of it. The process
    /// environment itself is left untouched.
    pub fn env_map(dotenv_path: &Path) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = env::vars().collect();

        match dotenvy::from_path_iter(dotenv_path) {
            Ok(iter) => {
                let mut loaded = 0;
                for item in iter {
                    match item {
                        Ok((key, value)) => {
                            vars.insert(key, value);
                            loaded += 1;
                        }
                        Err(e) => tracing::warn!("Skipping malformed .env line: {}", e),
                    }
                }
                tracing::info!("Loaded {} keys from {}", loaded, dotenv_path.display());
            }
            Err(_) => {
                tracing::info!("No .env file found. Using process environment only.");
            }
        }

        vars
    }

    pub fn load_settings(path: &Path) -> AgentResult<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AgentError::Config(e.to_string()))
    }

    /// Assemble the config from an explicit settings file and variable mapping.
    pub fn load_from(settings_path: &Path, vars: &HashMap<String, String>) -> AgentResult<Config> {
        let settings = Self::load_settings(settings_path)?;
        Ok(Config::from_map(vars, settings))
    }

    pub fn load_config() -> AgentResult<Config> {
        let vars = Self::env_map(Path::new(".env"));
        Self::load_from(&Self::config_path()?, &vars)
    }

    pub fn save_settings(path: &Path, settings: &Settings) -> AgentResult<()> {
        let toml_string =
            toml::to_string_pretty(settings).map_err(|e| AgentError::Config(e.to_string()))?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn init_config() -> AgentResult<()> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            println!("Configuration file already exists at: {}", config_path.display());
            return Ok(());
        }

        Self::save_settings(&config_path, &Settings::default())?;

        println!("✅ Configuration initialized at: {}", config_path.display());
        println!("📝 API keys are read from the environment or a .env file, e.g.:");
        println!("   GROQ_API_KEY=gsk_your-key-here");

        Ok(())
    }

    pub fn set_config_value(key: &str, value: &str) -> AgentResult<()> {
        let config_path = Self::config_path()?;
        let mut settings = Self::load_settings(&config_path)?;
        Self::apply_setting(&mut settings, key, value)?;
        Self::save_settings(&config_path, &settings)?;
        println!("✅ Updated {}: {}", key, value);
        Ok(())
    }

    pub fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> AgentResult<()> {
        let bad = |e: String| AgentError::Config(format!("Invalid value for {}: {}", key, e));

        match key {
            "server.bind" => settings.server.bind = value.to_string(),
            "server.frontend_dir" => settings.server.frontend_dir = value.to_string(),
            "commands.timeout_secs" => {
                let secs: u64 = value.parse().map_err(|e| bad(format!("{}", e)))?;
                if secs == 0 || secs > MAX_TIMEOUT.as_secs() {
                    return Err(bad(format!("must be between 1 and {}", MAX_TIMEOUT.as_secs())));
                }
                settings.commands.timeout_secs = secs;
            }
            "commands.shell" => settings.commands.shell = value.parse().map_err(bad)?,
            "models.chat" => settings.models.chat = value.to_string(),
            "models.vision" => settings.models.vision = value.to_string(),
            "endpoints.groq" => settings.endpoints.groq = value.to_string(),
            "endpoints.weather" => settings.endpoints.weather = value.to_string(),
            "endpoints.geocode" => settings.endpoints.geocode = value.to_string(),
            "endpoints.news" => settings.endpoints.news = value.to_string(),
            "endpoints.youtube" => settings.endpoints.youtube = value.to_string(),
            "endpoints.search" => settings.endpoints.search = value.to_string(),
            "http.connect_timeout_secs" => {
                settings.http.connect_timeout_secs =
                    value.parse().map_err(|e| bad(format!("{}", e)))?
            }
            "http.request_timeout_secs" => {
                settings.http.request_timeout_secs =
                    value.parse().map_err(|e| bad(format!("{}", e)))?
            }
            _ => return Err(AgentError::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }

    pub fn validate_config() -> AgentResult<()> {
        let config = Self::load_config()?;
        let missing = config.credentials.missing();

        println!("🔧 Chat model: {}", config.settings.models.chat);
        println!("🔧 Command shell: {:?}", config.settings.commands.shell.resolve());
        for key in &missing {
            println!("⚠️ {} is not set; the matching skill will report an error", key);
        }

        if config.credentials.groq_api_key.is_some() {
            println!("✅ Configuration is valid");
            Ok(())
        } else {
            println!("❌ GROQ_API_KEY not found");
            println!("💡 Add it to .env or export GROQ_API_KEY=<your-key>");
            Err(AgentError::Config("Missing API key".to_string()))
        }
    }
}
