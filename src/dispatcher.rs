use crate::command::{extract_and_run, open_url_command, CommandRunner, ShellExecutor, COMMAND_MARKER};
use crate::config::Config;
use crate::conversation::{ConversationState, PendingContext, SessionStore, Turn};
use crate::error::{AgentError, AgentResult};
use crate::intent_recognition::{classify, extract_city, search_query, video_title, Route};
use crate::prompts::PromptManager;
use crate::skills::{HttpSkills, SkillAdapters};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

pub const DEFAULT_LANGUAGE: &str = "en-US";

const ASK_CITY: &str = "Which city?";
const NEED_GPS: &str = "Need GPS.";
const OPENING_MAPS: &str = "Opening Google Maps...";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One user message as received from a front end.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub text: Option<String>,
    /// Base64 image payload, usually a data URL
    pub image: Option<String>,
    pub language: String,
    pub coordinates: Option<Coordinates>,
}

impl IncomingRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
            language: DEFAULT_LANGUAGE.to_string(),
            coordinates: None,
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some(Coordinates { lat, lon });
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Outcome of one dispatch, serialized as-is to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Message { reply: String, lang: String },
    Error { error: String },
}

impl Reply {
    pub fn from_error(error: &AgentError) -> Self {
        Reply::Error {
            error: format!("Error: {}", error),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Reply::Message { reply, .. } => reply,
            Reply::Error { error } => error,
        }
    }
}

/// Routes each message to a skill, the command executor or the language model,
/// and keeps the per-session history and pending context up to date.
pub struct Dispatcher {
    skills: Arc<dyn SkillAdapters>,
    runner: Arc<dyn CommandRunner>,
    sessions: SessionStore,
    system_prompt: String,
}

impl Dispatcher {
    pub fn new(skills: Arc<dyn SkillAdapters>, runner: Arc<dyn CommandRunner>) -> Self {
        let system_prompt = PromptManager::system_prompt(runner.shell());
        Self {
            skills,
            runner,
            sessions: SessionStore::new(),
            system_prompt,
        }
    }

    pub fn from_config(config: &Config) -> AgentResult<Self> {
        let skills = Arc::new(HttpSkills::new(config)?);
        let runner = Arc::new(ShellExecutor::new(
            config.settings.commands.shell,
            Duration::from_secs(config.settings.commands.timeout_secs),
        ));
        Ok(Self::new(skills, runner))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, session_id: &str, request: IncomingRequest) -> Reply {
        let span = tracing::info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            session = %session_id
        );

        async {
            let language = request.language.clone();
            match self.dispatch(session_id, request).await {
                Ok(reply) => Reply::Message {
                    reply,
                    lang: language,
                },
                Err(e) => {
                    tracing::error!(error = %e, "dispatch failed");
                    Reply::from_error(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, session_id: &str, request: IncomingRequest) -> AgentResult<String> {
        let text = request.text.as_deref().unwrap_or_default();
        let image = request
            .image
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty());

        if text.trim().is_empty() && image.is_none() {
            return Err(AgentError::EmptyRequest);
        }

        // Held for the whole exchange so one session's turns never interleave.
        let conversation = self.sessions.session(session_id);
        let mut state = conversation.lock().await;

        let route = classify(text, image.is_some(), state.context(), request.coordinates.is_some());
        tracing::info!(?route, "route chosen");

        let (reply, next_context) = self
            .run_route(route, text, image, request.coordinates, &state)
            .await;
        state.set_context(next_context);

        if !reply.is_empty() {
            let user_turn = if text.trim().is_empty() { "[image]" } else { text };
            state.append(Turn::user(user_turn));
            state.append(Turn::assistant(reply.clone()));
        }

        Ok(reply)
    }

    async fn run_route(
        &self,
        route: Route,
        text: &str,
        image: Option<&str>,
        coordinates: Option<Coordinates>,
        state: &ConversationState,
    ) -> (String, PendingContext) {
        let reply = match route {
            Route::Image => {
                let question = Some(text).filter(|t| !t.trim().is_empty());
                self.skills
                    .describe_image(question, image.unwrap_or_default())
                    .await
            }
            Route::ContinueWeatherCity => match coordinates {
                Some(c) => self.skills.weather_by_coordinates(c.lat, c.lon).await,
                None => NEED_GPS.to_string(),
            },
            Route::Navigation => OPENING_MAPS.to_string(),
            Route::Weather => return self.weather(text, coordinates).await,
            Route::CurrentLocation => match coordinates {
                Some(c) => format!("Near {}", self.skills.reverse_geocode(c.lat, c.lon).await),
                None => NEED_GPS.to_string(),
            },
            Route::YouTube => {
                let link = self.skills.video_link(text).await;
                self.open_url(&link).await;
                format!("Opening YouTube: {}", video_title(text))
            }
            Route::DirectSearch => {
                let query = search_query(text);
                let url = format!(
                    "https://www.google.com/search?q={}",
                    urlencoding::encode(&query)
                );
                self.open_url(&url).await;
                format!("Searching Google: {}", query)
            }
            Route::News => self.skills.news_headlines().await,
            Route::GoogleQuestion => self.skills.web_search_snippet(text).await,
            Route::ModelFallback => self.ask_model(text, state).await,
        };

        (reply, PendingContext::None)
    }

    async fn weather(&self, text: &str, coordinates: Option<Coordinates>) -> (String, PendingContext) {
        if let Some(city) = extract_city(text) {
            return (self.skills.weather_by_city(&city).await, PendingContext::None);
        }

        let lowered = text.to_lowercase();
        match coordinates {
            Some(c) if lowered.contains("my") || lowered.contains("current") => (
                self.skills.weather_by_coordinates(c.lat, c.lon).await,
                PendingContext::None,
            ),
            _ => (ASK_CITY.to_string(), PendingContext::AwaitingCity),
        }
    }

    async fn ask_model(&self, text: &str, state: &ConversationState) -> String {
        let history = state.snapshot();
        let answer = self
            .skills
            .chat_completion(&self.system_prompt, &history, text)
            .await;

        if answer.contains(COMMAND_MARKER) {
            extract_and_run(self.runner.as_ref(), &answer).await.into_reply()
        } else {
            answer
        }
    }

    async fn open_url(&self, url: &str) {
        let command = open_url_command(self.runner.shell(), url);
        tracing::info!(command = %command, "opening link on host");

        if let Err(e) = self.runner.launch(&command).await {
            tracing::warn!(error = %e, "could not open link");
        }
    }
}
