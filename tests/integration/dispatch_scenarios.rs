use async_trait::async_trait;
use deskmate::command::{CommandRunner, ExecutionResult};
use deskmate::config::ShellKind;
use deskmate::conversation::{PendingContext, Role, Turn, HISTORY_CAPACITY};
use deskmate::dispatcher::{Dispatcher, IncomingRequest, Reply};
use deskmate::skills::SkillAdapters;
use std::io;
use std::sync::{Arc, Mutex};

/// Deterministic skills that log every call.
#[derive(Default)]
struct FakeSkills {
    calls: Mutex<Vec<String>>,
    chat_reply: Mutex<String>,
    history_lengths: Mutex<Vec<usize>>,
}

impl FakeSkills {
    fn replying(text: &str) -> Self {
        let skills = Self::default();
        *skills.chat_reply.lock().unwrap() = text.to_string();
        skills
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SkillAdapters for FakeSkills {
    async fn weather_by_coordinates(&self, lat: f64, lon: f64) -> String {
        self.log(format!("weather@{},{}", lat, lon));
        "Weather in Pune: 27.5°C, haze.".to_string()
    }

    async fn weather_by_city(&self, city: &str) -> String {
        self.log(format!("weather:{}", city));
        format!("Weather in {}: 12.0°C, light rain.", city)
    }

    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> String {
        self.log("geocode".to_string());
        "Pune".to_string()
    }

    async fn news_headlines(&self) -> String {
        self.log("news".to_string());
        "Top Headlines:\n- Monsoon arrives\n".to_string()
    }

    async fn video_link(&self, message: &str) -> String {
        self.log(format!("video:{}", message));
        "https://youtube.com/watch?v=abc123".to_string()
    }

    async fn web_search_snippet(&self, query: &str) -> String {
        self.log(format!("search:{}", query));
        "Dune is a 1965 novel by Frank Herbert.".to_string()
    }

    async fn describe_image(&self, text: Option<&str>, _image: &str) -> String {
        self.log(format!("image:{}", text.unwrap_or("-")));
        "A cat on a keyboard.".to_string()
    }

    async fn chat_completion(&self, _system_prompt: &str, history: &[Turn], user_message: &str) -> String {
        self.log(format!("chat:{}", user_message));
        self.history_lengths.lock().unwrap().push(history.len());
        self.chat_reply.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct RecordingRunner {
    seen: Mutex<Vec<String>>,
    launched: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command_line: &str) -> io::Result<ExecutionResult> {
        self.seen.lock().unwrap().push(command_line.to_string());
        Ok(ExecutionResult {
            stdout: "Recycle bin emptied\n".to_string(),
            ..Default::default()
        })
    }

    async fn launch(&self, command_line: &str) -> io::Result<()> {
        self.launched.lock().unwrap().push(command_line.to_string());
        Ok(())
    }

    fn shell(&self) -> ShellKind {
        ShellKind::PowerShell
    }
}

fn setup(skills: FakeSkills) -> (Dispatcher, Arc<FakeSkills>, Arc<RecordingRunner>) {
    let skills = Arc::new(skills);
    let runner = Arc::new(RecordingRunner::default());
    let dispatcher = Dispatcher::new(skills.clone(), runner.clone());
    (dispatcher, skills, runner)
}

async fn context_of(dispatcher: &Dispatcher, session: &str) -> PendingContext {
    dispatcher.sessions().session(session).lock().await.context()
}

async fn history_of(dispatcher: &Dispatcher, session: &str) -> Vec<Turn> {
    dispatcher.sessions().session(session).lock().await.snapshot()
}

#[tokio::test]
async fn test_weather_without_city_asks_then_uses_coordinates() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());

    let reply = dispatcher.handle("s1", IncomingRequest::text("What's the weather?")).await;
    assert_eq!(reply.text(), "Which city?");
    assert_eq!(context_of(&dispatcher, "s1").await, PendingContext::AwaitingCity);

    let reply = dispatcher
        .handle(
            "s1",
            IncomingRequest::text("use my location").with_coordinates(18.52, 73.85),
        )
        .await;
    assert_eq!(reply.text(), "Weather in Pune: 27.5°C, haze.");
    assert_eq!(context_of(&dispatcher, "s1").await, PendingContext::None);
    assert_eq!(skills.calls(), vec!["weather@18.52,73.85".to_string()]);
}

#[tokio::test]
async fn test_follow_up_without_coordinates_needs_gps() {
    let (dispatcher, _, _) = setup(FakeSkills::default());

    dispatcher.handle("s", IncomingRequest::text("weather")).await;
    let reply = dispatcher.handle("s", IncomingRequest::text("my place")).await;

    assert_eq!(reply.text(), "Need GPS.");
    assert_eq!(context_of(&dispatcher, "s").await, PendingContext::None);
}

#[tokio::test]
async fn test_unrelated_turn_abandons_pending_city() {
    let (dispatcher, skills, _) = setup(FakeSkills::replying("Why did the cat sit on the keyboard?"));

    dispatcher.handle("s", IncomingRequest::text("temperature")).await;
    assert_eq!(context_of(&dispatcher, "s").await, PendingContext::AwaitingCity);

    dispatcher.handle("s", IncomingRequest::text("tell me a joke")).await;
    assert_eq!(context_of(&dispatcher, "s").await, PendingContext::None);
    assert_eq!(skills.calls(), vec!["chat:tell me a joke".to_string()]);
}

#[tokio::test]
async fn test_weather_by_city_and_by_current_coordinates() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());

    let reply = dispatcher
        .handle("s", IncomingRequest::text("weather in Paris please"))
        .await;
    assert_eq!(reply.text(), "Weather in paris: 12.0°C, light rain.");

    dispatcher
        .handle(
            "s",
            IncomingRequest::text("my current weather").with_coordinates(1.0, 2.0),
        )
        .await;
    assert_eq!(
        skills.calls(),
        vec!["weather:paris".to_string(), "weather@1,2".to_string()]
    );
    assert_eq!(context_of(&dispatcher, "s").await, PendingContext::None);
}

#[tokio::test]
async fn test_weather_keyword_beats_news() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());

    dispatcher
        .handle("s", IncomingRequest::text("weather news for Delhi"))
        .await;

    assert_eq!(skills.calls(), vec!["weather:news delhi".to_string()]);
}

#[tokio::test]
async fn test_model_text_without_marker_is_passed_through() {
    let (dispatcher, _, runner) = setup(FakeSkills::replying("[LANG:hi-IN] नमस्ते!"));

    let reply = dispatcher.handle("s", IncomingRequest::text("namaste")).await;

    assert_eq!(reply.text(), "[LANG:hi-IN] नमस्ते!");
    assert!(runner.seen().is_empty());
}

#[tokio::test]
async fn test_model_command_is_executed() {
    let (dispatcher, _, runner) =
        setup(FakeSkills::replying("///CMD/// Clear-RecycleBin -Force -ErrorAction SilentlyContinue"));

    let reply = dispatcher
        .handle("s", IncomingRequest::text("empty the recycle bin"))
        .await;

    assert_eq!(
        runner.seen(),
        vec!["Clear-RecycleBin -Force -ErrorAction SilentlyContinue".to_string()]
    );
    assert_eq!(reply.text(), "Recycle bin emptied");

    let history = history_of(&dispatcher, "s").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role(), Role::User);
    assert_eq!(history[0].content(), "empty the recycle bin");
    assert_eq!(history[1].role(), Role::Assistant);
    assert_eq!(history[1].content(), "Recycle bin emptied");
}

#[tokio::test]
async fn test_history_is_capped_and_sent_to_model() {
    let (dispatcher, skills, _) = setup(FakeSkills::replying("ok"));

    for i in 0..12 {
        dispatcher
            .handle("s", IncomingRequest::text(format!("remember item {}", i)))
            .await;
    }

    let history = history_of(&dispatcher, "s").await;
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history[0].content(), "remember item 2");
    assert_eq!(history[HISTORY_CAPACITY - 2].content(), "remember item 11");

    let lengths = skills.history_lengths.lock().unwrap().clone();
    assert_eq!(&lengths[..3], &[0, 2, 4]);
    assert_eq!(lengths[11], HISTORY_CAPACITY);
}

#[tokio::test]
async fn test_empty_model_reply_is_not_recorded() {
    let (dispatcher, _, _) = setup(FakeSkills::replying(""));

    let reply = dispatcher.handle("s", IncomingRequest::text("hmm")).await;

    assert_eq!(reply.text(), "");
    assert!(history_of(&dispatcher, "s").await.is_empty());
}

#[tokio::test]
async fn test_sessions_do_not_share_state() {
    let (dispatcher, _, _) = setup(FakeSkills::replying("hi"));

    dispatcher.handle("alice", IncomingRequest::text("weather")).await;
    dispatcher.handle("bob", IncomingRequest::text("hello")).await;

    assert_eq!(context_of(&dispatcher, "alice").await, PendingContext::AwaitingCity);
    assert_eq!(context_of(&dispatcher, "bob").await, PendingContext::None);
    assert_eq!(history_of(&dispatcher, "alice").await.len(), 2);
    assert_eq!(history_of(&dispatcher, "bob").await.len(), 2);
}

#[tokio::test]
async fn test_youtube_link_is_launched_without_capture() {
    let (dispatcher, skills, runner) = setup(FakeSkills::default());

    let reply = dispatcher
        .handle("s", IncomingRequest::text("play Believer song"))
        .await;

    assert_eq!(reply.text(), "Opening YouTube: Believer");
    assert_eq!(skills.calls(), vec!["video:play Believer song".to_string()]);
    assert_eq!(
        runner.launched(),
        vec!["Start-Process 'https://youtube.com/watch?v=abc123'".to_string()]
    );
    assert!(runner.seen().is_empty());
}

#[tokio::test]
async fn test_direct_search_opens_browser() {
    let (dispatcher, _, runner) = setup(FakeSkills::default());

    let reply = dispatcher
        .handle("s", IncomingRequest::text("search for rust lifetimes"))
        .await;

    assert_eq!(reply.text(), "Searching Google: rust lifetimes");
    assert_eq!(
        runner.launched(),
        vec!["Start-Process 'https://www.google.com/search?q=rust%20lifetimes'".to_string()]
    );
    assert!(runner.seen().is_empty());
}

#[tokio::test]
async fn test_simple_routes() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());

    assert_eq!(
        dispatcher.handle("s", IncomingRequest::text("navigate to the airport")).await.text(),
        "Opening Google Maps..."
    );
    assert_eq!(
        dispatcher.handle("s", IncomingRequest::text("where am i")).await.text(),
        "Need GPS."
    );
    assert_eq!(
        dispatcher
            .handle("s", IncomingRequest::text("where am i").with_coordinates(18.5, 73.8))
            .await
            .text(),
        "Near Pune"
    );
    assert_eq!(
        dispatcher.handle("s", IncomingRequest::text("latest news")).await.text(),
        "Top Headlines:\n- Monsoon arrives\n"
    );
    assert_eq!(
        dispatcher.handle("s", IncomingRequest::text("who wrote dune")).await.text(),
        "Dune is a 1965 novel by Frank Herbert."
    );
    assert_eq!(
        skills.calls(),
        vec!["geocode".to_string(), "news".to_string(), "search:who wrote dune".to_string()]
    );
}

#[tokio::test]
async fn test_image_only_request() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());
    let mut request = IncomingRequest::text("").with_image("data:image/png;base64,iVBOR");
    request.text = None;

    let reply = dispatcher.handle("s", request).await;

    assert_eq!(reply.text(), "A cat on a keyboard.");
    assert_eq!(skills.calls(), vec!["image:-".to_string()]);
    assert_eq!(history_of(&dispatcher, "s").await[0].content(), "[image]");
}

#[tokio::test]
async fn test_declared_language_is_echoed() {
    let (dispatcher, _, _) = setup(FakeSkills::replying("[LANG:es-ES] Hola"));
    let mut request = IncomingRequest::text("hola");
    request.language = "es-ES".to_string();

    let reply = dispatcher.handle("s", request).await;

    assert_eq!(
        reply,
        Reply::Message {
            reply: "[LANG:es-ES] Hola".to_string(),
            lang: "es-ES".to_string()
        }
    );
}

#[tokio::test]
async fn test_empty_request_is_an_error_reply() {
    let (dispatcher, skills, _) = setup(FakeSkills::default());

    let reply = dispatcher.handle("s", IncomingRequest::text("   ")).await;

    assert_eq!(
        reply,
        Reply::Error {
            error: "Error: request carries neither a message nor an image".to_string()
        }
    );
    assert!(skills.calls().is_empty());
}
