/// Rule-based intent recognition.
/// Every message is matched against an ordered list of literal keyword rules; the
/// first rule that fires decides the route.

use crate::conversation::PendingContext;
use once_cell::sync::Lazy;
use regex::Regex;

static VIDEO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"video|watch|play|paly|song|gana|music|youtube").expect("valid regex"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("valid regex"));

static CITY_STOP_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(what|whats|is|the|today|todays|weather|temperature|mausam|in|at|for|please|tell|me|check|batao|location|my|current|right|now|hey|hi)\b",
    )
    .expect("valid regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static VIDEO_QUERY_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)video|watch|play|paly|dekho|chalao|song|gana|music|on youtube")
        .expect("valid regex")
});

static VIDEO_TITLE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)play|song|video").expect("valid regex"));

static SEARCH_QUERY_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)search for|search|google|on internet").expect("valid regex"));

/// Handling path chosen for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// An image is attached; describe it
    Image,
    /// Answer to a pending "which city?" using the caller's coordinates
    ContinueWeatherCity,
    /// User wants directions
    Navigation,
    /// Weather by city name or coordinates
    Weather,
    /// User asks where they are
    CurrentLocation,
    /// Play something on YouTube
    YouTube,
    /// Open a web search on the host
    DirectSearch,
    /// Top headlines
    News,
    /// Factual who/what question answered from a search snippet
    GoogleQuestion,
    /// Nothing matched; ask the language model
    ModelFallback,
}

/// Pick the route for a message. Rule order is fixed and first match wins.
pub fn classify(
    text: &str,
    has_image: bool,
    pending: PendingContext,
    _has_coordinates: bool,
) -> Route {
    let m = text.to_lowercase();

    if has_image {
        return Route::Image;
    }
    if pending == PendingContext::AwaitingCity && (m.contains("location") || m.contains("my")) {
        return Route::ContinueWeatherCity;
    }
    if is_navigation(&m) {
        return Route::Navigation;
    }
    if is_weather(&m) {
        return Route::Weather;
    }
    if is_current_location(&m) {
        return Route::CurrentLocation;
    }
    if VIDEO_PATTERN.is_match(&m) {
        return Route::YouTube;
    }
    if m.contains("search") {
        return Route::DirectSearch;
    }
    if m.starts_with("who") || m.starts_with("what") {
        return Route::GoogleQuestion;
    }
    if m.contains("news") {
        return Route::News;
    }
    Route::ModelFallback
}

fn is_navigation(m: &str) -> bool {
    m.contains("navigate") || m.contains("guide")
}

fn is_weather(m: &str) -> bool {
    m.contains("weather") || m.contains("mausam") || m.contains("temperature")
}

fn is_current_location(m: &str) -> bool {
    m.contains("location") || m.contains("where am i")
}

/// Pull a city name out of a weather request, or `None` if nothing longer than a
/// single character is left once punctuation and filler words are gone.
pub fn extract_city(message: &str) -> Option<String> {
    let clean = message.to_lowercase();
    let clean = NON_ALPHANUMERIC.replace_all(&clean, "");
    let clean = CITY_STOP_WORDS.replace_all(&clean, "");
    let clean = WHITESPACE.replace_all(clean.trim(), " ").to_string();

    tracing::debug!(raw = message, city = %clean, "extracted city");

    if clean.chars().count() > 1 {
        Some(clean)
    } else {
        None
    }
}

/// Search terms for a video request.
pub fn video_query(message: &str) -> String {
    VIDEO_QUERY_NOISE.replace_all(message, "").trim().to_string()
}

/// Title echoed back to the user when a video is opened.
pub fn video_title(message: &str) -> String {
    VIDEO_TITLE_NOISE.replace_all(message, "").trim().to_string()
}

/// Query for a direct web search request.
pub fn search_query(message: &str) -> String {
    SEARCH_QUERY_NOISE.replace_all(message, "").trim().to_string()
}
