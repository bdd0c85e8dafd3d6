use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Maximum number of turns kept per conversation.
pub const HISTORY_CAPACITY: usize = 20;

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    role: Role,
    content: String,
    at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Follow-up expectation carried from one turn to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingContext {
    #[default]
    None,
    AwaitingCity,
}

/// History and pending context of one conversation.
#[derive(Debug, Default)]
pub struct ConversationState {
    history: VecDeque<Turn>,
    context: PendingContext,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(turn);
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn set_context(&mut self, context: PendingContext) {
        self.context = context;
    }

    pub fn context(&self) -> PendingContext {
        self.context
    }
}

pub type SharedConversation = Arc<tokio::sync::Mutex<ConversationState>>;

/// Sessions kept before the least recently used one is dropped.
pub const MAX_SESSIONS: usize = 1024;

/// Sessions untouched for this long are dropped when a new one is created.
pub const SESSION_IDLE_MINUTES: i64 = 30;

#[derive(Debug)]
struct SessionEntry {
    conversation: SharedConversation,
    last_used: DateTime<Utc>,
}

/// Conversation state keyed by session id.
///
/// Each session is behind its own async mutex, so the dispatcher holds it for a whole
/// exchange and two requests of one session never interleave. Different sessions do
/// not contend. The map is bounded: idle sessions expire and the least recently used
/// one is evicted once `max_sessions` is reached.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    max_sessions: usize,
    idle_ttl: chrono::Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(MAX_SESSIONS, chrono::Duration::minutes(SESSION_IDLE_MINUTES))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: chrono::Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    pub fn session(&self, session_id: &str) -> SharedConversation {
        let now = Utc::now();
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_used = now;
            return entry.conversation.clone();
        }

        self.evict(&mut sessions, now);

        let conversation = Arc::new(tokio::sync::Mutex::new(ConversationState::new()));
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                conversation: conversation.clone(),
                last_used: now,
            },
        );
        conversation
    }

    /// Make room for one more session.
    fn evict(&self, sessions: &mut HashMap<String, SessionEntry>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, entry| now - entry.last_used < self.idle_ttl);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let dropped = before - sessions.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = sessions.len(), "evicted conversation sessions");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
