//! Ordered multi-turn history with staged appends.
//!
//! A question is staged while its answer is produced and committed together
//! with the answer only on success. Readers only ever see committed turns.
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// A committed turn. Never mutated after commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    id: Uuid,
    seq: u64,
    role: Role,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_document: Option<String>,
}

impl ConversationTurn {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_document(&self) -> Option<&str> {
        self.source_document.as_deref()
    }
}

/// The model side of a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub source_document: Option<String>,
}

struct StagedTurn {
    id: Uuid,
    text: String,
}

/// One session's history.
pub struct Conversation {
    id: String,
    in_flight: tokio::sync::Mutex<()>,
    turns: RwLock<Vec<ConversationTurn>>,
    pending: RwLock<Option<StagedTurn>>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            in_flight: tokio::sync::Mutex::new(()),
            turns: RwLock::new(Vec::new()),
            pending: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of committed turns in append order.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The question currently awaiting an answer, if any.
    pub fn pending_question(&self) -> Option<String> {
        self.pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|staged| staged.text.clone())
    }

    /// Ask `question`, answering it with `produce(history, question)`.
    ///
    /// Concurrent askers on the same session queue behind each other. On
    /// success the user turn and the model turn are committed in that order and
    /// the model turn is returned; on failure (or cancellation) the staged
    /// question is discarded and history is unchanged.
    pub async fn ask<F, Fut, E>(&self, question: String, produce: F) -> Result<ConversationTurn, E>
    where
        F: FnOnce(Vec<ConversationTurn>, String) -> Fut,
        Fut: Future<Output = Result<ModelReply, E>>,
    {
        let _flight = self.in_flight.lock().await;
        let history = self.turns();

        let staged = StagedTurn {
            id: Uuid::new_v4(),
            text: question.clone(),
        };
        *self.pending.write().unwrap_or_else(PoisonError::into_inner) = Some(staged);
        let guard = PendingGuard(&self.pending);

        let reply = produce(history, question).await;

        let staged = guard.take();
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                tracing::debug!(session = %self.id, "staged question discarded");
                return Err(err);
            }
        };

        let mut turns = self.turns.write().unwrap_or_else(PoisonError::into_inner);
        let next_seq = turns.len() as u64;
        if let Some(staged) = staged {
            turns.push(ConversationTurn {
                id: staged.id,
                seq: next_seq,
                role: Role::User,
                text: staged.text,
                source_document: None,
            });
        }
        let answer = ConversationTurn {
            id: Uuid::new_v4(),
            seq: turns.len() as u64,
            role: Role::Model,
            text: reply.text,
            source_document: reply.source_document,
        };
        turns.push(answer.clone());
        tracing::debug!(session = %self.id, turns = turns.len(), "exchange committed");
        Ok(answer)
    }

    /// Drop all committed turns.
    pub async fn clear(&self) {
        let _flight = self.in_flight.lock().await;
        self.turns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Clears the staged question on every exit path, including cancellation.
struct PendingGuard<'a>(&'a RwLock<Option<StagedTurn>>);

impl PendingGuard<'_> {
    fn take(self) -> Option<StagedTurn> {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Transient sessions keyed by id.
///
/// With an idle timeout, sessions untouched for longer than the timeout are
/// evicted whenever a session is created. A session whose [`Conversation`] is
/// still held elsewhere (for example by an `ask` in progress) is never evicted.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_timeout: Option<Duration>,
}

struct SessionEntry {
    conversation: Arc<Conversation>,
    last_used: Instant,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::default(),
            idle_timeout: Some(idle_timeout),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.lock().get_mut(id).map(|entry| {
            entry.last_used = Instant::now();
            entry.conversation.clone()
        })
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Conversation> {
        let mut sessions = self.lock();
        if !sessions.contains_key(id) {
            self.evict_idle_locked(&mut sessions);
        }
        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry {
                conversation: Arc::new(Conversation::new(id)),
                last_used: Instant::now(),
            });
        entry.last_used = Instant::now();
        entry.conversation.clone()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Conversation>> {
        self.lock().remove(id).map(|entry| entry.conversation)
    }

    /// Drop idle sessions now. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.lock();
        self.evict_idle_locked(&mut sessions)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_idle_locked(&self, sessions: &mut HashMap<String, SessionEntry>) -> usize {
        let Some(idle_timeout) = self.idle_timeout else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, entry| {
            Arc::strong_count(&entry.conversation) > 1 || entry.last_used.elapsed() < idle_timeout
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
