use parking_lot::Mutex;

/// Number of past turns folded into each prompt
pub const HISTORY_WINDOW: usize = 4;

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// Conversation history of a single chat session.
///
/// Turns are kept for the lifetime of the session, but only the trailing
/// window returned by [`ConversationMemory::recent`] is ever read back.
#[derive(Debug, Default, Clone)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every turn
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Record a completed exchange
    pub fn append(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// The shared chat session.
///
/// Every access takes the lock for a single read or write and never across an
/// await, so concurrent requests only serialise on the memory update itself.
/// Two questions in flight both see the history as it was when they read it,
/// and each appends its own turn when done.
#[derive(Debug, Default)]
pub struct Session {
    memory: Mutex<ConversationMemory>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last `n` turns
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        self.memory.lock().recent(n).to_vec()
    }

    pub fn append(&self, user: impl Into<String>, assistant: impl Into<String>) {
        self.memory.lock().append(user, assistant);
    }

    pub fn reset(&self) {
        self.memory.lock().reset();
    }

    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.lock().is_empty()
    }
}
