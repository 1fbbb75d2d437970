//! Scripted collaborators for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use chainfold_llm::Generator;
use chainfold_shared::{ChainfoldError, PeriodWindow, Result};
use chainfold_sources::SearchSource;

/// Replays canned completions in order and records every prompt it saw.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a transport failure after the replies already scripted.
    pub fn then_fail(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ChainfoldError::transport(message)),
            None => Err(ChainfoldError::transport("script exhausted")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Search source that echoes the window label, or fails for one label.
pub struct StubSearch {
    pub fail_on: Option<String>,
    pub queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(label: &str) -> Self {
        Self {
            fail_on: Some(label.to_string()),
            ..Self::new()
        }
    }
}

#[async_trait]
impl SearchSource for StubSearch {
    async fn search(&self, query: &str, window: &PeriodWindow) -> Result<String> {
        self.queries.lock().unwrap().push(window.label.clone());
        if self.fail_on.as_deref() == Some(window.label.as_str()) {
            return Err(ChainfoldError::network(format!("search for {} failed", window.label)));
        }
        Ok(format!("stories about {query} during {}", window.label))
    }
}
