//! Scripted [`Llm`] for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ModelError, Result};
use crate::llm::{Llm, LlmRequest, LlmResponse};

enum Outcome {
    Text(String),
    Fail(String),
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, VecDeque<Outcome>>,
    calls: Vec<LlmRequest>,
}

/// An [`Llm`] that replays queued outcomes per model and records every call.
///
/// Each call pops the next outcome queued for the request's model. When a
/// model's queue is empty the default response is returned, or an error if
/// none was set.
///
/// ```rust
/// use kanva_model::{Content, Llm, LlmRequest, MockLlm};
///
/// # tokio_test_block(async {
/// let llm = MockLlm::new().fail("a", "boom").respond("a", "ok");
/// assert!(llm.generate_content(LlmRequest::new("a", vec![Content::user("hi")])).await.is_err());
/// assert_eq!(llm.generate_content(LlmRequest::new("a", vec![])).await.unwrap().text, "ok");
/// assert_eq!(llm.attempted_models(), vec!["a", "a"]);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Default)]
pub struct MockLlm {
    state: Mutex<State>,
    default_response: Option<String>,
    delay: Option<Duration>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `model`.
    pub fn respond(self, model: &str, text: impl Into<String>) -> Self {
        self.push(model, Outcome::Text(text.into()));
        self
    }

    /// Queue a provider failure for `model`.
    pub fn fail(self, model: &str, message: impl Into<String>) -> Self {
        self.push(model, Outcome::Fail(message.into()));
        self
    }

    /// Response for calls with nothing queued.
    pub fn with_default_response(mut self, text: impl Into<String>) -> Self {
        self.default_response = Some(text.into());
        self
    }

    /// Sleep before every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received, in order.
    pub fn calls(&self) -> Vec<LlmRequest> {
        self.lock().calls.clone()
    }

    /// The model of every request received, in order.
    pub fn attempted_models(&self) -> Vec<String> {
        self.lock().calls.iter().map(|r| r.model.clone()).collect()
    }

    fn push(&self, model: &str, outcome: Outcome) {
        self.lock().scripts.entry(model.to_string()).or_default().push_back(outcome);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_content(&self, request: LlmRequest) -> Result<LlmResponse> {
        let model = request.model.clone();
        let outcome = {
            let mut state = self.lock();
            state.calls.push(request);
            state.scripts.get_mut(&model).and_then(VecDeque::pop_front)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Some(Outcome::Text(text)) => Ok(LlmResponse { model, text, finish_reason: None }),
            Some(Outcome::Fail(message)) => Err(ModelError::provider(model, message)),
            None => match &self.default_response {
                Some(text) => Ok(LlmResponse { model, text: text.clone(), finish_reason: None }),
                None => Err(ModelError::provider(model, "no scripted response")),
            },
        }
    }
}
