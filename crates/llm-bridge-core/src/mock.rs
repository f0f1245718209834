//! Mock language model for testing.
//!
//! [`MockLanguageModel`] is a queue-based fake that lets tests control
//! exactly what responses, parts and errors a model returns, without
//! touching the network. It implements [`LanguageModel`], so it also works
//! through [`DynLanguageModel`](crate::DynLanguageModel) via the blanket
//! impl.
//!
//! ```rust,no_run
//! use llm_bridge_core::mock::MockLanguageModel;
//! use llm_bridge_core::{CallMode, CallOptions, LanguageModel, ModelMetadata, Prompt, StreamPart};
//!
//! # async fn example() {
//! let mock = MockLanguageModel::new(ModelMetadata::new("test", "test-model"));
//! mock.queue_stream(vec![StreamPart::text("Hello")]);
//!
//! let opts = CallOptions::new(CallMode::regular(), Prompt::default());
//! let _stream = mock.stream(&opts).await.unwrap();
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! [`LlmError`] carries a `serde_json::Error` source and is not `Clone`,
//! so queued failures use the cloneable [`MockError`] and are converted
//! at dequeue time.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::mode::CallMode;
use crate::model::{CallOptions, GenerateResponse, LanguageModel, ModelMetadata};
use crate::stream::{PartStream, StreamPart};

/// A queue-based mock model for unit and integration tests.
///
/// Each call to `generate` or `stream` pops from the front of the
/// respective queue and records its [`CallOptions`] for later assertion
/// via [`recorded_calls`](Self::recorded_calls).
///
/// Modes registered with [`reject_mode`](Self::reject_mode) fail with
/// [`LlmError::UnsupportedMode`] without consuming a queued entry.
///
/// # Panics
///
/// `generate` panics if the response queue is empty; `stream` panics if
/// the stream queue is empty.
pub struct MockLanguageModel {
    responses: Mutex<VecDeque<Result<GenerateResponse, MockError>>>,
    stream_responses: Mutex<VecDeque<Result<Vec<StreamPart>, MockError>>>,
    rejected_modes: Mutex<HashSet<&'static str>>,
    meta: ModelMetadata,
    calls: Arc<Mutex<Vec<CallOptions>>>,
}

/// Cloneable error subset for mock queuing.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Maps to [`LlmError::Provider`].
    Provider {
        /// Provider error code.
        code: String,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Timeout`].
    Timeout {
        /// Elapsed milliseconds.
        elapsed_ms: u64,
    },
}

impl MockError {
    fn into_llm_error(self) -> LlmError {
        match self {
            Self::Http {
                status,
                message,
                retryable,
            } => LlmError::Http {
                status,
                message,
                retryable,
            },
            Self::InvalidRequest(msg) => LlmError::InvalidRequest(msg),
            Self::Provider {
                code,
                message,
                retryable,
            } => LlmError::Provider {
                code,
                message,
                retryable,
            },
            Self::Timeout { elapsed_ms } => LlmError::Timeout { elapsed_ms },
        }
    }
}

impl fmt::Debug for MockLanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response_len = self.responses.lock().unwrap().len();
        let stream_len = self.stream_responses.lock().unwrap().len();
        let call_count = self.calls.lock().unwrap().len();
        f.debug_struct("MockLanguageModel")
            .field("meta", &self.meta)
            .field("queued_responses", &response_len)
            .field("queued_streams", &stream_len)
            .field("recorded_calls", &call_count)
            .finish()
    }
}

impl MockLanguageModel {
    /// Creates a new mock with the given metadata and empty queues.
    pub fn new(meta: ModelMetadata) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            stream_responses: Mutex::new(VecDeque::new()),
            rejected_modes: Mutex::new(HashSet::new()),
            meta,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enqueues a successful response for the next `generate` call.
    pub fn queue_response(&self, response: GenerateResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Enqueues an error for the next `generate` call.
    pub fn queue_error(&self, error: MockError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Enqueues parts for the next `stream` call.
    pub fn queue_stream(&self, parts: Vec<StreamPart>) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Ok(parts));
        self
    }

    /// Enqueues an error for the next `stream` call.
    ///
    /// The error is returned from `stream()` itself, before any part is
    /// yielded.
    pub fn queue_stream_error(&self, error: MockError) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Makes every call using `mode` (a wire name such as
    /// `"object-grammar"`) fail with [`LlmError::UnsupportedMode`].
    pub fn reject_mode(&self, mode: &'static str) -> &Self {
        self.rejected_modes.lock().unwrap().insert(mode);
        self
    }

    /// Returns a clone of all `CallOptions` passed to `generate` or
    /// `stream`, in call order.
    pub fn recorded_calls(&self) -> Vec<CallOptions> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, options: &CallOptions) {
        self.calls.lock().unwrap().push(options.clone());
    }

    fn check_mode(&self, mode: &CallMode) -> Result<(), LlmError> {
        if self.rejected_modes.lock().unwrap().contains(mode.name()) {
            return Err(LlmError::unsupported_mode(
                self.meta.provider.clone(),
                mode.name(),
            ));
        }
        Ok(())
    }
}

impl LanguageModel for MockLanguageModel {
    async fn generate(&self, options: &CallOptions) -> Result<GenerateResponse, LlmError> {
        self.record_call(options);
        self.check_mode(&options.mode)?;
        let result = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockLanguageModel: no queued responses remaining");
        result.map_err(MockError::into_llm_error)
    }

    async fn stream(&self, options: &CallOptions) -> Result<PartStream, LlmError> {
        self.record_call(options);
        self.check_mode(&options.mode)?;
        let result = self
            .stream_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockLanguageModel: no queued stream responses remaining");
        let parts = result.map_err(MockError::into_llm_error)?;
        Ok(Box::pin(futures::stream::iter(parts)))
    }

    fn metadata(&self) -> ModelMetadata {
        self.meta.clone()
    }
}
