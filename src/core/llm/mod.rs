//! LLM adapter: the only component that talks to the model backend.
//!
//! Every execution path routes through both the per-minute and per-day
//! rate limiters. The provider behind the adapter is an explicit
//! constructor dependency, never an ambient lookup.

pub mod provider;

use std::sync::Arc;

use base64::Engine;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::error::{FailureKind, LlmError, classify_failure};
use crate::core::ratelimit::{RateLimitConfig, RateLimiter, WindowSnapshot};
use crate::core::task::{AgentMode, TaskFile};
use provider::{EncodedFile, GenerationRequest, LlmProvider};

pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub max_file_bytes: usize,
    pub per_minute: RateLimitConfig,
    pub per_day: RateLimitConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            per_minute: RateLimitConfig::per_minute(),
            per_day: RateLimitConfig::per_day(),
        }
    }
}

/// Sampling temperature per mode. Unlisted modes take the backend default.
pub fn temperature(mode: AgentMode) -> Option<f32> {
    match mode {
        AgentMode::Architect => Some(0.7),
        AgentMode::Coder => Some(0.3),
        AgentMode::Tester => Some(0.2),
        AgentMode::Debugger => Some(0.1),
        AgentMode::Security => Some(0.2),
        AgentMode::Documentation => Some(0.5),
        AgentMode::Designer => Some(0.8),
        AgentMode::Ask => Some(0.8),
        _ => None,
    }
}

/// System prompt per mode.
pub fn system_prompt(mode: AgentMode) -> &'static str {
    match mode {
        AgentMode::Architect => {
            "You are a software architect. Design structures, boundaries, and trade-offs before code."
        }
        AgentMode::Coder => {
            "You are a senior programmer. Produce working, idiomatic code for the task at hand."
        }
        AgentMode::Tester => {
            "You are a test engineer. Probe the described behavior and report concrete failures."
        }
        AgentMode::Debugger => {
            "You are a debugger. Locate the root cause before proposing any fix."
        }
        AgentMode::Security => {
            "You are a security reviewer. Identify vulnerabilities and unsafe handling of input."
        }
        AgentMode::Documentation => {
            "You are a technical writer. Explain the subject accurately for its audience."
        }
        AgentMode::Integrator => {
            "You are an integration engineer. Wire components together and reconcile interfaces."
        }
        AgentMode::Monitor => {
            "You are an operations monitor. Assess health signals and flag anomalies."
        }
        AgentMode::Optimizer => {
            "You are a performance engineer. Find and remove bottlenecks, with measurements."
        }
        AgentMode::Ask => "You are a helpful assistant. Answer the question directly.",
        AgentMode::Devops => {
            "You are a DevOps engineer. Handle build, deployment, and infrastructure concerns."
        }
        AgentMode::Tutorial => {
            "You are a tutor. Teach the topic step by step with short examples."
        }
        AgentMode::Database => {
            "You are a database engineer. Design schemas and queries with care for integrity."
        }
        AgentMode::Specification => {
            "You are a specification writer. State requirements precisely and unambiguously."
        }
        AgentMode::Mcp => {
            "You are a protocol integration agent. Operate external tools through their declared interfaces."
        }
        AgentMode::Orchestrator => {
            "You are a coordinator. Break work into tasks and delegate; do not do the work yourself."
        }
        AgentMode::Designer => {
            "You are a product designer. Shape interfaces and flows around the user's intent."
        }
    }
}

/// The two limiter window snapshots, for status reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RateLimitStatus {
    pub per_minute: WindowSnapshot,
    pub per_day: WindowSnapshot,
}

pub struct LlmAdapter {
    provider: Arc<dyn LlmProvider>,
    per_minute: RateLimiter,
    per_day: RateLimiter,
    max_file_bytes: usize,
}

impl LlmAdapter {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self {
            provider,
            per_minute: RateLimiter::new(config.per_minute),
            per_day: RateLimiter::new(config.per_day),
            max_file_bytes: config.max_file_bytes,
        }
    }

    fn build_request(
        &self,
        prompt: &str,
        mode: AgentMode,
        attachments: Vec<EncodedFile>,
    ) -> GenerationRequest {
        GenerationRequest {
            system: system_prompt(mode).to_string(),
            user: prompt.to_string(),
            temperature: temperature(mode),
            attachments,
        }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let result = self
            .per_minute
            .execute(|| async move {
                self.per_day.check_and_register().await;
                self.provider.generate(request).await.map_err(|e| {
                    let message = format!("{e:#}");
                    match classify_failure(&message) {
                        FailureKind::RateLimit => LlmError::RateLimited(message),
                        _ => LlmError::Execution(message),
                    }
                })
            })
            .await;

        // Exhausted rate-limit retries surface as an execution failure.
        result.map_err(|e| match e {
            LlmError::RateLimited(message) => {
                LlmError::Execution(format!("rate limit retries exhausted: {message}"))
            }
            other => other,
        })
    }

    /// Single-shot text generation with the mode's system prompt and
    /// temperature.
    pub async fn execute(&self, prompt: &str, mode: AgentMode) -> Result<String, LlmError> {
        let request = self.build_request(prompt, mode, Vec::new());
        self.run(&request).await
    }

    /// Like [LlmAdapter::execute], with files attached as base64 data.
    /// Oversized files are rejected before any network call.
    pub async fn execute_multimodal(
        &self,
        prompt: &str,
        files: &[TaskFile],
        mode: AgentMode,
    ) -> Result<String, LlmError> {
        let attachments = self.encode_files(files)?;
        let request = self.build_request(prompt, mode, attachments);
        self.run(&request).await
    }

    fn encode_files(&self, files: &[TaskFile]) -> Result<Vec<EncodedFile>, LlmError> {
        files
            .iter()
            .map(|file| {
                if file.data.len() > self.max_file_bytes {
                    return Err(LlmError::FileTooLarge {
                        name: file.name.clone(),
                        size: file.data.len(),
                        max: self.max_file_bytes,
                    });
                }
                Ok(EncodedFile {
                    mime_type: file.mime_type.clone(),
                    data_base64: base64::engine::general_purpose::STANDARD.encode(&file.data),
                })
            })
            .collect()
    }

    /// Streamed generation. Chunks arrive in backend order; a backend
    /// failure terminates the sequence with a final `Err`. Not restartable.
    pub async fn stream_execute(
        &self,
        prompt: &str,
        mode: AgentMode,
    ) -> Result<mpsc::Receiver<Result<String, LlmError>>, LlmError> {
        let request = self.build_request(prompt, mode, Vec::new());

        self.per_minute.check_and_register().await;
        self.per_day.check_and_register().await;

        let mut raw = self
            .provider
            .generate_stream(&request)
            .await
            .map_err(|e| LlmError::Stream(format!("{e:#}")))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(item) = raw.recv().await {
                let mapped = item.map_err(|e| LlmError::Stream(format!("{e:#}")));
                let terminal = mapped.is_err();
                if tx.send(mapped).await.is_err() || terminal {
                    return;
                }
            }
        });
        Ok(rx)
    }

    /// Minimal prompt round-trip. True iff a non-empty response arrived.
    /// Never raises.
    pub async fn check_health(&self) -> bool {
        match self.execute("Reply with a single word: ok", AgentMode::Ask).await {
            Ok(text) => !text.trim().is_empty(),
            Err(e) => {
                debug!("health probe failed: {e}");
                false
            }
        }
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        RateLimitStatus {
            per_minute: self.per_minute.status().await,
            per_day: self.per_day.status().await,
        }
    }
}
