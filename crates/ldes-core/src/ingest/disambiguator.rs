//! LLM-backed resolution of missing and conflicting fields.
//!
//! Requests are batched (several fields per call), rate limited, and each
//! attempt runs under a timeout. A call that fails or times out leaves its
//! fields unresolved; it never fails the document.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::llm::{LlmError, LlmProvider, LlmRequest, LlmResult};
use super::merge::{Candidate, EscalationReason};
use crate::config::LlmConfig;
use crate::field::{Field, Sector};
use crate::text;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You extract facts about energy storage projects from documents. \
Answer only from the supplied text. Respond with a single JSON object and nothing else.";

/// One field to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct DisambiguationRequest {
    pub field: Field,
    pub reason: EscalationReason,
    pub candidates: Vec<Candidate>,
}

impl DisambiguationRequest {
    #[must_use]
    pub fn new(field: Field, reason: EscalationReason, candidates: Vec<Candidate>) -> Self {
        Self {
            field,
            reason,
            candidates,
        }
    }

    /// Candidate values without duplicates, in candidate order.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for c in &self.candidates {
            if !values.contains(&c.value) {
                values.push(c.value.clone());
            }
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisambiguationOutcome {
    Resolved {
        value: String,
        confidence: f64,
        rationale: String,
    },
    /// The model answered but would not commit to a value
    Declined { rationale: String },
    /// The call failed or timed out
    Failed { error: String },
}

/// Audit entry for one escalated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disambiguation {
    pub field: Field,
    pub reason: EscalationReason,
    pub candidates: Vec<String>,
    pub outcome: DisambiguationOutcome,
}

#[derive(Debug, Deserialize)]
struct AnswerDocument {
    #[serde(default)]
    fields: HashMap<String, Answer>,
}

#[derive(Debug, Deserialize)]
struct Answer {
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Pull the JSON object out of a reply, tolerating code fences or chatter.
fn json_body(reply: &str) -> &str {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.trim(),
    }
}

fn answer_value(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => {
            let cleaned = text::clean_value(&s);
            (!cleaned.is_empty()).then_some(cleaned)
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct Disambiguator {
    provider: Arc<dyn LlmProvider>,
    limiter: DefaultDirectRateLimiter,
    config: LlmConfig,
}

impl Disambiguator {
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            provider,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            config,
        }
    }

    /// Context for one request: the text around its candidates, or the start
    /// of the document when there are none.
    fn context<'t>(&self, document: &'t str, request: &DisambiguationRequest) -> &'t str {
        let budget = self.config.context_chars;
        let located = request.candidates.iter().filter(|c| c.end > c.start);
        let start = located.clone().map(|c| c.start).min();
        let end = located.map(|c| c.end).max();

        match (start, end) {
            (Some(start), Some(end)) if end - start <= budget => {
                let radius = (budget - (end - start)) / 2;
                text::window(document, start, end, radius)
            }
            (Some(start), Some(_)) => text::window(document, start, start, budget),
            _ => text::head(document, budget),
        }
    }

    fn build_prompt(&self, document: &str, sector: Sector, batch: &[DisambiguationRequest]) -> String {
        let mut prompt = format!(
            "Sector: {sector}\n\n\
             For each field below, give the single value the text supports. \
             When candidates are listed, prefer one of them. \
             Use null when the text does not say.\n\n\
             Reply as JSON: {{\"fields\": {{\"<field>\": {{\"value\": string or null, \
             \"confidence\": number between 0 and 1, \"rationale\": short string}}}}}}\n"
        );

        for request in batch {
            let values = request.values();
            let candidates = if values.is_empty() {
                "none found".to_string()
            } else {
                values
                    .iter()
                    .map(|v| format!("\"{v}\""))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            prompt.push_str(&format!(
                "\nField: {}\nMeaning: {}\nCandidates: {candidates}\nText:\n\"\"\"\n{}\n\"\"\"\n",
                request.field,
                request.field.describe(),
                self.context(document, request),
            ));
        }
        prompt
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.config.backoff_base_ms;
        let exponential = base.saturating_mul(1_u64 << attempt.min(16));
        let jitter = rand::rng().random_range(0..=base);
        let computed = Duration::from_millis(exponential.saturating_add(jitter)).min(MAX_BACKOFF);
        retry_after.map_or(computed, |r| r.max(computed).min(MAX_BACKOFF))
    }

    /// One provider call with rate limiting, timeout and bounded retries.
    ///
    /// The timeout covers the wait for a rate-limit slot as well as the call,
    /// so a saturated limiter fails the attempt instead of stalling the
    /// document.
    async fn call(&self, request: &LlmRequest) -> LlmResult<String> {
        let timeout = self.config.timeout();
        let mut attempt = 0;
        loop {
            let attempt_call = async {
                self.limiter.until_ready().await;
                self.provider.complete(request).await
            };

            let result = match tokio::time::timeout(timeout, attempt_call).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(timeout)),
            };

            match result {
                Err(LlmError::RateLimited { retry_after }) if attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt, retry_after);
                    tracing::warn!(attempt, delay_ms = delay.as_millis(), "LLM rate limited, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(LlmError::Unavailable(reason)) if attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt, None);
                    tracing::warn!(attempt, %reason, "LLM unavailable, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
            attempt += 1;
        }
    }

    fn interpret(&self, reply: &str, batch: &[DisambiguationRequest]) -> LlmResult<Vec<Disambiguation>> {
        let document: AnswerDocument = serde_json::from_str(json_body(reply))
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let mut answers: HashMap<Field, Answer> = HashMap::new();
        for (name, answer) in document.fields {
            match name.parse::<Field>() {
                Ok(field) => {
                    answers.insert(field, answer);
                }
                Err(_) => tracing::debug!(field = %name, "Ignoring unknown field in LLM reply"),
            }
        }

        Ok(batch
            .iter()
            .map(|request| {
                let answer = answers.remove(&request.field);
                let outcome = match answer {
                    Some(answer) => {
                        let rationale = answer.rationale.unwrap_or_default();
                        match answer_value(answer.value) {
                            Some(value) => DisambiguationOutcome::Resolved {
                                value,
                                confidence: answer
                                    .confidence
                                    .filter(|c| c.is_finite())
                                    .unwrap_or(self.config.default_confidence)
                                    .clamp(0.0, 1.0),
                                rationale,
                            },
                            None => DisambiguationOutcome::Declined { rationale },
                        }
                    }
                    None => DisambiguationOutcome::Declined {
                        rationale: "field missing from reply".to_string(),
                    },
                };
                Disambiguation {
                    field: request.field,
                    reason: request.reason,
                    candidates: request.values(),
                    outcome,
                }
            })
            .collect())
    }

    /// Resolve every request, `max_batch_fields` at a time. Returns one entry
    /// per request, in request order.
    pub async fn disambiguate(
        &self,
        document: &str,
        sector: Sector,
        requests: &[DisambiguationRequest],
    ) -> Vec<Disambiguation> {
        let mut results = Vec::with_capacity(requests.len());

        for batch in requests.chunks(self.config.max_batch_fields.max(1)) {
            let request = LlmRequest {
                system: SYSTEM_PROMPT.to_string(),
                prompt: self.build_prompt(document, sector, batch),
            };

            let outcome = match self.call(&request).await {
                Ok(reply) => self.interpret(&reply, batch),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(resolved) => results.extend(resolved),
                Err(e) => {
                    let fields: Vec<&str> = batch.iter().map(|r| r.field.as_str()).collect();
                    tracing::warn!(
                        provider = self.provider.name(),
                        fields = ?fields,
                        error = %e,
                        "Disambiguation failed"
                    );
                    results.extend(batch.iter().map(|r| Disambiguation {
                        field: r.field,
                        reason: r.reason,
                        candidates: r.values(),
                        outcome: DisambiguationOutcome::Failed {
                            error: e.to_string(),
                        },
                    }));
                }
            }
        }

        results
    }
}
