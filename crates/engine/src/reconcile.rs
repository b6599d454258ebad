//! Extraction, validation, and correction loop over the vision provider.
//!
//! The provider is non-deterministic and frequently wrong about arithmetic,
//! so a scan is a bounded loop: extract, validate, ask the provider to
//! repair its own numbers, and keep the best candidate seen so far. A scan
//! that never converges still returns that best candidate, annotated with a
//! warning, rather than nothing.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde_json::Value;

use crate::{
    EngineError, Receipt, ResultEngine,
    validate::{Validated, validate},
};

/// Warning attached to best-effort receipts that never converged.
pub const NON_CONVERGENT_WARNING: &str =
    "Receipt calculations may be inaccurate. Please verify the amounts manually.";

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Black-box receipt extraction service.
///
/// Implementations are expected to be unreliable: they may fail, hang, or
/// return free text with a JSON object buried inside it. The reconciler
/// treats every failure as an attempt failure, never as terminal.
pub trait ExtractionProvider {
    /// Extracts a candidate receipt payload from an image.
    ///
    /// `retry_hint` is set from the second attempt onwards; implementations
    /// should tell the model its previous arithmetic was wrong.
    fn extract(
        &self,
        image: &[u8],
        retry_hint: bool,
    ) -> impl Future<Output = ResultEngine<String>> + Send;

    /// Asks the provider to repair a candidate given the discrepancies found
    /// against it.
    fn correct(
        &self,
        candidate: &Receipt,
        discrepancies: &[String],
    ) -> impl Future<Output = ResultEngine<String>> + Send;
}

/// Cooperative cancellation flag for a scan in progress.
///
/// Cancellation takes effect between attempts, never mid-call.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives repeated extraction/validation/correction attempts against a
/// provider and returns the best receipt it can.
pub struct Reconciler<P> {
    provider: P,
    max_attempts: usize,
    call_timeout: Duration,
}

impl<P: ExtractionProvider + Sync> Reconciler<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Runs the scan loop for one image.
    ///
    /// Returns the first zero-discrepancy receipt, or the best candidate
    /// seen (fewest discrepancies, tracked across attempts and corrections)
    /// with [`NON_CONVERGENT_WARNING`] attached. Fails only when every
    /// attempt was unusable, or when `cancel` fires between attempts.
    pub async fn reconcile(&self, image: &[u8], cancel: &CancelToken) -> ResultEngine<Receipt> {
        let mut best: Option<Validated> = None;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(attempt, "receipt scan cancelled");
                return Err(EngineError::Cancelled);
            }

            let Some(candidate) = self.extract_candidate(image, attempt).await else {
                continue;
            };

            let validated = validate(&candidate);
            if validated.discrepancies.is_empty() {
                tracing::info!(attempt, "receipt accepted");
                return Ok(validated.receipt);
            }
            remember_best(&mut best, validated.clone());

            if attempt < self.max_attempts {
                let corrected = self
                    .correct_candidate(&validated.receipt, &validated.discrepancies)
                    .await;
                if let Some(corrected) = corrected {
                    let revalidated = validate(&corrected);
                    if revalidated.discrepancies.is_empty() {
                        tracing::info!(attempt, "receipt accepted after correction");
                        return Ok(revalidated.receipt);
                    }
                    remember_best(&mut best, revalidated);
                }
            }
        }

        match best {
            Some(validated) => {
                tracing::warn!(
                    unresolved = validated.discrepancies.len(),
                    "returning best-effort receipt"
                );
                let mut receipt = validated.receipt;
                receipt.warning = Some(NON_CONVERGENT_WARNING.to_string());
                receipt.discrepancies = validated.discrepancies;
                Ok(receipt)
            }
            None => Err(EngineError::ExtractionFailed(self.max_attempts)),
        }
    }

    async fn extract_candidate(&self, image: &[u8], attempt: usize) -> Option<Value> {
        let call = self.provider.extract(image, attempt > 1);
        let text = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!(attempt, "extraction call failed: {err}");
                return None;
            }
            Err(_) => {
                tracing::warn!(attempt, timeout = ?self.call_timeout, "extraction call timed out");
                return None;
            }
        };

        let candidate = parse_payload(&text);
        if candidate.is_none() {
            tracing::warn!(attempt, "no JSON object found in provider response");
        }
        candidate
    }

    async fn correct_candidate(
        &self,
        candidate: &Receipt,
        discrepancies: &[String],
    ) -> Option<Value> {
        let call = self.provider.correct(candidate, discrepancies);
        let text = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!("correction call failed: {err}");
                return None;
            }
            Err(_) => {
                tracing::warn!("correction call timed out");
                return None;
            }
        };
        parse_payload(&text)
    }
}

fn remember_best(best: &mut Option<Validated>, candidate: Validated) {
    let improves = best
        .as_ref()
        .is_none_or(|b| candidate.discrepancies.len() < b.discrepancies.len());
    if improves {
        tracing::debug!(
            discrepancies = candidate.discrepancies.len(),
            "new best candidate"
        );
        *best = Some(candidate);
    }
}

/// Parses provider output as JSON, falling back to the first balanced
/// object-like substring when the payload is wrapped in prose.
fn parse_payload(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str(text) {
        return Some(value);
    }
    let fragment = balanced_object(text)?;
    match serde_json::from_str(fragment) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// First `{...}` substring with balanced braces, ignoring braces inside
/// string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    /// Scripted provider: pops one canned response per call.
    #[derive(Default)]
    struct Scripted {
        extractions: Mutex<VecDeque<ResultEngine<String>>>,
        corrections: Mutex<VecDeque<ResultEngine<String>>>,
        retry_hints: Mutex<Vec<bool>>,
    }

    impl Scripted {
        fn extraction(self, response: ResultEngine<String>) -> Self {
            self.extractions.lock().unwrap().push_back(response);
            self
        }

        fn correction(self, response: ResultEngine<String>) -> Self {
            self.corrections.lock().unwrap().push_back(response);
            self
        }
    }

    impl ExtractionProvider for Scripted {
        fn extract(
            &self,
            _image: &[u8],
            retry_hint: bool,
        ) -> impl Future<Output = ResultEngine<String>> + Send {
            self.retry_hints.lock().unwrap().push(retry_hint);
            let response = self
                .extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::Provider("script exhausted".to_string())));
            async move { response }
        }

        fn correct(
            &self,
            _candidate: &Receipt,
            _discrepancies: &[String],
        ) -> impl Future<Output = ResultEngine<String>> + Send {
            let response = self
                .corrections
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(EngineError::Provider("script exhausted".to_string())));
            async move { response }
        }
    }

    const CLEAN: &str = r#"{
        "merchantName": "Cafe",
        "items": [{"name": "Coffee", "price": 3.50}, {"name": "Bagel", "price": 2.25}],
        "tax": 0.50,
        "total": 6.25
    }"#;

    const BROKEN: &str = r#"{
        "merchantName": "Cafe",
        "items": [{"name": "Coffee", "price": 3.50}],
        "total": 9.99
    }"#;

    #[tokio::test]
    async fn clean_payload_is_accepted_on_first_attempt() {
        let provider = Scripted::default().extraction(Ok(CLEAN.to_string()));
        let reconciler = Reconciler::new(provider);

        let receipt = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.merchant_name, "Cafe");
        assert!(receipt.warning.is_none());
        assert!(receipt.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn prose_wrapped_json_is_extracted() {
        let wrapped = format!("Sure! Here is the receipt:\n```json\n{CLEAN}\n``` Enjoy.");
        let provider = Scripted::default().extraction(Ok(wrapped));
        let reconciler = Reconciler::new(provider);

        let receipt = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.items.len(), 2);
    }

    #[tokio::test]
    async fn correction_can_rescue_an_attempt() {
        let provider = Scripted::default()
            .extraction(Ok(BROKEN.to_string()))
            .correction(Ok(CLEAN.to_string()));
        let reconciler = Reconciler::new(provider);

        let receipt = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap();
        assert!(receipt.warning.is_none());
        assert_eq!(receipt.total.cents(), 625);
    }

    #[tokio::test]
    async fn retry_prompts_carry_the_emphasis_hint() {
        let provider = Scripted::default()
            .extraction(Err(EngineError::Provider("down".to_string())))
            .extraction(Ok(CLEAN.to_string()));
        let reconciler = Reconciler::new(provider);

        let receipt = reconciler.reconcile(b"img", &CancelToken::new()).await;
        assert!(receipt.is_ok());
        let hints = reconciler.provider.retry_hints.lock().unwrap().clone();
        assert_eq!(hints, vec![false, true]);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_best_effort_with_warning() {
        let provider = Scripted::default()
            .extraction(Ok(BROKEN.to_string()))
            .extraction(Ok(BROKEN.to_string()))
            .extraction(Ok(BROKEN.to_string()));
        let reconciler = Reconciler::new(provider);

        let receipt = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.warning.as_deref(), Some(NON_CONVERGENT_WARNING));
        assert!(!receipt.discrepancies.is_empty());
    }

    #[tokio::test]
    async fn attempt_budget_is_configurable() {
        let provider = Scripted::default().extraction(Ok(BROKEN.to_string()));
        let reconciler = Reconciler::new(provider).with_max_attempts(1);

        let receipt = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap();
        // A single attempt leaves no room for correction: best-effort result.
        assert_eq!(receipt.warning.as_deref(), Some(NON_CONVERGENT_WARNING));
    }

    #[tokio::test]
    async fn total_failure_is_terminal() {
        let provider = Scripted::default();
        let reconciler = Reconciler::new(provider);

        let err = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::ExtractionFailed(3));
    }

    #[tokio::test]
    async fn unparseable_responses_count_against_the_budget() {
        let provider = Scripted::default()
            .extraction(Ok("no json here".to_string()))
            .extraction(Ok("still nothing".to_string()))
            .extraction(Ok("nope".to_string()));
        let reconciler = Reconciler::new(provider);

        let err = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::ExtractionFailed(3));
    }

    #[tokio::test]
    async fn cancellation_takes_effect_before_the_first_attempt() {
        let provider = Scripted::default().extraction(Ok(CLEAN.to_string()));
        let reconciler = Reconciler::new(provider);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = reconciler.reconcile(b"img", &cancel).await.unwrap_err();
        assert_eq!(err, EngineError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_calls_time_out() {
        struct Hung;
        impl ExtractionProvider for Hung {
            fn extract(
                &self,
                _image: &[u8],
                _retry_hint: bool,
            ) -> impl Future<Output = ResultEngine<String>> + Send {
                async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }

            fn correct(
                &self,
                _candidate: &Receipt,
                _discrepancies: &[String],
            ) -> impl Future<Output = ResultEngine<String>> + Send {
                async { Err(EngineError::Provider("unused".to_string())) }
            }
        }

        let reconciler = Reconciler::new(Hung).with_call_timeout(Duration::from_secs(5));
        let err = reconciler
            .reconcile(b"img", &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::ExtractionFailed(3));
    }

    #[test]
    fn balanced_object_ignores_braces_in_strings() {
        let text = r#"note {"name": "curly } brace", "n": 1} tail"#;
        let fragment = balanced_object(text).unwrap();
        assert_eq!(fragment, r#"{"name": "curly } brace", "n": 1}"#);
    }

    #[test]
    fn balanced_object_handles_nesting() {
        let text = r#"prefix {"a": {"b": 2}} suffix"#;
        assert_eq!(balanced_object(text), Some(r#"{"a": {"b": 2}}"#));
    }

    #[test]
    fn unbalanced_text_yields_nothing() {
        assert!(balanced_object("{\"a\": 1").is_none());
        assert!(balanced_object("plain text").is_none());
    }
}
