//! Context budgeter
//!
//! Fits a base instruction prompt, attached file text and the previous turn
//! into a model's context window, then decides how many output tokens to
//! request. Priority is file first, prior turn second, base always.
//!
//! Measurement failures while composing never fail the request: the
//! budgeter falls back to the base prompt plus the prior turn (when it fits)
//! and reports the result as [`BudgetOutcome::Degraded`]. Only a failure to
//! measure the final prompt propagates.

use super::models::{BudgetRequest, DocumentRequest};
use super::token_accountant::{TokenAccountant, TokenError};
use super::token_budget::{
    BudgetDecision, BudgetError, BudgetOutcome, BudgetPolicy, FileStatus, PromptComposition,
    TruncationStrategy,
};
use crate::metrics::METRICS;
use crate::models::{ModelConfig, ModelRecord, ModelRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const FILE_OPEN: &str = "\n<USER_UPLOADED_FILE>: ";
const FILE_CLOSE: &str = " </USER_UPLOADED_FILE>";
const PREVIOUS_RESPONSE: &str = "\nPREVIOUS RESPONSE: ";
const DOCUMENT_CONTENT: &str = "\nDOCUMENT CONTENT: ";

/// Prompt assembled before final accounting
struct Composition {
    prompt: String,
    base_tokens: Option<usize>,
    file: FileStatus,
    prior_turn_included: bool,
}

/// Stateless prompt budgeter, shared across requests
pub struct ContextBudgeter {
    registry: Arc<ModelRegistry>,
    accountant: Arc<dyn TokenAccountant>,
    policy: BudgetPolicy,
}

impl ContextBudgeter {
    pub fn new(
        registry: Arc<ModelRegistry>,
        accountant: Arc<dyn TokenAccountant>,
        policy: BudgetPolicy,
    ) -> Self {
        Self {
            registry,
            accountant,
            policy,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// A valid override wins; otherwise the registry resolves the hint
    pub fn resolve_model(&self, hint: &str, model_override: Option<&ModelRecord>) -> ModelConfig {
        if let Some(record) = model_override {
            if let Some(config) = record.to_config() {
                return config;
            }
            warn!(
                override_name = record.name.as_deref().unwrap_or("<unnamed>"),
                "Model override is incomplete, using registry"
            );
        }
        self.registry.resolve(hint).clone()
    }

    /// Compose the prompt for one request and decide the output budget
    pub fn build(&self, request: &BudgetRequest) -> Result<BudgetOutcome, BudgetError> {
        let start = Instant::now();
        let model = self.resolve_model(&request.model_hint, request.model_override.as_ref());

        let (composition, degradation) = match self.compose(request, &model) {
            Ok(composition) => (composition, None),
            Err(e) => {
                warn!(model = %model.name, error = %e, "Prompt composition failed, degrading");
                (self.fallback(request, &model), Some(e.to_string()))
            }
        };

        let unadjusted_cap = model.max_output_tokens as i64;
        let decision = self.finish(model, composition, unadjusted_cap, true)?;
        let outcome = match degradation {
            None => BudgetOutcome::Composed(decision),
            Some(reason) => BudgetOutcome::Degraded { decision, reason },
        };

        self.observe(&outcome, start);
        Ok(outcome)
    }

    /// Budget a single document for summarization.
    ///
    /// The document is cut exactly to the space left after the base prompt
    /// and a fixed reserve; the output request is a fixed ceiling.
    pub fn build_document(&self, request: &DocumentRequest) -> Result<BudgetOutcome, BudgetError> {
        let start = Instant::now();
        let model = self.resolve_model(&request.model_hint, request.model_override.as_ref());

        let (composition, degradation) = match self.compose_document(request, &model) {
            Ok(composition) => (composition, None),
            Err(e) => {
                warn!(model = %model.name, error = %e, "Document composition failed, degrading");
                let composition = Composition {
                    prompt: request.base_prompt.clone(),
                    base_tokens: self.accountant.count(&request.base_prompt).ok(),
                    file: file_status_when_skipped(&request.document),
                    prior_turn_included: false,
                };
                (composition, Some(e.to_string()))
            }
        };

        let cap = self.policy.document_output_tokens.min(model.max_output_tokens) as i64;
        let decision = self.finish(model, composition, cap, false)?;
        let outcome = match degradation {
            None => BudgetOutcome::Composed(decision),
            Some(reason) => BudgetOutcome::Degraded { decision, reason },
        };

        self.observe(&outcome, start);
        Ok(outcome)
    }

    fn compose(&self, request: &BudgetRequest, model: &ModelConfig) -> Result<Composition, TokenError> {
        let base_tokens = self.accountant.count(&request.base_prompt)?;
        let window = model.context_window;
        let mut file = FileStatus::Absent;

        if !request.file_text.is_empty() {
            match self.fit_file(&request.file_text, window, base_tokens)? {
                Some((adjusted, status)) => {
                    let with_file = format!("{}{}{}{}", request.base_prompt, FILE_OPEN, adjusted, FILE_CLOSE);
                    let (prompt, prior_turn_included) =
                        self.append_prior_if_fits(with_file, &request.prior_turn, window)?;
                    return Ok(Composition {
                        prompt,
                        base_tokens: Some(base_tokens),
                        file: status,
                        prior_turn_included,
                    });
                }
                None => {
                    debug!(model = %model.name, "Attached file truncated to nothing, dropping it");
                    file = FileStatus::Dropped;
                }
            }
        }

        let (prompt, prior_turn_included) =
            self.append_prior_if_fits(request.base_prompt.clone(), &request.prior_turn, window)?;
        Ok(Composition {
            prompt,
            base_tokens: Some(base_tokens),
            file,
            prior_turn_included,
        })
    }

    /// Cut the file to the space left after the base prompt and the safety
    /// margin. `None` when nothing survives.
    fn fit_file(
        &self,
        file_text: &str,
        window: usize,
        base_tokens: usize,
    ) -> Result<Option<(String, FileStatus)>, TokenError> {
        let file_tokens = self.accountant.count(file_text)?;
        if file_tokens == 0 {
            return Ok(None);
        }

        let available = (window as f64 - base_tokens as f64) / self.policy.safety_divisor;
        let adjusted = match self.policy.truncation {
            TruncationStrategy::Ratio => self
                .accountant
                .truncate_to_ratio(file_text, available / file_tokens as f64)?,
            TruncationStrategy::Exact => self
                .accountant
                .truncate_to_tokens(file_text, available.max(0.0).floor() as usize)?,
        };

        if adjusted.is_empty() {
            return Ok(None);
        }
        let status = if adjusted.len() < file_text.len() {
            FileStatus::Truncated
        } else {
            FileStatus::Included
        };
        Ok(Some((adjusted, status)))
    }

    fn append_prior_if_fits(
        &self,
        prompt: String,
        prior_turn: &str,
        window: usize,
    ) -> Result<(String, bool), TokenError> {
        if prior_turn.is_empty() {
            return Ok((prompt, false));
        }
        let candidate = format!("{}{}{}", prompt, PREVIOUS_RESPONSE, prior_turn);
        if self.accountant.count(&candidate)? <= window {
            Ok((candidate, true))
        } else {
            debug!(window, "Previous response does not fit, dropping it");
            Ok((prompt, false))
        }
    }

    /// Base prompt plus prior turn if it fits; base alone if even that
    /// cannot be measured
    fn fallback(&self, request: &BudgetRequest, model: &ModelConfig) -> Composition {
        let (prompt, prior_turn_included) = match self.append_prior_if_fits(
            request.base_prompt.clone(),
            &request.prior_turn,
            model.context_window,
        ) {
            Ok(result) => result,
            Err(e) => {
                warn!(model = %model.name, error = %e, "Fallback measurement failed, using base prompt alone");
                (request.base_prompt.clone(), false)
            }
        };

        Composition {
            prompt,
            base_tokens: self.accountant.count(&request.base_prompt).ok(),
            file: file_status_when_skipped(&request.file_text),
            prior_turn_included,
        }
    }

    fn compose_document(
        &self,
        request: &DocumentRequest,
        model: &ModelConfig,
    ) -> Result<Composition, TokenError> {
        let base_tokens = self.accountant.count(&request.base_prompt)?;
        let mut composition = Composition {
            prompt: request.base_prompt.clone(),
            base_tokens: Some(base_tokens),
            file: FileStatus::Absent,
            prior_turn_included: false,
        };
        if request.document.is_empty() {
            return Ok(composition);
        }

        let available = model
            .context_window
            .saturating_sub(base_tokens)
            .saturating_sub(self.policy.document_reserve_tokens);
        let adjusted = self.accountant.truncate_to_tokens(&request.document, available)?;

        if adjusted.is_empty() {
            composition.file = FileStatus::Dropped;
        } else {
            composition.file = if adjusted.len() < request.document.len() {
                FileStatus::Truncated
            } else {
                FileStatus::Included
            };
            composition.prompt = format!("{}{}{}", request.base_prompt, DOCUMENT_CONTENT, adjusted);
        }
        Ok(composition)
    }

    /// Final accounting. The prompt is measured before trimming.
    fn finish(
        &self,
        model: ModelConfig,
        composition: Composition,
        output_cap: i64,
        provider_adjusted: bool,
    ) -> Result<BudgetDecision, BudgetError> {
        let prompt_tokens = self.accountant.count(&composition.prompt)?;
        let remaining = model.context_window as i64 - prompt_tokens as i64;
        let unadjusted = output_cap.min(remaining);
        let requested = if provider_adjusted {
            self.policy.adjust_output(model.provider_kind, unadjusted)
        } else {
            unadjusted
        };

        let decision = BudgetDecision {
            final_prompt: composition.prompt.trim().to_string(),
            requested_output_tokens: requested,
            unadjusted_output_tokens: unadjusted,
            prompt_tokens,
            remaining_tokens: remaining,
            resolved_model: model,
            composition: PromptComposition {
                base_tokens: composition.base_tokens,
                file: composition.file,
                prior_turn_included: composition.prior_turn_included,
            },
        };

        if decision.is_anomalous() {
            warn!(
                model = %decision.resolved_model.name,
                prompt_tokens,
                context_window = decision.resolved_model.context_window,
                requested_output_tokens = requested,
                "Prompt leaves no room for output"
            );
        }

        Ok(decision)
    }

    fn observe(&self, outcome: &BudgetOutcome, start: Instant) {
        let decision = outcome.decision();

        METRICS
            .budget_decisions
            .with_label_values(&[outcome.label(), decision.resolved_provider_kind().as_str()])
            .inc();
        METRICS
            .budget_prompt_tokens
            .observe(decision.prompt_tokens as f64);
        METRICS
            .budget_output_tokens
            .observe(decision.requested_output_tokens.max(0) as f64);
        METRICS
            .budget_duration
            .observe(start.elapsed().as_secs_f64());
        if decision.is_anomalous() {
            METRICS.budget_anomalies.inc();
        }
        if matches!(decision.composition.file, FileStatus::Truncated | FileStatus::Dropped) {
            METRICS
                .budget_file_truncations
                .with_label_values(&[file_status_label(decision.composition.file)])
                .inc();
        }

        debug!(
            outcome = outcome.label(),
            model = %decision.resolved_model.name,
            prompt_tokens = decision.prompt_tokens,
            requested_output_tokens = decision.requested_output_tokens,
            file = file_status_label(decision.composition.file),
            prior_turn_included = decision.composition.prior_turn_included,
            "Budget decided"
        );
    }
}

fn file_status_when_skipped(file_text: &str) -> FileStatus {
    if file_text.is_empty() {
        FileStatus::Absent
    } else {
        FileStatus::Dropped
    }
}

fn file_status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Absent => "absent",
        FileStatus::Included => "included",
        FileStatus::Truncated => "truncated",
        FileStatus::Dropped => "dropped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_accountant::WordAccountant;
    use crate::models::ProviderKind;

    fn words(prefix: &str, n: usize) -> String {
        (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
    }

    fn registry() -> Arc<ModelRegistry> {
        let records = vec![
            ModelConfig::new("small", ProviderKind::OpenAi, 1000, 200, "us-central1", false).into(),
            ModelConfig::new("roomy", ProviderKind::OpenAi, 1000, 4096, "us-central1", false).into(),
            ModelConfig::new("claude-test", ProviderKind::Anthropic, 1000, 4096, "europe-west1", true).into(),
            ModelConfig::new("tiny", ProviderKind::OpenAi, 100, 50, "us-central1", false).into(),
            ModelConfig::new("doc", ProviderKind::GoogleGenai, 3100, 8192, "us-central1", true).into(),
        ];
        Arc::new(ModelRegistry::new(records).unwrap())
    }

    fn budgeter() -> ContextBudgeter {
        ContextBudgeter::new(registry(), Arc::new(WordAccountant), BudgetPolicy::default())
    }

    /// Counts words but cannot truncate
    struct NoTruncation;

    impl TokenAccountant for NoTruncation {
        fn count(&self, text: &str) -> Result<usize, TokenError> {
            WordAccountant.count(text)
        }

        fn truncate_to_tokens(&self, _text: &str, _max: usize) -> Result<String, TokenError> {
            Err(TokenError::Unavailable("no vocabulary".to_string()))
        }
    }

    /// Counts words but every cut comes back empty
    struct EmptyCut;

    impl TokenAccountant for EmptyCut {
        fn count(&self, text: &str) -> Result<usize, TokenError> {
            WordAccountant.count(text)
        }

        fn truncate_to_tokens(&self, _text: &str, _max: usize) -> Result<String, TokenError> {
            Ok(String::new())
        }
    }

    /// Fails to measure any text containing the marker
    struct Poisoned(&'static str);

    impl TokenAccountant for Poisoned {
        fn count(&self, text: &str) -> Result<usize, TokenError> {
            if text.contains(self.0) {
                return Err(TokenError::Unavailable("poisoned".to_string()));
            }
            WordAccountant.count(text)
        }

        fn truncate_to_tokens(&self, text: &str, max: usize) -> Result<String, TokenError> {
            WordAccountant.truncate_to_tokens(text, max)
        }
    }

    #[test]
    fn test_no_inputs_returns_trimmed_base() {
        let outcome = budgeter().build(&BudgetRequest::new("small", "  write the srs  \n")).unwrap();
        let decision = outcome.decision();

        assert!(!outcome.is_degraded());
        assert_eq!(decision.final_prompt, "write the srs");
        assert_eq!(decision.composition.file, FileStatus::Absent);
        assert!(!decision.composition.prior_turn_included);
        assert_eq!(decision.requested_output_tokens, 200);
    }

    #[test]
    fn test_deterministic() {
        let budgeter = budgeter();
        let request = BudgetRequest::new("small", words("b", 50))
            .with_file_text(words("f", 2000))
            .with_prior_turn(words("p", 30));
        assert_eq!(budgeter.build(&request).unwrap(), budgeter.build(&request).unwrap());
    }

    #[test]
    fn test_large_file_truncated_to_safety_margin() {
        let request = BudgetRequest::new("small", words("b", 50)).with_file_text(words("f", 2000));
        let decision = budgeter().build(&request).unwrap().into_decision();

        // (1000 - 50) / 1.40 = 678.57 tokens of file
        assert!(decision.final_prompt.contains("<USER_UPLOADED_FILE>: f0 "));
        assert!(decision.final_prompt.ends_with("f677 </USER_UPLOADED_FILE>"));
        assert!(!decision.final_prompt.contains("f678"));
        assert_eq!(decision.prompt_tokens, 50 + 678 + 2);
        assert_eq!(decision.requested_output_tokens, 200.min(1000 - 730));
        assert_eq!(decision.composition.file, FileStatus::Truncated);
        assert_eq!(decision.composition.base_tokens, Some(50));
    }

    #[test]
    fn test_exact_truncation_strategy() {
        let policy = BudgetPolicy {
            truncation: TruncationStrategy::Exact,
            ..Default::default()
        };
        let budgeter = ContextBudgeter::new(registry(), Arc::new(WordAccountant), policy);
        let request = BudgetRequest::new("small", words("b", 50)).with_file_text(words("f", 2000));
        let decision = budgeter.build(&request).unwrap().into_decision();

        assert!(decision.final_prompt.ends_with("f677 </USER_UPLOADED_FILE>"));
        assert_eq!(decision.prompt_tokens, 730);
    }

    #[test]
    fn test_prior_turn_appended_when_it_fits() {
        let request = BudgetRequest::new("tiny", words("b", 10)).with_prior_turn(words("p", 20));
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(
            decision.final_prompt,
            format!("{}\nPREVIOUS RESPONSE: {}", words("b", 10), words("p", 20))
        );
        assert_eq!(decision.prompt_tokens, 32);
        assert_eq!(decision.requested_output_tokens, 50);
        assert!(decision.composition.prior_turn_included);
    }

    #[test]
    fn test_prior_turn_dropped_when_it_does_not_fit() {
        let request = BudgetRequest::new("tiny", words("b", 10)).with_prior_turn(words("p", 200));
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.final_prompt, words("b", 10));
        assert!(!decision.composition.prior_turn_included);
        assert_eq!(decision.requested_output_tokens, 50);
    }

    #[test]
    fn test_file_takes_priority_over_prior_turn() {
        // Either fits alone, not both
        let request = BudgetRequest::new("tiny", words("b", 10))
            .with_file_text(words("f", 50))
            .with_prior_turn(words("p", 60));
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert!(decision.final_prompt.contains("f49 </USER_UPLOADED_FILE>"));
        assert!(!decision.final_prompt.contains("PREVIOUS RESPONSE"));
        assert!(!decision.final_prompt.contains("p0"));
        assert_eq!(decision.composition.file, FileStatus::Included);
        assert!(!decision.composition.prior_turn_included);
    }

    #[test]
    fn test_file_and_prior_turn_both_fit() {
        let request = BudgetRequest::new("small", words("b", 10))
            .with_file_text(words("f", 20))
            .with_prior_turn(words("p", 5));
        let decision = budgeter().build(&request).unwrap().into_decision();

        let expected = format!(
            "{}\n<USER_UPLOADED_FILE>: {} </USER_UPLOADED_FILE>\nPREVIOUS RESPONSE: {}",
            words("b", 10),
            words("f", 20),
            words("p", 5)
        );
        assert_eq!(decision.final_prompt, expected);
        assert!(decision.composition.prior_turn_included);
    }

    #[test]
    fn test_file_truncated_to_nothing_uses_original_base() {
        // Base already overflows the window so no file survives
        let request = BudgetRequest::new("tiny", words("b", 105))
            .with_file_text(words("f", 10))
            .with_prior_turn("p0");
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.final_prompt, words("b", 105));
        assert_eq!(decision.composition.file, FileStatus::Dropped);
        assert!(!decision.composition.prior_turn_included);
        assert_eq!(decision.remaining_tokens, -5);
        assert_eq!(decision.requested_output_tokens, -5);
        assert!(decision.is_anomalous());
    }

    #[test]
    fn test_dropped_file_keeps_prior_turn_on_original_base() {
        let budgeter = ContextBudgeter::new(registry(), Arc::new(EmptyCut), BudgetPolicy::default());
        let request = BudgetRequest::new("small", words("b", 10))
            .with_file_text(words("f", 2000))
            .with_prior_turn(words("p", 5));
        let outcome = budgeter.build(&request).unwrap();
        let decision = outcome.decision();

        assert!(!outcome.is_degraded());
        assert_eq!(
            decision.final_prompt,
            format!("{}\nPREVIOUS RESPONSE: {}", words("b", 10), words("p", 5))
        );
        assert!(!decision.final_prompt.contains("USER_UPLOADED_FILE"));
        assert_eq!(decision.composition.file, FileStatus::Dropped);
        assert!(decision.composition.prior_turn_included);
        assert_eq!(decision.prompt_tokens, 17);
    }

    #[test]
    fn test_output_clamped_to_remaining() {
        let request = BudgetRequest::new("roomy", words("b", 990));
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.remaining_tokens, 10);
        assert!(decision.requested_output_tokens <= 10);
    }

    #[test]
    fn test_anthropic_output_adjusted() {
        let request = BudgetRequest::new("claude-test", words("b", 10));
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.unadjusted_output_tokens, 990);
        assert_eq!(decision.requested_output_tokens, 761);
        assert_eq!(decision.resolved_provider_kind(), ProviderKind::Anthropic);
        assert_eq!(decision.resolved_location(), "europe-west1");
    }

    #[test]
    fn test_unknown_hint_resolves_to_default() {
        let decision = budgeter()
            .build(&BudgetRequest::new("no-such-model", "hello"))
            .unwrap()
            .into_decision();
        assert_eq!(decision.resolved_model_name(), "small");
    }

    #[test]
    fn test_valid_override_wins() {
        let record: ModelRecord =
            ModelConfig::new("custom", ProviderKind::Google, 500, 100, "europe-west4", false).into();
        let request = BudgetRequest::new("small", "hello").with_model_override(record);
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.resolved_model_name(), "custom");
        assert_eq!(decision.requested_output_tokens, 100);
    }

    #[test]
    fn test_incomplete_override_ignored() {
        let mut record: ModelRecord =
            ModelConfig::new("custom", ProviderKind::Google, 500, 100, "europe-west4", false).into();
        record.context_window = None;
        let request = BudgetRequest::new("tiny", "hello").with_model_override(record);
        let decision = budgeter().build(&request).unwrap().into_decision();

        assert_eq!(decision.resolved_model_name(), "tiny");
    }

    #[test]
    fn test_truncation_failure_degrades_to_prior_turn() {
        let budgeter = ContextBudgeter::new(registry(), Arc::new(NoTruncation), BudgetPolicy::default());
        let request = BudgetRequest::new("small", words("b", 50))
            .with_file_text(words("f", 2000))
            .with_prior_turn(words("p", 5));
        let outcome = budgeter.build(&request).unwrap();

        assert!(outcome.is_degraded());
        assert!(outcome.degradation_reason().unwrap().contains("no vocabulary"));
        let decision = outcome.decision();
        assert_eq!(
            decision.final_prompt,
            format!("{}\nPREVIOUS RESPONSE: {}", words("b", 50), words("p", 5))
        );
        assert_eq!(decision.composition.file, FileStatus::Dropped);
        assert!(decision.composition.prior_turn_included);
        assert_eq!(decision.composition.base_tokens, Some(50));
    }

    #[test]
    fn test_unmeasurable_prior_turn_degrades_to_base() {
        let budgeter =
            ContextBudgeter::new(registry(), Arc::new(Poisoned("POISON")), BudgetPolicy::default());
        let request = BudgetRequest::new("small", "base prompt").with_prior_turn("POISON text");
        let outcome = budgeter.build(&request).unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(outcome.decision().final_prompt, "base prompt");
        assert!(!outcome.decision().composition.prior_turn_included);
        assert_eq!(outcome.decision().composition.base_tokens, Some(2));
    }

    #[test]
    fn test_unmeasurable_base_propagates() {
        let budgeter =
            ContextBudgeter::new(registry(), Arc::new(Poisoned("POISON")), BudgetPolicy::default());
        let result = budgeter.build(&BudgetRequest::new("small", "POISON base"));
        assert!(matches!(result, Err(BudgetError::Measurement(_))));
    }

    #[test]
    fn test_document_budget() {
        let request = DocumentRequest::new("doc", words("b", 50), words("d", 3000));
        let outcome = budgeter().build_document(&request).unwrap();
        let decision = outcome.decision();

        // 3100 - 50 - 2000 reserve = 1050 tokens of document
        assert!(decision.final_prompt.contains("\nDOCUMENT CONTENT: d0 "));
        assert!(decision.final_prompt.ends_with("d1049"));
        assert_eq!(decision.prompt_tokens, 50 + 2 + 1050);
        assert_eq!(decision.requested_output_tokens, 1000);
        assert_eq!(decision.composition.file, FileStatus::Truncated);
    }

    #[test]
    fn test_document_budget_clamped_by_max_output() {
        let request = DocumentRequest::new("tiny", "summarize", "short document");
        let decision = budgeter().build_document(&request).unwrap().into_decision();

        assert_eq!(decision.requested_output_tokens, 50);
        // No room after the reserve, document dropped
        assert_eq!(decision.final_prompt, "summarize");
        assert_eq!(decision.composition.file, FileStatus::Dropped);
    }

    #[test]
    fn test_document_degrades_to_base_prompt() {
        let budgeter = ContextBudgeter::new(registry(), Arc::new(NoTruncation), BudgetPolicy::default());
        let request = DocumentRequest::new("doc", "summarize this", words("d", 10));
        let outcome = budgeter.build_document(&request).unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(outcome.decision().final_prompt, "summarize this");
        assert_eq!(outcome.decision().composition.base_tokens, Some(2));
    }
}
