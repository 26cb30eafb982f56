//! Draft and refinement stages of the answer chain.

use super::{context::format_context_for_prompt, ContextBuilder, ContextChunk};
use crate::config::Prompts;
use crate::error::Result;
use crate::llm::TextGenerator;
use crate::worker::InferencePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Placeholder context when retrieval found nothing.
const NO_CONTEXT: &str = "（查無相關參考資料）";

/// Retrieval-augmented answer engine.
///
/// Each stage is exposed separately so the caller can attribute failures to
/// the stage that produced them.
pub struct RagEngine {
    context_builder: ContextBuilder,
    drafter: Arc<dyn TextGenerator>,
    refiner: Arc<dyn TextGenerator>,
    pool: InferencePool,
    prompts: Prompts,
}

impl RagEngine {
    pub fn new(
        context_builder: ContextBuilder,
        drafter: Arc<dyn TextGenerator>,
        refiner: Arc<dyn TextGenerator>,
        pool: InferencePool,
    ) -> Self {
        Self {
            context_builder,
            drafter,
            refiner,
            pool,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Retrieve supporting chunks for a question.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ContextChunk>> {
        self.context_builder.build(question).await
    }

    /// Produce the grounded local draft.
    #[instrument(skip(self, context), fields(model = %self.drafter.name()))]
    pub async fn draft(&self, question: &str, context: &[ContextChunk]) -> Result<String> {
        let vars = self.vars(question, context);
        let prompt = self.prompts.render_with_custom(&self.prompts.draft.user, &vars);
        let system = self.prompts.render_with_custom(&self.prompts.draft.system, &vars);

        let draft = self
            .pool
            .run("draft", self.drafter.generate(Some(&system), &prompt))
            .await?;
        debug!("Draft: {} chars", draft.chars().count());
        Ok(draft)
    }

    /// Produce the user-facing answer from question, context and draft.
    #[instrument(skip(self, context, draft), fields(model = %self.refiner.name()))]
    pub async fn refine(&self, question: &str, context: &[ContextChunk], draft: &str) -> Result<String> {
        let mut vars = self.vars(question, context);
        vars.insert("draft".to_string(), draft.to_string());
        let prompt = self.prompts.render_with_custom(&self.prompts.refine.user, &vars);

        let answer = self
            .pool
            .run("refine", self.refiner.generate(None, &prompt))
            .await?;
        info!("Refined answer: {} chars", answer.chars().count());
        Ok(answer)
    }

    /// Apology text returned when an answer stage fails.
    pub fn fallback_answer(&self) -> &str {
        &self.prompts.refine.fallback
    }

    fn vars(&self, question: &str, context: &[ContextChunk]) -> HashMap<String, String> {
        let context_text = if context.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            format_context_for_prompt(context)
        };

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context_text);
        vars
    }
}
