pub mod catalog;

use std::sync::Arc;

use inference_providers::ChatMessage;

use crate::inference::ports::{Language, Level, Modality, PromptError, PromptProvider};

pub use catalog::{BuiltinCatalog, PromptCatalog, PromptParts};

/// Composes the system instruction from a [`PromptCatalog`]
///
/// The message is `identity`, then `instruction`, then `context`, separated by a
/// blank line. Blocks that are empty are left out; if nothing remains the
/// provider refuses to build a prompt.
#[derive(Clone)]
pub struct StaticPromptProvider {
    catalog: Arc<dyn PromptCatalog>,
}

impl StaticPromptProvider {
    pub fn new() -> Self {
        Self::with_catalog(Arc::new(BuiltinCatalog))
    }

    pub fn with_catalog(catalog: Arc<dyn PromptCatalog>) -> Self {
        Self { catalog }
    }
}

impl Default for StaticPromptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptProvider for StaticPromptProvider {
    fn system_prompt(
        &self,
        modality: Modality,
        level: Level,
        language: Language,
    ) -> Result<ChatMessage, PromptError> {
        let parts = self.catalog.parts(modality, level, language);

        let content = [&parts.identity, &parts.instruction, &parts.context]
            .into_iter()
            .map(|block| block.trim())
            .filter(|block| !block.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if content.is_empty() {
            tracing::error!(
                modality = %modality,
                level = %level,
                language = %language,
                "Prompt catalog produced an empty system prompt"
            );
            return Err(PromptError::Empty {
                modality,
                level,
                language,
            });
        }

        Ok(ChatMessage::system(content))
    }
}
