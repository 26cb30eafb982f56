//! Prompt templates for Kanhu.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub draft: DraftPrompts,
    pub refine: RefinePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the local grounded draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftPrompts {
    /// Localized persona given to the local model.
    pub system: String,
    pub user: String,
}

impl Default for DraftPrompts {
    fn default() -> Self {
        Self {
            system: "你是一個專業的助手，所有回應請使用正體中文，語言清晰且符合台灣用語習慣。"
                .to_string(),

            user: r#"請根據以下檢索到的參考資料回答最後的問題。如果資料中沒有答案，請直接說不知道，不要編造內容。

{{context}}

問題：{{question}}
回答："#
                .to_string(),
        }
    }
}

/// Prompts for the cloud refinement pass and its degraded fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinePrompts {
    pub user: String,
    /// Answer text returned when any answer stage fails.
    pub fallback: String,
}

impl Default for RefinePrompts {
    fn default() -> Self {
        Self {
            user: r#"你是一個健康知識助手，專注於血壓和血糖管理，請根據下列檢索到的資訊與問題，提供清楚、符合台灣用語的專業回答，特別考慮長者需求。

❗ 問題：
{{question}}

🔍 檢索結果：
{{context}}

📝 初步回答：
{{draft}}

請注意：你的回覆應該使用繁體中文，簡潔明瞭，適合長者理解。"#
                .to_string(),

            fallback: "很抱歉，目前無法順利產生回答，請稍後再試一次。如有身體不適，請儘速聯絡醫療人員。"
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let draft_path = custom_path.join("draft.toml");
            if draft_path.exists() {
                let content = std::fs::read_to_string(&draft_path)?;
                prompts.draft = toml::from_str(&content)?;
            }

            let refine_path = custom_path.join("refine.toml");
            if refine_path.exists() {
                let content = std::fs::read_to_string(&refine_path)?;
                prompts.refine = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
