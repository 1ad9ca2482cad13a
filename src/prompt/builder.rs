use super::engine::TeraEngine;
use crate::core::merge::PlatformPlan;
use crate::core::types::Platform;
use tera::Context;

pub const EVALUATION_MAX_TOKENS: u32 = 1024;
pub const CHAT_MAX_TOKENS: u32 = 1024;
const LONG_FORM_MAX_TOKENS: u32 = 2048;
const SHORT_FORM_MAX_TOKENS: u32 = 512;

const NO_KEY_POINTS: &str = "(none extracted)";
const NO_STYLE: &str = "(none)";

/// Output budget for one platform draft.
pub fn generation_budget(platform: Platform) -> u32 {
    if platform.is_long_form() {
        LONG_FORM_MAX_TOKENS
    } else {
        SHORT_FORM_MAX_TOKENS
    }
}

/// A rendered system + user pair for a single backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Renders every prompt the pipeline and chat mode send to a backend.
pub struct PromptBook {
    engine: TeraEngine,
    chat_system: String,
}

impl PromptBook {
    pub fn new() -> anyhow::Result<Self> {
        let engine = TeraEngine::with_builtins()?;
        let chat_system = engine.render("chat_system", &Context::new())?;
        Ok(Self {
            engine,
            chat_system,
        })
    }

    pub fn evaluation(&self, content: &str) -> anyhow::Result<PromptPair> {
        let mut ctx = Context::new();
        ctx.insert("content", content);
        Ok(PromptPair {
            system: self.engine.render("evaluate_system", &Context::new())?,
            user: self.engine.render("evaluate_user", &ctx)?,
        })
    }

    pub fn chat_system(&self) -> &str {
        &self.chat_system
    }

    pub fn rewrite(
        &self,
        content: &str,
        plan: &PlatformPlan,
        style: Option<&str>,
    ) -> anyhow::Result<PromptPair> {
        let mut ctx = Context::new();
        ctx.insert("content", content);
        ctx.insert("summary", &plan.summary);
        ctx.insert("key_points", &key_point_lines(&plan.key_points));
        ctx.insert(
            "style",
            style.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(NO_STYLE),
        );
        ctx.insert("instruction", &self.platform_instruction(plan.platform.as_str())?);
        ctx.insert("platform", plan.platform.as_str());

        Ok(PromptPair {
            system: self.engine.render("rewrite_system", &Context::new())?,
            user: self.engine.render("rewrite_user", &ctx)?,
        })
    }

    /// Formatting and policy rules for one destination.
    pub fn platform_instruction(&self, platform: &str) -> anyhow::Result<String> {
        let name = format!("platform_{platform}");
        if self.engine.has_template(&name) {
            self.engine.render(&name, &Context::new())
        } else {
            Ok(format!("Write content optimized for {platform}."))
        }
    }
}

fn key_point_lines(points: &[String]) -> String {
    let lines: Vec<String> = points
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!("- {p}"))
        .collect();
    if lines.is_empty() {
        NO_KEY_POINTS.to_string()
    } else {
        lines.join("\n")
    }
}
