use anyhow::Context as _;
use tera::{Context, Tera};

/// Named templates compiled into the binary.
const BUILTIN: &[(&str, &str)] = &[
    ("evaluate_system", include_str!("templates/evaluate_system.txt")),
    ("evaluate_user", include_str!("templates/evaluate_user.txt")),
    ("chat_system", include_str!("templates/chat_system.txt")),
    ("rewrite_system", include_str!("templates/rewrite_system.txt")),
    ("rewrite_user", include_str!("templates/rewrite_user.txt")),
    ("platform_x", include_str!("templates/platform_x.txt")),
    ("platform_medium", include_str!("templates/platform_medium.txt")),
    ("platform_substack", include_str!("templates/platform_substack.txt")),
    ("platform_reddit", include_str!("templates/platform_reddit.txt")),
];

/// Tera-backed template registry. Templates are plain text: no autoescaping.
pub struct TeraEngine {
    tera: Tera,
}

impl TeraEngine {
    /// Engine with every built-in prompt template registered.
    pub fn with_builtins() -> anyhow::Result<Self> {
        let mut engine = Self::empty();
        for (name, body) in BUILTIN {
            engine.add_template(name, body)?;
        }
        Ok(engine)
    }

    pub fn empty() -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        Self { tera }
    }

    /// Register or replace a template.
    pub fn add_template(&mut self, name: &str, content: &str) -> anyhow::Result<()> {
        self.tera
            .add_raw_template(name, content)
            .with_context(|| format!("compile prompt template {name}"))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a named template; the result is trimmed of surrounding whitespace.
    pub fn render(&self, name: &str, context: &Context) -> anyhow::Result<String> {
        let rendered = self
            .tera
            .render(name, context)
            .with_context(|| format!("render prompt template {name}"))?;
        Ok(rendered.trim().to_string())
    }
}
