mod builder;
mod engine;

pub use builder::{
    CHAT_MAX_TOKENS, EVALUATION_MAX_TOKENS, PromptBook, PromptPair, generation_budget,
};
pub use engine::TeraEngine;
