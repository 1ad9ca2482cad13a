use serde::{Deserialize, Serialize};

/// Authenticated user identity as reported by the transport.
pub type ActorId = i64;

/// Per-(actor, conversation) scope for sessions, messages and tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub actor: ActorId,
    pub conversation: i64,
}

impl ConversationKey {
    pub const fn new(actor: ActorId, conversation: i64) -> Self {
        Self {
            actor,
            conversation,
        }
    }
}

/// Destination platforms a draft can be generated for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    X,
    Medium,
    Substack,
    Reddit,
}

impl Platform {
    /// Included in every non-empty routing decision, always first.
    pub const ALWAYS_ON: Platform = Platform::X;

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Long-form platforms get a larger generation budget.
    pub fn is_long_form(self) -> bool {
        matches!(self, Self::Medium | Self::Substack)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Medium => "Medium",
            Self::Substack => "Substack",
            Self::Reddit => "Reddit",
        }
    }
}

/// Categorical evaluation of what kind of idea the content is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IdeaType {
    Opinion,
    Analysis,
    Essay,
    Tutorial,
    Story,
    Thread,
    News,
}

/// Where the content of a pipeline run came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum SourceKind {
    #[strum(serialize = "text")]
    #[serde(rename = "text")]
    Text,
    #[strum(serialize = "file")]
    #[serde(rename = "file")]
    File,
    #[strum(serialize = "chat_session")]
    #[serde(rename = "chat_session")]
    ChatSession,
    #[strum(serialize = "tag_analyze")]
    #[serde(rename = "tag_analyze")]
    TagWindow,
    #[strum(serialize = "day_analyze")]
    #[serde(rename = "day_analyze")]
    DayWindow,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
