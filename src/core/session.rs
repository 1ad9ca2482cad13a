//! Conversation mode switch for one (actor, conversation).
//!
//! `Session::apply` is pure: it maps the current mode and an event to the
//! next mode plus an ordered list of effects for the caller to execute.
//! Effects that discard accumulated data always come before the effect that
//! announces the new mode. Only pipeline runs need a second step
//! (`Session::settle`) because their outcome decides the final mode.

use crate::llm::ProviderMessage;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub started_at: DateTime<Utc>,
    pub turns: Vec<ProviderMessage>,
}

impl ChatSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            turns: Vec::new(),
        }
    }

    /// History plus the pending user turn, as sent to the backend.
    pub fn transcript_with(&self, text: &str) -> Vec<ProviderMessage> {
        let mut transcript = self.turns.clone();
        transcript.push(ProviderMessage::user(text));
        transcript
    }

    /// Append a completed exchange. Failed turns are never recorded, so the
    /// history always alternates user/assistant.
    pub fn record_exchange(&mut self, user: &str, reply: &str) {
        self.turns.push(ProviderMessage::user(user));
        self.turns.push(ProviderMessage::assistant(reply));
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    #[default]
    Idle,
    AwaitingContent,
    Chatting(ChatSession),
}

impl Session {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingContent => "awaiting_content",
            Self::Chatting(_) => "chatting",
        }
    }

    pub fn chat(&self) -> Option<&ChatSession> {
        match self {
            Self::Chatting(chat) => Some(chat),
            _ => None,
        }
    }

    pub fn chat_mut(&mut self) -> Option<&mut ChatSession> {
        match self {
            Self::Chatting(chat) => Some(chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `/process`
    EnterProcessMode,
    /// `/chat`
    EnterChatMode { at: DateTime<Utc> },
    /// Plain text message.
    Text(String),
    /// Uploaded document.
    Document,
    /// `/tag [label]`
    PlaceMarker { label: Option<String> },
    /// `/analyze`
    RunPipeline,
    /// `/cancel`
    Cancel,
    /// Stickers, photos and anything else the bot does not read.
    Unsupported,
}

/// Reply for an event that is not valid in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    SendContent,
    FilesNeedProcess,
    AlreadyChatting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    DiscardChat { started_at: DateTime<Utc> },
    PromptForContent,
    ChatStarted,
    PlaceTag { label: Option<String> },
    Analyze { chat_started_at: Option<DateTime<Utc>> },
    SubmitText(String),
    SubmitDocument,
    ChatTurn(String),
    Accumulate(String),
    Cancelled,
    Hint(Hint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: Session, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// How a pipeline-triggering effect resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run committed (including evaluation-only commits).
    Committed,
    /// The run started and was aborted.
    Failed,
    /// Nothing ran: empty window, empty submission, rate limited or
    /// unreadable upload.
    Declined,
}

impl Session {
    pub fn apply(self, event: SessionEvent) -> Transition {
        use Effect as E;
        use SessionEvent as Ev;

        match (self, event) {
            (Self::Idle, Ev::EnterProcessMode) | (Self::AwaitingContent, Ev::EnterProcessMode) => {
                Transition::to(Self::AwaitingContent, vec![E::PromptForContent])
            }
            (Self::Chatting(chat), Ev::EnterProcessMode) => Transition::to(
                Self::AwaitingContent,
                vec![
                    E::DiscardChat {
                        started_at: chat.started_at,
                    },
                    E::PromptForContent,
                ],
            ),

            (Self::Idle, Ev::EnterChatMode { at })
            | (Self::AwaitingContent, Ev::EnterChatMode { at }) => {
                Transition::to(Self::Chatting(ChatSession::new(at)), vec![E::ChatStarted])
            }
            (chatting @ Self::Chatting(_), Ev::EnterChatMode { .. }) => {
                Transition::to(chatting, vec![E::Hint(Hint::AlreadyChatting)])
            }

            (Self::Idle, Ev::Text(text)) => Transition::to(Self::Idle, vec![E::Accumulate(text)]),
            (Self::AwaitingContent, Ev::Text(text)) => {
                Transition::to(Self::AwaitingContent, vec![E::SubmitText(text)])
            }
            (chatting @ Self::Chatting(_), Ev::Text(text)) => {
                Transition::to(chatting, vec![E::ChatTurn(text)])
            }

            (Self::AwaitingContent, Ev::Document) => {
                Transition::to(Self::AwaitingContent, vec![E::SubmitDocument])
            }
            (state @ (Self::Idle | Self::Chatting(_)), Ev::Document) => {
                Transition::to(state, vec![E::Hint(Hint::FilesNeedProcess)])
            }

            (state, Ev::PlaceMarker { label }) => {
                let mut effects = discard_effect(&state);
                effects.push(E::PlaceTag { label });
                Transition::to(Self::Idle, effects)
            }

            (Self::Chatting(chat), Ev::RunPipeline) => {
                let chat_started_at = Some(chat.started_at);
                Transition::to(Self::Chatting(chat), vec![E::Analyze { chat_started_at }])
            }
            (Self::Idle | Self::AwaitingContent, Ev::RunPipeline) => Transition::to(
                Self::Idle,
                vec![E::Analyze {
                    chat_started_at: None,
                }],
            ),

            (state, Ev::Cancel) => {
                let mut effects = discard_effect(&state);
                effects.push(E::Cancelled);
                Transition::to(Self::Idle, effects)
            }

            (Self::Idle, Ev::Unsupported) => Transition::to(Self::Idle, Vec::new()),
            (state, Ev::Unsupported) => Transition::to(state, vec![E::Hint(Hint::SendContent)]),
        }
    }

    /// Final mode once a run triggered from this mode has resolved.
    ///
    /// A chat session ends only when its run commits; a failed or declined
    /// run keeps the session start so the retry sees the same window. A
    /// one-shot submission ends once something actually ran.
    pub fn settle(self, outcome: RunOutcome) -> Session {
        match (self, outcome) {
            (Self::Chatting(_), RunOutcome::Committed) => Self::Idle,
            (Self::AwaitingContent, RunOutcome::Committed | RunOutcome::Failed) => Self::Idle,
            (state, _) => state,
        }
    }
}

fn discard_effect(state: &Session) -> Vec<Effect> {
    match state {
        Session::Chatting(chat) => vec![Effect::DiscardChat {
            started_at: chat.started_at,
        }],
        _ => Vec::new(),
    }
}
