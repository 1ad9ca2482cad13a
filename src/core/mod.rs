//! Conversation state, windowing, routing and the pipeline that ties them
//! together.

pub mod activity;
pub mod evaluation;
pub mod merge;
pub mod pipeline;
pub mod routing;
pub mod session;
pub mod types;
pub mod window;

pub use activity::ActivityGuard;
pub use evaluation::{Evaluation, PlatformAssessment};
pub use merge::{MergedAssessment, PlatformPlan, merge};
pub use pipeline::{Draft, PipelineOrchestrator, RunReport, RunRequest, RunSink};
pub use routing::route;
pub use session::{ChatSession, Effect, Hint, RunOutcome, Session, SessionEvent, Transition};
pub use types::{ActorId, ConversationKey, IdeaType, Platform, SourceKind};
pub use window::{MessageWindow, Window, WindowBound};
