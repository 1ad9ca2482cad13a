use crate::config::{RateLimitConfig, RatePolicyConfig};
use crate::core::types::ActorId;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The two independently limited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Pipeline,
    ChatTurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub window: Duration,
    pub max_events: u32,
}

impl From<RatePolicyConfig> for RatePolicy {
    fn from(config: RatePolicyConfig) -> Self {
        Self {
            window: config.window(),
            max_events: config.max_events,
        }
    }
}

/// A denied admission. Not an error condition for callers; it carries the
/// suggested wait before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub kind: ActionKind,
    pub retry_after_secs: u64,
}

/// Sliding-window admission control per (actor, action kind).
///
/// Buckets live in memory only and start empty on every process start.
#[derive(Debug)]
pub struct RateLimiter {
    pipeline: RatePolicy,
    chat_turn: RatePolicy,
    buckets: Mutex<HashMap<(ActorId, ActionKind), VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(pipeline: RatePolicy, chat_turn: RatePolicy) -> Self {
        Self {
            pipeline,
            chat_turn,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.pipeline.into(), config.chat_turn.into())
    }

    pub fn policy(&self, kind: ActionKind) -> RatePolicy {
        match kind {
            ActionKind::Pipeline => self.pipeline,
            ActionKind::ChatTurn => self.chat_turn,
        }
    }

    /// Admit and record one event now, or deny with a retry hint.
    pub fn check(&self, actor: ActorId, kind: ActionKind) -> Result<(), RateLimited> {
        self.check_at(actor, kind, Instant::now())
    }

    pub fn check_at(
        &self,
        actor: ActorId,
        kind: ActionKind,
        now: Instant,
    ) -> Result<(), RateLimited> {
        let policy = self.policy(kind);
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let bucket = buckets.entry((actor, kind)).or_default();

        prune(bucket, policy.window, now);

        if bucket.len() >= usize::try_from(policy.max_events).unwrap_or(usize::MAX) {
            let oldest = bucket.front().copied().unwrap_or(now);
            let elapsed = now.saturating_duration_since(oldest);
            let remaining = policy.window.saturating_sub(elapsed);
            let ceil_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(RateLimited {
                kind,
                retry_after_secs: (ceil_secs + 1).max(1),
            });
        }

        bucket.push_back(now);
        Ok(())
    }

    /// Drop buckets whose every timestamp has left its window. Returns the
    /// number of buckets removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|(_, kind), bucket| {
            let window = match kind {
                ActionKind::Pipeline => self.pipeline.window,
                ActionKind::ChatTurn => self.chat_turn.window,
            };
            prune(bucket, window, now);
            !bucket.is_empty()
        });
        before - buckets.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

fn prune(bucket: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(front) = bucket.front() {
        if now.saturating_duration_since(*front) >= window {
            bucket.pop_front();
        } else {
            break;
        }
    }
}
