use super::evaluation::{Evaluation, PlatformAssessment};
use super::types::Platform;

/// Evaluation fields that drive generation for one accepted platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformPlan {
    pub platform: Platform,
    pub novelty_score: Option<u8>,
    pub clarity_score: Option<u8>,
    pub risk_level: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub reason: Option<String>,
}

/// Final publish decision after reconciling global and per-platform views.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAssessment {
    pub plans: Vec<PlatformPlan>,
}

impl MergedAssessment {
    /// Recomputed flag: publishable iff at least one platform survived.
    pub fn publishable(&self) -> bool {
        !self.plans.is_empty()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.plans.iter().map(|plan| plan.platform).collect()
    }
}

/// Reconcile router candidates with the evaluation.
///
/// The global `publishable` flag gates everything. Otherwise a candidate is
/// dropped only by a per-platform entry that explicitly says
/// `publishable: false`; candidates with no entry are kept.
pub fn merge(candidates: &[Platform], evaluation: &Evaluation) -> MergedAssessment {
    if !evaluation.publishable {
        return MergedAssessment { plans: Vec::new() };
    }

    let assessments = evaluation
        .platform_assessments
        .as_deref()
        .filter(|entries| !entries.is_empty());

    let plans = candidates
        .iter()
        .copied()
        .filter_map(|platform| {
            let entry = assessments.and_then(|entries| find_entry(entries, platform));
            if entry.is_some_and(PlatformAssessment::explicitly_rejects) {
                tracing::debug!(%platform, "platform rejected by per-platform assessment");
                return None;
            }
            Some(plan_for(platform, evaluation, entry))
        })
        .collect();

    MergedAssessment { plans }
}

fn find_entry(entries: &[PlatformAssessment], platform: Platform) -> Option<&PlatformAssessment> {
    entries
        .iter()
        .find(|entry| entry.platform == Some(platform))
}

fn plan_for(
    platform: Platform,
    evaluation: &Evaluation,
    entry: Option<&PlatformAssessment>,
) -> PlatformPlan {
    let mut plan = PlatformPlan {
        platform,
        novelty_score: evaluation.novelty_score,
        clarity_score: evaluation.clarity_score,
        risk_level: evaluation.risk_level.clone(),
        summary: evaluation.summary.clone(),
        key_points: evaluation.key_points.clone(),
        reason: None,
    };

    let Some(entry) = entry else {
        return plan;
    };

    if entry.novelty_score.is_some() {
        plan.novelty_score = entry.novelty_score;
    }
    if entry.clarity_score.is_some() {
        plan.clarity_score = entry.clarity_score;
    }
    if let Some(risk) = &entry.risk_level {
        plan.risk_level.clone_from(risk);
    }
    if let Some(summary) = &entry.summary {
        plan.summary.clone_from(summary);
    }
    if let Some(points) = entry.key_points.as_ref().filter(|p| !p.is_empty()) {
        plan.key_points.clone_from(points);
    }
    plan.reason.clone_from(&entry.reason);
    plan
}
