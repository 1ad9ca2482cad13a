use super::evaluation::Evaluation;
use super::types::{IdeaType, Platform};
use std::str::FromStr;

const DEFAULT_NOVELTY: u8 = 5;
const DEFAULT_AFFINITY: &[Platform] = &[Platform::X, Platform::Medium];

/// Ordered platform affinity per idea type. Unknown types use
/// [`DEFAULT_AFFINITY`].
fn affinity(idea_type: IdeaType) -> &'static [Platform] {
    use Platform::{Medium, Reddit, Substack, X};
    match idea_type {
        IdeaType::Opinion => &[X, Substack, Medium],
        IdeaType::Analysis | IdeaType::Tutorial => &[X, Medium, Reddit],
        IdeaType::Essay | IdeaType::Story => &[X, Medium, Substack],
        IdeaType::Thread => &[X],
        IdeaType::News => &[X, Reddit],
    }
}

/// Novelty used for routing: scores outside 1..=10 count as the default.
pub fn effective_novelty(score: Option<u8>) -> u8 {
    score
        .filter(|score| (1..=10).contains(score))
        .unwrap_or(DEFAULT_NOVELTY)
}

/// Candidate platforms for an evaluation, always-on platform first.
pub fn route(evaluation: &Evaluation) -> Vec<Platform> {
    candidates_for(&evaluation.idea_type, evaluation.novelty_score)
}

pub fn candidates_for(idea_type: &str, novelty_score: Option<u8>) -> Vec<Platform> {
    let novelty = effective_novelty(novelty_score);
    if novelty < 3 {
        return vec![Platform::ALWAYS_ON];
    }

    let table = IdeaType::from_str(idea_type.trim()).map_or(DEFAULT_AFFINITY, affinity);

    let mut platforms = Vec::with_capacity(table.len() + 1);
    platforms.push(Platform::ALWAYS_ON);
    platforms.extend(
        table
            .iter()
            .copied()
            .filter(|platform| *platform != Platform::ALWAYS_ON),
    );

    let limit = if novelty > 6 { 3 } else { 2 };
    platforms.truncate(limit);
    platforms
}
