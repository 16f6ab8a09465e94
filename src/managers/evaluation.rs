//! Keyword-weighted answer scoring.
//!
//! Pure functions only: no channel or user objects, no I/O, deterministic
//! output for a given answer set and rubric. The primary and combined
//! passes use separate threshold tables on purpose; the supplementary tier
//! only exists before the secondary questionnaire has run.

use crate::config::QuestionSpec;

/// Outcome tier of a primary-only evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    AutoApprove,
    RecommendApproval,
    ManualReview,
    NeedsSupplementary,
}

impl Recommendation {
    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::AutoApprove => "AutoMod: automatic approval",
            Recommendation::RecommendApproval => "Recommended for approval",
            Recommendation::ManualReview => "Requires manual review",
            Recommendation::NeedsSupplementary => "Requires supplementary questions",
        }
    }
}

/// Outcome tier after the secondary questionnaire has been folded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinedRecommendation {
    AutoApprove,
    RecommendApproval,
    DetailedReview,
    RecommendRejection,
}

impl CombinedRecommendation {
    pub fn label(&self) -> &'static str {
        match self {
            CombinedRecommendation::AutoApprove => {
                "AutoMod: automatic approval (after supplementary questions)"
            }
            CombinedRecommendation::RecommendApproval => {
                "Recommended for approval (after supplementary questions)"
            }
            CombinedRecommendation::DetailedReview => "Requires detailed manual review",
            CombinedRecommendation::RecommendRejection => "Rejection or further training advised",
        }
    }
}

/// Result of scoring one answer set against one rubric
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Weighted percentage, 0-100
    pub percentage: f64,

    /// Per-answer score on the 0-10 scale, in question order
    pub answer_scores: Vec<u8>,

    /// Tier from the primary threshold table
    pub recommendation: Recommendation,

    /// True only at a perfect score
    pub auto_approve: bool,
}

/// Result of combining the primary and secondary percentages
#[derive(Debug, Clone)]
pub struct CombinedEvaluation {
    pub primary_percentage: f64,
    pub secondary_percentage: f64,

    /// `0.7 * primary + 0.3 * secondary`
    pub combined_percentage: f64,

    /// Tier from the combined threshold table
    pub recommendation: CombinedRecommendation,

    pub auto_approve: bool,
}

/// Count how many rubric keywords appear as case-insensitive substrings
fn keyword_matches(answer: &str, keywords: &[String]) -> usize {
    let answer_lower = answer.to_lowercase();
    keywords
        .iter()
        .filter(|k| answer_lower.contains(&k.to_lowercase()))
        .count()
}

/// Score one primary answer on the 0-10 scale
fn primary_answer_score(answer: &str, keywords: &[String]) -> u8 {
    match keyword_matches(answer, keywords) {
        n if n >= 2 => 10,
        1 => 7,
        // At least tried to answer
        _ if answer.chars().count() >= 10 => 4,
        _ => 0,
    }
}

/// Score one secondary answer on the 0-10 scale. The supplementary rubric
/// is deliberately more lenient: a single keyword is a full score.
fn secondary_answer_score(answer: &str, keywords: &[String]) -> u8 {
    match keyword_matches(answer, keywords) {
        n if n >= 1 => 10,
        _ if answer.chars().count() >= 10 => 5,
        _ => 0,
    }
}

fn weighted_percentage(scores: &[u8], rubric: &[QuestionSpec]) -> f64 {
    let max_possible: u32 = rubric.iter().map(|q| q.weight).sum();
    if max_possible == 0 {
        return 0.0;
    }

    let total: f64 = scores
        .iter()
        .zip(rubric)
        .map(|(score, spec)| (f64::from(*score) / 10.0) * f64::from(spec.weight))
        .sum();

    (total / f64::from(max_possible)) * 100.0
}

/// Score the primary answer set. Answers are matched to rubric entries by
/// position; missing answers score zero.
pub fn score_primary(answers: &[String], rubric: &[QuestionSpec]) -> Evaluation {
    let answer_scores: Vec<u8> = rubric
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            answers
                .get(i)
                .map(|a| primary_answer_score(a, &spec.keywords))
                .unwrap_or(0)
        })
        .collect();

    let percentage = weighted_percentage(&answer_scores, rubric);

    let recommendation = if percentage >= 100.0 {
        Recommendation::AutoApprove
    } else if percentage >= 80.0 {
        Recommendation::RecommendApproval
    } else if percentage >= 60.0 {
        Recommendation::ManualReview
    } else {
        Recommendation::NeedsSupplementary
    };

    Evaluation {
        percentage,
        answer_scores,
        recommendation,
        auto_approve: percentage >= 100.0,
    }
}

/// Score the secondary answer set, returning its weighted percentage.
pub fn score_secondary(answers: &[String], rubric: &[QuestionSpec]) -> f64 {
    let scores: Vec<u8> = rubric
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            answers
                .get(i)
                .map(|a| secondary_answer_score(a, &spec.keywords))
                .unwrap_or(0)
        })
        .collect();

    weighted_percentage(&scores, rubric)
}

/// Fold the secondary percentage into the primary one and re-tier against
/// the combined threshold table.
pub fn score_combined(primary_percentage: f64, secondary_percentage: f64) -> CombinedEvaluation {
    let combined = primary_percentage * 0.7 + secondary_percentage * 0.3;

    let recommendation = if combined >= 100.0 {
        CombinedRecommendation::AutoApprove
    } else if combined >= 80.0 {
        CombinedRecommendation::RecommendApproval
    } else if combined >= 65.0 {
        CombinedRecommendation::DetailedReview
    } else {
        CombinedRecommendation::RecommendRejection
    };

    CombinedEvaluation {
        primary_percentage,
        secondary_percentage,
        combined_percentage: combined,
        recommendation,
        auto_approve: combined >= 100.0,
    }
}

/// Emoji band for a per-answer score, used in the staff embed
pub fn score_emoji(score: u8) -> &'static str {
    if score >= 7 {
        "✅"
    } else if score >= 5 {
        "⚠️"
    } else {
        "❌"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuestionConfig;

    fn rubric(entries: &[(&[&str], u32)]) -> Vec<QuestionSpec> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (keywords, weight))| QuestionSpec {
                prompt: format!("question {}", i + 1),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                weight: *weight,
            })
            .collect()
    }

    fn answers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_all_answers_with_two_matches_score_exactly_hundred() {
        let rubric = rubric(&[
            (&["alpha", "beta"], 5),
            (&["gamma", "delta"], 15),
            (&["echo", "foxtrot"], 80),
        ]);
        let answers = answers(&[
            "alpha and beta",
            "gamma then delta",
            "echo echo foxtrot",
        ]);

        let eval = score_primary(&answers, &rubric);
        assert_eq!(eval.percentage, 100.0);
        assert!(eval.auto_approve);
        assert_eq!(eval.recommendation, Recommendation::AutoApprove);
        assert_eq!(eval.answer_scores, vec![10, 10, 10]);
    }

    #[test]
    fn test_empty_answers_score_zero() {
        let config = QuestionConfig::default();
        let empty: Vec<String> = config.primary.iter().map(|_| String::new()).collect();

        let eval = score_primary(&empty, &config.primary);
        assert_eq!(eval.percentage, 0.0);
        assert!(eval.answer_scores.iter().all(|s| *s == 0));
        assert_eq!(eval.recommendation, Recommendation::NeedsSupplementary);
        assert!(!eval.auto_approve);
    }

    #[test]
    fn test_single_match_scores_seven() {
        let rubric = rubric(&[(&["alpha", "beta"], 10)]);
        let eval = score_primary(&answers(&["only alpha here"]), &rubric);
        assert_eq!(eval.answer_scores, vec![7]);
    }

    #[test]
    fn test_long_answer_without_matches_scores_four() {
        let rubric = rubric(&[(&["alpha"], 10)]);
        let eval = score_primary(&answers(&["a genuine attempt"]), &rubric);
        assert_eq!(eval.answer_scores, vec![4]);
    }

    #[test]
    fn test_short_answer_without_matches_scores_zero() {
        let rubric = rubric(&[(&["alpha"], 10)]);
        let eval = score_primary(&answers(&["nope"]), &rubric);
        assert_eq!(eval.answer_scores, vec![0]);
    }

    #[test]
    fn test_keyword_matching_is_case_insensitive() {
        let rubric = rubric(&[(&["Alpha", "BETA"], 10)]);
        let eval = score_primary(&answers(&["alpha BeTa"]), &rubric);
        assert_eq!(eval.answer_scores, vec![10]);
    }

    #[test]
    fn test_scoring_is_order_sensitive() {
        let rubric = rubric(&[(&["alpha"], 20), (&["beta"], 80)]);
        let straight = score_primary(&answers(&["alpha", "beta"]), &rubric);
        let swapped = score_primary(&answers(&["beta", "alpha"]), &rubric);

        assert_eq!(straight.answer_scores, vec![7, 7]);
        // Swapped answers miss both rubric slots entirely
        assert_eq!(swapped.answer_scores, vec![0, 0]);
        assert!(straight.percentage > swapped.percentage);
    }

    #[test]
    fn test_combined_arithmetic_at_the_extremes() {
        let perfect = score_combined(100.0, 100.0);
        assert_eq!(perfect.combined_percentage, 100.0);
        assert!(perfect.auto_approve);
        assert_eq!(perfect.recommendation, CombinedRecommendation::AutoApprove);

        let blank = score_combined(0.0, 0.0);
        assert_eq!(blank.combined_percentage, 0.0);
        assert!(!blank.auto_approve);
        assert_eq!(
            blank.recommendation,
            CombinedRecommendation::RecommendRejection
        );
    }

    #[test]
    fn test_combined_weighting_favors_primary() {
        let eval = score_combined(80.0, 50.0);
        assert!((eval.combined_percentage - 71.0).abs() < 1e-9);
        assert_eq!(eval.recommendation, CombinedRecommendation::DetailedReview);
    }

    #[test]
    fn test_combined_band_below_sixty_five_recommends_rejection() {
        let eval = score_combined(60.0, 50.0);
        assert!((eval.combined_percentage - 57.0).abs() < 1e-9);
        assert_eq!(
            eval.recommendation,
            CombinedRecommendation::RecommendRejection
        );
    }

    #[test]
    fn test_eighty_two_percent_routes_to_recommend_approval() {
        // Default rubric weights are [5, 15, 15, 10, 10, 15, 10, 20]. Six
        // full-score answers on the slots worth 80 points, a zero on one
        // 15-point slot, and a tried-but-unmatched first answer worth
        // 0.4 * 5 = 2 land exactly on 82%.
        let config = QuestionConfig::default();
        let answers = answers(&[
            "i am ancient",                              // weight 5, no match, len >= 10 -> 4
            "",                                          // weight 15 -> 0
            "an rk means revenge, a ck is permanent",    // weight 15 -> 10
            "yes, lots of roleplay experience",          // weight 10 -> 10
            "for the community and the fun",             // weight 10 -> 10
            "hands up and comply with the officers",     // weight 15 -> 10
            "a civilian with a mechanic job",            // weight 10 -> 10
            "you portray a character",                   // weight 20 -> 10
        ]);

        let eval = score_primary(&answers, &config.primary);
        assert!((eval.percentage - 82.0).abs() < 1e-9);
        assert_eq!(eval.recommendation, Recommendation::RecommendApproval);
        assert!(!eval.auto_approve);
    }

    #[test]
    fn test_secondary_single_match_is_full_score() {
        let rubric = rubric(&[(&["alpha"], 10), (&["beta"], 10)]);
        let pct = score_secondary(&answers(&["alpha", "a long attempt here"]), &rubric);
        // 10/10 on the first slot, 5/10 on the second
        assert!((pct - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_rubric_scores_zero() {
        let eval = score_primary(&[], &[]);
        assert_eq!(eval.percentage, 0.0);
        assert!(eval.answer_scores.is_empty());
    }
}
