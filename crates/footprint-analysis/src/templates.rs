//! Recommendation wording per sensitivity category

use footprint_core::model::{InferenceType, SensitivityCategory};

/// Static text for one recommendation
#[derive(Debug, Clone, Copy)]
pub struct RecommendationTemplate {
    pub title: &'static str,
    pub text: &'static str,
    pub action_items: &'static [&'static str],
}

pub fn template_for(inference_type: InferenceType) -> RecommendationTemplate {
    match inference_type {
        InferenceType::WorkSchedule => RecommendationTemplate {
            title: "Randomize Activity Patterns",
            text: "Your work schedule and timezone can be inferred from activity patterns.",
            action_items: &[
                "Use scheduled commits/posts instead of real-time",
                "Batch your coding sessions",
                "Vary your online activity times",
            ],
        },
        InferenceType::ProgrammingSkills => RecommendationTemplate {
            title: "Review Professional Information Exposure",
            text: "Your technical skills are highly visible and detailed.",
            action_items: &[
                "Consider which skills you want to highlight publicly",
                "Remove or archive old experimental repositories",
                "Use private repositories for sensitive projects",
            ],
        },
        other => category_template(other.category()),
    }
}

fn category_template(category: SensitivityCategory) -> RecommendationTemplate {
    match category {
        SensitivityCategory::Health => RecommendationTemplate {
            title: "Limit Health-Related Disclosures",
            text: "Health signals can be inferred from your public content.",
            action_items: &[
                "Remove mentions of diagnoses, treatments and medication",
                "Disconnect fitness trackers from public profiles",
                "Restrict posts about health topics to trusted audiences",
            ],
        },
        SensitivityCategory::Political => RecommendationTemplate {
            title: "Reduce Political Profiling",
            text: "Your political leaning can be inferred from stated positions or causes.",
            action_items: &[
                "Review public posts about campaigns and elections",
                "Restrict visibility of political group memberships",
            ],
        },
        SensitivityCategory::Financial => RecommendationTemplate {
            title: "Protect Financial Signals",
            text: "Your financial situation or purchasing power can be inferred.",
            action_items: &[
                "Remove references to holdings, investments and wallets",
                "Avoid posting purchases and luxury items publicly",
            ],
        },
        SensitivityCategory::Location => RecommendationTemplate {
            title: "Remove Location Information",
            text: "Your location can be inferred with high confidence from your public profiles.",
            action_items: &[
                "Remove location from profile bios",
                "Review commit timestamps for location leaks",
                "Avoid location-specific references in posts",
            ],
        },
        SensitivityCategory::Personal => RecommendationTemplate {
            title: "Hide Personal Life Details",
            text: "Details about your age, relationships or family are visible.",
            action_items: &[
                "Remove relationship and family details from bios",
                "Limit who can see tagged photos and life events",
            ],
        },
        SensitivityCategory::Behavioral => RecommendationTemplate {
            title: "Reduce Behavioral Profiling",
            text: "Your habits and personality can be profiled from your activity.",
            action_items: &[
                "Archive old posts that reveal routines or moods",
                "Vary the tone and timing of public activity",
            ],
        },
        SensitivityCategory::Professional => RecommendationTemplate {
            title: "Balance Professional Visibility",
            text: "Your career and education details are broadly visible.",
            action_items: &[
                "Decide which professional details need to be public",
                "Restrict employer and education history to connections",
            ],
        },
        SensitivityCategory::Interests => RecommendationTemplate {
            title: "Review Interest Signals",
            text: "Your interests and hobbies can be used for targeting.",
            action_items: &[
                "Review followed topics and communities",
                "Limit visibility of likes and subscriptions",
            ],
        },
    }
}
