//! Exposure points and risk factors derived from profile metadata.
//! Text only; never feeds the numeric score.

use footprint_core::model::{Inference, InferenceType, Platform, ProfileData};
use std::collections::BTreeSet;

pub fn display_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Github => "GitHub",
        Platform::Twitter => "Twitter",
        Platform::Reddit => "Reddit",
        Platform::Linkedin => "LinkedIn",
        Platform::Facebook => "Facebook",
        Platform::Instagram => "Instagram",
        Platform::Tiktok => "TikTok",
    }
}

/// Data points on each profile that increase exposure
pub fn exposure_points(profiles: &[ProfileData]) -> Vec<String> {
    let mut points = Vec::new();

    for profile in profiles {
        let name = display_name(profile.platform);

        if profile.metadata_str("location").is_some() {
            points.push(format!("{}: Location in bio", name));
        }
        if profile.metadata_str("company").is_some() {
            points.push(format!("{}: Company in bio", name));
        }
        if profile.metadata_str("email").is_some() {
            points.push(format!("{}: Email address visible", name));
        }
        if profile.metadata_str("blog").is_some() || profile.metadata_str("website").is_some() {
            points.push(format!("{}: Personal website linked", name));
        }

        if profile.platform == Platform::Github {
            if profile
                .metadata
                .get("commit_patterns")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                points.push("GitHub: Commit time patterns visible".to_string());
            }
            let languages = profile
                .metadata
                .get("languages")
                .and_then(|v| v.as_array())
                .map(|v| v.len())
                .unwrap_or(0);
            if languages > 3 {
                points.push("GitHub: Multiple programming languages revealed".to_string());
            }
        }

        if profile.metadata_u64("recent_posts_count").unwrap_or(0) > 10 {
            points.push(format!("{}: Recent post content analyzed", name));
        }
        let followers = profile
            .metadata_u64("followers_count")
            .or_else(|| profile.metadata_u64("followers"))
            .unwrap_or(0);
        if followers > 1000 {
            points.push(format!("{}: High follower count increases visibility", name));
        }
    }

    points
}

/// Summary risk factors, deduplicated in first-seen order
pub fn risk_factors(inferences: &[Inference], profiles: &[ProfileData]) -> Vec<String> {
    let mut factors = Vec::new();
    let confident = |types: &[InferenceType], above: f64| {
        inferences
            .iter()
            .any(|i| types.contains(&i.inference_type) && i.confidence > above)
    };

    if confident(&[InferenceType::Location], 0.6) {
        factors.push("Location information easily inferrable".to_string());
    }

    let platforms: BTreeSet<Platform> = profiles.iter().map(|p| p.platform).collect();
    if platforms.len() > 1 {
        factors.push(format!("Data exposed across {} platforms", platforms.len()));
    }

    if confident(
        &[InferenceType::ProgrammingSkills, InferenceType::WorkSchedule],
        0.7,
    ) {
        factors.push("Professional information highly visible".to_string());
    }
    if confident(&[InferenceType::WorkSchedule], 0.6) {
        factors.push("Personal schedule patterns detectable".to_string());
    }

    for profile in profiles {
        if profile.metadata_str("location").is_some() {
            factors.push("Location explicitly listed in profile".to_string());
        }
        if profile.metadata_str("email").is_some() {
            factors.push("Email address publicly visible".to_string());
        }
        if profile.metadata_str("company").is_some() {
            factors.push("Company information publicly visible".to_string());
        }
    }

    let mut seen = BTreeSet::new();
    factors.retain(|f| seen.insert(f.clone()));
    factors
}
