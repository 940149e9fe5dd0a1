//! Text rendering for reports and actions

use footprint_core::model::{AuditReport, FailureSource, RemediationAction};
use std::fmt::Write;

/// Human-readable report summary
pub fn render_report(report: &AuditReport) -> String {
    let mut out = String::new();
    let platforms: Vec<&str> = report.platforms_analyzed.iter().map(|p| p.as_str()).collect();

    let _ = writeln!(out, "Report {} for {}", report.report_id, report.subject_id);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "Platforms: {}", platforms.join(", "));
    if report.degraded {
        let _ = writeln!(out, "Status: DEGRADED ({} source failure(s))", report.failures.len());
    }
    let _ = writeln!(out, "Overall risk: {:.2}/10", report.risk.overall);

    if !report.inferences.is_empty() {
        let _ = writeln!(out, "\nInferences:");
        for inference in &report.inferences {
            let sources: Vec<&str> = inference.source_platforms.iter().map(|p| p.as_str()).collect();
            let _ = writeln!(
                out,
                "  {:<22} {:<32} {:.2} [{}]",
                inference.inference_type.as_str(),
                inference.value,
                inference.confidence,
                sources.join(", ")
            );
        }
    }

    if !report.risk.risk_factors.is_empty() {
        let _ = writeln!(out, "\nRisk factors:");
        for factor in &report.risk.risk_factors {
            let _ = writeln!(out, "  - {}", factor);
        }
    }

    if !report.risk.exposure_points.is_empty() {
        let _ = writeln!(out, "\nExposure points:");
        for point in &report.risk.exposure_points {
            let _ = writeln!(out, "  - {}", point);
        }
    }

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for rec in &report.recommendations {
            let _ = writeln!(
                out,
                "  {}. [{:?}] {} (-{:.2})",
                rec.rank, rec.priority, rec.title, rec.estimated_risk_reduction
            );
            for item in &rec.action_items {
                let _ = writeln!(out, "       * {}", item);
            }
        }
    }

    if !report.actions.is_empty() {
        let _ = writeln!(out, "\nRemediation actions:");
        out.push_str(&render_actions(&report.actions));
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\nFailures:");
        for failure in &report.failures {
            let source = match &failure.source {
                FailureSource::Connector { platform } => format!("connector {}", platform),
                FailureSource::Provider {
                    provider_id,
                    platform,
                } => format!("provider {} on {}", provider_id, platform),
            };
            let _ = writeln!(
                out,
                "  {}: {:?} after {} attempt(s): {}",
                source, failure.kind, failure.attempts, failure.message
            );
        }
    }

    out
}

/// One line per action
pub fn render_actions(actions: &[RemediationAction]) -> String {
    let mut out = String::new();
    for action in actions {
        let _ = writeln!(
            out,
            "  {} {:<14} {:<10} {:<12} {}{}",
            action.id,
            action.capability.as_str(),
            action.platform.as_str(),
            action.state.to_string(),
            action.description,
            if action.dry_run { " (dry-run)" } else { "" }
        );
        if let Some(error) = &action.error {
            let _ = writeln!(out, "      error: {}", error);
        }
    }
    out
}

/// One line per stored report
pub fn render_history(reports: &[AuditReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(
            out,
            "{}  {}  risk {:.2}  {} inference(s)  {} action(s){}",
            report.generated_at.to_rfc3339(),
            report.report_id,
            report.risk.overall,
            report.inferences.len(),
            report.actions.len(),
            if report.degraded { "  degraded" } else { "" }
        );
    }
    out
}
