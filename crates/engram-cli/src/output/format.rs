use engram_core::model::TriggerConfig;
use engram_sdk::{AddOutcome, BatchReport, EngramState, IndexListing, InitOutcome, InitReport};
use serde_json::json;

use super::OutputFormat;

fn state_marker(state: EngramState) -> &'static str {
    match state {
        EngramState::Initialized => "\u{2713}",
        EngramState::Indexed => "\u{25cb}",
        EngramState::Absent => "?",
    }
}

fn trigger_summary(label: &str, triggers: Option<&TriggerConfig>) -> Option<String> {
    let t = triggers.filter(|t| !t.is_empty())?;
    let mut parts = Vec::new();
    for (kind, patterns) in [("any", &t.any_msg), ("user", &t.user_msg), ("agent", &t.agent_msg)] {
        if !patterns.is_empty() {
            parts.push(format!("{kind}: {}", patterns.join(", ")));
        }
    }
    Some(format!("    {label}: {}\n", parts.join("; ")))
}

pub fn format_index_listing(listing: &IndexListing, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(listing).unwrap_or_default(),
        OutputFormat::Text => format_index_listing_text(listing),
    }
}

fn format_index_listing_text(listing: &IndexListing) -> String {
    if listing.entries.is_empty() {
        return "Engram index is empty.".to_string();
    }

    let mut out = String::new();
    for item in &listing.entries {
        let entry = &item.entry;
        out.push_str(&format!(
            "{} {}: {}\n",
            state_marker(item.state),
            item.name,
            entry.name()
        ));
        out.push_str(&format!("    {}\n", entry.description()));
        if let Some(url) = &entry.url {
            out.push_str(&format!("    url: {url}\n"));
        }
        if let Some(wrap) = entry.wrap() {
            let pin = wrap
                .locked
                .as_deref()
                .or(wrap.git_ref.as_deref())
                .unwrap_or("HEAD");
            out.push_str(&format!("    wraps: {} @ {pin}\n", wrap.remote));
        }
        out.extend(trigger_summary("disclosure", entry.disclosure_triggers()));
        out.extend(trigger_summary("activation", entry.activation_triggers()));
    }
    out.push_str(&format!(
        "\n{} initialized  {} not initialized\n",
        state_marker(EngramState::Initialized),
        state_marker(EngramState::Indexed)
    ));
    out
}

pub fn format_add_outcome(outcome: &AddOutcome, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
        OutputFormat::Text => {
            let how = if outcome.as_submodule {
                "Added submodule"
            } else {
                "Cloned"
            };
            let mut out = format!("{how} {} at {}", outcome.name, outcome.target.display());
            if outcome.cache_hit {
                out.push_str(" (from cache)");
            }
            if outcome.index_updated {
                out.push_str("\nRecorded in engram index");
            }
            out
        }
    }
}

pub fn format_init_outcome(name: &str, outcome: &InitOutcome, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&json!({ "name": name, "outcome": outcome }))
                .unwrap_or_default()
        }
        OutputFormat::Text => match outcome {
            InitOutcome::AlreadyInitialized => format!("{name} is already initialized"),
            InitOutcome::Initialized { commit: Some(commit) } => {
                format!("Initialized {name} at {commit}")
            }
            InitOutcome::Initialized { commit: None } => format!("Initialized {name}"),
        },
    }
}

pub fn format_batch_report(report: &BatchReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|(name, e)| json!({ "name": name, "error": e.to_string(), "kind": e.kind().to_string() }))
                .collect();
            serde_json::to_string_pretty(&json!({
                "initialized": report.initialized,
                "skipped": report.skipped,
                "failed": failed,
            }))
            .unwrap_or_default()
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for name in &report.initialized {
                out.push_str(&format!("\u{2713} {name}\n"));
            }
            for (name, e) in &report.failed {
                out.push_str(&format!("\u{2717} {name}: {e}\n"));
            }
            out.push_str(&format!(
                "{} initialized, {} failed, {} already present",
                report.initialized.len(),
                report.failed.len(),
                report.skipped.len()
            ));
            out
        }
    }
}

pub fn format_init_report(report: &InitReport, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = if report.created_dir {
                format!("Created {}", report.engrams_dir.display())
            } else {
                format!("Using {}", report.engrams_dir.display())
            };
            for remote in &report.configured_remotes {
                out.push_str(&format!("\nConfigured engram refspecs on {remote}"));
            }
            if report.fetched_index {
                out.push_str("\nFetched engram index");
            }
            out
        }
    }
}
