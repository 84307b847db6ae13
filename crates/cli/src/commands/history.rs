use leadflow_core::domain::history::HistoryEntry;
use leadflow_core::domain::lead::LeadId;

use crate::commands::{lead_failure, lifecycle, with_database, CommandResult};

pub fn run(lead: i64, limit: Option<usize>) -> CommandResult {
    let lead_id = LeadId(lead);
    let outcome = with_database("history", |config, pool| async move {
        let engine = lifecycle(&config, &pool);
        let lead = engine.lead(lead_id).await.map_err(lead_failure)?;
        let entries = match limit {
            Some(limit) => engine.history().recent(lead.id, limit).await,
            None => engine.history().for_lead(lead.id).await,
        }
        .map_err(lead_failure)?;
        Ok((lead.profile.name, entries))
    });

    match outcome {
        Ok((name, entries)) => CommandResult::success("history", render(lead_id, &name, &entries)),
        Err(failure) => failure,
    }
}

fn render(lead_id: LeadId, name: &str, entries: &[HistoryEntry]) -> String {
    let mut lines = vec![format!("lead {lead_id} ({name}): {} history entries", entries.len())];
    for entry in entries {
        let actor = entry.actor.map_or_else(|| "system".to_string(), |id| format!("user {id}"));
        let transition = match (entry.old_status, entry.new_status) {
            (Some(from), Some(to)) => format!(" {from} -> {to}"),
            (None, Some(to)) => format!(" -> {to}"),
            _ => String::new(),
        };
        lines.push(format!(
            "  - {} {} [{}] by {actor}{transition}: {}",
            entry.recorded_at.format("%Y-%m-%dT%H:%M:%SZ"),
            entry.action,
            entry.action_type,
            entry.comment
        ));
    }
    lines.join("\n")
}
