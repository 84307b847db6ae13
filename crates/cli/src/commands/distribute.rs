use leadflow_core::distribution::{DistributionEngine, DistributionReport};
use leadflow_core::domain::lead::LeadId;
use leadflow_core::domain::user::UserId;

use crate::commands::{lead_failure, lifecycle, with_database, CommandResult};

enum Outcome {
    All(usize),
    Specific(DistributionReport),
}

/// Empty `leads` and `users` distribute every unassigned NEW lead; otherwise
/// only the listed leads are spread over the listed users.
pub fn run(leads: &[i64], users: &[i64]) -> CommandResult {
    let lead_ids = leads.iter().copied().map(LeadId).collect::<Vec<_>>();
    let user_ids = users.iter().copied().map(UserId).collect::<Vec<_>>();

    let outcome = with_database("distribute", |config, pool| async move {
        let engine = DistributionEngine::new(lifecycle(&config, &pool), config.distribution);
        if lead_ids.is_empty() && user_ids.is_empty() {
            engine.distribute_all().await.map(Outcome::All).map_err(lead_failure)
        } else {
            engine
                .distribute_specific(&lead_ids, &user_ids)
                .await
                .map(Outcome::Specific)
                .map_err(lead_failure)
        }
    });

    match outcome {
        Ok(Outcome::All(count)) => {
            CommandResult::success("distribute", format!("distributed {count} leads"))
        }
        Ok(Outcome::Specific(report)) => CommandResult::success("distribute", render(&report)),
        Err(failure) => failure,
    }
}

fn render(report: &DistributionReport) -> String {
    let mut lines = vec![format!(
        "distributed {} leads, skipped {}",
        report.distributed_count(),
        report.skipped.len()
    )];
    lines.extend(
        report
            .skipped
            .iter()
            .map(|skipped| format!("  - lead {}: {}", skipped.lead_id, skipped.reason)),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use leadflow_core::distribution::{DistributionReport, SkipReason, SkippedLead};
    use leadflow_core::domain::lead::{LeadId, LeadStatus};

    use super::render;

    #[test]
    fn report_lists_each_skipped_lead() {
        let report = DistributionReport {
            distributed: vec![LeadId(1)],
            skipped: vec![
                SkippedLead {
                    lead_id: LeadId(2),
                    reason: SkipReason::NotNew(LeadStatus::Assigned),
                },
                SkippedLead { lead_id: LeadId(9), reason: SkipReason::NotFound },
            ],
        };

        let rendered = render(&report);
        assert!(rendered.starts_with("distributed 1 leads, skipped 2"));
        assert!(rendered.contains("  - lead 2: lead is ASSIGNED, not NEW"));
        assert!(rendered.contains("  - lead 9: lead does not exist"));
    }
}
