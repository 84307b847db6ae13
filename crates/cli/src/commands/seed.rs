use leadflow_core::scoring::ScoringEngine;
use leadflow_db::{DemoSeedDataset, SeedResult};

use crate::commands::{lead_failure, with_database, CommandResult, Failure};

/// Replaces any earlier demo rows, so repeated runs leave the same dataset.
pub fn run() -> CommandResult {
    let outcome = with_database("seed", |config, pool| async move {
        DemoSeedDataset::clean(&pool).await.map_err(|error| {
            let (_, message, _) = lead_failure(error);
            ("seed_execution", message, 5u8)
        })?;

        let seeded = DemoSeedDataset::load(&pool, ScoringEngine::new(&config.scoring))
            .await
            .map_err(|error| {
                let (_, message, _) = lead_failure(error);
                ("seed_execution", message, 5u8)
            })?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err::<SeedResult, Failure>((
                "seed_verification",
                verification_message(&failed),
                6u8,
            ));
        }

        Ok(seeded)
    });

    match outcome {
        Ok(seeded) => CommandResult::success("seed", render(&seeded)),
        Err(failure) => failure,
    }
}

fn render(seeded: &SeedResult) -> String {
    let leads = seeded
        .leads_seeded
        .iter()
        .map(|lead| format!("  - lead {}: {} (score {})", lead.lead_id, lead.name, lead.score))
        .collect::<Vec<_>>();
    format!(
        "demo dataset loaded: {} users, {} unassigned leads:\n{}",
        seeded.users_seeded,
        seeded.leads_seeded.len(),
        leads.join("\n")
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["riley.sales", "demo-leads"]),
            "Seed verification failed for checks: riley.sales, demo-leads"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }
}
