use leadflow_core::distribution::{DistributionEngine, DistributionStats};

use crate::commands::{lead_failure, lifecycle, with_database, CommandResult};

pub fn run() -> CommandResult {
    let outcome = with_database("stats", |config, pool| async move {
        let engine = DistributionEngine::new(lifecycle(&config, &pool), config.distribution);
        engine.distribution_stats().await.map_err(lead_failure)
    });

    match outcome {
        Ok(stats) => CommandResult::success("stats", render(&stats)),
        Err(failure) => failure,
    }
}

fn render(stats: &DistributionStats) -> String {
    let mut lines = vec![format!(
        "leads: {} new, {} assigned, {} total; {} active sales persons",
        stats.new_leads, stats.assigned_leads, stats.total, stats.active_sales_persons
    )];
    lines.extend(stats.per_person.iter().map(|load| {
        format!("  - {} (user {}): {} leads", load.username, load.user_id, load.owned_leads)
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use leadflow_core::distribution::{DistributionStats, SalesPersonLoad};
    use leadflow_core::domain::user::UserId;

    use super::render;

    #[test]
    fn renders_one_line_per_sales_person() {
        let stats = DistributionStats {
            active_sales_persons: 2,
            new_leads: 1,
            assigned_leads: 3,
            total: 4,
            all_leads: 6,
            per_person: vec![
                SalesPersonLoad { user_id: UserId(2), username: "sam".into(), owned_leads: 2 },
                SalesPersonLoad { user_id: UserId(3), username: "riley".into(), owned_leads: 1 },
            ],
        };

        assert_eq!(
            render(&stats),
            "leads: 1 new, 3 assigned, 4 total; 2 active sales persons\n  \
             - sam (user 2): 2 leads\n  - riley (user 3): 1 leads"
        );
    }
}
