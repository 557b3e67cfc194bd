use crate::commands::{load_config, migrated_pool, runtime, CommandResult};
use grievance_db::{DemoSeedDataset, SeededComplaint};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedOutput, (&'static str, String, u8)> =
            if !verification.all_present {
                let failed_checks = verification
                    .checks
                    .iter()
                    .filter_map(|(check, passed)| (!passed).then_some(*check))
                    .collect::<Vec<_>>();
                Err(("seed_verification", verification_message(&failed_checks), 6u8))
            } else {
                Ok(SeedOutput {
                    complaints: seed_result.complaints_seeded,
                    users: seed_result.users_seeded,
                })
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(output) => {
            let complaint_lines: Vec<String> = output
                .complaints
                .iter()
                .map(|c| format!("  - {}: {} ({})", c.status, c.complaint_id, c.description))
                .collect();
            let message = format!(
                "demo dataset loaded: {} users, {} complaints:\n{}",
                output.users,
                output.complaints.len(),
                complaint_lines.join("\n")
            );
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedOutput {
    complaints: Vec<SeededComplaint>,
    users: usize,
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
        let message = verification_message(&["users", "CMP-20260111-DEMO0002"]);
        assert_eq!(message, "Seed verification failed for checks: users, CMP-20260111-DEMO0002");
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }
}
