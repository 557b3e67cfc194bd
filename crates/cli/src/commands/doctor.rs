use grievance_core::config::{AppConfig, LoadOptions};
use grievance_core::escalation::RuleSet;
use grievance_db::{
    connect_with_config, migrations, ping, DbPool, ReferenceDirectory, SqlReferenceDirectory,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DATABASE_CHECKS: [&str; 3] = ["database_connectivity", "schema_migrations", "escalation_rules"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DATABASE_CHECKS.iter().map(|name| skipped(*name, "configuration did not load")));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let mut checks = vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
            checks.extend(DATABASE_CHECKS[1..].iter().map(|name| skipped(*name, "no async runtime")));
            return checks;
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                let mut checks = vec![DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to connect to database: {error}"),
                }];
                checks.extend(
                    DATABASE_CHECKS[1..].iter().map(|name| skipped(*name, "database unreachable")),
                );
                return checks;
            }
        };

        let mut checks = Vec::new();
        checks.push(match ping(&pool).await {
            Ok(()) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            Err(error) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("readiness probe failed: {error}"),
            },
        });

        let schema = check_schema(&pool).await;
        let schema_ready = schema.status == CheckStatus::Pass;
        checks.push(schema);
        checks.push(if schema_ready {
            check_rules(&pool).await
        } else {
            skipped("escalation_rules", "schema is not migrated")
        });

        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    match migrations::applied_versions(pool).await {
        Ok(versions) if !versions.is_empty() => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Pass,
            details: format!("applied schema versions: {versions:?}"),
        },
        Ok(_) | Err(_) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: "no migrations applied; run `grievance migrate`".to_string(),
        },
    }
}

async fn check_rules(pool: &DbPool) -> DoctorCheck {
    let directory = SqlReferenceDirectory::new(pool.clone());
    let loaded = match directory.list_escalation_rules().await {
        Ok(rules) => rules,
        Err(error) => {
            return DoctorCheck {
                name: "escalation_rules",
                status: CheckStatus::Fail,
                details: format!("failed to load escalation rules: {error}"),
            };
        }
    };

    match RuleSet::new(loaded) {
        Ok(rules) if rules.is_empty() => DoctorCheck {
            name: "escalation_rules",
            status: CheckStatus::Fail,
            details: "no active escalation rules; overdue complaints will never escalate"
                .to_string(),
        },
        Ok(rules) => DoctorCheck {
            name: "escalation_rules",
            status: CheckStatus::Pass,
            details: format!("{} active escalation rules", rules.rules().len()),
        },
        Err(error) => DoctorCheck {
            name: "escalation_rules",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
