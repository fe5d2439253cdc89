use secrecy::ExposeSecret;
use serde::Serialize;

use saiborg_core::config::{AppConfig, LoadOptions};
use saiborg_index::VectorStore;

use super::block_on;

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
            checks.push(check_slack_tokens(&config));
            checks.push(check_vector_store(&config));
            checks.push(check_crm(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_token_readiness", "vector_store", "crm_configuration"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let app_ok = config.slack.app_token.expose_secret().starts_with("xapp-");
    let bot_ok = config.slack.bot_token.expose_secret().starts_with("xoxb-");

    if app_ok && bot_ok {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Pass,
            details: "app and bot token shapes look valid".to_string(),
        }
    } else {
        DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: format!(
                "token shape mismatch (app token xapp-*: {app_ok}, bot token xoxb-*: {bot_ok})"
            ),
        }
    }
}

fn check_vector_store(config: &AppConfig) -> DoctorCheck {
    let store_path = config.index.store_path.clone();
    let probe = block_on(async move {
        let store = VectorStore::open(&store_path).await?;
        store.count().await
    });

    match probe {
        Ok(Ok(count)) => DoctorCheck {
            name: "vector_store",
            status: CheckStatus::Pass,
            details: if count == 0 {
                format!(
                    "store at `{}` is reachable but empty; run `saiborg index`",
                    config.index.store_path
                )
            } else {
                format!("store at `{}` holds {count} chunks", config.index.store_path)
            },
        },
        Ok(Err(error)) => DoctorCheck {
            name: "vector_store",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "vector_store", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    if config.crm.enabled() {
        DoctorCheck {
            name: "crm_configuration",
            status: CheckStatus::Pass,
            details: format!("api key present for board {}", config.crm.board_id),
        }
    } else {
        DoctorCheck {
            name: "crm_configuration",
            status: CheckStatus::Skipped,
            details: "no crm api key configured; crm features disabled".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "✔",
            CheckStatus::Fail => "✖",
            CheckStatus::Skipped => "-",
        };
        lines.push(format!("{marker} {}: {}", check.name, check.details));
    }
    lines.join("\n")
}

fn escape_json(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
