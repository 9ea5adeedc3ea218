use corebot_agent::runtime::{build_classifier, build_engine, open_store};
use corebot_core::config::{AppConfig, LoadOptions, StoreBackend};
use serde::Serialize;

use crate::commands::CommandResult;

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

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_task_registry(&config));
            checks.push(check_classifier(&config));
            checks.push(check_store_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["task_registry", "classifier_readiness", "store_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
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

fn check_task_registry(config: &AppConfig) -> DoctorCheck {
    match build_engine(config) {
        Ok(engine) => {
            let tasks = engine
                .registry()
                .tasks()
                .iter()
                .map(|task| task.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            DoctorCheck {
                name: "task_registry",
                status: CheckStatus::Pass,
                details: format!("root `{}`; tasks: {tasks}", engine.registry().root()),
            }
        }
        Err(error) => DoctorCheck {
            name: "task_registry",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_classifier(config: &AppConfig) -> DoctorCheck {
    let classifier = build_classifier(config);
    if classifier.is_configured() {
        DoctorCheck {
            name: "classifier_readiness",
            status: CheckStatus::Pass,
            details: format!("`{}` classifier configured", classifier.name()),
        }
    } else {
        DoctorCheck {
            name: "classifier_readiness",
            status: CheckStatus::Fail,
            details: format!(
                "`{}` classifier is not configured; every utterance would be unclassified",
                classifier.name()
            ),
        }
    }
}

fn check_store_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "store_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let store = open_store(config).await.map_err(|error| error.to_string())?;
        let conversations = store.conversation_ids().await.map_err(|error| error.to_string())?;
        Ok::<(&'static str, usize), String>((store.backend(), conversations.len()))
    });

    match result {
        Ok((backend, conversations)) => {
            let location = if config.store.backend == StoreBackend::Memory {
                "process memory"
            } else {
                config.store.url.as_str()
            };
            DoctorCheck {
                name: "store_connectivity",
                status: CheckStatus::Pass,
                details: format!(
                    "`{backend}` store reachable in `{location}` ({conversations} stored conversations)"
                ),
            }
        }
        Err(error) => {
            DoctorCheck { name: "store_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
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
