use faqbot_core::config::{AppConfig, LoadOptions};
use faqbot_knowledge::{
    HttpKnowledgeClient, KnowledgeClient, KnowledgeSettings, SupportPageResolver,
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

impl DoctorCheck {
    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
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
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
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
            checks.push(check_answer_pages(&config));
            checks.push(check_knowledge_base(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck::skipped("answer_page_selector"));
            checks.push(DoctorCheck::skipped("knowledge_base_download"));
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

fn check_answer_pages(config: &AppConfig) -> DoctorCheck {
    match SupportPageResolver::new(&config.answers) {
        Ok(_) => DoctorCheck {
            name: "answer_page_selector",
            status: CheckStatus::Pass,
            details: format!(
                "answers resolve from `{}` after `{}`",
                config.answers.article_url("<id>"),
                config.answers.content_anchor
            ),
        },
        Err(error) => DoctorCheck {
            name: "answer_page_selector",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_knowledge_base(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "knowledge_base_download",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let settings =
        KnowledgeSettings::from_config(&config.knowledge, config.dispatch.max_candidates);
    let result = runtime.block_on(async {
        let client = HttpKnowledgeClient::new(settings)?;
        client.load_article_index().await
    });

    match result {
        Ok(articles) => DoctorCheck {
            name: "knowledge_base_download",
            status: CheckStatus::Pass,
            details: format!(
                "knowledge base `{}` downloaded; {articles} article(s) indexed",
                config.knowledge.knowledge_base_id
            ),
        },
        Err(error) => DoctorCheck {
            name: "knowledge_base_download",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
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
