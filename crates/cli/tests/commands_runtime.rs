use std::env;
use std::sync::{Mutex, OnceLock};

use faqbot_cli::commands::{ask, config, doctor};
use serde_json::Value;

const REQUIRED: [(&str, &str); 5] = [
    ("FAQBOT_KNOWLEDGE_BASE_ID", "kb-test"),
    ("FAQBOT_KNOWLEDGE_ENDPOINT_KEY", "endpoint-secret-value"),
    ("FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY", "subscription-secret-value"),
    ("FAQBOT_CHAT_MODERATION_CONVERSATION_ID", "conv-moderators"),
    ("FAQBOT_CHAT_BOT_USER_ID", "bot-user"),
];

#[test]
fn config_attributes_sources_and_redacts_keys() {
    with_env(&REQUIRED, || {
        let output = config::run();

        assert!(output.starts_with("effective config"));
        assert!(output.contains(
            "- knowledge.knowledge_base_id = kb-test (source: env (FAQBOT_KNOWLEDGE_BASE_ID))"
        ));
        assert!(output.contains("- knowledge.endpoint_key = ***alue"));
        assert!(!output.contains("endpoint-secret-value"));
        assert!(!output.contains("subscription-secret-value"));
        assert!(output.contains("- dispatch.min_score = 30 (source: default)"));
    });
}

#[test]
fn config_names_the_alias_that_supplied_a_value() {
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.push(("FAQBOT_LOG_LEVEL", "debug"));

    with_env(&vars, || {
        let output = config::run();
        assert!(output.contains("- logging.level = debug (source: env (FAQBOT_LOG_LEVEL))"));
    });
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
        assert!(output.contains("knowledge.knowledge_base_id"));
    });
}

#[test]
fn ask_returns_config_failure_without_knowledge_settings() {
    with_env(&[], || {
        let result = ask::run("How do I share my screen?");
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn ask_rejects_empty_questions() {
    with_env(&REQUIRED, || {
        let result = ask::run("   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

#[test]
fn ask_applies_the_threshold_to_service_candidates() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/knowledgebases/kb-test/generateAnswer")
        .match_header("authorization", "EndpointKey endpoint-secret-value")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"answers":[
                {"questions":["mute audio"],"answer":"104233","score":42.5,"id":11},
                {"questions":["share screen"],"answer":"Click Share.","score":87.0,"id":12},
                {"questions":["reset password"],"answer":"204455","score":30.0,"id":13},
                {"questions":[],"answer":"No good match found in KB.","score":0.0,"id":-1}
            ]}"#,
        )
        .create();

    let url = server.url();
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.push(("FAQBOT_KNOWLEDGE_RUNTIME_URL", url.as_str()));

    with_env(&vars, || {
        let result = ask::run("how do I share my screen");
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["returned"], 3);

        let candidates = payload["data"]["candidates"].as_array().expect("candidate list");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0]["representative_question"], "share screen");
        assert_eq!(candidates[0]["answer_ref"]["kind"], "text");
        assert_eq!(candidates[1]["answer_ref"]["kind"], "article");
        assert_eq!(candidates[1]["answer_ref"]["value"], "104233");
    });

    mock.assert();
}

#[test]
fn ask_reports_an_unavailable_knowledge_base() {
    let mut server = mockito::Server::new();
    let _mock =
        server.mock("POST", "/knowledgebases/kb-test/generateAnswer").with_status(503).create();

    let url = server.url();
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.push(("FAQBOT_KNOWLEDGE_RUNTIME_URL", url.as_str()));

    with_env(&vars, || {
        let result = ask::run("anything");
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "knowledge_unavailable");
        assert!(payload["message"].as_str().unwrap_or_default().contains("503"));
    });
}

#[test]
fn doctor_json_skips_probes_without_config() {
    with_env(&[], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

#[test]
fn doctor_counts_indexed_articles() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/knowledgebases/kb-test/Test/qna")
        .match_header("ocp-apim-subscription-key", "subscription-secret-value")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"qnaDocuments":[
                {"id":1,"answer":"104233","source":"faq-articles.xlsx","questions":["mute"]},
                {"id":2,"answer":"204455","source":"faq-articles.xlsx","questions":["reset"]},
                {"id":3,"answer":"Ask IT.","source":"admin-bot","questions":["vpn"]}
            ]}"#,
        )
        .create();

    let url = server.url();
    let mut vars: Vec<(&str, &str)> = REQUIRED.to_vec();
    vars.push(("FAQBOT_KNOWLEDGE_MANAGEMENT_URL", url.as_str()));

    with_env(&vars, || {
        let output = doctor::run(false);

        assert!(output.starts_with("doctor: all readiness checks passed"), "{output}");
        assert!(output.contains("- [ok] answer_page_selector:"));
        assert!(output.contains("2 article(s) indexed"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "FAQBOT_KNOWLEDGE_RUNTIME_URL",
        "FAQBOT_KNOWLEDGE_MANAGEMENT_URL",
        "FAQBOT_KNOWLEDGE_BASE_ID",
        "FAQBOT_KNOWLEDGE_ENDPOINT_KEY",
        "FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY",
        "QNA_SUBSCRIPTION",
        "FAQBOT_KNOWLEDGE_TIMEOUT_SECS",
        "FAQBOT_KNOWLEDGE_IMPORT_SOURCE",
        "FAQBOT_ANSWERS_BASE_URL",
        "FAQBOT_ANSWERS_CONTENT_ANCHOR",
        "FAQBOT_CHAT_MODERATION_CONVERSATION_ID",
        "FAQBOT_CHAT_BOT_USER_ID",
        "FAQBOT_DISPATCH_MAX_CANDIDATES",
        "FAQBOT_DISPATCH_MIN_SCORE",
        "FAQBOT_DISPATCH_AUTO_ANSWER",
        "FAQBOT_SERVER_HEALTH_CHECK_PORT",
        "PORT",
        "FAQBOT_LOGGING_LEVEL",
        "FAQBOT_LOGGING_FORMAT",
        "FAQBOT_LOG_LEVEL",
        "FAQBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
