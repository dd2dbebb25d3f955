use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use faqbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key_path: &'static str, env_keys: &'static [&'static str], value: String) -> Self {
        Self { key_path, env_keys, value }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let knowledge = &config.knowledge;
    let answers = &config.answers;
    let dispatch = &config.dispatch;

    vec![
        Field::new(
            "knowledge.runtime_url",
            &["FAQBOT_KNOWLEDGE_RUNTIME_URL"],
            knowledge.runtime_url.clone(),
        ),
        Field::new(
            "knowledge.management_url",
            &["FAQBOT_KNOWLEDGE_MANAGEMENT_URL"],
            knowledge.management_url.clone(),
        ),
        Field::new(
            "knowledge.knowledge_base_id",
            &["FAQBOT_KNOWLEDGE_BASE_ID"],
            knowledge.knowledge_base_id.clone(),
        ),
        Field::new(
            "knowledge.endpoint_key",
            &["FAQBOT_KNOWLEDGE_ENDPOINT_KEY"],
            redact_secret(knowledge.endpoint_key.expose_secret()),
        ),
        Field::new(
            "knowledge.subscription_key",
            &["FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY", "QNA_SUBSCRIPTION"],
            redact_secret(knowledge.subscription_key.expose_secret()),
        ),
        Field::new(
            "knowledge.timeout_secs",
            &["FAQBOT_KNOWLEDGE_TIMEOUT_SECS"],
            knowledge.timeout_secs.to_string(),
        ),
        Field::new(
            "knowledge.publish_delay_ms",
            &["FAQBOT_KNOWLEDGE_PUBLISH_DELAY_MS"],
            knowledge.publish_delay_ms.to_string(),
        ),
        Field::new(
            "knowledge.import_source",
            &["FAQBOT_KNOWLEDGE_IMPORT_SOURCE"],
            knowledge.import_source.clone(),
        ),
        Field::new(
            "knowledge.query_test_index",
            &["FAQBOT_KNOWLEDGE_QUERY_TEST_INDEX"],
            knowledge.query_test_index.to_string(),
        ),
        Field::new("answers.base_url", &["FAQBOT_ANSWERS_BASE_URL"], answers.base_url.clone()),
        Field::new(
            "answers.article_path",
            &["FAQBOT_ANSWERS_ARTICLE_PATH"],
            answers.article_path.clone(),
        ),
        Field::new(
            "answers.content_anchor",
            &["FAQBOT_ANSWERS_CONTENT_ANCHOR"],
            answers.content_anchor.clone(),
        ),
        Field::new(
            "answers.support_url",
            &["FAQBOT_ANSWERS_SUPPORT_URL"],
            answers.support_url.clone(),
        ),
        Field::new(
            "chat.moderation_conversation_id",
            &["FAQBOT_CHAT_MODERATION_CONVERSATION_ID"],
            config.chat.moderation_conversation_id.clone(),
        ),
        Field::new(
            "chat.bot_user_id",
            &["FAQBOT_CHAT_BOT_USER_ID"],
            config.chat.bot_user_id.clone(),
        ),
        Field::new(
            "dispatch.max_candidates",
            &["FAQBOT_DISPATCH_MAX_CANDIDATES"],
            dispatch.max_candidates.to_string(),
        ),
        Field::new(
            "dispatch.min_score",
            &["FAQBOT_DISPATCH_MIN_SCORE"],
            dispatch.min_score.to_string(),
        ),
        Field::new(
            "dispatch.auto_answer",
            &["FAQBOT_DISPATCH_AUTO_ANSWER"],
            format!("{:?}", dispatch.auto_answer),
        ),
        Field::new(
            "dispatch.pending_ttl_secs",
            &["FAQBOT_DISPATCH_PENDING_TTL_SECS"],
            dispatch.pending_ttl_secs.to_string(),
        ),
        Field::new(
            "server.bind_address",
            &["FAQBOT_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        Field::new(
            "server.health_check_port",
            &["FAQBOT_SERVER_HEALTH_CHECK_PORT", "PORT"],
            config.server.health_check_port.to_string(),
        ),
        Field::new(
            "logging.level",
            &["FAQBOT_LOGGING_LEVEL", "FAQBOT_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        Field::new(
            "logging.format",
            &["FAQBOT_LOGGING_FORMAT", "FAQBOT_LOG_FORMAT"],
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("faqbot.toml"), PathBuf::from("config/faqbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    let value = if value.is_empty() { "<unset>" } else { value };
    format!("- {key} = {value} (source: {source})")
}

/// Keys are shown only by their last four characters.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
