use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::threshold::{ThresholdPolicy, DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_SCORE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub knowledge: KnowledgeConfig,
    pub answers: AnswersConfig,
    pub chat: ChatConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    /// Base URL of the query runtime (`.../knowledgebases/{id}/generateAnswer`).
    pub runtime_url: String,
    /// Base URL of the management API used for download, teach and publish.
    pub management_url: String,
    pub knowledge_base_id: String,
    pub endpoint_key: SecretString,
    pub subscription_key: SecretString,
    pub timeout_secs: u64,
    pub publish_delay_ms: u64,
    /// `source` tag of entries created by the FAQ article import.
    pub import_source: String,
    pub query_test_index: bool,
}

#[derive(Clone, Debug)]
pub struct AnswersConfig {
    pub base_url: String,
    pub article_path: String,
    /// CSS selector of the element right before the answer body.
    pub content_anchor: String,
    pub support_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub moderation_conversation_id: String,
    pub bot_user_id: String,
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub max_candidates: usize,
    pub min_score: f64,
    pub auto_answer: AutoAnswerPolicy,
    pub pending_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Whether a lone candidate that clears the threshold is answered directly
/// instead of being offered in a one-option selection form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAnswerPolicy {
    Disabled,
    SingleCandidate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub knowledge_runtime_url: Option<String>,
    pub knowledge_management_url: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub knowledge_endpoint_key: Option<String>,
    pub knowledge_subscription_key: Option<String>,
    pub answers_base_url: Option<String>,
    pub moderation_conversation_id: Option<String>,
    pub bot_user_id: Option<String>,
    pub auto_answer: Option<AutoAnswerPolicy>,
    pub min_score: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            knowledge: KnowledgeConfig {
                runtime_url: "https://faqbot-qna.azurewebsites.net/qnamaker".to_string(),
                management_url: "https://westus.api.cognitive.microsoft.com/qnamaker/v4.0"
                    .to_string(),
                knowledge_base_id: String::new(),
                endpoint_key: String::new().into(),
                subscription_key: String::new().into(),
                timeout_secs: 20,
                publish_delay_ms: 5_000,
                import_source: "faq-articles.xlsx".to_string(),
                query_test_index: true,
            },
            answers: AnswersConfig {
                base_url: "https://www.circuit.com".to_string(),
                article_path: "/unifyportalfaqdetail?articleId=".to_string(),
                content_anchor: ".UnifyPortalJournalArticleDisplayDate".to_string(),
                support_url: "https://www.circuit.com/support".to_string(),
                timeout_secs: 15,
            },
            chat: ChatConfig {
                moderation_conversation_id: String::new(),
                bot_user_id: String::new(),
            },
            dispatch: DispatchConfig {
                max_candidates: DEFAULT_MAX_CANDIDATES,
                min_score: DEFAULT_MIN_SCORE,
                auto_answer: AutoAnswerPolicy::Disabled,
                pending_ttl_secs: 86_400,
                sweep_interval_secs: 300,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                health_check_port: 1337,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for AutoAnswerPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "single_candidate" | "single-candidate" => Ok(Self::SingleCandidate),
            other => Err(ConfigError::Validation(format!(
                "unsupported auto answer policy `{other}` (expected disabled|single_candidate)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl DispatchConfig {
    pub fn threshold(&self) -> ThresholdPolicy {
        ThresholdPolicy::new(self.max_candidates, self.min_score)
    }
}

impl AnswersConfig {
    pub fn article_url(&self, article_id: &str) -> String {
        format!("{}{}{}", self.base_url.trim_end_matches('/'), self.article_path, article_id)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("faqbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(knowledge) = patch.knowledge {
            if let Some(runtime_url) = knowledge.runtime_url {
                self.knowledge.runtime_url = runtime_url;
            }
            if let Some(management_url) = knowledge.management_url {
                self.knowledge.management_url = management_url;
            }
            if let Some(knowledge_base_id) = knowledge.knowledge_base_id {
                self.knowledge.knowledge_base_id = knowledge_base_id;
            }
            if let Some(endpoint_key) = knowledge.endpoint_key {
                self.knowledge.endpoint_key = secret_value(endpoint_key);
            }
            if let Some(subscription_key) = knowledge.subscription_key {
                self.knowledge.subscription_key = secret_value(subscription_key);
            }
            if let Some(timeout_secs) = knowledge.timeout_secs {
                self.knowledge.timeout_secs = timeout_secs;
            }
            if let Some(publish_delay_ms) = knowledge.publish_delay_ms {
                self.knowledge.publish_delay_ms = publish_delay_ms;
            }
            if let Some(import_source) = knowledge.import_source {
                self.knowledge.import_source = import_source;
            }
            if let Some(query_test_index) = knowledge.query_test_index {
                self.knowledge.query_test_index = query_test_index;
            }
        }

        if let Some(answers) = patch.answers {
            if let Some(base_url) = answers.base_url {
                self.answers.base_url = base_url;
            }
            if let Some(article_path) = answers.article_path {
                self.answers.article_path = article_path;
            }
            if let Some(content_anchor) = answers.content_anchor {
                self.answers.content_anchor = content_anchor;
            }
            if let Some(support_url) = answers.support_url {
                self.answers.support_url = support_url;
            }
            if let Some(timeout_secs) = answers.timeout_secs {
                self.answers.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(moderation_conversation_id) = chat.moderation_conversation_id {
                self.chat.moderation_conversation_id = moderation_conversation_id;
            }
            if let Some(bot_user_id) = chat.bot_user_id {
                self.chat.bot_user_id = bot_user_id;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(max_candidates) = dispatch.max_candidates {
                self.dispatch.max_candidates = max_candidates;
            }
            if let Some(min_score) = dispatch.min_score {
                self.dispatch.min_score = min_score;
            }
            if let Some(auto_answer) = dispatch.auto_answer {
                self.dispatch.auto_answer = auto_answer;
            }
            if let Some(pending_ttl_secs) = dispatch.pending_ttl_secs {
                self.dispatch.pending_ttl_secs = pending_ttl_secs;
            }
            if let Some(sweep_interval_secs) = dispatch.sweep_interval_secs {
                self.dispatch.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_RUNTIME_URL") {
            self.knowledge.runtime_url = value;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_MANAGEMENT_URL") {
            self.knowledge.management_url = value;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_BASE_ID") {
            self.knowledge.knowledge_base_id = value;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_ENDPOINT_KEY") {
            self.knowledge.endpoint_key = secret_value(value);
        }
        let subscription_key = read_env("FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY")
            .or_else(|| read_env("QNA_SUBSCRIPTION"));
        if let Some(value) = subscription_key {
            self.knowledge.subscription_key = secret_value(value);
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_TIMEOUT_SECS") {
            self.knowledge.timeout_secs = parse_u64("FAQBOT_KNOWLEDGE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_PUBLISH_DELAY_MS") {
            self.knowledge.publish_delay_ms =
                parse_u64("FAQBOT_KNOWLEDGE_PUBLISH_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_IMPORT_SOURCE") {
            self.knowledge.import_source = value;
        }
        if let Some(value) = read_env("FAQBOT_KNOWLEDGE_QUERY_TEST_INDEX") {
            self.knowledge.query_test_index =
                parse_bool("FAQBOT_KNOWLEDGE_QUERY_TEST_INDEX", &value)?;
        }

        if let Some(value) = read_env("FAQBOT_ANSWERS_BASE_URL") {
            self.answers.base_url = value;
        }
        if let Some(value) = read_env("FAQBOT_ANSWERS_ARTICLE_PATH") {
            self.answers.article_path = value;
        }
        if let Some(value) = read_env("FAQBOT_ANSWERS_CONTENT_ANCHOR") {
            self.answers.content_anchor = value;
        }
        if let Some(value) = read_env("FAQBOT_ANSWERS_SUPPORT_URL") {
            self.answers.support_url = value;
        }
        if let Some(value) = read_env("FAQBOT_ANSWERS_TIMEOUT_SECS") {
            self.answers.timeout_secs = parse_u64("FAQBOT_ANSWERS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FAQBOT_CHAT_MODERATION_CONVERSATION_ID") {
            self.chat.moderation_conversation_id = value;
        }
        if let Some(value) = read_env("FAQBOT_CHAT_BOT_USER_ID") {
            self.chat.bot_user_id = value;
        }

        if let Some(value) = read_env("FAQBOT_DISPATCH_MAX_CANDIDATES") {
            self.dispatch.max_candidates = parse_usize("FAQBOT_DISPATCH_MAX_CANDIDATES", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_DISPATCH_MIN_SCORE") {
            self.dispatch.min_score = parse_f64("FAQBOT_DISPATCH_MIN_SCORE", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_DISPATCH_AUTO_ANSWER") {
            self.dispatch.auto_answer = value.parse()?;
        }
        if let Some(value) = read_env("FAQBOT_DISPATCH_PENDING_TTL_SECS") {
            self.dispatch.pending_ttl_secs =
                parse_u64("FAQBOT_DISPATCH_PENDING_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("FAQBOT_DISPATCH_SWEEP_INTERVAL_SECS") {
            self.dispatch.sweep_interval_secs =
                parse_u64("FAQBOT_DISPATCH_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("FAQBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = ["FAQBOT_SERVER_HEALTH_CHECK_PORT", "PORT"]
            .into_iter()
            .find_map(|key| read_env(key).map(|value| (key, value)));
        if let Some((key, value)) = port {
            self.server.health_check_port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("FAQBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FAQBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("FAQBOT_LOGGING_LEVEL").or_else(|| read_env("FAQBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FAQBOT_LOGGING_FORMAT").or_else(|| read_env("FAQBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(runtime_url) = overrides.knowledge_runtime_url {
            self.knowledge.runtime_url = runtime_url;
        }
        if let Some(management_url) = overrides.knowledge_management_url {
            self.knowledge.management_url = management_url;
        }
        if let Some(knowledge_base_id) = overrides.knowledge_base_id {
            self.knowledge.knowledge_base_id = knowledge_base_id;
        }
        if let Some(endpoint_key) = overrides.knowledge_endpoint_key {
            self.knowledge.endpoint_key = secret_value(endpoint_key);
        }
        if let Some(subscription_key) = overrides.knowledge_subscription_key {
            self.knowledge.subscription_key = secret_value(subscription_key);
        }
        if let Some(base_url) = overrides.answers_base_url {
            self.answers.base_url = base_url;
        }
        if let Some(moderation_conversation_id) = overrides.moderation_conversation_id {
            self.chat.moderation_conversation_id = moderation_conversation_id;
        }
        if let Some(bot_user_id) = overrides.bot_user_id {
            self.chat.bot_user_id = bot_user_id;
        }
        if let Some(auto_answer) = overrides.auto_answer {
            self.dispatch.auto_answer = auto_answer;
        }
        if let Some(min_score) = overrides.min_score {
            self.dispatch.min_score = min_score;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_knowledge(&self.knowledge)?;
        validate_answers(&self.answers)?;
        validate_chat(&self.chat)?;
        validate_dispatch(&self.dispatch)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("faqbot.toml"), PathBuf::from("config/faqbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    require_http_url("knowledge.runtime_url", &knowledge.runtime_url)?;
    require_http_url("knowledge.management_url", &knowledge.management_url)?;

    if knowledge.knowledge_base_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "knowledge.knowledge_base_id is required. Copy it from the knowledge base settings page"
                .to_string(),
        ));
    }
    if knowledge.endpoint_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "knowledge.endpoint_key is required to query the published knowledge base".to_string(),
        ));
    }
    if knowledge.subscription_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "knowledge.subscription_key is required to download, teach and publish".to_string(),
        ));
    }
    if knowledge.timeout_secs == 0 || knowledge.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "knowledge.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if knowledge.import_source.trim().is_empty() {
        return Err(ConfigError::Validation(
            "knowledge.import_source must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_answers(answers: &AnswersConfig) -> Result<(), ConfigError> {
    require_http_url("answers.base_url", &answers.base_url)?;
    require_http_url("answers.support_url", &answers.support_url)?;

    if answers.content_anchor.trim().is_empty() {
        return Err(ConfigError::Validation(
            "answers.content_anchor must be a CSS selector".to_string(),
        ));
    }
    if answers.timeout_secs == 0 || answers.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "answers.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.moderation_conversation_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.moderation_conversation_id is required so unanswered questions can be escalated"
                .to_string(),
        ));
    }
    if chat.bot_user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_user_id is required to skip the bot's own messages and detect mentions"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.max_candidates == 0 || dispatch.max_candidates > 10 {
        return Err(ConfigError::Validation(
            "dispatch.max_candidates must be in range 1..=10".to_string(),
        ));
    }
    if !(0.0..100.0).contains(&dispatch.min_score) {
        return Err(ConfigError::Validation(
            "dispatch.min_score must be in range 0..100".to_string(),
        ));
    }
    if dispatch.pending_ttl_secs < 60 {
        return Err(ConfigError::Validation(
            "dispatch.pending_ttl_secs must be at least 60".to_string(),
        ));
    }
    if dispatch.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "dispatch.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    knowledge: Option<KnowledgePatch>,
    answers: Option<AnswersPatch>,
    chat: Option<ChatPatch>,
    dispatch: Option<DispatchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    runtime_url: Option<String>,
    management_url: Option<String>,
    knowledge_base_id: Option<String>,
    endpoint_key: Option<String>,
    subscription_key: Option<String>,
    timeout_secs: Option<u64>,
    publish_delay_ms: Option<u64>,
    import_source: Option<String>,
    query_test_index: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AnswersPatch {
    base_url: Option<String>,
    article_path: Option<String>,
    content_anchor: Option<String>,
    support_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    moderation_conversation_id: Option<String>,
    bot_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    max_candidates: Option<usize>,
    min_score: Option<f64>,
    auto_answer: Option<AutoAnswerPolicy>,
    pending_ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, AutoAnswerPolicy, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: [(&str, &str); 5] = [
        ("FAQBOT_KNOWLEDGE_BASE_ID", "kb-test"),
        ("FAQBOT_KNOWLEDGE_ENDPOINT_KEY", "endpoint-test"),
        ("FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY", "subscription-test"),
        ("FAQBOT_CHAT_MODERATION_CONVERSATION_ID", "conv-moderators"),
        ("FAQBOT_CHAT_BOT_USER_ID", "bot-user"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required_vars() {
        let keys: Vec<&str> = REQUIRED_VARS.iter().map(|(key, _)| *key).collect();
        clear_vars(&keys);
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_FAQBOT_ENDPOINT_KEY", "endpoint-from-env");
        env::set_var("TEST_FAQBOT_SUBSCRIPTION_KEY", "subscription-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("faqbot.toml");
            fs::write(
                &path,
                r#"
[knowledge]
knowledge_base_id = "kb-file"
endpoint_key = "${TEST_FAQBOT_ENDPOINT_KEY}"
subscription_key = "${TEST_FAQBOT_SUBSCRIPTION_KEY}"

[chat]
moderation_conversation_id = "conv-moderators"
bot_user_id = "bot-user"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.knowledge.endpoint_key.expose_secret() == "endpoint-from-env",
                "endpoint key should be loaded from environment",
            )?;
            ensure(
                config.knowledge.subscription_key.expose_secret() == "subscription-from-env",
                "subscription key should be loaded from environment",
            )?;
            ensure(config.knowledge.knowledge_base_id == "kb-file", "kb id should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_FAQBOT_ENDPOINT_KEY", "TEST_FAQBOT_SUBSCRIPTION_KEY"]);
        result
    }

    #[test]
    fn logging_and_port_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("FAQBOT_LOG_LEVEL", "warn");
        env::set_var("FAQBOT_LOG_FORMAT", "pretty");
        env::set_var("PORT", "8088");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            ensure(config.server.health_check_port == 8088, "PORT should set the health port")?;
            Ok(())
        })();

        clear_required_vars();
        clear_vars(&["FAQBOT_LOG_LEVEL", "FAQBOT_LOG_FORMAT", "PORT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FAQBOT_KNOWLEDGE_BASE_ID", "kb-from-env");
        env::set_var("FAQBOT_DISPATCH_AUTO_ANSWER", "single_candidate");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("faqbot.toml");
            fs::write(
                &path,
                r#"
[knowledge]
knowledge_base_id = "kb-from-file"
endpoint_key = "endpoint-from-file"
subscription_key = "subscription-from-file"

[chat]
moderation_conversation_id = "conv-from-file"
bot_user_id = "bot-from-file"

[dispatch]
min_score = 45.0

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    moderation_conversation_id: Some("conv-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.chat.moderation_conversation_id == "conv-from-override",
                "override moderation conversation should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.knowledge.knowledge_base_id == "kb-from-env",
                "env knowledge base id should win over file and defaults",
            )?;
            ensure(
                config.dispatch.auto_answer == AutoAnswerPolicy::SingleCandidate,
                "env auto answer policy should be applied",
            )?;
            ensure(config.dispatch.min_score == 45.0, "file min score should be applied")?;
            ensure(config.dispatch.max_candidates == 3, "default max candidates should stay 3")?;
            Ok(())
        })();

        clear_vars(&["FAQBOT_KNOWLEDGE_BASE_ID", "FAQBOT_DISPATCH_AUTO_ANSWER"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::remove_var("FAQBOT_CHAT_MODERATION_CONVERSATION_ID");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("chat.moderation_conversation_id")
            );
            ensure(has_message, "validation failure should mention the moderation conversation")
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn invalid_numeric_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("FAQBOT_DISPATCH_MIN_SCORE", "thirty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid override failure".to_string()),
                Err(error) => error,
            };
            let names_key = matches!(
                error,
                ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "FAQBOT_DISPATCH_MIN_SCORE"
            );
            ensure(names_key, "error should name the offending variable")
        })();

        clear_required_vars();
        clear_vars(&["FAQBOT_DISPATCH_MIN_SCORE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("FAQBOT_KNOWLEDGE_ENDPOINT_KEY", "endpoint-secret-value");
        env::set_var("FAQBOT_KNOWLEDGE_SUBSCRIPTION_KEY", "subscription-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("endpoint-secret-value"),
                "debug output should not contain the endpoint key",
            )?;
            ensure(
                !debug.contains("subscription-secret-value"),
                "debug output should not contain the subscription key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_required_vars();
        result
    }

    #[test]
    fn article_url_joins_base_and_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.answers.article_url("104233"),
            "https://www.circuit.com/unifyportalfaqdetail?articleId=104233"
        );
    }
}
