use crate::capture::{DeviceConstraints, RecorderSettings};
use crate::report::AnswerType;
use crate::upload::MediaType;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MEDIA_TYPE: &str = "video";
pub const DEFAULT_ANSWER_TYPE: &str = "basic";
pub const ENV_API_BASE_URL: &str = "ANSWER_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "ANSWER_API_TOKEN";
pub const ENV_USER_ID: &str = "ANSWER_USER_ID";

/// Bearer token for the answers/emotions endpoints.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiToken);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(**redacted**)")
    }
}

/// Which prompt is being answered and for whom.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerTarget {
    pub question_id: u64,
    pub user_id: u64,
    pub media_type: MediaType,
    pub answer_type: AnswerType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Base URL of the answers/emotions backend; without one the results
    /// stay local.
    pub api_base_url: Option<String>,
    pub api_token: Option<ApiToken>,
    pub target: AnswerTarget,
    pub constraints: DeviceConstraints,
    pub recorder: RecorderSettings,
    pub frame_interval_ms: u64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api token must not be empty")]
    EmptyApiToken,

    #[error("unknown media type: {0} (expected video, audio or image)")]
    UnknownMediaType(String),

    #[error("unknown answer type: {0} (expected basic, personal, cognitive-audio or cognitive-image)")]
    UnknownAnswerType(String),

    #[error("frame interval must be > 0 ms")]
    ZeroFrameInterval,
}

pub fn parse_media_type(value: &str) -> Result<MediaType, ConfigError> {
    MediaType::parse(value).ok_or_else(|| ConfigError::UnknownMediaType(value.to_owned()))
}

pub fn parse_answer_type(value: &str) -> Result<AnswerType, ConfigError> {
    AnswerType::parse(value).ok_or_else(|| ConfigError::UnknownAnswerType(value.to_owned()))
}

pub fn parse_frame_interval_ms(value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroFrameInterval);
    }
    Ok(value)
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_token(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiToken>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiToken::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiToken::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}
