use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub store_path: PathBuf,
    pub app_id: Option<String>,
    pub source_base_url: String,
    pub source_request_timeout_secs: u64,
    pub source_user_agent: String,
    pub source_page_size: usize,
    pub source_inter_request_delay_ms: u64,
    pub source_max_pages: usize,
    pub classifier_url: Option<String>,
    pub keyword_url: Option<String>,
    pub narrator_url: Option<String>,
    pub collaborator_api_key: Option<String>,
    pub collaborator_timeout_secs: u64,
    pub collaborator_max_retries: u32,
    pub classify_batch_size: usize,
    pub keyword_batch_size: usize,
    pub keyword_max_concurrency: usize,
    pub stage_timeout_secs: u64,
    pub risk_weight_confirmed: f64,
    pub risk_weight_complaint: f64,
    pub top_keywords: usize,
    pub keyword_stopwords: Vec<String>,
    pub narrative_max_evidence: usize,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("store_path", &self.store_path)
            .field("app_id", &self.app_id)
            .field("source_base_url", &self.source_base_url)
            .field(
                "source_request_timeout_secs",
                &self.source_request_timeout_secs,
            )
            .field("source_user_agent", &self.source_user_agent)
            .field("source_page_size", &self.source_page_size)
            .field(
                "source_inter_request_delay_ms",
                &self.source_inter_request_delay_ms,
            )
            .field("source_max_pages", &self.source_max_pages)
            .field("classifier_url", &self.classifier_url)
            .field("keyword_url", &self.keyword_url)
            .field("narrator_url", &self.narrator_url)
            .field(
                "collaborator_api_key",
                &self.collaborator_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("collaborator_timeout_secs", &self.collaborator_timeout_secs)
            .field("collaborator_max_retries", &self.collaborator_max_retries)
            .field("classify_batch_size", &self.classify_batch_size)
            .field("keyword_batch_size", &self.keyword_batch_size)
            .field("keyword_max_concurrency", &self.keyword_max_concurrency)
            .field("stage_timeout_secs", &self.stage_timeout_secs)
            .field("risk_weight_confirmed", &self.risk_weight_confirmed)
            .field("risk_weight_complaint", &self.risk_weight_complaint)
            .field("top_keywords", &self.top_keywords)
            .field("keyword_stopwords", &self.keyword_stopwords)
            .field("narrative_max_evidence", &self.narrative_max_evidence)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
