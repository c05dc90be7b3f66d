use crate::events::EventMap;

/// Immutable runtime configuration, built once at startup and passed
/// explicitly into the handlers through shared state.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared secret expected in the `secret` query parameter of the
    /// webhook endpoint. When unset, the webhook accepts any caller.
    pub webhook_secret: Option<String>,
    pub meta_access_token: String,
    pub meta_pixel_id: String,
    pub meta_base_url: String,
    pub min_lead_score: i64,
    pub max_event_age_days: i64,
    pub currency: String,
    /// Status label -> conversion event mapping.
    pub event_map: EventMap,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            meta_access_token: std::env::var("META_ACCESS_TOKEN")
                .map_err(|_| anyhow::anyhow!("META_ACCESS_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("META_ACCESS_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            meta_pixel_id: std::env::var("META_PIXEL_ID")
                .map_err(|_| anyhow::anyhow!("META_PIXEL_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("META_PIXEL_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            meta_base_url: std::env::var("META_BASE_URL")
                .unwrap_or_else(|_| "https://graph.facebook.com/v19.0".to_string())
                .trim_end_matches('/')
                .to_string(),
            min_lead_score: std::env::var("MIN_LEAD_SCORE")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MIN_LEAD_SCORE must be an integer"))?,
            max_event_age_days: std::env::var("MAX_EVENT_AGE_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_EVENT_AGE_DAYS must be an integer"))?,
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "MXN".to_string()),
            event_map: match std::env::var("EVENT_MAPPING") {
                Ok(json) if !json.trim().is_empty() => EventMap::from_json(&json)
                    .map_err(|e| anyhow::anyhow!("EVENT_MAPPING is not valid JSON: {}", e))?,
                _ => EventMap::default(),
            },
        };

        if !config.meta_base_url.starts_with("http://")
            && !config.meta_base_url.starts_with("https://")
        {
            anyhow::bail!("META_BASE_URL must start with http:// or https://");
        }
        if config.max_event_age_days < 0 {
            anyhow::bail!("MAX_EVENT_AGE_DAYS cannot be negative");
        }
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set; webhook endpoint accepts any caller");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Meta Base URL: {}", config.meta_base_url);
        tracing::debug!(
            "Filters: min_lead_score={}, max_event_age_days={}",
            config.min_lead_score,
            config.max_event_age_days
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
