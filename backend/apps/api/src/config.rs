//! Server Configuration
//!
//! Everything is read from the environment once at startup; `.env` is
//! loaded by `main` before this runs.

use std::time::Duration;

use anyhow::{Context, bail};
use auth::{AuthConfig, SmtpConfig};
use platform::client::TrustedProxies;
use platform::rate_limit::RateLimitConfig;

/// Minimum length of a JWT signing secret
const MIN_SECRET_LENGTH: usize = 20;

/// Upper bound for any configured lifetime
const MAX_DURATION: Duration = Duration::from_secs(365 * 86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read before the rest of the configuration so that it can be logged
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    /// Prefix of the REST routes, e.g. `/api/v1`
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Reverse proxies whose `X-Forwarded-For` entries are believed
    pub trusted_proxies: TrustedProxies,
    pub auth: AuthConfig,
    /// `None` when SMTP is not configured; emails are then only logged
    pub smtp: Option<SmtpConfig>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;

        let port = match get("PORT") {
            Some(port) => port.parse().with_context(|| format!("invalid PORT: {port}"))?,
            None => 5000,
        };

        let api_prefix = normalize_prefix(&get("API_PREFIX").unwrap_or_else(|| "/api/v1".into()));

        let cors_origins = get("CORS_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let rate_limit = RateLimitConfig::new(
            parse_or(get("RATE_LIMIT_MAX"), 100, "RATE_LIMIT_MAX")?,
            Duration::from_secs(60 * parse_or(get("RATE_LIMIT_WINDOW"), 15, "RATE_LIMIT_WINDOW")?),
        );

        let trusted_proxies = parse_trust_proxy(get("TRUST_PROXY"))?;

        let auth = auth_config(&get)?;

        let smtp = match (get("EMAIL_HOST"), get("FROM_EMAIL")) {
            (Some(host), Some(from)) => Some(SmtpConfig {
                host,
                port: parse_or(get("EMAIL_PORT"), 587, "EMAIL_PORT")?,
                user: get("EMAIL_USER"),
                password: get("EMAIL_PASS"),
                from,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            port,
            api_prefix,
            cors_origins,
            rate_limit,
            trusted_proxies,
            auth,
            smtp,
        })
    }
}

fn auth_config(get: &impl Fn(&str) -> Option<String>) -> anyhow::Result<AuthConfig> {
    let defaults = AuthConfig::default();

    let (access_secret, refresh_secret) =
        match (get("JWT_ACCESS_SECRET"), get("JWT_REFRESH_SECRET")) {
            (Some(access), Some(refresh)) => (access, refresh),
            _ if cfg!(debug_assertions) => {
                tracing::warn!("JWT secrets not set, using random ones; tokens will not survive a restart");
                let random = AuthConfig::with_random_secrets();
                (random.access_secret, random.refresh_secret)
            }
            _ => bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be set"),
        };
    validate_secrets(&access_secret, &refresh_secret)?;

    let access_ttl = match get("JWT_ACCESS_EXPIRE") {
        Some(raw) => parse_duration(&raw).context("invalid JWT_ACCESS_EXPIRE")?,
        None => defaults.access_ttl,
    };
    let refresh_ttl = match get("JWT_REFRESH_EXPIRE") {
        Some(raw) => parse_duration(&raw).context("invalid JWT_REFRESH_EXPIRE")?,
        None => defaults.refresh_ttl,
    };

    let cookie_secure = match get("COOKIE_SECURE").as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(other) => bail!("invalid COOKIE_SECURE: {other}"),
        None => !cfg!(debug_assertions),
    };

    Ok(AuthConfig {
        access_secret,
        refresh_secret,
        access_ttl,
        refresh_ttl,
        cookie_secure,
        store_timeout: Duration::from_millis(parse_or(
            get("STORE_TIMEOUT_MS"),
            5000,
            "STORE_TIMEOUT_MS",
        )?),
        email_timeout: Duration::from_millis(parse_or(
            get("EMAIL_TIMEOUT_MS"),
            10_000,
            "EMAIL_TIMEOUT_MS",
        )?),
        password_pepper: get("PASSWORD_PEPPER").map(String::into_bytes),
        frontend_url: get("FRONTEND_URL").unwrap_or(defaults.frontend_url.clone()),
        ..defaults
    })
}

fn validate_secrets(access: &str, refresh: &str) -> anyhow::Result<()> {
    if access.chars().count() < MIN_SECRET_LENGTH || refresh.chars().count() < MIN_SECRET_LENGTH {
        bail!("JWT secrets must be at least {MIN_SECRET_LENGTH} characters");
    }
    if access == refresh {
        bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
    }
    Ok(())
}

/// `TRUST_PROXY`: unset or `false` trusts nobody, `true` one proxy, or a hop count
fn parse_trust_proxy(raw: Option<String>) -> anyhow::Result<TrustedProxies> {
    match raw.as_deref() {
        None | Some("false") => Ok(TrustedProxies(0)),
        Some("true") => Ok(TrustedProxies(1)),
        Some(hops) => hops
            .parse()
            .map(TrustedProxies)
            .with_context(|| format!("invalid TRUST_PROXY: {hops}")),
    }
}

/// `30s`, `15m`, `12h`, `7d`; a bare number is seconds. At most 365 days.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => raw.split_at(i),
        None => (raw, "s"),
    };

    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration: {raw}"))?;
    let seconds = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => bail!("unknown duration unit {other:?} in {raw}"),
    };

    if value == 0 {
        bail!("duration must be positive: {raw}");
    }
    let duration = value
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .filter(|d| *d <= MAX_DURATION)
        .with_context(|| format!("duration exceeds 365 days: {raw}"))?;
    Ok(duration)
}

fn parse_or<T>(raw: Option<String>, default: T, key: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ACCESS: &str = "access-secret-0123456789";
    const REFRESH: &str = "refresh-secret-0123456789";

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_ACCESS_SECRET", ACCESS),
            ("JWT_REFRESH_SECRET", REFRESH),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = config(&base()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(15 * 60));
        assert_eq!(config.auth.access_ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.auth.refresh_ttl, Duration::from_secs(7 * 86_400));
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = base();
        pairs.extend([
            ("PORT", "8080"),
            ("API_PREFIX", "api/v2/"),
            ("CORS_ORIGIN", "https://a.example, https://b.example"),
            ("JWT_ACCESS_EXPIRE", "5m"),
            ("EMAIL_HOST", "smtp.example.com"),
            ("FROM_EMAIL", "noreply@example.com"),
        ]);
        let config = config(&pairs).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.api_prefix, "/api/v2");
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.auth.access_ttl, Duration::from_secs(300));
        assert_eq!(config.smtp.unwrap().port, 587);
    }

    #[test]
    fn test_log_format() {
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }

    #[test]
    fn test_secret_validation() {
        assert!(config(&[("JWT_ACCESS_SECRET", ACCESS)]).is_err());

        let short = [
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_ACCESS_SECRET", "short"),
            ("JWT_REFRESH_SECRET", REFRESH),
        ];
        assert!(config(&short).is_err());

        let same = [
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_ACCESS_SECRET", ACCESS),
            ("JWT_REFRESH_SECRET", ACCESS),
        ];
        assert!(config(&same).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("7w").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_parse_duration_upper_bound() {
        assert_eq!(parse_duration("365d").unwrap(), MAX_DURATION);
        assert!(parse_duration("366d").is_err());
        assert!(parse_duration("300000000000000000d").is_err());
        assert!(parse_duration("18446744073709551615").is_err());

        let mut pairs = base();
        pairs.push(("JWT_REFRESH_EXPIRE", "100000000000d"));
        assert!(config(&pairs).is_err());
    }

    #[test]
    fn test_trust_proxy() {
        assert_eq!(config(&base()).unwrap().trusted_proxies, TrustedProxies(0));

        for (raw, hops) in [("false", 0), ("true", 1), ("2", 2)] {
            let mut pairs = base();
            pairs.push(("TRUST_PROXY", raw));
            assert_eq!(config(&pairs).unwrap().trusted_proxies, TrustedProxies(hops));
        }

        let mut pairs = base();
        pairs.push(("TRUST_PROXY", "sometimes"));
        assert!(config(&pairs).is_err());
    }
}
