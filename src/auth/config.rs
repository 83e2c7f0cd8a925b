use std::fmt;
use std::str::FromStr;

use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub access_secret: String,
    pub refresh_secret: String,
    /// Production default is 15 minutes; development setups have used 15 seconds.
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub session_purge_interval_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer = std::env::var("BOARD_JWT_ISSUER").unwrap_or_else(|_| "board-api".into());
        let access_secret = std::env::var("BOARD_ACCESS_SECRET")
            .map_err(|_| AuthError::Config("BOARD_ACCESS_SECRET is required".into()))?;
        let refresh_secret = std::env::var("BOARD_REFRESH_SECRET")
            .map_err(|_| AuthError::Config("BOARD_REFRESH_SECRET is required".into()))?;
        let access_token_ttl_secs = env_setting("BOARD_ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_token_ttl_secs =
            env_setting("BOARD_REFRESH_TOKEN_TTL_SECS", 3 * 24 * 60 * 60)?;
        let session_purge_interval_secs =
            env_setting("BOARD_SESSION_PURGE_INTERVAL_SECS", 60 * 60)?;

        let config = Self {
            issuer,
            access_secret,
            refresh_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            session_purge_interval_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(AuthError::Config("signing secrets must not be empty".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Config(
                "access and refresh secrets must differ".into(),
            ));
        }
        if self.access_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            return Err(AuthError::Config("token TTLs must be positive".into()));
        }
        if self.refresh_token_ttl_secs <= self.access_token_ttl_secs {
            return Err(AuthError::Config(
                "refresh token TTL must exceed access token TTL".into(),
            ));
        }
        Ok(())
    }
}

fn env_setting<T>(name: &str, default: T) -> AuthResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_setting(name, std::env::var(name).ok(), default)
}

/// An unset variable falls back to `default`; a set but unparseable one is an error.
fn parse_setting<T>(name: &str, raw: Option<String>, default: T) -> AuthResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err| AuthError::Config(format!("{name}={value:?} is invalid: {err}"))),
    }
}

/// Administrator created at startup when no account with its id exists yet.
///
/// Read from `BOARD_BOOTSTRAP_ADMIN_ID`, `BOARD_BOOTSTRAP_ADMIN_PASSWORD` and
/// `BOARD_BOOTSTRAP_ADMIN_NAME`.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub id: String,
    pub password: String,
    pub name: String,
}

impl BootstrapAdmin {
    pub fn from_env() -> AuthResult<Option<Self>> {
        Self::from_values(
            std::env::var("BOARD_BOOTSTRAP_ADMIN_ID").ok(),
            std::env::var("BOARD_BOOTSTRAP_ADMIN_PASSWORD").ok(),
            std::env::var("BOARD_BOOTSTRAP_ADMIN_NAME").ok(),
        )
    }

    fn from_values(
        id: Option<String>,
        password: Option<String>,
        name: Option<String>,
    ) -> AuthResult<Option<Self>> {
        let Some(id) = id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        let password = password.filter(|pw| !pw.is_empty()).ok_or_else(|| {
            AuthError::Config(
                "BOARD_BOOTSTRAP_ADMIN_PASSWORD is required with BOARD_BOOTSTRAP_ADMIN_ID".into(),
            )
        })?;
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Administrator".into());

        Ok(Some(Self { id, password, name }))
    }
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("session_purge_interval_secs", &self.session_purge_interval_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            issuer: "board-test".into(),
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 259200,
            session_purge_interval_secs: 3600,
        }
    }

    #[test]
    fn rejects_shared_secret() {
        let mut config = config();
        config.refresh_secret = config.access_secret.clone();
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }

    #[test]
    fn rejects_refresh_ttl_not_longer_than_access() {
        let mut config = config();
        config.refresh_token_ttl_secs = config.access_token_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn unset_settings_fall_back_to_defaults() {
        assert_eq!(
            parse_setting::<i64>("BOARD_ACCESS_TOKEN_TTL_SECS", None, 900).unwrap(),
            900
        );
        assert_eq!(
            parse_setting::<i64>("BOARD_ACCESS_TOKEN_TTL_SECS", Some(" 30 ".into()), 900).unwrap(),
            30
        );
    }

    #[test]
    fn unparseable_settings_are_config_errors() {
        let err = parse_setting::<i64>("BOARD_ACCESS_TOKEN_TTL_SECS", Some("15m".into()), 900)
            .expect_err("not a number");
        match err {
            AuthError::Config(message) => {
                assert!(message.contains("BOARD_ACCESS_TOKEN_TTL_SECS"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            parse_setting::<u64>("BOARD_SESSION_PURGE_INTERVAL_SECS", Some("-1".into()), 3600),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn bootstrap_admin_is_optional_but_needs_a_password() {
        assert!(BootstrapAdmin::from_values(None, None, None).unwrap().is_none());
        assert!(
            BootstrapAdmin::from_values(Some("  ".into()), None, None)
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            BootstrapAdmin::from_values(Some("rootadmin".into()), None, None),
            Err(AuthError::Config(_))
        ));

        let admin = BootstrapAdmin::from_values(
            Some("rootadmin".into()),
            Some("@@Test123456".into()),
            None,
        )
        .unwrap()
        .expect("bootstrap admin");
        assert_eq!(admin.id, "rootadmin");
        assert_eq!(admin.name, "Administrator");
        assert!(!format!("{admin:?}").contains("@@Test123456"));
    }
}
