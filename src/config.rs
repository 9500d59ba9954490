pub mod env_var {
    use chrono::Duration;
    use url::Url;

    use crate::error::config::ConfigError;

    #[derive(Debug, Clone)]
    pub struct MailConfig {
        /// SMTP relay; messages are only logged when absent.
        pub host: Option<String>,
        pub port: u16,
        pub user: Option<String>,
        pub password: Option<String>,
        pub from: String,
    }

    #[derive(Debug, Clone)]
    pub struct EnvVar {
        pub port: u16,
        pub database_url: String,
        pub database_max_connections: u32,
        pub secret_key: String,
        pub jwt_secret_key: String,
        pub access_token_lifetime: Duration,
        pub refresh_token_lifetime: Duration,
        pub password_reset_timeout: Duration,
        pub cors_allow_all_origins: bool,
        pub cors_allowed_origins: Vec<String>,
        pub mail: MailConfig,
        pub frontend_url: Url,
    }

    macro_rules! get_env {
        ($lookup:ident, $env:literal) => {
            $lookup($env).ok_or(ConfigError::Missing($env))
        };
        ($lookup:ident, $env:literal, $default:expr) => {
            $lookup($env).unwrap_or_else(|| $default.to_string())
        };
    }

    macro_rules! parse_env {
        ($lookup:ident, $env:literal, $default:expr) => {
            match $lookup($env) {
                None => Ok($default),
                Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: $env,
                    value,
                }),
            }
        };
    }

    /// `scheme://host[:port]`, as sent in the `Origin` header.
    fn parse_origin(origin: &str) -> Result<String, ConfigError> {
        let invalid = || ConfigError::Invalid {
            var: "CORS_ALLOWED_ORIGINS",
            value: origin.to_string(),
        };
        let url = Url::parse(origin).map_err(|_| invalid())?;
        if !url.has_host() || url.path() != "/" || url.query().is_some() {
            return Err(invalid());
        }
        Ok(url.origin().ascii_serialization())
    }

    impl EnvVar {
        pub fn from_env() -> Result<Self, ConfigError> {
            Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        }

        pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where
            F: Fn(&str) -> Option<String>,
        {
            let port: u16 = parse_env!(lookup, "PORT", 8000)?;
            let database_url = get_env!(lookup, "DATABASE_URL")?;
            let database_max_connections: u32 =
                parse_env!(lookup, "DATABASE_MAX_CONNECTIONS", 5)?;

            let secret_key = get_env!(lookup, "SECRET_KEY")?;
            let jwt_secret_key = get_env!(lookup, "JWT_SECRET_KEY", secret_key);

            let access_minutes: i64 = parse_env!(lookup, "JWT_ACCESS_TOKEN_LIFETIME_MINUTES", 5)?;
            let refresh_days: i64 = parse_env!(lookup, "JWT_REFRESH_TOKEN_LIFETIME_DAYS", 1)?;
            let reset_minutes: i64 = parse_env!(lookup, "PASSWORD_RESET_TIMEOUT_MINUTES", 60)?;

            let cors_allow_all_origins: bool = parse_env!(lookup, "CORS_ALLOW_ALL_ORIGINS", false)?;
            let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(parse_origin)
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();

            let mail = MailConfig {
                host: lookup("EMAIL_HOST"),
                port: parse_env!(lookup, "EMAIL_PORT", 587)?,
                user: lookup("EMAIL_HOST_USER"),
                password: lookup("EMAIL_HOST_PASSWORD"),
                from: get_env!(lookup, "DEFAULT_FROM_EMAIL", "webmaster@localhost"),
            };

            let frontend_url = get_env!(lookup, "FRONTEND_URL", "http://localhost:3000");
            let frontend_url = Url::parse(&frontend_url).map_err(|_| ConfigError::Invalid {
                var: "FRONTEND_URL",
                value: frontend_url,
            })?;

            if access_minutes <= 0 || refresh_days <= 0 || reset_minutes <= 0 {
                return Err(ConfigError::Invalid {
                    var: "JWT_ACCESS_TOKEN_LIFETIME_MINUTES",
                    value: format!("{access_minutes}/{refresh_days}/{reset_minutes}"),
                });
            }

            Ok(EnvVar {
                port,
                database_url,
                database_max_connections,
                secret_key,
                jwt_secret_key,
                access_token_lifetime: Duration::minutes(access_minutes),
                refresh_token_lifetime: Duration::days(refresh_days),
                password_reset_timeout: Duration::minutes(reset_minutes),
                cors_allow_all_origins,
                cors_allowed_origins,
                mail,
                frontend_url,
            })
        }
    }

}
