pub mod security {
    use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
    use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
    use serde::{de::DeserializeOwned, Serialize};

    use crate::domain::datatype::security::{
        PasswordHash, PasswordHashError, TokenEncryptionError, TokenIssuer, TokenPayload,
    };
    use crate::domain::service::{PasswordHashService, TokenEncryptionService};

    pub struct Argon2HashService(Argon2<'static>);

    impl Argon2HashService {
        pub fn new() -> Self {
            Self::with_cost(
                Params::DEFAULT_M_COST,
                Params::DEFAULT_T_COST,
                Params::DEFAULT_P_COST,
            )
        }

        /// Argon2id with explicit memory, iteration and parallelism costs.
        pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Self {
            Self(Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                Params::new(m_cost, t_cost, p_cost, Some(Params::DEFAULT_OUTPUT_LEN))
                    .expect("Expect valid Argon2 params"),
            ))
        }
    }

    impl Default for Argon2HashService {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PasswordHashService for Argon2HashService {
        fn hash_password(&self, pwd: &str) -> Result<PasswordHash, PasswordHashError> {
            let salt = password_hash::SaltString::generate(&mut rand_core::OsRng);
            let hash = self.0.hash_password(pwd.as_bytes(), &salt)?;

            hash.to_string()
                .parse()
                .map_err(|_| PasswordHashError::InvalidPasswordHash)
        }

        fn verify_password(&self, pwd: &str, hash: &PasswordHash) -> Result<(), PasswordHashError> {
            let hash = password_hash::PasswordHash::new(hash.as_str())?;
            self.0.verify_password(pwd.as_bytes(), &hash)?;
            Ok(())
        }
    }

    pub struct JWTEncryptionService {
        header: Header,
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        validation: Validation,
    }

    impl JWTEncryptionService {
        pub fn new(secret: String) -> Self {
            let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
            validation.set_required_spec_claims(&["exp", "iss", "sub"]);
            validation.set_issuer(&[TokenIssuer::as_str()]);
            validation.leeway = 60;
            validation.validate_exp = true;
            validation.validate_nbf = false;

            Self {
                encoding_key: EncodingKey::from_secret(secret.as_ref()),
                decoding_key: DecodingKey::from_secret(secret.as_ref()),
                header: Header::new(jsonwebtoken::Algorithm::HS256),
                validation,
            }
        }
    }

    impl TokenEncryptionService for JWTEncryptionService {
        fn issue_token<T>(&self, payload: &TokenPayload<T>) -> Result<String, TokenEncryptionError>
        where
            T: Serialize,
        {
            let token = jsonwebtoken::encode(&self.header, payload, &self.encoding_key)?;
            Ok(token)
        }

        fn verify_token<T>(&self, token: &str) -> Result<TokenPayload<T>, TokenEncryptionError>
        where
            T: DeserializeOwned,
        {
            let token_data = jsonwebtoken::decode::<TokenPayload<T>>(
                token,
                &self.decoding_key,
                &self.validation,
            )?;
            Ok(token_data.claims)
        }
    }

}

pub mod mail {
    use async_trait::async_trait;
    use lettre::{
        message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
        AsyncTransport, Message, Tokio1Executor,
    };

    use crate::{
        config::env_var::MailConfig,
        domain::service::{MailMessage, MailService},
        error::{BoxedError, UnknownError},
    };

    /// Delivers messages through an SMTP relay with STARTTLS.
    pub struct SmtpMailService {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpMailService {
        pub fn new(host: &str, config: &MailConfig) -> Result<Self, UnknownError> {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|err| UnknownError::new(Box::new(err)))?
                .port(config.port);
            if let (Some(user), Some(password)) = (&config.user, &config.password) {
                builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
            }

            Ok(Self {
                transport: builder.build(),
                from: parse_mailbox(&config.from)?,
            })
        }
    }

    fn parse_mailbox(address: &str) -> Result<Mailbox, UnknownError> {
        address
            .parse()
            .map_err(|err: lettre::address::AddressError| UnknownError::new(Box::new(err)))
    }

    #[async_trait]
    impl MailService for SmtpMailService {
        async fn send(&self, message: MailMessage) -> Result<(), UnknownError> {
            let email = Message::builder()
                .from(self.from.clone())
                .to(parse_mailbox(&message.to)?)
                .subject(message.subject)
                .body(message.body)
                .map_err(|err| UnknownError::new(Box::new(err)))?;

            self.transport
                .send(email)
                .await
                .map_err(|err| UnknownError::new(BoxedError::from(err)))?;
            Ok(())
        }
    }

    /// Writes messages to the log instead of sending them, used without an SMTP relay.
    pub struct LogMailService;

    #[async_trait]
    impl MailService for LogMailService {
        async fn send(&self, message: MailMessage) -> Result<(), UnknownError> {
            tracing::info!(
                to = message.to.as_str(),
                subject = message.subject.as_str(),
                "mail delivery disabled, message body:\n{}",
                message.body
            );
            Ok(())
        }
    }

    /// Mail service selected from configuration.
    pub enum Mailer {
        Smtp(SmtpMailService),
        Log(LogMailService),
    }

    impl Mailer {
        pub fn from_config(config: &MailConfig) -> Result<Self, UnknownError> {
            match &config.host {
                Some(host) => Ok(Self::Smtp(SmtpMailService::new(host, config)?)),
                None => {
                    tracing::warn!("EMAIL_HOST not set, outgoing mail is only logged");
                    Ok(Self::Log(LogMailService))
                }
            }
        }
    }

    #[async_trait]
    impl MailService for Mailer {
        async fn send(&self, message: MailMessage) -> Result<(), UnknownError> {
            match self {
                Self::Smtp(service) => service.send(message).await,
                Self::Log(service) => service.send(message).await,
            }
        }
    }
}
