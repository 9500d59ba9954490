use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use places_backend::{
    app::{resource::iam::CreateUser, use_case},
    config::env_var::EnvVar,
    error::BoxedError,
    infra::{
        database::{connection, user::PgUserRepository},
        service::security::Argon2HashService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Development,
    Production,
}

/// Seeds the database with initial user data.
#[derive(Debug, Parser)]
#[command(name = "seed_users")]
struct Args {
    #[arg(long, value_enum, default_value_t = Mode::Development)]
    mode: Mode,

    /// Number of generated users, development mode only.
    #[arg(long, default_value_t = 10)]
    count: usize,
}

fn seed_user(
    username: &str,
    email: &str,
    password: &str,
    name: (&str, &str),
    is_admin: bool,
) -> CreateUser {
    CreateUser {
        username: Some(username.into()),
        email: Some(email.into()),
        password: Some(password.into()),
        first_name: Some(name.0.into()),
        last_name: Some(name.1.into()),
        is_staff: Some(is_admin),
        is_superuser: Some(is_admin),
    }
}

fn admin_user() -> CreateUser {
    seed_user("admin", "admin@example.com", "Admin@123", ("Admin", "User"), true)
}

fn test_user() -> CreateUser {
    seed_user("testuser", "test@example.com", "Test@123", ("Test", "User"), false)
}

fn generated_user(n: usize) -> CreateUser {
    let tag = Uuid::new_v4().simple().to_string();
    let username = format!("user_{}", &tag[..8]);
    let email = format!("{username}@example.com");
    let last_name = format!("Seed{n}");
    seed_user(&username, &email, &tag[8..24], ("Generated", &last_name), false)
}

#[tokio::main]
async fn main() -> Result<(), BoxedError> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let env = EnvVar::from_env()?;
    let pool = connection::create_sqlx_pool(&env).await?;
    connection::migrate(&pool).await?;

    let repo = PgUserRepository::new(pool);
    let hasher = Argon2HashService::new();

    tracing::info!("starting user seeding in {:?} mode", args.mode);
    let mut users = vec![admin_user()];
    if args.mode == Mode::Development {
        users.push(test_user());
        users.extend((1..=args.count).map(generated_user));
    }
    let report = use_case::iam::seed_users(&repo, &hasher, users)
        .await
        .map_err(|err| -> BoxedError { err.to_string().into() })?;
    tracing::info!(
        created = report.created.len(),
        existing = report.existing.len(),
        rejected = report.rejected.len(),
        "user seeding completed"
    );
    Ok(())
}
