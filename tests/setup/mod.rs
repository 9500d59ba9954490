#![allow(dead_code)]

use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;
use serde_json::json;
use url::Url;

pub const PASSWORD: &str = "secure:12345678";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn service_url() -> Url {
    dotenv::dotenv().ok();
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()
        .expect("Invalid PORT");
    Url::parse(format!("http://localhost:{port}").as_str()).unwrap()
}

pub fn url(path: &str) -> Url {
    service_url().join(path).unwrap()
}

/// Empties every table the api writes to.
pub async fn setup_database() -> sqlx::PgPool {
    dotenv::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("Expect DATABASE_URL");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_millis(1000))
        .idle_timeout(Duration::from_millis(1000 * 30))
        .max_lifetime(Duration::from_millis(1000 * 10))
        .connect(&database_url)
        .await
        .expect("Expect to create a database pool with a open connection");

    sqlx::query("TRUNCATE users, places, token_blacklist RESTART IDENTITY")
        .execute(&pool)
        .await
        .expect("Expect the schema to be migrated by the running service");

    pool
}

pub fn create_client() -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.append("accept", HeaderValue::from_static("application/json"));

    let keep_alive = 1000 * 60 * 60; // 1 hours
    let connect_timeout = 1000 * 5; // 5 sec
    let timeout = 1000 * 10; // 10 sec

    reqwest::Client::builder()
        .tcp_keepalive(Duration::from_millis(keep_alive))
        .connect_timeout(Duration::from_millis(connect_timeout))
        .timeout(Duration::from_millis(timeout))
        .pool_max_idle_per_host(5)
        .default_headers(headers)
        .brotli(true)
        .gzip(true)
        .build()
        .expect("Expect to create a http client")
}

pub async fn register(client: &Client, username: &str) -> TokenPair {
    let res = client
        .post(url("/auth/register_credentials"))
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success(), "register failed: {}", res.status());
    res.json().await.unwrap()
}
