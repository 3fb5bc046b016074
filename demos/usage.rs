//! Usage Example
//!
//! Configures a client once with global interceptors, then issues a GET and a
//! POST that skip authentication against a public JSON placeholder API.
//!
//! Run with: `cargo run --example usage`

use resilient_client::interceptors::{FnErrorInterceptor, StaticHeaders, TracingInterceptor};
use resilient_client::{ApiClient, Error, ErrorAction, RequestOptions};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    name: String,
    username: String,
    email: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_client=debug")
        .init();

    let client = ApiClient::builder()
        .base_url("https://jsonplaceholder.typicode.com")
        .build()?;
    client.add_request_interceptor(StaticHeaders::new().header("X-Requested-With", "XMLHttpRequest")?);
    client.add_request_interceptor(TracingInterceptor);
    client.add_response_interceptor(TracingInterceptor);
    client.add_error_interceptor(FnErrorInterceptor::new(|err: Error| {
        eprintln!("request failed: {}", err);
        ErrorAction::Propagate(err)
    }));

    println!("--- GET /users/1 ---");
    match client
        .get_json::<User>("/users/1", RequestOptions::new().skip_auth(true))
        .await
    {
        Ok(user) => println!("user #{} {} (@{}, {})", user.id, user.name, user.username, user.email),
        Err(e) => println!("GET failed: {}", e),
    }

    println!("--- POST /posts (skip auth) ---");
    let guest = json!({"title": "Guest Post", "body": "This is a public post."});
    match client
        .post("/posts", &guest, RequestOptions::new().skip_auth(true))
        .await
    {
        Ok(created) => println!("created: {}", created.to_value()),
        Err(e) => println!("POST failed: {}", e),
    }

    Ok(())
}
