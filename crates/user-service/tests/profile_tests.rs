//! User service integration tests.
//!
//! The user service trusts the verified claims, so tokens from
//! `TestTokenBuilder` stand in for logins.

use serde_json::{json, Value};
use test_utils::{ErrorBodyAssertions, TestTokenBuilder, TestUserServer};

fn alice() -> String {
    TestTokenBuilder::new().for_user("alice").build()
}

fn profile(email: &str) -> Value {
    json!({
        "firstName": "Alice",
        "lastName": "Liddell",
        "email": email,
        "bio": "Curiouser and curiouser",
        "dateOfBirth": "1852-05-04"
    })
}

#[tokio::test]
async fn test_profile_create_then_read() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/me", server.url());

    let response = client.get(&url).bearer_auth(alice()).send().await?;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await?;
    body.assert_error(404, "RES_001")
        .assert_message("User not found with username: 'alice'");

    let response = client
        .post(&url)
        .bearer_auth(alice())
        .json(&profile("alice@example.com"))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let saved: Value = response.json().await?;
    assert_eq!(saved["username"], "alice");
    assert_eq!(saved["profileVisibility"], "public");
    assert_eq!(saved["dateOfBirth"], "1852-05-04");

    let read: Value = client.get(&url).bearer_auth(alice()).send().await?.json().await?;
    assert_eq!(read, saved);

    Ok(())
}

#[tokio::test]
async fn test_profile_is_keyed_by_token_subject() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/me", server.url());

    client
        .post(&url)
        .bearer_auth(alice())
        .json(&profile("alice@example.com"))
        .send()
        .await?;

    let bob = TestTokenBuilder::new().for_user("bob").build();
    let response = client.get(&url).bearer_auth(bob).send().await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

#[tokio::test]
async fn test_profile_validation() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/me", server.url()))
        .bearer_auth(alice())
        .json(&json!({"email": "not-an-email", "profileVisibility": "everyone"}))
        .send()
        .await?;
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await?;
    body.assert_error(400, "VAL_001")
        .assert_field_error("firstName")
        .assert_field_error("lastName")
        .assert_field_error("email")
        .assert_field_error("profileVisibility");

    Ok(())
}

#[tokio::test]
async fn test_email_owned_by_another_profile() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/me", server.url());

    client
        .post(&url)
        .bearer_auth(alice())
        .json(&profile("shared@example.com"))
        .send()
        .await?;

    let bob = TestTokenBuilder::new().for_user("bob").build();
    let body: Value = client
        .post(&url)
        .bearer_auth(bob)
        .json(&profile("shared@example.com"))
        .send()
        .await?
        .json()
        .await?;

    body.assert_error(409, "AUTH_004")
        .assert_message("Email already registered: shared@example.com");

    Ok(())
}

#[tokio::test]
async fn test_rejected_tokens() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;
    let client = reqwest::Client::new();
    let url = format!("{}/me", server.url());

    let body: Value = client.get(&url).send().await?.json().await?;
    body.assert_error(401, "AUTH_010");

    let expired = TestTokenBuilder::new().for_user("alice").expired().build();
    let body: Value = client.get(&url).bearer_auth(expired).send().await?.json().await?;
    body.assert_error(401, "AUTH_012").assert_title("Token Expired");

    let foreign = TestTokenBuilder::new().for_user("alice").foreign().build();
    let body: Value = client.get(&url).bearer_auth(foreign).send().await?.json().await?;
    body.assert_error(401, "AUTH_011");

    Ok(())
}

#[tokio::test]
async fn test_health_is_public() -> Result<(), anyhow::Error> {
    let server = TestUserServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/actuator/health", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    Ok(())
}
