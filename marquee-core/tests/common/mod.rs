//! Shared fixtures for the integration tests

#![allow(dead_code)]

use marquee_core::config::SessionsConfig;
use marquee_core::models::{Identity, Movie, NewMovie, UserId};
use marquee_core::orders::{MemoryPurchaseLedger, PurchaseItem};
use marquee_core::store::Store;
use marquee_core::{App, AppResponse, RequestContext};
use std::sync::Arc;

pub fn app_with_store(store: Store) -> App {
    App::new(Arc::new(store), Arc::new(MemoryPurchaseLedger::default()), &SessionsConfig::default())
}

pub fn app() -> App {
    app_with_store(Store::in_memory())
}

pub fn app_with_orders(items: Vec<PurchaseItem>) -> App {
    App::new(
        Arc::new(Store::in_memory()),
        Arc::new(MemoryPurchaseLedger::new(items)),
        &SessionsConfig::default(),
    )
}

pub async fn add_movie(app: &App, name: &str) -> Movie {
    let staff = Identity { id: UserId(0), username: "fixture".into(), is_staff: true };
    app.catalog()
        .add_movie(
            &staff,
            NewMovie {
                name: name.into(),
                price: 10,
                description: format!("About {}", name),
                image: String::new(),
            },
        )
        .await
        .unwrap()
}

/// Register and log in; returns the Bearer token
pub async fn login_as(app: &App, username: &str, is_staff: bool) -> String {
    app.accounts().register(username, "password123", is_staff).await.unwrap();
    login_as_existing(app, username).await
}

pub async fn login_as_existing(app: &App, username: &str) -> String {
    let response = app
        .handle(
            RequestContext::post("/accounts/login/")
                .with_field("username", username)
                .with_field("password", "password123"),
        )
        .await;
    assert_eq!(response.status.as_u16(), 200, "login failed: {}", response.body);
    response.body["token"].as_str().unwrap().to_string()
}

pub fn get(target: &str, token: &str) -> RequestContext {
    RequestContext::get(target).with_header("authorization", &format!("Bearer {}", token))
}

pub fn post(target: &str, token: &str) -> RequestContext {
    RequestContext::post(target).with_header("authorization", &format!("Bearer {}", token))
}

pub fn message_texts(response: &AppResponse) -> Vec<String> {
    response.messages().into_iter().map(|m| m.text).collect()
}
