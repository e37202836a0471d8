use std::time::Duration;

use reqwest::Client;

use crate::prelude::*;

/// Build a default client.
pub fn try_new() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build the HTTP client")
}
