// grohe_exporter - Grohe Sense metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::api::core::{decode_list, ClientError, ClientErrorKind, Credential, Fetch, ResourceList, LOGIN_PATH};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://idp2-apigw.cloud.grohe.com";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "access_token")]
    token: String,
}

/// Create an HTTP client where every request made is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<Client, ClientError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("grohe_exporter/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ClientError::KindMsgCause(
                ClientErrorKind::Initialization,
                "unable to create HTTP client",
                Box::new(e),
            )
        })
}

/// Exchange a username and password for the opaque token used to authenticate
/// all subsequent API requests.
pub async fn login(client: &Client, base_url: &str, username: &str, password: &str) -> Result<Credential, ClientError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), LOGIN_PATH);
    let res = client
        .post(&url)
        .json(&LoginRequest { username, password })
        .send()
        .await
        .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Transport, "unable to make login request", Box::new(e)))?;

    let status = res.status();
    if status != StatusCode::OK {
        return Err(ClientError::Status(LOGIN_PATH.to_owned(), status.as_u16()));
    }

    let body = res
        .bytes()
        .await
        .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Transport, "unable to read login response", Box::new(e)))?;

    let decoded: LoginResponse = serde_json::from_slice(&body)
        .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to decode login response", Box::new(e)))?;

    Ok(Credential::new(decoded.token))
}

/// Client for the Grohe API that attaches an immutable credential to every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl ApiClient {
    pub fn new<S: Into<String>>(client: Client, base_url: S, credential: Credential) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            client,
            base_url,
            credential,
        }
    }
}

impl Fetch for ApiClient {
    async fn fetch<T>(&self, path: &str) -> Result<ResourceList<T>, ClientError>
    where
        T: DeserializeOwned + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(message = "making API request", url = %url);

        let res = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.credential.expose())
            .send()
            .await
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Transport, "unable to make API request", Box::new(e)))?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(ClientError::Status(path.to_owned(), status.as_u16()));
        }

        let body = res
            .bytes()
            .await
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Transport, "unable to read API response", Box::new(e)))?;

        decode_list(&body)
    }
}
