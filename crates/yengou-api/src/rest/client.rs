// REST HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, bearer injection, and
// status-to-error mapping. Endpoint methods return decoded bodies.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::rest::models::{LoginResponse, RawLoginResponse, RestDriver, RestTrip};
use crate::transport::TransportConfig;
use crate::wire::{DashboardStats, SystemAlert};

/// Which login endpoint to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LoginRole {
    User,
    #[default]
    Admin,
    Support,
}

impl LoginRole {
    fn path(self) -> &'static str {
        match self {
            Self::User => "authenticate",
            Self::Admin => "backoffice/auth/admin/login",
            Self::Support => "backoffice/auth/support/login",
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP client for the backend's REST surface.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
            token: None,
        }
    }

    /// Attach the bearer token sent on every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Exchange username and password for a bearer token.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        role: LoginRole,
    ) -> Result<LoginResponse, Error> {
        let url = self.endpoint(role.path())?;
        debug!(%role, "POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(&LoginRequest {
                username,
                password: password.expose_secret(),
            })
            .send()
            .await?;

        if matches!(resp.status().as_u16(), 401 | 403) {
            return Err(Error::Authentication {
                message: "invalid username or password".into(),
            });
        }

        let raw: RawLoginResponse = decode(resp).await?;
        Ok(raw.into())
    }

    // ── Seeding reads ────────────────────────────────────────────────

    /// Driver directory: every driver profile.
    pub async fn list_drivers(&self) -> Result<Vec<RestDriver>, Error> {
        self.get("driver-profiles", &[]).await
    }

    /// Trips that are accepted or in transit.
    pub async fn active_trips(&self) -> Result<Vec<RestTrip>, Error> {
        self.get("trips", &[("status.in", "ACCEPTED,IN_TRANSIT")])
            .await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, Error> {
        self.get("backoffice/dashboard/stats", &[]).await
    }

    pub async fn system_alerts(&self) -> Result<Vec<SystemAlert>, Error> {
        self.get("backoffice/dashboard/alerts", &[]).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {}", url);

        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(if self.token.is_some() {
                Error::SessionExpired
            } else {
                Error::Authentication {
                    message: "no bearer token supplied".into(),
                }
            });
        }

        decode(resp).await
    }
}

/// Map non-success statuses to `Error::Api`, then decode the body.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        } else {
            body.trim().to_owned()
        };
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// `Url::join` drops the last segment unless the base ends in `/`.
fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
