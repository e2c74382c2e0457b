//! Blocking HTTP client for the thermostat cloud API.
//!
//! - Blocking client using `ureq` (no async); commands are issued from the
//!   hub's worker-offload context, never the notification path.
//! - Read endpoints cover what the connector polls; write endpoints cover the
//!   overlay, presence-lock and temperature-offset commands.
//! - No retry layer beyond a single forced token refresh on 401; other
//!   failures propagate to the caller.
//!
//! Authentication
//! - Performs OAuth2 password grant against the vendor auth server, manages
//!   refresh automatically.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::time::{Duration, Instant};

use crate::models::tado::*;

const BASE_URL: &str = "https://my.tado.com/api/v2";
const OAUTH_TOKEN_URL: &str = "https://auth.tado.com/oauth/token";
const OAUTH_CLIENT_ID: &str = "tado-web-app";
const OAUTH_SCOPE: &str = "home.user";

#[derive(Debug)]
pub enum TadoClientError {
    Transport(String),
    Http { status: u16, message: String },
    /// JSON decode failure, with the offending path when known.
    Json(String),
    Auth(String),
}

impl core::fmt::Display for TadoClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TadoClientError::Transport(s) => write!(f, "transport error: {}", s),
            TadoClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            TadoClientError::Json(e) => write!(f, "json error: {}", e),
            TadoClientError::Auth(e) => write!(f, "auth error: {}", e),
        }
    }
}

impl std::error::Error for TadoClientError {}

impl From<serde_json::Error> for TadoClientError {
    fn from(value: serde_json::Error) -> Self {
        TadoClientError::Json(value.to_string())
    }
}

#[derive(Debug, Clone)]
struct OAuthToken {
    access_token: String,
    expires_at: Instant,
    refresh_token: Option<String>,
}

#[derive(Debug)]
struct OAuthState {
    token: Option<OAuthToken>,
    username: String,
    password: String,
}

pub struct TadoClient {
    agent: ureq::Agent,
    oauth: RefCell<OAuthState>,
}

impl TadoClient {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, TadoClientError> {
        let agent = ureq::AgentBuilder::new().build();

        let mut state = OAuthState {
            token: None,
            username: username.into(),
            password: password.into(),
        };

        // Fetch initial token
        let token = Self::oauth_password_grant(&agent, &state)?;
        state.token = Some(token);

        Ok(TadoClient {
            agent,
            oauth: RefCell::new(state),
        })
    }

    fn url(path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", BASE_URL, path)
        } else {
            format!("{}/{}", BASE_URL, path)
        }
    }

    fn oauth_password_grant(agent: &ureq::Agent, state: &OAuthState) -> Result<OAuthToken, TadoClientError> {
        let resp = agent
            .post(OAUTH_TOKEN_URL)
            .set("Accept", "application/json")
            .send_form(&[
                ("client_id", OAUTH_CLIENT_ID),
                ("grant_type", "password"),
                ("scope", OAUTH_SCOPE),
                ("username", state.username.as_str()),
                ("password", state.password.as_str()),
            ]);
        Self::parse_token_response(resp)
    }

    fn oauth_refresh_grant(agent: &ureq::Agent, refresh: &str) -> Result<OAuthToken, TadoClientError> {
        let resp = agent
            .post(OAUTH_TOKEN_URL)
            .set("Accept", "application/json")
            .send_form(&[
                ("client_id", OAUTH_CLIENT_ID),
                ("grant_type", "refresh_token"),
                ("scope", OAUTH_SCOPE),
                ("refresh_token", refresh),
            ]);
        Self::parse_token_response(resp)
    }

    fn parse_token_response(resp: Result<ureq::Response, ureq::Error>) -> Result<OAuthToken, TadoClientError> {
        #[derive(serde::Deserialize)]
        struct R {
            access_token: String,
            expires_in: u64,
            #[serde(default)]
            refresh_token: Option<String>,
        }
        match resp {
            Ok(r) => {
                let R {
                    access_token,
                    expires_in,
                    refresh_token,
                } = serde_json::from_reader(r.into_reader()).map_err(TadoClientError::from)?;
                let expires_at = Instant::now() + Duration::from_secs(expires_in);
                Ok(OAuthToken {
                    access_token,
                    expires_at,
                    refresh_token,
                })
            }
            Err(ureq::Error::Transport(t)) => Err(TadoClientError::Transport(t.to_string())),
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_else(|_| String::from("<no body>"));
                Err(TadoClientError::Auth(format!("http {}: {}", status, body)))
            }
        }
    }

    fn get_bearer(&self) -> Result<String, TadoClientError> {
        let mut s = self.oauth.borrow_mut();
        let needs_refresh = match &s.token {
            None => true,
            Some(t) => Instant::now() + Duration::from_secs(30) >= t.expires_at,
        };
        if needs_refresh {
            let new_tok = Self::grant_any(&self.agent, &s)?;
            s.token = Some(new_tok);
        }
        Ok(s.token.as_ref().map(|t| t.access_token.clone()).unwrap_or_default())
    }

    fn grant_any(agent: &ureq::Agent, state: &OAuthState) -> Result<OAuthToken, TadoClientError> {
        match state.token.as_ref().and_then(|t| t.refresh_token.clone()) {
            Some(r) => Self::oauth_refresh_grant(agent, &r),
            None => Self::oauth_password_grant(agent, state),
        }
    }

    fn force_refresh(&self) -> Result<(), TadoClientError> {
        let mut s = self.oauth.borrow_mut();
        let refreshed = Self::grant_any(&self.agent, &s)?;
        s.token = Some(refreshed);
        Ok(())
    }

    /// Issue a single authenticated request. Retries exactly once after a
    /// forced token refresh when the API answers 401.
    fn send(&self, method: &str, path: &str, body: Option<&serde_json::Value>) -> Result<ureq::Response, TadoClientError> {
        let url = Self::url(path);
        for attempt in 0..2 {
            let token = self.get_bearer()?;
            let req = self
                .agent
                .request(method, &url)
                .set("Accept", "application/json")
                .set("Authorization", &format!("Bearer {}", token));
            let result = match body {
                Some(json) => req.send_json(json.clone()),
                None => req.call(),
            };
            match result {
                Ok(res) => return Ok(res),
                Err(ureq::Error::Status(401, _)) if attempt == 0 => {
                    self.force_refresh()?;
                }
                Err(ureq::Error::Transport(t)) => return Err(TadoClientError::Transport(t.to_string())),
                Err(ureq::Error::Status(status, res)) => {
                    let message = res.into_string().unwrap_or_else(|_| String::from("<no body>"));
                    return Err(TadoClientError::Http { status, message });
                }
            }
        }
        Err(TadoClientError::Auth("401 after forced token refresh".to_string()))
    }

    fn decode<T: DeserializeOwned>(resp: ureq::Response) -> Result<T, TadoClientError> {
        let body = resp
            .into_string()
            .map_err(|e| TadoClientError::Transport(e.to_string()))?;
        let mut de = serde_json::Deserializer::from_str(&body);
        serde_path_to_error::deserialize(&mut de).map_err(|e| TadoClientError::Json(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TadoClientError> {
        Self::decode(self.send("GET", path, None)?)
    }

    fn write_json<B: Serialize>(&self, method: &str, path: &str, body: &B) -> Result<(), TadoClientError> {
        let json = serde_json::to_value(body)?;
        // Response body (the stored resource) is not interesting here.
        self.send(method, path, Some(&json)).map(|_| ())
    }

    // ---- read endpoints ----

    pub fn get_me(&self) -> Result<User, TadoClientError> {
        self.get_json("/me")
    }

    pub fn get_home_state(&self, home_id: HomeId) -> Result<HomeState, TadoClientError> {
        self.get_json(&format!("/homes/{}/state", home_id.0))
    }

    pub fn get_zones(&self, home_id: HomeId) -> Result<Vec<Zone>, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones", home_id.0))
    }

    pub fn get_zone_state(&self, home_id: HomeId, zone_id: ZoneId) -> Result<ZoneState, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones/{}/state", home_id.0, zone_id.0))
    }

    pub fn get_zone_capabilities(&self, home_id: HomeId, zone_id: ZoneId) -> Result<ZoneCapabilities, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones/{}/capabilities", home_id.0, zone_id.0))
    }

    pub fn get_default_overlay(&self, home_id: HomeId, zone_id: ZoneId) -> Result<DefaultOverlay, TadoClientError> {
        self.get_json(&format!("/homes/{}/zones/{}/defaultOverlay", home_id.0, zone_id.0))
    }

    pub fn get_devices(&self, home_id: HomeId) -> Result<Vec<Device>, TadoClientError> {
        self.get_json(&format!("/homes/{}/devices", home_id.0))
    }

    pub fn get_temperature_offset(&self, device_id: &DeviceId) -> Result<Temperature, TadoClientError> {
        self.get_json(&format!("/devices/{}/temperatureOffset", device_id.0))
    }

    // ---- command endpoints ----

    /// Place a manual overlay on a zone (temperature/mode change).
    pub fn put_zone_overlay(
        &self,
        home_id: HomeId,
        zone_id: ZoneId,
        overlay: &OverlayInput,
    ) -> Result<(), TadoClientError> {
        self.write_json("PUT", &format!("/homes/{}/zones/{}/overlay", home_id.0, zone_id.0), overlay)
    }

    /// Remove the active overlay, resuming the smart schedule.
    pub fn delete_zone_overlay(&self, home_id: HomeId, zone_id: ZoneId) -> Result<(), TadoClientError> {
        self.send("DELETE", &format!("/homes/{}/zones/{}/overlay", home_id.0, zone_id.0), None)
            .map(|_| ())
    }

    /// Pin home presence to HOME or AWAY.
    pub fn put_presence_lock(&self, home_id: HomeId, lock: &PresenceLockInput) -> Result<(), TadoClientError> {
        self.write_json("PUT", &format!("/homes/{}/presenceLock", home_id.0), lock)
    }

    /// Release the presence lock, returning control to geofencing.
    pub fn delete_presence_lock(&self, home_id: HomeId) -> Result<(), TadoClientError> {
        self.send("DELETE", &format!("/homes/{}/presenceLock", home_id.0), None)
            .map(|_| ())
    }

    pub fn put_temperature_offset(
        &self,
        device_id: &DeviceId,
        offset: &TemperatureOffsetInput,
    ) -> Result<(), TadoClientError> {
        self.write_json("PUT", &format!("/devices/{}/temperatureOffset", device_id.0), offset)
    }
}
