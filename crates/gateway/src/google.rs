use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::config::GoogleConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

/// Token-exchange client for Google's OAuth code flow. The authorization
/// code is swapped for tokens, then the access token is presented back to
/// Google to fetch the verified profile.
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuth {
    pub fn new(http: reqwest::Client, config: &GoogleConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokens> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self.http.post(TOKEN_URL).form(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("token exchange failed: {} {}", status, body));
        }
        Ok(resp.json().await?)
    }

    pub async fn fetch_user(&self, access_token: &str) -> Result<GoogleUserInfo> {
        let resp = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("userinfo fetch failed: {} {}", status, body));
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn userinfo_tolerates_missing_name_fields() {
        let info: GoogleUserInfo = serde_json::from_str(r#"{"email":"a@gmail.com"}"#).unwrap();
        assert_eq!(info.email, "a@gmail.com");
        assert!(info.given_name.is_none());
        assert!(info.family_name.is_none());
    }

    #[test]
    fn token_response_reads_access_token() {
        let tokens: GoogleTokens = serde_json::from_str(
            r#"{"access_token":"ya29.x","expires_in":3599,"token_type":"Bearer","scope":"email"}"#,
        )
        .unwrap();
        assert_eq!(tokens.access_token, "ya29.x");
    }
}
