use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::ports::{CredentialIssuer, IssuanceError, IssuanceRequest, IssuanceSession};

const ISSUANCE_CONTEXT: &str = "https://irma.app/ld/request/issuance/v2";

#[derive(Debug, Serialize)]
struct IssuanceSessionRequest<'a> {
    #[serde(rename = "@context")]
    context: &'static str,
    credentials: Vec<CredentialRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct CredentialRequest<'a> {
    credential: &'a str,
    validity: i64,
    attributes: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SessionPackage {
    #[serde(rename = "sessionPtr")]
    session_ptr: serde_json::Value,
    token: String,
}

/// Starts issuance sessions on an IRMA server.
#[derive(Clone)]
pub struct IrmaIssuer {
    client: Client,
    server_url: String,
    auth_token: String,
}

impl IrmaIssuer {
    pub fn new(server_url: String, auth_token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            server_url,
            auth_token,
        }
    }
}

#[async_trait]
impl CredentialIssuer for IrmaIssuer {
    async fn start_issuance(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceSession, IssuanceError> {
        let url = format!("{}/session", self.server_url.trim_end_matches('/'));
        let body = IssuanceSessionRequest {
            context: ISSUANCE_CONTEXT,
            credentials: vec![CredentialRequest {
                credential: &request.credential_id,
                validity: request.validity.timestamp(),
                attributes: &request.attributes,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.auth_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IssuanceError::UnexpectedStatus(response.status().as_u16()));
        }

        let package = response.json::<SessionPackage>().await?;
        if package.token.is_empty() {
            return Err(IssuanceError::InvalidResponse(
                "session package without token".to_string(),
            ));
        }

        Ok(IssuanceSession {
            session_pointer: package.session_ptr,
            token: package.token,
        })
    }
}
