use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{GatewayError, RemoteGateway};
use crate::config::GatewayConfig;
use crate::listings::domain::{
    Application, ApplicationId, Decision, Property, PropertyDraft, PropertyId, WishlistEntry,
};
use crate::listings::session::AuthContext;

/// REST adapter for the listings backend.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, auth: &AuthContext) -> RequestBuilder {
        debug!(%method, path, role = %auth.role, "gateway request");
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(auth.token.expose())
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, GatewayError> {
        let response = Self::send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| GatewayError::Payload(err.to_string()))
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), GatewayError> {
        Self::send(builder).await.map(|_| ())
    }

    async fn send(builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message.or(parsed.error))
            .unwrap_or(body);

        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_properties(&self, auth: &AuthContext) -> Result<Vec<Property>, GatewayError> {
        Self::send_json(self.request(Method::GET, "/properties", auth)).await
    }

    async fn create_property(
        &self,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError> {
        Self::send_json(self.request(Method::POST, "/properties", auth).json(draft)).await
    }

    async fn update_property(
        &self,
        id: &PropertyId,
        draft: &PropertyDraft,
        auth: &AuthContext,
    ) -> Result<Property, GatewayError> {
        let path = format!("/properties/{id}");
        Self::send_json(self.request(Method::PUT, &path, auth).json(draft)).await
    }

    async fn delete_property(
        &self,
        id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let path = format!("/properties/{id}");
        Self::send_empty(self.request(Method::DELETE, &path, auth)).await
    }

    async fn list_applications(
        &self,
        auth: &AuthContext,
    ) -> Result<Vec<Application>, GatewayError> {
        Self::send_json(self.request(Method::GET, "/applications", auth)).await
    }

    async fn submit_application(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError> {
        let body = json!({ "property_id": property_id });
        Self::send_json(self.request(Method::POST, "/applications", auth).json(&body)).await
    }

    async fn cancel_application(
        &self,
        id: &ApplicationId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let path = format!("/applications/{id}");
        Self::send_empty(self.request(Method::DELETE, &path, auth)).await
    }

    async fn decide_application(
        &self,
        id: &ApplicationId,
        decision: Decision,
        auth: &AuthContext,
    ) -> Result<Application, GatewayError> {
        let path = format!("/applications/{id}/{}", decision.path_segment());
        Self::send_json(self.request(Method::PUT, &path, auth)).await
    }

    async fn list_wishlist(&self, auth: &AuthContext) -> Result<Vec<WishlistEntry>, GatewayError> {
        Self::send_json(self.request(Method::GET, "/wishlist", auth)).await
    }

    async fn add_to_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<WishlistEntry, GatewayError> {
        let body = json!({ "property_id": property_id });
        Self::send_json(self.request(Method::POST, "/wishlist", auth).json(&body)).await
    }

    async fn remove_from_wishlist(
        &self,
        property_id: &PropertyId,
        auth: &AuthContext,
    ) -> Result<(), GatewayError> {
        let body = json!({ "property_id": property_id });
        Self::send_empty(self.request(Method::DELETE, "/wishlist", auth).json(&body)).await
    }
}
