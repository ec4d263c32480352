use super::error::{extract_message, GatewayError};
use super::session::{LogoutReason, SessionStore};
use super::transport::{
    HttpMethod, ReqwestTransport, Transport, TransportFailureKind, TransportRequest,
    TransportResponse,
};
use crate::shared::config::Config;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const PUBLISHABLE_KEY_HEADER: &str = "x-publishable-api-key";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub resource: String,
    pub publishable_key: String,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            resource: config.api.resource.trim_matches('/').to_string(),
            publishable_key: config.api.publishable_key.clone(),
            max_retries: config.retry.max_retries,
            base_delay: config.retry.base_delay(),
        }
    }
}

/// Единая точка обращения к бэкенду коммерции.
///
/// Подставляет токен и publishable key, обрабатывает 401, разбирает ошибки и
/// повторяет запросы только при сетевых сбоях соединения.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionStore,
        config: GatewayConfig,
    ) -> Self {
        Self {
            transport,
            session,
            config,
        }
    }

    pub fn from_config(config: &Config, session: SessionStore) -> Self {
        Self::new(
            Arc::new(ReqwestTransport::new(config.api.timeout())),
            session,
            GatewayConfig::from_config(config),
        )
    }

    /// Сохранить токен после входа
    pub fn sign_in(&self, access_token: impl Into<String>) {
        self.session.save_access_token(access_token);
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.has_token()
    }

    /// Путь ресурса: `/{resource}/{segment}/...`, сегменты кодируются
    pub fn path(&self, segments: &[&str]) -> String {
        let mut path = format!("/{}", self.config.resource);
        for segment in segments {
            path.push('/');
            path.push_str(&urlencoding::encode(segment));
        }
        path
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let value = self.call(HttpMethod::Get, path, None, query).await?;
        decode(path, value)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_value(body).map_err(|e| GatewayError::Encode(e.to_string()))?;
        let value = self.call(HttpMethod::Post, path, Some(&body), &[]).await?;
        decode(path, value)
    }

    pub async fn delete(&self, path: &str) -> Result<Value, GatewayError> {
        self.call(HttpMethod::Delete, path, None, &[]).await
    }

    /// Выполнить вызов: `call(path, method, body?, query?) -> JSON`
    pub async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = self.build_url(path, query);
        let body = body.map(Value::to_string);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = self.build_request(method, &url, body.clone());
            tracing::debug!("API: {} {} (attempt {})", method, url, attempt);

            match self.transport.send(request).await {
                Ok(response) => return self.handle_response(method, path, response),
                Err(failure) => {
                    if failure.kind.is_retryable() && attempt <= self.config.max_retries {
                        let delay = self.config.base_delay * attempt;
                        tracing::warn!(
                            "API: {} {} failed ({}), retry {}/{} in {:?}",
                            method,
                            url,
                            failure,
                            attempt,
                            self.config.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if failure.kind == TransportFailureKind::ConnectionRefused
                        && self.session.has_token()
                    {
                        tracing::warn!(
                            "API: connection refused for {} {} with an active session, signing out",
                            method,
                            url
                        );
                        self.session.expire(LogoutReason::ConnectionRefused);
                        return Err(GatewayError::SessionExpired);
                    }

                    tracing::error!(
                        "API: {} {} failed after {} attempt(s): {}",
                        method,
                        url,
                        attempt,
                        failure
                    );
                    return Err(GatewayError::Network {
                        kind: failure.kind,
                        message: failure.message,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = self.config.base_url.clone();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);

        let encoded: Vec<String> = query
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect();
        if !encoded.is_empty() {
            url.push('?');
            url.push_str(&encoded.join("&"));
        }
        url
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
    ) -> TransportRequest {
        let mut headers = vec![(
            PUBLISHABLE_KEY_HEADER.to_string(),
            self.config.publishable_key.clone(),
        )];
        if let Some(token) = self.session.access_token() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.push(("Accept".to_string(), "application/json".to_string()));

        TransportRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        }
    }

    fn handle_response(
        &self,
        method: HttpMethod,
        path: &str,
        response: TransportResponse,
    ) -> Result<Value, GatewayError> {
        let status = response.status;

        if status == 401 {
            tracing::warn!("API: {} {} returned 401, signing out", method, path);
            self.session.expire(LogoutReason::Unauthorized);
            return Err(GatewayError::Unauthorized);
        }

        if !(200..300).contains(&status) {
            let body = serde_json::from_str::<Value>(&response.body)
                .unwrap_or_else(|_| Value::String(response.body.clone()));
            let message = extract_message(&body, &response.body, status);
            tracing::error!("API: {} {} failed with status {}: {}", method, path, status, message);
            return Err(GatewayError::Http {
                status,
                message,
                body,
            });
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => Ok(value),
            Err(_) => {
                if method == HttpMethod::Delete {
                    Ok(json!({
                        "success": true,
                        "id": last_segment(path),
                        "deleted": true,
                    }))
                } else {
                    Ok(json!({ "success": true }))
                }
            }
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn last_segment(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
