use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::{DatabaseError, EXCLUSION_VIOLATION};

/// RFC 3339 timestamp escaped for use as a PostgREST filter value.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    urlencoding::encode(&ts.to_rfc3339()).into_owned()
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.service_key().to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| DatabaseError::Auth("API key contains invalid header characters".to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Server-side calls authenticate with the service key itself.
        let bearer = auth_token.unwrap_or(&self.api_key);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|_| DatabaseError::Auth("Token contains invalid header characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(Self::classify_error(status.as_u16(), &error_text));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Fetch rows from a PostgREST table and decode them into typed records.
    pub async fn fetch_rows<T>(&self, path: &str) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let rows: Vec<Value> = self.request(Method::GET, path, None, None).await?;
        Self::decode_rows(rows)
    }

    /// Write with `Prefer: return=representation` and decode the affected rows.
    pub async fn write_rows<T>(&self, method: Method, path: &str, body: Option<Value>)
                               -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .request_with_headers(method, path, None, body, Some(headers))
            .await?;
        Self::decode_rows(rows)
    }

    pub fn decode_rows<T>(rows: Vec<Value>) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(DatabaseError::from))
            .collect()
    }

    /// Upload an object to a Storage bucket, replacing any existing object.
    pub async fn upload_object(&self, bucket: &str, object_path: &str,
                               bytes: Vec<u8>, content_type: &str)
                               -> Result<String, DatabaseError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(None)?;
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|_| DatabaseError::Api { status: 400, message: "Invalid content type".to_string() })?;
        headers.insert(CONTENT_TYPE, content_type);
        headers.insert("x-upsert", HeaderValue::from_static("true"));

        let response = self.client.post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("Storage upload failed ({}): {}", status, error_text);
            return Err(Self::classify_error(status.as_u16(), &error_text));
        }

        let body: Value = response.json().await?;
        Ok(body.get("Key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", bucket, object_path)))
    }

    /// Create a time-limited URL for a private Storage object.
    pub async fn create_signed_url(&self, bucket: &str, object_path: &str,
                                   expires_in_seconds: u64)
                                   -> Result<String, DatabaseError> {
        let path = format!("/storage/v1/object/sign/{}/{}", bucket, object_path);
        let body: Value = self.request(
            Method::POST,
            &path,
            None,
            Some(json!({ "expiresIn": expires_in_seconds })),
        ).await?;

        let signed = body.get("signedURL")
            .or_else(|| body.get("signedUrl"))
            .and_then(Value::as_str)
            .ok_or_else(|| DatabaseError::Decode("Signed URL missing from storage response".to_string()))?;

        Ok(self.get_public_url(&format!("/storage/v1{}", signed)))
    }

    /// Invoke an Edge Function with a JSON payload.
    pub async fn invoke_function(&self, name: &str, payload: Value) -> Result<Value, DatabaseError> {
        let path = format!("/functions/v1/{}", name);
        self.request(Method::POST, &path, None, Some(payload)).await
    }

    pub fn get_public_url(&self, storage_path: &str) -> String {
        format!("{}{}", self.base_url, storage_path)
    }

    fn classify_error(status: u16, body: &str) -> DatabaseError {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let code = parsed.as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_str);
        let message = parsed.as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(body)
            .to_string();

        match (status, code) {
            (_, Some(EXCLUSION_VIOLATION)) => {
                warn!("Exclusion constraint rejected write: {}", message);
                DatabaseError::Overlap
            }
            (401 | 403, _) => DatabaseError::Auth(message),
            (404, _) => DatabaseError::NotFound,
            (409, _) => DatabaseError::Conflict(message),
            _ => DatabaseError::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{header, method, path};

    fn client_for(server: &MockServer) -> SupabaseClient {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "anon-key".to_string(),
            supabase_service_role_key: "service-key".to_string(),
            ..AppConfig::default()
        };
        SupabaseClient::new(&config)
    }

    #[test]
    fn timestamps_are_query_safe() {
        use chrono::TimeZone;

        let ts = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        assert_eq!(encode_timestamp(&ts), "2024-01-10T09%3A00%3A00%2B00%3A00");
    }

    #[test]
    fn exclusion_violation_maps_to_overlap() {
        let body = r#"{"code":"23P01","message":"conflicting key value violates exclusion constraint"}"#;
        assert_eq!(SupabaseClient::classify_error(409, body), DatabaseError::Overlap);
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key"}"#;
        assert_matches!(SupabaseClient::classify_error(409, body), DatabaseError::Conflict(msg) if msg == "duplicate key");
    }

    #[test]
    fn plain_text_errors_keep_body() {
        assert_matches!(
            SupabaseClient::classify_error(500, "boom"),
            DatabaseError::Api { status: 500, message } if message == "boom"
        );
        assert_eq!(SupabaseClient::classify_error(404, ""), DatabaseError::NotFound);
    }

    #[tokio::test]
    async fn fetch_rows_uses_service_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/things"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "n": 1 }, { "n": 2 }])))
            .mount(&server)
            .await;

        let rows: Vec<Value> = client_for(&server).fetch_rows("/rest/v1/things").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn auth_failures_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
            .mount(&server)
            .await;

        let result: Result<Vec<Value>, _> = client_for(&server).fetch_rows("/rest/v1/things").await;
        assert_matches!(result, Err(DatabaseError::Auth(msg)) if msg == "JWT expired");
    }

    #[tokio::test]
    async fn signed_url_is_absolute() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/sign/docs/pro/license.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signedURL": "/object/sign/docs/pro/license.pdf?token=abc"
            })))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .create_signed_url("docs", "pro/license.pdf", 60)
            .await
            .unwrap();
        assert_eq!(url, format!("{}/storage/v1/object/sign/docs/pro/license.pdf?token=abc", server.uri()));
    }
}
