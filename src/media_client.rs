use std::collections::BTreeMap;
use std::path::Path;

use actix_multipart::form::tempfile::TempFile;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::configuration::MediaSettings;
use crate::error::MediaError;

/// Client for a Cloudinary-style signed upload API
#[derive(Clone)]
pub struct MediaClient {
    http_client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: Option<String>,
}

/// Where an uploaded file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
    pub public_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl MediaClient {
    pub fn new(settings: &MediaSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            cloud_name: settings.cloud_name.clone(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            folder: settings.folder.clone(),
        }
    }

    pub fn from_settings(settings: &MediaSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self::new(settings, http_client))
    }

    /// Upload a local file, letting the host detect its resource type
    pub async fn upload(&self, path: &Path, file_name: Option<&str>) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MediaError::Io(e.to_string()))?;

        let mut params = BTreeMap::new();
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        if let Some(folder) = &self.folder {
            params.insert("folder", folder.clone());
        }
        let signature = self.sign(&params);

        let file_name = file_name.unwrap_or("upload").to_string();
        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let url = format!("{}/v1_1/{}/auto/upload", self.base_url, self.cloud_name);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach media host: {}", e);
                MediaError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Media host rejected upload");
            return Err(MediaError::Rejected(status.as_u16(), body));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        let url = uploaded
            .secure_url
            .or(uploaded.url)
            .ok_or_else(|| MediaError::InvalidResponse("response has no url".to_string()))?;

        tracing::info!(public_id = %uploaded.public_id, "File uploaded to media host");
        Ok(UploadedMedia {
            url,
            public_id: uploaded.public_id,
        })
    }

    /// Delete a previously uploaded image
    pub async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = self.sign(&params);

        let mut form: Vec<(&str, String)> = params.into_iter().collect();
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));

        let url = format!("{}/v1_1/{}/image/destroy", self.base_url, self.cloud_name);
        let response = self
            .http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected(status.as_u16(), body));
        }

        let destroyed: DestroyResponse = response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))?;

        // "not found" means it is already gone
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::InvalidResponse(format!("destroy result: {}", other))),
        }
    }

    /// Signature over the sorted `key=value` pairs followed by the API secret
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Upload a spooled multipart file and delete it locally, whatever the outcome
pub async fn upload_temp_file(
    client: &MediaClient,
    temp_file: TempFile,
) -> Result<UploadedMedia, MediaError> {
    let result = client
        .upload(temp_file.file.path(), temp_file.file_name.as_deref())
        .await;

    if let Err(e) = temp_file.file.close() {
        tracing::warn!("Failed to delete temp upload: {}", e);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MediaClient {
        let settings = MediaSettings {
            base_url: "http://127.0.0.1:1/".to_string(),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: None,
            timeout_milliseconds: 200,
        };
        MediaClient::from_settings(&settings).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url, "http://127.0.0.1:1");
    }

    #[test]
    fn test_signature_is_sorted_and_deterministic() {
        let client = client();

        let mut a = BTreeMap::new();
        a.insert("timestamp", "1700000000".to_string());
        a.insert("folder", "avatars".to_string());

        let mut b = BTreeMap::new();
        b.insert("folder", "avatars".to_string());
        b.insert("timestamp", "1700000000".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"folder=avatars&timestamp=1700000000secret");
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(client.sign(&a), expected);
        assert_eq!(client.sign(&b), expected);
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let result = client()
            .upload(Path::new("/nonexistent/definitely-not-here.png"), None)
            .await;

        assert!(matches!(result, Err(MediaError::Io(_))));
    }

    #[tokio::test]
    async fn test_upload_unreachable_host_is_request_error() {
        let dir = std::env::temp_dir().join(format!("media-client-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&dir, b"fake image").await.unwrap();

        let result = client().upload(&dir, Some("a.png")).await;
        let _ = tokio::fs::remove_file(&dir).await;

        assert!(matches!(result, Err(MediaError::Request(_))));
    }
}
