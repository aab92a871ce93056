use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::Config;
use crate::error::AppError;

/// Blob storage operations the file service needs. Failures are reported
/// as-is; nothing is retried at this layer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError>;

    async fn presign_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, AppError>;
}

#[derive(Clone)]
pub struct S3Service {
    client: Client,
}

impl S3Service {
    pub fn new(config: &Config) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.s3_access_key.clone(),
            config.s3_secret_key.clone(),
            None,
            None,
            "manual_config",
        );

        let region = aws_sdk_s3::config::Region::new(config.s3_region.clone());

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true);

        if let Some(endpoint) = &config.s3_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Service {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket, key, "S3 upload error: {:?}", e);
                AppError::InternalServerError(format!("Failed to upload file to S3: {}", e))
            })?;

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket, key, "S3 delete error: {:?}", e);
                AppError::InternalServerError(format!("Failed to delete file from S3: {}", e))
            })?;

        Ok(())
    }

    async fn presign_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(expires_in)
            .map_err(|e| {
                tracing::error!("Presigning config error: {}", e);
                AppError::InternalServerError("Failed to configure presigner".to_string())
            })?;

        let presigned_req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                tracing::error!(bucket, key, "Presigning error: {}", e);
                AppError::InternalServerError("Failed to generate presigned URL".to_string())
            })?;

        Ok(presigned_req.uri().to_string())
    }
}
