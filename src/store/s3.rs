//! S3 object store and CloudFront CDN clients.
//!
//! The AWS SDK is async; the pipeline is not. Both clients share one
//! multi-threaded tokio runtime and block on each request, which also lets
//! the asset sync call them from rayon worker threads.
//!
//! Settings read by [`connect`]:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `bucket` | target bucket (required) |
//! | `region` | AWS region, e.g. `us-east-1` |
//! | `access_key` / `secret_key` | static credentials; omit both to use the default chain |
//! | `endpoint` | custom endpoint for S3-compatible services (enables path-style addressing) |
//! | `distribution_id` | CloudFront distribution; omit to publish without a CDN |

use super::{Body, Cdn, Clients, ObjectStore, StoreError};
use crate::plugin::{PluginError, Settings};
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use std::sync::Arc;
use tokio::runtime::Runtime;

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    runtime: Arc<Runtime>,
}

impl ObjectStore for S3Store {
    fn head(&self, key: &str) -> Result<String, StoreError> {
        let request = self.client.head_object().bucket(&self.bucket).key(key);
        match self.runtime.block_on(request.send()) {
            Ok(output) => Ok(output.e_tag().unwrap_or_default().to_string()),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Err(StoreError::NotFound(key.to_string()))
                } else {
                    Err(StoreError::Transport(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    fn put(&self, key: &str, body: Body) -> Result<u16, StoreError> {
        let stream = match body {
            Body::Bytes(bytes) => ByteStream::from(bytes),
            Body::File(path) => self
                .runtime
                .block_on(ByteStream::from_path(&path))
                .map_err(|e| StoreError::Transport(e.to_string()))?,
        };
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type(key))
            .body(stream);
        match self.runtime.block_on(request.send()) {
            Ok(_) => Ok(200),
            Err(SdkError::ServiceError(err)) => Ok(err.raw().status().as_u16()),
            Err(err) => Err(StoreError::Transport(DisplayErrorContext(&err).to_string())),
        }
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

pub struct CloudFrontCdn {
    client: aws_sdk_cloudfront::Client,
    runtime: Arc<Runtime>,
}

impl Cdn for CloudFrontCdn {
    fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<u16, StoreError> {
        let items = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let batch = InvalidationBatch::builder()
            .paths(items)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let request = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch);
        match self.runtime.block_on(request.send()) {
            Ok(_) => Ok(201),
            Err(SdkError::ServiceError(err)) => Ok(err.raw().status().as_u16()),
            Err(err) => Err(StoreError::Transport(
                aws_sdk_cloudfront::error::DisplayErrorContext(&err).to_string(),
            )),
        }
    }
}

/// Resolve credentials, region, and endpoint, and build the clients.
pub fn connect(settings: &Settings) -> Result<Clients, PluginError> {
    let bucket = settings.require("bucket")?.to_string();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let runtime = Arc::new(runtime);

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = settings.get("region") {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    match (settings.get("access_key"), settings.get("secret_key")) {
        (Some(key), Some(secret)) => {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                key, secret, None, None, "feedpress",
            ));
        }
        (None, None) => {}
        _ => {
            return Err(settings.invalid(
                "access_key",
                "access_key and secret_key must be given together",
            ));
        }
    }
    let endpoint = settings.get("endpoint");
    if let Some(endpoint) = endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = runtime.block_on(loader.load());

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(endpoint.is_some())
        .build();
    let store = S3Store {
        client: aws_sdk_s3::Client::from_conf(s3_config),
        bucket,
        runtime: Arc::clone(&runtime),
    };

    let cdn = settings.get("distribution_id").map(|_| {
        Box::new(CloudFrontCdn {
            client: aws_sdk_cloudfront::Client::new(&shared),
            runtime: Arc::clone(&runtime),
        }) as Box<dyn Cdn>
    });

    Ok(Clients {
        store: Box::new(store),
        cdn,
    })
}

/// Content type for an object key, by extension. Text types are served as
/// UTF-8.
fn content_type(key: &str) -> String {
    let mime = mime_guess::from_path(key).first_or_octet_stream();
    if mime.type_().as_str() == "text" {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type("index.html"), "text/html; charset=utf-8");
        assert_eq!(content_type("assets/site.CSS"), "text/css; charset=utf-8");
        assert_eq!(content_type("assets/logo.svg"), "image/svg+xml");
        assert_eq!(content_type("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn scripts_and_fonts_are_not_octet_streams() {
        let module = content_type("assets/app.mjs");
        assert!(module.contains("javascript"), "{module}");
        let font = content_type("assets/fonts/body.woff");
        assert!(font.contains("woff"), "{font}");
        assert!(content_type("assets/feed.xml").contains("xml"));
    }
}
