//! Object store on AWS S3 or an S3-compatible service.
//!
//! Requests are SigV4-signed by the AWS SDK. Writes carry a canned ACL and
//! every call is bounded by the configured timeout. There are no automatic
//! retries; a failed edit is retried by the user.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tokio::runtime::{Builder, Handle, Runtime};

use super::{Acl, ObjectKey, ObjectStore, StoreError};
use crate::config::StorageConfig;

/// Largest object accepted on download
pub const MAX_OBJECT_BYTES: u64 = 256 * 1024 * 1024;

/// Runs the SDK's futures for the blocking `ObjectStore` calls.
enum Driver {
    /// The store was opened inside a runtime; calls come from its blocking pool.
    Shared(Handle),
    /// Opened outside any runtime (admin tool, plain tests).
    Owned(Runtime),
}

impl Driver {
    fn new() -> std::io::Result<Self> {
        match Handle::try_current() {
            Ok(handle) => Ok(Driver::Shared(handle)),
            Err(_) => Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("pixly-s3")
                .enable_all()
                .build()
                .map(Driver::Owned),
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match self {
            Driver::Shared(handle) => handle.block_on(future),
            Driver::Owned(runtime) => runtime.block_on(future),
        }
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    driver: Driver,
    max_object_bytes: u64,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let (key_id, secret) = match (&config.access_key_id, &config.secret_key) {
            (Some(key_id), Some(secret)) if !key_id.is_empty() => (key_id, secret),
            _ => anyhow::bail!("The s3 backend needs ACCESS_KEY_ID and SECRET_KEY"),
        };
        let timeout = Duration::from_secs(config.timeout_secs);

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                key_id.as_str(),
                secret.as_str(),
                None,
                None,
                "pixly-config",
            ))
            .retry_config(RetryConfig::disabled())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(timeout)
                    .read_timeout(timeout)
                    .operation_attempt_timeout(timeout)
                    .operation_timeout(timeout)
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let driver = Driver::new().context("Failed to start runtime for the S3 client")?;
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            driver,
            max_object_bytes: MAX_OBJECT_BYTES,
        })
    }

    /// Lower the download limit.
    pub fn with_max_object_bytes(mut self, limit: u64) -> Self {
        self.max_object_bytes = limit;
        self
    }

    async fn fetch(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| map_error(key, e))?;

        let too_large =
            || StoreError::Unavailable(format!("`{key}`: object exceeds {} bytes", self.max_object_bytes));
        if output.content_length().unwrap_or(0) as u64 > self.max_object_bytes {
            return Err(too_large());
        }

        let mut body = output.body;
        let mut bytes = Vec::new();
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StoreError::Unavailable(format!("`{key}`: {e}")))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_object_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn store(&self, key: &ObjectKey, bytes: &[u8], acl: Acl) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .acl(canned_acl(acl))
            .content_type("application/octet-stream")
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| map_error(key, e))?;
        Ok(())
    }
}

fn canned_acl(acl: Acl) -> ObjectCannedAcl {
    match acl {
        Acl::Private => ObjectCannedAcl::Private,
        Acl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

fn map_error<E>(key: &ObjectKey, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) if ctx.raw().status().as_u16() == 404 => {
            StoreError::NotFound(key.clone())
        }
        SdkError::TimeoutError(_) => {
            StoreError::Timeout(format!("`{key}`: {}", DisplayErrorContext(&err)))
        }
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            StoreError::Timeout(format!("`{key}`: {}", DisplayErrorContext(&err)))
        }
        _ => StoreError::Unavailable(format!("`{key}`: {}", DisplayErrorContext(&err))),
    }
}

impl ObjectStore for S3ObjectStore {
    fn get(&self, key: &ObjectKey) -> Result<Vec<u8>, StoreError> {
        self.driver.block_on(self.fetch(key))
    }

    fn put(&self, key: &ObjectKey, bytes: &[u8], acl: Acl) -> Result<(), StoreError> {
        self.driver.block_on(self.store(key, bytes, acl))?;
        tracing::debug!(key = %key, bytes = bytes.len(), acl = acl.canned(), "Uploaded object");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackendType;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// One HTTP request as seen by the stub server.
    struct Captured {
        request_line: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    fn read_request(stream: &mut TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        Captured {
            request_line,
            headers,
            body: buf[header_end..].to_vec(),
        }
    }

    /// Accept one connection, answer it with `response` after `delay`.
    fn serve_once(response: Vec<u8>, delay: Duration) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let captured = read_request(&mut stream);
            thread::sleep(delay);
            let _ = stream.write_all(&response);
            let _ = stream.flush();
            captured
        });
        (endpoint, handle)
    }

    fn http_response(status: &str, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/xml\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    fn s3_error(code: &str) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{code}</Code><Message>stub</Message></Error>"
        )
        .into_bytes()
    }

    fn store(endpoint: &str, timeout_secs: u64) -> S3ObjectStore {
        let config = StorageConfig {
            backend: StorageBackendType::S3,
            endpoint: Some(endpoint.to_string()),
            bucket: "pixly".to_string(),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_key: Some("secret".to_string()),
            timeout_secs,
            ..Default::default()
        };
        S3ObjectStore::new(&config).unwrap()
    }

    #[test]
    fn test_put_is_signed_with_public_read_acl() {
        let (endpoint, server) = serve_once(http_response("200 OK", b""), Duration::ZERO);
        let s3 = store(&endpoint, 5);

        s3.put(&ObjectKey::for_picture(12), b"pixels", Acl::PublicRead).unwrap();

        let request = server.join().unwrap();
        assert!(request.request_line.starts_with("PUT /pixly/12"), "{}", request.request_line);
        assert_eq!(request.headers["x-amz-acl"], "public-read");
        assert!(
            request.headers["authorization"].starts_with("AWS4-HMAC-SHA256 Credential=AKIAEXAMPLE/"),
            "{}",
            request.headers["authorization"]
        );
        assert!(request.headers["authorization"].contains("x-amz-acl"));
        assert!(request.headers.contains_key("x-amz-date"));
    }

    #[test]
    fn test_get_returns_body() {
        let (endpoint, server) = serve_once(http_response("200 OK", b"stored bytes"), Duration::ZERO);
        let s3 = store(&endpoint, 5);

        assert_eq!(s3.get(&ObjectKey::for_picture(3)).unwrap(), b"stored bytes");
        let request = server.join().unwrap();
        assert!(request.request_line.starts_with("GET /pixly/3"), "{}", request.request_line);
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let (endpoint, server) =
            serve_once(http_response("404 Not Found", &s3_error("NoSuchKey")), Duration::ZERO);
        let s3 = store(&endpoint, 5);

        let key = ObjectKey::for_picture(404);
        assert_eq!(s3.get(&key), Err(StoreError::NotFound(key)));
        server.join().unwrap();
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let (endpoint, server) =
            serve_once(http_response("503 Slow Down", &s3_error("SlowDown")), Duration::ZERO);
        let s3 = store(&endpoint, 5);

        let err = s3.put(&ObjectKey::for_picture(1), b"x", Acl::PublicRead).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn test_denied_write_is_unavailable() {
        let (endpoint, server) =
            serve_once(http_response("403 Forbidden", &s3_error("AccessDenied")), Duration::ZERO);
        let s3 = store(&endpoint, 5);

        let err = s3.put(&ObjectKey::for_picture(1), b"x", Acl::PublicRead).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref reason) if reason.contains("AccessDenied")), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn test_slow_response_is_timeout() {
        let (endpoint, server) =
            serve_once(http_response("200 OK", b"late"), Duration::from_secs(3));
        let s3 = store(&endpoint, 1);

        let err = s3.get(&ObjectKey::for_picture(5)).unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_unavailable() {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let s3 = store(&format!("http://127.0.0.1:{port}"), 2);

        let err = s3.get(&ObjectKey::for_picture(1)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
    }

    #[test]
    fn test_oversized_object_is_rejected() {
        let (endpoint, server) =
            serve_once(http_response("200 OK", &[7u8; 64]), Duration::ZERO);
        let s3 = store(&endpoint, 5).with_max_object_bytes(16);

        let err = s3.get(&ObjectKey::for_picture(2)).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref reason) if reason.contains("exceeds")), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn test_credentials_are_required() {
        let config = StorageConfig {
            backend: StorageBackendType::S3,
            ..Default::default()
        };
        assert!(S3ObjectStore::new(&config).is_err());
    }
}
