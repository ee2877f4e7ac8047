//! SigV4 署名
//!
//! `aws-sigv4` で [`HttpRequest`] に署名し、署名ヘッダを追加する。
//! ストリームボディは `UNSIGNED-PAYLOAD` として署名し、
//! `x-amz-content-sha256` ヘッダを付ける。

use crate::error::{Error, Result};
use crate::protocol::{Body, HttpRequest};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, SignableBody, SignableRequest, SigningSettings,
};
use aws_sigv4::sign::v4;
use std::time::SystemTime;

/// 署名に必要なパラメータ
#[derive(Debug, Clone)]
pub struct SigningContext<'a> {
    pub region: &'a str,
    pub signing_name: &'a str,
    pub time: SystemTime,
}

/// リクエストに署名してヘッダを追加する
///
/// # Arguments
/// * `request` - 署名対象。`Host` を除く既存ヘッダも署名に含める
/// * `url` - エンドポイントを含む完全な URL
pub fn sign_request(
    request: &mut HttpRequest,
    url: &str,
    credentials: &Credentials,
    context: &SigningContext<'_>,
) -> Result<()> {
    let identity = credentials.clone().into();

    let mut settings = SigningSettings::default();
    if request.body.is_stream() {
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
    }

    let params = v4::SigningParams::builder()
        .identity(&identity)
        .region(context.region)
        .name(context.signing_name)
        .time(context.time)
        .settings(settings)
        .build()
        .map_err(|e| Error::Signing(format!("署名パラメータの構築に失敗: {}", e)))?;

    let body = match &request.body {
        Body::Empty => SignableBody::Bytes(&[]),
        Body::Bytes(bytes) => SignableBody::Bytes(bytes.as_ref()),
        Body::Stream(_) => SignableBody::UnsignedPayload,
    };

    let headers: Vec<(&str, &str)> = request
        .headers
        .iter()
        .map(|(n, v)| (n.as_str(), v.as_str()))
        .collect();

    let signable = SignableRequest::new(request.method.as_str(), url, headers.into_iter(), body)
        .map_err(|e| Error::Signing(format!("署名対象リクエストの作成に失敗: {}", e)))?;

    let (instructions, _signature) = sign(signable, &params.into())
        .map_err(|e| Error::Signing(e.to_string()))?
        .into_parts();

    // 署名指示を一時的な http::Request に適用してヘッダを取り出す
    let mut temp_request = http::Request::builder()
        .method(request.method.clone())
        .uri(url)
        .body(())
        .map_err(|e| Error::Signing(format!("一時リクエストの構築に失敗: {}", e)))?;
    instructions.apply_to_request_http1x(&mut temp_request);

    for (name, value) in temp_request.headers() {
        let value = value.to_str().unwrap_or_default().to_string();
        request.headers.push((name.to_string(), value));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", None, None, "test")
    }

    fn context() -> SigningContext<'static> {
        SigningContext {
            region: "us-east-1",
            signing_name: "ecr",
            time: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
        }
    }

    #[test]
    fn test_sign_adds_authorization() {
        let mut request = HttpRequest::new(http::Method::POST, "/")
            .with_header("X-Amz-Target", "AmazonEC2ContainerRegistry_V20150921.ListImages")
            .with_header("Content-Type", "application/x-amz-json-1.1")
            .with_body(Body::Bytes(Bytes::from_static(b"{}")));

        sign_request(
            &mut request,
            "https://api.ecr.us-east-1.amazonaws.com/",
            &credentials(),
            &context(),
        )
        .unwrap();

        let auth = request.header("authorization").unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20231114/us-east-1/ecr/aws4_request"));
        assert!(auth.contains("x-amz-target"));
        assert!(request.header("x-amz-date").is_some());
        assert!(request.header("x-amz-content-sha256").is_none());
    }

    #[test]
    fn test_sign_stream_is_unsigned_payload() {
        let stream = futures_util::stream::empty::<std::io::Result<Bytes>>();
        let mut request = HttpRequest::new(http::Method::POST, "/bot/b/alias/a/user/u/content")
            .with_header("Content-Type", "audio/l16; rate=16000; channels=1")
            .with_body(Body::Stream(Box::pin(stream)));

        sign_request(
            &mut request,
            "https://runtime.lex.us-east-1.amazonaws.com/bot/b/alias/a/user/u/content",
            &credentials(),
            &SigningContext {
                signing_name: "lex",
                ..context()
            },
        )
        .unwrap();

        assert_eq!(
            request.header("x-amz-content-sha256"),
            Some("UNSIGNED-PAYLOAD")
        );
    }

    #[test]
    fn test_session_token_header() {
        let creds = Credentials::new("AKID", "SECRET", Some("TOKEN".to_string()), None, "test");
        let mut request = HttpRequest::new(http::Method::GET, "/playbackConfigurations");
        sign_request(
            &mut request,
            "https://api.mediatailor.us-east-1.amazonaws.com/playbackConfigurations",
            &creds,
            &context(),
        )
        .unwrap();
        assert_eq!(request.header("x-amz-security-token"), Some("TOKEN"));
    }
}
