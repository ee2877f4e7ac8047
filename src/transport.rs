use crate::error::{Error, Result};
use crate::protocol::{Body, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::time::Duration;

/// HTTP 送信の共通トレイト
///
/// 署名済みリクエストを送り、レスポンス全体を返す。
/// テストではモック実装に差し替える。
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, url: String, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest による実装
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Transport(format!("HTTPクライアント作成失敗: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, url: String, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes),
            Body::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("リクエスト送信失敗: {}", e)))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("レスポンス受信失敗: {}", e)))?;

        log::trace!("HTTP {} {} バイト受信", status, body.len());

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
