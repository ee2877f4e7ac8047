use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{parse_error, HttpRequest, HttpResponse, Operation, ServiceMetadata};
use crate::signer::{sign_request, SigningContext};
use crate::transport::{HttpTransport, ReqwestTransport};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// 1つのサービスに対する呼び出しパイプライン
///
/// マーシャル → エンドポイント解決 → SigV4 署名 → 送信 → アンマーシャル
/// の順に処理する。リトライは行わない。
#[derive(Clone)]
pub struct ServiceClient {
    service: ServiceMetadata,
    region: String,
    endpoint: String,
    credentials: SharedCredentialsProvider,
    transport: Arc<dyn HttpTransport>,
}

impl ServiceClient {
    pub fn new(
        service: ServiceMetadata,
        region: impl Into<String>,
        credentials: SharedCredentialsProvider,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let region = region.into();
        let endpoint = service.default_endpoint(&region);
        Self {
            service,
            region,
            endpoint,
            credentials,
            transport,
        }
    }

    /// 設定と環境の認証情報からクライアントを作成
    ///
    /// 認証情報は `aws-config` の既定チェーン (環境変数、プロファイル、
    /// IMDS など) から読み込む。
    pub async fn from_config(service: ServiceMetadata, config: &ClientConfig) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let credentials = sdk_config
            .credentials_provider()
            .ok_or_else(|| Error::Credentials("認証情報プロバイダが設定されていません".to_string()))?;

        let transport = ReqwestTransport::new(
            Duration::from_secs(config.timeout_seconds),
            &config.user_agent,
        )?;

        let mut client = Self::new(service, &config.region, credentials, Arc::new(transport));
        if let Some(endpoint) = config.endpoint_for(service.endpoint_prefix) {
            client = client.with_endpoint(endpoint);
        }
        Ok(client)
    }

    /// エンドポイントを上書き (ローカルのモックサーバなど)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn service(&self) -> &ServiceMetadata {
        &self.service
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// オペレーションを実行
    pub async fn invoke<O: Operation>(&self, operation: &O) -> Result<O::Output> {
        let started = Instant::now();

        let request = operation.marshall(&self.service)?;
        log::debug!(
            "{}.{}: マーシャル完了 ({:?})",
            self.service.service_name,
            O::NAME,
            started.elapsed()
        );

        let result = match self.execute(O::NAME, request).await {
            Ok(response) => O::unmarshall(response),
            Err(e) => Err(e),
        };

        log::debug!(
            "{}.{}: 実行時間 {:?}",
            self.service.service_name,
            O::NAME,
            started.elapsed()
        );

        result
    }

    /// マーシャル済みのリクエストを署名して送信する
    ///
    /// 2xx 以外のレスポンスは [`Error::Service`] になる。ストリームボディの
    /// ように `Operation` で表せない呼び出しはこちらを直接使う。
    pub async fn execute(
        &self,
        operation: &'static str,
        mut request: HttpRequest,
    ) -> Result<HttpResponse> {
        let url = format!("{}{}", self.endpoint, request.path_and_query());

        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::Credentials(e.to_string()))?;

        sign_request(
            &mut request,
            &url,
            &credentials,
            &SigningContext {
                region: &self.region,
                signing_name: self.service.signing_name,
                time: SystemTime::now(),
            },
        )?;

        let response = self.transport.send(url, request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = parse_error(&response);
        log::warn!(
            "{}.{}: サービスエラー {} (HTTP {}, RequestId: {})",
            self.service.service_name,
            operation,
            error.code,
            error.status,
            error.request_id.as_deref().unwrap_or("-")
        );
        Err(Error::Service(error))
    }
}
