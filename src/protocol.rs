//! AWS JSON-1.1 / REST-JSON プロトコル
//!
//! 各オペレーションのリクエスト値を HTTP リクエストに変換し (マーシャル)、
//! HTTP レスポンスを結果値またはサービスエラーに変換する (アンマーシャル)。
//!
//! # マーシャル
//!
//! - JSON-1.1: `POST /`、`X-Amz-Target: <TargetPrefix>.<Operation>`、
//!   `Content-Type: application/x-amz-json-1.1`、ボディは値の JSON
//! - REST-JSON: URI テンプレート (`/bot/{botName}/...`) にラベルを埋め込み、
//!   残りのフィールドを JSON ボディにする
//!
//! `None` のフィールドは出力しない。
//!
//! # アンマーシャル
//!
//! 2xx のボディを結果型にデシリアライズする。未知のフィールドは無視する。
//! 空ボディは結果型のデフォルト値になる。

use crate::error::{Error, Result, ServiceError};
use bytes::Bytes;
use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;

/// JSON-1.1 の Content-Type
pub const AMZ_JSON_1_1: &str = "application/x-amz-json-1.1";

/// REST-JSON の Content-Type
pub const REST_JSON: &str = "application/json";

/// サービスのワイヤプロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `X-Amz-Target` ヘッダでオペレーションを指定する JSON RPC
    Json {
        /// `application/x-amz-json-{version}` の version
        version: &'static str,
        /// `X-Amz-Target` の接頭辞
        target_prefix: &'static str,
    },
    /// URI とメソッドでオペレーションを指定する REST
    RestJson,
}

/// サービスのメタデータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceMetadata {
    /// 表示名
    pub service_name: &'static str,
    /// エンドポイントのホスト名接頭辞 (`{prefix}.{region}.amazonaws.com`)
    pub endpoint_prefix: &'static str,
    /// SigV4 のサービス名
    pub signing_name: &'static str,
    pub protocol: Protocol,
}

impl ServiceMetadata {
    /// 既定のエンドポイント URL
    pub fn default_endpoint(&self, region: &str) -> String {
        format!("https://{}.{}.amazonaws.com", self.endpoint_prefix, region)
    }
}

pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// リクエストボディ
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// 長さ不明のストリーム (音声送信など)。署名は UNSIGNED-PAYLOAD になる。
    Stream(BodyStream),
}

impl Body {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[]),
            Body::Bytes(bytes) => Some(bytes.as_ref()),
            Body::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

/// マーシャル済みの HTTP リクエスト
#[derive(Debug)]
pub struct HttpRequest {
    pub method: http::Method,
    /// リソースパス (エンドポイントからの相対)
    pub path: String,
    /// クエリパラメータ (追加順)
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn new(method: http::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// 値が `Some` の場合のみヘッダを追加
    pub fn with_optional_header(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_header(name, value),
            None => self,
        }
    }

    /// 値が `Some` の場合のみクエリパラメータを追加
    pub fn with_query(mut self, name: &str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.query.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// ヘッダ値を取得 (名前は大文字小文字を区別しない)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// パスとクエリ文字列を連結した URI の末尾部分
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// HTTP レスポンス
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: http::HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 1つの API 呼び出し
///
/// リクエスト型に実装し、結果型とマーシャル/アンマーシャルを結び付ける。
pub trait Operation: Send + Sync {
    /// オペレーション名 (例: "CreateRepository")
    const NAME: &'static str;

    type Output: Send;

    /// リクエスト値を HTTP リクエストに変換
    fn marshall(&self, service: &ServiceMetadata) -> Result<HttpRequest>;

    /// 成功レスポンスを結果値に変換
    fn unmarshall(response: HttpResponse) -> Result<Self::Output>;
}

/// JSON-1.1 RPC のリクエストを組み立てる
pub fn json_rpc_request<T: Serialize>(
    operation: &'static str,
    service: &ServiceMetadata,
    value: &T,
) -> Result<HttpRequest> {
    let Protocol::Json {
        version,
        target_prefix,
    } = service.protocol
    else {
        return Err(Error::InvalidRequest {
            operation,
            message: format!("{} は JSON RPC サービスではありません", service.service_name),
        });
    };

    let body = serde_json::to_vec(value).map_err(|source| Error::Marshall { operation, source })?;

    Ok(HttpRequest::new(http::Method::POST, "/")
        .with_header("X-Amz-Target", format!("{}.{}", target_prefix, operation))
        .with_header("Content-Type", format!("application/x-amz-json-{}", version))
        .with_body(Body::Bytes(Bytes::from(body))))
}

/// REST-JSON のリクエストを組み立てる
///
/// `value` が `None` の場合はボディなし。
pub fn rest_json_request<T: Serialize>(
    operation: &'static str,
    method: http::Method,
    path: String,
    value: Option<&T>,
) -> Result<HttpRequest> {
    let request = HttpRequest::new(method, path);
    match value {
        Some(value) => {
            let body =
                serde_json::to_vec(value).map_err(|source| Error::Marshall { operation, source })?;
            Ok(request
                .with_header("Content-Type", REST_JSON)
                .with_body(Body::Bytes(Bytes::from(body))))
        }
        None => Ok(request),
    }
}

/// URI テンプレートにラベルを埋め込む
///
/// `{name}` はパーセントエンコードした値、`{name+}` は `/` を残して
/// セグメント毎にエンコードした値に置換する。値が無い、または空の
/// ラベルはエラー。
///
/// ```
/// # use awsjson_client::protocol::expand_path;
/// let path = expand_path(
///     "PostText",
///     "/bot/{botName}/alias/{botAlias}/user/{userId}/text",
///     &[("botName", Some("Order")), ("botAlias", Some("$LATEST")), ("userId", Some("u 1"))],
/// )
/// .unwrap();
/// assert_eq!(path, "/bot/Order/alias/%24LATEST/user/u%201/text");
/// ```
pub fn expand_path(
    operation: &'static str,
    template: &str,
    labels: &[(&str, Option<&str>)],
) -> Result<String> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let end = rest[start..].find('}').map(|i| start + i).ok_or_else(|| {
            Error::InvalidRequest {
                operation,
                message: format!("URI テンプレートが不正: {}", template),
            }
        })?;

        let raw_label = &rest[start + 1..end];
        let (label, greedy) = match raw_label.strip_suffix('+') {
            Some(label) => (label, true),
            None => (raw_label, false),
        };

        let value = labels
            .iter()
            .find(|(name, _)| *name == label)
            .and_then(|(_, value)| *value)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::InvalidRequest {
                operation,
                message: format!("{} は空にできません", label),
            })?;

        if greedy {
            let encoded = value
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect::<Vec<_>>()
                .join("/");
            path.push_str(&encoded);
        } else {
            path.push_str(&urlencoding::encode(value));
        }

        rest = &rest[end + 1..];
    }
    path.push_str(rest);

    Ok(path)
}

/// 成功レスポンスのボディを結果型にデシリアライズする
///
/// 空ボディはデフォルト値。未知のフィールドは無視する。
pub fn parse_json_body<T: DeserializeOwned + Default>(
    operation: &'static str,
    body: &[u8],
) -> Result<T> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::Unmarshall {
        operation,
        message: e.to_string(),
    })
}

/// エラーレスポンスからサービスエラーを組み立てる
///
/// エラーコードは `x-amzn-ErrorType` ヘッダ (`:` より前)、ボディの
/// `__type` (`#` より後)、`code` の順で探す。
pub fn parse_error(response: &HttpResponse) -> ServiceError {
    let body: serde_json::Value =
        serde_json::from_slice(&response.body).unwrap_or(serde_json::Value::Null);
    let field = |name: &str| body.get(name).and_then(|v| v.as_str()).map(str::to_string);

    let code = response
        .header("x-amzn-ErrorType")
        .map(|v| v.split(':').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            field("__type").map(|t| t.rsplit('#').next().unwrap_or(&t).to_string())
        })
        .or_else(|| field("code"))
        .unwrap_or_else(|| match response.status {
            400..=499 => "ClientError".to_string(),
            _ => "ServiceUnavailable".to_string(),
        });

    let message = field("message")
        .or_else(|| field("Message"))
        .or_else(|| field("errorMessage"))
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());

    ServiceError {
        status: response.status,
        code,
        message,
        request_id: response.header("x-amzn-RequestId").map(str::to_string),
    }
}

/// JSON-1.1 RPC のオペレーションを宣言する
///
/// リクエスト型全体を JSON ボディとし、結果はボディ全体からデシリアライズする。
#[macro_export]
macro_rules! json_operations {
    ($($request:ty => $output:ty, $name:literal;)*) => {
        $(
            impl $crate::protocol::Operation for $request {
                const NAME: &'static str = $name;
                type Output = $output;

                fn marshall(
                    &self,
                    service: &$crate::protocol::ServiceMetadata,
                ) -> $crate::error::Result<$crate::protocol::HttpRequest> {
                    $crate::protocol::json_rpc_request($name, service, self)
                }

                fn unmarshall(
                    response: $crate::protocol::HttpResponse,
                ) -> $crate::error::Result<Self::Output> {
                    $crate::protocol::parse_json_body($name, &response.body)
                }
            }
        )*
    };
}
