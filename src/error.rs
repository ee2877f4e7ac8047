//! クライアントのエラー型
//!
//! 失敗は大きく2種類に分かれる。
//!
//! - クライアント側エラー: リクエスト組み立て (JSONエンコード、パス展開)、
//!   署名、通信、レスポンス解析の失敗。原因となったエラーを保持する。
//! - サービスエラー: サービスが返したエラーレスポンス。エラーコードは
//!   各サービスのエラー種別 (`services::*::ErrorKind`) に変換できる。
//!
//! リトライやバックオフは行わず、全てのエラーは呼び出し元へ伝播する。

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// リクエストのJSONエンコードに失敗
    #[error("{operation} のリクエスト生成に失敗: {source}")]
    Marshall {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// リクエスト値が不正 (パスラベルの欠落など)
    #[error("{operation} のリクエストが不正: {message}")]
    InvalidRequest {
        operation: &'static str,
        message: String,
    },

    /// レスポンスの解析に失敗
    #[error("{operation} のレスポンス解析に失敗: {message}")]
    Unmarshall {
        operation: &'static str,
        message: String,
    },

    /// 認証情報の取得に失敗
    #[error("認証情報の取得に失敗: {0}")]
    Credentials(String),

    /// SigV4署名に失敗
    #[error("リクエスト署名に失敗: {0}")]
    Signing(String),

    /// HTTP通信エラー
    #[error("HTTP通信エラー: {0}")]
    Transport(String),

    /// サービスが返したエラー
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// 処理中の対話があるため要求を受け付けられない
    #[error("{0} の処理中です")]
    Busy(&'static str),

    /// Tokio ランタイムの外から非同期処理を開始しようとした
    #[error("Tokio ランタイムの外では {0} を開始できません")]
    NoRuntime(&'static str),

    /// 音声デバイスエラー
    #[error("音声デバイスエラー: {0:#}")]
    Audio(anyhow::Error),

    /// 呼び出し元によるキャンセル
    #[error("キャンセルされました")]
    Cancelled,
}

impl Error {
    /// サービスエラーであればそのエラーコードを返す
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Error::Service(e) => Some(e.code.as_str()),
            _ => None,
        }
    }

    /// クライアント側 (リクエスト送信前後のローカル処理) のエラーかどうか
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Service(_))
    }
}

/// サービスが返したエラーレスポンス
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code} (HTTP {status}): {message}")]
pub struct ServiceError {
    /// HTTPステータスコード
    pub status: u16,
    /// エラーコード (例: "RepositoryNotFoundException")
    pub code: String,
    /// エラーメッセージ
    pub message: String,
    /// `x-amzn-RequestId` ヘッダの値
    pub request_id: Option<String>,
}

impl ServiceError {
    /// エラーコードを各サービスのエラー種別に変換
    ///
    /// ```
    /// # use awsjson_client::error::ServiceError;
    /// # use awsjson_client::services::ecr::ErrorKind;
    /// let err = ServiceError {
    ///     status: 400,
    ///     code: "RepositoryNotFoundException".to_string(),
    ///     message: "not found".to_string(),
    ///     request_id: None,
    /// };
    /// assert_eq!(err.kind::<ErrorKind>(), ErrorKind::RepositoryNotFound);
    /// ```
    pub fn kind<K: ErrorCode>(&self) -> K {
        K::from_code(&self.code)
    }

    /// 5xx (サーバ側) エラーかどうか
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// サービス固有のエラー種別
///
/// 未知のコードは汎用の `Unknown` 種別にフォールバックする。
pub trait ErrorCode: Sized {
    fn from_code(code: &str) -> Self;
}

/// サービス毎のエラー種別enumを宣言する
///
/// 各バリアントは `"<Name>Exception"` 形式のエラーコードに対応し、
/// 一致しないコードは `Unknown(String)` になる。
#[macro_export]
macro_rules! service_errors {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant,)*
            Unknown(String),
        }

        impl $crate::error::ErrorCode for $name {
            fn from_code(code: &str) -> Self {
                match code {
                    $($code => $name::$variant,)*
                    other => $name::Unknown(other.to_string()),
                }
            }
        }

        impl $name {
            pub fn code(&self) -> &str {
                match self {
                    $($name::$variant => $code,)*
                    $name::Unknown(code) => code.as_str(),
                }
            }
        }
    };
}
