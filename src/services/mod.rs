//! サービス毎のモデル、列挙型、オペレーション、エラー種別、クライアント
//!
//! | モジュール | プロトコル | オペレーション数 |
//! |---|---|---|
//! | [`ecr`] | JSON-1.1 | 10 |
//! | [`secretsmanager`] | JSON-1.1 | 8 |
//! | [`kms`] | JSON-1.1 | 6 |
//! | [`mediatailor`] | REST-JSON | 4 |
//! | [`lexruntime`] | REST | 4 |

/// サービスの型付きクライアントを宣言する
///
/// オペレーション毎のメソッドと、オペレーション名と JSON で呼び出す
/// `call_json` (CLI 用) を生成する。
macro_rules! service_client {
    (
        $(#[$meta:meta])*
        $client:ident($metadata:expr) {
            $($method:ident($request:ty) -> $output:ty;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $client {
            inner: $crate::client::ServiceClient,
        }

        impl $client {
            /// 既存の [`ServiceClient`](crate::client::ServiceClient) から作成
            pub fn new(inner: $crate::client::ServiceClient) -> Self {
                Self { inner }
            }

            /// 設定と環境の認証情報から作成
            pub async fn from_config(
                config: &$crate::config::ClientConfig,
            ) -> $crate::error::Result<Self> {
                $crate::client::ServiceClient::from_config($metadata, config)
                    .await
                    .map(Self::new)
            }

            pub fn inner(&self) -> &$crate::client::ServiceClient {
                &self.inner
            }

            /// JSON で呼び出せるオペレーション名
            pub const OPERATIONS: &'static [&'static str] = &[
                $(<$request as $crate::protocol::Operation>::NAME),*
            ];

            $(
                pub async fn $method(
                    &self,
                    request: &$request,
                ) -> $crate::error::Result<$output> {
                    self.inner.invoke(request).await
                }
            )*

            /// オペレーション名と JSON 入力で呼び出し、結果を JSON で返す
            pub async fn call_json(
                &self,
                operation: &str,
                input: serde_json::Value,
            ) -> $crate::error::Result<serde_json::Value> {
                $(
                    if operation == <$request as $crate::protocol::Operation>::NAME {
                        let name = <$request as $crate::protocol::Operation>::NAME;
                        let request: $request = serde_json::from_value(input).map_err(|e| {
                            $crate::error::Error::InvalidRequest {
                                operation: name,
                                message: e.to_string(),
                            }
                        })?;
                        let output = self.$method(&request).await?;
                        return serde_json::to_value(&output).map_err(|e| {
                            $crate::error::Error::Unmarshall {
                                operation: name,
                                message: e.to_string(),
                            }
                        });
                    }
                )*
                Err($crate::error::Error::InvalidRequest {
                    operation: "call_json",
                    message: format!("未知のオペレーション: {}", operation),
                })
            }
        }
    };
}

pub(crate) use service_client;

pub mod ecr;
pub mod kms;
pub mod lexruntime;
pub mod mediatailor;
pub mod secretsmanager;
