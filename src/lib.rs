//! awsjson-client - AWS JSON プロトコルのサービスクライアントと Lex 音声対話クライアント
//!
//! このクレートは、AWS の JSON-1.1 / REST-JSON プロトコルで動くサービスを
//! 型付きのリクエスト・レスポンスで呼び出すクライアントと、マイク入力を
//! Amazon Lex に送って音声応答を再生する対話クライアントを提供します。
//!
//! # 主な機能
//!
//! - **共通呼び出しパイプライン**: マーシャル、SigV4 署名、送信、アンマーシャル
//! - **サービスモデル**: ECR / Secrets Manager / KMS / MediaTailor / Lex Runtime
//! - **前方互換な列挙型**: 未知の値は `Unknown(String)` として保持
//! - **音声対話**: VAD による発話区間検出、PostContent へのストリーム送信、応答の再生
//! - **WAVファイル出力**: 対話ターン毎の発話・応答の保存
//!
//! # アーキテクチャ
//!
//! ```text
//! [Typed Request] → [Operation::marshall] → [SigV4 Signer] → [HttpTransport]
//!                                                                  ↓
//! [Typed Output] ← [Operation::unmarshall] ←──── 2xx ────── [HttpResponse]
//!                        [ServiceError] ←──── それ以外 ───────────┘
//!
//! [AudioCapture] → [VAD] → [LexRuntimeClient::post_content] → [AudioPlayback]
//!                                   ↓
//!                          [InteractionEvent]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use awsjson_client::config::Config;
//! use awsjson_client::services::ecr::{DescribeRepositoriesRequest, EcrClient};
//!
//! # async fn run() -> awsjson_client::error::Result<()> {
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! let ecr = EcrClient::from_config(&config.client).await?;
//! let output = ecr
//!     .describe_repositories(&DescribeRepositoriesRequest::default())
//!     .await?;
//! for repository in output.repositories.unwrap_or_default() {
//!     println!("{:?}", repository.repository_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio_input;
pub mod audio_output;
pub mod client;
pub mod config;
pub mod enums;
pub mod error;
pub mod interaction;
pub mod protocol;
pub mod services;
pub mod signer;
pub mod transport;
pub mod types;
pub mod vad;
pub mod wav_writer;

#[doc(hidden)]
pub use serde as __serde;
