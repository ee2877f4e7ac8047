//! Amazon Lex ランタイム (REST)
//!
//! PostContent は音声 (またはテキスト) をボディで送り、結果の大半を
//! `x-amz-lex-*` ヘッダで受け取る。セッション属性やスロットのような
//! マップ値は、JSON を base64 エンコードしたヘッダ値になる。

use crate::error::{Error, Result};
use crate::protocol::{
    expand_path, parse_json_body, rest_json_request, Body, BodyStream, HttpRequest,
    HttpResponse, Operation, Protocol, ServiceMetadata,
};
use crate::types::{le_bytes_to_pcm, AudioFormat, SampleI16};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

pub const SERVICE: ServiceMetadata = ServiceMetadata {
    service_name: "LexRuntime",
    endpoint_prefix: "runtime.lex",
    signing_name: "lex",
    protocol: Protocol::RestJson,
};

/// テキスト入力 / テキスト応答の MIME タイプ
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// 音声応答 (16kHz, 16bit LE, モノラル) の MIME タイプ
pub const AUDIO_PCM: &str = "audio/pcm";

const POST_CONTENT: &str = "PostContent";

crate::string_enum!(
    /// ボットとの対話状態
    DialogState {
        ElicitIntent => "ElicitIntent",
        ConfirmIntent => "ConfirmIntent",
        ElicitSlot => "ElicitSlot",
        Fulfilled => "Fulfilled",
        ReadyForFulfillment => "ReadyForFulfillment",
        Failed => "Failed",
    }
);

crate::string_enum!(
    MessageFormatType {
        PlainText => "PlainText",
        CustomPayload => "CustomPayload",
        Ssml => "SSML",
        Composite => "Composite",
    }
);

crate::string_enum!(
    DialogActionType {
        ElicitIntent => "ElicitIntent",
        ConfirmIntent => "ConfirmIntent",
        ElicitSlot => "ElicitSlot",
        Close => "Close",
        Delegate => "Delegate",
    }
);

crate::string_enum!(
    FulfillmentState {
        Fulfilled => "Fulfilled",
        Failed => "Failed",
        ReadyForFulfillment => "ReadyForFulfillment",
    }
);

crate::string_enum!(
    ContentType {
        GenericAttachment => "application/vnd.amazonaws.card.generic",
    }
);

crate::service_errors!(
    /// Lex ランタイムが返すエラー種別
    ErrorKind {
        BadGateway => "BadGatewayException",
        BadRequest => "BadRequestException",
        Conflict => "ConflictException",
        DependencyFailed => "DependencyFailedException",
        InternalFailure => "InternalFailureException",
        LimitExceeded => "LimitExceededException",
        LoopDetected => "LoopDetectedException",
        NotAcceptable => "NotAcceptableException",
        NotFound => "NotFoundException",
        RequestTimeout => "RequestTimeoutException",
        UnsupportedMediaType => "UnsupportedMediaTypeException",
    }
);

/// スロット名 → 値 (未入力は `None`)
pub type Slots = BTreeMap<String, Option<String>>;

/// セッション属性 / リクエスト属性
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_attachments: Option<Vec<GenericAttachment>>,
}

/// PutSession で指定する次のアクション
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogAction {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub action_type: Option<DialogActionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<Slots>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_to_elicit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_state: Option<FulfillmentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_format: Option<MessageFormatType>,
}

// --- PostText ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTextRequest {
    #[serde(skip_serializing)]
    pub bot_name: Option<String>,
    #[serde(skip_serializing)]
    pub bot_alias: Option<String>,
    #[serde(skip_serializing)]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTextResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<Slots>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_format: Option<MessageFormatType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_state: Option<DialogState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_to_elicit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_card: Option<ResponseCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Operation for PostTextRequest {
    const NAME: &'static str = "PostText";
    type Output = PostTextResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let path = user_path(
            Self::NAME,
            self.bot_name.as_deref(),
            self.bot_alias.as_deref(),
            self.user_id.as_deref(),
            "text",
        )?;
        rest_json_request(Self::NAME, http::Method::POST, path, Some(self))
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

// --- PostContent ---

/// PostContent のリクエスト
///
/// ボディは一度しか読めないため、値で受け取って送信する。
#[derive(Debug)]
pub struct PostContentRequest {
    pub bot_name: String,
    pub bot_alias: String,
    pub user_id: String,
    pub session_attributes: Option<Attributes>,
    pub request_attributes: Option<Attributes>,
    /// 入力の MIME タイプ (`audio/l16; rate=16000; channels=1` や `text/plain; charset=utf-8`)
    pub content_type: String,
    /// 応答の MIME タイプ。音声なら [`AUDIO_PCM`]、テキストのみなら [`TEXT_PLAIN`]
    pub accept: Option<String>,
    pub input_stream: Body,
}

impl PostContentRequest {
    /// テキスト入力
    pub fn text(
        bot_name: impl Into<String>,
        bot_alias: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            bot_alias: bot_alias.into(),
            user_id: user_id.into(),
            session_attributes: None,
            request_attributes: None,
            content_type: TEXT_PLAIN.to_string(),
            accept: None,
            input_stream: Body::Bytes(Bytes::from(text.into())),
        }
    }

    /// PCM 音声のストリーム入力
    pub fn audio(
        bot_name: impl Into<String>,
        bot_alias: impl Into<String>,
        user_id: impl Into<String>,
        format: AudioFormat,
        stream: BodyStream,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            bot_alias: bot_alias.into(),
            user_id: user_id.into(),
            session_attributes: None,
            request_attributes: None,
            content_type: format.content_type(),
            accept: None,
            input_stream: Body::Stream(stream),
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_session_attributes(mut self, attributes: Attributes) -> Self {
        self.session_attributes = Some(attributes);
        self
    }

    pub fn with_request_attributes(mut self, attributes: Attributes) -> Self {
        self.request_attributes = Some(attributes);
        self
    }

    fn into_http(self) -> Result<HttpRequest> {
        let path = user_path(
            POST_CONTENT,
            Some(self.bot_name.as_str()),
            Some(self.bot_alias.as_str()),
            Some(self.user_id.as_str()),
            "content",
        )?;
        let session_attributes = self
            .session_attributes
            .as_ref()
            .map(|a| encode_json_header(POST_CONTENT, a))
            .transpose()?;
        let request_attributes = self
            .request_attributes
            .as_ref()
            .map(|a| encode_json_header(POST_CONTENT, a))
            .transpose()?;

        Ok(HttpRequest::new(http::Method::POST, path)
            .with_header("Content-Type", self.content_type)
            .with_optional_header("Accept", self.accept)
            .with_optional_header("x-amz-lex-session-attributes", session_attributes)
            .with_optional_header("x-amz-lex-request-attributes", request_attributes)
            .with_body(self.input_stream))
    }
}

/// コンテキストの有効期限
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveContextTimeToLive {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live_in_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns_to_live: Option<i32>,
}

/// 有効なコンテキスト (`x-amz-lex-active-contexts` ヘッダ)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<ActiveContextTimeToLive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Attributes>,
}

/// PostContent / PutSession の結果
///
/// 音声応答はボディ (`audio`) に入る。JSON 出力には含めない。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostContentOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<Slots>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_format: Option<MessageFormatType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_state: Option<DialogState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_to_elicit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_contexts: Option<Vec<ActiveContext>>,
    #[serde(skip)]
    pub audio: Bytes,
}

impl PostContentOutput {
    fn from_response(operation: &'static str, response: HttpResponse) -> Result<Self> {
        let header = |name: &str| response.header(name).map(str::to_string);

        let message = match response.header("x-amz-lex-encoded-message") {
            Some(encoded) => Some(decode_text_header(operation, encoded)?),
            None => header("x-amz-lex-message"),
        };
        let input_transcript = match response.header("x-amz-lex-encoded-input-transcript") {
            Some(encoded) => Some(decode_text_header(operation, encoded)?),
            None => header("x-amz-lex-input-transcript"),
        };
        let slots = response
            .header("x-amz-lex-slots")
            .map(|v| decode_json_header(operation, v))
            .transpose()?;
        let session_attributes = response
            .header("x-amz-lex-session-attributes")
            .map(|v| decode_json_header(operation, v))
            .transpose()?;
        let active_contexts = response
            .header("x-amz-lex-active-contexts")
            .map(|v| decode_json_header(operation, v))
            .transpose()?;

        Ok(Self {
            content_type: header("Content-Type"),
            intent_name: header("x-amz-lex-intent-name"),
            slots,
            session_attributes,
            message,
            message_format: response
                .header("x-amz-lex-message-format")
                .map(MessageFormatType::from),
            dialog_state: response
                .header("x-amz-lex-dialog-state")
                .map(DialogState::from),
            slot_to_elicit: header("x-amz-lex-slot-to-elicit"),
            input_transcript,
            session_id: header("x-amz-lex-session-id"),
            active_contexts,
            audio: response.body,
        })
    }

    /// 再生できる音声応答があるか
    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
            && self
                .content_type
                .as_deref()
                .is_some_and(|t| t.starts_with("audio/"))
    }

    /// 音声応答を PCM サンプル列として取得
    pub fn audio_samples(&self) -> Vec<SampleI16> {
        le_bytes_to_pcm(&self.audio)
    }
}

// --- PutSession ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSessionRequest {
    #[serde(skip_serializing)]
    pub bot_name: Option<String>,
    #[serde(skip_serializing)]
    pub bot_alias: Option<String>,
    #[serde(skip_serializing)]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_action: Option<DialogAction>,
    /// 応答の MIME タイプ (ヘッダで送る)
    #[serde(skip_serializing)]
    pub accept: Option<String>,
}

/// PutSession は PostContent と同じヘッダ形式で結果を返す
pub type PutSessionResult = PostContentOutput;

impl Operation for PutSessionRequest {
    const NAME: &'static str = "PutSession";
    type Output = PutSessionResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let path = user_path(
            Self::NAME,
            self.bot_name.as_deref(),
            self.bot_alias.as_deref(),
            self.user_id.as_deref(),
            "session",
        )?;
        Ok(
            rest_json_request(Self::NAME, http::Method::POST, path, Some(self))?
                .with_optional_header("Accept", self.accept.as_deref()),
        )
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        PostContentOutput::from_response(Self::NAME, response)
    }
}

// --- DeleteSession ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionRequest {
    pub bot_name: Option<String>,
    pub bot_alias: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Operation for DeleteSessionRequest {
    const NAME: &'static str = "DeleteSession";
    type Output = DeleteSessionResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let path = user_path(
            Self::NAME,
            self.bot_name.as_deref(),
            self.bot_alias.as_deref(),
            self.user_id.as_deref(),
            "session",
        )?;
        rest_json_request::<()>(Self::NAME, http::Method::DELETE, path, None)
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

super::service_client!(
    /// Lex ランタイムクライアント
    ///
    /// PostContent はストリームボディを持つため `call_json` の対象外。
    LexRuntimeClient(SERVICE) {
        post_text(PostTextRequest) -> PostTextResult;
        put_session(PutSessionRequest) -> PutSessionResult;
        delete_session(DeleteSessionRequest) -> DeleteSessionResult;
    }
);

impl LexRuntimeClient {
    /// 音声またはテキストを送信し、ボットの応答を受け取る
    ///
    /// 音声ストリームの場合、ストリームが終わるまでリクエストボディを送り続ける。
    pub async fn post_content(&self, request: PostContentRequest) -> Result<PostContentOutput> {
        let started = Instant::now();
        let streaming = request.input_stream.is_stream();

        let http = request.into_http()?;
        let response = self.inner.execute(POST_CONTENT, http).await?;
        let output = PostContentOutput::from_response(POST_CONTENT, response)?;

        log::debug!(
            "PostContent: 対話状態 {:?}, 音声 {} バイト (ストリーム送信: {}, {:?})",
            output.dialog_state,
            output.audio.len(),
            streaming,
            started.elapsed()
        );
        Ok(output)
    }
}

fn user_path(
    operation: &'static str,
    bot_name: Option<&str>,
    bot_alias: Option<&str>,
    user_id: Option<&str>,
    resource: &str,
) -> Result<String> {
    expand_path(
        operation,
        &format!(
            "/bot/{{botName}}/alias/{{botAlias}}/user/{{userId}}/{}",
            resource
        ),
        &[
            ("botName", bot_name),
            ("botAlias", bot_alias),
            ("userId", user_id),
        ],
    )
}

/// マップ値を base64 JSON のヘッダ値にする
fn encode_json_header<T: Serialize>(operation: &'static str, value: &T) -> Result<String> {
    let json = serde_json::to_vec(value).map_err(|source| Error::Marshall { operation, source })?;
    Ok(aws_smithy_types::base64::encode(json))
}

fn decode_header_bytes(operation: &'static str, value: &str) -> Result<Vec<u8>> {
    aws_smithy_types::base64::decode(value).map_err(|e| Error::Unmarshall {
        operation,
        message: format!("ヘッダの base64 デコードに失敗: {}", e),
    })
}

fn decode_json_header<T: DeserializeOwned>(operation: &'static str, value: &str) -> Result<T> {
    let bytes = decode_header_bytes(operation, value)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Unmarshall {
        operation,
        message: format!("ヘッダの JSON が不正: {}", e),
    })
}

fn decode_text_header(operation: &'static str, value: &str) -> Result<String> {
    let bytes = decode_header_bytes(operation, value)?;
    String::from_utf8(bytes).map_err(|e| Error::Unmarshall {
        operation,
        message: format!("ヘッダが UTF-8 ではありません: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::mock_client;
    use crate::transport::mock::MockTransport;
    use crate::types::pcm_to_le_bytes;
    use std::sync::Arc;

    fn client(transport: &Arc<MockTransport>) -> LexRuntimeClient {
        LexRuntimeClient::new(mock_client(SERVICE, transport.clone()))
    }

    fn attributes(key: &str, value: &str) -> Attributes {
        let mut map = Attributes::new();
        map.insert(key.to_string(), value.to_string());
        map
    }

    #[tokio::test]
    async fn test_post_text_path_and_body() {
        let transport = Arc::new(MockTransport::new().respond_json(
            200,
            r#"{
                "intentName": "OrderFlowers",
                "slots": {"FlowerType": "roses", "PickupDate": null},
                "message": "What day do you want the roses to be picked up?",
                "messageFormat": "PlainText",
                "dialogState": "ElicitSlot",
                "slotToElicit": "PickupDate",
                "responseCard": {
                    "version": "1",
                    "contentType": "application/vnd.amazonaws.card.generic",
                    "genericAttachments": [{"title": "Day", "buttons": [{"text": "Today", "value": "today"}]}]
                }
            }"#,
        ));

        let result = client(&transport)
            .post_text(&PostTextRequest {
                bot_name: Some("OrderFlowers".to_string()),
                bot_alias: Some("$LATEST".to_string()),
                user_id: Some("user 1".to_string()),
                input_text: Some("I want roses".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.dialog_state, Some(DialogState::ElicitSlot));
        assert_eq!(result.slot_to_elicit.as_deref(), Some("PickupDate"));
        let slots = result.slots.unwrap();
        assert_eq!(slots["FlowerType"].as_deref(), Some("roses"));
        assert_eq!(slots["PickupDate"], None);
        let card = result.response_card.unwrap();
        assert_eq!(card.content_type, Some(ContentType::GenericAttachment));

        let sent = transport.last_request();
        assert_eq!(
            sent.url,
            "https://runtime.lex.us-east-1.amazonaws.com/bot/OrderFlowers/alias/%24LATEST/user/user%201/text"
        );
        assert_eq!(sent.json(), serde_json::json!({"inputText": "I want roses"}));
    }

    #[tokio::test]
    async fn test_post_content_text_headers() {
        let transport = Arc::new(
            MockTransport::new().respond(
                HttpResponse::new(200, "")
                    .with_header("Content-Type", "text/plain;charset=utf-8")
                    .with_header("x-amz-lex-intent-name", "OrderFlowers")
                    .with_header(
                        "x-amz-lex-slots",
                        "eyJEYXRlIjpudWxsLCJGbG93ZXJUeXBlIjoicm9zZXMifQ==",
                    )
                    .with_header("x-amz-lex-session-attributes", "eyJrIjoidiJ9")
                    .with_header("x-amz-lex-encoded-message", "V2hhdCBraW5kIG9mIGZsb3dlcnM/")
                    .with_header("x-amz-lex-encoded-input-transcript", "SSB3YW50IHJvc2Vz")
                    .with_header("x-amz-lex-dialog-state", "ElicitSlot")
                    .with_header("x-amz-lex-slot-to-elicit", "Date")
                    .with_header("x-amz-lex-session-id", "session-1"),
            ),
        );

        let request = PostContentRequest::text("OrderFlowers", "prod", "u1", "I want roses")
            .with_accept(TEXT_PLAIN)
            .with_session_attributes(attributes("k", "v"))
            .with_request_attributes(attributes("channel", "kiosk"));
        let output = client(&transport).post_content(request).await.unwrap();

        assert_eq!(output.intent_name.as_deref(), Some("OrderFlowers"));
        assert_eq!(output.message.as_deref(), Some("What kind of flowers?"));
        assert_eq!(output.input_transcript.as_deref(), Some("I want roses"));
        assert_eq!(output.dialog_state, Some(DialogState::ElicitSlot));
        assert_eq!(output.session_attributes, Some(attributes("k", "v")));
        assert_eq!(output.slots.as_ref().unwrap()["Date"], None);
        assert_eq!(output.session_id.as_deref(), Some("session-1"));
        assert!(!output.has_audio());

        let sent = transport.last_request();
        assert!(sent.url.ends_with("/bot/OrderFlowers/alias/prod/user/u1/content"));
        assert_eq!(sent.header("Content-Type"), Some(TEXT_PLAIN));
        assert_eq!(sent.header("Accept"), Some(TEXT_PLAIN));
        assert_eq!(sent.header("x-amz-lex-session-attributes"), Some("eyJrIjoidiJ9"));
        assert_eq!(
            sent.header("x-amz-lex-request-attributes"),
            Some("eyJjaGFubmVsIjoia2lvc2sifQ==")
        );
        assert_eq!(sent.body, b"I want roses");
    }

    #[tokio::test]
    async fn test_post_content_audio_stream() {
        let reply: Vec<i16> = vec![100, -100, 200, -200];
        let transport = Arc::new(
            MockTransport::new().respond(
                HttpResponse::new(200, pcm_to_le_bytes(&reply))
                    .with_header("Content-Type", "audio/pcm")
                    .with_header("x-amz-lex-message", "Thanks, your order is placed")
                    .with_header("x-amz-lex-dialog-state", "Fulfilled"),
            ),
        );

        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from(pcm_to_le_bytes(&[1, 2, 3]))),
            Ok(Bytes::from(pcm_to_le_bytes(&[4, 5]))),
        ];
        let stream: BodyStream = Box::pin(futures_util::stream::iter(chunks));
        let request = PostContentRequest::audio(
            "OrderFlowers",
            "prod",
            "u1",
            AudioFormat {
                sample_rate: 16000,
                channels: 1,
            },
            stream,
        )
        .with_accept(AUDIO_PCM);

        let output = client(&transport).post_content(request).await.unwrap();
        assert_eq!(output.dialog_state, Some(DialogState::Fulfilled));
        assert!(output.has_audio());
        assert_eq!(output.audio_samples(), reply);

        let sent = transport.last_request();
        assert_eq!(
            sent.header("Content-Type"),
            Some("audio/l16; rate=16000; channels=1")
        );
        assert_eq!(sent.header("x-amz-content-sha256"), Some("UNSIGNED-PAYLOAD"));
        assert_eq!(le_bytes_to_pcm(&sent.body), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_post_content_bad_slots_header() {
        let transport = Arc::new(
            MockTransport::new()
                .respond(HttpResponse::new(200, "").with_header("x-amz-lex-slots", "bm90IGpzb24=")),
        );
        let err = client(&transport)
            .post_content(PostContentRequest::text("b", "a", "u", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unmarshall { operation: "PostContent", .. }));
    }

    #[tokio::test]
    async fn test_post_content_requires_bot_name() {
        let transport = Arc::new(MockTransport::new());
        let err = client(&transport)
            .post_content(PostContentRequest::text("", "prod", "u1", "hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "PostContent のリクエストが不正: botName は空にできません"
        );
    }

    #[tokio::test]
    async fn test_put_session_dialog_action() {
        let contexts = aws_smithy_types::base64::encode(
            r#"[{"name":"OrderContext","timeToLive":{"timeToLiveInSeconds":600,"turnsToLive":3},"parameters":{"flower":"rose"},"newField":1}]"#,
        );
        let transport = Arc::new(MockTransport::new().respond(
            HttpResponse::new(200, "")
                .with_header("Content-Type", "text/plain;charset=utf-8")
                .with_header("x-amz-lex-dialog-state", "ElicitIntent")
                .with_header("x-amz-lex-active-contexts", &contexts),
        ));

        let result = client(&transport)
            .put_session(&PutSessionRequest {
                bot_name: Some("OrderFlowers".to_string()),
                bot_alias: Some("prod".to_string()),
                user_id: Some("u1".to_string()),
                dialog_action: Some(DialogAction {
                    action_type: Some(DialogActionType::ElicitIntent),
                    message: Some("How can I help?".to_string()),
                    ..Default::default()
                }),
                accept: Some(TEXT_PLAIN.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.dialog_state, Some(DialogState::ElicitIntent));
        assert_eq!(
            result.active_contexts,
            Some(vec![ActiveContext {
                name: Some("OrderContext".to_string()),
                time_to_live: Some(ActiveContextTimeToLive {
                    time_to_live_in_seconds: Some(600),
                    turns_to_live: Some(3),
                }),
                parameters: Some(attributes("flower", "rose")),
            }])
        );

        let sent = transport.last_request();
        assert!(sent.url.ends_with("/user/u1/session"));
        assert_eq!(sent.header("Accept"), Some(TEXT_PLAIN));
        assert_eq!(
            sent.json(),
            serde_json::json!({"dialogAction": {"type": "ElicitIntent", "message": "How can I help?"}})
        );
    }

    #[tokio::test]
    async fn test_delete_session() {
        let transport = Arc::new(MockTransport::new().respond_json(
            200,
            r#"{"botName":"OrderFlowers","botAlias":"prod","userId":"u1","sessionId":"s-1"}"#,
        ));
        let result = client(&transport)
            .call_json(
                "DeleteSession",
                serde_json::json!({"botName": "OrderFlowers", "botAlias": "prod", "userId": "u1"}),
            )
            .await
            .unwrap();
        assert_eq!(result["sessionId"], "s-1");

        let sent = transport.last_request();
        assert_eq!(sent.method, http::Method::DELETE);
        assert!(sent.body.is_empty());
        assert!(!LexRuntimeClient::OPERATIONS.contains(&"PostContent"));
    }

    #[tokio::test]
    async fn test_not_acceptable_error() {
        let transport = Arc::new(MockTransport::new().respond(
            HttpResponse::new(406, r#"{"message":"Accept header not supported"}"#)
                .with_header("x-amzn-ErrorType", "NotAcceptableException:"),
        ));
        let err = client(&transport)
            .post_content(PostContentRequest::text("b", "a", "u", "hi").with_accept("audio/mpeg-x"))
            .await
            .unwrap_err();
        let Error::Service(e) = err else {
            panic!("unexpected error: {:?}", err);
        };
        assert_eq!(e.kind::<ErrorKind>(), ErrorKind::NotAcceptable);
    }
}
