//! AWS Elemental MediaTailor (REST-JSON)
//!
//! オペレーションは URI とメソッドで決まる。パスラベルに入るフィールドは
//! ボディには含めない。

use crate::error::Result;
use crate::protocol::{
    expand_path, parse_json_body, rest_json_request, HttpRequest, HttpResponse, Operation,
    Protocol, ServiceMetadata,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SERVICE: ServiceMetadata = ServiceMetadata {
    service_name: "MediaTailor",
    endpoint_prefix: "api.mediatailor",
    signing_name: "mediatailor",
    protocol: Protocol::RestJson,
};

crate::service_errors!(
    /// MediaTailor が返すエラー種別
    ErrorKind {
        BadRequest => "BadRequestException",
    }
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CdnConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_segment_url_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_segment_url_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HlsConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_endpoint_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_endpoint_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpd_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_manifest_type: Option<String>,
}

/// 再生設定 (取得結果と一覧の要素)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_decision_server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_content_source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slate_ad_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcode_profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization_threshold_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_configuration: Option<CdnConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_configuration: Option<HlsConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_configuration: Option<DashConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_configuration_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_endpoint_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_initialization_endpoint_prefix: Option<String>,
    /// タグはこのサービスのみ小文字キー
    #[serde(rename = "tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetPlaybackConfigurationRequest {
    pub name: Option<String>,
}

pub type GetPlaybackConfigurationResult = PlaybackConfiguration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutPlaybackConfigurationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_decision_server_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_content_source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slate_ad_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcode_profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization_threshold_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_configuration: Option<CdnConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_configuration: Option<DashConfiguration>,
    #[serde(rename = "tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

pub type PutPlaybackConfigurationResult = PlaybackConfiguration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletePlaybackConfigurationRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletePlaybackConfigurationResult {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPlaybackConfigurationsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPlaybackConfigurationsResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<PlaybackConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl Operation for GetPlaybackConfigurationRequest {
    const NAME: &'static str = "GetPlaybackConfiguration";
    type Output = GetPlaybackConfigurationResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let path = expand_path(
            Self::NAME,
            "/playbackConfiguration/{Name}",
            &[("Name", self.name.as_deref())],
        )?;
        rest_json_request::<()>(Self::NAME, http::Method::GET, path, None)
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

impl Operation for PutPlaybackConfigurationRequest {
    const NAME: &'static str = "PutPlaybackConfiguration";
    type Output = PutPlaybackConfigurationResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        rest_json_request(
            Self::NAME,
            http::Method::PUT,
            "/playbackConfiguration".to_string(),
            Some(self),
        )
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

impl Operation for DeletePlaybackConfigurationRequest {
    const NAME: &'static str = "DeletePlaybackConfiguration";
    type Output = DeletePlaybackConfigurationResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let path = expand_path(
            Self::NAME,
            "/playbackConfiguration/{Name}",
            &[("Name", self.name.as_deref())],
        )?;
        rest_json_request::<()>(Self::NAME, http::Method::DELETE, path, None)
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

impl Operation for ListPlaybackConfigurationsRequest {
    const NAME: &'static str = "ListPlaybackConfigurations";
    type Output = ListPlaybackConfigurationsResult;

    fn marshall(&self, _service: &ServiceMetadata) -> Result<HttpRequest> {
        let request = rest_json_request::<()>(
            Self::NAME,
            http::Method::GET,
            "/playbackConfigurations".to_string(),
            None,
        )?;
        Ok(request
            .with_query("MaxResults", self.max_results)
            .with_query("NextToken", self.next_token.as_deref()))
    }

    fn unmarshall(response: HttpResponse) -> Result<Self::Output> {
        parse_json_body(Self::NAME, &response.body)
    }
}

super::service_client!(
    /// MediaTailor クライアント
    MediaTailorClient(SERVICE) {
        get_playback_configuration(GetPlaybackConfigurationRequest) -> GetPlaybackConfigurationResult;
        put_playback_configuration(PutPlaybackConfigurationRequest) -> PutPlaybackConfigurationResult;
        delete_playback_configuration(DeletePlaybackConfigurationRequest) -> DeletePlaybackConfigurationResult;
        list_playback_configurations(ListPlaybackConfigurationsRequest) -> ListPlaybackConfigurationsResult;
    }
);
