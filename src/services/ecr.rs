//! Amazon Elastic Container Registry (JSON-1.1)

use crate::protocol::{Protocol, ServiceMetadata};
use crate::types::{epoch_seconds, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SERVICE: ServiceMetadata = ServiceMetadata {
    service_name: "ECR",
    endpoint_prefix: "api.ecr",
    signing_name: "ecr",
    protocol: Protocol::Json {
        version: "1.1",
        target_prefix: "AmazonEC2ContainerRegistry_V20150921",
    },
};

crate::string_enum!(
    /// タグの上書き可否
    ImageTagMutability {
        Mutable => "MUTABLE",
        Immutable => "IMMUTABLE",
    }
);

crate::string_enum!(
    /// 一覧取得時のタグ有無フィルタ
    TagStatus {
        Tagged => "TAGGED",
        Untagged => "UNTAGGED",
        Any => "ANY",
    }
);

crate::string_enum!(
    EncryptionType {
        Aes256 => "AES256",
        Kms => "KMS",
    }
);

crate::string_enum!(
    ImageFailureCode {
        InvalidImageDigest => "InvalidImageDigest",
        InvalidImageTag => "InvalidImageTag",
        ImageTagDoesNotMatchDigest => "ImageTagDoesNotMatchDigest",
        ImageNotFound => "ImageNotFound",
        MissingDigestAndTag => "MissingDigestAndTag",
        ImageReferencedByManifestList => "ImageReferencedByManifestList",
        KmsError => "KmsError",
    }
);

crate::service_errors!(
    /// ECR が返すエラー種別
    ErrorKind {
        EmptyUpload => "EmptyUploadException",
        ImageAlreadyExists => "ImageAlreadyExistsException",
        ImageNotFound => "ImageNotFoundException",
        ImageTagAlreadyExists => "ImageTagAlreadyExistsException",
        InvalidLayer => "InvalidLayerException",
        InvalidLayerPart => "InvalidLayerPartException",
        InvalidParameter => "InvalidParameterException",
        InvalidTagParameter => "InvalidTagParameterException",
        LayerAlreadyExists => "LayerAlreadyExistsException",
        LayerInaccessible => "LayerInaccessibleException",
        LayerPartTooSmall => "LayerPartTooSmallException",
        LayersNotFound => "LayersNotFoundException",
        LifecyclePolicyNotFound => "LifecyclePolicyNotFoundException",
        LifecyclePolicyPreviewInProgress => "LifecyclePolicyPreviewInProgressException",
        LifecyclePolicyPreviewNotFound => "LifecyclePolicyPreviewNotFoundException",
        LimitExceeded => "LimitExceededException",
        ReferencedImagesNotFound => "ReferencedImagesNotFoundException",
        RepositoryAlreadyExists => "RepositoryAlreadyExistsException",
        RepositoryNotEmpty => "RepositoryNotEmptyException",
        RepositoryNotFound => "RepositoryNotFoundException",
        RepositoryPolicyNotFound => "RepositoryPolicyNotFoundException",
        ScanNotFound => "ScanNotFoundException",
        Server => "ServerException",
        TooManyTags => "TooManyTagsException",
        UnsupportedImageType => "UnsupportedImageTypeException",
        UploadNotFound => "UploadNotFoundException",
    }
);

// --- 共通の型 ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageScanningConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_on_push: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_type: Option<EncryptionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_uri: Option<String>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag_mutability: Option<ImageTagMutability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_configuration: Option<EncryptionConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdentifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
}

impl ImageIdentifier {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            image_digest: None,
            image_tag: Some(tag.into()),
        }
    }

    pub fn digest(digest: impl Into<String>) -> Self {
        Self {
            image_digest: Some(digest.into()),
            image_tag: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_manifest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_manifest_media_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<ImageFailureCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_status: Option<TagStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationData {
    /// `user:password` の base64
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
    #[serde(
        default,
        with = "epoch_seconds::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_endpoint: Option<String>,
}

// --- リクエスト / 結果 ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepositoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag_mutability: Option<ImageTagMutability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_configuration: Option<EncryptionConfiguration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepositoryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRepositoriesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRepositoriesResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Vec<Repository>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepositoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    /// イメージが残っていても削除する
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepositoryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<ListImagesFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<ImageIdentifier>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetImageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<ImageIdentifier>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_media_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetImageResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<ImageFailure>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteImageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<ImageIdentifier>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteImageResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ids: Option<Vec<ImageIdentifier>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<ImageFailure>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthorizationTokenRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthorizationTokenResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_data: Option<Vec<AuthorizationData>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutImageTagMutabilityRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag_mutability: Option<ImageTagMutability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutImageTagMutabilityResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag_mutability: Option<ImageTagMutability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRepositoryPolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    /// IAM ポリシー文書 (JSON 文字列)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRepositoryPolicyResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagResourceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagResourceResult {}

crate::json_operations! {
    CreateRepositoryRequest => CreateRepositoryResult, "CreateRepository";
    DescribeRepositoriesRequest => DescribeRepositoriesResult, "DescribeRepositories";
    DeleteRepositoryRequest => DeleteRepositoryResult, "DeleteRepository";
    ListImagesRequest => ListImagesResult, "ListImages";
    BatchGetImageRequest => BatchGetImageResult, "BatchGetImage";
    BatchDeleteImageRequest => BatchDeleteImageResult, "BatchDeleteImage";
    GetAuthorizationTokenRequest => GetAuthorizationTokenResult, "GetAuthorizationToken";
    PutImageTagMutabilityRequest => PutImageTagMutabilityResult, "PutImageTagMutability";
    SetRepositoryPolicyRequest => SetRepositoryPolicyResult, "SetRepositoryPolicy";
    TagResourceRequest => TagResourceResult, "TagResource";
}

super::service_client!(
    /// ECR クライアント
    EcrClient(SERVICE) {
        create_repository(CreateRepositoryRequest) -> CreateRepositoryResult;
        describe_repositories(DescribeRepositoriesRequest) -> DescribeRepositoriesResult;
        delete_repository(DeleteRepositoryRequest) -> DeleteRepositoryResult;
        list_images(ListImagesRequest) -> ListImagesResult;
        batch_get_image(BatchGetImageRequest) -> BatchGetImageResult;
        batch_delete_image(BatchDeleteImageRequest) -> BatchDeleteImageResult;
        get_authorization_token(GetAuthorizationTokenRequest) -> GetAuthorizationTokenResult;
        put_image_tag_mutability(PutImageTagMutabilityRequest) -> PutImageTagMutabilityResult;
        set_repository_policy(SetRepositoryPolicyRequest) -> SetRepositoryPolicyResult;
        tag_resource(TagResourceRequest) -> TagResourceResult;
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::mock_client;
    use crate::error::Error;
    use crate::protocol::Operation;
    use crate::transport::mock::MockTransport;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn client(transport: &Arc<MockTransport>) -> EcrClient {
        EcrClient::new(mock_client(SERVICE, transport.clone()))
    }

    #[test]
    fn test_create_repository_marshall() {
        let request = CreateRepositoryRequest {
            repository_name: Some("web/frontend".to_string()),
            tags: Some(vec![Tag::new("team", "web")]),
            image_tag_mutability: Some(ImageTagMutability::Immutable),
            image_scanning_configuration: Some(ImageScanningConfiguration {
                scan_on_push: Some(true),
            }),
            encryption_configuration: None,
        };

        let http = request.marshall(&SERVICE).unwrap();
        assert_eq!(
            http.header("X-Amz-Target"),
            Some("AmazonEC2ContainerRegistry_V20150921.CreateRepository")
        );
        let body: serde_json::Value =
            serde_json::from_slice(http.body.as_bytes().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "repositoryName": "web/frontend",
                "tags": [{"Key": "team", "Value": "web"}],
                "imageTagMutability": "IMMUTABLE",
                "imageScanningConfiguration": {"scanOnPush": true}
            })
        );
    }

    #[test]
    fn test_repository_unmarshall_with_unknown_fields() {
        let json = r#"{
            "repository": {
                "repositoryArn": "arn:aws:ecr:us-east-1:123456789012:repository/web",
                "registryId": "123456789012",
                "repositoryName": "web",
                "repositoryUri": "123456789012.dkr.ecr.us-east-1.amazonaws.com/web",
                "createdAt": 1.5778368E9,
                "imageTagMutability": "MUTABLE",
                "imageTagMutabilityExclusionFilters": [],
                "encryptionConfiguration": {"encryptionType": "AES256"}
            }
        }"#;

        let result = CreateRepositoryRequest::unmarshall(crate::protocol::HttpResponse::new(
            200,
            json.to_string(),
        ))
        .unwrap();
        let repository = result.repository.unwrap();
        assert_eq!(repository.repository_name.as_deref(), Some("web"));
        assert_eq!(
            repository.created_at,
            Some(Utc.timestamp_opt(1_577_836_800, 0).unwrap())
        );
        assert_eq!(
            repository.image_tag_mutability,
            Some(ImageTagMutability::Mutable)
        );
        assert_eq!(
            repository.encryption_configuration.unwrap().encryption_type,
            Some(EncryptionType::Aes256)
        );
    }

    #[test]
    fn test_populated_request_survives_json() {
        let request = BatchDeleteImageRequest {
            registry_id: Some("123456789012".to_string()),
            repository_name: Some("web".to_string()),
            image_ids: Some(vec![
                ImageIdentifier::tag("v1"),
                ImageIdentifier::digest("sha256:abc"),
            ]),
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: BatchDeleteImageRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_populated_repository_survives_json() {
        let repository = Repository {
            repository_arn: Some("arn:aws:ecr:us-east-1:123456789012:repository/web".to_string()),
            registry_id: Some("123456789012".to_string()),
            repository_name: Some("web".to_string()),
            repository_uri: Some("123456789012.dkr.ecr.us-east-1.amazonaws.com/web".to_string()),
            created_at: Some(Utc.timestamp_millis_opt(1_577_836_800_250).unwrap()),
            image_tag_mutability: Some(ImageTagMutability::Unknown(
                "IMMUTABLE_WITH_EXCLUSION".to_string(),
            )),
            image_scanning_configuration: Some(ImageScanningConfiguration {
                scan_on_push: Some(true),
            }),
            encryption_configuration: Some(EncryptionConfiguration {
                encryption_type: Some(EncryptionType::Kms),
                kms_key: Some("alias/ecr".to_string()),
            }),
        };

        let json = serde_json::to_value(&repository).unwrap();
        assert_eq!(json["createdAt"], serde_json::json!(1_577_836_800.25));
        assert_eq!(json["imageTagMutability"], "IMMUTABLE_WITH_EXCLUSION");

        let parsed: Repository = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, repository);
    }

    #[tokio::test]
    async fn test_batch_get_image_failures() {
        let transport = Arc::new(MockTransport::new().respond_json(
            200,
            r#"{
                "images": [],
                "failures": [{
                    "imageId": {"imageTag": "missing"},
                    "failureCode": "ImageNotFound",
                    "failureReason": "Requested image not found"
                }]
            }"#,
        ));

        let result = client(&transport)
            .batch_get_image(&BatchGetImageRequest {
                repository_name: Some("web".to_string()),
                image_ids: Some(vec![ImageIdentifier::tag("missing")]),
                ..Default::default()
            })
            .await
            .unwrap();

        let failures = result.failures.unwrap();
        assert_eq!(failures[0].failure_code, Some(ImageFailureCode::ImageNotFound));
        assert_eq!(result.images, Some(vec![]));

        let sent = transport.last_request();
        assert_eq!(
            sent.header("X-Amz-Target"),
            Some("AmazonEC2ContainerRegistry_V20150921.BatchGetImage")
        );
        assert_eq!(sent.json()["imageIds"][0]["imageTag"], "missing");
        assert!(sent.json().get("registryId").is_none());
    }

    #[tokio::test]
    async fn test_repository_not_found() {
        let transport = Arc::new(MockTransport::new().respond_json(
            400,
            r#"{"__type":"RepositoryNotFoundException","message":"The repository with name 'web' does not exist"}"#,
        ));

        let err = client(&transport)
            .delete_repository(&DeleteRepositoryRequest {
                repository_name: Some("web".to_string()),
                force: Some(true),
                ..Default::default()
            })
            .await
            .unwrap_err();

        match err {
            Error::Service(e) => assert_eq!(e.kind::<ErrorKind>(), ErrorKind::RepositoryNotFound),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tag_resource_empty_result() {
        let transport = Arc::new(MockTransport::new().respond_json(200, ""));
        let result = client(&transport)
            .tag_resource(&TagResourceRequest {
                resource_arn: Some("arn:aws:ecr:us-east-1:123456789012:repository/web".to_string()),
                tags: Some(vec![Tag::new("env", "prod")]),
            })
            .await
            .unwrap();
        assert_eq!(result, TagResourceResult {});
    }

    #[tokio::test]
    async fn test_call_json_dispatch() {
        let transport = Arc::new(
            MockTransport::new().respond_json(200, r#"{"imageIds":[{"imageTag":"latest"}]}"#),
        );
        let output = client(&transport)
            .call_json(
                "ListImages",
                serde_json::json!({"repositoryName": "web", "filter": {"tagStatus": "TAGGED"}}),
            )
            .await
            .unwrap();
        assert_eq!(output["imageIds"][0]["imageTag"], "latest");
        assert_eq!(transport.last_request().json()["filter"]["tagStatus"], "TAGGED");

        let err = client(&transport)
            .call_json("NoSuchOperation", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert!(EcrClient::OPERATIONS.contains(&"GetAuthorizationToken"));
    }
}
