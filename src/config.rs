use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
}

/// サービスクライアント設定
///
/// # デフォルト値
///
/// - `region`: "us-east-1"
/// - `timeout_seconds`: 30 秒
/// - `user_agent`: "awsjson-client/<version>"
/// - `endpoints`: なし (`https://{prefix}.{region}.amazonaws.com` を使用)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// エンドポイント接頭辞 → URL の上書き (例: `"api.ecr" = "http://localhost:4566"`)
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

/// オーディオ入出力設定
///
/// # デフォルト値
///
/// - `input_device`: "default" (システムのデフォルト入力)
/// - `output_device`: なし (システムのデフォルト出力)
/// - `sample_rate`: 16000 Hz (Lex の LPCM 入力に合わせる)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_input_device")]
    pub input_device: String,
    pub output_device: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

/// VAD (Voice Activity Detection) 設定
///
/// # デフォルト値
///
/// - `threshold_db`: -40.0 dB
/// - `hangover_duration_ms`: 600 ms (この長さの無音で発話終了とみなす)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VadConfig {
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f32,
    #[serde(default = "default_hangover_duration_ms")]
    pub hangover_duration_ms: u32,
}

/// 音声対話設定
///
/// # デフォルト値
///
/// - `bot_alias`: "$LATEST"
/// - `user_id`: "awsjson-user"
/// - `no_speech_timeout_ms`: 2000 ms
/// - `max_speech_ms`: 15000 ms
/// - `pre_roll_ms`: 300 ms (発話開始前から送る音声の長さ)
/// - `playback`: true (音声応答を再生する)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InteractionConfig {
    #[serde(default)]
    pub bot_name: String,
    #[serde(default = "default_bot_alias")]
    pub bot_alias: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_no_speech_timeout_ms")]
    pub no_speech_timeout_ms: u64,
    #[serde(default = "default_max_speech_ms")]
    pub max_speech_ms: u64,
    #[serde(default = "default_pre_roll_ms")]
    pub pre_roll_ms: u64,
    #[serde(default = "default_playback")]
    pub playback: bool,
    /// 送信した発話をWAVで保存するディレクトリ
    pub record_dir: Option<String>,
}

// Default functions
fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("awsjson-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_input_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_threshold_db() -> f32 {
    -40.0
}

fn default_hangover_duration_ms() -> u32 {
    600
}

fn default_bot_alias() -> String {
    "$LATEST".to_string()
}

fn default_user_id() -> String {
    "awsjson-user".to_string()
}

fn default_no_speech_timeout_ms() -> u64 {
    2000
}

fn default_max_speech_ms() -> u64 {
    15000
}

fn default_pre_roll_ms() -> u64 {
    300
}

fn default_playback() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: default_input_device(),
            output_device: None,
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
            hangover_duration_ms: default_hangover_duration_ms(),
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            bot_name: String::new(),
            bot_alias: default_bot_alias(),
            user_id: default_user_id(),
            no_speech_timeout_ms: default_no_speech_timeout_ms(),
            max_speech_ms: default_max_speech_ms(),
            pre_roll_ms: default_pre_roll_ms(),
            playback: default_playback(),
            record_dir: None,
        }
    }
}

impl ClientConfig {
    /// エンドポイント接頭辞に対する上書き URL
    pub fn endpoint_for(&self, endpoint_prefix: &str) -> Option<&str> {
        self.endpoints.get(endpoint_prefix).map(String::as_str)
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use awsjson_client::config::Config;
    /// let config = Config::from_file("awsjson.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// ファイルが存在するがパースに失敗した場合はエラー。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.client.region, "us-east-1");
        assert_eq!(config.client.timeout_seconds, 30);
        assert!(config.client.user_agent.starts_with("awsjson-client/"));
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.vad.threshold_db, -40.0);
        assert_eq!(config.interaction.bot_alias, "$LATEST");
        assert_eq!(config.interaction.no_speech_timeout_ms, 2000);
        assert!(config.interaction.playback);
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::write_default(path).unwrap();

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.client.region, "us-east-1");
        assert_eq!(config.interaction.max_speech_ms, 15000);
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[client]
region = "ap-northeast-1"
timeout_seconds = 5

[client.endpoints]
"api.ecr" = "http://localhost:4566"

[audio]
input_device = "USB Mic"
output_device = "Speakers"
sample_rate = 16000

[vad]
threshold_db = -35.0
hangover_duration_ms = 800

[interaction]
bot_name = "OrderFlowers"
bot_alias = "prod"
user_id = "kiosk-1"
no_speech_timeout_ms = 3000
max_speech_ms = 10000
playback = false
record_dir = "/tmp/turns"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.client.region, "ap-northeast-1");
        assert_eq!(config.client.timeout_seconds, 5);
        assert_eq!(
            config.client.endpoint_for("api.ecr"),
            Some("http://localhost:4566")
        );
        assert_eq!(config.client.endpoint_for("secretsmanager"), None);
        assert_eq!(config.audio.input_device, "USB Mic");
        assert_eq!(config.audio.output_device.as_deref(), Some("Speakers"));
        assert_eq!(config.vad.threshold_db, -35.0);
        assert_eq!(config.vad.hangover_duration_ms, 800);
        assert_eq!(config.interaction.bot_name, "OrderFlowers");
        assert_eq!(config.interaction.bot_alias, "prod");
        assert_eq!(config.interaction.user_id, "kiosk-1");
        assert_eq!(config.interaction.no_speech_timeout_ms, 3000);
        assert!(!config.interaction.playback);
        assert_eq!(config.interaction.record_dir.as_deref(), Some("/tmp/turns"));
        // 未指定の値はデフォルト
        assert_eq!(config.interaction.pre_roll_ms, 300);
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[client\nregion = 1").unwrap();
        temp_file.flush().unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }
}
