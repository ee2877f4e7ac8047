use serde::{Deserialize, Serialize};

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// オーディオフォーマット情報
///
/// # Examples
///
/// ```
/// # use awsjson_client::types::AudioFormat;
/// let format = AudioFormat {
///     sample_rate: 16000,
///     channels: 1,
/// };
/// assert_eq!(format.content_type(), "audio/l16; rate=16000; channels=1");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// サンプリングレート (Hz)
    pub sample_rate: u32,

    /// チャンネル数
    pub channels: u16,
}

impl AudioFormat {
    /// Lex に送る LPCM の Content-Type
    pub fn content_type(&self) -> String {
        format!(
            "audio/l16; rate={}; channels={}",
            self.sample_rate, self.channels
        )
    }

    /// 指定サンプル数の再生時間 (ミリ秒)
    pub fn duration_ms(&self, samples: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        samples as u64 * 1000 / self.sample_rate as u64
    }
}

/// オーディオチャンク
///
/// マイクから受信したタイムスタンプ付きのモノラル音声データ。
#[derive(Clone, Debug)]
pub struct AudioChunk {
    /// PCM音声サンプルの配列
    pub samples: Vec<SampleI16>,

    /// オーディオフォーマット情報
    pub format: AudioFormat,

    /// このチャンクの開始タイムスタンプ (ナノ秒, UNIX_EPOCHからの経過時間)
    pub timestamp_ns: u128,
}

/// VAD（Voice Activity Detection）の状態
///
/// ハングオーバー機構により、音声が途切れてもすぐには
/// 無音状態に遷移しない。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VadState {
    /// 無音状態
    Silence,

    /// 音声状態
    Voice {
        /// ハングオーバー残り時間（ミリ秒）
        hangover_remaining_ms: u32,
    },
}

/// i16 PCM をリトルエンディアンのバイト列に変換
pub fn pcm_to_le_bytes(samples: &[SampleI16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// リトルエンディアンのバイト列を i16 PCM に変換
///
/// 末尾の半端な1バイトは捨てる。
pub fn le_bytes_to_pcm(bytes: &[u8]) -> Vec<SampleI16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// タイムスタンプ (エポック秒の JSON 数値) のシリアライズ
///
/// AWS JSON プロトコルはタイムスタンプを小数を含むエポック秒で表す。
pub mod epoch_seconds {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// ミリ秒精度のエポック秒 (ミリ秒未満は切り捨て)
    pub fn to_f64(value: &DateTime<Utc>) -> f64 {
        value.timestamp_millis() as f64 / 1000.0
    }

    /// エポック秒をミリ秒に丸めて変換
    pub fn from_f64(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let millis = (secs * 1000.0).round();
        if millis.abs() >= i64::MAX as f64 {
            return None;
        }
        Utc.timestamp_millis_opt(millis as i64).single()
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        let millis = value.timestamp_millis();
        if millis % 1000 == 0 {
            s.serialize_i64(millis / 1000)
        } else {
            s.serialize_f64(to_f64(value))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(d)?;
        from_f64(secs).ok_or_else(|| D::Error::custom(format!("不正なタイムスタンプ: {}", secs)))
    }

    /// `Option<DateTime<Utc>>` 用
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<f64>::deserialize(d)? {
                Some(secs) => super::from_f64(secs)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("不正なタイムスタンプ: {}", secs))),
                None => Ok(None),
            }
        }
    }
}

/// バイナリ (base64 文字列) のシリアライズ
pub mod blob_base64 {
    use aws_smithy_types::Blob;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(blob: &Blob) -> String {
        aws_smithy_types::base64::encode(blob.as_ref())
    }

    pub fn decode(text: &str) -> Result<Blob, String> {
        aws_smithy_types::base64::decode(text)
            .map(Blob::new)
            .map_err(|e| format!("base64デコードに失敗: {}", e))
    }

    /// `Option<Blob>` 用
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<Blob>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(blob) => s.serialize_str(&encode(blob)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Blob>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(text) => decode(&text).map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// 共通のキー/値タグ
///
/// ECR と Secrets Manager で共通の `{"Key": ..., "Value": ...}` 形式。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}
