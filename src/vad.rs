use crate::config::VadConfig;
use crate::types::{SampleI16, VadState};

/// VAD の状態遷移
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VadTransition {
    /// 状態変化なし
    None,
    /// 無音 → 音声
    SpeechStarted,
    /// 音声 → 無音 (ハングオーバー満了)
    SpeechEnded,
}

/// Voice Activity Detector (音声区間検出器)
///
/// RMS (Root Mean Square) ベースのシンプルなVAD実装。
/// 音声パワーが閾値を超えたら音声区間と判定し、
/// 下回ってもハングオーバー期間は音声継続とみなす。
///
/// 対話クライアントでは発話開始の検出と、発話終了 (ハングオーバー満了)
/// による送信終了の判定に使う。
///
/// # Examples
///
/// ```
/// # use awsjson_client::vad::{VoiceActivityDetector, VadTransition};
/// # use awsjson_client::config::VadConfig;
/// let config = VadConfig {
///     threshold_db: -40.0,
///     hangover_duration_ms: 500,
/// };
/// let mut vad = VoiceActivityDetector::new(&config, 16000);
///
/// let silence = vec![0i16; 1600];
/// assert_eq!(vad.process(&silence), VadTransition::None);
///
/// let voice: Vec<i16> = (0..1600)
///     .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
///     .collect();
/// assert_eq!(vad.process(&voice), VadTransition::SpeechStarted);
/// ```
pub struct VoiceActivityDetector {
    /// 音声判定の閾値 (dB)
    threshold_db: f32,

    /// ハングオーバー期間 (ミリ秒)
    hangover_duration_ms: u32,

    state: VadState,

    /// サンプリングレート (Hz)
    sample_rate: u32,

    /// 直近チャンクの音量 (dB)
    last_db: f32,
}

impl VoiceActivityDetector {
    pub fn new(config: &VadConfig, sample_rate: u32) -> Self {
        Self {
            threshold_db: config.threshold_db,
            hangover_duration_ms: config.hangover_duration_ms,
            state: VadState::Silence,
            sample_rate,
            last_db: -100.0,
        }
    }

    /// 音声サンプルを処理して状態遷移を返す
    pub fn process(&mut self, samples: &[SampleI16]) -> VadTransition {
        if samples.is_empty() {
            return VadTransition::None;
        }

        let db = rms_to_db(calculate_rms(samples));
        self.last_db = db;

        // サンプル数から経過時間を計算（ミリ秒）
        let duration_ms = (samples.len() as f64 / self.sample_rate as f64 * 1000.0) as u32;
        let is_voice_detected = db > self.threshold_db;

        let (next, transition) = match self.state {
            VadState::Silence if is_voice_detected => {
                log::debug!("VAD: 音声開始検出 (RMS: {:.2} dB)", db);
                (
                    VadState::Voice {
                        hangover_remaining_ms: self.hangover_duration_ms,
                    },
                    VadTransition::SpeechStarted,
                )
            }
            VadState::Silence => (VadState::Silence, VadTransition::None),
            VadState::Voice { .. } if is_voice_detected => (
                // 音声が継続している場合、ハングオーバーをリセット
                VadState::Voice {
                    hangover_remaining_ms: self.hangover_duration_ms,
                },
                VadTransition::None,
            ),
            VadState::Voice {
                hangover_remaining_ms,
            } if hangover_remaining_ms > duration_ms => (
                VadState::Voice {
                    hangover_remaining_ms: hangover_remaining_ms - duration_ms,
                },
                VadTransition::None,
            ),
            VadState::Voice { .. } => {
                log::debug!("VAD: 音声終了検出 (RMS: {:.2} dB)", db);
                (VadState::Silence, VadTransition::SpeechEnded)
            }
        };

        self.state = next;
        transition
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    /// 音声区間中かどうか
    pub fn is_voice(&self) -> bool {
        matches!(self.state, VadState::Voice { .. })
    }

    /// 直近に処理したチャンクの音量 (dB)
    pub fn level_db(&self) -> f32 {
        self.last_db
    }

    /// 無音状態に戻す (次の発話の検出前に呼ぶ)
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.last_db = -100.0;
    }
}

/// RMS (Root Mean Square) を計算
fn calculate_rms(samples: &[SampleI16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_of_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_of_squares / samples.len() as f64).sqrt() as f32
}

/// RMSをデシベル (dB) に変換
fn rms_to_db(rms: f32) -> f32 {
    if rms <= 0.0 {
        return -100.0; // 無音の場合の最小値
    }
    20.0 * rms.log10()
}
