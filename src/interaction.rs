//! 音声対話クライアント
//!
//! マイク入力を VAD で区切って Lex の PostContent にストリーム送信し、
//! 音声応答を再生する。進行状況は [`InteractionEvent`] としてチャンネルで通知する。
//!
//! ```text
//! [AudioCapture] → [VAD] → (プリロール) → [PostContent (ストリーム)]
//!                                               ↓
//!                       [InteractionEvent] ← [応答] → [AudioPlayback]
//! ```
//!
//! 同時に処理できる対話は1つだけで、処理中や再生中の呼び出しは
//! [`Error::Busy`] になる。

use crate::audio_input::AudioCapture;
use crate::audio_output::AudioPlayback;
use crate::config::{Config, InteractionConfig, VadConfig};
use crate::error::{Error, Result};
use crate::protocol::BodyStream;
use crate::services::lexruntime::{
    DialogState, LexRuntimeClient, PostContentOutput, PostContentRequest, AUDIO_PCM, TEXT_PLAIN,
};
use crate::types::{pcm_to_le_bytes, AudioChunk, AudioFormat};
use crate::vad::{VadTransition, VoiceActivityDetector};
use crate::wav_writer::TurnRecorder;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// イベントチャンネルの容量
const EVENT_CAPACITY: usize = 64;

/// Lex の `audio/pcm` 応答のフォーマット
const LEX_PCM_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 16000,
    channels: 1,
};

/// 対話の進行イベント
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    /// 録音を開始した (話しかけてよい)
    ReadyForAudio,
    /// 発話開始を検出した
    StartOfSpeech,
    /// 発話終了を検出し、送信を閉じた
    EndOfSpeech,
    /// 発話が始まらないまま待ち時間が過ぎた (リクエストは送らない)
    NoSpeechTimeout,
    /// 最大発話時間に達して送信を閉じた
    MaxSpeechTimeout,
    /// 入力音量 (dB)
    SoundLevel(f32),
    /// ボットの応答
    Response(PostContentOutput),
    /// ボットがユーザーの次の入力を待っている
    PromptUserToRespond,
    /// インテントの実行準備ができた (または実行済み)
    ReadyForFulfillment,
    PlaybackStarted,
    PlaybackFinished,
    Error(String),
    /// 対話が終了した (常に最後のイベント)
    Finished,
}

/// 入出力の組み合わせ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    AudioInAudioOut,
    AudioInTextOut,
    TextInAudioOut,
    TextInTextOut,
}

impl InteractionMode {
    fn accept(self) -> &'static str {
        if self.audio_out() {
            AUDIO_PCM
        } else {
            TEXT_PLAIN
        }
    }

    fn audio_out(self) -> bool {
        matches!(
            self,
            InteractionMode::AudioInAudioOut | InteractionMode::TextInAudioOut
        )
    }
}

enum TurnInput {
    Audio,
    Text(String),
}

/// 対話を中止するハンドル (Ctrl+C ハンドラなどに渡せる)
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// 録音・送信・再生を中止する
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// 実行中の対話
///
/// すべての [`CancelHandle`] とともに破棄すると対話は中止される。
pub struct InteractionHandle {
    events: mpsc::Receiver<InteractionEvent>,
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

impl InteractionHandle {
    /// 次のイベントを待つ (`Finished` の後は `None`)
    pub async fn next_event(&mut self) -> Option<InteractionEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// イベントを読まずに終了を待つ
    pub async fn join(self) {
        drop(self.events);
        if let Err(e) = self.task.await {
            log::error!("対話タスクが異常終了しました: {}", e);
        }
    }
}

/// フラグを立てている間だけ保持するガード
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>, what: &'static str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy(what))?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct Shared {
    lex: LexRuntimeClient,
    config: InteractionConfig,
    vad: VadConfig,
    capture: Mutex<Box<dyn AudioCapture>>,
    playback: Mutex<Box<dyn AudioPlayback>>,
    recorder: Option<std::sync::Mutex<TurnRecorder>>,
    request_in_progress: Arc<AtomicBool>,
    playback_in_progress: Arc<AtomicBool>,
}

impl Shared {
    /// 録音が有効なら処理を行う (失敗しても対話は続ける)
    fn record(&self, f: impl FnOnce(&mut TurnRecorder) -> anyhow::Result<()>) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        match recorder.lock() {
            Ok(mut recorder) => {
                if let Err(e) = f(&mut recorder) {
                    log::warn!("録音に失敗: {:#}", e);
                }
            }
            Err(_) => log::warn!("録音状態が壊れています"),
        }
    }
}

/// Lex ボットとの音声/テキスト対話クライアント
///
/// 対話は Tokio のタスクとして実行する。各モードのメソッドはランタイムの中から
/// 呼ぶ必要があり、外から呼ぶと [`Error::NoRuntime`] を返す。
pub struct InteractionClient {
    shared: Arc<Shared>,
}

impl InteractionClient {
    pub fn new(
        lex: LexRuntimeClient,
        config: &Config,
        capture: Box<dyn AudioCapture>,
        playback: Box<dyn AudioPlayback>,
    ) -> Self {
        let recorder = config.interaction.record_dir.as_ref().and_then(|dir| {
            match TurnRecorder::new(dir, config.audio.sample_rate) {
                Ok(recorder) => Some(std::sync::Mutex::new(recorder)),
                Err(e) => {
                    log::warn!("録音を無効にします: {:#}", e);
                    None
                }
            }
        });

        Self {
            shared: Arc::new(Shared {
                lex,
                config: config.interaction.clone(),
                vad: config.vad.clone(),
                capture: Mutex::new(capture),
                playback: Mutex::new(playback),
                recorder,
                request_in_progress: Arc::new(AtomicBool::new(false)),
                playback_in_progress: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// 音声で話しかけ、音声で応答を受け取る
    pub fn audio_in_audio_out(&self) -> Result<InteractionHandle> {
        self.start(InteractionMode::AudioInAudioOut, TurnInput::Audio)
    }

    /// 音声で話しかけ、テキストで応答を受け取る
    pub fn audio_in_text_out(&self) -> Result<InteractionHandle> {
        self.start(InteractionMode::AudioInTextOut, TurnInput::Audio)
    }

    /// テキストを送り、音声で応答を受け取る
    pub fn text_in_audio_out(&self, text: impl Into<String>) -> Result<InteractionHandle> {
        self.start(InteractionMode::TextInAudioOut, TurnInput::Text(text.into()))
    }

    /// テキストを送り、テキストで応答を受け取る
    pub fn text_in_text_out(&self, text: impl Into<String>) -> Result<InteractionHandle> {
        self.start(InteractionMode::TextInTextOut, TurnInput::Text(text.into()))
    }

    pub fn is_request_in_progress(&self) -> bool {
        self.shared.request_in_progress.load(Ordering::Acquire)
    }

    pub fn is_playback_in_progress(&self) -> bool {
        self.shared.playback_in_progress.load(Ordering::Acquire)
    }

    fn start(&self, mode: InteractionMode, input: TurnInput) -> Result<InteractionHandle> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime("対話"))?;
        if self.is_playback_in_progress() {
            return Err(Error::Busy("再生"));
        }
        let request_guard = BusyGuard::acquire(&self.shared.request_in_progress, "リクエスト")?;

        log::info!("対話を開始します: {:?}", mode);

        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let turn = Turn {
            shared: self.shared.clone(),
            mode,
            events: event_tx,
            cancel: cancel_rx,
        };
        let task = runtime.spawn(turn.run(input, request_guard));

        Ok(InteractionHandle {
            events: event_rx,
            cancel: CancelHandle {
                tx: Arc::new(cancel_tx),
            },
            task,
        })
    }
}

/// 応答の対話状態から次に通知するイベント
fn dialog_event(state: Option<&DialogState>) -> InteractionEvent {
    match state {
        Some(DialogState::ReadyForFulfillment) | Some(DialogState::Fulfilled) => {
            InteractionEvent::ReadyForFulfillment
        }
        Some(DialogState::Failed) => {
            InteractionEvent::Error("ボットとの対話が失敗しました".to_string())
        }
        _ => InteractionEvent::PromptUserToRespond,
    }
}

/// 中止されるまで待つ (送信側が破棄された場合も中止とみなす)
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// 1回の対話 (1リクエスト + 応答処理)
struct Turn {
    shared: Arc<Shared>,
    mode: InteractionMode,
    events: mpsc::Sender<InteractionEvent>,
    cancel: watch::Receiver<bool>,
}

impl Turn {
    async fn run(mut self, input: TurnInput, request_guard: BusyGuard) {
        let result = match input {
            TurnInput::Audio => self.audio_turn(request_guard).await,
            TurnInput::Text(text) => self.text_turn(text, request_guard).await,
        };

        match result {
            Ok(()) => {}
            Err(Error::Cancelled) => log::info!("対話を中止しました"),
            Err(e) => {
                log::error!("対話エラー: {}", e);
                self.emit(InteractionEvent::Error(e.to_string())).await;
            }
        }
        self.emit(InteractionEvent::Finished).await;
    }

    async fn emit(&self, event: InteractionEvent) {
        if self.events.send(event).await.is_err() {
            log::trace!("イベントの受信側はクローズ済み");
        }
    }

    /// 音量は読まれなければ捨てる
    fn sound_level(&self, db: f32) {
        let _ = self.events.try_send(InteractionEvent::SoundLevel(db));
    }

    async fn text_turn(&mut self, text: String, request_guard: BusyGuard) -> Result<()> {
        let config = &self.shared.config;
        let request =
            PostContentRequest::text(&config.bot_name, &config.bot_alias, &config.user_id, text)
                .with_accept(self.mode.accept());

        let lex = self.shared.lex.clone();
        let output = tokio::select! {
            _ = cancelled(&mut self.cancel) => return Err(Error::Cancelled),
            result = lex.post_content(request) => result?,
        };

        self.respond(output, request_guard).await
    }

    async fn audio_turn(&mut self, request_guard: BusyGuard) -> Result<()> {
        let shared = self.shared.clone();
        let mut capture = shared.capture.lock().await;

        let mut chunks = capture.start().map_err(Error::Audio)?;
        let format = capture.format();

        let result = self
            .stream_utterance(&mut chunks, &mut **capture, format)
            .await;

        capture.stop();
        drop(capture);
        shared.record(|r| r.finish().map(|_| ()));

        match result? {
            Some(output) => self.respond(output, request_guard).await,
            None => Ok(()),
        }
    }

    /// 発話を待って PostContent に流し込み、応答を返す
    ///
    /// 発話が始まらなかった場合は `None`。
    async fn stream_utterance(
        &mut self,
        chunks: &mut mpsc::Receiver<AudioChunk>,
        capture: &mut dyn AudioCapture,
        format: AudioFormat,
    ) -> Result<Option<PostContentOutput>> {
        let shared = self.shared.clone();
        let config = &shared.config;

        let mut vad = VoiceActivityDetector::new(&shared.vad, format.sample_rate);
        let pre_roll_samples = (format.sample_rate as u64 * config.pre_roll_ms / 1000) as usize;
        let mut pre_roll: VecDeque<AudioChunk> = VecDeque::new();
        let mut buffered = 0usize;

        self.emit(InteractionEvent::ReadyForAudio).await;

        // 発話開始待ち
        let no_speech_deadline = Instant::now() + Duration::from_millis(config.no_speech_timeout_ms);
        loop {
            let chunk = tokio::select! {
                _ = cancelled(&mut self.cancel) => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(no_speech_deadline) => {
                    log::info!("発話が検出されませんでした");
                    self.emit(InteractionEvent::NoSpeechTimeout).await;
                    return Ok(None);
                }
                chunk = chunks.recv() => chunk,
            };
            let Some(chunk) = chunk else {
                return Err(Error::Audio(anyhow::anyhow!("発話の前に音声入力が終了しました")));
            };

            let transition = vad.process(&chunk.samples);
            self.sound_level(vad.level_db());

            buffered += chunk.samples.len();
            pre_roll.push_back(chunk);
            while pre_roll.len() > 1 {
                let front_len = pre_roll[0].samples.len();
                if buffered - front_len < pre_roll_samples {
                    break;
                }
                buffered -= front_len;
                pre_roll.pop_front();
            }

            if transition == VadTransition::SpeechStarted {
                break;
            }
        }

        self.emit(InteractionEvent::StartOfSpeech).await;
        shared.record(|r| r.begin_utterance());

        let (body_tx, body_rx) = mpsc::unbounded_channel::<std::io::Result<Bytes>>();
        for chunk in pre_roll.drain(..) {
            forward(&shared, &body_tx, &chunk);
        }
        let mut body_tx = Some(body_tx);

        let stream: BodyStream = Box::pin(UnboundedReceiverStream::new(body_rx));
        let request = PostContentRequest::audio(
            &config.bot_name,
            &config.bot_alias,
            &config.user_id,
            format,
            stream,
        )
        .with_accept(self.mode.accept());

        let lex = shared.lex.clone();
        let response = lex.post_content(request);
        tokio::pin!(response);

        let max_speech_deadline = Instant::now() + Duration::from_millis(config.max_speech_ms);

        let output = loop {
            tokio::select! {
                _ = cancelled(&mut self.cancel) => return Err(Error::Cancelled),
                result = &mut response => break result?,
                _ = tokio::time::sleep_until(max_speech_deadline), if body_tx.is_some() => {
                    log::info!("最大発話時間に達しました");
                    self.emit(InteractionEvent::MaxSpeechTimeout).await;
                    body_tx = None;
                    capture.stop();
                }
                chunk = chunks.recv(), if body_tx.is_some() => {
                    let Some(chunk) = chunk else {
                        log::debug!("音声入力が終了したため送信を閉じます");
                        body_tx = None;
                        continue;
                    };

                    let transition = vad.process(&chunk.samples);
                    self.sound_level(vad.level_db());
                    if let Some(tx) = &body_tx {
                        forward(&shared, tx, &chunk);
                    }

                    if transition == VadTransition::SpeechEnded {
                        self.emit(InteractionEvent::EndOfSpeech).await;
                        body_tx = None;
                        capture.stop();
                    }
                }
            }
        };

        Ok(Some(output))
    }

    /// 応答を通知し、必要なら再生してから対話状態に応じたイベントを送る
    async fn respond(&mut self, output: PostContentOutput, request_guard: BusyGuard) -> Result<()> {
        log::info!(
            "応答: 対話状態 {:?}, メッセージ {:?}",
            output.dialog_state,
            output.message
        );

        let follow_up = dialog_event(output.dialog_state.as_ref());
        let samples = if output.has_audio() {
            output.audio_samples()
        } else {
            Vec::new()
        };
        if !samples.is_empty() {
            self.shared.record(|r| {
                r.save_response(&samples, LEX_PCM_FORMAT.sample_rate)
                    .map(|_| ())
            });
        }

        let play = self.mode.audio_out() && self.shared.config.playback && !samples.is_empty();
        let playback_guard = if play {
            Some(BusyGuard::acquire(&self.shared.playback_in_progress, "再生")?)
        } else {
            None
        };
        drop(request_guard);

        self.emit(InteractionEvent::Response(output)).await;

        if let Some(_playback_guard) = playback_guard {
            self.emit(InteractionEvent::PlaybackStarted).await;

            let shared = self.shared.clone();
            let mut playback = shared.playback.lock().await;
            tokio::select! {
                _ = cancelled(&mut self.cancel) => return Err(Error::Cancelled),
                result = playback.play(samples, LEX_PCM_FORMAT) => result.map_err(Error::Audio)?,
            }

            self.emit(InteractionEvent::PlaybackFinished).await;
        }

        self.emit(follow_up).await;
        Ok(())
    }
}

/// チャンクをリクエストボディに送り、録音にも書き込む
fn forward(
    shared: &Shared,
    body_tx: &mpsc::UnboundedSender<std::io::Result<Bytes>>,
    chunk: &AudioChunk,
) {
    let bytes = Bytes::from(pcm_to_le_bytes(&chunk.samples));
    if body_tx.send(Ok(bytes)).is_err() {
        log::debug!("リクエストボディはクローズ済み");
    }
    shared.record(|r| r.write_samples(&chunk.samples));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::mock_client;
    use crate::protocol::HttpResponse;
    use crate::services::lexruntime;
    use crate::transport::mock::MockTransport;
    use crate::types::le_bytes_to_pcm;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const FORMAT: AudioFormat = AudioFormat {
        sample_rate: 16000,
        channels: 1,
    };

    /// 100ms (1600 サンプル) 単位のチャンク
    fn silence() -> Vec<i16> {
        vec![0; 1600]
    }

    fn voice() -> Vec<i16> {
        (0..1600)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .collect()
    }

    struct FakeCapture {
        chunks: Vec<Vec<i16>>,
        keep_open: bool,
        sender: Option<mpsc::Sender<AudioChunk>>,
        stops: Arc<AtomicUsize>,
    }

    impl AudioCapture for FakeCapture {
        fn start(&mut self) -> anyhow::Result<mpsc::Receiver<AudioChunk>> {
            let (tx, rx) = mpsc::channel(self.chunks.len() + 1);
            for samples in &self.chunks {
                tx.try_send(AudioChunk {
                    samples: samples.clone(),
                    format: FORMAT,
                    timestamp_ns: 0,
                })
                .unwrap();
            }
            if self.keep_open {
                self.sender = Some(tx);
            }
            Ok(rx)
        }

        fn stop(&mut self) {
            self.sender = None;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn format(&self) -> AudioFormat {
            FORMAT
        }
    }

    struct FakePlayback {
        played: Arc<std::sync::Mutex<Vec<Vec<i16>>>>,
        delay: Duration,
    }

    #[async_trait]
    impl AudioPlayback for FakePlayback {
        async fn play(&mut self, samples: Vec<i16>, format: AudioFormat) -> anyhow::Result<()> {
            assert_eq!(format, LEX_PCM_FORMAT);
            tokio::time::sleep(self.delay).await;
            self.played.lock().unwrap().push(samples);
            Ok(())
        }
    }

    struct Fixture {
        client: InteractionClient,
        transport: Arc<MockTransport>,
        played: Arc<std::sync::Mutex<Vec<Vec<i16>>>>,
        stops: Arc<AtomicUsize>,
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.interaction.bot_name = "OrderFlowers".to_string();
        config.interaction.bot_alias = "prod".to_string();
        config.interaction.user_id = "kiosk-1".to_string();
        config.interaction.pre_roll_ms = 200;
        config.vad.threshold_db = -40.0;
        config.vad.hangover_duration_ms = 300;
        config
    }

    fn fixture(
        config: &Config,
        transport: MockTransport,
        chunks: Vec<Vec<i16>>,
        keep_open: bool,
        playback_delay: Duration,
    ) -> Fixture {
        let transport = Arc::new(transport);
        let stops = Arc::new(AtomicUsize::new(0));
        let played = Arc::new(std::sync::Mutex::new(Vec::new()));

        let lex = LexRuntimeClient::new(mock_client(lexruntime::SERVICE, transport.clone()));
        let capture = FakeCapture {
            chunks,
            keep_open,
            sender: None,
            stops: stops.clone(),
        };
        let playback = FakePlayback {
            played: played.clone(),
            delay: playback_delay,
        };

        Fixture {
            client: InteractionClient::new(lex, config, Box::new(capture), Box::new(playback)),
            transport,
            played,
            stops,
        }
    }

    fn lex_response(status: u16, dialog_state: &str, audio: &[i16]) -> HttpResponse {
        let content_type = if audio.is_empty() {
            "text/plain;charset=utf-8"
        } else {
            "audio/pcm"
        };
        HttpResponse::new(status, pcm_to_le_bytes(audio))
            .with_header("Content-Type", content_type)
            .with_header("x-amz-lex-dialog-state", dialog_state)
            .with_header("x-amz-lex-message", "What kind of flowers?")
    }

    /// `Finished` までのイベント (音量は除く)
    async fn collect(handle: &mut InteractionHandle) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
                .await
                .expect("イベント待ちがタイムアウト")
                .expect("Finished の前にチャンネルが閉じた");
            if matches!(event, InteractionEvent::SoundLevel(_)) {
                continue;
            }
            let finished = event == InteractionEvent::Finished;
            events.push(event);
            if finished {
                return events;
            }
        }
    }

    fn names(events: &[InteractionEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                InteractionEvent::ReadyForAudio => "ReadyForAudio",
                InteractionEvent::StartOfSpeech => "StartOfSpeech",
                InteractionEvent::EndOfSpeech => "EndOfSpeech",
                InteractionEvent::NoSpeechTimeout => "NoSpeechTimeout",
                InteractionEvent::MaxSpeechTimeout => "MaxSpeechTimeout",
                InteractionEvent::SoundLevel(_) => "SoundLevel",
                InteractionEvent::Response(_) => "Response",
                InteractionEvent::PromptUserToRespond => "PromptUserToRespond",
                InteractionEvent::ReadyForFulfillment => "ReadyForFulfillment",
                InteractionEvent::PlaybackStarted => "PlaybackStarted",
                InteractionEvent::PlaybackFinished => "PlaybackFinished",
                InteractionEvent::Error(_) => "Error",
                InteractionEvent::Finished => "Finished",
            })
            .collect()
    }

    fn utterance() -> Vec<Vec<i16>> {
        let mut chunks = vec![silence(), silence(), silence()];
        chunks.extend((0..5).map(|_| voice()));
        chunks.extend((0..10).map(|_| silence()));
        chunks
    }

    #[tokio::test]
    async fn test_audio_in_audio_out() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ElicitSlot", &[5, 6, 7])),
            utterance(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.audio_in_audio_out().unwrap();
        let events = collect(&mut handle).await;

        assert_eq!(
            names(&events),
            vec![
                "ReadyForAudio",
                "StartOfSpeech",
                "EndOfSpeech",
                "Response",
                "PlaybackStarted",
                "PlaybackFinished",
                "PromptUserToRespond",
                "Finished",
            ]
        );
        let InteractionEvent::Response(output) = &events[3] else {
            panic!("unexpected event: {:?}", events[3]);
        };
        assert_eq!(output.dialog_state, Some(DialogState::ElicitSlot));
        assert_eq!(output.message.as_deref(), Some("What kind of flowers?"));

        // プリロール 2 チャンク + 音声 4 チャンク + ハングオーバー 3 チャンク
        let sent = f.transport.last_request();
        assert_eq!(sent.body.len(), 9 * 1600 * 2);
        assert_eq!(le_bytes_to_pcm(&sent.body[..3200]), silence());
        assert_eq!(
            sent.header("Content-Type"),
            Some("audio/l16; rate=16000; channels=1")
        );
        assert_eq!(sent.header("Accept"), Some(AUDIO_PCM));
        assert!(sent
            .url
            .ends_with("/bot/OrderFlowers/alias/prod/user/kiosk-1/content"));

        assert_eq!(*f.played.lock().unwrap(), vec![vec![5, 6, 7]]);
        assert!(f.stops.load(Ordering::SeqCst) >= 1);
        assert!(!f.client.is_request_in_progress());
        assert!(!f.client.is_playback_in_progress());
    }

    #[tokio::test]
    async fn test_no_speech_timeout_sends_nothing() {
        let mut config = test_config();
        config.interaction.no_speech_timeout_ms = 100;
        let f = fixture(
            &config,
            MockTransport::new(),
            vec![silence(), silence()],
            true,
            Duration::ZERO,
        );

        let mut handle = f.client.audio_in_text_out().unwrap();
        let events = collect(&mut handle).await;

        assert_eq!(
            names(&events),
            vec!["ReadyForAudio", "NoSpeechTimeout", "Finished"]
        );
        assert!(f.transport.requests.lock().unwrap().is_empty());
        assert!(f.stops.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_max_speech_timeout_closes_body() {
        let mut config = test_config();
        config.interaction.max_speech_ms = 100;
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "Fulfilled", &[])),
            vec![voice(), voice(), voice()],
            true,
            Duration::ZERO,
        );

        let mut handle = f.client.audio_in_text_out().unwrap();
        let events = collect(&mut handle).await;

        assert_eq!(
            names(&events),
            vec![
                "ReadyForAudio",
                "StartOfSpeech",
                "MaxSpeechTimeout",
                "Response",
                "ReadyForFulfillment",
                "Finished",
            ]
        );
        let sent = f.transport.last_request();
        assert_eq!(sent.body.len(), 3 * 1600 * 2);
        assert_eq!(sent.header("Accept"), Some(TEXT_PLAIN));
    }

    #[tokio::test]
    async fn test_second_request_while_busy() {
        let mut config = test_config();
        config.interaction.no_speech_timeout_ms = 10_000;
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ElicitIntent", &[])),
            vec![silence()],
            true,
            Duration::ZERO,
        );

        let mut first = f.client.audio_in_text_out().unwrap();
        assert!(f.client.is_request_in_progress());

        let err = f.client.text_in_text_out("hello").err().unwrap();
        assert!(matches!(err, Error::Busy(_)));

        first.cancel();
        let events = collect(&mut first).await;
        assert_eq!(events.last(), Some(&InteractionEvent::Finished));
        assert!(!events
            .iter()
            .any(|e| matches!(e, InteractionEvent::Error(_))));
        assert!(f.transport.requests.lock().unwrap().is_empty());

        let mut second = f.client.text_in_text_out("hello").unwrap();
        let events = collect(&mut second).await;
        assert_eq!(
            names(&events),
            vec!["Response", "PromptUserToRespond", "Finished"]
        );
        assert_eq!(f.transport.last_request().body, b"hello");
    }

    #[tokio::test]
    async fn test_failed_dialog_reports_error() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "Failed", &[])),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.text_in_text_out("cancel my order").unwrap();
        let events = collect(&mut handle).await;
        assert_eq!(names(&events), vec!["Response", "Error", "Finished"]);
        assert_eq!(
            f.transport.last_request().header("Content-Type"),
            Some(TEXT_PLAIN)
        );
    }

    #[tokio::test]
    async fn test_text_in_audio_out_plays_response() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ReadyForFulfillment", &[1, -1])),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.text_in_audio_out("roses").unwrap();
        let events = collect(&mut handle).await;
        assert_eq!(
            names(&events),
            vec![
                "Response",
                "PlaybackStarted",
                "PlaybackFinished",
                "ReadyForFulfillment",
                "Finished",
            ]
        );
        assert_eq!(*f.played.lock().unwrap(), vec![vec![1, -1]]);
    }

    #[tokio::test]
    async fn test_playback_disabled() {
        let mut config = test_config();
        config.interaction.playback = false;
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ElicitSlot", &[1, 2])),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.text_in_audio_out("roses").unwrap();
        let events = collect(&mut handle).await;
        assert_eq!(
            names(&events),
            vec!["Response", "PromptUserToRespond", "Finished"]
        );
        assert!(f.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_playback() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ElicitSlot", &[1, 2, 3])),
            Vec::new(),
            false,
            Duration::from_secs(30),
        );

        let mut handle = f.client.text_in_audio_out("roses").unwrap();
        loop {
            let event = handle.next_event().await.unwrap();
            if event == InteractionEvent::PlaybackStarted {
                break;
            }
        }
        assert!(f.client.is_playback_in_progress());
        assert!(matches!(
            f.client.audio_in_audio_out().err(),
            Some(Error::Busy(_))
        ));

        handle.cancel_handle().cancel();
        let rest = collect(&mut handle).await;
        assert_eq!(names(&rest), vec!["Finished"]);
        assert!(f.played.lock().unwrap().is_empty());
        assert!(!f.client.is_playback_in_progress());
    }

    #[tokio::test]
    async fn test_cancel_while_request_in_flight() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().hang(),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.text_in_text_out("hello").unwrap();
        tokio::time::timeout(Duration::from_secs(5), f.transport.received.notified())
            .await
            .unwrap();
        assert!(f.client.is_request_in_progress());

        handle.cancel();
        let events = collect(&mut handle).await;
        assert_eq!(names(&events), vec!["Finished"]);
        assert!(!f.client.is_request_in_progress());
        assert_eq!(f.transport.abandoned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_request() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().hang(),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let handle = f.client.text_in_audio_out("hello").unwrap();
        tokio::time::timeout(Duration::from_secs(5), f.transport.received.notified())
            .await
            .unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), async {
            while f.client.is_request_in_progress() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("リクエスト中のフラグが解放されない");
        assert_eq!(f.transport.abandoned.load(Ordering::SeqCst), 1);
        assert!(f.client.text_in_text_out("again").is_ok());
    }

    #[tokio::test]
    async fn test_cancel_while_streaming_speech() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new(),
            vec![voice(), voice(), voice()],
            true,
            Duration::ZERO,
        );

        let mut handle = f.client.audio_in_audio_out().unwrap();
        loop {
            let event = handle.next_event().await.unwrap();
            if event == InteractionEvent::StartOfSpeech {
                break;
            }
        }
        assert!(f.client.is_request_in_progress());

        handle.cancel();
        let rest = collect(&mut handle).await;
        assert_eq!(names(&rest), vec!["Finished"]);
        assert!(!f.client.is_request_in_progress());
        assert!(f.stops.load(Ordering::SeqCst) >= 1);
        // ボディが閉じられる前に中止したので送信は完了していない
        assert!(f.transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_outside_runtime() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new(),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let err = f.client.text_in_text_out("hi").err().unwrap();
        assert!(matches!(err, Error::NoRuntime(_)));
        assert!(!f.client.is_request_in_progress());
    }

    #[tokio::test]
    async fn test_service_error_event() {
        let config = test_config();
        let f = fixture(
            &config,
            MockTransport::new().respond(
                HttpResponse::new(404, r#"{"message":"bot not found"}"#)
                    .with_header("x-amzn-ErrorType", "NotFoundException:"),
            ),
            Vec::new(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.text_in_text_out("hi").unwrap();
        let events = collect(&mut handle).await;
        assert_eq!(names(&events), vec!["Error", "Finished"]);
        let InteractionEvent::Error(message) = &events[0] else {
            unreachable!();
        };
        assert!(message.contains("NotFoundException"));
        assert!(!f.client.is_request_in_progress());
    }

    #[tokio::test]
    async fn test_records_utterance_and_response() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config();
        config.interaction.record_dir = Some(dir.path().to_string_lossy().into_owned());
        config.audio.sample_rate = 8000;
        let f = fixture(
            &config,
            MockTransport::new().respond(lex_response(200, "ElicitSlot", &[9, 9])),
            utterance(),
            false,
            Duration::ZERO,
        );

        let mut handle = f.client.audio_in_audio_out().unwrap();
        collect(&mut handle).await;

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("response_001_"));
        assert!(names[1].starts_with("utterance_001_"));

        let reader = hound::WavReader::open(dir.path().join(&names[1])).unwrap();
        assert_eq!(reader.len(), 9 * 1600);
        assert_eq!(reader.spec().sample_rate, 8000);

        // 応答は Lex の出力フォーマットで保存する
        let reader = hound::WavReader::open(dir.path().join(&names[0])).unwrap();
        assert_eq!(reader.spec().sample_rate, LEX_PCM_FORMAT.sample_rate);
        assert_eq!(reader.len(), 2);
    }

    #[test]
    fn test_dialog_event_branch() {
        assert_eq!(
            dialog_event(Some(&DialogState::ReadyForFulfillment)),
            InteractionEvent::ReadyForFulfillment
        );
        assert_eq!(
            dialog_event(Some(&DialogState::Fulfilled)),
            InteractionEvent::ReadyForFulfillment
        );
        assert!(matches!(
            dialog_event(Some(&DialogState::Failed)),
            InteractionEvent::Error(_)
        ));
        assert_eq!(
            dialog_event(Some(&DialogState::ElicitSlot)),
            InteractionEvent::PromptUserToRespond
        );
        assert_eq!(
            dialog_event(Some(&DialogState::Unknown("Novel".to_string()))),
            InteractionEvent::PromptUserToRespond
        );
        assert_eq!(dialog_event(None), InteractionEvent::PromptUserToRespond);
    }

    #[test]
    fn test_busy_guard_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = BusyGuard::acquire(&flag, "テスト").unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(matches!(
            BusyGuard::acquire(&flag, "テスト"),
            Err(Error::Busy("テスト"))
        ));
        drop(guard);
        assert!(BusyGuard::acquire(&flag, "テスト").is_ok());
    }
}
