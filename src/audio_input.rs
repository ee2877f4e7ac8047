use crate::config::AudioConfig;
use crate::types::{AudioChunk, AudioFormat};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SizedSample};
use regex_lite::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// マイク入力の共通トレイト
///
/// `start` で受信チャンネルを返し、`stop` まで 16bit モノラルのチャンクを送り続ける。
/// 対話クライアントのテストではフェイク実装に差し替える。
pub trait AudioCapture: Send {
    /// キャプチャを開始し、チャンクの受信側を返す
    fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>>;

    /// キャプチャを停止 (受信側は残りを読み切ると `None` になる)
    fn stop(&mut self);

    /// 送られるチャンクのフォーマット
    fn format(&self) -> AudioFormat;
}

/// cpal によるマイク入力
///
/// cpal のストリームはスレッド間で移動できないため、専用スレッドで
/// 開いて停止フラグが立つまで保持する。
pub struct CpalCapture {
    device_name: String,
    sample_rate: u32,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Self {
        log::info!("入力設定: {:?}", config);
        Self {
            device_name: config.input_device.clone(),
            sample_rate: config.sample_rate,
            worker: None,
        }
    }

    /// デバイス一覧を表示
    pub fn list_devices() -> Result<()> {
        println!("利用可能な入力デバイス:");
        println!();

        for (idx, device) in input_devices()?.into_iter().enumerate() {
            let name = device.name()?;
            println!("  [{}] {}", idx, name);

            device.supported_input_configs()?.for_each(|config_range| {
                println!(
                    "      フォーマット: {:?}, {}-{}Hz, {}ch",
                    config_range.sample_format(),
                    config_range.min_sample_rate().0,
                    config_range.max_sample_rate().0,
                    config_range.channels()
                );
            });
            println!();
        }

        Ok(())
    }
}

impl AudioCapture for CpalCapture {
    fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        self.stop();

        let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>(256);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let stop = Arc::new(AtomicBool::new(false));

        let device_name = self.device_name.clone();
        let sample_rate = self.sample_rate;
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream(&device_name, sample_rate, chunk_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while !stop_flag.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
                log::info!("音声入力ストリームを停止しました");
            })
            .context("キャプチャスレッドの起動に失敗")?;

        ready_rx
            .recv()
            .context("キャプチャスレッドが応答せずに終了しました")??;

        self.worker = Some(CaptureWorker { stop, handle });
        Ok(chunk_rx)
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            if worker.handle.join().is_err() {
                log::error!("キャプチャスレッドがパニックしました");
            }
        }
    }

    fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// デバイスを開いて入力ストリームを開始する
fn open_input_stream(
    device_name: &str,
    sample_rate: u32,
    chunk_tx: mpsc::Sender<AudioChunk>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if device_name == "default" {
        host.default_input_device()
            .context("デフォルト入力デバイスが見つかりません")?
    } else {
        input_devices()?
            .into_iter()
            .find(|d| d.name().ok().as_deref() == Some(device_name))
            .with_context(|| format!("デバイスが見つかりません: {}", device_name))?
    };

    log::info!("入力デバイス: {:?}", device.name());

    let default_config = device
        .default_input_config()
        .context("デフォルト入力設定が取得できません")?;

    log::info!(
        "デバイス設定: {:?}, {}Hz, {}ch",
        default_config.sample_format(),
        default_config.sample_rate().0,
        default_config.channels()
    );

    // チャンネル数はデバイスに合わせ、先頭チャンネルだけを使う
    let stream_config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(1600),
    };

    let stream = match default_config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, chunk_tx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, chunk_tx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, chunk_tx)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, chunk_tx)?,
        other => anyhow::bail!("サポートされていないサンプルフォーマット: {:?}", other),
    };

    stream.play().context("ストリームの再生開始に失敗")?;
    log::info!("音声入力ストリームを開始しました");

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    chunk_tx: mpsc::Sender<AudioChunk>,
) -> Result<cpal::Stream>
where
    T: SizedSample + Sample + Send + 'static,
    <T as Sample>::Float: Into<f32>,
{
    let num_channels = config.channels.max(1) as usize;
    let sample_rate = config.sample_rate.0;

    let data_callback = move |data: &[T], _info: &cpal::InputCallbackInfo| {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let samples = data
            .iter()
            .step_by(num_channels)
            .map(|&sample| {
                let f: f32 = sample.to_float_sample().into();
                (f.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })
            .collect();

        let chunk = AudioChunk {
            samples,
            format: AudioFormat {
                sample_rate,
                channels: 1,
            },
            timestamp_ns,
        };

        // コールバック内ではブロックしない
        match chunk_tx.try_send(chunk) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("音声チャンクの送信失敗: バッファ満杯");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::trace!("音声チャンクの受信側はクローズ済み");
            }
        }
    };

    let error_callback = move |err| {
        log::error!("入力ストリームエラー: {}", err);
    };

    device
        .build_input_stream(config, data_callback, error_callback, None)
        .context("入力ストリームの構築に失敗")
}

/// MacBook Air 本体・WebCam など、通常入力デバイスとして利用してはいけないデバイスを除外したデバイス一覧を取得
fn input_devices() -> Result<Vec<cpal::Device>> {
    let host = cpal::default_host();
    let excluded_names = Regex::new(
        "MacBook (Air|Pro)|AirPods|iPhone|Webcam|Background|Microsoft Teams|ZoomAudioDevice",
    )
    .context("除外デバイスの正規表現が不正")?;

    let devices = host
        .input_devices()?
        .filter(|device| match device.name() {
            Ok(name) => !excluded_names.is_match(&name),
            Err(_) => true,
        })
        .collect();
    Ok(devices)
}
