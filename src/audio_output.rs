use crate::types::{AudioFormat, SampleI16};
use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// 音声応答の再生トレイト
///
/// `play` は再生が終わるまで待つ。future を破棄すると再生を止める。
#[async_trait]
pub trait AudioPlayback: Send {
    async fn play(&mut self, samples: Vec<SampleI16>, format: AudioFormat) -> Result<()>;
}

/// cpal による音声出力
pub struct CpalPlayback {
    device_name: Option<String>,
}

impl CpalPlayback {
    pub fn new(device_name: Option<&str>) -> Self {
        Self {
            device_name: device_name.map(str::to_string),
        }
    }

    /// デバイス一覧を表示
    pub fn list_devices() -> Result<()> {
        let host = cpal::default_host();
        println!("=== 利用可能な出力デバイス ===");

        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        for (idx, device) in host.output_devices()?.enumerate() {
            let name = device.name()?;
            let marker = if default_name.as_deref() == Some(name.as_str()) {
                " (デフォルト)"
            } else {
                ""
            };
            println!("{}. {}{}", idx, name, marker);

            if let Ok(config) = device.default_output_config() {
                println!(
                    "   サンプルレート: {} Hz, チャンネル数: {}",
                    config.sample_rate().0,
                    config.channels()
                );
            }
        }

        Ok(())
    }
}

/// 破棄時に再生スレッドへ停止を伝える
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

#[async_trait]
impl AudioPlayback for CpalPlayback {
    async fn play(&mut self, samples: Vec<SampleI16>, format: AudioFormat) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopOnDrop(stop.clone());
        let (done_tx, done_rx) = oneshot::channel::<Result<()>>();
        let device_name = self.device_name.clone();

        thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let result = play_blocking(device_name.as_deref(), samples, format, &stop);
                let _ = done_tx.send(result);
            })
            .context("再生スレッドの起動に失敗")?;

        done_rx.await.context("再生スレッドが応答せずに終了しました")?
    }
}

/// 出力ストリームを開き、バッファが空になるか停止されるまで再生する
fn play_blocking(
    device_name: Option<&str>,
    samples: Vec<SampleI16>,
    format: AudioFormat,
    stop: &AtomicBool,
) -> Result<()> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .output_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow::anyhow!("出力デバイス '{}' が見つかりません", name))?,
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("デフォルト出力デバイスが見つかりません"))?,
    };

    let default_config = device
        .default_output_config()
        .context("デフォルト出力設定が取得できません")?;

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    log::info!(
        "再生開始: {} サンプル, {}Hz, {}ch ({:?})",
        samples.len(),
        config.sample_rate.0,
        config.channels,
        device.name()
    );

    let buffer = Arc::new(Mutex::new(VecDeque::from(samples)));

    let stream = match default_config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, buffer.clone())?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, buffer.clone())?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, buffer.clone())?,
        other => anyhow::bail!("サポートされていないサンプルフォーマット: {:?}", other),
    };

    stream.play().context("ストリームの再生開始に失敗")?;

    loop {
        if stop.load(Ordering::Acquire) {
            log::info!("再生を中止しました");
            break;
        }
        let remaining = buffer.lock().map(|b| b.len()).unwrap_or(0);
        if remaining == 0 {
            // デバイス側のバッファを鳴らし切る
            thread::sleep(Duration::from_millis(100));
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    Ok(())
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    buffer: Arc<Mutex<VecDeque<SampleI16>>>,
) -> Result<Stream>
where
    T: SizedSample + Sample + FromSample<f32> + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let Ok(mut buffer) = buffer.lock() else {
                    data.fill(T::EQUILIBRIUM);
                    return;
                };
                // 不足分は無音
                for sample in data.iter_mut() {
                    *sample = match buffer.pop_front() {
                        Some(s) => convert_sample::<T>(s),
                        None => T::EQUILIBRIUM,
                    };
                }
            },
            move |err| {
                log::error!("出力ストリームエラー: {}", err);
            },
            None,
        )
        .context("出力ストリームの構築に失敗")
}

/// i16サンプルを指定されたフォーマットに変換
fn convert_sample<T: Sample + FromSample<f32>>(sample: SampleI16) -> T {
    let normalized = sample as f32 / i16::MAX as f32;
    T::from_sample(normalized)
}
