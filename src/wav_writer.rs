use crate::types::SampleI16;
use anyhow::{Context, Result};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// 対話ターン毎の音声をWAVファイルに保存する
///
/// 送信した発話 (`utterance`) と受信した音声応答 (`response`) を
/// `{kind}_{連番}_{日時}.wav` として書き出す。
pub struct TurnRecorder {
    output_dir: PathBuf,
    spec: hound::WavSpec,
    turn: u32,
    current: Option<OpenFile>,
}

struct OpenFile {
    path: PathBuf,
    writer: hound::WavWriter<BufWriter<fs::File>>,
    samples_written: usize,
}

impl TurnRecorder {
    pub fn new<P: AsRef<Path>>(output_dir: P, sample_rate: u32) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();

        if !output_dir.exists() {
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("出力ディレクトリの作成に失敗: {:?}", output_dir))?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        Ok(Self {
            output_dir,
            spec,
            turn: 0,
            current: None,
        })
    }

    /// 次のターンの発話ファイルを開く
    ///
    /// 書き込み中のファイルがあれば先に閉じる。
    pub fn begin_utterance(&mut self) -> Result<()> {
        self.finish()?;
        self.turn += 1;
        let path = self.file_path("utterance");

        log::info!("WAVファイル作成: {:?}", path);
        let writer = hound::WavWriter::create(&path, self.spec)
            .with_context(|| format!("WAVファイルの作成に失敗: {:?}", path))?;

        self.current = Some(OpenFile {
            path,
            writer,
            samples_written: 0,
        });
        Ok(())
    }

    /// 発話ファイルにサンプルを追記
    pub fn write_samples(&mut self, samples: &[SampleI16]) -> Result<()> {
        let Some(file) = self.current.as_mut() else {
            return Ok(());
        };
        for &sample in samples {
            file.writer
                .write_sample(sample)
                .with_context(|| "WAVファイルへのサンプル書き込みに失敗")?;
        }
        file.samples_written += samples.len();
        Ok(())
    }

    /// 発話ファイルを閉じ、そのパスを返す
    pub fn finish(&mut self) -> Result<Option<PathBuf>> {
        let Some(file) = self.current.take() else {
            return Ok(None);
        };
        file.writer
            .finalize()
            .with_context(|| "WAVファイルのファイナライズに失敗")?;
        log::info!(
            "WAVファイル書き込み完了: {:?}, {}サンプル ({:.2}秒)",
            file.path,
            file.samples_written,
            file.samples_written as f64 / self.spec.sample_rate as f64
        );
        Ok(Some(file.path))
    }

    /// 現在のターンの音声応答を保存
    ///
    /// サンプリングレートは応答のフォーマットに合わせて指定する。
    pub fn save_response(&mut self, samples: &[SampleI16], sample_rate: u32) -> Result<PathBuf> {
        let path = self.file_path("response");
        let spec = hound::WavSpec {
            sample_rate,
            ..self.spec
        };
        let mut writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("WAVファイルの作成に失敗: {:?}", path))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .with_context(|| "WAVファイルへのサンプル書き込みに失敗")?;
        }
        writer
            .finalize()
            .with_context(|| "WAVファイルのファイナライズに失敗")?;
        log::info!("音声応答を保存: {:?}", path);
        Ok(path)
    }

    /// 開始したターン数
    pub fn turns(&self) -> u32 {
        self.turn
    }

    fn file_path(&self, kind: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.output_dir
            .join(format!("{}_{:03}_{}.wav", kind, self.turn, timestamp))
    }
}

impl Drop for TurnRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("TurnRecorder のドロップ時にエラー: {}", e);
        }
    }
}
