use anyhow::{Context, Result};
use awsjson_client::audio_input::CpalCapture;
use awsjson_client::audio_output::CpalPlayback;
use awsjson_client::config::{ClientConfig, Config};
use awsjson_client::interaction::{
    CancelHandle, InteractionClient, InteractionEvent, InteractionHandle,
};
use awsjson_client::services::ecr::EcrClient;
use awsjson_client::services::kms::KmsClient;
use awsjson_client::services::lexruntime::LexRuntimeClient;
use awsjson_client::services::mediatailor::MediaTailorClient;
use awsjson_client::services::secretsmanager::SecretsManagerClient;
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

/// AWS JSON サービスクライアントと Lex 音声対話
#[derive(Parser, Debug)]
#[command(name = "awsjson")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 設定ファイルのパス
    #[arg(long, short, default_value = "config.toml", env = "AWSJSON_CONFIG")]
    config: PathBuf,

    /// リージョン (設定ファイルより優先)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// オペレーションを JSON 入力で呼び出し、結果を JSON で表示
    Invoke {
        service: Service,
        /// オペレーション名 (例: DescribeRepositories)
        operation: String,
        /// 入力 JSON ファイル (`-` で標準入力、省略時は `{}`)
        #[arg(long, short)]
        input: Option<String>,
    },
    /// サービスのオペレーション一覧
    Operations { service: Service },
    /// マイクでボットと対話する (Ctrl+C で終了)
    Talk {
        /// 応答をテキストで受け取る
        #[arg(long)]
        text_out: bool,
    },
    /// テキストをボットに送る
    Text {
        message: String,
        /// 応答を音声で受け取り再生する
        #[arg(long)]
        audio_out: bool,
    },
    /// デフォルト設定ファイルを生成
    GenerateConfig {
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
    /// 音声デバイス一覧を表示
    ShowInterfaces,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Service {
    Ecr,
    Secretsmanager,
    Kms,
    Mediatailor,
    Lex,
}

impl Service {
    fn operations(self) -> &'static [&'static str] {
        match self {
            Service::Ecr => EcrClient::OPERATIONS,
            Service::Secretsmanager => SecretsManagerClient::OPERATIONS,
            Service::Kms => KmsClient::OPERATIONS,
            Service::Mediatailor => MediaTailorClient::OPERATIONS,
            Service::Lex => LexRuntimeClient::OPERATIONS,
        }
    }

    async fn call_json(
        self,
        config: &ClientConfig,
        operation: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let output = match self {
            Service::Ecr => {
                EcrClient::from_config(config)
                    .await?
                    .call_json(operation, input)
                    .await?
            }
            Service::Secretsmanager => {
                SecretsManagerClient::from_config(config)
                    .await?
                    .call_json(operation, input)
                    .await?
            }
            Service::Kms => {
                KmsClient::from_config(config)
                    .await?
                    .call_json(operation, input)
                    .await?
            }
            Service::Mediatailor => {
                MediaTailorClient::from_config(config)
                    .await?
                    .call_json(operation, input)
                    .await?
            }
            Service::Lex => {
                LexRuntimeClient::from_config(config)
                    .await?
                    .call_json(operation, input)
                    .await?
            }
        };
        Ok(output)
    }
}

/// Ctrl+C で中止する対象
#[derive(Clone)]
struct StopSignal {
    running: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelHandle>>>,
}

impl StopSignal {
    fn install() -> Result<Self> {
        let signal = Self {
            running: Arc::new(AtomicBool::new(true)),
            current: Arc::default(),
        };
        let handler = signal.clone();
        ctrlc::set_handler(move || {
            log::info!("停止シグナルを受信しました...");
            handler.running.store(false, Ordering::SeqCst);
            if let Ok(current) = handler.current.lock() {
                if let Some(cancel) = current.as_ref() {
                    cancel.cancel();
                }
            }
        })?;
        Ok(signal)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn watch(&self, cancel: Option<CancelHandle>) {
        if let Ok(mut current) = self.current.lock() {
            *current = cancel;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .filter_module("aws_config", log::LevelFilter::Warn)
        .init();

    match &cli.command {
        Command::GenerateConfig { path } => {
            Config::write_default(path)?;
            println!("設定ファイルを生成しました: {:?}", path);
            return Ok(());
        }
        Command::ShowInterfaces => {
            CpalCapture::list_devices()?;
            println!();
            CpalPlayback::list_devices()?;
            return Ok(());
        }
        Command::Operations { service } => {
            for name in service.operations() {
                println!("{}", name);
            }
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(region) = &cli.region {
        config.client.region = region.clone();
    }
    log::debug!("設定: {:?}", config);

    match cli.command {
        Command::Invoke {
            service,
            operation,
            input,
        } => {
            let input = read_input(input.as_deref())?;
            let output = service
                .call_json(&config.client, &operation, input)
                .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Talk { text_out } => talk(&config, text_out).await?,
        Command::Text { message, audio_out } => text(&config, &message, audio_out).await?,
        Command::GenerateConfig { .. } | Command::ShowInterfaces | Command::Operations { .. } => {}
    }

    Ok(())
}

fn read_input(input: Option<&str>) -> Result<serde_json::Value> {
    let content = match input {
        None => return Ok(serde_json::json!({})),
        Some("-") => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("標準入力の読み込みに失敗")?;
            content
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("入力ファイルの読み込みに失敗: {}", path))?,
    };
    serde_json::from_str(&content).context("入力 JSON のパースに失敗")
}

async fn interaction_client(config: &Config) -> Result<InteractionClient> {
    if config.interaction.bot_name.is_empty() {
        anyhow::bail!("interaction.bot_name が設定されていません");
    }
    let lex = LexRuntimeClient::from_config(&config.client).await?;
    let capture = CpalCapture::new(&config.audio);
    let playback = CpalPlayback::new(config.audio.output_device.as_deref());
    Ok(InteractionClient::new(
        lex,
        config,
        Box::new(capture),
        Box::new(playback),
    ))
}

/// ボットが次の入力を待っている間、音声での対話を繰り返す
async fn talk(config: &Config, text_out: bool) -> Result<()> {
    let client = interaction_client(config).await?;
    let stop = StopSignal::install()?;

    log::info!(
        "ボット {} ({}) と対話を開始します (Ctrl+C で終了)",
        config.interaction.bot_name,
        config.interaction.bot_alias
    );

    while stop.is_running() {
        let handle = if text_out {
            client.audio_in_text_out()?
        } else {
            client.audio_in_audio_out()?
        };
        if !drive(handle, &stop).await {
            break;
        }
    }

    log::info!("対話を終了しました");
    Ok(())
}

async fn text(config: &Config, message: &str, audio_out: bool) -> Result<()> {
    let client = interaction_client(config).await?;
    let stop = StopSignal::install()?;

    let handle = if audio_out {
        client.text_in_audio_out(message)?
    } else {
        client.text_in_text_out(message)?
    };
    drive(handle, &stop).await;
    Ok(())
}

/// イベントを表示しながら対話の終了を待つ
///
/// ボットが続けての入力を求めていれば `true`。
async fn drive(mut handle: InteractionHandle, stop: &StopSignal) -> bool {
    stop.watch(Some(handle.cancel_handle()));

    let mut again = false;
    while let Some(event) = handle.next_event().await {
        match event {
            InteractionEvent::ReadyForAudio => println!("🎤 どうぞ話しかけてください"),
            InteractionEvent::StartOfSpeech => println!("… 発話を検出"),
            InteractionEvent::EndOfSpeech => println!("… 発話終了、応答を待っています"),
            InteractionEvent::NoSpeechTimeout => println!("発話が検出されませんでした"),
            InteractionEvent::MaxSpeechTimeout => println!("最大発話時間に達しました"),
            InteractionEvent::SoundLevel(db) => log::trace!("音量: {:.1} dB", db),
            InteractionEvent::Response(output) => {
                if let Some(transcript) = &output.input_transcript {
                    println!("あなた: {}", transcript);
                }
                if let Some(message) = &output.message {
                    println!("ボット: {}", message);
                }
                log::info!(
                    "インテント: {:?}, 対話状態: {:?}, スロット: {:?}",
                    output.intent_name,
                    output.dialog_state,
                    output.slots
                );
            }
            InteractionEvent::PromptUserToRespond => again = true,
            InteractionEvent::ReadyForFulfillment => println!("✅ インテントの実行準備ができました"),
            InteractionEvent::PlaybackStarted => log::debug!("再生開始"),
            InteractionEvent::PlaybackFinished => log::debug!("再生終了"),
            InteractionEvent::Error(message) => eprintln!("エラー: {}", message),
            InteractionEvent::Finished => break,
        }
    }

    stop.watch(None);
    handle.join().await;
    again && stop.is_running()
}
