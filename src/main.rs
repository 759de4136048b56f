use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use mitra_voice::voice::{
    AudioCapture, AudioPlayback, EspeakSynthesizer, LocalSynthesizer, VoiceProfile, select_voice,
};
use mitra_voice::{
    COMPANION_NAME, Config, JsonFileStore, Personality, Preferences, SessionUpdate, VoiceEngine,
    VoiceGender, classify, classify_topic,
};

/// Mitra - a voice companion for emotional check-ins
#[derive(Parser)]
#[command(name = "mitra", version, about)]
struct Cli {
    /// Personality to use (coach, cryBuddy, mindReader, default); saved
    #[arg(short, long, global = true, env = "MITRA_PERSONALITY")]
    personality: Option<Personality>,

    /// Voice gender (male, female); saved
    #[arg(short, long, global = true)]
    gender: Option<VoiceGender>,

    /// Turn voice responses off (true) or on (false); saved
    #[arg(long, global = true, value_name = "BOOL")]
    mute: Option<bool>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk with Mitra (default)
    Chat,
    /// Get one text reply
    Reply {
        /// What to say to Mitra
        text: String,
    },
    /// Speak text through the synthesis pipeline
    Say {
        #[arg(default_value = "Hello! I'm Mitra. I'm here whenever you want to talk.")]
        text: String,
    },
    /// Show the detected emotion and topic of some text
    Classify { text: String },
    /// List on-device voices
    Voices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mitra_voice=info",
        1 => "info,mitra_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Chat);

    match command {
        Command::Classify { text } => {
            classify_text(&text);
            return Ok(());
        }
        Command::TestMic { duration } => return test_mic(duration).await,
        Command::TestSpeaker => return test_speaker().await,
        _ => {}
    }

    let config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    let store = JsonFileStore::open(&config.preferences_path())?;
    let prefs = Preferences::new(Arc::new(store)).with_cloud_tts_default(config.voice.cloud_tts);

    if let Some(personality) = cli.personality {
        prefs.set_personality(personality)?;
    }
    if let Some(gender) = cli.gender {
        prefs.set_voice_gender(gender)?;
    }
    if let Some(muted) = cli.mute {
        prefs.set_muted(muted)?;
    }

    match command {
        Command::Chat => chat(VoiceEngine::from_config(&config, prefs)).await,
        Command::Reply { text } => {
            let engine = VoiceEngine::from_config(&config, prefs);
            let reply = engine.responder().get_response(&text).await;
            println!("{COMPANION_NAME}: {reply}");
            Ok(())
        }
        Command::Say { text } => say(&VoiceEngine::from_config(&config, prefs), &text).await,
        Command::Voices => list_voices(&config, &prefs),
        Command::Classify { .. } | Command::TestMic { .. } | Command::TestSpeaker => Ok(()),
    }
}

/// Interactive voice conversation
async fn chat(engine: VoiceEngine) -> anyhow::Result<()> {
    let personality = engine.preferences().snapshot().personality;
    let (coordinator, handle, mut updates) = engine.into_session();
    let session = tokio::spawn(coordinator.run());

    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            print_update(&update);
        }
    });

    println!("{COMPANION_NAME} is here ({personality}).");
    println!("Press Enter to start talking, type 's' to stop, 'q' to quit.\n");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line?.as_deref().map(str::trim) {
                None | Some("q" | "quit") => break,
                Some("s" | "stop") => handle.stop(),
                Some(_) => handle.start(),
            },
        }
    }

    handle.shutdown();
    session.await?;
    println!("Take care. {COMPANION_NAME} is here whenever you need.");
    Ok(())
}

fn print_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::State(state) => tracing::debug!(?state, "session state"),
        SessionUpdate::Interim(text) if !text.is_empty() => println!("  … {text}"),
        SessionUpdate::Interim(_) => {}
        SessionUpdate::UserText(text) => println!("You: {text}"),
        SessionUpdate::EmotionDetected(mood) => println!("  (mood: {mood})"),
        SessionUpdate::Reply(text) => println!("{COMPANION_NAME}: {text}\n"),
        SessionUpdate::NotHeard => {
            println!("Sorry, I didn't get that. Could you please try again? (press Enter)");
        }
    }
}

/// Speak text and wait for it to finish
async fn say(engine: &VoiceEngine, text: &str) -> anyhow::Result<()> {
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    engine
        .speech()
        .speak(
            text,
            Some(Box::new(move || {
                let _ = done_tx.send(());
            })),
        )
        .await;

    if done_rx.await.is_err() {
        anyhow::bail!("speech did not complete");
    }
    Ok(())
}

fn classify_text(text: &str) {
    let topic = classify_topic(text).map_or_else(|| "none".to_string(), |t| t.to_string());
    println!("emotion: {}", classify(text));
    println!("topic:   {topic}");
}

/// List espeak voices and mark the one the current preferences pick
fn list_voices(config: &Config, prefs: &Preferences) -> anyhow::Result<()> {
    let espeak = EspeakSynthesizer::detect(config.voice.espeak_path.as_deref())?;
    let voices = espeak.voices();
    let snap = prefs.snapshot();
    let profile = VoiceProfile::lookup(snap.personality, snap.effective_gender());
    let selected = select_voice(&voices, profile.name_patterns);

    println!(
        "{} voices (personality {}, gender {}, rate {:.2}, pitch {:.2}):",
        voices.len(),
        snap.personality,
        snap.effective_gender(),
        profile.rate,
        profile.pitch
    );
    for voice in &voices {
        let marker = if selected.as_ref() == Some(voice) { "*" } else { " " };
        println!(" {marker} {:<40} {}", voice.name, voice.id);
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", mitra_voice::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play_samples(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}
