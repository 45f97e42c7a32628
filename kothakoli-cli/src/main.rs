//! `kothakoli` binary: drives the studio service from the terminal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use env_logger::Env;
use log::{error, info};

mod cli;
use cli::{Cli, Commands, IllustrateCommand, NewCommand, SetKeyCommand, SettingsCommand, VoiceCommand};

use kothakoli_appcore::{StudioError, StudioService};
use kothakoli_audio::{
    CAPTURE_SAMPLE_RATE_HZ, FrameChunker, HeadlessClock, PLAYBACK_SAMPLE_RATE_HZ, SharedMixer,
};
use kothakoli_core::{StoryId, StoryPatch, View};
use kothakoli_engine::voice::VoiceUpdate;
use kothakoli_engine::{GatewayConfig, GeminiGateway};
use kothakoli_providers::gemini_live::LiveConfig;
use kothakoli_runtime::paths::DataPaths;
use kothakoli_runtime::secrets::{SecretKey, delete_secret, resolve_api_key, set_secret};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{e:#}");
        match e.downcast_ref::<StudioError>() {
            Some(studio) => eprintln!("{}", studio.user_message()),
            None => eprintln!("error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::SetKey(cmd) = &cli.command {
        return set_key(cmd);
    }

    let paths = match &cli.data_dir {
        Some(dir) => DataPaths::at(dir),
        None => DataPaths::default_location(),
    };
    let api_key = resolve_api_key();
    let gateway = GeminiGateway::new(GatewayConfig::production(api_key.clone()));
    let svc = StudioService::open(&paths, Arc::new(gateway))?;

    let res = dispatch(&svc, cli.command, api_key).await;
    // Persist whatever changed, even when the command failed halfway.
    svc.flush().await?;
    res
}

async fn dispatch(svc: &StudioService, command: Commands, api_key: Option<String>) -> Result<()> {
    match command {
        Commands::New(cmd) => new_story(svc, cmd)?,
        Commands::List => list(svc),
        Commands::Show { story } => show(svc, story)?,
        Commands::Import { path } => {
            let id = svc.import_story(&path)?;
            println!("{id}");
        }
        Commands::Export { story, dir } => {
            let path = svc.export_story(story, &dir)?;
            println!("{}", path.display());
        }
        Commands::Delete { story } => {
            let removed = svc.delete_story(story)?;
            println!("deleted: {}", removed.title);
        }
        Commands::Settings(cmd) => settings(svc, cmd)?,
        Commands::Continue { story, directive } => {
            select(svc, story, View::Editor)?;
            let updated = svc.continue_story(&directive.join(" ")).await?;
            println!("{}", updated.content);
        }
        Commands::Illustrate(cmd) => illustrate(svc, cmd).await?,
        Commands::EditImage {
            story,
            asset,
            instruction,
        } => {
            select(svc, story, View::MediaLab)?;
            let edited = svc.edit_asset(asset, &instruction.join(" ")).await?;
            println!("{} {}", edited.id, edited.url);
        }
        Commands::Animate { story, asset } => {
            select(svc, story, View::MediaLab)?;
            info!("generating video; this can take several minutes");
            let clip = svc.animate_asset(asset).await?;
            println!("{} {}", clip.id, clip.url);
        }
        Commands::Narrate { story, text } => {
            select(svc, story, View::Editor)?;
            let path = svc.narrate(text.as_deref()).await?;
            println!("{}", path.display());
        }
        Commands::Voice(cmd) => voice(svc, cmd, api_key).await?,
        Commands::SetKey(cmd) => set_key(&cmd)?,
    }
    Ok(())
}

fn select(svc: &StudioService, story: StoryId, view: View) -> Result<(), StudioError> {
    svc.select_story(story)?;
    svc.navigate(view)
}

fn new_story(svc: &StudioService, cmd: NewCommand) -> Result<()> {
    let id = svc.new_story();
    let patch = StoryPatch {
        title: cmd.title,
        genre: cmd.genre,
        tone: cmd.tone.map(Some),
        ..Default::default()
    };
    if !patch.is_empty() {
        svc.update_story(id, patch)?;
    }
    println!("{id}");
    Ok(())
}

fn list(svc: &StudioService) {
    let cards = svc.library_cards();
    if cards.is_empty() {
        println!("library is empty");
        return;
    }
    for card in cards {
        let thumb = match (&card.thumbnail, card.blur_thumbnail) {
            (Some(_), true) => " [image, blurred]",
            (Some(_), false) => " [image]",
            (None, _) => "",
        };
        println!("{}  {:<4}  {}{}", card.id, card.badge, card.title, thumb);
        println!("    {}", card.excerpt);
    }
}

fn show(svc: &StudioService, id: StoryId) -> Result<()> {
    let story = svc
        .story(id)
        .ok_or_else(|| anyhow!("story not found: {id}"))?;
    println!("# {}", story.title);
    println!(
        "genre: {}  tone: {}  rating: {}",
        story.genre,
        story.tone_or_default().label(),
        story.maturity.badge()
    );
    for asset in &story.assets {
        println!("  [{:?}] {} {}  ({})", asset.kind, asset.id, asset.url, asset.prompt);
    }
    println!();
    println!("{}", story.content);
    Ok(())
}

fn settings(svc: &StudioService, cmd: SettingsCommand) -> Result<()> {
    if let Some(dialect) = cmd.dialect {
        svc.set_dialect(dialect)?;
    }
    if let Some(level) = cmd.maturity {
        svc.set_maturity(level, cmd.confirm_adult)?;
    }
    if let Some(blur) = cmd.blur_thumbnails {
        svc.set_blur_thumbnails(blur)?;
    }
    if let Some(quality) = cmd.quality {
        svc.set_default_image_quality(quality)?;
    }
    if let Some(dark) = cmd.dark_theme {
        svc.set_dark_theme(dark)?;
    }
    let current = svc.settings();
    let json = serde_json::to_string_pretty(&current).context("serialize settings")?;
    println!("{json}");
    println!(
        "writing in {}, effective rating {}",
        current.dialect.display_name(),
        current.effective_maturity().badge()
    );
    Ok(())
}

async fn illustrate(svc: &StudioService, cmd: IllustrateCommand) -> Result<()> {
    select(svc, cmd.story, View::MediaLab)?;
    let asset = svc.illustrate(cmd.prompt.as_deref(), cmd.quality).await?;
    println!("{} {}", asset.id, asset.url);
    println!("prompt: {}", asset.prompt);
    Ok(())
}

fn set_key(cmd: &SetKeyCommand) -> Result<()> {
    if cmd.clear {
        delete_secret(SecretKey::GeminiApiKey)?;
        println!("API key removed");
        return Ok(());
    }
    let key = cmd
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow!("API key is empty"))?;
    set_secret(SecretKey::GeminiApiKey, key)?;
    println!("API key saved to the OS keyring");
    Ok(())
}

async fn voice(svc: &StudioService, cmd: VoiceCommand, api_key: Option<String>) -> Result<()> {
    let api_key = api_key.ok_or(StudioError::Gateway(
        kothakoli_engine::GatewayError::MissingCredential,
    ))?;
    if let Some(story) = cmd.story {
        svc.select_story(story)?;
    }
    svc.navigate(View::VoiceStudio)?;
    let cfg = LiveConfig::production(api_key, svc.voice_instruction())?;

    {
        let svc = svc.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("stopping voice session");
                svc.stop_voice();
            }
        });
    }

    let on_update = |u: &VoiceUpdate| match u {
        VoiceUpdate::Utterance(line) => println!("{line}"),
        VoiceUpdate::State(state) => info!("voice: {state:?}"),
        VoiceUpdate::Warning(w) => log::warn!("voice: {w}"),
    };

    let outcome = match cmd.pcm {
        Some(path) => {
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(feed_pcm_file(path, tx, Duration::from_secs(cmd.linger)));
            // No speaker on this path; replies play into a mixer nobody hears.
            let mixer = SharedMixer::new(PLAYBACK_SAMPLE_RATE_HZ);
            let clock = tokio::spawn(run_headless_clock(mixer.clone()));
            let res = svc.run_voice_session(cfg, rx, mixer, on_update).await;
            clock.abort();
            res?
        }
        None => run_with_devices(svc, cfg, on_update).await?,
    };

    match outcome.story {
        Some(id) => println!("transcript saved to story {id}"),
        None => println!("nothing was said"),
    }
    Ok(())
}

/// Advances the mixer clock at real-time pace so finished replies are released.
async fn run_headless_clock(mixer: SharedMixer) {
    let started = tokio::time::Instant::now();
    let mut clock = HeadlessClock::new(mixer);
    let mut tick = tokio::time::interval(Duration::from_millis(50));
    loop {
        tick.tick().await;
        clock.advance_to(started.elapsed().as_secs_f64());
    }
}

/// Streams a raw PCM file at real-time pace, then keeps the uplink open for `linger`.
async fn feed_pcm_file(path: std::path::PathBuf, tx: mpsc::Sender<Vec<f32>>, linger: Duration) {
    let frames = match read_pcm_frames(&path) {
        Ok(f) => f,
        Err(e) => {
            error!("{e:#}");
            return;
        }
    };
    info!("sending {} frames from {}", frames.len(), path.display());

    let mut tick = tokio::time::interval(Duration::from_secs_f64(
        kothakoli_audio::CAPTURE_FRAME_SAMPLES as f64 / f64::from(CAPTURE_SAMPLE_RATE_HZ),
    ));
    for frame in frames {
        tick.tick().await;
        if tx.send(frame).await.is_err() {
            return;
        }
    }
    tokio::time::sleep(linger).await;
}

fn read_pcm_frames(path: &Path) -> Result<Vec<Vec<f32>>> {
    let bytes = std::fs::read(path).with_context(|| format!("read pcm: {}", path.display()))?;
    let samples = kothakoli_audio::pcm::decode_pcm16_le(&bytes);
    let mut chunker = FrameChunker::default();
    let mut frames = chunker.push(&samples);
    // Pad the tail so the last words are sent too.
    if chunker.pending_len() > 0 {
        let pad = vec![0.0; chunker.frame_len() - chunker.pending_len()];
        frames.extend(chunker.push(&pad));
    }
    Ok(frames)
}

#[cfg(any(windows, target_os = "macos"))]
async fn run_with_devices<F>(
    svc: &StudioService,
    cfg: LiveConfig,
    on_update: F,
) -> Result<kothakoli_appcore::VoiceOutcome>
where
    F: FnMut(&VoiceUpdate) + Send,
{
    use kothakoli_audio::{MicCapture, SpeakerOutput};

    let speaker = SpeakerOutput::open_default()?;
    let (tx, rx) = mpsc::channel(16);
    let mic = MicCapture::start(move |frame| {
        if tx.try_send(frame).is_err() {
            log::debug!("capture frame dropped");
        }
    })?;
    info!("listening; press Ctrl-C to finish");

    let res = svc
        .run_voice_session(cfg, rx, speaker.mixer(), on_update)
        .await;
    mic.stop();
    speaker.close();
    Ok(res?)
}

#[cfg(not(any(windows, target_os = "macos")))]
async fn run_with_devices<F>(
    _svc: &StudioService,
    _cfg: LiveConfig,
    _on_update: F,
) -> Result<kothakoli_appcore::VoiceOutcome>
where
    F: FnMut(&VoiceUpdate) + Send,
{
    Err(anyhow!(
        "microphone capture is only supported on Windows and macOS; use --pcm <file>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_file_is_split_into_padded_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.pcm");
        let samples = kothakoli_audio::CAPTURE_FRAME_SAMPLES + 10;
        std::fs::write(&path, vec![0u8; samples * 2]).unwrap();

        let frames = read_pcm_frames(&path).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == kothakoli_audio::CAPTURE_FRAME_SAMPLES));
    }
}
