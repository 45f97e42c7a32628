//! Command line surface of the story studio.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kothakoli_core::{AssetId, Dialect, ImageQuality, MaturityLevel, StoryId, Tone};

/// KothaKoli story studio
#[derive(Parser, Debug)]
#[command(name = "kothakoli", author, version, about, long_about = None)]
pub struct Cli {
    /// Where stories, settings and media live (default: the user data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a blank story
    New(NewCommand),

    /// Show the library, newest first
    List,

    /// Print one story with its assets
    Show { story: StoryId },

    /// Import a plain-text file as a new story
    Import { path: PathBuf },

    /// Write a story's text to `<title>.txt`
    Export {
        story: StoryId,

        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Delete a story and its media
    Delete { story: StoryId },

    /// Show or change settings
    Settings(SettingsCommand),

    /// Ask the model to continue a story
    Continue {
        story: StoryId,

        /// What should happen next
        #[arg(required = true, num_args = 1..)]
        directive: Vec<String>,
    },

    /// Generate an illustration for a story
    Illustrate(IllustrateCommand),

    /// Edit one of a story's images
    EditImage {
        story: StoryId,
        asset: AssetId,

        #[arg(required = true, num_args = 1..)]
        instruction: Vec<String>,
    },

    /// Animate one of a story's images into a short clip
    Animate { story: StoryId, asset: AssetId },

    /// Narrate a story (or the given text) into a WAV file
    Narrate {
        story: StoryId,

        #[arg(short, long)]
        text: Option<String>,
    },

    /// Talk with the live co-writer; the transcript lands in the story
    Voice(VoiceCommand),

    /// Store the Gemini API key in the OS keyring
    SetKey(SetKeyCommand),
}

#[derive(Parser, Debug)]
pub struct NewCommand {
    #[arg(short, long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub genre: Option<String>,

    /// Standard, Romantic, Dark, Erotic or Suspense
    #[arg(long)]
    pub tone: Option<Tone>,
}

#[derive(Parser, Debug)]
pub struct SettingsCommand {
    /// bengali, dhaka, chittagong or sylhet
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// general or mature
    #[arg(long)]
    pub maturity: Option<MaturityLevel>,

    /// Confirm you are 18 or older (needed once for mature)
    #[arg(long)]
    pub confirm_adult: bool,

    #[arg(long)]
    pub blur_thumbnails: Option<bool>,

    /// 1K, 2K or 4K
    #[arg(long)]
    pub quality: Option<ImageQuality>,

    #[arg(long)]
    pub dark_theme: Option<bool>,
}

#[derive(Parser, Debug)]
pub struct IllustrateCommand {
    pub story: StoryId,

    /// Scene to draw. Without it the story text is turned into a prompt.
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// 1K, 2K or 4K (default: settings)
    #[arg(short, long)]
    pub quality: Option<ImageQuality>,
}

#[derive(Parser, Debug)]
pub struct VoiceCommand {
    /// Story to append to; a new voice story is created otherwise
    #[arg(short, long)]
    pub story: Option<StoryId>,

    /// Send raw 16 kHz mono s16le PCM from this file instead of the microphone
    #[arg(long)]
    pub pcm: Option<PathBuf>,

    /// Seconds to keep listening after the PCM file is sent
    #[arg(long, default_value_t = 8)]
    pub linger: u64,
}

#[derive(Parser, Debug)]
pub struct SetKeyCommand {
    /// Key value; omit with --clear
    #[arg(required_unless_present = "clear")]
    pub key: Option<String>,

    /// Remove the stored key
    #[arg(long)]
    pub clear: bool,
}
