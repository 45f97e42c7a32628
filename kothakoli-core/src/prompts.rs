// Prompt text sent to the hosted model. Everything here is pure string building so
// it can be checked without a network.

use crate::text::{head_chars, tail_chars};
use crate::types::{Dialect, MaturityLevel, Tone};

pub const MAX_CONTEXT_CHARS: usize = 12_000;
pub const MAX_TTS_CHARS: usize = 4_000;
pub const VISUAL_SCENE_CHARS: usize = 1_500;
pub const IMAGE_PROMPT_CHARS: usize = 800;
pub const VIDEO_PROMPT_CHARS: usize = 500;

pub const VISUAL_PROMPT_SYSTEM: &str = "Respond with the English prompt ONLY.";
pub const FALLBACK_VISUAL_PROMPT: &str =
    "Atmospheric cinematic lighting, ultra-high definition photography";
pub const EMPTY_VISUAL_PROMPT: &str = "Cinematic Bengali scene, high detail";

pub const VOICE_FEMININE: &str = "Kore";
pub const VOICE_NEUTRAL: &str = "Zephyr";

/// Keeps the most recent part of a long manuscript.
pub fn truncate_context(content: &str) -> String {
    if content.chars().count() <= MAX_CONTEXT_CHARS {
        return content.to_string();
    }
    format!("...{}", tail_chars(content, MAX_CONTEXT_CHARS))
}

pub fn story_system_instruction(maturity: MaturityLevel, tone: Tone, dialect: Dialect) -> String {
    let language = dialect.prompt_name();
    let mode = if maturity.is_mature() {
        format!(
            "MATURE MODE (18+): You may write adult fiction of literary quality, including \
             explicit romance, psychological trauma, eroticism and dark realism where the \
             narrative calls for it.\nTone: {}.",
            tone.label()
        )
    } else {
        "GENERAL MODE: Write family-friendly, wholesome and engaging literature.".to_string()
    };

    format!(
        "You are a world-class Bengali novelist and literary mastermind writing in {language}.\n\
         Your writing is evocative, emotionally deep and uses sophisticated Bengali vocabulary.\n\
         {mode}\n\
         Always respond ONLY in {language}. No English conversational filler."
    )
}

pub fn continuation_request(directive: &str, current_content: &str) -> String {
    format!(
        "Continue or refine this story based on: {}. Current content: {}",
        directive.trim(),
        current_content
    )
}

pub fn visual_prompt_request(scene: &str, maturity: MaturityLevel) -> String {
    let mood = if maturity.is_mature() {
        "Atmospheric, cinematic, sensual, moody"
    } else {
        "Cinematic, vibrant, detailed"
    };
    format!(
        "Create a professional English artistic prompt for an image generator based on this scene.\n\
         Mood: {mood}.\n\
         Scene: \"{}\"",
        tail_chars(scene, VISUAL_SCENE_CHARS)
    )
}

pub fn image_prompt(prompt: &str, maturity: MaturityLevel) -> String {
    let style = if maturity.is_mature() {
        "Moody, sensual, cinematic adult fiction aesthetic:"
    } else {
        "Beautiful, vibrant, cinematic literary illustration:"
    };
    format!("{style} {}", tail_chars(prompt, IMAGE_PROMPT_CHARS))
}

pub fn animation_prompt(asset_prompt: &str) -> String {
    format!("Animate this scene: {asset_prompt}")
}

pub fn animation_asset_prompt(asset_prompt: &str) -> String {
    format!("Animation of: {asset_prompt}")
}

pub fn video_prompt(prompt: &str) -> &str {
    head_chars(prompt, VIDEO_PROMPT_CHARS)
}

pub fn narration_request(text: &str, tone: Tone) -> String {
    format!(
        "Narrate this Bengali text naturally with a {} tone: {}",
        tone.label().to_lowercase(),
        head_chars(text, MAX_TTS_CHARS)
    )
}

pub fn narration_voice(tone: Tone) -> &'static str {
    match tone {
        Tone::Romantic | Tone::Erotic => VOICE_FEMININE,
        _ => VOICE_NEUTRAL,
    }
}

pub fn co_writer_instruction(maturity: MaturityLevel, dialect: Dialect) -> String {
    let setting = if maturity.is_mature() {
        "The setting is MATURE (18+). Explore adult themes without restriction."
    } else {
        "The setting is GENERAL."
    };
    format!(
        "You are a sophisticated Bengali co-writer. {setting} Speak in {}.",
        dialect.prompt_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_tail_with_ellipsis() {
        let long = "ক".repeat(MAX_CONTEXT_CHARS + 10);
        let out = truncate_context(&long);
        assert!(out.starts_with("..."));
        assert_eq!(out.chars().count(), MAX_CONTEXT_CHARS + 3);

        assert_eq!(truncate_context("short"), "short");
    }

    #[test]
    fn system_instruction_depends_on_maturity() {
        let general = story_system_instruction(MaturityLevel::General, Tone::Dark, Dialect::Dhaka);
        assert!(general.contains("GENERAL MODE"));
        assert!(!general.contains("Tone: Dark"));
        assert!(general.contains("Dhaka"));

        let mature = story_system_instruction(MaturityLevel::Mature, Tone::Dark, Dialect::Bengali);
        assert!(mature.contains("MATURE MODE"));
        assert!(mature.contains("Tone: Dark."));
    }

    #[test]
    fn image_prompt_is_styled_and_clipped() {
        let long = "x".repeat(IMAGE_PROMPT_CHARS * 2);
        let out = image_prompt(&long, MaturityLevel::General);
        assert!(out.starts_with("Beautiful, vibrant"));
        assert!(out.ends_with(&"x".repeat(IMAGE_PROMPT_CHARS)));
        assert!(!out.contains(&"x".repeat(IMAGE_PROMPT_CHARS + 1)));
    }

    #[test]
    fn narration_voice_follows_tone() {
        assert_eq!(narration_voice(Tone::Romantic), VOICE_FEMININE);
        assert_eq!(narration_voice(Tone::Erotic), VOICE_FEMININE);
        assert_eq!(narration_voice(Tone::Standard), VOICE_NEUTRAL);
    }

    #[test]
    fn narration_text_is_clamped() {
        let long = "ক".repeat(MAX_TTS_CHARS + 50);
        let req = narration_request(&long, Tone::Standard);
        assert!(req.contains("standard tone"));
        assert_eq!(req.matches('ক').count(), MAX_TTS_CHARS);
    }

    #[test]
    fn video_prompt_keeps_head() {
        let long = format!("{}{}", "a".repeat(VIDEO_PROMPT_CHARS), "b");
        assert_eq!(video_prompt(&long), "a".repeat(VIDEO_PROMPT_CHARS));
    }
}
