use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn thinking_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>|<think>.*?</think>|<reasoning>.*?</reasoning>")
            .expect("valid thinking regex")
    })
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid blank line regex"))
}

fn unsafe_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).expect("valid filename regex"))
}

/// Strips reasoning blocks and collapses runs of blank lines in model prose.
pub fn clean_model_output(text: &str) -> String {
    let out = thinking_re().replace_all(text, "");
    let out = blank_lines_re().replace_all(&out, "\n\n");
    out.trim().to_string()
}

/// Last `max_chars` characters of `text` (by char, not byte).
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}

/// First `max_chars` characters of `text` (by char, not byte).
pub fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let head = head_chars(&flat, max_chars);
    if head.len() < flat.len() {
        format!("{}...", head.trim_end())
    } else {
        flat
    }
}

/// Story title for an imported file: the file name without its extension.
pub fn title_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let stem = stem.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// File stem that is safe to write on every platform.
pub fn sanitize_file_stem(title: &str) -> String {
    let out = unsafe_filename_re().replace_all(title.trim(), "_");
    let out = out.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if out.is_empty() {
        "story".to_string()
    } else {
        head_chars(out, 80).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_strips_thinking_and_blank_runs() {
        let input = "<think>plan</think>\nপ্রথম\n\n\n\nদ্বিতীয়\n";
        assert_eq!(clean_model_output(input), "প্রথম\n\nদ্বিতীয়");
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let s = "আমার গল্প";
        assert_eq!(tail_chars(s, 4), "গল্প");
        assert_eq!(tail_chars(s, 100), s);
        assert_eq!(head_chars(s, 4), "আমার");
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\nb   c", 10), "a b c");
        assert_eq!(excerpt("abcdef", 3), "abc...");
    }

    #[test]
    fn title_is_file_stem() {
        assert_eq!(
            title_from_path(Path::new("/tmp/নদীর গল্প.txt")).as_deref(),
            Some("নদীর গল্প")
        );
        assert_eq!(title_from_path(Path::new("/tmp/notes")).as_deref(), Some("notes"));
        assert_eq!(title_from_path(Path::new("/")), None);
    }

    #[test]
    fn sanitizes_file_stems() {
        assert_eq!(sanitize_file_stem("a/b:c?"), "a_b_c_");
        assert_eq!(sanitize_file_stem("  ..  "), "story");
    }
}
