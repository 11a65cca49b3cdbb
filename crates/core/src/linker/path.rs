//! Destination path computation.

use std::path::{Path, PathBuf};

use crate::store::{MediaType, Source};

use super::LinkError;

const SUBTITLE_EXTENSIONS: &[&str] = &["ass", "ssa", "srt", "vtt", "sub"];

/// Library path for a file of `source`. Pure; touches no filesystem.
///
/// `ext` includes the leading dot (e.g. `.mkv`) or is empty.
pub fn compute_destination(
    output_base: &Path,
    source: &Source,
    final_episode: Option<i32>,
    ext: &str,
) -> Result<PathBuf, LinkError> {
    let title = sanitize_component(&source.title);
    let show_dir = output_base.join(&title);

    match source.media_type {
        MediaType::Movie => Ok(show_dir.join(format!("{title}{ext}"))),
        MediaType::Tv => {
            let episode = final_episode.ok_or(LinkError::MissingEpisode)?;
            if episode <= 0 {
                return Err(LinkError::InvalidEpisode(episode));
            }
            let season = source.season.unwrap_or(1);
            Ok(show_dir
                .join(format!("Season {season}"))
                .join(format!("{title} S{season:02}E{episode:02}{ext}")))
        }
    }
}

/// Extension to carry over to the library name, with its leading dot.
///
/// Subtitles keep a short language tag (`ep01.zh-CN.ass` -> `.zh-CN.ass`)
/// so several languages for one episode do not replace each other.
pub fn file_suffix(file_name: &str) -> String {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);

    let Some((stem, ext)) = name.rsplit_once('.') else {
        return String::new();
    };
    if stem.is_empty() {
        return String::new();
    }

    if SUBTITLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        if let Some((_, lang)) = stem.rsplit_once('.') {
            let is_tag = !lang.is_empty()
                && lang.len() <= 7
                && lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
            if is_tag {
                return format!(".{lang}.{ext}");
            }
        }
    }

    format!(".{ext}")
}

/// Replace characters that would split a title into several path components.
fn sanitize_component(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn tv(title: &str, season: Option<u32>) -> Source {
        let mut source = fixtures::source(1, title, MediaType::Tv);
        source.season = season;
        source
    }

    #[test]
    fn test_tv_destination_zero_pads() {
        let dest =
            compute_destination(Path::new("/library"), &tv("Frieren", Some(2)), Some(7), ".mkv")
                .unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/library/Frieren/Season 2/Frieren S02E07.mkv")
        );
    }

    #[test]
    fn test_tv_three_digit_episode() {
        let dest =
            compute_destination(Path::new("/lib"), &tv("One Piece", Some(1)), Some(1071), ".mp4")
                .unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/lib/One Piece/Season 1/One Piece S01E1071.mp4")
        );
    }

    #[test]
    fn test_tv_without_season_uses_season_one() {
        let dest =
            compute_destination(Path::new("/lib"), &tv("Show", None), Some(3), ".mkv").unwrap();
        assert_eq!(dest, PathBuf::from("/lib/Show/Season 1/Show S01E03.mkv"));
    }

    #[test]
    fn test_tv_without_episode_is_error() {
        let result = compute_destination(Path::new("/lib"), &tv("Show", Some(1)), None, ".mkv");
        assert!(matches!(result, Err(LinkError::MissingEpisode)));

        let result = compute_destination(Path::new("/lib"), &tv("Show", Some(1)), Some(0), ".mkv");
        assert!(matches!(result, Err(LinkError::InvalidEpisode(0))));
    }

    #[test]
    fn test_movie_has_no_episode() {
        let movie = fixtures::source(2, "Suzume", MediaType::Movie);
        let dest = compute_destination(Path::new("/lib"), &movie, None, ".mkv").unwrap();
        assert_eq!(dest, PathBuf::from("/lib/Suzume/Suzume.mkv"));

        let dest = compute_destination(Path::new("/lib"), &movie, Some(4), ".mkv").unwrap();
        assert_eq!(dest, PathBuf::from("/lib/Suzume/Suzume.mkv"));
    }

    #[test]
    fn test_destination_is_deterministic() {
        let source = tv("Show", Some(1));
        let a = compute_destination(Path::new("/lib"), &source, Some(5), ".mkv").unwrap();
        let b = compute_destination(Path::new("/lib"), &source, Some(5), ".mkv").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_title_separators_sanitized() {
        let dest =
            compute_destination(Path::new("/lib"), &tv("Fate/Zero", Some(1)), Some(1), ".mkv")
                .unwrap();
        assert_eq!(
            dest,
            PathBuf::from("/lib/Fate_Zero/Season 1/Fate_Zero S01E01.mkv")
        );
    }

    #[test]
    fn test_file_suffix() {
        assert_eq!(file_suffix("[Sub] Show - 01 [1080p].mkv"), ".mkv");
        assert_eq!(file_suffix("Show/Show.S01E01.mp4"), ".mp4");
        assert_eq!(file_suffix("Show - 01.zh-CN.ass"), ".zh-CN.ass");
        assert_eq!(file_suffix("Show - 01.sc.ASS"), ".sc.ASS");
        assert_eq!(file_suffix("Show - 01 [v2].ass"), ".ass");
        assert_eq!(file_suffix("README"), "");
        assert_eq!(file_suffix(".hidden"), "");
    }
}
