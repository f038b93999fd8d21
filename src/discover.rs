use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use once_cell::sync::Lazy;

/// Extensions recognized as video files when scanning a directory.
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "avi", "flv", "mkv", "webm", "mov"];

static EXTENSION_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| VIDEO_EXTENSIONS.iter().copied().collect());

/// Identifier a video contributes to storage keys: its file stem.
pub fn video_id(path: &Path) -> String {
    match path.file_stem() {
        Some(stem) => stem.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Videos to process under the given path.
///
/// A file is taken as-is. A directory contributes every entry with a
/// known video extension, in lexical order; entries sharing a file stem
/// collapse to the first one, since the stem is what storage keys are
/// built from.
pub fn discover_videos(path: &Path) -> io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        let extension = match entry_path.extension() {
            Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
            None => continue,
        };
        if EXTENSION_SET.contains(extension.as_str()) {
            candidates.push(entry_path);
        }
    }
    candidates.sort();

    let mut seen = HashSet::new();
    let mut videos = Vec::new();
    for candidate in candidates {
        let id = video_id(&candidate);
        if seen.contains(&id) {
            warn!(
                "skipping {}: another video with stem {} is already queued",
                candidate.display(),
                id
            );
            continue;
        }
        seen.insert(id);
        videos.push(candidate);
    }
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(videos: &[PathBuf]) -> Vec<String> {
        videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_single_file_is_taken_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("talk.mp4");
        fs::write(&file, b"").unwrap();

        assert_eq!(discover_videos(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_directory_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mkv", "a.mp4", "notes.txt", "c.MOV", "thumb.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = discover_videos(dir.path()).unwrap();

        assert_eq!(names(&videos), vec!["a.mp4", "b.mkv", "c.MOV"]);
    }

    #[test]
    fn test_duplicate_stems_collapse_to_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["clip.avi", "clip.mp4", "other.webm"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = discover_videos(dir.path()).unwrap();

        assert_eq!(names(&videos), vec!["clip.avi", "other.webm"]);
    }

    #[test]
    fn test_subdirectories_are_not_recursed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.mp4"), b"").unwrap();
        fs::write(dir.path().join("top.mp4"), b"").unwrap();

        let videos = discover_videos(dir.path()).unwrap();

        assert_eq!(names(&videos), vec!["top.mp4"]);
    }

    #[test]
    fn test_video_id_is_the_stem() {
        assert_eq!(video_id(Path::new("/data/in/clip.mp4")), "clip");
        assert_eq!(video_id(Path::new("archive.tar.mp4")), "archive.tar");
    }
}
