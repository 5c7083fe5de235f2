//! Concat demuxer playlist descriptors.

use std::path::{Path, PathBuf};

use crate::Result;

/// One `file '...'` line of a concat descriptor, with single quotes escaped.
pub fn concat_line(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'", path)
}

/// Write a concat descriptor listing `files` into `dir` and return its path.
///
/// Relative paths are made absolute so the descriptor does not depend on
/// the engine's working directory.
pub async fn write_concat_playlist(dir: &Path, name: &str, files: &[PathBuf]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let mut content = String::new();
    for file in files {
        let absolute = std::path::absolute(file)?;
        content.push_str(&concat_line(&absolute));
        content.push('\n');
    }

    let path = dir.join(format!("playlist-{}.txt", name));
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_line_escapes_quotes() {
        assert_eq!(
            concat_line(Path::new("/media/it's.mp4")),
            r"file '/media/it'\''s.mp4'"
        );
        assert_eq!(concat_line(Path::new("/media/a.mp4")), "file '/media/a.mp4'");
    }

    #[tokio::test]
    async fn test_write_concat_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("work");
        let files = vec![PathBuf::from("/media/a.mp4"), PathBuf::from("/media/b.mp4")];

        let path = write_concat_playlist(&work_dir, "s1", &files).await.unwrap();
        assert_eq!(path, work_dir.join("playlist-s1.txt"));

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "file '/media/a.mp4'\nfile '/media/b.mp4'\n");
    }
}
