//! Selection classification.

use std::path::Path;

use super::plan::{AudioMixPlan, InputPlan, PlaylistPlan};
use crate::domain::{MediaItem, MediaType, PlanPolicy};
use crate::{Error, Result};

/// Caller options for a session start.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Restart the input from the beginning once it is exhausted.
    pub looping: bool,
    /// Explicitly chosen overlay image for audio-only sessions.
    pub cover: Option<MediaItem>,
}

/// Build the input plan for a selection.
///
/// - Any video item: a playlist of every video item in selection order.
///   Audio and image items are ignored. Requires the plan to allow video.
/// - Otherwise any audio item: an audio chain of every audio item in
///   selection order, with the overlay resolved as the chosen cover if its
///   file exists, else the first selected image whose file exists, else a
///   generated still.
/// - Otherwise the selection is invalid.
pub fn assemble(items: &[MediaItem], policy: &PlanPolicy, options: &StartOptions) -> Result<InputPlan> {
    assemble_with_probe(items, policy, options, |path| path.is_file())
}

/// [`assemble`] with a custom existence check for overlay candidates.
pub fn assemble_with_probe<F>(
    items: &[MediaItem],
    policy: &PlanPolicy,
    options: &StartOptions,
    exists: F,
) -> Result<InputPlan>
where
    F: Fn(&Path) -> bool,
{
    if items.is_empty() {
        return Err(Error::invalid_selection("select at least one media item"));
    }

    let videos: Vec<_> = items
        .iter()
        .filter(|item| item.is_video())
        .map(|item| item.path.clone())
        .collect();

    if !videos.is_empty() {
        if !policy.allows(MediaType::Video) {
            return Err(Error::UnsupportedMediaType(MediaType::Video));
        }
        return Ok(InputPlan::Playlist(PlaylistPlan {
            files: videos,
            looping: options.looping,
        }));
    }

    let audio_files: Vec<_> = items
        .iter()
        .filter(|item| item.is_audio())
        .map(|item| item.path.clone())
        .collect();

    if audio_files.is_empty() {
        return Err(Error::invalid_selection(
            "selection contains no audio or video items",
        ));
    }

    let overlay_image = options
        .cover
        .as_ref()
        .map(|cover| cover.path.clone())
        .filter(|path| exists(path))
        .or_else(|| {
            items
                .iter()
                .find(|item| item.is_image() && exists(&item.path))
                .map(|item| item.path.clone())
        });

    Ok(InputPlan::AudioMix(AudioMixPlan {
        audio_files,
        looping: options.looping,
        overlay_image,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn item(id: &str, media_type: MediaType) -> MediaItem {
        let ext = match media_type {
            MediaType::Video => "mp4",
            MediaType::Audio => "mp3",
            MediaType::Image => "jpg",
        };
        MediaItem {
            id: id.to_string(),
            account_id: "acc".to_string(),
            filename: format!("{id}.{ext}"),
            path: PathBuf::from(format!("/media/{id}.{ext}")),
            size_bytes: 1,
            media_type,
        }
    }

    fn full_policy() -> PlanPolicy {
        PlanPolicy::new([MediaType::Video, MediaType::Audio, MediaType::Image], 3600)
    }

    fn audio_policy() -> PlanPolicy {
        PlanPolicy::new([MediaType::Audio, MediaType::Image], 3600)
    }

    #[test]
    fn test_empty_selection_is_invalid() {
        for looping in [false, true] {
            let options = StartOptions {
                looping,
                cover: Some(item("cover", MediaType::Image)),
            };
            let err = assemble_with_probe(&[], &full_policy(), &options, |_| true).unwrap_err();
            assert!(matches!(err, Error::InvalidSelection(_)));
        }
    }

    #[test]
    fn test_video_items_win_and_keep_order() {
        let items = vec![
            item("a1", MediaType::Audio),
            item("v2", MediaType::Video),
            item("i1", MediaType::Image),
            item("v1", MediaType::Video),
            item("a2", MediaType::Audio),
        ];
        let options = StartOptions {
            looping: true,
            cover: None,
        };

        let plan = assemble(&items, &full_policy(), &options).unwrap();
        assert_eq!(
            plan,
            InputPlan::Playlist(PlaylistPlan {
                files: vec![
                    PathBuf::from("/media/v2.mp4"),
                    PathBuf::from("/media/v1.mp4")
                ],
                looping: true,
            })
        );
    }

    #[test]
    fn test_video_forbidden_by_plan() {
        let items = vec![item("a1", MediaType::Audio), item("v1", MediaType::Video)];
        let err = assemble(&items, &audio_policy(), &StartOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(MediaType::Video)));
    }

    #[test]
    fn test_audio_only_uses_existing_cover() {
        let items = vec![
            item("a1", MediaType::Audio),
            item("i1", MediaType::Image),
            item("a2", MediaType::Audio),
        ];
        let options = StartOptions {
            looping: false,
            cover: Some(item("cover", MediaType::Image)),
        };

        let plan = assemble_with_probe(&items, &audio_policy(), &options, |_| true).unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(
            mix.audio_files,
            vec![PathBuf::from("/media/a1.mp3"), PathBuf::from("/media/a2.mp3")]
        );
        assert_eq!(mix.overlay_image, Some(PathBuf::from("/media/cover.jpg")));
        assert!(!mix.looping);
    }

    #[test]
    fn test_missing_cover_falls_back_to_first_image() {
        let items = vec![
            item("a1", MediaType::Audio),
            item("i1", MediaType::Image),
            item("i2", MediaType::Image),
        ];
        let options = StartOptions {
            looping: false,
            cover: Some(item("gone", MediaType::Image)),
        };

        let plan = assemble_with_probe(&items, &audio_policy(), &options, |path| {
            path != Path::new("/media/gone.jpg")
        })
        .unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(mix.overlay_image, Some(PathBuf::from("/media/i1.jpg")));
    }

    #[test]
    fn test_fallback_skips_missing_images() {
        let items = vec![
            item("a1", MediaType::Audio),
            item("i1", MediaType::Image),
            item("i2", MediaType::Image),
        ];

        let plan = assemble_with_probe(&items, &audio_policy(), &StartOptions::default(), |path| {
            path == Path::new("/media/i2.jpg")
        })
        .unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(mix.overlay_image, Some(PathBuf::from("/media/i2.jpg")));
    }

    #[test]
    fn test_deleted_image_uses_generated_still() {
        let mut image = item("deleted", MediaType::Image);
        image.path = PathBuf::from("/nonexistent/deleted.jpg");
        let items = vec![item("a1", MediaType::Audio), image];

        let plan = assemble(&items, &audio_policy(), &StartOptions::default()).unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(mix.audio_files, vec![PathBuf::from("/media/a1.mp3")]);
        assert_eq!(mix.overlay_image, None);
    }

    #[test]
    fn test_no_cover_and_no_image_uses_generated_still() {
        let items = vec![item("a1", MediaType::Audio)];
        let plan = assemble(&items, &audio_policy(), &StartOptions::default()).unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(mix.overlay_image, None);
    }

    #[test]
    fn test_cover_existence_checked_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cover_path = dir.path().join("cover.png");
        std::fs::write(&cover_path, b"png").unwrap();

        let mut cover = item("cover", MediaType::Image);
        cover.path = cover_path.clone();
        let options = StartOptions {
            looping: false,
            cover: Some(cover),
        };

        let plan = assemble(&[item("a1", MediaType::Audio)], &audio_policy(), &options).unwrap();
        let InputPlan::AudioMix(mix) = plan else {
            panic!("expected audio mix plan");
        };
        assert_eq!(mix.overlay_image, Some(cover_path));
    }

    #[test]
    fn test_image_only_selection_is_invalid() {
        let items = vec![item("i1", MediaType::Image)];
        let err = assemble(&items, &full_policy(), &StartOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidSelection(_)));
    }
}
