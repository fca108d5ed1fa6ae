//! Pipeline orchestration (spec §4.13): reads the published recording
//! documents, runs every `compose_engine`/`compose_ffmpeg` stage in order,
//! and owns the scratch directory's lifecycle — created up front, written
//! to throughout, and removed only once the final MP4 is in place.

use crate::error::PipelineError;
use crate::fs_source::FileImageSource;
use compose_ffmpeg::{ExternalFontMetric, FilterGraphSpec};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::process::Command;
use types::{PipelineConfig, Time};

async fn read_to_string(path: &Path) -> Result<String, PipelineError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PipelineError::Io { path: path.to_path_buf(), source })
}

async fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), PipelineError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| PipelineError::Io { path: path.to_path_buf(), source })
}

async fn run_tool(mut cmd: Command, tool: &'static str) -> Result<(), PipelineError> {
    let status = cmd
        .status()
        .await
        .map_err(|source| PipelineError::Spawn { tool, source })?;
    if !status.success() {
        return Err(PipelineError::ToolFailed { tool });
    }
    Ok(())
}

fn process_startup_salt() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

/// Runs the full composition pipeline for one meeting, leaving the
/// finished MP4 at `config.output_path` on success.
pub async fn run(config: &PipelineConfig) -> Result<(), PipelineError> {
    tracing::info!(meeting_id = %config.meeting_id, "starting composition pipeline");

    tokio::fs::create_dir_all(&config.scratch_root)
        .await
        .map_err(|source| PipelineError::Io { path: config.scratch_root.clone(), source })?;

    match run_inner(config).await {
        Ok(()) => {
            if let Err(source) = tokio::fs::remove_dir_all(&config.scratch_root).await {
                tracing::warn!(error = %source, "failed to clean up scratch directory after success");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "pipeline failed, leaving scratch directory for inspection");
            Err(e)
        }
    }
}

async fn run_inner(config: &PipelineConfig) -> Result<(), PipelineError> {
    let published = &config.published_root;
    let images = FileImageSource::new(published.clone());
    let font = ExternalFontMetric::new("DejaVu Sans");

    let shapes_xml = read_to_string(&published.join("shapes.svg")).await?;
    let normalized = compose_engine::normalize_document(
        &shapes_xml,
        config.flags.ffmpeg_reference_support,
        &images,
        &font,
    )?;
    let root = compose_engine::xmltree::parse(&normalized)?;
    let (slides, shapes) =
        compose_engine::ingest_shape_timeline(&root, config.flags.ffmpeg_reference_support, &images)?;

    let panzoom_xml = read_to_string(&published.join("panzooms.xml")).await?;
    let panzooms = compose_engine::ingest_panzooms(&panzoom_xml)?;

    let cursor_xml = read_to_string(&published.join("cursor.xml")).await?;
    let cursors = compose_engine::ingest_cursor_samples(&cursor_xml)?;

    let metadata_xml = read_to_string(&published.join("metadata.xml")).await?;
    let meeting_metadata = compose_engine::ingest_metadata(&metadata_xml)?;
    let duration = meeting_metadata.duration_ms / 1000.0;

    let timeline = compose_engine::build_timeline(slides.clone(), shapes, panzooms.clone(), duration);
    let (frames, playlist) = timeline.render_frames(config);

    let frames_dir = config.scratch_root.join("frames");
    let timestamps_dir = config.scratch_root.join("timestamps");
    let cursor_dir = config.scratch_root.join("cursor");
    let chats_dir = config.scratch_root.join("chats");
    for dir in [&frames_dir, &timestamps_dir, &cursor_dir, &chats_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PipelineError::Io { path: dir.clone(), source })?;
    }
    for frame in &frames {
        let path = frames_dir.join(format!("frame{}.{}", frame.index, frame.extension()));
        write(&path, frame.encoded()).await?;
    }
    // The concat demuxer resolves `file` lines relative to the playlist's
    // own directory, so `timestamps/` must be a sibling of `frames/` to
    // match the `../frames/frame{n}` lines `build_concat_playlist` emits.
    let playlist_path = timestamps_dir.join("whiteboard_timestamps");
    write(&playlist_path, &playlist).await?;

    let cursor_commands = compose_engine::project_cursor(&panzooms, &cursors, &config.layout);
    let cursor_timestamps_path = timestamps_dir.join("cursor_timestamps");
    write(&cursor_timestamps_path, &cursor_commands).await?;
    let cursor_sprite_path = cursor_dir.join("cursor.svg");
    write(&cursor_sprite_path, compose_engine::cursor_sprite_svg(&config.layout)).await?;

    let chat_timestamps_path = timestamps_dir.join("chat_timestamps");
    let chat_sprite_path = if config.flags.hide_chat {
        None
    } else {
        let chat_xml = read_to_string(&published.join("slides_new.xml")).await?;
        let messages = compose_engine::ingest_chat_messages(&chat_xml)?;
        let chat_layout = compose_engine::layout_chat(
            &messages,
            &config.layout,
            config.flags.hide_chat_names,
            process_startup_salt(),
        );
        let sprite_path = chats_dir.join("chat.svg");
        write(&sprite_path, &chat_layout.svg).await?;
        write(&chat_timestamps_path, &chat_layout.overlay_commands).await?;
        Some(sprite_path)
    };

    let deskshare_path = (!config.flags.hide_deskshare)
        .then(|| slides.iter().any(types::SlideSegment::is_deskshare))
        .filter(|has_one| *has_one)
        .map(|_| config.video_root.join("deskshare.webm"));

    let spec = FilterGraphSpec { has_deskshare: deskshare_path.is_some(), has_chat: chat_sprite_path.is_some() };

    let mut inputs = vec![
        published.join("background.png"),
        playlist_path,
        cursor_sprite_path,
        config.video_root.join("webcams.webm"),
    ];
    if let Some(deskshare) = &deskshare_path {
        inputs.push(deskshare.clone());
    }
    if let Some(chat_sprite) = &chat_sprite_path {
        inputs.push(published.join("chat_background.png"));
        inputs.push(chat_sprite.clone());
    }

    let composite_path = config.scratch_root.join("composite.mp4");
    let encode_cmd = compose_ffmpeg::build_encode_command(
        &spec,
        config,
        &inputs,
        &cursor_timestamps_path,
        &chat_timestamps_path,
        &meeting_metadata.meeting_name,
        duration,
        &composite_path,
    );
    run_tool(encode_cmd, "ffmpeg").await?;

    finish_with_chapters(config, &slides, duration, &composite_path).await?;

    let video_dir = config.video_root.join(&config.meeting_id);
    tokio::fs::create_dir_all(&video_dir)
        .await
        .map_err(|source| PipelineError::Io { path: video_dir.clone(), source })?;
    let link = config.output_path.display().to_string();
    let rewritten = compose_engine::render_metadata(&meeting_metadata, &link);
    write(&video_dir.join("metadata.xml"), rewritten).await
}

async fn finish_with_chapters(
    config: &PipelineConfig,
    slides: &[types::SlideSegment],
    duration: Time,
    composite_path: &Path,
) -> Result<(), PipelineError> {
    let chapters = compose_ffmpeg::build_chapters(slides, 0.25, duration);
    let metadata_path = config.scratch_root.join("chapters.ffmetadata");
    write(&metadata_path, compose_ffmpeg::render_ffmetadata(&chapters)).await?;

    let chaptered_path: PathBuf = if config.flags.caption_support {
        config.scratch_root.join("chaptered.mp4")
    } else {
        config.output_path.clone()
    };
    run_tool(
        compose_ffmpeg::build_chapter_remux_command(composite_path, &metadata_path, &chaptered_path),
        "ffmpeg",
    )
    .await?;

    if config.flags.caption_support {
        let captions_dir = config.published_root.join("captions");
        let mut entries = Vec::new();
        if let Ok(mut read_dir) = tokio::fs::read_dir(&captions_dir).await {
            while let Ok(Some(entry)) = read_dir.next_entry().await {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("vtt") {
                    let locale = entry.path().file_stem().map_or_else(
                        || "und".to_string(),
                        |s| s.to_string_lossy().into_owned(),
                    );
                    entries.push((
                        types::CaptionEntry { locale: locale.clone(), locale_name: locale },
                        entry.path(),
                    ));
                }
            }
        }

        if entries.is_empty() {
            tokio::fs::rename(&chaptered_path, &config.output_path)
                .await
                .map_err(|source| PipelineError::Io { path: config.output_path.clone(), source })?;
        } else {
            let refs: Vec<(types::CaptionEntry, &Path)> =
                entries.iter().map(|(c, p)| (c.clone(), p.as_path())).collect();
            run_tool(
                compose_ffmpeg::build_caption_mux_command(&chaptered_path, &refs, &config.output_path),
                "ffmpeg",
            )
            .await?;
        }
    } else {
        tokio::fs::rename(&chaptered_path, &config.output_path)
            .await
            .map_err(|source| PipelineError::Io { path: config.output_path.clone(), source })?;
    }

    Ok(())
}
