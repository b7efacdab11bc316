mod helpers;

use bytes::Bytes;
use helpers::*;
use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, GenericImageView, Rgba, RgbaImage};
use std::sync::Arc;
use stowage_core::{AppError, ErrorKind, FileInfo, UploadConfig, UploadContext};
use stowage_db::{FileInfoStore, UploadSessionStore};
use stowage_storage::FileBackend;
use stowage_upload::UploadOutcome;

fn gif(frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        for i in 0..frames {
            let img = RgbaImage::from_pixel(64, 32, Rgba([(i * 60) as u8, 10, 10, 255]));
            encoder
                .encode_frame(Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(80, 1)))
                .unwrap();
        }
    }
    out
}

#[tokio::test]
async fn test_eight_mib_jpeg_in_two_chunks() {
    let h = harness();
    let data = pad_jpeg(&jpeg(640, 480), 8 * MIB);
    let session = h.session("camera.jpg", data.len()).await;

    let UploadOutcome::Incomplete(session) = h
        .service
        .upload_data(&session, reader(data[..5 * MIB].to_vec()))
        .await
        .unwrap()
    else {
        panic!("expected incomplete upload");
    };
    assert_eq!(session.file_offset, 5 * MIB as i64);

    let outcome = h
        .service
        .upload_data(&session, reader(data[5 * MIB..].to_vec()))
        .await
        .unwrap();
    let info = outcome.file_info().cloned().unwrap();

    assert_eq!(info.mime_type, "image/jpeg");
    assert_eq!((info.width, info.height), (Some(640), Some(480)));
    assert!(info.has_preview_image);
    let thumbnail = info.thumbnail_path.clone().unwrap();
    let preview = info.preview_path.clone().unwrap();
    assert!(thumbnail.ends_with("/camera_thumb.jpg"));
    assert!(preview.ends_with("/camera_preview.jpg"));
    assert!(info.has_mini_preview());

    let thumb = image::load_from_memory(&h.storage.read_file(&thumbnail).await.unwrap()).unwrap();
    assert_eq!(thumb.dimensions(), (120, 90));
    assert!(h.storage.file_exists(&preview).await.unwrap());

    assert!(matches!(
        h.service.get_upload_session(session.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(h.sessions.get(session.id).await.unwrap().is_none());
    assert_eq!(h.files.get(info.id).await.unwrap(), Some(info));
}

#[tokio::test]
async fn test_exif_rotation_swaps_dimensions() {
    let h = harness();
    let data = with_exif_orientation(&jpeg(40, 20), 6);
    let session = h.session("portrait.jpg", data.len()).await;

    let outcome = h.service.upload_data(&session, reader(data)).await.unwrap();
    let info = outcome.file_info().cloned().unwrap();

    assert_eq!((info.width, info.height), (Some(20), Some(40)));

    // The stored thumbnail is upright too.
    let thumb = image::load_from_memory(
        &h.storage
            .read_file(info.thumbnail_path.as_deref().unwrap())
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(thumb.dimensions(), (20, 40));
}

#[tokio::test]
async fn test_oversized_image_is_refused() {
    let h = harness_with(
        UploadConfig {
            max_image_resolution: 100,
            ..UploadConfig::default()
        },
        Vec::new(),
    );
    let data = png(20, 20);
    let session = h.session("huge.png", data.len()).await;

    let err = h.service.upload_data(&session, reader(data)).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::ImageTooLarge { width: 20, height: 20, max_resolution: 100 }
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.files.is_empty());
    assert!(h.storage.file_exists(&session.path).await.unwrap());
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_transparent_png_gets_jpeg_derivatives() {
    let h = harness();
    let data = png(300, 150);
    let session = h.session("logo.png", data.len()).await;

    let info = h
        .service
        .upload_data(&session, reader(data))
        .await
        .unwrap()
        .file_info()
        .cloned()
        .unwrap();

    let thumb_bytes = h
        .storage
        .read_file(info.thumbnail_path.as_deref().unwrap())
        .await
        .unwrap();
    assert_eq!(image::guess_format(&thumb_bytes).unwrap(), image::ImageFormat::Jpeg);
    assert_eq!(image::load_from_memory(&thumb_bytes).unwrap().dimensions(), (120, 60));
}

#[tokio::test]
async fn test_animated_gif_keeps_derivatives_without_preview_flag() {
    let h = harness();
    let data = gif(3);
    let session = h.session("dance.gif", data.len()).await;

    let info = h
        .service
        .upload_data(&session, reader(data))
        .await
        .unwrap()
        .file_info()
        .cloned()
        .unwrap();

    assert!(!info.has_preview_image);
    assert_eq!((info.width, info.height), (Some(64), Some(32)));
    assert!(info.thumbnail_path.is_some());
    assert!(info.preview_path.is_some());
}

/// A tiny GIF whose logical screen claims 30000x30000.
fn gif_with_huge_screen() -> Vec<u8> {
    let mut out = b"GIF89a".to_vec();
    out.extend_from_slice(&30000u16.to_le_bytes());
    out.extend_from_slice(&30000u16.to_le_bytes());
    out.extend_from_slice(&[0x80, 0x00, 0x00, 0, 0, 0, 255, 255, 255]);
    for _ in 0..2 {
        out.extend_from_slice(&[0x21, 0xF9, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00]);
        out.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x00]);
        out.extend_from_slice(&[0x02, 0x02, 0x44, 0x01, 0x00]);
    }
    out.push(0x3B);
    out
}

#[tokio::test]
async fn test_gif_with_huge_screen_is_refused_without_decoding() {
    let h = harness();
    let data = gif_with_huge_screen();
    let session = h.session("bomb.gif", data.len()).await;

    let err = h.service.upload_data(&session, reader(data)).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::ImageTooLarge { width: 30000, height: 30000, .. }
    ));
    assert!(h.files.is_empty());
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_svg_is_measured_but_never_rendered() {
    let h = harness();
    let data = br#"<svg xmlns="http://www.w3.org/2000/svg" width="48" height="24"></svg>"#.to_vec();
    let session = h.session("icon.svg", data.len()).await;

    let info = h
        .service
        .upload_data(&session, reader(data))
        .await
        .unwrap()
        .file_info()
        .cloned()
        .unwrap();

    assert_eq!(info.mime_type, "image/svg+xml");
    assert_eq!((info.width, info.height), (Some(48), Some(24)));
    assert!(!info.has_preview_image);
    assert!(info.thumbnail_path.is_none());
    assert!(info.preview_path.is_none());
    assert_eq!(h.generator.generated(), 0);
}

#[tokio::test]
async fn test_hook_rejection_keeps_session() {
    let hook = Arc::new(RecordingHook::rejecting("blocked extension"));
    let h = harness_with(UploadConfig::default(), vec![hook.clone()]);
    let session = h.session("virus.txt", 4).await;

    let err = h.service.upload_data(&session, reader(b"evil".to_vec())).await.unwrap_err();

    assert!(matches!(err, AppError::PluginRejected { ref reason } if reason == "blocked extension"));
    assert_eq!(err.kind(), ErrorKind::PluginRejection);
    assert!(h.files.is_empty());
    assert!(h.sessions.get(session.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_hook_replacement_is_stored() {
    let hook = Arc::new(RecordingHook::replacing(b"sanitized!"));
    let h = harness_with(UploadConfig::default(), vec![hook]);
    let session = h.session("note.txt", 5).await;

    let info = h
        .service
        .upload_data(&session, reader(b"dirty".to_vec()))
        .await
        .unwrap()
        .file_info()
        .cloned()
        .unwrap();

    assert_eq!(info.size, 10);
    assert_eq!(&h.service.get_file(info.id).await.unwrap()[..], b"sanitized!");
}

#[tokio::test]
async fn test_failed_derivative_generation_is_not_fatal() {
    let h = harness();
    // Claims PNG, sniffs as PNG, but the pixel data is truncated.
    let mut data = png(200, 100);
    data.truncate(data.len() / 2);
    let session = h.session("cut.png", data.len()).await;

    let info = h
        .service
        .upload_data(&session, reader(data))
        .await
        .unwrap()
        .file_info()
        .cloned()
        .unwrap();

    assert_eq!((info.width, info.height), (Some(200), Some(100)));
    assert!(info.thumbnail_path.is_none());
    assert!(info.preview_path.is_none());
    assert!(h.files.get(info.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_read_path_generates_mini_preview_once() {
    let h = harness();
    let data = png(64, 64);
    let mut info = FileInfo::new(h.user_id, "legacy.png", "legacy/legacy.png", data.len() as i64);
    info.width = Some(64);
    info.height = Some(64);
    h.storage
        .write_file(Box::pin(std::io::Cursor::new(data)), &info.path)
        .await
        .unwrap();
    h.files.save(&info).await.unwrap();

    let first = h.service.get_file_info(info.id).await.unwrap();
    let second = h.service.get_file_info(info.id).await.unwrap();
    let listed = h.service.get_file_infos_for_user(h.user_id).await.unwrap();

    assert!(first.has_mini_preview());
    assert_eq!(first.mini_preview, second.mini_preview);
    assert_eq!(listed.len(), 1);
    assert!(listed[0].has_mini_preview());
    assert_eq!(h.generator.mini_previews(), 1);
}

#[tokio::test]
async fn test_single_shot_upload() {
    let h = harness();
    let context = UploadContext::new(h.user_id).with_request_id("req-1");
    let data = Bytes::from(png(400, 200));

    let (info, stored) = h
        .service
        .upload_file(&context, "scan.png", data.clone())
        .await
        .unwrap();

    assert_eq!(stored, data);
    assert!(info.path.ends_with(&format!("/users/{}/{}/scan.png", h.user_id, info.id)));
    assert_eq!((info.width, info.height), (Some(400), Some(200)));
    assert!(info.thumbnail_path.is_some());
    assert!(info.has_mini_preview());
    assert_eq!(h.service.get_file(info.id).await.unwrap(), data);
    assert!(h.sessions.get_for_user(h.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_shot_limits() {
    let h = harness_with(
        UploadConfig {
            max_file_size_bytes: 8,
            ..UploadConfig::default()
        },
        Vec::new(),
    );
    let context = UploadContext::new(h.user_id);

    let err = h
        .service
        .upload_file(&context, "big.txt", Bytes::from_static(b"123456789"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FileTooLarge { size: 9, limit: 8 }));
    assert!(h.storage.paths().is_empty());
}

#[tokio::test]
async fn test_content_is_extracted_in_background() {
    let h = harness();
    let context = UploadContext::new(h.user_id);

    let (info, _) = h
        .service
        .upload_file(&context, "readme.md", Bytes::from_static(b"# Title\nbody text"))
        .await
        .unwrap();

    h.service.shutdown().await;

    let stored = h.files.get(info.id).await.unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some("# Title\nbody text"));
}
