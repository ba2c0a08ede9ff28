use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::fs;
use std::path::Path;

pub const AVATAR_MAX_BYTES: usize = 3 * 1024 * 1024;
pub const PUBLIC_PREFIX: &str = "/uploads";
const AVATAR_DIR: &str = "avatars";

pub fn is_image(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Stores an avatar image under `<upload_dir>/avatars` and returns the path
/// it is served from.
pub fn write_avatar(
    upload_dir: &Path,
    user_id: i64,
    content_type: &str,
    bytes: &[u8],
) -> Result<String> {
    if !is_image(content_type) {
        bail!("Only image files allowed");
    }
    if bytes.is_empty() {
        bail!("Profile image is empty");
    }
    if bytes.len() > AVATAR_MAX_BYTES {
        bail!("Profile image exceeds {AVATAR_MAX_BYTES} bytes");
    }

    let dir = upload_dir.join(AVATAR_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create avatar directory: {}", dir.display()))?;

    let file_name = format!(
        "{user_id}-{}.{}",
        Utc::now().timestamp_millis(),
        extension_for(content_type)
    );
    let path = dir.join(&file_name);
    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write avatar: {}", path.display()))?;

    Ok(format!("{PUBLIC_PREFIX}/{AVATAR_DIR}/{file_name}"))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

#[cfg(test)]
mod tests {
    use super::{AVATAR_MAX_BYTES, is_image, write_avatar};
    use std::fs;

    #[test]
    fn stores_avatar_and_returns_public_path() {
        let dir = tempfile::tempdir().expect("tempdir");

        let public = write_avatar(dir.path(), 7, "image/png", b"\x89PNG").expect("avatar");
        assert!(public.starts_with("/uploads/avatars/7-"));
        assert!(public.ends_with(".png"));

        let stored = dir
            .path()
            .join(public.trim_start_matches("/uploads/"));
        assert_eq!(fs::read(stored).expect("read avatar"), b"\x89PNG");
    }

    #[test]
    fn rejects_non_images_and_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir");

        assert!(!is_image("application/pdf"));
        assert!(is_image("IMAGE/JPEG"));
        assert!(write_avatar(dir.path(), 1, "text/plain", b"hello").is_err());
        assert!(write_avatar(dir.path(), 1, "image/png", b"").is_err());

        let oversized = vec![0_u8; AVATAR_MAX_BYTES + 1];
        assert!(write_avatar(dir.path(), 1, "image/png", &oversized).is_err());
    }
}
