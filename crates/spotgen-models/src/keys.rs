//! Deterministic asset key scheme.
//!
//! Every artifact a job produces lives under a fixed, predictable key
//! so uploads are idempotent and retrying an upload at the same key
//! yields the same retrievable content.

/// Key for a scene clip: `users/{user}/jobs/{job}/clips/scene-{n}.mp4`.
pub fn clip_key(user_id: &str, job_id: &str, scene: u32) -> String {
    format!("users/{}/jobs/{}/clips/scene-{}.mp4", user_id, job_id, scene)
}

/// Key for a scene continuity frame / thumbnail:
/// `users/{user}/jobs/{job}/thumbnails/scene-{n}.jpg`.
pub fn thumbnail_key(user_id: &str, job_id: &str, scene: u32) -> String {
    format!(
        "users/{}/jobs/{}/thumbnails/scene-{}.jpg",
        user_id, job_id, scene
    )
}

/// Key for the background music track.
pub fn music_key(user_id: &str, job_id: &str) -> String {
    format!(
        "users/{}/jobs/{}/audio/background-music.mp3",
        user_id, job_id
    )
}

/// Key for the narrator voiceover track.
pub fn narration_key(user_id: &str, job_id: &str) -> String {
    format!(
        "users/{}/jobs/{}/audio/narrator-voiceover.mp3",
        user_id, job_id
    )
}

/// Key for the composed final video.
pub fn final_video_key(user_id: &str, job_id: &str) -> String {
    format!("users/{}/jobs/{}/final/video.mp4", user_id, job_id)
}

/// Key for the job-level thumbnail taken from the composed video.
pub fn job_thumbnail_key(user_id: &str, job_id: &str) -> String {
    format!("users/{}/jobs/{}/final/thumbnail.jpg", user_id, job_id)
}

/// Apply a regeneration version to a base key.
///
/// Version 1 is the base key unchanged; version n>1 inserts `-v{n}`
/// before the extension so regenerated artifacts never overwrite
/// history: `clips/scene-2.mp4` → `clips/scene-2-v3.mp4`.
pub fn versioned(base_key: &str, version: u32) -> String {
    if version <= 1 {
        return base_key.to_string();
    }
    match base_key.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-v{}.{}", stem, version, ext),
        None => format!("{}-v{}", base_key, version),
    }
}
