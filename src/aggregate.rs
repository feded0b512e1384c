//! Combined likelihood score across both modalities

use crate::audio::AudioSummary;
use crate::modality::ModalityActivation;
use crate::video::VideoStats;

/// Mean of the per-modality scores that are available
///
/// A modality contributes only while it is active and has produced data: video
/// needs at least one observation, audio needs a requested summary with at least
/// one bot turn. Returns `None` when neither contributes.
pub fn combined_score(
    activation: &ModalityActivation,
    video: &VideoStats,
    audio: Option<&AudioSummary>,
) -> Option<f64> {
    let video_score = (activation.video && video.observation_count > 0).then_some(video.average_score);

    let audio_score = audio
        .filter(|summary| activation.audio && summary.total_messages > 0)
        .map(|summary| summary.average_confidence);

    match (video_score, audio_score) {
        (Some(v), Some(a)) => Some((v + a) / 2.0),
        (Some(v), None) => Some(v),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}
