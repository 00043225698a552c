//! Local media acquisition and track control
//!
//! Capture itself belongs to the embedding shell; this module owns the
//! track handles negotiation attaches to the peer link and the
//! enabled/stopped gates behind mute and video toggles. Toggling a gate
//! never renegotiates: a muted track simply stops emitting samples.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use vitacall_core::{Error, Result};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Handle to the local capture tracks of one call attempt
pub trait LocalMedia: Send + Sync {
    /// Gate the microphone track
    fn set_audio_enabled(&self, enabled: bool);

    /// Whether the microphone track is live
    fn audio_enabled(&self) -> bool;

    /// Gate the camera track
    fn set_video_enabled(&self, enabled: bool);

    /// Whether the camera track is live
    fn video_enabled(&self) -> bool;

    /// Stop all tracks; a stopped handle never emits again
    fn stop(&self);
}

/// Acquires local media for a call attempt
///
/// Acquisition is the first suspension point of call setup and the
/// place permission and device failures surface.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Media handle type produced on success
    type Media: LocalMedia + Send + Sync + 'static;

    /// Capture local tracks
    ///
    /// # Errors
    ///
    /// [`Error::PermissionDenied`] when access is refused,
    /// [`Error::DeviceNotFound`] when no capture device exists.
    async fn acquire(&self) -> Result<Self::Media>;
}

/// Which tracks a [`SampleMediaSource`] captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMediaConfig {
    /// Capture a microphone track
    pub audio: bool,
    /// Capture a camera track
    pub video: bool,
}

impl Default for SampleMediaConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Sample-fed local media: Opus audio and VP8 video tracks the shell
/// pumps encoded samples into
#[derive(Debug)]
pub struct SampleLocalMedia {
    audio_track: Option<Arc<TrackLocalStaticSample>>,
    video_track: Option<Arc<TrackLocalStaticSample>>,
    audio_enabled: AtomicBool,
    video_enabled: AtomicBool,
    stopped: AtomicBool,
}

impl SampleLocalMedia {
    fn new(
        audio_track: Option<Arc<TrackLocalStaticSample>>,
        video_track: Option<Arc<TrackLocalStaticSample>>,
    ) -> Self {
        Self {
            audio_track,
            video_track,
            audio_enabled: AtomicBool::new(true),
            video_enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// Audio track handle for attachment to a peer link
    pub fn audio_track(&self) -> Option<Arc<TrackLocalStaticSample>> {
        self.audio_track.clone()
    }

    /// Video track handle for attachment to a peer link
    pub fn video_track(&self) -> Option<Arc<TrackLocalStaticSample>> {
        self.video_track.clone()
    }

    /// Write one encoded audio sample
    ///
    /// Returns `Ok(false)` without writing while the track is muted or
    /// stopped.
    pub async fn write_audio_sample(&self, sample: &Sample) -> Result<bool> {
        if self.stopped.load(Ordering::SeqCst) || !self.audio_enabled.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let Some(track) = &self.audio_track else {
            return Ok(false);
        };
        track
            .write_sample(sample)
            .await
            .map_err(|e| Error::Media(format!("Failed to write audio sample: {}", e)))?;
        Ok(true)
    }

    /// Write one encoded video sample
    ///
    /// Returns `Ok(false)` without writing while video is disabled or
    /// the handle is stopped.
    pub async fn write_video_sample(&self, sample: &Sample) -> Result<bool> {
        if self.stopped.load(Ordering::SeqCst) || !self.video_enabled.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let Some(track) = &self.video_track else {
            return Ok(false);
        };
        track
            .write_sample(sample)
            .await
            .map_err(|e| Error::Media(format!("Failed to write video sample: {}", e)))?;
        Ok(true)
    }
}

impl LocalMedia for SampleLocalMedia {
    fn set_audio_enabled(&self, enabled: bool) {
        self.audio_enabled.store(enabled, Ordering::SeqCst);
        debug!("Audio track enabled: {}", enabled);
    }

    fn audio_enabled(&self) -> bool {
        self.audio_enabled.load(Ordering::SeqCst)
    }

    fn set_video_enabled(&self, enabled: bool) {
        self.video_enabled.store(enabled, Ordering::SeqCst);
        debug!("Video track enabled: {}", enabled);
    }

    fn video_enabled(&self) -> bool {
        self.video_enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        debug!("Local media stopped");
    }
}

/// [`MediaSource`] producing [`SampleLocalMedia`]
pub struct SampleMediaSource {
    config: SampleMediaConfig,
}

impl SampleMediaSource {
    /// Create a source capturing the tracks named by `config`
    pub fn new(config: SampleMediaConfig) -> Self {
        Self { config }
    }
}

impl Default for SampleMediaSource {
    fn default() -> Self {
        Self::new(SampleMediaConfig::default())
    }
}

#[async_trait]
impl MediaSource for SampleMediaSource {
    type Media = SampleLocalMedia;

    async fn acquire(&self) -> Result<SampleLocalMedia> {
        if !self.config.audio && !self.config.video {
            return Err(Error::DeviceNotFound(
                "No capture tracks configured".to_string(),
            ));
        }

        let audio_track = self.config.audio.then(|| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48_000,
                    channels: 2,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                "audio".to_string(),
                "vitacall-local".to_string(),
            ))
        });

        let video_track = self.config.video.then(|| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: "video/VP8".to_string(),
                    clock_rate: 90_000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                    rtcp_feedback: vec![],
                },
                "video".to_string(),
                "vitacall-local".to_string(),
            ))
        });

        debug!(
            "Acquired local media (audio: {}, video: {})",
            self.config.audio, self.config.video
        );

        Ok(SampleLocalMedia::new(audio_track, video_track))
    }
}
