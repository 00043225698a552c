//! Scripted media acquisition
//!
//! Stands in for device capture. Tests flip the source between granting
//! and denying access, and inspect every handle it ever produced.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use vitacall_core::{Error, Result};
use vitacall_rtc::{LocalMedia, MediaSource};

/// How the next `acquire` calls should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDenial {
    Permission,
    NoDevice,
}

/// Observable state of one acquired media handle
#[derive(Default)]
pub struct MediaProbe {
    audio_muted: AtomicBool,
    video_off: AtomicBool,
    stopped: AtomicBool,
}

impl MediaProbe {
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Media handle backed by a shared [`MediaProbe`]
pub struct ScriptedLocalMedia {
    probe: Arc<MediaProbe>,
}

impl LocalMedia for ScriptedLocalMedia {
    fn set_audio_enabled(&self, enabled: bool) {
        self.probe.audio_muted.store(!enabled, Ordering::SeqCst);
    }

    fn audio_enabled(&self) -> bool {
        !self.probe.audio_muted.load(Ordering::SeqCst)
    }

    fn set_video_enabled(&self, enabled: bool) {
        self.probe.video_off.store(!enabled, Ordering::SeqCst);
    }

    fn video_enabled(&self) -> bool {
        !self.probe.video_off.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.probe.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct SourceInner {
    denial: Mutex<Option<MediaDenial>>,
    acquisitions: AtomicU32,
    probes: Mutex<Vec<Arc<MediaProbe>>>,
}

/// Media source whose outcome tests control
#[derive(Clone, Default)]
pub struct ScriptedMediaSource {
    inner: Arc<SourceInner>,
}

impl ScriptedMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `acquire` fail until [`Self::grant`]
    pub fn deny(&self, denial: MediaDenial) {
        *self.inner.denial.lock() = Some(denial);
    }

    /// Let `acquire` succeed again
    pub fn grant(&self) {
        *self.inner.denial.lock() = None;
    }

    /// How many times `acquire` was called
    pub fn acquisitions(&self) -> u32 {
        self.inner.acquisitions.load(Ordering::SeqCst)
    }

    /// Probe for the most recently acquired handle
    pub fn latest_probe(&self) -> Arc<MediaProbe> {
        self.inner
            .probes
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| panic!("no media has been acquired"))
    }
}

#[async_trait::async_trait]
impl MediaSource for ScriptedMediaSource {
    type Media = ScriptedLocalMedia;

    async fn acquire(&self) -> Result<Self::Media> {
        self.inner.acquisitions.fetch_add(1, Ordering::SeqCst);

        match *self.inner.denial.lock() {
            Some(MediaDenial::Permission) => {
                return Err(Error::PermissionDenied(
                    "Camera and microphone access denied".to_string(),
                ))
            }
            Some(MediaDenial::NoDevice) => {
                return Err(Error::DeviceNotFound("No capture device".to_string()))
            }
            None => {}
        }

        let probe = Arc::new(MediaProbe::default());
        self.inner.probes.lock().push(Arc::clone(&probe));
        Ok(ScriptedLocalMedia { probe })
    }
}
