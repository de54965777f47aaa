//! Alarm audio outputs.

use std::{
    io::Write,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use blinkrise_core::{AlarmSink, AlarmSinkError};
use tracing::{info, warn};

const BELL_PERIOD: Duration = Duration::from_millis(800);

/// Terminal bell fallback: rings BEL on stderr while the alarm is on.
#[derive(Debug, Default)]
pub struct BellAlarmSink {
    ringing: Arc<AtomicBool>,
    ringer: Option<thread::JoinHandle<()>>,
}

impl AlarmSink for BellAlarmSink {
    fn play_looped(&mut self) -> Result<(), AlarmSinkError> {
        self.ringing.store(true, Ordering::SeqCst);
        if self.ringer.as_ref().is_some_and(|ringer| !ringer.is_finished()) {
            return Ok(());
        }

        let ringing = Arc::clone(&self.ringing);
        let ringer = thread::Builder::new()
            .name("alarm-bell".to_owned())
            .spawn(move || {
                while ringing.load(Ordering::SeqCst) {
                    let mut stderr = std::io::stderr();
                    let _ = stderr.write_all(b"\x07");
                    let _ = stderr.flush();
                    thread::sleep(BELL_PERIOD);
                }
            })
            .map_err(|err| AlarmSinkError::Unavailable(err.to_string()))?;
        self.ringer = Some(ringer);
        warn!("drowsiness alarm active");
        Ok(())
    }

    fn pause(&mut self) {
        self.ringing.store(false, Ordering::SeqCst);
    }

    // Nothing to seek: every ring starts from the top.
    fn rewind(&mut self) {}
}

impl Drop for BellAlarmSink {
    fn drop(&mut self) {
        self.ringing.store(false, Ordering::SeqCst);
    }
}

#[cfg(feature = "kira-audio")]
mod kira_sink {
    use std::path::Path;

    use blinkrise_core::{AlarmSink, AlarmSinkError};
    use kira::{
        AudioManager, AudioManagerSettings, Tween,
        sound::{
            PlaybackState,
            static_sound::{StaticSoundData, StaticSoundHandle},
        },
    };
    use tracing::debug;

    /// Loops the configured alarm asset through the default output device.
    pub struct KiraAlarmSink {
        manager: AudioManager,
        sound: StaticSoundData,
        handle: Option<StaticSoundHandle>,
    }

    impl KiraAlarmSink {
        pub fn new(path: &Path) -> Result<Self, AlarmSinkError> {
            let manager = AudioManager::new(AudioManagerSettings::default())
                .map_err(|err| AlarmSinkError::Unavailable(err.to_string()))?;
            let sound = StaticSoundData::from_file(path)
                .map_err(|err| {
                    AlarmSinkError::Unavailable(format!("{}: {err}", path.display()))
                })?
                .loop_region(..);
            debug!(path = %path.display(), "alarm asset loaded");
            Ok(Self {
                manager,
                sound,
                handle: None,
            })
        }
    }

    impl AlarmSink for KiraAlarmSink {
        fn play_looped(&mut self) -> Result<(), AlarmSinkError> {
            if let Some(handle) = self.handle.as_mut()
                && handle.state() != PlaybackState::Stopped
            {
                handle.resume(Tween::default());
                return Ok(());
            }
            let handle = self
                .manager
                .play(self.sound.clone())
                .map_err(|err| AlarmSinkError::Playback(err.to_string()))?;
            self.handle = Some(handle);
            Ok(())
        }

        fn pause(&mut self) {
            if let Some(handle) = self.handle.as_mut() {
                handle.pause(Tween::default());
            }
        }

        fn rewind(&mut self) {
            if let Some(handle) = self.handle.as_mut() {
                handle.seek_to(0.0);
            }
        }
    }
}

#[cfg(feature = "kira-audio")]
pub use kira_sink::KiraAlarmSink;

/// Output picked at startup.
pub enum AlarmOutput {
    Bell(BellAlarmSink),
    #[cfg(feature = "kira-audio")]
    Kira(KiraAlarmSink),
}

impl AlarmOutput {
    /// Prefer the audio asset when built with `kira-audio`; fall back to the bell.
    #[cfg_attr(not(feature = "kira-audio"), allow(unused_variables))]
    pub fn open(alarm_sound: &Path) -> Self {
        #[cfg(feature = "kira-audio")]
        {
            match KiraAlarmSink::new(alarm_sound) {
                Ok(sink) => {
                    info!(path = %alarm_sound.display(), "using audio alarm output");
                    return Self::Kira(sink);
                }
                Err(err) => warn!(error = %err, "audio alarm unavailable; using terminal bell"),
            }
        }

        info!("using terminal bell alarm output");
        Self::Bell(BellAlarmSink::default())
    }
}

impl AlarmSink for AlarmOutput {
    fn play_looped(&mut self) -> Result<(), AlarmSinkError> {
        match self {
            Self::Bell(sink) => sink.play_looped(),
            #[cfg(feature = "kira-audio")]
            Self::Kira(sink) => sink.play_looped(),
        }
    }

    fn pause(&mut self) {
        match self {
            Self::Bell(sink) => sink.pause(),
            #[cfg(feature = "kira-audio")]
            Self::Kira(sink) => sink.pause(),
        }
    }

    fn rewind(&mut self) {
        match self {
            Self::Bell(sink) => sink.rewind(),
            #[cfg(feature = "kira-audio")]
            Self::Kira(sink) => sink.rewind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_stops_ringing_after_pause() {
        let mut sink = BellAlarmSink::default();
        sink.play_looped().expect("bell should start");
        assert!(sink.ringing.load(Ordering::SeqCst));

        sink.pause();
        sink.rewind();
        let ringer = sink.ringer.take().expect("ringer thread spawned");
        ringer.join().expect("ringer thread exits once paused");
    }
}
