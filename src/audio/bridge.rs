// Playback bridge
// Turns the decoder's pull-based "render N bytes" call into a continuous
// planar f32 feed for the output, with tempo override and position tracking.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::audio::abi::{
    self, buffer_bytes, sample_offset, EventLayout, FrameInfo, FrameInfoLayout, ModuleInfoLayout,
    ModuleMetadata, Ptr, ABI_VERSION, DECODER_CHANNELS,
};
use crate::audio::decoder::{ChipCore, ContextHandle, XMP_END, XMP_PLAYER_STATE, XMP_STATE_PLAYING};
use crate::audio::sink::SinkConnection;
use crate::audio::tempo;
use crate::error::{AbiError, PlayerError};

/// Module formats the decoder core understands.
pub const FILE_EXTENSIONS: &[&str] = &[
    "it",  // Impulse Tracker 1.00, 2.00, 2.14, 2.15
    "mod", // Sound/Noise/Protracker M.K., M!K!, M&K!, N.T., CD81
    "s3m", // Scream Tracker 3 3.00, 3.01+
    "xm",  // Fast Tracker II 1.02, 1.03, 1.04
];

/// Default scratch buffer length in frames.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Maximal 16-bit magnitude: (2^16 - 1) / 2.
const INT16_HALF_RANGE: f32 = 65535.0 / 2.0;

/// Called with `true` when playback terminates (stop, end of module, or
/// decoder failure). Never called while the bridge is locked.
pub type StateObserver = Box<dyn FnMut(bool) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Unloaded,
    Playing,
    Paused,
    /// Terminal for the current session.
    Stopped,
}

/// What a [`PlaybackBridge::fill_buffer`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Decoded audio was written.
    Rendered,
    /// Paused, stopped or unloaded: zeros were written, the decoder was not called.
    Silence,
    /// The module finished; the session is now stopped.
    Ended,
}

/// Heap allocations and native context owned by one loaded module.
struct Session {
    ctx: ContextHandle,
    buffer: Ptr,
    frame_info: Ptr,
    module_info: Ptr,
    event: Ptr,
    loaded: bool,
    metadata: ModuleMetadata,
}

impl Session {
    fn new(ctx: ContextHandle) -> Self {
        Self {
            ctx,
            buffer: 0,
            frame_info: 0,
            module_info: 0,
            event: 0,
            loaded: false,
            metadata: ModuleMetadata::default(),
        }
    }
}

pub struct PlaybackBridge<C: ChipCore> {
    core: C,
    sink: SinkConnection,
    buffer_size: usize,
    session: Option<Session>,
    state: PlaybackState,
    /// Set when the session ends, cleared by [`PlaybackBridge::take_termination`].
    termination_pending: bool,
    tempo_scale: f64,
    position_ms: i64,
    duration_ms: i64,
}

impl<C: ChipCore> PlaybackBridge<C> {
    /// Wrap a decoder core. `buffer_size` is the largest number of frames
    /// requested from the decoder in one call.
    pub fn new(
        core: C,
        sink: SinkConnection,
        buffer_size: usize,
    ) -> Result<Self, PlayerError> {
        if core.abi_version() != ABI_VERSION {
            return Err(AbiError::VersionMismatch {
                expected: ABI_VERSION.to_string(),
                found: core.abi_version().to_string(),
            }
            .into());
        }

        Ok(Self {
            core,
            sink,
            buffer_size: buffer_size.max(1),
            session: None,
            state: PlaybackState::Unloaded,
            termination_pending: false,
            tempo_scale: 1.0,
            position_ms: 0,
            duration_ms: 0,
        })
    }

    /// Load module bytes and start playing them at the sink's sample rate.
    ///
    /// Any previous session's native context is torn down first.
    pub fn load(&mut self, data: &[u8]) -> Result<(), PlayerError> {
        self.unload();

        let ctx = self.core.create_context();
        let mut session = Session::new(ctx);
        if let Err(e) = self.open_session(&mut session, data) {
            self.close_session(session);
            return Err(e);
        }

        info!(
            title = %session.metadata.title,
            system = %session.metadata.system,
            channels = session.metadata.num_channels,
            "Module loaded"
        );
        self.session = Some(session);
        self.state = PlaybackState::Playing;
        self.sink.connect();
        Ok(())
    }

    fn open_session(&mut self, session: &mut Session, data: &[u8]) -> Result<(), PlayerError> {
        session.buffer = self.alloc(buffer_bytes(self.buffer_size))?;
        session.frame_info = self.alloc(FrameInfoLayout::ALLOC_SIZE)?;
        session.module_info = self.alloc(ModuleInfoLayout::ALLOC_SIZE)?;
        session.event = self.alloc(EventLayout::SIZE)?;

        let code = self.core.load_module_from_memory(session.ctx, data);
        if code != 0 {
            error!(code, "xmp_load_module_from_memory failed");
            return Err(PlayerError::UnloadableModule { code });
        }
        session.loaded = true;

        let code = self.core.start_player(session.ctx, self.sink.sample_rate(), 0);
        if code != 0 {
            warn!(code, "xmp_start_player failed");
        }

        self.core.get_module_info(session.ctx, session.module_info);
        session.metadata = ModuleMetadata::read(self.core.heap(), session.module_info)?;

        self.core.get_frame_info(session.ctx, session.frame_info);
        let frame = FrameInfo::read(self.core.heap(), session.frame_info)?;
        self.position_ms = frame.time_ms as i64;
        self.duration_ms = frame.total_time_ms as i64;
        Ok(())
    }

    fn alloc(&mut self, size: usize) -> Result<Ptr, PlayerError> {
        match self.core.malloc(size) {
            0 => Err(PlayerError::OutOfMemory { size }),
            ptr => Ok(ptr),
        }
    }

    fn close_session(&mut self, session: Session) {
        if session.loaded {
            self.core.end_player(session.ctx);
            self.core.release_module(session.ctx);
        }
        for ptr in [session.buffer, session.frame_info, session.module_info, session.event] {
            if ptr != 0 {
                self.core.free(ptr);
            }
        }
        self.core.free_context(session.ctx);
    }

    /// Tear down the current session, if any. This is not a termination.
    pub fn unload(&mut self) {
        if let Some(session) = self.session.take() {
            self.close_session(session);
        }
        self.sink.disconnect();
        self.state = PlaybackState::Unloaded;
        self.termination_pending = false;
        self.position_ms = 0;
        self.duration_ms = 0;
    }

    /// Fill one block of planar output.
    ///
    /// Each entry of `outputs` is one output channel; at most `frame_count`
    /// frames are written (fewer if a channel is shorter). Output channels
    /// beyond the decoder's stereo pair repeat it.
    pub fn fill_buffer<B: AsMut<[f32]>>(
        &mut self,
        outputs: &mut [B],
        frame_count: usize,
    ) -> Result<FillOutcome, PlayerError> {
        let frame_count = outputs
            .iter_mut()
            .map(|channel| channel.as_mut().len())
            .min()
            .unwrap_or(0)
            .min(frame_count);

        let (ctx, buffer, frame_info, event) = match (&self.session, self.state) {
            (Some(s), PlaybackState::Playing) => (s.ctx, s.buffer, s.frame_info, s.event),
            _ => {
                silence(outputs, 0, frame_count);
                return Ok(FillOutcome::Silence);
            }
        };

        let mut written = 0;
        while written < frame_count {
            let frames = (frame_count - written).min(self.buffer_size);
            let bytes = buffer_bytes(frames);

            let code = self.core.play_buffer(ctx, buffer, bytes as i32, 1);
            if code == XMP_END {
                info!("Module finished");
                silence(outputs, written, frame_count);
                self.terminate();
                return Ok(FillOutcome::Ended);
            } else if code != 0 {
                error!(code, "xmp_play_buffer failed");
                silence(outputs, written, frame_count);
                self.terminate();
                return Err(PlayerError::Decode { code });
            }

            if let Err(e) = self.track_frame(ctx, frame_info, event) {
                silence(outputs, written, frame_count);
                self.terminate();
                return Err(e.into());
            }

            let pcm = match abi::slice(self.core.heap(), buffer, bytes) {
                Ok(pcm) => pcm,
                Err(e) => {
                    silence(outputs, written, frame_count);
                    self.terminate();
                    return Err(e.into());
                }
            };
            for (channel, output) in outputs.iter_mut().enumerate() {
                let source = channel % DECODER_CHANNELS;
                let output = &mut output.as_mut()[written..written + frames];
                for (frame, sample) in output.iter_mut().enumerate() {
                    let at = sample_offset(frame, source, DECODER_CHANNELS);
                    let value = i16::from_le_bytes([pcm[at], pcm[at + 1]]);
                    *sample = (value as f32 / INT16_HALF_RANGE).max(-1.0);
                }
            }
            written += frames;
        }

        Ok(FillOutcome::Rendered)
    }

    /// Mirror the decoder's frame info and keep its tempo on target.
    fn track_frame(&mut self, ctx: ContextHandle, frame_info: Ptr, event: Ptr) -> Result<(), AbiError> {
        self.core.get_frame_info(ctx, frame_info);
        let frame = FrameInfo::read(self.core.heap(), frame_info)?;
        self.position_ms = frame.time_ms as i64;
        self.duration_ms = frame.total_time_ms as i64;
        self.maybe_inject_tempo(ctx, event, frame.bpm)
    }

    fn maybe_inject_tempo(&mut self, ctx: ContextHandle, event: Ptr, measured_bpm: i32) -> Result<(), AbiError> {
        let initial_bpm = match &self.session {
            Some(session) => session.metadata.initial_bpm,
            None => return Ok(()),
        };
        if let Some(target) = tempo::injection_for(initial_bpm, self.tempo_scale, measured_bpm) {
            info!(target_bpm = target, initial_bpm, "Injecting tempo into decoder");
            abi::write_tempo_event(self.core.heap_mut(), event, target)?;
            self.core.inject_event(ctx, 0, event);
        }
        Ok(())
    }

    /// Move to `Stopped` and disconnect. The owner reports the termination
    /// once it has released any lock around the bridge.
    fn terminate(&mut self) {
        self.state = PlaybackState::Stopped;
        self.sink.disconnect();
        self.termination_pending = true;
    }

    /// Whether the session terminated since the last call. Returns `true` at
    /// most once per termination.
    pub fn take_termination(&mut self) -> bool {
        std::mem::take(&mut self.termination_pending)
    }

    fn live_ctx(&self) -> Result<ContextHandle, PlayerError> {
        match (&self.session, self.state) {
            (None, _) => Err(PlayerError::NotLoaded),
            (Some(_), PlaybackState::Stopped) => Err(PlayerError::Stopped),
            (Some(s), _) => Ok(s.ctx),
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => {}
        }
        self.is_paused()
    }

    pub fn is_paused(&self) -> bool {
        self.state != PlaybackState::Playing
    }

    /// Forwarded as-is; the decoder clamps out-of-range times.
    pub fn seek_ms(&mut self, position_ms: i64) -> Result<(), PlayerError> {
        let ctx = self.live_ctx()?;
        let target = position_ms.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        self.core.seek_time(ctx, target);
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), PlayerError> {
        let ctx = self.live_ctx()?;
        self.core.restart_module(ctx);
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Halt the decoder and end the session. Later fills write silence.
    pub fn stop(&mut self) {
        let Ok(ctx) = self.live_ctx() else {
            return;
        };
        self.state = PlaybackState::Paused;
        self.core.stop_module(ctx);
        self.terminate();
    }

    /// Mute (`false`) or unmute (`true`) each voice by index.
    pub fn set_voices(&mut self, voices: &[bool]) -> Result<(), PlayerError> {
        let ctx = self.live_ctx()?;
        for (i, &enabled) in voices.iter().enumerate() {
            self.core.channel_mute(ctx, i as i32, if enabled { 0 } else { 1 });
        }
        Ok(())
    }

    /// Scale playback tempo relative to the module's initial BPM.
    ///
    /// Returns whether the scale was accepted. Formats without a native speed
    /// and non-positive scales are rejected with a warning.
    pub fn set_tempo(&mut self, scale: f64) -> bool {
        if !scale.is_finite() || scale <= 0.0 {
            warn!(scale, "Tempo scale must be a positive number");
            return false;
        }
        match &self.session {
            Some(session) if session.metadata.initial_speed != 0 => {
                debug!(scale, "Tempo scale set");
                self.tempo_scale = scale;
                true
            }
            Some(_) => {
                warn!("Unable to set speed for this file format");
                false
            }
            None => {
                warn!("Unable to set speed: no module loaded");
                false
            }
        }
    }

    pub fn tempo_scale(&self) -> f64 {
        self.tempo_scale
    }

    pub fn is_playing(&self) -> bool {
        match (&self.session, self.state) {
            (Some(s), PlaybackState::Playing) => {
                self.core.get_player(s.ctx, XMP_PLAYER_STATE) == XMP_STATE_PLAYING
            }
            _ => false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Elapsed time as of the most recent fill.
    pub fn position_ms(&self) -> i64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn metadata(&self) -> Option<&ModuleMetadata> {
        self.session.as_ref().map(|s| &s.metadata)
    }

    pub fn num_voices(&self) -> usize {
        self.metadata()
            .map(|m| m.num_channels.max(0) as usize)
            .unwrap_or(0)
    }

    pub fn voice_name(&self, index: usize) -> String {
        format!("Ch {}", index + 1)
    }

    /// Tracker modules carry a single song.
    pub fn num_subtunes(&self) -> usize {
        0
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn sink(&self) -> &SinkConnection {
        &self.sink
    }

    pub fn core(&self) -> &C {
        &self.core
    }
}

impl<C: ChipCore> Drop for PlaybackBridge<C> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.close_session(session);
        }
    }
}

fn silence<B: AsMut<[f32]>>(outputs: &mut [B], from: usize, to: usize) {
    for channel in outputs.iter_mut() {
        channel.as_mut()[from..to].fill(0.0);
    }
}
