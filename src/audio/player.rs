// Audio player implementation
// Owns the bridge, the device output and the render thread between them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::audio::abi::ModuleMetadata;
use crate::audio::bridge::{FillOutcome, PlaybackBridge, PlaybackState, StateObserver};
use crate::audio::decoder::ChipCore;
use crate::audio::output::{ring_capacity, AudioOutput, OutputWriter};
use crate::audio::sink::SinkConnection;
use crate::error::PlayerError;
use crate::settings::PlaybackSettings;

/// How long the render thread sleeps while the ring is full or playback is paused.
const RENDER_IDLE: Duration = Duration::from_millis(2);

/// Result of one render-thread iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderStep {
    /// A block was queued.
    Wrote,
    /// Not enough ring space, or paused.
    Idle,
    /// The session ended or the sink disconnected.
    Finished,
}

/// Reusable buffers for one render thread.
pub(crate) struct RenderBuffers {
    planes: Vec<Vec<f32>>,
    interleaved: Vec<f32>,
    block_frames: usize,
}

impl RenderBuffers {
    pub(crate) fn new(channels: usize, block_frames: usize) -> Self {
        Self {
            planes: vec![vec![0.0; block_frames]; channels],
            interleaved: Vec::with_capacity(channels * block_frames),
            block_frames,
        }
    }
}

/// Interleave planar channels, frame-major.
pub(crate) fn interleave(planes: &[Vec<f32>], frames: usize, out: &mut Vec<f32>) {
    out.clear();
    for frame in 0..frames {
        for plane in planes {
            out.push(plane[frame]);
        }
    }
}

/// Pull one block from the bridge into the ring if there is room for it.
///
/// A termination is reported to `observer` after the bridge lock is released.
pub(crate) fn render_step<C: ChipCore>(
    bridge: &Mutex<PlaybackBridge<C>>,
    observer: &Mutex<StateObserver>,
    writer: &OutputWriter,
    buffers: &mut RenderBuffers,
    sample_rate: u32,
) -> RenderStep {
    let frames = buffers.block_frames;
    if writer.available_space() < frames * buffers.planes.len() {
        return RenderStep::Idle;
    }

    let started = Instant::now();
    let (outcome, terminated) = {
        let mut bridge = bridge.lock();
        if !bridge.sink().is_connected() {
            return RenderStep::Finished;
        }
        let outcome = bridge.fill_buffer(&mut buffers.planes, frames);
        (outcome, bridge.take_termination())
    };
    if terminated {
        (*observer.lock())(true);
    }

    let budget = Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64);
    let elapsed = started.elapsed();
    if elapsed > budget {
        warn!(?elapsed, ?budget, "Decoder fill exceeded its real-time budget");
    }

    match outcome {
        Ok(FillOutcome::Rendered) => {
            interleave(&buffers.planes, frames, &mut buffers.interleaved);
            writer.write(&buffers.interleaved);
            RenderStep::Wrote
        }
        Ok(FillOutcome::Silence) => RenderStep::Idle,
        Ok(FillOutcome::Ended) => RenderStep::Finished,
        Err(e) => {
            error!(error = %e, "Playback stopped");
            RenderStep::Finished
        }
    }
}

struct RenderThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct Player<C: ChipCore + 'static> {
    bridge: Arc<Mutex<PlaybackBridge<C>>>,
    observer: Arc<Mutex<StateObserver>>,
    output: AudioOutput,
    render: Option<RenderThread>,
    block_frames: usize,
    default_tempo: f64,
}

impl<C: ChipCore + 'static> Player<C> {
    /// Open the default output device and wrap `core` in a bridge feeding it.
    pub fn new(core: C, settings: &PlaybackSettings, observer: StateObserver) -> Result<Self, PlayerError> {
        let output = AudioOutput::new(settings.ring_buffer_ms)?;
        output.set_volume(settings.volume);

        let sink = SinkConnection::new(output.sample_rate());
        let bridge = PlaybackBridge::new(core, sink, settings.buffer_size)?;

        // Leave room for at least two blocks in the ring.
        let channels = output.channels() as usize;
        let ring_frames = ring_capacity(output.sample_rate(), output.channels(), settings.ring_buffer_ms) / channels.max(1);
        let block_frames = settings.buffer_size.min(ring_frames / 2).max(1);

        Ok(Self {
            bridge: Arc::new(Mutex::new(bridge)),
            observer: Arc::new(Mutex::new(observer)),
            output,
            render: None,
            block_frames,
            default_tempo: settings.default_tempo,
        })
    }

    /// Load module bytes and start playback.
    pub fn play(&mut self, data: &[u8]) -> Result<(), PlayerError> {
        self.stop_render();
        self.output.clear();
        self.output.set_paused(false);

        {
            let mut bridge = self.bridge.lock();
            bridge.load(data)?;
            if self.default_tempo != 1.0 {
                bridge.set_tempo(self.default_tempo);
            }
        }

        self.start_render()
    }

    fn start_render(&mut self) -> Result<(), PlayerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let bridge = Arc::clone(&self.bridge);
        let observer = Arc::clone(&self.observer);
        let writer = self.output.writer();
        let sample_rate = self.output.sample_rate();
        let mut buffers = RenderBuffers::new(self.output.channels() as usize, self.block_frames);

        let handle = thread::Builder::new()
            .name("chipsloth-render".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Relaxed) {
                    match render_step(&bridge, &observer, &writer, &mut buffers, sample_rate) {
                        RenderStep::Wrote => {}
                        RenderStep::Idle => thread::sleep(RENDER_IDLE),
                        RenderStep::Finished => break,
                    }
                }
                debug!("Render thread exiting");
            })
            .map_err(|e| PlayerError::Output(format!("Failed to spawn render thread: {}", e)))?;

        self.render = Some(RenderThread { stop, handle });
        Ok(())
    }

    fn stop_render(&mut self) {
        if let Some(render) = self.render.take() {
            render.stop.store(true, Ordering::Relaxed);
            // The observer may run on the render thread itself; it exits on its own.
            if render.handle.thread().id() == thread::current().id() {
                return;
            }
            if render.handle.join().is_err() {
                error!("Render thread panicked");
            }
        }
    }

    /// Hold the device on the bridge's paused state so queued audio waits too.
    fn sync_output_pause(&self, state: PlaybackState) {
        self.output.set_paused(state == PlaybackState::Paused);
    }

    pub fn pause(&self) {
        let state = {
            let mut bridge = self.bridge.lock();
            bridge.pause();
            bridge.state()
        };
        self.sync_output_pause(state);
    }

    pub fn resume(&self) {
        let state = {
            let mut bridge = self.bridge.lock();
            bridge.resume();
            bridge.state()
        };
        self.sync_output_pause(state);
    }

    pub fn toggle_pause(&self) -> bool {
        let (paused, state) = {
            let mut bridge = self.bridge.lock();
            (bridge.toggle_pause(), bridge.state())
        };
        self.sync_output_pause(state);
        paused
    }

    pub fn stop(&mut self) {
        let terminated = {
            let mut bridge = self.bridge.lock();
            bridge.stop();
            bridge.take_termination()
        };
        self.stop_render();
        self.output.clear();
        self.output.set_paused(false);
        if terminated {
            (*self.observer.lock())(true);
        }
    }

    pub fn seek_ms(&self, position_ms: i64) -> Result<(), PlayerError> {
        self.bridge.lock().seek_ms(position_ms)?;
        self.output.clear();
        Ok(())
    }

    pub fn restart(&self) -> Result<(), PlayerError> {
        self.bridge.lock().restart()?;
        self.output.clear();
        Ok(())
    }

    pub fn set_voices(&self, voices: &[bool]) -> Result<(), PlayerError> {
        self.bridge.lock().set_voices(voices)
    }

    pub fn set_tempo(&self, scale: f64) -> bool {
        self.bridge.lock().set_tempo(scale)
    }

    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.output.volume()
    }

    pub fn is_playing(&self) -> bool {
        self.bridge.lock().is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.bridge.lock().state()
    }

    pub fn position_ms(&self) -> i64 {
        self.bridge.lock().position_ms()
    }

    pub fn duration_ms(&self) -> i64 {
        self.bridge.lock().duration_ms()
    }

    pub fn metadata(&self) -> Option<ModuleMetadata> {
        self.bridge.lock().metadata().cloned()
    }

    pub fn num_voices(&self) -> usize {
        self.bridge.lock().num_voices()
    }

    pub fn voice_name(&self, index: usize) -> String {
        self.bridge.lock().voice_name(index)
    }
}

impl<C: ChipCore + 'static> Drop for Player<C> {
    fn drop(&mut self) {
        self.stop_render();
        self.bridge.lock().unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::fake::FakeCore;
    use crate::audio::decoder::XMP_END;
    use ringbuf::traits::{Consumer, Observer};

    fn bridge(core: FakeCore) -> Mutex<PlaybackBridge<FakeCore>> {
        let mut bridge = PlaybackBridge::new(core, SinkConnection::new(48000), 64).unwrap();
        bridge.load(b"module").unwrap();
        Mutex::new(bridge)
    }

    fn quiet() -> Mutex<StateObserver> {
        Mutex::new(Box::new(|_| {}))
    }

    #[test]
    fn test_interleave_frame_major() {
        let planes = vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]];
        let mut out = Vec::new();
        interleave(&planes, 2, &mut out);
        assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_render_step_queues_block() {
        let mut core = FakeCore::new();
        core.pattern = |i| if i % 2 == 0 { 16384 } else { -16384 };
        let bridge = bridge(core);
        let observer = quiet();
        let (writer, mut consumer) = OutputWriter::detached(256);
        let mut buffers = RenderBuffers::new(2, 32);

        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Wrote);
        assert_eq!(consumer.occupied_len(), 64);
        let left = consumer.try_pop().unwrap();
        let right = consumer.try_pop().unwrap();
        assert!(left > 0.49 && left < 0.51);
        assert!(right < -0.49 && right > -0.51);
    }

    #[test]
    fn test_render_step_waits_for_space() {
        let bridge = bridge(FakeCore::new());
        let observer = quiet();
        let (writer, _consumer) = OutputWriter::detached(32);
        let mut buffers = RenderBuffers::new(2, 32);

        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Idle);
        assert_eq!(bridge.lock().core().calls.play_buffer, 0);
    }

    #[test]
    fn test_render_step_idle_while_paused() {
        let bridge = bridge(FakeCore::new());
        bridge.lock().pause();
        let observer = quiet();
        let (writer, consumer) = OutputWriter::detached(256);
        let mut buffers = RenderBuffers::new(2, 32);

        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Idle);
        assert_eq!(consumer.occupied_len(), 0);
    }

    #[test]
    fn test_render_step_finishes_at_end() {
        let mut core = FakeCore::new();
        core.fail_on_call = Some((2, XMP_END));
        let bridge = bridge(core);
        let observer = quiet();
        let (writer, _consumer) = OutputWriter::detached(1024);
        let mut buffers = RenderBuffers::new(2, 32);

        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Wrote);
        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Finished);
        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Finished);
        assert_eq!(bridge.lock().core().calls.play_buffer, 2);
    }

    #[test]
    fn test_observer_runs_outside_bridge_lock() {
        let mut core = FakeCore::new();
        core.fail_on_call = Some((2, XMP_END));
        let bridge = Arc::new(bridge(core));

        // The observer queries the bridge the way a UI would on track end.
        let seen = Arc::new(Mutex::new(Vec::<(bool, PlaybackState)>::new()));
        let observer: Mutex<StateObserver> = {
            let bridge = Arc::clone(&bridge);
            let seen = Arc::clone(&seen);
            Mutex::new(Box::new(move |stopped: bool| {
                let state = bridge.lock().state();
                seen.lock().push((stopped, state));
            }))
        };
        let (writer, _consumer) = OutputWriter::detached(1024);
        let mut buffers = RenderBuffers::new(2, 32);

        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Wrote);
        assert!(seen.lock().is_empty());
        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Finished);
        assert_eq!(render_step(&bridge, &observer, &writer, &mut buffers, 48000), RenderStep::Finished);
        assert_eq!(*seen.lock(), vec![(true, PlaybackState::Stopped)]);
    }
}
