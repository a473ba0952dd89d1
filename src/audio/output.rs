// cpal device output fed from a sample ring
// The device callback only drains a ring buffer; decoding happens on the
// player's render thread so a slow decoder call never stalls the device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::PlayerError;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Ring length in interleaved samples for `ms` of audio.
pub fn ring_capacity(sample_rate: u32, channels: u16, ms: u32) -> usize {
    (sample_rate as usize * channels as usize * ms as usize / 1000).max(channels as usize)
}

/// Producer side of the output ring, handed to the render thread.
#[derive(Clone)]
pub struct OutputWriter {
    producer: Arc<Mutex<RingProducer>>,
}

impl OutputWriter {
    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    pub fn write(&self, samples: &[f32]) -> usize {
        self.producer.lock().push_slice(samples)
    }

    /// Free space in the ring, in samples.
    pub fn available_space(&self) -> usize {
        self.producer.lock().vacant_len()
    }

    /// A writer with no device behind it; the caller drains the consumer.
    #[cfg(test)]
    pub(crate) fn detached(capacity: usize) -> (Self, RingConsumer) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let writer = Self {
            producer: Arc::new(Mutex::new(producer)),
        };
        (writer, consumer)
    }
}

/// Output gain shared with the device callback, stored as `f32` bits so the
/// callback never waits on a writer.
#[derive(Debug, Clone)]
pub struct VolumeControl(Arc<AtomicU32>);

impl VolumeControl {
    pub fn new(volume: f32) -> Self {
        let control = Self(Arc::new(AtomicU32::new(0)));
        control.set(volume);
        control
    }

    /// Clamped to 0.0..=1.0.
    pub fn set(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.0.store(volume.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Body of the device callback: fill `data` from the ring.
///
/// While paused the ring is left untouched and `data` is zeroed, so resuming
/// continues exactly where playback stopped.
pub(crate) fn fill_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    consumer: &mut RingConsumer,
    volume: f32,
    paused: bool,
    clear: bool,
) {
    if clear {
        consumer.clear();
    }
    if paused {
        data.fill(T::from_sample(0.0f32));
        return;
    }
    for sample in data.iter_mut() {
        let value = consumer.try_pop().unwrap_or(0.0) * volume;
        *sample = T::from_sample(value);
    }
}

/// Everything the device callback shares with [`AudioOutput`].
struct CallbackState {
    consumer: Arc<Mutex<RingConsumer>>,
    volume: VolumeControl,
    paused: Arc<AtomicBool>,
    clear_flag: Arc<AtomicBool>,
}

pub struct AudioOutput {
    _stream: Stream,
    writer: OutputWriter,
    sample_rate: u32,
    channels: u16,
    volume: VolumeControl,
    paused: Arc<AtomicBool>,
    clear_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open the default output device with a ring of `ring_buffer_ms`.
    pub fn new(ring_buffer_ms: u32) -> Result<Self, PlayerError> {
        let host = cpal::default_host();

        let device = host.default_output_device()
            .ok_or_else(|| PlayerError::Output("No output device available".to_string()))?;

        let config = device.default_output_config()
            .map_err(|e| PlayerError::Output(format!("Failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels,
            "Opening audio output"
        );

        let rb = HeapRb::<f32>::new(ring_capacity(sample_rate, channels, ring_buffer_ms));
        let (producer, consumer) = rb.split();
        let consumer = Arc::new(Mutex::new(consumer));

        let volume = VolumeControl::new(1.0);
        let paused = Arc::new(AtomicBool::new(false));
        let clear_flag = Arc::new(AtomicBool::new(false));
        let shared = CallbackState {
            consumer,
            volume: volume.clone(),
            paused: paused.clone(),
            clear_flag: clear_flag.clone(),
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), shared)?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), shared)?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), shared)?,
            format => return Err(PlayerError::Output(format!("Unsupported sample format: {:?}", format))),
        };

        stream.play()
            .map_err(|e| PlayerError::Output(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            writer: OutputWriter {
                producer: Arc::new(Mutex::new(producer)),
            },
            sample_rate,
            channels,
            volume,
            paused,
            clear_flag,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        shared: CallbackState,
    ) -> Result<Stream, PlayerError> {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Never wait on the render thread; a contended ring is an underrun.
                let Some(mut consumer) = shared.consumer.try_lock() else {
                    data.fill(T::from_sample(0.0f32));
                    return;
                };
                fill_output(
                    data,
                    &mut consumer,
                    shared.volume.get(),
                    shared.paused.load(Ordering::Relaxed),
                    shared.clear_flag.swap(false, Ordering::SeqCst),
                );
            },
            move |err| {
                error!(error = %err, "Audio output stream error");
            },
            None,
        ).map_err(|e| PlayerError::Output(format!("Failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    pub fn writer(&self) -> OutputWriter {
        self.writer.clone()
    }

    /// Drop everything queued (stop, seek).
    pub fn clear(&self) {
        // Drained by the device callback on its next run
        self.clear_flag.store(true, Ordering::SeqCst);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn set_volume(&self, vol: f32) {
        self.volume.set(vol);
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    /// Hold (`true`) or release the device: while held it plays silence and
    /// keeps whatever is queued.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_capacity() {
        assert_eq!(ring_capacity(48000, 2, 250), 24000);
        assert_eq!(ring_capacity(44100, 1, 1000), 44100);
        assert_eq!(ring_capacity(8000, 2, 0), 2);
    }

    #[test]
    fn test_writer_stops_when_full() {
        let (writer, mut consumer) = OutputWriter::detached(4);
        assert_eq!(writer.available_space(), 4);
        assert_eq!(writer.write(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]), 4);
        assert_eq!(writer.available_space(), 0);
        assert_eq!(consumer.try_pop(), Some(0.1));
        assert_eq!(writer.available_space(), 1);
    }

    #[test]
    fn test_paused_output_is_silent_and_keeps_ring() {
        let (writer, mut consumer) = OutputWriter::detached(8);
        writer.write(&[0.5, -0.5, 0.25, -0.25]);

        let mut data = [1.0f32; 4];
        fill_output(&mut data, &mut consumer, 1.0, true, false);
        assert_eq!(data, [0.0; 4]);
        assert_eq!(consumer.occupied_len(), 4);

        fill_output(&mut data, &mut consumer, 1.0, false, false);
        assert_eq!(data, [0.5, -0.5, 0.25, -0.25]);
        assert_eq!(consumer.occupied_len(), 0);
    }

    #[test]
    fn test_fill_output_applies_volume_and_underruns_to_zero() {
        let (writer, mut consumer) = OutputWriter::detached(8);
        writer.write(&[0.5, 1.0]);

        let mut data = [9.0f32; 4];
        fill_output(&mut data, &mut consumer, 0.5, false, false);
        assert_eq!(data, [0.25, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_clear_drops_queue_even_while_paused() {
        let (writer, mut consumer) = OutputWriter::detached(8);
        writer.write(&[0.5, 0.5]);

        let mut data = [1.0f32; 2];
        fill_output(&mut data, &mut consumer, 1.0, true, true);
        assert_eq!(data, [0.0; 2]);
        assert_eq!(consumer.occupied_len(), 0);
    }

    #[test]
    fn test_volume_control_shared_and_clamped() {
        let volume = VolumeControl::new(0.0);
        let callback_side = volume.clone();
        assert_eq!(callback_side.get(), 0.0);

        volume.set(0.4);
        assert_eq!(callback_side.get(), 0.4);
        volume.set(3.0);
        assert_eq!(callback_side.get(), 1.0);
        volume.set(f32::NAN);
        assert_eq!(callback_side.get(), 0.0);
    }
}
