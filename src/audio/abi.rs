// Decoder ABI
// Named layouts for the libxmp structs the bridge reads out of the decoder heap.
// Every byte offset the player depends on lives in this file; a decoder
// upgrade that moves a field only has to be resynchronized here.

use serde::Serialize;

use crate::error::AbiError;

/// Address inside the decoder's heap.
pub type Ptr = u32;

/// Layout revision these offsets were taken from.
pub const ABI_VERSION: &str = "libxmp-4.4/wasm32";

/// Samples are signed 16-bit little-endian.
pub const BYTES_PER_SAMPLE: usize = 2;

/// The decoder always renders interleaved stereo.
pub const DECODER_CHANNELS: usize = 2;

/// `struct xmp_frame_info`. Every field read here is an `int`.
pub struct FrameInfoLayout;

impl FrameInfoLayout {
    pub const POS: usize = 0;
    pub const PATTERN: usize = 4;
    pub const ROW: usize = 2 * 4;
    pub const NUM_ROWS: usize = 3 * 4;
    pub const FRAME: usize = 4 * 4;
    pub const SPEED: usize = 5 * 4;
    pub const BPM: usize = 6 * 4;
    pub const TIME: usize = 7 * 4;
    pub const TOTAL_TIME: usize = 8 * 4;
    /// The struct ends in a per-channel array; reserve generously.
    pub const ALLOC_SIZE: usize = 2048;
}

/// `struct xmp_module_info`.
pub struct ModuleInfoLayout;

impl ModuleInfoLayout {
    /// `struct xmp_module *mod`, after `md5[16]` and `vol_base`.
    pub const MODULE: usize = 20;
    /// `char *comment`
    pub const COMMENT: usize = 24;
    pub const ALLOC_SIZE: usize = 2048;
}

/// `struct xmp_module`.
pub struct ModuleLayout;

impl ModuleLayout {
    pub const NAME: usize = 0;
    pub const NAME_LEN: usize = 64;
    pub const TYPE: usize = 64;
    pub const TYPE_LEN: usize = 64;
    /// Start of the nine `int` counters (pat, trk, chn, ins, smp, spd, bpm, len, rst).
    pub const COUNTERS: usize = 128;
    pub const PATTERNS: usize = Self::COUNTERS;
    pub const TRACKS: usize = Self::COUNTERS + 4;
    pub const CHANNELS: usize = Self::COUNTERS + 2 * 4;
    pub const INSTRUMENTS: usize = Self::COUNTERS + 3 * 4;
    pub const SAMPLES: usize = Self::COUNTERS + 4 * 4;
    pub const SPEED: usize = Self::COUNTERS + 5 * 4;
    pub const BPM: usize = Self::COUNTERS + 6 * 4;
    pub const LENGTH: usize = Self::COUNTERS + 7 * 4;
    pub const RESTART: usize = Self::COUNTERS + 8 * 4;
}

/// `struct xmp_event`.
pub struct EventLayout;

impl EventLayout {
    pub const SIZE: usize = 8;
    pub const FX_TYPE: usize = 3;
    /// The tempo payload is written as a 32-bit int spanning fxp..flags.
    pub const FX_PARAM: usize = 4;
    /// FX_S3M_BPM
    pub const SET_TEMPO: u8 = 0x87;
}

/// Longest comment the player will copy out of the heap.
pub const COMMENT_MAX_LEN: usize = 256;

/// Byte offset of one sample in an interleaved buffer.
#[inline]
pub const fn sample_offset(frame: usize, channel: usize, channels: usize) -> usize {
    frame * BYTES_PER_SAMPLE * channels + channel * BYTES_PER_SAMPLE
}

/// Bytes needed for `frames` interleaved frames.
#[inline]
pub const fn buffer_bytes(frames: usize) -> usize {
    frames * DECODER_CHANNELS * BYTES_PER_SAMPLE
}

pub fn slice(heap: &[u8], ptr: Ptr, len: usize) -> Result<&[u8], AbiError> {
    let start = ptr as usize;
    heap.get(start..start.saturating_add(len))
        .ok_or(AbiError::OutOfBounds { ptr, len })
}

pub fn slice_mut(heap: &mut [u8], ptr: Ptr, len: usize) -> Result<&mut [u8], AbiError> {
    let start = ptr as usize;
    heap.get_mut(start..start.saturating_add(len))
        .ok_or(AbiError::OutOfBounds { ptr, len })
}

fn field(ptr: Ptr, offset: usize) -> Ptr {
    ptr.wrapping_add(offset as u32)
}

pub fn read_i32(heap: &[u8], ptr: Ptr) -> Result<i32, AbiError> {
    let bytes = slice(heap, ptr, 4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_ptr(heap: &[u8], ptr: Ptr) -> Result<Ptr, AbiError> {
    read_i32(heap, ptr).map(|v| v as u32)
}

pub fn write_i32(heap: &mut [u8], ptr: Ptr, value: i32) -> Result<(), AbiError> {
    slice_mut(heap, ptr, 4)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Read a NUL-terminated string of at most `max_len` bytes.
/// A null pointer reads as the empty string.
pub fn read_c_string(heap: &[u8], ptr: Ptr, max_len: usize) -> Result<String, AbiError> {
    if ptr == 0 {
        return Ok(String::new());
    }
    let start = ptr as usize;
    if start >= heap.len() {
        return Err(AbiError::OutOfBounds { ptr, len: max_len });
    }
    let end = start.saturating_add(max_len).min(heap.len());
    let bytes = &heap[start..end];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
}

/// Per-callback playback snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub pos: i32,
    pub pattern: i32,
    pub row: i32,
    pub num_rows: i32,
    pub frame: i32,
    pub speed: i32,
    pub bpm: i32,
    pub time_ms: i32,
    pub total_time_ms: i32,
}

impl FrameInfo {
    pub fn read(heap: &[u8], ptr: Ptr) -> Result<Self, AbiError> {
        let at = |offset| read_i32(heap, field(ptr, offset));
        Ok(Self {
            pos: at(FrameInfoLayout::POS)?,
            pattern: at(FrameInfoLayout::PATTERN)?,
            row: at(FrameInfoLayout::ROW)?,
            num_rows: at(FrameInfoLayout::NUM_ROWS)?,
            frame: at(FrameInfoLayout::FRAME)?,
            speed: at(FrameInfoLayout::SPEED)?,
            bpm: at(FrameInfoLayout::BPM)?,
            time_ms: at(FrameInfoLayout::TIME)?,
            total_time_ms: at(FrameInfoLayout::TOTAL_TIME)?,
        })
    }

    pub fn write(&self, heap: &mut [u8], ptr: Ptr) -> Result<(), AbiError> {
        let fields = [
            (FrameInfoLayout::POS, self.pos),
            (FrameInfoLayout::PATTERN, self.pattern),
            (FrameInfoLayout::ROW, self.row),
            (FrameInfoLayout::NUM_ROWS, self.num_rows),
            (FrameInfoLayout::FRAME, self.frame),
            (FrameInfoLayout::SPEED, self.speed),
            (FrameInfoLayout::BPM, self.bpm),
            (FrameInfoLayout::TIME, self.time_ms),
            (FrameInfoLayout::TOTAL_TIME, self.total_time_ms),
        ];
        for (offset, value) in fields {
            write_i32(heap, field(ptr, offset), value)?;
        }
        Ok(())
    }
}

/// Immutable snapshot of a loaded module, captured once after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub title: String,
    pub system: String,
    pub comment: String,
    pub patterns: i32,
    pub tracks: i32,
    pub num_channels: i32,
    pub num_instruments: i32,
    pub num_samples: i32,
    pub initial_speed: i32,
    #[serde(rename = "initialBPM")]
    pub initial_bpm: i32,
    pub module_length: i32,
    pub restart_position: i32,
}

impl ModuleMetadata {
    /// Decode from a filled `xmp_module_info` at `info_ptr`.
    pub fn read(heap: &[u8], info_ptr: Ptr) -> Result<Self, AbiError> {
        let module = read_ptr(heap, field(info_ptr, ModuleInfoLayout::MODULE))?;
        let comment = read_ptr(heap, field(info_ptr, ModuleInfoLayout::COMMENT))?;
        let at = |offset| read_i32(heap, field(module, offset));

        Ok(Self {
            title: read_c_string(heap, field(module, ModuleLayout::NAME), ModuleLayout::NAME_LEN)?,
            system: read_c_string(heap, field(module, ModuleLayout::TYPE), ModuleLayout::TYPE_LEN)?,
            comment: read_c_string(heap, comment, COMMENT_MAX_LEN)?,
            patterns: at(ModuleLayout::PATTERNS)?,
            tracks: at(ModuleLayout::TRACKS)?,
            num_channels: at(ModuleLayout::CHANNELS)?,
            num_instruments: at(ModuleLayout::INSTRUMENTS)?,
            num_samples: at(ModuleLayout::SAMPLES)?,
            initial_speed: at(ModuleLayout::SPEED)?,
            initial_bpm: at(ModuleLayout::BPM)?,
            module_length: at(ModuleLayout::LENGTH)?,
            restart_position: at(ModuleLayout::RESTART)?,
        })
    }
}

/// Write a zeroed `xmp_event` carrying a set-tempo effect.
pub fn write_tempo_event(heap: &mut [u8], ptr: Ptr, bpm: i32) -> Result<(), AbiError> {
    let event = slice_mut(heap, ptr, EventLayout::SIZE)?;
    event.fill(0);
    event[EventLayout::FX_TYPE] = EventLayout::SET_TEMPO;
    event[EventLayout::FX_PARAM..EventLayout::FX_PARAM + 4].copy_from_slice(&bpm.to_le_bytes());
    Ok(())
}
