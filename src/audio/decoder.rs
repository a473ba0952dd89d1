// Decoder core interface
// The tracker decoder is an external library (libxmp built for a sandboxed
// heap). This trait is the whole surface the player uses; addresses are
// offsets into the core's own heap, read through `audio::abi`.

use crate::audio::abi::Ptr;

/// Opaque decoder context id.
pub type ContextHandle = u32;

/// `xmp_play_buffer` return code at end of module.
pub const XMP_END: i32 = -1;

/// `xmp_get_player` parameter for the player state.
pub const XMP_PLAYER_STATE: i32 = 8;

/// Player state values reported for `XMP_PLAYER_STATE`.
pub const XMP_STATE_UNLOADED: i32 = 0;
pub const XMP_STATE_LOADED: i32 = 1;
pub const XMP_STATE_PLAYING: i32 = 2;

/// Native tracker decoder with its own addressable heap.
///
/// Implementations wrap one loaded instance of the library. Calls are not
/// reentrant; the player serializes every call on a context.
pub trait ChipCore: Send {
    /// Layout revision of the structs this core fills, compared against
    /// [`crate::audio::abi::ABI_VERSION`].
    fn abi_version(&self) -> &str;

    /// Allocate `size` bytes in the core's heap. Returns 0 on failure.
    fn malloc(&mut self, size: usize) -> Ptr;
    fn free(&mut self, ptr: Ptr);
    fn heap(&self) -> &[u8];
    fn heap_mut(&mut self) -> &mut [u8];

    fn create_context(&mut self) -> ContextHandle;
    fn free_context(&mut self, ctx: ContextHandle);

    /// Returns 0 on success, a negative libxmp error code otherwise.
    fn load_module_from_memory(&mut self, ctx: ContextHandle, data: &[u8]) -> i32;
    fn start_player(&mut self, ctx: ContextHandle, rate: u32, format: i32) -> i32;
    /// Render `size` bytes of interleaved stereo i16 into `buffer`.
    fn play_buffer(&mut self, ctx: ContextHandle, buffer: Ptr, size: i32, loop_count: i32) -> i32;
    fn get_frame_info(&mut self, ctx: ContextHandle, info: Ptr);
    fn get_module_info(&mut self, ctx: ContextHandle, info: Ptr);
    fn get_player(&self, ctx: ContextHandle, param: i32) -> i32;
    fn channel_mute(&mut self, ctx: ContextHandle, channel: i32, status: i32) -> i32;
    fn seek_time(&mut self, ctx: ContextHandle, time_ms: i32) -> i32;
    fn restart_module(&mut self, ctx: ContextHandle);
    fn stop_module(&mut self, ctx: ContextHandle);
    fn end_player(&mut self, ctx: ContextHandle);
    fn release_module(&mut self, ctx: ContextHandle);
    fn inject_event(&mut self, ctx: ContextHandle, channel: i32, event: Ptr);
}
