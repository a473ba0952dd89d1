// Tempo injection policy
// libxmp only knows a module's tempo as authored, so runtime tempo scaling
// works by injecting set-tempo effects whenever the measured BPM drifts.

pub const MIN_BPM: i32 = 20;
pub const MAX_BPM: i32 = 255;

/// BPM to run at for a module authored at `initial_bpm`, clamped to what
/// the tempo effect can express.
pub fn target_bpm(initial_bpm: i32, tempo_scale: f64) -> i32 {
    (initial_bpm as f64 * tempo_scale)
        .clamp(MIN_BPM as f64, MAX_BPM as f64)
        .floor() as i32
}

/// Returns the BPM to inject, or `None` when the decoder is already on target.
pub fn injection_for(initial_bpm: i32, tempo_scale: f64, measured_bpm: i32) -> Option<i32> {
    if tempo_scale == 1.0 {
        return None;
    }
    let target = target_bpm(initial_bpm, tempo_scale);
    (target != measured_bpm).then_some(target)
}
