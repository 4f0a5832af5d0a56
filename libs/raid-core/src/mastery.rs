//! Mastery leveling over a rolling window of timed outcomes.
//!
//! Levels run 0-5 and only move upward: a bad day never erases proven
//! fluency. The window keeps the last three attempts; the level implied by
//! the window is merged with `max` into the stored level.

use chrono::{DateTime, Utc};

use crate::types::{AttemptRecord, MasteryState};

/// Attempts kept in the rolling window.
pub const WINDOW_SIZE: usize = 3;

/// Grade-appropriate ceiling for a "fast" (automatic recall) answer.
pub fn fast_threshold_ms(grade: u8) -> u32 {
    match grade {
        0 => 3000,
        1..=3 => 2000,
        4 => 1700,
        _ => 1500,
    }
}

/// Level implied by the current window alone.
///
/// 2+ fast answers prove automaticity (a single fast answer can be luck);
/// the 2x/3x bands mark speed building on top of accuracy.
pub fn level_from_window(window: &[AttemptRecord], grade: u8) -> u8 {
    if window.is_empty() {
        return 0;
    }
    let fast = fast_threshold_ms(grade);

    let correct = window.iter().filter(|a| a.correct).count();
    let fast_count = window.iter().filter(|a| a.correct && a.response_ms <= fast).count();
    let within_2x = window.iter().any(|a| a.correct && a.response_ms <= fast * 2);
    let within_3x = window.iter().any(|a| a.correct && a.response_ms <= fast * 3);

    if fast_count >= 2 {
        5
    } else if within_2x {
        4
    } else if within_3x {
        3
    } else if correct >= 2 {
        2
    } else if correct >= 1 {
        1
    } else {
        0
    }
}

/// Record one timed, server-validated attempt and return the new level.
pub fn record_attempt(
    state: &mut MasteryState,
    grade: u8,
    correct: bool,
    response_ms: u32,
    now: DateTime<Utc>,
) -> u8 {
    state.window.push(AttemptRecord { response_ms, correct, at: now });
    if state.window.len() > WINDOW_SIZE {
        state.window.remove(0);
    }

    state.total_attempts = state.total_attempts.saturating_add(1);
    if correct {
        state.total_correct = state.total_correct.saturating_add(1);
        state.fastest_ms = Some(state.fastest_ms.map_or(response_ms, |f| f.min(response_ms)));
    }
    state.last_seen = now;

    // Monotonic upgrade: fluency is only ever proven, never un-proven.
    state.level = state.level.max(level_from_window(&state.window, grade));
    state.level
}

/// Untimed remediation exposure: refresh `last_seen` without touching the
/// window or the level. Fluency must be proven under the timed path.
pub fn practice_touch(state: &mut MasteryState, now: DateTime<Utc>) {
    state.last_seen = now;
}

/// Explicit reset, the only path that lowers a level.
pub fn reset(state: &mut MasteryState, now: DateTime<Utc>) {
    state.level = 0;
    state.window.clear();
    state.last_seen = now;
}
