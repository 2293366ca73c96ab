//! # Queue Navigation
//!
//! Pure decision logic for `next` and `prev`. These functions only read a
//! [`SessionState`] snapshot and return what the engine should do; the engine
//! applies the decision and performs the transport side effects.
//!
//! Both directions need a current song. An idle session stays idle, so a
//! stray end-of-song after a failed start cannot begin playback.
//!
//! ## Next
//!
//! - **Repeat-one** intercepts automatic end-of-song only and replays the
//!   current song. A manual skip advances normally.
//! - **Sequential** (shuffle off): move to the following index. Past the end,
//!   wrap to 0 when repeat is `All` or the skip was manual; otherwise stop.
//! - **Shuffle**: pick uniformly from a pool. With prefer-unplayed the pool is
//!   the queue minus the played-set; an exhausted pool stops on an automatic
//!   end with repeat off, and otherwise resets to the full queue. The current
//!   song is excluded whenever the pool has more than one member.
//!
//! ## Prev
//!
//! Past the restart threshold the current song restarts. Otherwise move to the
//! previous index in list order, wrapping to the last song.

use crate::session::{AdvanceTrigger, RepeatMode, SessionState};
use rand::Rng;

/// Outcome of a `next` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Idle session or empty queue
    Nothing,
    /// Replay the current song from 0 (repeat-one)
    Replay,
    /// End of queue: pause in place, keep the current song and position
    Stop,
    /// Load the song at `index`; clear the played-set first when `reset_played`
    Play { index: usize, reset_played: bool },
}

/// Outcome of a `prev` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrevStep {
    Nothing,
    /// Seek the current song back to 0
    Restart,
    Play { index: usize },
}

pub fn next_step<R: Rng + ?Sized>(
    state: &SessionState,
    trigger: AdvanceTrigger,
    rng: &mut R,
) -> NextStep {
    if trigger == AdvanceTrigger::Auto
        && state.repeat == RepeatMode::One
        && state.current.is_some()
    {
        return NextStep::Replay;
    }

    if state.current.is_none() || state.queue.is_empty() {
        return NextStep::Nothing;
    }

    if state.shuffle {
        shuffle_step(state, trigger, rng)
    } else {
        sequential_step(state, trigger)
    }
}

fn sequential_step(state: &SessionState, trigger: AdvanceTrigger) -> NextStep {
    let next = state.current_index().map_or(0, |index| index + 1);

    if next < state.queue.len() {
        return NextStep::Play {
            index: next,
            reset_played: false,
        };
    }

    if state.repeat == RepeatMode::All || trigger == AdvanceTrigger::Manual {
        NextStep::Play {
            index: 0,
            reset_played: false,
        }
    } else {
        NextStep::Stop
    }
}

fn shuffle_step<R: Rng + ?Sized>(
    state: &SessionState,
    trigger: AdvanceTrigger,
    rng: &mut R,
) -> NextStep {
    let everything: Vec<usize> = (0..state.queue.len()).collect();

    let (mut pool, reset_played) = if state.prefer_unplayed {
        let unplayed: Vec<usize> = everything
            .iter()
            .copied()
            .filter(|&index| !state.played.contains(&state.queue[index].id))
            .collect();

        if !unplayed.is_empty() {
            (unplayed, false)
        } else if trigger == AdvanceTrigger::Auto && state.repeat == RepeatMode::Off {
            return NextStep::Stop;
        } else {
            (everything, true)
        }
    } else {
        (everything, false)
    };

    if pool.len() > 1 {
        if let Some(current) = state.current_index() {
            pool.retain(|&index| index != current);
        }
    }

    let index = pool[rng.gen_range(0..pool.len())];
    NextStep::Play {
        index,
        reset_played,
    }
}

pub fn previous_step(state: &SessionState, restart_threshold_secs: f64) -> PrevStep {
    if state.current.is_none() {
        return PrevStep::Nothing;
    }

    if state.position > restart_threshold_secs || state.queue.is_empty() {
        return PrevStep::Restart;
    }

    let last = state.queue.len() - 1;
    let index = match state.current_index() {
        Some(0) | None => last,
        Some(index) => index - 1,
    };
    PrevStep::Play { index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::song;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state_with(ids: &[&str], current: Option<&str>) -> SessionState {
        let queue: Vec<_> = ids.iter().map(|id| song(id, 100.0)).collect();
        let current = current.map(|id| song(id, 100.0));
        SessionState {
            queue,
            current,
            ..SessionState::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn sequential_advances_within_bounds() {
        let state = state_with(&["a", "b", "c"], Some("a"));
        assert_eq!(
            next_step(&state, AdvanceTrigger::Auto, &mut rng()),
            NextStep::Play { index: 1, reset_played: false }
        );
    }

    #[test]
    fn sequential_end_manual_wraps_auto_stops() {
        let state = state_with(&["a", "b", "c"], Some("c"));
        assert_eq!(
            next_step(&state, AdvanceTrigger::Manual, &mut rng()),
            NextStep::Play { index: 0, reset_played: false }
        );
        assert_eq!(next_step(&state, AdvanceTrigger::Auto, &mut rng()), NextStep::Stop);
    }

    #[test]
    fn sequential_end_repeat_all_wraps() {
        let mut state = state_with(&["a", "b"], Some("b"));
        state.repeat = RepeatMode::All;
        assert_eq!(
            next_step(&state, AdvanceTrigger::Auto, &mut rng()),
            NextStep::Play { index: 0, reset_played: false }
        );
    }

    #[test]
    fn current_outside_queue_starts_at_zero() {
        let state = state_with(&["a", "b"], Some("z"));
        assert_eq!(
            next_step(&state, AdvanceTrigger::Auto, &mut rng()),
            NextStep::Play { index: 0, reset_played: false }
        );
    }

    #[test]
    fn repeat_one_only_intercepts_auto() {
        let mut state = state_with(&["a", "b"], Some("a"));
        state.repeat = RepeatMode::One;
        assert_eq!(next_step(&state, AdvanceTrigger::Auto, &mut rng()), NextStep::Replay);
        assert_eq!(
            next_step(&state, AdvanceTrigger::Manual, &mut rng()),
            NextStep::Play { index: 1, reset_played: false }
        );
    }

    #[test]
    fn empty_queue_does_nothing() {
        let state = state_with(&[], None);
        assert_eq!(next_step(&state, AdvanceTrigger::Manual, &mut rng()), NextStep::Nothing);
        assert_eq!(previous_step(&state, 3.0), PrevStep::Nothing);
    }

    #[test]
    fn idle_session_goes_nowhere() {
        let mut state = state_with(&["a", "b"], None);
        state.shuffle = true;
        for trigger in [AdvanceTrigger::Auto, AdvanceTrigger::Manual] {
            assert_eq!(next_step(&state, trigger, &mut rng()), NextStep::Nothing);
        }
        assert_eq!(previous_step(&state, 3.0), PrevStep::Nothing);

        state.shuffle = false;
        state.repeat = RepeatMode::All;
        assert_eq!(next_step(&state, AdvanceTrigger::Auto, &mut rng()), NextStep::Nothing);
    }

    #[test]
    fn shuffle_never_repeats_current_when_alternatives_exist() {
        let mut state = state_with(&["a", "b", "c"], Some("b"));
        state.shuffle = true;
        let mut rng = rng();
        for _ in 0..200 {
            match next_step(&state, AdvanceTrigger::Manual, &mut rng) {
                NextStep::Play { index, .. } => assert_ne!(index, 1),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn shuffle_single_song_replays_it() {
        let mut state = state_with(&["a"], Some("a"));
        state.shuffle = true;
        assert_eq!(
            next_step(&state, AdvanceTrigger::Manual, &mut rng()),
            NextStep::Play { index: 0, reset_played: false }
        );
    }

    #[test]
    fn prefer_unplayed_draws_from_unplayed_pool() {
        let mut state = state_with(&["a", "b", "c", "d"], Some("a"));
        state.shuffle = true;
        state.prefer_unplayed = true;
        state.played = ["a", "b", "d"].iter().map(|s| s.to_string()).collect();

        let mut rng = rng();
        for _ in 0..50 {
            assert_eq!(
                next_step(&state, AdvanceTrigger::Auto, &mut rng),
                NextStep::Play { index: 2, reset_played: false }
            );
        }
    }

    #[test]
    fn prefer_unplayed_exhausted_pool() {
        let mut state = state_with(&["a", "b", "c"], Some("c"));
        state.shuffle = true;
        state.prefer_unplayed = true;
        state.played = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        // Automatic end with repeat off stops
        assert_eq!(next_step(&state, AdvanceTrigger::Auto, &mut rng()), NextStep::Stop);

        // Manual skip loops over the full queue, minus the current song
        match next_step(&state, AdvanceTrigger::Manual, &mut rng()) {
            NextStep::Play { index, reset_played } => {
                assert!(reset_played);
                assert_ne!(index, 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        // Repeat all loops too
        state.repeat = RepeatMode::All;
        assert!(matches!(
            next_step(&state, AdvanceTrigger::Auto, &mut rng()),
            NextStep::Play { reset_played: true, .. }
        ));
    }

    #[test]
    fn prev_restarts_after_threshold() {
        let mut state = state_with(&["a", "b"], Some("b"));
        state.position = 5.0;
        assert_eq!(previous_step(&state, 3.0), PrevStep::Restart);

        state.position = 3.0;
        assert_eq!(previous_step(&state, 3.0), PrevStep::Play { index: 0 });
    }

    #[test]
    fn prev_wraps_to_last() {
        let mut state = state_with(&["a", "b", "c"], Some("a"));
        state.position = 1.0;
        assert_eq!(previous_step(&state, 3.0), PrevStep::Play { index: 2 });
    }

    #[test]
    fn prev_ignores_shuffle() {
        let mut state = state_with(&["a", "b", "c"], Some("c"));
        state.shuffle = true;
        assert_eq!(previous_step(&state, 3.0), PrevStep::Play { index: 1 });
    }
}
