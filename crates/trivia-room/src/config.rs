//! Room capacity and timing.

use std::time::Duration;

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Maximum non-admin players per room.
    pub max_players: usize,

    /// Answer window of one round.
    pub round_time: Duration,

    /// Pause after the last player answered, so clients can show
    /// per-answer feedback before the next question.
    pub settle_delay: Duration,

    /// Pause between the pre-end notice and the final ranking.
    pub end_delay: Duration,

    /// Countdown between a successful start and the first question.
    /// Zero shows the first question immediately.
    pub start_countdown: Duration,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            round_time: Duration::from_secs(15),
            settle_delay: Duration::from_secs(2),
            end_delay: Duration::from_secs(5),
            start_countdown: Duration::from_secs(3),
            channel_size: 64,
        }
    }
}

/// Whole seconds shown to clients for `duration`, rounded up.
pub(crate) fn display_secs(duration: Duration) -> u32 {
    duration.as_secs_f64().ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.max_players, 10);
        assert_eq!(config.round_time, Duration::from_secs(15));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.end_delay, Duration::from_secs(5));
        assert_eq!(config.start_countdown, Duration::from_secs(3));
    }

    #[test]
    fn test_display_secs_rounds_up() {
        assert_eq!(display_secs(Duration::from_secs(15)), 15);
        assert_eq!(display_secs(Duration::from_millis(200)), 1);
        assert_eq!(display_secs(Duration::ZERO), 0);
    }
}
