use core::time::Duration;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH as SYSTEM_UNIX_EPOCH},
};

/// Default epoch: Thursday, May 31, 2018 08:01:22.640 UTC
pub const DEFAULT_EPOCH: Duration = Duration::from_millis(1_527_753_682_640);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// Discord epoch: Thursday, January 1, 2015 00:00:00 UTC
pub const DISCORD_EPOCH: Duration = Duration::from_millis(1_420_070_400_000);

/// Standard UNIX epoch: Thursday, January 1, 1970 00:00:00 UTC
pub const UNIX_EPOCH: Duration = Duration::ZERO;

/// A source of wall-clock time in milliseconds.
///
/// Generators read the clock through this trait so that tests can pin,
/// step, or rewind time.
///
/// The value is milliseconds since the Unix epoch. Generators subtract their
/// configured epoch themselves.
///
/// # Example
///
/// ```
/// use flakeid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since 1970-01-01 UTC.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// The operating system's wall clock.
///
/// This clock follows NTP and manual adjustments, so it can move backwards.
/// Generators report that as [`Error::ClockRegression`].
///
/// [`Error::ClockRegression`]: crate::Error::ClockRegression
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        // A clock set before 1970 reads as 0, which every epoch check rejects.
        SystemTime::now()
            .duration_since(SYSTEM_UNIX_EPOCH)
            .map_or(0, |elapsed| {
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_default_epoch() {
        let now = SystemClock.current_millis();
        assert!(u128::from(now) > DEFAULT_EPOCH.as_millis());
    }

    #[test]
    fn shared_clock_reads_through_arc_and_ref() {
        struct Fixed;
        impl TimeSource for Fixed {
            fn current_millis(&self) -> u64 {
                7
            }
        }
        let shared = Arc::new(Fixed);
        assert_eq!(shared.current_millis(), 7);
        assert_eq!((&Fixed).current_millis(), 7);
    }
}
