//! ホスト側の時計

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use relink_arq::Clock;

/// `Instant` を起点にしたミリ秒時計
///
/// 約 49.7 日で u32 が一周するが、プロトコル側の時間計算は mod 2^32 なので問題ない。
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        StdClock {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        // 切り捨てで一周させる
        self.origin.elapsed().as_millis() as u32
    }

    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// `delay_ms` と `advance` でだけ進む時計
///
/// タイムアウトのテストを実時間に依存せず決定的に書くためのもの。
/// スレッド間で共有できる。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        ManualClock {
            now: AtomicU32::new(start_ms),
        }
    }

    /// 時刻を進める（u32 で一周する）
    pub fn advance(&self, ms: u32) {
        // fetch_add はラップアラウンドする
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u32) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_clock_advances_with_delay() {
        let clock = StdClock::new();
        let before = clock.now_ms();
        clock.delay_ms(5);
        assert!(clock.now_ms().wrapping_sub(before) >= 5);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let clock = ManualClock::new(u32::MAX - 1);
        clock.delay_ms(3);
        assert_eq!(clock.now_ms(), 1);
    }
}
