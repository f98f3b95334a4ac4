//! ラップアラウンドするミリ秒時刻
//!
//! マイコンの `millis()` 相当の 32 ビットカウンタは約 49.7 日で一周する。
//! 経過時間は常に mod 2^32 の差分として計算し、大小比較はしない。

/// 32 ビットのミリ秒時刻
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Millis(pub u32);

impl Millis {
    /// `earlier` からの経過ミリ秒を返す（オーバーフローを考慮）
    ///
    /// `self` が数値的に `earlier` より小さければカウンタが一周したとみなす。
    pub fn elapsed_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// `earlier` から `interval_ms` より長く経過したか
    pub fn has_exceeded(self, earlier: Self, interval_ms: u32) -> bool {
        self.elapsed_since(earlier) > interval_ms
    }

    /// `delta_ms` 後の時刻（ラップアラウンドする）
    pub fn offset(self, delta_ms: u32) -> Self {
        Millis(self.0.wrapping_add(delta_ms))
    }

    /// 生の u32 値を返す
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Millis {
    fn from(val: u32) -> Self {
        Millis(val)
    }
}
