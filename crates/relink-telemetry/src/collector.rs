//! 通信統計コレクタ本体

use tracing::{debug, warn};

use crate::clock::Millis;
use crate::snapshot::TelemetrySnapshot;
use crate::{LATENCY_MAX_MS, LATENCY_MIN_MS, LATENCY_WINDOW, PENDING_SLOTS};

/// 直近のレイテンシサンプルを保持する循環バッファ
///
/// 上書き前に古いサンプルの寄与を合計から差し引くので、`total` は常に
/// バッファ内サンプルの合計と一致する。
#[derive(Debug, Clone)]
struct LatencyWindow {
    samples: [u32; LATENCY_WINDOW],
    /// 次に書き込むスロット
    index: usize,
    /// 書き込み済みスロット数（最大 LATENCY_WINDOW）
    filled: usize,
    total: u64,
    min: Option<u32>,
    max: Option<u32>,
    last: u32,
}

impl LatencyWindow {
    const fn new() -> Self {
        LatencyWindow {
            samples: [0; LATENCY_WINDOW],
            index: 0,
            filled: 0,
            total: 0,
            min: None,
            max: None,
            last: 0,
        }
    }

    fn push(&mut self, latency: u32) {
        self.total -= u64::from(self.samples[self.index]);
        self.samples[self.index] = latency;
        self.total += u64::from(latency);

        self.min = Some(self.min.map_or(latency, |m| m.min(latency)));
        self.max = Some(self.max.map_or(latency, |m| m.max(latency)));
        self.last = latency;

        self.index = (self.index + 1) % LATENCY_WINDOW;
        if self.filled < LATENCY_WINDOW {
            self.filled += 1;
        }
    }

    fn buffered(&self) -> &[u32] {
        // 一周するまでは先頭から filled 個、一周後は全スロットが有効
        &self.samples[..self.filled]
    }

    fn mean(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        self.total as f64 / self.filled as f64
    }
}

/// エンドポイント 1 つ分の通信統計
///
/// エンドポイントの生存期間中（または [`Telemetry::reset`] まで）蓄積する。
/// カウンタはすべて飽和加算で、オーバーフローしない。
#[derive(Debug, Clone)]
pub struct Telemetry {
    bytes_sent: u64,
    bytes_received: u64,
    packets_sent: u32,
    packets_received: u32,
    /// スループット計算の起点
    origin: Millis,

    latency: LatencyWindow,

    lost_packets: u32,
    sequence_errors: u32,
    checksum_errors: u32,
    timeouts: u32,
    retransmissions: u32,

    /// `seq mod PENDING_SLOTS` → 送信時刻
    pending: [Option<Millis>; PENDING_SLOTS],
}

impl Telemetry {
    /// 新しいコレクタを生成する
    ///
    /// # 引数
    /// - `now_ms`: 現在時刻。スループット・パケットレートの経過時間の起点になる。
    pub fn new(now_ms: u32) -> Self {
        Telemetry {
            bytes_sent: 0,
            bytes_received: 0,
            packets_sent: 0,
            packets_received: 0,
            origin: Millis(now_ms),
            latency: LatencyWindow::new(),
            lost_packets: 0,
            sequence_errors: 0,
            checksum_errors: 0,
            timeouts: 0,
            retransmissions: 0,
            pending: [None; PENDING_SLOTS],
        }
    }

    /// すべてのカウンタ・レイテンシバッファ・送信時刻テーブルをクリアし、
    /// 経過時間の起点を `now_ms` に取り直す
    pub fn reset(&mut self, now_ms: u32) {
        *self = Telemetry::new(now_ms);
    }

    // ===== 送受信 =====

    /// パケットを 1 つ送信した
    pub fn on_packet_sent(&mut self, size: usize) {
        self.packets_sent = self.packets_sent.saturating_add(1);
        self.bytes_sent = self.bytes_sent.saturating_add(size as u64);
    }

    /// パケットを 1 つ受信した
    pub fn on_packet_received(&mut self, size: usize) {
        self.packets_received = self.packets_received.saturating_add(1);
        self.bytes_received = self.bytes_received.saturating_add(size as u64);
    }

    // ===== レイテンシ =====

    /// `seq` の送信時刻を記録する
    pub fn start_latency(&mut self, seq: u16, now_ms: u32) {
        self.pending[Self::slot(seq)] = Some(Millis(now_ms));
    }

    /// `seq` の応答を受け取った時刻を記録し、レイテンシを計算する
    ///
    /// # 戻り値
    /// - `Some(ms)`: 循環バッファに記録されたサンプル
    /// - `None`: 開始時刻が無い、または `[LATENCY_MIN_MS, LATENCY_MAX_MS]` の範囲外で破棄した
    pub fn end_latency(&mut self, seq: u16, now_ms: u32) -> Option<u32> {
        // 同じ送信を二重に計測しないよう、結果に関わらずスロットは空にする
        let started = self.pending[Self::slot(seq)].take();
        let Some(started) = started else {
            warn!(seq, "latency end without a matching start");
            return None;
        };

        let latency = Millis(now_ms).elapsed_since(started);
        if !(LATENCY_MIN_MS..=LATENCY_MAX_MS).contains(&latency) {
            warn!(seq, latency_ms = latency, "ignoring abnormal latency sample");
            return None;
        }

        self.latency.push(latency);
        debug!(seq, latency_ms = latency, "latency sample recorded");
        Some(latency)
    }

    // ===== エラー =====

    /// 再送上限に達しても ACK が得られなかった
    pub fn on_loss(&mut self, seq: u16) {
        debug!(seq, "packet lost");
        self.lost_packets = self.lost_packets.saturating_add(1);
    }

    /// 期待と異なるシーケンス番号の応答を受け取った
    pub fn on_sequence_error(&mut self, expected: u16, actual: u16) {
        debug!(expected, actual, "sequence mismatch");
        self.sequence_errors = self.sequence_errors.saturating_add(1);
    }

    pub fn on_checksum_error(&mut self) {
        self.checksum_errors = self.checksum_errors.saturating_add(1);
    }

    pub fn on_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
    }

    pub fn on_retransmission(&mut self) {
        self.retransmissions = self.retransmissions.saturating_add(1);
    }

    // ===== 派生メトリクス =====

    /// 起点からの経過ミリ秒
    pub fn elapsed_ms(&self, now_ms: u32) -> u32 {
        Millis(now_ms).elapsed_since(self.origin)
    }

    /// 送信スループット（kbps、1 kb = 1024 bit）
    pub fn throughput_kbps(&self, now_ms: u32) -> f64 {
        let elapsed = self.elapsed_ms(now_ms);
        if elapsed == 0 {
            return 0.0;
        }
        let bits = self.bytes_sent as f64 * 8.0;
        let seconds = f64::from(elapsed) / 1000.0;
        bits / seconds / 1024.0
    }

    /// 送信パケットレート（packets/s）
    pub fn packet_rate(&self, now_ms: u32) -> f64 {
        let elapsed = self.elapsed_ms(now_ms);
        if elapsed == 0 {
            return 0.0;
        }
        f64::from(self.packets_sent) / (f64::from(elapsed) / 1000.0)
    }

    /// バッファ内サンプルの平均レイテンシ（ms）
    pub fn average_latency_ms(&self) -> f64 {
        self.latency.mean()
    }

    /// 最小レイテンシ（ms）。サンプルが無ければ 0
    pub fn min_latency_ms(&self) -> u32 {
        self.latency.min.unwrap_or(0)
    }

    /// 最大レイテンシ（ms）。サンプルが無ければ 0
    pub fn max_latency_ms(&self) -> u32 {
        self.latency.max.unwrap_or(0)
    }

    pub fn last_latency_ms(&self) -> u32 {
        self.latency.last
    }

    /// バッファ内の有効サンプル数
    pub fn latency_samples(&self) -> usize {
        self.latency.filled
    }

    /// ジッタの近似値（ms）
    ///
    /// 最小/最大レイテンシの差の半分。分散ではなく粗い目安。
    /// サンプルが 2 個未満なら 0。
    pub fn jitter_ms(&self) -> f64 {
        match (self.latency.min, self.latency.max) {
            (Some(min), Some(max)) if self.latency.filled >= 2 => f64::from(max - min) / 2.0,
            _ => 0.0,
        }
    }

    /// バッファ内サンプルの平均絶対偏差（ms）
    ///
    /// [`Telemetry::jitter_ms`] と違い、外れ値 1 つに引きずられない。
    pub fn latency_mean_deviation_ms(&self) -> f64 {
        let samples = self.latency.buffered();
        if samples.len() < 2 {
            return 0.0;
        }
        let mean = self.latency.mean();
        let sum: f64 = samples
            .iter()
            .map(|&s| {
                let d = f64::from(s) - mean;
                if d < 0.0 {
                    -d
                } else {
                    d
                }
            })
            .sum();
        sum / samples.len() as f64
    }

    /// パケットロス率（%、送信パケット数に対する割合）
    pub fn loss_rate(&self) -> f64 {
        percent(self.lost_packets, self.packets_sent)
    }

    /// エラー率（%、チェックサム + シーケンスエラーの受信パケット数に対する割合）
    pub fn error_rate(&self) -> f64 {
        let errors = self.checksum_errors.saturating_add(self.sequence_errors);
        percent(errors, self.packets_received)
    }

    /// 成功率（%）
    ///
    /// `(送信 - 再送 - ロス) / 送信`。再送やロスが送信数を超えても 0 で止まる。
    pub fn success_rate(&self) -> f64 {
        let successful = self
            .packets_sent
            .saturating_sub(self.retransmissions)
            .saturating_sub(self.lost_packets);
        percent(successful, self.packets_sent)
    }

    // ===== カウンタ =====

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn packets_received(&self) -> u32 {
        self.packets_received
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn lost_packets(&self) -> u32 {
        self.lost_packets
    }

    pub fn sequence_errors(&self) -> u32 {
        self.sequence_errors
    }

    pub fn checksum_errors(&self) -> u32 {
        self.checksum_errors
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn retransmissions(&self) -> u32 {
        self.retransmissions
    }

    /// 現在の統計をシリアライズ可能な形で取り出す
    pub fn snapshot(&self, now_ms: u32) -> TelemetrySnapshot {
        TelemetrySnapshot {
            elapsed_ms: self.elapsed_ms(now_ms),
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            throughput_kbps: self.throughput_kbps(now_ms),
            packet_rate: self.packet_rate(now_ms),
            average_latency_ms: self.average_latency_ms(),
            min_latency_ms: self.min_latency_ms(),
            max_latency_ms: self.max_latency_ms(),
            last_latency_ms: self.last_latency_ms(),
            jitter_ms: self.jitter_ms(),
            latency_mean_deviation_ms: self.latency_mean_deviation_ms(),
            lost_packets: self.lost_packets,
            sequence_errors: self.sequence_errors,
            checksum_errors: self.checksum_errors,
            timeouts: self.timeouts,
            retransmissions: self.retransmissions,
            loss_rate: self.loss_rate(),
            error_rate: self.error_rate(),
            success_rate: self.success_rate(),
        }
    }

    fn slot(seq: u16) -> usize {
        usize::from(seq) % PENDING_SLOTS
    }
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(whole) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        let d = a - b;
        d < 1e-9 && d > -1e-9
    }

    #[test]
    fn test_new_is_empty() {
        let t = Telemetry::new(0);
        assert_eq!(t.packets_sent(), 0);
        assert_eq!(t.latency_samples(), 0);
        assert_eq!(t.min_latency_ms(), 0);
        assert_eq!(t.max_latency_ms(), 0);
        assert!(approx(t.success_rate(), 0.0));
        assert!(approx(t.throughput_kbps(0), 0.0));
    }

    #[test]
    fn test_packet_counters() {
        let mut t = Telemetry::new(0);
        t.on_packet_sent(62);
        t.on_packet_sent(62);
        t.on_packet_received(62);
        assert_eq!(t.packets_sent(), 2);
        assert_eq!(t.bytes_sent(), 124);
        assert_eq!(t.packets_received(), 1);
        assert_eq!(t.bytes_received(), 62);
    }

    #[test]
    fn test_latency_roundtrip() {
        let mut t = Telemetry::new(0);
        t.start_latency(7, 1000);
        assert_eq!(t.end_latency(7, 1042), Some(42));
        assert_eq!(t.latency_samples(), 1);
        assert_eq!(t.min_latency_ms(), 42);
        assert_eq!(t.max_latency_ms(), 42);
        assert_eq!(t.last_latency_ms(), 42);
        assert!(approx(t.average_latency_ms(), 42.0));
    }

    #[test]
    fn test_latency_slot_is_cleared_after_end() {
        let mut t = Telemetry::new(0);
        t.start_latency(3, 100);
        assert_eq!(t.end_latency(3, 150), Some(50));
        // 2 回目の end は開始時刻が無いので記録しない
        assert_eq!(t.end_latency(3, 200), None);
        assert_eq!(t.latency_samples(), 1);
    }

    #[test]
    fn test_latency_zero_is_discarded() {
        let mut t = Telemetry::new(0);
        t.start_latency(1, 500);
        t.end_latency(1, 510);

        t.start_latency(2, 600);
        assert_eq!(t.end_latency(2, 600), None);

        assert_eq!(t.latency_samples(), 1);
        assert_eq!(t.min_latency_ms(), 10);
        assert_eq!(t.max_latency_ms(), 10);
    }

    #[test]
    fn test_latency_above_window_is_discarded() {
        let mut t = Telemetry::new(0);
        t.start_latency(1, 0);
        assert_eq!(t.end_latency(1, LATENCY_MAX_MS + 1), None);
        assert_eq!(t.latency_samples(), 0);
        assert_eq!(t.max_latency_ms(), 0);

        // 上限ちょうどは有効
        t.start_latency(2, 0);
        assert_eq!(t.end_latency(2, LATENCY_MAX_MS), Some(LATENCY_MAX_MS));
    }

    #[test]
    fn test_latency_across_clock_wrap() {
        let mut t = Telemetry::new(0);
        t.start_latency(9, u32::MAX - 4);
        // 5 ms でカウンタが一周して 0、さらに 15 ms 経過
        assert_eq!(t.end_latency(9, 15), Some(20));
    }

    #[test]
    fn test_pending_table_aliases_mod_256() {
        let mut t = Telemetry::new(0);
        t.start_latency(1, 100);
        // 257 は 1 と同じスロット: 後勝ち
        t.start_latency(257, 300);
        assert_eq!(t.end_latency(1, 310), Some(10));
    }

    #[test]
    fn test_circular_buffer_evicts_oldest() {
        let mut t = Telemetry::new(0);
        // 1 個目だけ 1000 ms、残りは 10 ms
        t.start_latency(0, 0);
        t.end_latency(0, 1000);
        for seq in 1..=LATENCY_WINDOW as u16 {
            t.start_latency(seq, 0);
            t.end_latency(seq, 10);
        }
        // 1000 ms のサンプルは押し出され、平均は 10 ms
        assert_eq!(t.latency_samples(), LATENCY_WINDOW);
        assert!(approx(t.average_latency_ms(), 10.0));
        // min/max はリセットまで保持される
        assert_eq!(t.max_latency_ms(), 1000);
        assert_eq!(t.min_latency_ms(), 10);
    }

    #[test]
    fn test_jitter_is_half_spread() {
        let mut t = Telemetry::new(0);
        t.start_latency(1, 0);
        t.end_latency(1, 10);
        assert!(approx(t.jitter_ms(), 0.0)); // サンプル 1 個では 0

        t.start_latency(2, 0);
        t.end_latency(2, 30);
        assert!(approx(t.jitter_ms(), 10.0));
    }

    #[test]
    fn test_mean_deviation_differs_from_half_spread() {
        // 10, 10, 10, 50: 半幅は 20 だが平均絶対偏差は 15
        let mut t = Telemetry::new(0);
        for (seq, lat) in [(1u16, 10u32), (2, 10), (3, 10), (4, 50)] {
            t.start_latency(seq, 0);
            t.end_latency(seq, lat);
        }
        assert!(approx(t.jitter_ms(), 20.0));
        assert!(approx(t.latency_mean_deviation_ms(), 15.0));
    }

    #[test]
    fn test_success_rate() {
        let mut t = Telemetry::new(0);
        for _ in 0..10 {
            t.on_packet_sent(62);
        }
        t.on_loss(1);
        t.on_loss(2);
        t.on_retransmission();
        assert!(approx(t.success_rate(), 70.0));
        assert!(approx(t.loss_rate(), 20.0));
    }

    #[test]
    fn test_success_rate_does_not_underflow() {
        let mut t = Telemetry::new(0);
        t.on_packet_sent(62);
        for _ in 0..3 {
            t.on_retransmission();
        }
        t.on_loss(0);
        assert!(approx(t.success_rate(), 0.0));
    }

    #[test]
    fn test_error_rate() {
        let mut t = Telemetry::new(0);
        for _ in 0..4 {
            t.on_packet_received(62);
        }
        t.on_checksum_error();
        t.on_sequence_error(5, 6);
        assert!(approx(t.error_rate(), 50.0));
    }

    #[test]
    fn test_throughput_and_packet_rate() {
        let mut t = Telemetry::new(1000);
        // 128 バイト = 1024 bit を 1 秒で送信 → 1 kbps
        t.on_packet_sent(64);
        t.on_packet_sent(64);
        assert!(approx(t.throughput_kbps(2000), 1.0));
        assert!(approx(t.packet_rate(2000), 2.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut t = Telemetry::new(0);
        t.on_packet_sent(62);
        t.on_checksum_error();
        t.on_timeout();
        t.start_latency(1, 0);
        t.end_latency(1, 5);
        t.start_latency(2, 0);

        t.reset(10_000);
        assert_eq!(t.packets_sent(), 0);
        assert_eq!(t.checksum_errors(), 0);
        assert_eq!(t.timeouts(), 0);
        assert_eq!(t.latency_samples(), 0);
        assert_eq!(t.elapsed_ms(10_500), 500);
        // 送信時刻テーブルもクリアされている
        assert_eq!(t.end_latency(2, 10_010), None);
    }
}
