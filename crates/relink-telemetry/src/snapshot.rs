//! 統計情報のスナップショット（JSON 出力・レポート表示用）

use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};

/// ある時点の統計値
///
/// [`crate::Telemetry::snapshot`] で取得する。JSON に変換して外部へ渡すか、
/// `Display` でそのまま人間向けのレポートとして表示する。
///
/// ```json
/// {
///   "elapsed_ms": 12000,
///   "packets_sent": 120,
///   "throughput_kbps": 4.84,
///   "average_latency_ms": 12.5,
///   "success_rate": 97.5
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// 計測開始（またはリセット）からの経過ミリ秒
    pub elapsed_ms: u32,
    pub packets_sent: u32,
    pub packets_received: u32,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub throughput_kbps: f64,
    pub packet_rate: f64,
    pub average_latency_ms: f64,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub last_latency_ms: u32,
    /// 最小/最大の差の半分（近似値）
    pub jitter_ms: f64,
    pub latency_mean_deviation_ms: f64,
    pub lost_packets: u32,
    pub sequence_errors: u32,
    pub checksum_errors: u32,
    pub timeouts: u32,
    pub retransmissions: u32,
    pub loss_rate: f64,
    pub error_rate: f64,
    pub success_rate: f64,
}

impl TelemetrySnapshot {
    /// JSON 文字列に変換する
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "throughput: {} sent / {} received, {:.2} kbps, {:.2} packets/s",
            self.packets_sent,
            self.packets_received,
            self.throughput_kbps,
            self.packet_rate
        )?;
        writeln!(
            f,
            "latency: avg {:.2} ms, min {} ms, max {} ms, jitter {:.2} ms",
            self.average_latency_ms,
            self.min_latency_ms,
            self.max_latency_ms,
            self.jitter_ms
        )?;
        writeln!(
            f,
            "errors: loss {:.2}%, crc {}, sequence {}, timeouts {}, retransmissions {}",
            self.loss_rate,
            self.checksum_errors,
            self.sequence_errors,
            self.timeouts,
            self.retransmissions
        )?;
        write!(
            f,
            "success rate: {:.2}% over {:.1} s",
            self.success_rate,
            f64::from(self.elapsed_ms) / 1000.0
        )
    }
}
