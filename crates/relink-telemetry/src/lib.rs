//! # relink-telemetry
//!
//! エンドポイントごとの通信統計コレクタ。
//!
//! 他のコンポーネント（Frame Codec、Reliable Delivery Controller）から明示的に
//! 呼び出されて記録するだけで、自分からポーリングすることはない。
//!
//! ## 記録する内容
//!
//! - 送受信したパケット数・バイト数
//! - 直近 [`LATENCY_WINDOW`] 個の有効なレイテンシサンプル（循環バッファ）と最小/最大値
//! - ロス・シーケンスエラー・チェックサムエラー・タイムアウト・再送の各カウンタ
//! - `seq mod 256` をキーにした送信時刻テーブル（ACK と送信時刻の対応付け用）
//!
//! ## 時刻
//!
//! 時刻はすべて呼び出し側が `now_ms: u32`（ラップアラウンドするミリ秒カウンタ）として渡す。
//! 差分は [`Millis::elapsed_since`] で mod 2^32 として計算する。

#![no_std]
extern crate alloc;

pub mod clock;
pub mod collector;
pub mod snapshot;

pub use clock::Millis;
pub use collector::Telemetry;
pub use snapshot::TelemetrySnapshot;

/// レイテンシ循環バッファのサンプル数
pub const LATENCY_WINDOW: usize = 50;

/// 送信時刻テーブルのスロット数（`seq mod PENDING_SLOTS` で参照する）
///
/// 同時に飛んでいるフレームは常に 1 つなのでエイリアシングは起きない。
pub const PENDING_SLOTS: usize = 256;

/// 有効なレイテンシサンプルの下限（ミリ秒、この値を含む）
pub const LATENCY_MIN_MS: u32 = 1;

/// 有効なレイテンシサンプルの上限（ミリ秒、この値を含む）
pub const LATENCY_MAX_MS: u32 = 5000;
