//! # relink-arq
//!
//! ACK/NACK による信頼配送（stop-and-wait ARQ）。
//!
//! ## 概要
//!
//! 送信側は DATA フレームを 1 つ送り、同じシーケンス番号の ACK を待つ。
//! タイムアウト・NACK・破損応答のときは同じバイト列を再送する（シーケンス番号は振り直さない）。
//! 送信回数の上限（3 回）に達したらロスとして呼び出し側に返す。
//!
//! ### キーコンセプト
//!
//! - **同時に飛んでいる DATA は 1 つだけ**: 送信処理は `&mut self` を取るので、
//!   完了（成功か上限到達）するまで次のフレームは作れない
//! - **待機はすべて期限付きのビジーポーリング**: 時刻は [`Clock`] から読み、差分は mod 2^32
//! - **トランスポートは 2 種類**: バイトストリーム（[`ByteLink`]）と
//!   半二重のクロック同期バス（[`ExchangeLink`]）。どちらも同じ再送ポリシーに従う
//!
//! ## 送信の流れ
//!
//! ```text
//! build DATA(seq=N) → transmit → wait ≤ 1000ms ─┬─ ACK(N)   → 成功
//!          ▲                                    ├─ NACK(N)  ┐
//!          │                                    └─ timeout  ┤
//!          └──── retransmission (送信は計 3 回まで) ◀───────────────┘
//!                                                 上限到達 → timeout + loss → Exhausted
//! ```

#![no_std]
extern crate alloc;

pub mod config;
pub mod endpoint;
pub mod error;
pub mod link;
pub mod responder;
pub mod sender;

pub use config::ArqConfig;
pub use endpoint::{BusMaster, SerialEndpoint};
pub use error::{ConfigError, DeliveryError, LinkError};
pub use link::{BusChannel, ByteLink, Clock, ExchangeLink, FrameChannel, SerialChannel};
pub use responder::{respond, DataSink, Response};
pub use sender::{deliver, send_frame, Delivery};

/// ACK 待ちのタイムアウト（ミリ秒）
pub const ACK_TIMEOUT_MS: u32 = 1000;

/// 1 回の配送で行う送信回数の上限（最初の送信を含む）
pub const MAX_RETRIES: u32 = 3;

/// 応答ポーリングの間隔（ミリ秒）
pub const POLL_INTERVAL_MS: u32 = 1;

/// 半二重バスで送信してから応答を読み出すまでの待ち時間（ミリ秒）
pub const TURNAROUND_MS: u32 = 2;
