//! # relink-stream
//!
//! 連続したバイトストリームから固定長フレームを切り出す受信状態機械。
//!
//! ## 設計の背景
//!
//! シリアル回線ではバイトの欠落・ノイズ・途中からの受信開始が起こりうる。
//! このクレートはフレーム境界の再同期だけを担当し、チェックサムは見ない。
//! 切り出したフレームの検証は下流の `relink_frame::FrameCodec` が行う。
//!
//! ```text
//!            byte == 0xAA
//!   WaitingForStart ─────────────▶ AccumulatingFrame
//!         ▲  │ other byte                 │
//!         │  └─(discard)                  │ FRAME_LEN bytes buffered
//!         │                               ▼
//!         └──── end marker ok → Frame / bad → BadEndMarker
//!         └──── idle > 500 ms → partial frame dropped
//! ```

#![no_std]

pub mod error;
pub mod receiver;

pub use error::StreamError;
pub use receiver::{ReceiverState, StreamReceiver};

/// 受信途中のフレームを破棄するまでの無通信時間（ミリ秒）
pub const IDLE_TIMEOUT_MS: u32 = 500;
