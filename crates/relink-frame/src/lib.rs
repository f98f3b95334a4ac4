//! # relink-frame
//!
//! relink のワイヤフォーマット。
//!
//! 固定長フレームのレイアウト、CRC-CCITT チェックサム、シーケンス番号を振る
//! コーデックを提供する。
//!
//! ## Frame の Wire Format（リトルエンディアン、パディングなし）
//!
//! ```text
//! offset  size  field
//!      0     1  start marker (0xAA)
//!      1     1  packet kind  (DATA=0x01, ACK=0x02, NACK=0x03)
//!      2     2  sequence number (u16 LE)
//!      4     2  payload length  (u16 LE, <= 53)
//!      6    53  payload (length 以降はゼロ埋め)
//!     59     2  CRC-16/CCITT (u16 LE)
//!     61     1  end marker (0x55)
//! ```
//!
//! CRC は `[packet kind .. payload[length])`、つまりワイヤ上の
//! `bytes[1 .. 6 + length]` に対して計算する。マーカーと CRC 自身は含まない。
//! 対象は 5 + length バイト（kind 1 + sequence 2 + length 2 + payload）で、
//! length フィールドは 2 バイトとも含む。

#![no_std]

pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;

pub use codec::FrameCodec;
pub use error::FrameError;
pub use frame::{Frame, PacketKind};

/// フレーム先頭のマーカー
pub const START_MARKER: u8 = 0xAA;

/// フレーム末尾のマーカー
pub const END_MARKER: u8 = 0x55;

/// ペイロード領域のバイト数
pub const MAX_PAYLOAD: usize = 53;

/// CRC の対象になるヘッダー部（kind + seq + length）のバイト数
pub const CHECKED_HEADER_LEN: usize = 1 + 2 + 2;

/// フレーム全体のバイト数
///
/// start(1) + kind(1) + seq(2) + length(2) + payload(53) + crc(2) + end(1) = 62
pub const FRAME_LEN: usize = 1 + CHECKED_HEADER_LEN + MAX_PAYLOAD + 2 + 1;

const _: () = assert!(FRAME_LEN == 62);
