//! relink-frame エラー型

use thiserror::Error;

/// フレームの構築・解釈のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// ペイロードが最大長を超えている
    #[error("payload of {len} bytes exceeds the {max}-byte frame capacity")]
    PayloadTooLarge { len: usize, max: usize },
    /// 未定義のパケット種別
    #[error("unknown packet kind 0x{0:02X}")]
    UnknownKind(u8),
    /// バイト列の長さがフレーム長と一致しない
    #[error("expected {expected} bytes for a frame, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}
