//! relink-stream エラー型

use thiserror::Error;

/// フレーム境界の再同期で検出したエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// フレーム長ぶん受信したが末尾マーカーが一致しない
    #[error("framing error: expected end marker, found 0x{found:02X}")]
    BadEndMarker { found: u8 },
}
