//! relink-arq エラー型

use alloc::string::String;

use relink_frame::FrameError;
use thiserror::Error;

/// 物理トランスポート（外部ドライバ）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// 書き込めたバイト数がフレーム長に満たない
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    /// ドライバ固有の I/O エラー
    #[error("link I/O error: {0}")]
    Io(&'static str),
    /// リンクが閉じている
    #[error("link closed")]
    Closed,
}

/// 送受信処理のエラー
///
/// 再送で回復できるもの（タイムアウト、NACK、破損応答）はここには出てこない。
/// 呼び出し側に届くのは構築エラー・リンクエラー・再送上限到達だけ。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// フレームを組み立てられない（ペイロード超過など）。送信前に拒否される
    #[error("cannot build frame: {0}")]
    Frame(#[from] FrameError),
    /// トランスポートが失敗した
    #[error(transparent)]
    Link(#[from] LinkError),
    /// 再送上限まで試したが ACK が得られなかった
    #[error("frame {sequence} lost after {attempts} attempts")]
    Exhausted { sequence: u16, attempts: u32 },
}

/// 設定値のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// JSON として解釈できない
    #[error("invalid config JSON: {0}")]
    Parse(String),
    /// 値が範囲外
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}
