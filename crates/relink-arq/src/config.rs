//! 信頼配送の設定

use alloc::string::ToString;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{ACK_TIMEOUT_MS, MAX_RETRIES, POLL_INTERVAL_MS, TURNAROUND_MS};
use relink_stream::IDLE_TIMEOUT_MS;

/// タイムアウトと再送の設定
///
/// 省略したフィールドは既定値（クレート定数）になる。
///
/// ```json
/// { "ack_timeout_ms": 250, "max_retries": 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArqConfig {
    /// 1 回の送信で ACK を待つ時間
    pub ack_timeout_ms: u32,
    /// 1 回の配送で行う送信回数の上限（最初の送信を含む、1 以上）
    pub max_retries: u32,
    /// 受信途中のフレームを破棄するまでの無通信時間
    pub idle_timeout_ms: u32,
    /// 応答が無いときのポーリング間隔
    pub poll_interval_ms: u32,
    /// 半二重バスの送信後、応答を読み出すまでの待ち時間
    pub turnaround_ms: u32,
}

impl Default for ArqConfig {
    fn default() -> Self {
        ArqConfig {
            ack_timeout_ms: ACK_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            idle_timeout_ms: IDLE_TIMEOUT_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            turnaround_ms: TURNAROUND_MS,
        }
    }
}

impl ArqConfig {
    /// JSON から読み込み、値を検証する
    ///
    /// # エラー
    /// - `ConfigError::Parse`: JSON として不正、または未知のフィールド
    /// - `ConfigError::Invalid`: [`ArqConfig::validate`] に失敗
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ArqConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 値の範囲を確認する
    ///
    /// 0 のタイムアウトやポーリング間隔はビジーループが時間を進められなくなるので拒否する。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ack_timeout_ms",
                reason: "must be greater than zero",
            });
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_ms",
                reason: "must be greater than zero",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be greater than zero",
            });
        }
        if self.poll_interval_ms > self.ack_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must not exceed ack_timeout_ms",
            });
        }
        Ok(())
    }

    /// 1 回の送信呼び出しで行う送信回数の上限
    ///
    /// 失敗した送信ごとに再送イベントが 1 つ記録されるので、上限まで失敗すると
    /// 再送イベントも `max_retries` 個になる。
    pub fn max_attempts(&self) -> u32 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ArqConfig::default();
        assert_eq!(config.ack_timeout_ms, 1000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.idle_timeout_ms, 500);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_json_partial() {
        let config = ArqConfig::from_json(r#"{"ack_timeout_ms": 250, "max_retries": 5}"#).unwrap();
        assert_eq!(config.ack_timeout_ms, 250);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.idle_timeout_ms, IDLE_TIMEOUT_MS);
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let result = ArqConfig::from_json(r#"{"ack_timeout": 250}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = ArqConfig::from_json(r#"{"poll_interval_ms": 0}"#);
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero",
            })
        );
    }

    #[test]
    fn test_zero_retries_rejected() {
        let result = ArqConfig::from_json(r#"{"max_retries": 0}"#);
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                field: "max_retries",
                reason: "must be greater than zero",
            })
        );
    }

    #[test]
    fn test_single_attempt_allowed() {
        let config = ArqConfig::from_json(r#"{"max_retries": 1}"#).unwrap();
        assert_eq!(config.max_attempts(), 1);
    }
}
