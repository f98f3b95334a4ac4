//! ログ出力の初期化
//!
//! ライブラリ側は `tracing` のマクロを呼ぶだけで、出力先は決めない。
//! ホストのアプリやテストはここで subscriber を一度だけ登録する。

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` が無いときに使うフィルタ
pub const DEFAULT_FILTER: &str = "relink=info,relink_arq=info";

#[derive(Debug, Error)]
pub enum LoggingError {
    /// フィルタ文字列が不正
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// すでに別の subscriber が登録されている
    #[error("global subscriber already set: {0}")]
    AlreadySet(#[from] TryInitError),
}

/// コンソールへのログ出力を有効にする
///
/// `RUST_LOG` が設定されていればそちらを優先し、無ければ `filter` を使う。
/// 2 回目以降の呼び出しは `LoggingError::AlreadySet` を返す（テストでは無視してよい）。
///
/// # 引数
/// - `filter`: `EnvFilter` 形式（例: `"relink_arq=debug,relink_stream=trace"`）
pub fn init_logging(filter: &str) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .finish()
        .try_init()?;

    tracing::debug!(filter, "logging initialised");
    Ok(())
}

/// [`DEFAULT_FILTER`] で [`init_logging`] を呼ぶ
pub fn init_default_logging() -> Result<(), LoggingError> {
    init_logging(DEFAULT_FILTER)
}
