//! # relink
//!
//! シリアル回線や半二重バスの上で固定長フレームを確実に届ける point-to-point トランスポート。
//!
//! このクレートはホスト（std）側の入口で、各クレートの再エクスポートに加えて
//! ログ初期化・std の時計・テスト用のメモリ内リンクを提供する。
//! マイコン向けには `relink-arq` 以下の `no_std` クレートを直接使う。
//!
//! ## 構成
//!
//! ```text
//! relink
//!   ├── relink-arq       - 再送制御・応答処理・エンドポイント・設定
//!   ├── relink-stream    - バイトストリームからのフレーム再同期
//!   ├── relink-frame     - ワイヤフォーマット・CRC・シーケンス番号
//!   └── relink-telemetry - 遅延・スループット・エラー統計
//! ```
//!
//! ## 使用例
//!
//! ```no_run
//! use relink::{ArqConfig, SerialEndpoint, StdClock};
//! use relink::sim::Loopback;
//!
//! relink::logging::init_logging("relink=debug").ok();
//!
//! let (near, _far) = Loopback::pair();
//! let mut endpoint = SerialEndpoint::new(near, StdClock::new(), ArqConfig::default())?;
//! match endpoint.send_payload(b"hello") {
//!     Ok(delivery) => println!("delivered seq {}", delivery.sequence),
//!     Err(e) => eprintln!("{e}"),
//! }
//! println!("{}", endpoint.snapshot());
//! # Ok::<(), relink::ConfigError>(())
//! ```

pub mod clock;
pub mod logging;
pub mod sim;

pub use clock::StdClock;

pub use relink_arq::{
    deliver, respond, send_frame, ArqConfig, BusChannel, BusMaster, ByteLink, Clock,
    ConfigError, DataSink, Delivery, DeliveryError, ExchangeLink, FrameChannel, LinkError,
    Response, SerialChannel, SerialEndpoint,
};
pub use relink_frame::{crc, Frame, FrameCodec, FrameError, PacketKind, FRAME_LEN, MAX_PAYLOAD};
pub use relink_stream::{ReceiverState, StreamError, StreamReceiver};
pub use relink_telemetry::{Millis, Telemetry, TelemetrySnapshot};
