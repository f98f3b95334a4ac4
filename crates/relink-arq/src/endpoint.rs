//! トランスポートごとのエンドポイント
//!
//! コーデック・チャンネル・時計・設定を 1 つにまとめ、アプリ向けの
//! `send_payload` / `poll` を提供する。

use relink_frame::{FrameCodec, FRAME_LEN};
use relink_telemetry::{Telemetry, TelemetrySnapshot};
use tracing::info;

use crate::config::ArqConfig;
use crate::error::{ConfigError, DeliveryError};
use crate::link::{BusChannel, ByteLink, Clock, ExchangeLink, FrameChannel, SerialChannel};
use crate::responder::{respond, DataSink, Response};
use crate::sender::{deliver, Delivery};

/// バイトストリーム上のエンドポイント（送信・受信の両方を担う）
///
/// ## 使用例
///
/// ```ignore
/// let mut endpoint = SerialEndpoint::new(uart, clock, ArqConfig::default())?;
/// endpoint.send_payload(b"hello")?;
///
/// // 受信側はメインループから poll する
/// endpoint.poll(&mut |payload: &[u8]| handle(payload))?;
/// ```
pub struct SerialEndpoint<L: ByteLink, C: Clock> {
    codec: FrameCodec,
    channel: SerialChannel<L>,
    clock: C,
    config: ArqConfig,
}

impl<L: ByteLink, C: Clock> SerialEndpoint<L, C> {
    /// エンドポイントを生成する
    ///
    /// # エラー
    /// `config` が [`ArqConfig::validate`] を通らない場合
    pub fn new(link: L, clock: C, config: ArqConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = FrameCodec::new(clock.now_ms());
        info!(?config, "serial endpoint ready");
        Ok(SerialEndpoint {
            codec,
            channel: SerialChannel::new(link, config.idle_timeout_ms),
            clock,
            config,
        })
    }

    /// ペイロードを信頼配送する
    ///
    /// ACK を受け取るか再送上限に達するまで戻らない。
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<Delivery, DeliveryError> {
        deliver(
            &mut self.codec,
            &mut self.channel,
            &self.clock,
            &self.config,
            payload,
        )
    }

    /// 届いているバイトを処理し、完成したフレーム 1 つに応答する
    ///
    /// # 戻り値
    /// - `Ok(Some(response))`: フレームを 1 つ処理した（ACK / NACK は送信済み）
    /// - `Ok(None)`: まだフレームが揃っていない
    pub fn poll<S>(&mut self, sink: &mut S) -> Result<Option<Response>, DeliveryError>
    where
        S: DataSink + ?Sized,
    {
        let now = self.clock.now_ms();
        let Some(frame) = self.channel.poll_frame(now)? else {
            return Ok(None);
        };
        self.codec.telemetry_mut().on_packet_received(FRAME_LEN);

        let response = respond(&mut self.codec, &frame, sink)?;
        if let Some(reply) = response.reply() {
            self.channel.transmit(&reply)?;
        }
        Ok(Some(response))
    }

    pub fn telemetry(&self) -> &Telemetry {
        self.codec.telemetry()
    }

    /// 現在時刻での統計スナップショット
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.codec.telemetry().snapshot(self.clock.now_ms())
    }

    /// 統計をリセットし、計測起点を今にする
    pub fn reset_telemetry(&mut self) {
        let now = self.clock.now_ms();
        self.codec.telemetry_mut().reset(now);
    }

    pub fn config(&self) -> &ArqConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn link(&self) -> &L {
        self.channel.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.channel.link_mut()
    }
}

/// 半二重バスのマスター側エンドポイント
///
/// バスはマスターが駆動するので、受信側（スレーブ）の実装はトランスポートドライバの責任。
pub struct BusMaster<X: ExchangeLink, C: Clock> {
    codec: FrameCodec,
    channel: BusChannel<X>,
    clock: C,
    config: ArqConfig,
}

impl<X: ExchangeLink, C: Clock> BusMaster<X, C> {
    pub fn new(link: X, clock: C, config: ArqConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = FrameCodec::new(clock.now_ms());
        info!(?config, "bus master ready");
        Ok(BusMaster {
            codec,
            channel: BusChannel::new(link, config.turnaround_ms),
            clock,
            config,
        })
    }

    /// ペイロードを信頼配送する（再送ポリシーはシリアルと同じ）
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<Delivery, DeliveryError> {
        deliver(
            &mut self.codec,
            &mut self.channel,
            &self.clock,
            &self.config,
            payload,
        )
    }

    pub fn telemetry(&self) -> &Telemetry {
        self.codec.telemetry()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.codec.telemetry().snapshot(self.clock.now_ms())
    }

    pub fn reset_telemetry(&mut self) {
        let now = self.clock.now_ms();
        self.codec.telemetry_mut().reset(now);
    }

    pub fn config(&self) -> &ArqConfig {
        &self.config
    }

    pub fn link(&self) -> &X {
        self.channel.link()
    }

    pub fn link_mut(&mut self) -> &mut X {
        self.channel.link_mut()
    }
}
