//! 受信側の応答処理
//!
//! トランスポートは持たず、受け取ったフレーム 1 つを「アプリへ渡して ACK」「NACK」
//! 「捨てる」のどれかに振り分けるだけ。送信は呼び出し側（[`crate::SerialEndpoint`]）が行う。

use relink_frame::{Frame, FrameCodec, FrameError, PacketKind};
use tracing::{debug, warn};

/// 配送された DATA ペイロードの受け取り口
pub trait DataSink {
    fn on_data_received(&mut self, payload: &[u8]);
}

impl<F: FnMut(&[u8])> DataSink for F {
    fn on_data_received(&mut self, payload: &[u8]) {
        self(payload)
    }
}

/// 受信フレームへの対応
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// DATA をアプリに渡した。`reply` は ACK
    Delivered { reply: Frame },
    /// 破損・未知の種別。`reply` は NACK
    Rejected { reply: Frame },
    /// 応答不要（待っていない ACK / NACK）
    Dropped,
}

impl Response {
    /// 送り返すフレーム
    pub fn reply(&self) -> Option<Frame> {
        match self {
            Response::Delivered { reply } | Response::Rejected { reply } => Some(*reply),
            Response::Dropped => None,
        }
    }
}

/// 受信フレームを検証して振り分ける
///
/// 検証に失敗したフレームには、フレームに書かれているシーケンス番号で NACK を返す
/// （破損していてもそれ以上の手掛かりは無い）。
pub fn respond<S>(
    codec: &mut FrameCodec,
    frame: &Frame,
    sink: &mut S,
) -> Result<Response, FrameError>
where
    S: DataSink + ?Sized,
{
    let seq = frame.sequence();

    if !codec.validate_frame(frame) {
        warn!(seq, "corrupted frame, sending NACK");
        let reply = codec.build_reply(PacketKind::Nack, seq)?;
        return Ok(Response::Rejected { reply });
    }

    match frame.kind() {
        Ok(PacketKind::Data) => {
            sink.on_data_received(frame.payload());
            let reply = codec.build_reply(PacketKind::Ack, seq)?;
            debug!(seq, len = frame.payload_len(), "data delivered, sending ACK");
            Ok(Response::Delivered { reply })
        }
        Ok(kind @ (PacketKind::Ack | PacketKind::Nack)) => {
            debug!(seq, %kind, "unsolicited reply dropped");
            Ok(Response::Dropped)
        }
        Err(e) => {
            warn!(seq, %e, "sending NACK");
            let reply = codec.build_reply(PacketKind::Nack, seq)?;
            Ok(Response::Rejected { reply })
        }
    }
}
