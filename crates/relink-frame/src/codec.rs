//! シーケンス番号付きフレームの生成と検証

use relink_telemetry::Telemetry;
use tracing::debug;

use crate::error::FrameError;
use crate::frame::{Frame, PacketKind};
use crate::{FRAME_LEN, MAX_PAYLOAD};

/// エンドポイント 1 つ分のフレームコーデック
///
/// 送信側のシーケンスカウンタと、そのエンドポイントの [`Telemetry`] を所有する。
/// グローバル状態は持たないので、テストでは複数のエンドポイントを独立に動かせる。
///
/// ## シーケンス番号
///
/// 0 から始まり、フレームを 1 つ作るたび（DATA / ACK / NACK を問わず）に 1 進む。
/// 65535 の次は 0 に戻る（16 ビット全域を使う）。再起動をまたいで保存はしない。
pub struct FrameCodec {
    /// 次に割り当てるシーケンス番号
    next_sequence: u16,
    telemetry: Telemetry,
}

impl FrameCodec {
    /// 新しいコーデックを生成する
    ///
    /// # 引数
    /// - `now_ms`: 現在時刻（テレメトリの計測起点）
    pub fn new(now_ms: u32) -> Self {
        Self::with_telemetry(Telemetry::new(now_ms))
    }

    /// 既存のテレメトリを引き継いでコーデックを生成する
    pub fn with_telemetry(telemetry: Telemetry) -> Self {
        FrameCodec {
            next_sequence: 0,
            telemetry,
        }
    }

    /// 次のシーケンス番号を払い出し、カウンタを進める
    pub fn next_sequence(&mut self) -> u16 {
        let seq = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        seq
    }

    /// 次に払い出すシーケンス番号（カウンタは進めない）
    pub fn peek_sequence(&self) -> u16 {
        self.next_sequence
    }

    /// 新しいシーケンス番号でフレームを組み立てる
    ///
    /// 成功するとカウンタが進み、送信イベント（サイズ = [`FRAME_LEN`]）が
    /// テレメトリに記録される。
    ///
    /// # エラー
    /// - `FrameError::PayloadTooLarge`: `payload` が [`MAX_PAYLOAD`] を超える。
    ///   この場合カウンタもテレメトリも変化しない。
    pub fn build_frame(&mut self, kind: PacketKind, payload: &[u8]) -> Result<Frame, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let seq = self.next_sequence();
        self.finish(Frame::new(kind, seq, payload)?)
    }

    /// 受信した DATA に対する ACK / NACK を組み立てる
    ///
    /// フレームには `echo_seq` を書き込んでからチェックサムを計算する。
    /// 自分のカウンタも通常のフレームと同様に 1 進む。
    pub fn build_reply(&mut self, kind: PacketKind, echo_seq: u16) -> Result<Frame, FrameError> {
        let _ = self.next_sequence();
        self.finish(Frame::new(kind, echo_seq, &[])?)
    }

    /// フレームのマーカーとチェックサムを検証する
    ///
    /// チェックサム不一致（長さフィールドの破損を含む）はテレメトリに記録する。
    /// シーケンス番号の順序は見ない（それは Reliable Delivery Controller の責任）。
    pub fn validate_frame(&mut self, frame: &Frame) -> bool {
        if !frame.has_markers() {
            debug!(seq = frame.sequence(), "frame rejected: bad marker");
            return false;
        }

        if !frame.checksum_matches() {
            debug!(
                seq = frame.sequence(),
                stored = frame.checksum(),
                "frame rejected: checksum mismatch"
            );
            self.telemetry.on_checksum_error();
            return false;
        }

        true
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    fn finish(&mut self, frame: Frame) -> Result<Frame, FrameError> {
        self.telemetry.on_packet_sent(FRAME_LEN);
        debug!(%frame, "frame built");
        Ok(frame)
    }
}
