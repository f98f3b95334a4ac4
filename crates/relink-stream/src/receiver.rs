//! フレーム再同期の受信状態機械

use relink_frame::{Frame, END_MARKER, FRAME_LEN, START_MARKER};
use relink_telemetry::Millis;
use tracing::{debug, trace};

use crate::error::StreamError;
use crate::IDLE_TIMEOUT_MS;

/// 受信状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// 先頭マーカーを待っている
    WaitingForStart,
    /// フレームを蓄積中
    AccumulatingFrame,
}

/// バイトストリームからフレームを切り出す受信器
///
/// 1 つの読み手だけが駆動すること（内部バッファを共有しない）。
///
/// ## 責任
/// - 先頭マーカーまでのゴミを捨てる
/// - フレーム長ぶん溜まったら末尾マーカーを確認して [`Frame`] を返す
/// - 途中で通信が途絶えたら部分フレームを破棄する
///
/// ## 注意
/// チェックサムは検証しない。
pub struct StreamReceiver {
    state: ReceiverState,
    buffer: [u8; FRAME_LEN],
    /// buffer に溜まっているバイト数
    filled: usize,
    /// 最後にバイトを受け取った時刻
    last_byte: Millis,
    idle_timeout_ms: u32,
}

impl StreamReceiver {
    /// 既定の無通信タイムアウト（[`IDLE_TIMEOUT_MS`]）で受信器を生成する
    pub fn new() -> Self {
        Self::with_idle_timeout(IDLE_TIMEOUT_MS)
    }

    pub fn with_idle_timeout(idle_timeout_ms: u32) -> Self {
        StreamReceiver {
            state: ReceiverState::WaitingForStart,
            buffer: [0u8; FRAME_LEN],
            filled: 0,
            last_byte: Millis(0),
            idle_timeout_ms,
        }
    }

    /// 1 バイト処理する
    ///
    /// # 引数
    /// - `byte`: 受信したバイト
    /// - `now_ms`: 受信時刻
    ///
    /// # 戻り値
    /// - `Ok(Some(frame))`: 末尾マーカーまで揃ったフレーム（チェックサム未検証）
    /// - `Ok(None)`: まだフレームが完成していない
    /// - `Err(StreamError::BadEndMarker)`: フレーム長ぶん受信したが末尾マーカーが不正。
    ///   バッファは破棄され、先頭マーカー待ちに戻る。
    pub fn push(&mut self, byte: u8, now_ms: u32) -> Result<Option<Frame>, StreamError> {
        let now = Millis(now_ms);

        // 長い沈黙のあとに来たバイトは、古い部分フレームの続きではない
        if self.state == ReceiverState::AccumulatingFrame
            && now.has_exceeded(self.last_byte, self.idle_timeout_ms)
        {
            debug!(buffered = self.filled, "receiver idle timeout, dropping partial frame");
            self.reset();
        }
        self.last_byte = now;

        match self.state {
            ReceiverState::WaitingForStart => {
                if byte == START_MARKER {
                    self.buffer[0] = byte;
                    self.filled = 1;
                    self.state = ReceiverState::AccumulatingFrame;
                } else {
                    trace!(byte, "discarding byte outside a frame");
                }
                Ok(None)
            }
            ReceiverState::AccumulatingFrame => {
                self.buffer[self.filled] = byte;
                self.filled += 1;

                if self.filled < FRAME_LEN {
                    return Ok(None);
                }

                let image = self.buffer;
                self.reset();

                let found = image[FRAME_LEN - 1];
                if found == END_MARKER {
                    Ok(Some(Frame::from_bytes(&image)))
                } else {
                    debug!(found, "invalid end marker");
                    Err(StreamError::BadEndMarker { found })
                }
            }
        }
    }

    /// イテレータからバイトを読み、フレームが完成するかエラーになるまで処理する
    ///
    /// 完成した時点で読むのをやめるので、後続のバイトはイテレータに残る。
    /// 読み切ってもフレームが完成しなければ、無通信タイムアウトを確認してから
    /// `Ok(None)` を返す。何度呼び出しても安全。
    pub fn receive<I>(&mut self, bytes: &mut I, now_ms: u32) -> Result<Option<Frame>, StreamError>
    where
        I: Iterator<Item = u8>,
    {
        for byte in bytes.by_ref() {
            if let Some(frame) = self.push(byte, now_ms)? {
                return Ok(Some(frame));
            }
        }
        self.expire(now_ms);
        Ok(None)
    }

    /// 蓄積中に無通信タイムアウトを過ぎていれば部分フレームを破棄する
    ///
    /// # 戻り値
    /// 破棄した場合は `true`
    pub fn expire(&mut self, now_ms: u32) -> bool {
        if self.state == ReceiverState::AccumulatingFrame
            && Millis(now_ms).has_exceeded(self.last_byte, self.idle_timeout_ms)
        {
            debug!(buffered = self.filled, "receiver idle timeout, dropping partial frame");
            self.reset();
            return true;
        }
        false
    }

    /// 先頭マーカー待ちに戻し、バッファを空にする
    pub fn reset(&mut self) {
        self.state = ReceiverState::WaitingForStart;
        self.filled = 0;
        self.buffer = [0u8; FRAME_LEN];
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// 蓄積中のバイト数
    pub fn buffered(&self) -> usize {
        self.filled
    }
}

impl Default for StreamReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use relink_frame::{FrameCodec, PacketKind};

    use super::*;

    fn sample_frame() -> Frame {
        let mut codec = FrameCodec::new(0);
        codec.build_frame(PacketKind::Data, b"sample").unwrap()
    }

    #[test]
    fn test_noise_before_frame_is_skipped() {
        let frame = sample_frame();
        let mut rx = StreamReceiver::new();

        assert_eq!(rx.push(0x00, 0), Ok(None));
        assert_eq!(rx.push(0x00, 0), Ok(None));
        assert_eq!(rx.state(), ReceiverState::WaitingForStart);

        let bytes = frame.to_bytes();
        let mut result = None;
        for &b in &bytes {
            if let Some(f) = rx.push(b, 0).unwrap() {
                result = Some(f);
            }
        }
        assert_eq!(result, Some(frame));
        assert_eq!(rx.state(), ReceiverState::WaitingForStart);
    }

    #[test]
    fn test_bad_end_marker_then_recovery() {
        let frame = sample_frame();
        let mut bad = frame.to_bytes();
        bad[FRAME_LEN - 1] = 0x00;

        let mut rx = StreamReceiver::new();
        let mut iter = bad.iter().copied();
        assert_eq!(
            rx.receive(&mut iter, 0),
            Err(StreamError::BadEndMarker { found: 0x00 })
        );
        assert_eq!(rx.state(), ReceiverState::WaitingForStart);
        assert_eq!(rx.buffered(), 0);

        let good = frame.to_bytes();
        let mut iter = good.iter().copied();
        assert_eq!(rx.receive(&mut iter, 1), Ok(Some(frame)));
    }

    #[test]
    fn test_receive_stops_after_first_frame() {
        let frame = sample_frame();
        let mut stream = [0u8; FRAME_LEN * 2];
        stream[..FRAME_LEN].copy_from_slice(&frame.to_bytes());
        stream[FRAME_LEN..].copy_from_slice(&frame.to_bytes());

        let mut rx = StreamReceiver::new();
        let mut iter = stream.iter().copied();
        assert_eq!(rx.receive(&mut iter, 0), Ok(Some(frame)));
        // 2 つ目のフレームはイテレータに残っている
        assert_eq!(iter.len(), FRAME_LEN);
        assert_eq!(rx.receive(&mut iter, 0), Ok(Some(frame)));
        assert_eq!(rx.receive(&mut iter, 0), Ok(None));
    }

    #[test]
    fn test_partial_frame_returns_none() {
        let bytes = sample_frame().to_bytes();
        let mut rx = StreamReceiver::new();
        let mut iter = bytes[..20].iter().copied();
        assert_eq!(rx.receive(&mut iter, 0), Ok(None));
        assert_eq!(rx.buffered(), 20);
        assert_eq!(rx.state(), ReceiverState::AccumulatingFrame);
    }

    #[test]
    fn test_expire_drops_stale_partial_frame() {
        let bytes = sample_frame().to_bytes();
        let mut rx = StreamReceiver::new();
        for &b in &bytes[..10] {
            rx.push(b, 1000).unwrap();
        }

        assert!(!rx.expire(1000 + IDLE_TIMEOUT_MS));
        assert!(rx.expire(1000 + IDLE_TIMEOUT_MS + 1));
        assert_eq!(rx.state(), ReceiverState::WaitingForStart);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn test_byte_after_silence_starts_fresh() {
        let frame = sample_frame();
        let bytes = frame.to_bytes();
        let mut rx = StreamReceiver::new();

        // 途中まで受信して途絶える
        for &b in &bytes[..30] {
            rx.push(b, 0).unwrap();
        }

        // 600 ms 後に完全なフレームが届く
        let mut result = None;
        for &b in &bytes {
            if let Some(f) = rx.push(b, 600).unwrap() {
                result = Some(f);
            }
        }
        assert_eq!(result, Some(frame));
    }

    #[test]
    fn test_idle_timeout_survives_clock_wrap() {
        let bytes = sample_frame().to_bytes();
        let mut rx = StreamReceiver::new();
        for &b in &bytes[..5] {
            rx.push(b, u32::MAX - 100).unwrap();
        }
        // 一周して 200 ms 経過（合計 301 ms）: まだ有効
        assert!(!rx.expire(200));
        assert!(rx.expire(400));
    }
}
