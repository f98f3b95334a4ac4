//! 外部トランスポートとのインターフェース
//!
//! 物理ドライバ（UART、SPI など）と時計はこのクレートの外で実装する。
//! ここではコアが必要とする最小限の操作だけを trait として定義し、
//! それをフレーム単位の送受信（[`FrameChannel`]）にまとめる。

use relink_frame::{Frame, FRAME_LEN, START_MARKER};
use relink_stream::StreamReceiver;
use tracing::{debug, warn};

use crate::error::LinkError;

/// 単調増加するミリ秒時計（32 ビットでラップアラウンドする）
pub trait Clock {
    /// 現在時刻（ミリ秒）
    fn now_ms(&self) -> u32;

    /// `ms` ミリ秒待つ（ビジーウェイトでよい）
    fn delay_ms(&self, ms: u32);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }

    fn delay_ms(&self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// バイトストリーム型のトランスポート（シリアル回線など）
pub trait ByteLink {
    /// バイト列を書き込み、書き込めたバイト数を返す
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError>;

    /// ブロックせずに読めるバイト数
    fn read_available(&mut self) -> Result<usize, LinkError>;

    /// `buffer` に読み込み、読めたバイト数を返す
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError>;

    /// 送信バッファを吐き出す
    fn flush(&mut self) -> Result<(), LinkError> {
        Ok(())
    }
}

impl<L: ByteLink + ?Sized> ByteLink for &mut L {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        (**self).write(bytes)
    }

    fn read_available(&mut self) -> Result<usize, LinkError> {
        (**self).read_available()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError> {
        (**self).read(buffer)
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        (**self).flush()
    }
}

/// 半二重のクロック同期バス（SPI など）
///
/// 1 回の転送で送信と受信が同時に同じ長さだけ行われる。
/// 転送の前後で相手デバイスの選択（チップセレクト）を明示的に切り替える。
pub trait ExchangeLink {
    /// 相手デバイスを選択する（CS をアサート）
    fn select(&mut self) -> Result<(), LinkError>;

    /// 選択を解除する（CS を解放）
    fn release(&mut self) -> Result<(), LinkError>;

    /// `tx` を送り出しながら同じ長さを `rx` に受け取る
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError>;

    /// 選択 → 転送 → 解除 を 1 回行う
    ///
    /// 転送が失敗しても選択は必ず解除される。
    fn exchange(&mut self, tx: &[u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], LinkError> {
        let mut rx = [0u8; FRAME_LEN];
        let mut selected = PeerSelect::assert(self)?;
        selected.transfer(tx, &mut rx)?;
        selected.release()?;
        Ok(rx)
    }
}

impl<X: ExchangeLink + ?Sized> ExchangeLink for &mut X {
    fn select(&mut self) -> Result<(), LinkError> {
        (**self).select()
    }

    fn release(&mut self) -> Result<(), LinkError> {
        (**self).release()
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError> {
        (**self).transfer(tx, rx)
    }
}

/// 相手デバイスを選択している間だけ生きるガード
///
/// `release()` を呼ばずに破棄された場合（エラーで抜けた場合）も選択を解除する。
struct PeerSelect<'a, X: ExchangeLink + ?Sized> {
    link: &'a mut X,
    released: bool,
}

impl<'a, X: ExchangeLink + ?Sized> PeerSelect<'a, X> {
    fn assert(link: &'a mut X) -> Result<Self, LinkError> {
        link.select()?;
        Ok(PeerSelect {
            link,
            released: false,
        })
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError> {
        self.link.transfer(tx, rx)
    }

    fn release(mut self) -> Result<(), LinkError> {
        self.released = true;
        self.link.release()
    }
}

impl<X: ExchangeLink + ?Sized> Drop for PeerSelect<'_, X> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.link.release() {
                warn!(%e, "failed to release peer select");
            }
        }
    }
}

/// フレーム単位の送受信
///
/// 再送ポリシー（[`crate::sender`]）はこの trait だけを見るので、
/// どちらのトランスポートでも同じ保証になる。
pub trait FrameChannel {
    /// フレームを 1 回送信する
    fn transmit(&mut self, frame: &Frame) -> Result<(), LinkError>;

    /// 届いているフレームを 1 つ取り出す。無ければ `None`
    ///
    /// 返すフレームはマーカーが揃っているだけで、チェックサムは未検証。
    fn poll_frame(&mut self, now_ms: u32) -> Result<Option<Frame>, LinkError>;

    /// 送信してから応答を読み始めるまでに置く待ち時間（ミリ秒）
    fn turnaround_ms(&self) -> u32 {
        0
    }
}

/// [`ByteLink`] 上のフレームチャンネル
///
/// 受信バイトは [`StreamReceiver`] に 1 バイトずつ流し、ノイズやバイト欠落から再同期する。
pub struct SerialChannel<L: ByteLink> {
    link: L,
    receiver: StreamReceiver,
}

impl<L: ByteLink> SerialChannel<L> {
    pub fn new(link: L, idle_timeout_ms: u32) -> Self {
        SerialChannel {
            link,
            receiver: StreamReceiver::with_idle_timeout(idle_timeout_ms),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn receiver(&self) -> &StreamReceiver {
        &self.receiver
    }

    pub fn into_link(self) -> L {
        self.link
    }
}

impl<L: ByteLink> FrameChannel for SerialChannel<L> {
    fn transmit(&mut self, frame: &Frame) -> Result<(), LinkError> {
        let bytes = frame.to_bytes();
        let written = self.link.write(&bytes)?;
        if written != FRAME_LEN {
            return Err(LinkError::ShortWrite {
                written,
                expected: FRAME_LEN,
            });
        }
        self.link.flush()
    }

    fn poll_frame(&mut self, now_ms: u32) -> Result<Option<Frame>, LinkError> {
        // フレームが完成した時点で読むのをやめ、後続バイトはリンクに残す
        while self.link.read_available()? > 0 {
            let mut byte = [0u8; 1];
            if self.link.read(&mut byte)? == 0 {
                break;
            }
            match self.receiver.push(byte[0], now_ms) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(e) => debug!(%e, "framing error, resynchronizing"),
            }
        }
        self.receiver.expire(now_ms);
        Ok(None)
    }
}

/// [`ExchangeLink`] 上のフレームチャンネル
///
/// 送信は 1 回の転送（受信側は捨てる）、応答の読み出しはフィラーバイトを送り出す
/// 1 回の転送で行う。
pub struct BusChannel<X: ExchangeLink> {
    link: X,
    turnaround_ms: u32,
}

impl<X: ExchangeLink> BusChannel<X> {
    pub fn new(link: X, turnaround_ms: u32) -> Self {
        BusChannel {
            link,
            turnaround_ms,
        }
    }

    pub fn link(&self) -> &X {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut X {
        &mut self.link
    }

    pub fn into_link(self) -> X {
        self.link
    }
}

impl<X: ExchangeLink> FrameChannel for BusChannel<X> {
    fn transmit(&mut self, frame: &Frame) -> Result<(), LinkError> {
        self.link.exchange(&frame.to_bytes()).map(|_| ())
    }

    fn poll_frame(&mut self, _now_ms: u32) -> Result<Option<Frame>, LinkError> {
        let rx = self.link.exchange(&[0u8; FRAME_LEN])?;
        // 相手がまだ応答を用意していなければバスはアイドル
        if rx[0] != START_MARKER {
            return Ok(None);
        }
        Ok(Some(Frame::from_bytes(&rx)))
    }

    fn turnaround_ms(&self) -> u32 {
        self.turnaround_ms
    }
}
