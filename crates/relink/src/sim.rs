//! メモリ内のシミュレーション用リンク
//!
//! 実機の UART や SPI が無くても送受信を動かせるようにする。
//! 回線障害（書き込みの消失・バイト化け・バイト欠落）を注入できる。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use relink_arq::{respond, ByteLink, DataSink, ExchangeLink, LinkError};
use relink_frame::{Frame, FrameCodec, FRAME_LEN, START_MARKER};
use tracing::{debug, trace};

/// 次の書き込みに適用する回線障害
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 書き込み全体が届かない
    DropWrite,
    /// `offset` バイト目を反転して届ける
    CorruptByte(usize),
    /// `offset` バイト目が欠落する
    DeleteByte(usize),
}

#[derive(Default)]
struct Wire {
    bytes: VecDeque<u8>,
    faults: VecDeque<Fault>,
    closed: bool,
}

type SharedWire = Arc<Mutex<Wire>>;

fn lock(wire: &SharedWire) -> Result<MutexGuard<'_, Wire>, LinkError> {
    wire.lock().map_err(|_| LinkError::Io("loopback wire poisoned"))
}

/// 双方向のメモリ内シリアル回線
pub struct Loopback;

impl Loopback {
    /// つながった 2 つの端を作る
    ///
    /// 片方に書いたバイトはもう片方から読める。スレッドをまたいで渡してよい。
    pub fn pair() -> (LoopbackEnd, LoopbackEnd) {
        let a_to_b = SharedWire::default();
        let b_to_a = SharedWire::default();
        (
            LoopbackEnd {
                tx: a_to_b.clone(),
                rx: b_to_a.clone(),
                written: 0,
            },
            LoopbackEnd {
                tx: b_to_a,
                rx: a_to_b,
                written: 0,
            },
        )
    }
}

/// [`Loopback`] の一端
pub struct LoopbackEnd {
    tx: SharedWire,
    rx: SharedWire,
    written: usize,
}

impl LoopbackEnd {
    /// この端からの書き込みに障害を予約する（書き込み 1 回に 1 つずつ消費）
    pub fn inject(&self, fault: Fault) -> Result<(), LinkError> {
        lock(&self.tx)?.faults.push_back(fault);
        Ok(())
    }

    /// ノイズなどの生バイトを相手側に直接流す
    pub fn inject_raw(&self, bytes: &[u8]) -> Result<(), LinkError> {
        lock(&self.tx)?.bytes.extend(bytes.iter().copied());
        Ok(())
    }

    /// 回線を閉じる。以後は両端とも `LinkError::Closed` になる
    pub fn close(&self) -> Result<(), LinkError> {
        lock(&self.tx)?.closed = true;
        lock(&self.rx)?.closed = true;
        Ok(())
    }

    /// この端から書き込んだ回数
    pub fn writes(&self) -> usize {
        self.written
    }
}

impl ByteLink for LoopbackEnd {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, LinkError> {
        let mut wire = lock(&self.tx)?;
        if wire.closed {
            return Err(LinkError::Closed);
        }
        self.written += 1;

        match wire.faults.pop_front() {
            None => wire.bytes.extend(bytes.iter().copied()),
            Some(Fault::DropWrite) => debug!(len = bytes.len(), "loopback: write dropped"),
            Some(Fault::CorruptByte(offset)) => {
                debug!(offset, "loopback: byte corrupted");
                wire.bytes.extend(
                    bytes
                        .iter()
                        .enumerate()
                        .map(|(i, &b)| if i == offset { !b } else { b }),
                );
            }
            Some(Fault::DeleteByte(offset)) => {
                debug!(offset, "loopback: byte deleted");
                wire.bytes.extend(
                    bytes
                        .iter()
                        .enumerate()
                        .filter(|&(i, _)| i != offset)
                        .map(|(_, &b)| b),
                );
            }
        }
        Ok(bytes.len())
    }

    fn read_available(&mut self) -> Result<usize, LinkError> {
        let wire = lock(&self.rx)?;
        if wire.closed && wire.bytes.is_empty() {
            return Err(LinkError::Closed);
        }
        Ok(wire.bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, LinkError> {
        let mut wire = lock(&self.rx)?;
        let n = buffer.len().min(wire.bytes.len());
        for (slot, byte) in buffer.iter_mut().zip(wire.bytes.drain(..n)) {
            *slot = byte;
        }
        trace!(n, "loopback: read");
        Ok(n)
    }
}

/// 半二重バスの相手（スレーブ）をその場で演じる [`ExchangeLink`]
///
/// DATA フレームを受け取ると応答を組み立てて保持し、次のフィラー転送で送り返す。
/// 応答が無いときのバスはアイドル（全バイト 0）。
pub struct SimulatedSlave<S: DataSink> {
    codec: FrameCodec,
    sink: S,
    outbox: Option<[u8; FRAME_LEN]>,
    selected: bool,
    faults: VecDeque<Fault>,
    frames_seen: usize,
}

impl<S: DataSink> SimulatedSlave<S> {
    pub fn new(sink: S) -> Self {
        SimulatedSlave {
            codec: FrameCodec::new(0),
            sink,
            outbox: None,
            selected: false,
            faults: VecDeque::new(),
            frames_seen: 0,
        }
    }

    /// マスターからの次のフレーム転送に障害を予約する
    ///
    /// `DeleteByte` は固定長のバスでは起こらないので `CorruptByte` と同じに扱う。
    pub fn inject(&mut self, fault: Fault) {
        self.faults.push_back(fault);
    }

    /// マスターから受け取ったフレーム転送の数
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }
}

impl<S: DataSink> ExchangeLink for SimulatedSlave<S> {
    fn select(&mut self) -> Result<(), LinkError> {
        if self.selected {
            return Err(LinkError::Io("peer already selected"));
        }
        self.selected = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), LinkError> {
        self.selected = false;
        Ok(())
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), LinkError> {
        if !self.selected {
            return Err(LinkError::Io("transfer without peer select"));
        }
        let mut image: [u8; FRAME_LEN] = tx
            .try_into()
            .map_err(|_| LinkError::Io("transfer length mismatch"))?;
        rx.fill(0);

        if image[0] != START_MARKER {
            // フィラー転送: 用意してある応答を返す
            if let Some(reply) = self.outbox.take() {
                rx.copy_from_slice(&reply);
            }
            return Ok(());
        }

        self.frames_seen += 1;
        match self.faults.pop_front() {
            None => {}
            Some(Fault::DropWrite) => {
                debug!("simulated slave: frame lost");
                return Ok(());
            }
            Some(Fault::CorruptByte(offset) | Fault::DeleteByte(offset)) => {
                if let Some(b) = image.get_mut(offset) {
                    *b = !*b;
                }
            }
        }

        self.codec.telemetry_mut().on_packet_received(FRAME_LEN);
        let frame = Frame::from_bytes(&image);
        let response = respond(&mut self.codec, &frame, &mut self.sink)
            .map_err(|_| LinkError::Io("simulated slave could not build reply"))?;
        self.outbox = response.reply().map(|reply| reply.to_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_crossed() {
        let (mut a, mut b) = Loopback::pair();
        a.write(b"ping").unwrap();
        assert_eq!(b.read_available().unwrap(), 4);
        assert_eq!(a.read_available().unwrap(), 0);

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");
    }

    #[test]
    fn test_faults_apply_in_order() {
        let (mut a, mut b) = Loopback::pair();
        a.inject(Fault::DropWrite).unwrap();
        a.inject(Fault::CorruptByte(0)).unwrap();
        a.inject(Fault::DeleteByte(1)).unwrap();

        a.write(&[1, 2, 3]).unwrap();
        a.write(&[1, 2, 3]).unwrap();
        a.write(&[1, 2, 3]).unwrap();
        a.write(&[1, 2, 3]).unwrap();
        assert_eq!(a.writes(), 4);

        let mut buf = [0u8; 16];
        let n = b.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[!1u8, 2, 3, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn test_closed_link() {
        let (mut a, mut b) = Loopback::pair();
        b.close().unwrap();
        assert_eq!(a.write(b"x"), Err(LinkError::Closed));
        assert_eq!(b.read_available(), Err(LinkError::Closed));
    }

    #[test]
    fn test_slave_rejects_transfer_without_select() {
        let mut slave = SimulatedSlave::new(|_: &[u8]| {});
        let mut rx = [0u8; FRAME_LEN];
        assert!(slave.transfer(&[0u8; FRAME_LEN], &mut rx).is_err());
    }
}
