//! Frame 構造とワイヤ表現の相互変換

use core::fmt;

use crate::crc;
use crate::error::FrameError;
use crate::{CHECKED_HEADER_LEN, END_MARKER, FRAME_LEN, MAX_PAYLOAD, START_MARKER};

// ワイヤ上のオフセット
const KIND_AT: usize = 1;
const SEQ_AT: usize = 2;
const LEN_AT: usize = 4;
const PAYLOAD_AT: usize = 6;
const CRC_AT: usize = PAYLOAD_AT + MAX_PAYLOAD;
const END_AT: usize = CRC_AT + 2;

/// パケット種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// ペイロードを運ぶフレーム
    Data = 0x01,
    /// 受信確認
    Ack = 0x02,
    /// 否定応答（破損フレームを受け取った）
    Nack = 0x03,
}

impl PacketKind {
    /// ワイヤ上の値
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Data => "DATA",
            PacketKind::Ack => "ACK",
            PacketKind::Nack => "NACK",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PacketKind::Data),
            0x02 => Ok(PacketKind::Ack),
            0x03 => Ok(PacketKind::Nack),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// relink のフレーム（送受信の最小単位）
///
/// DATA / ACK / NACK はすべて同じ固定長レイアウトを共有する。
/// ワイヤから読んだフレームは破損している可能性があるので、各フィールドは
/// 受信したままの値を保持する。整合性は [`Frame::is_well_formed`]
/// （またはテレメトリに記録する [`crate::FrameCodec::validate_frame`]）で確認する。
///
/// 一度組み立てたフレームは変更できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    start: u8,
    kind: u8,
    sequence: u16,
    length: u16,
    payload: [u8; MAX_PAYLOAD],
    checksum: u16,
    end: u8,
}

impl Frame {
    /// シーケンス番号を指定してフレームを組み立てる
    ///
    /// マーカーを付け、ペイロード領域をゼロ埋めし、チェックサムを計算する。
    /// 通常はシーケンス番号を管理する [`crate::FrameCodec`] 経由で使う。
    ///
    /// # エラー
    /// - `FrameError::PayloadTooLarge`: `payload` が [`MAX_PAYLOAD`] を超える
    pub fn new(kind: PacketKind, sequence: u16, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let mut region = [0u8; MAX_PAYLOAD];
        region[..payload.len()].copy_from_slice(payload);

        let mut frame = Frame {
            start: START_MARKER,
            kind: kind.as_u8(),
            sequence,
            length: payload.len() as u16,
            payload: region,
            checksum: 0,
            end: END_MARKER,
        };
        // length は MAX_PAYLOAD 以下なので必ず計算できる
        frame.checksum = frame.computed_checksum().unwrap_or_default();
        Ok(frame)
    }

    /// ワイヤ上のバイト列からフレームを復元する
    ///
    /// 内容の検証はしない（どんな 62 バイトでも復元できる）。
    pub fn from_bytes(bytes: &[u8; FRAME_LEN]) -> Self {
        let mut payload = [0u8; MAX_PAYLOAD];
        payload.copy_from_slice(&bytes[PAYLOAD_AT..CRC_AT]);

        Frame {
            start: bytes[0],
            kind: bytes[KIND_AT],
            sequence: u16::from_le_bytes([bytes[SEQ_AT], bytes[SEQ_AT + 1]]),
            length: u16::from_le_bytes([bytes[LEN_AT], bytes[LEN_AT + 1]]),
            payload,
            checksum: u16::from_le_bytes([bytes[CRC_AT], bytes[CRC_AT + 1]]),
            end: bytes[END_AT],
        }
    }

    /// 長さの決まっていないスライスからフレームを復元する
    ///
    /// # エラー
    /// - `FrameError::WrongLength`: `bytes` が [`FRAME_LEN`] バイトでない
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        let image: &[u8; FRAME_LEN] = bytes.try_into().map_err(|_| FrameError::WrongLength {
            expected: FRAME_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(image))
    }

    /// ワイヤに送信するバイト列を返す
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = self.start;
        bytes[KIND_AT] = self.kind;
        bytes[SEQ_AT..SEQ_AT + 2].copy_from_slice(&self.sequence.to_le_bytes());
        bytes[LEN_AT..LEN_AT + 2].copy_from_slice(&self.length.to_le_bytes());
        bytes[PAYLOAD_AT..CRC_AT].copy_from_slice(&self.payload);
        bytes[CRC_AT..CRC_AT + 2].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[END_AT] = self.end;
        bytes
    }

    /// パケット種別
    ///
    /// # エラー
    /// - `FrameError::UnknownKind`: 種別バイトが未定義の値
    pub fn kind(&self) -> Result<PacketKind, FrameError> {
        PacketKind::try_from(self.kind)
    }

    /// 種別バイトそのもの
    pub fn raw_kind(&self) -> u8 {
        self.kind
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// ヘッダーに書かれたペイロード長（破損フレームでは MAX_PAYLOAD を超えうる）
    pub fn payload_len(&self) -> usize {
        usize::from(self.length)
    }

    /// 有効なペイロード（長さフィールドで切り詰めたもの）
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len().min(MAX_PAYLOAD)]
    }

    /// フレームに格納されているチェックサム
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// 先頭・末尾のマーカーがどちらも正しいか
    pub fn has_markers(&self) -> bool {
        self.start == START_MARKER && self.end == END_MARKER
    }

    /// フィールドから計算し直したチェックサム
    ///
    /// 長さフィールドが [`MAX_PAYLOAD`] を超えていれば計算対象が存在しないので `None`。
    pub fn computed_checksum(&self) -> Option<u16> {
        let len = self.payload_len();
        if len > MAX_PAYLOAD {
            return None;
        }

        let mut header = [0u8; CHECKED_HEADER_LEN];
        header[0] = self.kind;
        header[1..3].copy_from_slice(&self.sequence.to_le_bytes());
        header[3..5].copy_from_slice(&self.length.to_le_bytes());

        Some(crc::update(crc::compute(&header), &self.payload[..len]))
    }

    /// チェックサムが一致するか（マーカーは見ない）
    pub fn checksum_matches(&self) -> bool {
        self.computed_checksum() == Some(self.checksum)
    }

    /// マーカーとチェックサムがどちらも正しいか
    ///
    /// テレメトリに触れない純粋な判定。
    pub fn is_well_formed(&self) -> bool {
        self.has_markers() && self.checksum_matches()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}] kind:", self.sequence)?;
        match self.kind() {
            Ok(kind) => write!(f, "{}", kind)?,
            Err(_) => write!(f, "UNKNOWN(0x{:02X})", self.kind)?,
        }
        write!(f, " len:{} crc:0x{:04X}", self.length, self.checksum)
    }
}
