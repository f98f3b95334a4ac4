//! 受信器の再同期テスト
//!
//! 任意のノイズ・破損フレームを前置しても、後続の正しいフレームを取り出せることを確認する。

use proptest::prelude::*;

use relink_frame::{Frame, FrameCodec, PacketKind, FRAME_LEN, START_MARKER};
use relink_stream::{ReceiverState, StreamError, StreamReceiver};

/// ストリームを最後まで流し、取り出したフレームと framing エラー数を返す
fn drain(rx: &mut StreamReceiver, stream: &[u8]) -> (Vec<Frame>, usize) {
    let mut frames = Vec::new();
    let mut errors = 0;
    let mut iter = stream.iter().copied();
    loop {
        match rx.receive(&mut iter, 0) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => break,
            Err(StreamError::BadEndMarker { .. }) => errors += 1,
        }
    }
    (frames, errors)
}

#[test]
fn leading_garbage_yields_exactly_one_frame() {
    let mut codec = FrameCodec::new(0);
    let frame = codec.build_frame(PacketKind::Data, b"after noise").unwrap();

    let mut stream = vec![0x00, 0x00];
    stream.extend_from_slice(&frame.to_bytes());

    let mut rx = StreamReceiver::new();
    let (frames, errors) = drain(&mut rx, &stream);

    assert_eq!(frames, vec![frame]);
    assert_eq!(errors, 0);
    assert!(codec.validate_frame(&frames[0]));
}

#[test]
fn corrupted_end_marker_then_valid_frame() {
    let mut codec = FrameCodec::new(0);
    let first = codec.build_frame(PacketKind::Data, b"first").unwrap();
    let second = codec.build_frame(PacketKind::Data, b"second").unwrap();

    let mut broken = first.to_bytes();
    broken[FRAME_LEN - 1] = 0x54;

    let mut stream = broken.to_vec();
    stream.extend_from_slice(&second.to_bytes());

    let mut rx = StreamReceiver::new();
    let (frames, errors) = drain(&mut rx, &stream);

    assert_eq!(errors, 1);
    assert_eq!(frames, vec![second]);
    assert_eq!(rx.state(), ReceiverState::WaitingForStart);
}

/// 開始マーカーを含まないノイズ
fn noise_byte() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("not a start marker", |b| *b != START_MARKER)
}

proptest! {
    #[test]
    fn any_noise_without_start_marker_is_skipped(
        noise in proptest::collection::vec(noise_byte(), 0..200),
        payload in proptest::collection::vec(any::<u8>(), 0..=53),
    ) {
        let mut codec = FrameCodec::new(0);
        let frame = codec.build_frame(PacketKind::Data, &payload).unwrap();

        let mut stream = noise.clone();
        stream.extend_from_slice(&frame.to_bytes());

        let mut rx = StreamReceiver::new();
        let (frames, errors) = drain(&mut rx, &stream);
        prop_assert_eq!(errors, 0);
        prop_assert_eq!(frames, vec![frame]);
    }
}
