//! 送信側の再送制御（Reliable Delivery Controller）
//!
//! 1 回の呼び出しで DATA フレーム 1 つの配送を完了させる。
//! 結果は「ACK を受け取った」か「再送上限に達してロスした」のどちらかで、
//! 途中のタイムアウトや NACK は呼び出し側には見えない。

use relink_frame::{Frame, FrameCodec, PacketKind, FRAME_LEN};
use relink_telemetry::Millis;
use tracing::{debug, warn};

use crate::config::ArqConfig;
use crate::error::{DeliveryError, LinkError};
use crate::link::{Clock, FrameChannel};

/// 配送に成功したフレームの情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// DATA フレームのシーケンス番号
    pub sequence: u16,
    /// ACK を得るまでの送信回数（1 なら再送なし）
    pub attempts: u32,
    /// 最後の送信から ACK までの遅延。範囲外で捨てられた場合は `None`
    pub latency_ms: Option<u32>,
}

/// 1 回の待ち窓の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Acked(Option<u32>),
    Nacked,
    TimedOut,
}

/// ペイロードを DATA フレームにして配送する
///
/// # 引数
/// - `codec`: 送信側エンドポイントのコーデック（シーケンス番号とテレメトリ）
/// - `channel`: フレームの送受信路
/// - `clock`: ミリ秒時計
/// - `config`: タイムアウトと再送回数
/// - `payload`: 最大 [`relink_frame::MAX_PAYLOAD`] バイト
///
/// # エラー
/// - `DeliveryError::Frame`: ペイロードが大きすぎる（何も送信しない）
/// - `DeliveryError::Link`: トランスポートが失敗した（再送しない）
/// - `DeliveryError::Exhausted`: すべての送信で ACK が得られなかった
pub fn deliver<F, C>(
    codec: &mut FrameCodec,
    channel: &mut F,
    clock: &C,
    config: &ArqConfig,
    payload: &[u8],
) -> Result<Delivery, DeliveryError>
where
    F: FrameChannel + ?Sized,
    C: Clock + ?Sized,
{
    let frame = codec.build_frame(PacketKind::Data, payload)?;
    send_frame(codec, channel, clock, config, &frame)
}

/// 組み立て済みのフレームを ACK が返るまで送る
///
/// 再送では同じバイト列をそのまま送り、シーケンス番号は振り直さない。
/// 送信回数は最初の送信を含めて最大 `config.max_attempts()`。
/// 失敗した送信のたびに再送イベントを 1 つ記録する。
pub fn send_frame<F, C>(
    codec: &mut FrameCodec,
    channel: &mut F,
    clock: &C,
    config: &ArqConfig,
    frame: &Frame,
) -> Result<Delivery, DeliveryError>
where
    F: FrameChannel + ?Sized,
    C: Clock + ?Sized,
{
    let sequence = frame.sequence();
    let max_attempts = config.max_attempts();

    for attempt in 1..=max_attempts {
        codec.telemetry_mut().start_latency(sequence, clock.now_ms());
        channel.transmit(frame)?;

        let turnaround = channel.turnaround_ms();
        if turnaround > 0 {
            clock.delay_ms(turnaround);
        }

        match wait_for_reply(codec, channel, clock, config, sequence)? {
            Reply::Acked(latency_ms) => {
                debug!(seq = sequence, attempt, ?latency_ms, "frame acknowledged");
                return Ok(Delivery {
                    sequence,
                    attempts: attempt,
                    latency_ms,
                });
            }
            Reply::Nacked => warn!(seq = sequence, attempt, "frame rejected by peer"),
            Reply::TimedOut => debug!(seq = sequence, attempt, "no reply within ack timeout"),
        }

        codec.telemetry_mut().on_retransmission();
        if attempt < max_attempts {
            debug!(seq = sequence, attempt, "retransmitting frame");
        }
    }

    let telemetry = codec.telemetry_mut();
    telemetry.on_timeout();
    telemetry.on_loss(sequence);
    warn!(seq = sequence, attempts = max_attempts, "retries exhausted, frame lost");

    Err(DeliveryError::Exhausted {
        sequence,
        attempts: max_attempts,
    })
}

/// `sequence` に対する応答を 1 窓ぶん待つ
fn wait_for_reply<F, C>(
    codec: &mut FrameCodec,
    channel: &mut F,
    clock: &C,
    config: &ArqConfig,
    sequence: u16,
) -> Result<Reply, LinkError>
where
    F: FrameChannel + ?Sized,
    C: Clock + ?Sized,
{
    let started = Millis(clock.now_ms());

    loop {
        let now = clock.now_ms();
        if Millis(now).elapsed_since(started) >= config.ack_timeout_ms {
            return Ok(Reply::TimedOut);
        }

        if let Some(reply) = channel.poll_frame(now)? {
            codec.telemetry_mut().on_packet_received(FRAME_LEN);

            if codec.validate_frame(&reply) {
                let matches = reply.sequence() == sequence;
                match reply.kind() {
                    Ok(PacketKind::Ack) if matches => {
                        let latency = codec.telemetry_mut().end_latency(sequence, now);
                        return Ok(Reply::Acked(latency));
                    }
                    Ok(PacketKind::Nack) if matches => return Ok(Reply::Nacked),
                    Ok(PacketKind::Ack | PacketKind::Nack) => {
                        debug!(
                            expected = sequence,
                            actual = reply.sequence(),
                            "reply for another frame"
                        );
                        codec
                            .telemetry_mut()
                            .on_sequence_error(sequence, reply.sequence());
                    }
                    Ok(PacketKind::Data) | Err(_) => {
                        debug!(%reply, "ignoring non-reply frame while awaiting ack");
                    }
                }
            }
        }

        clock.delay_ms(config.poll_interval_ms);
    }
}
