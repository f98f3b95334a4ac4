//! CRC-16/CCITT（多項式 0x1021、初期値 0xFFFF、MSB ファースト、最終 XOR なし）

/// 生成多項式
pub const POLYNOMIAL: u16 = 0x1021;

/// レジスタ初期値
pub const INITIAL: u16 = 0xFFFF;

/// `data` の CRC を計算する
pub fn compute(data: &[u8]) -> u16 {
    update(INITIAL, data)
}

/// 計算途中のレジスタ値 `crc` に `data` を追加で流し込む
///
/// 連続していない領域をまとめて 1 つの CRC にするときに使う。
pub fn update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// `data` の CRC が `expected` と一致するか
pub fn verify(data: &[u8], expected: u16) -> bool {
    compute(data) == expected
}
