use rand::Rng;

// 去掉易混淆字符 (0/O, 1/I/L)
const COUPON_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// 生成 8 位优惠码
pub fn generate_coupon_code() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| COUPON_ALPHABET[rng.gen_range(0..COUPON_ALPHABET.len())] as char)
        .collect()
}
