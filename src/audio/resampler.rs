//! 重采样模块
//!
//! 线性插值重采样与 PCM16 量化
//!
//! 语音转写对音质要求不高，线性插值（无抗混叠滤波）是刻意的取舍

/// 线性插值重采样
///
/// 对目标索引 `i`，源位置 `pos = i * native/target`，输出为
/// `floor(pos)` 与 `min(floor(pos)+1, last)` 两个源样本按小数部分的线性混合。
/// 输出长度为 `floor(len * target / native)`；采样率相同时为恒等变换
pub fn resample_linear(input: &[f32], native_rate: u32, target_rate: u32) -> Vec<f32> {
    if native_rate == target_rate {
        return input.to_vec();
    }
    if input.is_empty() {
        return Vec::new();
    }

    let ratio = native_rate as f64 / target_rate as f64;
    let output_len = (input.len() as f64 / ratio).floor() as usize;
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let pos = i as f64 * ratio;
        let left = pos.floor() as usize;
        let right = (left + 1).min(last);
        let frac = (pos - pos.floor()) as f32;
        output.push(input[left] * (1.0 - frac) + input[right] * frac);
    }
    output
}

/// 将单个浮点样本量化为 16 位有符号整数
///
/// 先钳位到 [-1.0, 1.0]，负值乘 32768、非负值乘 32767，
/// 保持可表示范围对称且 +1.0 不溢出
pub fn quantize_sample(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// 将浮点样本序列量化为小端 PCM16 字节
pub fn quantize_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| quantize_sample(s).to_le_bytes())
        .collect()
}
