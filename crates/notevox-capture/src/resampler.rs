/// Per-frame linear resampler producing 16-bit little-endian PCM.
///
/// Runs on the hardware callback path, once per incoming frame, so it does
/// a single exact-capacity allocation per call (the returned chunk, which
/// the buffer takes ownership of) and nothing else.
pub struct LinearResampler {
    in_rate: u32,
    out_rate: u32,
    /// Source samples advanced per output sample (in_rate / out_rate).
    ratio: f64,
}

impl LinearResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        Self {
            in_rate,
            out_rate,
            ratio: in_rate as f64 / out_rate as f64,
        }
    }

    /// Resample one native-rate frame and quantize to LE i16 bytes.
    ///
    /// Output length is `floor(len / ratio)` samples (2 bytes each). When
    /// the rates match the frame is quantized as-is.
    pub fn process(&mut self, input: &[f32]) -> Vec<u8> {
        if input.is_empty() {
            return Vec::new();
        }

        if self.in_rate == self.out_rate {
            let mut out = Vec::with_capacity(input.len() * 2);
            for &s in input {
                out.extend_from_slice(&quantize(s).to_le_bytes());
            }
            return out;
        }

        // floor(len / ratio), computed exactly: the f64 quotient can land
        // just under an integer for rate pairs like 44100/16000.
        let out_len =
            (input.len() as u64 * self.out_rate as u64 / self.in_rate as u64) as usize;
        let last = input.len() - 1;
        let mut out = Vec::with_capacity(out_len * 2);
        for i in 0..out_len {
            let pos = i as f64 * self.ratio;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            let sample = input[lo] + (input[hi] - input[lo]) * frac;
            out.extend_from_slice(&quantize(sample).to_le_bytes());
        }
        out
    }

    /// Output sample count produced for an input of `len` samples.
    pub fn output_len(&self, len: usize) -> usize {
        if self.in_rate == self.out_rate {
            len
        } else {
            (len as u64 * self.out_rate as u64 / self.in_rate as u64) as usize
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

/// Clamp to [-1, 1] and quantize with the asymmetric signed 16-bit range:
/// negative values scale by 32768, non-negative by 32767.
fn quantize(s: f32) -> i16 {
    let clamped = s.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0).round() as i16
    } else {
        (clamped * 32767.0).round() as i16
    }
}
