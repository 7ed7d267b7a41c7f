use std::f64::consts::PI;

/// Rate conversion for interleaved stereo PCM.
///
/// Both buffers are `[L R L R …]`; frame counts are implied by slice length.
/// The output is stretched or squeezed to exactly fill `output`.
pub trait Resampler: Send {
    fn resample(&mut self, source: &[i16], output: &mut [i16]);
}

/// Two-point interpolation. Cheap, always available.
pub struct LinearResampler;

impl Resampler for LinearResampler {
    fn resample(&mut self, source: &[i16], output: &mut [i16]) {
        let input_frames = source.len() / 2;
        let output_frames = output.len() / 2;

        if input_frames == 0 || output_frames == 0 {
            output.fill(0);
            return;
        }

        let step = 1.0 / output_frames as f64;
        let mut position = 0.0f64;

        for frame in output.chunks_exact_mut(2) {
            let sample_pos = position * input_frames as f64;
            let floor_frame = (sample_pos as usize).min(input_frames - 1);
            let ceil_frame = (floor_frame + 1).min(input_frames - 1);
            let fraction = sample_pos - floor_frame as f64;

            for channel in 0..2 {
                let a = source[floor_frame * 2 + channel] as f64;
                let b = source[ceil_frame * 2 + channel] as f64;
                frame[channel] = (a * (1.0 - fraction) + b * fraction).round() as i16;
            }

            position += step;
        }
    }
}

/// Windowed-sinc interpolation. Higher quality than [`LinearResampler`] at
/// the cost of `taps` multiplies per output sample.
pub struct SincResampler {
    half_taps: usize,
}

impl SincResampler {
    pub fn new(taps: usize) -> Self {
        Self {
            half_taps: (taps / 2).max(1),
        }
    }

    fn sinc(x: f64) -> f64 {
        if x.abs() < 1e-9 {
            1.0
        } else {
            (PI * x).sin() / (PI * x)
        }
    }

    /// Hann window over `[-half_taps, half_taps]`.
    fn window(&self, x: f64) -> f64 {
        let half = self.half_taps as f64;
        if x.abs() >= half {
            0.0
        } else {
            0.5 * (1.0 + (PI * x / half).cos())
        }
    }
}

impl Resampler for SincResampler {
    fn resample(&mut self, source: &[i16], output: &mut [i16]) {
        let input_frames = (source.len() / 2) as isize;
        let output_frames = output.len() / 2;

        if input_frames == 0 || output_frames == 0 {
            output.fill(0);
            return;
        }

        // Lowpass at the Nyquist of the slower rate when decimating.
        let ratio = output_frames as f64 / input_frames as f64;
        let cutoff = ratio.min(1.0);

        for (n, frame) in output.chunks_exact_mut(2).enumerate() {
            let center = n as f64 / output_frames as f64 * input_frames as f64;
            let first = center.floor() as isize - self.half_taps as isize + 1;
            let last = center.floor() as isize + self.half_taps as isize;

            let mut acc = [0.0f64; 2];
            let mut weight_sum = 0.0f64;

            for k in first..=last {
                let x = center - k as f64;
                let weight = cutoff * Self::sinc(cutoff * x) * self.window(x);
                if weight == 0.0 {
                    continue;
                }

                let clamped = k.clamp(0, input_frames - 1) as usize;
                acc[0] += source[clamped * 2] as f64 * weight;
                acc[1] += source[clamped * 2 + 1] as f64 * weight;
                weight_sum += weight;
            }

            if weight_sum.abs() > 1e-12 {
                frame[0] = (acc[0] / weight_sum).round().clamp(-32768.0, 32767.0) as i16;
                frame[1] = (acc[1] / weight_sum).round().clamp(-32768.0, 32767.0) as i16;
            } else {
                frame[0] = 0;
                frame[1] = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_stereo(freq: f64, rate: f64, frames: usize, amplitude: f64) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f64 / rate).sin() * amplitude;
            out.push(s as i16);
            out.push(s as i16);
        }
        out
    }

    fn rms_error(a: &[i16], b: &[i16]) -> f64 {
        assert_eq!(a.len(), b.len());
        let sum: f64 = a
            .iter()
            .zip(b)
            .map(|(&x, &y)| {
                let d = x as f64 - y as f64;
                d * d
            })
            .sum();
        (sum / a.len() as f64).sqrt()
    }

    fn rms(a: &[i16]) -> f64 {
        let sum: f64 = a.iter().map(|&x| x as f64 * x as f64).sum();
        (sum / a.len() as f64).sqrt()
    }

    #[test]
    fn linear_identity_at_equal_rates() {
        let input = sine_stereo(440.0, 48000.0, 480, 10000.0);
        let mut output = vec![0i16; input.len()];
        LinearResampler.resample(&input, &mut output);

        // Same rate resampling must be near-lossless.
        assert!(rms_error(&input, &output) < 2.0);
    }

    #[test]
    fn linear_round_trip_on_low_frequency_sine() {
        // 1 kHz at 48 kHz is well below Nyquist/4 of both rates.
        let input = sine_stereo(1000.0, 48000.0, 4800, 10000.0);
        let mut up = vec![0i16; 2 * 5760];
        LinearResampler.resample(&input, &mut up);
        let mut down = vec![0i16; input.len()];
        LinearResampler.resample(&up, &mut down);

        let error = rms_error(&input, &down) / rms(&input);
        assert!(error < 0.03, "relative RMS error {error}");
    }

    #[test]
    fn sinc_round_trip_beats_linear() {
        let input = sine_stereo(1000.0, 48000.0, 4800, 10000.0);

        let mut up = vec![0i16; 2 * 5760];
        SincResampler::new(32).resample(&input, &mut up);
        let mut down = vec![0i16; input.len()];
        SincResampler::new(32).resample(&up, &mut down);

        // Ignore the filter warm-up at the edges.
        let interior = 64 * 2..input.len() - 64 * 2;
        let error = rms_error(&input[interior.clone()], &down[interior.clone()])
            / rms(&input[interior]);
        assert!(error < 0.005, "relative RMS error {error}");
    }

    #[test]
    fn output_is_exactly_filled() {
        let input = sine_stereo(200.0, 44100.0, 441, 8000.0);
        for target in [100usize, 441, 480, 1000] {
            let mut output = vec![0i16; target * 2];
            LinearResampler.resample(&input, &mut output);
            assert_eq!(output.len(), target * 2);

            let mut output = vec![0i16; target * 2];
            SincResampler::new(16).resample(&input, &mut output);
            assert_eq!(output.len(), target * 2);
        }
    }

    #[test]
    fn empty_input_produces_silence() {
        let mut output = vec![123i16; 64];
        LinearResampler.resample(&[], &mut output);
        assert!(output.iter().all(|&s| s == 0));

        let mut output = vec![123i16; 64];
        SincResampler::new(8).resample(&[], &mut output);
        assert!(output.iter().all(|&s| s == 0));
    }

    #[test]
    fn dc_signal_is_preserved() {
        let input = vec![5000i16; 200];
        let mut output = vec![0i16; 150];
        SincResampler::new(32).resample(&input, &mut output);

        for frame in output.chunks_exact(2).skip(8).take(50) {
            assert!((frame[0] - 5000).abs() <= 2, "got {}", frame[0]);
        }
    }
}
