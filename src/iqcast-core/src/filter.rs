// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Decimating dual-channel FIR kernel with cross-buffer history.
//!
//! The kernel convolves the interleaved I/Q stream held by the
//! [`Reservoir`] with a real coefficient vector, producing one output
//! pair for every `step` input pairs. Real coefficients applied
//! independently to I and Q preserve the complex convolution identity,
//! which is why a single coefficient walk accumulates both channels
//! instead of running two disjoint convolutions.

use std::io;
use std::path::Path;

use tracing::warn;

use crate::reservoir::Reservoir;
use crate::Sample;

/// Band-pass impulse response, index 0 being the newest tap.
pub type Coefficients = Vec<f64>;

/// Read filter coefficients from a newline-delimited file.
///
/// One value per line, order preserved. Lines that do not parse as a
/// number are skipped; non-blank ones are reported.
pub fn read_coefficients(path: &Path) -> io::Result<Coefficients> {
    let content = std::fs::read_to_string(path)?;

    let mut coefficients = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        match line.parse::<f64>() {
            Ok(value) => coefficients.push(value),
            Err(_) if line.is_empty() => {}
            Err(_) => warn!("ignoring non-numeric filter line {:?}", line),
        }
    }

    Ok(coefficients)
}

/// Convolve the reservoir with `coefficients`, decimating by `step`.
///
/// Starting at `cursor` (raw interleaved units into the current
/// block), one I/Q output pair is appended to `output` for every
/// `step` input pairs until the cursor passes the end of the current
/// block. Taps that reach past the start of the current block walk the
/// tail of the previous one; history that does not exist yet (before
/// the first swap populates it) contributes zero.
///
/// On return the cursor lies in `[len, len + step * 2)`; the caller
/// reduces it modulo the block length to carry the sub-step remainder
/// into the next block. Returns true when any output pair's magnitude
/// `sqrt(I^2 + Q^2)` reaches `threshold`.
pub fn filter_buffer(
    reservoir: &Reservoir,
    coefficients: &[f64],
    output: &mut Vec<Sample>,
    cursor: &mut usize,
    step: usize,
    threshold: i32,
) -> bool {
    debug_assert!(!coefficients.is_empty());
    debug_assert!(step >= 1);

    let current = reservoir.current();
    let previous = reservoir.previous();
    let prev_len = previous.len() as isize;
    let threshold = f64::from(threshold);
    let mut saturation = false;

    let mut i = *cursor;
    while i < current.len() {
        let mut value_i = 0.0;
        let mut value_q = 0.0;
        // Walk the taps oldest-first: j counts down, k tracks the raw
        // offset of tap j relative to the current block.
        let mut j = coefficients.len() as isize - 1;
        let mut k = i as isize - j * 2;

        if k < 0 {
            let mut p = k + prev_len;
            while j >= 0 && p < prev_len {
                if p >= 0 {
                    value_i += f64::from(previous[p as usize]) * coefficients[j as usize];
                    value_q += f64::from(previous[p as usize + 1]) * coefficients[j as usize];
                }
                p += 2;
                j -= 1;
            }
            k = 0;
        }

        while j >= 0 {
            value_i += f64::from(current[k as usize]) * coefficients[j as usize];
            value_q += f64::from(current[k as usize + 1]) * coefficients[j as usize];
            k += 2;
            j -= 1;
        }

        output.push(value_i.round() as Sample);
        output.push(value_q.round() as Sample);

        if (value_i * value_i + value_q * value_q).sqrt() >= threshold {
            saturation = true;
        }

        i += step * 2;
    }

    *cursor = i;
    saturation
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn run(
        blocks: &[&[Sample]],
        coefficients: &[f64],
        step: usize,
        threshold: i32,
    ) -> (Vec<Vec<Sample>>, bool) {
        let capacity = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
        let mut reservoir = Reservoir::with_capacity(capacity);
        let mut cursor = 0;
        let mut outputs = Vec::new();
        let mut saturation = false;

        for block in blocks {
            let mut output = Vec::new();
            reservoir.swap_in(block);
            saturation |= filter_buffer(
                &reservoir,
                coefficients,
                &mut output,
                &mut cursor,
                step,
                threshold,
            );
            if !reservoir.is_empty() {
                cursor %= reservoir.len();
            }
            outputs.push(output);
        }

        (outputs, saturation)
    }

    #[test]
    fn single_tap_is_identity() {
        let input: Vec<Sample> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let (outputs, saturation) = run(&[&input], &[1.0], 1, i32::MAX);

        assert_eq!(outputs[0], input);
        assert!(!saturation);
    }

    #[test]
    fn decimation_keeps_every_step_th_pair() {
        let input: Vec<Sample> = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let (outputs, saturation) = run(&[&input], &[1.0], 2, i32::MAX);

        assert_eq!(outputs[0], vec![1, 2, 5, 6]);
        assert!(!saturation);
    }

    #[test]
    fn output_length_matches_decimation() {
        let input: Vec<Sample> = (0..24).collect();
        for step in 1..=4 {
            let (outputs, _) = run(&[&input], &[0.5, 0.5], step, i32::MAX);
            assert_eq!(outputs[0].len(), (input.len() / (step * 2)) * 2);
        }
    }

    #[test]
    fn moving_average_reaches_across_blocks() {
        let (outputs, _) = run(
            &[&[0, 0, 0, 0], &[10, 20, 10, 20]],
            &[0.5, 0.5],
            1,
            i32::MAX,
        );

        assert_eq!(outputs[0], vec![0, 0, 0, 0]);
        // First pair averages across the block boundary, the second
        // within the current block.
        assert_eq!(outputs[1], vec![5, 10, 10, 20]);
    }

    #[test]
    fn split_stream_equals_single_pass() {
        let coefficients = [0.25, 0.5, 0.25];
        let first: Vec<Sample> = vec![4, -2, 8, 6, -10, 12, 0, 14];
        let second: Vec<Sample> = vec![-6, 2, 20, -8, 10, 4, -12, 16];
        let whole: Vec<Sample> = first.iter().chain(&second).copied().collect();

        let (split, _) = run(&[&first, &second], &coefficients, 1, i32::MAX);
        let (single, _) = run(&[&whole], &coefficients, 1, i32::MAX);

        let mut joined = split[0].clone();
        joined.extend_from_slice(&split[1]);
        assert_eq!(joined, single[0]);
    }

    #[test]
    fn linear_up_to_rounding() {
        let coefficients = [0.3, 0.7];
        let x1: Vec<Sample> = vec![5, -3, 12, 9, -20, 7, 30, -1];
        let x2: Vec<Sample> = vec![-4, 11, 2, -9, 16, 3, -8, 25];
        let (alpha, beta) = (2, 3);
        let mixed: Vec<Sample> = x1
            .iter()
            .zip(&x2)
            .map(|(&a, &b)| alpha * a + beta * b)
            .collect();

        let (y1, _) = run(&[&x1], &coefficients, 1, i32::MAX);
        let (y2, _) = run(&[&x2], &coefficients, 1, i32::MAX);
        let (y_mixed, _) = run(&[&mixed], &coefficients, 1, i32::MAX);

        // Each of the three outputs is rounded once, so the identity
        // holds within (1 + |alpha| + |beta|) / 2.
        for ((&a, &b), &m) in y1[0].iter().zip(&y2[0]).zip(&y_mixed[0]) {
            let expected = alpha * a + beta * b;
            assert!((i32::from(m) - i32::from(expected)).abs() <= 3);
        }
    }

    #[test]
    fn saturation_flag_tracks_output_magnitude() {
        let input: Vec<Sample> = vec![3, 4, 1, 1];

        // |(3, 4)| == 5, flag set when the magnitude reaches the
        // threshold exactly.
        let (outputs, saturation) = run(&[&input], &[1.0], 1, 5);
        assert_eq!(outputs[0], input);
        assert!(saturation);

        let (_, saturation) = run(&[&input], &[1.0], 1, 6);
        assert!(!saturation);
    }

    #[test]
    fn cursor_remainder_carries_across_blocks() {
        // Pairs (1,2)(3,4)..(11,12) decimated by 2 must yield every
        // other pair regardless of where the block boundary falls.
        let (outputs, _) = run(
            &[&[1, 2, 3, 4, 5, 6], &[7, 8, 9, 10, 11, 12]],
            &[1.0],
            2,
            i32::MAX,
        );

        assert_eq!(outputs[0], vec![1, 2, 5, 6]);
        assert_eq!(outputs[1], vec![9, 10]);
    }

    #[test]
    fn cursor_postcondition_holds() {
        let input: Vec<Sample> = (0..12).collect();
        let mut reservoir = Reservoir::with_capacity(12);
        reservoir.swap_in(&input);

        for step in 1..=5 {
            let mut cursor = 0;
            let mut output = Vec::new();
            filter_buffer(&reservoir, &[1.0], &mut output, &mut cursor, step, i32::MAX);
            assert!(cursor >= reservoir.len());
            assert!(cursor < reservoir.len() + step * 2);
        }
    }

    #[test]
    fn coefficients_load_in_file_order() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "0.5").unwrap();
        writeln!(file, "# not a number").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  -1.25  ").unwrap();
        writeln!(file, "3e-2").unwrap();

        let coefficients = read_coefficients(file.path()).expect("read");
        assert_eq!(coefficients, vec![0.5, -1.25, 0.03]);
    }

    #[test]
    fn missing_coefficient_file_is_an_error() {
        assert!(read_coefficients(Path::new("/nonexistent/bandpass.txt")).is_err());
    }
}
