use std::cmp::Ordering;

/// Compares two 16-bit RTP sequence numbers, treating the sequence space as
///  circular with a half-space forward/backward split: `a` is greater than `b`
///  if it is at most 32767 steps ahead of it mod 65536.
///
/// The comparison is antisymmetric for all pairs, but transitive only within a
///  half-window of 32768. Callers must not compare sequences further apart than
///  that - the bounded reorder buffer keeps all live sequences well inside a
///  single window.
pub fn compare_seq(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    // a != b, so the wrapped difference is in 1..=0xFFFF
    if a.wrapping_sub(b) <= 0x7FFF {
        Ordering::Greater
    }
    else {
        Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::equal_zero(0, 0, Ordering::Equal)]
    #[case::equal_max(0xFFFF, 0xFFFF, Ordering::Equal)]
    #[case::adjacent(5, 4, Ordering::Greater)]
    #[case::adjacent_rev(4, 5, Ordering::Less)]
    #[case::wrap_forward(0, 0xFFFF, Ordering::Greater)]
    #[case::wrap_backward(0xFFFF, 0, Ordering::Less)]
    #[case::wrap_span(3, 0xFFFD, Ordering::Greater)]
    #[case::half_window_edge(0x7FFF, 0, Ordering::Greater)]
    #[case::past_half_window(0x8000, 0, Ordering::Less)]
    #[case::half_window_wrapped(0x1234, 0x9235, Ordering::Greater)]
    fn test_compare_seq(#[case] a: u16, #[case] b: u16, #[case] expected: Ordering) {
        assert_eq!(compare_seq(a, b), expected);
    }

    /// `compare_seq(a,b)` must be the exact inverse of `compare_seq(b,a)` for all
    ///  pairs. Sampling with coarse strides plus the wraparound boundaries keeps
    ///  the pair count manageable while still crossing every interesting edge.
    #[test]
    fn test_compare_seq_antisymmetry() {
        let samples: Vec<u16> = (0..=0xFFFFu16)
            .step_by(251)
            .chain([0, 1, 0x7FFE, 0x7FFF, 0x8000, 0x8001, 0xFFFE, 0xFFFF])
            .collect();

        for &a in &samples {
            for &b in &samples {
                assert_eq!(
                    compare_seq(a, b),
                    compare_seq(b, a).reverse(),
                    "a={} b={}", a, b
                );
            }
        }
    }

    #[test]
    fn test_compare_seq_reflexive() {
        for a in (0..=0xFFFFu16).step_by(97) {
            assert_eq!(compare_seq(a, a), Ordering::Equal);
        }
    }
}
