use nalgebra::Vector3;

/// A canonically ordered entity pair with `low < high`.
///
/// Stored pairwise records always use this orientation, regardless of which
/// entity the raw computation treated as "first". The stored force follows the
/// convention "force exerted on `low` by `high`", so a swap during
/// canonicalization must negate the force vector. Keeping a single orientation
/// removes the need to store or search for both `(i, j)` and `(j, i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub low: usize,
    pub high: usize,
}

impl PairKey {
    /// Canonicalizes `(i, j)` and reports whether the operands were swapped.
    /// The caller is responsible for negating the associated force on swap.
    pub fn ordered(i: usize, j: usize) -> (Self, bool) {
        if i > j {
            (Self { low: j, high: i }, true)
        } else {
            (Self { low: i, high: j }, false)
        }
    }
}

/// Orients a pairwise force to match the canonical pair order.
pub fn oriented(force: Vector3<f64>, swapped: bool) -> Vector3<f64> {
    if swapped { -force } else { force }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_keeps_already_canonical_pair() {
        let (key, swapped) = PairKey::ordered(2, 7);
        assert_eq!(key, PairKey { low: 2, high: 7 });
        assert!(!swapped);
    }

    #[test]
    fn ordered_swaps_reversed_pair() {
        let (key, swapped) = PairKey::ordered(7, 2);
        assert_eq!(key, PairKey { low: 2, high: 7 });
        assert!(swapped);
    }

    #[test]
    fn oriented_negates_only_on_swap() {
        let f = Vector3::new(1.0, -2.0, 3.0);
        assert_eq!(oriented(f, false), f);
        assert_eq!(oriented(f, true), -f);
    }
}
