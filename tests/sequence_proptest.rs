//! Property tests for modular sequence comparison across the full `u32`
//! space, since the unit tests in `src/seq.rs` only cover a handful of
//! hand-picked points.

use eccvpn::seq::Sequence;
use proptest::prelude::*;

proptest! {
    #[test]
    fn before_and_after_are_consistent(a in any::<u32>(), b in any::<u32>()) {
        let a = Sequence(a);
        let b = Sequence(b);
        prop_assert_eq!(a.before(b), b.after(a));
        prop_assert_eq!(a.before_or_equal(b), b.after_or_equal(a));
    }

    #[test]
    fn before_or_equal_is_exactly_before_or_eq(a in any::<u32>(), b in any::<u32>()) {
        let a = Sequence(a);
        let b = Sequence(b);
        prop_assert_eq!(a.before_or_equal(b), a.before(b) || a == b);
    }

    #[test]
    fn ordering_is_antisymmetric_except_at_the_exact_half_point(a in any::<u32>(), b in any::<u32>()) {
        let a = Sequence(a);
        let b = Sequence(b);
        let diff = b.0.wrapping_sub(a.0);
        if a != b && diff != 0x8000_0000 {
            prop_assert_ne!(a.before(b), b.before(a));
        }
    }

    #[test]
    fn a_sequence_is_always_before_or_equal_itself(a in any::<u32>()) {
        let a = Sequence(a);
        prop_assert!(a.before_or_equal(a));
        prop_assert!(!a.before(a));
    }

    #[test]
    fn advancing_by_a_small_step_is_after(a in any::<u32>(), step in 1u32..0x7fff_ffff) {
        let a = Sequence(a);
        let b = a.wrapping_add(step);
        prop_assert!(b.after(a));
        prop_assert!(a.before(b));
    }

    #[test]
    fn window_slot_is_stable_under_full_window_advances(a in any::<u32>(), hist in 1u32..=65536) {
        let a = Sequence(a);
        let advanced = a.wrapping_add(hist);
        prop_assert_eq!(a.window_slot(hist), advanced.window_slot(hist));
    }

    #[test]
    fn window_slot_is_always_within_bounds(a in any::<u32>(), hist in 1u32..=65536) {
        let a = Sequence(a);
        prop_assert!(a.window_slot(hist) < hist);
    }
}
