//! Property tests for the register window and condition code invariants.

use leon3_iss::cpu::alu::{add_icc, condition, sub_icc, udiv};
use leon3_iss::cpu::regfile::{decrement_window, increment_window, physical};
use leon3_iss::cpu::special::{window_mask, Icc, PSR_CWP_MASK};
use proptest::prelude::*;

/// (nwindows, cwp, wim) with cwp < nwindows and wim limited to real windows
fn window_state() -> impl Strategy<Value = (u32, u32, u32)> {
    (2u32..=32).prop_flat_map(|n| (Just(n), 0..n, any::<u32>().prop_map(move |w| w & window_mask(n))))
}

fn icc() -> impl Strategy<Value = Icc> {
    any::<(bool, bool, bool, bool)>().prop_map(|(n, z, v, c)| Icc { n, z, v, c })
}

proptest! {
    #[test]
    fn increment_fails_iff_next_window_invalid((n, cwp, wim) in window_state(), upper in any::<u32>()) {
        let psr0 = (upper & !PSR_CWP_MASK) | cwp;
        let mut psr = psr0;
        let next = (cwp + 1) % n;
        let ok = increment_window(&mut psr, wim, n);

        prop_assert_eq!(ok, wim & (1 << next) == 0);
        if ok {
            prop_assert_eq!(psr, (psr0 & !PSR_CWP_MASK) | next);
        } else {
            prop_assert_eq!(psr, psr0);
        }
    }

    #[test]
    fn increment_then_decrement_restores_cwp((n, cwp, wim) in window_state()) {
        // the window we come back to must itself be valid
        let wim = wim & !(1 << cwp);
        let mut psr = cwp;
        if increment_window(&mut psr, wim, n) {
            prop_assert!(decrement_window(&mut psr, wim, n));
            prop_assert_eq!(psr, cwp);
            for r in 0..32 {
                prop_assert_eq!(physical(r, psr, n), physical(r, cwp, n));
            }
        }
    }

    #[test]
    fn outs_alias_ins_of_next_window((n, cwp, _wim) in window_state(), r in 0u32..8) {
        let callee = (cwp + n - 1) % n;
        prop_assert_eq!(physical(8 + r, cwp, n), physical(24 + r, callee, n));
        // globals never move
        prop_assert_eq!(physical(r, cwp, n), physical(r, callee, n));
    }

    #[test]
    fn add_flags_match_wide_arithmetic(a in any::<u32>(), b in any::<u32>()) {
        let r = a.wrapping_add(b);
        let icc = add_icc(a, b, r);
        prop_assert_eq!(icc.c, (a as u64 + b as u64) > u32::MAX as u64);
        prop_assert_eq!(icc.v, (a as i32).checked_add(b as i32).is_none());
        prop_assert_eq!(icc.n, (r as i32) < 0);
        prop_assert_eq!(icc.z, r == 0);
    }

    #[test]
    fn sub_flags_match_wide_arithmetic(a in any::<u32>(), b in any::<u32>()) {
        let r = a.wrapping_sub(b);
        let icc = sub_icc(a, b, r);
        prop_assert_eq!(icc.c, a < b);
        prop_assert_eq!(icc.v, (a as i32).checked_sub(b as i32).is_none());
        prop_assert_eq!(icc.n, (r as i32) < 0);
        prop_assert_eq!(icc.z, r == 0);
    }

    #[test]
    fn condition_halves_are_complements(cond in 0u8..8, flags in icc()) {
        prop_assert_eq!(condition(cond | 8, flags), !condition(cond, flags));
    }

    #[test]
    fn signed_compare_conditions(a in any::<i32>(), b in any::<i32>()) {
        let r = (a as u32).wrapping_sub(b as u32);
        let icc = sub_icc(a as u32, b as u32, r);
        prop_assert_eq!(condition(0xA, icc), a > b);   // bg
        prop_assert_eq!(condition(0x3, icc), a < b);   // bl
        prop_assert_eq!(condition(0xC, icc), (a as u32) > (b as u32)); // bgu
        prop_assert_eq!(condition(0x4, icc), (a as u32) <= (b as u32)); // bleu
    }

    #[test]
    fn udiv_clamps_like_wide_division(y in any::<u32>(), a in any::<u32>(), b in 1u32..) {
        let wide = (((y as u64) << 32) | a as u64) / b as u64;
        let (q, overflow) = udiv(y, a, b).unwrap();
        prop_assert_eq!(overflow, wide > u32::MAX as u64);
        prop_assert_eq!(q as u64, wide.min(u32::MAX as u64));
    }
}
