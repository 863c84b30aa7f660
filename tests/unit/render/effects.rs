use super::*;

use crate::model::filters::Filters;

fn filters(color: f64, brightness: f64) -> Filters {
    Filters {
        color,
        brightness,
        ..Filters::default()
    }
}

#[test]
fn near_black_floors_to_dim_red() {
    // v < 0.055 forces (h, s, v) = (0, 1, 0.055): pure red at the floor.
    let out = scratch_hue_shift([0, 0, 0], 0.0);
    assert_eq!(out[1], 0);
    assert_eq!(out[2], 0);
    assert_eq!(out[0], (0.055f32 * 255.0).round() as u8);
}

#[test]
fn near_gray_floors_to_slight_saturation() {
    // s < 0.09 forces saturation 0.09 at hue 0 before the shift.
    let out = scratch_hue_shift([128, 128, 128], 0.0);
    assert!(out[0] > out[1]);
    assert_eq!(out[1], out[2]);
}

#[test]
fn hue_shift_wraps_modulo_one() {
    let full_turn = scratch_hue_shift([255, 0, 0], 1.0);
    let none = scratch_hue_shift([255, 0, 0], 0.0);
    assert_eq!(full_turn, none);

    let back = scratch_hue_shift([255, 0, 0], -0.25);
    let forward = scratch_hue_shift([255, 0, 0], 0.75);
    assert_eq!(back, forward);
}

#[test]
fn half_turn_sends_red_to_cyan() {
    assert_eq!(scratch_hue_shift([255, 0, 0], 0.5), [0, 255, 255]);
}

#[test]
fn build_skips_inactive_filters() {
    let mut memo = std::collections::HashMap::new();
    assert!(PixelFx::build(&filters(0.0, 0.0), true, &mut memo).is_none());
    assert!(PixelFx::build(&Filters { ghost: 80.0, ..Filters::default() }, true, &mut memo).is_none());
    assert!(PixelFx::build(&filters(50.0, 0.0), true, &mut memo).is_some());
}

#[test]
fn accurate_brightness_is_additive_and_clamped() {
    let mut memo = std::collections::HashMap::new();
    let mut fx = PixelFx::build(&filters(0.0, 100.0), true, &mut memo).unwrap();
    assert_eq!(fx.apply([10, 100, 250, 200]), [255, 255, 255, 200]);

    let mut memo = std::collections::HashMap::new();
    let mut fx = PixelFx::build(&filters(0.0, -50.0), true, &mut memo).unwrap();
    assert_eq!(fx.apply([200, 100, 27, 64]), [72, 0, 0, 64]);
}

#[test]
fn accurate_hue_memoizes_per_packed_rgb() {
    let mut memo = std::collections::HashMap::new();
    let mut fx = PixelFx::build(&filters(100.0, 0.0), true, &mut memo).unwrap();
    let first = fx.apply([255, 0, 0, 255]);
    let second = fx.apply([255, 0, 0, 255]);
    assert_eq!(first, second);
    drop(fx);
    assert_eq!(memo.len(), 1);
}

#[test]
fn build_clears_a_stale_memo() {
    let mut memo = std::collections::HashMap::new();
    memo.insert(0xff0000, [1, 2, 3]);
    let mut fx = PixelFx::build(&filters(100.0, 0.0), true, &mut memo).unwrap();
    // A half turn of red is cyan, not the stale entry.
    assert_eq!(fx.apply([255, 0, 0, 255]), [0, 255, 255, 255]);
}

#[test]
fn matrix_mode_brightness_is_multiplicative() {
    let mut memo = std::collections::HashMap::new();
    let mut fx = PixelFx::build(&filters(0.0, 100.0), false, &mut memo).unwrap();
    // CSS brightness(200%): channels double; black stays black.
    assert_eq!(fx.apply([100, 50, 0, 255]), [200, 100, 0, 255]);
    assert_eq!(fx.apply([0, 0, 0, 255]), [0, 0, 0, 255]);
}

#[test]
fn matrix_mode_preserves_alpha_and_identity() {
    let mut memo = std::collections::HashMap::new();
    let m = css_filter_matrix(&filters(0.0, 0.0));
    // Identity hue rotation at brightness 100%.
    assert!((m[0] - 1.0).abs() < 1.0e-5);
    assert!((m[6] - 1.0).abs() < 1.0e-5);
    assert!(m[1].abs() < 1.0e-5);

    let mut fx = PixelFx::build(&filters(100.0, 0.0), false, &mut memo).unwrap();
    assert_eq!(fx.apply([10, 20, 30, 99])[3], 99);
}
