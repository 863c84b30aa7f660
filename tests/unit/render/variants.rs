use super::*;

#[test]
fn variant_keys_sort_and_dedup() {
    let key = variant_key(&[
        EffectFlag::Color,
        EffectFlag::Mosaic,
        EffectFlag::Color,
        EffectFlag::Ghost,
    ]);
    assert_eq!(
        key.as_slice(),
        &[EffectFlag::Mosaic, EffectFlag::Ghost, EffectFlag::Color]
    );
    assert_eq!(key, variant_key(&[EffectFlag::Ghost, EffectFlag::Color, EffectFlag::Mosaic]));
}

#[test]
fn shader_source_declares_every_flag_once() {
    let src = sprite_shader_source(&EffectFlag::SHAPE_ONLY);
    assert!(src.contains("const ENABLE_MOSAIC: bool = true;"));
    assert!(src.contains("const ENABLE_PIXELATE: bool = true;"));
    assert!(src.contains("const ENABLE_WHIRL: bool = true;"));
    assert!(src.contains("const ENABLE_FISHEYE: bool = true;"));
    assert!(src.contains("const ENABLE_GHOST: bool = false;"));
    assert!(src.contains("const ENABLE_BRIGHTNESS: bool = false;"));
    assert!(src.contains("const ENABLE_COLOR: bool = false;"));
    assert_eq!(src.matches("const ENABLE_MOSAIC").count(), 1);
}

#[test]
fn effect_stages_appear_in_contract_order() {
    // mosaic -> pixelate -> whirl -> fisheye -> sample -> discard ->
    // ghost -> brightness -> color; permuting any of these is observable.
    let src = sprite_shader_source(&EffectFlag::ALL);
    let positions = [
        "fract(u.mosaic",
        "u.pixelate != 0.0",
        "u.whirl * whirl_factor",
        "u.fisheye",
        "textureSample(t_costume",
        "discard;",
        "u.opacity",
        "u.brightness",
        "rgb_to_hsv(color.rgb)",
    ]
    .map(|needle| src.find(needle).unwrap_or_else(|| panic!("missing {needle}")));
    for pair in positions.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn uniform_struct_matches_the_wgsl_layout() {
    assert_eq!(std::mem::size_of::<SpriteUniforms>(), 96);
    assert_eq!(std::mem::offset_of!(SpriteUniforms, opacity), 48);
    assert_eq!(std::mem::offset_of!(SpriteUniforms, size), 80);
}

#[test]
fn uniforms_carry_converted_filter_values() {
    let filters = crate::model::filters::Filters {
        ghost: 50.0,
        brightness: 100.0,
        color: 100.0,
        mosaic: 25.0,
        pixelate: 25.0,
        whirl: 180.0,
        fisheye: 100.0,
    };
    let u = SpriteUniforms::for_child(&Mat3::identity(), &filters, 32, 16);
    assert_eq!(u.opacity, 0.5);
    assert_eq!(u.brightness, 1.0);
    assert_eq!(u.color_shift, 0.5);
    assert_eq!(u.mosaic, 4.0);
    assert_eq!(u.pixelate, 2.5);
    assert!((u.whirl + std::f32::consts::PI).abs() < 1.0e-6);
    assert_eq!(u.fisheye, 2.0);
    assert_eq!(u.size, [32.0, 16.0]);
}
