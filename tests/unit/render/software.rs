use super::*;

use crate::model::costume::Costume;
use crate::model::filters::Filters;
use crate::model::target::{Sprite, Stage};

fn solid_costume(w: u32, h: u32, rgba: [u8; 4], rcx: f64, rcy: f64) -> Costume {
    let mut pixels = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..w * h {
        pixels.extend_from_slice(&rgba);
    }
    Costume::from_bitmap(w, h, pixels, rcx, rcy, 1.0).unwrap()
}

fn backdrop(rgba: [u8; 4]) -> Costume {
    solid_costume(480, 360, rgba, 240.0, 180.0)
}

const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];

fn centered_sprite(w: u32, h: u32, rgba: [u8; 4]) -> Sprite {
    Sprite::new(vec![solid_costume(w, h, rgba, w as f64 / 2.0, h as f64 / 2.0)])
}

fn renderer() -> SoftwareRenderer {
    SoftwareRenderer::new(RendererConfig::default())
}

#[test]
fn empty_stage_leaves_the_sprite_layer_transparent() {
    let stage = Stage::new(vec![backdrop(BLUE)]);
    let mut r = renderer();
    r.draw_frame(&stage).unwrap();

    assert!(!r.sprite_surface.any_pixel(|p| p[3] != 0));
    assert_eq!(r.stage_surface.pixel(0, 0), BLUE);
    assert_eq!(r.stage_surface.pixel(479, 359), BLUE);

    let frame = r.frame().unwrap();
    assert_eq!(frame.pixel(240, 180), BLUE);
}

#[test]
fn centered_white_sprite_covers_the_center_pixel() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, WHITE));
    let mut r = renderer();
    r.draw_frame(&stage).unwrap();

    let frame = r.frame().unwrap();
    assert_eq!(frame.pixel(240, 180), WHITE);
    assert_eq!(frame.pixel(239, 179), WHITE);
    assert_eq!(frame.pixel(241, 180), BLUE);
    assert_eq!(frame.pixel(238, 180), BLUE);
}

#[test]
fn point_query_matches_the_drawn_extent() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, WHITE));
    let mut r = renderer();

    assert!(r.sprite_touches_point(&stage, 0, 0.0, 0.0).unwrap());
    assert!(!r.sprite_touches_point(&stage, 0, 10.0, 10.0).unwrap());
    assert!(r.sprite_touches_point(&stage, 99, 0.0, 0.0).is_err());
}

#[test]
fn left_right_mirror_flips_the_costume() {
    // Costume with only its top-left pixel opaque.
    let mut pixels = vec![0u8; 16];
    pixels[..4].copy_from_slice(&WHITE);
    let costume = Costume::from_bitmap(2, 2, pixels, 1.0, 1.0, 1.0).unwrap();
    let mut sprite = Sprite::new(vec![costume]);
    sprite.rotation_style = RotationStyle::LeftRight;

    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(sprite);
    let mut r = renderer();

    // Facing right: the opaque quarter sits left of center.
    assert!(r.sprite_touches_point(&stage, 0, -0.6, 0.6).unwrap());
    assert!(!r.sprite_touches_point(&stage, 0, 0.6, 0.6).unwrap());

    stage.children[0].direction = -90.0;
    r.draw_frame(&stage).unwrap();
    let frame = r.frame().unwrap();
    // Mirrored: now right of center on screen.
    assert_eq!(frame.pixel(240, 179), WHITE);
    assert_eq!(frame.pixel(239, 179), BLUE);
    assert!(r.sprite_touches_point(&stage, 0, 0.6, 0.6).unwrap());
    assert!(!r.sprite_touches_point(&stage, 0, -0.6, 0.6).unwrap());
}

#[test]
fn ghost_halves_alpha_on_the_sprite_layer() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, RED);
    sprite.filters = Filters {
        ghost: 50.0,
        ..Filters::default()
    };
    stage.children.push(sprite);
    let mut r = renderer();
    r.draw_frame(&stage).unwrap();

    let px = r.sprite_surface.pixel(240, 180);
    assert!((127..=129).contains(&px[3]), "alpha {}", px[3]);
    assert_eq!(px[1], 0);
}

#[test]
fn invisible_children_are_not_drawn() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, WHITE);
    sprite.visible = false;
    stage.children.push(sprite);
    let mut r = renderer();
    r.draw_frame(&stage).unwrap();
    assert!(!r.sprite_surface.any_pixel(|p| p[3] != 0));
}

#[test]
fn stage_surface_rerenders_only_when_marked() {
    let mut stage = Stage::new(vec![backdrop(BLUE), backdrop(RED)]);
    let mut r = renderer();
    r.draw_frame(&stage).unwrap();
    assert_eq!(r.stage_surface.pixel(0, 0), BLUE);

    stage.current_costume = 1;
    r.draw_frame(&stage).unwrap();
    assert_eq!(r.stage_surface.pixel(0, 0), RED);

    // Filter changes re-render only through the explicit notification.
    stage.filters.ghost = 100.0;
    r.draw_frame(&stage).unwrap();
    assert_eq!(r.stage_surface.pixel(0, 0), RED);
    r.on_stage_filters_changed();
    r.draw_frame(&stage).unwrap();
    assert_eq!(r.stage_surface.pixel(0, 0)[3], 0);
}

#[test]
fn pen_clear_leaves_the_layer_fully_transparent() {
    let mut r = renderer();
    let red = crate::model::pen::PenColor::opaque(1.0, 0.0, 0.0);
    r.pen_dot(&red, 4.0, 0.0, 0.0).unwrap();
    r.pen_line(&red, 2.0, 0.0, 0.0, 10.0, 0.0).unwrap();
    assert!(r.pen_surface.any_pixel(|p| p[3] != 0));
    r.pen_clear().unwrap();
    assert!(!r.pen_surface.any_pixel(|p| p[3] != 0));
    assert!(!r.pen_written);
}

#[test]
fn pen_dot_and_line_land_on_expected_pixels() {
    let mut r = renderer();
    let red = crate::model::pen::PenColor::opaque(1.0, 0.0, 0.0);
    r.pen_dot(&red, 4.0, 0.0, 0.0).unwrap();
    r.pen_line(&red, 2.0, 0.0, 0.0, 10.0, 0.0).unwrap();

    assert_eq!(r.pen_surface.pixel(240, 180), RED);
    for x in 240..=250 {
        assert_eq!(r.pen_surface.pixel(x, 180), RED, "x={x}");
    }
    assert_eq!(r.pen_surface.pixel(260, 180)[3], 0);
}

#[test]
fn odd_width_lines_cover_a_single_row() {
    let mut r = renderer();
    let red = crate::model::pen::PenColor::opaque(1.0, 0.0, 0.0);
    r.pen_line(&red, 1.0, -10.0, 0.0, 10.0, 0.0).unwrap();

    let mut rows = Vec::new();
    for y in 170..190 {
        if r.pen_surface.pixel(235, y)[3] != 0 {
            rows.push(y);
        }
    }
    assert_eq!(rows, vec![179]);
}

#[test]
fn pen_layer_grows_immediately_but_shrinks_at_clear() {
    let mut r = renderer();
    let red = crate::model::pen::PenColor::opaque(1.0, 0.0, 0.0);

    r.resize(2.0);
    assert_eq!((r.pen_surface.width(), r.pen_surface.height()), (960, 720));

    r.pen_dot(&red, 4.0, 0.0, 0.0).unwrap();
    r.resize(1.0);
    // Content survives: the shrink waits for the next clear.
    assert_eq!((r.pen_surface.width(), r.pen_surface.height()), (960, 720));
    assert_eq!(r.pending_pen_zoom, Some(1.0));
    assert!(r.pen_surface.any_pixel(|p| p[3] != 0));

    r.pen_clear().unwrap();
    assert_eq!((r.pen_surface.width(), r.pen_surface.height()), (480, 360));
    assert_eq!(r.pending_pen_zoom, None);
}

#[test]
fn unwritten_pen_layer_shrinks_immediately() {
    let mut r = renderer();
    r.resize(3.0);
    assert_eq!(r.pen_surface.width(), 1440);
    r.resize(1.0);
    assert_eq!(r.pen_surface.width(), 480);
}

#[test]
fn pen_stamp_honors_effects() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, RED);
    sprite.filters = Filters {
        ghost: 100.0,
        ..Filters::default()
    };
    stage.children.push(sprite);
    stage.children.push(centered_sprite(2, 2, GREEN));

    let mut r = renderer();
    // A fully ghosted sprite stamps nothing.
    r.pen_stamp(&stage, 0).unwrap();
    assert!(!r.pen_surface.any_pixel(|p| p[3] != 0));
    r.pen_stamp(&stage, 1).unwrap();
    assert_eq!(r.pen_surface.pixel(240, 180), GREEN);
}

#[test]
fn intersection_is_pixel_exact_and_symmetric() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    stage.children.push(centered_sprite(2, 2, GREEN));
    let mut r = renderer();

    assert!(r.sprites_intersect(&stage, 0, &[1]).unwrap());
    assert!(r.sprites_intersect(&stage, 1, &[0]).unwrap());

    stage.children[1].x = 10.0;
    assert!(!r.sprites_intersect(&stage, 0, &[1]).unwrap());
    assert!(!r.sprites_intersect(&stage, 1, &[0]).unwrap());
}

#[test]
fn edge_contact_does_not_intersect() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    let mut b = centered_sprite(2, 2, GREEN);
    // Bounds [-1, 1] and [1, 3]: touching, not overlapping.
    b.x = 2.0;
    stage.children.push(b);
    let mut r = renderer();
    assert!(!r.sprites_intersect(&stage, 0, &[1]).unwrap());
}

#[test]
fn invisible_and_fully_ghosted_sprites_never_intersect() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    let mut hidden = centered_sprite(2, 2, GREEN);
    hidden.visible = false;
    stage.children.push(hidden);
    let mut r = renderer();
    assert!(!r.sprites_intersect(&stage, 0, &[1]).unwrap());

    stage.children[1].visible = true;
    stage.children[1].filters.ghost = 100.0;
    assert!(!r.sprites_intersect(&stage, 0, &[1]).unwrap());
}

#[test]
fn touches_color_sees_the_backdrop_through_the_sprite_mask() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    let mut r = renderer();

    assert!(
        r.sprite_touches_color(&stage, 0, crate::foundation::core::Rgb24(0x0000ff))
            .unwrap()
    );
    assert!(
        !r.sprite_touches_color(&stage, 0, crate::foundation::core::Rgb24(0x00ff00))
            .unwrap()
    );
}

#[test]
fn touches_color_includes_other_sprites_above_the_backdrop() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    stage.children.push(centered_sprite(2, 2, GREEN));
    let mut r = renderer();

    // The green sprite covers the probe's whole footprint.
    assert!(
        r.sprite_touches_color(&stage, 0, crate::foundation::core::Rgb24(0x00ff00))
            .unwrap()
    );
    assert!(
        !r.sprite_touches_color(&stage, 0, crate::foundation::core::Rgb24(0x0000ff))
            .unwrap()
    );
}

#[test]
fn color_touches_color_requires_both_matches_at_one_pixel() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, RED));
    let mut r = renderer();

    let red = crate::foundation::core::Rgb24(0xff0000);
    let blue = crate::foundation::core::Rgb24(0x0000ff);
    assert!(r.sprite_color_touches_color(&stage, 0, red, blue).unwrap());
    assert!(!r.sprite_color_touches_color(&stage, 0, blue, red).unwrap());
}

#[test]
fn color_touches_color_compares_the_displayed_sprite_color() {
    let config = RendererConfig {
        accurate_filters: true,
        ..RendererConfig::default()
    };
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, RED);
    sprite.filters.color = 100.0; // half turn: drawn as cyan
    stage.children.push(sprite);
    let mut r = SoftwareRenderer::new(config);

    let cyan = crate::foundation::core::Rgb24(0x00ffff);
    let red = crate::foundation::core::Rgb24(0xff0000);
    let blue = crate::foundation::core::Rgb24(0x0000ff);
    // The probe side sees the rendered color, not the raw costume.
    assert!(r.sprite_color_touches_color(&stage, 0, cyan, blue).unwrap());
    assert!(!r.sprite_color_touches_color(&stage, 0, red, blue).unwrap());
}

#[test]
fn color_queries_ignore_the_probes_own_ghost() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, RED);
    sprite.filters.ghost = 100.0;
    stage.children.push(sprite);
    let mut r = renderer();

    // Masking runs with effects disabled, so the fully ghosted sprite still
    // touches the backdrop color.
    assert!(
        r.sprite_touches_color(&stage, 0, crate::foundation::core::Rgb24(0x0000ff))
            .unwrap()
    );
}

#[test]
fn accurate_filters_shift_hue_in_the_frame() {
    let config = RendererConfig {
        accurate_filters: true,
        ..RendererConfig::default()
    };
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    let mut sprite = centered_sprite(2, 2, RED);
    sprite.filters.color = 100.0; // half turn: red -> cyan
    stage.children.push(sprite);

    let mut r = SoftwareRenderer::new(config);
    r.draw_frame(&stage).unwrap();
    assert_eq!(r.sprite_surface.pixel(240, 180), [0, 255, 255, 255]);
}

#[test]
fn zoomed_output_scales_the_frame() {
    let mut stage = Stage::new(vec![backdrop(BLUE)]);
    stage.children.push(centered_sprite(2, 2, WHITE));
    let mut r = renderer();
    r.resize(2.0);
    r.draw_frame(&stage).unwrap();
    let frame = r.frame().unwrap();
    assert_eq!((frame.width, frame.height), (960, 720));
    assert_eq!(frame.pixel(480, 360), WHITE);
    assert_eq!(frame.pixel(477, 360), BLUE);
}
