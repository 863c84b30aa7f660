use super::*;

fn solid(w: u32, h: u32) -> Vec<u8> {
    vec![255; (w * h * 4) as usize]
}

#[test]
fn bitmap_length_is_validated() {
    assert!(CostumeLod::new(2, 2, vec![0; 15]).is_err());
    assert!(CostumeLod::new(0, 2, Vec::new()).is_err());
    assert!(CostumeLod::new(2, 2, solid(2, 2)).is_ok());
}

#[test]
fn lod_ids_are_unique() {
    let a = CostumeLod::new(1, 1, solid(1, 1)).unwrap();
    let b = CostumeLod::new(1, 1, solid(1, 1)).unwrap();
    assert_ne!(a.id(), b.id());
}

#[test]
fn pixel_sampling_is_bounds_checked() {
    let lod = CostumeLod::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(lod.pixel(0, 0), Some([1, 2, 3, 4]));
    assert_eq!(lod.pixel(1, 0), Some([5, 6, 7, 8]));
    assert_eq!(lod.pixel(2, 0), None);
    assert_eq!(lod.pixel(-1, 0), None);
    assert_eq!(lod.pixel(0, 1), None);
}

#[test]
fn costume_needs_a_lod_and_positive_resolution() {
    assert!(Costume::new(0.0, 0.0, 1.0, Vec::new()).is_err());
    let lod = CostumeLod::new(2, 2, solid(2, 2)).unwrap();
    assert!(Costume::new(0.0, 0.0, 0.0, vec![lod]).is_err());
}

#[test]
fn scale_inverts_bitmap_resolution() {
    let c = Costume::from_bitmap(4, 4, solid(4, 4), 2.0, 2.0, 2.0).unwrap();
    assert_eq!(c.scale(), 0.5);
    assert_eq!(c.width(), 4);
}

#[test]
fn lod_selection_prefers_the_sparsest_sufficient_raster() {
    let low = CostumeLod::new(4, 4, solid(4, 4)).unwrap();
    let high = CostumeLod::new(8, 8, solid(8, 8)).unwrap();
    let c = Costume::new(0.0, 0.0, 1.0, vec![low.clone(), high.clone()]).unwrap();

    assert_eq!(c.lod(1.0).id(), low.id());
    assert_eq!(c.lod(2.0).id(), high.id());
    // Nothing dense enough: densest wins.
    assert_eq!(c.lod(8.0).id(), high.id());

    assert_eq!(c.lod_pixel_scale(&high), 0.5);
    assert_eq!(c.lod_pixel_scale(&low), 1.0);
}
