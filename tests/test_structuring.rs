mod common;

use common::*;
use morphdetect::detection::hitmiss::hit_or_miss;
use morphdetect::detection::morphology::Morphology;
use morphdetect::detection::structuring::{DONT_CARE, HIT, MIN_HIT_CELLS, MISS, StructuringElement};

fn square_mask() -> image::GrayImage {
    mask(30, 30, &[(5, 5, 20, 20)])
}

#[test]
fn cells_are_three_valued_and_layered() {
    let element = StructuringElement::synthesize(&square_mask(), 0, 3, &Morphology::default());
    let cells = element.cells();

    assert_eq!(element.dim(), (30, 30));
    assert!(cells.iter().all(|&c| c == HIT || c == DONT_CARE || c == MISS));
    // 20x20 square eroded three times on each side
    assert_eq!(element.hit_count(), 14 * 14);
    assert_eq!(element.miss_count(), 30 * 30 - 20 * 20);
    assert_eq!(cells[[15, 15]], HIT);
    assert_eq!(cells[[5, 5]], DONT_CARE);
    assert_eq!(cells[[0, 0]], MISS);
}

#[test]
fn scale_offsets_change_element_size() {
    let morph = Morphology::default();
    let shrunk = StructuringElement::synthesize(&square_mask(), -2, 1, &morph);
    let grown = StructuringElement::synthesize(&square_mask(), 2, 1, &morph);

    assert_eq!(shrunk.dim(), (26, 26));
    assert_eq!(grown.dim(), (34, 34));
    assert!(shrunk.hit_count() < grown.hit_count());
    assert!(shrunk.is_usable() && grown.is_usable());
}

#[test]
fn tiny_objects_fall_back_to_whole_mask() {
    let dot = mask(9, 9, &[(3, 3, 2, 2)]);
    let element = StructuringElement::synthesize(&dot, 0, 4, &Morphology::default());

    assert_eq!(element.hit_count(), 4);
    assert!(element.hit_count() < MIN_HIT_CELLS);
    assert!(!element.is_usable());
}

#[test]
fn objects_eroded_away_give_empty_elements() {
    let morph = Morphology::default();
    let thin = mask(6, 60, &[(0, 0, 6, 60)]);

    for offset in [-3, -4, -8] {
        let element = StructuringElement::synthesize(&thin, offset, 5, &morph);
        assert!(element.is_empty(), "offset {}", offset);
        assert!(!element.is_usable());
        assert!(element.rotated(90.0).is_empty());
    }

    let block = mask(6, 6, &[(0, 0, 6, 6)]);
    assert!(StructuringElement::synthesize(&block, -8, 5, &morph).is_empty());
    assert_eq!(StructuringElement::synthesize(&thin, -2, 5, &morph).dim(), (56, 2));
}

#[test]
fn quarter_turns_preserve_cell_counts() {
    let bar = mask(12, 24, &[(3, 3, 6, 18)]);
    let element = StructuringElement::synthesize(&bar, 0, 1, &Morphology::default());

    let turned = element.rotated(90.0);
    assert_eq!(turned.dim(), (12, 24));
    assert_eq!(turned.hit_count(), element.hit_count());
    assert_eq!(turned.miss_count(), element.miss_count());

    let back = turned.rotated(270.0);
    assert_eq!(back.cells(), element.cells());
}

#[test]
fn element_finds_its_own_mask() {
    let object = square_mask();
    let element = StructuringElement::synthesize(&object, 0, 2, &Morphology::default());

    let mut scene = mask(80, 60, &[(30, 20, 20, 20)]);
    let matches = hit_or_miss(&scene, &element);
    let found: Vec<_> = matches
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] == 1)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert_eq!(found, vec![(40, 30)]);

    // Joined to a neighbour the shape no longer fits
    for x in 50..55 {
        scene.put_pixel(x, 25, image::Luma([255]));
    }
    assert!(hit_or_miss(&scene, &element).pixels().all(|p| p[0] == 0));
}
