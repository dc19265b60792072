//! End-to-end behaviour of the registry, the editor and KML round trips

use mapfence::{ConflictReason, EditState, Editor, Point, Polygon, Registry, Ring};

fn ring(coords: &[(f64, f64)]) -> Ring {
    coords.iter().copied().map(Point::from).collect()
}

fn square(lat: f64, lng: f64, size: f64) -> Ring {
    ring(&[
        (lat, lng),
        (lat, lng + size),
        (lat + size, lng + size),
        (lat + size, lng),
    ])
}

#[test]
fn test_same_ring_inserted_twice_conflicts() {
    let mut registry = Registry::new();
    let first = Polygon::new(square(0.0, 0.0, 1.0));
    let first_id = first.id;
    registry.try_insert(first).unwrap();

    let result = registry.try_insert(Polygon::new(square(0.0, 0.0, 1.0)));
    assert_eq!(result, Err(ConflictReason::SpatialConflict(first_id)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_export_import_reproduces_rings() {
    let mut editor = Editor::default();
    let shapes = [
        square(47.123_456_7, 8.765_432_1, 0.001),
        ring(&[(-33.9, 151.2), (-33.8, 151.25), (-33.85, 151.3)]),
        ring(&[(10.0, 10.0), (10.0, 12.0), (11.0, 11.0), (12.0, 12.0), (12.0, 10.0)]),
    ];
    for shape in &shapes {
        editor.start_drawing();
        editor.complete_drawing(shape.clone()).unwrap();
    }

    let imported = editor.import_document(&editor.export_document()).unwrap();
    assert_eq!(imported.len(), shapes.len());
    for (polygon, original) in imported.iter().zip(&shapes) {
        assert_eq!(polygon.ring.len(), original.len());
        for (a, b) in polygon.ring.points().iter().zip(original.points()) {
            assert!((a.lat - b.lat).abs() < 5e-7, "{} vs {}", a, b);
            assert!((a.lng - b.lng).abs() < 5e-7, "{} vs {}", a, b);
        }
    }
    // Identities are never carried by the document
    let originals: Vec<_> = editor.list_all().iter().map(|p| p.id).collect();
    assert!(imported.iter().all(|p| !originals.contains(&p.id)));
}

#[test]
fn test_partially_overlapping_square_is_rejected() {
    let mut editor = Editor::default();
    editor.start_drawing();
    let first = editor.complete_drawing(square(0.0, 0.0, 1.0)).unwrap();
    assert_eq!(editor.list_all().len(), 1);

    editor.start_drawing();
    let result = editor.complete_drawing(square(0.5, 0.5, 1.0));
    assert_eq!(result, Err(ConflictReason::SpatialConflict(first)));
    assert_eq!(editor.list_all().len(), 1);
    assert_eq!(editor.state(), EditState::Idle);
}

#[test]
fn test_bowtie_is_rejected() {
    let mut editor = Editor::default();
    editor.start_drawing();
    let result = editor.complete_drawing(ring(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]));
    assert_eq!(result, Err(ConflictReason::SelfIntersecting));
    assert!(editor.list_all().is_empty());
}

#[test]
fn test_reshape_to_identical_ring_succeeds() {
    let mut editor = Editor::default();
    editor.start_drawing();
    let a = editor.complete_drawing(square(0.0, 0.0, 1.0)).unwrap();

    assert!(editor.select(a));
    assert_eq!(editor.state(), EditState::Editing(a));
    assert_eq!(editor.replace_shape(a, square(0.0, 0.0, 1.0)), Ok(()));
    assert_eq!(editor.list_all()[0].ring, square(0.0, 0.0, 1.0));
}

#[test]
fn test_delete_keeps_remaining_order() {
    let mut editor = Editor::default();
    let mut ids = Vec::new();
    for lat in [0.0, 10.0, 20.0] {
        editor.start_drawing();
        ids.push(editor.complete_drawing(square(lat, 0.0, 1.0)).unwrap());
    }

    assert!(editor.delete(ids[0]));
    let remaining: Vec<_> = editor.list_all().iter().map(|p| p.id).collect();
    assert_eq!(remaining, vec![ids[1], ids[2]]);
}

#[test]
fn test_neighbours_sharing_an_edge_coexist() {
    let mut editor = Editor::default();
    for lng in [0.0, 1.0, 2.0] {
        editor.start_drawing();
        editor.complete_drawing(square(0.0, lng, 1.0)).unwrap();
    }
    assert_eq!(editor.list_all().len(), 3);
}

#[test]
fn test_reshape_into_neighbour_is_rejected() {
    let mut editor = Editor::default();
    editor.start_drawing();
    let a = editor.complete_drawing(square(0.0, 0.0, 1.0)).unwrap();
    editor.start_drawing();
    let b = editor.complete_drawing(square(0.0, 2.0, 1.0)).unwrap();

    editor.select(a);
    let result = editor.replace_shape(a, ring(&[(0.0, 0.0), (0.0, 2.5), (1.0, 2.5), (1.0, 0.0)]));
    assert_eq!(result, Err(ConflictReason::SpatialConflict(b)));
    assert_eq!(editor.registry().get(a).unwrap().ring, square(0.0, 0.0, 1.0));
    assert_eq!(editor.state(), EditState::Idle);
}

#[test]
fn test_import_then_load_replaces_collection() {
    let mut editor = Editor::default();
    editor.start_drawing();
    let old = editor.complete_drawing(square(0.0, 0.0, 1.0)).unwrap();

    let document = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
  <Placemark><Polygon><outerBoundaryIs><LinearRing>
    <coordinates>5,5 6,5 6,6 5,6 5,5</coordinates>
  </LinearRing></outerBoundaryIs></Polygon></Placemark>
</Document></kml>"#;
    let polygons = editor.import_document(document).unwrap();
    assert_eq!(editor.load_polygons(polygons), Ok(1));
    assert!(!editor.registry().contains(old));
    assert_eq!(editor.list_all()[0].ring.points()[0], Point::new(5.0, 5.0));
}
