//! End-to-end pipeline tests: grow a network on a small island through the
//! store document, then elevate terrain samples against the result.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec2;

use alluvium::growth::{grow, GrowthConfig, GrowthParams};
use alluvium::store::{
    CellRidgeRow, Parameters, QRow, RidgeRow, RiverNodeRow, RiverRow, SlopeRow, StoreDoc,
    TerrainRow,
};
use alluvium::terrain::ElevationStage;

fn island_doc() -> StoreDoc {
    let mut doc = StoreDoc {
        parameters: Parameters {
            min_x: -300.0,
            max_x: 300.0,
            min_y: -258.0,
            max_y: 198.0,
            edge_length: 40.0,
            resolution: 200.0,
        },
        ..Default::default()
    };

    // Closed ring: the trailing vertex repeats the first.
    doc.shoreline = vec![
        [-150.0, 198.0],
        [-300.0, 0.0],
        [-150.0, -258.0],
        [150.0, -258.0],
        [300.0, 0.0],
        [150.0, 198.0],
        [-150.0, 198.0],
    ];

    // Uniform slope of 0.5 over a coarse 3x3 raster.
    for y in 0..3 {
        for x in 0..3 {
            doc.river_slope.push(SlopeRow {
                x,
                y,
                slope: 0.5,
            });
        }
    }

    // Two seed mouths on opposite coasts.
    doc.river_nodes = vec![
        RiverNodeRow {
            id: 0,
            parent: None,
            priority: 1,
            contour_index: Some(0),
            x: 0.0,
            y: 198.0,
            elevation: 0.0,
            local_watershed: 0.0,
            inherited_watershed: 0.0,
            flow: 0.0,
        },
        RiverNodeRow {
            id: 1,
            parent: None,
            priority: 1,
            contour_index: Some(2),
            x: 0.0,
            y: -258.0,
            elevation: 0.0,
            local_watershed: 0.0,
            inherited_watershed: 0.0,
            flow: 0.0,
        },
    ];
    doc
}

fn growth_config() -> GrowthConfig {
    GrowthConfig {
        pa: 0.8,
        pc: 0.15,
        sigma: 1.1,
        eta: 0.95,
        zeta: 14.0,
        slope_rate: 0.05,
        max_tries: 8,
        river_angle_dev: 0.4,
    }
}

/// Run growth over the island and write the result back into the doc.
fn grown_doc() -> StoreDoc {
    let mut doc = island_doc();
    let params = GrowthParams::from_store(&doc, growth_config()).expect("valid growth inputs");
    grow(&params, 7, 2, || {});
    params.write_nodes(&mut doc);
    doc
}

#[test]
fn growth_writes_a_consistent_network() {
    let doc = grown_doc();

    assert!(doc.river_nodes.len() > 2, "the island should fill in");
    for (i, row) in doc.river_nodes.iter().enumerate() {
        assert_eq!(row.id, i as u64, "rows come out in dense id order");
        let parent = row.parent.expect("growth writes parent-or-self");
        if row.is_mouth() {
            assert_eq!(parent, row.id);
            assert!(row.contour_index.is_some());
            assert_eq!(row.elevation, 0.0);
        } else {
            assert!(parent < row.id);
            // Uniform slope: every edge climbs 40 * 0.5 * 0.05 = 1 m.
            let gain = row.elevation - doc.river_nodes[parent as usize].elevation;
            assert!((gain - 1.0).abs() < 1e-3);
        }
    }
}

#[test]
fn growth_is_reproducible_for_one_worker() {
    let mut doc_a = island_doc();
    let params = GrowthParams::from_store(&doc_a, growth_config()).unwrap();
    grow(&params, 99, 1, || {});
    params.write_nodes(&mut doc_a);

    let mut doc_b = island_doc();
    let params = GrowthParams::from_store(&doc_b, growth_config()).unwrap();
    grow(&params, 99, 1, || {});
    params.write_nodes(&mut doc_b);

    assert_eq!(doc_a.river_nodes.len(), doc_b.river_nodes.len());
    for (a, b) in doc_a.river_nodes.iter().zip(&doc_b.river_nodes) {
        assert_eq!((a.id, a.parent), (b.id, b.parent));
        assert_eq!((a.x, a.y, a.elevation), (b.x, b.y, b.elevation));
    }
}

#[test]
fn elevation_anchors_samples_to_ridges_and_rivers() {
    let mut doc = grown_doc();

    // One real ridge and one point-ridge, both bounding the north mouth's
    // cell.
    doc.qs = vec![
        QRow {
            id: 0,
            x: 60.0,
            y: 60.0,
            elevation: 80.0,
            cells: vec![0],
        },
        QRow {
            id: 1,
            x: 90.0,
            y: 40.0,
            elevation: 90.0,
            cells: vec![0],
        },
    ];
    doc.ridges = vec![
        RidgeRow {
            id: 0,
            q0: 0,
            q1: Some(1),
        },
        RidgeRow {
            id: 1,
            q0: 1,
            q1: None,
        },
    ];
    doc.cell_ridges = vec![CellRidgeRow {
        cell: 0,
        ridges: vec![0],
    }];

    // A river polyline through the north mouth, climbing as it goes.
    doc.rivers = vec![RiverRow {
        id: 0,
        node: 0,
        points: vec![[0.0, 198.0, 0.0], [20.0, 158.0, 2.0], [40.0, 118.0, 4.0]],
    }];

    doc.ts = vec![
        // Exactly on the ridge endpoint: takes the ridge elevation.
        TerrainRow {
            id: 0,
            x: 60.0,
            y: 60.0,
            cell: 0,
            elevation: None,
        },
        // Exactly on the river: takes the interpolated river elevation.
        TerrainRow {
            id: 1,
            x: 20.0,
            y: 158.0,
            cell: 0,
            elevation: None,
        },
        // Somewhere in between: a finite blend.
        TerrainRow {
            id: 2,
            x: 30.0,
            y: 100.0,
            cell: 0,
            elevation: None,
        },
    ];

    let mut stage = ElevationStage::from_store(&doc).expect("valid elevation inputs");
    let ticks = AtomicUsize::new(0);
    stage.run(|| {
        ticks.fetch_add(1, Ordering::Relaxed);
    });
    assert_eq!(ticks.load(Ordering::Relaxed), 3);

    stage.write_back(&mut doc);
    let on_ridge = doc.ts[0].elevation.expect("computed");
    let on_river = doc.ts[1].elevation.expect("computed");
    let between = doc.ts[2].elevation.expect("computed");

    assert!((on_ridge - 80.0).abs() < 1e-3);
    assert!((on_river - 2.0).abs() < 1e-3);
    assert!(between.is_finite());
    assert!(between > 0.0 && between < 90.0);
}

#[test]
fn store_survives_a_gzipped_round_trip() {
    let doc = grown_doc();
    let path = std::env::temp_dir().join(format!(
        "alluvium-pipeline-{}-roundtrip.json.gz",
        std::process::id()
    ));

    doc.save(&path).expect("save");
    let back = StoreDoc::load(&path).expect("load");
    std::fs::remove_file(&path).ok();

    assert_eq!(back.river_nodes.len(), doc.river_nodes.len());
    assert_eq!(back.parameters.edge_length, doc.parameters.edge_length);
    assert_eq!(back.shoreline.len(), doc.shoreline.len());
}

#[test]
fn crowded_mouths_grow_clean_networks() {
    // A third mouth seeded right next to the first: growth still
    // terminates and every grown node keeps its shore clearance.
    let mut doc = island_doc();
    doc.river_nodes.push(RiverNodeRow {
        id: 2,
        parent: None,
        priority: 1,
        contour_index: Some(0),
        x: 20.0,
        y: 198.0,
        elevation: 0.0,
        local_watershed: 0.0,
        inherited_watershed: 0.0,
        flow: 0.0,
    });

    let params = GrowthParams::from_store(&doc, growth_config()).unwrap();
    grow(&params, 21, 2, || {});

    let shore = alluvium::shore::Shore::new(
        doc.shoreline.iter().map(|&[x, y]| Vec2::new(x, y)).collect(),
    );
    let nodes = params.hydrology.read();
    for node in nodes.iter().filter(|n| !n.is_mouth()) {
        let clearance = shore.distance_to_shore(node.loc);
        assert!(
            clearance > 1.1 * 40.0,
            "node {} sits {clearance} m from the shore",
            node.id
        );
    }
}
