//! End-to-end measure evaluation through the session API.
//!
//! Covers the entropy delegation identities, order-parameter behaviour,
//! counting measures, requirement errors, the full 36-measure roster, and
//! the JSON report path.

use divgraph::{
    DistanceKind, Error, FillStrategy, GraphHandle, IngestEvent, MatrixOptions, MeasureId,
    MeasureParams, Precision, Session, write_graph_summary, write_measure_report,
};

// ============================================================================
// Helper: a six-node corpus with distinct vectors and uneven counts.
// ============================================================================

const COUNTS: [u64; 6] = [5, 3, 3, 2, 1, 1];

fn session_with_counts(counts: &[u64]) -> (Session, GraphHandle) {
    const DIMS: u32 = 6;
    let mut session = Session::new();
    let store = session.open_store(DIMS, Precision::F32).unwrap();
    for i in 0..counts.len() {
        let v: Vec<f32> = (0..DIMS)
            .map(|d| ((i as f32 + 1.0) * 0.71 + d as f32 * 0.23).sin() + 1.5)
            .collect();
        session
            .store(store)
            .unwrap()
            .insert_f32(&format!("k{i}"), v)
            .unwrap();
    }
    let graph = session.create_graph(8, DIMS, Precision::F32).unwrap();
    session.bind(graph, store).unwrap();
    let events: Vec<IngestEvent> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| IngestEvent::new(format!("k{i}"), c))
        .collect();
    session.ingest(graph, &events).unwrap();
    (session, graph)
}

fn corpus_session() -> (Session, GraphHandle) {
    session_with_counts(&COUNTS)
}

fn with_matrix() -> (Session, GraphHandle) {
    let (mut session, graph) = corpus_session();
    session
        .build_matrix(
            graph,
            MatrixOptions::new(
                DistanceKind::Cosine,
                Precision::F32,
                FillStrategy::Threaded { threads: 2 },
            ),
        )
        .unwrap();
    (session, graph)
}

// ============================================================================
// 1. Entropy delegation identities.
// ============================================================================

#[test]
fn test_renyi_at_order_one_is_shannon() {
    let (mut session, graph) = corpus_session();
    let shannon = session
        .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
        .unwrap();
    let renyi = session
        .measure(graph, MeasureId::Renyi, MeasureParams::with_alpha(1.0))
        .unwrap();
    assert_eq!(renyi, shannon);
}

#[test]
fn test_patil_taillie_at_order_zero_is_shannon() {
    let (mut session, graph) = corpus_session();
    let shannon = session
        .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
        .unwrap();
    let pt = session
        .measure(graph, MeasureId::PatilTaillie, MeasureParams::with_alpha(0.0))
        .unwrap();
    assert_eq!(pt, shannon);
}

#[test]
fn test_q_logarithmic_at_order_one_approaches_shannon() {
    let (mut session, graph) = corpus_session();
    let shannon = session
        .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
        .unwrap();
    let qlog = session
        .measure(graph, MeasureId::QLogarithmic, MeasureParams::with_alpha(1.0))
        .unwrap();
    assert!((qlog.value - shannon.value).abs() < 1e-12);
    assert!((qlog.effective.unwrap() - shannon.effective.unwrap()).abs() < 1e-9);
}

#[test]
fn test_patil_taillie_shifts_onto_q_logarithmic() {
    // Holds for even and uneven counts alike at every non-singular order.
    let uniform: Vec<u64> = vec![3; COUNTS.len()];
    for counts in [&uniform[..], &COUNTS[..]] {
        let (mut session, graph) = session_with_counts(counts);
        for q in [0.5, 2.0, 3.0] {
            let pt = session
                .measure(graph, MeasureId::PatilTaillie, MeasureParams::with_alpha(q - 1.0))
                .unwrap();
            let ql = session
                .measure(graph, MeasureId::QLogarithmic, MeasureParams::with_alpha(q))
                .unwrap();
            assert!((pt.value - ql.value).abs() < 1e-12, "q = {q}");
            assert!((pt.effective.unwrap() - ql.effective.unwrap()).abs() < 1e-12);
        }
    }
}

// ============================================================================
// 2. Order parameters rank concentration the documented way.
// ============================================================================

#[test]
fn test_hill_numbers_fall_as_the_order_rises() {
    let (mut session, graph) = corpus_session();
    let mut last = f64::INFINITY;
    for alpha in [0.0, 0.5, 2.0, 3.0] {
        let out = session
            .measure(graph, MeasureId::Renyi, MeasureParams::with_alpha(alpha))
            .unwrap();
        let hill = out.effective.unwrap();
        assert!(hill < last, "hill({alpha}) = {hill} did not fall below {last}");
        last = hill;
    }
}

#[test]
fn test_concentration_lowers_entropy_and_evenness() {
    let skew_ids = [
        MeasureId::ShannonWeaver,
        MeasureId::Simpson,
        MeasureId::ShannonEvenness,
        MeasureId::HeipEvenness,
        MeasureId::Camargo1993,
    ];

    let (mut uniform, g_uniform) = session_with_counts(&[2, 2, 2, 2, 2, 2]);
    let (mut skewed, g_skewed) = session_with_counts(&[7, 1, 1, 1, 1, 1]);

    for id in skew_ids {
        let u = uniform.measure(g_uniform, id, MeasureParams::default()).unwrap();
        let s = skewed.measure(g_skewed, id, MeasureParams::default()).unwrap();
        assert!(s.value < u.value, "{id}: skewed {} !< uniform {}", s.value, u.value);
    }
}

// ============================================================================
// 3. Counting measures.
// ============================================================================

#[test]
fn test_counting_measures_match_the_graph() {
    let (mut session, graph) = corpus_session();
    let richness = session
        .measure(graph, MeasureId::Richness, MeasureParams::default())
        .unwrap();
    let species = session
        .measure(graph, MeasureId::SpeciesCount, MeasureParams::default())
        .unwrap();
    assert_eq!(richness.value, 6.0);
    assert_eq!(species.value, 5.0);
}

// ============================================================================
// 4. Requirement errors.
// ============================================================================

#[test]
fn test_matrix_dependent_measures_need_a_matrix() {
    let (mut session, graph) = corpus_session();
    for id in [
        MeasureId::Pairwise,
        MeasureId::Stirling,
        MeasureId::FunctionalEvenness,
        MeasureId::FunctionalDispersion,
    ] {
        let err = session
            .measure(graph, id, MeasureParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::MatrixMissing), "{id} reported {err}");
    }
}

#[test]
fn test_unknown_ids_are_rejected() {
    for bad in [36u32, 99, u32::MAX] {
        assert!(matches!(
            MeasureId::from_id(bad),
            Err(Error::UnknownMeasure(id)) if id == bad
        ));
    }
    // The roster itself round-trips.
    for (i, id) in MeasureId::ALL.iter().enumerate() {
        assert_eq!(id.id(), i as u32);
        assert_eq!(MeasureId::from_id(i as u32).unwrap(), *id);
    }
}

// ============================================================================
// 5. The full roster is evaluable on one corpus.
// ============================================================================

#[test]
fn test_full_roster_is_finite_with_reports() {
    let (mut session, graph) = with_matrix();
    // Order 2 keeps every parameterised measure away from its singular point.
    let params = MeasureParams::with(2.0, 1.0);
    let two_value = [0u32, 1, 2, 3, 27, 28, 29, 33];

    for id in MeasureId::ALL {
        let report = session.measure_report(graph, id, params).unwrap();
        assert!(report.value.is_finite(), "{id} value {}", report.value);
        assert_eq!(report.id, id.id());
        assert_eq!(report.measure, id.name());
        assert_eq!(report.num_nodes, 6);
        if two_value.contains(&id.id()) {
            let hill = report.effective.unwrap();
            assert!(hill.is_finite(), "{id} effective {hill}");
        } else {
            assert_eq!(report.effective, None, "{id} grew an effective form");
        }
    }
}

#[test]
fn test_centroid_measures_read_the_bound_store() {
    let (mut session, graph) = with_matrix();
    let dispersion = session
        .measure(graph, MeasureId::FunctionalDispersion, MeasureParams::default())
        .unwrap();
    assert!(dispersion.value > 0.0 && dispersion.value <= 1.0 + 1e-9);

    let divergence = session
        .measure(graph, MeasureId::FunctionalDivergence, MeasureParams::default())
        .unwrap();
    assert!(divergence.value.is_finite());
}

// ============================================================================
// 6. Reports flow to JSON end to end.
// ============================================================================

#[test]
fn test_reports_serialise_end_to_end() {
    let (mut session, graph) = with_matrix();
    let report = session
        .measure_report(graph, MeasureId::Renyi, MeasureParams::with_alpha(2.0))
        .unwrap();
    let mut buf = Vec::new();
    write_measure_report(&report, &mut buf).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(json["measure"], "Rényi");
    assert_eq!(json["id"], 3);
    assert_eq!(json["alpha"], 2.0);
    assert_eq!(json["num_nodes"], 6);
    assert!(json["effective"].as_f64().is_some());

    let summary = session.summary(graph).unwrap();
    let mut buf = Vec::new();
    write_graph_summary(&summary, &mut buf).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(json["num_nodes"], 6);
    assert_eq!(json["matrix"]["kind"], "cosine");
}
