//! End-to-end session lifecycle: handles, bindings, and state summaries.

use divgraph::{
    DistanceKind, Error, FillStrategy, GraphHandle, IngestEvent, MatrixOptions, MeasureId,
    MeasureParams, Precision, Session, StoreHandle,
};

// ============================================================================
// Helper: three orthogonal keys, bound and ingested.
// ============================================================================

fn ready_session() -> (Session, GraphHandle, StoreHandle) {
    let mut session = Session::new();
    let store = session.open_store(3, Precision::F32).unwrap();
    for (key, v) in [
        ("ada", vec![1.0, 0.0, 0.0]),
        ("bert", vec![0.0, 1.0, 0.0]),
        ("carl", vec![0.0, 0.0, 1.0]),
    ] {
        session.store(store).unwrap().insert_f32(key, v).unwrap();
    }
    let graph = session.create_graph(4, 3, Precision::F32).unwrap();
    session.bind(graph, store).unwrap();
    session
        .ingest(
            graph,
            &[
                IngestEvent::new("ada", 2),
                IngestEvent::new("bert", 1),
                IngestEvent::new("carl", 1),
            ],
        )
        .unwrap();
    (session, graph, store)
}

fn cosine_opts() -> MatrixOptions {
    MatrixOptions::new(DistanceKind::Cosine, Precision::F32, FillStrategy::Sequential)
}

// ============================================================================
// 1. The full lifecycle, open to closed.
// ============================================================================

#[test]
fn test_full_lifecycle() {
    let (mut session, graph, store) = ready_session();
    session.build_matrix(graph, cosine_opts()).unwrap();
    session
        .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
        .unwrap();

    session.close_graph(graph).unwrap();
    session.close_graph(graph).unwrap(); // tolerated
    session.close_store(store).unwrap();
    session.close_store(store).unwrap(); // tolerated

    assert!(matches!(
        session.graph(graph),
        Err(Error::HandleClosed { kind: "graph", .. })
    ));
    assert!(matches!(
        session.store(store),
        Err(Error::HandleClosed { kind: "store", .. })
    ));
    assert!(matches!(
        session.ingest(graph, &[IngestEvent::new("ada", 1)]),
        Err(Error::HandleClosed { .. })
    ));
    assert!(matches!(
        session.measure(graph, MeasureId::Simpson, MeasureParams::default()),
        Err(Error::HandleClosed { .. })
    ));
    assert!(matches!(
        session.summary(graph),
        Err(Error::HandleClosed { .. })
    ));
}

#[test]
fn test_handles_stay_distinct_across_openings() {
    let mut session = Session::new();
    let g1 = session.create_graph(2, 2, Precision::F32).unwrap();
    let g2 = session.create_graph(2, 2, Precision::F32).unwrap();
    assert_ne!(g1, g2);

    session.close_graph(g1).unwrap();
    // Closing one handle never disturbs another.
    assert!(session.graph(g2).is_ok());
    // Handles are not reused after a close.
    let g3 = session.create_graph(2, 2, Precision::F32).unwrap();
    assert_ne!(g3, g1);
    assert_ne!(g3, g2);
}

// ============================================================================
// 2. Binding rules.
// ============================================================================

#[test]
fn test_bind_rejects_shape_mismatches() {
    let mut session = Session::new();
    let graph = session.create_graph(2, 3, Precision::F32).unwrap();
    let narrow = session.open_store(2, Precision::F32).unwrap();
    let wide_precision = session.open_store(3, Precision::F64).unwrap();

    assert!(matches!(
        session.bind(graph, narrow),
        Err(Error::DimensionMismatch { expected: 3, got: 2 })
    ));
    assert!(matches!(
        session.bind(graph, wide_precision),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_stores_bind_exclusively_while_open() {
    let (mut session, graph, store) = ready_session();
    let other = session.create_graph(4, 3, Precision::F32).unwrap();
    assert!(matches!(
        session.bind(other, store),
        Err(Error::InvalidArgument(_))
    ));

    // Closing the first graph releases the store for rebinding.
    session.close_graph(graph).unwrap();
    session.bind(other, store).unwrap();
}

// ============================================================================
// 3. Summaries track the pipeline stages.
// ============================================================================

#[test]
fn test_summary_tracks_pipeline_stages() {
    let (mut session, graph, _) = ready_session();

    let fresh = session.summary(graph).unwrap();
    assert_eq!(fresh.num_nodes, 3);
    assert_eq!(fresh.total_occurrences, 4);
    assert_eq!(fresh.matrix_epoch, 0);
    assert!(fresh.matrix.is_none());
    assert!(fresh.spanning_tree_edges.is_none());
    assert!(!fresh.proportions_fresh);

    session
        .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
        .unwrap();
    assert!(session.summary(graph).unwrap().proportions_fresh);

    session.build_matrix(graph, cosine_opts()).unwrap();
    let built = session.summary(graph).unwrap();
    assert_eq!(built.matrix_epoch, 1);
    let matrix = built.matrix.unwrap();
    assert_eq!(matrix.num_nodes, 3);
    assert_eq!(matrix.kind.as_deref(), Some("cosine"));
    assert_eq!(matrix.precision, Precision::F32);

    session
        .measure(graph, MeasureId::FunctionalEvenness, MeasureParams::default())
        .unwrap();
    assert_eq!(session.summary(graph).unwrap().spanning_tree_edges, Some(2));

    // Rebuilding bumps the epoch and discards the tree edge count.
    session.build_matrix(graph, cosine_opts()).unwrap();
    let rebuilt = session.summary(graph).unwrap();
    assert_eq!(rebuilt.matrix_epoch, 2);
    assert!(rebuilt.spanning_tree_edges.is_none());
}

// ============================================================================
// 4. A closed store blocks vector-dependent work only.
// ============================================================================

#[test]
fn test_closed_store_blocks_vector_work_only() {
    let (mut session, graph, store) = ready_session();
    session.build_matrix(graph, cosine_opts()).unwrap();
    session.close_store(store).unwrap();

    // Rebuilding needs the store.
    assert!(matches!(
        session.build_matrix(graph, cosine_opts()),
        Err(Error::HandleClosed { kind: "store", .. })
    ));
    // So does further ingestion.
    assert!(matches!(
        session.ingest(graph, &[IngestEvent::new("ada", 1)]),
        Err(Error::HandleClosed { kind: "store", .. })
    ));

    // Proportion and matrix measures still run off graph-owned state.
    session
        .measure(graph, MeasureId::Simpson, MeasureParams::default())
        .unwrap();
    session
        .measure(graph, MeasureId::Pairwise, MeasureParams::default())
        .unwrap();

    // The centroid measures degrade to a reported missing provider.
    let err = session
        .measure(graph, MeasureId::FunctionalDispersion, MeasureParams::default())
        .unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
}

// ============================================================================
// 5. Handles serialise as plain integers.
// ============================================================================

#[test]
fn test_handles_round_trip_through_json() {
    let (session, graph, store) = ready_session();
    drop(session);

    let json = serde_json::to_string(&graph).unwrap();
    let back: GraphHandle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, graph);

    let json = serde_json::to_string(&store).unwrap();
    let back: StoreHandle = serde_json::from_str(&json).unwrap();
    assert_eq!(back, store);
}
