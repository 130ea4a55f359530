//! Scenario tests for the Extractor

#[cfg(test)]
mod tests {
    use crate::prompt::OPEN_BLOCK_LABEL;
    use crate::{
        merge_sheet, BoundaryReconciler, ChunkExtractor, ChunkPosition, ConcurrencyLimit,
        ConcurrentChunkRunner, ExtractorConfig, ExtractorError, MergeSource,
        SequentialChunkRunner, Termination,
    };
    use quarry_domain::traits::ArtifactStore;
    use quarry_domain::{
        ArtifactKey, ChunkResult, ContinuationState, ProductRecord, ProductVariant, RawRows,
        RowRange, SheetRecord, SheetTable, TokenUsage,
    };
    use quarry_llm::{MockProvider, OracleClient, RetryPolicy};
    use quarry_store::MemoryArtifactStore;
    use std::sync::Arc;
    use std::time::Duration;

    const SHEET: &str = "Bill 3";

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn table(rows: usize) -> SheetTable {
        SheetTable {
            sheet_name: SHEET.to_string(),
            context_text: "PROJECT: RIVERSIDE".to_string(),
            header_text: "Item | Description | Unit | Qty".to_string(),
            rows: (0..rows)
                .map(|i| row(&[&i.to_string(), &format!("row {}", i), "m", "1"]))
                .collect(),
        }
    }

    fn extractor(
        provider: &MockProvider,
        store: &Arc<MemoryArtifactStore>,
        chunk_size: usize,
    ) -> ChunkExtractor<MockProvider, MemoryArtifactStore> {
        let config = ExtractorConfig {
            chunk_size,
            boundary_concurrency: ConcurrencyLimit::fixed(2),
            ..ExtractorConfig::default()
        };
        ChunkExtractor::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(3)),
            Arc::clone(store),
            config,
        )
    }

    fn blocks_json(blocks: &[(&str, &[&str])]) -> String {
        let blocks: Vec<serde_json::Value> = blocks
            .iter()
            .map(|(context, variants)| {
                let is_group = if variants.len() > 1 { "Y" } else { "N" };
                serde_json::json!({
                    "section_context_for_this_product_block": context,
                    "is_group": is_group,
                    "list_of_product_variants": variants
                        .iter()
                        .map(|d| serde_json::json!({ "full_product_description": d, "unit": "m" }))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        serde_json::json!({ "product_blocks": blocks }).to_string()
    }

    fn record(context: &str, description: &str, boundary_only: bool) -> ProductRecord {
        ProductRecord {
            section_context: context.to_string(),
            variant: ProductVariant {
                full_product_description: description.to_string(),
                boundary_only,
                ..Default::default()
            },
        }
    }

    fn seed_chunk(store: &MemoryArtifactStore, range: RowRange, records: Vec<ProductRecord>) {
        let chunk = ChunkResult {
            sheet_name: SHEET.to_string(),
            records,
            raw_rows: RawRows {
                range,
                rows: Vec::new(),
            },
            ..Default::default()
        };
        store.save(&ArtifactKey::chunk(SHEET, range), &chunk).unwrap();
    }

    fn descriptions(records: &[ProductRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.variant.full_product_description.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_open_block_stitched_across_chunks() {
        let provider = MockProvider::default();
        provider.push_response(blocks_json(&[("Pipework", &["A variant A1"])]));
        provider.push_response(blocks_json(&[
            ("Pipework", &["A variant A1", "A variant B1"]),
            ("Valves", &["Valve C"]),
        ]));
        let store = Arc::new(MemoryArtifactStore::new());

        let run = SequentialChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(4))
            .await
            .unwrap();

        assert_eq!(run.termination, Termination::Completed);
        assert_eq!(run.processed, vec![RowRange::new(0, 2), RowRange::new(2, 4)]);
        assert_eq!(run.records, 3);
        assert_eq!(run.usage, TokenUsage::new(20, 10));

        // The open block went forward with the second call
        let calls = provider.calls();
        assert!(!calls[0].user.contains(OPEN_BLOCK_LABEL));
        assert!(calls[1].user.contains(OPEN_BLOCK_LABEL));
        assert!(calls[1].user.contains("A variant A1"));

        let first: ChunkResult = store
            .load(&ArtifactKey::chunk(SHEET, RowRange::new(0, 2)))
            .unwrap()
            .unwrap();
        assert!(first.records.is_empty());

        let sheet = merge_sheet(
            &*store,
            SHEET,
            "PROJECT: RIVERSIDE",
            "Item | Description | Unit | Qty",
            &run.processed,
            MergeSource::Chunks,
        )
        .unwrap();
        assert_eq!(
            descriptions(&sheet.records),
            vec!["A variant A1", "A variant B1", "Valve C"]
        );
        assert_eq!(
            sheet
                .records
                .iter()
                .filter(|r| r.variant.full_product_description.starts_with("A "))
                .count(),
            2
        );

        let saved: SheetRecord = store
            .load(&ArtifactKey::sheet_record(SHEET))
            .unwrap()
            .unwrap();
        assert_eq!(saved, sheet);
    }

    #[tokio::test]
    async fn test_single_chunk_flushes_last_block() {
        let provider = MockProvider::new(blocks_json(&[("Valves", &["Gate valve 50mm", "Gate valve 80mm"])]));
        let store = Arc::new(MemoryArtifactStore::new());

        let run = SequentialChunkRunner::new(extractor(&provider, &store, 30))
            .run(&table(2))
            .await
            .unwrap();

        assert_eq!(run.termination, Termination::Completed);
        assert_eq!(run.records, 2);
        assert_eq!(provider.call_count(), 1);

        let plan: Vec<RowRange> = store
            .load(&ArtifactKey::chunk_plan(SHEET))
            .unwrap()
            .unwrap();
        assert_eq!(plan, vec![RowRange::new(0, 2)]);
    }

    #[tokio::test]
    async fn test_no_open_block_stops_early() {
        let provider = MockProvider::new(r#"{"product_blocks": []}"#);
        let store = Arc::new(MemoryArtifactStore::new());

        let run = SequentialChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(6))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(run.ranges.len(), 3);
        assert_eq!(run.processed, vec![RowRange::new(0, 2)]);
        assert_eq!(run.stopped_early_after(), Some(RowRange::new(0, 2)));
        assert!(!store.exists(&ArtifactKey::chunk(SHEET, RowRange::new(2, 4))).unwrap());
    }

    #[tokio::test]
    async fn test_empty_sheet_makes_no_calls() {
        let provider = MockProvider::default();
        let store = Arc::new(MemoryArtifactStore::new());

        let run = SequentialChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(0))
            .await
            .unwrap();

        assert_eq!(run.termination, Termination::NothingToDo);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_flushes_carried_block() {
        let provider = MockProvider::default();
        provider.push_response(blocks_json(&[("Pipework", &["uPVC pipe 110mm"])]));
        provider.push_response("I could not find any products, sorry.");
        let store = Arc::new(MemoryArtifactStore::new());

        let run = SequentialChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(4))
            .await
            .unwrap();

        assert_eq!(run.records, 1);
        assert_eq!(run.parse_failures.len(), 1);
        assert_eq!(run.parse_failures[0].0, RowRange::new(2, 4));

        let second: ChunkResult = store
            .load(&ArtifactKey::chunk(SHEET, RowRange::new(2, 4)))
            .unwrap()
            .unwrap();
        assert!(second.parse_failure.is_some());
        assert_eq!(descriptions(&second.records), vec!["uPVC pipe 110mm"]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_run() {
        let provider = MockProvider::default();
        for _ in 0..3 {
            provider.push_failure("connection reset");
        }
        let store = Arc::new(MemoryArtifactStore::new());

        let result = SequentialChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(4))
            .await;

        match result {
            Err(ExtractorError::Oracle(failure)) => assert_eq!(failure.attempts, 3),
            other => panic!("Expected an oracle failure, got {:?}", other),
        }
        assert!(!store.exists(&ArtifactKey::chunk(SHEET, RowRange::new(0, 2))).unwrap());
    }

    #[tokio::test]
    async fn test_range_outside_sheet_is_rejected() {
        let provider = MockProvider::default();
        let store = Arc::new(MemoryArtifactStore::new());

        let result = extractor(&provider, &store, 2)
            .extract_chunk(
                &table(4),
                RowRange::new(2, 10),
                ContinuationState::empty(),
                ChunkPosition::only(),
            )
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::RangeOutOfBounds { rows: 4, .. })
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_independent_extraction_persists_every_range() {
        let provider = MockProvider::new(blocks_json(&[("Valves", &["Gate valve"])]));
        let store = Arc::new(MemoryArtifactStore::new());

        let run = ConcurrentChunkRunner::new(extractor(&provider, &store, 2))
            .run(&table(5))
            .await
            .unwrap();

        assert_eq!(run.termination, Termination::Completed);
        assert_eq!(run.processed.len(), 3);
        assert_eq!(run.records, 3);
        assert!(provider
            .calls()
            .iter()
            .all(|call| call.system.contains("is_only_product_specs_entry")));
        for range in &run.ranges {
            let chunk: ChunkResult = store.load(&ArtifactKey::chunk(SHEET, *range)).unwrap().unwrap();
            let seed: ChunkResult = store
                .load(&ArtifactKey::boundary(SHEET, *range))
                .unwrap()
                .unwrap();
            assert_eq!(chunk, seed);
        }
    }

    #[tokio::test]
    async fn test_independent_extraction_replaces_earlier_boundary_seed() {
        let provider = MockProvider::new(blocks_json(&[("Valves", &["Gate valve"])]));
        let store = Arc::new(MemoryArtifactStore::new());
        let first = RowRange::new(0, 2);
        store
            .save(
                &ArtifactKey::boundary(SHEET, first),
                &ChunkResult {
                    sheet_name: SHEET.to_string(),
                    records: vec![record("Old", "Left over from an earlier run", false)],
                    raw_rows: RawRows {
                        range: first,
                        rows: Vec::new(),
                    },
                    ..Default::default()
                },
            )
            .unwrap();

        let config = ExtractorConfig {
            chunk_size: 2,
            persist_boundary_seed: false,
            boundary_concurrency: ConcurrencyLimit::fixed(2),
            ..ExtractorConfig::default()
        };
        let extractor = ChunkExtractor::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(3)),
            Arc::clone(&store),
            config,
        );
        let run = ConcurrentChunkRunner::new(extractor)
            .run(&table(4))
            .await
            .unwrap();

        let report = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(3)),
            Arc::clone(&store),
            ConcurrencyLimit::fixed(2),
        )
        .reconcile(SHEET, &run.ranges)
        .await
        .unwrap();
        assert_eq!(report.merged, 0);

        let sheet = merge_sheet(&*store, SHEET, "", "", &run.ranges, MergeSource::Reconciled)
            .unwrap();
        assert_eq!(descriptions(&sheet.records), vec!["Gate valve", "Gate valve"]);
    }

    fn seed_boundary_fixture(store: &MemoryArtifactStore) -> Vec<RowRange> {
        let ranges = vec![RowRange::new(0, 3), RowRange::new(3, 6), RowRange::new(6, 9)];
        seed_chunk(
            store,
            ranges[0],
            vec![
                record("Fittings", "Elbow 90deg", false),
                record("Pipework", "uPVC pipe", false),
            ],
        );
        seed_chunk(
            store,
            ranges[1],
            vec![
                record("", "110mm", true),
                record("", "160mm", true),
                record("Valves", "Gate valve", false),
            ],
        );
        seed_chunk(store, ranges[2], vec![record("Valves", "Ball valve", false)]);
        ranges
    }

    const MERGED: &str = r#"{"products": [
        {"full_product_description": "uPVC pipe 110mm", "size": "Diameter: 110mm"},
        {"full_product_description": "uPVC pipe 160mm", "size": "Diameter: 160mm"}
    ]}"#;

    #[tokio::test]
    async fn test_reconcile_merges_boundary_records() {
        let provider = MockProvider::new(MERGED);
        let store = Arc::new(MemoryArtifactStore::new());
        let ranges = seed_boundary_fixture(&store);

        let reconciler = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(3)),
            Arc::clone(&store),
            ConcurrencyLimit::fixed(2),
        );
        let report = reconciler.reconcile(SHEET, &ranges).await.unwrap();

        assert_eq!(report.pairs, 2);
        assert_eq!(report.merged, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failures.is_empty());
        assert_eq!(report.rewritten, vec![ranges[0], ranges[1]]);
        assert_eq!(report.usage, TokenUsage::new(10, 5));
        assert_eq!(provider.call_count(), 1);

        let sheet = merge_sheet(&*store, SHEET, "", "", &ranges, MergeSource::Reconciled)
            .unwrap();
        assert_eq!(
            descriptions(&sheet.records),
            vec![
                "Elbow 90deg",
                "uPVC pipe 110mm",
                "uPVC pipe 160mm",
                "Gate valve",
                "Ball valve"
            ]
        );
        assert!(sheet.records.iter().all(|r| !r.is_boundary_only()));
        assert_eq!(sheet.records[1].section_context, "Pipework");
        assert_eq!(sheet.records[1].variant.size[0].value, "110mm");

        // Plain chunk artifacts are left as extracted
        let original: ChunkResult = store
            .load(&ArtifactKey::chunk(SHEET, ranges[1]))
            .unwrap()
            .unwrap();
        assert_eq!(original.records.len(), 3);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let provider = MockProvider::new(MERGED);
        let store = Arc::new(MemoryArtifactStore::new());
        let ranges = seed_boundary_fixture(&store);
        let reconciler = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(3)),
            Arc::clone(&store),
            ConcurrencyLimit::fixed(2),
        );

        reconciler.reconcile(SHEET, &ranges).await.unwrap();
        let first = merge_sheet(&*store, SHEET, "", "", &ranges, MergeSource::Reconciled)
            .unwrap();

        let again = reconciler.reconcile(SHEET, &ranges).await.unwrap();
        let second = merge_sheet(&*store, SHEET, "", "", &ranges, MergeSource::Reconciled)
            .unwrap();

        assert_eq!(again.merged, 0);
        assert_eq!(again.skipped, 2);
        assert!(again.rewritten.is_empty());
        assert_eq!(provider.call_count(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_pair_leaves_chunks_untouched() {
        let mut provider = MockProvider::default();
        provider.add_error("uPVC pipe");
        let store = Arc::new(MemoryArtifactStore::new());
        let ranges = seed_boundary_fixture(&store);

        let report = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(2)),
            Arc::clone(&store),
            ConcurrencyLimit::fixed(2),
        )
        .reconcile(SHEET, &ranges)
        .await
        .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].left, ranges[0]);
        assert_eq!(report.usage, TokenUsage::default());
        assert!(report.rewritten.is_empty());
        assert_eq!(provider.call_count(), 2);

        let sheet = merge_sheet(&*store, SHEET, "", "", &ranges, MergeSource::Reconciled)
            .unwrap();
        assert_eq!(sheet.records.len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pair_concurrency_is_bounded() {
        let provider = MockProvider::new(r#"{"products": [{"full_product_description": "merged"}]}"#)
            .with_latency(Duration::from_millis(40));
        let store = Arc::new(MemoryArtifactStore::new());

        let ranges: Vec<RowRange> = (0..7).map(|i| RowRange::new(i * 10, i * 10 + 10)).collect();
        seed_chunk(&store, ranges[0], vec![record("S", "tail 0", false)]);
        for (i, range) in ranges.iter().enumerate().skip(1) {
            seed_chunk(
                &store,
                *range,
                vec![
                    record("", &format!("continued {}", i), true),
                    record("S", &format!("tail {}", i), false),
                ],
            );
        }

        let report = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(1)),
            Arc::clone(&store),
            ConcurrencyLimit::fixed(2),
        )
        .reconcile(SHEET, &ranges)
        .await
        .unwrap();

        assert_eq!(report.merged, 6);
        assert_eq!(provider.call_count(), 6);
        assert!(provider.max_in_flight() <= 2);

        let sheet = merge_sheet(&*store, SHEET, "", "", &ranges, MergeSource::Reconciled)
            .unwrap();
        let mut expected = vec!["merged".to_string(); 6];
        expected.push("tail 6".to_string());
        assert_eq!(descriptions(&sheet.records), expected);
    }

    #[tokio::test]
    async fn test_reconcile_needs_two_chunks() {
        let provider = MockProvider::default();
        let store = Arc::new(MemoryArtifactStore::new());

        let report = BoundaryReconciler::new(
            OracleClient::new(provider.clone(), RetryPolicy::immediate(1)),
            store,
            ConcurrencyLimit::default(),
        )
        .reconcile(SHEET, &[RowRange::new(0, 30)])
        .await
        .unwrap();

        assert_eq!(report.pairs, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_merge_skips_missing_and_corrupt_chunks() {
        let store = MemoryArtifactStore::new();
        let ranges = vec![RowRange::new(0, 2), RowRange::new(2, 4), RowRange::new(4, 6)];
        seed_chunk(&store, ranges[0], vec![record("Valves", "Gate valve", false)]);
        store
            .insert_raw(ArtifactKey::chunk(SHEET, ranges[2]), "{not json")
            .unwrap();

        let sheet = merge_sheet(&store, SHEET, "ctx", "hdr", &ranges, MergeSource::Chunks).unwrap();
        assert_eq!(descriptions(&sheet.records), vec!["Gate valve"]);
        assert_eq!(sheet.context, "ctx");
        assert!(store.exists(&ArtifactKey::sheet_record(SHEET)).unwrap());
    }
}
