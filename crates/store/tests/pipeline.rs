// Upload → compare against an on-disk database.

use tally_recon::{
    compare, BatchId, BatchStore, CellValue, CompareError, DiscrepancyReason, DuplicatePolicy,
    IngestError, IngestOptions, Ingestor, MatchKind, RawTable,
};
use tally_store::SqliteStore;
use tempfile::tempdir;

fn table(rows: &[[&str; 6]]) -> RawTable {
    let mut t = RawTable::new(
        ["ID_Transaccion", "Fecha", "Cuenta_Origen", "Cuenta_Destino", "Monto", "Estado"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for row in rows {
        t.push_row(row.iter().map(|s| CellValue::from(*s)).collect());
    }
    t
}

fn batch_a() -> RawTable {
    table(&[
        ["TXN001", "2023-01-01", "ACC001", "ACC002", "100.50", "Exitosa"],
        ["TXN002", "2023-01-02", "ACC003", "ACC004", "200.75", "Exitosa"],
        ["TXN003", "2023-01-03", "ACC005", "ACC006", "300.25", "Exitosa"],
        ["TXN004", "2023-01-04", "ACC007", "ACC008", "400.00", "Exitosa"],
    ])
}

fn batch_b() -> RawTable {
    table(&[
        ["TXN001", "01/01/2023", "ACC001", "ACC002", "$100.5", "Successful"],
        ["TXN002", "02/01/2023", "ACC003", "ACC004", "$210.75", "Successful"],
        ["TXN003", "03/01/2023", "ACC005", "ACC006", "300.25", "Failed"],
        ["TXN005", "05/01/2023", "ACC009", "ACC010", "€500.00", "Successful"],
    ])
}

#[test]
fn upload_and_compare_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("tally.db");
    let ingestor = Ingestor::new(IngestOptions::default());

    let (id_a, id_b) = {
        let mut store = SqliteStore::open(&path).unwrap();
        let a = ingestor.ingest(&mut store, &batch_a(), "a.xlsx").unwrap();
        let b = ingestor.ingest(&mut store, &batch_b(), "b.csv").unwrap();
        (a.id, b.id)
    };

    // Reopen to prove the data is durable.
    let store = SqliteStore::open(&path).unwrap();
    let result = compare(&store, id_a, id_b, DuplicatePolicy::default()).unwrap();

    assert_eq!(result.exact.len(), 1);
    assert_eq!(result.exact[0].business_id, "TXN001");
    let kinds: Vec<_> = result.discrepant.iter().map(|c| (c.business_id.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("TXN002", MatchKind::Discrepancy(DiscrepancyReason::Amount)),
            ("TXN003", MatchKind::Discrepancy(DiscrepancyReason::Status)),
        ]
    );
    assert_eq!(result.only_a[0].business_id, "TXN004");
    assert_eq!(result.only_b[0].business_id, "TXN005");
}

#[test]
fn mapping_failure_leaves_database_empty() {
    let dir = tempdir().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("tally.db")).unwrap();

    let mut t = batch_a();
    t.headers.truncate(5);
    for row in &mut t.rows {
        row.truncate(5);
    }

    let err = Ingestor::new(IngestOptions::default())
        .ingest(&mut store, &t, "a.xlsx")
        .unwrap_err();
    assert!(matches!(err, IngestError::Mapping(_)));
    assert!(store.list_batches().unwrap().is_empty());
    assert!(store.list_transactions(0, 100).unwrap().is_empty());
}

#[test]
fn bad_last_row_commits_nothing() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut t = batch_a();
    t.rows[3][4] = CellValue::from("monto_invalido");

    let err = Ingestor::new(IngestOptions::default())
        .ingest(&mut store, &t, "a.xlsx")
        .unwrap_err();
    assert!(matches!(err, IngestError::Row { row: 4, .. }));
    assert!(store.list_batches().unwrap().is_empty());
}

#[test]
fn compare_reports_both_missing_ids() {
    let store = SqliteStore::open_in_memory().unwrap();
    let err = compare(&store, BatchId(1), BatchId(2), DuplicatePolicy::default()).unwrap_err();
    assert_eq!(err.to_string(), "batch not found: 1, 2");
    assert!(matches!(err, CompareError::NotFound(_)));
}
