
use test_helpers::{
    build_zip, get_blob, memory_report_store, put_blob, zip_entry_list, CountingStore,
    FailingStore,
};

use tokio_util::sync::CancellationToken;

use crossloader::merge::{canonical_report_name, ArchiveMerger, MergeError};

#[test]
fn canonical_name_replaces_last_segment() {
    assert_eq!(
        canonical_report_name("dir/sub/file.zip"),
        "dir/sub/ReportsDC.zip"
    );
}

#[test]
fn canonical_name_without_directory_is_bare() {
    assert_eq!(canonical_report_name("file.zip"), "ReportsDC.zip");
}

#[test]
fn canonical_name_keeps_deep_prefix() {
    assert_eq!(
        canonical_report_name("a/b/c/d/Reports.zip"),
        "a/b/c/d/ReportsDC.zip"
    );
}

#[tokio::test]
async fn merge_with_no_reports_writes_nothing() {
    let store = CountingStore::wrap(memory_report_store());
    let merger = ArchiveMerger;
    merger
        .merge(1, None, None, store.as_ref(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.puts(), 0);
    assert_eq!(store.gets(), 0);
}

#[tokio::test]
async fn merge_treats_empty_strings_as_absent() {
    let store = CountingStore::wrap(memory_report_store());
    let merger = ArchiveMerger;
    merger
        .merge(1, Some(""), Some(""), store.as_ref(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn merge_copies_first_report_verbatim() {
    let store = memory_report_store();
    let source = build_zip(&[("one.csv", b"a,b"), ("two.csv", b"c,d")]);
    put_blob(store.as_ref(), "100/output/Reports.zip", source.clone()).await;

    let merger = ArchiveMerger;
    merger
        .merge(
            100,
            Some("100/output/Reports.zip"),
            None,
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let merged = get_blob(store.as_ref(), "100/output/ReportsDC.zip").await;
    assert_eq!(merged, source);
}

#[tokio::test]
async fn merge_copies_second_report_under_its_own_prefix() {
    let store = memory_report_store();
    let source = build_zip(&[("summary.txt", b"hello")]);
    put_blob(store.as_ref(), "100/other/Extra.zip", source.clone()).await;

    let merger = ArchiveMerger;
    merger
        .merge(
            100,
            None,
            Some("100/other/Extra.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let merged = get_blob(store.as_ref(), "100/other/ReportsDC.zip").await;
    assert_eq!(merged, source);
}

#[tokio::test]
async fn merge_unions_entries_first_archive_first() {
    let store = memory_report_store();
    put_blob(
        store.as_ref(),
        "7/a.zip",
        build_zip(&[("a1.txt", b"a1"), ("a2.txt", b"a2")]),
    )
    .await;
    put_blob(store.as_ref(), "7/b.zip", build_zip(&[("b1.txt", b"b1")])).await;

    let merger = ArchiveMerger;
    merger
        .merge(
            7,
            Some("7/a.zip"),
            Some("7/b.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let merged = get_blob(store.as_ref(), "7/ReportsDC.zip").await;
    let entries = zip_entry_list(&merged);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0], ("a1.txt".to_string(), b"a1".to_vec()));
    assert_eq!(entries[1], ("a2.txt".to_string(), b"a2".to_vec()));
    assert_eq!(entries[2], ("b1.txt".to_string(), b"b1".to_vec()));
}

#[tokio::test]
async fn merge_output_lands_under_first_archives_prefix() {
    let store = memory_report_store();
    put_blob(
        store.as_ref(),
        "left/Reports.zip",
        build_zip(&[("l.txt", b"l")]),
    )
    .await;
    put_blob(
        store.as_ref(),
        "right/Reports.zip",
        build_zip(&[("r.txt", b"r")]),
    )
    .await;

    let merger = ArchiveMerger;
    merger
        .merge(
            9,
            Some("left/Reports.zip"),
            Some("right/Reports.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let merged = get_blob(store.as_ref(), "left/ReportsDC.zip").await;
    assert_eq!(zip_entry_list(&merged).len(), 2);
}

#[tokio::test]
async fn merge_keeps_duplicate_entry_names() {
    let store = memory_report_store();
    put_blob(
        store.as_ref(),
        "d/a.zip",
        build_zip(&[("report.csv", b"from-a")]),
    )
    .await;
    put_blob(
        store.as_ref(),
        "d/b.zip",
        build_zip(&[("report.csv", b"from-b")]),
    )
    .await;

    let merger = ArchiveMerger;
    merger
        .merge(
            3,
            Some("d/a.zip"),
            Some("d/b.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let entries = zip_entry_list(&get_blob(store.as_ref(), "d/ReportsDC.zip").await);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], ("report.csv".to_string(), b"from-a".to_vec()));
    assert_eq!(entries[1], ("report.csv".to_string(), b"from-b".to_vec()));
}

#[tokio::test]
async fn merge_is_deterministic_for_identical_inputs() {
    let store = memory_report_store();
    put_blob(
        store.as_ref(),
        "j/a.zip",
        build_zip(&[("x.txt", b"x"), ("y.txt", b"y")]),
    )
    .await;
    put_blob(store.as_ref(), "j/b.zip", build_zip(&[("z.txt", b"z")])).await;

    let merger = ArchiveMerger;
    for _ in 0..2 {
        merger
            .merge(
                5,
                Some("j/a.zip"),
                Some("j/b.zip"),
                store.as_ref(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }
    let first = get_blob(store.as_ref(), "j/ReportsDC.zip").await;

    merger
        .merge(
            5,
            Some("j/a.zip"),
            Some("j/b.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let second = get_blob(store.as_ref(), "j/ReportsDC.zip").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn merge_propagates_store_failure_without_writing() {
    let failing = std::sync::Arc::new(FailingStore);
    let store = CountingStore::wrap(failing);
    let merger = ArchiveMerger;
    let result = merger
        .merge(
            2,
            Some("p/a.zip"),
            Some("p/b.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(MergeError::Store(_))));
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn merge_rejects_corrupt_archive() {
    let store = memory_report_store();
    put_blob(store.as_ref(), "c/a.zip", b"not a zip".to_vec()).await;
    put_blob(store.as_ref(), "c/b.zip", build_zip(&[("ok.txt", b"ok")])).await;

    let merger = ArchiveMerger;
    let result = merger
        .merge(
            4,
            Some("c/a.zip"),
            Some("c/b.zip"),
            store.as_ref(),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(MergeError::ZipRead { .. })));
}
