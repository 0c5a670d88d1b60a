use std::fs;
use std::path::Path;
use std::sync::Arc;

use arcdex_core::traits::{IndexerEngine, IndexingHandle, QueryEngine, QueryHandle};
use arcdex_core::{DirectoryArchive, Error};
use arcdex_text::{TantivyIndexerEngine, TantivyQueryEngine};
use tempfile::TempDir;

fn write_corpus(dir: &Path, articles: usize) {
    fs::create_dir_all(dir.join("survival")).unwrap();
    fs::write(dir.join("survival/fire.txt"), "Firecraft\n\nFirecraft basics: tinder, kindling and fuel. Firecraft firecraft.").unwrap();
    fs::write(dir.join("survival/shelter.txt"), "Shelter\n\nA lean-to keeps you dry. Keep a small fire near the entrance.").unwrap();
    for i in 0..articles {
        fs::write(dir.join(format!("filler_{i:03}.txt")), format!("Filler {i}\n\nGardening notes number {i}.")).unwrap();
    }
}

fn build(archive: &Path, scratch: &Path) -> Vec<u8> {
    let engine = TantivyIndexerEngine::new(Arc::new(DirectoryArchive::new()));
    let mut handle = engine.open(archive).expect("open");
    fs::create_dir_all(scratch).unwrap();
    handle.begin(scratch).expect("begin");
    let mut progress = Vec::new();
    loop {
        let more = handle.index_next_unit().expect("unit");
        progress.push(handle.percent_done());
        if !more {
            break;
        }
    }
    handle.finalize().expect("finalize");
    progress
}

#[test]
fn tantivy_full_flow() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("archive");
    let index = tmp.path().join("index");
    write_corpus(&archive, 250);

    let progress = build(&archive, &index);
    eprintln!("indexed in {} units", progress.len());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress never goes back: {:?}", progress);
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.len() <= 100, "one unit covers at least one percent");

    let handle = TantivyQueryEngine::new().open_read_only(&index).expect("open index");
    assert_eq!(handle.num_docs(), 252);

    let hits: Vec<_> = handle.search("firecraft", 28).expect("search").map(|h| h.expect("hit")).collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_url, "survival/fire.txt");
    assert_eq!(hits[0].title, "Firecraft");

    let hits: Vec<_> = handle.search("FIRE", 28).expect("search").map(|h| h.expect("hit")).collect();
    assert!(!hits.is_empty(), "queries are case-folded");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    let capped = handle.search("gardening", 28).expect("search").count();
    assert_eq!(capped, 28);
    assert_eq!(handle.search("gardening", 0).expect("search").count(), 0);
    assert_eq!(handle.search("volcano", 28).expect("search").count(), 0);
    handle.close();
}

#[test]
fn malformed_query_does_not_fail() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("archive");
    let index = tmp.path().join("index");
    write_corpus(&archive, 0);
    build(&archive, &index);

    let handle = TantivyQueryEngine::new().open_read_only(&index).expect("open index");
    let hits: Vec<_> = handle.search("shelter AND (", 10).expect("lenient parse").collect();
    assert!(hits.iter().all(|h| h.is_ok()));
}

#[test]
fn empty_archive_finishes_in_one_unit() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("archive");
    fs::create_dir_all(&archive).unwrap();
    let progress = build(&archive, &tmp.path().join("index"));
    assert_eq!(progress, vec![100]);
}

#[test]
fn open_read_only_rejects_missing_and_foreign_dirs() {
    let tmp = TempDir::new().unwrap();
    let engine = TantivyQueryEngine::new();
    let missing = tmp.path().join("absent.index");
    assert!(matches!(engine.open_read_only(&missing), Err(Error::IndexNotFound(p)) if p == missing));

    let foreign = tmp.path().join("foreign.index");
    fs::create_dir_all(&foreign).unwrap();
    fs::write(foreign.join("readme.txt"), "not an index").unwrap();
    assert!(matches!(engine.open_read_only(&foreign), Err(Error::IndexNotFound(_))));
}

#[test]
fn unit_before_begin_is_an_indexing_failure() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 1);
    let engine = TantivyIndexerEngine::new(Arc::new(DirectoryArchive::new()));
    let mut handle = engine.open(tmp.path()).expect("open");
    assert!(matches!(handle.index_next_unit(), Err(Error::Indexing { .. })));
}

#[test]
fn open_rejects_missing_archive() {
    let tmp = TempDir::new().unwrap();
    let engine = TantivyIndexerEngine::new(Arc::new(DirectoryArchive::new()));
    assert!(matches!(engine.open(&tmp.path().join("absent")), Err(Error::ArchiveOpen { .. })));
}
