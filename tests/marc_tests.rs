//! MARC ingest through the full pipeline.

mod common;

use biblio_ingest::consume::{JsonConsumer, TitleConsumer};
use biblio_ingest::generate::{MarcGenerator, MarcMapper};
use biblio_ingest::marc::{Field, Leader};
use biblio_ingest::transform::Counter;
use biblio_ingest::{Pipeline, Record};
use common::{book, marc_bytes, Collect, SharedBuffer};
use std::io::Cursor;

fn run(bytes: Vec<u8>) -> Vec<Record> {
    let collect = Collect::default();
    let generator = MarcGenerator::new(Cursor::new(bytes), MarcMapper::bundled().unwrap());
    Pipeline::new(generator, collect.clone()).run().wait().unwrap();
    collect.records()
}

#[test]
fn test_invalid_records_are_skipped() {
    let mut deleted = book("2", "Deleted");
    deleted.leader.record_status = 'd';
    let mut unknown_status = book("3", "Odd status");
    unknown_status.leader.record_status = 'x';
    let mut short_fixed = book("4", "Short 008");
    short_fixed.add_control_field("008".to_string(), "930506s1993".to_string());
    let untitled = book("5", "");

    let records = run(marc_bytes(&[
        book("1", "Kept"),
        deleted,
        unknown_status,
        short_fixed,
        untitled,
        book("6", "Also kept"),
    ]));
    let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Kept", "Also kept"]);
}

#[test]
fn test_counter_sees_only_mapped_records() {
    let mut deleted = book("2", "Deleted");
    deleted.leader.record_status = 'd';
    let bytes = marc_bytes(&[book("1", "A"), deleted, book("3", "B")]);

    let counter = Counter::new();
    let count = counter.handle();
    let mut pipeline = Pipeline::new(
        MarcGenerator::new(Cursor::new(bytes), MarcMapper::bundled().unwrap()),
        TitleConsumer::new(Vec::new()),
    );
    pipeline.next(counter);
    let report = pipeline.run().wait().unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(report.consumed, 2);
}

#[test]
fn test_full_record_mapping() {
    let mut marc = book("990002724840106761", "Spice it up!");
    marc.add_field(
        Field::builder("100", '1', ' ')
            .subfield('a', "Gerber, Nancy,")
            .subfield('d', "1947-")
            .build(),
    );
    marc.add_field(Field::builder("700", '1', ' ').subfield('a', "Smith, Jane").build());
    marc.add_field(Field::builder("700", '1', ' ').subfield('a', "Doe, John").build());
    marc.add_field(Field::builder("035", ' ', ' ').subfield('a', "(OCoLC)28152843").build());
    marc.add_field(Field::builder("035", ' ', ' ').subfield('a', "(MCM)000272484").build());
    marc.add_field(
        Field::builder("856", '4', '0')
            .subfield('u', "https://example.org/full")
            .subfield('y', "Full text")
            .build(),
    );
    marc.add_field(
        Field::builder("856", '4', '2')
            .subfield('u', "https://example.org/about")
            .build(),
    );
    marc.add_field(
        Field::builder("852", '0', '0')
            .subfield('b', "HUM")
            .subfield('c', "JRNAL")
            .subfield('h', "TX819.A1 G47 1993")
            .subfield('k', "FOLIO")
            .build(),
    );
    marc.add_field(Field::builder("866", ' ', '0').subfield('a', "v.1-10").build());

    let records = run(marc_bytes(&[marc]));
    let record = &records[0];

    assert_eq!(record.identifier, "990002724840106761");
    assert_eq!(record.source, "MIT Alma");
    assert!(record.source_link.ends_with("docid=alma990002724840106761"));
    assert_eq!(record.contributors.len(), 3);
    assert_eq!(record.contributors[0].kind, "author");
    assert_eq!(record.contributors[0].value, "Gerber, Nancy, 1947-");
    assert_eq!(record.contributors[2].kind, "contributor");
    assert_eq!(record.oclcs, vec!["28152843".to_string()]);
    assert_eq!(record.languages, vec!["English".to_string()]);
    assert_eq!(record.country_of_publication, "Massachusetts");
    assert_eq!(record.publication_date, "1993");
    assert_eq!(record.literary_form, "nonfiction");
    assert_eq!(record.content_type, "Text");

    assert_eq!(record.links.len(), 1);
    assert_eq!(record.links[0].kind, "unknown");
    assert_eq!(record.links[0].text, "Full text");

    assert_eq!(record.holdings.len(), 1);
    let holding = &record.holdings[0];
    assert_eq!(holding.location, "Hayden Library");
    assert_eq!(holding.collection, "Humanities Journals");
    assert_eq!(holding.call_number, "TX819.A1 G47 1993");
    assert_eq!(holding.format, "Oversized print volume");
    assert_eq!(holding.summary, " v.1-10");
    assert_eq!(record.format, vec!["Oversized print volume".to_string()]);
}

#[test]
fn test_secondary_holdings_stand_in() {
    let mut marc = book("7", "Serial");
    marc.add_field(
        Field::builder("866", ' ', '0')
            .subfield('b', "SCI")
            .subfield('a', "v.1-20")
            .build(),
    );
    let records = run(marc_bytes(&[marc]));
    assert_eq!(records[0].holdings.len(), 1);
    assert_eq!(records[0].holdings[0].format, "Print volume");
    assert_eq!(records[0].holdings[0].summary, "v.1-20");
}

#[test]
fn test_music_content_type() {
    let mut leader = Leader::default();
    leader.record_type = 'c';
    let mut marc = book("8", "Sonatas");
    marc.leader = leader;
    let records = run(marc_bytes(&[marc]));
    assert_eq!(records[0].content_type, "Musical score");
}

#[test]
fn test_json_export_of_marc() {
    let bytes = marc_bytes(&[book("1", "A"), book("2", "B")]);
    let out = SharedBuffer::default();
    let generator = MarcGenerator::new(Cursor::new(bytes), MarcMapper::bundled().unwrap());
    Pipeline::new(generator, JsonConsumer::new(out.clone()))
        .run()
        .wait()
        .unwrap();
    let records: Vec<Record> = serde_json::from_slice(&out.contents()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].identifier, "2");
}
