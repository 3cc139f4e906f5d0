//! Property tests for input handling that must never panic.

mod common;

use biblio_ingest::generate::MarcMapper;
use biblio_ingest::marc::MarcReader;
use biblio_ingest::rules::ByteWindow;
use common::{book, marc_bytes};
use proptest::prelude::*;
use std::io::Cursor;

proptest! {
    #[test]
    fn byte_window_stays_in_bounds(
        value in ".{0,60}",
        offset in 0usize..80,
        length in 0usize..usize::MAX,
    ) {
        let window = ByteWindow { offset, length };
        match window.apply(&value) {
            Some(cut) => prop_assert!(offset < value.len() && cut.len() <= value.len() * 3),
            None => prop_assert!(offset >= value.len()),
        }
    }

    #[test]
    fn marc_titles_survive_the_binary_layer(
        title in "[A-Za-z0-9.!?]([A-Za-z0-9 ,.:!?'-]{0,78}[A-Za-z0-9.!?])?",
    ) {
        let bytes = marc_bytes(&[book("1", &title)]);
        let marc = MarcReader::new(Cursor::new(bytes)).read_record().unwrap().unwrap();
        let record = MarcMapper::bundled().unwrap().map(&marc).unwrap();
        prop_assert_eq!(record.title, title);
    }

    #[test]
    fn reader_never_panics_on_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
        let mut reader = MarcReader::new(Cursor::new(bytes));
        for _ in 0..10 {
            match reader.read_record() {
                Ok(Some(_)) | Err(_) => {},
                Ok(None) => break,
            }
        }
    }
}
