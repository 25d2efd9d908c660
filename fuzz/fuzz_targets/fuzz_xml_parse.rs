#![no_main]

use libfuzzer_sys::fuzz_target;
use nfse_publica::xml;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // The canonical form of any parsed document must itself parse.
        if let Ok(doc) = xml::parse(s) {
            let canonical = xml::canonicalize(doc.root_element());
            assert!(xml::parse(&canonical).is_ok(), "{canonical}");
        }
    }
});
