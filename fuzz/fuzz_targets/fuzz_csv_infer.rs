#![no_main]

use libfuzzer_sys::fuzz_target;
use om_message::{Message, TypeMapping};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = om_io::read_csv_bytes(data) else {
        return;
    };

    for column in frame.columns() {
        assert_eq!(column.len(), frame.len());
    }

    let Ok(msg) = Message::table(&frame, "fuzz", &TypeMapping::hana()) else {
        return;
    };
    let back = msg.to_frame().expect("inferred descriptor must describe its own body");
    assert_eq!(back.names(), frame.names());
    assert_eq!(back.len(), frame.len());

    let _ = om_io::write_csv_string(&frame);
});
