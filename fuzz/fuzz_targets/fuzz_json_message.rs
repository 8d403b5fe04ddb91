#![no_main]

use libfuzzer_sys::fuzz_target;
use om_message::{Message, TableDescriptor};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let (Some(attributes), Some(body)) = (doc.remove("attributes"), doc.remove("body")) else {
        return;
    };

    if let Ok(descriptor) = TableDescriptor::from_attributes(&attributes) {
        assert_eq!(descriptor.names().len(), descriptor.table.columns.len());
    }

    let msg = Message::new(body, attributes);
    if let Ok(frame) = msg.to_frame() {
        assert_eq!(frame.to_rows().len(), frame.len());
    }
    let _ = msg.to_string();
});
