//! Fuzz harnesses for the decoders.
//!
//! Each target takes arbitrary bytes and must either decode or return an
//! error; a panic is a bug. The targets can be driven by cargo-fuzz or by
//! the seeded loops in this module's tests.

use handsync_codec::{read_incoming, ByteReader, ByteWriter, Frame, Incoming};
use handsync_protocol::{
    decode_item, message, ItemKind, Message, ParamFormatEntry, ParamType, ParamValue,
};

/// Fuzz target for stream framing.
///
/// Reads frames until the input runs out; every general message is also
/// decoded against the registry.
pub fn fuzz_incoming(data: &[u8]) {
    let mut stream = data;
    while let Ok(incoming) = read_incoming(&mut stream) {
        if let Incoming::Message(frame) = incoming {
            let _ = Message::from_frame(&frame);
        }
    }
}

/// Fuzz target for message content.
///
/// Decodes the same bytes under every registered tag. Whatever decodes must
/// re-encode to the same content. Content is compared without framing, so
/// inputs too long for one frame are still checked.
pub fn fuzz_message_content(data: &[u8]) {
    for spec in message::REGISTRY {
        if let Ok(decoded) = Message::decode(spec.tag, data) {
            let mut w = ByteWriter::new();
            decoded
                .encode(&mut w)
                .expect("a decoded message re-encodes");
            assert_eq!(w.as_bytes(), data, "{} re-encoded differently", spec.tag);
        }
    }
}

/// Fuzz target for whole frames built from arbitrary content.
pub fn fuzz_frame_parse(data: &[u8]) {
    let _ = Frame::parse(data);
}

/// Fuzz target for the schema decoder.
///
/// The input is split into (tag, type, length, value) records; the resulting
/// format and values are decoded as every category.
pub fn fuzz_schema(data: &[u8]) {
    let (format, values) = split_schema_input(data);
    for kind in ItemKind::ALL {
        let _ = decode_item(&format, &values, kind);
    }
}

/// Carves fuzzer bytes into a parameter format and matching values.
pub fn split_schema_input(data: &[u8]) -> (Vec<ParamFormatEntry>, Vec<ParamValue>) {
    let mut r = ByteReader::new(data);
    let mut format = Vec::new();
    let mut values = Vec::new();
    while let (Ok(tag), Ok(code), Ok(len)) = (r.read_array::<4>(), r.read_u8(), r.read_u8()) {
        let len = usize::from(len).min(r.remaining());
        let Ok(value) = r.read_bytes(len, "fuzz value") else {
            break;
        };
        format.push(ParamFormatEntry::new(tag, ParamType::from_code(code)));
        values.push(ParamValue::new(value));
    }
    (format, values)
}
