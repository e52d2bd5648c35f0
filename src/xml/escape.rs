use std::char::REPLACEMENT_CHARACTER;

/// Appends `raw` to `out`, escaped for use in XML attribute values and text.
///
/// Invalid UTF-8 sequences become U+FFFD. Tab, newline and carriage return
/// become character references so attribute value normalization keeps them.
/// Other control characters are written as character references too, except
/// NUL which no XML document may contain and is replaced by U+FFFD.
pub fn append_xml_encoded(out: &mut String, raw: &[u8]) {
    for c in String::from_utf8_lossy(raw).chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            '\0' => out.push(REPLACEMENT_CHARACTER),
            c if u32::from(c) < 0x20 => out.push_str(&format!("&#x{:X};", u32::from(c))),
            c => out.push(c),
        }
    }
}

pub fn xml_encoded(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    append_xml_encoded(&mut out, raw);
    out
}

#[cfg(test)]
mod tests {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    use super::*;

    fn parse_attribute(document: &str) -> String {
        let mut reader = Reader::from_str(document);
        loop {
            match reader.read_event().unwrap() {
                Event::Empty(e) => {
                    let attribute = e.attributes().next().unwrap().unwrap();
                    return attribute.unescape_value().unwrap().into_owned();
                }
                Event::Eof => panic!("no element in {document}"),
                _ => (),
            }
        }
    }

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(xml_encoded(b"a&b<c>d\"e"), "a&amp;b&lt;c&gt;d&quot;e");
        assert_eq!(xml_encoded(b"line\nbreak\ttab\rcr"), "line&#xA;break&#x9;tab&#xD;cr");
        assert_eq!(xml_encoded(b"\x01\x1f"), "&#x1;&#x1F;");
    }

    #[test]
    fn safe_text_is_unchanged() {
        for text in ["", "Baker Street", "Kraków", "東京", "it's ok"] {
            assert_eq!(xml_encoded(text.as_bytes()), text);
        }
    }

    #[test]
    fn escaped_values_round_trip_through_a_parser() {
        let samples = [
            "Fish & Chips",
            "<b>bold</b>",
            "say \"hi\"",
            "multi\nline\ttext\r",
            "bell\x07 and \x1b escape",
            "&amp; already looks escaped",
        ];
        for sample in samples {
            let document = format!("<tag v=\"{}\"/>", xml_encoded(sample.as_bytes()));
            assert_eq!(parse_attribute(&document), sample, "document: {document}");
        }
    }

    #[test]
    fn invalid_utf8_is_replaced_deterministically() {
        let raw = b"caf\xe9 \xff\xfe end";
        let encoded = xml_encoded(raw);
        assert_eq!(encoded, "caf\u{FFFD} \u{FFFD}\u{FFFD} end");
        // Re-encoding the repaired text is stable.
        assert_eq!(xml_encoded(encoded.as_bytes()), encoded);
        assert_eq!(xml_encoded(b"\0"), "\u{FFFD}");
    }
}
