//! Acceptance battery over the public API: documents that must parse,
//! documents that must fail with a specific error kind, and round-trip
//! checks through the tape serializer.

use simd_tape::{to_tape, ErrorType};

fn accept(doc: &str) {
    let tape = to_tape(doc.as_bytes()).unwrap_or_else(|e| panic!("rejected {doc}: {e}"));
    // re-serializing and re-parsing must land on the identical tape
    let json = tape.to_json();
    let again = to_tape(json.as_bytes()).unwrap_or_else(|e| panic!("rejected own output {json}: {e}"));
    assert_eq!(tape, again, "unstable round trip for {doc}");
}

fn reject(doc: &str, kind: ErrorType) {
    match to_tape(doc.as_bytes()) {
        Ok(_) => panic!("accepted {doc}"),
        Err(e) => assert_eq!(e.error_type(), kind, "wrong error for {doc}: {e}"),
    }
}

#[test]
fn passes() {
    for doc in [
        "{}",
        "[]",
        "true",
        "false",
        "null",
        "0",
        "-0",
        "42",
        "-13",
        "3.1415",
        "2e10",
        "2E-10",
        "1.5e+300",
        r#""""#,
        r#""a""#,
        r#""\"""#,
        r#""\\""#,
        r#""A""#,
        r#""😀""#,
        "[null]",
        "[true,false]",
        "[[[[[[[[[[]]]]]]]]]]",
        r#"{"a":{}}"#,
        r#"{"a":{"b":{"c":[]}}}"#,
        r#"{"":""}"#,
        r#"{"key":"value","other":[1,2,3],"n":null}"#,
        r#"[0.5,{"x":1e-3},"txt",false]"#,
        "  {\n\t\"a\" : 1\r\n}  ",
        r#"{"big":18446744073709551615,"small":-9223372036854775808}"#,
    ] {
        accept(doc);
    }
}

#[test]
fn fails_with_tape_error() {
    for doc in [
        "{", "}", "[", "]", ",", ":", "{]", "[}", "[1,]", "[,1]", "[1,2,]", r#"{"a":}"#,
        r#"{"a":1,}"#, r#"{:1}"#, "[1,2][3]", "{} {}", "x", "+1", ".5",
        r#"{"a":1}}"#,
    ] {
        reject(doc, ErrorType::TapeError);
    }
}

#[test]
fn fails_with_string_error() {
    for doc in [
        r#"""#,
        r#""abc"#,
        r#""\"#,
        r#""\x""#,
        r#""\u""#,
        r#""\u123""#,
        r#""\ughij""#,
        r#"["\udc00"]"#,
        r#"["\ud800"]"#,
        r#"["\ud800\ud800"]"#,
        "\"tab\there\"",
        // a missing comma is noticed while looking at the next key's quote
        r#"{"a":"x""b":2}"#,
    ] {
        reject(doc, ErrorType::StringError);
    }
}

#[test]
fn fails_with_number_error() {
    for doc in [
        "01", "-01", "0.", "1.", "-", "1e", "1e+", "1E-", "1.2e", "1..2", "1.2.3",
        "9e999", "-9e999", "1e+9999", "[0x1]", "[1f]", r#"{"a":1"b":2}"#,
    ] {
        reject(doc, ErrorType::NumberError);
    }
}

#[test]
fn fails_with_atom_errors() {
    for doc in ["truu", "tru", "[ture]", "True"] {
        // "True" starts with 'T', which is no atom at all
        let kind = if doc.starts_with('t') {
            ErrorType::TAtomError
        } else {
            ErrorType::TapeError
        };
        reject(doc, kind);
    }
    for doc in ["fals", "falze", "[falsee]"] {
        reject(doc, ErrorType::FAtomError);
    }
    for doc in ["nil", "nulll", "[nul]"] {
        reject(doc, ErrorType::NAtomError);
    }
}

#[test]
fn fails_empty() {
    reject("", ErrorType::Empty);
    reject(" \t\r\n", ErrorType::Empty);
}

#[test]
fn serializes_compactly() {
    let tape = to_tape(br#" { "a" : [ 1 , 2.5 , "x" ] , "b" : null } "#).expect("parse");
    assert_eq!(tape.to_json(), r#"{"a":[1,2.5,"x"],"b":null}"#);
}

#[test]
fn documents_keep_key_order() {
    let tape = to_tape(br#"{"z":1,"a":2,"m":3}"#).expect("parse");
    assert_eq!(tape.to_json(), r#"{"z":1,"a":2,"m":3}"#);
}
