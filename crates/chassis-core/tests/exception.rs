//! 异常规范化与回溯输出的集成测试。

use std::io;
use std::panic;

use chassis_core::exception::{Exception, StackTrace, as_exception};

#[derive(Debug, thiserror::Error)]
#[error("handshake rejected")]
struct Handshake {
    #[source]
    source: Frame,
}

#[derive(Debug, thiserror::Error)]
#[error("frame too large")]
struct Frame {
    #[source]
    source: io::Error,
}

fn nested() -> Handshake {
    Handshake {
        source: Frame {
            source: io::Error::other("socket reset"),
        },
    }
}

fn render(exception: &Exception, prefixes: &[&str]) -> String {
    let mut out = Vec::new();
    exception
        .print_stack_trace(Some(&mut out), prefixes)
        .expect("write to vec");
    String::from_utf8(out).expect("utf8 traceback")
}

#[test]
fn absent_value_stays_absent() {
    assert!(as_exception::<io::Error>(None, StackTrace::capture()).is_none());
}

#[test]
fn wrapping_is_idempotent() {
    let first = Exception::new(io::Error::other("boom"));
    let again = as_exception(Some(first.clone()), StackTrace::empty()).expect("present");

    assert!(first.ptr_eq(&again));
    assert_eq!(again.stack(), first.stack());

    let distinct = Exception::new(io::Error::other("boom"));
    assert!(!first.ptr_eq(&distinct));
}

#[test]
fn wrapped_cause_keeps_its_type() {
    let exception = Exception::wrap(
        io::Error::new(io::ErrorKind::ConnectionReset, "peer gone"),
        StackTrace::empty(),
    );

    let cause = exception.downcast_ref::<io::Error>().expect("io cause");
    assert_eq!(cause.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(exception.to_string(), "peer gone");
    assert!(exception.kind().ends_with("Error"));
}

#[test]
fn traceback_lists_prefixes_cause_and_stack() {
    let exception = Exception::wrap(
        io::Error::other("disk on fire"),
        StackTrace::from_bytes("frame-0\nframe-1\n"),
    );

    let text = render(&exception, &["[conn 7] ", "read: "]);

    assert!(text.starts_with("[conn 7] read: Error Traceback:\n"), "{text}");
    assert!(text.contains(": disk on fire\n"), "{text}");
    assert!(text.ends_with("frame-0\nframe-1\n"), "{text}");
}

#[test]
fn traceback_indents_each_source_hop() {
    let exception = Exception::wrap(nested(), StackTrace::empty());

    let text = render(&exception, &[]);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Error Traceback:");
    assert!(lines[1].ends_with("Handshake: handshake rejected"), "{text}");
    assert_eq!(lines[2], "  caused by: frame too large");
    assert_eq!(lines[3], "    caused by: socket reset");
    assert_eq!(lines.len(), 4);
}

#[test]
fn debug_values_become_synthetic_causes() {
    let exception = Exception::from_debug((7, "late"), StackTrace::empty());
    assert_eq!(exception.to_string(), "(7, \"late\")");
}

#[test]
fn panic_payloads_are_normalized() {
    let payload = panic::catch_unwind(|| panic!("handler exploded: {}", 3)).expect_err("panics");
    let exception = Exception::from_panic(payload, StackTrace::capture());

    assert_eq!(exception.kind(), "panic");
    assert_eq!(exception.to_string(), "handler exploded: 3");
    assert!(!exception.stack().is_empty());

    let opaque = Exception::from_panic(Box::new(5_u64), StackTrace::empty());
    assert_eq!(opaque.to_string(), "opaque panic payload");
}
