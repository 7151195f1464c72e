//! Optional structured tracing of the stack machine.

use crate::value::Value;

/// Observer of frame pushes, pops and identifier bindings.
///
/// All methods default to doing nothing. A tracer never influences the
/// parse result.
pub trait Tracer {
    fn opened(&mut self, _depth: usize, _tag: &str, _kind: &str) {}

    fn closed(&mut self, _depth: usize, _tag: &str, _value: &Value) {}

    fn bound(&mut self, _depth: usize, _tag: &str, _id: Option<&str>, _sid: Option<&str>) {}
}

/// Forwards every callback to `log::trace!`.
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn opened(&mut self, depth: usize, tag: &str, kind: &str) {
        log::trace!("{:indent$}<{}> ({})", "", tag, kind, indent = depth * 2);
    }

    fn closed(&mut self, depth: usize, tag: &str, value: &Value) {
        log::trace!("{:indent$}</{}> -> {:?}", "", tag, value, indent = depth * 2);
    }

    fn bound(&mut self, depth: usize, tag: &str, id: Option<&str>, sid: Option<&str>) {
        log::trace!(
            "{:indent$}<{}> bound id={:?} sid={:?}",
            "",
            tag,
            id,
            sid,
            indent = depth * 2
        );
    }
}
