//! High-level document loading.
//!
//! [`Loader`] wires the incremental [`Tokenizer`] to a [`Context`] and
//! returns the finished [`Document`]. Input may be written in any number of
//! chunks; each chunk is processed completely before `write` returns.
//!
//! # Example
//!
//! ```ignore
//! use dae_core::load_collada;
//!
//! let doc = load_collada("scene.dae")?;
//! if let Some(effects) = doc.get("effects").and_then(|e| e.as_list()) {
//!     for effect in effects {
//!         println!("{:?}", effect.get("id"));
//!     }
//! }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collada;
use crate::context::Context;
use crate::dialect::Dialect;
use crate::document::Document;
use crate::error::{ParseError, ParseResult};
use crate::schema::SchemaRegistry;
use crate::tokenizer::{Event, Tokenizer};
use crate::trace::{LogTracer, Tracer};
use crate::value::Value;

/// Options controlling a load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Fail on elements no schema recognizes instead of skipping them
    pub strict: bool,

    /// Log every push, pop and binding at trace level
    pub trace: bool,

    /// Read size when streaming from a file or reader
    pub chunk_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            trace: false,
            chunk_size: 64 * 1024,
        }
    }
}

/// Streaming driver for one document.
///
/// Once `write` fails the loader is spent: later writes and `finish` return
/// [`ParseError::Aborted`].
pub struct Loader<'r> {
    context: Context<'r>,
    tokenizer: Tokenizer,
    failed: bool,
}

impl<'r> Loader<'r> {
    pub fn new(registry: &'r SchemaRegistry, dialect: Dialect, options: &LoaderOptions) -> Self {
        let mut context = Context::new(registry, dialect, options.strict);
        if options.trace {
            context.set_tracer(Box::new(LogTracer));
        }
        Self {
            context,
            tokenizer: Tokenizer::new(),
            failed: false,
        }
    }

    /// Replace the tracer installed from the options.
    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.context.set_tracer(tracer);
        self
    }

    /// Process the next chunk of input.
    pub fn write(&mut self, chunk: &str) -> ParseResult<()> {
        if self.failed {
            return Err(ParseError::Aborted);
        }
        let context = &mut self.context;
        let result = self
            .tokenizer
            .feed(chunk, &mut |event| dispatch(context, event));
        self.failed = result.is_err();
        result
    }

    /// Current value bound to `id`, as far as the input has been processed.
    pub fn lookup(&self, id: &str) -> Option<&Value> {
        self.context.lookup(id)
    }

    /// Flush remaining input and return the document.
    pub fn finish(mut self) -> ParseResult<Document> {
        if self.failed {
            return Err(ParseError::Aborted);
        }
        let context = &mut self.context;
        self.tokenizer
            .finish(&mut |event| dispatch(context, event))?;
        self.context.end()
    }
}

fn dispatch(context: &mut Context<'_>, event: Event) -> ParseResult<()> {
    match event {
        Event::Open { tag, attributes } => context.open(&tag, attributes),
        Event::Text(text) => {
            context.text(&text);
            Ok(())
        }
        Event::Close => context.close(),
    }
}

/// Load a COLLADA file with default options.
pub fn load_collada<P: AsRef<Path>>(path: P) -> ParseResult<Document> {
    load_collada_with_options(path, &LoaderOptions::default())
}

/// Load a COLLADA file, streaming it in `options.chunk_size` reads.
pub fn load_collada_with_options<P: AsRef<Path>>(
    path: P,
    options: &LoaderOptions,
) -> ParseResult<Document> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let doc = load_collada_from_reader(file, options)?;
    log::info!(
        "Loaded {} ({} identifiers)",
        path.display(),
        doc.ids().count()
    );
    Ok(doc)
}

/// Load COLLADA markup held in memory (useful for testing).
pub fn load_collada_from_string(content: &str) -> ParseResult<Document> {
    let options = LoaderOptions::default();
    let mut loader = Loader::new(collada::shared(), collada::dialect(), &options);
    loader.write(content)?;
    loader.finish()
}

/// Load COLLADA markup from any reader.
///
/// UTF-8 sequences split across reads are carried over to the next read.
pub fn load_collada_from_reader<R: Read>(
    mut reader: R,
    options: &LoaderOptions,
) -> ParseResult<Document> {
    let mut loader = Loader::new(collada::shared(), collada::dialect(), options);
    let mut buf = vec![0u8; options.chunk_size.max(4)];
    let mut carry: Vec<u8> = Vec::new();
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        carry.extend_from_slice(&buf[..read]);
        let valid = match std::str::from_utf8(&carry) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(invalid_utf8(e)),
        };
        // `valid` bytes were just checked
        let text = std::str::from_utf8(&carry[..valid]).map_err(invalid_utf8)?;
        loader.write(text)?;
        carry.drain(..valid);
    }

    if !carry.is_empty() {
        return Err(ParseError::Markup {
            offset: total,
            message: "input ends inside a UTF-8 sequence".to_string(),
        });
    }
    loader.finish()
}

fn invalid_utf8(e: std::str::Utf8Error) -> ParseError {
    ParseError::Markup {
        offset: e.valid_up_to() as u64,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::children;
    use crate::error::ErrorKind;
    use crate::schema::{hierarchy, rename, text_value};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_up_axis_end_to_end() {
        init();
        let mut registry = SchemaRegistry::new();
        registry
            .define("string", text_value(|s| Ok(Value::from(s))))
            .define("ROOT", hierarchy(children! { "asset" => "asset" }))
            .define("asset", hierarchy(children! { "up_axis" => rename("upAxis", "string") }));
        let dialect = Dialect::new("ROOT", "ROOT").with_versions("version", &[(1, 4)]);

        let mut loader = Loader::new(&registry, dialect, &LoaderOptions::default());
        loader
            .write(r#"<ROOT version="1.4.0"><asset><up_axis>Y_UP</up_axis></asset></ROOT>"#)
            .unwrap();
        let doc = loader.finish().unwrap();

        let json = serde_json::to_value(doc.root()).unwrap();
        assert_eq!(json, serde_json::json!({ "asset": { "upAxis": "Y_UP" } }));
    }

    #[test]
    fn test_two_images_keep_order_and_ids() {
        let doc = load_collada_from_string(
            r#"<COLLADA version="1.4.1"><library_images>
                <image id="a"><init_from>a.png</init_from></image>
                <image id="b"><init_from>b.png</init_from></image>
            </library_images></COLLADA>"#,
        )
        .unwrap();

        let images = doc.get("images").and_then(Value::as_list).unwrap();
        let ids: Vec<_> = images.iter().filter_map(|i| i.get("id")?.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(doc.lookup("b"), Some(&images[1]));
    }

    #[test]
    fn test_version_gate() {
        let err = load_collada_from_string(r#"<COLLADA version="1.3.0"></COLLADA>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);

        let doc = load_collada_from_string(
            r#"<COLLADA version="1.4.1"><asset>
                <title>ok</title><keywords>brick wall</keywords>
            </asset></COLLADA>"#,
        )
        .unwrap();
        assert_eq!(doc.root().path("asset/title").and_then(Value::as_str), Some("ok"));
        let keywords = doc.root().path("asset/keywords").and_then(Value::as_strings).unwrap();
        assert_eq!(keywords, ["brick", "wall"]);

        let err = load_collada_from_string("<COLLADA></COLLADA>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_wrong_root_is_structural() {
        let err = load_collada_from_string(r#"<X3D version="1.4.1"/>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(err.to_string().contains("Not a recognized document"));
    }

    #[test]
    fn test_malformed_markup_is_raised() {
        let err =
            load_collada_from_string(r#"<COLLADA version="1.4.1"><asset></COLLADA>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Markup);

        let err = load_collada_from_string(r#"<COLLADA version="1.4.1"><asset>"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Markup);
    }

    #[test]
    fn test_empty_input() {
        let err = load_collada_from_string("  \n").unwrap_err();
        assert!(matches!(err, ParseError::EmptyDocument));
    }

    #[test]
    fn test_incremental_writes_match_single_write() {
        let content = r#"<?xml version="1.0"?>
<COLLADA version="1.4.1">
  <asset>
    <contributor><author>First</author></contributor>
    <contributor><author>Second</author></contributor>
    <unit name="meter" meter="1"/>
    <up_axis>Z_UP</up_axis>
  </asset>
</COLLADA>"#;
        let whole = load_collada_from_string(content).unwrap();

        let options = LoaderOptions::default();
        let mut loader = Loader::new(collada::shared(), collada::dialect(), &options);
        for chunk in content.as_bytes().chunks(7) {
            loader.write(std::str::from_utf8(chunk).unwrap()).unwrap();
        }
        let chunked = loader.finish().unwrap();
        assert_eq!(whole.root(), chunked.root());

        let authors: Vec<_> = chunked
            .root()
            .path("asset/contributor")
            .and_then(Value::as_list)
            .unwrap()
            .iter()
            .filter_map(|c| c.get("author")?.as_str())
            .collect();
        assert_eq!(authors, vec!["First", "Second"]);
    }

    #[test]
    fn test_lookup_while_streaming() {
        let options = LoaderOptions::default();
        let mut loader = Loader::new(collada::shared(), collada::dialect(), &options);
        loader
            .write(r#"<COLLADA version="1.4.1"><library_images><image id="a">"#)
            .unwrap();
        loader.write("<init_from>a.png</init_from>").unwrap();
        assert_eq!(loader.lookup("a"), Some(&Value::Null));
        loader.write("</image>").unwrap();
        assert_eq!(
            loader.lookup("a").and_then(|v| v.get("initFrom")).and_then(Value::as_str),
            Some("a.png")
        );
        loader.write("</library_images></COLLADA>").unwrap();
        loader.finish().unwrap();
    }

    #[test]
    fn test_reader_handles_split_utf8() {
        let content = concat!(
            r#"<COLLADA version="1.4.1"><asset>"#,
            "<title>Überblick – ✓</title></asset></COLLADA>",
        );
        let options = LoaderOptions {
            chunk_size: 5,
            ..LoaderOptions::default()
        };
        let doc = load_collada_from_reader(content.as_bytes(), &options).unwrap();
        assert_eq!(
            doc.root().path("asset/title").and_then(Value::as_str),
            Some("Überblick – ✓")
        );
    }

    #[test]
    fn test_strict_option() {
        let content = r#"<COLLADA version="1.4.1"><asset><extra/></asset></COLLADA>"#;
        let options = LoaderOptions {
            strict: true,
            ..LoaderOptions::default()
        };
        let err = load_collada_from_reader(content.as_bytes(), &options).unwrap_err();
        assert!(matches!(err, ParseError::UnknownElement { .. }));
        assert!(load_collada_from_reader(content.as_bytes(), &LoaderOptions::default()).is_ok());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: LoaderOptions = serde_json::from_str(r#"{ "strict": true }"#).unwrap();
        assert!(options.strict);
        assert!(!options.trace);
        assert_eq!(options.chunk_size, LoaderOptions::default().chunk_size);
    }

    #[test]
    fn test_reader_ending_mid_sequence_reports_length() {
        let mut content = br#"<COLLADA version="1.4.1"><asset><title>"#.to_vec();
        content.extend_from_slice(&"✓".as_bytes()[..2]);
        let err = load_collada_from_reader(content.as_slice(), &LoaderOptions::default())
            .unwrap_err();
        match err {
            ParseError::Markup { offset, .. } => assert_eq!(offset, content.len() as u64),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_failed_write_aborts_the_load() {
        let options = LoaderOptions::default();
        let mut loader = Loader::new(collada::shared(), collada::dialect(), &options);
        loader
            .write(r#"<COLLADA version="1.4.1"><library_cameras><camera id="c"><optics>"#)
            .unwrap();
        loader
            .write("<technique_common><perspective><xfov>abc")
            .unwrap();
        let err = loader.write("</xfov>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber(_)));

        let rest = concat!(
            "</perspective></technique_common></optics>",
            "</camera></library_cameras></COLLADA>",
        );
        assert!(matches!(loader.write(rest), Err(ParseError::Aborted)));
        assert!(matches!(loader.finish(), Err(ParseError::Aborted)));
    }

    #[test]
    fn test_libraries_concatenate_across_blocks() {
        let doc = load_collada_from_string(
            r#"<COLLADA version="1.4.1">
                <library_images><image id="a"/><image id="b"/></library_images>
                <library_effects/>
                <library_images><image id="c"/></library_images>
            </COLLADA>"#,
        )
        .unwrap();

        let images = doc.get("images").and_then(Value::as_list).unwrap();
        let ids: Vec<_> = images.iter().filter_map(|i| i.get("id")?.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(doc.lookup("c").is_some());
    }

    struct IdRecorder(Rc<RefCell<Vec<String>>>);

    impl Tracer for IdRecorder {
        fn bound(&mut self, _depth: usize, _tag: &str, id: Option<&str>, _sid: Option<&str>) {
            if let Some(id) = id {
                self.0.borrow_mut().push(id.to_string());
            }
        }
    }

    #[test]
    fn test_with_tracer_observes_bindings() {
        let ids = Rc::new(RefCell::new(Vec::new()));
        let options = LoaderOptions::default();
        let mut loader = Loader::new(collada::shared(), collada::dialect(), &options)
            .with_tracer(Box::new(IdRecorder(ids.clone())));
        loader
            .write(
                r#"<COLLADA version="1.4.1"><library_images>
                    <image id="a"/><image id="b"/>
                </library_images></COLLADA>"#,
            )
            .unwrap();
        loader.finish().unwrap();
        assert_eq!(*ids.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_collada("does/not/exist.dae").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
