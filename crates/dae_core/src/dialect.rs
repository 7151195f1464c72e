//! Document flavours: root element, root schema and accepted versions.

use crate::error::{ParseError, ParseResult};
use crate::schema::SchemaRef;
use crate::value::Attributes;

/// What the driver expects at the top of a document.
#[derive(Clone, Debug)]
pub struct Dialect {
    /// Required name of the first element
    pub root_tag: String,
    /// Schema driving the root element
    pub root: SchemaRef,
    /// Root attribute carrying the version, if versions are checked
    pub version_attribute: Option<String>,
    /// Accepted `(major, minor)` pairs
    pub supported_versions: Vec<(u32, u32)>,
}

impl Dialect {
    pub fn new(root_tag: &str, root: impl Into<SchemaRef>) -> Self {
        Self {
            root_tag: root_tag.to_string(),
            root: root.into(),
            version_attribute: None,
            supported_versions: Vec::new(),
        }
    }

    /// Require `attribute` on the root with one of the given major/minor versions.
    pub fn with_versions(mut self, attribute: &str, versions: &[(u32, u32)]) -> Self {
        self.version_attribute = Some(attribute.to_string());
        self.supported_versions = versions.to_vec();
        self
    }

    /// Validate the root element's attributes.
    pub fn check_version(&self, attributes: &Attributes) -> ParseResult<()> {
        let Some(attribute) = &self.version_attribute else {
            return Ok(());
        };
        let version = attributes
            .get(attribute)
            .ok_or_else(|| ParseError::MissingAttribute {
                tag: self.root_tag.clone(),
                attribute: attribute.clone(),
            })?;

        if let Some(pair) = major_minor(version) {
            if self.supported_versions.contains(&pair) {
                return Ok(());
            }
        }

        Err(ParseError::UnsupportedVersion {
            tag: self.root_tag.clone(),
            found: version.clone(),
            supported: self
                .supported_versions
                .iter()
                .map(|(major, minor)| format!("{}.{}.x", major, minor))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

fn major_minor(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect() -> Dialect {
        Dialect::new("COLLADA", "COLLADA").with_versions("version", &[(1, 4)])
    }

    fn version(v: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("version".to_string(), v.to_string());
        attrs
    }

    #[test]
    fn test_supported_versions() {
        assert!(dialect().check_version(&version("1.4.1")).is_ok());
        assert!(dialect().check_version(&version("1.4.0")).is_ok());
    }

    #[test]
    fn test_unsupported_versions() {
        for v in ["1.3.0", "1.5.0", "1.40", "garbage", ""] {
            let err = dialect().check_version(&version(v)).unwrap_err();
            assert!(matches!(err, ParseError::UnsupportedVersion { .. }), "{}", v);
        }
    }

    #[test]
    fn test_missing_version() {
        let err = dialect().check_version(&Attributes::new()).unwrap_err();
        assert!(matches!(err, ParseError::MissingAttribute { .. }));
    }

    #[test]
    fn test_unchecked_dialect() {
        assert!(Dialect::new("doc", "doc").check_version(&Attributes::new()).is_ok());
    }
}
