//! Workspace filter rules and the `filter.xml` manifest.

use std::fmt::Write as _;

use quick_xml::escape::escape;

use crate::classify::{Classification, IncludeExclude};

/// Archive path of the filter manifest.
pub const FILTER_MANIFEST_PATH: &str = "META-INF/vault/filter.xml";

const ENVELOPE_HEAD: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<workspaceFilter version=\"1.0\">\n";
const ENVELOPE_TAIL: &str = "</workspaceFilter>";

/// A single `<filter>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// Install the uploaded content under `root`, optionally restricted to
    /// the node's own properties.
    Include {
        root: String,
        include_exclude: Option<IncludeExclude>,
    },
    /// Replace `root` with what the package holds (nothing), removing it.
    Replace { root: String },
}

impl FilterRule {
    pub fn for_upload(classification: &Classification) -> Self {
        Self::Include {
            root: classification.filter.clone(),
            include_exclude: classification.include_exclude.clone(),
        }
    }

    pub fn for_delete(classification: &Classification) -> Self {
        Self::Replace {
            root: classification.filter.clone(),
        }
    }

    pub fn root(&self) -> &str {
        match self {
            Self::Include { root, .. } | Self::Replace { root } => root,
        }
    }

    /// Render the rule as a single line of XML.
    pub fn to_xml(&self) -> String {
        match self {
            Self::Include {
                root,
                include_exclude,
            } => {
                let mut xml = format!(r#"<filter root="{}">"#, escape(root.as_str()));
                if let Some(ie) = include_exclude {
                    let _ = write!(
                        xml,
                        r#"<exclude pattern="{}" /><include pattern="{}" />"#,
                        escape(ie.exclude.as_str()),
                        escape(ie.include.as_str())
                    );
                }
                xml.push_str("</filter>");
                xml
            }
            Self::Replace { root } => {
                format!(r#"<filter mode="replace" root="{}"/>"#, escape(root.as_str()))
            }
        }
    }
}

/// Wrap rules, in order, into a complete `filter.xml` document.
pub fn render_manifest(rules: &[FilterRule]) -> String {
    let mut doc = String::from(ENVELOPE_HEAD);
    for rule in rules {
        doc.push_str(&rule.to_xml());
        doc.push('\n');
    }
    doc.push_str(ENVELOPE_TAIL);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use quick_xml::Reader;
    use quick_xml::events::Event;
    use std::path::Path;

    #[test]
    fn include_rule_for_descriptor_upload() {
        let c = classify(Path::new("/proj/jcr_root/apps/foo/.content.xml")).unwrap();
        assert_eq!(
            FilterRule::for_upload(&c).to_xml(),
            r#"<filter root="/apps/foo"><exclude pattern="/apps/foo/.*" /><include pattern="/apps/foo/jcr:content" /></filter>"#
        );
    }

    #[test]
    fn include_rule_for_plain_upload() {
        let c = classify(Path::new("/proj/jcr_root/apps/foo/a.js")).unwrap();
        assert_eq!(
            FilterRule::for_upload(&c).to_xml(),
            r#"<filter root="/apps/foo/a.js"></filter>"#
        );
    }

    #[test]
    fn replace_rule_for_delete() {
        let c = classify(Path::new("/proj/jcr_root/apps/foo/.content.xml")).unwrap();
        let rule = FilterRule::for_delete(&c);
        assert_eq!(rule.root(), "/apps/foo");
        assert_eq!(rule.to_xml(), r#"<filter mode="replace" root="/apps/foo"/>"#);
    }

    #[test]
    fn attribute_values_are_escaped() {
        let rule = FilterRule::Replace {
            root: "/content/a&b\"c".to_string(),
        };
        assert_eq!(
            rule.to_xml(),
            r#"<filter mode="replace" root="/content/a&amp;b&quot;c"/>"#
        );
    }

    #[test]
    fn manifest_keeps_rule_order() {
        let rules = vec![
            FilterRule::Include {
                root: "/apps/foo".to_string(),
                include_exclude: None,
            },
            FilterRule::Replace {
                root: "/apps/foo".to_string(),
            },
        ];
        let doc = render_manifest(&rules);
        assert_eq!(
            doc,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <workspaceFilter version=\"1.0\">\n\
             <filter root=\"/apps/foo\"></filter>\n\
             <filter mode=\"replace\" root=\"/apps/foo\"/>\n\
             </workspaceFilter>"
        );

        let mut reader = Reader::from_str(&doc);
        let mut modes = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"filter" => {
                    let mode = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"mode")
                        .map(|a| a.unescape_value().unwrap().into_owned());
                    modes.push(mode);
                }
                Ok(Event::Eof) => break,
                Err(e) => panic!("manifest should be well-formed: {e}"),
                _ => {}
            }
        }
        assert_eq!(modes, vec![None, Some("replace".to_string())]);
    }
}
