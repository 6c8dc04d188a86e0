//! RDF terms produced by the mapping engine

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Well-known vocabulary IRIs used by the engine itself
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

/// A literal value with an optional datatype or language tag.
///
/// A literal with neither is a plain string (`xsd:string`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub lang: Option<String>,
}

impl Literal {
    /// Plain string literal
    pub fn plain(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Literal with an explicit datatype IRI
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// Language-tagged string
    pub fn lang(lexical: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), vocab::XSD_INTEGER)
    }

    pub fn double(value: f64) -> Self {
        Self::typed(value.to_string(), vocab::XSD_DOUBLE)
    }

    pub fn boolean(value: bool) -> Self {
        Self::typed(value.to_string(), vocab::XSD_BOOLEAN)
    }

    /// The effective datatype, `xsd:string` for plain literals
    pub fn datatype(&self) -> &str {
        self.datatype.as_deref().unwrap_or(vocab::XSD_STRING)
    }
}

/// A node or value in a statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Term {
    /// Absolute IRI
    Iri(String),
    /// Run-local anonymous node, identified by label only
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// The lexical content of the term: IRI text, blank label, or literal form
    pub fn as_str(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Blank(label) => label,
            Term::Literal(lit) => &lit.lexical,
        }
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Term::Literal(lit)
    }
}

/// N-Triples rendering of the term
impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", escape_iri(iri)),
            Term::Blank(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", escape_literal(&lit.lexical))?;
                if let Some(lang) = &lit.lang {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = &lit.datatype {
                    if dt == vocab::XSD_STRING {
                        Ok(())
                    } else {
                        write!(f, "^^<{}>", escape_iri(dt))
                    }
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Percent-encode the characters an N-Triples `IRIREF` cannot contain
pub fn escape_iri(iri: &str) -> Cow<'_, str> {
    fn forbidden(c: char) -> bool {
        c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
    }

    if !iri.chars().any(forbidden) {
        return Cow::Borrowed(iri);
    }
    let mut out = String::with_capacity(iri.len() + 8);
    for c in iri.chars() {
        if forbidden(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_terms_as_ntriples() {
        assert_eq!(Term::iri("http://example.com/a").to_string(), "<http://example.com/a>");
        assert_eq!(Term::Blank("b0".into()).to_string(), "_:b0");
        assert_eq!(Term::from(Literal::plain("hi")).to_string(), "\"hi\"");
        assert_eq!(Term::from(Literal::lang("hi", "en")).to_string(), "\"hi\"@en");
        assert_eq!(
            Term::from(Literal::integer(123)).to_string(),
            "\"123\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn escapes_literal_content() {
        let lit = Term::from(Literal::plain("say \"hi\"\nback\\slash"));
        assert_eq!(lit.to_string(), r#""say \"hi\"\nback\\slash""#);
    }

    #[test]
    fn plain_literal_defaults_to_xsd_string() {
        assert_eq!(Literal::plain("x").datatype(), vocab::XSD_STRING);
        assert_eq!(Literal::boolean(true).datatype(), vocab::XSD_BOOLEAN);
    }
}
