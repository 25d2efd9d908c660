//! Schema validation of composed request messages.
//!
//! [`PublicaSchema`] checks a message against the content model of
//! `schema_nfse_v03.xsd`: element order and cardinality, closed code lists,
//! digit/length restrictions, decimal precision and date formats. It returns
//! every violation, not just the first one.
//!
//! Any other validator (for example one backed by libxml2 and the original
//! XSD) can be plugged into the client through [`SchemaValidator`].

mod model;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::core::{NfseError, ValidationError};
use crate::xml::{self, Node};
use model::{Content, MESSAGES, Particle, SimpleType, Term};

/// Name of the schema file the content model mirrors.
pub const SCHEMA_FILE: &str = "schema_nfse_v03.xsd";

/// Target namespace of [`SCHEMA_FILE`].
pub const SCHEMA_NAMESPACE: &str = "http://www.publica.inf.br";

/// Validates a composed message before it is sent.
pub trait SchemaValidator {
    /// # Errors
    ///
    /// `SchemaValidationFailed` carrying every violation found.
    fn validate(&self, xml: &str) -> Result<(), NfseError>;
}

/// Built-in validator for the Publica request messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicaSchema;

impl SchemaValidator for PublicaSchema {
    fn validate(&self, xml: &str) -> Result<(), NfseError> {
        let errors = validate_message(xml);
        if errors.is_empty() {
            Ok(())
        } else {
            warn!(violations = errors.len(), "request does not conform to {SCHEMA_FILE}");
            Err(NfseError::SchemaValidationFailed(errors))
        }
    }
}

/// Validate a request message. Returns all errors found.
pub fn validate_message(xml: &str) -> Vec<ValidationError> {
    let doc = match xml::parse(xml) {
        Ok(doc) => doc,
        Err(e) => return vec![ValidationError::new("/", e.to_string())],
    };
    let root = doc.root_element();

    let mut errors = Vec::new();
    let name = root.tag_name().name();
    match MESSAGES.iter().find(|(root_name, _)| *root_name == name) {
        Some((_, content)) => check_element(root, content, name, &mut errors),
        None => errors.push(ValidationError::new(
            name,
            format!("{name} is not a request message of {SCHEMA_FILE}"),
        )),
    }
    errors
}

fn check_element(
    el: Node<'_, '_>,
    content: &Content,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    match content {
        Content::Any => {}
        Content::Simple(simple) => {
            if xml::child_elements(el).next().is_some() {
                errors.push(ValidationError::new(path, "element content not allowed"));
                return;
            }
            if let Err(message) = check_simple(&xml::text_content(el), simple) {
                errors.push(ValidationError::new(path, message));
            }
        }
        Content::Sequence(particles) => {
            let stray_text = el
                .children()
                .any(|n| n.is_text() && n.text().is_some_and(|t| !t.trim().is_empty()));
            if stray_text {
                errors.push(ValidationError::new(path, "text content not allowed"));
            }
            check_sequence(el, particles, path, errors);
        }
    }
}

/// Resolve which element declaration a child matches, if any.
fn matching<'a>(particle: &'a Particle, child: Node<'_, '_>) -> Option<(&'static str, &'a Content)> {
    match &particle.term {
        Term::Element(name, content) => {
            (*name == child.tag_name().name()).then_some((*name, content))
        }
        Term::Choice(alternatives) => alternatives.iter().find_map(|alt| matching(alt, child)),
    }
}

fn describe(particle: &Particle) -> String {
    match &particle.term {
        Term::Element(name, _) => (*name).to_string(),
        Term::Choice(alternatives) => alternatives
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join(" or "),
    }
}

fn check_sequence(
    el: Node<'_, '_>,
    particles: &[Particle],
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    let children: Vec<Node<'_, '_>> = xml::child_elements(el).collect();
    let mut idx = 0;

    for particle in particles {
        let mut count = 0;
        while count < particle.max && idx < children.len() {
            let Some((name, content)) = matching(particle, children[idx]) else {
                break;
            };
            check_element(children[idx], content, &format!("{path}/{name}"), errors);
            idx += 1;
            count += 1;
        }
        if count < particle.min {
            let found = children
                .get(idx)
                .map_or_else(|| "end of element".to_string(), |c| c.tag_name().name().to_string());
            errors.push(ValidationError::new(
                path,
                format!("expected {}, found {found}", describe(particle)),
            ));
        }
    }

    for &extra in &children[idx..] {
        let extra_path = format!("{path}/{}", extra.tag_name().name());
        if particles.iter().any(|p| matching(p, extra).is_some()) {
            errors.push(ValidationError::new(
                extra_path,
                "element out of order or repeated too often",
            ));
        } else {
            errors.push(ValidationError::new(
                extra_path,
                "element not allowed here",
            ));
        }
    }
}

fn check_simple(value: &str, simple: &SimpleType) -> Result<(), String> {
    match simple {
        SimpleType::Text { min, max } => {
            let len = value.chars().count();
            if value.trim().is_empty() {
                return Err("must not be empty".into());
            }
            if len < *min || len > *max {
                return Err(format!("length {len} outside {min}..={max}"));
            }
        }
        SimpleType::Digits { min, max } => {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("'{value}' must contain only digits"));
            }
            if value.len() < *min || value.len() > *max {
                return Err(format!("'{value}' must have {min} to {max} digits"));
            }
        }
        SimpleType::Amount => check_decimal(value, 15, 2)?,
        SimpleType::Rate => check_decimal(value, 5, 4)?,
        SimpleType::Codes(codes) => {
            if !codes.contains(&value) {
                return Err(format!("'{value}' is not one of {codes:?}"));
            }
        }
        SimpleType::DateTime => {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .map_err(|_| format!("'{value}' is not a YYYY-MM-DDTHH:MM:SS date-time"))?;
        }
        SimpleType::Date => {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))?;
        }
    }
    Ok(())
}

fn check_decimal(value: &str, int_digits: usize, fraction_digits: usize) -> Result<(), String> {
    let (int_part, frac_part) = value.split_once('.').unwrap_or((value, ""));
    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() || !digits_only(int_part) || !digits_only(frac_part) {
        return Err(format!("'{value}' is not a non-negative decimal"));
    }
    if value.ends_with('.') {
        return Err(format!("'{value}' is not a non-negative decimal"));
    }
    if int_part.len() > int_digits || frac_part.len() > fraction_digits {
        return Err(format!(
            "'{value}' exceeds {int_digits} integer / {fraction_digits} fraction digits"
        ));
    }
    Ok(())
}
