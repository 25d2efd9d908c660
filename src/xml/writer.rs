use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::{Cursor, Write};

use crate::core::NfseError;

pub type XmlResult = Result<String, NfseError>;

fn xml_io(e: impl std::fmt::Display) -> NfseError {
    NfseError::Xml(format!("XML write error: {e}"))
}

/// Compact fragment writer: no declaration, no indentation.
///
/// Request documents are signed, so the output must not carry formatting
/// whitespace.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> XmlResult {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| NfseError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, NfseError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, NfseError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, NfseError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Text content escapes only `&`, `<` and `>`, which is also the
    /// canonical form the signer serializes back.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, NfseError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write the element only when a value is present.
    pub fn opt_text_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, NfseError> {
        match text {
            Some(t) => self.text_element(name, t),
            None => Ok(self),
        }
    }

    /// Monetary amount with exactly two decimal places.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, NfseError> {
        self.text_element(name, &format_amount(amount))
    }

    pub fn opt_amount_element(
        &mut self,
        name: &str,
        amount: Option<Decimal>,
    ) -> Result<&mut Self, NfseError> {
        match amount {
            Some(a) => self.amount_element(name, a),
            None => Ok(self),
        }
    }

    /// Append an already rendered fragment verbatim.
    pub fn raw(&mut self, fragment: &str) -> Result<&mut Self, NfseError> {
        self.writer
            .get_mut()
            .write_all(fragment.as_bytes())
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Format a monetary value with two decimal places, rounding half away from zero.
pub fn format_amount(d: Decimal) -> String {
    let rounded = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Escape `&`, `<` and `>` the way the SOAP envelope embeds the request document.
pub fn escape_text(text: &str) -> String {
    partial_escape(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_cases() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(1500.0)), "1500.00");
        assert_eq!(format_amount(dec!(49.9)), "49.90");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(10.125)), "10.13");
    }

    #[test]
    fn fragments_have_no_declaration_or_indent() {
        let mut w = XmlWriter::new();
        w.start_element("Servico").unwrap();
        w.text_element("Discriminacao", "Tom & Jerry <ltda>").unwrap();
        w.end_element("Servico").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            "<Servico><Discriminacao>Tom &amp; Jerry &lt;ltda&gt;</Discriminacao></Servico>"
        );
    }

    #[test]
    fn quotes_are_not_escaped_in_text() {
        let mut w = XmlWriter::new();
        w.text_element("RazaoSocial", "Pão d'Água \"ME\"").unwrap();
        assert_eq!(
            w.into_string().unwrap(),
            "<RazaoSocial>Pão d'Água \"ME\"</RazaoSocial>"
        );
    }
}
