//! Text block encoding of result values.
//!
//! A result is a run of blocks, each block a timestamp token followed by one
//! token per field: `2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,6.56@@`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{format_time, parse_time, FieldValue, Sample};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("block {block} has {found} tokens, expected {expected}")]
    TokenCount {
        block: usize,
        found: usize,
        expected: usize,
    },
    #[error("block {block}: {source}")]
    Time {
        block: usize,
        #[source]
        source: crate::models::TimeParseError,
    },
    #[error("separators must be non-empty and distinct")]
    Separators,
}

/// Separators of the text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEncoding {
    #[serde(default = "default_token_separator")]
    pub token_separator: String,
    #[serde(default = "default_block_separator")]
    pub block_separator: String,
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: String,
}

fn default_token_separator() -> String {
    ",".to_string()
}

fn default_block_separator() -> String {
    "@@".to_string()
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            token_separator: default_token_separator(),
            block_separator: default_block_separator(),
            decimal_separator: default_decimal_separator(),
        }
    }
}

impl TextEncoding {
    /// Separators must be non-empty and pairwise distinct, or encoded values
    /// could not be split back into tokens.
    pub fn check(&self) -> Result<(), EncodingError> {
        let separators = [&self.token_separator, &self.block_separator, &self.decimal_separator];
        if separators.iter().any(|s| s.is_empty())
            || self.token_separator == self.block_separator
            || self.decimal_separator == self.token_separator
            || self.decimal_separator == self.block_separator
        {
            return Err(EncodingError::Separators);
        }
        Ok(())
    }

    fn render_value(&self, value: &FieldValue) -> String {
        let text = value.to_string();
        if self.decimal_separator != "." && matches!(value, FieldValue::Number(_)) {
            text.replace('.', &self.decimal_separator)
        } else {
            text
        }
    }

    /// Encode rows; every block, the last included, ends with the block separator.
    pub fn encode(&self, samples: &[Sample]) -> String {
        let mut out = String::new();
        for sample in samples {
            out.push_str(&format_time(&sample.time));
            for value in &sample.values {
                out.push_str(&self.token_separator);
                out.push_str(&self.render_value(value));
            }
            out.push_str(&self.block_separator);
        }
        out
    }

    /// Decode `values` into rows of `field_count` values each.
    ///
    /// Blank blocks (such as the one after a trailing separator) are skipped.
    ///
    /// # Errors
    /// Returns an error when a block has the wrong token count or an
    /// unparseable timestamp.
    pub fn decode(&self, values: &str, field_count: usize) -> Result<Vec<Sample>, EncodingError> {
        self.check()?;
        let mut samples = Vec::new();
        for (block, text) in values
            .split(self.block_separator.as_str())
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .enumerate()
        {
            let tokens: Vec<&str> = text.split(self.token_separator.as_str()).collect();
            if tokens.len() != field_count + 1 {
                return Err(EncodingError::TokenCount {
                    block,
                    found: tokens.len(),
                    expected: field_count + 1,
                });
            }
            let time = parse_time(tokens[0].trim()).map_err(|source| EncodingError::Time { block, source })?;
            let values = tokens[1..]
                .iter()
                .map(|token| {
                    if self.decimal_separator != "." {
                        FieldValue::parse_token(&token.replace(self.decimal_separator.as_str(), "."))
                    } else {
                        FieldValue::parse_token(token)
                    }
                })
                .collect();
            samples.push(Sample::new(time, values));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> chrono::NaiveDateTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_encode_terminates_every_block() {
        let rows = vec![
            Sample::new(t("2007-05-01T02:59:00"), vec![FieldValue::Number(6.56)]),
            Sample::new(t("2007-05-01T03:59:00"), vec![FieldValue::Number(12.0)]),
        ];
        assert_eq!(
            TextEncoding::default().encode(&rows),
            "2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,12.0@@"
        );
        assert_eq!(TextEncoding::default().encode(&[]), "");
    }

    #[test]
    fn test_decode_accepts_trailing_separator_and_offsets() {
        let rows = TextEncoding::default()
            .decode("2000-01-01T00:00:00.0,4.4@@2000-01-15T01:00:00+01:00,4.3@@", 1)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].time, t("2000-01-15T00:00:00"));
        assert_eq!(rows[1].values, vec![FieldValue::Number(4.3)]);
    }

    #[test]
    fn test_decode_keeps_missing_tokens() {
        let rows = TextEncoding::default().decode("2000-01-01,,3.5@@", 2).unwrap();
        assert_eq!(rows[0].values, vec![FieldValue::Missing, FieldValue::Number(3.5)]);
    }

    #[test]
    fn test_decode_rejects_wrong_width_and_bad_time() {
        let enc = TextEncoding::default();
        assert_eq!(
            enc.decode("2000-01-01,1.0,2.0@@", 1),
            Err(EncodingError::TokenCount {
                block: 0,
                found: 3,
                expected: 2
            })
        );
        assert!(matches!(enc.decode("yesterday,1.0@@", 1), Err(EncodingError::Time { .. })));
    }

    #[test]
    fn test_custom_decimal_separator() {
        let enc = TextEncoding {
            token_separator: ";".into(),
            block_separator: "|".into(),
            decimal_separator: ",".into(),
        };
        let rows = enc.decode("2000-01-01T00:00:00;4,5|", 1).unwrap();
        assert_eq!(rows[0].values, vec![FieldValue::Number(4.5)]);
        assert_eq!(enc.encode(&rows), "2000-01-01T00:00:00.0;4,5|");
    }

    #[test]
    fn test_colliding_separators_are_rejected() {
        let clash = TextEncoding {
            decimal_separator: ",".into(),
            ..Default::default()
        };
        assert_eq!(clash.check(), Err(EncodingError::Separators));
        assert_eq!(clash.decode("2000-01-01,4,5@@", 1), Err(EncodingError::Separators));

        let empty = TextEncoding {
            block_separator: String::new(),
            ..Default::default()
        };
        assert_eq!(empty.check(), Err(EncodingError::Separators));
        assert!(TextEncoding::default().check().is_ok());
    }
}
