//! Dataset compression variants, discriminated by an explicit `type` tag.

use serde_json::{json, Value};

use adf_core::{Diagnostics, PropertyBag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetCompression {
    BZip2,
    Deflate,
    GZip { level: Option<String> },
    Tar,
    TarGZip { level: Option<String> },
    ZipDeflate { level: Option<String> },
}

impl DatasetCompression {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::BZip2 => "BZip2",
            Self::Deflate => "Deflate",
            Self::GZip { .. } => "GZip",
            Self::Tar => "Tar",
            Self::TarGZip { .. } => "TarGZip",
            Self::ZipDeflate { .. } => "ZipDeflate",
        }
    }
}

/// Wire shape: `{"type": tag}` plus a `level` for the variants that carry
/// one.
pub fn expand_compression(c: &DatasetCompression) -> Value {
    let mut out = PropertyBag::new();
    out.insert("type".into(), json!(c.type_tag()));
    let level = match c {
        DatasetCompression::GZip { level }
        | DatasetCompression::TarGZip { level }
        | DatasetCompression::ZipDeflate { level } => level.clone(),
        _ => None,
    };
    if let Some(level) = level {
        out.insert("level".into(), json!(level));
    }
    Value::Object(out)
}

/// Inverse of [`expand_compression`]. An unrecognized tag reads as "no
/// compression" with a diagnostic rather than an error.
pub fn flatten_compression(v: &Value, diags: &mut Diagnostics) -> Option<DatasetCompression> {
    let tag = match v.get("type").and_then(Value::as_str) {
        Some(t) => t,
        None => {
            diags.skip("compression", "missing `type` tag");
            return None;
        }
    };
    let level = v.get("level").and_then(Value::as_str).map(str::to_string);
    match tag {
        "BZip2" => Some(DatasetCompression::BZip2),
        "Deflate" => Some(DatasetCompression::Deflate),
        "GZip" => Some(DatasetCompression::GZip { level }),
        "Tar" => Some(DatasetCompression::Tar),
        "TarGZip" => Some(DatasetCompression::TarGZip { level }),
        "ZipDeflate" => Some(DatasetCompression::ZipDeflate { level }),
        other => {
            diags.skip("compression", format!("unrecognized compression type `{}`", other));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_six_tags_round_trip() {
        let cases = vec![
            DatasetCompression::BZip2,
            DatasetCompression::Deflate,
            DatasetCompression::GZip { level: Some("Optimal".into()) },
            DatasetCompression::Tar,
            DatasetCompression::TarGZip { level: Some("Fastest".into()) },
            DatasetCompression::ZipDeflate { level: None },
        ];
        for c in cases {
            let wire = expand_compression(&c);
            let mut diags = Diagnostics::new();
            assert_eq!(flatten_compression(&wire, &mut diags), Some(c));
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn unknown_tag_reads_as_no_compression() {
        let mut diags = Diagnostics::new();
        let got = flatten_compression(&json!({"type": "Lz4", "level": "Fast"}), &mut diags);
        assert_eq!(got, None);
        assert!(diags.mentions("compression"));
    }

    #[test]
    fn missing_tag_reads_as_no_compression() {
        let mut diags = Diagnostics::new();
        assert_eq!(flatten_compression(&json!({"level": "Optimal"}), &mut diags), None);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn level_only_serialized_where_it_belongs() {
        let wire = expand_compression(&DatasetCompression::Tar);
        assert_eq!(wire, json!({"type": "Tar"}));
        let wire = expand_compression(&DatasetCompression::GZip { level: Some("Optimal".into()) });
        assert_eq!(wire, json!({"type": "GZip", "level": "Optimal"}));
    }
}
