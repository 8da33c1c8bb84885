//! Parameter reference handling and SQL wrapping.

use crate::staging::{Namespace, StagingStore};

/// How `$name` parameter references are rendered.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ParamStyle<'a> {
    /// Keep `$name` placeholders (display / inspection).
    Placeholder,
    /// Replace with retrieval calls against values staged under `namespace`.
    Staged(&'a Namespace),
}

/// Rendering context threaded through parts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RenderContext<'a> {
    pub(crate) style: ParamStyle<'a>,
    pub(crate) staging: &'a StagingStore,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn placeholder(staging: &'a StagingStore) -> Self {
        Self {
            style: ParamStyle::Placeholder,
            staging,
        }
    }

    pub(crate) fn staged(staging: &'a StagingStore, namespace: &'a Namespace) -> Self {
        Self {
            style: ParamStyle::Staged(namespace),
            staging,
        }
    }

    /// Reference to parameter `name`.
    pub(crate) fn param(&self, name: &str) -> String {
        match self.style {
            ParamStyle::Placeholder => format!("${name}"),
            ParamStyle::Staged(namespace) => format!(
                "{}.get('{}{}')",
                self.staging.schema(),
                namespace.prefix(),
                name
            ),
        }
    }

    /// Rewrites `$name` references in caller-supplied text.
    pub(crate) fn rewrite(&self, text: &str) -> String {
        match self.style {
            ParamStyle::Placeholder => text.to_owned(),
            ParamStyle::Staged(_) => {
                let mut out = String::with_capacity(text.len());
                let mut last = 0;
                for (start, end) in param_spans(text) {
                    out.push_str(&text[last..start]);
                    out.push_str(&self.param(&text[start + 1..end]));
                    last = end;
                }
                out.push_str(&text[last..]);
                out
            }
        }
    }
}

/// Names referenced as `$name` in `text`, in order of appearance.
pub(crate) fn param_names(text: &str) -> Vec<String> {
    param_spans(text)
        .into_iter()
        .map(|(start, end)| text[start + 1..end].to_owned())
        .collect()
}

/// Byte spans of `$name` tokens, skipping quoted strings and identifiers.
fn param_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'$' => {
                let start = i;
                let mut end = i + 1;
                if end < bytes.len() && (bytes[end].is_ascii_alphabetic() || bytes[end] == b'_') {
                    while end < bytes.len()
                        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                    {
                        end += 1;
                    }
                    spans.push((start, end));
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    spans
}

/// Wraps Cypher text in the `ag_catalog.cypher` call AGE expects.
pub(crate) fn wrap_sql(graph: &str, cypher: &str, columns: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|c| format!("{c} ag_catalog.agtype"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT * FROM ag_catalog.cypher('{graph}', $$ {cypher} $$) AS ({columns})")
}
