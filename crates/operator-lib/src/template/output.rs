//! Splitting of `helm template` output into per-file documents

use std::collections::BTreeMap;

const SOURCE_MARKER: &str = "# Source: ";

/// Split a rendered multi-document stream into documents keyed by the
/// template file that produced them.
///
/// Helm prefixes each document with `# Source: <chart>/templates/<file>`.
/// A template producing several documents yields one entry holding all of
/// them, separated by `---`. Documents without a source marker are dropped.
pub fn split_rendered_output(stream: &str) -> BTreeMap<String, String> {
    let mut documents: BTreeMap<String, String> = BTreeMap::new();
    let mut source: Option<String> = None;
    let mut body = String::new();

    for line in stream.lines() {
        if is_separator(line) {
            flush(&mut documents, source.take(), &mut body);
            continue;
        }
        if let Some(name) = line.strip_prefix(SOURCE_MARKER) {
            if source.is_some() {
                flush(&mut documents, source.take(), &mut body);
            }
            source = Some(name.trim().to_string());
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    flush(&mut documents, source, &mut body);

    documents
}

fn is_separator(line: &str) -> bool {
    let line = line.trim_end();
    line == "---" || line.starts_with("--- ")
}

fn flush(documents: &mut BTreeMap<String, String>, source: Option<String>, body: &mut String) {
    let text = std::mem::take(body);
    let Some(name) = source else {
        if !text.trim().is_empty() {
            let preview: String = text.chars().take(80).collect();
            tracing::debug!(preview = %preview, "Dropping document without source marker");
        }
        return;
    };
    if text.trim().is_empty() {
        return;
    }

    documents
        .entry(name)
        .and_modify(|existing| {
            existing.push_str("---\n");
            existing.push_str(&text);
        })
        .or_insert(text);
}
