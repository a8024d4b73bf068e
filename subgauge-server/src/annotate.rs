//! Synthetic proxy-group injection.
//!
//! The annotator parses a subscription document into a generic YAML
//! tree, inserts up to two selector groups whose names carry the
//! rendered usage and expiry figures, and serializes the tree back
//! through the symbol tokenizer so every emoji in the document survives
//! byte-identical.
//!
//! Emission policy: a group is only emitted when the display feature is
//! enabled and its data is meaningful — the traffic group needs at
//! least one nonzero traffic field, the expiry group needs a nonzero
//! expiry instant. Visible order is always traffic first, then expiry,
//! whether the groups are prepended or appended.

use chrono::{DateTime, Datelike, Local, Timelike};
use serde_yaml::{Mapping, Value};
use subgauge_core::{ByteUnit, UsageDisplay, UsageInfo, format_bytes};

use crate::error::AnnotateError;
use crate::symbols::SymbolMap;

/// Key of the group collection in the document.
const PROXY_GROUPS_KEY: &str = "proxy-groups";

/// Sentinel target for the synthetic selector groups.
const REJECT_TARGET: &str = "REJECT";

/// Annotates `raw` with synthetic usage/expiry groups.
///
/// Returns the re-serialized document. When the display feature is
/// disabled or no group has meaningful data, the original bytes are
/// returned unchanged.
///
/// # Errors
///
/// Returns [`AnnotateError`] when the document cannot be parsed, has no
/// non-empty `proxy-groups` sequence, or fails to serialize. Callers
/// treat this as non-fatal and serve the original bytes.
pub fn annotate(
    raw: &[u8],
    usage: &UsageInfo,
    display: &UsageDisplay,
) -> Result<Vec<u8>, AnnotateError> {
    let groups = build_groups(usage, display);
    if groups.is_empty() {
        return Ok(raw.to_vec());
    }

    let doc: Value = serde_yaml::from_slice(raw).map_err(AnnotateError::Parse)?;

    let mut symbols = SymbolMap::new();
    let mut doc = tokenize_tree(doc, &mut symbols);
    let groups: Vec<Value> = groups
        .into_iter()
        .map(|g| tokenize_tree(g, &mut symbols))
        .collect();

    let list = doc
        .get_mut(PROXY_GROUPS_KEY)
        .and_then(Value::as_sequence_mut)
        .ok_or(AnnotateError::NoProxyGroups)?;
    if list.is_empty() {
        return Err(AnnotateError::NoProxyGroups);
    }

    if display.prepend {
        // sequential front-inserts reverse, keeping traffic ahead of expiry
        for group in groups.into_iter().rev() {
            list.insert(0, group);
        }
    } else {
        list.extend(groups);
    }

    let serialized = serde_yaml::to_string(&doc).map_err(AnnotateError::Serialize)?;
    Ok(symbols.restore(&serialized).into_bytes())
}

/// Builds the synthetic groups to insert, in visible order.
fn build_groups(usage: &UsageInfo, display: &UsageDisplay) -> Vec<Value> {
    if !display.enabled {
        return Vec::new();
    }

    let mut groups = Vec::with_capacity(2);
    if usage.has_traffic() {
        groups.push(selector_group(render_traffic(
            &display.traffic_template,
            usage,
            display.traffic_unit,
        )));
    }
    if usage.has_expiry() {
        if let Some(name) = render_expire(&display.expire_template, usage.expire) {
            groups.push(selector_group(name));
        }
    }
    groups
}

/// A selector group with no member proxies and a single REJECT target.
fn selector_group(name: String) -> Value {
    let mut group = Mapping::new();
    group.insert(Value::from("name"), Value::from(name));
    group.insert(Value::from("type"), Value::from("select"));
    group.insert(
        Value::from("proxies"),
        Value::Sequence(vec![Value::from(REJECT_TARGET)]),
    );
    Value::Mapping(group)
}

fn render_traffic(template: &str, usage: &UsageInfo, unit: ByteUnit) -> String {
    template
        .replace("{{.used}}", &format_bytes(usage.used(), unit))
        .replace("{{.total}}", &format_bytes(usage.total, unit))
}

/// Renders the expiry template from the local-time calendar breakdown
/// of `expire`. Returns `None` for timestamps chrono cannot represent.
fn render_expire(template: &str, expire: i64) -> Option<String> {
    let t = DateTime::from_timestamp(expire, 0)?.with_timezone(&Local);

    Some(
        template
            .replace("{{.year}}", &format!("{:04}", t.year()))
            .replace("{{.month}}", &format!("{:02}", t.month()))
            .replace("{{.day}}", &format!("{:02}", t.day()))
            .replace("{{.hour}}", &format!("{:02}", t.hour()))
            .replace("{{.minute}}", &format!("{:02}", t.minute()))
            .replace("{{.second}}", &format!("{:02}", t.second())),
    )
}

/// Rewrites every string scalar (keys included) through the tokenizer,
/// leaving the tree shape and all other scalars untouched.
fn tokenize_tree(value: Value, symbols: &mut SymbolMap) -> Value {
    match value {
        Value::String(s) => Value::String(symbols.tokenize(&s)),
        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter()
                .map(|v| tokenize_tree(v, symbols))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (tokenize_tree(k, symbols), tokenize_tree(v, symbols)))
                .collect(),
        ),
        Value::Tagged(mut tagged) => {
            tagged.value = tokenize_tree(tagged.value, symbols);
            Value::Tagged(tagged)
        }
        other => other,
    }
}
