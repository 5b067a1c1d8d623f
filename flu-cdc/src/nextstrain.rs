use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Number of clades and locations kept in a summary.
pub const TOP_N: usize = 10;

/// A Nextstrain auspice dataset. Only the tree is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextstrainData {
    pub tree: NextstrainNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// A node of the phylogenetic tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextstrainNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_attrs: Option<NodeAttrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NextstrainNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clade: Option<AttrValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<AttrValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<AttrValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrValue {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl AttrValue {
    fn text(&self) -> Option<&str> {
        self.value.as_str().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextstrainSummary {
    pub clades: Vec<NamedCount>,
    pub locations: Vec<NamedCount>,
    pub timeline: Vec<DateCount>,
    pub last_updated: DateTime<Utc>,
}

/// Counts in first-seen order.
#[derive(Default)]
struct Tally {
    counts: Vec<NamedCount>,
    index: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, name: &str) {
        match self.index.get(name) {
            Some(&i) => self.counts[i].count += 1,
            None => {
                self.index.insert(name.to_string(), self.counts.len());
                self.counts.push(NamedCount {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Highest counts first; equal counts keep first-seen order.
    fn top(mut self, n: usize) -> Vec<NamedCount> {
        self.counts.sort_by(|a, b| b.count.cmp(&a.count));
        self.counts.truncate(n);
        self.counts
    }
}

/// Count clades, countries and sample dates over every node of `tree`.
pub fn summarize_tree(tree: &NextstrainNode, last_updated: DateTime<Utc>) -> NextstrainSummary {
    let mut clades = Tally::default();
    let mut locations = Tally::default();
    let mut dates: BTreeMap<String, usize> = BTreeMap::new();
    let mut visited = 0usize;

    // pre-order, without recursion
    let mut stack = vec![tree];
    while let Some(node) = stack.pop() {
        visited += 1;
        if let Some(attrs) = &node.node_attrs {
            if let Some(clade) = attrs.clade.as_ref().and_then(AttrValue::text) {
                clades.add(clade);
            }
            if let Some(country) = attrs.country.as_ref().and_then(AttrValue::text) {
                locations.add(country);
            }
            if let Some(date) = attrs.date.as_ref().and_then(AttrValue::text) {
                let day = date.split('T').next().unwrap_or(date);
                *dates.entry(day.to_string()).or_default() += 1;
            }
        }
        if let Some(children) = &node.children {
            stack.extend(children.iter().rev());
        }
    }
    debug!("Summarized {} tree nodes", visited);

    NextstrainSummary {
        clades: clades.top(TOP_N),
        locations: locations.top(TOP_N),
        timeline: dates
            .into_iter()
            .map(|(date, count)| DateCount { date, count })
            .collect(),
        last_updated,
    }
}

/// Decode a Nextstrain dataset payload.
///
/// Trees can nest far deeper than serde_json's default limit of 128, so the
/// limit is lifted and the stack grows on demand while decoding.
pub fn parse_nextstrain_payload(json: &str) -> anyhow::Result<NextstrainData> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let data = NextstrainData::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TREE: &str = r#"{
        "tree": {
            "node_attrs": {"clade": {"value": "21L"}},
            "children": [
                {
                    "node_attrs": {
                        "clade": {"value": "22B"},
                        "country": {"value": "USA"},
                        "date": {"value": "2022-03-01T00:00:00Z"}
                    }
                },
                {
                    "node_attrs": {"clade": {"value": "21L"}, "country": {"value": "Canada"}},
                    "children": [
                        {"node_attrs": {
                            "clade": {"value": "22B"},
                            "country": {"value": "Canada"},
                            "date": {"value": "2022-01-15"}
                        }},
                        {"node_attrs": {"date": {"value": 2022.12}}},
                        {}
                    ]
                }
            ]
        },
        "meta": {"title": "test"}
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_summarize_tree() {
        let data = parse_nextstrain_payload(TREE).unwrap();
        let summary = summarize_tree(&data.tree, now());

        assert_eq!(
            summary.clades,
            vec![
                NamedCount { name: "21L".into(), count: 2 },
                NamedCount { name: "22B".into(), count: 2 },
            ]
        );
        assert_eq!(summary.locations[0], NamedCount { name: "Canada".into(), count: 2 });
        assert_eq!(summary.locations[1], NamedCount { name: "USA".into(), count: 1 });
        assert_eq!(
            summary.timeline,
            vec![
                DateCount { date: "2022-01-15".into(), count: 1 },
                DateCount { date: "2022-03-01".into(), count: 1 },
            ]
        );
        assert_eq!(summary.last_updated, now());
    }

    #[test]
    fn test_top_n_truncates() {
        let children = (0..15)
            .map(|i| NextstrainNode {
                node_attrs: Some(NodeAttrs {
                    clade: Some(AttrValue { value: serde_json::json!(format!("clade-{i}")) }),
                    ..Default::default()
                }),
                children: None,
            })
            .collect();
        let tree = NextstrainNode { node_attrs: None, children: Some(children) };
        let summary = summarize_tree(&tree, now());
        assert_eq!(summary.clades.len(), TOP_N);
        assert_eq!(summary.clades[0].name, "clade-0");
        assert!(summary.locations.is_empty());
        assert!(summary.timeline.is_empty());
    }

    #[test]
    fn test_deep_tree() {
        let mut tree = NextstrainNode::default();
        for _ in 0..2_000 {
            tree = NextstrainNode {
                node_attrs: Some(NodeAttrs {
                    country: Some(AttrValue { value: serde_json::json!("USA") }),
                    ..Default::default()
                }),
                children: Some(vec![tree]),
            };
        }
        let summary = summarize_tree(&tree, now());
        assert_eq!(summary.locations[0].count, 2_000);
    }

    #[test]
    fn test_parse_deep_payload() {
        let depth = 500;
        let leaf = r#"{"node_attrs": {"clade": {"value": "3C.2a"}}}"#;
        let mut json = String::from(r#"{"tree": "#);
        for _ in 0..depth {
            json.push_str(r#"{"node_attrs": {"country": {"value": "USA"}}, "children": ["#);
        }
        json.push_str(leaf);
        for _ in 0..depth {
            json.push_str("]}");
        }
        json.push('}');

        let data = parse_nextstrain_payload(&json).unwrap();
        let summary = summarize_tree(&data.tree, now());
        assert_eq!(summary.locations[0].count, depth);
        assert_eq!(summary.clades[0].name, "3C.2a");

        assert!(parse_nextstrain_payload(&format!("{} trailing", json)).is_err());
    }
}
