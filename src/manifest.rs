//! Tool manifest assembly - groups extracted descriptors by primary tag.

use serde::Serialize;

use crate::extractor::ExtractedEndpoint;
use crate::types::EndpointDescriptor;

/// All tools sharing one primary tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolGroup {
    pub name: String,
    pub tools: Vec<EndpointDescriptor>,
}

/// Index entry pointing at a [`ToolGroup`] by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub name: String,
}

/// A complete manifest: an index of tag names plus one group per tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// Group names, sorted ascending.
    pub tools: Vec<GroupRef>,
    /// Groups in the order their tag was first seen.
    pub groups: Vec<ToolGroup>,
}

impl Manifest {
    /// Group `entries` by their first tag.
    pub fn from_extracted(
        name: impl Into<String>,
        version: impl Into<String>,
        entries: impl IntoIterator<Item = ExtractedEndpoint>,
    ) -> Self {
        let mut groups: Vec<ToolGroup> = Vec::new();

        for entry in entries {
            let tag = entry.primary_tag().to_string();
            match groups.iter_mut().find(|g| g.name == tag) {
                Some(group) => group.tools.push(entry.descriptor),
                None => groups.push(ToolGroup {
                    name: tag,
                    tools: vec![entry.descriptor],
                }),
            }
        }

        let mut index: Vec<GroupRef> = groups
            .iter()
            .map(|g| GroupRef {
                name: g.name.clone(),
            })
            .collect();
        index.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            name: name.into(),
            version: version.into(),
            tools: index,
            groups,
        }
    }

    /// Look up a group by tag name.
    pub fn group(&self, name: &str) -> Option<&ToolGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Total number of tools across all groups.
    pub fn tool_count(&self) -> usize {
        self.groups.iter().map(|g| g.tools.len()).sum()
    }
}
