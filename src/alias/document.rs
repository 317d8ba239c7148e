//! Parsing of the alias tree document.
//!
//! ```yaml
//! tenantAliasTree:
//!   MAIN:
//!     - key: SUBMAIN
//!       children:
//!         - key: LIFETENANT
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{AliasError, TenantAliasTree};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AliasDocument {
    #[serde(default)]
    tenant_alias_tree: BTreeMap<String, Vec<AliasNode>>,
}

#[derive(Debug, Deserialize)]
struct AliasNode {
    key: String,
    #[serde(default)]
    children: Vec<AliasNode>,
}

/// Build a tree from the alias document. Blank content yields an empty tree.
pub fn parse_alias_tree(content: &str) -> Result<TenantAliasTree, AliasError> {
    if content.trim().is_empty() {
        return Ok(TenantAliasTree::new());
    }
    let document: AliasDocument =
        serde_yaml::from_str(content).map_err(|e| AliasError::Malformed(e.to_string()))?;

    let mut tree = TenantAliasTree::new();
    let mut seen = BTreeSet::new();
    for (root, children) in &document.tenant_alias_tree {
        if !seen.insert(root.clone()) {
            return Err(duplicate(root));
        }
        tree.insert_root(root);
        for child in children {
            attach(&mut tree, &mut seen, root, child)?;
        }
    }
    Ok(tree)
}

fn attach(
    tree: &mut TenantAliasTree,
    seen: &mut BTreeSet<String>,
    parent: &str,
    node: &AliasNode,
) -> Result<(), AliasError> {
    if tree.would_cycle(parent, &node.key) {
        return Err(AliasError::WrongAliasConfiguration(format!(
            "tenant {} is listed beneath its own descendant {parent}",
            node.key
        )));
    }
    if !seen.insert(node.key.clone()) {
        return Err(duplicate(&node.key));
    }
    tree.link(parent, &node.key)?;
    for child in &node.children {
        attach(tree, seen, &node.key, child)?;
    }
    Ok(())
}

fn duplicate(key: &str) -> AliasError {
    AliasError::WrongAliasConfiguration(format!("tenant {key} is listed more than once"))
}
