use crate::error::{ExtractionError, Result};
use crate::schema::{parse_tree_nodes, FieldRecord, ParentRef, SchemaTreeNode, MAX_DEPTH};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// How a `ParentRef::ByIndex` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRule {
    /// The index addresses any position of the complete field list.
    #[default]
    FullSequence,
    /// The index must address a field placed before the referencing one.
    InsertedPrefix,
}

/// What to do with a parent reference that cannot be resolved.
///
/// Self references and cycles are errors in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Strict,
    /// Treat the field as top-level and log a warning.
    Lenient,
}

fn field_label(position: usize, field: &FieldRecord) -> String {
    format!("fields[{}] ('{}')", position, field.name)
}

/// Parent/child topology of a flat field list with every reference resolved
/// to a position in that list.
#[derive(Debug)]
pub struct FieldHierarchy<'a> {
    fields: &'a [FieldRecord],
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl<'a> FieldHierarchy<'a> {
    pub fn resolve(fields: &'a [FieldRecord], rule: IndexRule, mode: ResolveMode) -> Result<Self> {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (pos, field) in fields.iter().enumerate() {
            by_name.entry(field.name.as_str()).or_default().push(pos);
        }

        let mut parents = Vec::with_capacity(fields.len());
        for (pos, field) in fields.iter().enumerate() {
            let resolved = match resolve_one(fields, &by_name, pos, rule) {
                Ok(parent) => parent,
                Err(ResolveFailure::Fatal(err)) => return Err(err),
                Err(ResolveFailure::Unresolved(details)) => match mode {
                    ResolveMode::Strict => {
                        return Err(ExtractionError::validation(field_label(pos, field), details))
                    }
                    ResolveMode::Lenient => {
                        warn!(
                            "Treating {} as top-level: {}",
                            field_label(pos, field),
                            details
                        );
                        None
                    }
                },
            };
            parents.push(resolved);
        }

        detect_cycles(fields, &parents)?;
        check_depth(fields, &parents)?;

        let mut children = vec![Vec::new(); fields.len()];
        let mut roots = Vec::new();
        for (pos, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(pos),
                None => roots.push(pos),
            }
        }

        Ok(Self {
            fields,
            parents,
            children,
            roots,
        })
    }

    pub fn fields(&self) -> &'a [FieldRecord] {
        self.fields
    }

    /// `None` when `position` is outside the field list.
    pub fn field(&self, position: usize) -> Option<&'a FieldRecord> {
        self.fields.get(position)
    }

    pub(crate) fn record(&self, position: usize) -> &'a FieldRecord {
        &self.fields[position]
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Empty for leaves and for positions outside the field list.
    pub fn children_of(&self, position: usize) -> &[usize] {
        self.children.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_of(&self, position: usize) -> Option<usize> {
        self.parents.get(position).copied().flatten()
    }

    pub fn depth_of(&self, position: usize) -> usize {
        let mut depth = 0;
        let mut current = position;
        while let Some(parent) = self.parent_of(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// True when `ancestor` lies on the parent chain of `position`.
    pub fn is_descendant(&self, position: usize, ancestor: usize) -> bool {
        let mut current = self.parent_of(position);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent_of(parent);
        }
        false
    }

    /// `position` followed by all of its descendants.
    pub fn subtree(&self, position: usize) -> Vec<usize> {
        if position >= self.fields.len() {
            return Vec::new();
        }
        let mut out = vec![position];
        let mut cursor = 0;
        while cursor < out.len() {
            let next = out[cursor];
            out.extend_from_slice(&self.children[next]);
            cursor += 1;
        }
        out
    }

    pub fn build_nodes(&self) -> Vec<SchemaTreeNode> {
        self.roots.iter().map(|&root| self.build_node(root)).collect()
    }

    fn build_node(&self, position: usize) -> SchemaTreeNode {
        let field = self.record(position);
        SchemaTreeNode {
            name: field.name.clone(),
            description: field.description.clone(),
            field_type: field.field_type,
            required: field.required,
            children: self.children[position]
                .iter()
                .map(|&child| self.build_node(child))
                .collect(),
        }
    }
}

enum ResolveFailure {
    Fatal(ExtractionError),
    Unresolved(String),
}

fn resolve_one(
    fields: &[FieldRecord],
    by_name: &HashMap<&str, Vec<usize>>,
    pos: usize,
    rule: IndexRule,
) -> std::result::Result<Option<usize>, ResolveFailure> {
    let field = &fields[pos];
    let self_reference = || {
        ResolveFailure::Fatal(ExtractionError::validation(
            field_label(pos, field),
            "field lists itself as its own parent",
        ))
    };

    let target = match &field.parent_ref {
        ParentRef::None => return Ok(None),
        ParentRef::ByIndex(index) => {
            let index = *index;
            if index == pos {
                return Err(self_reference());
            }
            if index >= fields.len() {
                return Err(ResolveFailure::Unresolved(format!(
                    "parent index {} is out of range for {} fields",
                    index,
                    fields.len()
                )));
            }
            if rule == IndexRule::InsertedPrefix && index > pos {
                return Err(ResolveFailure::Unresolved(format!(
                    "parent index {} refers to a field placed after position {}",
                    index, pos
                )));
            }
            index
        }
        ParentRef::ByName(name) => match by_name.get(name.as_str()).map(Vec::as_slice) {
            None | Some([]) => {
                return Err(ResolveFailure::Unresolved(format!(
                    "parent field '{}' not found",
                    name
                )))
            }
            Some([single]) if *single == pos => return Err(self_reference()),
            Some([single]) => *single,
            Some(many) => {
                return Err(ResolveFailure::Unresolved(format!(
                    "parent name '{}' is ambiguous, {} fields share it",
                    name,
                    many.len()
                )))
            }
        },
    };

    let parent = &fields[target];
    if !parent.field_type.is_object() {
        return Err(ResolveFailure::Unresolved(format!(
            "parent field '{}' must be an object type, found {}",
            parent.name, parent.field_type
        )));
    }

    Ok(Some(target))
}

fn detect_cycles(fields: &[FieldRecord], parents: &[Option<usize>]) -> Result<()> {
    // 0 = unvisited, 1 = on the current walk, 2 = known to reach a root
    let mut state = vec![0u8; parents.len()];

    for start in 0..parents.len() {
        if state[start] != 0 {
            continue;
        }

        let mut walk = Vec::new();
        let mut current = Some(start);
        while let Some(pos) = current {
            match state[pos] {
                2 => break,
                1 => {
                    return Err(ExtractionError::validation(
                        field_label(pos, &fields[pos]),
                        "parent references form a cycle",
                    ))
                }
                _ => {
                    state[pos] = 1;
                    walk.push(pos);
                    current = parents[pos];
                }
            }
        }

        for pos in walk {
            state[pos] = 2;
        }
    }

    Ok(())
}

/// Rejects fields nested deeper than `MAX_DEPTH`. Depths are memoized so
/// long chains are walked once.
fn check_depth(fields: &[FieldRecord], parents: &[Option<usize>]) -> Result<()> {
    let mut depths: Vec<Option<usize>> = vec![None; parents.len()];

    for start in 0..parents.len() {
        let mut walk = Vec::new();
        let mut base = 0;
        let mut current = Some(start);
        while let Some(pos) = current {
            if let Some(depth) = depths[pos] {
                base = depth + 1;
                break;
            }
            walk.push(pos);
            current = parents[pos];
        }

        for (offset, &pos) in walk.iter().rev().enumerate() {
            let depth = base + offset;
            if depth > MAX_DEPTH {
                return Err(ExtractionError::validation(
                    field_label(pos, &fields[pos]),
                    format!("field is nested {} levels deep, the limit is {}", depth, MAX_DEPTH),
                ));
            }
            depths[pos] = Some(depth);
        }
    }

    Ok(())
}

fn check_names(fields: &[FieldRecord], require_unique: bool) -> Result<()> {
    let mut seen = HashSet::new();
    for (pos, field) in fields.iter().enumerate() {
        if field.name.trim().is_empty() {
            return Err(ExtractionError::validation(
                format!("fields[{}]", pos),
                "field name must not be empty",
            ));
        }
        if require_unique && !seen.insert(field.name.as_str()) {
            return Err(ExtractionError::validation(
                field_label(pos, field),
                "field names must be unique within a schema",
            ));
        }
    }
    Ok(())
}

/// Converts a flat field list into top-level tree nodes carrying their
/// descendants as children.
pub fn to_tree(fields: &[FieldRecord], rule: IndexRule) -> Result<Vec<SchemaTreeNode>> {
    check_names(fields, false)?;
    let hierarchy = FieldHierarchy::resolve(fields, rule, ResolveMode::Strict)?;
    let nodes = hierarchy.build_nodes();
    debug!(
        "Converted {} flat fields into {} top-level nodes",
        fields.len(),
        nodes.len()
    );
    Ok(nodes)
}

/// Converts tree nodes back into a flat field list. Top-level nodes come
/// first in input order, followed by descendants in depth-first order; every
/// child references its parent by name.
pub fn from_tree(nodes: &[SchemaTreeNode]) -> Result<Vec<FieldRecord>> {
    let mut fields = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        check_node(node, &format!("nodes[{}]", i))?;
        fields.push(FieldRecord {
            name: node.name.clone(),
            description: node.description.clone(),
            field_type: node.field_type,
            required: node.required,
            parent_ref: ParentRef::None,
        });
    }

    for (i, node) in nodes.iter().enumerate() {
        flatten_children(node, &format!("nodes[{}]", i), 1, &mut fields)?;
    }

    debug!(
        "Flattened {} top-level nodes into {} fields",
        nodes.len(),
        fields.len()
    );
    Ok(fields)
}

/// Parses raw nested JSON and flattens it in one step.
pub fn from_tree_value(value: &Value) -> Result<Vec<FieldRecord>> {
    let nodes = parse_tree_nodes(value)?;
    from_tree(&nodes)
}

fn check_node(node: &SchemaTreeNode, path: &str) -> Result<()> {
    if node.name.trim().is_empty() {
        return Err(ExtractionError::validation(path, "node name must not be empty"));
    }
    if !node.children.is_empty() && !node.field_type.is_object() {
        return Err(ExtractionError::validation(
            format!("{} ('{}')", path, node.name),
            format!(
                "only object nodes may have children, found {} with {} children",
                node.field_type,
                node.children.len()
            ),
        ));
    }
    Ok(())
}

fn flatten_children(
    parent: &SchemaTreeNode,
    path: &str,
    depth: usize,
    out: &mut Vec<FieldRecord>,
) -> Result<()> {
    for (i, child) in parent.children.iter().enumerate() {
        let child_path = format!("{}.children[{}]", path, i);
        if depth > MAX_DEPTH {
            return Err(ExtractionError::validation(
                format!("{} ('{}')", child_path, child.name),
                format!("node is nested {} levels deep, the limit is {}", depth, MAX_DEPTH),
            ));
        }
        check_node(child, &child_path)?;
        out.push(FieldRecord {
            name: child.name.clone(),
            description: child.description.clone(),
            field_type: child.field_type,
            required: child.required,
            parent_ref: ParentRef::ByName(parent.name.clone()),
        });
        flatten_children(child, &child_path, depth + 1, out)?;
    }
    Ok(())
}

/// Save-time validation: non-empty unique names and strictly resolvable,
/// acyclic parent references.
pub fn validate_schema(fields: &[FieldRecord], rule: IndexRule) -> Result<()> {
    check_names(fields, true)?;
    FieldHierarchy::resolve(fields, rule, ResolveMode::Strict)?;
    Ok(())
}

/// Rewrites every parent reference as `ByName`, keeping field order.
pub fn to_named_refs(fields: &[FieldRecord], rule: IndexRule) -> Result<Vec<FieldRecord>> {
    check_names(fields, true)?;
    let hierarchy = FieldHierarchy::resolve(fields, rule, ResolveMode::Strict)?;
    Ok(fields
        .iter()
        .enumerate()
        .map(|(pos, field)| FieldRecord {
            parent_ref: match hierarchy.parent_of(pos) {
                Some(parent) => ParentRef::ByName(fields[parent].name.clone()),
                None => ParentRef::None,
            },
            ..field.clone()
        })
        .collect())
}

/// Rewrites every parent reference as a `ByIndex` position in the full
/// sequence, keeping field order.
pub fn to_indexed_refs(fields: &[FieldRecord], rule: IndexRule) -> Result<Vec<FieldRecord>> {
    let hierarchy = FieldHierarchy::resolve(fields, rule, ResolveMode::Strict)?;
    Ok(fields
        .iter()
        .enumerate()
        .map(|(pos, field)| FieldRecord {
            parent_ref: match hierarchy.parent_of(pos) {
                Some(parent) => ParentRef::ByIndex(parent),
                None => ParentRef::None,
            },
            ..field.clone()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn invoice_fields() -> Vec<FieldRecord> {
        vec![
            FieldRecord::new("Invoice", FieldType::Object),
            FieldRecord::new("Number", FieldType::String).child_of("Invoice"),
        ]
    }

    #[test]
    fn test_end_to_end_scenario() {
        let tree = to_tree(&invoice_fields(), IndexRule::FullSequence).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "Invoice");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].name, "Number");
        assert_eq!(tree[0].children[0].field_type, FieldType::String);

        let flat = from_tree(&tree).unwrap();
        assert_eq!(flat, invoice_fields());
    }

    #[test]
    fn test_index_reference_canonicalized_to_name() {
        let fields = vec![
            FieldRecord::new("vendor", FieldType::Object),
            FieldRecord::new("vendor_name", FieldType::String).child_of_index(0),
        ];
        let flat = from_tree(&to_tree(&fields, IndexRule::FullSequence).unwrap()).unwrap();
        assert_eq!(flat[1].parent_ref, ParentRef::ByName("vendor".to_string()));
    }

    #[test]
    fn test_grandchildren_nest_to_arbitrary_depth() {
        let fields = vec![
            FieldRecord::new("level0", FieldType::Object),
            FieldRecord::new("level1", FieldType::Object).child_of("level0"),
            FieldRecord::new("level2", FieldType::Object).child_of("level1"),
            FieldRecord::new("leaf", FieldType::Date).child_of("level2"),
        ];
        let tree = to_tree(&fields, IndexRule::FullSequence).unwrap();
        let leaf = &tree[0].children[0].children[0].children[0];
        assert_eq!(leaf.name, "leaf");
        assert_eq!(leaf.field_type, FieldType::Date);
    }

    #[test]
    fn test_index_past_end_fails() {
        let fields = vec![
            FieldRecord::new("box", FieldType::Object),
            FieldRecord::new("item", FieldType::String).child_of_index(5),
        ];
        let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("fields[1]"));
    }

    #[test]
    fn test_self_parent_fails_without_recursion() {
        let by_index = vec![FieldRecord::new("loop", FieldType::Object).child_of_index(0)];
        let by_name = vec![FieldRecord::new("loop", FieldType::Object).child_of("loop")];

        for fields in [by_index, by_name] {
            let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
            assert!(err.to_string().contains("its own parent"));
        }
    }

    #[test]
    fn test_two_field_cycle_fails() {
        let fields = vec![
            FieldRecord::new("a", FieldType::Object).child_of("b"),
            FieldRecord::new("b", FieldType::Object).child_of("a"),
        ];
        let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let lenient = FieldHierarchy::resolve(&fields, IndexRule::FullSequence, ResolveMode::Lenient);
        assert!(lenient.is_err());
    }

    #[test]
    fn test_non_object_parent_fails() {
        let fields = vec![
            FieldRecord::new("title", FieldType::String),
            FieldRecord::new("sub", FieldType::String).child_of("title"),
        ];
        let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn test_missing_named_parent_fails() {
        let fields = vec![FieldRecord::new("orphan", FieldType::String).child_of("ghost")];
        let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
        assert!(err.to_string().contains("'ghost' not found"));
    }

    #[test]
    fn test_index_rules_differ_on_forward_references() {
        let fields = vec![
            FieldRecord::new("street", FieldType::String).child_of_index(1),
            FieldRecord::new("address", FieldType::Object),
        ];

        let tree = to_tree(&fields, IndexRule::FullSequence).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "address");
        assert_eq!(tree[0].children[0].name, "street");

        let err = to_tree(&fields, IndexRule::InsertedPrefix).unwrap_err();
        assert!(err.to_string().contains("placed after"));
    }

    #[test]
    fn test_ambiguous_parent_name_fails() {
        let fields = vec![
            FieldRecord::new("address", FieldType::Object),
            FieldRecord::new("address", FieldType::Object),
            FieldRecord::new("city", FieldType::String).child_of("address"),
        ];
        let err = to_tree(&fields, IndexRule::FullSequence).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_lenient_mode_promotes_unresolved_to_root() {
        let fields = vec![
            FieldRecord::new("a", FieldType::String),
            FieldRecord::new("b", FieldType::String).child_of_index(9),
        ];
        let hierarchy =
            FieldHierarchy::resolve(&fields, IndexRule::FullSequence, ResolveMode::Lenient).unwrap();
        assert_eq!(hierarchy.roots(), &[0, 1]);
        assert_eq!(hierarchy.depth_of(1), 0);
    }

    #[test]
    fn test_from_tree_orders_descendants_depth_first() {
        let nodes = vec![
            SchemaTreeNode::new("A", FieldType::Object).with_children(vec![
                SchemaTreeNode::new("A1", FieldType::Object)
                    .with_children(vec![SchemaTreeNode::new("A1x", FieldType::String)]),
                SchemaTreeNode::new("A2", FieldType::String),
            ]),
            SchemaTreeNode::new("B", FieldType::Number),
        ];
        let flat = from_tree(&nodes).unwrap();
        let names: Vec<&str> = flat.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A1", "A1x", "A2"]);
        assert_eq!(flat[3].parent_ref, ParentRef::ByName("A1".to_string()));
    }

    #[test]
    fn test_from_tree_rejects_children_under_scalar() {
        let nodes = vec![SchemaTreeNode::new("total", FieldType::Number)
            .with_children(vec![SchemaTreeNode::new("x", FieldType::String)])];
        let err = from_tree(&nodes).unwrap_err();
        assert!(err.to_string().contains("only object nodes"));
    }

    #[test]
    fn test_from_tree_value_missing_type_aborts() {
        let raw = json!([
            {"name": "Invoice", "type": "object", "children": [{"name": "Number"}]},
            {"name": "Total", "type": "number"}
        ]);
        let err = from_tree_value(&raw).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Number"));
    }

    #[test]
    fn test_validate_schema_requires_unique_names() {
        let fields = vec![
            FieldRecord::new("total", FieldType::Number),
            FieldRecord::new("total", FieldType::Number),
        ];
        assert!(to_tree(&fields, IndexRule::FullSequence).is_ok());
        assert!(validate_schema(&fields, IndexRule::FullSequence).is_err());
    }

    #[test]
    fn test_reference_canonicalization_keeps_order() {
        let fields = vec![
            FieldRecord::new("customer", FieldType::Object),
            FieldRecord::new("address", FieldType::Object).child_of("customer"),
            FieldRecord::new("city", FieldType::String).child_of_index(1),
        ];

        let indexed = to_indexed_refs(&fields, IndexRule::FullSequence).unwrap();
        assert_eq!(indexed[1].parent_ref, ParentRef::ByIndex(0));
        assert_eq!(indexed[2].parent_ref, ParentRef::ByIndex(1));

        let named = to_named_refs(&indexed, IndexRule::InsertedPrefix).unwrap();
        assert_eq!(named[2].parent_ref, ParentRef::ByName("address".to_string()));
        assert_eq!(named[0].parent_ref, ParentRef::None);
    }

    #[test]
    fn test_subtree_and_descendants() {
        let fields = vec![
            FieldRecord::new("a", FieldType::Object),
            FieldRecord::new("b", FieldType::Object).child_of("a"),
            FieldRecord::new("c", FieldType::String).child_of("b"),
            FieldRecord::new("d", FieldType::String),
        ];
        let h = FieldHierarchy::resolve(&fields, IndexRule::FullSequence, ResolveMode::Strict).unwrap();
        assert_eq!(h.subtree(0), vec![0, 1, 2]);
        assert!(h.is_descendant(2, 0));
        assert!(!h.is_descendant(3, 0));
        assert_eq!(h.depth_of(2), 2);
    }

    #[test]
    fn test_out_of_range_positions_do_not_panic() {
        let fields = invoice_fields();
        let h = FieldHierarchy::resolve(&fields, IndexRule::FullSequence, ResolveMode::Strict)
            .unwrap();
        assert_eq!(h.field(1).map(|f| f.name.as_str()), Some("Number"));
        assert!(h.field(7).is_none());
        assert!(h.children_of(7).is_empty());
        assert_eq!(h.parent_of(7), None);
        assert_eq!(h.depth_of(7), 0);
        assert!(!h.is_descendant(7, 0));
        assert!(h.subtree(7).is_empty());
    }

    fn chain(levels: usize) -> Vec<FieldRecord> {
        (0..levels)
            .map(|i| {
                let field = FieldRecord::new(format!("f{}", i), FieldType::Object);
                if i == 0 {
                    field
                } else {
                    field.child_of_index(i - 1)
                }
            })
            .collect()
    }

    #[test]
    fn test_depth_limit_is_validation_error() {
        let deepest_allowed = chain(MAX_DEPTH + 1);
        validate_schema(&deepest_allowed, IndexRule::FullSequence).unwrap();
        let tree = to_tree(&deepest_allowed, IndexRule::FullSequence).unwrap();
        assert_eq!(from_tree(&tree).unwrap().len(), MAX_DEPTH + 1);

        let too_deep = chain(MAX_DEPTH + 2);
        let err = validate_schema(&too_deep, IndexRule::FullSequence).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains(&format!("f{}", MAX_DEPTH + 1)));
        assert!(to_tree(&too_deep, IndexRule::FullSequence).unwrap_err().is_validation());
        assert!(crate::render::render_outline(&too_deep, IndexRule::FullSequence)
            .unwrap_err()
            .is_validation());

        // thousands of levels fail fast instead of exhausting the stack
        let err = validate_schema(&chain(5000), IndexRule::InsertedPrefix).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_from_tree_rejects_overly_deep_nodes() {
        let mut node = SchemaTreeNode::new(format!("n{}", MAX_DEPTH + 1), FieldType::String);
        for i in (0..=MAX_DEPTH).rev() {
            node = SchemaTreeNode::new(format!("n{}", i), FieldType::Object).with_children(vec![node]);
        }
        let err = from_tree(&[node.clone()]).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains(&format!("n{}", MAX_DEPTH + 1)));

        let shallower = node.children.remove(0);
        assert_eq!(from_tree(&[shallower]).unwrap().len(), MAX_DEPTH + 1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(to_tree(&[], IndexRule::FullSequence).unwrap().is_empty());
        assert!(from_tree(&[]).unwrap().is_empty());
    }
}
