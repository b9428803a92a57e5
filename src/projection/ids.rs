//! Document identity and routing helpers

use std::fmt::Display;

/// Composite id of a document keyed by two parts, e.g. `"{scopeKey}_{name}"`
pub fn composite_id(first: impl Display, second: impl Display) -> String {
    format!("{}_{}", first, second)
}

/// Ids of the `count` rows a single record fans out to: `"{key}_1"` ..= `"{key}_{count}"`
pub fn fan_out_ids(key: i64, count: usize) -> Vec<String> {
    (1..=count).map(|index| composite_id(key, index)).collect()
}

/// 1-based fan-out index encoded in a fan-out id
pub fn fan_out_index(id: &str) -> Option<usize> {
    let (_, index) = id.rsplit_once('_')?;
    index.parse().ok().filter(|i| *i > 0)
}

/// Routing key placing a child document next to its owning parent
pub fn routing_key(parent_key: i64) -> String {
    parent_key.to_string()
}

/// Advance a kind-owned position slot
///
/// Returns `false`, leaving the slot untouched, when `position` is older than
/// the stored one. Equal positions are accepted so that redelivery of the
/// same record re-applies identically.
pub fn advance_position(slot: &mut Option<i64>, position: i64) -> bool {
    match slot {
        Some(current) if *current > position => false,
        _ => {
            *slot = Some(position);
            true
        }
    }
}

/// Tree path used when no hierarchy information is available
pub fn default_tree_path(process_instance_key: i64, flow_node_id: &str, flow_node_instance_key: i64) -> String {
    format!(
        "PI_{}/FN_{}/FNI_{}",
        process_instance_key, flow_node_id, flow_node_instance_key
    )
}

/// Nesting level of a flow node given its tree path
pub fn tree_level(tree_path: &str) -> i32 {
    tree_path.matches("/FNI_").count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_id() {
        assert_eq!(composite_id(123, "orderTotal"), "123_orderTotal");
    }

    #[test]
    fn test_fan_out_ids_are_one_based() {
        assert_eq!(fan_out_ids(5, 3), vec!["5_1", "5_2", "5_3"]);
        assert!(fan_out_ids(5, 0).is_empty());
    }

    #[test]
    fn test_fan_out_index() {
        assert_eq!(fan_out_index("5_2"), Some(2));
        assert_eq!(fan_out_index("5_0"), None);
        assert_eq!(fan_out_index("5"), None);
        assert_eq!(fan_out_index("5_x"), None);
    }

    #[test]
    fn test_advance_position() {
        let mut slot = None;
        assert!(advance_position(&mut slot, 10));
        assert!(advance_position(&mut slot, 10));
        assert!(!advance_position(&mut slot, 9));
        assert_eq!(slot, Some(10));
        assert!(advance_position(&mut slot, 11));
        assert_eq!(slot, Some(11));
    }

    #[test]
    fn test_tree_path_and_level() {
        let path = default_tree_path(1, "task", 2);
        assert_eq!(path, "PI_1/FN_task/FNI_2");
        assert_eq!(tree_level(&path), 1);
        assert_eq!(tree_level("PI_1/FN_sub/FNI_2/FN_task/FNI_3"), 2);
    }
}
