use std::collections::HashMap;

use tracing::warn;

use crate::domain::task::{Task, TaskId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubtaskTree {
    pub nodes: Vec<SubtaskNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtaskNode {
    pub task_id: TaskId,
    pub children: SubtaskTree,
}

impl SubtaskTree {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nesting depth; a tree of direct children only has depth 1.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|node| 1 + node.children.depth()).max().unwrap_or(0)
    }

    /// Depth-first walk yielding each node with its zero-based depth.
    pub fn walk(&self) -> Vec<(usize, &TaskId)> {
        let mut visited = Vec::new();
        self.walk_into(0, &mut visited);
        visited
    }

    fn walk_into<'a>(&'a self, depth: usize, visited: &mut Vec<(usize, &'a TaskId)>) {
        for node in &self.nodes {
            visited.push((depth, &node.task_id));
            node.children.walk_into(depth + 1, visited);
        }
    }
}

/// Descendants of one task: the nested ownership tree and a flat lookup
/// covering every node in it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubtaskIndex {
    pub tree: SubtaskTree,
    pub lookup: HashMap<TaskId, Task>,
}

impl SubtaskIndex {
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Collects every descendant of `root` found in `all_tasks` by following
/// `parent_id` links. Children keep the order they have in `all_tasks`.
///
/// A parent cycle in `all_tasks` is cut where a task would become its own
/// ancestor.
pub fn build_subtask_tree(root: &Task, all_tasks: &[Task]) -> SubtaskIndex {
    let mut ancestors = vec![root.id.clone()];
    build_level(&root.id, all_tasks, &mut ancestors)
}

fn build_level(parent_id: &TaskId, all_tasks: &[Task], ancestors: &mut Vec<TaskId>) -> SubtaskIndex {
    let mut index = SubtaskIndex::default();

    for child in all_tasks.iter().filter(|task| task.parent_id.as_ref() == Some(parent_id)) {
        if ancestors.contains(&child.id) {
            warn!(
                event_name = "subtasks.cycle_detected",
                task_id = %child.id,
                parent_id = %parent_id,
                "parent cycle in task list; skipping repeated ancestor"
            );
            continue;
        }

        ancestors.push(child.id.clone());
        let nested = build_level(&child.id, all_tasks, ancestors);
        ancestors.pop();

        index.lookup.extend(nested.lookup);
        index.lookup.insert(child.id.clone(), child.clone());
        index.tree.nodes.push(SubtaskNode { task_id: child.id.clone(), children: nested.tree });
    }

    index
}

/// A task this many parents deep may not receive further sub-tasks.
pub const MAX_SUBTASK_DEPTH: usize = 4;

/// Number of parent links above `task` that resolve within `all_tasks`.
/// Stops at a missing parent or a repeated ancestor.
pub fn ancestor_depth(task: &Task, all_tasks: &[Task]) -> usize {
    let mut seen = vec![&task.id];
    let mut current = task.parent_id.as_ref();

    while let Some(parent_id) = current {
        if seen.contains(&parent_id) {
            break;
        }
        let Some(parent) = all_tasks.iter().find(|candidate| &candidate.id == parent_id) else {
            break;
        };
        seen.push(&parent.id);
        current = parent.parent_id.as_ref();
    }

    seen.len() - 1
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ancestor_depth, build_subtask_tree};
    use crate::domain::task::{Task, TaskId};

    fn task(id: &str, parent: Option<&str>) -> Task {
        Task {
            id: TaskId::from(id),
            content: format!("task {id}"),
            description: String::new(),
            due: None,
            priority: Default::default(),
            parent_id: parent.map(TaskId::from),
            project_id: None,
            section_id: None,
            labels: Vec::new(),
            is_completed: false,
            created_at: Utc::now(),
            url: String::new(),
        }
    }

    #[test]
    fn leaf_task_yields_empty_tree_and_lookup() {
        let tasks = vec![task("1", None), task("2", None)];
        let index = build_subtask_tree(&tasks[0], &tasks);

        assert!(index.is_empty());
        assert!(index.lookup.is_empty());
        assert_eq!(index.tree.depth(), 0);
    }

    #[test]
    fn chain_of_depth_d_yields_d_lookups_and_depth_d() {
        let depth = 6;
        let mut tasks = vec![task("0", None)];
        for level in 1..=depth {
            let parent = (level - 1).to_string();
            tasks.push(task(&level.to_string(), Some(parent.as_str())));
        }
        tasks.push(task("unrelated", None));

        let index = build_subtask_tree(&tasks[0], &tasks);

        assert_eq!(index.lookup.len(), depth);
        assert_eq!(index.tree.depth(), depth);
        assert!(!index.lookup.contains_key(&TaskId::from("0")));
    }

    #[test]
    fn children_keep_list_order_and_grandchildren_nest() {
        let tasks = vec![
            task("root", None),
            task("b", Some("root")),
            task("b1", Some("b")),
            task("a", Some("root")),
            task("other", Some("elsewhere")),
        ];

        let index = build_subtask_tree(&tasks[0], &tasks);
        let walked: Vec<(usize, &str)> =
            index.tree.walk().into_iter().map(|(depth, id)| (depth, id.as_str())).collect();

        assert_eq!(walked, vec![(0, "b"), (1, "b1"), (0, "a")]);
        assert_eq!(index.lookup.len(), 3);
        assert!(!index.lookup.contains_key(&TaskId::from("other")));
    }

    #[test]
    fn every_lookup_entry_appears_exactly_once_in_tree() {
        let tasks = vec![
            task("root", None),
            task("a", Some("root")),
            task("a1", Some("a")),
            task("a2", Some("a")),
            task("b", Some("root")),
            task("b1", Some("b")),
            task("b1x", Some("b1")),
        ];

        let index = build_subtask_tree(&tasks[0], &tasks);
        let walked = index.tree.walk();

        assert_eq!(walked.len(), index.lookup.len());
        for key in index.lookup.keys() {
            assert_eq!(walked.iter().filter(|(_, id)| *id == key).count(), 1, "{key}");
        }
    }

    #[test]
    fn parent_cycle_terminates() {
        let tasks = vec![task("a", Some("b")), task("b", Some("a"))];

        let index = build_subtask_tree(&tasks[0], &tasks);

        assert_eq!(index.lookup.len(), 1);
        assert_eq!(index.tree.depth(), 1);
    }

    #[test]
    fn ancestor_depth_counts_resolvable_parents() {
        let tasks = vec![
            task("a", None),
            task("b", Some("a")),
            task("c", Some("b")),
            task("orphan", Some("missing")),
        ];

        assert_eq!(ancestor_depth(&tasks[0], &tasks), 0);
        assert_eq!(ancestor_depth(&tasks[2], &tasks), 2);
        assert_eq!(ancestor_depth(&tasks[3], &tasks), 0);
    }

    #[test]
    fn ancestor_depth_stops_on_cycle() {
        let tasks = vec![task("a", Some("b")), task("b", Some("a"))];
        assert_eq!(ancestor_depth(&tasks[0], &tasks), 1);
    }
}
