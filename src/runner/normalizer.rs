//! Suite tree construction and flattening into run summaries.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coverage::reducer::relative_path;
use crate::runner::report::{AssertionResult, AssertionStatus, FileResult, JsonReport};

/// Execution state of a single test task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pass,
    Fail,
    Skip,
    Todo,
    Run,
}

impl From<AssertionStatus> for TaskState {
    fn from(status: AssertionStatus) -> Self {
        match status {
            AssertionStatus::Passed => Self::Pass,
            AssertionStatus::Failed => Self::Fail,
            AssertionStatus::Skipped | AssertionStatus::Pending | AssertionStatus::Disabled => {
                Self::Skip
            }
            AssertionStatus::Todo => Self::Todo,
            AssertionStatus::Unknown => Self::Run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub state: TaskState,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// A leaf test; `result` is absent when the test never ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestLeaf {
    pub name: String,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl TestLeaf {
    fn state(&self) -> Option<TaskState> {
        self.result.as_ref().map(|result| result.state)
    }

    fn outcome(&self, ancestors: &[String]) -> TestOutcome {
        let state = self.state();
        TestOutcome {
            title: self.name.clone(),
            ancestor_path: ancestors.to_vec(),
            passed: state == Some(TaskState::Pass),
            skipped: matches!(state, Some(TaskState::Skip | TaskState::Todo)),
            duration_ms: self
                .result
                .as_ref()
                .and_then(|result| result.duration)
                .unwrap_or(0.0),
            failure_messages: self
                .result
                .as_ref()
                .map(|result| result.errors.clone())
                .unwrap_or_default(),
        }
    }
}

/// A named group owning an ordered list of child nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteGroup {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<SuiteNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SuiteNode {
    Test(TestLeaf),
    Suite(SuiteGroup),
}

/// Root of one test file's suite tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<SuiteNode>,
}

impl TaskFile {
    /// Rebuild the suite tree from each assertion's ancestor titles.
    ///
    /// Consecutive tests sharing a suite path share one suite node; the
    /// flattened order matches the reporter's order.
    pub fn from_file_result(file: &FileResult, project_root: &Path) -> Self {
        let mut tasks = Vec::new();
        for assertion in &file.assertion_results {
            insert_leaf(&mut tasks, &assertion.ancestor_titles, leaf_from(assertion));
        }

        Self {
            name: relative_path(&file.name, project_root),
            tasks,
        }
    }
}

impl JsonReport {
    /// Suite trees for every file in the report
    pub fn task_files(&self, project_root: &Path) -> Vec<TaskFile> {
        self.test_results
            .iter()
            .map(|file| TaskFile::from_file_result(file, project_root))
            .collect()
    }
}

fn leaf_from(assertion: &AssertionResult) -> TestLeaf {
    TestLeaf {
        name: assertion.title.clone(),
        result: Some(TaskResult {
            state: assertion.status.into(),
            duration: assertion.duration,
            errors: assertion.failure_messages.clone(),
        }),
    }
}

fn insert_leaf(tasks: &mut Vec<SuiteNode>, ancestors: &[String], leaf: TestLeaf) {
    let Some((head, rest)) = ancestors.split_first() else {
        tasks.push(SuiteNode::Test(leaf));
        return;
    };

    // Only the most recent sibling is reused so flattening keeps reporter order.
    let reuse_last = matches!(tasks.last(), Some(SuiteNode::Suite(group)) if &group.name == head);
    if !reuse_last {
        tasks.push(SuiteNode::Suite(SuiteGroup {
            name: head.clone(),
            tasks: Vec::new(),
        }));
    }

    if let Some(SuiteNode::Suite(group)) = tasks.last_mut() {
        insert_leaf(&mut group.tasks, rest, leaf);
    }
}

/// A flattened leaf test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub title: String,
    pub ancestor_path: Vec<String>,
    pub passed: bool,
    pub skipped: bool,
    pub duration_ms: f64,
    pub failure_messages: Vec<String>,
}

/// Leaf outcomes for one test file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file: String,
    pub passed: bool,
    pub tests: Vec<TestOutcome>,
}

/// Aggregate counts and per-file outcomes for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub num_total_test_suites: usize,
    pub num_passed_test_suites: usize,
    pub num_failed_test_suites: usize,
    pub num_total_tests: usize,
    pub num_passed_tests: usize,
    pub num_failed_tests: usize,
    pub num_skipped_tests: usize,
    pub test_results: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.num_failed_test_suites == 0 && self.num_failed_tests == 0
    }
}

/// Flatten every file's suite tree and derive counts from the leaves.
///
/// A file passes only if it has at least one leaf and every leaf passed.
pub fn normalize(files: &[TaskFile]) -> RunSummary {
    let mut summary = RunSummary::default();

    for file in files {
        let mut tests = Vec::new();
        collect_leaves(&file.tasks, &mut Vec::new(), &mut tests);

        let passed = !tests.is_empty() && tests.iter().all(|test| test.passed);

        summary.num_total_test_suites += 1;
        if passed {
            summary.num_passed_test_suites += 1;
        } else {
            summary.num_failed_test_suites += 1;
        }

        for test in &tests {
            summary.num_total_tests += 1;
            if test.passed {
                summary.num_passed_tests += 1;
            } else if test.skipped {
                summary.num_skipped_tests += 1;
            } else {
                summary.num_failed_tests += 1;
            }
        }

        summary.test_results.push(FileOutcome {
            file: file.name.clone(),
            passed,
            tests,
        });
    }

    summary
}

fn collect_leaves(nodes: &[SuiteNode], path: &mut Vec<String>, out: &mut Vec<TestOutcome>) {
    for node in nodes {
        match node {
            SuiteNode::Test(leaf) => out.push(leaf.outcome(path)),
            SuiteNode::Suite(group) => {
                path.push(group.name.clone());
                collect_leaves(&group.tasks, path, out);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(name: &str, state: Option<TaskState>) -> SuiteNode {
        SuiteNode::Test(TestLeaf {
            name: name.to_string(),
            result: state.map(|state| TaskResult {
                state,
                duration: Some(2.0),
                errors: if state == TaskState::Fail {
                    vec!["boom".to_string()]
                } else {
                    Vec::new()
                },
            }),
        })
    }

    fn suite(name: &str, tasks: Vec<SuiteNode>) -> SuiteNode {
        SuiteNode::Suite(SuiteGroup {
            name: name.to_string(),
            tasks,
        })
    }

    #[test]
    fn test_flattens_arbitrary_depth_with_ancestor_paths() {
        let file = TaskFile {
            name: "deep.test.ts".to_string(),
            tasks: vec![
                leaf("top", Some(TaskState::Pass)),
                suite(
                    "a",
                    vec![suite(
                        "b",
                        vec![suite("c", vec![leaf("deepest", Some(TaskState::Pass))])],
                    )],
                ),
            ],
        };

        let summary = normalize(&[file]);
        let tests = &summary.test_results[0].tests;
        assert_eq!(tests.len(), 2);
        assert!(tests[0].ancestor_path.is_empty());
        assert_eq!(tests[1].ancestor_path, vec!["a", "b", "c"]);
        assert!(summary.test_results[0].passed);
        assert!(summary.success());
    }

    #[test]
    fn test_counts_come_from_leaves() {
        let files = vec![
            TaskFile {
                name: "a.test.ts".to_string(),
                tasks: vec![suite(
                    "s",
                    vec![
                        leaf("ok", Some(TaskState::Pass)),
                        leaf("bad", Some(TaskState::Fail)),
                        leaf("later", Some(TaskState::Todo)),
                    ],
                )],
            },
            TaskFile {
                name: "b.test.ts".to_string(),
                tasks: vec![leaf("ok", Some(TaskState::Pass))],
            },
        ];

        let summary = normalize(&files);
        assert_eq!(summary.num_total_test_suites, 2);
        assert_eq!(summary.num_passed_test_suites, 1);
        assert_eq!(summary.num_failed_test_suites, 1);
        assert_eq!(summary.num_total_tests, 4);
        assert_eq!(summary.num_passed_tests, 2);
        assert_eq!(summary.num_failed_tests, 1);
        assert_eq!(summary.num_skipped_tests, 1);
        assert_eq!(summary.test_results[0].tests[1].failure_messages, vec!["boom"]);
    }

    #[test]
    fn test_empty_file_fails() {
        let summary = normalize(&[TaskFile {
            name: "empty.test.ts".to_string(),
            tasks: Vec::new(),
        }]);
        assert!(!summary.test_results[0].passed);
        assert_eq!(summary.num_failed_test_suites, 1);
        assert_eq!(summary.num_total_tests, 0);
    }

    #[test]
    fn test_leaf_without_result_is_not_passed() {
        let summary = normalize(&[TaskFile {
            name: "x.test.ts".to_string(),
            tasks: vec![leaf("never ran", None)],
        }]);
        assert!(!summary.test_results[0].passed);
        assert_eq!(summary.num_failed_tests, 1);
    }

    #[test]
    fn test_tree_rebuilt_from_ancestor_titles_in_reporter_order() {
        let file: FileResult = serde_json::from_value(json!({
            "name": "/proj/src/a.test.ts",
            "assertionResults": [
                {"ancestorTitles": ["outer", "inner"], "title": "one", "status": "passed"},
                {"ancestorTitles": ["outer", "inner"], "title": "one-b", "status": "passed"},
                {"ancestorTitles": [], "title": "loose", "status": "passed"},
                {"ancestorTitles": ["outer"], "title": "two", "status": "failed"},
                {"ancestorTitles": ["outer", "inner"], "title": "three", "status": "skipped"}
            ]
        }))
        .unwrap();

        let task_file = TaskFile::from_file_result(&file, Path::new("/proj"));
        assert_eq!(task_file.name, "src/a.test.ts");
        assert_eq!(task_file.tasks.len(), 3);

        let SuiteNode::Suite(outer) = &task_file.tasks[0] else {
            panic!("expected outer suite first");
        };
        assert_eq!(outer.name, "outer");
        assert_eq!(outer.tasks.len(), 1);
        let SuiteNode::Suite(inner) = &outer.tasks[0] else {
            panic!("expected inner suite");
        };
        assert_eq!(inner.tasks.len(), 2);
        assert!(matches!(&task_file.tasks[1], SuiteNode::Test(leaf) if leaf.name == "loose"));

        let summary = normalize(&[task_file]);
        let titles: Vec<&str> = summary.test_results[0]
            .tests
            .iter()
            .map(|test| test.title.as_str())
            .collect();
        assert_eq!(titles, vec!["one", "one-b", "loose", "two", "three"]);
        assert_eq!(summary.test_results[0].tests[4].ancestor_path, vec!["outer", "inner"]);
        assert_eq!(summary.num_skipped_tests, 1);
    }

    #[test]
    fn test_suite_tree_serializes_with_type_tag() {
        let node = suite("s", vec![leaf("t", Some(TaskState::Pass))]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "suite");
        assert_eq!(value["tasks"][0]["type"], "test");
        assert_eq!(value["tasks"][0]["result"]["state"], "pass");

        let back: SuiteNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
