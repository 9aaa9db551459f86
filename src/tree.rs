//! Tree assembly and report collection
//!
//! After the barrier, the per-directory results are indexed by inode and
//! linked parent-to-child. A depth-first walk then rolls each subtree's
//! per-uid buckets up into its parent (unless `--exclude-subdirs`),
//! applies the output filters, and produces report rows in preorder:
//! parent line first, then its children.

use crate::config::WalkConfig;
use crate::fs::join_path;
use crate::units::human;
use crate::users::UserTable;
use crate::walker::{DirResult, RootEntry};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Write};

/// Post-traversal index: every counted directory by inode, and the
/// parent -> children links. Roots hang off the sentinel parent 0.
#[derive(Debug, Default)]
pub struct TreeIndex {
    all: HashMap<u64, DirResult>,
    children: HashMap<u64, Vec<u64>>,
}

/// One report row. `uid` is set only in per-user mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub path: String,
    pub uid: Option<u32>,
    pub files: u64,
    pub bytes: u64,
}

/// Build the index from the traversal's results.
///
/// Sibling lists are sorted by name so repeated runs over the same tree
/// print identically regardless of worker scheduling.
pub fn assemble(results: Vec<DirResult>) -> TreeIndex {
    let mut all: HashMap<u64, DirResult> = HashMap::with_capacity(results.len());
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();

    for result in results {
        children
            .entry(result.parent_inode)
            .or_default()
            .push(result.inode);
        all.insert(result.inode, result);
    }

    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| all[a].name.cmp(&all[b].name).then(a.cmp(b)));
    }

    TreeIndex { all, children }
}

impl TreeIndex {
    /// Number of indexed directories.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Roll up and filter, producing rows for every surviving root in
    /// the order the user supplied them. Roots with no entry (they were
    /// unreadable) are skipped silently.
    pub fn collect_rows(&self, roots: &[RootEntry], config: &WalkConfig) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut rolled: HashSet<u64> = HashSet::new();
        for root in roots {
            if self.all.contains_key(&root.inode) {
                self.walk(root.inode, &root.display, 0, config, &mut rolled, &mut rows);
            }
        }
        rows
    }

    fn walk(
        &self,
        inode: u64,
        path: &str,
        depth: usize,
        config: &WalkConfig,
        rolled: &mut HashSet<u64>,
        out: &mut Vec<Row>,
    ) -> (BTreeMap<u32, u64>, BTreeMap<u32, u64>) {
        let node = &self.all[&inode];
        let own_files = node.total_count();
        let own_bytes = node.total_size();
        let mut count = node.count.clone();
        let mut size = node.size.clone();

        // Children first: their accumulated buckets feed this node's
        // totals, but their rows come after this node's row.
        let mut child_rows = Vec::new();
        if let Some(kids) = self.children.get(&inode) {
            for &kid in kids {
                let child_path = join_path(path, &self.all[&kid].name);
                let (kid_count, kid_size) =
                    self.walk(kid, &child_path, depth + 1, config, rolled, &mut child_rows);
                // The rolled-up set guards against charging an inode
                // twice if it somehow appears under two parents.
                if !config.exclude_subdirs && rolled.insert(kid) {
                    merge(&mut count, &kid_count);
                    merge(&mut size, &kid_size);
                }
            }
        }

        let mut emit = config.max_depth.map_or(true, |max| depth <= max);

        // Directories that counted nothing of their own only appear in
        // the report if the path filters would have let their contents
        // through.
        if own_files == 0 && own_bytes == 0 && (config.excluded(path) || !config.included(path)) {
            emit = false;
        }

        if emit {
            if config.per_user {
                for (&uid, &files) in &count {
                    let bytes = size.get(&uid).copied().unwrap_or(0);
                    if files > config.file_limit || bytes > config.size_limit {
                        out.push(Row {
                            path: path.to_string(),
                            uid: Some(uid),
                            files,
                            bytes,
                        });
                    }
                }
            } else {
                let files: u64 = count.values().sum();
                let bytes: u64 = size.values().sum();
                if files >= config.file_limit && bytes >= config.size_limit {
                    out.push(Row {
                        path: path.to_string(),
                        uid: None,
                        files,
                        bytes,
                    });
                }
            }
        }

        out.append(&mut child_rows);
        (count, size)
    }
}

fn merge(into: &mut BTreeMap<u32, u64>, from: &BTreeMap<u32, u64>) {
    for (&uid, &value) in from {
        *into.entry(uid).or_insert(0) += value;
    }
}

/// Write the header and rows using the fixed report templates.
pub fn write_report<W: Write>(
    w: &mut W,
    rows: &[Row],
    config: &WalkConfig,
    users: &mut UserTable,
) -> io::Result<()> {
    if !config.quiet {
        if config.per_user {
            writeln!(w, "{:>15} {:>15} {:>15} {}", "user", "files", "size", "path")?;
        } else {
            writeln!(w, "{:>15} {:>15} {}", "files", "size", "path")?;
        }
    }

    for row in rows {
        let size = if config.human_readable {
            human(row.bytes)
        } else {
            row.bytes.to_string()
        };
        match row.uid {
            Some(uid) => writeln!(
                w,
                "{:>15} {:>15} {:>15} {}",
                users.name(uid),
                row.files,
                size,
                row.path
            )?,
            None => writeln!(w, "{:>15} {:>15} {}", row.files, size, row.path)?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, parent: u64, inode: u64, buckets: &[(u32, u64, u64)]) -> DirResult {
        let mut r = DirResult::new(name.to_string(), parent, inode);
        for &(uid, files, bytes) in buckets {
            *r.count.entry(uid).or_insert(0) += files;
            *r.size.entry(uid).or_insert(0) += bytes;
        }
        r
    }

    /// r/{f1, f2, d/{f3}} with two owners: r's own bucket holds the two
    /// files plus the charge for d itself.
    fn sample() -> (TreeIndex, Vec<RootEntry>) {
        let results = vec![
            result("d", 1, 2, &[(200, 1, 5)]),
            result("r", 0, 1, &[(100, 2, 30), (100, 1, 4)]),
        ];
        let index = assemble(results);
        let roots = vec![RootEntry {
            display: "r".to_string(),
            inode: 1,
        }];
        (index, roots)
    }

    #[test]
    fn rollup_accumulates_into_the_root() {
        let (index, roots) = sample();
        let rows = index.collect_rows(&roots, &WalkConfig::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].path, "r");
        assert_eq!((rows[0].files, rows[0].bytes), (4, 39));
        assert_eq!(rows[1].path, "r/d");
        assert_eq!((rows[1].files, rows[1].bytes), (1, 5));
    }

    #[test]
    fn exclude_subdirs_reports_own_buckets_only() {
        let (index, roots) = sample();
        let config = WalkConfig {
            exclude_subdirs: true,
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);

        assert_eq!((rows[0].files, rows[0].bytes), (3, 34));
        assert_eq!((rows[1].files, rows[1].bytes), (1, 5));
        // Conservation: own-bucket rows sum to the rolled-up root.
        let total: u64 = rows.iter().map(|r| r.bytes).sum();
        assert_eq!(total, 39);
    }

    #[test]
    fn max_depth_zero_keeps_one_row_per_root() {
        let (index, roots) = sample();
        let config = WalkConfig {
            max_depth: Some(0),
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].files, rows[0].bytes), (4, 39));
    }

    #[test]
    fn per_user_rows_split_by_uid_with_strict_thresholds() {
        let (index, roots) = sample();
        let config = WalkConfig {
            per_user: true,
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);

        let r_rows: Vec<_> = rows.iter().filter(|r| r.path == "r").collect();
        assert_eq!(r_rows.len(), 2);
        assert_eq!(r_rows[0].uid, Some(100));
        assert_eq!((r_rows[0].files, r_rows[0].bytes), (3, 34));
        assert_eq!(r_rows[1].uid, Some(200));
        assert_eq!((r_rows[1].files, r_rows[1].bytes), (1, 5));

        // Strict >: a uid sitting exactly on the limit is suppressed.
        let config = WalkConfig {
            per_user: true,
            file_limit: 3,
            size_limit: 34,
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);
        assert!(rows.is_empty());
    }

    #[test]
    fn aggregate_thresholds_use_and_semantics() {
        let (index, roots) = sample();
        // Exactly on both limits: >= passes.
        let config = WalkConfig {
            file_limit: 4,
            size_limit: 39,
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "r");

        // One limit unreachable: AND suppresses everything.
        let config = WalkConfig {
            file_limit: 1,
            size_limit: u64::MAX,
            ..WalkConfig::default()
        };
        assert!(index.collect_rows(&roots, &config).is_empty());
    }

    #[test]
    fn empty_directory_failing_include_is_dropped() {
        // r has nothing of its own; only r/d/f3 matches the include.
        let results = vec![
            result("r", 0, 1, &[]),
            result("d", 1, 2, &[(200, 1, 5)]),
        ];
        let index = assemble(results);
        let roots = vec![RootEntry {
            display: "r".to_string(),
            inode: 1,
        }];
        let config = WalkConfig {
            include: Some(regex::Regex::new("^(?:.*/d/.*)$").unwrap()),
            ..WalkConfig::default()
        };
        let rows = index.collect_rows(&roots, &config);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "r/d");
        assert_eq!((rows[0].files, rows[0].bytes), (1, 5));
    }

    #[test]
    fn siblings_sort_by_name_regardless_of_arrival() {
        let results = vec![
            result("r", 0, 1, &[(100, 1, 1)]),
            result("zz", 1, 3, &[(100, 1, 1)]),
            result("aa", 1, 2, &[(100, 1, 1)]),
        ];
        let index = assemble(results);
        let roots = vec![RootEntry {
            display: "r".to_string(),
            inode: 1,
        }];
        let rows = index.collect_rows(&roots, &WalkConfig::default());
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["r", "r/aa", "r/zz"]);
    }

    #[test]
    fn missing_root_is_skipped() {
        let index = assemble(vec![]);
        let roots = vec![RootEntry {
            display: "gone".to_string(),
            inode: 99,
        }];
        assert!(index.collect_rows(&roots, &WalkConfig::default()).is_empty());
    }

    #[test]
    fn report_templates_align_columns() {
        let rows = vec![Row {
            path: "r".into(),
            uid: None,
            files: 3,
            bytes: 35,
        }];
        let mut out = Vec::new();
        let mut users = UserTable::new();
        write_report(&mut out, &rows, &WalkConfig::default(), &mut users).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("{:>15} {:>15} {}", "files", "size", "path")
        );
        assert_eq!(
            lines.next().unwrap(),
            format!("{:>15} {:>15} {}", 3, 35, "r")
        );

        let config = WalkConfig {
            quiet: true,
            human_readable: true,
            ..WalkConfig::default()
        };
        let mut out = Vec::new();
        write_report(&mut out, &rows, &config, &mut users).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("35.0B"));
    }
}
