//! Task derivation from the analysis stage's output
//!
//! A heuristic, not a parser: the first line mentioning a marker word wins,
//! otherwise a fixed-length prefix of the raw output is used.

use crew_core::truncate_chars;

/// Marker words that flag a line as describing the next task
///
/// ASCII markers match case-insensitively.
pub const TASK_MARKERS: [&str; 8] = [
    "task",
    "suggest",
    "recommend",
    "develop",
    "implement",
    "任务",
    "建议",
    "开发",
];

/// Characters kept when no line carries a marker
pub const FALLBACK_PREFIX_CHARS: usize = 100;

/// Derive the iteration's task from `analysis`
///
/// Returns `None` when the analysis is blank, since there is nothing to work on.
pub fn derive_task(analysis: &str) -> Option<String> {
    if analysis.trim().is_empty() {
        return None;
    }

    let marked = analysis.lines().find(|line| {
        let lowered = line.to_ascii_lowercase();
        TASK_MARKERS.iter().any(|marker| lowered.contains(marker))
    });

    match marked {
        Some(line) => Some(line.trim().to_string()),
        None => Some(truncate_chars(analysis, FALLBACK_PREFIX_CHARS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_marked_line_wins() {
        let analysis = "Project summary: a todo API\n\
                        \x20 Next task: add pagination to /todos  \n\
                        We should also develop a CLI";
        assert_eq!(
            derive_task(analysis).unwrap(),
            "Next task: add pagination to /todos"
        );
    }

    #[test]
    fn test_markers_case_insensitive() {
        assert_eq!(
            derive_task("intro\nIMPLEMENT rate limiting\n").unwrap(),
            "IMPLEMENT rate limiting"
        );
        assert_eq!(
            derive_task("We Recommend caching").unwrap(),
            "We Recommend caching"
        );
    }

    #[test]
    fn test_cjk_markers() {
        assert_eq!(
            derive_task("现状良好\n下一个任务：增加健康检查接口").unwrap(),
            "下一个任务：增加健康检查接口"
        );
        assert_eq!(derive_task("建议 添加日志").unwrap(), "建议 添加日志");
    }

    #[test]
    fn test_fallback_prefix() {
        let analysis = "x".repeat(250);
        assert_eq!(derive_task(&analysis).unwrap(), "x".repeat(FALLBACK_PREFIX_CHARS));

        let short = "add a health-check endpoint";
        assert_eq!(derive_task(short).unwrap(), short);
    }

    #[test]
    fn test_fallback_counts_chars() {
        let analysis = "需".repeat(150);
        let task = derive_task(&analysis).unwrap();
        assert_eq!(task.chars().count(), FALLBACK_PREFIX_CHARS);
    }

    #[test]
    fn test_blank_analysis() {
        assert_eq!(derive_task(""), None);
        assert_eq!(derive_task("  \n\t\n"), None);
    }
}
