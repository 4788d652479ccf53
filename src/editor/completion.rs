use std::env;
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Result of completing the word under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Byte offset where the completed word starts.
    pub start: usize,
    /// The word extended by the longest prefix shared by all candidates.
    pub replacement: String,
    pub candidates: Vec<String>,
}

/// Complete the word ending at byte `cursor`: commands on PATH in command
/// position, otherwise file names. Unreadable directories offer nothing.
pub fn complete(line: &str, cursor: usize) -> Option<Completion> {
    let before = &line[..cursor];
    let start = before
        .rfind(|c: char| c.is_whitespace() || "|<>&".contains(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &before[start..];
    if word.is_empty() {
        return None;
    }

    let (dir, prefix, candidates) = if let Some((dir, prefix)) = split_dir_prefix(word) {
        let matches = list_dir_matches(&dir, &prefix);
        (Some(dir), prefix, matches)
    } else if is_command_position(&before[..start]) {
        (None, word.to_string(), list_path_commands(word))
    } else {
        (None, word.to_string(), list_dir_matches(".", word))
    };

    if candidates.is_empty() {
        return None;
    }

    let common = common_prefix(&candidates);
    let completed = if common.chars().count() > prefix.chars().count() {
        common
    } else {
        prefix
    };
    let replacement = match dir {
        Some(dir) if dir == "/" => format!("/{}", completed),
        Some(dir) => format!("{}/{}", dir, completed),
        None => completed,
    };

    Some(Completion {
        start,
        replacement,
        candidates,
    })
}

/// First word of the line or of a pipeline stage.
fn is_command_position(before_word: &str) -> bool {
    match before_word.trim_end().chars().last() {
        None => true,
        Some(c) => c == '|',
    }
}

pub fn split_dir_prefix(path: &str) -> Option<(String, String)> {
    let idx = path.rfind('/')?;
    let dir = if idx == 0 {
        "/".to_string()
    } else {
        path[..idx].to_string()
    };
    Some((dir, path[idx + 1..].to_string()))
}

pub fn list_dir_matches(dir: &str, prefix: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return matches;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(prefix) || (name.starts_with('.') && !prefix.starts_with('.')) {
            continue;
        }
        if entry.path().is_dir() {
            matches.push(format!("{}/", name));
        } else {
            matches.push(name);
        }
    }
    matches.sort();
    matches
}

pub fn list_path_commands(prefix: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let Some(path_var) = env::var_os("PATH") else {
        return matches;
    };

    for dir in env::split_paths(&path_var) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) && is_executable(&entry) {
                matches.push(name);
            }
        }
    }
    for builtin in ["cd", "exit"] {
        if builtin.starts_with(prefix) {
            matches.push(builtin.to_string());
        }
    }
    matches.sort();
    matches.dedup();
    matches
}

#[cfg(unix)]
fn is_executable(entry: &fs::DirEntry) -> bool {
    entry
        .metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_: &fs::DirEntry) -> bool {
    true
}

pub fn common_prefix(strings: &[String]) -> String {
    let Some(first) = strings.first() else {
        return String::new();
    };
    let mut prefix_len = first.chars().count();
    for s in &strings[1..] {
        prefix_len = prefix_len.min(
            first
                .chars()
                .zip(s.chars())
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    first.chars().take(prefix_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn common_prefix_of_candidates() {
        assert_eq!(common_prefix(&strings(&["foobar", "foobaz", "foo"])), "foo");
        assert_eq!(common_prefix(&strings(&["abc"])), "abc");
        assert_eq!(common_prefix(&strings(&["abc", "xyz"])), "");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn splits_directory_from_prefix() {
        assert_eq!(
            split_dir_prefix("src/ma"),
            Some(("src".to_string(), "ma".to_string()))
        );
        assert_eq!(split_dir_prefix("/us"), Some(("/".to_string(), "us".to_string())));
        assert_eq!(split_dir_prefix("plain"), None);
    }

    #[test]
    fn command_position() {
        assert!(is_command_position(""));
        assert!(is_command_position("ls | "));
        assert!(is_command_position("ls |"));
        assert!(!is_command_position("ls "));
    }

    #[test]
    fn completes_paths() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        File::create(dir.path().join("novel.md")).unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let base = dir.path().display().to_string();

        let line = format!("cat {}/note", base);
        let done = complete(&line, line.len()).unwrap();
        assert_eq!(done.start, 4);
        assert_eq!(done.replacement, format!("{}/notes.txt", base));
        assert_eq!(done.candidates, strings(&["notes.txt"]));

        let line = format!("cat {}/n", base);
        let done = complete(&line, line.len()).unwrap();
        assert_eq!(done.replacement, format!("{}/n", base));
        assert_eq!(done.candidates, strings(&["nested/", "notes.txt", "novel.md"]));

        let line = format!("cat {}/zzz", base);
        assert_eq!(complete(&line, line.len()), None);
    }

    #[test]
    fn missing_directory_offers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let line = format!("cat {}/nosuch-dir/f", dir.path().display());
        assert_eq!(complete(&line, line.len()), None);
        assert!(list_dir_matches(&format!("{}/gone", dir.path().display()), "").is_empty());
    }

    #[test]
    fn nothing_to_complete_after_blank() {
        assert_eq!(complete("ls ", 3), None);
        assert_eq!(complete("", 0), None);
    }

    #[test]
    fn builtins_complete_as_commands() {
        let found = list_path_commands("ex");
        assert!(found.contains(&"exit".to_string()));
    }
}
