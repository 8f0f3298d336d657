//! Parsing of `git log` and `git rev-list` output

use crate::types::CommitRecord;
use chrono::DateTime;

/// Separator between fields of one log record
pub const FIELD_DELIMITER: &str = "|||";

/// `--pretty` argument producing one delimiter-separated record per commit
pub const LOG_FORMAT_ARG: &str = "--pretty=format:%H|||%an|||%ae|||%aI|||%s";

/// Fields per record: sha, author name, author email, timestamp, subject
const FIELD_COUNT: usize = 5;

const SHA_LENGTH: usize = 40;

/// Parse the output of `git log` with [`LOG_FORMAT_ARG`]
///
/// Malformed lines are skipped with a warning; they never abort the parse.
pub fn parse_log(raw: &str) -> Vec<CommitRecord> {
    let mut commits = Vec::new();
    let mut skipped = 0usize;

    for line in raw.split(['\r', '\n']) {
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Some(commit) => commits.push(commit),
            None => {
                skipped += 1;
                tracing::warn!("Skipping malformed log line: {}", line);
            }
        }
    }

    if skipped > 0 {
        tracing::debug!("Parsed {} commits, skipped {} lines", commits.len(), skipped);
    }

    commits
}

fn parse_line(line: &str) -> Option<CommitRecord> {
    let parts: Vec<&str> = line.splitn(FIELD_COUNT, FIELD_DELIMITER).collect();
    if parts.len() < FIELD_COUNT {
        return None;
    }

    let sha = parts[0].trim();
    let author_name = parts[1].trim();
    let author_email = parts[2].trim();
    let timestamp = parts[3].trim();
    let message = parts[4].trim();

    if !is_valid_sha(sha) || author_email.is_empty() || timestamp.is_empty() {
        return None;
    }

    let author_timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?;

    Some(CommitRecord {
        sha: sha.to_ascii_lowercase(),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        author_timestamp,
        message: message.to_string(),
    })
}

/// Parse `git rev-list --max-parents=0 HEAD` output
///
/// Takes the first non-empty line. Repositories with several root commits
/// therefore resolve to the first one git lists.
pub fn parse_initial_commit_sha(raw: &str) -> Option<String> {
    let first = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
    is_valid_sha(first).then(|| first.to_ascii_lowercase())
}

/// True for exactly 40 hexadecimal characters
pub fn is_valid_sha(value: &str) -> bool {
    value.len() == SHA_LENGTH && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str = "0123456789abcdef0123456789abcdef01234567";
    const SHA_B: &str = "89abcdef0123456789abcdef0123456789abcdef";

    fn line(sha: &str, name: &str, email: &str, ts: &str, subject: &str) -> String {
        [sha, name, email, ts, subject].join(FIELD_DELIMITER)
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("   \n\r\n  ").is_empty());
    }

    #[test]
    fn test_parse_single_record() {
        let raw = line(SHA_A, "Jane Doe", "jane@example.com", "2024-01-15T10:30:00+02:00", "Initial commit");
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);

        let commit = &commits[0];
        assert_eq!(commit.sha, SHA_A);
        assert_eq!(commit.author_name, "Jane Doe");
        assert_eq!(commit.author_email, "jane@example.com");
        assert_eq!(commit.message, "Initial commit");
        assert_eq!(commit.author_timestamp.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_delimiter_in_subject_is_preserved() {
        let raw = line(SHA_A, "Jane", "jane@example.com", "2024-01-15T10:30:00Z", "fix: a|||b");
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "fix: a|||b");
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let raw = format!(
            "{}\r\n\r\n{}\n",
            line(SHA_A, "A", "a@example.com", "2024-01-01T00:00:00Z", "one"),
            line(SHA_B, "B", "b@example.com", "2024-01-02T00:00:00-05:00", "two"),
        );
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "one");
        assert_eq!(commits[1].sha, SHA_B);
    }

    #[test]
    fn test_fields_are_trimmed_and_sha_lowercased() {
        let upper = SHA_A.to_uppercase();
        let raw = line(&format!(" {} ", upper), "  Jane ", " jane@example.com ", " 2024-01-15T10:30:00Z ", "  msg  ");
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, SHA_A);
        assert_eq!(commits[0].author_name, "Jane");
        assert_eq!(commits[0].author_email, "jane@example.com");
        assert_eq!(commits[0].message, "msg");
    }

    #[test]
    fn test_empty_name_and_message_allowed() {
        let raw = line(SHA_A, "", "jane@example.com", "2024-01-15T10:30:00Z", "");
        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert!(commits[0].author_name.is_empty());
        assert!(commits[0].message.is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let good = line(SHA_A, "Jane", "jane@example.com", "2024-01-15T10:30:00Z", "ok");
        let raw = [
            "not a log line".to_string(),
            format!("{}|||Jane|||jane@example.com|||2024-01-15T10:30:00Z", SHA_B),
            line("abc123", "Jane", "jane@example.com", "2024-01-15T10:30:00Z", "short sha"),
            line(&"g".repeat(40), "Jane", "jane@example.com", "2024-01-15T10:30:00Z", "non-hex"),
            line(SHA_B, "Jane", "  ", "2024-01-15T10:30:00Z", "no email"),
            line(SHA_B, "Jane", "jane@example.com", "", "no timestamp"),
            line(SHA_B, "Jane", "jane@example.com", "yesterday", "bad timestamp"),
            good,
        ]
        .join("\n");

        let commits = parse_log(&raw);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, SHA_A);
    }

    #[test]
    fn test_initial_sha_valid_with_trailing_newline() {
        let raw = format!("{}\n", SHA_A);
        assert_eq!(parse_initial_commit_sha(&raw), Some(SHA_A.to_string()));
    }

    #[test]
    fn test_initial_sha_first_non_empty_line() {
        let raw = format!("\n  \n{}\n{}\n", SHA_B, SHA_A);
        assert_eq!(parse_initial_commit_sha(&raw), Some(SHA_B.to_string()));
    }

    #[test]
    fn test_initial_sha_invalid() {
        assert_eq!(parse_initial_commit_sha(""), None);
        assert_eq!(parse_initial_commit_sha("   \n"), None);
        assert_eq!(parse_initial_commit_sha("abc123"), None);
        assert_eq!(
            parse_initial_commit_sha("fatal: ambiguous argument 'HEAD'"),
            None
        );
        assert_eq!(parse_initial_commit_sha(&format!("{}0", SHA_A)), None);
    }

    #[test]
    fn test_is_valid_sha() {
        assert!(is_valid_sha(SHA_A));
        assert!(is_valid_sha(&SHA_A.to_uppercase()));
        assert!(!is_valid_sha(&SHA_A[..39]));
        assert!(!is_valid_sha(&"z".repeat(40)));
    }
}
