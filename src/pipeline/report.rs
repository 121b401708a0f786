// src/pipeline/report.rs

//! Reporting of per-file build errors.
//!
//! Errors are collected as values while the pipeline runs and reported here
//! once, when the owning task finishes: one log line and one notification per
//! failed file.

use tracing::error;

use crate::notifier::Notifier;
use crate::pipeline::FileError;

/// Log and notify every error; returns how many were reported.
pub fn report_file_errors(task: &str, errors: &[FileError], notifier: &dyn Notifier) -> usize {
    for err in errors {
        error!(
            task = %task,
            stage = %err.stage,
            file = ?err.path,
            "Error ({}): {}",
            err.stage,
            err.message
        );
        notifier.notify(&format!("Error ({})", err.stage), first_line(&err.message));
    }
    errors.len()
}

/// First line of a possibly multi-line message.
pub fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recording(Mutex<Vec<(String, String)>>);

    impl Notifier for Recording {
        fn notify(&self, title: &str, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
        }
    }

    #[test]
    fn one_notification_per_error_with_first_line_only() {
        let notifier = Recording::default();
        let errors = vec![
            FileError {
                stage: "csso".into(),
                path: PathBuf::from("static/src/a.css"),
                message: "Unexpected token\n  at line 3".into(),
            },
            FileError {
                stage: "src".into(),
                path: PathBuf::from("static/src/b.css"),
                message: "permission denied".into(),
            },
        ];

        assert_eq!(report_file_errors("static:css", &errors, &notifier), 2);

        let seen = notifier.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("Error (csso)".to_string(), "Unexpected token".to_string()),
                ("Error (src)".to_string(), "permission denied".to_string()),
            ]
        );
    }

    #[test]
    fn first_line_of_empty_message() {
        assert_eq!(first_line(""), "");
    }
}
