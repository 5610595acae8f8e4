//! Operator notifications.

use std::process::Stdio;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Fire-and-forget notification channel. Failures are logged, never retried.
pub trait Notifier {
    fn notify(&self, subject: &str, body: &str);
}

/// Sends mail through the host's `mail` command.
#[derive(Debug, Clone)]
pub struct MailNotifier {
    recipient: String,
}

impl MailNotifier {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

impl Notifier for MailNotifier {
    fn notify(&self, subject: &str, body: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot send notification '{}': {}", subject, e);
                return;
            }
        };

        let recipient = self.recipient.clone();
        let subject = subject.to_string();
        let body = body.to_string();
        handle.spawn(async move {
            let child = Command::new("mail")
                .arg("-s")
                .arg(&subject)
                .arg(&recipient)
                .stdin(Stdio::piped())
                .spawn();
            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!("Failed to run mail for '{}': {}", subject, e);
                    return;
                }
            };
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(body.as_bytes()).await {
                    warn!("Failed to pass mail body: {}", e);
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!("Notification '{}' sent to {}", subject, recipient)
                }
                Ok(status) => warn!("mail exited with {} for '{}'", status, subject),
                Err(e) => warn!("Failed to wait for mail: {}", e),
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingNotifier {
        pub(crate) fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, subject: &str, body: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
        }
    }

    #[test]
    fn mail_outside_runtime_is_dropped() {
        MailNotifier::new("ops@example.org").notify("subject", "body");
    }
}
