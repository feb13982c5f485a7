//! Authorization and dispatch of operator commands.

use crate::commands::{Command, Verb};
use crate::core::{ChannelKind, ConfigStore, ServerConfig, normalize_user};
use crate::engine::{Reconciler, Scheduler, SchedulerState};
use crate::error::WatchError;
use crate::sink::send_with_timeout;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Reply sent to operators that are not whitelisted.
pub const UNAUTHORIZED: &str = "Unauthorized. Sorry.";

const SAVE_FAILED: &str = "Warning: the change is active but could not be saved.";

/// One inbound message from an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Identifier of the operator who sent the message
    pub user: String,
    /// Channel that receives the reply
    pub chat: String,
    /// Raw message text
    pub text: String,
}

impl CommandRequest {
    /// Create a request.
    pub fn new(user: impl Into<String>, chat: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            chat: chat.into(),
            text: text.into(),
        }
    }
}

/// Checks authorization, applies commands and replies to the operator.
///
/// Every mutating command is persisted before it is acknowledged. Failures
/// other than malformed input are escalated to the service channels; the
/// operator only sees a short note.
///
/// Requests are independent: `handle` may be called concurrently from as
/// many tasks as needed.
pub struct CommandRouter {
    config: ConfigStore,
    reconciler: Arc<Reconciler>,
    scheduler: Arc<Scheduler>,
    /// Serializes start, stop and interval changes so `active`, `interval`
    /// and the scheduler always agree
    lifecycle: Mutex<()>,
}

impl CommandRouter {
    /// Create a router.
    pub fn new(config: ConfigStore, reconciler: Arc<Reconciler>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            config,
            reconciler,
            scheduler,
            lifecycle: Mutex::new(()),
        }
    }

    /// Handle one message.
    ///
    /// Returns `false` when the text is not a known command; nothing is
    /// replied in that case.
    pub async fn handle(&self, request: &CommandRequest) -> bool {
        let Some((verb, args)) = Verb::split(&request.text) else {
            return false;
        };

        if !self.is_authorized(&request.user) {
            tracing::warn!(user = %request.user, command = verb.token(), "Unauthorized command");
            let sink = self.reconciler.sink();
            if let Err(e) =
                send_with_timeout(sink.as_ref(), &request.chat, UNAUTHORIZED, self.reconciler.send_timeout())
                    .await
            {
                tracing::warn!(error = %e, "Cannot deliver denial");
            }
            return true;
        }

        tracing::info!(user = %request.user, command = verb.token(), "Handling command");

        let command = match verb.parse(args) {
            Ok(command) => command,
            Err(usage) => {
                self.reply(&request.chat, usage.0).await;
                return true;
            }
        };

        match command {
            Command::ForceUpdate => {
                self.reply(&request.chat, "Updating").await;
                self.reconciler.check(true).await;
            }
            Command::CheckNow => {
                self.reply(&request.chat, "Updating").await;
                self.reconciler.check(false).await;
            }
            command => {
                let text = self.execute(command).await;
                self.reply(&request.chat, &text).await;
            }
        }

        true
    }

    fn is_authorized(&self, user: &str) -> bool {
        normalize_user(user).is_some_and(|user| self.config.get().whitelist.contains(&user))
    }

    async fn execute(&self, command: Command) -> String {
        match command {
            Command::Status => self.status().await,

            Command::AddUser(user) => {
                self.mutate(
                    |cfg| cfg.whitelist.insert(user.clone()),
                    |added| {
                        if added {
                            format!("User \"{}\" added.", user)
                        } else {
                            format!("User \"{}\" is already whitelisted.", user)
                        }
                    },
                )
                .await
            }
            Command::RemoveUser(user) => {
                if user == self.config.root() {
                    return "Cannot remove root user.".to_string();
                }
                self.mutate(
                    |cfg| cfg.whitelist.remove(&user),
                    |removed| {
                        if removed {
                            format!("User \"{}\" removed.", user)
                        } else {
                            format!("User \"{}\" is not in whitelist.", user)
                        }
                    },
                )
                .await
            }
            Command::ListUsers => {
                let config = self.config.get();
                let users: Vec<&str> = config.whitelist.iter().collect();
                format!("Whitelist: [{}]", users.join(", "))
            }

            Command::AddChannel(kind, channel) => {
                let label = channel_label(kind);
                self.mutate(
                    |cfg| cfg.channels_mut(kind).insert(channel.clone()),
                    |added| {
                        if added {
                            format!("{} \"{}\" added.", label, channel)
                        } else {
                            format!("{} \"{}\" is already added.", label, channel)
                        }
                    },
                )
                .await
            }
            Command::RemoveChannel(kind, channel) => {
                let label = channel_label(kind);
                self.mutate(
                    |cfg| cfg.channels_mut(kind).remove(&channel),
                    |removed| {
                        if removed {
                            format!("{} \"{}\" will not be notified anymore.", label, channel)
                        } else {
                            format!("{} \"{}\" is not found.", label, channel)
                        }
                    },
                )
                .await
            }
            Command::ListChannels => {
                let config = self.config.get();
                format!(
                    "Notify: [{}]\nService: [{}]",
                    config.notify_channels.sorted().join(", "),
                    config.service_channels.sorted().join(", ")
                )
            }

            Command::AddProduct { name, url } => {
                self.mutate(
                    |cfg| cfg.products.insert(name.clone(), url.clone()),
                    |previous| match previous {
                        None => format!("Product \"{}\" added with url \"{}\".", name, url),
                        Some(old) if old == url => {
                            format!("Product \"{}\" is already tracked with url \"{}\".", name, url)
                        }
                        Some(old) => format!(
                            "Product \"{}\" now has url \"{}\" instead of \"{}\".",
                            name, url, old
                        ),
                    },
                )
                .await
            }
            Command::RemoveProduct(name) => {
                self.mutate(
                    |cfg| cfg.products.remove(&name),
                    |removed| match removed {
                        Some(_) => format!("Product \"{}\" is deleted.", name),
                        None => format!("Product \"{}\" is not found.", name),
                    },
                )
                .await
            }
            Command::ListProducts => {
                let config = self.config.get();
                if config.products.is_empty() {
                    return "There are no products tracked.".to_string();
                }
                config
                    .products
                    .iter()
                    .map(|(name, url)| format!("{} - {}", name, url))
                    .collect::<Vec<_>>()
                    .join("\n")
            }

            Command::SetUpdateInterval { minutes } => self.set_interval(minutes).await,
            Command::StartUpdates => self.start_updates().await,
            Command::StopUpdates => self.stop_updates().await,

            // Both reply before running and are dispatched in `handle`.
            Command::ForceUpdate | Command::CheckNow => "Updating".to_string(),
        }
    }

    async fn set_interval(&self, minutes: u64) -> String {
        let _lifecycle = self.lifecycle.lock().await;
        let interval = Duration::from_secs(minutes.saturating_mul(60));
        let mut notes = Vec::new();

        match self
            .config
            .mutate_and_save(|cfg| {
                cfg.interval = interval;
                cfg.active = true;
            })
            .await
        {
            Ok(mutation) => notes.extend(self.note_save_error(mutation.save_error).await),
            Err(e) => return self.rejected(e),
        }

        if let Err(e) = self.scheduler.restart(interval).await {
            self.reconciler.escalate(vec![e]).await;
            notes.push("Warning: the update cycle could not be restarted.");
        }

        let total = interval.as_secs() / 60;
        let mut text = format!(
            "Interval updated to {} hours {} minutes.",
            total / 60,
            total % 60
        );
        append_notes(&mut text, &notes);
        text
    }

    async fn start_updates(&self) -> String {
        let _lifecycle = self.lifecycle.lock().await;
        let config = self.config.get();
        let mut notes = Vec::new();

        if !config.active {
            if let Err(e) = self.scheduler.start(config.interval).await {
                self.reconciler.escalate(vec![e]).await;
                return "Update cycle could not be started.".to_string();
            }
            match self.config.mutate_and_save(|cfg| cfg.active = true).await {
                Ok(mutation) => notes.extend(self.note_save_error(mutation.save_error).await),
                Err(e) => return self.rejected(e),
            }
        }

        let mut text = "Update cycle started.".to_string();
        append_notes(&mut text, &notes);
        text
    }

    async fn stop_updates(&self) -> String {
        let _lifecycle = self.lifecycle.lock().await;
        let mut notes = Vec::new();

        if self.config.get().active {
            self.scheduler.stop().await;
            match self.config.mutate_and_save(|cfg| cfg.active = false).await {
                Ok(mutation) => notes.extend(self.note_save_error(mutation.save_error).await),
                Err(e) => return self.rejected(e),
            }
        }

        let mut text = "Update cycle stopped.".to_string();
        append_notes(&mut text, &notes);
        text
    }

    async fn status(&self) -> String {
        let config = self.config.get();
        let mut sections = Vec::new();

        let dump = serde_json::to_string_pretty(config.as_ref())
            .unwrap_or_else(|e| format!("<unavailable: {}>", e));
        sections.push(format!("Current config:\n```json\n{}\n```", dump));
        sections.push(format!(
            "Human readable interval: {}",
            human_interval(config.interval)
        ));

        match self.reconciler.last_manifest() {
            Ok(manifest) if manifest.is_empty() => sections.push("Last manifest:\n(empty)".to_string()),
            Ok(manifest) => sections.push(format!("Last manifest:\n{}", manifest.render())),
            Err(e) => self.reconciler.escalate(vec![e]).await,
        }

        let clock = self.reconciler.clock();
        sections.push(format!("Last check: {}", timestamp(clock.last_check())));
        if self.scheduler.state() == SchedulerState::Running {
            sections.push(format!("Next check: {}", timestamp(clock.next_check())));
        }

        sections.push(counts(&config));
        sections.join("\n\n")
    }

    /// Apply `f`, persist, and render the reply from its outcome.
    async fn mutate<F, R, M>(&self, f: F, message: M) -> String
    where
        F: FnOnce(&mut ServerConfig) -> R,
        M: FnOnce(R) -> String,
    {
        match self.config.mutate_and_save(f).await {
            Ok(mutation) => {
                let mut text = message(mutation.outcome);
                let note = self.note_save_error(mutation.save_error).await;
                append_notes(&mut text, note.as_slice());
                text
            }
            Err(e) => self.rejected(e),
        }
    }

    async fn note_save_error(&self, save_error: Option<WatchError>) -> Option<&'static str> {
        let e = save_error?;
        self.reconciler.escalate(vec![e]).await;
        Some(SAVE_FAILED)
    }

    fn rejected(&self, e: WatchError) -> String {
        tracing::warn!(error = %e, "Command rejected");
        format!("Rejected: {}", e)
    }

    async fn reply(&self, chat: &str, text: &str) {
        let sink = self.reconciler.sink();
        if let Err(e) = send_with_timeout(sink.as_ref(), chat, text, self.reconciler.send_timeout()).await {
            self.reconciler.escalate(vec![e]).await;
        }
    }
}

fn channel_label(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Notify => "Channel",
        ChannelKind::Service => "Service channel",
    }
}

fn append_notes(text: &mut String, notes: &[&str]) {
    for note in notes {
        text.push('\n');
        text.push_str(note);
    }
}

/// `1h 30m` style rendering of an interval.
pub(crate) fn human_interval(interval: Duration) -> String {
    let minutes = interval.as_secs() / 60;
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => "never".to_string(),
    }
}

fn counts(config: &ServerConfig) -> String {
    format!(
        "Channels: {}\nService channels: {}\nProducts: {}\nAdmins: {}",
        config.notify_channels.len(),
        config.service_channels.len(),
        config.products.len(),
        config.whitelist.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_interval() {
        assert_eq!(human_interval(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(human_interval(Duration::from_secs(90 * 60)), "1h 30m");
        assert_eq!(human_interval(Duration::from_secs(5 * 60)), "0h 5m");
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(timestamp(None), "never");
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(Some(at)), "2024-05-01T12:30:00Z");
    }

    #[test]
    fn test_counts() {
        let mut config = ServerConfig::new("@root");
        config.notify_channels.insert("a");
        config.products.insert("p".into(), "u".into());
        assert_eq!(
            counts(&config),
            "Channels: 1\nService channels: 0\nProducts: 1\nAdmins: 1"
        );
    }

    #[test]
    fn test_append_notes() {
        let mut text = "done".to_string();
        append_notes(&mut text, &[SAVE_FAILED]);
        assert_eq!(text, format!("done\n{}", SAVE_FAILED));
    }
}
